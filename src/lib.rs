//! # ble-gateway
//!
//! A small gateway that exposes a platform's Bluetooth Low Energy adapter to
//! a host application runtime.
//!
//! Hosts issue one-shot commands (start scan, stop scan, ...) and receive
//! results only as named events. Adapter-dependent commands run as guarded
//! actions: if the adapter is missing or switched off, the command reports a
//! single error event under its own event name and nothing else happens.
//!
//! ## Features
//!
//! - **Guarded commands**: uniform "Bluetooth not supported" / "Bluetooth
//!   disabled" reporting for every adapter-dependent command
//! - **Discovery dedup**: each address is reported once per scan session
//! - **Typed events**: state changes, scan lifecycle and discovered devices
//! - **Pluggable adapter**: any [`NativeAdapter`] implementation, with a
//!   btleplug-backed one included
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ble_gateway::{platform_gateway, GatewayConfig, Payload, Result};
//!
//! fn main() -> Result<()> {
//!     let gateway = platform_gateway(GatewayConfig::default())?;
//!     let mut events = gateway.subscribe();
//!
//!     gateway.notify_current_state();
//!     gateway.start_scan(None);
//!
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//!     gateway.stop_scan();
//!
//!     while let Ok(event) = events.try_recv() {
//!         if let Payload::Device(device) = event.payload {
//!             println!("Found {} ({})", device.display_name(), device.address);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Not Implemented
//!
//! `connect`, `disconnect` and `discover_services` are accepted but perform
//! no native operation and emit no event.
//!
//! ## Feature Flags
//!
//! - `serde`: Serialize event payloads into the host wire shapes

// Public modules
pub mod ble;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod guard;

// Re-exports for convenience
pub use ble::{platform_gateway, AdapterState, BtleplugAdapter, NativeAdapter};
pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use events::{AdapterStatus, CallbackHandle, Device, EventName, GatewayEvent, Payload};
pub use gateway::BleGateway;
