//! BLE adapter module.
//!
//! This module holds the native adapter abstraction the gateway depends on,
//! the btleplug-backed implementation, and scan filter helpers.

pub mod adapter;
pub mod platform;
pub mod uuids;

pub use adapter::{AdapterState, NativeAdapter};
pub use platform::{platform_gateway, BtleplugAdapter};
pub use uuids::*;

#[cfg(test)]
pub use adapter::MockNativeAdapter;
