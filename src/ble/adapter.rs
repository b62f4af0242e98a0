//! Native adapter abstraction.
//!
//! The gateway never talks to a platform BLE stack directly. It is handed an
//! implementation of [`NativeAdapter`] at construction, and the platform layer
//! calls back into the gateway with [`AdapterState`] broadcasts and
//! discovered devices.

use uuid::Uuid;

use crate::error::Result;

/// Adapter power state as reported by a platform broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdapterState {
    /// State not yet known.
    #[default]
    Unknown,
    /// Radio is powering up.
    TurningOn,
    /// Radio is on and usable.
    On,
    /// Radio is powering down.
    TurningOff,
    /// Radio is off.
    Off,
}

impl std::fmt::Display for AdapterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::TurningOn => write!(f, "TurningOn"),
            Self::On => write!(f, "On"),
            Self::TurningOff => write!(f, "TurningOff"),
            Self::Off => write!(f, "Off"),
        }
    }
}

/// The platform's local BLE radio.
///
/// Calls are issued from the host's command thread and must not wait for
/// scan results: `start_scan` returns once the scan has been requested.
#[cfg_attr(test, mockall::automock)]
pub trait NativeAdapter: Send + Sync {
    /// Live enabled flag. Queried before every guarded action.
    fn is_enabled(&self) -> bool;

    /// Begin scanning. An empty filter list means an unfiltered scan.
    fn start_scan(&self, service_uuids: &[Uuid]) -> Result<()>;

    /// Stop the active scan.
    fn stop_scan(&self) -> Result<()>;
}
