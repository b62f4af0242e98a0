//! Events delivered from the gateway to its host.
//!
//! Every event is a `(name, payload)` pair. Errors are not a separate
//! channel: a failed command reports under its own success event name with
//! a [`Payload::Error`] payload, and hosts tell the two apart by payload shape.

#[cfg(feature = "serde")]
use serde::Serialize;
use tokio::task::JoinHandle;

/// Logical event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    /// Adapter became enabled or disabled.
    StateChanged,
    /// A scan was started (or failed to start).
    ScanStarted,
    /// A scan was stopped (or failed to stop).
    ScanStopped,
    /// A new device was seen in the current scan session.
    DeviceDiscovered,
}

impl EventName {
    /// All event names, in declaration order.
    pub const ALL: [EventName; 4] = [
        EventName::StateChanged,
        EventName::ScanStarted,
        EventName::ScanStopped,
        EventName::DeviceDiscovered,
    ];

    /// Suffix appended to the configured event prefix.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::StateChanged => "STATE_CHANGED",
            Self::ScanStarted => "SCAN_STARTED",
            Self::ScanStopped => "SCAN_STOPPED",
            Self::DeviceDiscovered => "DEVICE_DISCOVERED",
        }
    }

    /// Key under which the host looks up this event's full name.
    pub fn constant_key(&self) -> &'static str {
        match self {
            Self::StateChanged => "StateChanged",
            Self::ScanStarted => "ScanStarted",
            Self::ScanStopped => "ScanStopped",
            Self::DeviceDiscovered => "DeviceDiscovered",
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.constant_key())
    }
}

/// Adapter availability as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(rename_all = "lowercase"))]
pub enum AdapterStatus {
    /// Adapter present and switched on.
    Enabled,
    /// Adapter absent or switched off.
    Disabled,
}

impl AdapterStatus {
    /// The literal payload string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for AdapterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered BLE peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Device {
    /// Platform address, unique per peripheral.
    pub address: String,
    /// Advertised local name, if any.
    pub name: Option<String>,
}

impl Device {
    /// Create a device with an optional display name.
    pub fn new(address: impl Into<String>, name: Option<String>) -> Self {
        Self {
            address: address.into(),
            name,
        }
    }

    /// Name to show in a UI, falling back to the address.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

/// Event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(untagged))]
pub enum Payload {
    /// No payload (`null` on the wire).
    None,
    /// Adapter status string.
    State(AdapterStatus),
    /// Discovered device as `{address, name}`.
    Device(Device),
    /// Failure as `{error}`.
    Error {
        /// Human-readable failure message.
        error: String,
    },
}

impl Payload {
    /// Check if this payload reports a failure.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// The failure message, if this is an error payload.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { error } => Some(error),
            _ => None,
        }
    }
}

/// A single event emitted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEvent {
    /// Logical event name.
    pub name: EventName,
    /// Event payload.
    pub payload: Payload,
}

impl GatewayEvent {
    /// Event with no payload.
    pub fn bare(name: EventName) -> Self {
        Self {
            name,
            payload: Payload::None,
        }
    }

    /// State-changed event.
    pub fn state(status: AdapterStatus) -> Self {
        Self {
            name: EventName::StateChanged,
            payload: Payload::State(status),
        }
    }

    /// Device-discovered event.
    pub fn device(device: Device) -> Self {
        Self {
            name: EventName::DeviceDiscovered,
            payload: Payload::Device(device),
        }
    }

    /// Failure reported under the originating command's event name.
    pub fn error(name: EventName, message: impl Into<String>) -> Self {
        Self {
            name,
            payload: Payload::Error {
                error: message.into(),
            },
        }
    }

    /// Check if this event reports a failure.
    pub fn is_error(&self) -> bool {
        self.payload.is_error()
    }
}

/// Registration of an event listener task.
///
/// Dropping the handle, or calling [`CallbackHandle::unregister`], aborts the
/// task so the callback stops receiving events.
pub struct CallbackHandle {
    id: u64,
    listener: JoinHandle<()>,
}

impl CallbackHandle {
    pub(crate) fn new(id: u64, listener: JoinHandle<()>) -> Self {
        Self { id, listener }
    }

    /// Stop delivering events to this callback.
    pub fn unregister(self) {
        drop(self);
    }

    /// Registration number, unique per gateway.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the listener has ended, e.g. because the gateway was dropped.
    pub fn is_finished(&self) -> bool {
        self.listener.is_finished()
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        self.listener.abort();
    }
}
