//! Gateway configuration.

use crate::error::{Error, Result};
use crate::events::EventName;

/// Configuration for a [`BleGateway`](crate::BleGateway).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Prefix for every full event name, e.g. `BleGateway.EVENT_`.
    pub event_prefix: String,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl GatewayConfig {
    /// Default event name prefix.
    pub const DEFAULT_EVENT_PREFIX: &'static str = "BleGateway.EVENT_";
    /// Default broadcast channel capacity.
    pub const DEFAULT_EVENT_CAPACITY: usize = 100;

    /// Set the event name prefix.
    pub fn with_event_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.event_prefix = prefix.into();
        self
    }

    /// Set the event channel capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Full host-visible name of an event.
    pub fn event_name(&self, name: EventName) -> String {
        format!("{}{}", self.event_prefix, name.suffix())
    }

    /// Check the configuration before building a gateway.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for a zero channel capacity.
    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(Error::InvalidParameter {
                name: "event_capacity".to_string(),
                value: self.event_capacity.to_string(),
            });
        }
        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            event_prefix: Self::DEFAULT_EVENT_PREFIX.to_string(),
            event_capacity: Self::DEFAULT_EVENT_CAPACITY,
        }
    }
}
