//! Error types for the ble-gateway crate.

use thiserror::Error;

/// The main error type for this crate.
///
/// Every variant is reported to the host as a plain `{error: <message>}`
/// payload, so the `Display` text is part of the wire contract.
#[derive(Error, Debug)]
pub enum Error {
    /// The platform has no BLE adapter.
    #[error("Bluetooth not supported")]
    AdapterAbsent,

    /// The BLE adapter exists but is switched off.
    #[error("Bluetooth disabled")]
    AdapterDisabled,

    /// A native adapter call failed.
    #[error("{message}")]
    NativeOperationFailed {
        /// The message reported by the platform.
        message: String,
    },

    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// A service UUID supplied by the host could not be parsed.
    #[error("Invalid UUID: {value}")]
    InvalidUuid {
        /// The string that failed to parse.
        value: String,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a native failure from any displayable platform message.
    pub fn native(message: impl Into<String>) -> Self {
        Self::NativeOperationFailed {
            message: message.into(),
        }
    }

    /// Check if this error comes from the adapter precondition check.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::AdapterAbsent | Self::AdapterDisabled)
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
