//! Error types for Axpert protocol operations.

use thiserror::Error;

/// Result type alias for Axpert operations.
pub type Result<T> = std::result::Result<T, AxpertError>;

/// Error types for inverter communication and telemetry delivery.
#[derive(Error, Debug)]
pub enum AxpertError {
    /// The serial port could not be opened (missing device, permissions, busy)
    #[error("Serial port {port} unavailable: {source}")]
    PortUnavailable {
        /// Device path that failed to open
        port: String,
        /// Underlying serial library error
        #[source]
        source: serialport::Error,
    },

    /// Serial port error after the port was opened
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The port opened but the inverter returned nothing within the read timeout
    #[error("No response to {command}")]
    NoResponse {
        /// Command that went unanswered
        command: String,
    },

    /// Response didn't match the field layout expected for the command
    #[error("Cannot decode {command} response: {reason} (raw: {raw:?})")]
    Decode {
        /// Command whose response failed to decode
        command: String,
        /// What was missing or malformed
        reason: String,
        /// Raw response, kept for diagnosis
        raw: String,
    },

    /// A telemetry sink rejected or failed to deliver a payload
    #[error("Sink {sink} delivery failed: {reason}")]
    SinkDelivery {
        /// Sink name
        sink: String,
        /// Failure description
        reason: String,
    },

    /// Host temperature could not be read
    #[error("Temperature read failed: {0}")]
    Temperature(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AxpertError {
    /// True for failures that mean "no data this round" rather than a malformed exchange.
    pub fn is_absence(&self) -> bool {
        matches!(
            self,
            AxpertError::NoResponse { .. } | AxpertError::PortUnavailable { .. }
        )
    }

    pub(crate) fn decode(command: &str, reason: impl Into<String>, raw: &str) -> Self {
        AxpertError::Decode {
            command: command.to_string(),
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }
}
