//! Error handling for MixLink
//!
//! Provides the error types shared by every layer of the serial link:
//! - Connection errors (discovery, open, write, listener isolation)
//! - A unified [`Error`] used in public APIs
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Represents failures while talking to the MASTER over the serial transport.
/// Every variant is also published as an error event by the connection manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// No endpoint could be resolved for the requested target
    #[error("Port not found: {port}")]
    PortNotFound {
        /// The requested port name, or the auto-detect marker.
        port: String,
    },

    /// The transport refused to open the port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// Operation attempted while disconnected
    #[error("Not connected to Arduino")]
    NotConnected,

    /// The transport accepted fewer bytes than were encoded
    #[error("Failed to write complete command. Wrote {written} of {expected} bytes")]
    WriteIncomplete {
        /// Bytes reported written by the transport.
        written: usize,
        /// Encoded length of the command.
        expected: usize,
    },

    /// A listener callback panicked during dispatch
    #[error("Error in listener callback: {reason}")]
    ListenerCallback {
        /// The panic payload, if it carried a message.
        reason: String,
    },

    /// Serial port error
    #[error("Serial port error: {reason}")]
    SerialError {
        /// The reason for the serial port error.
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {reason}")]
    IoError {
        /// The reason for the I/O error.
        reason: String,
    },

    /// Invalid connection parameters
    #[error("Invalid connection parameters: {reason}")]
    InvalidParameters {
        /// The reason the parameters are invalid.
        reason: String,
    },
}

/// Main error type for MixLink
///
/// A unified error type for the public APIs of every layer.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl Error {
    /// The connection error behind this error, if any
    pub fn as_connection_error(&self) -> Option<&ConnectionError> {
        match self {
            Error::Connection(err) => Some(err),
        }
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
