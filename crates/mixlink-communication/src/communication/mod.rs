//! Serial communication with the MASTER
//!
//! - [`serial`]: transport backend, port enumeration, reader thread
//! - [`discovery`]: heuristic selection of the MASTER's port
//! - [`framer`]: byte stream to line framing
//! - [`manager`]: connection lifecycle and send path

pub mod discovery;
pub mod framer;
pub mod manager;
pub mod serial;

use mixlink_core::{ConnectionError, Result, SerialParity};
use std::time::Duration;

/// Default baud rate of the MASTER firmware
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Substrings that identify the MASTER (or a clone board's USB bridge) in a
/// port description
pub const DEFAULT_DETECTION_KEYWORDS: [&str; 4] = ["arduino", "mega", "ch340", "ch341"];

/// Transport and lifecycle parameters applied on every connect
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSettings {
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5-8)
    pub data_bits: u8,
    /// Stop bits (1-2)
    pub stop_bits: u8,
    /// Parity
    pub parity: SerialParity,
    /// Semi-blocking read timeout
    pub read_timeout: Duration,
    /// Maximum bytes taken per read
    pub read_chunk_size: usize,
    /// Upper bound on waiting for a leftover handle to be released
    pub stale_handle_settle: Duration,
    /// Wait after closing a port, for the OS to release it
    pub close_settle: Duration,
    /// Port description keywords used by auto-detection
    pub detection_keywords: Vec<String>,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
            read_timeout: Duration::from_millis(100),
            read_chunk_size: framer::READ_CHUNK_SIZE,
            stale_handle_settle: Duration::from_millis(300),
            close_settle: Duration::from_millis(100),
            detection_keywords: DEFAULT_DETECTION_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

impl LinkSettings {
    /// Check the parameters before they reach the transport
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| -> Result<()> {
            Err(ConnectionError::InvalidParameters { reason }.into())
        };

        if self.baud_rate == 0 {
            return invalid("baud rate must be > 0".to_string());
        }
        if !(5..=8).contains(&self.data_bits) {
            return invalid(format!("invalid data bits: {}", self.data_bits));
        }
        if !(1..=2).contains(&self.stop_bits) {
            return invalid(format!("invalid stop bits: {}", self.stop_bits));
        }
        if self.read_timeout.is_zero() {
            return invalid("read timeout must be > 0".to_string());
        }
        if self.read_chunk_size == 0 {
            return invalid("read chunk size must be > 0".to_string());
        }
        Ok(())
    }
}
