//! Response data model
//!
//! A [`SerialResponse`] is created once per framed line received from the
//! MASTER and never mutated afterwards.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;

/// Semantic category of a line received from the MASTER
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Command acknowledged
    Ack,
    /// Data or telemetry
    Data,
    /// Error message
    Error,
    /// Log entry
    Log,
    /// Table row
    Table,
    /// Blank or unrecognised
    Unknown,
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ack => write!(f, "ACK"),
            Self::Data => write!(f, "DATA"),
            Self::Error => write!(f, "ERROR"),
            Self::Log => write!(f, "LOG"),
            Self::Table => write!(f, "TABLE"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A classified line received from the MASTER
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SerialResponse {
    raw: String,
    timestamp: DateTime<Local>,
    response_type: ResponseType,
    error: bool,
}

impl SerialResponse {
    /// Create a response stamped with the current local time
    pub fn new(raw: impl Into<String>, response_type: ResponseType) -> Self {
        Self::with_timestamp(raw, response_type, Local::now())
    }

    /// Create a response with an explicit arrival time
    pub fn with_timestamp(
        raw: impl Into<String>,
        response_type: ResponseType,
        timestamp: DateTime<Local>,
    ) -> Self {
        Self {
            raw: raw.into(),
            timestamp,
            response_type,
            error: response_type == ResponseType::Error,
        }
    }

    /// The line as received, after trimming
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Arrival time
    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    /// Classified type
    pub fn response_type(&self) -> ResponseType {
        self.response_type
    }

    /// True iff the classified type is [`ResponseType::Error`]
    pub fn is_error(&self) -> bool {
        self.error
    }
}

impl fmt::Display for SerialResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.response_type,
            self.raw
        )
    }
}
