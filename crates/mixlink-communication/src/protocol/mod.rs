//! MASTER text protocol
//!
//! - [`command`]: typed commands and their wire encoding
//! - [`response_parser`]: keyword classification of inbound lines

pub mod command;
pub mod response_parser;

pub use command::{Command, CommandKind, IdPinPulse, PinPulse, PulseLogging, UidPinPulse};
pub use response_parser::{classify, parse_response};
