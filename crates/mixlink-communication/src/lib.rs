//! # MixLink Communication
//!
//! Serial link to the MASTER controller: port discovery, connection
//! lifecycle, inbound line framing, response classification, and the
//! command vocabulary.

pub mod communication;
pub mod protocol;

pub use communication::{
    discovery::{detect_port, matches_keywords},
    framer::{InboundBuffer, READ_CHUNK_SIZE},
    manager::SerialManager,
    serial::{
        list_ports, wait_for_release, PortReader, SerialBackend, SerialPort, SerialPortInfo,
        SharedPort, SystemSerialBackend,
    },
    LinkSettings, DEFAULT_BAUD_RATE, DEFAULT_DETECTION_KEYWORDS,
};

pub use protocol::{
    classify, parse_response, Command, CommandKind, IdPinPulse, PinPulse, PulseLogging,
    UidPinPulse,
};
