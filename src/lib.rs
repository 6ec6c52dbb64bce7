//! # MixLink
//!
//! Serial link to the MASTER controller of a pump-based mixing machine.
//! The MASTER fans commands out to slave pump controllers over a CAN bus;
//! this library finds it, keeps one connection open, frames and classifies
//! what it prints, and sends typed commands.
//!
//! ## Architecture
//!
//! MixLink is organized as a workspace with multiple crates:
//!
//! 1. **mixlink-core** - Errors, events, listener dispatch, response model
//! 2. **mixlink-communication** - Serial backend, discovery, framing, commands, connection manager
//! 3. **mixlink-settings** - Configuration file handling
//! 4. **mixlink** - Operator console binary that integrates all crates

pub mod console;

pub use mixlink_core::{
    ConnectionError, ConnectionState, Error, EventDispatcher, FnListener, ListenerHandle,
    ResponseType, Result, SerialEvent, SerialListener, SerialParity, SerialResponse,
};

pub use mixlink_communication::{
    classify, detect_port, list_ports, parse_response, Command, CommandKind, IdPinPulse,
    InboundBuffer, LinkSettings, PinPulse, PulseLogging, SerialBackend, SerialManager,
    SerialPortInfo, SystemSerialBackend, UidPinPulse,
};

pub use mixlink_settings::{Config, ConnectionSettings, SettingsError};

use std::time::Duration;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Link parameters for a configured connection
pub fn link_settings(connection: &ConnectionSettings) -> LinkSettings {
    LinkSettings {
        baud_rate: connection.baud_rate,
        data_bits: connection.data_bits,
        stop_bits: connection.stop_bits,
        parity: connection.parity,
        read_timeout: Duration::from_millis(connection.read_timeout_ms),
        read_chunk_size: connection.read_chunk_size,
        stale_handle_settle: Duration::from_millis(connection.stale_handle_settle_ms),
        close_settle: Duration::from_millis(connection.close_settle_ms),
        detection_keywords: connection.detection_keywords.clone(),
    }
}

/// Initialize logging with the default configuration
///
/// Logs go to stderr so they do not interleave with console output.
/// Honors RUST_LOG; INFO is always enabled.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
