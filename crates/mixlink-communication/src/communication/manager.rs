//! Connection lifecycle for the MASTER link
//!
//! [`SerialManager`] owns at most one open port at a time. Connecting always
//! tears down the previous connection first, so two handles are never open
//! from one manager and no line from an earlier connection survives a
//! reconnect. Every failure is published as an error event and returned;
//! `disconnect` logs and swallows its own failures.

use super::discovery;
use super::framer::InboundBuffer;
use super::serial::{
    share_port, wait_for_release, PortReader, SerialBackend, SerialPortInfo, SharedPort,
    SystemSerialBackend,
};
use super::LinkSettings;
use crate::protocol::{parse_response, Command};
use mixlink_core::{
    thread_safe, ConnectionError, ConnectionState, Error, EventDispatcher, ListenerHandle, Result,
    SerialEvent, SerialListener, ThreadSafe,
};
use std::sync::Arc;
use std::thread;
use tokio::sync::broadcast;

const LINE_TERMINATOR: char = '\n';

/// Manages the serial connection to the MASTER
pub struct SerialManager {
    backend: Arc<dyn SerialBackend>,
    settings: LinkSettings,
    state: ConnectionState,
    port: Option<SharedPort>,
    port_name: Option<String>,
    reader: Option<PortReader>,
    buffer: ThreadSafe<InboundBuffer>,
    dispatcher: EventDispatcher,
}

impl SerialManager {
    /// Create a manager over the given backend
    pub fn new(backend: Arc<dyn SerialBackend>, settings: LinkSettings) -> Self {
        Self {
            backend,
            settings,
            state: ConnectionState::Disconnected,
            port: None,
            port_name: None,
            reader: None,
            buffer: thread_safe(InboundBuffer::new()),
            dispatcher: EventDispatcher::default(),
        }
    }

    /// Create a manager over the operating system's serial ports
    pub fn system(settings: LinkSettings) -> Self {
        Self::new(Arc::new(SystemSerialBackend::new()), settings)
    }

    /// Transport parameters applied on connect
    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// List ports in OS enumeration order; enumeration failures yield an empty list
    pub fn list_available_ports(&self) -> Vec<SerialPortInfo> {
        match self.backend.available_ports() {
            Ok(ports) => ports,
            Err(e) => {
                tracing::error!("Failed to list serial ports: {}", e);
                Vec::new()
            }
        }
    }

    /// Pick the port most likely to be the MASTER
    pub fn detect_port(&self) -> Option<SerialPortInfo> {
        tracing::info!("Scanning for Arduino Mega...");
        discovery::detect_port(&self.list_available_ports(), &self.settings.detection_keywords)
    }

    /// Connect to a named port
    ///
    /// Any existing connection is torn down first, even to the same port.
    /// The name is not required to appear in the enumeration.
    pub fn connect(&mut self, port_name: &str) -> Result<()> {
        self.teardown_existing();

        let port_name = port_name.trim();
        if port_name.is_empty() {
            return Err(self.report(ConnectionError::PortNotFound {
                port: port_name.to_string(),
            }));
        }
        self.open_port(port_name)
    }

    /// Connect to the port picked by auto-detection
    pub fn connect_auto(&mut self) -> Result<()> {
        self.teardown_existing();

        match self.detect_port() {
            Some(port) => self.open_port(&port.port_name),
            None => {
                tracing::error!("No Arduino port detected");
                self.dispatcher.notify_error("No Arduino port detected");
                Err(ConnectionError::PortNotFound {
                    port: "auto".to_string(),
                }
                .into())
            }
        }
    }

    fn teardown_existing(&mut self) {
        if self.state == ConnectionState::Connected || self.port.is_some() {
            tracing::debug!("Closing existing connection before connecting");
            self.disconnect();
        }
    }

    fn open_port(&mut self, port_name: &str) -> Result<()> {
        if let Err(e) = self.settings.validate() {
            return Err(self.report(e));
        }

        if self.backend.is_port_busy(port_name) {
            tracing::warn!("Port {} is already open, closing it first", port_name);
            self.backend.release(port_name);
            if !wait_for_release(
                self.backend.as_ref(),
                port_name,
                self.settings.stale_handle_settle,
            ) {
                tracing::warn!(
                    "Port {} still busy after {:?}, trying anyway",
                    port_name,
                    self.settings.stale_handle_settle
                );
            }
        }

        tracing::info!(
            "Opening {} at {} baud, {} data bits, {} stop bits, parity {}",
            port_name,
            self.settings.baud_rate,
            self.settings.data_bits,
            self.settings.stop_bits,
            self.settings.parity
        );

        let port = match self.backend.open(port_name, &self.settings) {
            Ok(port) => share_port(port),
            Err(e) => {
                tracing::error!(
                    "Failed to open port: {} - port may be in use by another application",
                    port_name
                );
                let reason = match e.as_connection_error() {
                    Some(ConnectionError::FailedToOpen { reason, .. }) => reason.clone(),
                    _ => e.to_string(),
                };
                return Err(self.report(ConnectionError::FailedToOpen {
                    port: port_name.to_string(),
                    reason: format!("{} - port may be in use by another application", reason),
                }));
            }
        };

        self.buffer.lock().clear();

        let buffer = self.buffer.clone();
        let data_dispatcher = self.dispatcher.clone();
        let failure_dispatcher = self.dispatcher.clone();
        let reader = PortReader::spawn(
            port.clone(),
            self.settings.read_chunk_size,
            move |chunk| {
                let lines = buffer.lock().push(chunk);
                for line in lines {
                    tracing::debug!("Received: {}", line);
                    data_dispatcher.notify_data_received(parse_response(&line));
                }
            },
            move |e| {
                failure_dispatcher.notify_error(format!("Read failed: {}", e));
            },
        );

        let reader = match reader {
            Ok(reader) => reader,
            Err(e) => {
                if let Err(close_err) = port.lock().close() {
                    tracing::warn!("Error closing {}: {}", port_name, close_err);
                }
                return Err(self.report(ConnectionError::IoError {
                    reason: format!("Failed to start reader for {}: {}", port_name, e),
                }));
            }
        };

        self.port = Some(port);
        self.port_name = Some(port_name.to_string());
        self.reader = Some(reader);
        self.state = ConnectionState::Connected;

        tracing::info!("Connected to {}", port_name);
        self.dispatcher.notify_connected(port_name);
        Ok(())
    }

    /// Close the connection
    ///
    /// Idempotent. Emits `Disconnected` only if a handle was actually open,
    /// and blocks for the close settle bound whenever a port was held.
    pub fn disconnect(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.stop();
        }

        if let Some(port) = self.port.take() {
            let name = self.port_name.clone().unwrap_or_default();
            let was_open = {
                let mut guard = port.lock();
                let open = guard.is_open();
                if open {
                    if let Err(e) = guard.close() {
                        tracing::error!("Error during disconnect: {}", e);
                    }
                }
                open
            };
            drop(port);

            if was_open {
                tracing::info!("Disconnected from {}", name);
                self.dispatcher.notify_disconnected();
            }

            // The OS frees the device some time after close returns.
            thread::sleep(self.settings.close_settle);
        }

        self.buffer.lock().clear();
        self.port_name = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Send a command, terminated with `\n`
    pub fn send_command(&self, command: &Command) -> Result<()> {
        let port = match &self.port {
            Some(port) if self.is_connected() => port,
            _ => {
                tracing::error!("Not connected to Arduino");
                return Err(self.report(ConnectionError::NotConnected));
            }
        };

        let mut text = command.text();
        if !text.ends_with(LINE_TERMINATOR) {
            text.push(LINE_TERMINATOR);
        }
        let bytes = text.as_bytes();

        let written = match port.lock().write(bytes) {
            Ok(written) => written,
            Err(e) => {
                tracing::error!("Error sending command: {}", e);
                return Err(self.report(ConnectionError::IoError {
                    reason: e.to_string(),
                }));
            }
        };

        if written != bytes.len() {
            tracing::error!(
                "Failed to write complete command. Wrote {} of {} bytes",
                written,
                bytes.len()
            );
            return Err(self.report(ConnectionError::WriteIncomplete {
                written,
                expected: bytes.len(),
            }));
        }

        tracing::debug!("Sent command: {}", text.trim_end());
        Ok(())
    }

    /// Send caller-supplied text as-is
    pub fn send_raw(&self, text: impl Into<String>) -> Result<()> {
        self.send_command(&Command::custom(text))
    }

    /// Whether a port is open and its reader is running
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
            && self.reader.as_ref().is_some_and(PortReader::is_alive)
    }

    /// Name of the connected port
    pub fn current_port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    /// Lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Bytes received but not yet terminated
    pub fn pending_bytes(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Register a listener
    pub fn add_listener(&self, listener: Arc<dyn SerialListener>) -> ListenerHandle {
        self.dispatcher.add_listener(listener)
    }

    /// Register a closure as a listener
    pub fn add_fn_listener<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(&SerialEvent) + Send + Sync + 'static,
    {
        self.dispatcher.add_fn_listener(callback)
    }

    /// Unregister a listener
    pub fn remove_listener(&self, handle: &ListenerHandle) -> bool {
        self.dispatcher.remove_listener(handle)
    }

    /// Unregister every listener
    pub fn clear_listeners(&self) {
        self.dispatcher.clear_listeners();
    }

    /// Receive events over a channel
    pub fn subscribe(&self) -> broadcast::Receiver<SerialEvent> {
        self.dispatcher.subscribe()
    }

    /// The dispatcher shared with the reader thread
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    fn report(&self, error: impl Into<Error>) -> Error {
        let error = error.into();
        self.dispatcher.notify_error(error.to_string());
        error
    }
}

impl Drop for SerialManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}
