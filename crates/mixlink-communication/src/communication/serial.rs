//! Serial port communication implementation
//!
//! Provides the transport layer underneath the connection manager:
//! - Port enumeration with descriptive metadata
//! - A backend abstraction so the lifecycle can be driven by real hardware
//!   or by an in-memory double
//! - The reader thread that turns "data available" into callbacks
//! - Bounded polling for the OS to release a port handle

use super::LinkSettings;
use mixlink_core::{ConnectionError, Result, SerialParity, ThreadSafe};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// USB product string if available
    pub product: Option<String>,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// Serial number if available
    pub serial_number: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            product: None,
            manufacturer: None,
            serial_number: None,
            vid: None,
            pid: None,
        }
    }

    /// Set product string
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set serial number
    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    /// Set USB IDs
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }

    /// Display label, e.g. "COM3 - USB-SERIAL CH340"
    pub fn label(&self) -> String {
        format!("{} - {}", self.port_name, self.description)
    }
}

/// List available serial ports on the system
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    match serialport::available_ports() {
        Ok(ports) => Ok(ports.iter().map(to_port_info).collect()),
        Err(e) => {
            tracing::error!("Failed to enumerate serial ports: {}", e);
            Err(ConnectionError::SerialError {
                reason: format!("Failed to enumerate ports: {}", e),
            }
            .into())
        }
    }
}

fn to_port_info(port: &serialport::SerialPortInfo) -> SerialPortInfo {
    let info = SerialPortInfo::new(&port.port_name, get_port_description(port));
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            let mut info = info.with_usb_ids(usb_info.vid, usb_info.pid);
            if let Some(ref product) = usb_info.product {
                info = info.with_product(product);
            }
            if let Some(ref mfg) = usb_info.manufacturer {
                info = info.with_manufacturer(mfg);
            }
            if let Some(ref serial) = usb_info.serial_number {
                info = info.with_serial_number(serial);
            }
            info
        }
        _ => info,
    }
}

/// Get a user-friendly description for a port
fn get_port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Low-level serial port interface
pub trait SerialPort: Send {
    /// Write data to the port, returning the number of bytes accepted
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Read available data, waiting at most the configured read timeout
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Get the port name
    fn name(&self) -> String;

    /// Whether the handle is still open
    fn is_open(&self) -> bool;

    /// Close the port; later reads and writes fail
    fn close(&mut self) -> io::Result<()>;
}

/// An open port shared between the caller thread and the reader thread
pub type SharedPort = ThreadSafe<Box<dyn SerialPort>>;

/// Source of serial ports: enumeration, opening, and handle bookkeeping
pub trait SerialBackend: Send + Sync {
    /// Enumerate endpoints in OS order
    fn available_ports(&self) -> Result<Vec<SerialPortInfo>>;

    /// Open a port with the given parameters
    fn open(&self, port_name: &str, settings: &LinkSettings) -> Result<Box<dyn SerialPort>>;

    /// Whether a handle on `port_name` is still held open
    fn is_port_busy(&self, _port_name: &str) -> bool {
        false
    }

    /// Close any handle on `port_name` still held in this process
    fn release(&self, _port_name: &str) {}
}

/// Block until `port_name` is no longer busy, or `bound` has elapsed
///
/// Polls with exponential backoff starting at 10 ms. Returns true if the port
/// became free within the bound.
pub fn wait_for_release(backend: &dyn SerialBackend, port_name: &str, bound: Duration) -> bool {
    let deadline = Instant::now() + bound;
    let mut delay = Duration::from_millis(10);

    loop {
        if !backend.is_port_busy(port_name) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep(delay.min(deadline - now));
        delay = (delay * 2).min(Duration::from_millis(80));
    }
}

/// Convert a parity setting to serialport format
fn to_serialport_parity(parity: SerialParity) -> serialport::Parity {
    match parity {
        SerialParity::None => serialport::Parity::None,
        SerialParity::Even => serialport::Parity::Even,
        SerialParity::Odd => serialport::Parity::Odd,
    }
}

fn to_serialport_data_bits(data_bits: u8) -> Result<serialport::DataBits> {
    match data_bits {
        5 => Ok(serialport::DataBits::Five),
        6 => Ok(serialport::DataBits::Six),
        7 => Ok(serialport::DataBits::Seven),
        8 => Ok(serialport::DataBits::Eight),
        _ => Err(ConnectionError::InvalidParameters {
            reason: format!("Invalid data bits: {}", data_bits),
        }
        .into()),
    }
}

fn to_serialport_stop_bits(stop_bits: u8) -> Result<serialport::StopBits> {
    match stop_bits {
        1 => Ok(serialport::StopBits::One),
        2 => Ok(serialport::StopBits::Two),
        _ => Err(ConnectionError::InvalidParameters {
            reason: format!("Invalid stop bits: {}", stop_bits),
        }
        .into()),
    }
}

/// An OS handle shared by its holder and the backend that opened it
type OsHandle = ThreadSafe<Option<Box<dyn serialport::SerialPort>>>;

/// Handles this backend has handed out and not yet closed, by port name
type ClaimTable = ThreadSafe<HashMap<String, OsHandle>>;

/// Backend over the operating system's serial ports
///
/// Tracks the handles it has opened so a later connect can detect a port
/// still held by this process (for example by a manager whose reader died)
/// and close it.
#[derive(Default, Clone)]
pub struct SystemSerialBackend {
    claims: ClaimTable,
}

impl SystemSerialBackend {
    /// Create a backend with no open handles
    pub fn new() -> Self {
        Self::default()
    }
}

impl SerialBackend for SystemSerialBackend {
    fn available_ports(&self) -> Result<Vec<SerialPortInfo>> {
        list_ports()
    }

    fn open(&self, port_name: &str, settings: &LinkSettings) -> Result<Box<dyn SerialPort>> {
        let builder = serialport::new(port_name, settings.baud_rate)
            .timeout(settings.read_timeout)
            .data_bits(to_serialport_data_bits(settings.data_bits)?)
            .stop_bits(to_serialport_stop_bits(settings.stop_bits)?)
            .parity(to_serialport_parity(settings.parity))
            .flow_control(serialport::FlowControl::None);

        match builder.open() {
            Ok(port) => {
                let handle: OsHandle = Arc::new(Mutex::new(Some(port)));
                self.claims
                    .lock()
                    .insert(port_name.to_string(), handle.clone());
                Ok(Box::new(RealSerialPort {
                    name: port_name.to_string(),
                    handle,
                    claims: self.claims.clone(),
                }))
            }
            Err(e) => {
                tracing::warn!("Failed to open serial port {}: {}", port_name, e);
                Err(ConnectionError::FailedToOpen {
                    port: port_name.to_string(),
                    reason: e.to_string(),
                }
                .into())
            }
        }
    }

    fn is_port_busy(&self, port_name: &str) -> bool {
        self.claims.lock().contains_key(port_name)
    }

    fn release(&self, port_name: &str) {
        let claimed = self.claims.lock().remove(port_name);
        if let Some(handle) = claimed {
            // Waits out a read in progress on the holder's side.
            if handle.lock().take().is_some() {
                tracing::warn!("Closed handle on {} held by another connection", port_name);
            }
        }
    }
}

/// Real serial port implementation using the serialport crate
pub struct RealSerialPort {
    name: String,
    handle: OsHandle,
    claims: ClaimTable,
}

fn port_closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "port is closed")
}

impl SerialPort for RealSerialPort {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match self.handle.lock().as_mut() {
            Some(port) => port.write(data),
            None => Err(port_closed()),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.handle.lock().as_mut() {
            Some(port) => port.read(buf),
            None => Err(port_closed()),
        }
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_open(&self) -> bool {
        self.handle.lock().is_some()
    }

    fn close(&mut self) -> io::Result<()> {
        // Dropping the serialport handle closes the descriptor.
        let closed = self.handle.lock().take();
        drop(closed);

        let mut claims = self.claims.lock();
        if claims
            .get(&self.name)
            .is_some_and(|held| Arc::ptr_eq(held, &self.handle))
        {
            claims.remove(&self.name);
        }
        Ok(())
    }
}

impl Drop for RealSerialPort {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Thread that delivers data-available notifications for one open port
///
/// Each iteration reads up to `chunk_size` bytes under the port lock and hands
/// them to `on_data` after the lock is released. A read error other than a
/// timeout closes the port and ends the thread after calling `on_failure`.
/// Finding the port closed by someone else also counts as a failure.
pub struct PortReader {
    stop: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PortReader {
    /// Start reading `port` on a new thread
    pub fn spawn<D, F>(
        port: SharedPort,
        chunk_size: usize,
        mut on_data: D,
        on_failure: F,
    ) -> io::Result<Self>
    where
        D: FnMut(&[u8]) + Send + 'static,
        F: FnOnce(io::Error) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let alive = Arc::new(AtomicBool::new(true));
        let thread_stop = stop.clone();
        let thread_alive = alive.clone();
        let name = port.lock().name();

        let handle = thread::Builder::new()
            .name(format!("mixlink-reader-{}", name))
            .spawn(move || {
                let mut buf = vec![0u8; chunk_size.max(1)];
                while !thread_stop.load(Ordering::SeqCst) {
                    let result = {
                        let mut guard = port.lock();
                        if !guard.is_open() {
                            if thread_stop.load(Ordering::SeqCst) {
                                break;
                            }
                            tracing::error!("Port {} was closed underneath the reader", name);
                            thread_alive.store(false, Ordering::SeqCst);
                            drop(guard);
                            on_failure(io::Error::new(
                                io::ErrorKind::ConnectionAborted,
                                "port was closed by another connection",
                            ));
                            return;
                        }
                        guard.read(&mut buf)
                    };

                    match result {
                        Ok(0) => thread::sleep(Duration::from_millis(1)),
                        Ok(n) => on_data(&buf[..n]),
                        Err(e)
                            if matches!(
                                e.kind(),
                                io::ErrorKind::TimedOut
                                    | io::ErrorKind::WouldBlock
                                    | io::ErrorKind::Interrupted
                            ) => {}
                        Err(e) => {
                            if thread_stop.load(Ordering::SeqCst) {
                                break;
                            }
                            tracing::error!("Read from {} failed: {}", name, e);
                            let _ = port.lock().close();
                            thread_alive.store(false, Ordering::SeqCst);
                            on_failure(e);
                            return;
                        }
                    }
                }
                thread_alive.store(false, Ordering::SeqCst);
            })?;

        Ok(Self {
            stop,
            alive,
            handle: Some(handle),
        })
    }

    /// Whether the reader is still running against an open port
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Stop delivering notifications
    ///
    /// Joins the thread unless called from the reader thread itself (a
    /// listener disconnecting from inside a callback); in that case the loop
    /// exits once the callback returns.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                tracing::error!("Serial reader thread panicked");
            }
        }
    }
}

impl Drop for PortReader {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// Wrap an open port for sharing with a reader
pub fn share_port(port: Box<dyn SerialPort>) -> SharedPort {
    Arc::new(Mutex::new(port))
}
