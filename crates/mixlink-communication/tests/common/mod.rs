//! In-memory serial backend for lifecycle tests

#![allow(dead_code)]

use mixlink_communication::{LinkSettings, SerialBackend, SerialPort, SerialPortInfo};
use mixlink_core::{ConnectionError, Result, SerialEvent};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Default)]
struct MockState {
    ports: Vec<SerialPortInfo>,
    /// Live handle id per port
    open: HashMap<String, u64>,
    next_handle: u64,
    stale: HashSet<String>,
    stuck: bool,
    refused: HashSet<String>,
    incoming: VecDeque<Vec<u8>>,
    written: Vec<u8>,
    write_limit: Option<usize>,
    fail_reads: bool,
    releases: usize,
    opens: usize,
}

/// Backend whose ports live in memory
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ports(ports: Vec<SerialPortInfo>) -> Self {
        let backend = Self::new();
        backend.state.lock().ports = ports;
        backend
    }

    /// Simulate a handle left open by an earlier session
    pub fn leave_stale_handle(&self, port: &str) {
        self.state.lock().stale.insert(port.to_string());
    }

    /// Held handles ignore release requests
    pub fn make_release_stuck(&self) {
        self.state.lock().stuck = true;
    }

    pub fn refuse(&self, port: &str) {
        self.state.lock().refused.insert(port.to_string());
    }

    pub fn push_incoming(&self, bytes: &[u8]) {
        self.state.lock().incoming.push_back(bytes.to_vec());
    }

    pub fn limit_writes(&self, limit: usize) {
        self.state.lock().write_limit = Some(limit);
    }

    pub fn fail_reads(&self) {
        self.state.lock().fail_reads = true;
    }

    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.state.lock().written).into_owned()
    }

    pub fn releases(&self) -> usize {
        self.state.lock().releases
    }

    pub fn opens(&self) -> usize {
        self.state.lock().opens
    }

    pub fn open_handles(&self) -> usize {
        self.state.lock().open.len()
    }
}

impl SerialBackend for MockBackend {
    fn available_ports(&self) -> Result<Vec<SerialPortInfo>> {
        Ok(self.state.lock().ports.clone())
    }

    fn open(&self, port_name: &str, _settings: &LinkSettings) -> Result<Box<dyn SerialPort>> {
        let mut state = self.state.lock();
        if state.refused.contains(port_name) {
            return Err(ConnectionError::FailedToOpen {
                port: port_name.to_string(),
                reason: "Access denied".to_string(),
            }
            .into());
        }
        state.opens += 1;
        state.next_handle += 1;
        let id = state.next_handle;
        state.open.insert(port_name.to_string(), id);
        Ok(Box::new(MockPort {
            name: port_name.to_string(),
            id,
            state: self.state.clone(),
        }))
    }

    fn is_port_busy(&self, port_name: &str) -> bool {
        let state = self.state.lock();
        state.open.contains_key(port_name) || state.stale.contains(port_name)
    }

    fn release(&self, port_name: &str) {
        let mut state = self.state.lock();
        state.releases += 1;
        if !state.stuck {
            state.stale.remove(port_name);
            state.open.remove(port_name);
        }
    }
}

struct MockPort {
    name: String,
    id: u64,
    state: Arc<Mutex<MockState>>,
}

impl MockPort {
    fn closed() -> io::Error {
        io::Error::new(io::ErrorKind::NotConnected, "closed")
    }
}

impl SerialPort for MockPort {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if !self.is_open() {
            return Err(Self::closed());
        }
        let mut state = self.state.lock();
        let n = state.write_limit.unwrap_or(data.len()).min(data.len());
        state.written.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.is_open() {
            return Err(Self::closed());
        }
        {
            let mut state = self.state.lock();
            if state.fail_reads {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
            }
            if let Some(mut chunk) = state.incoming.pop_front() {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    state.incoming.push_front(chunk.split_off(n));
                }
                return Ok(n);
            }
        }
        thread::sleep(Duration::from_millis(5));
        Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"))
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_open(&self) -> bool {
        self.state.lock().open.get(&self.name) == Some(&self.id)
    }

    fn close(&mut self) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.open.get(&self.name) == Some(&self.id) {
            state.open.remove(&self.name);
        }
        Ok(())
    }
}

/// Settings with short settle bounds
pub fn fast_settings() -> LinkSettings {
    LinkSettings {
        read_timeout: Duration::from_millis(10),
        stale_handle_settle: Duration::from_millis(50),
        close_settle: Duration::from_millis(20),
        ..LinkSettings::default()
    }
}

/// Shared record of delivered events
pub type EventLog = Arc<Mutex<Vec<SerialEvent>>>;

/// Poll `condition` until it holds or two seconds pass
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

pub fn data_lines(events: &EventLog) -> Vec<String> {
    events
        .lock()
        .iter()
        .filter_map(|event| match event {
            SerialEvent::DataReceived(response) => Some(response.raw().to_string()),
            _ => None,
        })
        .collect()
}

pub fn error_messages(events: &EventLog) -> Vec<String> {
    events
        .lock()
        .iter()
        .filter_map(|event| match event {
            SerialEvent::Error(message) => Some(message.clone()),
            _ => None,
        })
        .collect()
}
