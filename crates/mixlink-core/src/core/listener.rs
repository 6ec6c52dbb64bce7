//! Serial listener interface
//!
//! Defines the listener trait consumers implement to receive link events.

use crate::core::event::SerialEvent;
use crate::data::SerialResponse;
use uuid::Uuid;

/// Handle for a registered serial listener.
///
/// Uniquely identifies a listener registration. Pass it back to
/// `remove_listener` to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(Uuid);

impl ListenerHandle {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Listener({})", &self.0.to_string()[..8])
    }
}

/// Listener trait for serial link events
///
/// Callbacks run on whichever thread emitted the event: the transport's
/// reader thread for received data, the caller's thread for lifecycle
/// events. Implementations should return quickly.
pub trait SerialListener: Send + Sync {
    /// Called for every framed, classified line
    fn on_data_received(&self, _response: &SerialResponse) {}

    /// Called when an operation fails
    fn on_error(&self, _message: &str) {}

    /// Called after a port has been opened
    fn on_connected(&self, _port_name: &str) {}

    /// Called after an open port has been closed
    fn on_disconnected(&self) {}

    /// Route an event to the matching callback
    fn on_event(&self, event: &SerialEvent) {
        match event {
            SerialEvent::DataReceived(response) => self.on_data_received(response),
            SerialEvent::Error(message) => self.on_error(message),
            SerialEvent::Connected(port_name) => self.on_connected(port_name),
            SerialEvent::Disconnected => self.on_disconnected(),
        }
    }
}

/// Adapts a closure over [`SerialEvent`] into a listener
pub struct FnListener<F>(F);

impl<F> FnListener<F>
where
    F: Fn(&SerialEvent) + Send + Sync,
{
    /// Wrap a closure
    pub fn new(callback: F) -> Self {
        Self(callback)
    }
}

impl<F> SerialListener for FnListener<F>
where
    F: Fn(&SerialEvent) + Send + Sync,
{
    fn on_event(&self, event: &SerialEvent) {
        (self.0)(event)
    }
}
