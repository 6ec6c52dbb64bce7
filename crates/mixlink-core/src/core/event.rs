//! Event system for the serial link
//!
//! Provides:
//! - [`SerialEvent`], the four event kinds a link emits
//! - [`EventDispatcher`], a listener registry that also feeds a broadcast
//!   channel for async receivers
//!
//! Each publish works on a snapshot of the listener set, so listeners may be
//! added or removed while a broadcast is in flight (including from inside a
//! callback). A panicking listener is logged and skipped; delivery continues
//! with the next one.

use crate::core::listener::{FnListener, ListenerHandle, SerialListener};
use crate::data::SerialResponse;
use crate::error::ConnectionError;
use crate::types::{thread_safe_rw_vec, ThreadSafeRwVec};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Serial link event types
#[derive(Debug, Clone, PartialEq)]
pub enum SerialEvent {
    /// A line was framed and classified
    DataReceived(SerialResponse),
    /// An operation failed
    Error(String),
    /// A port was opened
    Connected(String),
    /// An open port was closed
    Disconnected,
}

impl std::fmt::Display for SerialEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerialEvent::DataReceived(response) => write!(f, "{}", response),
            SerialEvent::Error(msg) => write!(f, "Error: {}", msg),
            SerialEvent::Connected(name) => write!(f, "Connected to {}", name),
            SerialEvent::Disconnected => write!(f, "Disconnected"),
        }
    }
}

type Registration = (ListenerHandle, Arc<dyn SerialListener>);

/// Event dispatcher for publishing events to listeners and subscribers
#[derive(Clone)]
pub struct EventDispatcher {
    /// Registered listeners in registration order.
    listeners: ThreadSafeRwVec<Registration>,
    /// Broadcast sender for channel subscribers.
    tx: broadcast::Sender<SerialEvent>,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    ///
    /// # Arguments
    /// * `buffer_size` - Capacity of the broadcast channel (default 100)
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size.max(1));
        Self {
            listeners: thread_safe_rw_vec(),
            tx,
        }
    }

    /// Create a new event dispatcher with default buffer size
    pub fn default_with_buffer() -> Self {
        Self::new(100)
    }

    /// Register a listener; it receives events after all earlier registrations
    pub fn add_listener(&self, listener: Arc<dyn SerialListener>) -> ListenerHandle {
        let handle = ListenerHandle::new();
        self.listeners.write().push((handle, listener));
        tracing::debug!("{} added", handle);
        handle
    }

    /// Register a closure as a listener
    pub fn add_fn_listener<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(&SerialEvent) + Send + Sync + 'static,
    {
        self.add_listener(Arc::new(FnListener::new(callback)))
    }

    /// Remove a listener
    ///
    /// Returns true if the registration was found and removed.
    pub fn remove_listener(&self, handle: &ListenerHandle) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(h, _)| h != handle);
        let removed = listeners.len() != before;
        if removed {
            tracing::debug!("{} removed", handle);
        }
        removed
    }

    /// Remove every listener
    pub fn clear_listeners(&self) {
        self.listeners.write().clear();
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Subscribe to events through a broadcast channel
    pub fn subscribe(&self) -> broadcast::Receiver<SerialEvent> {
        self.tx.subscribe()
    }

    /// Get number of active channel subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish an event to all listeners, then to channel subscribers
    ///
    /// Returns the number of listeners whose callback completed.
    pub fn publish(&self, event: SerialEvent) -> usize {
        let snapshot: Vec<Arc<dyn SerialListener>> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        let mut delivered = 0;
        for listener in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(&event))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    let failure = ConnectionError::ListenerCallback {
                        reason: panic_message(payload.as_ref()),
                    };
                    tracing::error!("{}", failure);
                }
            }
        }

        // Err only means nobody is subscribed to the channel.
        let _ = self.tx.send(event);
        delivered
    }

    /// Publish a data-received event
    pub fn notify_data_received(&self, response: SerialResponse) -> usize {
        self.publish(SerialEvent::DataReceived(response))
    }

    /// Publish an error event
    pub fn notify_error(&self, message: impl Into<String>) -> usize {
        self.publish(SerialEvent::Error(message.into()))
    }

    /// Publish a connected event
    pub fn notify_connected(&self, port_name: impl Into<String>) -> usize {
        self.publish(SerialEvent::Connected(port_name.into()))
    }

    /// Publish a disconnected event
    pub fn notify_disconnected(&self) -> usize {
        self.publish(SerialEvent::Disconnected)
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::default_with_buffer()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "listener panicked".to_string()
    }
}
