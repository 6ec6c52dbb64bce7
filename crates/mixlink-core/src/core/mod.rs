//! Listener and event dispatch for the serial link.

pub mod event;
pub mod listener;

pub use event::{EventDispatcher, SerialEvent};
pub use listener::{FnListener, ListenerHandle, SerialListener};
