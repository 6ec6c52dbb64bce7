//! # MixLink Core
//!
//! Core types, traits, and utilities for MixLink.
//! Provides the error taxonomy, the event and listener contract shared by
//! the serial link and its consumers, and the response data model.

pub mod core;
pub mod data;
pub mod error;
pub mod types;

pub use self::core::{
    event::{EventDispatcher, SerialEvent},
    listener::{FnListener, ListenerHandle, SerialListener},
};

pub use data::{ConnectionState, ResponseType, SerialParity, SerialResponse};

pub use error::{ConnectionError, Error, Result};

pub use types::{thread_safe, thread_safe_rw_vec, ThreadSafe, ThreadSafeRwVec};
