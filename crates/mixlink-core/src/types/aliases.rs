//! Type aliases for commonly used shared-state types.
//!
//! The serial link shares a handful of structures between the caller thread
//! and the transport's reader thread; these aliases name the wrappers once.
//! `parking_lot` locks are used throughout: they do not poison, so a panicking
//! listener cannot wedge the link.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// A thread-safe, mutex-protected wrapper for cross-thread sharing.
///
/// # Example
/// ```rust,ignore
/// let buffer: ThreadSafe<InboundBuffer> = thread_safe(InboundBuffer::new());
/// buffer.lock().clear();
/// ```
pub type ThreadSafe<T> = Arc<Mutex<T>>;

/// A thread-safe vector guarded by a reader-writer lock.
///
/// Used for the listener set: every event reads it, registration writes it.
pub type ThreadSafeRwVec<T> = Arc<RwLock<Vec<T>>>;

/// Create a new `ThreadSafe<T>` from a value.
#[inline]
pub fn thread_safe<T>(value: T) -> ThreadSafe<T> {
    Arc::new(Mutex::new(value))
}

/// Create a new empty `ThreadSafeRwVec<T>`.
#[inline]
pub fn thread_safe_rw_vec<T>() -> ThreadSafeRwVec<T> {
    Arc::new(RwLock::new(Vec::new()))
}
