//! Blocking instrument sessions over pluggable transports.
//!
//! A [`Session`] is the long-lived handle applications hold for one
//! instrument: it owns one transport channel, carries the mutable I/O
//! configuration (timeouts, termination character, segment sizes) and builds
//! the write/read/query surface on the framed reader. The
//! [`ResourceManager`] opens sessions and enumerates resources through a
//! shared backend.

pub mod error;
pub mod events;
pub mod kind;
pub mod manager;
pub mod serial;
pub mod session;
pub mod settings;
pub mod status;

#[cfg(test)]
pub(crate) mod testkit;

pub use error::{Result, SessionError};
pub use events::{SrqEvent, SrqHandler};
pub use kind::SessionKind;
pub use manager::ResourceManager;
pub use serial::{SerialFlowControl, SerialParity, SerialSession, SerialStopBits};
pub use session::{Session, MAX_ERROR_QUEUE_DRAIN, WORKING_BUFFER_SIZE};
pub use settings::Settings;
pub use status::StatusByte;

use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
