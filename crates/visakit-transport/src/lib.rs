//! Instrument transport abstraction.
//!
//! Defines the narrow contract every byte transport implements — one blocking
//! send, one blocking receive-with-timeout, attribute access, a status-byte
//! read and a single service-request handler slot — plus the built-in direct
//! socket I/O backend that emulates those primitives over a raw TCP
//! connection.

pub mod attr;
pub mod error;
pub mod registry;
pub mod resource;
pub mod socket;
pub mod traits;

pub use attr::{Attr, AttrValue};
pub use error::{Result, TransportError};
pub use registry::{Handle, HandleRegistry};
pub use resource::SocketResource;
pub use socket::{SocketBackend, SocketTransport, DEFAULT_TIMEOUT_MS};
pub use traits::{RxStatus, SrqCallback, Transport, TransportBackend};
