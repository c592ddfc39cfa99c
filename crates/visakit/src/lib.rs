//! Uniform instrument sessions over VISA-style transports.
//!
//! visakit lets application code exchange text and binary messages with
//! laboratory instruments — GPIB, serial, USB, raw TCP sockets,
//! VXI-11/HiSLIP — through one blocking session API. Byte transport is
//! pluggable: a vendor instrument-control library can sit behind the
//! [`transport::Transport`] trait, and the built-in direct socket backend
//! emulates the same primitives over raw TCP.
//!
//! # Crate Structure
//!
//! - [`transport`] — transport abstraction and the direct socket backend
//! - [`frame`] — framed message assembly over bounded receives
//! - [`session`] — sessions, resource manager, status and event layer
//!
//! # Example
//!
//! ```no_run
//! use visakit::session::{ResourceManager, Session, Settings};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ResourceManager::socket_io();
//! let session = Session::open(
//!     &manager,
//!     "TCPIP::192.168.1.100::5025::SOCKET",
//!     Settings::default(),
//! )?;
//!
//! session.write("*CLS")?;
//! let identity = session.query("*IDN?")?;
//! println!("connected to {identity}");
//!
//! session.close()?;
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use visakit_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use visakit_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use visakit_session::*;
}
