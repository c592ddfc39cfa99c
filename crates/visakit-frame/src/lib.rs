//! Framed message assembly over bounded transport receives.
//!
//! Instruments deliver responses in arbitrary-sized chunks; this crate turns
//! repeated bounded receives into one logical message, using the termination
//! character as the primary end-of-message signal. Two strategies:
//!
//! - [`read_bounded`] — one receive into a caller-owned buffer, with at most
//!   one corrective follow-up when the response must end on the terminator
//! - [`read_unbounded`] — a small first probe plus large staging segments for
//!   responses of unknown length
//!
//! No partial-read handling in user code.

pub mod error;
pub mod reader;

pub use error::{FrameError, Result};
pub use reader::{read_bounded, read_unbounded, trim_term_chars, BoundedRead, ReadOptions};
