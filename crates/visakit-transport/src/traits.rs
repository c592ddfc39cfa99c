use crate::attr::{Attr, AttrValue};
use crate::error::Result;

/// Outcome of a single bounded receive, as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxStatus {
    /// The transport saw the end of the message (or the instrument stopped
    /// sending) within this receive.
    Complete,
    /// The caller's buffer filled up before the end of the message, or the
    /// transport knows more bytes are queued.
    MoreData,
}

impl RxStatus {
    /// True when the transport indicated more response data is pending.
    pub fn more_data(self) -> bool {
        matches!(self, RxStatus::MoreData)
    }
}

/// Callback invoked by a transport when the instrument raises a service
/// request. Fired from the transport's own delivery context, never while a
/// session-level lock is held.
pub type SrqCallback = Box<dyn FnMut() + Send>;

/// One open channel to an instrument.
///
/// This is the narrow contract every backend implements: one blocking send,
/// one blocking receive-with-timeout, attribute access, a status-byte read,
/// and a single service-request handler slot. A transport is owned by exactly
/// one session; `close` must be idempotent.
pub trait Transport: Send {
    /// The resource name this channel was opened against.
    fn resource_name(&self) -> &str;

    /// Blocking send of the whole buffer. Returns the byte count written.
    fn send(&mut self, data: &[u8]) -> Result<usize>;

    /// Blocking receive of up to `buf.len()` bytes, honoring the channel
    /// timeout. Returns the byte count read and whether more data is pending.
    fn receive(&mut self, buf: &mut [u8]) -> Result<(usize, RxStatus)>;

    /// Read a channel attribute.
    fn get_attribute(&mut self, attr: Attr) -> Result<AttrValue>;

    /// Write a channel attribute.
    fn set_attribute(&mut self, attr: Attr, value: AttrValue) -> Result<()>;

    /// Read the one-byte device status register.
    fn read_status_byte(&mut self) -> Result<u8>;

    /// Install the service-request handler. A transport holds at most one;
    /// installing replaces any previous handler.
    fn install_srq_handler(&mut self, handler: SrqCallback) -> Result<()>;

    /// Remove the installed service-request handler, if any.
    fn uninstall_srq_handler(&mut self) -> Result<()>;

    /// Device clear.
    fn clear(&mut self) -> Result<()>;

    /// Release the channel. Safe to call more than once; only the first call
    /// tears anything down.
    fn close(&mut self) -> Result<()>;
}

impl std::fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("resource", &self.resource_name())
            .finish_non_exhaustive()
    }
}

/// Factory and directory for a family of transports.
///
/// `open` plays the connector role; `find` is the resource-directory
/// capability (enumerate resource identifiers matching a search expression —
/// duplicates allowed, order not guaranteed).
pub trait TransportBackend: Send + Sync {
    /// Short backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Open a channel against a resource name.
    fn open(&self, resource: &str) -> Result<Box<dyn Transport>>;

    /// Enumerate resource identifiers matching `pattern`.
    fn find(&self, pattern: &str) -> Result<Vec<String>>;
}
