use visakit_transport::TransportError;

/// Errors that can occur while assembling a message from bounded receives.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The requested read does not fit the caller's working buffer.
    #[error("read request of {requested} bytes exceeds working buffer capacity {capacity}")]
    RequestTooLarge { requested: usize, capacity: usize },

    /// Channel-level failure from the transport.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
