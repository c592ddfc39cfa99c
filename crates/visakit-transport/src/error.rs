use crate::attr::Attr;

/// Errors that can occur in instrument transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A blocking operation exceeded the channel's configured timeout.
    #[error("timeout occurred, timeout is set to {timeout_ms} ms")]
    Timeout { timeout_ms: u32 },

    /// No resource matched the given name or search expression.
    #[error("resource '{resource}' was not found")]
    ResourceNotFound { resource: String },

    /// The resource name does not follow a form this transport understands.
    #[error("resource name '{resource}' is invalid: {reason}")]
    InvalidResourceName { resource: String, reason: String },

    /// The transport does not implement the requested attribute.
    #[error("attribute {attr:?} is not supported by this transport")]
    UnsupportedAttribute { attr: Attr },

    /// The transport does not implement the requested operation.
    #[error("operation '{operation}' is not supported by this transport")]
    Unsupported { operation: &'static str },

    /// The channel to the instrument dropped mid-operation.
    #[error("connection lost: {detail}")]
    ConnectionLost { detail: String },

    /// An I/O error occurred on the underlying channel.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other channel-level failure, with the transport's own description.
    #[error("transport failure: {detail}")]
    Failure { detail: String },
}

pub type Result<T> = std::result::Result<T, TransportError>;
