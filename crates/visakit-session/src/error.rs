use visakit_frame::FrameError;
use visakit_transport::{Attr, TransportError};

/// Session-level errors.
///
/// Every variant carries the originating resource name and the short label of
/// the failing operation, so a message is always attributable without extra
/// context.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A blocking call exceeded the configured channel timeout. Recoverable;
    /// the message carries the configured value for diagnosis.
    #[error("{resource}: {operation}: timeout occurred, timeout is set to {timeout_ms} ms")]
    Timeout {
        resource: String,
        operation: &'static str,
        timeout_ms: u32,
    },

    /// The resource does not exist. Fatal per open attempt, never retried.
    #[error("{resource}: {operation}: given resource name is invalid or does not exist")]
    ResourceNotFound {
        resource: String,
        operation: &'static str,
    },

    /// The resource name is malformed for the selected backend.
    #[error("{resource}: {operation}: {reason}")]
    InvalidResourceName {
        resource: String,
        operation: &'static str,
        reason: String,
    },

    /// The transport does not implement the attribute. Soft during optional
    /// capability probing — callers may treat this as "feature absent".
    #[error("{resource}: {operation}: attribute {attr:?} is not supported")]
    UnsupportedAttribute {
        resource: String,
        operation: &'static str,
        attr: Attr,
    },

    /// Any other channel failure, with the transport's description text.
    #[error("{resource}: {operation}: {detail}")]
    TransportFailure {
        resource: String,
        operation: &'static str,
        detail: String,
    },
}

pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// Classify a transport status into the session taxonomy, attaching the
    /// resource name and operation label.
    pub(crate) fn from_transport(
        resource: &str,
        operation: &'static str,
        err: TransportError,
    ) -> Self {
        match err {
            TransportError::Timeout { timeout_ms } => SessionError::Timeout {
                resource: resource.to_string(),
                operation,
                timeout_ms,
            },
            TransportError::ResourceNotFound { .. } => SessionError::ResourceNotFound {
                resource: resource.to_string(),
                operation,
            },
            TransportError::InvalidResourceName { reason, .. } => {
                SessionError::InvalidResourceName {
                    resource: resource.to_string(),
                    operation,
                    reason,
                }
            }
            TransportError::UnsupportedAttribute { attr } => SessionError::UnsupportedAttribute {
                resource: resource.to_string(),
                operation,
                attr,
            },
            other => SessionError::TransportFailure {
                resource: resource.to_string(),
                operation,
                detail: other.to_string(),
            },
        }
    }

    pub(crate) fn from_frame(resource: &str, operation: &'static str, err: FrameError) -> Self {
        match err {
            FrameError::Transport(inner) => Self::from_transport(resource, operation, inner),
            other => SessionError::TransportFailure {
                resource: resource.to_string(),
                operation,
                detail: other.to_string(),
            },
        }
    }

    pub(crate) fn failure(
        resource: &str,
        operation: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        SessionError::TransportFailure {
            resource: resource.to_string(),
            operation,
            detail: detail.into(),
        }
    }
}
