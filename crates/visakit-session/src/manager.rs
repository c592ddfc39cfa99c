use std::sync::Arc;

use tracing::debug;
use visakit_transport::{SocketBackend, TransportBackend, TransportError};

use crate::error::{Result, SessionError};

/// Entry point for opening sessions and enumerating resources.
///
/// Holds one backend handle shared by every session opened from it. Cheap to
/// clone; clones share the backend.
#[derive(Clone)]
pub struct ResourceManager {
    backend: Arc<dyn TransportBackend>,
}

impl ResourceManager {
    /// Resource manager over an explicit backend.
    pub fn new(backend: Arc<dyn TransportBackend>) -> Self {
        Self { backend }
    }

    /// Resource manager over the built-in direct socket I/O backend.
    pub fn socket_io() -> Self {
        Self::new(Arc::new(SocketBackend::new()))
    }

    pub(crate) fn backend(&self) -> &Arc<dyn TransportBackend> {
        &self.backend
    }

    /// Short name of the underlying backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Enumerate resource identifiers matching `expression` (e.g. `?*`).
    ///
    /// Duplicates reported by the backend are collapsed, first occurrence
    /// wins. A backend answering "no resource found" yields an empty set
    /// rather than an error.
    pub fn find_resources(&self, expression: &str) -> Result<Vec<String>> {
        match self.backend.find(expression) {
            Ok(found) => {
                let mut distinct: Vec<String> = Vec::with_capacity(found.len());
                for resource in found {
                    if !distinct.contains(&resource) {
                        distinct.push(resource);
                    }
                }
                debug!(expression, count = distinct.len(), "enumerated resources");
                Ok(distinct)
            }
            Err(TransportError::ResourceNotFound { .. }) => Ok(Vec::new()),
            Err(err) => Err(SessionError::from_transport(
                expression,
                "find resources",
                err,
            )),
        }
    }
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("backend", &self.backend.name())
            .finish()
    }
}
