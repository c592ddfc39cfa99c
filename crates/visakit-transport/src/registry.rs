use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Opaque identifier for a slot in a [`HandleRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handle {}", self.0)
    }
}

/// Arena of shared transport-state slots keyed by monotonically increasing
/// handles.
///
/// Slots are removed explicitly on close — teardown of the underlying channel
/// is never left to finalization. Handles start at 1 and are never reused
/// within one registry, so a stale handle can only miss, never alias a newer
/// channel.
pub struct HandleRegistry<T> {
    inner: Mutex<RegistryInner<T>>,
}

struct RegistryInner<T> {
    next: u64,
    slots: HashMap<u64, Arc<Mutex<T>>>,
}

impl<T> HandleRegistry<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                next: 1,
                slots: HashMap::new(),
            }),
        }
    }

    /// Store `value` and return a fresh handle for it.
    pub fn insert(&self, value: T) -> Handle {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let id = inner.next;
        inner.next += 1;
        inner.slots.insert(id, Arc::new(Mutex::new(value)));
        Handle(id)
    }

    /// Look up the slot for `handle`.
    pub fn get(&self, handle: Handle) -> Option<Arc<Mutex<T>>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.slots.get(&handle.0).cloned()
    }

    /// Remove the slot for `handle`, returning it if it was still present.
    pub fn remove(&self, handle: Handle) -> Option<Arc<Mutex<T>>> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.slots.remove(&handle.0)
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
