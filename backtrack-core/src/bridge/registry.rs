//! Opaque handle registry correlating engine callbacks to sessions

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::session::MediaSession;

/// Opaque key the engine passes back on every callback.
///
/// Handles are never zero and never reused within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaHandle(u64);

impl MediaHandle {
    /// Raw value handed to the engine as its opaque pointer-sized word.
    pub fn as_raw(self) -> u64 {
        self.0
    }

    /// Reconstructs a handle from the engine's opaque word.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media#{}", self.0)
    }
}

/// Map from issued handles to the sessions they address.
pub struct HandleRegistry {
    sessions: RwLock<HashMap<MediaHandle, Arc<dyn MediaSession>>>,
    next_handle: AtomicU64,
}

impl HandleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Registers `session` under a fresh handle.
    pub fn insert(&self, session: Arc<dyn MediaSession>) -> MediaHandle {
        let handle = MediaHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.sessions.write().insert(handle, session);
        handle
    }

    /// Looks up the session behind `handle`.
    pub fn resolve(&self, handle: MediaHandle) -> Option<Arc<dyn MediaSession>> {
        self.sessions.read().get(&handle).cloned()
    }

    /// Forgets `handle`, returning its session.
    pub fn remove(&self, handle: MediaHandle) -> Option<Arc<dyn MediaSession>> {
        self.sessions.write().remove(&handle)
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns true if no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferSnapshot;
    use crate::session::{RewindSession, SessionKind};

    fn session() -> Arc<dyn MediaSession> {
        Arc::new(RewindSession::new(BufferSnapshot::default()))
    }

    #[test]
    fn test_handles_are_unique_and_non_zero() {
        let registry = HandleRegistry::new();
        let first = registry.insert(session());
        let second = registry.insert(session());

        assert_ne!(first, second);
        assert_ne!(first.as_raw(), 0);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_resolve_and_remove() {
        let registry = HandleRegistry::new();
        let handle = registry.insert(session());

        let resolved = registry.resolve(handle).unwrap();
        assert_eq!(resolved.kind(), SessionKind::Rewind);
        assert!(registry.resolve(MediaHandle::from_raw(handle.as_raw() + 100)).is_none());

        assert!(registry.remove(handle).is_some());
        assert!(registry.remove(handle).is_none());
        assert!(registry.resolve(handle).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_handles_not_reused_after_removal() {
        let registry = HandleRegistry::new();
        let handle = registry.insert(session());
        registry.remove(handle);

        let next = registry.insert(session());
        assert_ne!(handle, next);
        assert_eq!(next.to_string(), format!("media#{}", next.as_raw()));
    }
}
