//! Callback bridge between the external playback engine and sessions
//!
//! The engine registers four entry points (open, read, seek, close) per
//! media item and calls them from its own threads with an opaque handle.
//! The bridge resolves that handle through a [`HandleRegistry`] and turns
//! session results into the engine's return-code conventions: `0` for
//! success, `-1` for failure, a read of `0` bytes for end of stream.

pub mod registry;

use std::sync::Arc;

use tracing::{debug, info, trace};

pub use self::registry::{HandleRegistry, MediaHandle};
pub use crate::session::UNKNOWN_LENGTH;
use crate::session::MediaSession;

/// Return code for a successful open or seek.
pub const STATUS_OK: i32 = 0;

/// Return code for a failed or unsupported open or seek.
pub const STATUS_FAILED: i32 = -1;

/// Result of the engine's open callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenReply {
    /// `STATUS_OK` or `STATUS_FAILED`
    pub status: i32,
    /// Reported stream length; always [`UNKNOWN_LENGTH`]
    pub length: u64,
}

impl OpenReply {
    /// Returns true if the open succeeded.
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Adapter exposing sessions through the engine's pull-based callbacks.
pub struct CallbackBridge {
    registry: HandleRegistry,
}

impl CallbackBridge {
    /// Creates a bridge with an empty registry.
    pub fn new() -> Self {
        Self {
            registry: HandleRegistry::new(),
        }
    }

    /// Registers a session and returns the handle to give the engine.
    pub fn register(&self, session: Arc<dyn MediaSession>) -> MediaHandle {
        let kind = session.kind();
        let handle = self.registry.insert(session);
        info!("Registered {} session as {}", kind, handle);
        handle
    }

    /// Forgets a handle once the host discards its media item.
    ///
    /// The session is closed first; closing is idempotent.
    pub fn unregister(&self, handle: MediaHandle) -> Option<Arc<dyn MediaSession>> {
        let session = self.registry.remove(handle)?;
        session.close();
        debug!("Unregistered {}", handle);
        Some(session)
    }

    /// Number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Engine open callback.
    ///
    /// # Panics
    ///
    /// Panics if `handle` was not issued by this bridge.
    pub fn open(&self, handle: MediaHandle) -> OpenReply {
        let session = self.session(handle);
        let status = match session.open() {
            Ok(()) => STATUS_OK,
            Err(error) => {
                debug!("Open failed on {}: {}", handle, error);
                STATUS_FAILED
            }
        };

        OpenReply {
            status,
            length: UNKNOWN_LENGTH,
        }
    }

    /// Engine read callback: fills `buf` and returns the byte count.
    ///
    /// Never writes more than `buf.len()` bytes. Returns `0` for end of
    /// stream.
    ///
    /// # Panics
    ///
    /// Panics if `handle` was not issued by this bridge.
    pub fn read(&self, handle: MediaHandle, buf: &mut [u8]) -> isize {
        let session = self.session(handle);
        let data = session.read(buf.len());

        let count = data.len().min(buf.len());
        buf[..count].copy_from_slice(&data[..count]);

        trace!("Read {} of {} requested bytes on {}", count, buf.len(), handle);
        count as isize
    }

    /// Engine seek callback.
    ///
    /// # Panics
    ///
    /// Panics if `handle` was not issued by this bridge.
    pub fn seek(&self, handle: MediaHandle, offset: u64) -> i32 {
        let session = self.session(handle);
        match session.seek(offset) {
            Ok(()) => STATUS_OK,
            Err(error) => {
                debug!("Seek to {} refused on {}: {}", offset, handle, error);
                STATUS_FAILED
            }
        }
    }

    /// Engine close callback.
    ///
    /// # Panics
    ///
    /// Panics if `handle` was not issued by this bridge.
    pub fn close(&self, handle: MediaHandle) {
        self.session(handle).close();
    }

    fn session(&self, handle: MediaHandle) -> Arc<dyn MediaSession> {
        match self.registry.resolve(handle) {
            Some(session) => session,
            None => panic!("engine callback for unregistered handle {handle}"),
        }
    }
}

impl Default for CallbackBridge {
    fn default() -> Self {
        Self::new()
    }
}
