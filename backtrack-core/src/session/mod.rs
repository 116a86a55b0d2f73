//! Playback sessions served to the external engine
//!
//! A [`LiveSession`] pulls from a network source and records what it reads
//! into a bounded buffer. A [`RewindSession`] replays an immutable snapshot
//! of that buffer with approximate seeking. Both are driven by the engine
//! through the [`MediaSession`] seam.

pub mod live;
pub mod rewind;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

pub use live::{LiveSession, LiveState, StreamTarget};
pub use rewind::{FILLER, RewindSession, scale_cursor};

use crate::source::OpenError;

/// Stream length reported to the engine at open: unknown, unbounded.
///
/// Also the upper end of the engine's seek coordinate space.
pub const UNKNOWN_LENGTH: u64 = u64::MAX;

/// Host callback fired on session events (end of stream, seek).
///
/// Invoked from the engine's thread after session locks are released.
pub type Notifier = Arc<dyn Fn() + Send + Sync>;

/// Operations the playback engine performs against one media item.
pub trait MediaSession: Send + Sync {
    /// Called when the engine opens the media.
    ///
    /// # Errors
    ///
    /// - `SessionError::Closed` - The session was already closed
    fn open(&self) -> Result<(), SessionError>;

    /// Returns up to `max_len` bytes; empty signals end of stream.
    fn read(&self, max_len: usize) -> Bytes;

    /// Repositions playback at `offset` in the engine's coordinate space.
    ///
    /// # Errors
    ///
    /// - `SessionError::SeekUnsupported` - The session cannot seek
    fn seek(&self, offset: u64) -> Result<(), SessionError>;

    /// Releases external resources. Idempotent.
    fn close(&self);

    /// Which kind of session this is.
    fn kind(&self) -> SessionKind;
}

/// Distinguishes live and replay sessions in logs and host code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// Pulls from a network source
    Live,
    /// Replays a buffer snapshot
    Rewind,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Live => write!(f, "live"),
            SessionKind::Rewind => write!(f, "rewind"),
        }
    }
}

/// Errors returned by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Operation attempted on a closed session.
    #[error("session is closed")]
    Closed,

    /// The session does not support seeking.
    #[error("seeking is not supported on this session")]
    SeekUnsupported,

    /// Opening a replacement source failed.
    #[error(transparent)]
    Open(#[from] OpenError),
}
