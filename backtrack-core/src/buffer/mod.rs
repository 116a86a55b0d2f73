//! Bounded chunk buffer for live stream rewind
//!
//! Records the most recent chunks read from a live source so that a
//! rewind session can later replay them. Chunks are kept exactly as the
//! source delivered them and evicted strictly oldest-first.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub use self::snapshot::BufferSnapshot;
pub use self::stats::BufferStats;
pub use self::stream_buffer::StreamBuffer;

mod snapshot;
mod stats;
mod stream_buffer;

/// Default number of chunks retained for rewind.
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// One unit of stream data as delivered by a single source read.
///
/// Chunks are never mutated, merged or split once created. Cloning is
/// cheap: the underlying bytes are reference counted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chunk(Bytes);

impl Chunk {
    /// Wraps received bytes as a chunk.
    pub fn new(data: Bytes) -> Self {
        Self(data)
    }

    /// Number of bytes in this chunk.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the chunk carries no data.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the chunk contents.
    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    /// Consumes the chunk, returning its bytes.
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<Bytes> for Chunk {
    fn from(data: Bytes) -> Self {
        Self(data)
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(data: Vec<u8>) -> Self {
        Self(Bytes::from(data))
    }
}

impl From<&'static [u8]> for Chunk {
    fn from(data: &'static [u8]) -> Self {
        Self(Bytes::from_static(data))
    }
}

impl AsRef<[u8]> for Chunk {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Configuration for stream buffer behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Maximum number of chunks retained (not bytes)
    pub capacity: usize,

    /// Whether live reads are recorded at all
    ///
    /// Disabling this only removes rewind availability; live playback is
    /// unaffected.
    pub enabled: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUFFER_CAPACITY,
            enabled: true,
        }
    }
}

impl BufferConfig {
    /// Creates an enabled configuration with the given chunk capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            enabled: true,
        }
    }

    /// Creates a configuration that records nothing.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}
