//! Immutable point-in-time copy of a stream buffer

use super::Chunk;

/// Independently owned copy of the buffered chunk sequence.
///
/// Later appends, evictions or clears on the originating buffer never
/// affect a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferSnapshot {
    chunks: Vec<Chunk>,
}

impl BufferSnapshot {
    /// Creates a snapshot from an already ordered chunk list.
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    /// Number of chunks in the snapshot.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns true if the snapshot holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Sum of all chunk lengths.
    pub fn total_bytes(&self) -> u64 {
        self.chunks.iter().map(|chunk| chunk.len() as u64).sum()
    }

    /// Chunks in arrival order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Chunk at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }
}

impl From<Vec<Chunk>> for BufferSnapshot {
    fn from(chunks: Vec<Chunk>) -> Self {
        Self::new(chunks)
    }
}
