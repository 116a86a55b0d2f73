//! FIFO-evicting chunk store backing live rewind

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{BufferConfig, BufferSnapshot, BufferStats, Chunk};

/// Bounded, ordered store of the most recent chunks read from a live source.
///
/// Capacity is counted in chunks, not bytes. Appending beyond capacity
/// evicts from the head until the buffer is back at capacity; access never
/// reorders chunks. Append, eviction, clear and snapshot all run under one
/// lock so a snapshot never observes a half-applied append.
pub struct StreamBuffer {
    /// Chunk sequence and statistics, guarded together
    inner: Mutex<BufferInner>,

    /// Configuration for buffer behavior
    config: BufferConfig,
}

struct BufferInner {
    chunks: VecDeque<Chunk>,
    stats: BufferStats,
}

impl StreamBuffer {
    /// Creates an empty buffer with the given configuration
    pub fn new(config: BufferConfig) -> Self {
        let initial = if config.enabled {
            config.capacity.min(1024)
        } else {
            0
        };

        Self {
            inner: Mutex::new(BufferInner {
                chunks: VecDeque::with_capacity(initial),
                stats: BufferStats::new(config.capacity),
            }),
            config,
        }
    }

    /// Appends a chunk at the tail, evicting the oldest chunks beyond capacity.
    ///
    /// No-op when buffering is disabled.
    pub fn append(&self, chunk: Chunk) {
        if !self.config.enabled {
            return;
        }

        let chunk_size = chunk.len() as u64;
        let mut inner = self.inner.lock();

        inner.chunks.push_back(chunk);
        inner.stats.on_append(chunk_size);

        while inner.chunks.len() > self.config.capacity {
            let Some(evicted) = inner.chunks.pop_front() else {
                break;
            };
            inner.stats.on_evict(evicted.len() as u64);
            trace!("Evicted chunk ({} bytes)", evicted.len());
        }

        trace!(
            "Buffered chunk ({} bytes), total: {}/{} chunks",
            chunk_size,
            inner.chunks.len(),
            self.config.capacity
        );
    }

    /// Drops every buffered chunk. Safe to call repeatedly.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.chunks.len();
        inner.chunks.clear();
        inner.stats.on_clear();

        debug!("Cleared stream buffer ({} chunks dropped)", dropped);
    }

    /// Returns an independently owned copy of the current chunk sequence.
    pub fn snapshot(&self) -> BufferSnapshot {
        let mut inner = self.inner.lock();
        let chunks: Vec<Chunk> = inner.chunks.iter().cloned().collect();
        inner.stats.on_snapshot();

        debug!(
            "Took buffer snapshot: {} chunks, {} bytes",
            chunks.len(),
            inner.stats.bytes_buffered
        );
        BufferSnapshot::new(chunks)
    }

    /// Current number of buffered chunks
    pub fn len(&self) -> usize {
        self.inner.lock().chunks.len()
    }

    /// Returns true if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.inner.lock().chunks.is_empty()
    }

    /// Total bytes across buffered chunks
    pub fn total_bytes(&self) -> u64 {
        self.inner.lock().stats.bytes_buffered
    }

    /// Maximum number of chunks retained
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Whether appends are recorded
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Returns a copy of current statistics
    pub fn stats(&self) -> BufferStats {
        self.inner.lock().stats.clone()
    }
}

impl std::fmt::Debug for StreamBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("StreamBuffer")
            .field("len", &inner.chunks.len())
            .field("bytes", &inner.stats.bytes_buffered)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use proptest::prelude::*;

    use super::*;

    fn chunk(tag: u8) -> Chunk {
        Chunk::from(vec![tag; 4])
    }

    #[test]
    fn test_append_within_capacity() {
        let buffer = StreamBuffer::new(BufferConfig::with_capacity(3));

        buffer.append(chunk(1));
        buffer.append(chunk(2));

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.total_bytes(), 8);
        assert_eq!(buffer.snapshot().chunks(), &[chunk(1), chunk(2)]);
    }

    #[test]
    fn test_append_evicts_oldest() {
        let buffer = StreamBuffer::new(BufferConfig::with_capacity(3));

        for tag in [b'A', b'B', b'C', b'D'] {
            buffer.append(chunk(tag));
        }

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.chunks(), &[chunk(b'B'), chunk(b'C'), chunk(b'D')]);

        let stats = buffer.stats();
        assert_eq!(stats.chunks_appended, 4);
        assert_eq!(stats.chunks_evicted, 1);
        assert_eq!(stats.chunks_buffered, 3);
    }

    #[test]
    fn test_chunk_boundaries_preserved() {
        let buffer = StreamBuffer::new(BufferConfig::with_capacity(8));
        buffer.append(Chunk::from(vec![1u8]));
        buffer.append(Chunk::from(vec![2u8, 3, 4]));
        buffer.append(Chunk::from(vec![5u8, 6]));

        let lengths: Vec<usize> = buffer.snapshot().chunks().iter().map(Chunk::len).collect();
        assert_eq!(lengths, vec![1, 3, 2]);
    }

    #[test]
    fn test_disabled_buffer_ignores_appends() {
        let buffer = StreamBuffer::new(BufferConfig::disabled());

        buffer.append(chunk(1));

        assert!(buffer.is_empty());
        assert!(!buffer.is_enabled());
        assert!(buffer.snapshot().is_empty());
        assert_eq!(buffer.stats().chunks_appended, 0);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let buffer = StreamBuffer::new(BufferConfig::with_capacity(4));
        buffer.append(chunk(1));
        buffer.append(chunk(2));

        buffer.clear();
        buffer.clear();

        assert!(buffer.is_empty());
        assert_eq!(buffer.total_bytes(), 0);
        assert_eq!(buffer.stats().clear_count, 2);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let buffer = StreamBuffer::new(BufferConfig::with_capacity(2));
        buffer.append(chunk(1));
        buffer.append(chunk(2));

        let snapshot = buffer.snapshot();
        buffer.append(chunk(3));
        buffer.clear();

        assert_eq!(snapshot.chunks(), &[chunk(1), chunk(2)]);
        assert_eq!(buffer.stats().snapshots_taken, 1);
    }

    #[test]
    fn test_concurrent_snapshots_are_never_torn() {
        let buffer = Arc::new(StreamBuffer::new(BufferConfig::with_capacity(16)));

        let writer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for sequence in 0u32..2000 {
                    buffer.append(Chunk::from(sequence.to_be_bytes().to_vec()));
                }
            })
        };

        for _ in 0..200 {
            let snapshot = buffer.snapshot();
            assert!(snapshot.len() <= 16);
            let sequences: Vec<u32> = snapshot
                .chunks()
                .iter()
                .map(|chunk| {
                    let mut raw = [0u8; 4];
                    raw.copy_from_slice(chunk.as_ref());
                    u32::from_be_bytes(raw)
                })
                .collect();
            assert!(sequences.windows(2).all(|pair| pair[1] == pair[0] + 1));
        }

        writer.join().unwrap();
        assert_eq!(buffer.len(), 16);
    }

    proptest! {
        #[test]
        fn prop_buffer_keeps_last_capacity_chunks(capacity in 1usize..32, extra in 0usize..64) {
            let buffer = StreamBuffer::new(BufferConfig::with_capacity(capacity));
            let total = capacity + extra;
            let appended: Vec<Chunk> = (0..total)
                .map(|index| Chunk::from((index as u32).to_le_bytes().to_vec()))
                .collect();

            for chunk in &appended {
                buffer.append(chunk.clone());
            }

            let snapshot = buffer.snapshot();
            prop_assert_eq!(snapshot.chunks(), &appended[total - capacity..]);
        }

        #[test]
        fn prop_length_never_exceeds_capacity(capacity in 1usize..16, count in 0usize..64) {
            let buffer = StreamBuffer::new(BufferConfig::with_capacity(capacity));
            for index in 0..count {
                buffer.append(Chunk::from(vec![index as u8]));
                prop_assert!(buffer.len() <= capacity);
            }
            prop_assert_eq!(buffer.len(), count.min(capacity));
        }
    }
}
