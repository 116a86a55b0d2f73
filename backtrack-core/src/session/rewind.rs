//! Rewind session: replay of a buffer snapshot with approximate seeking

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{MediaSession, Notifier, SessionError, SessionKind, UNKNOWN_LENGTH};
use crate::buffer::BufferSnapshot;

/// Payload served once the replay has run past its last chunk.
///
/// A rewind session never reports end of stream, so the engine stays
/// seekable after playing the whole snapshot.
pub const FILLER: &[u8; 2] = &[0, 0];

/// Maps an engine seek offset to a new chunk cursor.
///
/// The engine expresses `offset` as a fraction of [`UNKNOWN_LENGTH`]. The
/// fraction is applied to the *current* cursor, not to the snapshot
/// length, so seeking can only move back towards the start. The result is
/// clamped to `[0, len]`.
pub fn scale_cursor(offset: u64, current: usize, len: usize) -> usize {
    let fraction = offset as f64 / UNKNOWN_LENGTH as f64;
    let target = (fraction * current as f64).round();
    (target.max(0.0) as usize).min(len)
}

#[derive(Debug, Default)]
struct RewindCursor {
    /// Index of the next chunk to deliver
    index: usize,
    /// Bytes of the chunk at `index` already delivered
    offset: usize,
}

/// Independent replay session over an immutable chunk snapshot.
///
/// Never touches the network and shares nothing with the live session it
/// was taken from. Its cursor is only contended by concurrent engine calls
/// on the same handle.
pub struct RewindSession {
    snapshot: BufferSnapshot,
    cursor: Mutex<RewindCursor>,
    on_seek: Option<Notifier>,
}

impl RewindSession {
    /// Creates a replay session positioned at the first chunk.
    pub fn new(snapshot: BufferSnapshot) -> Self {
        Self {
            snapshot,
            cursor: Mutex::new(RewindCursor::default()),
            on_seek: None,
        }
    }

    /// Registers the callback fired after every seek.
    ///
    /// Hosts use it to reset their "user is dragging the scrubber" state.
    pub fn with_seek_notifier(mut self, notifier: Notifier) -> Self {
        self.on_seek = Some(notifier);
        self
    }

    /// Index of the next chunk to be read.
    pub fn cursor(&self) -> usize {
        self.cursor.lock().index
    }

    /// Number of chunks in the snapshot.
    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    /// Returns true if the snapshot holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// Returns true once every chunk has been delivered.
    pub fn is_exhausted(&self) -> bool {
        self.cursor() >= self.snapshot.len()
    }

    /// The replayed snapshot.
    pub fn snapshot(&self) -> &BufferSnapshot {
        &self.snapshot
    }
}

impl MediaSession for RewindSession {
    fn open(&self) -> Result<(), SessionError> {
        debug!("Engine opened rewind session ({} chunks)", self.snapshot.len());
        Ok(())
    }

    fn read(&self, max_len: usize) -> Bytes {
        if max_len == 0 {
            return Bytes::new();
        }

        let mut cursor = self.cursor.lock();
        while let Some(chunk) = self.snapshot.get(cursor.index) {
            let remaining = chunk.as_bytes().slice(cursor.offset..);
            if remaining.is_empty() {
                cursor.index += 1;
                cursor.offset = 0;
                continue;
            }

            if remaining.len() <= max_len {
                cursor.index += 1;
                cursor.offset = 0;
                return remaining;
            }

            cursor.offset += max_len;
            return remaining.slice(..max_len);
        }

        trace!("Rewind exhausted at chunk {}, serving filler", cursor.index);
        Bytes::from_static(&FILLER[..FILLER.len().min(max_len)])
    }

    fn seek(&self, offset: u64) -> Result<(), SessionError> {
        let (from, to) = {
            let mut cursor = self.cursor.lock();
            let from = cursor.index;
            let to = scale_cursor(offset, from, self.snapshot.len());
            cursor.index = to;
            cursor.offset = 0;
            (from, to)
        };

        debug!("Rewind seek to {}: chunk {} -> {}", offset, from, to);
        if let Some(on_seek) = &self.on_seek {
            on_seek();
        }
        Ok(())
    }

    fn close(&self) {
        debug!("Closed rewind session at chunk {}", self.cursor());
    }

    fn kind(&self) -> SessionKind {
        SessionKind::Rewind
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use proptest::prelude::*;

    use super::*;
    use crate::buffer::{BufferConfig, Chunk, StreamBuffer};

    fn snapshot_of(chunks: &[&'static [u8]]) -> BufferSnapshot {
        BufferSnapshot::new(chunks.iter().map(|chunk| Chunk::from(*chunk)).collect())
    }

    #[test]
    fn test_replays_buffer_then_serves_filler() {
        let buffer = StreamBuffer::new(BufferConfig::with_capacity(3));
        let arrivals: [&'static [u8]; 4] = [b"A", b"B", b"C", b"D"];
        for chunk in arrivals {
            buffer.append(Chunk::from(chunk));
        }

        let session = RewindSession::new(buffer.snapshot());
        session.open().unwrap();

        assert_eq!(session.read(64), Bytes::from_static(b"B"));
        assert_eq!(session.read(64), Bytes::from_static(b"C"));
        assert_eq!(session.read(64), Bytes::from_static(b"D"));
        for _ in 0..5 {
            let data = session.read(64);
            assert_eq!(data.as_ref(), FILLER);
        }
        assert!(session.is_exhausted());
        assert_eq!(session.cursor(), 3);
    }

    #[test]
    fn test_empty_snapshot_serves_filler() {
        let session = RewindSession::new(BufferSnapshot::default());
        assert!(session.is_empty());
        assert_eq!(session.read(16).len(), 2);
        assert_eq!(session.read(1).len(), 1);
        assert!(session.read(0).is_empty());
    }

    #[test]
    fn test_large_chunk_split_across_reads() {
        let session = RewindSession::new(snapshot_of(&[b"abcdef", b"gh"]));

        assert_eq!(session.read(4), Bytes::from_static(b"abcd"));
        assert_eq!(session.cursor(), 0);
        assert_eq!(session.read(4), Bytes::from_static(b"ef"));
        assert_eq!(session.cursor(), 1);
        assert_eq!(session.read(4), Bytes::from_static(b"gh"));
        assert_eq!(session.read(4).as_ref(), FILLER);
    }

    #[test]
    fn test_empty_chunks_are_skipped() {
        let session = RewindSession::new(snapshot_of(&[b"", b"x", b""]));
        assert_eq!(session.read(8), Bytes::from_static(b"x"));
        assert_eq!(session.read(8).as_ref(), FILLER);
    }

    #[test]
    fn test_seek_moves_back_towards_start() {
        let session = RewindSession::new(snapshot_of(&[b"0", b"1", b"2", b"3", b"4", b"5"]));
        for _ in 0..4 {
            session.read(8);
        }
        assert_eq!(session.cursor(), 4);

        session.seek(UNKNOWN_LENGTH).unwrap();
        let after_full = session.cursor();
        assert!(after_full <= 4);

        session.seek(UNKNOWN_LENGTH / 2).unwrap();
        let after_half = session.cursor();
        assert!(after_half <= after_full);

        session.seek(0).unwrap();
        assert!(session.cursor() <= after_half);
        assert_eq!(session.read(8), Bytes::from_static(b"0"));
    }

    #[test]
    fn test_seek_resets_partial_chunk() {
        let session = RewindSession::new(snapshot_of(&[b"abcdef", b"gh"]));
        session.read(2);
        session.seek(UNKNOWN_LENGTH).unwrap();
        assert_eq!(session.read(16), Bytes::from_static(b"abcdef"));
    }

    #[test]
    fn test_seek_fires_notifier_every_time() {
        let fired = Arc::new(AtomicUsize::new(0));
        let session = {
            let fired = Arc::clone(&fired);
            RewindSession::new(snapshot_of(&[b"a", b"b"])).with_seek_notifier(Arc::new(
                move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                },
            ))
        };

        session.seek(0).unwrap();
        session.seek(UNKNOWN_LENGTH).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_close_is_idempotent_noop() {
        let session = RewindSession::new(snapshot_of(&[b"a"]));
        session.close();
        session.close();
        assert_eq!(session.kind(), SessionKind::Rewind);
        assert_eq!(session.read(8), Bytes::from_static(b"a"));
    }

    proptest! {
        #[test]
        fn prop_scaled_cursor_stays_in_range(offset in any::<u64>(), len in 0usize..10_000, position in 0usize..10_000) {
            let current = position.min(len);
            let target = scale_cursor(offset, current, len);
            prop_assert!(target <= len);
            prop_assert!(target <= current);
        }

        #[test]
        fn prop_scaled_cursor_is_monotonic(a in any::<u64>(), b in any::<u64>(), current in 0usize..10_000) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(scale_cursor(low, current, current) <= scale_cursor(high, current, current));
        }

        #[test]
        fn prop_session_seek_never_leaves_snapshot(offset in any::<u64>(), reads in 0usize..12) {
            let session = RewindSession::new(snapshot_of(&[b"a", b"b", b"c", b"d"]));
            for _ in 0..reads {
                session.read(8);
            }
            session.seek(offset).unwrap();
            prop_assert!(session.cursor() <= session.len());
        }
    }
}
