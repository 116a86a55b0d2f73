//! Counters describing how a rewind window has been used

use std::fmt;
use std::time::{Duration, Instant};

/// Usage counters of one [`StreamBuffer`](super::StreamBuffer).
///
/// Updated under the buffer lock, so a copy is always internally
/// consistent with the chunks buffered at that moment.
#[derive(Debug, Clone)]
pub struct BufferStats {
    /// Configured capacity in chunks
    pub capacity: usize,
    /// Chunks appended over the buffer's lifetime
    pub chunks_appended: u64,
    /// Bytes appended over the buffer's lifetime
    pub bytes_appended: u64,
    /// Chunks pushed out by newer ones
    pub chunks_evicted: u64,
    /// Chunks dropped by `clear`
    pub chunks_cleared: u64,
    /// Number of `clear` calls
    pub clear_count: u64,
    /// Number of snapshots handed to rewind sessions
    pub snapshots_taken: u64,
    /// Chunks currently held for rewind
    pub chunks_buffered: usize,
    /// Bytes currently held for rewind
    pub bytes_buffered: u64,
    /// Largest `bytes_buffered` seen
    pub peak_bytes_buffered: u64,
    /// When the most recent chunk arrived
    pub last_append: Option<Instant>,
}

impl BufferStats {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            chunks_appended: 0,
            bytes_appended: 0,
            chunks_evicted: 0,
            chunks_cleared: 0,
            clear_count: 0,
            snapshots_taken: 0,
            chunks_buffered: 0,
            bytes_buffered: 0,
            peak_bytes_buffered: 0,
            last_append: None,
        }
    }

    /// Mean size of appended chunks, `None` before the first append.
    pub fn average_chunk_size(&self) -> Option<f64> {
        (self.chunks_appended > 0)
            .then(|| self.bytes_appended as f64 / self.chunks_appended as f64)
    }

    /// Buffered chunks as a fraction of capacity, in `[0, 1]`.
    pub fn fill_ratio(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        (self.chunks_buffered as f64 / self.capacity as f64).min(1.0)
    }

    /// Returns true once the next append will evict.
    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.chunks_buffered >= self.capacity
    }

    /// Time since the most recent append.
    pub fn since_last_append(&self) -> Option<Duration> {
        self.last_append.map(|at| at.elapsed())
    }

    pub(crate) fn on_append(&mut self, size: u64) {
        self.chunks_appended += 1;
        self.bytes_appended += size;
        self.chunks_buffered += 1;
        self.bytes_buffered += size;
        self.peak_bytes_buffered = self.peak_bytes_buffered.max(self.bytes_buffered);
        self.last_append = Some(Instant::now());
    }

    pub(crate) fn on_evict(&mut self, size: u64) {
        self.chunks_evicted += 1;
        self.chunks_buffered = self.chunks_buffered.saturating_sub(1);
        self.bytes_buffered = self.bytes_buffered.saturating_sub(size);
    }

    pub(crate) fn on_clear(&mut self) {
        self.clear_count += 1;
        self.chunks_cleared += self.chunks_buffered as u64;
        self.chunks_buffered = 0;
        self.bytes_buffered = 0;
    }

    pub(crate) fn on_snapshot(&mut self) {
        self.snapshots_taken += 1;
    }
}

impl fmt::Display for BufferStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} chunks ({:.0}%), {:.1} KiB buffered (peak {:.1} KiB), {} evicted, {} cleared, {} snapshots",
            self.chunks_buffered,
            self.capacity,
            self.fill_ratio() * 100.0,
            self.bytes_buffered as f64 / 1024.0,
            self.peak_bytes_buffered as f64 / 1024.0,
            self.chunks_evicted,
            self.chunks_cleared,
            self.snapshots_taken
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_stats() {
        let stats = BufferStats::new(10);

        assert_eq!(stats.average_chunk_size(), None);
        assert_eq!(stats.fill_ratio(), 0.0);
        assert!(!stats.is_full());
        assert!(stats.since_last_append().is_none());
    }

    #[test]
    fn test_append_and_evict_track_window() {
        let mut stats = BufferStats::new(2);
        stats.on_append(1000);
        stats.on_append(3000);
        assert!(stats.is_full());

        stats.on_append(500);
        stats.on_evict(1000);

        assert_eq!(stats.chunks_buffered, 2);
        assert_eq!(stats.bytes_buffered, 3500);
        assert_eq!(stats.peak_bytes_buffered, 4500);
        assert_eq!(stats.average_chunk_size(), Some(1500.0));
        assert!(stats.since_last_append().is_some());
    }

    #[test]
    fn test_clear_counts_dropped_chunks() {
        let mut stats = BufferStats::new(8);
        stats.on_append(10);
        stats.on_append(10);

        stats.on_clear();
        stats.on_clear();

        assert_eq!(stats.clear_count, 2);
        assert_eq!(stats.chunks_cleared, 2);
        assert_eq!(stats.bytes_buffered, 0);
        assert_eq!(stats.peak_bytes_buffered, 20);
    }

    #[test]
    fn test_zero_capacity_is_never_full() {
        let mut stats = BufferStats::new(0);
        stats.on_append(1);

        assert_eq!(stats.fill_ratio(), 0.0);
        assert!(!stats.is_full());
    }

    #[test]
    fn test_display() {
        let mut stats = BufferStats::new(4);
        stats.on_append(2048);
        stats.on_snapshot();

        let summary = stats.to_string();
        assert!(summary.starts_with("1/4 chunks (25%)"));
        assert!(summary.contains("2.0 KiB buffered"));
        assert!(summary.ends_with("1 snapshots"));
    }
}
