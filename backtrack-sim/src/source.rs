//! Deterministic live source with a verifiable byte pattern
//!
//! Every byte served is a function of its absolute stream offset, so tests
//! can check that what reached the engine (or a rewind snapshot) is a
//! contiguous, untorn piece of the stream without keeping a copy of it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use backtrack_core::{LiveSource, SourceError};
use bytes::Bytes;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

/// Longest single sleep while waiting out a read delay.
const DELAY_SLICE: Duration = Duration::from_millis(2);

/// Byte found at absolute stream offset `offset`.
///
/// The pattern repeats every 251 bytes.
pub fn byte_at(offset: u64) -> u8 {
    (offset % 251) as u8
}

/// Bytes a source produces for `len` bytes starting at `start`.
pub fn expected_bytes(start: u64, len: usize) -> Vec<u8> {
    (start..start + len as u64).map(byte_at).collect()
}

/// Returns the starting offset if `data` is a contiguous run of the pattern.
///
/// Offsets are only recoverable modulo the pattern period, so the returned
/// value is in `0..251`.
pub fn pattern_phase(data: &[u8]) -> Option<u64> {
    let first = u64::from(*data.first()?);
    let consistent = data
        .iter()
        .enumerate()
        .all(|(index, &byte)| byte == byte_at(first + index as u64));
    consistent.then_some(first)
}

/// Shape of the stream a [`SimulatedSource`] produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceProfile {
    /// Smallest chunk served per read (before `max_len` truncation)
    pub min_chunk: usize,
    /// Largest chunk served per read
    pub max_chunk: usize,
    /// Bytes until the broadcast ends; `None` streams forever
    pub total_bytes: Option<u64>,
    /// Time each read waits before producing data
    pub read_delay: Duration,
    /// Seed for chunk size selection
    pub seed: u64,
}

impl Default for SourceProfile {
    fn default() -> Self {
        Self {
            min_chunk: 512,
            max_chunk: 4096,
            total_bytes: None,
            read_delay: Duration::ZERO,
            seed: 0x5eed,
        }
    }
}

impl SourceProfile {
    /// Profile for a broadcast that ends after `total_bytes`.
    pub fn finite(total_bytes: u64) -> Self {
        Self {
            total_bytes: Some(total_bytes),
            ..Self::default()
        }
    }

    /// Profile for a broadcast that never ends.
    pub fn endless() -> Self {
        Self::default()
    }

    /// Sets the chunk size range. A zero minimum is raised to one.
    pub fn with_chunk_range(mut self, min_chunk: usize, max_chunk: usize) -> Self {
        self.min_chunk = min_chunk.max(1);
        self.max_chunk = max_chunk.max(self.min_chunk);
        self
    }

    /// Sets the per-read network delay.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Sets the chunk size seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

struct Cursor {
    rng: ChaCha8Rng,
    position: u64,
}

/// Live source serving the [`byte_at`] pattern in seeded, variable chunks.
///
/// Two sources built from the same profile serve identical chunk sequences
/// for identical request sizes.
pub struct SimulatedSource {
    profile: SourceProfile,
    cursor: Mutex<Cursor>,
    closed: AtomicBool,
    fail_on_read: AtomicBool,
    read_count: AtomicU64,
    close_count: AtomicU64,
}

impl SimulatedSource {
    /// Creates a source positioned at offset zero.
    pub fn new(profile: SourceProfile) -> Self {
        let profile = SourceProfile {
            min_chunk: profile.min_chunk.max(1),
            max_chunk: profile.max_chunk.max(profile.min_chunk.max(1)),
            ..profile
        };
        let rng = ChaCha8Rng::seed_from_u64(profile.seed);

        Self {
            profile,
            cursor: Mutex::new(Cursor { rng, position: 0 }),
            closed: AtomicBool::new(false),
            fail_on_read: AtomicBool::new(false),
            read_count: AtomicU64::new(0),
            close_count: AtomicU64::new(0),
        }
    }

    /// Profile this source was built from.
    pub fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    /// Makes the next read fail with a protocol error.
    ///
    /// The failure is cleared after one read attempt.
    pub fn fail_next_read(&self) {
        self.fail_on_read.store(true, Ordering::Release);
    }

    /// Number of read calls, including failed and interrupted ones.
    pub fn read_count(&self) -> u64 {
        self.read_count.load(Ordering::Acquire)
    }

    /// Number of close calls.
    pub fn close_count(&self) -> u64 {
        self.close_count.load(Ordering::Acquire)
    }

    /// Returns true once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Absolute offset of the next byte to serve.
    pub fn bytes_served(&self) -> u64 {
        self.cursor.lock().position
    }

    fn wait_out_delay(&self) -> Result<(), SourceError> {
        let deadline = Instant::now() + self.profile.read_delay;
        loop {
            if self.is_closed() {
                return Err(SourceError::Interrupted);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep((deadline - now).min(DELAY_SLICE));
        }
    }
}

impl LiveSource for SimulatedSource {
    fn read(&self, max_len: usize) -> Result<Bytes, SourceError> {
        self.read_count.fetch_add(1, Ordering::AcqRel);

        if self.is_closed() {
            return Err(SourceError::Interrupted);
        }
        if !self.profile.read_delay.is_zero() {
            self.wait_out_delay()?;
        }
        if self.fail_on_read.swap(false, Ordering::AcqRel) {
            return Err(SourceError::Protocol {
                reason: "simulated segment failure".to_string(),
            });
        }
        if max_len == 0 {
            return Ok(Bytes::new());
        }

        let mut cursor = self.cursor.lock();
        let remaining = self
            .profile
            .total_bytes
            .map(|total| total.saturating_sub(cursor.position));
        if remaining == Some(0) {
            debug!("Simulated broadcast ended at {} bytes", cursor.position);
            return Ok(Bytes::new());
        }

        let mut len = cursor
            .rng
            .random_range(self.profile.min_chunk..=self.profile.max_chunk)
            .min(max_len);
        if let Some(remaining) = remaining {
            len = len.min(usize::try_from(remaining).unwrap_or(usize::MAX));
        }

        let start = cursor.position;
        cursor.position += len as u64;
        trace!("Serving {} bytes at offset {}", len, start);

        Ok(Bytes::from(expected_bytes(start, len)))
    }

    fn close(&self) {
        self.close_count.fetch_add(1, Ordering::AcqRel);
        self.closed.store(true, Ordering::Release);
    }
}
