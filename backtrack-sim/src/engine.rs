//! Simulated playback engine driving the callback bridge
//!
//! Behaves like a pull-based media engine: it opens a media handle, reads
//! fixed-size blocks on its own thread until a read returns zero bytes, and
//! closes the handle. Seeks are expressed as a fraction of the reported
//! length, the way a player's scrub bar would issue them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, anyhow};
use backtrack_core::{CallbackBridge, MediaHandle, UNKNOWN_LENGTH};
use tracing::{debug, info};

/// Pull pattern of a [`SimulatedEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bytes requested per read
    pub read_size: usize,
    /// Stop after this many reads even without end of stream
    pub max_reads: Option<usize>,
    /// Pause between reads
    pub read_interval: Duration,
    /// Close the handle when playback stops
    pub close_on_stop: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            read_size: backtrack_core::config::DEFAULT_READ_SIZE,
            max_reads: None,
            read_interval: Duration::ZERO,
            close_on_stop: true,
        }
    }
}

impl EngineConfig {
    /// Config reading at most `max_reads` blocks.
    pub fn bounded(max_reads: usize) -> Self {
        Self {
            max_reads: Some(max_reads),
            ..Self::default()
        }
    }

    /// Sets the block size.
    pub fn with_read_size(mut self, read_size: usize) -> Self {
        self.read_size = read_size;
        self
    }

    /// Sets the pause between reads.
    pub fn with_read_interval(mut self, interval: Duration) -> Self {
        self.read_interval = interval;
        self
    }

    /// Leaves the handle open when playback stops.
    pub fn keep_open(mut self) -> Self {
        self.close_on_stop = false;
        self
    }
}

/// What one playback run observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Whether the open callback succeeded
    pub opened: bool,
    /// Every byte delivered, in order
    pub bytes: Vec<u8>,
    /// Number of read callbacks issued
    pub reads: usize,
    /// Whether a read returned zero bytes
    pub reached_end: bool,
    /// Largest single read result
    pub largest_read: usize,
}

/// Engine that plays media handles registered on a [`CallbackBridge`].
#[derive(Clone)]
pub struct SimulatedEngine {
    bridge: Arc<CallbackBridge>,
    config: EngineConfig,
}

impl SimulatedEngine {
    /// Creates an engine bound to `bridge`.
    pub fn new(bridge: Arc<CallbackBridge>, config: EngineConfig) -> Self {
        Self { bridge, config }
    }

    /// Bridge this engine calls into.
    pub fn bridge(&self) -> &Arc<CallbackBridge> {
        &self.bridge
    }

    /// Plays `handle` on the calling thread.
    ///
    /// # Panics
    ///
    /// Panics if `handle` is not registered on the bridge.
    pub fn run(&self, handle: MediaHandle) -> PlaybackReport {
        self.play(handle, &AtomicBool::new(false))
    }

    /// Plays `handle` on a dedicated engine thread.
    ///
    /// # Errors
    ///
    /// - `anyhow::Error` - The engine thread could not be spawned
    pub fn spawn(&self, handle: MediaHandle) -> anyhow::Result<EngineHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let engine = self.clone();
        let thread_stop = Arc::clone(&stop);

        let join = std::thread::Builder::new()
            .name(format!("sim-engine-{}", handle.as_raw()))
            .spawn(move || engine.play(handle, &thread_stop))
            .context("failed to spawn engine thread")?;

        Ok(EngineHandle { stop, join })
    }

    /// Issues a seek to `fraction` of the reported length.
    ///
    /// Returns the bridge status code.
    ///
    /// # Panics
    ///
    /// Panics if `handle` is not registered on the bridge.
    pub fn scrub(&self, handle: MediaHandle, fraction: f64) -> i32 {
        self.bridge.seek(handle, fraction_to_offset(fraction))
    }

    fn play(&self, handle: MediaHandle, stop: &AtomicBool) -> PlaybackReport {
        let mut report = PlaybackReport::default();

        let reply = self.bridge.open(handle);
        if !reply.is_ok() {
            debug!("Engine could not open {}", handle);
            return report;
        }
        report.opened = true;

        let mut block = vec![0u8; self.config.read_size];
        while !stop.load(Ordering::Acquire) {
            if self
                .config
                .max_reads
                .is_some_and(|max_reads| report.reads >= max_reads)
            {
                break;
            }

            let count = self.bridge.read(handle, &mut block);
            report.reads += 1;
            let count = usize::try_from(count).unwrap_or(0);
            if count == 0 {
                report.reached_end = true;
                break;
            }

            report.largest_read = report.largest_read.max(count);
            report.bytes.extend_from_slice(&block[..count]);

            if !self.config.read_interval.is_zero() {
                std::thread::sleep(self.config.read_interval);
            }
        }

        if self.config.close_on_stop {
            self.bridge.close(handle);
        }

        info!(
            "Engine finished {}: {} bytes in {} reads{}",
            handle,
            report.bytes.len(),
            report.reads,
            if report.reached_end { ", end of stream" } else { "" }
        );
        report
    }
}

/// Engine thread playing one handle.
pub struct EngineHandle {
    stop: Arc<AtomicBool>,
    join: JoinHandle<PlaybackReport>,
}

impl EngineHandle {
    /// Asks the engine to stop after its current read and waits for it.
    ///
    /// # Errors
    ///
    /// - `anyhow::Error` - The engine thread panicked
    pub fn stop(self) -> anyhow::Result<PlaybackReport> {
        self.stop.store(true, Ordering::Release);
        self.join()
    }

    /// Waits for playback to finish on its own.
    ///
    /// # Errors
    ///
    /// - `anyhow::Error` - The engine thread panicked
    pub fn join(self) -> anyhow::Result<PlaybackReport> {
        self.join
            .join()
            .map_err(|_| anyhow!("engine thread panicked"))
    }

    /// Returns true once the engine thread has exited.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Converts a scrub position in `[0, 1]` to the engine's seek offset.
pub fn fraction_to_offset(fraction: f64) -> u64 {
    let fraction = fraction.clamp(0.0, 1.0);
    if fraction >= 1.0 {
        return UNKNOWN_LENGTH;
    }
    (fraction * UNKNOWN_LENGTH as f64) as u64
}
