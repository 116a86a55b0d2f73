//! Live session: network source in, engine reads out, buffer on the side

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{MediaSession, Notifier, RewindSession, SessionError, SessionKind};
use crate::buffer::{BufferConfig, BufferSnapshot, BufferStats, Chunk, StreamBuffer};
use crate::source::{LiveSource, OpenError, QualityId, SourceResolver};

/// Stream URL plus the quality profile to open it at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTarget {
    /// Stream page or playlist URL understood by the resolver
    pub url: String,
    /// Initial quality profile
    pub quality: QualityId,
}

impl StreamTarget {
    /// Creates a target for `url` at `quality`.
    pub fn new(url: impl Into<String>, quality: impl Into<QualityId>) -> Self {
        Self {
            url: url.into(),
            quality: quality.into(),
        }
    }
}

/// Lifecycle of a live session.
///
/// `Closed` is terminal and reachable from every state. `Ended` is entered
/// on the first empty read from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveState {
    /// Source opened, engine has not opened the media yet
    ///
    /// Reads are accepted here and count as an implicit open: the first
    /// chunk moves the session straight to `Reading`, an empty first read
    /// to `Ended`.
    Created,
    /// Engine opened the media
    Open,
    /// At least one chunk delivered
    Reading,
    /// Source reported no more data
    Ended,
    /// Session closed; every read returns nothing
    Closed,
}

struct LiveControl {
    state: LiveState,
    quality: QualityId,
    qualities: Vec<QualityId>,
    end_notified: bool,
}

/// Session feeding the playback engine from a live network source.
///
/// Every chunk handed to the engine is also appended to the session's
/// [`StreamBuffer`] (unless buffering is disabled), from which
/// [`LiveSession::rewind`] builds independent replay sessions.
///
/// Reads and quality switches are serialized by one lock. The closed flag
/// lives outside it so that `close` from another thread is observed by an
/// in-flight read without waiting for it.
pub struct LiveSession {
    url: String,
    resolver: Arc<dyn SourceResolver>,
    /// Held for the duration of a source read or a quality switch
    io: Mutex<()>,
    /// Short-held state; never held across source calls or callbacks
    control: Mutex<LiveControl>,
    /// Current source; taken exactly once by `close`
    source: Mutex<Option<Arc<dyn LiveSource>>>,
    closed: AtomicBool,
    buffer: StreamBuffer,
    on_end: Option<Notifier>,
}

impl LiveSession {
    /// Resolves `target` and opens its source.
    ///
    /// # Errors
    ///
    /// - `OpenError::UnsupportedSource` - The resolver does not handle the URL
    /// - `OpenError::NothingAvailable` - Nothing is being broadcast right now
    /// - `OpenError::QualityMissing` - The requested quality is not advertised
    /// - `OpenError::Failed` - The source could not be opened
    pub fn connect(
        resolver: Arc<dyn SourceResolver>,
        target: StreamTarget,
        config: &BufferConfig,
    ) -> Result<Self, OpenError> {
        let mut qualities = resolver.qualities(&target.url)?;
        qualities.sort();
        qualities.dedup();

        if !qualities.contains(&target.quality) {
            return Err(OpenError::QualityMissing {
                quality: target.quality,
            });
        }

        let source = resolver.open(&target.url, &target.quality)?;

        info!(
            "Opened live session for {} at {} ({} qualities, buffer {} chunks{})",
            target.url,
            target.quality,
            qualities.len(),
            config.capacity,
            if config.enabled { "" } else { ", disabled" }
        );

        Ok(Self {
            url: target.url,
            resolver,
            io: Mutex::new(()),
            control: Mutex::new(LiveControl {
                state: LiveState::Created,
                quality: target.quality,
                qualities,
                end_notified: false,
            }),
            source: Mutex::new(Some(source)),
            closed: AtomicBool::new(false),
            buffer: StreamBuffer::new(config.clone()),
            on_end: None,
        })
    }

    /// Registers the callback fired once when the source runs dry.
    pub fn with_end_notifier(mut self, notifier: Notifier) -> Self {
        self.on_end = Some(notifier);
        self
    }

    /// URL this session was opened for.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LiveState {
        if self.is_closed() {
            return LiveState::Closed;
        }
        self.control.lock().state
    }

    /// Quality profile currently playing.
    pub fn quality(&self) -> QualityId {
        self.control.lock().quality.clone()
    }

    /// Every advertised profile identifier, sorted.
    pub fn quality_options(&self) -> Vec<QualityId> {
        self.control.lock().qualities.clone()
    }

    /// Advertised concrete profiles, sorted, without aliases like `best`.
    pub fn selectable_qualities(&self) -> Vec<QualityId> {
        self.control
            .lock()
            .qualities
            .iter()
            .filter(|quality| !quality.is_alias())
            .cloned()
            .collect()
    }

    /// Number of chunks currently retained for rewind.
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Statistics of the rewind buffer.
    pub fn buffer_stats(&self) -> BufferStats {
        self.buffer.stats()
    }

    /// Copies the current rewind buffer.
    pub fn snapshot(&self) -> BufferSnapshot {
        self.buffer.snapshot()
    }

    /// Builds an independent replay session from the current buffer.
    pub fn rewind(&self) -> RewindSession {
        let snapshot = self.buffer.snapshot();
        info!(
            "Rewinding {}: {} chunks ({} bytes)",
            self.url,
            snapshot.len(),
            snapshot.total_bytes()
        );
        RewindSession::new(snapshot)
    }

    /// Switches to another quality profile in place.
    ///
    /// The replacement source is opened before the current one is closed,
    /// so a failure leaves the session playing as before. On success the
    /// rewind buffer is cleared: chunks from different profiles do not
    /// share a byte-to-time ratio.
    ///
    /// # Errors
    ///
    /// - `SessionError::Closed` - The session was closed
    /// - `SessionError::Open` - The profile is unknown or failed to open
    pub fn change_quality(&self, quality: impl Into<QualityId>) -> Result<(), SessionError> {
        let quality = quality.into();
        let _io = self.io.lock();

        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        if !self.control.lock().qualities.contains(&quality) {
            return Err(OpenError::QualityMissing { quality }.into());
        }

        let replacement = self.resolver.open(&self.url, &quality)?;

        let previous = {
            let mut slot = self.source.lock();
            if self.is_closed() {
                drop(slot);
                replacement.close();
                return Err(SessionError::Closed);
            }
            slot.replace(replacement)
        };
        if let Some(previous) = previous {
            previous.close();
        }

        let from = {
            let mut control = self.control.lock();
            if control.state == LiveState::Ended {
                control.state = LiveState::Open;
            }
            std::mem::replace(&mut control.quality, quality)
        };
        self.buffer.clear();

        info!(
            "Switched {} from {} to {}",
            self.url,
            from,
            self.control.lock().quality
        );
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn current_source(&self) -> Option<Arc<dyn LiveSource>> {
        self.source.lock().clone()
    }

    /// Moves to `Ended`. Must run under `io` so a quality switch sees it.
    ///
    /// Returns true the first time the stream ends.
    fn mark_ended(&self) -> bool {
        let mut control = self.control.lock();
        control.state = LiveState::Ended;
        !std::mem::replace(&mut control.end_notified, true)
    }

    fn notify_end(&self) {
        info!("Live stream {} ended", self.url);
        if let Some(on_end) = &self.on_end {
            on_end();
        }
    }
}

impl MediaSession for LiveSession {
    fn open(&self) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        let mut control = self.control.lock();
        if control.state == LiveState::Created {
            control.state = LiveState::Open;
            debug!("Engine opened live session {}", self.url);
        }
        Ok(())
    }

    fn read(&self, max_len: usize) -> Bytes {
        if max_len == 0 || self.is_closed() {
            return Bytes::new();
        }

        let io = self.io.lock();
        if self.is_closed() {
            return Bytes::new();
        }
        if matches!(
            self.control.lock().state,
            LiveState::Ended | LiveState::Closed
        ) {
            return Bytes::new();
        }
        let Some(source) = self.current_source() else {
            return Bytes::new();
        };

        let result = source.read(max_len);

        if self.is_closed() {
            debug!("Discarding read on {}: closed during read", self.url);
            return Bytes::new();
        }

        let data = match result {
            Ok(data) => data,
            Err(error) => {
                warn!("Source read failed on {}: {}", self.url, error);
                Bytes::new()
            }
        };

        if data.is_empty() {
            let first = self.mark_ended();
            drop(io);
            if first {
                self.notify_end();
            }
            return Bytes::new();
        }

        let data = if data.len() > max_len {
            warn!(
                "Source returned {} bytes for a {} byte request, truncating",
                data.len(),
                max_len
            );
            data.slice(..max_len)
        } else {
            data
        };

        {
            let mut control = self.control.lock();
            if control.state == LiveState::Created {
                debug!("First read on {} before engine open", self.url);
            }
            control.state = LiveState::Reading;
        }
        self.buffer.append(Chunk::new(data.clone()));
        data
    }

    fn seek(&self, offset: u64) -> Result<(), SessionError> {
        debug!("Rejected seek to {} on live session {}", offset, self.url);
        Err(SessionError::SeekUnsupported)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("Live session {} already closed", self.url);
            return;
        }

        let source = self.source.lock().take();
        if let Some(source) = source {
            source.close();
        }
        self.control.lock().state = LiveState::Closed;

        info!("Closed live session {}: {}", self.url, self.buffer.stats());
    }

    fn kind(&self) -> SessionKind {
        SessionKind::Live
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.close();
    }
}
