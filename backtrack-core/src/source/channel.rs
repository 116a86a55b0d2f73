//! Live source fed by an async producer
//!
//! Network code in the host usually runs on a tokio runtime while the
//! playback engine pulls from its own threads. [`ChannelSource`] joins the
//! two: producers push received byte blocks through a bounded channel and
//! the engine thread blocks on [`LiveSource::read`] until data arrives, the
//! producer finishes, or the source is closed.

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

use super::{LiveSource, SourceError};

/// Creates a connected feeder/source pair with room for `capacity` pending blocks.
pub fn channel_source(capacity: usize) -> (ChannelFeeder, ChannelSource) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let (shutdown, shutdown_rx) = watch::channel(false);

    let feeder = ChannelFeeder {
        sender,
        shutdown: shutdown_rx,
    };
    let source = ChannelSource {
        receiver: Mutex::new(receiver),
        pending: Mutex::new(Bytes::new()),
        shutdown,
    };
    (feeder, source)
}

/// Producer half of a channel source.
///
/// Dropping every feeder ends the stream once pending data is drained.
#[derive(Clone)]
pub struct ChannelFeeder {
    sender: mpsc::Sender<Bytes>,
    shutdown: watch::Receiver<bool>,
}

impl ChannelFeeder {
    /// Pushes one received block, waiting for channel room.
    ///
    /// # Errors
    ///
    /// - `SourceError::Interrupted` - The consuming source was closed
    pub async fn send(&self, data: Bytes) -> Result<(), SourceError> {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            biased;
            _ = shutdown.wait_for(|closed| *closed) => Err(SourceError::Interrupted),
            sent = self.sender.send(data) => sent.map_err(|_| SourceError::Interrupted),
        }
    }

    /// Returns true once the consuming source has been closed.
    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow() || self.sender.is_closed()
    }
}

/// [`LiveSource`] that serves blocks pushed through a [`ChannelFeeder`].
///
/// Blocks larger than the requested length are split; the remainder is
/// served first on the following read. `read` blocks the calling thread
/// and must not be called from inside an async task.
pub struct ChannelSource {
    receiver: Mutex<mpsc::Receiver<Bytes>>,
    pending: Mutex<Bytes>,
    shutdown: watch::Sender<bool>,
}

impl ChannelSource {
    fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }
}

impl LiveSource for ChannelSource {
    fn read(&self, max_len: usize) -> Result<Bytes, SourceError> {
        if max_len == 0 || self.is_closed() {
            return Ok(Bytes::new());
        }

        let mut pending = self.pending.lock();
        if !pending.is_empty() {
            let take = max_len.min(pending.len());
            trace!("Serving {} pending bytes", take);
            return Ok(pending.split_to(take));
        }

        let mut receiver = self.receiver.lock();
        let mut shutdown = self.shutdown.subscribe();
        let received = futures::executor::block_on(async {
            tokio::select! {
                biased;
                _ = shutdown.wait_for(|closed| *closed) => None,
                message = receiver.recv() => Some(message),
            }
        });

        match received {
            None => Err(SourceError::Interrupted),
            Some(None) => {
                debug!("Channel source drained: all feeders dropped");
                Ok(Bytes::new())
            }
            Some(Some(mut data)) => {
                if data.len() > max_len {
                    *pending = data.split_off(max_len);
                }
                Ok(data)
            }
        }
    }

    fn close(&self) {
        if !self.shutdown.send_replace(true) {
            debug!("Channel source closed");
        }
    }
}
