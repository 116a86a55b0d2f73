//! In-memory resolver serving simulated channels

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use backtrack_core::{LiveSource, OpenError, QualityId, SourceResolver};
use parking_lot::Mutex;
use tracing::debug;

use crate::source::{SimulatedSource, SourceProfile};

#[derive(Debug, Clone)]
enum QualityEntry {
    Profile(SourceProfile),
    Broken(String),
}

#[derive(Debug, Clone)]
enum Channel {
    Live(BTreeMap<QualityId, QualityEntry>),
    Offline,
}

/// Source opened by a [`SimulatedResolver`], kept for inspection.
#[derive(Clone)]
pub struct OpenedSource {
    /// Channel URL
    pub url: String,
    /// Quality it was opened at
    pub quality: QualityId,
    /// The source handed to the session
    pub source: Arc<SimulatedSource>,
}

/// Resolver for a fixed set of simulated channels.
///
/// URLs it does not know are unsupported. Offline channels advertise
/// nothing. Broken qualities are advertised but fail to open.
#[derive(Default)]
pub struct SimulatedResolver {
    channels: HashMap<String, Channel>,
    opened: Mutex<Vec<OpenedSource>>,
}

impl SimulatedResolver {
    /// Creates a resolver that knows no channels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a live channel at `url` with one profile per quality.
    pub fn with_channel<Q>(
        mut self,
        url: impl Into<String>,
        qualities: impl IntoIterator<Item = (Q, SourceProfile)>,
    ) -> Self
    where
        Q: Into<QualityId>,
    {
        let entries = qualities
            .into_iter()
            .map(|(quality, profile)| (quality.into(), QualityEntry::Profile(profile)))
            .collect();
        self.channels.insert(url.into(), Channel::Live(entries));
        self
    }

    /// Adds a channel at `url` that is known but not broadcasting.
    pub fn with_offline_channel(mut self, url: impl Into<String>) -> Self {
        self.channels.insert(url.into(), Channel::Offline);
        self
    }

    /// Advertises `quality` on the live channel at `url` but fails to open it.
    ///
    /// A channel that does not exist yet is created live.
    pub fn with_broken_quality(
        mut self,
        url: impl Into<String>,
        quality: impl Into<QualityId>,
        reason: impl Into<String>,
    ) -> Self {
        let channel = self
            .channels
            .entry(url.into())
            .or_insert_with(|| Channel::Live(BTreeMap::new()));
        if let Channel::Live(entries) = channel {
            entries.insert(quality.into(), QualityEntry::Broken(reason.into()));
        }
        self
    }

    /// Every source opened so far, oldest first.
    pub fn opened_sources(&self) -> Vec<OpenedSource> {
        self.opened.lock().clone()
    }

    /// Most recently opened source, if any.
    pub fn last_opened(&self) -> Option<Arc<SimulatedSource>> {
        self.opened
            .lock()
            .last()
            .map(|opened| Arc::clone(&opened.source))
    }

    fn live_channel(&self, url: &str) -> Result<&BTreeMap<QualityId, QualityEntry>, OpenError> {
        match self.channels.get(url) {
            Some(Channel::Live(entries)) if !entries.is_empty() => Ok(entries),
            Some(_) => Err(OpenError::NothingAvailable {
                url: url.to_string(),
            }),
            None => Err(OpenError::UnsupportedSource {
                url: url.to_string(),
            }),
        }
    }
}

impl SourceResolver for SimulatedResolver {
    fn qualities(&self, url: &str) -> Result<Vec<QualityId>, OpenError> {
        Ok(self.live_channel(url)?.keys().cloned().collect())
    }

    fn open(&self, url: &str, quality: &QualityId) -> Result<Arc<dyn LiveSource>, OpenError> {
        let entries = self.live_channel(url)?;
        let profile = match entries.get(quality) {
            Some(QualityEntry::Profile(profile)) => profile.clone(),
            Some(QualityEntry::Broken(reason)) => {
                return Err(OpenError::Failed {
                    reason: reason.clone(),
                });
            }
            None => {
                return Err(OpenError::QualityMissing {
                    quality: quality.clone(),
                });
            }
        };

        let source = Arc::new(SimulatedSource::new(profile));
        self.opened.lock().push(OpenedSource {
            url: url.to_string(),
            quality: quality.clone(),
            source: Arc::clone(&source),
        });
        debug!("Opened simulated source for {} at {}", url, quality);

        Ok(source)
    }
}
