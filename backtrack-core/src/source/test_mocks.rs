//! Scripted sources and resolvers for unit tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;

use super::{LiveSource, OpenError, QualityId, SourceError, SourceResolver};

/// Source that replays a fixed script of reads.
pub(crate) struct ScriptedSource {
    script: Mutex<VecDeque<Result<Bytes, SourceError>>>,
    reads: AtomicUsize,
    closes: AtomicUsize,
}

impl ScriptedSource {
    pub(crate) fn new(chunks: &[&'static [u8]]) -> Self {
        Self {
            script: Mutex::new(
                chunks
                    .iter()
                    .map(|chunk| Ok(Bytes::from_static(chunk)))
                    .collect(),
            ),
            reads: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }

    pub(crate) fn push_error(&self, error: SourceError) {
        self.script.lock().push_back(Err(error));
    }

    pub(crate) fn read_count(&self) -> usize {
        self.reads.load(Ordering::Acquire)
    }

    pub(crate) fn close_count(&self) -> usize {
        self.closes.load(Ordering::Acquire)
    }
}

impl LiveSource for ScriptedSource {
    fn read(&self, max_len: usize) -> Result<Bytes, SourceError> {
        self.reads.fetch_add(1, Ordering::AcqRel);
        match self.script.lock().pop_front() {
            Some(Ok(mut data)) => Ok(data.split_to(max_len.min(data.len()))),
            Some(Err(error)) => Err(error),
            None => Ok(Bytes::new()),
        }
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::AcqRel);
    }
}

/// Resolver serving scripted sources per quality for a single URL.
pub(crate) struct ScriptedResolver {
    url: String,
    scripts: BTreeMap<QualityId, Vec<&'static [u8]>>,
    failing: Vec<QualityId>,
    opened: Mutex<Vec<(QualityId, Arc<ScriptedSource>)>>,
}

impl ScriptedResolver {
    pub(crate) fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            scripts: BTreeMap::new(),
            failing: Vec::new(),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_quality(mut self, quality: &str, chunks: &[&'static [u8]]) -> Self {
        self.scripts.insert(QualityId::from(quality), chunks.to_vec());
        self
    }

    pub(crate) fn with_failing_quality(mut self, quality: &str) -> Self {
        self.scripts.insert(QualityId::from(quality), Vec::new());
        self.failing.push(QualityId::from(quality));
        self
    }

    pub(crate) fn opened(&self) -> Vec<(QualityId, Arc<ScriptedSource>)> {
        self.opened.lock().clone()
    }

    pub(crate) fn last_opened(&self) -> Arc<ScriptedSource> {
        let opened = self.opened.lock();
        let (_, source) = opened.last().expect("no source opened yet");
        Arc::clone(source)
    }
}

impl SourceResolver for ScriptedResolver {
    fn qualities(&self, url: &str) -> Result<Vec<QualityId>, OpenError> {
        if url != self.url {
            return Err(OpenError::UnsupportedSource {
                url: url.to_string(),
            });
        }
        if self.scripts.is_empty() {
            return Err(OpenError::NothingAvailable {
                url: url.to_string(),
            });
        }
        Ok(self.scripts.keys().rev().cloned().collect())
    }

    fn open(&self, url: &str, quality: &QualityId) -> Result<Arc<dyn LiveSource>, OpenError> {
        if url != self.url {
            return Err(OpenError::UnsupportedSource {
                url: url.to_string(),
            });
        }
        if self.failing.contains(quality) {
            return Err(OpenError::Failed {
                reason: format!("scripted failure for {quality}"),
            });
        }
        let Some(chunks) = self.scripts.get(quality) else {
            return Err(OpenError::QualityMissing {
                quality: quality.clone(),
            });
        };

        let source = Arc::new(ScriptedSource::new(chunks));
        self.opened
            .lock()
            .push((quality.clone(), Arc::clone(&source)));
        Ok(source)
    }
}
