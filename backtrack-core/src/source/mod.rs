//! Network source boundary
//!
//! A live session never talks to the network directly. It pulls bytes
//! through [`LiveSource`] and obtains sources from a [`SourceResolver`],
//! which turns a stream URL and a quality profile into an open byte source.
//! Timeouts, retries and backoff belong to implementations of these traits.

pub mod channel;

#[cfg(test)]
pub(crate) mod test_mocks;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use channel::{ChannelFeeder, ChannelSource, channel_source};

/// Pull-based byte source for one live stream at one quality.
pub trait LiveSource: Send + Sync {
    /// Reads up to `max_len` bytes.
    ///
    /// May block while waiting for the network. An empty result means no
    /// more data is currently or ever available.
    ///
    /// # Errors
    ///
    /// - `SourceError::Io` - Transport failed
    /// - `SourceError::Interrupted` - The source was closed during the read
    /// - `SourceError::Protocol` - The stream protocol reported a fault
    fn read(&self, max_len: usize) -> Result<Bytes, SourceError>;

    /// Releases the source. Must unblock any in-flight `read`.
    fn close(&self);
}

/// Resolves stream URLs to quality profiles and opens sources for them.
pub trait SourceResolver: Send + Sync {
    /// Lists the quality profiles advertised for `url`.
    ///
    /// # Errors
    ///
    /// - `OpenError::UnsupportedSource` - No plugin handles this URL
    /// - `OpenError::NothingAvailable` - The stream is currently offline
    /// - `OpenError::Failed` - Resolution failed for another reason
    fn qualities(&self, url: &str) -> Result<Vec<QualityId>, OpenError>;

    /// Opens a byte source for `url` at `quality`.
    ///
    /// # Errors
    ///
    /// - `OpenError::QualityMissing` - The profile is not advertised
    /// - `OpenError::NothingAvailable` - The stream went offline
    /// - `OpenError::Failed` - The source could not be opened
    fn open(&self, url: &str, quality: &QualityId) -> Result<Arc<dyn LiveSource>, OpenError>;
}

/// Identifier of an encoding profile advertised by a stream (e.g. `720p60`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualityId(String);

impl QualityId {
    /// Wraps a profile name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Profile name as advertised.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for named aliases such as `best` or `worst`.
    ///
    /// Concrete profiles start with a digit (`360p`, `1080p60`).
    pub fn is_alias(&self) -> bool {
        self.0.chars().next().is_some_and(char::is_alphabetic)
    }
}

impl fmt::Display for QualityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QualityId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for QualityId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Errors that can occur while reading from an open source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport-level failure.
    #[error("source I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The source was closed while a read was waiting.
    #[error("source read interrupted by close")]
    Interrupted,

    /// The stream protocol reported a fault.
    #[error("stream protocol error: {reason}")]
    Protocol {
        /// Description of the protocol fault
        reason: String,
    },
}

/// Broad failure category reported to hosts when a source cannot be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenErrorCategory {
    /// The URL is not recognized by any resolver
    UnsupportedSource,
    /// Transient: nothing is being broadcast right now
    NothingAvailable,
    /// The requested or default quality is not offered
    QualityMissing,
    /// Any other failure
    Other,
}

/// Errors that can occur when resolving or opening a source.
#[derive(Debug, Error)]
pub enum OpenError {
    /// No resolver supports this URL.
    #[error("unsupported stream source: {url}")]
    UnsupportedSource {
        /// The URL that was rejected
        url: String,
    },

    /// The stream exists but nothing is currently available.
    #[error("no streams currently available at {url}")]
    NothingAvailable {
        /// The URL that was queried
        url: String,
    },

    /// The requested quality profile is not advertised.
    #[error("quality {quality} not available")]
    QualityMissing {
        /// The missing profile
        quality: QualityId,
    },

    /// Generic open failure.
    #[error("failed to open source: {reason}")]
    Failed {
        /// Description of the failure
        reason: String,
    },
}

impl OpenError {
    /// Returns the host-facing category of this error.
    pub fn category(&self) -> OpenErrorCategory {
        match self {
            OpenError::UnsupportedSource { .. } => OpenErrorCategory::UnsupportedSource,
            OpenError::NothingAvailable { .. } => OpenErrorCategory::NothingAvailable,
            OpenError::QualityMissing { .. } => OpenErrorCategory::QualityMissing,
            OpenError::Failed { .. } => OpenErrorCategory::Other,
        }
    }

    /// Returns true if retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, OpenError::NothingAvailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_alias_detection() {
        assert!(QualityId::from("best").is_alias());
        assert!(QualityId::from("worst").is_alias());
        assert!(QualityId::from("audio_only").is_alias());
        assert!(!QualityId::from("720p60").is_alias());
        assert!(!QualityId::from("160p").is_alias());
        assert!(!QualityId::from("").is_alias());
    }

    #[test]
    fn test_quality_ordering_is_lexical() {
        let mut qualities: Vec<QualityId> = ["worst", "720p", "160p", "best", "1080p60"]
            .into_iter()
            .map(QualityId::from)
            .collect();
        qualities.sort();

        let names: Vec<&str> = qualities.iter().map(QualityId::as_str).collect();
        assert_eq!(names, vec!["1080p60", "160p", "720p", "best", "worst"]);
    }

    #[test]
    fn test_open_error_categories() {
        let unsupported = OpenError::UnsupportedSource {
            url: "ftp://x".to_string(),
        };
        let offline = OpenError::NothingAvailable {
            url: "https://example.tv/a".to_string(),
        };
        let missing = OpenError::QualityMissing {
            quality: QualityId::from("best"),
        };
        let failed = OpenError::Failed {
            reason: "boom".to_string(),
        };

        assert_eq!(unsupported.category(), OpenErrorCategory::UnsupportedSource);
        assert_eq!(offline.category(), OpenErrorCategory::NothingAvailable);
        assert_eq!(missing.category(), OpenErrorCategory::QualityMissing);
        assert_eq!(failed.category(), OpenErrorCategory::Other);
        assert!(offline.is_transient());
        assert!(!failed.is_transient());
    }

    #[test]
    fn test_quality_serializes_as_plain_string() {
        let json = serde_json::to_string(&QualityId::from("480p")).unwrap();
        assert_eq!(json, "\"480p\"");
    }
}
