//! Centralized configuration for Backtrack.
//!
//! Values are read once by the host and passed to sessions at construction;
//! nothing in the core re-reads configuration while playing.

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::buffer::BufferConfig;
use crate::source::QualityId;
use crate::tracing_setup::{LogLevel, LoggingConfig};

/// Default quality profile requested when a stream is opened.
pub const DEFAULT_QUALITY: &str = "best";

/// Default number of bytes requested per engine read.
pub const DEFAULT_READ_SIZE: usize = 8192;

/// Central configuration for all Backtrack components.
///
/// Persisted as JSON. Supports environment variable overrides for runtime
/// customization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktrackConfig {
    /// Rewind buffer size and on/off switch
    pub buffer: BufferConfig,
    /// Quality and read size used when opening streams
    pub source: SourceConfig,
    /// Console level and per-run log file
    pub logging: LoggingConfig,
}

/// Stream source selection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Quality profile opened for new streams
    pub default_quality: String,
    /// Bytes requested per pull by hosts driving reads themselves
    pub read_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            default_quality: DEFAULT_QUALITY.to_string(),
            read_size: DEFAULT_READ_SIZE,
        }
    }
}

impl SourceConfig {
    /// Default quality as a typed identifier.
    pub fn default_quality(&self) -> QualityId {
        QualityId::from(self.default_quality.as_str())
    }
}

/// Errors that can occur while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the config file failed.
    #[error("config file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing the configuration failed.
    #[error("config serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Offending field path
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

impl BacktrackConfig {
    /// Loads configuration from `path`, creating it with defaults if missing.
    ///
    /// A file that exists but cannot be parsed is ignored in favor of the
    /// defaults and left untouched.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Io` - The file could not be read or the default file could not be written
    /// - `ConfigError::Serialization` - Defaults could not be serialized
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => Ok(config),
                Err(error) => {
                    warn!(
                        "Failed to parse config {}: {}, using defaults",
                        path.display(),
                        error
                    );
                    Ok(Self::default())
                }
            },
            Err(error) if error.kind() == ErrorKind::NotFound => {
                info!("No config file at {}, creating one", path.display());
                let config = Self::default();
                config.save(path)?;
                Ok(config)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Writes configuration to `path` as pretty JSON.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Io` - The file could not be written
    /// - `ConfigError::Serialization` - The configuration could not be serialized
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Creates configuration with environment variable overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Applies `BACKTRACK_*` environment overrides on top of current values.
    ///
    /// Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(size) = std::env::var("BACKTRACK_BUFFER_SIZE") {
            if let Ok(capacity) = size.parse::<usize>() {
                self.buffer.capacity = capacity;
            }
        }

        if let Ok(enabled) = std::env::var("BACKTRACK_BUFFER_ENABLED") {
            if let Ok(enabled) = enabled.parse::<bool>() {
                self.buffer.enabled = enabled;
            }
        }

        if let Ok(quality) = std::env::var("BACKTRACK_DEFAULT_QUALITY") {
            if !quality.is_empty() {
                self.source.default_quality = quality;
            }
        }

        if let Ok(level) = std::env::var("BACKTRACK_LOG_LEVEL") {
            match level.parse::<LogLevel>() {
                Ok(level) => self.logging.console_level = level,
                Err(error) => warn!("Ignoring BACKTRACK_LOG_LEVEL: {}", error),
            }
        }
    }

    /// Checks values that would make sessions misbehave.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Invalid` - Buffer capacity, read size or default quality is unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer.enabled && self.buffer.capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "buffer.capacity",
                reason: "must be at least 1 when buffering is enabled".to_string(),
            });
        }

        if self.source.read_size == 0 {
            return Err(ConfigError::Invalid {
                field: "source.read_size",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.source.default_quality.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "source.default_quality",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}
