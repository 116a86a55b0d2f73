//! Logging setup for hosts embedding Backtrack
//!
//! Engine callbacks arrive on the player's own threads. The optional file
//! log therefore records thread names and ids next to every event, at
//! trace level, while the console only shows the configured level.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// File name of the per-run log, replaced on every start.
pub const LOG_FILE_NAME: &str = "backtrack-last-run.log";

/// Verbosity of console output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Failures only
    Error,
    /// Failures and recoverable problems such as dropped source reads
    Warn,
    /// Session lifecycle: opens, quality switches, rewinds, closes
    #[default]
    Info,
    /// Buffer snapshots, engine opens and refused seeks
    Debug,
    /// Every chunk read, buffered and evicted
    Trace,
}

impl LogLevel {
    /// Equivalent `tracing` level.
    ///
    /// # Examples
    /// ```
    /// use backtrack_core::tracing_setup::LogLevel;
    ///
    /// assert_eq!(LogLevel::Warn.as_tracing_level(), tracing::Level::WARN);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }

    fn name(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        [
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ]
        .into_iter()
        .find(|level| level.name().eq_ignore_ascii_case(value.trim()))
        .ok_or_else(|| format!("unknown log level '{value}'"))
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Logging section of the host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Console verbosity; `RUST_LOG` takes precedence when set
    pub console_level: LogLevel,
    /// Directory for the per-run trace log; `None` logs to the console only
    pub logs_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_level: LogLevel::Info,
            logs_dir: Some(PathBuf::from("logs")),
        }
    }
}

impl LoggingConfig {
    /// Console-only logging at `level`.
    pub fn console_only(level: LogLevel) -> Self {
        Self {
            console_level: level,
            logs_dir: None,
        }
    }

    /// Path of the per-run log file, if file logging is enabled.
    pub fn log_file_path(&self) -> Option<PathBuf> {
        self.logs_dir.as_deref().map(|dir| dir.join(LOG_FILE_NAME))
    }
}

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    /// The log directory or file could not be created.
    #[error("cannot create log file {path}: {source}")]
    LogFile {
        /// File that could not be created
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },

    /// Another global subscriber was installed first.
    #[error("tracing already initialized: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Installs the global subscriber described by `config`.
///
/// Returns the path of the per-run log file when file logging is enabled.
///
/// # Errors
///
/// - `TracingError::LogFile` - The logs directory or file could not be created
/// - `TracingError::AlreadyInitialized` - A global subscriber is already set
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<PathBuf>, TracingError> {
    let console_level = LevelFilter::from_level(config.console_level.as_tracing_level());
    let console_filter = EnvFilter::builder()
        .with_default_directive(console_level.into())
        .from_env_lossy();
    let console_layer = fmt::layer()
        .with_target(true)
        .compact()
        .with_filter(console_filter);

    let log_file_path = config.log_file_path();
    let file_layer = match &log_file_path {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(create_log_file(path)?)
                .with_filter(LevelFilter::TRACE),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    match &log_file_path {
        Some(path) => tracing::info!(
            "Logging at {} to console, full trace in {}",
            config.console_level,
            path.display()
        ),
        None => tracing::info!("Logging at {} to console", config.console_level),
    }

    Ok(log_file_path)
}

fn create_log_file(path: &Path) -> Result<File, TracingError> {
    let to_error = |source| TracingError::LogFile {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(to_error)?;
    }
    File::create(path).map_err(to_error)
}
