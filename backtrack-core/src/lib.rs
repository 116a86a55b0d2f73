//! Backtrack Core - live stream buffering and rewind for pull-based players
//!
//! This crate lets a host play a continuously produced byte stream through
//! an external playback engine that pulls data via open/read/seek/close
//! callbacks, while retaining a bounded window of recently played chunks
//! from which independent rewind sessions can be started.

pub mod bridge;
pub mod buffer;
pub mod config;
pub mod session;
pub mod source;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use bridge::{CallbackBridge, MediaHandle, OpenReply, STATUS_FAILED, STATUS_OK};
pub use buffer::{BufferConfig, BufferSnapshot, Chunk, StreamBuffer};
pub use config::{BacktrackConfig, ConfigError};
pub use session::{
    LiveSession, LiveState, MediaSession, Notifier, RewindSession, SessionError, SessionKind,
    StreamTarget, UNKNOWN_LENGTH,
};
pub use source::{
    LiveSource, OpenError, OpenErrorCategory, QualityId, SourceError, SourceResolver,
};
pub use tracing_setup::{LogLevel, LoggingConfig, TracingError, init_tracing};

/// Errors that can bubble up from any Backtrack subsystem.
#[derive(Debug, thiserror::Error)]
pub enum BacktrackError {
    #[error("Open error: {0}")]
    Open(#[from] OpenError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging error: {0}")]
    Logging(#[from] TracingError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BacktrackError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            BacktrackError::Open(error) | BacktrackError::Session(SessionError::Open(error)) => {
                match error {
                    OpenError::UnsupportedSource { url } => {
                        format!("This stream address is not supported: {url}")
                    }
                    OpenError::NothingAvailable { .. } => {
                        "The stream is not live right now".to_string()
                    }
                    OpenError::QualityMissing { quality } => {
                        format!("Quality {quality} is not offered by this stream")
                    }
                    OpenError::Failed { .. } => "The stream could not be opened".to_string(),
                }
            }
            BacktrackError::Session(SessionError::Closed) => "The stream was closed".to_string(),
            BacktrackError::Session(SessionError::SeekUnsupported) => {
                "Seeking is only available while rewinding".to_string()
            }
            BacktrackError::Config(_) => "Configuration error occurred".to_string(),
            BacktrackError::Logging(_) => "Logging could not be set up".to_string(),
            BacktrackError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            BacktrackError::Config(ConfigError::Invalid { .. })
                | BacktrackError::Open(OpenError::UnsupportedSource { .. })
                | BacktrackError::Open(OpenError::QualityMissing { .. })
                | BacktrackError::Session(SessionError::Open(OpenError::QualityMissing { .. }))
        )
    }

    /// Host-facing category when the error comes from opening a source.
    pub fn open_category(&self) -> Option<OpenErrorCategory> {
        match self {
            BacktrackError::Open(error) | BacktrackError::Session(SessionError::Open(error)) => {
                Some(error.category())
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BacktrackError>;
