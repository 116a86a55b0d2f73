//! Global subscriber installation; kept in its own test binary

use backtrack_core::tracing_setup::LOG_FILE_NAME;
use backtrack_core::{LogLevel, LoggingConfig, TracingError, init_tracing};

#[test]
fn test_init_tracing_writes_trace_file_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = LoggingConfig {
        console_level: LogLevel::Warn,
        logs_dir: Some(dir.path().join("logs")),
    };

    let path = init_tracing(&config).unwrap().unwrap();
    assert_eq!(path, dir.path().join("logs").join(LOG_FILE_NAME));

    tracing::trace!(target: "backtrack_core::tests", "chunk trace marker");
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("chunk trace marker"));

    let second = init_tracing(&LoggingConfig::console_only(LogLevel::Info));
    assert!(matches!(second, Err(TracingError::AlreadyInitialized(_))));
}
