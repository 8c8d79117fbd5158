use crate::config::{LogFormat, LogLevel, LoggingConfig};
use crate::logging::{LogError, build_filter, init};
use tempfile::tempdir;

#[test]
fn test_filter_accepts_extra_directives() {
    let config = LoggingConfig {
        level: LogLevel::Warn,
        filter: Some("promptvc::versioning=debug".to_string()),
        ..LoggingConfig::default()
    };
    assert!(build_filter(&config).is_ok());
}

#[test]
fn test_filter_rejects_bad_directives() {
    // RUST_LOG wins over the configured filter when it is set.
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }

    let config = LoggingConfig {
        filter: Some("promptvc=loud".to_string()),
        ..LoggingConfig::default()
    };
    assert!(matches!(
        build_filter(&config),
        Err(LogError::InvalidFilter(_))
    ));
}

#[test]
fn test_init_to_file_creates_parent_and_tolerates_reinit() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("logs").join("promptvc.log");

    let config = LoggingConfig {
        level: LogLevel::Debug,
        format: LogFormat::Json,
        filter: None,
        file: Some(log_path.clone()),
        stdout: false,
    };

    let first = init(&config).unwrap();
    assert!(log_path.parent().unwrap().exists());

    let second = init(&LoggingConfig::default()).unwrap();
    drop(second);
    drop(first);
}
