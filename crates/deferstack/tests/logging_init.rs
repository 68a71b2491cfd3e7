//! Global subscriber installation. Kept in its own test binary because the
//! subscriber can only be installed once per process.

use deferstack::logging::{LogConfig, LogError, LogFormat, init_logging, is_logging_initialized};
use deferstack::{DeferConfig, DeferStack};
use std::rc::Rc;

#[test]
fn init_logging_installs_once_and_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("deferstack.log");
    let config = LogConfig {
        level: "trace".to_string(),
        format: LogFormat::Json,
        file: Some(path.clone()),
    };

    assert!(!is_logging_initialized());
    init_logging(&config).unwrap();
    assert!(is_logging_initialized());

    let stack = Rc::new(DeferStack::with_config(DeferConfig::with_capacity(1)).unwrap());
    let inner = Rc::clone(&stack);
    stack
        .schedule(move || {
            inner.schedule(|| Ok(()))?;
            Ok(())
        })
        .unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("Logging initialized"));
    assert!(contents.contains("deferring callback"));
    for line in contents.lines().filter(|l| !l.trim().is_empty()) {
        serde_json::from_str::<serde_json::Value>(line).unwrap();
    }

    let err = init_logging(&LogConfig::default()).unwrap_err();
    assert!(matches!(err, LogError::AlreadyInitialized));
}

#[test]
fn invalid_level_is_rejected_before_install() {
    let config = LogConfig {
        level: "deferstack=chatty".to_string(),
        ..LogConfig::default()
    };
    // Either this test runs first and the level is rejected, or the other
    // test already installed the subscriber.
    match init_logging(&config).unwrap_err() {
        LogError::InvalidLevel(level) => assert_eq!(level, "deferstack=chatty"),
        LogError::AlreadyInitialized => {}
        other => panic!("unexpected error: {other}"),
    }
}
