use chainflow::{EngineConfig, EngineError, FanOutMode, Payload, Worker};
use serde_json::json;
use std::io::Write;
use std::time::Duration;

#[test]
fn test_empty_config_uses_defaults() {
    let config = EngineConfig::from_json(json!({})).unwrap();

    assert_eq!(config, EngineConfig::default());
    assert_eq!(config.logging.level, "info");
    assert!(!config.logging.json);
    assert_eq!(config.worker.shutdown_poll(), Duration::from_millis(5));
    assert_eq!(config.worker.fan_out, FanOutMode::Shared);
}

#[test]
fn test_partial_override() {
    let config = EngineConfig::from_json(json!({
        "logging": {"level": "chainflow=debug", "file": "/tmp/chainflow.log"},
        "worker": {"fan_out": "isolated"}
    }))
    .unwrap();

    assert_eq!(config.logging.level, "chainflow=debug");
    assert_eq!(config.logging.file.as_deref(), Some(std::path::Path::new("/tmp/chainflow.log")));
    assert_eq!(config.worker.fan_out, FanOutMode::Isolated);
    assert_eq!(config.worker.shutdown_poll_ms, 5);
}

#[test]
fn test_zero_poll_is_clamped() {
    let config = EngineConfig::from_json(json!({"worker": {"shutdown_poll_ms": 0}})).unwrap();
    assert_eq!(config.worker.shutdown_poll(), Duration::from_millis(1));
}

#[test]
fn test_invalid_value_is_rejected() {
    let err = EngineConfig::from_json(json!({"worker": {"fan_out": "broadcast"}})).unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
}

#[test]
fn test_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"worker": {{"shutdown_poll_ms": 20, "fan_out": "isolated"}}}}"#).unwrap();

    let config = EngineConfig::from_file(file.path()).unwrap();
    assert_eq!(config.worker.shutdown_poll(), Duration::from_millis(20));

    let worker = Worker::process("configured", |p: Payload| -> anyhow::Result<Payload> { Ok(p) })
        .with_config(&config.worker);
    assert_eq!(worker.fan_out_mode(), FanOutMode::Isolated);
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = EngineConfig::from_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, EngineError::ConfigIo { .. }));
}
