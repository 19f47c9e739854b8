use crate::engine::FanOutMode;
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Engine settings, deserialised from JSON. Every field has a default, so
/// `{}` is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub logging: LoggingConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `"info"` or `"chainflow=debug"`. `RUST_LOG`
    /// takes precedence when set.
    pub level: String,
    pub json: bool,
    /// Append log lines to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// How long an idle stage blocks on its inbox before re-checking for a
    /// stop request.
    pub shutdown_poll_ms: u64,
    pub fan_out: FanOutMode,
}

impl WorkerConfig {
    pub fn shutdown_poll(&self) -> Duration {
        Duration::from_millis(self.shutdown_poll_ms.max(1))
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            shutdown_poll_ms: 5,
            fan_out: FanOutMode::Shared,
        }
    }
}

impl EngineConfig {
    pub fn from_json(config: Value) -> Result<Self> {
        serde_json::from_value(config).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| EngineError::Config(e.to_string()))
    }
}
