//! Lifecycle and configuration errors.
//!
//! Failures inside stage capabilities never surface here: they are absorbed
//! into the payload's chain-stop flag and logged. [`EngineError`] covers what
//! goes wrong around the stages: linking, thread management, orchestration
//! and configuration.

use crate::engine::{PipelineState, WorkerState};
use thiserror::Error;

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// `link`, `start` or `enqueue` preconditions violated by a running worker.
    #[error("stage '{stage}' is {state} and cannot be {action}")]
    InvalidWorkerState {
        stage: String,
        state: WorkerState,
        action: &'static str,
    },

    #[error("source stage '{successor}' cannot be linked as a successor of '{stage}'")]
    SourceAsSuccessor { stage: String, successor: String },

    #[error("failed to spawn thread for stage '{stage}'")]
    Spawn {
        stage: String,
        #[source]
        source: std::io::Error,
    },

    #[error("thread for stage '{stage}' panicked outside its capability")]
    WorkerPanicked { stage: String },

    #[error("invalid pipeline state transition: {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("pipeline task failed to complete: {0}")]
    Join(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read configuration from {path}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install log subscriber: {0}")]
    Logging(String),
}

impl EngineError {
    pub(crate) fn transition(from: &PipelineState, to: &PipelineState) -> Self {
        Self::InvalidTransition {
            from: from.name(),
            to: to.name(),
        }
    }
}
