use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Lifecycle of a single stage worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// Built and possibly linked, thread not spawned yet.
    Idle,
    Running,
    /// Thread joined. Terminal.
    Stopped,
}

impl WorkerState {
    /// `Idle -> Stopped` covers a thread that could not be spawned.
    pub fn can_transition_to(&self, target: WorkerState) -> bool {
        use WorkerState::*;

        matches!((self, target), (Idle, Running) | (Idle, Stopped) | (Running, Stopped))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pipeline execution states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    Running {
        #[serde(skip)]
        start_time: Option<Instant>,
    },
    Completed {
        #[serde(skip)]
        duration: Option<Duration>,
    },
    Failed {
        error_msg: String,
    },
}

impl PipelineState {
    /// Check if transition from current state to target state is valid.
    /// A pipeline runs at most once: both outcomes are terminal.
    pub fn can_transition_to(&self, target: &PipelineState) -> bool {
        use PipelineState::*;

        matches!(
            (self, target),
            (Idle, Running { .. }) | (Running { .. }, Completed { .. }) | (Running { .. }, Failed { .. })
        )
    }

    /// Get human-readable state name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running { .. } => "Running",
            Self::Completed { .. } => "Completed",
            Self::Failed { .. } => "Failed",
        }
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_transitions() {
        assert!(WorkerState::Idle.can_transition_to(WorkerState::Running));
        assert!(WorkerState::Running.can_transition_to(WorkerState::Stopped));
        assert!(!WorkerState::Stopped.can_transition_to(WorkerState::Running));
        assert!(WorkerState::Idle.can_transition_to(WorkerState::Stopped));
        assert!(!WorkerState::Stopped.can_transition_to(WorkerState::Stopped));
        assert!(!WorkerState::Running.can_transition_to(WorkerState::Idle));
    }

    #[test]
    fn test_pipeline_runs_once() {
        let running = PipelineState::Running { start_time: None };
        let completed = PipelineState::Completed { duration: None };

        assert!(PipelineState::Idle.can_transition_to(&running));
        assert!(running.can_transition_to(&completed));
        assert!(!completed.can_transition_to(&running));
        assert!(!completed.can_transition_to(&PipelineState::Idle));
    }

    #[test]
    fn test_failure_is_terminal() {
        let failed = PipelineState::Failed {
            error_msg: "spawn failed".to_string(),
        };

        assert!(PipelineState::Running { start_time: None }.can_transition_to(&failed));
        assert!(!failed.can_transition_to(&PipelineState::Idle));
        assert!(!PipelineState::Idle.can_transition_to(&failed));
    }
}
