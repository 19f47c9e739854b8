use super::{PipelineState, Worker};
use crate::core::StageKind;
use crate::error::{EngineError, Result};
use crate::observability::{MetricsCollector, MetricsSnapshot, PipelineMonitor};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Ordered list of already-linked stages, started back to front and stopped
/// front to back.
///
/// The pipeline never routes payloads itself; stages deliver to each other
/// through the links the caller set up before [`Pipeline::compose`].
pub struct Pipeline {
    name: String,
    stages: Vec<Worker>,
    metrics_collector: MetricsCollector,
    state: PipelineState,
}

/// Outcome of one [`Pipeline::execute`] run.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub pipeline: String,
    pub duration: Duration,
    pub stages: Vec<StageReport>,
}

#[derive(Debug, Clone)]
pub struct StageReport {
    pub name: String,
    pub kind: StageKind,
    pub started_at: Option<Instant>,
    pub stopped_at: Option<Instant>,
    pub metrics: MetricsSnapshot,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            metrics_collector: MetricsCollector::new(),
            state: PipelineState::Idle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store the caller's stage list. Links are not created here.
    pub fn compose(&mut self, stages: Vec<Worker>) -> &mut Self {
        let mut collector = MetricsCollector::new();
        for stage in &stages {
            if collector.register(stage.metrics()).is_some() {
                warn!(
                    pipeline = %self.name,
                    stage = %stage.name(),
                    "duplicate stage name, metrics will only show the last one"
                );
            }
        }
        self.stages = stages;
        self.metrics_collector = collector;
        self
    }

    pub fn stages(&self) -> &[Worker] {
        &self.stages
    }

    pub fn stage(&self, name: &str) -> Option<&Worker> {
        self.stages.iter().find(|stage| stage.name() == name)
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn monitor(&self) -> PipelineMonitor {
        PipelineMonitor::new(self.metrics_collector.clone())
    }

    fn transition_to(&mut self, new_state: PipelineState) -> Result<()> {
        if !self.state.can_transition_to(&new_state) {
            return Err(EngineError::transition(&self.state, &new_state));
        }
        self.state = new_state;
        Ok(())
    }

    /// Start every stage in reverse order, then stop every stage in order,
    /// blocking until each one has exited.
    ///
    /// Errors are logged here as well as returned.
    pub fn execute(&mut self) -> Result<ExecutionReport> {
        let start_time = Instant::now();
        self.transition_to(PipelineState::Running {
            start_time: Some(start_time),
        })?;
        info!(pipeline = %self.name, stages = self.stages.len(), "executing pipeline");

        let outcome = self.start_all().and_then(|()| self.stop_all());
        let duration = start_time.elapsed();

        match outcome {
            Ok(()) => {
                self.transition_to(PipelineState::Completed {
                    duration: Some(duration),
                })?;
                info!(pipeline = %self.name, ?duration, "pipeline completed");
                Ok(self.report(duration))
            }
            Err(err) => {
                error!(pipeline = %self.name, error = %err, "pipeline failed due to unexpected error");
                self.transition_to(PipelineState::Failed {
                    error_msg: err.to_string(),
                })?;
                Err(err)
            }
        }
    }

    /// [`execute`](Self::execute) on tokio's blocking pool.
    pub async fn run(mut self) -> Result<ExecutionReport> {
        tokio::task::spawn_blocking(move || self.execute())
            .await
            .map_err(|e| EngineError::Join(e.to_string()))?
    }

    /// Consumers come up before their producers so nothing is published to a
    /// stage that is not listening yet.
    fn start_all(&mut self) -> Result<()> {
        for index in (0..self.stages.len()).rev() {
            if let Err(err) = self.stages[index].start() {
                error!(
                    pipeline = %self.name,
                    stage = %self.stages[index].name(),
                    error = %err,
                    "failed to start stage, aborting stages already running"
                );
                // Includes the failing stage itself, which may have been
                // started by the caller before execute.
                for started in &mut self.stages[index..] {
                    if let Err(abort_err) = started.abort() {
                        warn!(stage = %started.name(), error = %abort_err, "abort failed");
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Every stage is asked to drain up front, then joined front to back.
    /// A stage only drains once its upstream threads have exited, so the
    /// caller's ordering decides when stages are joined but never what they
    /// deliver.
    ///
    /// Joins every stage even if an earlier one fails; the first error wins.
    fn stop_all(&mut self) -> Result<()> {
        for stage in &self.stages {
            stage.request_drain();
        }

        let mut first_error = None;
        for stage in &mut self.stages {
            if let Err(err) = stage.stop() {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn report(&self, duration: Duration) -> ExecutionReport {
        ExecutionReport {
            pipeline: self.name.clone(),
            duration,
            stages: self
                .stages
                .iter()
                .map(|stage| StageReport {
                    name: stage.name().to_string(),
                    kind: stage.kind(),
                    started_at: stage.started_at(),
                    stopped_at: stage.stopped_at(),
                    metrics: stage.metrics().snapshot(),
                })
                .collect(),
        }
    }
}
