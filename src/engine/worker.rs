//! Per-stage execution unit: one OS thread, one inbound queue, a fixed set
//! of successors.
//!
//! ## Control protocol
//!
//! Stages never report failures to their caller. A failing capability marks
//! the payload's chain-stop flag, the payload is published anyway, and the
//! stage exits. A stage that dequeues a payload already carrying that flag
//! exits without calling its capability and without publishing.
//!
//! A stage also exits after publishing a payload that carries the
//! source-exhausted flag.
//!
//! ## Shutdown
//!
//! [`Worker::stop`] raises a drain request and then joins. A downstream
//! stage honours the request only once no upstream stage thread is still
//! running and its inbox is empty. Queued work is never lost, whatever order
//! stages are stopped in, and a stage whose upstream exited without sending
//! a terminal payload still gets released. Sources have nothing to drain and
//! keep producing until a flag ends them. [`Worker::abort`] is observed by
//! every kind at the top of each iteration.
//!
//! Stopping a stage blocks for as long as one of its upstream stages keeps
//! running, so a caller stopping stages one by one must stop producers
//! first or request a drain on all of them up front.

use super::link::{AttachedFanOut, FanOut, Inbox};
use super::{FanOutMode, WorkerState};
use crate::config::WorkerConfig;
use crate::core::{Payload, Source, Stage, StageKind};
use crate::error::{EngineError, Result};
use crate::observability::StageMetrics;
use crate::resilience::guarded;
use crossbeam_channel::RecvTimeoutError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn};

enum Logic {
    Produce(Box<dyn Source>),
    Execute(Box<dyn Stage>),
}

#[derive(Default)]
struct Shutdown {
    drain: AtomicBool,
    abort: AtomicBool,
}

impl Shutdown {
    fn draining(&self) -> bool {
        self.drain.load(Ordering::Acquire)
    }

    fn aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }
}

pub struct Worker {
    name: String,
    kind: StageKind,
    logic: Option<Logic>,
    inbox: Option<Inbox>,
    fan_out: Arc<FanOut>,
    fan_out_mode: FanOutMode,
    shutdown: Arc<Shutdown>,
    shutdown_poll: Duration,
    metrics: Arc<StageMetrics>,
    state: WorkerState,
    handle: Option<JoinHandle<()>>,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
}

impl Worker {
    /// Stage with no inbound queue that produces payloads.
    pub fn source(name: impl Into<String>, source: impl Source + 'static) -> Self {
        Self::build(name.into(), StageKind::Source, Logic::Produce(Box::new(source)))
    }

    /// Data-shaping stage.
    pub fn transform(name: impl Into<String>, stage: impl Stage + 'static) -> Self {
        Self::build(name.into(), StageKind::Transform, Logic::Execute(Box::new(stage)))
    }

    /// Computation stage.
    pub fn process(name: impl Into<String>, stage: impl Stage + 'static) -> Self {
        Self::build(name.into(), StageKind::Process, Logic::Execute(Box::new(stage)))
    }

    /// Terminal, side-effecting stage. May still be linked onwards.
    pub fn report(name: impl Into<String>, stage: impl Stage + 'static) -> Self {
        Self::build(name.into(), StageKind::Report, Logic::Execute(Box::new(stage)))
    }

    fn build(name: String, kind: StageKind, logic: Logic) -> Self {
        let defaults = WorkerConfig::default();
        Self {
            inbox: kind.has_inbox().then(|| Inbox::new(&name)),
            metrics: Arc::new(StageMetrics::new(name.clone())),
            name,
            kind,
            logic: Some(logic),
            fan_out: Arc::new(FanOut::default()),
            fan_out_mode: defaults.fan_out,
            shutdown: Arc::new(Shutdown::default()),
            shutdown_poll: defaults.shutdown_poll(),
            state: WorkerState::Idle,
            handle: None,
            started_at: None,
            stopped_at: None,
        }
    }

    pub fn with_config(self, config: &WorkerConfig) -> Self {
        let mut worker = self.with_fan_out(config.fan_out);
        worker.shutdown_poll = config.shutdown_poll();
        worker
    }

    pub fn with_fan_out(mut self, mode: FanOutMode) -> Self {
        self.fan_out_mode = mode;
        // Only a started worker shares its fan-out with a thread.
        if let Some(fan_out) = Arc::get_mut(&mut self.fan_out) {
            fan_out.set_mode(mode);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn fan_out_mode(&self) -> FanOutMode {
        self.fan_out_mode
    }

    /// When the thread was spawned.
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// When the thread was joined.
    pub fn stopped_at(&self) -> Option<Instant> {
        self.stopped_at
    }

    pub fn metrics(&self) -> Arc<StageMetrics> {
        self.metrics.clone()
    }

    /// Payloads waiting in the inbound queue. Always 0 for a source.
    pub fn pending(&self) -> usize {
        self.inbox.as_ref().map_or(0, Inbox::len)
    }

    /// Number of live links into this stage's inbox.
    pub fn predecessors(&self) -> usize {
        self.inbox.as_ref().map_or(0, Inbox::predecessors)
    }

    pub fn successors(&self) -> Vec<&str> {
        self.fan_out.successors().collect()
    }

    /// Replace this stage's successor set. Only allowed before `start`.
    pub fn link(&mut self, successors: &[&Worker]) -> Result<()> {
        self.ensure_idle("linked")?;

        let mut links = Vec::with_capacity(successors.len());
        for successor in successors {
            let inbox = successor.inbox.as_ref().ok_or_else(|| EngineError::SourceAsSuccessor {
                stage: self.name.clone(),
                successor: successor.name.clone(),
            })?;
            links.push(inbox.link());
        }

        self.fan_out = Arc::new(FanOut::new(links, self.fan_out_mode));
        debug!(
            stage = %self.name,
            successors = ?self.successors(),
            "linked stage"
        );
        Ok(())
    }

    /// Append to the inbound queue. Never blocks. A source has no queue, so
    /// the payload is dropped with a warning.
    pub fn enqueue(&self, payload: Payload) {
        match &self.inbox {
            Some(inbox) => inbox.push(payload),
            None => warn!(stage = %self.name, "source stage has no inbox, payload dropped"),
        }
    }

    /// Non-blocking poll of the inbound queue.
    ///
    /// While the stage is running this competes with its own thread.
    pub fn dequeue(&self) -> Option<Payload> {
        self.inbox.as_ref().and_then(Inbox::try_pop)
    }

    /// Enqueue `payload` on every linked successor. Returns how many
    /// successors received it.
    pub fn publish(&self, payload: &Payload) -> usize {
        self.metrics.record_published();
        self.fan_out.publish(payload)
    }

    /// Spawn the run loop on a new thread and return immediately.
    pub fn start(&mut self) -> Result<()> {
        self.ensure_idle("started")?;
        let logic = self.logic.take().ok_or_else(|| self.invalid_state("started"))?;

        if self.predecessors() > 1 {
            warn!(
                stage = %self.name,
                predecessors = self.predecessors(),
                "fan-in stage will stop on the first upstream stop signal"
            );
        }

        let runner = Runner {
            name: self.name.clone(),
            kind: self.kind,
            inbox: self.inbox.clone(),
            fan_out: self.fan_out.attach(),
            shutdown: self.shutdown.clone(),
            poll: self.shutdown_poll,
            metrics: self.metrics.clone(),
        };
        let dispatch = tracing::dispatcher::get_default(|current| current.clone());

        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || tracing::dispatcher::with_default(&dispatch, || runner.run(logic)));

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                self.started_at = Some(Instant::now());
                self.transition_to(WorkerState::Running)
            }
            Err(source) => {
                // The capability went down with the closure; this worker cannot run again.
                self.transition_to(WorkerState::Stopped)?;
                Err(EngineError::Spawn {
                    stage: self.name.clone(),
                    source,
                })
            }
        }
    }

    /// Request a drain, then wait for the thread to exit.
    ///
    /// A no-op for a worker that was never started or is already stopped.
    pub fn stop(&mut self) -> Result<()> {
        if self.state != WorkerState::Running {
            return Ok(());
        }
        self.request_drain();
        self.join()
    }

    /// Raise the drain request without waiting for the thread.
    pub(crate) fn request_drain(&self) {
        if self.state == WorkerState::Running {
            self.shutdown.drain.store(true, Ordering::Release);
        }
    }

    /// Cancel the run loop at its next iteration, then wait for the thread.
    ///
    /// Queued payloads are left unprocessed. A capability call already in
    /// progress is not interrupted.
    pub fn abort(&mut self) -> Result<()> {
        if self.state != WorkerState::Running {
            return Ok(());
        }
        self.shutdown.abort.store(true, Ordering::Release);
        self.shutdown.drain.store(true, Ordering::Release);
        self.join()
    }

    fn join(&mut self) -> Result<()> {
        let joined = match self.handle.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        };
        self.stopped_at = Some(Instant::now());
        self.transition_to(WorkerState::Stopped)?;

        joined.map_err(|_| {
            error!(stage = %self.name, "stage thread panicked");
            EngineError::WorkerPanicked {
                stage: self.name.clone(),
            }
        })
    }

    fn transition_to(&mut self, target: WorkerState) -> Result<()> {
        if !self.state.can_transition_to(target) {
            return Err(self.invalid_state(target.name()));
        }
        debug!(stage = %self.name, from = %self.state, to = %target, "worker state change");
        self.state = target;
        Ok(())
    }

    fn ensure_idle(&self, action: &'static str) -> Result<()> {
        if self.state == WorkerState::Idle {
            Ok(())
        } else {
            Err(self.invalid_state(action))
        }
    }

    fn invalid_state(&self, action: &'static str) -> EngineError {
        EngineError::InvalidWorkerState {
            stage: self.name.clone(),
            state: self.state,
            action,
        }
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("pending", &self.pending())
            .field("successors", &self.successors())
            .finish()
    }
}

/// A worker dropped while running is told to abort; its thread is detached.
impl Drop for Worker {
    fn drop(&mut self) {
        if self.state == WorkerState::Running {
            self.shutdown.abort.store(true, Ordering::Release);
        }
    }
}

/// State moved onto the stage thread.
struct Runner {
    name: String,
    kind: StageKind,
    inbox: Option<Inbox>,
    fan_out: AttachedFanOut,
    shutdown: Arc<Shutdown>,
    poll: Duration,
    metrics: Arc<StageMetrics>,
}

impl Runner {
    fn run(self, logic: Logic) {
        let span = info_span!("stage", name = %self.name, kind = %self.kind);
        let _entered = span.enter();
        info!("starting stage thread");

        match (logic, &self.inbox) {
            (Logic::Produce(source), _) => self.produce_loop(source),
            (Logic::Execute(stage), Some(inbox)) => self.execute_loop(inbox, stage),
            (Logic::Execute(_), None) => error!("downstream stage has no inbox"),
        }

        info!("exiting stage thread");
    }

    fn produce_loop(&self, mut source: Box<dyn Source>) {
        loop {
            if self.shutdown.aborted() {
                warn!("aborted before the source was exhausted");
                break;
            }

            let start = self.metrics.start_call();
            let outcome = guarded(|| source.extract());
            self.metrics.finish_call(start);

            let payload = match outcome {
                Ok(payload) => {
                    self.metrics.record_processed();
                    payload
                }
                Err(err) => {
                    self.metrics.record_failure();
                    error!(error = %err, details = ?err, "unable to collect data, halting the chain");
                    Payload::halted()
                }
            };

            self.publish(&payload);
            if payload.should_terminate() {
                break;
            }
        }
    }

    fn execute_loop(&self, inbox: &Inbox, mut stage: Box<dyn Stage>) {
        loop {
            if self.shutdown.aborted() {
                warn!(pending = inbox.len(), "aborted with payloads still queued");
                break;
            }

            let payload = match inbox.pop_timeout(self.poll) {
                Ok(payload) => payload,
                Err(RecvTimeoutError::Timeout) => {
                    if self.shutdown.draining() && inbox.producers() == 0 && inbox.is_empty() {
                        info!("inbox drained after stop request");
                        break;
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            };

            if payload.is_chain_stopped() {
                info!("upstream stage halted the chain");
                self.metrics.record_absorbed_halt();
                break;
            }

            let start = self.metrics.start_call();
            let outcome = guarded(|| stage.execute(payload.clone()));
            self.metrics.finish_call(start);

            let payload = match outcome {
                Ok(output) => {
                    self.metrics.record_processed();
                    output
                }
                Err(err) => {
                    self.metrics.record_failure();
                    error!(error = %err, details = ?err, "stage failed, halting the chain");
                    payload.mark_chain_stop();
                    payload
                }
            };

            self.publish(&payload);
            if payload.should_terminate() {
                break;
            }
        }
    }

    fn publish(&self, payload: &Payload) {
        self.metrics.record_published();
        self.fan_out.publish(payload);
    }
}
