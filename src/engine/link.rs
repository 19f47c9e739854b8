//! Inbound queues and the successor links that feed them.
//!
//! A stage's inbox is an unbounded crossbeam channel. Successors are held as
//! sender handles, so linking never borrows or owns the downstream worker.
//!
//! Each inbox keeps two counts: links that exist (`predecessors`) and links
//! whose owning stage has a live thread (`producers`). Only the second one
//! says whether more payloads can still arrive.

use crate::core::Payload;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How a published payload is handed to more than one successor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanOutMode {
    /// Every successor receives the same instance. Concurrent successors
    /// observe each other's model writes.
    #[default]
    Shared,
    /// Every successor receives its own deep copy.
    Isolated,
}

/// Unbounded FIFO owned by a downstream stage.
#[derive(Clone)]
pub(crate) struct Inbox {
    stage: Arc<str>,
    tx: Sender<Payload>,
    rx: Receiver<Payload>,
    predecessors: Arc<AtomicUsize>,
    producers: Arc<AtomicUsize>,
}

impl Inbox {
    pub(crate) fn new(stage: &str) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            stage: Arc::from(stage),
            tx,
            rx,
            predecessors: Arc::new(AtomicUsize::new(0)),
            producers: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn push(&self, payload: Payload) {
        // The inbox holds its own receiver, so the channel cannot be disconnected.
        let _ = self.tx.send(payload);
    }

    pub(crate) fn try_pop(&self) -> Option<Payload> {
        self.rx.try_recv().ok()
    }

    pub(crate) fn pop_timeout(&self, timeout: Duration) -> Result<Payload, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub(crate) fn len(&self) -> usize {
        self.rx.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub(crate) fn predecessors(&self) -> usize {
        self.predecessors.load(Ordering::Acquire)
    }

    /// Upstream stages that are running and may still publish here.
    pub(crate) fn producers(&self) -> usize {
        self.producers.load(Ordering::Acquire)
    }

    /// Sender side handed to an upstream stage. Counts as one predecessor
    /// for as long as it lives.
    pub(crate) fn link(&self) -> Link {
        self.predecessors.fetch_add(1, Ordering::AcqRel);
        Link {
            stage: self.stage.clone(),
            tx: self.tx.clone(),
            predecessors: self.predecessors.clone(),
            producers: self.producers.clone(),
        }
    }
}

/// Edge from an upstream stage into one successor's inbox.
pub(crate) struct Link {
    stage: Arc<str>,
    tx: Sender<Payload>,
    predecessors: Arc<AtomicUsize>,
    producers: Arc<AtomicUsize>,
}

impl Drop for Link {
    fn drop(&mut self) {
        self.predecessors.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Ordered successor set of one stage, fixed once the stage starts.
#[derive(Default)]
pub(crate) struct FanOut {
    links: Vec<Link>,
    mode: FanOutMode,
}

impl FanOut {
    pub(crate) fn new(links: Vec<Link>, mode: FanOutMode) -> Self {
        Self { links, mode }
    }

    pub(crate) fn set_mode(&mut self, mode: FanOutMode) {
        self.mode = mode;
    }

    pub(crate) fn successors(&self) -> impl Iterator<Item = &str> {
        self.links.iter().map(|link| &*link.stage)
    }

    /// Enqueue `payload` on every successor, in link order. Returns the
    /// number of successors that accepted it.
    pub(crate) fn publish(&self, payload: &Payload) -> usize {
        if self.links.is_empty() {
            return 0;
        }
        debug!(successors = self.links.len(), "publishing payload to linked stages");

        let mut delivered = 0;
        for link in &self.links {
            let outgoing = match self.mode {
                FanOutMode::Shared => payload.clone(),
                FanOutMode::Isolated => payload.deep_copy(),
            };
            if link.tx.send(outgoing).is_ok() {
                delivered += 1;
            } else {
                warn!(successor = %link.stage, "successor stage is gone, payload dropped");
            }
        }
        delivered
    }

    /// Register the calling stage as a live producer on every successor.
    /// The registration ends when the returned handle is dropped.
    pub(crate) fn attach(self: &Arc<Self>) -> AttachedFanOut {
        for link in &self.links {
            link.producers.fetch_add(1, Ordering::AcqRel);
        }
        AttachedFanOut(self.clone())
    }
}

/// Fan-out held by a running stage thread.
pub(crate) struct AttachedFanOut(Arc<FanOut>);

impl AttachedFanOut {
    pub(crate) fn publish(&self, payload: &Payload) -> usize {
        self.0.publish(payload)
    }
}

impl Drop for AttachedFanOut {
    fn drop(&mut self) {
        // Every payload sent before this point is visible to a successor
        // that reads a zero count.
        for link in &self.0.links {
            link.producers.fetch_sub(1, Ordering::AcqRel);
        }
    }
}
