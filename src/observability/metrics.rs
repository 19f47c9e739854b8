use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Per-stage counters, updated from the stage's thread and readable from
/// anywhere.
pub struct StageMetrics {
    stage: String,
    payloads_processed: AtomicU64,
    failures: AtomicU64,
    published: AtomicU64,
    absorbed_halts: AtomicU64,
    total_latency_us: AtomicU64,
    latency_samples: AtomicU64,
}

/// Point-in-time copy of a [`StageMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub stage: String,
    pub payloads_processed: u64,
    pub failures: u64,
    pub published: u64,
    pub absorbed_halts: u64,
    pub avg_latency_us: u64,
}

impl StageMetrics {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            payloads_processed: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            published: AtomicU64::new(0),
            absorbed_halts: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            latency_samples: AtomicU64::new(0),
        }
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn payloads_processed(&self) -> u64 {
        self.payloads_processed.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Number of publish calls, not deliveries per successor.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn absorbed_halts(&self) -> u64 {
        self.absorbed_halts.load(Ordering::Relaxed)
    }

    pub fn record_processed(&self) {
        self.payloads_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_absorbed_halt(&self) {
        self.absorbed_halts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn start_call(&self) -> Instant {
        Instant::now()
    }

    pub fn finish_call(&self, start: Instant) {
        let latency_us = start.elapsed().as_micros() as u64;
        self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_latency_us(&self) -> u64 {
        let samples = self.latency_samples.load(Ordering::Relaxed);
        if samples == 0 {
            return 0;
        }
        self.total_latency_us.load(Ordering::Relaxed) / samples
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            stage: self.stage.clone(),
            payloads_processed: self.payloads_processed(),
            failures: self.failures(),
            published: self.published(),
            absorbed_halts: self.absorbed_halts(),
            avg_latency_us: self.avg_latency_us(),
        }
    }
}
