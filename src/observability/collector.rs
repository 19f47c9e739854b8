use super::{MetricsSnapshot, StageMetrics};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of the metrics of every stage in a pipeline, keyed by stage name.
#[derive(Clone, Default)]
pub struct MetricsCollector {
    metrics: HashMap<String, Arc<StageMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the metrics previously registered under the same name, if any.
    pub fn register(&mut self, metrics: Arc<StageMetrics>) -> Option<Arc<StageMetrics>> {
        self.metrics.insert(metrics.stage().to_string(), metrics)
    }

    pub fn snapshot(&self) -> HashMap<String, MetricsSnapshot> {
        self.metrics
            .iter()
            .map(|(stage, metrics)| (stage.clone(), metrics.snapshot()))
            .collect()
    }

    pub fn get_stage_metrics(&self, stage: &str) -> Option<Arc<StageMetrics>> {
        self.metrics.get(stage).cloned()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}
