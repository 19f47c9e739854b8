use super::MetricsCollector;

pub struct PipelineMonitor {
    collector: MetricsCollector,
}

impl PipelineMonitor {
    pub fn new(collector: MetricsCollector) -> Self {
        Self { collector }
    }

    /// Human-readable summary, one block per stage in name order.
    pub fn generate_report(&self) -> String {
        let mut snapshot: Vec<_> = self.collector.snapshot().into_values().collect();

        if snapshot.is_empty() {
            return "No stages registered".to_string();
        }
        snapshot.sort_by(|a, b| a.stage.cmp(&b.stage));

        let mut report = String::from("=== Pipeline Metrics ===\n");

        for metrics in &snapshot {
            report.push_str(&format!(
                "\n[{}]\n  Processed: {}\n  Failures: {}\n  Published: {}\n  Absorbed halts: {}\n  Avg Latency: {}μs\n",
                metrics.stage,
                metrics.payloads_processed,
                metrics.failures,
                metrics.published,
                metrics.absorbed_halts,
                metrics.avg_latency_us
            ));
        }

        report
    }

    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }
}
