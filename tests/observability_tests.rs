use chainflow::observability::{MetricsCollector, PipelineMonitor, StageMetrics};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_metrics_creation() {
    let metrics = StageMetrics::new("collect");
    assert_eq!(metrics.stage(), "collect");
    assert_eq!(metrics.payloads_processed(), 0);
    assert_eq!(metrics.failures(), 0);
    assert_eq!(metrics.avg_latency_us(), 0);
}

#[test]
fn test_metrics_latency_tracking() {
    let metrics = StageMetrics::new("slow");

    let start = metrics.start_call();
    std::thread::sleep(Duration::from_millis(10));
    metrics.finish_call(start);

    assert!(metrics.avg_latency_us() >= 10_000);
}

#[test]
fn test_collector_snapshot() {
    let mut collector = MetricsCollector::new();
    let process = Arc::new(StageMetrics::new("process"));
    let report = Arc::new(StageMetrics::new("report"));

    process.record_processed();
    process.record_processed();
    process.record_published();
    report.record_absorbed_halt();

    assert!(collector.register(process).is_none());
    assert!(collector.register(report).is_none());

    let snapshot = collector.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot["process"].payloads_processed, 2);
    assert_eq!(snapshot["process"].published, 1);
    assert_eq!(snapshot["report"].absorbed_halts, 1);
}

#[test]
fn test_collector_replaces_duplicate_names() {
    let mut collector = MetricsCollector::new();
    collector.register(Arc::new(StageMetrics::new("stage")));
    assert!(collector.register(Arc::new(StageMetrics::new("stage"))).is_some());
    assert_eq!(collector.len(), 1);
}

#[test]
fn test_monitor_report() {
    let mut collector = MetricsCollector::new();
    let collect = Arc::new(StageMetrics::new("collect"));
    let process = Arc::new(StageMetrics::new("process"));

    collect.record_processed();
    collect.record_processed();
    process.record_failure();

    collector.register(collect);
    collector.register(process);

    let report = PipelineMonitor::new(collector).generate_report();
    assert!(report.contains("[collect]\n  Processed: 2"));
    assert!(report.contains("Failures: 1"));
    assert!(report.find("[collect]").unwrap() < report.find("[process]").unwrap());
}

#[test]
fn test_monitor_empty() {
    let monitor = PipelineMonitor::new(MetricsCollector::new());
    assert_eq!(monitor.generate_report(), "No stages registered");
}
