pub mod collector;
pub mod metrics;
pub mod monitor;

pub use collector::MetricsCollector;
pub use metrics::{MetricsSnapshot, StageMetrics};
pub use monitor::PipelineMonitor;
