pub mod link;
pub mod pipeline;
pub mod state;
pub mod worker;

pub use link::FanOutMode;
pub use pipeline::{ExecutionReport, Pipeline, StageReport};
pub use state::{PipelineState, WorkerState};
pub use worker::Worker;
