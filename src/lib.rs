//! In-process data-pipeline engine.
//!
//! Stages are linked into a chain (or tree) of [`Worker`]s, each running on
//! its own thread with its own inbound queue. A shared [`Payload`] flows
//! downstream; two flags on it carry the control protocol: the source is
//! exhausted, or some stage halted the chain.
//!
//! ```no_run
//! use chainflow::{Payload, Pipeline, Worker};
//!
//! let mut source = Worker::source("numbers", {
//!     let mut next = 0;
//!     move || -> anyhow::Result<Payload> {
//!         next += 1;
//!         let payload = if next > 3 { Payload::last() } else { Payload::new() };
//!         payload.set("value", next);
//!         Ok(payload)
//!     }
//! });
//! let report = Worker::report("print", |payload: Payload| -> anyhow::Result<Payload> {
//!     println!("{:?}", payload.get("value"));
//!     Ok(payload)
//! });
//! source.link(&[&report])?;
//!
//! let mut pipeline = Pipeline::new("demo");
//! pipeline.compose(vec![source, report]);
//! pipeline.execute()?;
//! # Ok::<(), chainflow::EngineError>(())
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod logging;
pub mod nodes;
pub mod observability;
pub mod resilience;

pub use crate::config::{EngineConfig, LoggingConfig, WorkerConfig};
pub use crate::core::{Model, Payload, Source, Stage, StageKind};
pub use crate::engine::{ExecutionReport, FanOutMode, Pipeline, PipelineState, StageReport, Worker, WorkerState};
pub use crate::error::EngineError;
