#![allow(dead_code)]

use anyhow::Result;
use chainflow::{Payload, Worker};
use serde_json::Value;
use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Log lines recorded by a capturing subscriber, formatted as
/// `LEVEL field=value ...`.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<String>>>);

impl CapturedLogs {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        let prefix = level.to_string();
        self.lines()
            .iter()
            .any(|line| line.starts_with(&prefix) && line.contains(needle))
    }
}

impl<S: Subscriber> Layer<S> for CapturedLogs {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut line = format!("{} ", event.metadata().level());
        event.record(&mut FieldWriter(&mut line));
        self.0.lock().unwrap().push(line);
    }
}

struct FieldWriter<'a>(&'a mut String);

impl Visit for FieldWriter<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let _ = write!(self.0, "{}={:?} ", field.name(), value);
    }
}

/// Run `f` with a capturing subscriber as the default. Stage threads started
/// inside `f` log into the same capture.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, CapturedLogs) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::registry().with(logs.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs)
}

pub fn numbered(value: i64) -> Payload {
    let payload = Payload::new();
    payload.set("value", value);
    payload
}

pub fn numbered_last(value: i64) -> Payload {
    let payload = numbered(value);
    payload.mark_source_exhausted();
    payload
}

pub fn passthrough() -> impl FnMut(Payload) -> Result<Payload> + Send + 'static {
    |payload| Ok(payload)
}

/// Passthrough stage that counts its invocations.
pub fn counting(calls: Arc<AtomicUsize>) -> impl FnMut(Payload) -> Result<Payload> + Send + 'static {
    move |payload| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(payload)
    }
}

pub fn failing(message: &'static str) -> impl FnMut(Payload) -> Result<Payload> + Send + 'static {
    move |_payload| Err(anyhow::anyhow!(message))
}

/// Never-started report stage whose inbox collects what upstream publishes.
pub fn sink(name: &str) -> Worker {
    Worker::report(name, passthrough())
}

pub fn drain(worker: &Worker) -> Vec<Payload> {
    std::iter::from_fn(|| worker.dequeue()).collect()
}

pub fn values(payloads: &[Payload]) -> Vec<Option<Value>> {
    payloads.iter().map(|payload| payload.get("value")).collect()
}
