use crate::core::{Payload, Stage};
use anyhow::{Context, Result};
use tracing::info;

/// Report stage that logs every payload's model as JSON and forwards the
/// payload unchanged.
pub struct PrintReport {
    label: String,
    seen: u64,
}

impl Default for PrintReport {
    fn default() -> Self {
        Self::new("Output")
    }
}

impl PrintReport {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            seen: 0,
        }
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }
}

impl Stage for PrintReport {
    fn execute(&mut self, payload: Payload) -> Result<Payload> {
        let model = serde_json::to_string(&*payload.model())
            .with_context(|| format!("[{}] model is not serialisable", self.label))?;

        info!(
            label = %self.label,
            payload = self.seen,
            source_exhausted = payload.is_source_exhausted(),
            %model,
            "report"
        );
        self.seen += 1;

        Ok(payload)
    }
}
