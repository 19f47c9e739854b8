use super::Payload;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Producer capability backing a source stage.
///
/// Called repeatedly on the stage's own thread until it returns a payload
/// carrying a stop flag or fails.
pub trait Source: Send {
    fn extract(&mut self) -> Result<Payload>;
}

/// Capability backing a transform, process or report stage.
///
/// Receives one payload, returns the payload to forward. Returning an error
/// halts the chain from this stage onwards.
pub trait Stage: Send {
    fn execute(&mut self, payload: Payload) -> Result<Payload>;
}

impl<F> Source for F
where
    F: FnMut() -> Result<Payload> + Send,
{
    fn extract(&mut self) -> Result<Payload> {
        self()
    }
}

impl<F> Stage for F
where
    F: FnMut(Payload) -> Result<Payload> + Send,
{
    fn execute(&mut self, payload: Payload) -> Result<Payload> {
        self(payload)
    }
}

/// Role a stage plays in the chain. Transform, process and report share one
/// control contract and differ only in intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    Source,
    Transform,
    Process,
    Report,
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Transform => "transform",
            Self::Process => "process",
            Self::Report => "report",
        }
    }

    /// Whether stages of this kind own an inbound queue.
    pub fn has_inbox(&self) -> bool {
        !matches!(self, Self::Source)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
