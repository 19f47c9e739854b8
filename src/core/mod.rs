pub mod model;
pub mod payload;
pub mod stage;

pub use model::Model;
pub use payload::Payload;
pub use stage::{Source, Stage, StageKind};
