use crate::core::{Model, Payload, Source};
use anyhow::Result;

/// Source that emits one payload per model, then a final payload marked as
/// source-exhausted with an empty model.
pub struct IterSource<I> {
    models: I,
    sequence_key: Option<String>,
    sequence: u64,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = Model>,
{
    pub fn new(models: impl IntoIterator<IntoIter = I, Item = Model>) -> Self {
        Self {
            models: models.into_iter(),
            sequence_key: None,
            sequence: 0,
        }
    }

    /// Stamp each emitted model with a 0-based sequence number under `key`.
    pub fn with_sequence(mut self, key: impl Into<String>) -> Self {
        self.sequence_key = Some(key.into());
        self
    }
}

impl<I> Source for IterSource<I>
where
    I: Iterator<Item = Model> + Send,
{
    fn extract(&mut self) -> Result<Payload> {
        let Some(mut model) = self.models.next() else {
            return Ok(Payload::last());
        };

        if let Some(key) = &self.sequence_key {
            model.insert(key.clone(), self.sequence);
        }
        self.sequence += 1;

        Ok(Payload::from_model(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emits_models_then_last() {
        let models = (0..2).map(|i| [("value", i)].into_iter().collect::<Model>());
        let mut source = IterSource::new(models).with_sequence("seq");

        let first = source.extract().unwrap();
        assert_eq!(first.get("value"), Some(0.into()));
        assert_eq!(first.get("seq"), Some(0.into()));
        assert!(!first.should_terminate());

        let second = source.extract().unwrap();
        assert_eq!(second.get("seq"), Some(1.into()));

        let last = source.extract().unwrap();
        assert!(last.is_source_exhausted());
        assert!(last.model().is_empty());
    }
}
