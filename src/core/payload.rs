use super::Model;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Unit of data and control state flowing through a pipeline.
///
/// A `Payload` is a handle: cloning it yields another reference to the same
/// instance, which is what fan-out in [`FanOutMode::Shared`] hands to every
/// successor. Use [`Payload::deep_copy`] for an independent instance.
///
/// The two control flags only ever go from `false` to `true`.
///
/// [`FanOutMode::Shared`]: crate::engine::FanOutMode::Shared
#[derive(Clone, Default)]
pub struct Payload {
    inner: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    stop_source: AtomicBool,
    stop_chain: AtomicBool,
    model: Mutex<Model>,
}

impl Payload {
    /// Fresh payload with an empty model and both flags cleared.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_model(model: Model) -> Self {
        Self {
            inner: Arc::new(Shared {
                model: Mutex::new(model),
                ..Default::default()
            }),
        }
    }

    /// Final payload of a source: the producer has nothing further.
    pub fn last() -> Self {
        let payload = Self::new();
        payload.mark_source_exhausted();
        payload
    }

    /// Payload that halts the chain at the next stage that dequeues it.
    pub fn halted() -> Self {
        let payload = Self::new();
        payload.mark_chain_stop();
        payload
    }

    pub fn is_source_exhausted(&self) -> bool {
        self.inner.stop_source.load(Ordering::Acquire)
    }

    pub fn is_chain_stopped(&self) -> bool {
        self.inner.stop_chain.load(Ordering::Acquire)
    }

    /// True once either control flag is set.
    pub fn should_terminate(&self) -> bool {
        self.is_source_exhausted() || self.is_chain_stopped()
    }

    pub fn mark_source_exhausted(&self) {
        self.inner.stop_source.store(true, Ordering::Release);
    }

    pub fn mark_chain_stop(&self) {
        self.inner.stop_chain.store(true, Ordering::Release);
    }

    /// Lock the model for reading or writing.
    ///
    /// Successors sharing this instance contend on the same lock; hold the
    /// guard only as long as needed. Any other model access on this payload
    /// while the guard is alive deadlocks.
    pub fn model(&self) -> MutexGuard<'_, Model> {
        self.inner
            .model
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` with the model locked.
    ///
    /// The lock is not reentrant: calling [`get`](Self::get),
    /// [`set`](Self::set), [`model`](Self::model) or `{:?}` on this payload
    /// from inside `f` deadlocks. Work through the `&mut Model` instead.
    pub fn with_model<R>(&self, f: impl FnOnce(&mut Model) -> R) -> R {
        f(&mut self.model())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.model().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.model().insert(key, value)
    }

    /// Independent instance carrying the same flags and a copy of the model.
    pub fn deep_copy(&self) -> Self {
        let copy = Self::from_model(self.model().clone());
        if self.is_source_exhausted() {
            copy.mark_source_exhausted();
        }
        if self.is_chain_stopped() {
            copy.mark_chain_stop();
        }
        copy
    }

    /// Whether both handles refer to the same payload instance.
    pub fn ptr_eq(a: &Payload, b: &Payload) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("stop_source", &self.is_source_exhausted())
            .field("stop_chain", &self.is_chain_stopped())
            .field("model", &*self.model())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_payload_is_live() {
        let payload = Payload::new();
        assert!(!payload.is_source_exhausted());
        assert!(!payload.is_chain_stopped());
        assert!(!payload.should_terminate());
        assert!(payload.model().is_empty());
    }

    #[test]
    fn test_marks_are_idempotent() {
        let payload = Payload::new();
        payload.mark_chain_stop();
        payload.mark_chain_stop();
        assert!(payload.is_chain_stopped());
        assert!(!payload.is_source_exhausted());
    }

    #[test]
    fn test_clone_shares_instance() {
        let a = Payload::new();
        let b = a.clone();
        b.set("seen_by", "b");
        a.mark_source_exhausted();

        assert!(Payload::ptr_eq(&a, &b));
        assert_eq!(a.get("seen_by"), Some(Value::from("b")));
        assert!(b.is_source_exhausted());
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let original = Payload::last();
        original.set("value", 7);

        let copy = original.deep_copy();
        copy.set("value", 8);
        copy.mark_chain_stop();

        assert!(!Payload::ptr_eq(&original, &copy));
        assert_eq!(original.get("value"), Some(Value::from(7)));
        assert!(!original.is_chain_stopped());
        assert!(copy.is_source_exhausted());
    }
}
