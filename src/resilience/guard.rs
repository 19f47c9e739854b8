use anyhow::{anyhow, Result};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Run a capability call, turning a panic into an ordinary error.
///
/// A panicking capability would otherwise unwind the stage thread before it
/// publishes, leaving successors waiting on a producer that is gone.
pub fn guarded<T>(call: impl FnOnce() -> Result<T>) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(panic) => Err(anyhow!("stage panicked: {}", panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_passes_through() {
        assert_eq!(guarded(|| Ok(3)).unwrap(), 3);
    }

    #[test]
    fn test_error_passes_through() {
        let err = guarded::<()>(|| Err(anyhow!("bad input"))).unwrap_err();
        assert_eq!(err.to_string(), "bad input");
    }

    #[test]
    fn test_panic_becomes_error() {
        let err = guarded::<()>(|| panic!("exploded at {}", 42)).unwrap_err();
        assert_eq!(err.to_string(), "stage panicked: exploded at 42");
    }
}
