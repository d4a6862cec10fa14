// Panic isolation helpers for the loop
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Run `f`, turning a panic into `Err(message)`
///
/// Used for synchronous callbacks (log sinks) that the loop must survive.
pub fn execute_guarded<F, T>(f: F) -> Result<T, String>
where
    F: FnOnce() -> T,
{
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

/// Best-effort text of a panic payload
///
/// `panic!` with a literal yields `&str`, with format args yields `String`.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let literal: Box<dyn Any + Send> = Box::new("boom");
        let formatted: Box<dyn Any + Send> = Box::new(format!("boom {}", 42));
        let other: Box<dyn Any + Send> = Box::new(7_u32);

        assert_eq!(panic_message(literal.as_ref()), "boom");
        assert_eq!(panic_message(formatted.as_ref()), "boom 42");
        assert_eq!(panic_message(other.as_ref()), "Unknown panic");
    }

    #[test]
    fn test_execute_guarded() {
        assert_eq!(execute_guarded(|| 7), Ok(7));

        let caught = execute_guarded(|| -> u32 { panic!("sink {}", "exploded") });
        assert_eq!(caught, Err("sink exploded".to_string()));
    }
}
