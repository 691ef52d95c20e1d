//! Abort controllers.

use std::fmt;

use super::reason::AbortReason;
use super::signal::AbortSignal;

/// The owner and trigger of one [`AbortSignal`].
///
/// The controller holds exactly one strong reference, the one the signal
/// was created with. Other holders clone the signal to get their own;
/// dropping the controller releases only its reference.
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    pub fn new() -> Self {
        Self {
            signal: AbortSignal::new(),
        }
    }

    /// The controlled signal. Always the same object.
    pub fn signal(&self) -> &AbortSignal {
        &self.signal
    }

    /// Abort the signal with `reason`, or with a default `AbortError`.
    ///
    /// Calls after the first have no effect.
    pub fn abort(&self, reason: Option<AbortReason>) {
        self.signal.signal_abort(reason);
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AbortController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortController")
            .field("signal", &self.signal)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_holds_single_reference() {
        let controller = AbortController::new();
        assert_eq!(controller.signal().ref_count(), 1);
        assert!(controller.signal().ptr_eq(controller.signal()));
    }

    #[test]
    fn abort_is_idempotent() {
        let controller = AbortController::new();
        controller.abort(None);
        let reason = controller.signal().reason().unwrap();

        controller.abort(None);
        assert_eq!(controller.signal().reason().unwrap(), reason);
        assert!(controller.signal().owns_reason());
    }

    #[test]
    fn signal_outlives_controller() {
        let controller = AbortController::new();
        let signal = controller.signal().clone();
        assert_eq!(signal.ref_count(), 2);

        controller.abort(Some(AbortReason::new(42_i32)));
        drop(controller);

        assert_eq!(signal.ref_count(), 1);
        assert!(signal.aborted());
        assert_eq!(signal.reason().unwrap().downcast_ref::<i32>(), Some(&42));
    }

    #[test]
    fn controllers_are_independent() {
        let first = AbortController::new();
        let second = AbortController::new();
        assert!(!first.signal().ptr_eq(second.signal()));

        first.abort(None);
        assert!(first.signal().aborted());
        assert!(!second.signal().aborted());
    }
}
