//! Dispatch
//!
//! Runs the target phase of event dispatch against one target's listener
//! list.
//!
//! # How Dispatch Works
//!
//! 1. Reject events that are already being dispatched or were never
//!    initialized.
//!
//! 2. Enter a [`DispatchScope`]: this sets the dispatch flag, `target` and
//!    `currentTarget`, and pushes the event type onto a per-thread stack of
//!    in-flight dispatches. The scope undoes all of it when dropped, even if
//!    a listener panics.
//!
//! 3. Take a snapshot of the listeners for the event type and invoke them in
//!    registration order. Listeners removed during the loop are skipped via
//!    their `removed` flag; listeners added during the loop are not in the
//!    snapshot and do not run.
//!
//! 4. Return `false` if the event was canceled.

use std::cell::RefCell;

use super::event::Event;
use super::target::TargetHandle;
use crate::exception::{DomError, Result};
use crate::rare::RareData;

thread_local! {
    /// Types of the events currently being dispatched on this thread,
    /// innermost last.
    static DISPATCH_STACK: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Guard that marks an event as dispatching until dropped.
struct DispatchScope<'a> {
    event: &'a Event,
    depth: usize,
}

impl<'a> DispatchScope<'a> {
    fn enter(event: &'a Event, event_type: &str, target: TargetHandle, trusted: bool) -> Self {
        event.begin_dispatch(target, trusted);
        let depth = DISPATCH_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(event_type.to_owned());
            stack.len()
        });
        Self { event, depth }
    }
}

impl Drop for DispatchScope<'_> {
    fn drop(&mut self) {
        self.event.end_dispatch();
        DISPATCH_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(
                stack.len(),
                self.depth,
                "dispatch scope mismatch: expected depth {}, got {}",
                self.depth,
                stack.len()
            );
            stack.pop();
        });
    }
}

/// Number of dispatches currently on this thread's call stack.
pub fn dispatch_depth() -> usize {
    DISPATCH_STACK.with(|stack| stack.borrow().len())
}

/// Type of the innermost event being dispatched on this thread, if any.
pub fn current_event_type() -> Option<String> {
    DISPATCH_STACK.with(|stack| stack.borrow().last().cloned())
}

/// Dispatch `event` at the target owning `rare`.
///
/// `trusted` is true only for events fired by the engine itself.
pub(crate) fn dispatch(
    rare: &RareData,
    target: TargetHandle,
    event: &Event,
    trusted: bool,
) -> Result<bool> {
    if event.is_dispatching() {
        return Err(DomError::invalid_state("event is already being dispatched"));
    }
    if !event.is_initialized() {
        return Err(DomError::invalid_state("event has not been initialized"));
    }

    let event_type = event.event_type();
    let scope = DispatchScope::enter(event, &event_type, target, trusted);
    let listeners = rare.listeners(&event_type);

    tracing::debug!(
        event_type = %event_type,
        listeners = listeners.len(),
        trusted,
        depth = scope.depth,
        "dispatching event"
    );

    for listener in &listeners {
        if event.immediate_propagation_stopped() {
            break;
        }
        if listener.is_removed() {
            continue;
        }

        if listener.once() {
            rare.remove_listener_entry(listener);
        }

        if listener.passive() {
            event.set_in_passive_listener(true);
        }

        tracing::trace!(
            event_type = %event_type,
            callback = ?listener.callback(),
            "invoking listener"
        );
        listener.callback().call(event);

        event.set_in_passive_listener(false);
    }

    drop(scope);

    let not_canceled = !event.default_prevented();
    tracing::debug!(event_type = %event_type, not_canceled, "dispatch finished");
    Ok(not_canceled)
}
