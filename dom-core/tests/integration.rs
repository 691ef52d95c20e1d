//! Integration Tests for Events and Abort Signals
//!
//! These tests verify that targets, signals and controllers work together
//! correctly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use dom_core::abort::ReasonOwnership;
use dom_core::{
    AbortAlgorithm, AbortController, AbortReason, AbortSignal, DomError, Event, EventCallback,
    EventInit, EventTarget, GenericEventTarget, ListenerOptions,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn counting_callback() -> (Rc<Cell<u32>>, EventCallback) {
    let count = Rc::new(Cell::new(0));
    let count_clone = count.clone();
    let callback = EventCallback::new(move |_| count_clone.set(count_clone.get() + 1));
    (count, callback)
}

fn logging_algorithm(log: &Rc<RefCell<Vec<String>>>, entry: &str) -> AbortAlgorithm {
    let log = log.clone();
    let entry = entry.to_owned();
    AbortAlgorithm::new(move || log.borrow_mut().push(entry.clone()))
}

fn logging_listener(log: &Rc<RefCell<Vec<String>>>, entry: &str) -> EventCallback {
    let log = log.clone();
    let entry = entry.to_owned();
    EventCallback::new(move |_| log.borrow_mut().push(entry.clone()))
}

/// Aborting twice keeps the first reason and fires nothing the second time.
#[test]
fn abort_is_idempotent() {
    init_tracing();
    let controller = AbortController::new();
    let signal = controller.signal().clone();
    let log = Rc::new(RefCell::new(Vec::new()));

    signal.add_algorithm(logging_algorithm(&log, "algorithm")).unwrap();
    signal
        .add_event_listener("abort", &logging_listener(&log, "event"), ListenerOptions::new())
        .unwrap();

    let first = AbortReason::new("first");
    controller.abort(Some(first.clone()));
    controller.abort(Some(AbortReason::new("second")));
    controller.abort(None);

    assert_eq!(signal.reason(), Some(first));
    assert_eq!(*log.borrow(), vec!["algorithm", "event"]);
}

/// Algorithms drain once and later registrations are ignored.
#[test]
fn algorithms_drain_exactly_once() {
    let controller = AbortController::new();
    let signal = controller.signal();
    let log = Rc::new(RefCell::new(Vec::new()));

    signal.add_algorithm(logging_algorithm(&log, "a")).unwrap();
    signal.add_algorithm(logging_algorithm(&log, "b")).unwrap();
    assert_eq!(signal.algorithm_count(), 2);

    controller.abort(None);
    assert_eq!(signal.algorithm_count(), 0);

    signal.add_algorithm(logging_algorithm(&log, "late")).unwrap();
    assert_eq!(signal.algorithm_count(), 0);

    controller.abort(None);
    assert_eq!(*log.borrow(), vec!["a", "b"]);
}

/// Composing a composed signal links straight to the original sources.
#[test]
fn composition_is_flattened() {
    let a = AbortController::new();
    let b = AbortController::new();

    let c = AbortSignal::any(&[a.signal().clone(), b.signal().clone()]).unwrap();
    let d = AbortSignal::any(&[c.clone()]).unwrap();

    assert!(c.is_dependent());
    assert!(d.is_dependent());
    assert_eq!(d.source_count(), 2);

    let sources = d.sources();
    assert!(sources.iter().any(|s| s.ptr_eq(a.signal())));
    assert!(sources.iter().any(|s| s.ptr_eq(b.signal())));
    assert!(!sources.iter().any(|s| s.ptr_eq(&c)));
    assert_eq!(c.dependent_count(), 0);
    assert_eq!(a.signal().dependent_count(), 2);
}

/// Overlapping inputs do not produce duplicate edges.
#[test]
fn composition_deduplicates_sources() {
    let a = AbortController::new();
    let b = AbortController::new();

    let c = AbortSignal::any(&[a.signal().clone(), b.signal().clone()]).unwrap();
    let e = AbortSignal::any(&[a.signal().clone(), c.clone(), a.signal().clone()]).unwrap();

    assert_eq!(e.source_count(), 2);
    assert_eq!(a.signal().dependent_count(), 2);
    assert_eq!(b.signal().dependent_count(), 2);
}

/// Deeply nested composition keeps a single hop to the source.
#[test]
fn nested_composition_stays_one_hop() {
    let controller = AbortController::new();
    let mut signal = controller.signal().clone();
    let mut chain = Vec::new();

    for _ in 0..64 {
        signal = AbortSignal::any(&[signal]).unwrap();
        assert_eq!(signal.source_count(), 1);
        assert!(signal.sources()[0].ptr_eq(controller.signal()));
        chain.push(signal.clone());
    }

    controller.abort(None);
    assert!(chain.iter().all(AbortSignal::aborted));
}

/// An already-aborted input short-circuits composition.
#[test]
fn any_with_aborted_input_short_circuits() {
    let reason = AbortReason::new("gone");
    let aborted = AbortSignal::abort(Some(reason.clone()));
    let pending = AbortController::new();

    let result = AbortSignal::any(&[pending.signal().clone(), aborted.clone()]).unwrap();

    assert!(result.aborted());
    assert_eq!(result.reason(), Some(reason));
    assert_eq!(result.reason_ownership(), Some(ReasonOwnership::Inherited));
    assert_eq!(result.source_count(), 0);
    assert_eq!(result.dependent_count(), 0);
    assert_eq!(pending.signal().dependent_count(), 0);
}

/// Aborting a source aborts its dependents after its own abort steps.
#[test]
fn abort_fans_out_to_dependents() {
    init_tracing();
    let a = AbortController::new();
    let b = AbortController::new();
    let c = AbortSignal::any(&[a.signal().clone(), b.signal().clone()]).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));

    a.signal().add_algorithm(logging_algorithm(&log, "a:algorithm")).unwrap();
    a.signal()
        .add_event_listener("abort", &logging_listener(&log, "a:event"), ListenerOptions::new())
        .unwrap();
    c.add_algorithm(logging_algorithm(&log, "c:algorithm")).unwrap();
    c.add_event_listener("abort", &logging_listener(&log, "c:event"), ListenerOptions::new())
        .unwrap();

    let reason = AbortReason::new(404_u16);
    a.abort(Some(reason.clone()));

    assert_eq!(
        *log.borrow(),
        vec!["a:algorithm", "a:event", "c:algorithm", "c:event"]
    );
    assert_eq!(c.reason(), Some(reason));
    assert_eq!(c.reason_ownership(), Some(ReasonOwnership::Inherited));
    assert!(!b.signal().aborted());

    // A later abort of the other source finds the dependent already aborted.
    b.abort(None);
    assert_eq!(log.borrow().len(), 4);
}

/// Dependents see the source's reason while the source's listeners run.
#[test]
fn dependents_are_aborted_before_source_listeners_run() {
    let a = AbortController::new();
    let c = AbortSignal::any(&[a.signal().clone()]).unwrap();
    let observed = Rc::new(Cell::new(false));

    let observed_clone = observed.clone();
    let dependent = c.clone();
    a.signal()
        .add_event_listener(
            "abort",
            &EventCallback::new(move |_| observed_clone.set(dependent.aborted())),
            ListenerOptions::new(),
        )
        .unwrap();

    a.abort(None);
    assert!(observed.get());
}

/// The same listener identity registers once and fires once.
#[test]
fn duplicate_listener_is_suppressed() {
    let target = GenericEventTarget::new();
    let (count, callback) = counting_callback();

    target.add_event_listener("click", &callback, ListenerOptions::new()).unwrap();
    target
        .add_event_listener("click", &callback, ListenerOptions::new().passive())
        .unwrap();

    assert_eq!(target.get_event_listeners("click").len(), 1);
    target.dispatch_event(&Event::new("click", EventInit::default())).unwrap();
    assert_eq!(count.get(), 1);
}

/// A once listener fires on the first dispatch only and is gone before it runs.
#[test]
fn once_listener_fires_once() {
    let target = GenericEventTarget::new();
    let count = Rc::new(Cell::new(0));
    let registered_during_call = Rc::new(Cell::new(true));

    let count_clone = count.clone();
    let seen = registered_during_call.clone();
    let observer = target.clone();
    let callback = EventCallback::new(move |_| {
        count_clone.set(count_clone.get() + 1);
        seen.set(observer.has_event_listeners("load"));
    });

    target
        .add_event_listener("load", &callback, ListenerOptions::new().once())
        .unwrap();

    for _ in 0..3 {
        target.dispatch_event(&Event::new("load", EventInit::default())).unwrap();
    }

    assert_eq!(count.get(), 1);
    assert!(!registered_during_call.get());
    assert!(target.get_event_listeners("load").is_empty());
}

/// A listener bound to a signal disappears when the signal aborts.
#[test]
fn signal_bound_listener_is_removed_on_abort() {
    let target = GenericEventTarget::new();
    let controller = AbortController::new();
    let (count, callback) = counting_callback();
    let (other_count, other) = counting_callback();

    target
        .add_event_listener(
            "message",
            &callback,
            ListenerOptions::new().signal(controller.signal()),
        )
        .unwrap();
    target.add_event_listener("message", &other, ListenerOptions::new()).unwrap();
    assert!(target.get_event_listeners("message")[0].has_signal);

    target.dispatch_event(&Event::new("message", EventInit::default())).unwrap();
    controller.abort(None);

    let remaining = target.get_event_listeners("message");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].callback, other);

    target.dispatch_event(&Event::new("message", EventInit::default())).unwrap();
    assert_eq!(count.get(), 1);
    assert_eq!(other_count.get(), 2);
}

/// Registering with an aborted signal does nothing.
#[test]
fn listener_with_aborted_signal_is_not_added() {
    let target = GenericEventTarget::new();
    let signal = AbortSignal::abort(None);
    let (_, callback) = counting_callback();

    target
        .add_event_listener("message", &callback, ListenerOptions::new().signal(&signal))
        .unwrap();

    assert!(!target.has_event_listeners("message"));
    assert!(!target.rare_data().is_allocated());
}

/// A dropped target takes its signal-bound cleanup with it.
#[test]
fn signal_bound_listener_outlived_by_signal() {
    let controller = AbortController::new();
    let (_, callback) = counting_callback();

    {
        let target = GenericEventTarget::new();
        target
            .add_event_listener("x", &callback, ListenerOptions::new().signal(controller.signal()))
            .unwrap();
        assert_eq!(controller.signal().algorithm_count(), 1);
    }

    assert_eq!(controller.signal().algorithm_count(), 0);
    controller.abort(None);
    assert!(controller.signal().aborted());
}

/// Removing a signal-bound listener by hand does not leave cleanup behind.
#[test]
fn long_lived_signal_does_not_accumulate_cleanups() {
    let controller = AbortController::new();
    let target = GenericEventTarget::new();
    let (count, callback) = counting_callback();

    for _ in 0..256 {
        target
            .add_event_listener(
                "message",
                &callback,
                ListenerOptions::new().signal(controller.signal()),
            )
            .unwrap();
        target.remove_event_listener("message", &callback, false);
    }
    assert_eq!(controller.signal().algorithm_count(), 0);

    target
        .add_event_listener(
            "message",
            &callback,
            ListenerOptions::new().once().signal(controller.signal()),
        )
        .unwrap();
    target.dispatch_event(&Event::new("message", EventInit::default())).unwrap();
    assert_eq!(count.get(), 1);
    assert_eq!(controller.signal().algorithm_count(), 0);
}

/// Dropping a dependent removes it from every source.
#[test]
fn dropped_dependent_leaves_no_edges() {
    init_tracing();
    let a = AbortController::new();
    let b = AbortController::new();
    let fired = Rc::new(Cell::new(0));

    {
        let c = AbortSignal::any(&[a.signal().clone(), b.signal().clone()]).unwrap();
        let fired_clone = fired.clone();
        c.add_algorithm(AbortAlgorithm::new(move || fired_clone.set(fired_clone.get() + 1)))
            .unwrap();
        assert_eq!(a.signal().dependent_count(), 1);
        assert_eq!(b.signal().dependent_count(), 1);
    }

    assert_eq!(a.signal().dependent_count(), 0);
    assert_eq!(b.signal().dependent_count(), 0);

    a.abort(None);
    b.abort(None);
    assert_eq!(fired.get(), 0);
}

/// Dropping a source leaves the dependent pending with no sources.
#[test]
fn dropped_source_is_unlinked_from_dependent() {
    let a = AbortController::new();
    let b = AbortController::new();
    let c = AbortSignal::any(&[a.signal().clone(), b.signal().clone()]).unwrap();

    drop(a);
    assert_eq!(c.source_count(), 1);
    assert!(c.sources()[0].ptr_eq(b.signal()));

    b.abort(None);
    assert!(c.aborted());
}

/// Passive listeners cannot cancel; other listeners can.
#[test]
fn passive_listener_cannot_cancel() {
    let target = GenericEventTarget::new();
    let canceler = EventCallback::new(|event| event.prevent_default());

    target
        .add_event_listener("touchstart", &canceler, ListenerOptions::new().passive())
        .unwrap();
    let not_canceled = target
        .dispatch_event(&Event::new("touchstart", EventInit::cancelable()))
        .unwrap();
    assert!(not_canceled);

    target.remove_event_listener("touchstart", &canceler, false);
    target
        .add_event_listener("touchstart", &canceler, ListenerOptions::new())
        .unwrap();
    let event = Event::new("touchstart", EventInit::cancelable());
    assert!(!target.dispatch_event(&event).unwrap());
    assert!(event.default_prevented());
}

/// A listener may abort an unrelated signal mid-dispatch.
#[test]
fn listener_can_abort_signal_during_dispatch() {
    let target = GenericEventTarget::new();
    let controller = Rc::new(AbortController::new());
    let signal = controller.signal().clone();

    let trigger = controller.clone();
    let callback = EventCallback::new(move |_| trigger.abort(None));
    target.add_event_listener("cancel", &callback, ListenerOptions::new()).unwrap();

    target.dispatch_event(&Event::new("cancel", EventInit::default())).unwrap();
    assert!(signal.aborted());
}

/// A signal-bound listener on the signal itself sees the abort event first.
#[test]
fn abort_listener_bound_to_own_signal() {
    let controller = AbortController::new();
    let signal = controller.signal().clone();
    let (count, callback) = counting_callback();

    signal
        .add_event_listener("abort", &callback, ListenerOptions::new().signal(&signal))
        .unwrap();

    controller.abort(None);
    // The cleanup algorithm runs before the event, so the listener is gone.
    assert_eq!(count.get(), 0);
    assert!(!signal.has_event_listeners("abort"));
}

/// The cancellable-operation pattern: poll, then bail out with the reason.
#[test]
fn cancellable_operation_polls_signal() {
    fn step(signal: &AbortSignal, done: &mut u32) -> Result<(), DomError> {
        signal.throw_if_aborted()?;
        *done += 1;
        Ok(())
    }

    let controller = AbortController::new();
    let signal = controller.signal().clone();
    let mut done = 0;

    step(&signal, &mut done).unwrap();
    step(&signal, &mut done).unwrap();
    controller.abort(None);

    let err = step(&signal, &mut done).unwrap_err();
    assert_eq!(done, 2);
    assert_eq!(err.exception().name(), dom_core::ExceptionName::Abort);
    assert!(matches!(err, DomError::Aborted { ref reason } if reason.is_abort_error()));
}

/// Event targets recorded during dispatch resolve back to the signal.
#[test]
fn abort_event_targets_the_signal() {
    let controller = AbortController::new();
    let signal = controller.signal().clone();
    let matched = Rc::new(Cell::new(false));

    let matched_clone = matched.clone();
    let expected = signal.downgrade();
    signal
        .add_event_listener(
            "abort",
            &EventCallback::new(move |event| {
                let target = event.target().and_then(|handle| AbortSignal::from_handle(&handle));
                let expected = expected.upgrade();
                matched_clone.set(matches!((target, expected), (Some(t), Some(e)) if t.ptr_eq(&e)));
            }),
            ListenerOptions::new(),
        )
        .unwrap();

    controller.abort(None);
    assert!(matched.get());
}
