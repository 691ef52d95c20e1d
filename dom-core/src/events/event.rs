//! Event Implementation
//!
//! An [`Event`] is the value handed to every listener during dispatch. It
//! carries the immutable init flags (`bubbles`, `cancelable`, `composed`),
//! an optional `detail` payload for custom events, and the mutable dispatch
//! flags that listeners flip (`preventDefault`, `stopPropagation`, ...).
//!
//! All flags live in `Cell`s so that listeners, which only ever see a shared
//! `&Event`, can update them while the dispatcher keeps reading them.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::target::TargetHandle;

thread_local! {
    /// Origin for `timeStamp` values created on this thread.
    static TIME_ORIGIN: Instant = Instant::now();
}

fn now_ms() -> f64 {
    TIME_ORIGIN.with(|origin| origin.elapsed().as_secs_f64() * 1000.0)
}

/// Options accepted by the `Event` constructor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventInit {
    pub bubbles: bool,
    pub cancelable: bool,
    pub composed: bool,
}

impl EventInit {
    pub fn cancelable() -> Self {
        Self {
            cancelable: true,
            ..Self::default()
        }
    }
}

/// Options accepted by the `CustomEvent` constructor.
#[derive(Clone, Default)]
pub struct CustomEventInit {
    pub event: EventInit,
    pub detail: Option<Rc<dyn Any>>,
}

/// Which phase of dispatch an event is in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum EventPhase {
    #[default]
    None = 0,
    Capturing = 1,
    AtTarget = 2,
    Bubbling = 3,
}

/// A DOM event.
pub struct Event {
    event_type: RefCell<String>,
    bubbles: Cell<bool>,
    cancelable: Cell<bool>,
    composed: bool,
    detail: Option<Rc<dyn Any>>,
    time_stamp: f64,

    target: RefCell<Option<TargetHandle>>,
    current_target: RefCell<Option<TargetHandle>>,
    phase: Cell<EventPhase>,

    // flags
    initialized: Cell<bool>,
    dispatching: Cell<bool>,
    stop_propagation: Cell<bool>,
    stop_immediate_propagation: Cell<bool>,
    canceled: Cell<bool>,
    in_passive_listener: Cell<bool>,
    is_trusted: Cell<bool>,
}

impl Event {
    /// Create an initialized event of the given type.
    pub fn new(event_type: impl Into<String>, init: EventInit) -> Self {
        Self::build(event_type.into(), init, None, true)
    }

    /// Create an initialized event carrying a `detail` payload.
    pub fn new_custom(event_type: impl Into<String>, init: CustomEventInit) -> Self {
        Self::build(event_type.into(), init.event, init.detail, true)
    }

    /// Create an event that must be initialized with [`Event::init_event`]
    /// before it can be dispatched.
    pub fn create_uninitialized() -> Self {
        Self::build(String::new(), EventInit::default(), None, false)
    }

    fn build(
        event_type: String,
        init: EventInit,
        detail: Option<Rc<dyn Any>>,
        initialized: bool,
    ) -> Self {
        Self {
            event_type: RefCell::new(event_type),
            bubbles: Cell::new(init.bubbles),
            cancelable: Cell::new(init.cancelable),
            composed: init.composed,
            detail,
            time_stamp: now_ms(),
            target: RefCell::new(None),
            current_target: RefCell::new(None),
            phase: Cell::new(EventPhase::None),
            initialized: Cell::new(initialized),
            dispatching: Cell::new(false),
            stop_propagation: Cell::new(false),
            stop_immediate_propagation: Cell::new(false),
            canceled: Cell::new(false),
            in_passive_listener: Cell::new(false),
            is_trusted: Cell::new(false),
        }
    }

    /// Legacy initializer. Ignored while the event is being dispatched.
    pub fn init_event(&self, event_type: impl Into<String>, bubbles: bool, cancelable: bool) {
        if self.dispatching.get() {
            return;
        }
        self.initialized.set(true);
        self.stop_propagation.set(false);
        self.stop_immediate_propagation.set(false);
        self.canceled.set(false);
        self.is_trusted.set(false);
        self.target.replace(None);
        *self.event_type.borrow_mut() = event_type.into();
        self.bubbles.set(bubbles);
        self.cancelable.set(cancelable);
    }

    pub fn event_type(&self) -> String {
        self.event_type.borrow().clone()
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles.get()
    }

    pub fn cancelable(&self) -> bool {
        self.cancelable.get()
    }

    pub fn composed(&self) -> bool {
        self.composed
    }

    /// Payload supplied through [`CustomEventInit`].
    pub fn detail(&self) -> Option<Rc<dyn Any>> {
        self.detail.clone()
    }

    /// Milliseconds since this thread's time origin.
    pub fn time_stamp(&self) -> f64 {
        self.time_stamp
    }

    pub fn is_trusted(&self) -> bool {
        self.is_trusted.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    pub fn is_dispatching(&self) -> bool {
        self.dispatching.get()
    }

    pub fn target(&self) -> Option<TargetHandle> {
        self.target.borrow().clone()
    }

    /// Legacy alias of [`Event::target`].
    pub fn src_element(&self) -> Option<TargetHandle> {
        self.target()
    }

    pub fn current_target(&self) -> Option<TargetHandle> {
        self.current_target.borrow().clone()
    }

    pub fn event_phase(&self) -> EventPhase {
        self.phase.get()
    }

    /// The invocation path. Only the target phase exists here, so this is
    /// the current target while dispatching and empty otherwise.
    pub fn composed_path(&self) -> Vec<TargetHandle> {
        self.current_target.borrow().iter().cloned().collect()
    }

    pub fn stop_propagation(&self) {
        self.stop_propagation.set(true);
    }

    pub fn stop_immediate_propagation(&self) {
        self.stop_propagation.set(true);
        self.stop_immediate_propagation.set(true);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.stop_propagation.get()
    }

    pub fn immediate_propagation_stopped(&self) -> bool {
        self.stop_immediate_propagation.get()
    }

    pub fn cancel_bubble(&self) -> bool {
        self.stop_propagation.get()
    }

    /// Setting `true` stops propagation; setting `false` does nothing.
    pub fn set_cancel_bubble(&self, value: bool) {
        if value {
            self.stop_propagation.set(true);
        }
    }

    /// Cancel the event. Has no effect on non-cancelable events or from
    /// inside a passive listener.
    pub fn prevent_default(&self) {
        if self.cancelable.get() && !self.in_passive_listener.get() {
            self.canceled.set(true);
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.canceled.get()
    }

    pub fn return_value(&self) -> bool {
        !self.canceled.get()
    }

    /// Setting `false` behaves like [`Event::prevent_default`].
    pub fn set_return_value(&self, value: bool) {
        if !value {
            self.prevent_default();
        }
    }

    pub(crate) fn begin_dispatch(&self, target: TargetHandle, trusted: bool) {
        self.is_trusted.set(trusted);
        self.dispatching.set(true);
        self.target.replace(Some(target.clone()));
        self.current_target.replace(Some(target));
        self.phase.set(EventPhase::AtTarget);
    }

    pub(crate) fn end_dispatch(&self) {
        self.phase.set(EventPhase::None);
        self.current_target.replace(None);
        self.in_passive_listener.set(false);
        self.dispatching.set(false);
        self.stop_propagation.set(false);
        self.stop_immediate_propagation.set(false);
    }

    pub(crate) fn set_in_passive_listener(&self, value: bool) {
        self.in_passive_listener.set(value);
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type", &*self.event_type.borrow())
            .field("bubbles", &self.bubbles.get())
            .field("cancelable", &self.cancelable.get())
            .field("composed", &self.composed)
            .field("has_detail", &self.detail.is_some())
            .field("phase", &self.phase.get())
            .field("dispatching", &self.dispatching.get())
            .field("default_prevented", &self.canceled.get())
            .field("is_trusted", &self.is_trusted.get())
            .finish()
    }
}
