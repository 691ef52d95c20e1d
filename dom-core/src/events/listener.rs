//! Event listeners and their registration options.
//!
//! A listener's identity is the triple `(event_type, callback, capture)`.
//! `once`, `passive` and the bound signal are payload, not identity: adding
//! a second listener that differs only in those is a duplicate and ignored.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;

use super::event::Event;
use crate::abort::{AbortAlgorithm, AbortSignal, WeakSignal};

type CallbackFn = dyn Fn(&Event);

/// A listener callback. Clones share identity.
#[derive(Clone)]
pub struct EventCallback(Rc<CallbackFn>);

impl EventCallback {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Event) + 'static,
    {
        Self(Rc::new(callback))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event);
    }

    /// Non-owning handle, used by deferred removals.
    pub fn downgrade(&self) -> WeakEventCallback {
        WeakEventCallback(Rc::downgrade(&self.0))
    }

    fn addr(&self) -> *const () {
        Rc::as_ptr(&self.0).cast()
    }
}

impl PartialEq for EventCallback {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for EventCallback {}

impl fmt::Debug for EventCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventCallback({:p})", self.addr())
    }
}

/// Weak counterpart of [`EventCallback`].
#[derive(Clone)]
pub struct WeakEventCallback(Weak<CallbackFn>);

impl WeakEventCallback {
    pub fn upgrade(&self) -> Option<EventCallback> {
        self.0.upgrade().map(EventCallback)
    }
}

/// Options for `addEventListener`.
#[derive(Clone, Default)]
pub struct ListenerOptions {
    pub capture: bool,
    pub once: bool,
    pub passive: bool,
    pub signal: Option<AbortSignal>,
}

impl ListenerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(mut self) -> Self {
        self.capture = true;
        self
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    pub fn passive(mut self) -> Self {
        self.passive = true;
        self
    }

    /// Remove the listener automatically when `signal` aborts.
    pub fn signal(mut self, signal: &AbortSignal) -> Self {
        self.signal = Some(signal.clone());
        self
    }
}

/// The legacy boolean form of the third `addEventListener` argument.
impl From<bool> for ListenerOptions {
    fn from(capture: bool) -> Self {
        Self {
            capture,
            ..Self::default()
        }
    }
}

impl fmt::Debug for ListenerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerOptions")
            .field("capture", &self.capture)
            .field("once", &self.once)
            .field("passive", &self.passive)
            .field("signal", &self.signal.as_ref().map(AbortSignal::id))
            .finish()
    }
}

/// A registered listener.
pub struct EventListener {
    event_type: String,
    callback: EventCallback,
    capture: bool,
    once: bool,
    passive: bool,
    /// The signal this listener is bound to. Lookup only.
    signal: Option<WeakSignal>,
    /// Cleanup registered on `signal`, withdrawn when the listener leaves.
    abort_algorithm: RefCell<Option<AbortAlgorithm>>,
    /// Set when the listener leaves its list, so an in-flight dispatch
    /// holding a snapshot skips it.
    removed: Cell<bool>,
}

impl EventListener {
    pub fn new(
        event_type: impl Into<String>,
        callback: EventCallback,
        options: &ListenerOptions,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            callback,
            capture: options.capture,
            once: options.once,
            passive: options.passive,
            signal: options.signal.as_ref().map(AbortSignal::downgrade),
            abort_algorithm: RefCell::new(None),
            removed: Cell::new(false),
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn callback(&self) -> &EventCallback {
        &self.callback
    }

    pub fn capture(&self) -> bool {
        self.capture
    }

    pub fn once(&self) -> bool {
        self.once
    }

    pub fn passive(&self) -> bool {
        self.passive
    }

    /// The bound signal, if it is still alive.
    pub fn signal(&self) -> Option<AbortSignal> {
        self.signal.as_ref().and_then(WeakSignal::upgrade)
    }

    pub fn is_removed(&self) -> bool {
        self.removed.get()
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.set(true);
    }

    /// Remember the removal algorithm registered on the bound signal.
    pub(crate) fn bind_abort_algorithm(&self, algorithm: AbortAlgorithm) {
        self.abort_algorithm.replace(Some(algorithm));
    }

    /// Withdraw the removal algorithm from the bound signal.
    ///
    /// Must run with no rare data block borrowed; a busy signal keeps the
    /// algorithm, which is harmless once it finds the listener gone.
    pub(crate) fn detach_abort_algorithm(&self) {
        let Some(algorithm) = self.abort_algorithm.take() else {
            return;
        };
        let Some(signal) = self.signal() else {
            return;
        };
        let withdrawn = signal
            .rare()
            .try_write_existing(|block| block.remove_algorithm(&algorithm));
        if withdrawn.is_none() {
            tracing::trace!(signal = ?signal.id(), "signal busy; removal algorithm kept");
        }
    }

    /// Whether this listener has the identity `(event_type, callback, capture)`.
    pub fn matches(&self, event_type: &str, callback: &EventCallback, capture: bool) -> bool {
        self.event_type == event_type && self.callback == *callback && self.capture == capture
    }

    pub fn same_identity(&self, other: &EventListener) -> bool {
        self.matches(&other.event_type, &other.callback, other.capture)
    }

    pub fn info(&self) -> ListenerInfo {
        ListenerInfo {
            event_type: self.event_type.clone(),
            callback: self.callback.clone(),
            capture: self.capture,
            once: self.once,
            passive: self.passive,
            has_signal: self.signal.is_some(),
        }
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        self.detach_abort_algorithm();
    }
}

impl fmt::Debug for EventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListener")
            .field("type", &self.event_type)
            .field("callback", &self.callback)
            .field("capture", &self.capture)
            .field("once", &self.once)
            .field("passive", &self.passive)
            .field("removed", &self.removed.get())
            .finish()
    }
}

/// Read-only snapshot of a registered listener.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerInfo {
    pub event_type: String,
    #[serde(skip)]
    pub callback: EventCallback,
    pub capture: bool,
    pub once: bool,
    pub passive: bool,
    pub has_signal: bool,
}
