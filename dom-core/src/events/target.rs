//! The EventTarget contract.
//!
//! Any object that wants events implements [`EventTarget`] by handing out
//! its [`RareData`] slot and a [`TargetHandle`] naming itself. Registration,
//! removal and dispatch are default methods, written once here.

use std::any::Any;
use std::fmt;
use std::rc::{Rc, Weak};

use super::dispatch;
use super::event::Event;
use super::listener::{EventCallback, EventListener, ListenerInfo, ListenerOptions};
use crate::abort::AbortAlgorithm;
use crate::exception::Result;
use crate::rare::{RareData, WeakRareData};

/// Non-owning reference to an event target, as seen from an [`Event`].
#[derive(Clone)]
pub struct TargetHandle(Weak<dyn Any>);

impl TargetHandle {
    pub fn new<T: Any>(object: &Rc<T>) -> Self {
        let weak: Weak<T> = Rc::downgrade(object);
        Self(weak)
    }

    pub fn upgrade(&self) -> Option<Rc<dyn Any>> {
        self.0.upgrade()
    }

    /// Recover the concrete object behind the handle.
    pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
        self.0.upgrade()?.downcast::<T>().ok()
    }

    pub fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Whether this handle names `target`.
    pub fn refers_to(&self, target: &(impl EventTarget + ?Sized)) -> bool {
        *self == target.target_handle()
    }
}

impl PartialEq for TargetHandle {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetHandle")
            .field("live", &self.is_live())
            .finish()
    }
}

/// The dispatch and registration contract.
pub trait EventTarget {
    /// The slot that stores this target's listeners.
    fn rare_data(&self) -> &RareData;

    /// Handle recorded as `target`/`currentTarget` while dispatching here.
    fn target_handle(&self) -> TargetHandle;

    /// Register `callback` for `event_type`.
    ///
    /// Does nothing if `options.signal` is already aborted or an identical
    /// `(event_type, callback, capture)` listener exists. With a signal, the
    /// listener is removed automatically when that signal aborts.
    fn add_event_listener(
        &self,
        event_type: &str,
        callback: &EventCallback,
        options: ListenerOptions,
    ) -> Result<()> {
        if options.signal.as_ref().is_some_and(|signal| signal.aborted()) {
            tracing::trace!(event_type, "signal already aborted; listener not added");
            return Ok(());
        }

        let listener = Rc::new(EventListener::new(event_type, callback.clone(), &options));
        if !self.rare_data().add_listener(listener.clone())? {
            tracing::trace!(event_type, "duplicate listener ignored");
            return Ok(());
        }

        if let Some(signal) = &options.signal {
            let removal = ListenerRemoval {
                storage: self.rare_data().downgrade(),
                event_type: event_type.to_owned(),
                callback: callback.downgrade(),
                capture: options.capture,
            };
            let algorithm = AbortAlgorithm::new(move || removal.run());
            if let Err(err) = signal.add_algorithm(algorithm.clone()) {
                self.rare_data().remove_listener(event_type, callback, options.capture);
                return Err(err);
            }
            listener.bind_abort_algorithm(algorithm);
        }

        tracing::trace!(
            event_type,
            capture = options.capture,
            once = options.once,
            passive = options.passive,
            "listener added"
        );
        Ok(())
    }

    /// Remove the listener matching `(event_type, callback, capture)`.
    fn remove_event_listener(&self, event_type: &str, callback: &EventCallback, capture: bool) {
        if self
            .rare_data()
            .remove_listener(event_type, callback, capture)
            .is_some()
        {
            tracing::trace!(event_type, capture, "listener removed");
        }
    }

    /// Dispatch `event` at this target.
    ///
    /// Returns `false` if a listener canceled the event. Fails with
    /// `InvalidState` for an event that is mid-dispatch or uninitialized.
    fn dispatch_event(&self, event: &Event) -> Result<bool> {
        dispatch::dispatch(self.rare_data(), self.target_handle(), event, false)
    }

    fn has_event_listeners(&self, event_type: &str) -> bool {
        self.rare_data().has_listeners(event_type)
    }

    /// Listeners for `event_type`, in registration order.
    fn get_event_listeners(&self, event_type: &str) -> Vec<ListenerInfo> {
        self.rare_data()
            .listeners(event_type)
            .iter()
            .map(|listener| listener.info())
            .collect()
    }
}

/// Deferred `removeEventListener` run by a signal's abort algorithm.
struct ListenerRemoval {
    storage: WeakRareData,
    event_type: String,
    callback: super::listener::WeakEventCallback,
    capture: bool,
}

impl ListenerRemoval {
    fn run(&self) {
        // A dead callback means the listener already left its list.
        let Some(callback) = self.callback.upgrade() else {
            return;
        };
        let removed = self
            .storage
            .with(|block| block.remove_listener(&self.event_type, &callback, self.capture))
            .flatten();
        if let Some(listener) = removed {
            listener.detach_abort_algorithm();
            tracing::trace!(event_type = %self.event_type, "listener removed by abort signal");
        }
    }
}

/// A target with no behavior of its own, the `new EventTarget()` object.
#[derive(Clone, Default)]
pub struct GenericEventTarget {
    inner: Rc<GenericTargetInner>,
}

#[derive(Default)]
struct GenericTargetInner {
    rare: RareData,
}

impl GenericEventTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recover the target named by `handle`.
    pub fn from_handle(handle: &TargetHandle) -> Option<Self> {
        handle
            .downcast::<GenericTargetInner>()
            .map(|inner| Self { inner })
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl EventTarget for GenericEventTarget {
    fn rare_data(&self) -> &RareData {
        &self.inner.rare
    }

    fn target_handle(&self) -> TargetHandle {
        TargetHandle::new(&self.inner)
    }
}

impl fmt::Debug for GenericEventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericEventTarget")
            .field("rare", &self.inner.rare)
            .finish()
    }
}
