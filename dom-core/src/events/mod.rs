//! Events
//!
//! This module implements the `EventTarget` contract: listener
//! registration, removal and synchronous dispatch.
//!
//! # Concepts
//!
//! ## Targets
//!
//! Any type becomes an event target by implementing [`EventTarget`], which
//! only asks for a [`RareData`](crate::rare::RareData) slot and a
//! [`TargetHandle`]. All dispatch logic comes from the trait's default
//! methods, so node-like types delegate instead of inheriting.
//!
//! ## Listeners
//!
//! Listeners are stored per event type in registration order. The identity
//! of a listener is `(type, callback, capture)`; registering the same
//! identity twice keeps the first registration only. A listener bound to an
//! [`AbortSignal`](crate::abort::AbortSignal) removes itself when the signal
//! aborts.
//!
//! ## Dispatch
//!
//! Only the target phase is implemented. Listeners run synchronously on the
//! caller's stack; `once` listeners are removed before they run, and
//! `passive` listeners cannot cancel the event.

mod dispatch;
mod event;
mod listener;
mod target;

pub use dispatch::{current_event_type, dispatch_depth};
pub use event::{CustomEventInit, Event, EventInit, EventPhase};
pub use listener::{
    EventCallback, EventListener, ListenerInfo, ListenerOptions, WeakEventCallback,
};
pub use target::{EventTarget, GenericEventTarget, TargetHandle};

pub(crate) use dispatch::dispatch;
