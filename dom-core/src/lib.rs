//! DOM Core
//!
//! This crate provides the cancellation and event-dispatch core of a WHATWG
//! DOM engine. It implements:
//!
//! - The `EventTarget` contract (listener registration and dispatch)
//! - `AbortController` / `AbortSignal`, including `AbortSignal.any`
//! - Lazily allocated per-object storage (rare data) backing both
//! - A DOMException-lite used for default abort reasons and errors
//!
//! Everything runs on one thread, synchronously. Objects are reference
//! counted; graph edges between signals are weak.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `rare`: Lazily allocated side-table for listeners, algorithms, signal
//!   edges and user data
//! - `events`: Events, listeners and the `EventTarget` trait
//! - `abort`: Signals, controllers, abort algorithms and the signal graph
//! - `exception`: `DomException` and the crate error type
//!
//! # Example
//!
//! ```rust
//! use dom_core::{AbortController, AbortSignal, EventCallback, EventTarget, ListenerOptions};
//!
//! let user = AbortController::new();
//! let timeout = AbortController::new();
//! let combined = AbortSignal::any(&[user.signal().clone(), timeout.signal().clone()]).unwrap();
//!
//! let on_abort = EventCallback::new(|event| println!("aborted: {}", event.event_type()));
//! combined
//!     .add_event_listener("abort", &on_abort, ListenerOptions::new())
//!     .unwrap();
//!
//! user.abort(None);
//! assert!(combined.aborted());
//! assert!(!timeout.signal().aborted());
//! ```

pub mod abort;
pub mod events;
pub mod exception;
pub mod rare;

pub use abort::{AbortAlgorithm, AbortController, AbortReason, AbortSignal};
pub use events::{
    Event, EventCallback, EventInit, EventTarget, GenericEventTarget, ListenerOptions,
};
pub use exception::{DomError, DomException, ExceptionName, Result};
pub use rare::RareData;
