//! Abort Signals
//!
//! This module implements cancellation: [`AbortController`],
//! [`AbortSignal`] and the graph that links composed signals to the signals
//! they follow.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A signal is pending until it is aborted, and aborted forever after.
//! Aborting stores a reason, runs the registered [`AbortAlgorithm`]s once
//! and fires an `"abort"` event at the signal, which is itself an
//! [`EventTarget`](crate::events::EventTarget).
//!
//! ## Controllers
//!
//! A controller owns one signal and is the only way to abort it from
//! outside. Consumers receive clones of the signal and observe it.
//!
//! ## Composition
//!
//! `AbortSignal::any` builds a dependent signal that aborts when any input
//! does. Dependents always link straight to independent signals, however
//! deeply `any` calls are nested.
//!
//! # Implementation Notes
//!
//! Everything is single-threaded and synchronous. Aborting runs every
//! callback to completion on the caller's stack; it does not interrupt work
//! already in progress, which has to poll `aborted()` or
//! `throw_if_aborted()` itself.

mod algorithm;
mod controller;
mod graph;
mod reason;
mod signal;

pub use algorithm::{AbortAlgorithm, AlgorithmId};
pub use controller::AbortController;
pub use graph::{SignalId, SignalKind, WeakSignal};
pub use reason::{AbortReason, ReasonOwnership};
pub use signal::AbortSignal;

pub(crate) use graph::SignalKey;
