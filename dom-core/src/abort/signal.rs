//! Signal Implementation
//!
//! An [`AbortSignal`] is a cancellation token. It starts pending and moves
//! to aborted exactly once; after that its reason never changes.
//!
//! # How Aborting Works
//!
//! 1. If the signal is already aborted, nothing happens.
//!
//! 2. The reason is stored: the caller's value, or a fresh `AbortError`.
//!
//! 3. Every pending dependent receives the same reason and is queued.
//!
//! 4. The signal runs its abort steps: each abort algorithm once, in
//!    registration order, then a trusted `"abort"` event.
//!
//! 5. Each queued dependent runs its abort steps, in discovery order.
//!
//! # Memory Layout
//!
//! A signal is a reference-counted handle. Cloning it acquires a strong
//! reference and dropping it releases one. Algorithms, listeners and graph
//! edges all live in the signal's rare data, so a signal nobody listens to
//! is an id, a state cell and one empty pointer.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::algorithm::AbortAlgorithm;
use super::graph::{self, SignalId, SignalKey, SignalKind, WeakSignal};
use super::reason::{AbortReason, ReasonOwnership};
use crate::events::{self, Event, EventInit, EventTarget, TargetHandle};
use crate::exception::{DomError, Result};
use crate::rare::RareData;

#[derive(Debug, Clone)]
enum SignalState {
    Pending,
    Aborted {
        reason: AbortReason,
        ownership: ReasonOwnership,
    },
}

pub(crate) struct SignalInner {
    id: SignalId,
    kind: SignalKind,
    state: RefCell<SignalState>,
    rare: RareData,
}

impl Drop for SignalInner {
    fn drop(&mut self) {
        let key: SignalKey = self;
        graph::unlink_all(key, self.id, &self.rare);
        tracing::trace!(signal = ?self.id, "signal destroyed");
    }
}

/// A cancellation token.
///
/// # Example
///
/// ```rust
/// use dom_core::{AbortAlgorithm, AbortController};
///
/// let controller = AbortController::new();
/// let signal = controller.signal().clone();
///
/// signal
///     .add_algorithm(AbortAlgorithm::new(|| println!("cleaning up")))
///     .unwrap();
///
/// controller.abort(None);
/// assert!(signal.aborted());
/// assert!(signal.throw_if_aborted().is_err());
/// ```
#[derive(Clone)]
pub struct AbortSignal {
    inner: Rc<SignalInner>,
}

impl AbortSignal {
    /// A pending, independent signal.
    pub(crate) fn new() -> Self {
        Self::with_state(SignalKind::Independent, SignalState::Pending)
    }

    /// A pending signal that will take sources.
    pub(crate) fn new_dependent() -> Self {
        Self::with_state(SignalKind::Dependent, SignalState::Pending)
    }

    fn with_state(kind: SignalKind, state: SignalState) -> Self {
        let inner = SignalInner {
            id: SignalId::new(),
            kind,
            state: RefCell::new(state),
            rare: RareData::new(),
        };
        Self {
            inner: Rc::new(inner),
        }
    }

    pub(crate) fn from_inner(inner: Rc<SignalInner>) -> Self {
        Self { inner }
    }

    /// A signal that is already aborted.
    ///
    /// Without a reason, the signal creates and owns a default `AbortError`.
    pub fn abort(reason: Option<AbortReason>) -> Self {
        let (reason, ownership) = match reason {
            Some(reason) => (reason, ReasonOwnership::Supplied),
            None => (AbortReason::abort_error(), ReasonOwnership::Owned),
        };
        Self::with_state(
            SignalKind::Independent,
            SignalState::Aborted { reason, ownership },
        )
    }

    /// A signal that aborts as soon as any of `signals` aborts.
    ///
    /// If an input is already aborted, the result is created aborted with
    /// that input's reason and no edges are built. Otherwise the result
    /// links directly to every independent signal behind the inputs.
    pub fn any(signals: &[AbortSignal]) -> Result<Self> {
        if let Some(reason) = signals.iter().find_map(AbortSignal::reason) {
            tracing::debug!(inputs = signals.len(), "composed signal created aborted");
            return Ok(Self::with_state(
                SignalKind::Independent,
                SignalState::Aborted {
                    reason,
                    ownership: ReasonOwnership::Inherited,
                },
            ));
        }

        let result = Self::new_dependent();
        for signal in signals {
            for source in graph::flatten(signal) {
                graph::link(&source, &result)?;
            }
        }

        tracing::debug!(
            signal = ?result.id(),
            inputs = signals.len(),
            sources = result.source_count(),
            "composed signal"
        );
        Ok(result)
    }

    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    pub fn kind(&self) -> SignalKind {
        self.inner.kind
    }

    pub fn is_dependent(&self) -> bool {
        self.kind() == SignalKind::Dependent
    }

    pub fn aborted(&self) -> bool {
        matches!(*self.inner.state.borrow(), SignalState::Aborted { .. })
    }

    /// The abort reason, or `None` while pending.
    pub fn reason(&self) -> Option<AbortReason> {
        match &*self.inner.state.borrow() {
            SignalState::Pending => None,
            SignalState::Aborted { reason, .. } => Some(reason.clone()),
        }
    }

    /// How the reason came to be, or `None` while pending.
    pub fn reason_ownership(&self) -> Option<ReasonOwnership> {
        match &*self.inner.state.borrow() {
            SignalState::Pending => None,
            SignalState::Aborted { ownership, .. } => Some(*ownership),
        }
    }

    /// Whether this signal created its own reason.
    pub fn owns_reason(&self) -> bool {
        self.reason_ownership() == Some(ReasonOwnership::Owned)
    }

    /// `Err(Aborted)` carrying the reason if the signal is aborted.
    pub fn throw_if_aborted(&self) -> Result<()> {
        match self.reason() {
            Some(reason) => Err(DomError::Aborted { reason }),
            None => Ok(()),
        }
    }

    /// Register an algorithm to run when the signal aborts.
    ///
    /// Does nothing if the signal is already aborted or the algorithm is
    /// already registered.
    pub fn add_algorithm(&self, algorithm: AbortAlgorithm) -> Result<()> {
        if self.aborted() {
            return Ok(());
        }
        let id = algorithm.id();
        if self.inner.rare.add_algorithm(algorithm)? {
            tracing::trace!(signal = ?self.id(), algorithm = ?id, "abort algorithm added");
        }
        Ok(())
    }

    /// Unregister an algorithm. Returns whether it was pending.
    pub fn remove_algorithm(&self, algorithm: &AbortAlgorithm) -> bool {
        self.inner.rare.remove_algorithm(algorithm)
    }

    pub fn algorithm_count(&self) -> usize {
        self.inner.rare.algorithm_count()
    }

    /// Live source signals, in link order.
    pub fn sources(&self) -> Vec<AbortSignal> {
        graph::live(&self.inner.rare.sources())
    }

    pub fn source_count(&self) -> usize {
        self.inner
            .rare
            .sources()
            .iter()
            .filter(|edge| edge.is_live())
            .count()
    }

    /// Live dependent signals, in link order.
    pub fn dependents(&self) -> Vec<AbortSignal> {
        graph::live(&self.inner.rare.dependents())
    }

    pub fn dependent_count(&self) -> usize {
        self.inner
            .rare
            .dependents()
            .iter()
            .filter(|edge| edge.is_live())
            .count()
    }

    /// Number of strong references to this signal.
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakSignal {
        WeakSignal(Rc::downgrade(&self.inner))
    }

    /// Recover the signal an event was dispatched at.
    pub fn from_handle(handle: &TargetHandle) -> Option<Self> {
        handle.downcast::<SignalInner>().map(Self::from_inner)
    }

    pub(crate) fn rare(&self) -> &RareData {
        &self.inner.rare
    }

    pub(crate) fn key(&self) -> SignalKey {
        Rc::as_ptr(&self.inner)
    }

    /// Abort the signal and everything that depends on it.
    pub(crate) fn signal_abort(&self, reason: Option<AbortReason>) {
        if self.aborted() {
            tracing::trace!(signal = ?self.id(), "already aborted");
            return;
        }

        let (reason, ownership) = match reason {
            Some(reason) => (reason, ReasonOwnership::Supplied),
            None => (AbortReason::abort_error(), ReasonOwnership::Owned),
        };
        self.set_aborted(reason.clone(), ownership);

        let mut to_fire = Vec::new();
        for dependent in self.dependents() {
            if dependent.aborted() {
                continue;
            }
            dependent.set_aborted(reason.clone(), ReasonOwnership::Inherited);
            to_fire.push(dependent);
        }

        tracing::debug!(
            signal = ?self.id(),
            ?ownership,
            dependents = to_fire.len(),
            "signal aborted"
        );

        self.run_abort_steps();
        for dependent in &to_fire {
            dependent.run_abort_steps();
        }
    }

    fn set_aborted(&self, reason: AbortReason, ownership: ReasonOwnership) {
        *self.inner.state.borrow_mut() = SignalState::Aborted { reason, ownership };
    }

    /// Run and release every algorithm, then fire `"abort"`.
    fn run_abort_steps(&self) {
        let algorithms = self.inner.rare.take_algorithms();
        let count = algorithms.len();
        for algorithm in algorithms {
            algorithm.run();
        }

        let event = Event::new("abort", EventInit::default());
        if let Err(err) = events::dispatch(&self.inner.rare, self.target_handle(), &event, true) {
            tracing::warn!(signal = ?self.id(), %err, "abort event not dispatched");
        }

        tracing::trace!(signal = ?self.id(), algorithms = count, "abort steps finished");
    }
}

impl EventTarget for AbortSignal {
    fn rare_data(&self) -> &RareData {
        &self.inner.rare
    }

    fn target_handle(&self) -> TargetHandle {
        TargetHandle::new(&self.inner)
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortSignal")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("state", &*self.inner.state.borrow())
            .field("rare", &self.inner.rare)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
