//! Signal Graph
//!
//! Composed signals form a bipartite graph: independent signals on one side,
//! dependent signals (results of `AbortSignal::any`) on the other. Every edge
//! is stored twice, as a source edge on the dependent and as a dependent
//! edge on the source, and both copies are weak.
//!
//! # Design Decisions
//!
//! 1. Edges are flattened at composition time. A dependent signal only ever
//!    lists independent signals as sources, so aborting a source reaches
//!    every dependent in one hop and no chain needs to be walked.
//!
//! 2. Edges never extend lifetimes. A signal being destroyed removes itself
//!    from the other end of each of its edges, so a traversal never finds a
//!    stale entry for a destroyed signal.

use std::rc::Weak;
use std::sync::atomic::{AtomicU64, Ordering};

use super::signal::{AbortSignal, SignalInner};
use crate::exception::Result;
use crate::rare::RareData;

/// Unique identifier for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(u64);

impl SignalId {
    /// Generate a new unique signal ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SignalId {
    fn default() -> Self {
        Self::new()
    }
}

/// Which side of the graph a signal is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// A signal aborted directly, through its controller or the `abort`
    /// factory. May have dependents, never has sources.
    Independent,

    /// A signal created by `any`. Has sources, never has dependents.
    Dependent,
}

/// Address of a signal, used to find its edges without a live reference.
pub(crate) type SignalKey = *const SignalInner;

/// A non-owning reference to a signal.
#[derive(Clone)]
pub struct WeakSignal(pub(crate) Weak<SignalInner>);

impl WeakSignal {
    pub fn upgrade(&self) -> Option<AbortSignal> {
        self.0.upgrade().map(AbortSignal::from_inner)
    }

    pub fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn key(&self) -> SignalKey {
        self.0.as_ptr()
    }
}

impl std::fmt::Debug for WeakSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.upgrade() {
            Some(signal) => write!(f, "WeakSignal({:?})", signal.id()),
            None => f.write_str("WeakSignal(<dead>)"),
        }
    }
}

/// Record `source -> dependent` on both ends.
///
/// Linking an existing edge is a no-op. If the second half cannot be
/// stored, the first half is rolled back.
pub(crate) fn link(source: &AbortSignal, dependent: &AbortSignal) -> Result<()> {
    debug_assert!(
        !source.is_dependent(),
        "dependent signal {:?} used as a source",
        source.id()
    );

    if !dependent.rare().add_source(source.downgrade())? {
        return Ok(());
    }
    if let Err(err) = source.rare().add_dependent(dependent.downgrade()) {
        dependent.rare().remove_source(source.key());
        return Err(err);
    }
    Ok(())
}

/// The independent signals `signal` stands for.
///
/// An independent signal stands for itself. A dependent signal stands for
/// its live sources, which is what makes composition flat.
pub(crate) fn flatten(signal: &AbortSignal) -> Vec<AbortSignal> {
    if !signal.is_dependent() {
        return vec![signal.clone()];
    }

    live(&signal.rare().sources())
        .into_iter()
        .inspect(|source| {
            debug_assert!(
                !source.aborted() && !source.is_dependent(),
                "flattened source {:?} must be pending and independent",
                source.id()
            );
        })
        .collect()
}

/// Upgrade every edge whose signal is still alive.
pub(crate) fn live(edges: &[WeakSignal]) -> Vec<AbortSignal> {
    edges.iter().filter_map(WeakSignal::upgrade).collect()
}

/// Remove every edge touching the signal at `key`.
///
/// Runs from the signal's destructor, so it never panics on a borrowed
/// block; a skipped edge is logged instead.
pub(crate) fn unlink_all(key: SignalKey, id: SignalId, rare: &RareData) {
    if !rare.is_allocated() {
        return;
    }
    let Some((sources, dependents)) =
        rare.try_write_existing(|block| (block.take_sources(), block.take_dependents()))
    else {
        tracing::warn!(signal = ?id, "signal busy; graph edges left behind");
        return;
    };

    for source in sources.iter().filter_map(WeakSignal::upgrade) {
        let removed = source
            .rare()
            .try_write_existing(|block| block.remove_dependent(key));
        if removed.is_none() {
            tracing::warn!(
                signal = ?id,
                source = ?source.id(),
                "source busy; dependent edge left behind"
            );
        }
    }

    for dependent in dependents.iter().filter_map(WeakSignal::upgrade) {
        let removed = dependent
            .rare()
            .try_write_existing(|block| block.remove_source(key));
        if removed.is_none() {
            tracing::warn!(
                signal = ?id,
                dependent = ?dependent.id(),
                "dependent busy; source edge left behind"
            );
        }
    }

    if !sources.is_empty() || !dependents.is_empty() {
        tracing::debug!(
            signal = ?id,
            sources = sources.len(),
            dependents = dependents.len(),
            "signal unlinked from graph"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::DomError;
    use crate::rare::fail_reservation_after;

    #[test]
    fn signal_ids_are_unique() {
        let id1 = SignalId::new();
        let id2 = SignalId::new();
        assert_ne!(id1, id2);
        assert!(id2.raw() > id1.raw());
    }

    #[test]
    fn link_is_idempotent() {
        let source = AbortSignal::new();
        let dependent = AbortSignal::new_dependent();

        link(&source, &dependent).unwrap();
        link(&source, &dependent).unwrap();

        assert_eq!(dependent.source_count(), 1);
        assert_eq!(source.dependent_count(), 1);
    }

    #[test]
    fn flatten_replaces_dependent_with_its_sources() {
        let a = AbortSignal::new();
        let b = AbortSignal::new();
        let composed = AbortSignal::new_dependent();
        link(&a, &composed).unwrap();
        link(&b, &composed).unwrap();

        let flat = flatten(&composed);
        assert_eq!(flat.len(), 2);
        assert!(flat[0].ptr_eq(&a));
        assert!(flat[1].ptr_eq(&b));

        let own = flatten(&a);
        assert_eq!(own.len(), 1);
        assert!(own[0].ptr_eq(&a));
    }

    #[test]
    fn weak_signal_does_not_keep_signal_alive() {
        let signal = AbortSignal::new();
        let weak = signal.downgrade();
        assert!(weak.is_live());
        assert!(weak.upgrade().unwrap().ptr_eq(&signal));

        drop(signal);
        assert!(!weak.is_live());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn failed_dependent_edge_rolls_back_source_edge() {
        let source = AbortSignal::new();
        let dependent = AbortSignal::new_dependent();

        fail_reservation_after(1);
        assert_eq!(link(&source, &dependent), Err(DomError::OutOfMemory));
        assert!(dependent.rare().sources().is_empty());
        assert!(source.rare().dependents().is_empty());

        link(&source, &dependent).unwrap();
        assert_eq!(dependent.source_count(), 1);
        assert_eq!(source.dependent_count(), 1);
    }

    #[test]
    fn failed_any_leaves_inputs_unlinked() {
        let a = AbortSignal::new();
        let b = AbortSignal::new();

        // The first link succeeds on both ends, the second fails.
        fail_reservation_after(2);
        let result = AbortSignal::any(&[a.clone(), b.clone()]);
        assert!(matches!(result, Err(DomError::OutOfMemory)));

        assert!(a.rare().dependents().is_empty());
        assert!(b.rare().dependents().is_empty());
        assert_eq!(a.dependent_count(), 0);
    }

    #[test]
    fn unlink_skips_a_busy_block_without_panicking() {
        let source = AbortSignal::new();
        let dependent = AbortSignal::new_dependent();
        link(&source, &dependent).unwrap();

        let guard = dependent.rare().ensure().borrow_mut();
        unlink_all(dependent.key(), dependent.id(), dependent.rare());
        drop(guard);

        assert_eq!(dependent.source_count(), 1);
        assert_eq!(source.dependent_count(), 1);
    }

    #[test]
    fn dropping_either_end_removes_both_edges() {
        let source = AbortSignal::new();
        let dependent = AbortSignal::new_dependent();
        link(&source, &dependent).unwrap();

        drop(dependent);
        assert_eq!(source.dependent_count(), 0);
        assert!(source.rare().dependents().is_empty());

        let dependent = AbortSignal::new_dependent();
        link(&source, &dependent).unwrap();
        drop(source);
        assert!(dependent.rare().sources().is_empty());
    }
}
