//! Abort algorithms.
//!
//! An abort algorithm is a one-shot cleanup registered on a signal. It runs
//! before the signal's `"abort"` event and is released right after it runs.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for an abort algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlgorithmId(u64);

impl AlgorithmId {
    /// Generate a new unique algorithm ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for AlgorithmId {
    fn default() -> Self {
        Self::new()
    }
}

/// A cleanup callback registered on a signal.
///
/// The closure stands in for the `(callback, context)` pair: each
/// `AbortAlgorithm::new` is a distinct algorithm, and clones of one
/// algorithm are the same algorithm for duplicate detection and removal.
#[derive(Clone)]
pub struct AbortAlgorithm {
    id: AlgorithmId,
    run: Rc<dyn Fn()>,
}

impl AbortAlgorithm {
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self {
            id: AlgorithmId::new(),
            run: Rc::new(run),
        }
    }

    pub fn id(&self) -> AlgorithmId {
        self.id
    }

    pub fn run(&self) {
        (self.run)();
    }
}

impl PartialEq for AbortAlgorithm {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AbortAlgorithm {}

impl fmt::Debug for AbortAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AbortAlgorithm").field(&self.id).finish()
    }
}
