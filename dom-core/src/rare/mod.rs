//! Rare Data
//!
//! Most DOM objects never receive an event listener, never get an abort
//! algorithm registered on them and never take part in signal composition.
//! Storing all of that state inline would make every object pay for
//! features it does not use.
//!
//! Instead, each owner embeds a [`RareData`] slot. The slot is a single
//! pointer that stays empty until the first feature needs storage, at which
//! point one [`RareDataBlock`] is allocated and every optional container is
//! hung off it.
//!
//! # Invariants
//!
//! - An empty slot and a block whose containers are all empty are the same
//!   observable state. Every read accessor answers as if the containers were
//!   empty when no block exists.
//! - Only mutating accessors allocate. They call [`RareData::ensure`]
//!   themselves; callers never allocate the block directly.
//! - The block holds strong references to what the owner registered
//!   (listeners, algorithms, user data) and weak references for signal graph
//!   edges. Tearing the block down never follows a weak edge.

mod block;

pub use block::{RareDataBlock, UserDataKey};

#[cfg(test)]
pub(crate) use block::fail_reservation_after;

use std::any::Any;
use std::cell::{OnceCell, RefCell};
use std::rc::{Rc, Weak};

use crate::abort::{AbortAlgorithm, SignalKey, WeakSignal};
use crate::events::{EventCallback, EventListener};
use crate::exception::Result;

type SharedBlock = Rc<RefCell<RareDataBlock>>;

/// Lazily allocated side-table for optional per-object state.
#[derive(Default)]
pub struct RareData {
    block: OnceCell<SharedBlock>,
}

impl RareData {
    /// Create an empty slot. Nothing is allocated.
    pub const fn new() -> Self {
        Self {
            block: OnceCell::new(),
        }
    }

    /// Allocate the block on first call; return the existing block after.
    pub fn ensure(&self) -> &SharedBlock {
        self.block.get_or_init(|| {
            tracing::trace!("allocating rare data block");
            Rc::new(RefCell::new(RareDataBlock::default()))
        })
    }

    /// Whether the block has been allocated.
    pub fn is_allocated(&self) -> bool {
        self.block.get().is_some()
    }

    /// Weak handle used by deferred cleanups that must not keep the owner's
    /// storage alive.
    pub fn downgrade(&self) -> WeakRareData {
        WeakRareData(Rc::downgrade(self.ensure()))
    }

    /// Free the block and every populated container in it.
    ///
    /// Weak edges are dropped as-is; the referents are not touched.
    pub fn deinit(&mut self) {
        if let Some(block) = self.block.take() {
            tracing::trace!(strong = Rc::strong_count(&block), "releasing rare data block");
        }
    }

    fn read<R>(&self, f: impl FnOnce(&RareDataBlock) -> R) -> Option<R> {
        self.block.get().map(|block| f(&block.borrow()))
    }

    fn write<R>(&self, f: impl FnOnce(&mut RareDataBlock) -> R) -> R {
        f(&mut self.ensure().borrow_mut())
    }

    fn write_existing<R>(&self, f: impl FnOnce(&mut RareDataBlock) -> R) -> Option<R> {
        self.block.get().map(|block| f(&mut block.borrow_mut()))
    }

    // ------------------------------------------------------------------
    // Event listeners
    // ------------------------------------------------------------------

    /// Append a listener unless one with the same identity is registered.
    ///
    /// Returns `Ok(false)` for a duplicate.
    pub fn add_listener(&self, listener: Rc<EventListener>) -> Result<bool> {
        self.write(|block| block.add_listener(listener))
    }

    /// Remove the listener matching `(event_type, callback, capture)`.
    ///
    /// A signal-bound listener also withdraws its removal algorithm from the
    /// signal, once this block is no longer borrowed.
    pub fn remove_listener(
        &self,
        event_type: &str,
        callback: &EventCallback,
        capture: bool,
    ) -> Option<Rc<EventListener>> {
        let removed = self
            .write_existing(|block| block.remove_listener(event_type, callback, capture))
            .flatten()?;
        removed.detach_abort_algorithm();
        Some(removed)
    }

    /// Remove this exact listener entry.
    pub fn remove_listener_entry(&self, listener: &Rc<EventListener>) -> bool {
        let removed = self
            .write_existing(|block| block.remove_listener_entry(listener))
            .unwrap_or(false);
        if removed {
            listener.detach_abort_algorithm();
        }
        removed
    }

    /// Listeners registered for `event_type`, in registration order.
    pub fn listeners(&self, event_type: &str) -> Vec<Rc<EventListener>> {
        self.read(|block| block.listeners(event_type).to_vec())
            .unwrap_or_default()
    }

    pub fn has_listeners(&self, event_type: &str) -> bool {
        self.read(|block| !block.listeners(event_type).is_empty())
            .unwrap_or(false)
    }

    pub fn listener_count(&self) -> usize {
        self.read(RareDataBlock::listener_count).unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Abort algorithms
    // ------------------------------------------------------------------

    pub fn add_algorithm(&self, algorithm: AbortAlgorithm) -> Result<bool> {
        self.write(|block| block.add_algorithm(algorithm))
    }

    pub fn remove_algorithm(&self, algorithm: &AbortAlgorithm) -> bool {
        self.write_existing(|block| block.remove_algorithm(algorithm))
            .unwrap_or(false)
    }

    /// Move every pending algorithm out, leaving the list empty.
    pub fn take_algorithms(&self) -> Vec<AbortAlgorithm> {
        self.write_existing(RareDataBlock::take_algorithms)
            .unwrap_or_default()
    }

    pub fn algorithm_count(&self) -> usize {
        self.read(RareDataBlock::algorithm_count).unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Signal graph edges
    // ------------------------------------------------------------------

    pub(crate) fn add_source(&self, source: WeakSignal) -> Result<bool> {
        self.write(|block| block.add_source(source))
    }

    pub(crate) fn add_dependent(&self, dependent: WeakSignal) -> Result<bool> {
        self.write(|block| block.add_dependent(dependent))
    }

    pub(crate) fn remove_source(&self, source: SignalKey) -> bool {
        self.write_existing(|block| block.remove_source(source))
            .unwrap_or(false)
    }

    /// Source edges, live or not.
    pub fn sources(&self) -> Vec<WeakSignal> {
        self.read(|block| block.sources().to_vec()).unwrap_or_default()
    }

    pub fn dependents(&self) -> Vec<WeakSignal> {
        self.read(|block| block.dependents().to_vec()).unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // User data
    // ------------------------------------------------------------------

    /// Attach an opaque value under `key`, returning the previous value.
    pub fn set_user_data(
        &self,
        key: impl Into<UserDataKey>,
        value: Rc<dyn Any>,
    ) -> Result<Option<Rc<dyn Any>>> {
        self.write(|block| block.set_user_data(key.into(), value))
    }

    pub fn user_data(&self, key: &str) -> Option<Rc<dyn Any>> {
        self.read(|block| block.user_data(key)).flatten()
    }

    pub fn remove_user_data(&self, key: &str) -> Option<Rc<dyn Any>> {
        self.write_existing(|block| block.remove_user_data(key))
            .flatten()
    }

    /// Mutate the block if it exists and nobody else is borrowing it.
    ///
    /// Used from destructors, which must never panic on a held borrow.
    pub(crate) fn try_write_existing<R>(
        &self,
        f: impl FnOnce(&mut RareDataBlock) -> R,
    ) -> Option<R> {
        let block = self.block.get()?;
        let mut guard = block.try_borrow_mut().ok()?;
        Some(f(&mut guard))
    }
}

impl std::fmt::Debug for RareData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.block.get() {
            Some(block) => f.debug_tuple("RareData").field(&*block.borrow()).finish(),
            None => f.write_str("RareData(<empty>)"),
        }
    }
}

/// Non-owning handle to a [`RareData`] block.
#[derive(Clone)]
pub struct WeakRareData(Weak<RefCell<RareDataBlock>>);

impl WeakRareData {
    /// Run `f` against the block if its owner is still alive.
    pub fn with<R>(&self, f: impl FnOnce(&mut RareDataBlock) -> R) -> Option<R> {
        let block = self.0.upgrade()?;
        let mut guard = block.borrow_mut();
        Some(f(&mut guard))
    }

    pub fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }
}
