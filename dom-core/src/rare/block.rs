//! The rare data block and its containers.

use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::abort::{AbortAlgorithm, SignalKey, WeakSignal};
use crate::events::{EventCallback, EventListener};
use crate::exception::{DomError, Result};

/// Key for the per-object user data map.
pub type UserDataKey = String;

/// Listener lists keyed by event type. Types keep first-registration order.
type ListenerMap = IndexMap<String, Vec<Rc<EventListener>>>;

/// Most composed signals have one or two sources.
type SignalEdges = SmallVec<[WeakSignal; 2]>;

/// Storage for every optional per-object feature.
///
/// Each container is `None` until first written.
#[derive(Default)]
pub struct RareDataBlock {
    /// Event listeners, per type, in registration order.
    listeners: Option<ListenerMap>,

    /// Pending abort algorithms, in registration order.
    abort_algorithms: Option<Vec<AbortAlgorithm>>,

    /// Signals this (dependent) signal follows. Non-owning.
    source_signals: Option<SignalEdges>,

    /// Signals following this signal. Non-owning.
    dependent_signals: Option<SignalEdges>,

    /// Opaque values attached by embedders.
    user_data: Option<HashMap<UserDataKey, Rc<dyn Any>>>,
}

impl RareDataBlock {
    pub fn add_listener(&mut self, listener: Rc<EventListener>) -> Result<bool> {
        let map = self.listeners.get_or_insert_with(IndexMap::new);

        if let Some(list) = map.get_mut(listener.event_type()) {
            if list.iter().any(|existing| existing.same_identity(&listener)) {
                return Ok(false);
            }
            reserve_gate()?;
            list.try_reserve(1)?;
            list.push(listener);
            return Ok(true);
        }

        reserve_gate()?;
        map.try_reserve(1)?;
        let mut list = Vec::new();
        list.try_reserve(1)?;
        let event_type = listener.event_type().to_owned();
        list.push(listener);
        map.insert(event_type, list);
        Ok(true)
    }

    pub fn remove_listener(
        &mut self,
        event_type: &str,
        callback: &EventCallback,
        capture: bool,
    ) -> Option<Rc<EventListener>> {
        let map = self.listeners.as_mut()?;
        let list = map.get_mut(event_type)?;
        let index = list
            .iter()
            .position(|listener| listener.matches(event_type, callback, capture))?;
        let removed = list.remove(index);
        removed.mark_removed();
        if list.is_empty() {
            map.shift_remove(event_type);
        }
        Some(removed)
    }

    pub fn remove_listener_entry(&mut self, listener: &Rc<EventListener>) -> bool {
        let Some(map) = self.listeners.as_mut() else {
            return false;
        };
        let Some(list) = map.get_mut(listener.event_type()) else {
            return false;
        };
        let Some(index) = list.iter().position(|l| Rc::ptr_eq(l, listener)) else {
            return false;
        };
        list.remove(index).mark_removed();
        if list.is_empty() {
            map.shift_remove(listener.event_type());
        }
        true
    }

    pub fn listeners(&self, event_type: &str) -> &[Rc<EventListener>] {
        self.listeners
            .as_ref()
            .and_then(|map| map.get(event_type))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .as_ref()
            .map(|map| map.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn add_algorithm(&mut self, algorithm: AbortAlgorithm) -> Result<bool> {
        let list = self.abort_algorithms.get_or_insert_with(Vec::new);
        if list.contains(&algorithm) {
            return Ok(false);
        }
        reserve_gate()?;
        list.try_reserve(1)?;
        list.push(algorithm);
        Ok(true)
    }

    pub fn remove_algorithm(&mut self, algorithm: &AbortAlgorithm) -> bool {
        let Some(list) = self.abort_algorithms.as_mut() else {
            return false;
        };
        match list.iter().position(|existing| existing == algorithm) {
            Some(index) => {
                list.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn take_algorithms(&mut self) -> Vec<AbortAlgorithm> {
        self.abort_algorithms.take().unwrap_or_default()
    }

    pub fn algorithm_count(&self) -> usize {
        self.abort_algorithms.as_ref().map_or(0, Vec::len)
    }

    pub(crate) fn add_source(&mut self, source: WeakSignal) -> Result<bool> {
        insert_edge(self.source_signals.get_or_insert_with(SmallVec::new), source)
    }

    pub(crate) fn add_dependent(&mut self, dependent: WeakSignal) -> Result<bool> {
        insert_edge(
            self.dependent_signals.get_or_insert_with(SmallVec::new),
            dependent,
        )
    }

    pub(crate) fn remove_source(&mut self, source: SignalKey) -> bool {
        remove_edge(self.source_signals.as_mut(), source)
    }

    pub(crate) fn remove_dependent(&mut self, dependent: SignalKey) -> bool {
        remove_edge(self.dependent_signals.as_mut(), dependent)
    }

    pub(crate) fn sources(&self) -> &[WeakSignal] {
        self.source_signals.as_deref().unwrap_or(&[])
    }

    pub(crate) fn dependents(&self) -> &[WeakSignal] {
        self.dependent_signals.as_deref().unwrap_or(&[])
    }

    pub(crate) fn take_sources(&mut self) -> SmallVec<[WeakSignal; 2]> {
        self.source_signals.take().unwrap_or_default()
    }

    pub(crate) fn take_dependents(&mut self) -> SmallVec<[WeakSignal; 2]> {
        self.dependent_signals.take().unwrap_or_default()
    }

    pub fn set_user_data(
        &mut self,
        key: UserDataKey,
        value: Rc<dyn Any>,
    ) -> Result<Option<Rc<dyn Any>>> {
        let map = self.user_data.get_or_insert_with(HashMap::new);
        if !map.contains_key(&key) {
            reserve_gate()?;
            map.try_reserve(1)?;
        }
        Ok(map.insert(key, value))
    }

    pub fn user_data(&self, key: &str) -> Option<Rc<dyn Any>> {
        self.user_data.as_ref()?.get(key).cloned()
    }

    pub fn remove_user_data(&mut self, key: &str) -> Option<Rc<dyn Any>> {
        self.user_data.as_mut()?.remove(key)
    }
}

#[cfg(not(test))]
#[inline]
fn reserve_gate() -> Result<()> {
    Ok(())
}

#[cfg(test)]
thread_local! {
    /// Reservations left before the next one fails. `None` never fails.
    static RESERVES_UNTIL_FAILURE: std::cell::Cell<Option<usize>> =
        const { std::cell::Cell::new(None) };
}

#[cfg(test)]
fn reserve_gate() -> Result<()> {
    RESERVES_UNTIL_FAILURE.with(|slot| match slot.get() {
        Some(0) => {
            slot.set(None);
            Err(DomError::OutOfMemory)
        }
        Some(left) => {
            slot.set(Some(left - 1));
            Ok(())
        }
        None => Ok(()),
    })
}

/// Let `successes` insertions through on this thread, then fail the next one
/// with `OutOfMemory`.
#[cfg(test)]
pub(crate) fn fail_reservation_after(successes: usize) {
    RESERVES_UNTIL_FAILURE.with(|slot| slot.set(Some(successes)));
}

fn insert_edge(edges: &mut SignalEdges, signal: WeakSignal) -> Result<bool> {
    if edges.iter().any(|existing| existing.ptr_eq(&signal)) {
        return Ok(false);
    }
    reserve_gate()?;
    edges.try_reserve(1).map_err(|_| DomError::OutOfMemory)?;
    edges.push(signal);
    Ok(true)
}

fn remove_edge(edges: Option<&mut SignalEdges>, key: SignalKey) -> bool {
    let Some(edges) = edges else {
        return false;
    };
    match edges.iter().position(|existing| existing.key() == key) {
        Some(index) => {
            edges.remove(index);
            true
        }
        None => false,
    }
}

impl std::fmt::Debug for RareDataBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RareDataBlock")
            .field("listener_count", &self.listener_count())
            .field("algorithm_count", &self.algorithm_count())
            .field("source_count", &self.sources().len())
            .field("dependent_count", &self.dependents().len())
            .field(
                "user_data_keys",
                &self.user_data.as_ref().map_or(0, HashMap::len),
            )
            .finish()
    }
}
