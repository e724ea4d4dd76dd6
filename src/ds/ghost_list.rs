//! Bounded recency list of evicted keys.
//!
//! The 2Q cache records the keys it evicts from its RECENT segment here,
//! without their values. A later `put` of a remembered key is treated as a
//! second touch and admitted straight into the FREQUENT segment.
//!
//! ```text
//!   index: FxHashMap<K, SlotId>        list: IntrusiveList<K>
//!   ┌─────────┬─────────┐              head ─► [A] ◄──► [B] ◄──► [C] ◄── tail
//!   │  key A  │  id_1   │                newest                  oldest
//!   │  key B  │  id_2   │
//!   └─────────┴─────────┘
//! ```
//!
//! - `record(k)`: moves key to the front, forgets the oldest key when full
//! - `remove(k)`: forgets a key
use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::ds::intrusive_list::{IntrusiveList, SlotId};
use crate::error::InvariantError;

/// Bounded set of keys ordered by when they were last recorded.
#[derive(Debug)]
pub struct GhostList<K> {
    list: IntrusiveList<K>,
    index: FxHashMap<K, SlotId>,
    capacity: usize,
}

impl<K> GhostList<K> {
    /// Creates a ghost list remembering at most `capacity` keys.
    pub fn new(capacity: usize) -> Self {
        Self {
            list: IntrusiveList::with_capacity(capacity),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl<K> GhostList<K>
where
    K: Eq + Hash + Clone,
{
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Records `key` as the newest ghost, forgetting the oldest if needed.
    pub fn record(&mut self, key: K) {
        if self.capacity == 0 {
            return;
        }

        if let Some(&id) = self.index.get(&key) {
            self.list.move_to_front(id);
            return;
        }

        if self.list.len() >= self.capacity
            && let Some(old_key) = self.list.pop_back()
        {
            self.index.remove(&old_key);
        }

        let id = self.list.push_front(key.clone());
        self.index.insert(key, id);
    }

    /// Forgets `key`; returns `true` if it was remembered.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.index.remove(key) {
            Some(id) => {
                self.list.remove(id);
                true
            },
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.list.clear();
        self.index.clear();
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.list.check_links()?;
        if self.list.len() != self.index.len() {
            return Err(InvariantError::new(format!(
                "ghost list has {} nodes but {} index entries",
                self.list.len(),
                self.index.len()
            )));
        }
        if self.list.len() > self.capacity {
            return Err(InvariantError::new(format!(
                "ghost list holds {} keys over capacity {}",
                self.list.len(),
                self.capacity
            )));
        }
        for (id, key) in self.list.iter_entries() {
            if self.index.get(key) != Some(&id) {
                return Err(InvariantError::new(format!(
                    "ghost node {:?} is not indexed by its key",
                    id
                )));
            }
        }
        Ok(())
    }
}
