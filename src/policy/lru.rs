//! # Bounded Least Recently Used (LRU) Cache
//!
//! Fixed-capacity cache that evicts the least recently used entry on
//! overflow. Both `put` and a successful `get` count as a use.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────────┐
//!   │                        ConcurrentLruCache<K, V>                          │
//!   │                                                                          │
//!   │   ┌────────────────────────────────────────────────────────────────────┐ │
//!   │   │                    Arc<Mutex<LruCache<K, V>>>                      │ │
//!   │   └────────────────────────────────────────────────────────────────────┘ │
//!   │                                  │                                       │
//!   │                                  ▼                                       │
//!   │   ┌────────────────────────────────────────────────────────────────────┐ │
//!   │   │                         LruCache<K, V>                             │ │
//!   │   │                                                                    │ │
//!   │   │   index: FxHashMap<K, SlotId>                                      │ │
//!   │   │   ┌─────────┬────────┐                                             │ │
//!   │   │   │ region1 │  id_1 ─┼──────┐                                      │ │
//!   │   │   │ region2 │  id_2 ─┼──────┼──────┐                               │ │
//!   │   │   │ region3 │  id_3 ─┼──────┼──────┼──────┐                        │ │
//!   │   │   └─────────┴────────┘      ▼      ▼      ▼                        │ │
//!   │   │                                                                    │ │
//!   │   │   list: IntrusiveList<Entry<K, V>>                                 │ │
//!   │   │   head ──► [id_1] ◄──► [id_2] ◄──► [id_3] ◄── tail                 │ │
//!   │   │            (MRU)                     (LRU)                         │ │
//!   │   └────────────────────────────────────────────────────────────────────┘ │
//!   └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The list owns every entry; the index stores only `SlotId` handles into the
//! list's arena, so there are no reference cycles and no `unsafe`.
//!
//! ## Operations
//!
//! | Operation     | Reorders | Notes                                       |
//! |---------------|----------|---------------------------------------------|
//! | `put(k, v)`   | yes      | Update moves to MRU; overflow evicts LRU    |
//! | `get(&k)`     | yes      | Hit moves to MRU                            |
//! | `peek(&k)`    | no       | Pure lookup                                 |
//! | `remove(&k)`  | -        | No-op when absent                           |
//! | `elems()`     | no       | Snapshot, MRU first                         |
//! | `pop_lru()`   | -        | Removes the eviction candidate              |
//!
//! All of the above are O(1) except `elems`, which is O(n).
//!
//! ## Example Usage
//!
//! ```
//! use metacache::policy::lru::LruCache;
//!
//! let mut cache = LruCache::new(2);
//! cache.put(1, "a");
//! cache.put(2, "b");
//!
//! // Reading 1 makes 2 the eviction candidate.
//! assert_eq!(cache.get(&1), Some(&"a"));
//! cache.put(3, "c");
//! assert!(!cache.contains(&2));
//!
//! let keys: Vec<_> = cache.elems().into_iter().map(|item| item.key).collect();
//! assert_eq!(keys, vec![3, 1]);
//! ```
//!
//! ## Thread Safety
//!
//! - `LruCache`: single-threaded; needs `&mut self` for anything that reorders
//! - `ConcurrentLruCache`: every method is one `parking_lot::Mutex` critical
//!   section, so operations on one instance are linearizable

use std::fmt;
use std::hash::Hash;
#[cfg(feature = "concurrency")]
use std::sync::Arc;

#[cfg(feature = "concurrency")]
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::ds::{IntrusiveList, SlotId};
use crate::error::{ConfigError, InvariantError};
use crate::traits::{CoreCache, Item, KeyedCache};

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
}

/// Single-threaded bounded LRU cache.
///
/// A capacity of 0 builds a cache that accepts no entries; use
/// [`try_new`](Self::try_new) to reject it instead.
pub struct LruCache<K, V> {
    index: FxHashMap<K, SlotId>,
    list: IntrusiveList<Entry<K, V>>,
    capacity: usize,
}

impl<K, V> LruCache<K, V>
where
    K: Clone + Eq + Hash,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            list: IntrusiveList::with_capacity(capacity),
            capacity,
        }
    }

    /// Creates a cache, rejecting a zero capacity.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `capacity` is zero.
    pub fn try_new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::new("lru capacity must be greater than zero"));
        }
        Ok(Self::new(capacity))
    }

    /// Inserts or updates `key` and makes it the most recently used entry.
    ///
    /// If the cache is over capacity afterwards, the least recently used
    /// entry is dropped.
    pub fn put(&mut self, key: K, value: V) {
        if let Some(&id) = self.index.get(&key) {
            if let Some(entry) = self.list.get_mut(id) {
                entry.value = value;
            }
            self.list.move_to_front(id);
            return;
        }

        if self.capacity == 0 {
            return;
        }

        let id = self.list.push_front(Entry {
            key: key.clone(),
            value,
        });
        self.index.insert(key, id);

        if self.list.len() > self.capacity {
            self.pop_lru();
        }
    }

    /// Returns the value for `key` and promotes it to most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let id = *self.index.get(key)?;
        self.list.move_to_front(id);
        self.list.get(id).map(|entry| &entry.value)
    }

    /// Returns the value for `key` without touching recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        let id = self.index.get(key)?;
        self.list.get(*id).map(|entry| &entry.value)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let id = self.index.remove(key)?;
        self.list.remove(id).map(|entry| entry.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Removes and returns the least recently used entry.
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        let entry = self.list.pop_back()?;
        self.index.remove(&entry.key);
        Some((entry.key, entry.value))
    }

    /// Returns the least recently used entry without removing it.
    pub fn peek_lru(&self) -> Option<(&K, &V)> {
        self.list.back().map(|entry| (&entry.key, &entry.value))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates entries from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.list.iter().map(|entry| (&entry.key, &entry.value))
    }

    /// Snapshot of all entries, most recently used first.
    pub fn elems(&self) -> Vec<Item<K, V>>
    where
        V: Clone,
    {
        self.iter()
            .map(|(k, v)| Item::new(k.clone(), v.clone()))
            .collect()
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.list.clear();
    }

    /// Verifies that the index and the recency list describe the same entries.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.list.check_links()?;
        if self.index.len() != self.list.len() {
            return Err(InvariantError::new(format!(
                "lru index has {} keys but list has {} nodes",
                self.index.len(),
                self.list.len()
            )));
        }
        if self.capacity > 0 && self.list.len() > self.capacity {
            return Err(InvariantError::new(format!(
                "lru holds {} entries over capacity {}",
                self.list.len(),
                self.capacity
            )));
        }
        for (id, entry) in self.list.iter_entries() {
            if self.index.get(&entry.key) != Some(&id) {
                return Err(InvariantError::new(format!(
                    "lru node {:?} is not indexed by its key",
                    id
                )));
            }
        }
        Ok(())
    }
}

impl<K, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("len", &self.index.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl<K, V> CoreCache<K, V> for LruCache<K, V>
where
    K: Clone + Eq + Hash,
{
    fn put(&mut self, key: K, value: V) {
        LruCache::put(self, key, value)
    }

    fn len(&self) -> usize {
        LruCache::len(self)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn elems(&self) -> Vec<Item<K, V>>
    where
        K: Clone,
        V: Clone,
    {
        LruCache::elems(self)
    }

    fn clear(&mut self) {
        LruCache::clear(self)
    }
}

impl<K, V> KeyedCache<K, V> for LruCache<K, V>
where
    K: Clone + Eq + Hash,
{
    fn get(&mut self, key: &K) -> Option<&V> {
        LruCache::get(self, key)
    }

    fn peek(&self, key: &K) -> Option<&V> {
        LruCache::peek(self, key)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        LruCache::remove(self, key)
    }

    fn contains(&self, key: &K) -> bool {
        LruCache::contains(self, key)
    }
}

impl<K, V> Extend<(K, V)> for LruCache<K, V>
where
    K: Clone + Eq + Hash,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.put(key, value);
        }
    }
}

/// Thread-safe LRU cache; cloning shares the same underlying cache.
///
/// Values are returned by clone, so wrap large values in `Arc`.
#[cfg(feature = "concurrency")]
#[derive(Clone)]
pub struct ConcurrentLruCache<K, V> {
    inner: Arc<Mutex<LruCache<K, V>>>,
}

#[cfg(feature = "concurrency")]
impl<K, V> fmt::Debug for ConcurrentLruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.inner.lock();
        f.debug_struct("ConcurrentLruCache")
            .field("len", &cache.index.len())
            .field("capacity", &cache.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "concurrency")]
impl<K, V> ConcurrentLruCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self::from_core(LruCache::new(capacity))
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] if `capacity` is zero.
    pub fn try_new(capacity: usize) -> Result<Self, ConfigError> {
        LruCache::try_new(capacity).map(Self::from_core)
    }

    pub(crate) fn from_core(core: LruCache<K, V>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(core)),
        }
    }

    pub fn put(&self, key: K, value: V) {
        self.inner.lock().put(key, value);
    }

    /// Returns a clone of the value and promotes the entry.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().get(key).cloned()
    }

    pub fn peek(&self, key: &K) -> Option<V> {
        self.inner.lock().peek(key).cloned()
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.lock().remove(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().contains(key)
    }

    pub fn pop_lru(&self) -> Option<(K, V)> {
        self.inner.lock().pop_lru()
    }

    pub fn elems(&self) -> Vec<Item<K, V>> {
        self.inner.lock().elems()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.inner.lock().check_invariants()
    }
}
