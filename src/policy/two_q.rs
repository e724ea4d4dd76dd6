//! Two-Queue (2Q) cache replacement policy.
//!
//! Separates first-touch entries from entries that have been touched again,
//! so a one-time scan cannot flush the working set the way it would in a
//! plain LRU. The external contract is the same as [`LruCache`].
//!
//! [`LruCache`]: crate::policy::lru::LruCache
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                           TwoQCache<K, V> Layout                            │
//! │                                                                             │
//! │   index: FxHashMap<K, (Segment, SlotId)>                                    │
//! │   ┌──────────┬──────────────────────┐                                       │
//! │   │ region_1 │ (Frequent, id_0)     │────────────────┐                      │
//! │   │ region_2 │ (Recent,   id_3)     │───┐            │                      │
//! │   │ region_5 │ (Recent,   id_1)     │───┼──┐         │                      │
//! │   └──────────┴──────────────────────┘   │  │         │                      │
//! │                                         ▼  ▼         ▼                      │
//! │   RECENT (A1in, FIFO)                     FREQUENT (Am, LRU)                │
//! │   ┌─────────────────────────┐             ┌─────────────────────────┐       │
//! │   │ front               back│             │ MRU                  LRU│       │
//! │   │ [id_3] ◄──► [id_1]      │             │ [id_0] ◄──► [...]       │       │
//! │   │ newest      oldest ─────┼─► evict     │ hot          cold ──────┼─► evict│
//! │   └─────────────────────────┘      │      └─────────────────────────┘       │
//! │                                    ▼                                        │
//! │   GHOST (A1out, keys only)   [region_9] ◄──► [region_4] ◄──► ...            │
//! │                                                                             │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Flows
//!
//! ```text
//!   put(k, v):
//!     k in FREQUENT  -> update value, move to MRU
//!     k in RECENT    -> move to FREQUENT MRU with new value
//!     k in GHOST     -> make room (favor FREQUENT victims), forget ghost,
//!                       insert at FREQUENT MRU
//!     otherwise      -> make room, insert at RECENT front
//!
//!   get(k):
//!     k in FREQUENT  -> move to MRU
//!     k in RECENT    -> move to FREQUENT MRU
//!
//!   make room (only when RECENT + FREQUENT == capacity):
//!     RECENT above its share  -> evict oldest RECENT, remember key in GHOST
//!     otherwise               -> evict FREQUENT LRU
//! ```
//!
//! RECENT may grow past its share while FREQUENT is small; it is trimmed
//! back only under capacity pressure.
//!
//! ## Sizing
//!
//! | Segment  | Size                                   | Default |
//! |----------|----------------------------------------|---------|
//! | RECENT   | `floor(capacity * recent_ratio)`       | 25%     |
//! | GHOST    | `floor(capacity * ghost_ratio)`        | 50%     |
//! | FREQUENT | whatever RECENT does not use           |         |
//!
//! With the defaults, a capacity of 3 has a RECENT share of 0, so every
//! eviction goes to FREQUENT first whenever it is non-empty.
//!
//! ## Example
//!
//! ```
//! use metacache::policy::two_q::TwoQCache;
//!
//! let mut cache = TwoQCache::new(3);
//! cache.put(1, "a");
//! cache.put(2, "b");
//! cache.put(3, "c");
//!
//! // Second touch promotes to FREQUENT.
//! cache.get(&3);
//! cache.get(&2);
//! cache.get(&1);
//!
//! cache.put(4, "d");
//! assert!(!cache.contains(&3));
//! ```

use std::fmt;
use std::hash::Hash;
#[cfg(feature = "concurrency")]
use std::sync::Arc;

#[cfg(feature = "concurrency")]
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::ds::{GhostList, IntrusiveList, SlotId};
use crate::error::{ConfigError, InvariantError, check_ratio};
use crate::traits::{CoreCache, Item, KeyedCache};

/// Default share of capacity reserved for first-touch entries.
pub const DEFAULT_RECENT_RATIO: f64 = 0.25;

/// Default number of remembered evictions, as a share of capacity.
pub const DEFAULT_GHOST_RATIO: f64 = 0.50;

/// Which segment a resident entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Recent,
    Frequent,
}

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
}

/// Single-threaded 2Q cache.
pub struct TwoQCache<K, V> {
    index: FxHashMap<K, (Segment, SlotId)>,
    recent: IntrusiveList<Entry<K, V>>,
    frequent: IntrusiveList<Entry<K, V>>,
    ghost: GhostList<K>,
    capacity: usize,
    recent_size: usize,
}

impl<K, V> TwoQCache<K, V>
where
    K: Clone + Eq + Hash,
{
    /// Creates a cache with the default segment ratios.
    pub fn new(capacity: usize) -> Self {
        Self::build(capacity, DEFAULT_RECENT_RATIO, DEFAULT_GHOST_RATIO)
    }

    /// Creates a cache with explicit segment ratios.
    ///
    /// # Panics
    ///
    /// Panics if either ratio is outside `[0.0, 1.0]` or not finite. Use
    /// [`try_with_ratios`](Self::try_with_ratios) to get an error instead.
    pub fn with_ratios(capacity: usize, recent_ratio: f64, ghost_ratio: f64) -> Self {
        match Self::try_with_ratios(capacity, recent_ratio, ghost_ratio) {
            Ok(cache) => cache,
            Err(err) => panic!("invalid 2q configuration: {}", err),
        }
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] if `capacity` is zero or a ratio is outside
    /// `[0.0, 1.0]`.
    pub fn try_with_ratios(
        capacity: usize,
        recent_ratio: f64,
        ghost_ratio: f64,
    ) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::new("2q capacity must be greater than zero"));
        }
        check_ratio("recent_ratio", recent_ratio)?;
        check_ratio("ghost_ratio", ghost_ratio)?;
        Ok(Self::build(capacity, recent_ratio, ghost_ratio))
    }

    fn build(capacity: usize, recent_ratio: f64, ghost_ratio: f64) -> Self {
        let recent_size = (capacity as f64 * recent_ratio) as usize;
        let ghost_size = (capacity as f64 * ghost_ratio) as usize;

        Self {
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            recent: IntrusiveList::with_capacity(recent_size),
            frequent: IntrusiveList::with_capacity(capacity),
            ghost: GhostList::new(ghost_size),
            capacity,
            recent_size,
        }
    }

    pub fn put(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }

        match self.index.get(&key).copied() {
            Some((Segment::Frequent, id)) => {
                if let Some(entry) = self.frequent.get_mut(id) {
                    entry.value = value;
                }
                self.frequent.move_to_front(id);
                return;
            },
            Some((Segment::Recent, id)) => {
                self.recent.remove(id);
                let id = self.frequent.push_front(Entry {
                    key: key.clone(),
                    value,
                });
                self.index.insert(key, (Segment::Frequent, id));
                return;
            },
            None => {},
        }

        if self.ghost.contains(&key) {
            self.make_room(true);
            self.ghost.remove(&key);
            let id = self.frequent.push_front(Entry {
                key: key.clone(),
                value,
            });
            self.index.insert(key, (Segment::Frequent, id));
            return;
        }

        self.make_room(false);
        let id = self.recent.push_front(Entry {
            key: key.clone(),
            value,
        });
        self.index.insert(key, (Segment::Recent, id));
    }

    /// Looks up `key`; a RECENT hit is promoted to FREQUENT.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let (segment, id) = *self.index.get(key)?;
        let id = match segment {
            Segment::Frequent => {
                self.frequent.move_to_front(id);
                id
            },
            Segment::Recent => {
                let entry = self.recent.remove(id)?;
                let promoted = self.frequent.push_front(entry);
                if let Some(slot) = self.index.get_mut(key) {
                    *slot = (Segment::Frequent, promoted);
                }
                promoted
            },
        };
        self.frequent.get(id).map(|entry| &entry.value)
    }

    pub fn peek(&self, key: &K) -> Option<&V> {
        let &(segment, id) = self.index.get(key)?;
        self.segment(segment).get(id).map(|entry| &entry.value)
    }

    /// Removes `key` from the cache and forgets it as a ghost.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.ghost.remove(key);
        let (segment, id) = self.index.remove(key)?;
        let list = match segment {
            Segment::Recent => &mut self.recent,
            Segment::Frequent => &mut self.frequent,
        };
        list.remove(id).map(|entry| entry.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Segment currently holding `key`, if resident.
    pub fn segment_of(&self, key: &K) -> Option<Segment> {
        self.index.get(key).map(|(segment, _)| *segment)
    }

    pub fn is_ghost(&self, key: &K) -> bool {
        self.ghost.contains(key)
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

    pub fn recent_len(&self) -> usize {
        self.recent.len()
    }

    pub fn frequent_len(&self) -> usize {
        self.frequent.len()
    }

    pub fn ghost_len(&self) -> usize {
        self.ghost.len()
    }

    /// Iterates FREQUENT from MRU to LRU, then RECENT from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.frequent
            .iter()
            .chain(self.recent.iter())
            .map(|entry| (&entry.key, &entry.value))
    }

    pub fn elems(&self) -> Vec<Item<K, V>>
    where
        V: Clone,
    {
        self.iter()
            .map(|(k, v)| Item::new(k.clone(), v.clone()))
            .collect()
    }

    /// Drops every entry and every ghost.
    pub fn clear(&mut self) {
        self.index.clear();
        self.recent.clear();
        self.frequent.clear();
        self.ghost.clear();
    }

    fn segment(&self, segment: Segment) -> &IntrusiveList<Entry<K, V>> {
        match segment {
            Segment::Recent => &self.recent,
            Segment::Frequent => &self.frequent,
        }
    }

    fn make_room(&mut self, ghost_hit: bool) {
        let recent_len = self.recent.len();
        if recent_len + self.frequent.len() < self.capacity {
            return;
        }

        if recent_len > 0
            && (recent_len > self.recent_size || (recent_len == self.recent_size && !ghost_hit))
        {
            self.evict_recent();
            return;
        }

        if !self.evict_frequent() {
            self.evict_recent();
        }
    }

    fn evict_recent(&mut self) -> bool {
        match self.recent.pop_back() {
            Some(entry) => {
                self.index.remove(&entry.key);
                self.ghost.record(entry.key);
                true
            },
            None => false,
        }
    }

    fn evict_frequent(&mut self) -> bool {
        match self.frequent.pop_back() {
            Some(entry) => {
                self.index.remove(&entry.key);
                true
            },
            None => false,
        }
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.recent.check_links()?;
        self.frequent.check_links()?;
        self.ghost.check_invariants()?;

        let resident = self.recent.len() + self.frequent.len();
        if self.index.len() != resident {
            return Err(InvariantError::new(format!(
                "2q index has {} keys but segments hold {}",
                self.index.len(),
                resident
            )));
        }
        if resident > self.capacity {
            return Err(InvariantError::new(format!(
                "2q holds {} entries over capacity {}",
                resident, self.capacity
            )));
        }

        for (segment, list) in [
            (Segment::Recent, &self.recent),
            (Segment::Frequent, &self.frequent),
        ] {
            for (id, entry) in list.iter_entries() {
                if self.index.get(&entry.key) != Some(&(segment, id)) {
                    return Err(InvariantError::new(format!(
                        "2q {:?} node {:?} is not indexed by its key",
                        segment, id
                    )));
                }
                if self.ghost.contains(&entry.key) {
                    return Err(InvariantError::new(format!(
                        "2q {:?} node {:?} is also a ghost",
                        segment, id
                    )));
                }
            }
        }
        Ok(())
    }
}

impl<K, V> fmt::Debug for TwoQCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwoQCache")
            .field("recent", &self.recent.len())
            .field("frequent", &self.frequent.len())
            .field("capacity", &self.capacity)
            .field("recent_size", &self.recent_size)
            .field("ghost_size", &self.ghost.capacity())
            .finish_non_exhaustive()
    }
}

impl<K, V> CoreCache<K, V> for TwoQCache<K, V>
where
    K: Clone + Eq + Hash,
{
    fn put(&mut self, key: K, value: V) {
        TwoQCache::put(self, key, value)
    }

    fn len(&self) -> usize {
        TwoQCache::len(self)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn elems(&self) -> Vec<Item<K, V>>
    where
        K: Clone,
        V: Clone,
    {
        TwoQCache::elems(self)
    }

    fn clear(&mut self) {
        TwoQCache::clear(self)
    }
}

impl<K, V> KeyedCache<K, V> for TwoQCache<K, V>
where
    K: Clone + Eq + Hash,
{
    fn get(&mut self, key: &K) -> Option<&V> {
        TwoQCache::get(self, key)
    }

    fn peek(&self, key: &K) -> Option<&V> {
        TwoQCache::peek(self, key)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        TwoQCache::remove(self, key)
    }

    fn contains(&self, key: &K) -> bool {
        TwoQCache::contains(self, key)
    }
}

/// Thread-safe 2Q cache; clones share the same cache.
#[cfg(feature = "concurrency")]
#[derive(Clone)]
pub struct ConcurrentTwoQCache<K, V> {
    inner: Arc<Mutex<TwoQCache<K, V>>>,
}

#[cfg(feature = "concurrency")]
impl<K, V> fmt::Debug for ConcurrentTwoQCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConcurrentTwoQCache")
            .field(&*self.inner.lock())
            .finish()
    }
}

#[cfg(feature = "concurrency")]
impl<K, V> ConcurrentTwoQCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self::from_core(TwoQCache::new(capacity))
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero capacity or out-of-range ratios.
    pub fn try_with_ratios(
        capacity: usize,
        recent_ratio: f64,
        ghost_ratio: f64,
    ) -> Result<Self, ConfigError> {
        TwoQCache::try_with_ratios(capacity, recent_ratio, ghost_ratio).map(Self::from_core)
    }

    pub(crate) fn from_core(core: TwoQCache<K, V>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(core)),
        }
    }

    pub fn put(&self, key: K, value: V) {
        self.inner.lock().put(key, value);
    }

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
