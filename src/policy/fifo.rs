//! # Bounded First-In-First-Out (FIFO) Cache
//!
//! Evicts the oldest inserted entry on overflow. Reads never reorder, so the
//! insertion order doubles as a resumable cursor: [`FifoCache::from_elems`]
//! returns everything admitted after a given key.
//!
//! ## Architecture
//!
//! ```text
//!   index: FxHashMap<K, SlotId>
//!   ┌────────┬───────┐
//!   │ op_7   │ id_a ─┼───┐
//!   │ op_9   │ id_b ─┼───┼──────────┐
//!   │ op_12  │ id_c ─┼───┼──────────┼──────────┐
//!   └────────┴───────┘   ▼          ▼          ▼
//!
//!   queue: IntrusiveList<Entry<K, V>>
//!   head ──► [op_7] ◄──► [op_9] ◄──► [op_12] ◄── tail
//!            oldest                   newest
//!            pop_oldest()             put()
//!
//!   from_elems(&op_7) ─► [op_9, op_12]
//! ```
//!
//! ## Behavior
//!
//! - `put` of a new key appends at the newest end and drops the oldest entry
//!   if the queue is over capacity.
//! - `put` of a resident key is a fresh insertion: the old entry is unlinked
//!   and the new value is appended at the newest end.
//! - `pop_oldest` is the only removal; there is no keyed `get` or `remove`.
//!
//! ## Example Usage
//!
//! ```
//! use metacache::policy::fifo::FifoCache;
//!
//! let mut stream = FifoCache::new(3);
//! for seq in 1..=4u64 {
//!     stream.put(seq, seq * 10);
//! }
//!
//! // 1 was evicted; resume after 2.
//! let rest: Vec<_> = stream.from_elems(&2).into_iter().map(|i| i.key).collect();
//! assert_eq!(rest, vec![3, 4]);
//! assert_eq!(stream.pop_oldest(), Some((2, 20)));
//! ```

use std::fmt;
use std::hash::Hash;
#[cfg(feature = "concurrency")]
use std::sync::Arc;

#[cfg(feature = "concurrency")]
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::ds::{IntrusiveList, SlotId};
use crate::error::{ConfigError, InvariantError};
use crate::traits::{CoreCache, FifoCacheTrait, Item};

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
}

/// Single-threaded bounded FIFO cache.
pub struct FifoCache<K, V> {
    index: FxHashMap<K, SlotId>,
    queue: IntrusiveList<Entry<K, V>>,
    capacity: usize,
}

impl<K, V> FifoCache<K, V>
where
    K: Clone + Eq + Hash,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            queue: IntrusiveList::with_capacity(capacity),
            capacity,
        }
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] if `capacity` is zero.
    pub fn try_new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::new("fifo capacity must be greater than zero"));
        }
        Ok(Self::new(capacity))
    }

    /// Appends `key` at the newest end, evicting the oldest entry on overflow.
    pub fn put(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }

        if let Some(id) = self.index.remove(&key) {
            self.queue.remove(id);
        }

        let id = self.queue.push_back(Entry {
            key: key.clone(),
            value,
        });
        self.index.insert(key, id);

        if self.queue.len() > self.capacity {
            self.pop_oldest();
        }
    }

    /// Removes and returns the oldest entry.
    pub fn pop_oldest(&mut self) -> Option<(K, V)> {
        let entry = self.queue.pop_front()?;
        self.index.remove(&entry.key);
        Some((entry.key, entry.value))
    }

    pub fn peek_oldest(&self) -> Option<(&K, &V)> {
        self.queue.front().map(|entry| (&entry.key, &entry.value))
    }

    /// Looks up `key` without affecting order.
    pub fn peek(&self, key: &K) -> Option<&V> {
        let id = self.index.get(key)?;
        self.queue.get(*id).map(|entry| &entry.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
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

    /// Iterates entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.queue.iter().map(|entry| (&entry.key, &entry.value))
    }

    pub fn elems(&self) -> Vec<Item<K, V>>
    where
        V: Clone,
    {
        self.iter()
            .map(|(k, v)| Item::new(k.clone(), v.clone()))
            .collect()
    }

    /// Entries inserted strictly after `key` that are still resident, oldest
    /// first. Empty when `key` is absent or is the newest entry.
    pub fn from_elems(&self, key: &K) -> Vec<Item<K, V>>
    where
        V: Clone,
    {
        let Some(&id) = self.index.get(key) else {
            return Vec::new();
        };
        self.queue
            .iter_after(id)
            .map(|entry| Item::new(entry.key.clone(), entry.value.clone()))
            .collect()
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.queue.clear();
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.queue.check_links()?;
        if self.index.len() != self.queue.len() {
            return Err(InvariantError::new(format!(
                "fifo index has {} keys but queue has {} nodes",
                self.index.len(),
                self.queue.len()
            )));
        }
        if self.queue.len() > self.capacity {
            return Err(InvariantError::new(format!(
                "fifo holds {} entries over capacity {}",
                self.queue.len(),
                self.capacity
            )));
        }
        for (id, entry) in self.queue.iter_entries() {
            if self.index.get(&entry.key) != Some(&id) {
                return Err(InvariantError::new(format!(
                    "fifo node {:?} is not indexed by its key",
                    id
                )));
            }
        }
        Ok(())
    }
}

impl<K, V> fmt::Debug for FifoCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FifoCache")
            .field("len", &self.index.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl<K, V> CoreCache<K, V> for FifoCache<K, V>
where
    K: Clone + Eq + Hash,
{
    fn put(&mut self, key: K, value: V) {
        FifoCache::put(self, key, value)
    }

    fn len(&self) -> usize {
        FifoCache::len(self)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn elems(&self) -> Vec<Item<K, V>>
    where
        K: Clone,
        V: Clone,
    {
        FifoCache::elems(self)
    }

    fn clear(&mut self) {
        FifoCache::clear(self)
    }
}

impl<K, V> FifoCacheTrait<K, V> for FifoCache<K, V>
where
    K: Clone + Eq + Hash,
{
    fn pop_oldest(&mut self) -> Option<(K, V)> {
        FifoCache::pop_oldest(self)
    }

    fn peek_oldest(&self) -> Option<(&K, &V)> {
        FifoCache::peek_oldest(self)
    }

    fn from_elems(&self, key: &K) -> Vec<Item<K, V>>
    where
        K: Clone,
        V: Clone,
    {
        FifoCache::from_elems(self, key)
    }
}

/// Thread-safe FIFO cache; clones share the same queue.
#[cfg(feature = "concurrency")]
#[derive(Clone)]
pub struct ConcurrentFifoCache<K, V> {
    inner: Arc<Mutex<FifoCache<K, V>>>,
}

#[cfg(feature = "concurrency")]
impl<K, V> fmt::Debug for ConcurrentFifoCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.inner.lock();
        f.debug_struct("ConcurrentFifoCache")
            .field("len", &cache.index.len())
            .field("capacity", &cache.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "concurrency")]
impl<K, V> ConcurrentFifoCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FifoCache::new(capacity))),
        }
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] if `capacity` is zero.
    pub fn try_new(capacity: usize) -> Result<Self, ConfigError> {
        let core = FifoCache::try_new(capacity)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(core)),
        })
    }

    pub fn put(&self, key: K, value: V) {
        self.inner.lock().put(key, value);
    }

    pub fn pop_oldest(&self) -> Option<(K, V)> {
        self.inner.lock().pop_oldest()
    }

    pub fn peek_oldest(&self) -> Option<(K, V)> {
        self.inner
            .lock()
            .peek_oldest()
            .map(|(k, v)| (k.clone(), v.clone()))
    }

    pub fn peek(&self, key: &K) -> Option<V> {
        self.inner.lock().peek(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().contains(key)
    }

    pub fn elems(&self) -> Vec<Item<K, V>> {
        self.inner.lock().elems()
    }

    pub fn from_elems(&self, key: &K) -> Vec<Item<K, V>> {
        self.inner.lock().from_elems(key)
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

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(items: Vec<Item<i32, i32>>) -> Vec<i32> {
        items.into_iter().map(|item| item.key).collect()
    }

    mod basic_behavior {
        use super::*;

        #[test]
        fn evicts_in_insertion_order() {
            let mut cache = FifoCache::new(3);
            cache.put(1, 1);
            cache.put(2, 2);
            cache.put(3, 3);
            cache.put(4, 4);

            assert_eq!(cache.len(), 3);
            assert!(!cache.contains(&1));
            assert_eq!(keys(cache.elems()), vec![2, 3, 4]);
            cache.check_invariants().unwrap();
        }

        #[test]
        fn peek_never_reorders() {
            let mut cache = FifoCache::new(2);
            cache.put(1, 10);
            cache.put(2, 20);

            for _ in 0..3 {
                assert_eq!(cache.peek(&1), Some(&10));
            }
            cache.put(3, 30);

            assert!(!cache.contains(&1));
            assert_eq!(keys(cache.elems()), vec![2, 3]);
        }

        #[test]
        fn pop_oldest_drains_front() {
            let mut cache = FifoCache::new(3);
            cache.put(1, 10);
            cache.put(2, 20);

            assert_eq!(cache.peek_oldest(), Some((&1, &10)));
            assert_eq!(cache.pop_oldest(), Some((1, 10)));
            assert_eq!(cache.pop_oldest(), Some((2, 20)));
            assert_eq!(cache.pop_oldest(), None);
            assert_eq!(cache.peek_oldest(), None);
            cache.check_invariants().unwrap();
        }

        #[test]
        fn reput_moves_key_to_newest_end() {
            let mut cache = FifoCache::new(3);
            cache.put(1, 10);
            cache.put(2, 20);
            cache.put(1, 11);

            assert_eq!(cache.len(), 2);
            assert_eq!(cache.peek(&1), Some(&11));
            assert_eq!(keys(cache.elems()), vec![2, 1]);

            cache.put(3, 30);
            cache.put(4, 40);
            assert_eq!(keys(cache.elems()), vec![1, 3, 4]);
            cache.check_invariants().unwrap();
        }
    }

    mod from_elems {
        use super::*;

        #[test]
        fn returns_strict_suffix() {
            let mut cache = FifoCache::new(5);
            for k in 1..=5 {
                cache.put(k, k * 100);
            }

            let rest = cache.from_elems(&2);
            assert_eq!(keys(rest.clone()), vec![3, 4, 5]);
            assert_eq!(rest[0].value, 300);
            assert_eq!(keys(cache.from_elems(&1)), vec![2, 3, 4, 5]);
        }

        #[test]
        fn empty_for_newest_or_absent() {
            let mut cache = FifoCache::new(3);
            cache.put(1, 1);
            cache.put(2, 2);

            assert!(cache.from_elems(&2).is_empty());
            assert!(cache.from_elems(&99).is_empty());
        }

        #[test]
        fn evicted_cursor_yields_nothing() {
            let mut cache = FifoCache::new(2);
            cache.put(1, 1);
            cache.put(2, 2);
            cache.put(3, 3);

            assert!(cache.from_elems(&1).is_empty());
            assert_eq!(keys(cache.from_elems(&2)), vec![3]);
        }
    }

    mod edge_cases {
        use super::*;

        #[test]
        fn zero_capacity_rejected_or_inert() {
            assert!(FifoCache::<i32, i32>::try_new(0).is_err());

            let mut cache = FifoCache::new(0);
            cache.put(1, 1);
            assert!(cache.is_empty());
            assert_eq!(cache.pop_oldest(), None);
            cache.check_invariants().unwrap();
        }

        #[test]
        fn clear_resets_cursor() {
            let mut cache = FifoCache::new(2);
            cache.put(1, 1);
            cache.put(2, 2);
            cache.clear();
            assert!(cache.from_elems(&1).is_empty());
            cache.put(3, 3);
            assert_eq!(keys(cache.elems()), vec![3]);
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn eviction_follows_insertion_order(
                capacity in 1usize..8,
                inserts in prop::collection::vec(0i32..20, 0..100),
                reads in prop::collection::vec(0i32..20, 0..50),
            ) {
                let mut cache = FifoCache::new(capacity);
                let mut model: Vec<i32> = Vec::new();

                for (i, key) in inserts.iter().enumerate() {
                    cache.put(*key, i as i32);
                    model.retain(|k| k != key);
                    model.push(*key);
                    if model.len() > capacity {
                        model.remove(0);
                    }
                    if let Some(read) = reads.get(i) {
                        let _ = cache.peek(read);
                    }

                    prop_assert!(cache.len() <= capacity);
                    let snapshot: Vec<i32> = cache.elems().into_iter().map(|item| item.key).collect();
                    prop_assert_eq!(&snapshot, &model);
                }

                for (pos, key) in model.iter().enumerate() {
                    let suffix: Vec<i32> = cache.from_elems(key).into_iter().map(|item| item.key).collect();
                    prop_assert_eq!(&suffix[..], &model[pos + 1..]);
                }
                prop_assert!(cache.check_invariants().is_ok());
            }
        }
    }

    #[cfg(feature = "concurrency")]
    mod concurrent {
        use super::*;

        #[test]
        fn shared_queue_across_clones() {
            let cache = ConcurrentFifoCache::new(2);
            let producer = cache.clone();

            producer.put(1, "a".to_string());
            producer.put(2, "b".to_string());
            producer.put(3, "c".to_string());

            assert_eq!(cache.peek_oldest(), Some((2, "b".to_string())));
            assert_eq!(
                cache.from_elems(&2).into_iter().map(|i| i.key).collect::<Vec<_>>(),
                vec![3]
            );
            assert_eq!(cache.pop_oldest().map(|(k, _)| k), Some(2));
            assert_eq!(cache.len(), 1);
            cache.check_invariants().unwrap();
        }
    }
}
