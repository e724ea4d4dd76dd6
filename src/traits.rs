//! # Container Contract
//!
//! Shared operation set for the bounded caches, plus the identity capability
//! required by the priority queue.
//!
//! ## Architecture
//!
//! ```text
//!                          ┌─────────────────────────────────────────┐
//!                          │            CoreCache<K, V>              │
//!                          │                                         │
//!                          │  put(&mut, K, V)                        │
//!                          │  len(&) → usize                         │
//!                          │  capacity(&) → usize                    │
//!                          │  elems(&) → Vec<Item<K, V>>             │
//!                          │  clear(&mut)                            │
//!                          └──────────────────┬──────────────────────┘
//!                                             │
//!                ┌────────────────────────────┴────────────────────────────┐
//!                ▼                                                         ▼
//!   ┌────────────────────────────┐                          ┌─────────────────────────────┐
//!   │   FifoCacheTrait<K, V>     │                          │     KeyedCache<K, V>        │
//!   │                            │                          │                             │
//!   │  pop_oldest() → (K, V)     │                          │  get(&mut, &K) → Option<&V> │
//!   │  peek_oldest() → (&K, &V)  │                          │  peek(&, &K) → Option<&V>   │
//!   │  from_elems(&K) → Vec      │                          │  remove(&K) → Option<V>     │
//!   │                            │                          │  contains(&K) → bool        │
//!   │  no keyed get / remove     │                          │                             │
//!   └────────────────────────────┘                          └─────────────────────────────┘
//!           FifoCache                                        LruCache, TwoQCache
//! ```
//!
//! FIFO extends `CoreCache` directly: insertion order is immutable once an
//! entry is admitted, which is what makes `from_elems` usable as a resumable
//! cursor. A promoting `get` or an arbitrary keyed `remove` would break that.
//!
//! Every operation is total. A miss is `None`; capacity is enforced by silent
//! eviction, never by rejecting a `put`.
//!
//! ## Example Usage
//!
//! ```
//! use metacache::policy::lru::LruCache;
//! use metacache::policy::two_q::TwoQCache;
//! use metacache::traits::{CoreCache, KeyedCache};
//!
//! fn warm<C: KeyedCache<u64, String>>(cache: &mut C, ids: &[u64]) {
//!     for id in ids {
//!         cache.put(*id, format!("region-{}", id));
//!     }
//! }
//!
//! let mut lru = LruCache::new(4);
//! let mut two_q = TwoQCache::new(4);
//! warm(&mut lru, &[1, 2, 3]);
//! warm(&mut two_q, &[1, 2, 3]);
//! assert_eq!(lru.len(), two_q.len());
//! ```

/// One `(key, value)` pair of an ordered snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Item<K, V> {
    pub key: K,
    pub value: V,
}

impl<K, V> Item<K, V> {
    pub fn new(key: K, value: V) -> Self {
        Self { key, value }
    }

    pub fn into_pair(self) -> (K, V) {
        (self.key, self.value)
    }
}

/// Operations every bounded cache supports.
pub trait CoreCache<K, V> {
    /// Inserts or updates `key`. Never fails; overflow evicts silently.
    fn put(&mut self, key: K, value: V);

    /// Number of resident entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of resident entries.
    fn capacity(&self) -> usize;

    /// Ordered snapshot of every resident entry.
    ///
    /// The order is policy specific: most-recent-first for LRU and 2Q,
    /// oldest-first for FIFO.
    fn elems(&self) -> Vec<Item<K, V>>
    where
        K: Clone,
        V: Clone;

    /// Drops every entry.
    fn clear(&mut self);
}

/// Caches that support lookup and removal by key.
pub trait KeyedCache<K, V>: CoreCache<K, V> {
    /// Looks up `key`, applying the policy's promote-on-read.
    fn get(&mut self, key: &K) -> Option<&V>;

    /// Looks up `key` without reordering anything.
    fn peek(&self, key: &K) -> Option<&V>;

    /// Removes `key`, returning its value. Removing an absent key is a no-op.
    fn remove(&mut self, key: &K) -> Option<V>;

    fn contains(&self, key: &K) -> bool {
        self.peek(key).is_some()
    }
}

/// Caches whose only removal is of the oldest entry.
pub trait FifoCacheTrait<K, V>: CoreCache<K, V> {
    /// Removes and returns the oldest entry.
    fn pop_oldest(&mut self) -> Option<(K, V)>;

    /// Returns the oldest entry without removing it.
    fn peek_oldest(&self) -> Option<(&K, &V)>;

    /// Entries inserted strictly after `key` that are still resident, oldest
    /// first. Empty if `key` is absent or is the newest entry.
    fn from_elems(&self, key: &K) -> Vec<Item<K, V>>
    where
        K: Clone,
        V: Clone;
}

/// Stable unsigned identity of a value stored in a
/// [`PriorityQueue`](crate::policy::priority_queue::PriorityQueue).
///
/// Two values with the same `id()` are the same queue member.
///
/// ```
/// use metacache::traits::Identified;
///
/// struct Operator {
///     region_id: u64,
/// }
///
/// impl Identified for Operator {
///     fn id(&self) -> u64 {
///         self.region_id
///     }
/// }
/// ```
pub trait Identified {
    fn id(&self) -> u64;
}

impl Identified for u64 {
    fn id(&self) -> u64 {
        *self
    }
}

impl<T: Identified + ?Sized> Identified for std::sync::Arc<T> {
    fn id(&self) -> u64 {
        (**self).id()
    }
}

impl<T: Identified + ?Sized> Identified for Box<T> {
    fn id(&self) -> u64 {
        (**self).id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn item_round_trips_into_pair() {
        let item = Item::new(7u64, "seven");
        assert_eq!(item.clone().into_pair(), (7, "seven"));
        assert_eq!(item.key, 7);
    }

    #[test]
    fn identity_forwards_through_smart_pointers() {
        struct Region(u64);
        impl Identified for Region {
            fn id(&self) -> u64 {
                self.0
            }
        }

        assert_eq!(Arc::new(Region(9)).id(), 9);
        assert_eq!(Box::new(Region(3)).id(), 3);
        assert_eq!(42u64.id(), 42);
    }
}
