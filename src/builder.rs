//! Unified cache builder for the LRU-contract policies.
//!
//! Picks an eviction policy at runtime and hands back one thread-safe
//! [`Cache`] handle, so call sites that only care about `put`/`get` do not
//! need to name a concrete policy type.
//!
//! ## Example
//!
//! ```rust
//! use metacache::builder::{CacheBuilder, CachePolicy};
//!
//! let cache = CacheBuilder::new(100).build::<u64, String>(CachePolicy::Lru);
//! cache.put(1, "hello".to_string());
//! assert_eq!(cache.get(&1), Some("hello".to_string()));
//!
//! let scan_resistant = CacheBuilder::new(100)
//!     .try_build::<u64, String>(CachePolicy::two_q())
//!     .unwrap();
//! assert_eq!(scan_resistant.capacity(), 100);
//! ```

use std::fmt;
use std::hash::Hash;

use crate::error::{ConfigError, InvariantError};
use crate::policy::lru::{ConcurrentLruCache, LruCache};
use crate::policy::two_q::{
    ConcurrentTwoQCache, DEFAULT_GHOST_RATIO, DEFAULT_RECENT_RATIO, TwoQCache,
};
use crate::traits::Item;

/// Available eviction policies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CachePolicy {
    /// Least Recently Used eviction.
    Lru,
    /// Two-queue eviction with explicit segment ratios.
    TwoQ { recent_ratio: f64, ghost_ratio: f64 },
}

impl CachePolicy {
    /// 2Q with the default ratios.
    pub fn two_q() -> Self {
        CachePolicy::TwoQ {
            recent_ratio: DEFAULT_RECENT_RATIO,
            ghost_ratio: DEFAULT_GHOST_RATIO,
        }
    }
}

/// Builder for [`Cache`] handles.
#[derive(Debug, Clone, Copy)]
pub struct CacheBuilder {
    capacity: usize,
}

impl CacheBuilder {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Builds a cache with the chosen policy.
    ///
    /// # Panics
    ///
    /// Panics on invalid 2Q ratios. A zero capacity builds a cache that
    /// stores nothing.
    pub fn build<K, V>(self, policy: CachePolicy) -> Cache<K, V>
    where
        K: Clone + Eq + Hash,
        V: Clone,
    {
        let inner = match policy {
            CachePolicy::Lru => CacheInner::Lru(ConcurrentLruCache::new(self.capacity)),
            CachePolicy::TwoQ {
                recent_ratio,
                ghost_ratio,
            } => CacheInner::TwoQ(ConcurrentTwoQCache::from_core(TwoQCache::with_ratios(
                self.capacity,
                recent_ratio,
                ghost_ratio,
            ))),
        };
        Cache { inner, policy }
    }

    /// Builds a cache, validating capacity and ratios.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero capacity or out-of-range ratios.
    pub fn try_build<K, V>(self, policy: CachePolicy) -> Result<Cache<K, V>, ConfigError>
    where
        K: Clone + Eq + Hash,
        V: Clone,
    {
        let inner = match policy {
            CachePolicy::Lru => {
                CacheInner::Lru(ConcurrentLruCache::from_core(LruCache::try_new(self.capacity)?))
            },
            CachePolicy::TwoQ {
                recent_ratio,
                ghost_ratio,
            } => CacheInner::TwoQ(ConcurrentTwoQCache::try_with_ratios(
                self.capacity,
                recent_ratio,
                ghost_ratio,
            )?),
        };
        Ok(Cache { inner, policy })
    }
}

/// Thread-safe cache handle with a runtime-selected policy.
///
/// Clones share the same underlying cache.
#[derive(Clone)]
pub struct Cache<K, V> {
    inner: CacheInner<K, V>,
    policy: CachePolicy,
}

#[derive(Clone)]
enum CacheInner<K, V> {
    Lru(ConcurrentLruCache<K, V>),
    TwoQ(ConcurrentTwoQCache<K, V>),
}

impl<K, V> Cache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn put(&self, key: K, value: V) {
        match &self.inner {
            CacheInner::Lru(lru) => lru.put(key, value),
            CacheInner::TwoQ(two_q) => two_q.put(key, value),
        }
    }

    /// Returns a clone of the value, applying the policy's promote-on-read.
    pub fn get(&self, key: &K) -> Option<V> {
        match &self.inner {
            CacheInner::Lru(lru) => lru.get(key),
            CacheInner::TwoQ(two_q) => two_q.get(key),
        }
    }

    pub fn peek(&self, key: &K) -> Option<V> {
        match &self.inner {
            CacheInner::Lru(lru) => lru.peek(key),
            CacheInner::TwoQ(two_q) => two_q.peek(key),
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        match &self.inner {
            CacheInner::Lru(lru) => lru.remove(key),
            CacheInner::TwoQ(two_q) => two_q.remove(key),
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        match &self.inner {
            CacheInner::Lru(lru) => lru.contains(key),
            CacheInner::TwoQ(two_q) => two_q.contains(key),
        }
    }

    /// Snapshot in the policy's recency order.
    pub fn elems(&self) -> Vec<Item<K, V>> {
        match &self.inner {
            CacheInner::Lru(lru) => lru.elems(),
            CacheInner::TwoQ(two_q) => two_q.elems(),
        }
    }

    pub fn len(&self) -> usize {
        match &self.inner {
            CacheInner::Lru(lru) => lru.len(),
            CacheInner::TwoQ(two_q) => two_q.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        match &self.inner {
            CacheInner::Lru(lru) => lru.capacity(),
            CacheInner::TwoQ(two_q) => two_q.capacity(),
        }
    }

    pub fn clear(&self) {
        match &self.inner {
            CacheInner::Lru(lru) => lru.clear(),
            CacheInner::TwoQ(two_q) => two_q.clear(),
        }
    }

    /// Policy this cache was built with.
    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        match &self.inner {
            CacheInner::Lru(lru) => lru.check_invariants(),
            CacheInner::TwoQ(two_q) => two_q.check_invariants(),
        }
    }
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
