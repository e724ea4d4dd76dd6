//! # TTL-Indexed Store
//!
//! Map from keys to values where every entry carries its own deadline. A
//! background Tokio task reclaims expired entries on a fixed cadence; lookups
//! never depend on that cadence because they compare the deadline directly.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────────┐
//!   │                            TtlCache<K, V>                                │
//!   │                                                                          │
//!   │   Arc<Mutex<TtlStore>> ◄─────────── Weak ──────────── reclamation task   │
//!   │          │                                           (select! on token   │
//!   │          ▼                                            and interval)      │
//!   │   index: FxHashMap<K, u64>        key -> deadline generation             │
//!   │                                                                          │
//!   │   generations: BTreeMap<u64, FxHashMap<K, TtlEntry<V>>>                  │
//!   │                                                                          │
//!   │      gen = (expire_at - origin) / gc_interval                            │
//!   │                                                                          │
//!   │      ┌──────┬──────┬──────┬──────┬──────┐                                │
//!   │      │ g=3  │ g=4  │ g=5  │ g=6  │ g=9  │                                │
//!   │      └──────┴──────┴──────┴──────┴──────┘                                │
//!   │      ◄── retiring ──►◄──────── active ─────────►                         │
//!   │           (g < now_gen)        split_off(now_gen)                        │
//!   └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick splits the generation map at the current generation. Everything
//! below the split expired before the current generation began, so the
//! retiring half is dropped wholesale without inspecting entries one by one
//! for liveness. The per-tick cost is proportional to what is retired, never
//! to the size of the store.
//!
//! ## Expiry Semantics
//!
//! - An entry is live while `now <= expire_at`.
//! - `get` drops an expired entry it runs into.
//! - An expired entry is physically purged at most one `gc_interval` after
//!   its deadline while the task runs.
//! - Cancelling the token stops the task. Dropping every handle to the store
//!   aborts it right away. Lookups stay correct after a cancel; only
//!   reclamation stops.
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use metacache::policy::ttl::IdTtl;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), metacache::error::ConfigError> {
//! let shutdown = CancellationToken::new();
//! let heartbeats: IdTtl<&str> =
//!     IdTtl::new(Duration::from_secs(1), Duration::from_secs(30), shutdown.clone())?;
//!
//! heartbeats.put(7, "store-7");
//! heartbeats.put_with_ttl(8, "store-8", Duration::from_secs(5));
//! assert_eq!(heartbeats.get(&7), Some("store-7"));
//!
//! shutdown.cancel();
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;
use std::mem;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{ConfigError, InvariantError};

/// Default reclamation cadence.
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(60);

/// Default lifetime used by [`TtlCache::put`].
pub const DEFAULT_TTL: Duration = Duration::from_secs(180);

/// Longest accepted lifetime; longer TTLs are clamped to it.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Construction parameters for [`TtlCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlConfig {
    pub gc_interval: Duration,
    pub default_ttl: Duration,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            gc_interval: DEFAULT_GC_INTERVAL,
            default_ttl: DEFAULT_TTL,
        }
    }
}

impl TtlConfig {
    pub fn with_gc_interval(mut self, gc_interval: Duration) -> Self {
        self.gc_interval = gc_interval;
        self
    }

    pub fn with_default_ttl(mut self, default_ttl: Duration) -> Self {
        self.default_ttl = default_ttl;
        self
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] if `gc_interval` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gc_interval.is_zero() {
            return Err(ConfigError::new("ttl gc_interval must be greater than zero"));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct TtlEntry<V> {
    value: V,
    expire_at: Instant,
}

impl<V> TtlEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now <= self.expire_at
    }
}

type Generation<K, V> = FxHashMap<K, TtlEntry<V>>;

struct TtlStore<K, V> {
    index: FxHashMap<K, u64>,
    generations: BTreeMap<u64, Generation<K, V>>,
    origin: Instant,
    gc_interval: Duration,
}

impl<K, V> TtlStore<K, V>
where
    K: Clone + Eq + Hash,
{
    fn new(origin: Instant, gc_interval: Duration) -> Self {
        Self {
            index: FxHashMap::default(),
            generations: BTreeMap::new(),
            origin,
            gc_interval,
        }
    }

    fn generation(&self, at: Instant) -> u64 {
        let elapsed = at.saturating_duration_since(self.origin).as_nanos();
        (elapsed / self.gc_interval.as_nanos()) as u64
    }

    fn insert(&mut self, key: K, value: V, expire_at: Instant) {
        self.take(&key);
        let generation = self.generation(expire_at);
        self.generations
            .entry(generation)
            .or_default()
            .insert(key.clone(), TtlEntry { value, expire_at });
        self.index.insert(key, generation);
    }

    fn take(&mut self, key: &K) -> Option<TtlEntry<V>> {
        let generation = self.index.remove(key)?;
        let bucket = self.generations.get_mut(&generation)?;
        let entry = bucket.remove(key);
        if bucket.is_empty() {
            self.generations.remove(&generation);
        }
        entry
    }

    fn entry(&self, key: &K) -> Option<&TtlEntry<V>> {
        let generation = self.index.get(key)?;
        self.generations.get(generation)?.get(key)
    }

    /// Returns the live entry for `key`, dropping it if it has expired.
    fn live_entry(&mut self, key: &K, now: Instant) -> Option<&TtlEntry<V>> {
        let live = self.entry(key)?.is_live(now);
        if !live {
            self.take(key);
            return None;
        }
        self.entry(key)
    }

    /// Number of live entries. Generations past the current one cannot hold
    /// expired entries, so only the older ones are inspected.
    fn live_len(&self, now: Instant) -> usize {
        let current = self.generation(now);
        let expired: usize = self
            .generations
            .range(..=current)
            .map(|(_, bucket)| bucket.values().filter(|e| !e.is_live(now)).count())
            .sum();
        self.index.len() - expired
    }

    fn live_keys(&self, now: Instant) -> Vec<K> {
        self.generations
            .values()
            .flat_map(|bucket| bucket.iter())
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Removes one live entry, starting from the latest deadlines.
    fn pop_live(&mut self, now: Instant) -> Option<(K, V)> {
        let key = self
            .generations
            .values()
            .rev()
            .flat_map(|bucket| bucket.iter())
            .find(|(_, entry)| entry.is_live(now))
            .map(|(key, _)| key.clone())?;
        self.take(&key).map(|entry| (key, entry.value))
    }

    /// Drops every generation that ended before the one `now` falls in.
    /// Entries of the current generation wait for the next tick.
    fn purge_expired(&mut self, now: Instant) -> usize {
        let current = self.generation(now);
        let active = self.generations.split_off(&current);
        let retiring = mem::replace(&mut self.generations, active);

        let mut purged = 0;
        for bucket in retiring.into_values() {
            for key in bucket.into_keys() {
                self.index.remove(&key);
                purged += 1;
            }
        }
        purged
    }

    fn clear(&mut self) {
        self.index.clear();
        self.generations.clear();
    }

    fn check_invariants(&self) -> Result<(), InvariantError> {
        let stored: usize = self.generations.values().map(|b| b.len()).sum();
        if stored != self.index.len() {
            return Err(InvariantError::new(format!(
                "ttl index has {} keys but generations hold {}",
                self.index.len(),
                stored
            )));
        }
        for (&generation, bucket) in &self.generations {
            if bucket.is_empty() {
                return Err(InvariantError::new(format!(
                    "ttl generation {} is empty but still linked",
                    generation
                )));
            }
            for (key, entry) in bucket {
                if self.index.get(key) != Some(&generation) {
                    return Err(InvariantError::new(format!(
                        "ttl entry in generation {} is not indexed there",
                        generation
                    )));
                }
                if self.generation(entry.expire_at) != generation {
                    return Err(InvariantError::new(format!(
                        "ttl entry filed under generation {} expires in another",
                        generation
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Thread-safe map with per-entry expiry and background reclamation.
///
/// Cloning yields another handle to the same store. The reclamation task
/// lives until the cancellation token fires or the last handle is dropped,
/// whichever comes first.
pub struct TtlCache<K, V> {
    store: Arc<Mutex<TtlStore<K, V>>>,
    reclaimer: Arc<Reclaimer>,
    default_ttl: Duration,
}

/// Owns the reclamation task and aborts it once the last handle goes away.
struct Reclaimer(JoinHandle<()>);

impl Drop for Reclaimer {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// TTL store keyed by numeric ids.
pub type IdTtl<V> = TtlCache<u64, V>;

/// TTL store keyed by strings.
pub type StringTtl<V> = TtlCache<String, V>;

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            reclaimer: Arc::clone(&self.reclaimer),
            default_ttl: self.default_ttl,
        }
    }
}

impl<K, V> fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.store.lock();
        f.debug_struct("TtlCache")
            .field("stored", &store.index.len())
            .field("generations", &store.generations.len())
            .field("gc_interval", &store.gc_interval)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Clone + Eq + Hash + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Creates a store and spawns its reclamation task on the current Tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `gc_interval` is zero or no Tokio runtime is
    /// running on this thread.
    pub fn new(
        gc_interval: Duration,
        default_ttl: Duration,
        shutdown: CancellationToken,
    ) -> Result<Self, ConfigError> {
        Self::with_config(
            TtlConfig {
                gc_interval,
                default_ttl,
            },
            shutdown,
        )
    }

    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_config(
        config: TtlConfig,
        shutdown: CancellationToken,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let handle = Handle::try_current()
            .map_err(|e| ConfigError::new(format!("ttl cache needs a tokio runtime: {}", e)))?;

        let store = Arc::new(Mutex::new(TtlStore::new(Instant::now(), config.gc_interval)));
        let reclaimer = spawn_reclaimer(
            &handle,
            Arc::downgrade(&store),
            config.gc_interval,
            shutdown,
        );

        Ok(Self {
            store,
            reclaimer: Arc::new(Reclaimer(reclaimer)),
            default_ttl: config.default_ttl,
        })
    }

    /// Stores `value` under `key` for the default lifetime.
    pub fn put(&self, key: K, value: V) {
        self.put_with_ttl(key, value, self.default_ttl);
    }

    /// Stores `value` under `key` until `now + ttl`, replacing any previous
    /// entry and its deadline.
    pub fn put_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let expire_at = Instant::now() + ttl.min(MAX_TTL);
        self.store.lock().insert(key, value, expire_at);
    }

    /// Returns the value if the entry exists and has not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.store
            .lock()
            .live_entry(key, now)
            .map(|entry| entry.value.clone())
    }

    /// Returns `true` if `key` holds a live entry.
    pub fn contains(&self, key: &K) -> bool {
        let now = Instant::now();
        self.store
            .lock()
            .entry(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Time left before `key` expires.
    pub fn remaining_ttl(&self, key: &K) -> Option<Duration> {
        let now = Instant::now();
        let store = self.store.lock();
        let entry = store.entry(key)?;
        entry
            .is_live(now)
            .then(|| entry.expire_at.saturating_duration_since(now))
    }

    /// Re-arms a live entry so it expires `ttl` from now. Returns `false` if
    /// the key is absent or already expired.
    pub fn update_ttl(&self, key: &K, ttl: Duration) -> bool {
        let now = Instant::now();
        let mut store = self.store.lock();
        if store.live_entry(key, now).is_none() {
            return false;
        }
        match store.take(key) {
            Some(entry) => {
                store.insert(key.clone(), entry.value, now + ttl.min(MAX_TTL));
                true
            },
            None => false,
        }
    }

    /// Deletes `key` whether or not it has expired.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.store.lock().take(key).map(|entry| entry.value)
    }

    /// Removes and returns some live entry. Which one is unspecified.
    pub fn pop(&self) -> Option<(K, V)> {
        let now = Instant::now();
        self.store.lock().pop_live(now)
    }

    /// Keys of all live entries, in no particular order.
    pub fn keys(&self) -> Vec<K> {
        let now = Instant::now();
        self.store.lock().live_keys(now)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.store.lock().live_len(now)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of stored entries, expired ones included, i.e. what the
    /// reclamation task has not freed yet.
    pub fn stored_len(&self) -> usize {
        self.store.lock().index.len()
    }

    pub fn clear(&self) {
        self.store.lock().clear();
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn gc_interval(&self) -> Duration {
        self.store.lock().gc_interval
    }

    /// Returns `true` while the reclamation task is running.
    pub fn is_reclaiming(&self) -> bool {
        !self.reclaimer.0.is_finished()
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.store.lock().check_invariants()
    }
}

impl<V> TtlCache<u64, V>
where
    V: Clone + Send + 'static,
{
    /// Ids of all live entries.
    pub fn get_all_ids(&self) -> Vec<u64> {
        self.keys()
    }
}

fn spawn_reclaimer<K, V>(
    handle: &Handle,
    store: Weak<Mutex<TtlStore<K, V>>>,
    gc_interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    K: Clone + Eq + Hash + Send + 'static,
    V: Send + 'static,
{
    handle.spawn(async move {
        debug!(
            gc_interval_ms = gc_interval.as_millis() as u64,
            "Starting TTL reclamation task"
        );

        let mut interval = tokio::time::interval(gc_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("TTL reclamation task: shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let Some(store) = store.upgrade() else {
                        debug!("TTL store dropped, stopping reclamation task");
                        break;
                    };
                    let purged = store.lock().purge_expired(Instant::now());
                    if purged > 0 {
                        trace!(purged, "Reclaimed expired TTL entries");
                    }
                }
            }
        }
    })
}
