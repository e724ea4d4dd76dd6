//! Container implementations.
//!
//! | Module             | Container                         | Eviction / admission          |
//! |--------------------|-----------------------------------|-------------------------------|
//! | [`lru`]            | [`LruCache`](lru::LruCache)       | least recently used           |
//! | [`fifo`]           | [`FifoCache`](fifo::FifoCache)    | oldest inserted               |
//! | [`two_q`]          | [`TwoQCache`](two_q::TwoQCache)   | RECENT first, then FREQUENT   |
//! | [`priority_queue`] | [`PriorityQueue`](priority_queue::PriorityQueue) | rejects when full |
//! | `ttl`              | `TtlCache`                        | per-entry deadline            |
//!
//! Each single-threaded container has a `Concurrent*` counterpart behind the
//! `concurrency` feature. The TTL store is always shared and needs the `ttl`
//! feature.

pub mod fifo;
pub mod lru;
pub mod priority_queue;
#[cfg(feature = "ttl")]
pub mod ttl;
pub mod two_q;
