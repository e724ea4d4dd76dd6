//! metacache: bounded in-memory containers for control-plane metadata.
//!
//! Eviction caches (LRU, FIFO, 2Q), a TTL-indexed store with background
//! reclamation, and an identity-keyed priority queue with admission control.
//! Every container keeps an ordering structure and a key index in lockstep;
//! `check_invariants` on each one verifies that.

pub mod ds;
pub mod error;
pub mod policy;
pub mod prelude;
pub mod traits;

#[cfg(feature = "concurrency")]
pub mod builder;

pub use crate::ds::{GhostList, IntrusiveList, SlotId};
