pub use crate::error::{ConfigError, InvariantError};
pub use crate::policy::fifo::FifoCache;
pub use crate::policy::lru::LruCache;
pub use crate::policy::priority_queue::{PriorityEntry, PriorityQueue};
pub use crate::policy::two_q::{Segment, TwoQCache};
pub use crate::traits::{CoreCache, FifoCacheTrait, Identified, Item, KeyedCache};

#[cfg(feature = "concurrency")]
pub use crate::builder::{Cache, CacheBuilder, CachePolicy};
#[cfg(feature = "concurrency")]
pub use crate::policy::{
    fifo::ConcurrentFifoCache, lru::ConcurrentLruCache, priority_queue::ConcurrentPriorityQueue,
    two_q::ConcurrentTwoQCache,
};
#[cfg(feature = "ttl")]
pub use crate::policy::ttl::{IdTtl, StringTtl, TtlCache, TtlConfig};
