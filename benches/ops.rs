//! Micro-operation benchmarks for every container.
//!
//! Run with: `cargo bench --bench ops`
//!
//! Measures per-operation latency for the hot paths: keyed hits, inserts
//! that evict, priority re-scoring, and TTL lookups.

use std::hint::black_box;
use std::time::{Duration, Instant};

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use metacache::policy::fifo::FifoCache;
use metacache::policy::lru::LruCache;
use metacache::policy::priority_queue::PriorityQueue;
use metacache::policy::ttl::IdTtl;
use metacache::policy::two_q::TwoQCache;
use metacache::traits::KeyedCache;
use tokio_util::sync::CancellationToken;

const CAPACITY: usize = 16_384;
const OPS: u64 = 100_000;

fn filled<C: KeyedCache<u64, u64>>(mut cache: C) -> C {
    for i in 0..CAPACITY as u64 {
        cache.put(i, i);
    }
    cache
}

// ============================================================================
// Get Hit Latency (ns/op)
// ============================================================================

fn bench_get_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_hit_ns");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("lru", |b| {
        b.iter_custom(|iters| {
            let mut cache = filled(LruCache::new(CAPACITY));
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    black_box(cache.get(&(i % CAPACITY as u64)));
                }
            }
            start.elapsed()
        })
    });

    group.bench_function("two_q", |b| {
        b.iter_custom(|iters| {
            let mut cache = filled(TwoQCache::new(CAPACITY));
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    black_box(cache.get(&(i % CAPACITY as u64)));
                }
            }
            start.elapsed()
        })
    });

    group.finish();
}

// ============================================================================
// Insert With Eviction (ns/op)
// ============================================================================

fn bench_put_evict(c: &mut Criterion) {
    let mut group = c.benchmark_group("put_evict_ns");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("lru", |b| {
        b.iter_custom(|iters| {
            let mut cache = filled(LruCache::new(CAPACITY));
            let start = Instant::now();
            for n in 0..iters {
                for i in 0..OPS {
                    cache.put(CAPACITY as u64 + n * OPS + i, i);
                }
            }
            start.elapsed()
        })
    });

    group.bench_function("two_q", |b| {
        b.iter_custom(|iters| {
            let mut cache = filled(TwoQCache::new(CAPACITY));
            let start = Instant::now();
            for n in 0..iters {
                for i in 0..OPS {
                    cache.put(CAPACITY as u64 + n * OPS + i, i);
                }
            }
            start.elapsed()
        })
    });

    group.bench_function("fifo", |b| {
        b.iter_custom(|iters| {
            let mut cache = FifoCache::new(CAPACITY);
            let start = Instant::now();
            for n in 0..iters {
                for i in 0..OPS {
                    cache.put(n * OPS + i, i);
                }
            }
            start.elapsed()
        })
    });

    group.finish();
}

// ============================================================================
// Priority Queue (ns/op)
// ============================================================================

fn bench_priority_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("priority_queue_ns");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("rescore", |b| {
        b.iter_custom(|iters| {
            let mut pq: PriorityQueue<u64, u64> = PriorityQueue::new(CAPACITY);
            for id in 0..CAPACITY as u64 {
                pq.put(id, id);
            }
            let start = Instant::now();
            for n in 0..iters {
                for i in 0..OPS {
                    let id = (i * 7919) % CAPACITY as u64;
                    pq.put(n.wrapping_mul(31).wrapping_add(i * 13) % 1_000_000, id);
                }
            }
            start.elapsed()
        })
    });

    group.bench_function("put_pop", |b| {
        b.iter_custom(|iters| {
            let mut pq: PriorityQueue<u64, u64> = PriorityQueue::new(CAPACITY);
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    pq.put((i * 2_654_435_761) % 1_000_000, i);
                    if pq.len() == CAPACITY {
                        black_box(pq.pop());
                    }
                }
                pq.clear();
            }
            start.elapsed()
        })
    });

    group.finish();
}

// ============================================================================
// TTL Lookups (ns/op)
// ============================================================================

fn bench_ttl(c: &mut Criterion) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => panic!("failed to build tokio runtime: {}", e),
    };
    let _guard = runtime.enter();
    let shutdown = CancellationToken::new();

    let mut group = c.benchmark_group("ttl_ns");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("get_live", |b| {
        b.iter_custom(|iters| {
            let cache: IdTtl<u64> =
                IdTtl::new(Duration::from_secs(60), Duration::from_secs(600), shutdown.clone())
                    .unwrap();
            for i in 0..CAPACITY as u64 {
                cache.put(i, i);
            }
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    black_box(cache.get(&(i % CAPACITY as u64)));
                }
            }
            start.elapsed()
        })
    });

    group.finish();
    shutdown.cancel();
}

criterion_group!(
    benches,
    bench_get_hit,
    bench_put_evict,
    bench_priority_queue,
    bench_ttl
);
criterion_main!(benches);
