//! Key streams for hit-rate benchmarks.
//!
//! Streams are seeded so every policy sees the exact same sequence.

use metacache::traits::KeyedCache;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy)]
pub enum Workload {
    /// Uniform random keys in `[0, universe)`.
    Uniform,
    /// A small hot set receives `hot_prob` of all accesses.
    Hotset { hot_fraction: f64, hot_prob: f64 },
    /// Sequential scan in `[0, universe)`.
    Scan,
    /// Hot-set traffic interrupted by one-time sequential scans over keys
    /// outside the universe. Models a full-table sweep landing on a warm
    /// metadata cache.
    HotsetWithScans {
        hot_fraction: f64,
        scan_every: usize,
        scan_length: u64,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct WorkloadSpec {
    pub universe: u64,
    pub workload: Workload,
    pub seed: u64,
}

impl WorkloadSpec {
    pub fn generator(self) -> WorkloadGenerator {
        WorkloadGenerator::new(self.universe, self.workload, self.seed)
    }
}

#[derive(Debug, Clone)]
pub struct WorkloadGenerator {
    universe: u64,
    workload: Workload,
    rng: StdRng,
    step: usize,
    cursor: u64,
    scan_left: u64,
}

impl WorkloadGenerator {
    pub fn new(universe: u64, workload: Workload, seed: u64) -> Self {
        Self {
            universe: universe.max(1),
            workload,
            rng: StdRng::seed_from_u64(seed),
            step: 0,
            cursor: 0,
            scan_left: 0,
        }
    }

    fn hot_key(&mut self, hot_fraction: f64) -> u64 {
        let hot_size = ((self.universe as f64) * hot_fraction.clamp(0.0, 1.0)).round() as u64;
        self.rng.gen_range(0..hot_size.clamp(1, self.universe))
    }

    pub fn next_key(&mut self) -> u64 {
        self.step += 1;
        match self.workload {
            Workload::Uniform => self.rng.gen_range(0..self.universe),
            Workload::Hotset {
                hot_fraction,
                hot_prob,
            } => {
                if self.rng.gen_bool(hot_prob.clamp(0.0, 1.0)) {
                    self.hot_key(hot_fraction)
                } else {
                    self.rng.gen_range(0..self.universe)
                }
            },
            Workload::Scan => {
                let key = self.cursor;
                self.cursor = (self.cursor + 1) % self.universe;
                key
            },
            Workload::HotsetWithScans {
                hot_fraction,
                scan_every,
                scan_length,
            } => {
                if self.scan_left == 0 && self.step % scan_every.max(1) == 0 {
                    self.scan_left = scan_length;
                }
                if self.scan_left > 0 {
                    self.scan_left -= 1;
                    self.cursor += 1;
                    return self.universe + self.cursor;
                }
                self.hot_key(hot_fraction)
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HitRate {
    pub hits: u64,
    pub misses: u64,
}

impl HitRate {
    pub fn hit_rate(self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Replays `operations` keys as lookup-then-fill-on-miss.
pub fn run_hit_rate<C>(
    cache: &mut C,
    generator: &mut WorkloadGenerator,
    operations: usize,
) -> HitRate
where
    C: KeyedCache<u64, u64>,
{
    let mut rate = HitRate::default();
    for _ in 0..operations {
        let key = generator.next_key();
        if cache.get(&key).is_some() {
            rate.hits += 1;
        } else {
            rate.misses += 1;
            cache.put(key, key);
        }
    }
    rate
}
