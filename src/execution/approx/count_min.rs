/// Count-Min sketch for approximate frequency estimation
/// Estimates never undercount: every row's counter includes the key's true weight
use crate::error::{EngineError, EngineResult};
use crate::execution::sampling::query_rng;
use ahash::RandomState;
use rand::Rng;
use std::hash::{BuildHasher, Hash, Hasher};

#[derive(Clone)]
pub struct CountMinSketch {
    /// depth rows of width counters, row-major
    counters: Vec<u64>,
    width: usize,
    depth: usize,
    /// Per-row hasher seeds, all distinct
    salts: Vec<[u64; 4]>,
    hashers: Vec<RandomState>,
    total_weight: u64,
}

impl CountMinSketch {
    pub fn new(width: usize, depth: usize, seed: Option<u64>) -> EngineResult<Self> {
        if width == 0 || depth == 0 {
            return Err(EngineError::config_for(
                format!("count-min dimensions must be positive, got {}x{}", depth, width),
                "sketch",
            ));
        }

        let mut rng = query_rng(seed);
        let mut salts: Vec<[u64; 4]> = Vec::with_capacity(depth);
        while salts.len() < depth {
            let salt: [u64; 4] = rng.gen();
            if !salts.contains(&salt) {
                salts.push(salt);
            }
        }
        let hashers = salts
            .iter()
            .map(|s| RandomState::with_seeds(s[0], s[1], s[2], s[3]))
            .collect();

        Ok(Self {
            counters: vec![0; width * depth],
            width,
            depth,
            salts,
            hashers,
            total_weight: 0,
        })
    }

    #[inline]
    fn cell<K: Hash + ?Sized>(&self, row: usize, key: &K) -> usize {
        let mut hasher = self.hashers[row].build_hasher();
        key.hash(&mut hasher);
        let h = hasher.finish();
        row * self.width + (h % self.width as u64) as usize
    }

    pub fn add<K: Hash + ?Sized>(&mut self, key: &K, count: u64) {
        for row in 0..self.depth {
            let idx = self.cell(row, key);
            self.counters[idx] = self.counters[idx].saturating_add(count);
        }
        self.total_weight = self.total_weight.saturating_add(count);
    }

    /// Minimum over the key's counters; never below the true count
    pub fn query<K: Hash + ?Sized>(&self, key: &K) -> u64 {
        (0..self.depth)
            .map(|row| self.counters[self.cell(row, key)])
            .min()
            .unwrap_or(0)
    }

    /// Cell-wise sum. Both sketches must share dimensions and salts.
    pub fn merge(&mut self, other: &CountMinSketch) -> EngineResult<()> {
        if self.width != other.width || self.depth != other.depth || self.salts != other.salts {
            return Err(EngineError::config_for(
                "cannot merge count-min sketches with different dimensions or hash salts",
                "sketch",
            ));
        }
        for (dst, src) in self.counters.iter_mut().zip(&other.counters) {
            *dst = dst.saturating_add(*src);
        }
        self.total_weight = self.total_weight.saturating_add(other.total_weight);
        Ok(())
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Additive overestimate bound: total weight / width
    pub fn error_bound(&self) -> f64 {
        self.total_weight as f64 / self.width as f64
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}
