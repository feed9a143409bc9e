/// HyperLogLog sketch for approximate distinct count
use crate::error::{EngineError, EngineResult};
use ahash::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};

const MIN_REGISTERS: usize = 16;
const MAX_REGISTERS: usize = 1 << 16;

// Fixed hasher seeds so that sketches built independently agree on every key
const DEFAULT_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

#[derive(Clone)]
pub struct HyperLogLog {
    registers: Vec<u8>,
    /// log2 of the register count
    precision: u32,
    seeds: [u64; 4],
    hasher: RandomState,
}

impl HyperLogLog {
    /// `registers` must be a power of two in [16, 65536]
    pub fn new(registers: usize) -> EngineResult<Self> {
        Self::with_seeds(registers, DEFAULT_SEEDS)
    }

    pub fn with_seeds(registers: usize, seeds: [u64; 4]) -> EngineResult<Self> {
        if !registers.is_power_of_two() || !(MIN_REGISTERS..=MAX_REGISTERS).contains(&registers) {
            return Err(EngineError::config_for(
                format!(
                    "HyperLogLog register count must be a power of two in [{}, {}], got {}",
                    MIN_REGISTERS, MAX_REGISTERS, registers
                ),
                "sketch.hll_registers",
            ));
        }
        Ok(Self {
            registers: vec![0; registers],
            precision: registers.trailing_zeros(),
            seeds,
            hasher: RandomState::with_seeds(seeds[0], seeds[1], seeds[2], seeds[3]),
        })
    }

    pub fn add<K: Hash + ?Sized>(&mut self, key: &K) {
        let mut hasher = self.hasher.build_hasher();
        key.hash(&mut hasher);
        self.add_hash(hasher.finish());
    }

    /// Low `precision` bits pick the register; rho is the 1-indexed position of
    /// the lowest set bit in the rest (1 when the rest is all zeros)
    pub fn add_hash(&mut self, hash: u64) {
        let idx = (hash & (self.registers.len() as u64 - 1)) as usize;
        let rest = hash >> self.precision;
        let rho = if rest == 0 { 1 } else { rest.trailing_zeros() as u8 + 1 };
        self.registers[idx] = self.registers[idx].max(rho);
    }

    /// Harmonic-mean estimate alpha(m) * m^2 / sum(2^-register)
    pub fn estimate(&self) -> f64 {
        let m = self.registers.len() as f64;
        let sum: f64 = self.registers.iter().map(|&r| 2.0_f64.powi(-(r as i32))).sum();
        let alpha = 0.7213 / (1.0 + 1.079 / m);
        alpha * m * m / sum
    }

    /// Register-wise max. Both sketches must share register count and seeds.
    pub fn merge(&mut self, other: &HyperLogLog) -> EngineResult<()> {
        if self.registers.len() != other.registers.len() || self.seeds != other.seeds {
            return Err(EngineError::config_for(
                "cannot merge HyperLogLog sketches with different register counts or seeds",
                "sketch.hll_registers",
            ));
        }
        for (dst, src) in self.registers.iter_mut().zip(&other.registers) {
            *dst = (*dst).max(*src);
        }
        Ok(())
    }

    /// Relative standard error of the estimate, 1.04 / sqrt(m)
    pub fn standard_error(&self) -> f64 {
        1.04 / (self.registers.len() as f64).sqrt()
    }

    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    pub fn registers(&self) -> &[u8] {
        &self.registers
    }
}
