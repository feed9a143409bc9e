/// Probabilistic sketches
/// Count-Min answers approximate frequencies, HyperLogLog approximate distinct counts.
/// Both are append-only and mergeable with sketches of the same shape.
pub mod count_min;
pub mod hll;

pub use count_min::CountMinSketch;
pub use hll::HyperLogLog;

use crate::config::SketchConfig;

/// Build a count-min sketch with the configured dimensions
pub fn count_min_from_config(config: &SketchConfig, seed: Option<u64>) -> crate::error::EngineResult<CountMinSketch> {
    CountMinSketch::new(config.count_min_width, config.count_min_depth, seed)
}

/// Build a HyperLogLog sketch with the configured register count
pub fn hll_from_config(config: &SketchConfig) -> crate::error::EngineResult<HyperLogLog> {
    HyperLogLog::new(config.hll_registers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sketches_from_default_config() {
        let config = SketchConfig::default();
        let cms = count_min_from_config(&config, Some(1)).unwrap();
        assert_eq!((cms.width(), cms.depth()), (2048, 4));
        assert_eq!(hll_from_config(&config).unwrap().register_count(), 1024);
    }
}
