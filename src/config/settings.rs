/// Engine configuration
///
/// Defaults for every query-run knob, loadable from a JSON file and validated
/// before use. CLI flags and `QueryRequest` builders override individual fields.
use crate::error::{EngineError, EngineResult};
use crate::execution::engine::ExecutionMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Lower bound used when turning a sampling rate into a scale factor
pub const MIN_SAMPLING_RATE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Mode used when a request does not name one
    pub default_mode: ExecutionMode,

    /// Per-row inclusion probability for sample/stream modes, in (0, 1]
    pub sampling_rate: f64,

    /// Seed for the per-run random source (None = nondeterministic)
    pub seed: Option<u64>,

    /// Maximum rows per batch on the streaming path
    pub stream_batch_size: usize,

    /// Also run the exact path and attach its result
    pub include_exact_comparison: bool,

    /// Row source settings
    pub ingestion: IngestionConfig,

    /// Sketch dimensions
    pub sketch: SketchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Rows read up front to infer CSV column types
    pub schema_sample_rows: usize,

    /// CSV field delimiter
    pub delimiter: char,

    /// Whether the first CSV record is a header
    pub has_headers: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SketchConfig {
    /// Count-min counters per row
    pub count_min_width: usize,

    /// Count-min rows (independent hash functions)
    pub count_min_depth: usize,

    /// HyperLogLog register count (power of two)
    pub hll_registers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_mode: ExecutionMode::Sample,
            sampling_rate: 0.1,
            seed: Some(42),
            stream_batch_size: 1_000_000,
            include_exact_comparison: false,
            ingestion: IngestionConfig::default(),
            sketch: SketchConfig::default(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            schema_sample_rows: 1000,
            delimiter: ',',
            has_headers: true,
        }
    }
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            count_min_width: 2048,
            count_min_depth: 4,
            hll_registers: 1024,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::io_with_path(format!("cannot read config: {}", e), path.display().to_string())
        })?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        validate_sampling_rate(self.sampling_rate)?;
        if self.stream_batch_size == 0 {
            return Err(EngineError::config_for(
                "stream batch size must be positive",
                "stream_batch_size",
            ));
        }
        if !self.ingestion.delimiter.is_ascii() {
            return Err(EngineError::config_for(
                "CSV delimiter must be a single ASCII character",
                "ingestion.delimiter",
            ));
        }
        self.sketch.validate()
    }
}

impl SketchConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.count_min_width == 0 || self.count_min_depth == 0 {
            return Err(EngineError::config_for(
                "count-min width and depth must be positive",
                "sketch",
            ));
        }
        if !self.hll_registers.is_power_of_two() || !(16..=65536).contains(&self.hll_registers) {
            return Err(EngineError::config_for(
                format!(
                    "HyperLogLog register count must be a power of two in [16, 65536], got {}",
                    self.hll_registers
                ),
                "sketch.hll_registers",
            ));
        }
        Ok(())
    }
}

/// Sampling rates must lie in (0, 1]
pub fn validate_sampling_rate(rate: f64) -> EngineResult<()> {
    if rate > 0.0 && rate <= 1.0 {
        Ok(())
    } else {
        Err(EngineError::config_for(
            format!("sampling rate must be in (0, 1], got {}", rate),
            "sampling_rate",
        ))
    }
}

/// Multiplier that turns a sample-derived COUNT or SUM into a population estimate
pub fn scale_factor(rate: f64) -> f64 {
    1.0 / rate.max(MIN_SAMPLING_RATE)
}
