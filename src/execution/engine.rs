/// Execution strategies
///
/// `QueryEngine` parses a request, opens the row source through its catalog and
/// runs one of three modes:
/// - exact: full load, filter, aggregate with scale 1
/// - sample: full load, filter, uniform sample, aggregate with scale 1/rate
/// - stream: batch by batch filter, Bernoulli sample and partial aggregate, then
///   finalize with scale 1/rate; at most one batch is held in memory
///
/// Every run owns its random source and partial state; nothing is shared
/// between runs.
use crate::config::{scale_factor, validate_sampling_rate, EngineConfig};
use crate::error::{EngineError, EngineResult};
use crate::execution::aggregate::{
    aggregate, apply_filter, filter_rows, finalize, merge_rows, PartialAggregate,
};
use crate::execution::result::{ExactComparison, QueryResponse, ResultRow};
use crate::execution::sampling::{bernoulli_select, query_rng, uniform_sample};
use crate::ingestion::{FileCatalog, SourceCatalog};
use crate::query::{parse_query, StructuredQuery};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Exact,
    Sample,
    Stream,
}

impl ExecutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::Exact => "exact",
            ExecutionMode::Sample => "sample",
            ExecutionMode::Stream => "stream",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(ExecutionMode::Exact),
            "sample" => Ok(ExecutionMode::Sample),
            "stream" => Ok(ExecutionMode::Stream),
            other => Err(EngineError::config_for(
                format!("Unknown method '{}', expected exact, sample or stream", other),
                "mode",
            )),
        }
    }
}

/// One query submission
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query_text: String,
    pub mode: ExecutionMode,
    pub sampling_rate: f64,
    pub seed: Option<u64>,
    pub stream_batch_size: usize,
    pub include_exact_comparison: bool,
}

impl QueryRequest {
    pub fn new(query_text: impl Into<String>) -> Self {
        Self::from_config(query_text, &EngineConfig::default())
    }

    /// Request carrying the configured defaults
    pub fn from_config(query_text: impl Into<String>, config: &EngineConfig) -> Self {
        Self {
            query_text: query_text.into(),
            mode: config.default_mode,
            sampling_rate: config.sampling_rate,
            seed: config.seed,
            stream_batch_size: config.stream_batch_size,
            include_exact_comparison: config.include_exact_comparison,
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_sampling_rate(mut self, rate: f64) -> Self {
        self.sampling_rate = rate;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_stream_batch_size(mut self, rows: usize) -> Self {
        self.stream_batch_size = rows;
        self
    }

    pub fn with_exact_comparison(mut self, include: bool) -> Self {
        self.include_exact_comparison = include;
        self
    }
}

pub struct QueryEngine {
    catalog: Box<dyn SourceCatalog>,
    config: EngineConfig,
}

impl QueryEngine {
    /// Engine over files with default settings
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            catalog: Box::new(FileCatalog::new(config.ingestion.clone())),
            config,
        }
    }

    pub fn with_catalog(catalog: impl SourceCatalog + 'static, config: EngineConfig) -> Self {
        Self {
            catalog: Box::new(catalog),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Request pre-filled with this engine's defaults
    pub fn request(&self, query_text: impl Into<String>) -> QueryRequest {
        QueryRequest::from_config(query_text, &self.config)
    }

    pub fn run(&self, request: &QueryRequest) -> EngineResult<QueryResponse> {
        let never = AtomicBool::new(false);
        self.run_with_cancel(request, &never)
    }

    /// Run a request, checking `cancel` before every pass over the source and
    /// before every stream batch
    pub fn run_with_cancel(&self, request: &QueryRequest, cancel: &AtomicBool) -> EngineResult<QueryResponse> {
        let query = parse_query(&request.query_text)?;
        if request.mode != ExecutionMode::Exact {
            validate_sampling_rate(request.sampling_rate)?;
        }
        if request.mode == ExecutionMode::Stream && request.stream_batch_size == 0 {
            return Err(EngineError::config_for(
                "stream batch size must be positive",
                "stream_batch_size",
            ));
        }

        tracing::info!(
            "Running {} query on '{}' (rate={}, seed={:?})",
            request.mode,
            query.source,
            request.sampling_rate,
            request.seed
        );

        let start = Instant::now();
        let result = match request.mode {
            ExecutionMode::Exact => self.run_exact(&query, cancel)?,
            ExecutionMode::Sample => self.run_sample(&query, request.sampling_rate, request.seed, cancel)?,
            ExecutionMode::Stream => self.run_stream(
                &query,
                request.sampling_rate,
                request.seed,
                request.stream_batch_size,
                cancel,
            )?,
        };
        let elapsed_seconds = start.elapsed().as_secs_f64();

        tracing::info!(
            "{} query produced {} rows in {:.3}s",
            request.mode,
            result.len(),
            elapsed_seconds
        );

        let exact = if request.include_exact_comparison {
            let start = Instant::now();
            let result = self.run_exact(&query, cancel)?;
            Some(ExactComparison {
                elapsed_seconds: start.elapsed().as_secs_f64(),
                result,
            })
        } else {
            None
        };

        Ok(QueryResponse {
            mode: request.mode,
            elapsed_seconds,
            result,
            exact,
        })
    }

    /// Full scan with no scaling
    pub fn run_exact(&self, query: &StructuredQuery, cancel: &AtomicBool) -> EngineResult<Vec<ResultRow>> {
        check_cancel(cancel)?;
        let source = self.catalog.open(&query.source)?;
        let columns = required_columns(query);
        let table = source.load_table(columns.as_deref())?;
        tracing::debug!("Loaded {} rows from '{}'", table.row_count, source.name());
        aggregate(&table, query, 1.0)
    }

    /// Full load, then exactly round(rate * n) of the filtered rows
    pub fn run_sample(
        &self,
        query: &StructuredQuery,
        rate: f64,
        seed: Option<u64>,
        cancel: &AtomicBool,
    ) -> EngineResult<Vec<ResultRow>> {
        validate_sampling_rate(rate)?;
        check_cancel(cancel)?;
        let mut rng = query_rng(seed);
        let source = self.catalog.open(&query.source)?;
        let columns = required_columns(query);
        let table = source.load_table(columns.as_deref())?;

        let filtered = apply_filter(&table, query)?;
        let sample = uniform_sample(&filtered, rate, &mut rng);
        tracing::debug!(
            "Sampled {} of {} filtered rows ({} loaded)",
            sample.row_count,
            filtered.row_count,
            table.row_count
        );

        let mut state = PartialAggregate::new(query);
        let rows: Vec<usize> = (0..sample.row_count).collect();
        merge_rows(&mut state, &sample, query, &rows)?;
        finalize(&state, query, scale_factor(rate))
    }

    /// Bounded-memory pass. One random source serves the whole run, so results are
    /// reproducible for a fixed seed and batch size but depend on the batch size.
    pub fn run_stream(
        &self,
        query: &StructuredQuery,
        rate: f64,
        seed: Option<u64>,
        batch_size: usize,
        cancel: &AtomicBool,
    ) -> EngineResult<Vec<ResultRow>> {
        validate_sampling_rate(rate)?;
        let mut rng = query_rng(seed);
        let source = self.catalog.open(&query.source)?;
        let columns = required_columns(query);
        let mut batches = source.batches(columns.as_deref(), batch_size)?;

        let mut state = PartialAggregate::new(query);
        let mut batch_no = 0usize;
        let mut rows_seen = 0usize;
        loop {
            check_cancel(cancel)?;
            let Some(batch) = batches.next()? else {
                break;
            };
            let matching = filter_rows(&batch, query)?;
            let kept = bernoulli_select(&matching, rate, &mut rng);
            merge_rows(&mut state, &batch, query, &kept)?;

            batch_no += 1;
            rows_seen += batch.row_count;
            tracing::debug!(
                "Batch {}: {} rows, {} matched, {} kept, {} groups",
                batch_no,
                batch.row_count,
                matching.len(),
                kept.len(),
                state.group_count()
            );
        }

        tracing::debug!("Streamed {} rows in {} batches", rows_seen, batch_no);
        finalize(&state, query, scale_factor(rate))
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn check_cancel(cancel: &AtomicBool) -> EngineResult<()> {
    if cancel.load(Ordering::Relaxed) {
        return Err(EngineError::cancellation("query cancelled by caller"));
    }
    Ok(())
}

/// Columns to read; `None` reads everything when the query names no column
fn required_columns(query: &StructuredQuery) -> Option<Vec<String>> {
    let columns = query.required_columns();
    if columns.is_empty() {
        None
    } else {
        Some(columns)
    }
}
