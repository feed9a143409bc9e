/// Accuracy/latency comparison of streaming runs against the exact answer
use crate::error::EngineResult;
use crate::execution::engine::{ExecutionMode, QueryEngine};
use crate::execution::result::ResultRow;
use crate::storage::value::{GroupKey, Value};
use fxhash::FxHashMap;
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct BenchmarkRun {
    pub rate: f64,
    pub time_sec: f64,
    /// Mean relative error over matching groups; None when no group matched
    pub rel_error: Option<f64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BenchmarkReport {
    pub exact_time_sec: f64,
    pub exact_rows: Vec<ResultRow>,
    pub runs: Vec<BenchmarkRun>,
}

fn aggregate_f64(row: &ResultRow) -> Option<f64> {
    row.aggregate_value().and_then(Value::as_f64)
}

fn group_key(row: &ResultRow) -> GroupKey {
    GroupKey(row.group_values().iter().map(|(_, v)| v.clone()).collect())
}

/// Mean relative error of `approx` against `exact`, matching rows by group key.
/// A true value of zero uses a denominator of one; groups present on only one
/// side and pairs involving NaN are skipped.
pub fn relative_error(exact: &[ResultRow], approx: &[ResultRow]) -> Option<f64> {
    let truth: FxHashMap<GroupKey, f64> = exact
        .iter()
        .filter_map(|row| aggregate_f64(row).map(|v| (group_key(row), v)))
        .collect();

    let errors: Vec<f64> = approx
        .iter()
        .filter_map(|row| {
            let estimate = aggregate_f64(row)?;
            let actual = *truth.get(&group_key(row))?;
            if estimate.is_nan() || actual.is_nan() {
                return None;
            }
            let denom = if actual == 0.0 { 1.0 } else { actual.abs() };
            Some((estimate - actual).abs() / denom)
        })
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(errors.iter().sum::<f64>() / errors.len() as f64)
    }
}

/// Run the query once exactly, then in stream mode at every rate
pub fn run_benchmark(
    engine: &QueryEngine,
    query: &str,
    rates: &[f64],
    seed: Option<u64>,
    batch_size: usize,
) -> EngineResult<BenchmarkReport> {
    let exact_request = engine
        .request(query)
        .with_mode(ExecutionMode::Exact)
        .with_exact_comparison(false);
    let exact = engine.run(&exact_request)?;

    let mut runs = Vec::with_capacity(rates.len());
    for &rate in rates {
        let request = engine
            .request(query)
            .with_mode(ExecutionMode::Stream)
            .with_sampling_rate(rate)
            .with_seed(seed)
            .with_stream_batch_size(batch_size)
            .with_exact_comparison(false);
        let response = engine.run(&request)?;
        let rel_error = relative_error(&exact.result, &response.result);
        tracing::info!("rate={} time={:.3}s rel_error={:?}", rate, response.elapsed_seconds, rel_error);
        runs.push(BenchmarkRun {
            rate,
            time_sec: response.elapsed_seconds,
            rel_error,
        });
    }

    Ok(BenchmarkReport {
        exact_time_sec: exact.elapsed_seconds,
        exact_rows: exact.result,
        runs,
    })
}
