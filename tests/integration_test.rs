//! Integration tests for the public query API over in-memory tables
//!
//! Run with: `cargo test --test integration_test`

use aqp_sql_engine::{
    ColumnarBatch, EngineConfig, EngineError, ExecutionMode, MemoryCatalog, QueryEngine, Value,
};
use std::sync::atomic::AtomicBool;

fn sales_table() -> ColumnarBatch {
    ColumnarBatch::from_rows(
        &["city", "amount"],
        vec![
            vec![Value::from("Delhi"), Value::Int64(10)],
            vec![Value::from("Delhi"), Value::Int64(20)],
            vec![Value::from("Mumbai"), Value::Int64(5)],
        ],
    )
    .unwrap()
}

/// 20k rows over four cities with a deterministic amount pattern
fn large_table() -> ColumnarBatch {
    let cities = ["Delhi", "Mumbai", "Pune", "Chennai"];
    let rows = (0..20_000i64)
        .map(|i| {
            vec![
                Value::from(cities[(i % 4) as usize]),
                Value::Float64((i % 97) as f64 * 1.5),
                Value::Int64(i % 5),
            ]
        })
        .collect();
    ColumnarBatch::from_rows(&["city", "amount", "clicked"], rows).unwrap()
}

fn engine() -> QueryEngine {
    let catalog = MemoryCatalog::new()
        .with_table("t", sales_table())
        .with_table("big", large_table());
    QueryEngine::with_catalog(catalog, EngineConfig::default())
}

#[test]
fn test_scalar_count_exact_and_full_sample() {
    let engine = engine();
    let exact = engine
        .run(&engine.request("SELECT COUNT(*) FROM t").with_mode(ExecutionMode::Exact))
        .unwrap();
    assert_eq!(exact.result.len(), 1);
    assert_eq!(exact.result[0].get("COUNT(*)"), Some(&Value::Float64(3.0)));

    let sample = engine
        .run(
            &engine
                .request("SELECT COUNT(*) FROM t")
                .with_mode(ExecutionMode::Sample)
                .with_sampling_rate(1.0),
        )
        .unwrap();
    assert_eq!(sample.result, exact.result);
}

#[test]
fn test_grouped_sum_by_city() {
    let engine = engine();
    let response = engine
        .run(
            &engine
                .request("SELECT city, SUM(amount) FROM t GROUP BY city")
                .with_mode(ExecutionMode::Exact),
        )
        .unwrap();

    assert_eq!(response.result.len(), 2);
    let delhi = response
        .result
        .iter()
        .find(|r| r.get("city") == Some(&Value::from("Delhi")))
        .unwrap();
    assert_eq!(delhi.get("SUM(amount)"), Some(&Value::Float64(30.0)));
    let mumbai = response
        .result
        .iter()
        .find(|r| r.get("city") == Some(&Value::from("Mumbai")))
        .unwrap();
    assert_eq!(mumbai.get("SUM(amount)"), Some(&Value::Float64(5.0)));
}

#[test]
fn test_malformed_queries_fail_with_semantic_error() {
    let engine = engine();
    let err = engine.run(&engine.request("SELECT city FROM t")).unwrap_err();
    assert!(matches!(err, EngineError::Semantic { .. }));

    let err = engine
        .run(&engine.request("SELECT region, SUM(x) FROM t GROUP BY city"))
        .unwrap_err();
    assert!(matches!(err, EngineError::Semantic { .. }));
}

#[test]
fn test_full_rate_matches_exact_for_every_mode() {
    let engine = engine();
    let queries = [
        "SELECT COUNT(*) FROM big",
        "SELECT city, SUM(amount) FROM big GROUP BY city",
        "SELECT city, AVG(amount) FROM big WHERE clicked >= 2 GROUP BY city",
        "SELECT city, COUNT(amount) FROM big WHERE city != 'Pune' GROUP BY city",
    ];
    for sql in queries {
        let exact = engine
            .run(&engine.request(sql).with_mode(ExecutionMode::Exact))
            .unwrap();
        for mode in [ExecutionMode::Sample, ExecutionMode::Stream] {
            let approx = engine
                .run(
                    &engine
                        .request(sql)
                        .with_mode(mode)
                        .with_sampling_rate(1.0)
                        .with_stream_batch_size(777),
                )
                .unwrap();
            assert_eq!(approx.result, exact.result, "{} in {} mode", sql, mode);
        }
    }
}

#[test]
fn test_seeded_runs_are_deterministic() {
    let engine = engine();
    for mode in [ExecutionMode::Sample, ExecutionMode::Stream] {
        let request = engine
            .request("SELECT city, SUM(amount) FROM big GROUP BY city")
            .with_mode(mode)
            .with_sampling_rate(0.1)
            .with_seed(Some(7))
            .with_stream_batch_size(1000);
        let first = engine.run(&request).unwrap();
        let second = engine.run(&request).unwrap();
        assert_eq!(first.result, second.result);
    }
}

#[test]
fn test_sampled_count_is_scaled() {
    let engine = engine();
    let response = engine
        .run(
            &engine
                .request("SELECT COUNT(*) FROM big")
                .with_mode(ExecutionMode::Sample)
                .with_sampling_rate(0.25),
        )
        .unwrap();
    // exactly round(0.25 * 20000) rows are sampled, then scaled by 4
    assert_eq!(response.result[0].get("COUNT(*)"), Some(&Value::Float64(20_000.0)));
}

#[test]
fn test_stream_estimate_is_close() {
    let engine = engine();
    let response = engine
        .run(
            &engine
                .request("SELECT COUNT(*) FROM big")
                .with_mode(ExecutionMode::Stream)
                .with_sampling_rate(0.5)
                .with_seed(Some(3))
                .with_stream_batch_size(4096),
        )
        .unwrap();
    let estimate = response.result[0].aggregate_value().and_then(Value::as_f64).unwrap();
    // sd of the scaled estimate is sqrt(n * p * (1 - p)) / p ~= 141
    assert!((estimate - 20_000.0).abs() < 1_000.0, "estimate {}", estimate);
}

#[test]
fn test_avg_unaffected_by_scale() {
    let engine = engine();
    let exact = engine
        .run(&engine.request("SELECT AVG(amount) FROM big").with_mode(ExecutionMode::Exact))
        .unwrap();
    let sampled = engine
        .run(
            &engine
                .request("SELECT AVG(amount) FROM big")
                .with_mode(ExecutionMode::Sample)
                .with_sampling_rate(0.5),
        )
        .unwrap();
    let exact_avg = exact.result[0].aggregate_value().and_then(Value::as_f64).unwrap();
    let sampled_avg = sampled.result[0].aggregate_value().and_then(Value::as_f64).unwrap();
    // a scaled AVG would be roughly twice the true mean
    assert!((sampled_avg - exact_avg).abs() / exact_avg < 0.1);
}

#[test]
fn test_unknown_mode_is_config_error() {
    let err = "turbo".parse::<ExecutionMode>().unwrap_err();
    assert!(matches!(err, EngineError::Config { .. }));
}

#[test]
fn test_missing_column_is_schema_error() {
    let engine = engine();
    for mode in [ExecutionMode::Exact, ExecutionMode::Sample, ExecutionMode::Stream] {
        let err = engine
            .run(
                &engine
                    .request("SELECT region, COUNT(*) FROM t GROUP BY region")
                    .with_mode(mode),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Schema { .. }), "{:?}", err);
    }
}

#[test]
fn test_unknown_table_is_io_error() {
    let engine = engine();
    let err = engine.run(&engine.request("SELECT COUNT(*) FROM nowhere")).unwrap_err();
    assert!(matches!(err, EngineError::IO { .. }));
}

#[test]
fn test_cancellation_stops_stream() {
    let engine = engine();
    let cancel = AtomicBool::new(true);
    let request = engine
        .request("SELECT COUNT(*) FROM big")
        .with_mode(ExecutionMode::Stream)
        .with_stream_batch_size(100);
    let err = engine.run_with_cancel(&request, &cancel).unwrap_err();
    assert!(matches!(err, EngineError::Cancellation { .. }));
}

#[test]
fn test_response_json_shape() {
    let engine = engine();
    let response = engine
        .run(
            &engine
                .request("SELECT city, SUM(amount) FROM t GROUP BY city")
                .with_mode(ExecutionMode::Stream)
                .with_sampling_rate(1.0)
                .with_exact_comparison(true),
        )
        .unwrap();
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["mode"], "stream");
    assert!(json["elapsed_seconds"].is_number());
    assert_eq!(json["result"][0]["city"], "Delhi");
    assert_eq!(json["result"][0]["SUM(amount)"], 30.0);
    assert_eq!(json["exact"]["result"], json["result"]);
}
