//! End-to-end queries over temporary CSV and Parquet files
//!
//! Run with: `cargo test --test file_source_test`

use aqp_sql_engine::ingestion::{CsvSource, RowSource};
use aqp_sql_engine::execution::reservoir_from_source;
use aqp_sql_engine::config::IngestionConfig;
use aqp_sql_engine::{EngineError, ExecutionMode, QueryEngine, Value};
use std::io::Write;
use std::path::Path;

fn write_sales_csv(dir: &Path, rows: usize) -> String {
    let path = dir.join("sales.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "user_id,city,amount,clicked").unwrap();
    let cities = ["Delhi", "Mumbai", "Bengaluru"];
    for i in 0..rows {
        let amount = if i % 10 == 9 { String::new() } else { format!("{:.2}", (i % 50) as f64 + 0.25) };
        writeln!(file, "{},{},{},{}", i + 1, cities[i % 3], amount, i % 2).unwrap();
    }
    path.display().to_string()
}

#[test]
fn test_stream_matches_exact_at_full_rate_for_any_batch_size() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_sales_csv(dir.path(), 2_500);
    let engine = QueryEngine::new();
    let sql = format!("SELECT city, AVG(amount) FROM {} WHERE clicked = 1 GROUP BY city", path);

    let exact = engine
        .run(&engine.request(sql.as_str()).with_mode(ExecutionMode::Exact))
        .unwrap();
    assert_eq!(exact.result.len(), 3);

    for batch_size in [1, 64, 1_000, 100_000] {
        let stream = engine
            .run(
                &engine
                    .request(sql.as_str())
                    .with_mode(ExecutionMode::Stream)
                    .with_sampling_rate(1.0)
                    .with_stream_batch_size(batch_size),
            )
            .unwrap();
        assert_eq!(stream.result, exact.result, "batch size {}", batch_size);
    }
}

#[test]
fn test_count_star_reads_csv_without_named_columns() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_sales_csv(dir.path(), 1_234);
    let engine = QueryEngine::new();
    let response = engine
        .run(
            &engine
                .request(format!("SELECT COUNT(*) FROM {};", path))
                .with_mode(ExecutionMode::Exact),
        )
        .unwrap();
    assert_eq!(response.result[0].get("COUNT(*)"), Some(&Value::Float64(1_234.0)));
}

#[test]
fn test_count_column_skips_empty_fields() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_sales_csv(dir.path(), 100);
    let engine = QueryEngine::new();
    let response = engine
        .run(
            &engine
                .request(format!("SELECT COUNT(amount) FROM {}", path))
                .with_mode(ExecutionMode::Exact),
        )
        .unwrap();
    assert_eq!(response.result[0].get("COUNT(amount)"), Some(&Value::Float64(90.0)));
}

#[test]
fn test_missing_csv_column_is_schema_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_sales_csv(dir.path(), 10);
    let engine = QueryEngine::new();
    let err = engine
        .run(
            &engine
                .request(format!("SELECT SUM(revenue) FROM {}", path))
                .with_mode(ExecutionMode::Stream),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::Schema { .. }));
}

#[test]
fn test_missing_file_is_io_error() {
    let engine = QueryEngine::new();
    let err = engine
        .run(&engine.request("SELECT COUNT(*) FROM /no/such/file.csv").with_mode(ExecutionMode::Exact))
        .unwrap_err();
    assert!(matches!(err, EngineError::IO { .. }));
}

#[test]
fn test_reservoir_from_csv_source() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_sales_csv(dir.path(), 500);
    let source = CsvSource::new(&path, IngestionConfig::default());

    let sample = reservoir_from_source(&source, 25, Some(5), 64).unwrap();
    assert_eq!(sample.row_count, 25);
    assert_eq!(sample.num_columns(), 4);

    let again = reservoir_from_source(&source, 25, Some(5), 64).unwrap();
    assert_eq!(sample.columns, again.columns);

    let everything = reservoir_from_source(&source, 1_000, Some(5), 64).unwrap();
    assert_eq!(everything.row_count, source.load_table(None).unwrap().row_count);
}
