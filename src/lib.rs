//! # AQP SQL Engine
//!
//! Approximate query processing over large flat files: answers `COUNT`, `SUM`
//! and `AVG` queries (optionally grouped, with a single `WHERE` predicate) by
//! reading a sample of rows instead of the whole dataset.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aqp_sql_engine::{ExecutionMode, QueryEngine};
//!
//! let engine = QueryEngine::new();
//! let request = engine
//!     .request("SELECT city, AVG(amount) FROM data/sales.csv GROUP BY city")
//!     .with_mode(ExecutionMode::Stream)
//!     .with_sampling_rate(0.05)
//!     .with_exact_comparison(true);
//!
//! let response = engine.run(&request).unwrap();
//! println!("{}", serde_json::to_string_pretty(&response).unwrap());
//! ```
//!
//! ## Features
//!
//! - **Three execution modes**: exact full scan, in-memory uniform sample,
//!   bounded-memory streaming sample
//! - **Scale correction**: COUNT and SUM scaled by 1/rate, AVG computed from
//!   unscaled sum and count
//! - **Row sources**: CSV and Parquet files with column pruning, in-memory tables
//! - **Sketches**: count-min frequency sketch and HyperLogLog distinct counter

pub mod benchmark;
pub mod config;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod query;
pub mod storage;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use execution::{ExecutionMode, QueryEngine, QueryRequest, QueryResponse, ResultRow};
pub use ingestion::{FileCatalog, MemoryCatalog, RowSource, SourceCatalog};
pub use query::{parse_query, StructuredQuery};
pub use storage::{ColumnarBatch, GroupKey, Value};
