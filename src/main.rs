//! `aqp` - run one approximate (or exact) aggregate query and print the response as JSON
//!
//! ```bash
//! aqp --query "SELECT city, SUM(amount) FROM large.csv GROUP BY city" \
//!     --method stream --sample-rate 0.05 --show-exact
//! ```
//!
//! Logs go to stderr (`RUST_LOG`, default `warn`); stdout carries only the JSON.

use anyhow::{Context, Result};
use aqp_sql_engine::{EngineConfig, ExecutionMode, QueryEngine};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aqp")]
#[command(about = "Approximate query processing over CSV and Parquet files", long_about = None)]
struct Cli {
    /// SQL-like aggregate query
    #[arg(short, long)]
    query: String,

    /// Execution method: exact, sample or stream
    #[arg(short, long)]
    method: Option<ExecutionMode>,

    /// Per-row inclusion probability for sample/stream
    #[arg(long)]
    sample_rate: Option<f64>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Rows per batch in stream mode
    #[arg(long)]
    stream_batch_size: Option<usize>,

    /// Also compute the exact answer for comparison
    #[arg(long)]
    show_exact: bool,

    /// JSON engine configuration file
    #[arg(short, long, env = "AQP_CONFIG")]
    config: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path).with_context(|| format!("loading config {}", path))?,
        None => EngineConfig::default(),
    };
    let engine = QueryEngine::with_config(config);

    let mut request = engine.request(cli.query.as_str());
    if let Some(mode) = cli.method {
        request = request.with_mode(mode);
    }
    if let Some(rate) = cli.sample_rate {
        request = request.with_sampling_rate(rate);
    }
    if let Some(seed) = cli.seed {
        request = request.with_seed(Some(seed));
    }
    if let Some(rows) = cli.stream_batch_size {
        request = request.with_stream_batch_size(rows);
    }
    if cli.show_exact {
        request = request.with_exact_comparison(true);
    }

    let response = engine.run(&request).context("query failed")?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
