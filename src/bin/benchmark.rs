//! Benchmark streaming approximation against the exact answer over a range of rates
//!
//! ```bash
//! benchmark --query "SELECT city, AVG(amount) FROM large.csv GROUP BY city" --rates 0.05 0.1 0.2
//! ```

use anyhow::{Context, Result};
use aqp_sql_engine::benchmark::run_benchmark;
use aqp_sql_engine::{EngineConfig, QueryEngine};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "benchmark")]
#[command(about = "Benchmark approximate vs exact query execution", long_about = None)]
struct Cli {
    /// SQL-like aggregate query
    #[arg(short, long)]
    query: String,

    /// Sampling rates to try
    #[arg(long, num_args = 1.., default_values_t = vec![0.05, 0.1, 0.2, 0.4, 0.8])]
    rates: Vec<f64>,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Rows per batch in stream mode
    #[arg(long)]
    stream_batch_size: Option<usize>,

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
    let batch_size = cli.stream_batch_size.unwrap_or(config.stream_batch_size);
    let engine = QueryEngine::with_config(config);

    let report = run_benchmark(&engine, &cli.query, &cli.rates, Some(cli.seed), batch_size)
        .context("benchmark failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
