//! Synthetic sales dataset generator
//!
//! Writes `user_id,city,amount,clicked` rows: weighted city choice, gamma(2, 150)
//! amounts rounded to cents and a 22% click rate. Output is reproducible per seed.
//!
//! ```bash
//! make_large_csv --rows 10000000 --output large.csv
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Gamma};
use std::fs::File;
use std::io::BufWriter;
use std::time::Instant;

const CITIES: &[(&str, f64)] = &[
    ("Delhi", 0.16),
    ("Mumbai", 0.18),
    ("Bengaluru", 0.20),
    ("Hyderabad", 0.14),
    ("Chennai", 0.12),
    ("Pune", 0.10),
    ("Kolkata", 0.10),
];

const CLICK_RATE: f64 = 0.22;
const PROGRESS_EVERY: u64 = 5_000_000;

#[derive(Parser)]
#[command(name = "make_large_csv")]
#[command(about = "Generate a synthetic sales CSV for benchmarking")]
struct Cli {
    /// Number of rows to write
    #[arg(short, long, default_value_t = 100_000_000)]
    rows: u64,

    /// Output file path
    #[arg(short, long, default_value = "large_50M.csv")]
    output: String,

    #[arg(short, long, default_value_t = 123)]
    seed: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let start = Instant::now();

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let city_dist = WeightedIndex::new(CITIES.iter().map(|(_, w)| *w)).context("invalid city weights")?;
    let amount_dist = Gamma::new(2.0, 150.0).context("invalid gamma parameters")?;

    let file = File::create(&cli.output).with_context(|| format!("creating {}", cli.output))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    writer.write_record(["user_id", "city", "amount", "clicked"])?;

    for i in 0..cli.rows {
        let user_id: u64 = rng.gen_range(1..10_000_000);
        let city = CITIES[city_dist.sample(&mut rng)].0;
        let amount: f64 = amount_dist.sample(&mut rng);
        let clicked = u8::from(rng.gen::<f64>() < CLICK_RATE);

        writer.write_record(&[
            user_id.to_string(),
            city.to_string(),
            format!("{:.2}", amount),
            clicked.to_string(),
        ])?;

        if (i + 1) % PROGRESS_EVERY == 0 {
            println!("Wrote {} rows...", i + 1);
        }
    }
    writer.flush()?;

    println!(
        "Wrote {} rows to {} in {:.1}s",
        cli.rows,
        cli.output,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
