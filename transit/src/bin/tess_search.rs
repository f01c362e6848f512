//! Box Least Squares period search

use anyhow::{Context, Result};
use clap::Parser;
use lightcurve::load_lightcurve;
use std::path::PathBuf;
use transit::bls::Objective;
use transit::config::{ProjectDirs, SearchConfig};
use transit::search::{save_bls_results, write_summary};
use transit::{run_bls, BlsSummary};

#[derive(Parser, Debug)]
#[command(author, version, about = "Search a detrended light curve for periodic transits")]
struct Args {
    /// Input detrended light curve (FITS or CSV)
    #[arg(long)]
    input: PathBuf,

    /// Shortest trial period in days
    #[arg(long, default_value_t = 0.5)]
    min_period: f64,

    /// Longest trial period in days
    #[arg(long, default_value_t = 10.0)]
    max_period: f64,

    /// Number of trial periods
    #[arg(long, default_value_t = 20000)]
    n_periods: usize,

    /// Quantity maximised for each period
    #[arg(long, value_enum, default_value_t = Objective::LogLikelihood)]
    objective: Objective,

    /// Results table [default: <root>/data/bls_results.csv]
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    transit::logging::init();
    let args = Args::parse();

    let out = args
        .out
        .unwrap_or_else(|| ProjectDirs::discover().data_dir().join("bls_results.csv"));
    let config = SearchConfig {
        min_period: args.min_period,
        max_period: args.max_period,
        n_periods: args.n_periods,
        objective: args.objective,
        ..Default::default()
    };

    let lc = load_lightcurve(&args.input)?;
    let periodogram = run_bls(&lc, &config)
        .with_context(|| format!("BLS search failed on {}", args.input.display()))?;
    save_bls_results(&periodogram, &out)?;

    let summary = BlsSummary::from_periodogram(&periodogram)?;
    write_summary(&summary, &out)?;
    Ok(())
}
