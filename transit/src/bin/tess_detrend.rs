//! Flatten a light curve with a Savitzky-Golay trend

use anyhow::{Context, Result};
use clap::Parser;
use lightcurve::load_lightcurve;
use log::info;
use std::path::PathBuf;
use transit::config::{DetrendConfig, ProjectDirs};
use transit::detrend::save_outputs;
use transit::flatten;

#[derive(Parser, Debug)]
#[command(author, version, about = "Remove long-term trends from a light curve")]
struct Args {
    /// Input light curve (FITS or CSV)
    #[arg(long)]
    input: PathBuf,

    /// Output prefix; `.detrended.csv` is appended [default: <root>/data/lightcurve_detrended]
    #[arg(long)]
    out: Option<PathBuf>,

    /// Savitzky-Golay window length in samples (odd)
    #[arg(long, default_value_t = 401)]
    window: usize,

    /// Polynomial order
    #[arg(long, default_value_t = 2)]
    polyorder: usize,

    /// Also write the trend as `<out>.trend.*`
    #[arg(long, default_value_t = false)]
    save_trend: bool,
}

fn main() -> Result<()> {
    transit::logging::init();
    let args = Args::parse();

    let out = args
        .out
        .unwrap_or_else(|| ProjectDirs::discover().data_dir().join("lightcurve_detrended"));
    let config = DetrendConfig {
        window_length: args.window,
        polyorder: args.polyorder,
        save_trend: args.save_trend,
        ..Default::default()
    };

    let lc = load_lightcurve(&args.input)?.sort_by_time();
    let flattened = flatten(&lc, &config)
        .with_context(|| format!("failed to detrend {}", args.input.display()))?;
    for path in save_outputs(&flattened, &out, config.save_trend)? {
        info!("Wrote {}", path.display());
    }
    Ok(())
}
