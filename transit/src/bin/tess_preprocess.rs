//! Remove NaNs and outliers from a light curve and normalise it

use anyhow::{Context, Result};
use clap::Parser;
use lightcurve::{load_lightcurve, save_lightcurve};
use log::info;
use std::path::PathBuf;
use transit::config::{CleanConfig, ProjectDirs};
use transit::clean_lightcurve;

#[derive(Parser, Debug)]
#[command(author, version, about = "Clean and normalise a light curve")]
struct Args {
    /// Input light curve (FITS or CSV)
    #[arg(long)]
    input: PathBuf,

    /// Output prefix [default: <root>/data/lightcurve_clean]
    #[arg(long)]
    out: Option<PathBuf>,

    /// Outlier clipping threshold in standard deviations
    #[arg(long, default_value_t = 5.0)]
    sigma: f64,

    /// Keep the original flux scale
    #[arg(long, default_value_t = false)]
    no_normalize: bool,
}

fn main() -> Result<()> {
    transit::logging::init();
    let args = Args::parse();

    let out = args
        .out
        .unwrap_or_else(|| ProjectDirs::discover().data_dir().join("lightcurve_clean"));
    let config = CleanConfig {
        sigma: args.sigma,
        normalize: !args.no_normalize,
        ..Default::default()
    };

    let raw = load_lightcurve(&args.input)?;
    let (lc, report) = clean_lightcurve(&raw, &config)
        .with_context(|| format!("failed to clean {}", args.input.display()))?;
    info!(
        "Kept {} of {} points ({} after NaN removal)",
        report.after_outliers, report.initial, report.after_nans
    );

    save_lightcurve(&lc, &out)?;
    Ok(())
}
