//! Render light curve, periodogram and phase-fold figures

use anyhow::Result;
use clap::Parser;
use lightcurve::load_lightcurve;
use std::path::PathBuf;
use transit::config::ProjectDirs;
use transit::plot::{figure_path, plot_bls, plot_lightcurve, plot_phase_fold};
use transit::search::read_bls_results;

#[derive(Parser, Debug)]
#[command(author, version, about = "Plot a light curve and its transit search")]
struct Args {
    /// Light curve (FITS or CSV)
    #[arg(long)]
    lc: PathBuf,

    /// BLS results table to plot as a periodogram
    #[arg(long)]
    bls: Option<PathBuf>,

    /// Period in days for the phase-folded figure
    #[arg(long)]
    period: Option<f64>,

    /// Time of phase zero [default: first timestamp]
    #[arg(long)]
    epoch: Option<f64>,

    /// Phase bin edges for the binned overlay
    #[arg(long, default_value_t = 200)]
    bins: usize,

    /// Output prefix; `_lightcurve.png` etc. are appended [default: <root>/plots/figure]
    #[arg(long)]
    out_prefix: Option<PathBuf>,
}

fn main() -> Result<()> {
    transit::logging::init();
    let args = Args::parse();

    let prefix = args
        .out_prefix
        .unwrap_or_else(|| ProjectDirs::discover().plots_dir().join("figure"));

    let lc = load_lightcurve(&args.lc)?;
    plot_lightcurve(&lc, &figure_path(&prefix, "lightcurve"), "Lightcurve")?;

    if let Some(bls) = &args.bls {
        let periodogram = read_bls_results(bls)?;
        plot_bls(&periodogram.period, &periodogram.power, &figure_path(&prefix, "bls"))?;
    }
    if let Some(period) = args.period {
        plot_phase_fold(
            &lc,
            period,
            args.epoch,
            &figure_path(&prefix, "phase"),
            args.bins,
        )?;
    }
    Ok(())
}
