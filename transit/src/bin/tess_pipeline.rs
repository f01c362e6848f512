//! Download or load, clean, detrend, search and plot in one run

use anyhow::{bail, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use transit::config::{PipelineConfig, ProjectDirs};
use transit::{Pipeline, Source};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run the full transit search pipeline")]
struct Args {
    /// Target to download from MAST
    #[arg(long, conflicts_with = "input")]
    target: Option<String>,

    /// Local light curve (FITS or CSV) instead of a download
    #[arg(long)]
    input: Option<PathBuf>,

    /// Pipeline parameters as JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective configuration to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Project root holding data/ and plots/ [default: $TRANSIT_ROOT or the current directory]
    #[arg(long)]
    root: Option<PathBuf>,
}

fn main() -> Result<()> {
    transit::logging::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PipelineConfig::load_from_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(path) = &args.write_config {
        config.save_to_file(path)?;
        info!("Configuration written to {}", path.display());
        return Ok(());
    }

    let source = match (args.target, args.input) {
        (Some(target), None) => Source::Target(target),
        (None, Some(input)) => Source::File(input),
        _ => bail!("exactly one of --target or --input is required"),
    };

    let dirs = args
        .root
        .map(ProjectDirs::with_root)
        .unwrap_or_else(ProjectDirs::discover);
    let report = Pipeline::new(config, dirs).run(&source)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
