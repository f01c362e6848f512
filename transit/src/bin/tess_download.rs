//! Search MAST for a target's light curves, download and stitch them

use anyhow::{Context, Result};
use clap::Parser;
use lightcurve::archive::default_cache_dir;
use lightcurve::{save_lightcurve, search_and_download, MastClient};
use log::info;
use std::path::PathBuf;
use transit::config::ProjectDirs;
use transit::pipeline::target_output_prefix;

#[derive(Parser, Debug)]
#[command(author, version, about = "Download and stitch TESS light curves for a target")]
struct Args {
    /// Target name or TIC id (e.g. "TIC 25155310")
    #[arg(long)]
    target: String,

    /// Output prefix; `_<target>.csv` (and `.fits`) are appended [default: <root>/data/lightcurve_raw]
    #[arg(long)]
    out: Option<PathBuf>,

    /// Download only the first N search results
    #[arg(long)]
    limit: Option<usize>,

    /// Mission collection
    #[arg(long, default_value = "TESS")]
    mission: String,

    /// Restrict to one pipeline author (e.g. SPOC)
    #[arg(long)]
    author: Option<String>,

    /// Directory for downloaded product files
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    transit::logging::init();
    let args = Args::parse();

    let out = args
        .out
        .unwrap_or_else(|| ProjectDirs::discover().data_dir().join("lightcurve_raw"));
    let cache = args.cache_dir.unwrap_or_else(default_cache_dir);

    info!("Searching for {} ({})", args.target, args.mission);
    let client = MastClient::new()?;
    let lc = search_and_download(
        &client,
        &args.target,
        &args.mission,
        args.author.as_deref(),
        args.limit,
        &cache,
    )
    .with_context(|| format!("failed to download light curves for {}", args.target))?;

    let written = save_lightcurve(&lc, target_output_prefix(&out, &args.target))?;
    for path in &written {
        info!("Wrote {}", path.display());
    }
    Ok(())
}
