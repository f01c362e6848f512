//! Shared test support for the transit workspace.
//!
//! Figures and CSV dumps written by tests land under `<workspace>/test_output`
//! so they can be inspected after a run.

use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};

pub mod synthetic;

pub use synthetic::{generate_transit_series, in_transit, SyntheticSeries, SyntheticTransitConfig};

#[derive(thiserror::Error, Debug)]
pub enum TestHelperError {
    #[error("cannot read current directory: {0}")]
    CurrentDir(#[from] std::io::Error),
    #[error("no Cargo.toml with a [workspace] table above {0}")]
    NoWorkspace(PathBuf),
}

fn is_workspace_manifest(dir: &Path) -> bool {
    std::fs::read_to_string(dir.join("Cargo.toml"))
        .map(|content| content.contains("[workspace]"))
        .unwrap_or(false)
}

/// Nearest ancestor of the current directory holding the workspace manifest.
pub fn find_workspace_root() -> Result<PathBuf, TestHelperError> {
    let cwd = std::env::current_dir()?;
    cwd.ancestors()
        .find(|dir| is_workspace_manifest(dir))
        .map(Path::to_path_buf)
        .ok_or(TestHelperError::NoWorkspace(cwd))
}

static WORKSPACE_ROOT: Lazy<PathBuf> =
    Lazy::new(|| find_workspace_root().expect("tests must run inside the workspace"));

/// `<workspace>/test_output`, created on first use.
pub fn get_output_dir() -> PathBuf {
    let dir = WORKSPACE_ROOT.join("test_output");
    std::fs::create_dir_all(&dir).expect("Failed to create test output directory");
    dir
}

/// `path` under the test output directory, with its parent directories created.
pub fn output_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let full = get_output_dir().join(path);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create test output subdirectory");
    }
    full
}
