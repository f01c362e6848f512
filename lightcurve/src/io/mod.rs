//! Light curve file I/O.
//!
//! Files are dispatched on their extension: `.fits`, `.fz` and `.lc` go to
//! the FITS reader (feature `fits`), `.csv` and `.txt` to the CSV reader.
//! Writers always emit CSV and, when FITS support is compiled in, a FITS
//! binary table next to it.

pub mod csv;
pub mod fits;

use crate::{LightCurve, LightCurveError, Result};
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub use self::csv::{read_csv, write_csv};
pub use self::fits::{read_fits, write_fits, DEFAULT_QUALITY_BITMASK};

/// Lower-cased extension of `path`, without the dot.
fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Load a light curve from a FITS or CSV file.
pub fn load_lightcurve<P: AsRef<Path>>(path: P) -> Result<LightCurve> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LightCurveError::NotFound(path.to_path_buf()));
    }
    info!("Loading {}", path.display());

    match extension(path).as_str() {
        "fits" | "fz" | "lc" => read_fits(path),
        "csv" | "txt" => read_csv(path),
        other => Err(LightCurveError::UnsupportedExtension(format!(".{other}"))),
    }
}

/// Replace the extension of `prefix` with `suffix` (given without a leading dot).
///
/// `data/lightcurve_clean` + `csv` gives `data/lightcurve_clean.csv`, and
/// `data/lightcurve_detrended` + `detrended.csv` gives
/// `data/lightcurve_detrended.detrended.csv`.
pub fn with_suffix<P: AsRef<Path>>(prefix: P, suffix: &str) -> PathBuf {
    prefix.as_ref().with_extension(suffix)
}

/// Save a light curve as `<prefix>.csv` (and `<prefix>.fits` with FITS support).
///
/// Returns the paths that were written.
pub fn save_lightcurve<P: AsRef<Path>>(lc: &LightCurve, prefix: P) -> Result<Vec<PathBuf>> {
    save_lightcurve_with_suffix(lc, prefix, "")
}

/// Save a light curve as `<prefix>.<tag>.csv` (and `.fits`).
///
/// An empty `tag` behaves like [`save_lightcurve`].
pub fn save_lightcurve_with_suffix<P: AsRef<Path>>(
    lc: &LightCurve,
    prefix: P,
    tag: &str,
) -> Result<Vec<PathBuf>> {
    let ext = |kind: &str| {
        if tag.is_empty() {
            kind.to_string()
        } else {
            format!("{tag}.{kind}")
        }
    };

    let mut written = Vec::with_capacity(2);

    if cfg!(feature = "fits") {
        let fits_path = with_suffix(&prefix, &ext("fits"));
        info!("Saving FITS -> {}", fits_path.display());
        write_fits(lc, &fits_path)?;
        written.push(fits_path);
    }

    let csv_path = with_suffix(&prefix, &ext("csv"));
    info!("Saving CSV -> {}", csv_path.display());
    write_csv(lc, &csv_path)?;
    written.push(csv_path);

    Ok(written)
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Write a value as indented JSON, creating parent directories.
pub fn write_json<T: Serialize, P: AsRef<Path>>(path: P, payload: &T) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(payload)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Read a JSON file into a value.
pub fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_missing_file() {
        let err = load_lightcurve("does/not/exist.csv").unwrap_err();
        assert!(matches!(err, LightCurveError::NotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curve.parquet");
        std::fs::write(&path, b"nope").unwrap();
        let err = load_lightcurve(&path).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported file extension: .parquet");
    }

    #[test]
    fn test_with_suffix() {
        assert_eq!(
            with_suffix("data/lightcurve_detrended", "detrended.csv"),
            PathBuf::from("data/lightcurve_detrended.detrended.csv")
        );
        assert_eq!(
            with_suffix("data/bls_results.csv", "summary.json"),
            PathBuf::from("data/bls_results.summary.json")
        );
    }

    #[test]
    fn test_save_and_load_roundtrip_csv() {
        let dir = tempfile::tempdir().unwrap();
        let lc = LightCurve::from_time_flux(vec![1.0, 2.0, 3.0], vec![0.9, 1.0, 1.1]).unwrap();
        let written = save_lightcurve(&lc, dir.path().join("nested/lightcurve_clean")).unwrap();
        let csv_path = written.last().unwrap();
        assert!(csv_path.ends_with("nested/lightcurve_clean.csv"));

        let loaded = load_lightcurve(csv_path).unwrap();
        assert_eq!(loaded.time, lc.time);
        assert_eq!(loaded.flux, lc.flux);
    }

    #[test]
    fn test_json_helpers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/summary.json");
        let mut payload = BTreeMap::new();
        payload.insert("best_period".to_string(), 1.274);
        write_json(&path, &payload).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"best_period\""));
        let back: BTreeMap<String, f64> = read_json(&path).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_json_floats_read_back_bit_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bls_results.summary.json");
        let values = vec![
            0.10776144277699305,
            115.21106668017991,
            1326.4417290496826,
            std::f64::consts::PI * 1e-7,
        ];
        write_json(&path, &values).unwrap();
        let back: Vec<f64> = read_json(&path).unwrap();
        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&back), bits(&values));
    }
}
