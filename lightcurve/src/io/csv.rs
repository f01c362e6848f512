//! CSV light curve tables.
//!
//! Column names vary between tools (`time`, `TIME`, `btjd_time`, `flux`,
//! `pdcsap_flux`, `flux_normalized`, ...), so columns are matched by
//! substring on the lower-cased header rather than by exact name.

use crate::{LightCurve, LightCurveError, Result};
use ndarray::Array1;
use std::path::Path;

/// Indices of the time, flux and (optional) flux uncertainty columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub time: usize,
    pub flux: usize,
    pub flux_err: Option<usize>,
}

/// Pick the time, flux and uncertainty columns from a header row.
///
/// - time: first column whose name contains `time`
/// - flux: first column containing `flux` but not `err`
/// - flux_err: first column containing both `flux` and `err`
pub fn detect_columns<'a, I>(headers: I) -> Result<ColumnMap>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut time = None;
    let mut flux = None;
    let mut flux_err = None;

    for (idx, name) in headers.into_iter().enumerate() {
        let lower = name.trim().to_ascii_lowercase();
        if lower.contains("time") && time.is_none() {
            time = Some(idx);
        }
        if lower.contains("flux") {
            if lower.contains("err") {
                if flux_err.is_none() {
                    flux_err = Some(idx);
                }
            } else if flux.is_none() {
                flux = Some(idx);
            }
        }
    }

    match (time, flux) {
        (Some(time), Some(flux)) => Ok(ColumnMap {
            time,
            flux,
            flux_err,
        }),
        _ => Err(LightCurveError::MissingColumn(
            "CSV must contain time and flux columns".to_string(),
        )),
    }
}

fn parse_cell(record: &csv::StringRecord, idx: usize) -> f64 {
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

/// Read a light curve from a CSV file with a header row.
///
/// Empty or unparsable cells become NaN.
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<LightCurve> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path.as_ref())?;

    let columns = detect_columns(reader.headers()?.iter())?;

    let mut time = Vec::new();
    let mut flux = Vec::new();
    let mut flux_err = Vec::new();
    for record in reader.records() {
        let record = record?;
        time.push(parse_cell(&record, columns.time));
        flux.push(parse_cell(&record, columns.flux));
        flux_err.push(match columns.flux_err {
            Some(idx) => parse_cell(&record, idx),
            None => f64::NAN,
        });
    }

    LightCurve::new(Array1::from(time), Array1::from(flux), Array1::from(flux_err))
}

/// Write `time,flux,flux_err` rows, creating parent directories.
pub fn write_csv<P: AsRef<Path>>(lc: &LightCurve, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["time", "flux", "flux_err"])?;
    for i in 0..lc.len() {
        wtr.write_record(&[
            format_value(lc.time[i]),
            format_value(lc.flux[i]),
            format_value(lc.flux_err[i]),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        // shortest representation that parses back to the same f64
        format!("{v}")
    }
}
