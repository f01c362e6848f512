//! FITS light curve files.
//!
//! Reads mission light curve products (SPOC/QLP style binary tables with
//! `TIME`, `PDCSAP_FLUX`, `QUALITY` columns) and writes a minimal
//! `LIGHTCURVE` table. Without the `fits` feature both functions return
//! [`LightCurveError::FeatureDisabled`].

use crate::{LightCurve, Result};
use std::path::Path;

/// Quality bits that flag unusable TESS cadences: attitude tweak (1), safe
/// mode (2), coarse point (4), earth point (8), desaturation event (32) and
/// manual exclude (128).
pub const DEFAULT_QUALITY_BITMASK: i32 = 1 | 2 | 4 | 8 | 32 | 128;

/// Flux columns tried in order when reading a product file.
pub const FLUX_COLUMNS: [&str; 3] = ["PDCSAP_FLUX", "FLUX", "SAP_FLUX"];

/// Keep only cadences with none of the `bitmask` bits set.
pub fn quality_mask(quality: &[i32], bitmask: i32) -> Vec<bool> {
    quality.iter().map(|q| q & bitmask == 0).collect()
}

#[cfg(feature = "fits")]
mod imp {
    use super::{quality_mask, DEFAULT_QUALITY_BITMASK, FLUX_COLUMNS};
    use crate::{LightCurve, LightCurveMeta, Result};
    use fitsio::hdu::FitsHdu;
    use fitsio::tables::{ColumnDataType, ColumnDescription};
    use fitsio::FitsFile;
    use log::{debug, info};
    use ndarray::Array1;
    use std::path::Path;

    fn lightcurve_hdu(fptr: &mut FitsFile) -> Result<FitsHdu> {
        match fptr.hdu("LIGHTCURVE") {
            Ok(hdu) => Ok(hdu),
            Err(_) => Ok(fptr.hdu(1)?),
        }
    }

    pub fn read_fits(path: &Path) -> Result<LightCurve> {
        let mut fptr = FitsFile::open(path)?;

        let primary = fptr.primary_hdu()?;
        let target = primary.read_key::<String>(&mut fptr, "OBJECT").ok();
        let sector = primary.read_key::<i64>(&mut fptr, "SECTOR").ok();
        let mission = primary.read_key::<String>(&mut fptr, "TELESCOP").ok();

        let hdu = lightcurve_hdu(&mut fptr)?;
        let time: Vec<f64> = hdu.read_col(&mut fptr, "TIME")?;

        let mut flux = None;
        for name in FLUX_COLUMNS {
            if let Ok(values) = hdu.read_col::<f64>(&mut fptr, name) {
                flux = Some((name, values));
                break;
            }
            debug!("Column {name} not present in {}", path.display());
        }
        let (flux_column, flux) = flux.ok_or_else(|| {
            crate::LightCurveError::MissingColumn(format!(
                "FITS table in {} has none of {:?}",
                path.display(),
                FLUX_COLUMNS
            ))
        })?;

        let flux_err: Vec<f64> = hdu
            .read_col(&mut fptr, &format!("{flux_column}_ERR"))
            .unwrap_or_else(|_| vec![f64::NAN; time.len()]);

        let meta = LightCurveMeta {
            target,
            mission,
            sector,
            flux_column: Some(flux_column.to_string()),
        };
        let lc = LightCurve::new(Array1::from(time), Array1::from(flux), Array1::from(flux_err))?
            .with_meta(meta);

        match hdu.read_col::<i32>(&mut fptr, "QUALITY") {
            Ok(quality) if quality.len() == lc.len() => {
                let mask = quality_mask(&quality, DEFAULT_QUALITY_BITMASK);
                let kept = mask.iter().filter(|&&m| m).count();
                info!(
                    "Quality mask removed {} of {} cadences",
                    lc.len() - kept,
                    lc.len()
                );
                lc.select(&mask)
            }
            _ => Ok(lc),
        }
    }

    pub fn write_fits(lc: &LightCurve, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut fptr = FitsFile::create(path).overwrite().open()?;
        let columns = [
            ColumnDescription::new("TIME")
                .with_type(ColumnDataType::Double)
                .create()?,
            ColumnDescription::new("FLUX")
                .with_type(ColumnDataType::Double)
                .create()?,
            ColumnDescription::new("FLUX_ERR")
                .with_type(ColumnDataType::Double)
                .create()?,
        ];
        let hdu = fptr.create_table("LIGHTCURVE".to_string(), &columns)?;
        hdu.write_col(&mut fptr, "TIME", &lc.time.to_vec())?;
        hdu.write_col(&mut fptr, "FLUX", &lc.flux.to_vec())?;
        hdu.write_col(&mut fptr, "FLUX_ERR", &lc.flux_err.to_vec())?;

        let primary = fptr.primary_hdu()?;
        if let Some(target) = &lc.meta.target {
            primary.write_key(&mut fptr, "OBJECT", target.clone())?;
        }
        if let Some(sector) = lc.meta.sector {
            primary.write_key(&mut fptr, "SECTOR", sector)?;
        }
        Ok(())
    }
}

/// Read a light curve product file.
#[cfg(feature = "fits")]
pub fn read_fits<P: AsRef<Path>>(path: P) -> Result<LightCurve> {
    imp::read_fits(path.as_ref())
}

/// Write a light curve as a `LIGHTCURVE` binary table, overwriting `path`.
#[cfg(feature = "fits")]
pub fn write_fits<P: AsRef<Path>>(lc: &LightCurve, path: P) -> Result<()> {
    imp::write_fits(lc, path.as_ref())
}

#[cfg(not(feature = "fits"))]
pub fn read_fits<P: AsRef<Path>>(_path: P) -> Result<LightCurve> {
    Err(crate::LightCurveError::FeatureDisabled("FITS", "fits"))
}

#[cfg(not(feature = "fits"))]
pub fn write_fits<P: AsRef<Path>>(_lc: &LightCurve, _path: P) -> Result<()> {
    Err(crate::LightCurveError::FeatureDisabled("FITS", "fits"))
}
