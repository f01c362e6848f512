//! PNG figures for inspecting a search.
//!
//! Three figures are produced, all rendered with the plotters bitmap
//! backend: the light curve itself, the BLS periodogram, and the curve
//! folded on a candidate period with a binned overlay.

use crate::fold::{bin_folded, fold};
use crate::{Result, TransitError};
use lightcurve::LightCurve;
use log::info;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

type DrawResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// Light curve figure size in pixels
pub const LIGHTCURVE_SIZE: (u32, u32) = (2000, 800);
/// Periodogram figure size in pixels
pub const BLS_SIZE: (u32, u32) = (2000, 800);
/// Phase-fold figure size in pixels
pub const PHASE_SIZE: (u32, u32) = (1200, 1000);

/// Finite data range padded by 5% (or ±0.5 when flat).
fn padded_range<'a, I: IntoIterator<Item = &'a f64>>(values: I) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return None;
    }
    if hi > lo {
        let pad = 0.05 * (hi - lo);
        Some((lo - pad, hi + pad))
    } else {
        Some((lo - 0.5, hi + 0.5))
    }
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn no_data(what: &'static str) -> TransitError {
    TransitError::InsufficientData {
        what,
        needed: 1,
        found: 0,
    }
}

fn finish(path: &Path, result: DrawResult) -> Result<()> {
    result.map_err(|e| TransitError::Plot(format!("{}: {e}", path.display())))?;
    info!("Saved plot {}", path.display());
    Ok(())
}

fn finite_points(x: &[f64], y: &[f64]) -> Vec<(f64, f64)> {
    x.iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .collect()
}

/// Flux against time as points.
pub fn plot_lightcurve(lc: &LightCurve, out: &Path, title: &str) -> Result<()> {
    let points = finite_points(&lc.time.to_vec(), &lc.flux.to_vec());
    let x_range = padded_range(points.iter().map(|(x, _)| x)).ok_or(no_data("light curve plot"))?;
    let y_range = padded_range(points.iter().map(|(_, y)| y)).ok_or(no_data("light curve plot"))?;
    ensure_parent(out)?;

    let root = BitMapBackend::new(out, LIGHTCURVE_SIZE).into_drawing_area();
    let drawn = draw_scatter(
        &root,
        &points,
        x_range,
        y_range,
        title,
        ("Time (BTJD or JD)", "Flux (normalized)"),
    );
    finish(out, drawn)
}

fn draw_scatter(
    root: &DrawingArea<BitMapBackend, Shift>,
    points: &[(f64, f64)],
    (x0, x1): (f64, f64),
    (y0, y1): (f64, f64),
    title: &str,
    (x_desc, y_desc): (&str, &str),
) -> DrawResult {
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 36))
        .margin(15)
        .x_label_area_size(60)
        .y_label_area_size(90)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .y_label_formatter(&|y| format!("{y:.4}"))
        .draw()?;

    chart.draw_series(
        points
            .iter()
            .map(|&(x, y)| Circle::new((x, y), 2, BLUE.filled())),
    )?;

    root.present()?;
    Ok(())
}

/// Power against trial period.
pub fn plot_bls(periods: &[f64], power: &[f64], out: &Path) -> Result<()> {
    let points = finite_points(periods, power);
    let x_range = padded_range(points.iter().map(|(x, _)| x)).ok_or(no_data("periodogram plot"))?;
    let (_, y_max) = padded_range(points.iter().map(|(_, y)| y)).ok_or(no_data("periodogram plot"))?;
    let y_min = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min).min(0.0);
    ensure_parent(out)?;

    let root = BitMapBackend::new(out, BLS_SIZE).into_drawing_area();
    let drawn = (|| -> DrawResult {
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .caption("BLS Periodogram", ("sans-serif", 36))
            .margin(15)
            .x_label_area_size(60)
            .y_label_area_size(90)
            .build_cartesian_2d(x_range.0..x_range.1, y_min..y_max)?;

        chart
            .configure_mesh()
            .x_desc("Period (days)")
            .y_desc("BLS Power")
            .draw()?;

        chart.draw_series(LineSeries::new(points.iter().copied(), &BLUE))?;
        root.present()?;
        Ok(())
    })();
    finish(out, drawn)
}

/// Curve folded on `period` with the mean flux in `bins - 1` phase bins
/// overlaid. Without an epoch the first timestamp is phase 0.
pub fn plot_phase_fold(
    lc: &LightCurve,
    period: f64,
    epoch: Option<f64>,
    out: &Path,
    bins: usize,
) -> Result<()> {
    let folded = fold(lc, period, epoch)?;
    let binned = bin_folded(&folded, bins)?;
    let points = finite_points(&folded.phase, &folded.flux);
    let y_range = padded_range(points.iter().map(|(_, y)| y)).ok_or(no_data("phase plot"))?;
    let binned_line: Vec<(f64, f64)> = finite_points(&binned.centers, &binned.flux);
    ensure_parent(out)?;

    let root = BitMapBackend::new(out, PHASE_SIZE).into_drawing_area();
    let title = format!("Phase-folded (P={period:.6} d)");
    let drawn = (|| -> DrawResult {
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(&title, ("sans-serif", 36))
            .margin(15)
            .x_label_area_size(60)
            .y_label_area_size(90)
            .build_cartesian_2d(-0.5f64..0.5f64, y_range.0..y_range.1)?;

        chart
            .configure_mesh()
            .x_desc("Phase")
            .y_desc("Flux")
            .y_label_formatter(&|y| format!("{y:.4}"))
            .draw()?;

        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 2, BLUE.mix(0.6).filled())),
            )?
            .label("data")
            .legend(|(x, y)| Circle::new((x + 10, y), 3, BLUE.filled()));

        chart
            .draw_series(LineSeries::new(binned_line, RED.stroke_width(3)))?
            .label("binned")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(3)));

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;

        root.present()?;
        Ok(())
    })();
    finish(out, drawn)
}

/// Output file for one figure: `plots/figure` + `bls` gives `plots/figure_bls.png`.
pub fn figure_path(prefix: &Path, kind: &str) -> std::path::PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(format!("_{kind}.png"));
    name.into()
}
