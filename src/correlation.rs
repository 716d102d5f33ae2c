// 📈 Series Aligner / Correlation Engine
//
// Two indicators are joined on geo_id for one year and level. Pairs always come
// out in ascending geo_id order so the numeric result and the scatter data are
// built from the exact same alignment.

use crate::catalog::require_indicator;
use crate::error::{IndicatorError, Result};
use crate::geography::GeoLevel;
use crate::observations::observations_for;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

/// Fewer shared geographies than this and r is not reported
pub const MIN_ALIGNED_SAMPLE: usize = 3;

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedPair {
    pub geo_id: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub year: i32,
    pub level: GeoLevel,
    #[serde(rename = "indicatorA")]
    pub indicator_a: String,
    #[serde(rename = "indicatorB")]
    pub indicator_b: String,
    pub n: usize,
    pub pearson_r: f64,
    pub pairs: Vec<AlignedPair>,
}

// ============================================================================
// PURE CORE
// ============================================================================

/// Inner join of two geo_id → value maps, ascending by geo_id
pub fn align_series(a: &BTreeMap<String, f64>, b: &BTreeMap<String, f64>) -> Vec<AlignedPair> {
    a.iter()
        .filter_map(|(geo_id, x)| {
            b.get(geo_id).map(|y| AlignedPair {
                geo_id: geo_id.clone(),
                x: *x,
                y: *y,
            })
        })
        .collect()
}

fn is_constant(values: &[f64]) -> bool {
    values.iter().all(|v| *v == values[0])
}

/// Values divided by their largest magnitude, so squares cannot overflow
fn rescaled(values: &[f64]) -> Vec<f64> {
    let max_abs = values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if max_abs == 0.0 {
        return values.to_vec();
    }
    values.iter().map(|v| v / max_abs).collect()
}

/// Pearson product-moment correlation
///
/// None when the slices differ in length, are empty, either side is constant,
/// or the result is not finite.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.is_empty() {
        return None;
    }
    // rounding in the mean leaves tiny nonzero deviations for repeated values
    if is_constant(x) || is_constant(y) {
        return None;
    }

    let x = rescaled(x);
    let y = rescaled(y);
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (xi, yi) in x.iter().zip(&y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    let r = cov / (var_x.sqrt() * var_y.sqrt());
    if !r.is_finite() {
        return None;
    }
    // clamp float drift so a perfect line reads as exactly ±1
    Some(r.clamp(-1.0, 1.0))
}

/// Align two series and compute r, enforcing the minimum sample size
pub fn correlate_series(
    code_a: &str,
    a: &BTreeMap<String, f64>,
    code_b: &str,
    b: &BTreeMap<String, f64>,
) -> Result<(f64, Vec<AlignedPair>)> {
    let pairs = align_series(a, b);
    if pairs.len() < MIN_ALIGNED_SAMPLE {
        return Err(IndicatorError::InsufficientSample { count: pairs.len() });
    }

    let xs: Vec<f64> = pairs.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = pairs.iter().map(|p| p.y).collect();

    for (code, values) in [(code_a, &xs), (code_b, &ys)] {
        if is_constant(values) {
            return Err(IndicatorError::DegenerateSeries {
                indicator: code.to_string(),
            });
        }
    }

    match pearson(&xs, &ys) {
        Some(r) => Ok((r, pairs)),
        // only reachable with non-finite inputs; blame the side carrying them
        None => {
            let indicator = if xs.iter().all(|v| v.is_finite()) { code_b } else { code_a };
            Err(IndicatorError::DegenerateSeries {
                indicator: indicator.to_string(),
            })
        }
    }
}

// ============================================================================
// STORE-BACKED
// ============================================================================

fn series_for(conn: &Connection, indicator_id: i64, year: i32, level: GeoLevel) -> Result<BTreeMap<String, f64>> {
    Ok(observations_for(conn, indicator_id, year, level)?
        .into_iter()
        .map(|o| (o.geo_id, o.value))
        .collect())
}

/// Correlate two stored indicators by code
pub fn correlate(conn: &Connection, code_a: &str, code_b: &str, year: i32, level: GeoLevel) -> Result<CorrelationResult> {
    let a = require_indicator(conn, code_a)?;
    let b = require_indicator(conn, code_b)?;

    let series_a = series_for(conn, a.id, year, level)?;
    let series_b = series_for(conn, b.id, year, level)?;

    let (pearson_r, pairs) = correlate_series(code_a, &series_a, code_b, &series_b)?;

    tracing::info!(a = code_a, b = code_b, year, n = pairs.len(), r = pearson_r, "correlation computed");

    Ok(CorrelationResult {
        year,
        level,
        indicator_a: code_a.to_string(),
        indicator_b: code_b.to_string(),
        n: pairs.len(),
        pearson_r,
        pairs,
    })
}

// ============================================================================
// SCATTER DATA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    /// geo_id, used to annotate the point
    pub label: String,
    pub x: f64,
    pub y: f64,
}

/// Everything a plotting tool needs to draw the A × B scatter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPlot {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub pearson_r: f64,
    pub points: Vec<ScatterPoint>,
}

/// Scatter data for two stored indicators
///
/// Axis labels default to the indicator names.
pub fn scatter_plot(
    conn: &Connection,
    code_a: &str,
    code_b: &str,
    year: i32,
    level: GeoLevel,
    x_label: Option<&str>,
    y_label: Option<&str>,
) -> Result<ScatterPlot> {
    let result = correlate(conn, code_a, code_b, year, level)?;
    let a = require_indicator(conn, code_a)?;
    let b = require_indicator(conn, code_b)?;

    Ok(ScatterPlot {
        title: format!("{} x {} - year={}, r={:.3}", a.code, b.code, year, result.pearson_r),
        x_label: x_label.map(str::to_string).unwrap_or(a.name),
        y_label: y_label.map(str::to_string).unwrap_or(b.name),
        pearson_r: result.pearson_r,
        points: result
            .pairs
            .into_iter()
            .map(|p| ScatterPoint {
                label: p.geo_id,
                x: p.x,
                y: p.y,
            })
            .collect(),
    })
}

/// Aligned pairs as CSV: geo_id,x,y
pub fn write_pairs_csv<W: Write>(writer: W, result: &CorrelationResult) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for pair in &result.pairs {
        csv_writer.serialize(pair)?;
    }
    csv_writer.flush()?;
    Ok(())
}
