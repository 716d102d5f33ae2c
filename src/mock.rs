// 🧪 Mock series - two correlated synthetic indicators per UF
//
// MOCK_A: evenly spaced income values, MOCK_B: linear in MOCK_A plus seeded
// gaussian noise. Same seed → same values, so reloading only updates in place.

use crate::catalog::{get_or_create_indicator, get_or_create_source};
use crate::error::Result;
use crate::geography::{GeoLevel, GeographyTable};
use crate::observations::{upsert_observations, ObservationInput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

pub const MOCK_SOURCE: &str = "MOCK";
pub const MOCK_A: &str = "MOCK_A";
pub const MOCK_B: &str = "MOCK_B";
pub const MOCK_YEAR: i32 = 2022;
pub const DEFAULT_SEED: u64 = 42;

const X_START: f64 = 1500.0;
const X_END: f64 = 6000.0;
const Y_INTERCEPT: f64 = 0.6;
const Y_SLOPE: f64 = 0.00015;
const NOISE_STD: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockLoadReport {
    pub inserted_a: usize,
    pub inserted_b: usize,
}

/// `n` evenly spaced values from `start` to `end`, both included
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Standard normal draw (Box-Muller)
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    // gen::<f64>() is in [0, 1); shift to (0, 1] so ln never sees 0
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// (x, y) series over the given geographies
pub fn mock_series(geo_ids: &[&str], seed: u64) -> (Vec<ObservationInput>, Vec<ObservationInput>) {
    let xs = linspace(X_START, X_END, geo_ids.len());
    let mut rng = StdRng::seed_from_u64(seed);

    let mut rows_a = Vec::with_capacity(geo_ids.len());
    let mut rows_b = Vec::with_capacity(geo_ids.len());
    for (geo_id, x) in geo_ids.iter().zip(xs) {
        let y = Y_INTERCEPT + Y_SLOPE * x + NOISE_STD * standard_normal(&mut rng);
        rows_a.push(ObservationInput::new(geo_id, GeoLevel::State, MOCK_YEAR, x));
        rows_b.push(ObservationInput::new(geo_id, GeoLevel::State, MOCK_YEAR, y));
    }
    (rows_a, rows_b)
}

/// Create the MOCK source/indicators and upsert both series for all UFs
pub fn load_mock_data(conn: &mut Connection, seed: u64) -> Result<MockLoadReport> {
    let src = get_or_create_source(conn, MOCK_SOURCE, None, Some("Dados sintéticos"))?;
    let ind_a = get_or_create_indicator(conn, MOCK_A, "Renda média (UF)", "R$", &src)?;
    let ind_b = get_or_create_indicator(conn, MOCK_B, "Taxa estimada TEA (UF)", "prop.", &src)?;

    let ufs = GeographyTable::ibge().state_codes();
    let (rows_a, rows_b) = mock_series(&ufs, seed);

    let inserted_a = upsert_observations(conn, ind_a.id, &rows_a)?;
    let inserted_b = upsert_observations(conn, ind_b.id, &rows_b)?;

    tracing::info!(seed, inserted_a, inserted_b, "mock data loaded");
    Ok(MockLoadReport { inserted_a, inserted_b })
}
