//! Elevation lapse-rate correction.
//!
//! Providers model temperature at their grid cell's terrain height, which in
//! mountain terrain can sit hundreds of meters below a waypoint. Corrects the
//! modeled temperature to the waypoint's true elevation with the standard
//! atmosphere lapse rate. All other fields pass through unchanged.

use crate::services::providers::{RawForecast, RawWindow};

/// Standard atmosphere lapse rate: 6.5 °C per 1000 m.
pub const LAPSE_RATE_C_PER_M: f64 = 0.0065;

/// Nominal model terrain height used when a provider reports none.
pub const NOMINAL_MODEL_ELEVATION_M: f64 = 300.0;

/// Correct a modeled temperature to the waypoint's elevation.
pub fn adjusted_temperature(
    raw_temp_c: f64,
    waypoint_elevation_m: f64,
    model_elevation_m: f64,
) -> f64 {
    raw_temp_c - (waypoint_elevation_m - model_elevation_m) * LAPSE_RATE_C_PER_M
}

/// Elevation-correct every window of a raw forecast for one waypoint.
///
/// Pure: returns corrected copies, the input is untouched. Falls back to
/// `NOMINAL_MODEL_ELEVATION_M` when the provider reported no model terrain
/// height.
pub fn adjust_windows(raw: &RawForecast, waypoint_elevation_m: f64) -> Vec<RawWindow> {
    let model_elevation = raw.model_elevation_m.unwrap_or(NOMINAL_MODEL_ELEVATION_M);
    raw.windows
        .iter()
        .map(|w| RawWindow {
            temperature_c: adjusted_temperature(w.temperature_c, waypoint_elevation_m, model_elevation),
            ..w.clone()
        })
        .collect()
}
