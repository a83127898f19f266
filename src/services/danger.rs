//! Terrain danger rating.
//!
//! Four boolean factors per forecast window, mapped ordinally to D0..D4 by
//! factor count. Pure function of the (elevation-adjusted) window and the
//! waypoint's metadata — no state, no I/O.

use serde::Serialize;

use crate::db::models::WaypointKind;
use crate::helpers::ms_to_kmh;
use crate::services::providers::RawWindow;

/// Ordinal danger classification, D0 (benign) through D4 (all factors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum DangerRating {
    D0,
    D1,
    D2,
    D3,
    D4,
}

impl DangerRating {
    pub fn level(&self) -> u8 {
        match self {
            DangerRating::D0 => 0,
            DangerRating::D1 => 1,
            DangerRating::D2 => 2,
            DangerRating::D3 => 3,
            DangerRating::D4 => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DangerRating::D0 => "D0",
            DangerRating::D1 => "D1",
            DangerRating::D2 => "D2",
            DangerRating::D3 => "D3",
            DangerRating::D4 => "D4",
        }
    }

    fn from_count(count: u8) -> Self {
        match count {
            0 => DangerRating::D0,
            1 => DangerRating::D1,
            2 => DangerRating::D2,
            3 => DangerRating::D3,
            _ => DangerRating::D4,
        }
    }
}

/// The four weather factors behind a rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DangerFactors {
    /// Waypoint sits above the freezing level.
    pub ice: bool,
    /// Cloud base below the waypoint — hiker is in cloud.
    pub blind: bool,
    /// Wind speed or gust above the wind threshold.
    pub wind: bool,
    /// Precipitation above the precipitation threshold.
    pub precip: bool,
}

impl DangerFactors {
    pub fn count(&self) -> u8 {
        self.ice as u8 + self.blind as u8 + self.wind as u8 + self.precip as u8
    }
}

/// Fixed thresholds, externally configured.
#[derive(Debug, Clone, Copy)]
pub struct DangerThresholds {
    pub wind_kmh: f64,
    pub precip_mm: f64,
}

impl Default for DangerThresholds {
    fn default() -> Self {
        Self {
            wind_kmh: 40.0,
            precip_mm: 10.0,
        }
    }
}

/// Evaluate the four factors for one window at one waypoint.
pub fn factors_for_window(
    window: &RawWindow,
    waypoint_elevation_m: f64,
    thresholds: &DangerThresholds,
) -> DangerFactors {
    let ice = window
        .freezing_level_m
        .map(|fl| waypoint_elevation_m > fl)
        .unwrap_or(false);

    let blind = window
        .cloud_base_m
        .map(|cb| cb < waypoint_elevation_m)
        .unwrap_or(false);

    let strongest_wind_ms = window
        .wind_gust_ms
        .map(|g| g.max(window.wind_speed_ms))
        .unwrap_or(window.wind_speed_ms);
    let wind = ms_to_kmh(strongest_wind_ms) > thresholds.wind_kmh;

    let precip = window.precipitation_mm > thresholds.precip_mm;

    DangerFactors {
        ice,
        blind,
        wind,
        precip,
    }
}

/// Map factors to a rating, capping sheltered waypoint kinds at D2.
pub fn rate(factors: DangerFactors, kind: WaypointKind) -> DangerRating {
    let rating = DangerRating::from_count(factors.count());
    if kind.is_sheltered() {
        rating.min(DangerRating::D2)
    } else {
        rating
    }
}

/// Factors and rating for one window in one call.
pub fn rate_window(
    window: &RawWindow,
    waypoint_elevation_m: f64,
    kind: WaypointKind,
    thresholds: &DangerThresholds,
) -> (DangerFactors, DangerRating) {
    let factors = factors_for_window(window, waypoint_elevation_m, thresholds);
    (factors, rate(factors, kind))
}
