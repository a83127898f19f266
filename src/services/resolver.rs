//! Waypoint → weather zone + provider resolution.
//!
//! Deterministic and offline: the zone id is a pure function of (lat, lon)
//! over a fixed-size grid, and provider selection uses coarse country
//! detection — bounding boxes for coordinates, dial prefixes for phone
//! numbers. The only failure mode is an out-of-range coordinate.

use crate::errors::AppError;
use crate::services::providers::ProviderKind;

/// Default weather-zone grid cell size in degrees.
pub const DEFAULT_GRID_SIZE_DEG: f64 = 0.25;

/// Result of resolving a location: its grouping key and the data source
/// that should serve it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedZone {
    pub zone_id: String,
    pub provider: ProviderKind,
}

/// Reject coordinates outside the valid lat/lon ranges.
pub fn validate_coords(lat: f64, lon: f64) -> Result<(), AppError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(AppError::Validation(format!(
            "latitude {} out of range [-90, 90]",
            lat
        )));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(AppError::Validation(format!(
            "longitude {} out of range [-180, 180]",
            lon
        )));
    }
    Ok(())
}

/// Derive the weather-zone id for a coordinate.
///
/// Pure: identical inputs always produce the same id. The grid size is
/// encoded in the id (in thousandths of a degree) so ids from different
/// configurations never collide.
pub fn zone_id(lat: f64, lon: f64, grid_size_deg: f64) -> Result<String, AppError> {
    validate_coords(lat, lon)?;
    let lat_cell = ((lat + 90.0) / grid_size_deg).floor() as i64;
    let lon_cell = ((lon + 180.0) / grid_size_deg).floor() as i64;
    let grid_tag = (grid_size_deg * 1000.0).round() as i64;
    Ok(format!("Z{}x{}g{}", lat_cell, lon_cell, grid_tag))
}

/// Coarse country detection from a coordinate.
///
/// Bounding boxes, checked in order; first match wins. Only countries with a
/// dedicated provider are listed — everything else routes to the global
/// fallback model.
pub fn country_for_coords(lat: f64, lon: f64) -> Option<&'static str> {
    // (country, lat_min, lat_max, lon_min, lon_max)
    const BOXES: &[(&str, f64, f64, f64, f64)] = &[
        // Contiguous US
        ("US", 24.5, 49.5, -125.0, -66.9),
        // Alaska
        ("US", 51.0, 71.5, -170.0, -129.0),
        // Hawaii
        ("US", 18.5, 22.5, -160.5, -154.5),
        // Norway (mainland)
        ("NO", 57.9, 71.4, 4.0, 31.2),
    ];

    BOXES
        .iter()
        .find(|(_, lat_min, lat_max, lon_min, lon_max)| {
            (*lat_min..=*lat_max).contains(&lat) && (*lon_min..=*lon_max).contains(&lon)
        })
        .map(|(country, ..)| *country)
}

/// Country from an E.164 phone number's dial prefix.
pub fn country_for_phone(phone: &str) -> Option<&'static str> {
    let digits = phone.trim().trim_start_matches('+');
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if digits.starts_with('1') {
        return Some("US");
    }
    if digits.starts_with("47") {
        return Some("NO");
    }
    None
}

/// Provider routing table: national service where we have one, global
/// fallback otherwise.
pub fn provider_for_country(country: Option<&str>) -> ProviderKind {
    match country {
        Some("US") => ProviderKind::Nws,
        Some("NO") => ProviderKind::MetNo,
        _ => ProviderKind::OpenMeteo,
    }
}

/// Resolve a location to its zone and provider.
///
/// For registered waypoints the country comes from the coordinate. For an
/// inbound GPS-based request, pass the requesting phone number — its country
/// takes precedence over the (possibly border-straddling) coordinate.
pub fn resolve(
    lat: f64,
    lon: f64,
    grid_size_deg: f64,
    requesting_phone: Option<&str>,
) -> Result<ResolvedZone, AppError> {
    let zone_id = zone_id(lat, lon, grid_size_deg)?;
    let country = requesting_phone
        .and_then(country_for_phone)
        .or_else(|| country_for_coords(lat, lon));
    Ok(ResolvedZone {
        zone_id,
        provider: provider_for_country(country),
    })
}
