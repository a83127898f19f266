//! Forecast assembly.
//!
//! Merges elevation-adjusted provider windows with their danger ratings into
//! the ordered, horizon-bounded slot sequence the formatter renders. Slot
//! density is matched to what fits an SMS: 2-hourly for the 12-hour horizon,
//! 3-hourly for 24 hours, one midday slot per day for the week view.

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::db::models::WaypointKind;
use crate::services::danger::{rate_window, DangerFactors, DangerRating, DangerThresholds};
use crate::services::elevation::adjust_windows;
use crate::services::providers::{Horizon, ProviderKind, RawForecast, RawWindow};

/// One assembled forecast slot: adjusted weather + rating.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSlot {
    pub time: DateTime<Utc>,
    pub temperature_c: f64,
    pub precipitation_mm: f64,
    pub precipitation_probability_pct: Option<f64>,
    pub wind_speed_ms: f64,
    pub wind_gust_ms: Option<f64>,
    pub cloud_cover_pct: f64,
    pub cloud_base_m: Option<f64>,
    pub freezing_level_m: Option<f64>,
    pub factors: DangerFactors,
    pub rating: DangerRating,
    /// Rating crossed the configured alert threshold.
    pub alert: bool,
}

/// The assembled forecast for one waypoint.
#[derive(Debug, Clone, PartialEq)]
pub struct WaypointForecast {
    pub code: String,
    pub name: String,
    pub kind: WaypointKind,
    pub elevation_m: f64,
    pub zone_id: String,
    pub provider: ProviderKind,
    pub horizon: Horizon,
    pub slots: Vec<ForecastSlot>,
}

impl WaypointForecast {
    /// Worst rating across all slots; D0 for an empty forecast.
    pub fn max_rating(&self) -> DangerRating {
        self.slots
            .iter()
            .map(|s| s.rating)
            .max()
            .unwrap_or(DangerRating::D0)
    }

    pub fn has_alert(&self) -> bool {
        self.slots.iter().any(|s| s.alert)
    }
}

/// Sampling interval in hours for the short horizons.
fn sample_step_hours(horizon: Horizon) -> i64 {
    match horizon {
        Horizon::Half => 2,
        Horizon::Short => 3,
        Horizon::Week => 24, // handled separately: one midday slot per day
    }
}

/// Floor a datetime to the start of its hour.
fn floor_to_hour(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.date_naive()
        .and_hms_opt(dt.time().hour(), 0, 0)
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
        .unwrap_or(dt)
}

/// Assemble the forecast for one waypoint.
///
/// Idempotent: identical inputs produce an identical slot sequence, which the
/// dispatcher relies on for duplicate-send suppression.
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    code: &str,
    name: &str,
    kind: WaypointKind,
    elevation_m: f64,
    zone_id: &str,
    raw: &RawForecast,
    horizon: Horizon,
    now: DateTime<Utc>,
    thresholds: &DangerThresholds,
    alert_level: u8,
) -> WaypointForecast {
    let mut windows = adjust_windows(raw, elevation_m);

    // Strictly time-ordered, non-overlapping: sort, then drop duplicate stamps
    windows.sort_by_key(|w| w.time);
    windows.dedup_by_key(|w| w.time);

    let start = floor_to_hour(now);
    let end = now + Duration::hours(horizon.hours());
    windows.retain(|w| w.time >= start && w.time <= end);

    let sampled: Vec<_> = match horizon {
        Horizon::Week => sample_daily_midday(&windows),
        _ => sample_every(&windows, sample_step_hours(horizon)),
    };

    let slots = sampled
        .into_iter()
        .map(|w| {
            let (factors, rating) = rate_window(&w, elevation_m, kind, thresholds);
            ForecastSlot {
                time: w.time,
                temperature_c: w.temperature_c,
                precipitation_mm: w.precipitation_mm,
                precipitation_probability_pct: w.precipitation_probability_pct,
                wind_speed_ms: w.wind_speed_ms,
                wind_gust_ms: w.wind_gust_ms,
                cloud_cover_pct: w.cloud_cover_pct,
                cloud_base_m: w.cloud_base_m,
                freezing_level_m: w.freezing_level_m,
                alert: rating.level() >= alert_level,
                factors,
                rating,
            }
        })
        .collect();

    WaypointForecast {
        code: code.to_string(),
        name: name.to_string(),
        kind,
        elevation_m,
        zone_id: zone_id.to_string(),
        provider: raw.provider,
        horizon,
        slots,
    }
}

/// Greedy sampling: keep a window when at least `step_hours` passed since the
/// last kept one. Tolerates gaps and 3-hourly tails in provider data.
fn sample_every(
    windows: &[RawWindow],
    step_hours: i64,
) -> Vec<RawWindow> {
    let mut kept = Vec::new();
    let mut last_kept: Option<DateTime<Utc>> = None;
    for w in windows {
        let due = match last_kept {
            None => true,
            Some(prev) => w.time - prev >= Duration::hours(step_hours),
        };
        if due {
            kept.push(w.clone());
            last_kept = Some(w.time);
        }
    }
    kept
}

/// One slot per calendar day, preferring the window closest to 12:00 UTC.
fn sample_daily_midday(
    windows: &[RawWindow],
) -> Vec<RawWindow> {
    let mut picked: Vec<RawWindow> = Vec::new();
    for w in windows {
        let midday_distance = |t: DateTime<Utc>| (t.time().hour() as i64 - 12).abs();
        match picked.last_mut() {
            Some(last) if last.time.date_naive() == w.time.date_naive() => {
                if midday_distance(w.time) < midday_distance(last.time) {
                    *last = w.clone();
                }
            }
            _ => picked.push(w.clone()),
        }
    }
    picked
}
