//! SMS rendering under a strict segment budget.
//!
//! The satellite gateway bills and truncates per segment, so messages use a
//! fixed abbreviation vocabulary to pack each forecast slot into one line:
//!
//! - `r40%`   rain probability
//! - `2.5mm`  precipitation amount (`0.10in` imperial), omitted when ~zero
//! - `w15-25` wind speed–gust range in km/h (mph imperial)
//! - `c80`    cloud cover percent
//! - `b12`    cloud-base altitude in hundreds of meters (hundreds of feet imperial)
//! - `f21`    freezing-level altitude likewise
//! - `D2`     danger rating, `!` appended at or above the alert threshold
//!
//! Lines are atomic: a message that overflows one segment is split *between*
//! lines, never inside one, and multi-segment messages carry `i/n ` page
//! prefixes. Values are converted to the user's unit system before any
//! formatting. Output is byte-for-byte deterministic for identical inputs —
//! the dispatcher hashes it to suppress duplicate sends.

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::errors::AppError;
use crate::helpers::{
    celsius_to_fahrenheit, kmh_to_mph, metres_to_feet, mm_to_inches, ms_to_kmh, UnitSystem,
};
use crate::services::assembler::{ForecastSlot, WaypointForecast};
use crate::services::danger::DangerRating;
use crate::services::providers::Horizon;

/// Reserved for the `i/n ` page prefix on multi-segment messages.
/// Covers up to three-digit counts ("999/999 ").
const PAGE_PREFIX_RESERVE: usize = 8;

/// Two-letter weekday labels, indexed from Monday.
const WEEKDAYS: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];

const HELP_TEXT: &str = "TrailCast: CAST [code|lat,lon]=24h CAST7=7d CAST12=12h \
DELAY=+1 day DONE=end trip UNITS METRIC|IMPERIAL, or text a waypoint code to check in";

/// The gateway's segment limits, externally configured.
#[derive(Debug, Clone, Copy)]
pub struct SegmentBudget {
    pub max_chars: usize,
    pub max_segments: usize,
}

impl Default for SegmentBudget {
    fn default() -> Self {
        Self {
            max_chars: 160,
            max_segments: 6,
        }
    }
}

/// Usage text sent for HELP and for anything unrecognized.
pub fn help_text() -> &'static str {
    HELP_TEXT
}

fn r0(v: f64) -> i64 {
    v.round() as i64
}

/// Altitude in hundreds of meters (metric) or hundreds of feet (imperial).
fn hundreds(m: f64, units: UnitSystem) -> i64 {
    match units {
        UnitSystem::Metric => r0(m / 100.0),
        UnitSystem::Imperial => r0(metres_to_feet(m) / 100.0),
    }
}

fn slot_label(time: DateTime<Utc>, horizon: Horizon) -> String {
    match horizon {
        Horizon::Week => {
            WEEKDAYS[time.weekday().num_days_from_monday() as usize].to_string()
        }
        _ => format!("{:02}h", time.time().hour()),
    }
}

fn temp_field(temperature_c: f64, units: UnitSystem) -> String {
    match units {
        UnitSystem::Metric => format!("{}C", r0(temperature_c)),
        UnitSystem::Imperial => format!("{}F", r0(celsius_to_fahrenheit(temperature_c))),
    }
}

fn wind_field(speed_ms: f64, gust_ms: Option<f64>, units: UnitSystem) -> String {
    let convert = |ms: f64| match units {
        UnitSystem::Metric => r0(ms_to_kmh(ms)),
        UnitSystem::Imperial => r0(kmh_to_mph(ms_to_kmh(ms))),
    };
    let speed = convert(speed_ms);
    match gust_ms.map(convert) {
        Some(gust) if gust > speed => format!("w{}-{}", speed, gust),
        _ => format!("w{}", speed),
    }
}

fn rating_field(rating: DangerRating, alert: bool) -> String {
    if alert {
        format!("{}!", rating.as_str())
    } else {
        rating.as_str().to_string()
    }
}

/// Render one forecast slot as a single atomic line.
fn slot_line(slot: &ForecastSlot, horizon: Horizon, units: UnitSystem) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(9);
    parts.push(slot_label(slot.time, horizon));
    parts.push(temp_field(slot.temperature_c, units));

    if let Some(p) = slot.precipitation_probability_pct {
        parts.push(format!("r{}%", r0(p)));
    }
    if slot.precipitation_mm >= 0.05 {
        parts.push(match units {
            UnitSystem::Metric => format!("{:.1}mm", slot.precipitation_mm),
            UnitSystem::Imperial => format!("{:.2}in", mm_to_inches(slot.precipitation_mm)),
        });
    }

    parts.push(wind_field(slot.wind_speed_ms, slot.wind_gust_ms, units));
    parts.push(format!("c{}", r0(slot.cloud_cover_pct)));

    if let Some(cb) = slot.cloud_base_m {
        parts.push(format!("b{}", hundreds(cb, units)));
    }
    if let Some(fl) = slot.freezing_level_m {
        parts.push(format!("f{}", hundreds(fl, units)));
    }

    parts.push(rating_field(slot.rating, slot.alert));
    parts.join(" ")
}

/// Render a full waypoint forecast into ordered segments.
pub fn format_forecast(
    forecast: &WaypointForecast,
    units: UnitSystem,
    budget: &SegmentBudget,
) -> Result<Vec<String>, AppError> {
    let elevation = match units {
        UnitSystem::Metric => format!("{}m", r0(forecast.elevation_m)),
        UnitSystem::Imperial => format!("{}ft", r0(metres_to_feet(forecast.elevation_m))),
    };

    let mut lines = Vec::with_capacity(forecast.slots.len() + 1);
    lines.push(format!(
        "{} {} {}",
        forecast.code,
        elevation,
        forecast.horizon.as_str()
    ));
    for slot in &forecast.slots {
        lines.push(slot_line(slot, forecast.horizon, units));
    }

    format_lines(&lines, budget)
}

/// Per-waypoint summary used for the scheduled push and route-wide casts.
#[derive(Debug, Clone)]
pub struct DigestEntry {
    pub code: String,
    pub temperature_c: f64,
    pub max_precip_probability_pct: Option<f64>,
    pub max_wind_ms: f64,
    pub max_rating: DangerRating,
    pub alert: bool,
    pub available: bool,
}

impl DigestEntry {
    pub fn from_forecast(forecast: &WaypointForecast) -> Self {
        let max_wind_ms = forecast
            .slots
            .iter()
            .map(|s| s.wind_gust_ms.map(|g| g.max(s.wind_speed_ms)).unwrap_or(s.wind_speed_ms))
            .fold(0.0_f64, f64::max);
        let max_precip_probability_pct = forecast
            .slots
            .iter()
            .filter_map(|s| s.precipitation_probability_pct)
            .fold(None::<f64>, |acc, p| Some(acc.map_or(p, |a| a.max(p))));

        Self {
            code: forecast.code.clone(),
            temperature_c: forecast.slots.first().map(|s| s.temperature_c).unwrap_or(0.0),
            max_precip_probability_pct,
            max_wind_ms,
            max_rating: forecast.max_rating(),
            alert: forecast.has_alert(),
            available: !forecast.slots.is_empty(),
        }
    }

    /// Placeholder for a waypoint whose provider fetch failed.
    pub fn unavailable(code: &str) -> Self {
        Self {
            code: code.to_string(),
            temperature_c: 0.0,
            max_precip_probability_pct: None,
            max_wind_ms: 0.0,
            max_rating: DangerRating::D0,
            alert: false,
            available: false,
        }
    }
}

fn digest_line(entry: &DigestEntry, units: UnitSystem) -> String {
    if !entry.available {
        return format!("{} n/a", entry.code);
    }
    let mut parts = vec![
        entry.code.clone(),
        temp_field(entry.temperature_c, units),
    ];
    if let Some(p) = entry.max_precip_probability_pct {
        parts.push(format!("r{}%", r0(p)));
    }
    parts.push(wind_field(entry.max_wind_ms, None, units));
    parts.push(rating_field(entry.max_rating, entry.alert));
    parts.join(" ")
}

/// Render the route digest: one worst-case line per waypoint.
pub fn format_digest(
    date: DateTime<Utc>,
    entries: &[DigestEntry],
    units: UnitSystem,
    budget: &SegmentBudget,
) -> Result<Vec<String>, AppError> {
    let mut lines = Vec::with_capacity(entries.len() + 1);
    lines.push(format!("TrailCast {}", date.format("%d%b")));
    for entry in entries {
        lines.push(digest_line(entry, units));
    }
    format_lines(&lines, budget)
}

/// Render an out-of-band severe-weather notice for the alerting waypoints.
pub fn format_severe(
    date: DateTime<Utc>,
    entries: &[DigestEntry],
    units: UnitSystem,
    budget: &SegmentBudget,
) -> Result<Vec<String>, AppError> {
    let mut lines = Vec::with_capacity(entries.len() + 1);
    lines.push(format!("! WEATHER ALERT {}", date.format("%d%b")));
    for entry in entries.iter().filter(|e| e.alert) {
        lines.push(digest_line(entry, units));
    }
    format_lines(&lines, budget)
}

/// Pack atomic lines into segments.
///
/// Single segment when everything fits; otherwise greedy line packing with
/// `i/n ` page prefixes. Trailing lines that would exceed the segment cap
/// are dropped (logged), so a reply never exceeds the configured maximum.
/// A single line wider than a segment is a `FormatOverflow` — corrupt input,
/// fatal to this send.
pub fn format_lines(lines: &[String], budget: &SegmentBudget) -> Result<Vec<String>, AppError> {
    if lines.is_empty() {
        return Ok(Vec::new());
    }

    let single = lines.join("\n");
    if single.chars().count() <= budget.max_chars {
        return Ok(vec![single]);
    }

    let capacity = budget.max_chars.saturating_sub(PAGE_PREFIX_RESERVE);
    if let Some(line) = lines.iter().find(|l| l.chars().count() > capacity) {
        return Err(AppError::FormatOverflow(format!(
            "line wider than a segment ({} > {} chars): '{}'",
            line.chars().count(),
            capacity,
            line
        )));
    }

    let mut segments: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut dropped = 0usize;

    for line in lines {
        if current.is_empty() {
            current = line.clone();
        } else if current.chars().count() + 1 + line.chars().count() <= capacity {
            current.push('\n');
            current.push_str(line);
        } else if segments.len() + 1 < budget.max_segments {
            segments.push(std::mem::take(&mut current));
            current = line.clone();
        } else {
            dropped += 1;
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }

    if dropped > 0 {
        tracing::debug!(
            "Dropped {} trailing forecast lines to fit {} segments",
            dropped,
            budget.max_segments
        );
    }

    let total = segments.len();
    Ok(segments
        .into_iter()
        .enumerate()
        .map(|(i, s)| format!("{}/{} {}", i + 1, total, s))
        .collect())
}

/// Word-wrap a plain reply (confirmations, help, errors) into segments.
/// Total: overlong words are hard-split rather than erroring.
pub fn format_reply(text: &str, budget: &SegmentBudget) -> Vec<String> {
    let text = text.trim();
    if text.chars().count() <= budget.max_chars {
        return vec![text.to_string()];
    }

    let capacity = budget.max_chars.saturating_sub(PAGE_PREFIX_RESERVE).max(1);
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word.to_string();
        while word.chars().count() > capacity {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.push(word.chars().take(capacity).collect());
            word = word.chars().skip(capacity).collect();
        }
        if current.is_empty() {
            current = word;
        } else if current.chars().count() + 1 + word.chars().count() <= capacity {
            current.push(' ');
            current.push_str(&word);
        } else {
            chunks.push(std::mem::take(&mut current));
            current = word;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks.truncate(budget.max_segments);
    let total = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, c)| format!("{}/{} {}", i + 1, total, c))
        .collect()
}
