//! Open-Meteo client — the universal fallback model.
//!
//! Global coverage, no API key, and the only upstream that reports the
//! freezing-level altitude natively. Serves any country without a dedicated
//! national provider, and any request whose primary provider is down.
//! See: https://open-meteo.com/en/docs

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::errors::AppError;
use crate::services::providers::{
    estimate_cloud_base, Horizon, ProviderKind, RawForecast, RawWindow,
};

const OPEN_METEO_BASE_URL: &str = "https://api.open-meteo.com";

const HOURLY_FIELDS: &str = "temperature_2m,dewpoint_2m,precipitation,precipitation_probability,\
windspeed_10m,windgusts_10m,cloudcover,freezing_level_height";

/// Client for the api.open-meteo.com forecast API.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    user_agent: String,
    base_url: String,
}

// --- Open-Meteo JSON response types (parallel arrays keyed by time) ---

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    elevation: Option<f64>,
    hourly: OpenMeteoHourly,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoHourly {
    time: Vec<String>,
    temperature_2m: Option<Vec<Option<f64>>>,
    dewpoint_2m: Option<Vec<Option<f64>>>,
    precipitation: Option<Vec<Option<f64>>>,
    precipitation_probability: Option<Vec<Option<f64>>>,
    windspeed_10m: Option<Vec<Option<f64>>>,
    windgusts_10m: Option<Vec<Option<f64>>>,
    cloudcover: Option<Vec<Option<f64>>>,
    freezing_level_height: Option<Vec<Option<f64>>>,
}

fn series_at(series: &Option<Vec<Option<f64>>>, index: usize) -> Option<f64> {
    series.as_ref().and_then(|v| v.get(index).copied().flatten())
}

impl OpenMeteoClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            user_agent: user_agent.to_string(),
            base_url: OPEN_METEO_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different host (tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub async fn fetch(&self, lat: f64, lon: f64, horizon: Horizon) -> Result<RawForecast, AppError> {
        let url = format!(
            "{}/v1/forecast?latitude={:.4}&longitude={:.4}&hourly={}&wind_speed_unit=ms&timezone=UTC&forecast_days={}",
            self.base_url,
            lat,
            lon,
            HOURLY_FIELDS,
            horizon.forecast_days()
        );

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("open-meteo request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Provider(format!(
                "open-meteo returned HTTP {}",
                response.status()
            )));
        }

        let body: OpenMeteoResponse = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("open-meteo JSON parse error: {}", e)))?;

        normalize(body)
    }
}

fn normalize(body: OpenMeteoResponse) -> Result<RawForecast, AppError> {
    if body.hourly.time.is_empty() {
        return Err(AppError::Provider(
            "open-meteo returned empty hourly series".to_string(),
        ));
    }

    let model_elevation = body.elevation.unwrap_or(0.0);
    let hourly = &body.hourly;

    let mut windows = Vec::with_capacity(hourly.time.len());
    for (i, time_str) in hourly.time.iter().enumerate() {
        // timezone=UTC yields zone-less "2026-08-06T06:00" stamps
        let Ok(naive) = NaiveDateTime::parse_from_str(time_str, "%Y-%m-%dT%H:%M") else {
            tracing::warn!("open-meteo entry with unparseable time '{}', skipping", time_str);
            continue;
        };
        let time = DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc);

        // Rows with no temperature are model gaps; drop them rather than
        // inventing a 0 °C reading.
        let Some(temperature_c) = series_at(&hourly.temperature_2m, i) else {
            continue;
        };
        let cloud_cover_pct = series_at(&hourly.cloudcover, i).unwrap_or(0.0);

        windows.push(RawWindow {
            time,
            temperature_c,
            precipitation_mm: series_at(&hourly.precipitation, i).unwrap_or(0.0),
            precipitation_probability_pct: series_at(&hourly.precipitation_probability, i),
            wind_speed_ms: series_at(&hourly.windspeed_10m, i).unwrap_or(0.0),
            wind_gust_ms: series_at(&hourly.windgusts_10m, i),
            cloud_cover_pct,
            cloud_base_m: estimate_cloud_base(
                model_elevation,
                temperature_c,
                series_at(&hourly.dewpoint_2m, i),
                cloud_cover_pct,
            ),
            freezing_level_m: series_at(&hourly.freezing_level_height, i),
        });
    }

    if windows.is_empty() {
        return Err(AppError::Provider(
            "open-meteo returned no usable hourly rows".to_string(),
        ));
    }

    Ok(RawForecast {
        provider: ProviderKind::OpenMeteo,
        model_elevation_m: body.elevation,
        windows,
    })
}
