//! US National Weather Service client.
//!
//! Two-step API: `/points/{lat},{lon}` resolves the grid cell and hands back
//! the hourly forecast URL, which is then fetched and normalized. The hourly
//! product reports probability rather than amounts, and sky cover only
//! through the `shortForecast` phrase, so both are estimated from fixed
//! keyword tables.
//! See: https://api.weather.gov/openapi.json

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::AppError;
use crate::services::elevation::NOMINAL_MODEL_ELEVATION_M;
use crate::services::providers::{
    estimate_cloud_base, estimate_freezing_level, ProviderKind, RawForecast, RawWindow,
};

const NWS_BASE_URL: &str = "https://api.weather.gov";

const MPH_TO_MS: f64 = 0.44704;

/// Client for the api.weather.gov forecast API.
#[derive(Debug, Clone)]
pub struct NwsClient {
    client: reqwest::Client,
    user_agent: String,
    base_url: String,
}

// --- NWS JSON response types ---

#[derive(Debug, Deserialize)]
struct NwsPoints {
    properties: NwsPointsProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NwsPointsProperties {
    forecast_hourly: String,
}

#[derive(Debug, Deserialize)]
struct NwsForecast {
    properties: NwsForecastProperties,
}

#[derive(Debug, Deserialize)]
struct NwsForecastProperties {
    periods: Vec<NwsPeriod>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NwsPeriod {
    start_time: String,
    temperature: f64,
    temperature_unit: String,
    wind_speed: Option<String>,
    wind_gust: Option<String>,
    probability_of_precipitation: Option<NwsValue>,
    dewpoint: Option<NwsValue>,
    short_forecast: String,
}

#[derive(Debug, Deserialize)]
struct NwsValue {
    value: Option<f64>,
}

impl NwsClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            user_agent: user_agent.to_string(),
            base_url: NWS_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different host (tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub async fn fetch(&self, lat: f64, lon: f64) -> Result<RawForecast, AppError> {
        let points_url = format!("{}/points/{:.4},{:.4}", self.base_url, lat, lon);
        let points: NwsPoints = self.get_json(&points_url).await?;

        let forecast: NwsForecast = self.get_json(&points.properties.forecast_hourly).await?;
        normalize(forecast)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, AppError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("nws request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Provider(format!(
                "nws returned HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("nws JSON parse error: {}", e)))
    }
}

fn normalize(forecast: NwsForecast) -> Result<RawForecast, AppError> {
    if forecast.properties.periods.is_empty() {
        return Err(AppError::Provider("nws returned no periods".to_string()));
    }

    let mut windows = Vec::with_capacity(forecast.properties.periods.len());
    for period in &forecast.properties.periods {
        let Ok(time) = DateTime::parse_from_rfc3339(&period.start_time) else {
            tracing::warn!(
                "nws period with unparseable startTime '{}', skipping",
                period.start_time
            );
            continue;
        };

        let temperature_c = if period.temperature_unit.eq_ignore_ascii_case("F") {
            (period.temperature - 32.0) * 5.0 / 9.0
        } else {
            period.temperature
        };

        let pop = period
            .probability_of_precipitation
            .as_ref()
            .and_then(|v| v.value);
        let dew_point_c = period.dewpoint.as_ref().and_then(|v| v.value);
        let cloud_cover_pct = estimate_cloud_cover_pct(&period.short_forecast);

        windows.push(RawWindow {
            time: time.with_timezone(&Utc),
            temperature_c,
            precipitation_mm: estimate_precip_mm(pop, &period.short_forecast),
            precipitation_probability_pct: pop,
            wind_speed_ms: period
                .wind_speed
                .as_deref()
                .and_then(parse_wind_ms)
                .unwrap_or(0.0),
            wind_gust_ms: period.wind_gust.as_deref().and_then(parse_wind_ms),
            cloud_cover_pct,
            cloud_base_m: estimate_cloud_base(
                NOMINAL_MODEL_ELEVATION_M,
                temperature_c,
                dew_point_c,
                cloud_cover_pct,
            ),
            freezing_level_m: Some(estimate_freezing_level(
                NOMINAL_MODEL_ELEVATION_M,
                temperature_c,
            )),
        });
    }

    Ok(RawForecast {
        provider: ProviderKind::Nws,
        // The hourly product does not report the model terrain height.
        model_elevation_m: None,
        windows,
    })
}

/// Parse an NWS wind phrase ("10 mph", "10 to 20 mph") to m/s, taking the
/// upper bound of a range.
fn parse_wind_ms(phrase: &str) -> Option<f64> {
    let max_value = phrase
        .split_whitespace()
        .filter_map(|token| token.parse::<f64>().ok())
        .fold(None::<f64>, |acc, v| Some(acc.map_or(v, |a| a.max(v))))?;

    if phrase.to_lowercase().contains("km/h") {
        Some(max_value / 3.6)
    } else {
        // mph unless stated otherwise
        Some(max_value * MPH_TO_MS)
    }
}

/// Map an NWS `shortForecast` phrase to a cloud-cover estimate.
fn estimate_cloud_cover_pct(short_forecast: &str) -> f64 {
    let phrase = short_forecast.to_lowercase();
    if phrase.contains("mostly sunny") || phrase.contains("mostly clear") {
        25.0
    } else if phrase.contains("sunny") || phrase.contains("clear") {
        10.0
    } else if phrase.contains("partly") {
        50.0
    } else if phrase.contains("mostly cloudy") {
        75.0
    } else if phrase.contains("cloudy") || phrase.contains("overcast") || phrase.contains("fog") {
        95.0
    } else if ["rain", "snow", "storm", "showers", "sleet", "drizzle"]
        .iter()
        .any(|w| phrase.contains(w))
    {
        90.0
    } else {
        50.0
    }
}

/// Estimate a precipitation amount (mm per hour) from the forecast phrase's
/// intensity keywords scaled by the probability, since the hourly product
/// carries no quantitative precipitation.
fn estimate_precip_mm(pop_pct: Option<f64>, short_forecast: &str) -> f64 {
    let phrase = short_forecast.to_lowercase();
    let intensity = if phrase.contains("heavy") {
        4.0
    } else if phrase.contains("light") || phrase.contains("drizzle") || phrase.contains("slight") {
        0.5
    } else if ["rain", "snow", "showers", "storm", "sleet"]
        .iter()
        .any(|w| phrase.contains(w))
    {
        1.5
    } else {
        return 0.0;
    };

    intensity * pop_pct.unwrap_or(100.0).clamp(0.0, 100.0) / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_wind_single() {
        let ms = parse_wind_ms("10 mph").unwrap();
        assert!((ms - 4.4704).abs() < 1e-6);
    }

    #[test]
    fn test_parse_wind_range_takes_upper() {
        let ms = parse_wind_ms("10 to 20 mph").unwrap();
        assert!((ms - 8.9408).abs() < 1e-6);
    }

    #[test]
    fn test_parse_wind_kmh() {
        let ms = parse_wind_ms("36 km/h").unwrap();
        assert!((ms - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_wind_garbage() {
        assert_eq!(parse_wind_ms("calm"), None);
    }

    #[test]
    fn test_cloud_cover_keywords() {
        assert_eq!(estimate_cloud_cover_pct("Sunny"), 10.0);
        assert_eq!(estimate_cloud_cover_pct("Mostly Sunny"), 25.0);
        assert_eq!(estimate_cloud_cover_pct("Partly Cloudy"), 50.0);
        assert_eq!(estimate_cloud_cover_pct("Mostly Cloudy"), 75.0);
        assert_eq!(estimate_cloud_cover_pct("Cloudy"), 95.0);
        assert_eq!(estimate_cloud_cover_pct("Patchy Fog"), 95.0);
        assert_eq!(estimate_cloud_cover_pct("Rain Showers"), 90.0);
        assert_eq!(estimate_cloud_cover_pct("Hot"), 50.0);
    }

    #[test]
    fn test_precip_estimate() {
        assert_eq!(estimate_precip_mm(Some(100.0), "Heavy Rain"), 4.0);
        assert_eq!(estimate_precip_mm(Some(50.0), "Rain Showers"), 0.75);
        assert_eq!(estimate_precip_mm(Some(40.0), "Light Snow"), 0.2);
        assert_eq!(estimate_precip_mm(Some(80.0), "Sunny"), 0.0);
        assert_eq!(estimate_precip_mm(None, "Rain"), 1.5);
    }

    fn points_body(server_uri: &str) -> serde_json::Value {
        json!({
            "properties": {
                "forecastHourly": format!("{}/gridpoints/HNX/65,97/forecast/hourly", server_uri)
            }
        })
    }

    fn hourly_body() -> serde_json::Value {
        json!({
            "properties": {
                "periods": [
                    {
                        "startTime": "2026-08-06T06:00:00-07:00",
                        "temperature": 41.0,
                        "temperatureUnit": "F",
                        "windSpeed": "10 to 15 mph",
                        "windGust": "25 mph",
                        "probabilityOfPrecipitation": { "value": 60.0 },
                        "dewpoint": { "value": 3.0 },
                        "shortForecast": "Rain Showers"
                    }
                ]
            }
        })
    }

    #[tokio::test]
    async fn test_fetch_follows_points_and_normalizes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/points/37.7459,-119.5332"))
            .respond_with(ResponseTemplate::new(200).set_body_json(points_body(&server.uri())))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gridpoints/HNX/65,97/forecast/hourly"))
            .respond_with(ResponseTemplate::new(200).set_body_json(hourly_body()))
            .mount(&server)
            .await;

        let client = NwsClient::new("test", Duration::from_secs(2)).with_base_url(&server.uri());
        let raw = client.fetch(37.7459, -119.5332).await.unwrap();

        assert_eq!(raw.provider, ProviderKind::Nws);
        assert_eq!(raw.model_elevation_m, None);
        assert_eq!(raw.windows.len(), 1);

        let w = &raw.windows[0];
        // 41 °F = 5 °C
        assert!((w.temperature_c - 5.0).abs() < 1e-9);
        // Times come back in UTC
        assert_eq!(w.time, "2026-08-06T13:00:00Z".parse::<DateTime<Utc>>().unwrap());
        assert_eq!(w.precipitation_probability_pct, Some(60.0));
        assert!((w.wind_speed_ms - 15.0 * MPH_TO_MS).abs() < 1e-9);
        assert!((w.wind_gust_ms.unwrap() - 25.0 * MPH_TO_MS).abs() < 1e-9);
        assert_eq!(w.cloud_cover_pct, 90.0);
        // 60% of 1.5 mm/h
        assert!((w.precipitation_mm - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_points_failure_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = NwsClient::new("test", Duration::from_secs(2)).with_base_url(&server.uri());
        assert!(matches!(
            client.fetch(37.7459, -119.5332).await,
            Err(AppError::Provider(_))
        ));
    }
}
