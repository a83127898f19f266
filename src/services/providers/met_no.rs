//! MET Norway Locationforecast 2.0 client.
//!
//! National service for Norwegian coordinates.
//! See: https://api.met.no/weatherapi/locationforecast/2.0/documentation

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::AppError;
use crate::services::providers::{
    estimate_cloud_base, estimate_freezing_level, ProviderKind, RawForecast, RawWindow,
};

const MET_NO_BASE_URL: &str = "https://api.met.no";
const MET_NO_PATH: &str = "/weatherapi/locationforecast/2.0/complete";

/// Client for the met.no Locationforecast API.
#[derive(Debug, Clone)]
pub struct MetNoClient {
    client: reqwest::Client,
    user_agent: String,
    base_url: String,
}

// --- met.no JSON response types ---

#[derive(Debug, Deserialize)]
struct MetNoResponse {
    geometry: Option<MetNoGeometry>,
    properties: MetNoProperties,
}

#[derive(Debug, Deserialize)]
struct MetNoGeometry {
    /// [lon, lat, altitude]
    coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct MetNoProperties {
    timeseries: Vec<MetNoTimeseries>,
}

#[derive(Debug, Deserialize)]
struct MetNoTimeseries {
    time: String,
    data: MetNoData,
}

#[derive(Debug, Deserialize)]
struct MetNoData {
    instant: MetNoInstant,
    next_1_hours: Option<MetNoPeriod>,
    next_6_hours: Option<MetNoPeriod>,
}

#[derive(Debug, Deserialize)]
struct MetNoInstant {
    details: MetNoInstantDetails,
}

#[derive(Debug, Deserialize)]
struct MetNoInstantDetails {
    air_temperature: Option<f64>,
    wind_speed: Option<f64>,
    wind_speed_of_gust: Option<f64>,
    cloud_area_fraction: Option<f64>,
    dew_point_temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MetNoPeriod {
    details: Option<MetNoPeriodDetails>,
}

#[derive(Debug, Deserialize)]
struct MetNoPeriodDetails {
    precipitation_amount: Option<f64>,
    probability_of_precipitation: Option<f64>,
}

impl MetNoClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            user_agent: user_agent.to_string(),
            base_url: MET_NO_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different host (tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Fetch and normalize the full timeseries for a location.
    ///
    /// met.no models the terrain height itself; it is echoed back in the
    /// response geometry and carried as the model elevation.
    pub async fn fetch(&self, lat: f64, lon: f64) -> Result<RawForecast, AppError> {
        // Limit to 4 decimal places per met.no terms of service
        let url = format!(
            "{}{}?lat={:.4}&lon={:.4}",
            self.base_url, MET_NO_PATH, lat, lon
        );

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("met.no request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Provider(format!(
                "met.no returned HTTP {}",
                response.status()
            )));
        }

        let body: MetNoResponse = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("met.no JSON parse error: {}", e)))?;

        normalize(body)
    }
}

/// Convert a met.no response into the provider-agnostic shape.
fn normalize(body: MetNoResponse) -> Result<RawForecast, AppError> {
    if body.properties.timeseries.is_empty() {
        return Err(AppError::Provider(
            "met.no returned empty timeseries".to_string(),
        ));
    }

    let model_elevation_m = body
        .geometry
        .as_ref()
        .and_then(|g| g.coordinates.get(2))
        .copied();
    let model_elevation = model_elevation_m.unwrap_or(0.0);

    let mut windows = Vec::with_capacity(body.properties.timeseries.len());
    for entry in &body.properties.timeseries {
        let Ok(time) = DateTime::parse_from_rfc3339(&entry.time) else {
            tracing::warn!("met.no entry with unparseable time '{}', skipping", entry.time);
            continue;
        };

        let instant = &entry.data.instant.details;
        // Prefer next_1_hours, fall back to next_6_hours
        let period = entry
            .data
            .next_1_hours
            .as_ref()
            .or(entry.data.next_6_hours.as_ref())
            .and_then(|p| p.details.as_ref());

        let temperature_c = instant.air_temperature.unwrap_or(0.0);
        let cloud_cover_pct = instant.cloud_area_fraction.unwrap_or(0.0);

        windows.push(RawWindow {
            time: time.with_timezone(&Utc),
            temperature_c,
            precipitation_mm: period.and_then(|p| p.precipitation_amount).unwrap_or(0.0),
            precipitation_probability_pct: period.and_then(|p| p.probability_of_precipitation),
            wind_speed_ms: instant.wind_speed.unwrap_or(0.0),
            wind_gust_ms: instant.wind_speed_of_gust,
            cloud_cover_pct,
            cloud_base_m: estimate_cloud_base(
                model_elevation,
                temperature_c,
                instant.dew_point_temperature,
                cloud_cover_pct,
            ),
            freezing_level_m: Some(estimate_freezing_level(model_elevation, temperature_c)),
        });
    }

    Ok(RawForecast {
        provider: ProviderKind::MetNo,
        model_elevation_m,
        windows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_body() -> serde_json::Value {
        json!({
            "type": "Feature",
            "geometry": {
                "type": "Point",
                "coordinates": [8.31, 61.63, 1450.0]
            },
            "properties": {
                "timeseries": [
                    {
                        "time": "2026-08-06T06:00:00Z",
                        "data": {
                            "instant": {
                                "details": {
                                    "air_temperature": 4.0,
                                    "wind_speed": 6.5,
                                    "wind_speed_of_gust": 12.0,
                                    "cloud_area_fraction": 85.0,
                                    "dew_point_temperature": 2.0
                                }
                            },
                            "next_1_hours": {
                                "details": {
                                    "precipitation_amount": 1.2,
                                    "probability_of_precipitation": 65.0
                                }
                            }
                        }
                    },
                    {
                        "time": "2026-08-06T07:00:00Z",
                        "data": {
                            "instant": {
                                "details": {
                                    "air_temperature": 5.0,
                                    "wind_speed": 5.0,
                                    "cloud_area_fraction": 20.0,
                                    "dew_point_temperature": 1.0
                                }
                            },
                            "next_6_hours": {
                                "details": {
                                    "precipitation_amount": 0.4
                                }
                            }
                        }
                    }
                ]
            }
        })
    }

    #[tokio::test]
    async fn test_fetch_normalizes_timeseries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weatherapi/locationforecast/2.0/complete"))
            .and(query_param("lat", "61.6300"))
            .and(header("user-agent", "test-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
            .mount(&server)
            .await;

        let client =
            MetNoClient::new("test-agent", Duration::from_secs(2)).with_base_url(&server.uri());
        let raw = client.fetch(61.63, 8.31).await.unwrap();

        assert_eq!(raw.provider, ProviderKind::MetNo);
        assert_eq!(raw.model_elevation_m, Some(1450.0));
        assert_eq!(raw.windows.len(), 2);

        let first = &raw.windows[0];
        assert_eq!(first.temperature_c, 4.0);
        assert_eq!(first.precipitation_mm, 1.2);
        assert_eq!(first.precipitation_probability_pct, Some(65.0));
        assert_eq!(first.wind_gust_ms, Some(12.0));
        // 85% cloud + 2 °C spread → cloud base at 1450 + 250
        assert_eq!(first.cloud_base_m, Some(1700.0));
        // Freezing level from 4 °C at 1450 m
        assert!((first.freezing_level_m.unwrap() - (1450.0 + 4.0 / 0.0065)).abs() < 0.1);

        let second = &raw.windows[1];
        // next_6_hours fallback, clear sky → no cloud base
        assert_eq!(second.precipitation_mm, 0.4);
        assert_eq!(second.cloud_base_m, None);
    }

    #[tokio::test]
    async fn test_non_2xx_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = MetNoClient::new("test", Duration::from_secs(2)).with_base_url(&server.uri());
        let result = client.fetch(61.63, 8.31).await;
        assert!(matches!(result, Err(AppError::Provider(_))));
    }

    #[tokio::test]
    async fn test_empty_timeseries_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "properties": { "timeseries": [] }
            })))
            .mount(&server)
            .await;

        let client = MetNoClient::new("test", Duration::from_secs(2)).with_base_url(&server.uri());
        let result = client.fetch(61.63, 8.31).await;
        assert!(matches!(result, Err(AppError::Provider(_))));
    }
}
