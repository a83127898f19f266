//! Weather providers: per-country clients, normalization, routing, fallback.
//!
//! Every client normalizes its upstream payload into `RawForecast` so the
//! rest of the pipeline is provider-agnostic. The router picks the primary
//! provider for the detected country, retries a failed fetch once, falls
//! back to the global Open-Meteo model, and serves results through the
//! shared single-flight cache.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::AppError;
use crate::services::cache::{CacheKey, ForecastCache};
use crate::services::elevation::LAPSE_RATE_C_PER_M;

pub mod met_no;
pub mod nws;
pub mod open_meteo;

pub use met_no::MetNoClient;
pub use nws::NwsClient;
pub use open_meteo::OpenMeteoClient;

/// Which data source produced a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProviderKind {
    MetNo,
    Nws,
    OpenMeteo,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::MetNo => "met.no",
            ProviderKind::Nws => "nws",
            ProviderKind::OpenMeteo => "open-meteo",
        }
    }
}

/// Forecast horizon requested by a user or the push schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Horizon {
    /// Next 12 hours (CAST12).
    Half,
    /// Next 24 hours (CAST).
    Short,
    /// Next 7 days (CAST7).
    Week,
}

impl Horizon {
    pub fn hours(&self) -> i64 {
        match self {
            Horizon::Half => 12,
            Horizon::Short => 24,
            Horizon::Week => 168,
        }
    }

    /// Days of data to request upstream. One extra day for the short
    /// horizons so a late-evening request still covers its full span.
    pub fn forecast_days(&self) -> u8 {
        match self {
            Horizon::Half | Horizon::Short => 2,
            Horizon::Week => 7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Horizon::Half => "12h",
            Horizon::Short => "24h",
            Horizon::Week => "7d",
        }
    }
}

/// One provider-normalized forecast window (hourly, or 3-hourly for the
/// far end of some providers' timeseries).
#[derive(Debug, Clone, PartialEq)]
pub struct RawWindow {
    pub time: DateTime<Utc>,
    pub temperature_c: f64,
    pub precipitation_mm: f64,
    pub precipitation_probability_pct: Option<f64>,
    pub wind_speed_ms: f64,
    pub wind_gust_ms: Option<f64>,
    pub cloud_cover_pct: f64,
    /// Cloud-base altitude above sea level, meters.
    pub cloud_base_m: Option<f64>,
    /// Freezing-level altitude above sea level, meters.
    pub freezing_level_m: Option<f64>,
}

/// A normalized forecast for one location.
#[derive(Debug, Clone)]
pub struct RawForecast {
    pub provider: ProviderKind,
    /// Terrain height of the provider's model cell, when reported.
    pub model_elevation_m: Option<f64>,
    pub windows: Vec<RawWindow>,
}

/// Estimate the freezing-level altitude from the modeled surface temperature
/// and the standard lapse rate, for providers that don't report it.
pub(crate) fn estimate_freezing_level(model_elevation_m: f64, temperature_c: f64) -> f64 {
    (model_elevation_m + temperature_c / LAPSE_RATE_C_PER_M).max(0.0)
}

/// Estimate the cloud-base altitude via the lifting condensation level
/// (~125 m per °C of temperature/dew-point spread). Only meaningful under
/// significant cloud cover; returns None below 50%.
pub(crate) fn estimate_cloud_base(
    model_elevation_m: f64,
    temperature_c: f64,
    dew_point_c: Option<f64>,
    cloud_cover_pct: f64,
) -> Option<f64> {
    if cloud_cover_pct < 50.0 {
        return None;
    }
    let spread = (temperature_c - dew_point_c?).max(0.0);
    Some(model_elevation_m + 125.0 * spread)
}

/// Routes forecast fetches to provider clients with retry, fallback, and
/// cached single-flight results.
pub struct ProviderRouter {
    met_no: MetNoClient,
    nws: NwsClient,
    open_meteo: OpenMeteoClient,
    cache: ForecastCache,
}

impl ProviderRouter {
    pub fn new(user_agent: &str, timeout: Duration, cache_ttl: Duration) -> Self {
        Self::from_parts(
            MetNoClient::new(user_agent, timeout),
            NwsClient::new(user_agent, timeout),
            OpenMeteoClient::new(user_agent, timeout),
            cache_ttl,
        )
    }

    pub fn from_parts(
        met_no: MetNoClient,
        nws: NwsClient,
        open_meteo: OpenMeteoClient,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            met_no,
            nws,
            open_meteo,
            cache: ForecastCache::new(cache_ttl),
        }
    }

    /// Fetch a forecast for a zone, going through the cache.
    ///
    /// Policy: primary provider, one retry; then the global fallback, one
    /// retry; then `AppError::Provider` up to the dispatcher, which decides
    /// between a degraded-service reply and a silent skip.
    pub async fn fetch_forecast(
        &self,
        zone: &str,
        lat: f64,
        lon: f64,
        horizon: Horizon,
        primary: ProviderKind,
        now: DateTime<Utc>,
    ) -> Result<Arc<RawForecast>, AppError> {
        let key = CacheKey::new(zone, horizon, now);
        self.cache
            .get_or_fetch(key, || async move {
                match self.fetch_with_retry(primary, lat, lon, horizon).await {
                    Ok(raw) => Ok(raw),
                    Err(err) if primary != ProviderKind::OpenMeteo => {
                        tracing::warn!(
                            "Provider {} failed for zone {}, falling back to {}: {}",
                            primary.as_str(),
                            zone,
                            ProviderKind::OpenMeteo.as_str(),
                            err
                        );
                        self.fetch_with_retry(ProviderKind::OpenMeteo, lat, lon, horizon)
                            .await
                    }
                    Err(err) => Err(err),
                }
            })
            .await
    }

    async fn fetch_with_retry(
        &self,
        provider: ProviderKind,
        lat: f64,
        lon: f64,
        horizon: Horizon,
    ) -> Result<RawForecast, AppError> {
        match self.fetch_once(provider, lat, lon, horizon).await {
            Ok(raw) => Ok(raw),
            Err(first) => {
                tracing::debug!(
                    "Provider {} fetch failed, retrying once: {}",
                    provider.as_str(),
                    first
                );
                self.fetch_once(provider, lat, lon, horizon).await
            }
        }
    }

    async fn fetch_once(
        &self,
        provider: ProviderKind,
        lat: f64,
        lon: f64,
        horizon: Horizon,
    ) -> Result<RawForecast, AppError> {
        match provider {
            ProviderKind::MetNo => self.met_no.fetch(lat, lon).await,
            ProviderKind::Nws => self.nws.fetch(lat, lon).await,
            ProviderKind::OpenMeteo => self.open_meteo.fetch(lat, lon, horizon).await,
        }
    }

    /// Drop expired cache entries (called from the severe-weather poll).
    pub async fn prune_cache(&self) {
        self.cache.prune_expired().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_horizon_hours() {
        assert_eq!(Horizon::Half.hours(), 12);
        assert_eq!(Horizon::Short.hours(), 24);
        assert_eq!(Horizon::Week.hours(), 168);
    }

    #[test]
    fn test_estimate_freezing_level() {
        // 5 °C at 1000 m → freezing at 1000 + 5/0.0065 ≈ 1769 m
        let fl = estimate_freezing_level(1000.0, 5.0);
        assert!((fl - 1769.2).abs() < 0.1, "got {}", fl);
    }

    #[test]
    fn test_estimate_freezing_level_subzero_clamps_at_ground() {
        // −10 °C at 500 m → raw estimate is far below sea level, clamped to 0
        assert_eq!(estimate_freezing_level(500.0, -10.0), 0.0);
    }

    #[test]
    fn test_estimate_cloud_base_needs_cloud() {
        assert_eq!(estimate_cloud_base(500.0, 10.0, Some(8.0), 20.0), None);
    }

    #[test]
    fn test_estimate_cloud_base_lcl() {
        // 2 °C spread → 250 m above model terrain
        let cb = estimate_cloud_base(500.0, 10.0, Some(8.0), 80.0).unwrap();
        assert!((cb - 750.0).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_cloud_base_no_dew_point() {
        assert_eq!(estimate_cloud_base(500.0, 10.0, None, 80.0), None);
    }

    fn open_meteo_body() -> serde_json::Value {
        json!({
            "elevation": 850.0,
            "hourly": {
                "time": ["2026-08-06T06:00", "2026-08-06T07:00"],
                "temperature_2m": [4.0, 5.0],
                "dewpoint_2m": [2.0, 2.5],
                "precipitation": [0.0, 0.3],
                "precipitation_probability": [10.0, 30.0],
                "windspeed_10m": [3.0, 4.0],
                "windgusts_10m": [6.0, 7.0],
                "cloudcover": [40.0, 80.0],
                "freezing_level_height": [2400.0, 2300.0]
            }
        })
    }

    async fn router_against(nws_server: &MockServer, om_server: &MockServer) -> ProviderRouter {
        ProviderRouter::from_parts(
            MetNoClient::new("test", Duration::from_secs(2)),
            NwsClient::new("test", Duration::from_secs(2)).with_base_url(&nws_server.uri()),
            OpenMeteoClient::new("test", Duration::from_secs(2)).with_base_url(&om_server.uri()),
            Duration::from_secs(3600),
        )
    }

    #[tokio::test]
    async fn test_fallback_to_open_meteo_when_primary_down() {
        let nws_server = MockServer::start().await;
        let om_server = MockServer::start().await;

        // Primary down: initial attempt + one retry
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&nws_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(open_meteo_body()))
            .expect(1)
            .mount(&om_server)
            .await;

        let router = router_against(&nws_server, &om_server).await;
        let raw = router
            .fetch_forecast("Z1", 37.7, -119.5, Horizon::Short, ProviderKind::Nws, Utc::now())
            .await
            .unwrap();

        assert_eq!(raw.provider, ProviderKind::OpenMeteo);
        assert_eq!(raw.windows.len(), 2);
    }

    #[tokio::test]
    async fn test_second_fetch_within_ttl_is_cached() {
        let nws_server = MockServer::start().await;
        let om_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(open_meteo_body()))
            .expect(1)
            .mount(&om_server)
            .await;

        let router = router_against(&nws_server, &om_server).await;
        let now = Utc::now();
        for _ in 0..2 {
            router
                .fetch_forecast("Z1", 46.5, 8.5, Horizon::Short, ProviderKind::OpenMeteo, now)
                .await
                .unwrap();
        }
        // expect(1) on the mock asserts exactly one upstream call on drop
    }

    #[tokio::test]
    async fn test_both_providers_down_is_provider_error() {
        let nws_server = MockServer::start().await;
        let om_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&nws_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&om_server)
            .await;

        let router = router_against(&nws_server, &om_server).await;
        let result = router
            .fetch_forecast("Z1", 37.7, -119.5, Horizon::Short, ProviderKind::Nws, Utc::now())
            .await;

        assert!(matches!(result, Err(AppError::Provider(_))));
    }
}
