use chrono::NaiveTime;

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// Base URL of the external SMS gateway (outbound sends).
    pub gateway_url: String,
    /// Optional bearer token for the SMS gateway.
    pub gateway_token: Option<String>,
    /// User-Agent sent to weather providers (met.no requires an identifying one).
    pub provider_user_agent: String,
    pub port: u16,
    /// Weather-zone grid cell size in degrees.
    pub grid_size_deg: f64,
    /// Provider response cache TTL in seconds.
    pub cache_ttl_secs: u64,
    /// Per-request timeout for provider and gateway calls, seconds.
    pub http_timeout_secs: u64,
    /// Single-segment character budget of the SMS gateway.
    pub segment_chars: usize,
    /// Maximum segments per outbound message.
    pub max_segments: usize,
    /// UTC times of the twice-daily push.
    pub push_times: Vec<NaiveTime>,
    /// Severe-weather poll interval in seconds.
    pub severe_poll_secs: u64,
    /// Wind factor threshold, km/h.
    pub wind_threshold_kmh: f64,
    /// Precipitation factor threshold, mm per window.
    pub precip_threshold_mm: f64,
    /// Danger level (0..=4) at or above which a slot is flagged for alerting.
    pub alert_level: u8,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            gateway_url: std::env::var("SMS_GATEWAY_URL")
                .unwrap_or_else(|_| "http://localhost:9090".to_string()),
            gateway_token: std::env::var("SMS_GATEWAY_TOKEN").ok(),
            provider_user_agent: std::env::var("PROVIDER_USER_AGENT")
                .unwrap_or_else(|_| "TrailCast/0.1 ops@trailcast.example".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("PORT must be a valid u16"),
            grid_size_deg: env_f64("ZONE_GRID_DEG", 0.25),
            cache_ttl_secs: env_u64("FORECAST_CACHE_TTL_SECS", 3600),
            http_timeout_secs: env_u64("HTTP_TIMEOUT_SECS", 10),
            segment_chars: env_u64("SMS_SEGMENT_CHARS", 160) as usize,
            max_segments: env_u64("SMS_MAX_SEGMENTS", 6) as usize,
            push_times: parse_push_times(
                &std::env::var("PUSH_TIMES_UTC").unwrap_or_else(|_| "06:00,18:00".to_string()),
            ),
            severe_poll_secs: env_u64("SEVERE_POLL_SECS", 900),
            wind_threshold_kmh: env_f64("WIND_THRESHOLD_KMH", 40.0),
            precip_threshold_mm: env_f64("PRECIP_THRESHOLD_MM", 10.0),
            alert_level: env_u64("ALERT_LEVEL", 3) as u8,
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .map(|v| v.parse().unwrap_or_else(|_| panic!("{} must be a valid integer", name)))
        .unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .map(|v| v.parse().unwrap_or_else(|_| panic!("{} must be a valid number", name)))
        .unwrap_or(default)
}

/// Parse a comma-separated list of `HH:MM` times (UTC).
fn parse_push_times(raw: &str) -> Vec<NaiveTime> {
    let mut times: Vec<NaiveTime> = raw
        .split(',')
        .map(|part| {
            NaiveTime::parse_from_str(part.trim(), "%H:%M")
                .unwrap_or_else(|_| panic!("PUSH_TIMES_UTC entry '{}' must be HH:MM", part))
        })
        .collect();
    times.sort();
    times.dedup();
    times
}
