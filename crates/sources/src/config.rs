//! Adapter configuration.
//!
//! Endpoints and identification are passed into adapter construction, so
//! tests can point adapters at a mock server.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_YR_NO_URL: &str = "https://api.met.no/weatherapi/locationforecast/2.0/compact";
pub const DEFAULT_OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const DEFAULT_USER_AGENT: &str = "WeatherETL/1.0 (https://github.com/yourorg/weather-etl)";

/// Configuration shared by all source adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// MET Norway locationforecast endpoint
    pub yr_no_url: String,
    /// Open-Meteo forecast endpoint
    pub open_meteo_url: String,
    /// Open-Meteo geocoding search endpoint
    pub geocoding_url: String,
    /// Sent as `User-Agent`; MET Norway rejects anonymous clients
    pub user_agent: String,
    /// Whole-request timeout for a single fetch
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Timezone requested from Open-Meteo. Its timestamps come back without
    /// an offset, so this must stay `UTC` for them to normalize correctly.
    pub open_meteo_timezone: String,
    /// Maximum candidates requested from the geocoder
    pub geocoding_count: u32,
    pub geocoding_language: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            yr_no_url: DEFAULT_YR_NO_URL.to_string(),
            open_meteo_url: DEFAULT_OPEN_METEO_URL.to_string(),
            geocoding_url: DEFAULT_GEOCODING_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            open_meteo_timezone: "UTC".to_string(),
            geocoding_count: 10,
            geocoding_language: "en".to_string(),
        }
    }
}

impl SourcesConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let request_timeout = env::var("SOURCE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        Self {
            yr_no_url: env::var("YR_NO_BASE_URL").unwrap_or(defaults.yr_no_url),
            open_meteo_url: env::var("OPEN_METEO_BASE_URL").unwrap_or(defaults.open_meteo_url),
            geocoding_url: env::var("OPEN_METEO_GEOCODING_URL")
                .unwrap_or(defaults.geocoding_url),
            user_agent: env::var("USER_AGENT").unwrap_or(defaults.user_agent),
            request_timeout,
            ..defaults
        }
    }

    /// Point every endpoint at one base URL (mock servers in tests).
    pub fn with_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            yr_no_url: format!("{}/weatherapi/locationforecast/2.0/compact", base),
            open_meteo_url: format!("{}/v1/forecast", base),
            geocoding_url: format!("{}/v1/search", base),
            ..Self::default()
        }
    }
}
