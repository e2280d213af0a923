//! Location search against the Open-Meteo geocoding API.

use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument};

use weather_common::{EtlError, EtlResult, LocationCandidate};

use crate::adapter::{build_client, decode_json, transport_error};
use crate::config::SourcesConfig;

pub const GEOCODING_PROVIDER: &str = "geocoding";

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    admin1: Option<String>,
}

impl From<GeocodingResult> for LocationCandidate {
    fn from(result: GeocodingResult) -> Self {
        Self {
            name: result.name,
            lat: result.latitude,
            lon: result.longitude,
            country: result.country.unwrap_or_else(|| "Unknown".to_string()),
            region: result.admin1,
        }
    }
}

/// Free-text location search.
#[derive(Debug, Clone)]
pub struct LocationSearch {
    client: Client,
    url: String,
    count: u32,
    language: String,
}

impl LocationSearch {
    pub fn new(config: &SourcesConfig) -> EtlResult<Self> {
        Ok(Self {
            client: build_client(config)?,
            url: config.geocoding_url.clone(),
            count: config.geocoding_count,
            language: config.geocoding_language.clone(),
        })
    }

    /// Search for candidate locations matching `name`.
    ///
    /// A response without results is an empty list, not an error.
    #[instrument(skip(self))]
    pub async fn search(&self, name: &str) -> EtlResult<Vec<LocationCandidate>> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("name", name.to_string()),
                ("count", self.count.to_string()),
                ("language", self.language.clone()),
                ("format", "json".to_string()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(GEOCODING_PROVIDER, e))?;

        let body = decode_json(GEOCODING_PROVIDER, response).await?;

        let parsed: GeocodingResponse = serde_json::from_value(body).map_err(|e| {
            EtlError::source_unavailable(GEOCODING_PROVIDER, format!("unexpected response: {}", e))
        })?;

        let candidates: Vec<LocationCandidate> =
            parsed.results.into_iter().map(Into::into).collect();

        info!(count = candidates.len(), "Location search complete");
        Ok(candidates)
    }
}
