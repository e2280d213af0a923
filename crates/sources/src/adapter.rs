//! Weather provider adapters.
//!
//! Each provider is one variant of [`SourceAdapter`]. A fetch issues exactly
//! one GET with the configured timeout and either returns the decoded JSON
//! body or fails with `EtlError::SourceUnavailable`. There is no retry here.

use reqwest::{Client, Response};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use weather_common::{EtlError, EtlResult, WeatherSource};

use crate::config::SourcesConfig;

/// Raw provider response, tagged with the source that produced it.
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub source: WeatherSource,
    pub body: Value,
}

/// MET Norway locationforecast adapter.
#[derive(Debug, Clone)]
pub struct YrNoAdapter {
    client: Client,
    url: String,
}

/// Open-Meteo hourly forecast adapter.
#[derive(Debug, Clone)]
pub struct OpenMeteoAdapter {
    client: Client,
    url: String,
    timezone: String,
}

/// A weather provider, dispatched by variant.
#[derive(Debug, Clone)]
pub enum SourceAdapter {
    YrNo(YrNoAdapter),
    OpenMeteo(OpenMeteoAdapter),
}

/// Build the HTTP client used by every adapter.
pub(crate) fn build_client(config: &SourcesConfig) -> EtlResult<Client> {
    Client::builder()
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| EtlError::InternalError(format!("Failed to create HTTP client: {}", e)))
}

impl SourceAdapter {
    /// Adapter for one provider.
    pub fn new(source: WeatherSource, config: &SourcesConfig) -> EtlResult<Self> {
        let client = build_client(config)?;
        Ok(Self::with_client(source, config, client))
    }

    /// Adapter sharing an existing client.
    pub fn with_client(source: WeatherSource, config: &SourcesConfig, client: Client) -> Self {
        match source {
            WeatherSource::YrNo => SourceAdapter::YrNo(YrNoAdapter {
                client,
                url: config.yr_no_url.clone(),
            }),
            WeatherSource::OpenMeteo => SourceAdapter::OpenMeteo(OpenMeteoAdapter {
                client,
                url: config.open_meteo_url.clone(),
                timezone: config.open_meteo_timezone.clone(),
            }),
        }
    }

    /// Adapters for every known provider, in `WeatherSource::ALL` order.
    pub fn all(config: &SourcesConfig) -> EtlResult<Vec<Self>> {
        let client = build_client(config)?;
        Ok(WeatherSource::ALL
            .iter()
            .map(|&source| Self::with_client(source, config, client.clone()))
            .collect())
    }

    pub fn source(&self) -> WeatherSource {
        match self {
            SourceAdapter::YrNo(_) => WeatherSource::YrNo,
            SourceAdapter::OpenMeteo(_) => WeatherSource::OpenMeteo,
        }
    }

    /// Fetch the raw forecast payload for a coordinate pair.
    #[instrument(skip(self), fields(source = %self.source()))]
    pub async fn fetch(&self, lat: f64, lon: f64) -> EtlResult<RawPayload> {
        let source = self.source();

        let request = match self {
            SourceAdapter::YrNo(yr) => yr
                .client
                .get(&yr.url)
                .query(&[("lat", lat), ("lon", lon)]),
            SourceAdapter::OpenMeteo(om) => om.client.get(&om.url).query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("hourly", "temperature_2m,precipitation".to_string()),
                ("timezone", om.timezone.clone()),
            ]),
        };

        debug!("Requesting forecast");

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(source.as_str(), e))?;

        let body = decode_json(source.as_str(), response).await?;

        info!(lat, lon, "Fetched forecast payload");
        Ok(RawPayload { source, body })
    }
}

/// Check the status and decode a JSON body, mapping every failure to
/// `SourceUnavailable` for `provider`.
pub(crate) async fn decode_json(provider: &str, response: Response) -> EtlResult<Value> {
    let status = response.status();
    if !status.is_success() {
        warn!(provider, status = %status, "Provider returned non-success status");
        return Err(EtlError::source_unavailable(
            provider,
            format!("HTTP {}", status),
        ));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| transport_error(provider, e))
}

pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> EtlError {
    let cause = if err.is_timeout() {
        format!("request timed out: {}", err)
    } else if err.is_decode() {
        format!("invalid response body: {}", err)
    } else {
        err.to_string()
    };
    warn!(provider, cause = %cause, "Provider request failed");
    EtlError::source_unavailable(provider, cause)
}
