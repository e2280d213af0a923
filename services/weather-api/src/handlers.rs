//! HTTP handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use etl::PipelineReport;
use weather_common::{
    parse_date, resolve_location, validate_coordinates, ConsensusObservation, EtlError,
    LocationCandidate, WeatherObservation, WeatherSource,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Minimum length of a location search term.
pub const MIN_SEARCH_LEN: usize = 2;

// ============================================================================
// Location parameters
// ============================================================================

/// Either a named location or an explicit coordinate pair.
#[derive(Debug, Default, Deserialize)]
pub struct LocationParams {
    pub location: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl LocationParams {
    /// Resolve to a validated `(lat, lon)`. A name takes precedence.
    pub fn resolve(&self) -> Result<(f64, f64), EtlError> {
        let (lat, lon) = match (&self.location, self.lat, self.lon) {
            (Some(name), _, _) => {
                resolve_location(name).ok_or_else(|| EtlError::UnknownLocation(name.clone()))?
            }
            (None, Some(lat), Some(lon)) => (lat, lon),
            _ => {
                return Err(EtlError::InvalidParameter {
                    param: "location".to_string(),
                    message: "Must provide location name or lat/lon".to_string(),
                })
            }
        };

        validate_coordinates(lat, lon)?;
        Ok((lat, lon))
    }
}

#[derive(Debug, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

// ============================================================================
// Current weather
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CurrentParams {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Serialize)]
pub struct SourceReading {
    pub source: WeatherSource,
    pub temperature: f64,
    pub precipitation: f64,
    pub timestamp: String,
}

impl From<&WeatherObservation> for SourceReading {
    fn from(obs: &WeatherObservation) -> Self {
        Self {
            source: obs.source,
            temperature: obs.temperature,
            precipitation: obs.precipitation,
            timestamp: weather_common::format_timestamp(&obs.timestamp),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CurrentWeatherResponse {
    pub location: Coordinates,
    pub average_temperature: f64,
    /// Consensus for the current hour, when one has been computed
    pub consensus: Option<ConsensusObservation>,
    pub sources: Vec<SourceReading>,
}

/// GET /api/v1/weather/current - Observations from the current hour on,
/// running the pipeline first if none are stored.
pub async fn current_weather_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<CurrentParams>,
) -> ApiResult<Json<CurrentWeatherResponse>> {
    let (lat, lon) = (params.lat, params.lon);
    validate_coordinates(lat, lon)?;

    let hour_start = Utc::now()
        .duration_trunc(Duration::hours(1))
        .map_err(|e| EtlError::InternalError(e.to_string()))?;

    let mut records = state.store.observations_since(lat, lon, hour_start).await?;
    if records.is_empty() {
        info!(lat, lon, "No data for current hour, running pipeline");
        state.pipeline.run(lat, lon).await?;
        records = state.store.observations_since(lat, lon, hour_start).await?;
    }

    if records.is_empty() {
        return Err(ApiError(EtlError::DataNotAvailable(
            "No weather data available even after running the pipeline".to_string(),
        )));
    }

    let average_temperature =
        records.iter().map(|r| r.temperature).sum::<f64>() / records.len() as f64;
    let consensus = state
        .store
        .consensus_series(lat, lon, Some(hour_start))
        .await?
        .into_iter()
        .next();

    Ok(Json(CurrentWeatherResponse {
        location: Coordinates { lat, lon },
        average_temperature,
        consensus,
        sources: records.iter().map(SourceReading::from).collect(),
    }))
}

// ============================================================================
// Aggregates
// ============================================================================

/// GET /api/v1/weather/daily-average
pub async fn daily_average_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<LocationParams>,
) -> ApiResult<impl IntoResponse> {
    let (lat, lon) = params.resolve()?;
    let days = state.store.daily_averages(lat, lon).await?;
    Ok(Json(days))
}

#[derive(Debug, Deserialize)]
pub struct DeviationParams {
    pub date: String,
    pub location: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct DeviationResponse {
    pub date: String,
    pub location: Coordinates,
    pub source_averages: BTreeMap<WeatherSource, f64>,
    pub deviation_yr_vs_openmeteo: Option<f64>,
}

/// GET /api/v1/weather/source-deviation - Per-source averages for one day.
pub async fn source_deviation_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<DeviationParams>,
) -> ApiResult<Json<DeviationResponse>> {
    let date = parse_date(&params.date).map_err(|e| EtlError::InvalidParameter {
        param: "date".to_string(),
        message: e.to_string(),
    })?;
    let (lat, lon) = LocationParams {
        location: params.location,
        lat: params.lat,
        lon: params.lon,
    }
    .resolve()?;

    let source_averages: BTreeMap<WeatherSource, f64> = state
        .store
        .source_averages(lat, lon, date)
        .await?
        .into_iter()
        .map(|avg| (avg.source, avg.average_temperature))
        .collect();

    let deviation = match (
        source_averages.get(&WeatherSource::YrNo),
        source_averages.get(&WeatherSource::OpenMeteo),
    ) {
        (Some(yr), Some(om)) => Some((yr - om).abs()),
        _ => None,
    };

    Ok(Json(DeviationResponse {
        date: date.format("%Y-%m-%d").to_string(),
        location: Coordinates { lat, lon },
        source_averages,
        deviation_yr_vs_openmeteo: deviation,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ConsensusParams {
    /// Only points at or after this instant
    pub since: Option<String>,
    pub location: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// GET /api/v1/weather/consensus - Persisted consensus series.
pub async fn consensus_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ConsensusParams>,
) -> ApiResult<Json<Vec<ConsensusObservation>>> {
    let (lat, lon) = LocationParams {
        location: params.location,
        lat: params.lat,
        lon: params.lon,
    }
    .resolve()?;
    let since = params
        .since
        .as_deref()
        .map(weather_common::parse_timestamp)
        .transpose()
        .map_err(|e| EtlError::InvalidParameter {
            param: "since".to_string(),
            message: e.to_string(),
        })?;

    let series = state.store.consensus_series(lat, lon, since).await?;
    Ok(Json(series))
}

// ============================================================================
// Search
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub name: String,
}

/// GET /api/v1/weather/search - Free-text location search.
pub async fn search_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<LocationCandidate>>> {
    let name = params.name.trim();
    if name.chars().count() < MIN_SEARCH_LEN {
        return Err(ApiError(EtlError::InvalidParameter {
            param: "name".to_string(),
            message: format!("must be at least {} characters", MIN_SEARCH_LEN),
        }));
    }

    let results = state.search.search(name).await?;
    Ok(Json(results))
}

// ============================================================================
// Pipeline trigger
// ============================================================================

/// Body of `POST /api/v1/pipeline/run`.
#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    pub location: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// POST /api/v1/pipeline/run - Run the pipeline once.
pub async fn run_pipeline_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<RunRequest>,
) -> ApiResult<Json<PipelineReport>> {
    let params = LocationParams {
        location: request.location,
        lat: request.lat,
        lon: request.lon,
    };
    let (lat, lon) = params.resolve()?;

    let report = state.pipeline.run(lat, lon).await?;
    Ok(Json(report))
}

// ============================================================================
// Operational
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// GET /health - Health check
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "weather-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /metrics - Prometheus metrics
pub async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
