//! Canonical and derived weather observations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::WeatherSource;
use crate::time::truncate_to_second;

/// Provider-agnostic weather data point produced by normalization.
///
/// The tuple `(timestamp, lat, lon, source)` is the business key used by the
/// loader; `lat`/`lon` are carried exactly as supplied to the pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    /// Whole seconds when built with [`WeatherObservation::new`]
    pub timestamp: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub source: WeatherSource,
    /// Air temperature in degrees Celsius
    pub temperature: f64,
    /// Precipitation in millimetres; 0.0 when the provider omits it
    #[serde(default)]
    pub precipitation: f64,
}

impl WeatherObservation {
    pub fn new(
        timestamp: DateTime<Utc>,
        lat: f64,
        lon: f64,
        source: WeatherSource,
        temperature: f64,
        precipitation: Option<f64>,
    ) -> Self {
        Self {
            timestamp: truncate_to_second(timestamp),
            lat,
            lon,
            source,
            temperature,
            precipitation: precipitation.unwrap_or(0.0),
        }
    }
}

/// Weighted multi-source temperature for one time instant at one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusObservation {
    pub timestamp: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub weighted_temperature: f64,
    /// Distinct sources that contributed, not the number configured
    pub source_count: u32,
}
