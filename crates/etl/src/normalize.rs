//! Normalization of provider payloads into canonical observations.
//!
//! Two payload shapes are supported:
//! - Yr.no: a nested timeseries where every entry has an `instant` section
//!   and an optional `next_1_hours` section. Timestamps carry offsets.
//! - Open-Meteo: three parallel `hourly` arrays. Timestamps are naive and
//!   are read as UTC, which holds because the adapter requests `timezone=UTC`.
//!
//! A structural problem with one payload is reported as
//! `EtlError::MalformedPayload`; [`normalize_or_empty`] turns that into an
//! empty result so one bad provider never aborts the run.

use serde::Deserialize;
use tracing::{debug, warn};

use sources::RawPayload;
use weather_common::{parse_timestamp, EtlError, EtlResult, WeatherObservation, WeatherSource};

// === Yr.no payload shape ===

#[derive(Debug, Deserialize)]
struct YrForecast {
    #[serde(default)]
    properties: YrProperties,
}

#[derive(Debug, Default, Deserialize)]
struct YrProperties {
    #[serde(default)]
    timeseries: Vec<YrTimeStep>,
}

// Sections are `Option` so that an explicit `null` only affects its own entry.

#[derive(Debug, Deserialize)]
struct YrTimeStep {
    time: String,
    #[serde(default)]
    data: Option<YrData>,
}

#[derive(Debug, Default, Deserialize)]
struct YrData {
    #[serde(default)]
    instant: Option<YrSection>,
    #[serde(default)]
    next_1_hours: Option<YrSection>,
}

#[derive(Debug, Default, Deserialize)]
struct YrSection {
    #[serde(default)]
    details: Option<YrDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct YrDetails {
    air_temperature: Option<f64>,
    precipitation_amount: Option<f64>,
}

impl YrTimeStep {
    fn air_temperature(&self) -> Option<f64> {
        self.data
            .as_ref()?
            .instant
            .as_ref()?
            .details
            .as_ref()?
            .air_temperature
    }

    fn precipitation_amount(&self) -> Option<f64> {
        self.data
            .as_ref()?
            .next_1_hours
            .as_ref()?
            .details
            .as_ref()?
            .precipitation_amount
    }
}

// === Open-Meteo payload shape ===

#[derive(Debug, Deserialize)]
struct OpenMeteoForecast {
    #[serde(default)]
    utc_offset_seconds: i64,
    #[serde(default)]
    hourly_units: OpenMeteoUnits,
    #[serde(default)]
    hourly: OpenMeteoHourly,
}

#[derive(Debug, Default, Deserialize)]
struct OpenMeteoUnits {
    temperature_2m: Option<String>,
    precipitation: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenMeteoHourly {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
}

/// Normalize one provider payload, dispatching on its source tag.
pub fn normalize(payload: &RawPayload, lat: f64, lon: f64) -> EtlResult<Vec<WeatherObservation>> {
    match payload.source {
        WeatherSource::YrNo => normalize_yr(&payload.body, lat, lon),
        WeatherSource::OpenMeteo => normalize_open_meteo(&payload.body, lat, lon),
    }
}

/// Normalize, absorbing `MalformedPayload` into an empty result.
pub fn normalize_or_empty(payload: &RawPayload, lat: f64, lon: f64) -> Vec<WeatherObservation> {
    match normalize(payload, lat, lon) {
        Ok(observations) => observations,
        Err(e) => {
            warn!(source = %payload.source, error = %e, "Discarding malformed payload");
            metrics::counter!("etl_malformed_payloads_total", "source" => payload.source.as_str())
                .increment(1);
            Vec::new()
        }
    }
}

fn normalize_yr(body: &serde_json::Value, lat: f64, lon: f64) -> EtlResult<Vec<WeatherObservation>> {
    let provider = WeatherSource::YrNo.as_str();
    let forecast = YrForecast::deserialize(body).map_err(|e| EtlError::malformed(provider, e))?;

    let total = forecast.properties.timeseries.len();
    let mut observations = Vec::with_capacity(total);

    for step in forecast.properties.timeseries {
        // Temperature is required; entries without it are dropped
        let Some(temperature) = step.air_temperature() else {
            continue;
        };

        let timestamp = parse_timestamp(&step.time).map_err(|e| EtlError::malformed(provider, e))?;
        let precipitation = step.precipitation_amount();

        observations.push(WeatherObservation::new(
            timestamp,
            lat,
            lon,
            WeatherSource::YrNo,
            temperature,
            precipitation,
        ));
    }

    debug!(
        total,
        kept = observations.len(),
        "Normalized Yr.no timeseries"
    );
    Ok(observations)
}

fn normalize_open_meteo(
    body: &serde_json::Value,
    lat: f64,
    lon: f64,
) -> EtlResult<Vec<WeatherObservation>> {
    let provider = WeatherSource::OpenMeteo.as_str();
    let forecast =
        OpenMeteoForecast::deserialize(body).map_err(|e| EtlError::malformed(provider, e))?;

    let hourly = forecast.hourly;
    if hourly.time.len() != hourly.temperature_2m.len()
        || hourly.time.len() != hourly.precipitation.len()
    {
        return Err(EtlError::malformed(
            provider,
            format!(
                "hourly array lengths differ: time={}, temperature_2m={}, precipitation={}",
                hourly.time.len(),
                hourly.temperature_2m.len(),
                hourly.precipitation.len()
            ),
        ));
    }

    if forecast.utc_offset_seconds != 0 {
        warn!(
            utc_offset_seconds = forecast.utc_offset_seconds,
            "Open-Meteo returned local times; reading them as UTC"
        );
    }

    let to_celsius = temperature_conversion(forecast.hourly_units.temperature_2m.as_deref())
        .ok_or_else(|| {
            EtlError::malformed(provider, "unsupported temperature unit")
        })?;
    let to_mm = precipitation_conversion(forecast.hourly_units.precipitation.as_deref())
        .ok_or_else(|| {
            EtlError::malformed(provider, "unsupported precipitation unit")
        })?;

    let mut observations = Vec::with_capacity(hourly.time.len());

    for ((time, temperature), precipitation) in hourly
        .time
        .iter()
        .zip(hourly.temperature_2m)
        .zip(hourly.precipitation)
    {
        let Some(temperature) = temperature else {
            continue;
        };

        let timestamp = parse_timestamp(time).map_err(|e| EtlError::malformed(provider, e))?;

        observations.push(WeatherObservation::new(
            timestamp,
            lat,
            lon,
            WeatherSource::OpenMeteo,
            to_celsius(temperature),
            precipitation.map(to_mm),
        ));
    }

    debug!(kept = observations.len(), "Normalized Open-Meteo hourly arrays");
    Ok(observations)
}

fn temperature_conversion(unit: Option<&str>) -> Option<fn(f64) -> f64> {
    match unit {
        None | Some("°C") | Some("celsius") => Some(|t| t),
        Some("°F") | Some("fahrenheit") => Some(|t| (t - 32.0) * 5.0 / 9.0),
        _ => None,
    }
}

fn precipitation_conversion(unit: Option<&str>) -> Option<fn(f64) -> f64> {
    match unit {
        None | Some("mm") => Some(|p| p),
        Some("inch") => Some(|p| p * 25.4),
        _ => None,
    }
}
