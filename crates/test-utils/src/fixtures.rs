//! Provider payload fixtures.
//!
//! Builders return `serde_json::Value`s shaped like the real provider
//! responses, so tests can serve them from a mock server or feed them
//! straight into the normalizer.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use weather_common::{WeatherObservation, WeatherSource};

/// Common coordinates for testing.
pub mod coords {
    /// Oslo, as used by the fixed location table
    pub const OSLO: (f64, f64) = (59.91, 10.75);

    /// Berlin
    pub const BERLIN: (f64, f64) = (52.52, 13.40);

    /// A coordinate with a long binary expansion
    pub const AWKWARD: (f64, f64) = (40.712_776_1, -74.005_974_3);
}

/// One Yr.no timeseries entry.
#[derive(Debug, Clone)]
pub struct YrEntry {
    pub time: String,
    pub air_temperature: Option<f64>,
    /// `None` omits the `next_1_hours` section unless `forecast_section` is set
    pub precipitation_amount: Option<f64>,
    /// Emit `next_1_hours` even when there is no precipitation amount
    pub forecast_section: bool,
}

impl YrEntry {
    pub fn new(time: &str, air_temperature: Option<f64>, precipitation_amount: Option<f64>) -> Self {
        Self {
            time: time.to_string(),
            air_temperature,
            precipitation_amount,
            forecast_section: precipitation_amount.is_some(),
        }
    }

    /// Keep a `next_1_hours` section (summary only) without a precipitation amount.
    pub fn with_forecast_section(mut self) -> Self {
        self.forecast_section = true;
        self
    }
}

/// Build a Yr.no locationforecast (compact) GeoJSON body.
pub fn yr_payload(entries: &[YrEntry]) -> Value {
    let timeseries: Vec<Value> = entries
        .iter()
        .map(|entry| {
            let mut details = serde_json::Map::new();
            details.insert("air_pressure_at_sea_level".into(), json!(1013.2));
            details.insert("relative_humidity".into(), json!(81.5));
            if let Some(t) = entry.air_temperature {
                details.insert("air_temperature".into(), json!(t));
            }

            let mut data = json!({
                "instant": { "details": Value::Object(details) }
            });
            if entry.forecast_section {
                let details = match entry.precipitation_amount {
                    Some(p) => json!({ "precipitation_amount": p }),
                    None => json!({}),
                };
                data["next_1_hours"] = json!({
                    "summary": { "symbol_code": "cloudy" },
                    "details": details
                });
            }

            json!({ "time": entry.time, "data": data })
        })
        .collect();

    json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": [10.75, 59.91, 12] },
        "properties": {
            "meta": {
                "updated_at": "2026-01-12T11:31:02Z",
                "units": {
                    "air_temperature": "celsius",
                    "precipitation_amount": "mm"
                }
            },
            "timeseries": timeseries
        }
    })
}

/// Build an Open-Meteo hourly forecast body from parallel arrays.
///
/// Arrays are written as given, so unequal lengths can be tested.
pub fn open_meteo_payload(
    times: &[&str],
    temperatures: &[Option<f64>],
    precipitation: &[Option<f64>],
) -> Value {
    open_meteo_payload_with_units(times, temperatures, precipitation, "°C", "mm")
}

pub fn open_meteo_payload_with_units(
    times: &[&str],
    temperatures: &[Option<f64>],
    precipitation: &[Option<f64>],
    temperature_unit: &str,
    precipitation_unit: &str,
) -> Value {
    json!({
        "latitude": 59.9,
        "longitude": 10.75,
        "generationtime_ms": 0.05,
        "utc_offset_seconds": 0,
        "timezone": "GMT",
        "timezone_abbreviation": "GMT",
        "elevation": 23.0,
        "hourly_units": {
            "time": "iso8601",
            "temperature_2m": temperature_unit,
            "precipitation": precipitation_unit
        },
        "hourly": {
            "time": times,
            "temperature_2m": temperatures,
            "precipitation": precipitation
        }
    })
}

/// Build an Open-Meteo geocoding search body.
///
/// Each tuple is `(name, lat, lon, country, admin1)`.
pub fn geocoding_payload(results: &[(&str, f64, f64, Option<&str>, Option<&str>)]) -> Value {
    if results.is_empty() {
        // The API omits `results` when nothing matches
        return json!({ "generationtime_ms": 0.4 });
    }

    let results: Vec<Value> = results
        .iter()
        .enumerate()
        .map(|(i, (name, lat, lon, country, admin1))| {
            let mut item = json!({
                "id": 3143244 + i as u64,
                "name": name,
                "latitude": lat,
                "longitude": lon,
            });
            if let Some(country) = country {
                item["country"] = json!(country);
            }
            if let Some(admin1) = admin1 {
                item["admin1"] = json!(admin1);
            }
            item
        })
        .collect();

    json!({ "results": results, "generationtime_ms": 0.4 })
}

/// A fixed UTC instant on 2026-01-12 at `hour`.
pub fn hour(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 12, hour, 0, 0).unwrap()
}

/// Canonical observation at Oslo for `hour`.
pub fn observation(source: WeatherSource, hour_of_day: u32, temperature: f64) -> WeatherObservation {
    let (lat, lon) = coords::OSLO;
    WeatherObservation::new(hour(hour_of_day), lat, lon, source, temperature, Some(0.0))
}
