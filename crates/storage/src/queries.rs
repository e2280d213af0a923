//! Read queries over persisted observations.
//!
//! Unlike the loader, reads match coordinates within [`COORD_TOLERANCE`]
//! degrees, since API callers often reformat the values they send.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;

use weather_common::{
    format_timestamp, parse_timestamp, ConsensusObservation, EtlError, EtlResult,
    WeatherObservation, WeatherSource,
};

use crate::store::{db_error, WeatherStore};

/// Coordinate tolerance (degrees) for read queries.
pub const COORD_TOLERANCE: f64 = 1e-4;

/// Rows stored under exactly `(lat, lon)` within an inclusive time range.
pub(crate) const SELECT_OBSERVATIONS_BETWEEN: &str =
    "SELECT timestamp, lat, lon, source, temperature, precipitation FROM weather_data \
     WHERE lat = ? AND lon = ? AND timestamp >= ? AND timestamp <= ? \
     ORDER BY timestamp ASC, source ASC";

#[derive(Debug, FromRow)]
pub(crate) struct ObservationRow {
    timestamp: String,
    lat: f64,
    lon: f64,
    source: String,
    temperature: f64,
    precipitation: f64,
}

impl TryFrom<ObservationRow> for WeatherObservation {
    type Error = EtlError;

    fn try_from(row: ObservationRow) -> EtlResult<Self> {
        let timestamp = parse_timestamp(&row.timestamp)
            .map_err(|e| EtlError::InternalError(format!("Stored timestamp: {}", e)))?;
        let source = WeatherSource::from_str(&row.source).ok_or_else(|| {
            EtlError::InternalError(format!("Unknown stored source: {}", row.source))
        })?;

        Ok(WeatherObservation {
            timestamp,
            lat: row.lat,
            lon: row.lon,
            source,
            temperature: row.temperature,
            precipitation: row.precipitation,
        })
    }
}

#[derive(Debug, FromRow)]
struct ConsensusRow {
    timestamp: String,
    lat: f64,
    lon: f64,
    weighted_temperature: f64,
    source_count: i64,
}

impl TryFrom<ConsensusRow> for ConsensusObservation {
    type Error = EtlError;

    fn try_from(row: ConsensusRow) -> EtlResult<Self> {
        let timestamp = parse_timestamp(&row.timestamp)
            .map_err(|e| EtlError::InternalError(format!("Stored timestamp: {}", e)))?;

        Ok(ConsensusObservation {
            timestamp,
            lat: row.lat,
            lon: row.lon,
            weighted_temperature: row.weighted_temperature,
            source_count: row.source_count as u32,
        })
    }
}

/// Per-day averages across all sources.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct DailyAverage {
    /// UTC date, `YYYY-MM-DD`
    pub date: String,
    pub average_temperature: f64,
    pub average_precipitation: f64,
}

/// Average temperature of one source over a day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceAverage {
    pub source: WeatherSource,
    pub average_temperature: f64,
    pub samples: u32,
}

fn bounds(value: f64) -> (f64, f64) {
    (value - COORD_TOLERANCE, value + COORD_TOLERANCE)
}

impl WeatherStore {
    /// Exact business-key lookup.
    pub async fn get_observation(
        &self,
        timestamp: DateTime<Utc>,
        lat: f64,
        lon: f64,
        source: WeatherSource,
    ) -> EtlResult<Option<WeatherObservation>> {
        let row = sqlx::query_as::<_, ObservationRow>(
            "SELECT timestamp, lat, lon, source, temperature, precipitation FROM weather_data \
             WHERE timestamp = ? AND lat = ? AND lon = ? AND source = ?",
        )
        .bind(format_timestamp(&timestamp))
        .bind(lat)
        .bind(lon)
        .bind(source.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(db_error("Query failed"))?;

        row.map(WeatherObservation::try_from).transpose()
    }

    /// Observations stored under exactly `(lat, lon)` with `from <= timestamp <= to`.
    ///
    /// Uses the loader's exact coordinate match rather than the read tolerance.
    pub async fn observations_between(
        &self,
        lat: f64,
        lon: f64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> EtlResult<Vec<WeatherObservation>> {
        let rows = sqlx::query_as::<_, ObservationRow>(SELECT_OBSERVATIONS_BETWEEN)
            .bind(lat)
            .bind(lon)
            .bind(format_timestamp(&from))
            .bind(format_timestamp(&to))
            .fetch_all(self.pool())
            .await
            .map_err(db_error("Query failed"))?;

        rows.into_iter().map(WeatherObservation::try_from).collect()
    }

    /// Observations near a coordinate at or after `since`, oldest first.
    pub async fn observations_since(
        &self,
        lat: f64,
        lon: f64,
        since: DateTime<Utc>,
    ) -> EtlResult<Vec<WeatherObservation>> {
        let (lat_min, lat_max) = bounds(lat);
        let (lon_min, lon_max) = bounds(lon);

        let rows = sqlx::query_as::<_, ObservationRow>(
            "SELECT timestamp, lat, lon, source, temperature, precipitation FROM weather_data \
             WHERE lat BETWEEN ? AND ? AND lon BETWEEN ? AND ? AND timestamp >= ? \
             ORDER BY timestamp ASC, source ASC",
        )
        .bind(lat_min)
        .bind(lat_max)
        .bind(lon_min)
        .bind(lon_max)
        .bind(format_timestamp(&since))
        .fetch_all(self.pool())
        .await
        .map_err(db_error("Query failed"))?;

        rows.into_iter().map(WeatherObservation::try_from).collect()
    }

    /// Average temperature and precipitation per UTC day near a coordinate.
    pub async fn daily_averages(&self, lat: f64, lon: f64) -> EtlResult<Vec<DailyAverage>> {
        let (lat_min, lat_max) = bounds(lat);
        let (lon_min, lon_max) = bounds(lon);

        sqlx::query_as::<_, DailyAverage>(
            "SELECT substr(timestamp, 1, 10) AS date, \
             AVG(temperature) AS average_temperature, \
             AVG(precipitation) AS average_precipitation \
             FROM weather_data \
             WHERE lat BETWEEN ? AND ? AND lon BETWEEN ? AND ? \
             GROUP BY substr(timestamp, 1, 10) \
             ORDER BY date ASC",
        )
        .bind(lat_min)
        .bind(lat_max)
        .bind(lon_min)
        .bind(lon_max)
        .fetch_all(self.pool())
        .await
        .map_err(db_error("Query failed"))
    }

    /// Per-source average temperature for one UTC date near a coordinate.
    pub async fn source_averages(
        &self,
        lat: f64,
        lon: f64,
        date: NaiveDate,
    ) -> EtlResult<Vec<SourceAverage>> {
        let (lat_min, lat_max) = bounds(lat);
        let (lon_min, lon_max) = bounds(lon);

        let rows: Vec<(String, f64, i64)> = sqlx::query_as(
            "SELECT source, AVG(temperature), COUNT(*) FROM weather_data \
             WHERE lat BETWEEN ? AND ? AND lon BETWEEN ? AND ? \
             AND substr(timestamp, 1, 10) = ? \
             GROUP BY source ORDER BY source ASC",
        )
        .bind(lat_min)
        .bind(lat_max)
        .bind(lon_min)
        .bind(lon_max)
        .bind(date.format("%Y-%m-%d").to_string())
        .fetch_all(self.pool())
        .await
        .map_err(db_error("Query failed"))?;

        rows.into_iter()
            .map(|(source, average_temperature, samples)| -> EtlResult<SourceAverage> {
                let source = WeatherSource::from_str(&source).ok_or_else(|| {
                    EtlError::InternalError(format!("Unknown stored source: {}", source))
                })?;
                Ok(SourceAverage {
                    source,
                    average_temperature,
                    samples: samples as u32,
                })
            })
            .collect()
    }

    /// Persisted consensus near a coordinate, optionally from `since`, oldest first.
    pub async fn consensus_series(
        &self,
        lat: f64,
        lon: f64,
        since: Option<DateTime<Utc>>,
    ) -> EtlResult<Vec<ConsensusObservation>> {
        let (lat_min, lat_max) = bounds(lat);
        let (lon_min, lon_max) = bounds(lon);
        // Stored timestamps are fixed-width RFC 3339, so "" sorts before all of them
        let since = since.map(|s| format_timestamp(&s)).unwrap_or_default();

        let rows = sqlx::query_as::<_, ConsensusRow>(
            "SELECT timestamp, lat, lon, weighted_temperature, source_count FROM consensus_data \
             WHERE lat BETWEEN ? AND ? AND lon BETWEEN ? AND ? AND timestamp >= ? \
             ORDER BY timestamp ASC",
        )
        .bind(lat_min)
        .bind(lat_max)
        .bind(lon_min)
        .bind(lon_max)
        .bind(since)
        .fetch_all(self.pool())
        .await
        .map_err(db_error("Query failed"))?;

        rows.into_iter().map(ConsensusObservation::try_from).collect()
    }

    /// Total rows in `weather_data`.
    pub async fn count_observations(&self) -> EtlResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM weather_data")
            .fetch_one(self.pool())
            .await
            .map_err(db_error("Query failed"))
    }

    /// Total rows in `consensus_data`.
    pub async fn count_consensus(&self) -> EtlResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM consensus_data")
            .fetch_one(self.pool())
            .await
            .map_err(db_error("Query failed"))
    }
}
