//! Idempotent batch loading.
//!
//! Observations are upserted on the business key `(timestamp, lat, lon,
//! source)`; consensus values on `(timestamp, lat, lon)`. Coordinates are
//! matched exactly, so callers must pass the same `f64` values they used to
//! build the observations. Each batch is one transaction: it commits as a
//! whole or is rolled back and reported as `PersistenceFailure`.
//!
//! Consensus is refreshed from the persisted observations rather than from a
//! single run's batch, so a degraded run cannot overwrite a consensus value
//! that still has more contributing rows behind it.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, error, info, instrument};

use weather_common::{
    format_timestamp, ConsensusObservation, EtlError, EtlResult, WeatherObservation,
};

use crate::queries::{ObservationRow, SELECT_OBSERVATIONS_BETWEEN};
use crate::store::{db_error, WeatherStore};

const UPSERT_OBSERVATION: &str = r#"
    INSERT INTO weather_data (timestamp, lat, lon, source, temperature, precipitation, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (timestamp, lat, lon, source)
    DO UPDATE SET
        temperature = excluded.temperature,
        precipitation = excluded.precipitation,
        updated_at = excluded.updated_at
"#;

const UPSERT_CONSENSUS: &str = r#"
    INSERT INTO consensus_data (timestamp, lat, lon, weighted_temperature, source_count, computed_at)
    VALUES (?, ?, ?, ?, ?, ?)
    ON CONFLICT (timestamp, lat, lon)
    DO UPDATE SET
        weighted_temperature = excluded.weighted_temperature,
        source_count = excluded.source_count,
        computed_at = excluded.computed_at
"#;

impl WeatherStore {
    /// Upsert a batch of canonical observations atomically.
    ///
    /// Returns the number of observations processed.
    #[instrument(skip(self, observations), fields(count = observations.len()))]
    pub async fn load(&self, observations: &[WeatherObservation]) -> EtlResult<usize> {
        if observations.is_empty() {
            debug!("Empty batch, nothing to load");
            return Ok(0);
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool().begin().await.map_err(db_error("Begin failed"))?;

        if let Err(e) = write_observations(&mut tx, observations).await {
            return Err(rollback(tx, "Observation upsert failed", e).await);
        }

        tx.commit().await.map_err(db_error("Commit failed"))?;

        info!(count = observations.len(), "Loaded observations");
        Ok(observations.len())
    }

    /// Upsert a batch of consensus observations atomically.
    #[instrument(skip(self, consensus), fields(count = consensus.len()))]
    pub async fn save_consensus(&self, consensus: &[ConsensusObservation]) -> EtlResult<usize> {
        if consensus.is_empty() {
            return Ok(0);
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool().begin().await.map_err(db_error("Begin failed"))?;

        if let Err(e) = write_consensus(&mut tx, consensus).await {
            return Err(rollback(tx, "Consensus upsert failed", e).await);
        }

        tx.commit().await.map_err(db_error("Commit failed"))?;

        info!(count = consensus.len(), "Saved consensus observations");
        Ok(consensus.len())
    }

    /// Recompute consensus from stored observations and upsert the result.
    ///
    /// `compute` receives every row stored under exactly `(lat, lon)` with
    /// `from <= timestamp <= to`. The read and the upsert share one
    /// transaction and hold the write lock, so a concurrent load cannot
    /// slip in between them.
    #[instrument(skip(self, compute))]
    pub async fn refresh_consensus<F>(
        &self,
        lat: f64,
        lon: f64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        compute: F,
    ) -> EtlResult<Vec<ConsensusObservation>>
    where
        F: FnOnce(&[WeatherObservation]) -> Vec<ConsensusObservation>,
    {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool().begin().await.map_err(db_error("Begin failed"))?;

        let rows = match read_observations_between(&mut tx, lat, lon, from, to).await {
            Ok(rows) => rows,
            Err(e) => return Err(rollback(tx, "Consensus input read failed", e).await),
        };
        let observations = rows
            .into_iter()
            .map(WeatherObservation::try_from)
            .collect::<EtlResult<Vec<_>>>()?;

        let consensus = compute(&observations);
        if let Err(e) = write_consensus(&mut tx, &consensus).await {
            return Err(rollback(tx, "Consensus upsert failed", e).await);
        }

        tx.commit().await.map_err(db_error("Commit failed"))?;

        info!(
            observations = observations.len(),
            count = consensus.len(),
            "Refreshed consensus from stored observations"
        );
        Ok(consensus)
    }
}

async fn read_observations_between(
    tx: &mut Transaction<'_, Sqlite>,
    lat: f64,
    lon: f64,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<ObservationRow>, sqlx::Error> {
    sqlx::query_as::<_, ObservationRow>(SELECT_OBSERVATIONS_BETWEEN)
        .bind(lat)
        .bind(lon)
        .bind(format_timestamp(&from))
        .bind(format_timestamp(&to))
        .fetch_all(&mut **tx)
        .await
}

async fn write_observations(
    tx: &mut Transaction<'_, Sqlite>,
    observations: &[WeatherObservation],
) -> Result<(), sqlx::Error> {
    let now = format_timestamp(&Utc::now());

    for obs in observations {
        sqlx::query(UPSERT_OBSERVATION)
            .bind(format_timestamp(&obs.timestamp))
            .bind(obs.lat)
            .bind(obs.lon)
            .bind(obs.source.as_str())
            .bind(obs.temperature)
            .bind(obs.precipitation)
            .bind(&now)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

async fn write_consensus(
    tx: &mut Transaction<'_, Sqlite>,
    consensus: &[ConsensusObservation],
) -> Result<(), sqlx::Error> {
    let now = format_timestamp(&Utc::now());

    for point in consensus {
        sqlx::query(UPSERT_CONSENSUS)
            .bind(format_timestamp(&point.timestamp))
            .bind(point.lat)
            .bind(point.lon)
            .bind(point.weighted_temperature)
            .bind(point.source_count as i64)
            .bind(&now)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

async fn rollback(tx: Transaction<'_, Sqlite>, context: &str, cause: sqlx::Error) -> EtlError {
    error!(error = %cause, "{}, rolling back batch", context);
    if let Err(e) = tx.rollback().await {
        error!(error = %e, "Rollback failed");
    }
    EtlError::PersistenceFailure(format!("{}: {}", context, cause))
}
