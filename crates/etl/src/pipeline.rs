//! Extract, transform and load orchestration.
//!
//! A run fetches every provider concurrently and waits for all of them. If
//! any fetch fails the run fails before anything is written. Payloads that
//! arrive but cannot be normalized only shrink the result.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use sources::{RawPayload, SourceAdapter, SourcesConfig};
use storage::WeatherStore;
use weather_common::{
    resolve_location, validate_coordinates, ConsensusObservation, EtlError, EtlResult,
    WeatherObservation, WeatherSource,
};

use crate::consensus::{ConsensusEngine, SourceWeights};
use crate::normalize::normalize_or_empty;

/// Observations produced by one provider in a run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub source: WeatherSource,
    pub observations: usize,
}

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub lat: f64,
    pub lon: f64,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub sources: Vec<SourceSummary>,
    pub observations_loaded: usize,
    pub consensus: Vec<ConsensusObservation>,
}

/// ETL pipeline over a fixed set of providers and one store.
pub struct EtlPipeline {
    adapters: Vec<SourceAdapter>,
    store: Arc<WeatherStore>,
    consensus: ConsensusEngine,
}

impl EtlPipeline {
    /// Pipeline over every known provider.
    pub fn new(
        config: &SourcesConfig,
        store: Arc<WeatherStore>,
        weights: SourceWeights,
    ) -> EtlResult<Self> {
        let adapters = SourceAdapter::all(config)?;
        Ok(Self::with_adapters(adapters, store, weights))
    }

    pub fn with_adapters(
        adapters: Vec<SourceAdapter>,
        store: Arc<WeatherStore>,
        weights: SourceWeights,
    ) -> Self {
        Self {
            adapters,
            store,
            consensus: ConsensusEngine::new(weights),
        }
    }

    pub fn store(&self) -> &Arc<WeatherStore> {
        &self.store
    }

    /// Run the pipeline for a named location from the fixed table.
    pub async fn run_for_location(&self, name: &str) -> EtlResult<PipelineReport> {
        let (lat, lon) =
            resolve_location(name).ok_or_else(|| EtlError::UnknownLocation(name.to_string()))?;
        self.run(lat, lon).await
    }

    /// Fetch, normalize and load observations for one coordinate, then
    /// recompute and persist consensus for the timestamps it wrote.
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self, lat: f64, lon: f64) -> EtlResult<PipelineReport> {
        validate_coordinates(lat, lon)?;

        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));

        let started_at = Utc::now();
        let start = Instant::now();
        info!("Starting pipeline run");

        let result = self.execute(lat, lon).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok((sources, observations_loaded, consensus)) => {
                metrics::counter!("etl_runs_total", "outcome" => "success").increment(1);
                info!(
                    observations = observations_loaded,
                    consensus_points = consensus.len(),
                    duration_ms,
                    "Pipeline run complete"
                );
                Ok(PipelineReport {
                    run_id,
                    lat,
                    lon,
                    started_at,
                    duration_ms,
                    sources,
                    observations_loaded,
                    consensus,
                })
            }
            Err(e) => {
                metrics::counter!("etl_runs_total", "outcome" => "failure").increment(1);
                error!(error = %e, duration_ms, "Pipeline run failed");
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        lat: f64,
        lon: f64,
    ) -> EtlResult<(Vec<SourceSummary>, usize, Vec<ConsensusObservation>)> {
        let payloads = self.extract(lat, lon).await?;
        let (observations, sources) = transform(&payloads, lat, lon);

        let loaded = self.store.load(&observations).await?;
        for summary in &sources {
            metrics::counter!(
                "etl_observations_loaded_total",
                "source" => summary.source.as_str()
            )
            .increment(summary.observations as u64);
        }

        let consensus = self.refresh_consensus(lat, lon, &observations).await?;
        metrics::counter!("etl_consensus_points_total").increment(consensus.len() as u64);

        Ok((sources, loaded, consensus))
    }

    /// Rebuild consensus for every timestamp this run wrote, from all rows
    /// stored at the run's coordinates, so earlier sources still count.
    async fn refresh_consensus(
        &self,
        lat: f64,
        lon: f64,
        observations: &[WeatherObservation],
    ) -> EtlResult<Vec<ConsensusObservation>> {
        let touched: BTreeSet<DateTime<Utc>> = observations.iter().map(|o| o.timestamp).collect();
        let (Some(&from), Some(&to)) = (touched.first(), touched.last()) else {
            return Ok(Vec::new());
        };

        self.store
            .refresh_consensus(lat, lon, from, to, |stored| {
                let group: Vec<WeatherObservation> = stored
                    .iter()
                    .filter(|o| touched.contains(&o.timestamp))
                    .cloned()
                    .collect();
                self.consensus.calculate(&group)
            })
            .await
    }

    /// Fetch every provider concurrently; the first failure fails the step.
    pub async fn extract(&self, lat: f64, lon: f64) -> EtlResult<Vec<RawPayload>> {
        try_join_all(self.adapters.iter().map(|adapter| adapter.fetch(lat, lon))).await
    }
}

/// Normalize each payload, tallying per-source counts.
fn transform(
    payloads: &[RawPayload],
    lat: f64,
    lon: f64,
) -> (Vec<WeatherObservation>, Vec<SourceSummary>) {
    let mut observations = Vec::new();
    let mut sources = Vec::with_capacity(payloads.len());

    for payload in payloads {
        let normalized = normalize_or_empty(payload, lat, lon);
        if normalized.is_empty() {
            warn!(source = %payload.source, "Source produced no observations");
        }
        sources.push(SourceSummary {
            source: payload.source,
            observations: normalized.len(),
        });
        observations.extend(normalized);
    }

    (observations, sources)
}
