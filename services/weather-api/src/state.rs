//! Application state for the weather API.

use std::sync::Arc;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;

use etl::EtlPipeline;
use sources::LocationSearch;
use storage::WeatherStore;

use crate::config::ServiceConfig;

/// Shared state.
pub struct AppState {
    pub store: Arc<WeatherStore>,
    pub pipeline: EtlPipeline,
    pub search: LocationSearch,
    /// Renders the Prometheus exposition on `/metrics`
    pub metrics: PrometheusHandle,
}

impl AppState {
    /// Connect to the database and build the pipeline.
    pub async fn new(config: &ServiceConfig, metrics: PrometheusHandle) -> Result<Self> {
        let store = Arc::new(WeatherStore::connect(&config.database_url).await?);
        Self::with_store(config, store, metrics)
    }

    pub fn with_store(
        config: &ServiceConfig,
        store: Arc<WeatherStore>,
        metrics: PrometheusHandle,
    ) -> Result<Self> {
        let pipeline = EtlPipeline::new(&config.sources, Arc::clone(&store), config.weights)?;
        let search = LocationSearch::new(&config.sources)?;

        Ok(Self {
            store,
            pipeline,
            search,
            metrics,
        })
    }
}
