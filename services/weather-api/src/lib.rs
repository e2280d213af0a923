//! Weather API service library.
//!
//! Provides endpoints for:
//! - `GET /api/v1/weather/current` - Current-hour readings, fetched on demand
//! - `GET /api/v1/weather/daily-average` - Per-day averages
//! - `GET /api/v1/weather/source-deviation` - Provider comparison for one day
//! - `GET /api/v1/weather/consensus` - Persisted consensus series
//! - `GET /api/v1/weather/search` - Location search
//! - `POST /api/v1/pipeline/run` - Run the ETL pipeline
//! - `GET /health`, `GET /metrics`

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use state::AppState;

/// Build the HTTP router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/weather/current", get(handlers::current_weather_handler))
        .route(
            "/api/v1/weather/daily-average",
            get(handlers::daily_average_handler),
        )
        .route(
            "/api/v1/weather/source-deviation",
            get(handlers::source_deviation_handler),
        )
        .route("/api/v1/weather/consensus", get(handlers::consensus_handler))
        .route("/api/v1/weather/search", get(handlers::search_handler))
        .route("/api/v1/pipeline/run", post(handlers::run_pipeline_handler))
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Start the HTTP server.
pub async fn start_server(state: Arc<AppState>, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port = port, "Starting weather API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
