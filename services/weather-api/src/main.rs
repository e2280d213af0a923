//! Weather ETL service.
//!
//! Serves the weather API and runs the pipeline on demand, or runs the
//! pipeline once for a coordinate and exits.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use weather_api::config::{ServiceConfig, DEFAULT_DATABASE_URL, DEFAULT_PORT};
use weather_api::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "weather-api")]
#[command(about = "Multi-source weather ETL with consensus")]
struct Args {
    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    database_url: String,

    /// HTTP port
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Run the pipeline once for --lat/--lon and exit
    #[arg(long, requires = "lat", requires = "lon")]
    once: bool,

    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    lon: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()?;

    let config = ServiceConfig::new(args.database_url, args.port);
    info!(
        database_url = %config.database_url,
        yr_no_url = %config.sources.yr_no_url,
        open_meteo_url = %config.sources.open_meteo_url,
        weights = ?config.weights,
        "Loaded configuration"
    );

    let state = Arc::new(AppState::new(&config, prometheus_handle).await?);

    if args.once {
        if let (Some(lat), Some(lon)) = (args.lat, args.lon) {
            let report = state.pipeline.run(lat, lon).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        return Ok(());
    }

    weather_api::start_server(state, config.port).await
}
