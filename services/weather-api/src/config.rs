//! Service configuration.

use etl::SourceWeights;
use sources::SourcesConfig;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://weather.db";
pub const DEFAULT_PORT: u16 = 8000;

/// Everything needed to build [`crate::state::AppState`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_url: String,
    pub port: u16,
    pub sources: SourcesConfig,
    pub weights: SourceWeights,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            port: DEFAULT_PORT,
            sources: SourcesConfig::default(),
            weights: SourceWeights::default(),
        }
    }
}

impl ServiceConfig {
    /// Database and port from the command line; providers and weights from
    /// the environment.
    pub fn new(database_url: impl Into<String>, port: u16) -> Self {
        Self {
            database_url: database_url.into(),
            port,
            sources: SourcesConfig::from_env(),
            weights: SourceWeights::from_env(),
        }
    }
}
