//! Source adapters for the weather ETL pipeline.
//!
//! Provides:
//! - [`SourceAdapter`]: one variant per weather provider (Yr.no, Open-Meteo)
//! - [`LocationSearch`]: free-text geocoding against Open-Meteo
//! - [`SourcesConfig`]: endpoints, identification and timeouts

pub mod adapter;
pub mod config;
pub mod geocoding;

pub use adapter::{OpenMeteoAdapter, RawPayload, SourceAdapter, YrNoAdapter};
pub use config::SourcesConfig;
pub use geocoding::{LocationSearch, GEOCODING_PROVIDER};
