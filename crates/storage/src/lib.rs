//! Storage for the weather ETL pipeline.
//!
//! Provides:
//! - [`WeatherStore`]: SQLite pool, schema and scoped sessions
//! - The loader: idempotent, atomic upserts of observations and consensus
//! - Read queries used by the API (current, daily averages, source deviation)

mod loader;
pub mod queries;
pub mod store;

pub use queries::{DailyAverage, SourceAverage, COORD_TOLERANCE};
pub use store::WeatherStore;
