//! Common types and utilities shared across the weather ETL crates.

pub mod error;
pub mod location;
pub mod observation;
pub mod source;
pub mod time;

pub use error::{EtlError, EtlResult};
pub use location::{resolve_location, validate_coordinates, LocationCandidate};
pub use observation::{ConsensusObservation, WeatherObservation};
pub use source::WeatherSource;
pub use time::{format_timestamp, parse_date, parse_timestamp, truncate_to_second, TimeParseError};
