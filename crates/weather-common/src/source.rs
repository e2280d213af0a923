//! Weather data provider identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of providers that produce canonical observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WeatherSource {
    /// MET Norway locationforecast (yr.no)
    #[serde(rename = "yr")]
    YrNo,
    /// Open-Meteo forecast API
    #[serde(rename = "open-meteo")]
    OpenMeteo,
}

impl WeatherSource {
    pub const ALL: [WeatherSource; 2] = [WeatherSource::YrNo, WeatherSource::OpenMeteo];

    /// Identifier stored in the `source` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherSource::YrNo => "yr",
            WeatherSource::OpenMeteo => "open-meteo",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "yr" => Some(WeatherSource::YrNo),
            "open-meteo" => Some(WeatherSource::OpenMeteo),
            _ => None,
        }
    }
}

impl fmt::Display for WeatherSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
