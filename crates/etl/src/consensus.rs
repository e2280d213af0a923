//! Weighted multi-source temperature consensus.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use weather_common::{ConsensusObservation, WeatherObservation, WeatherSource};

/// Default weight of the primary provider (Yr.no).
pub const DEFAULT_YR_WEIGHT: f64 = 0.6;
/// Default weight of the secondary provider (Open-Meteo).
pub const DEFAULT_OPEN_METEO_WEIGHT: f64 = 0.4;

/// Reliability weight per provider.
///
/// Weights are not required to sum to 1; a consensus value is always
/// normalized by the weights of the sources actually present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceWeights {
    pub yr_no: f64,
    pub open_meteo: f64,
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            yr_no: DEFAULT_YR_WEIGHT,
            open_meteo: DEFAULT_OPEN_METEO_WEIGHT,
        }
    }
}

impl SourceWeights {
    /// Load weights from `WEIGHT_YR` / `WEIGHT_OPEN_METEO`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            yr_no: env_weight("WEIGHT_YR", defaults.yr_no),
            open_meteo: env_weight("WEIGHT_OPEN_METEO", defaults.open_meteo),
        }
    }

    pub fn weight(&self, source: WeatherSource) -> f64 {
        match source {
            WeatherSource::YrNo => self.yr_no,
            WeatherSource::OpenMeteo => self.open_meteo,
        }
    }
}

fn env_weight(key: &str, default: f64) -> f64 {
    match std::env::var(key) {
        Ok(raw) => match raw.parse::<f64>() {
            Ok(w) if w.is_finite() && w >= 0.0 => w,
            _ => {
                warn!(key, value = %raw, "Ignoring invalid source weight");
                default
            }
        },
        Err(_) => default,
    }
}

#[derive(Debug)]
struct Group {
    lat: f64,
    lon: f64,
    temperatures: BTreeMap<WeatherSource, f64>,
}

/// Computes consensus series with a fixed set of weights.
#[derive(Debug, Clone, Default)]
pub struct ConsensusEngine {
    weights: SourceWeights,
}

impl ConsensusEngine {
    pub fn new(weights: SourceWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &SourceWeights {
        &self.weights
    }

    /// Group observations by timestamp and take the weighted mean per group.
    ///
    /// Output is sorted by timestamp. A group where no source has a finite
    /// temperature and a positive weight yields no entry. If one source
    /// appears several times at a timestamp its last value is used once.
    /// `lat`/`lon` are taken from the first observation of each group.
    pub fn calculate(&self, observations: &[WeatherObservation]) -> Vec<ConsensusObservation> {
        let mut groups: BTreeMap<DateTime<Utc>, Group> = BTreeMap::new();

        for obs in observations {
            let group = groups.entry(obs.timestamp).or_insert_with(|| Group {
                lat: obs.lat,
                lon: obs.lon,
                temperatures: BTreeMap::new(),
            });
            group.temperatures.insert(obs.source, obs.temperature);
        }

        let total = groups.len();
        let consensus: Vec<ConsensusObservation> = groups
            .into_iter()
            .filter_map(|(timestamp, group)| {
                let mut weighted_sum = 0.0;
                let mut weight_sum = 0.0;
                let mut source_count = 0u32;

                for (source, temperature) in group.temperatures {
                    let weight = self.weights.weight(source);
                    if !temperature.is_finite() || weight <= 0.0 {
                        continue;
                    }
                    weighted_sum += temperature * weight;
                    weight_sum += weight;
                    source_count += 1;
                }

                if source_count == 0 {
                    return None;
                }

                Some(ConsensusObservation {
                    timestamp,
                    lat: group.lat,
                    lon: group.lon,
                    weighted_temperature: weighted_sum / weight_sum,
                    source_count,
                })
            })
            .collect();

        debug!(
            groups = total,
            points = consensus.len(),
            "Calculated consensus"
        );
        consensus
    }
}

/// Consensus with the default weights.
pub fn calculate_consensus(observations: &[WeatherObservation]) -> Vec<ConsensusObservation> {
    ConsensusEngine::default().calculate(observations)
}
