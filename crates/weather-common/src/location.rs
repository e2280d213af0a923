//! Location lookup and coordinate validation.

use serde::{Deserialize, Serialize};

use crate::error::{EtlError, EtlResult};

/// A named place returned by the geocoding search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCandidate {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub country: String,
    pub region: Option<String>,
}

/// Fixed name → coordinate table for named locations.
const KNOWN_LOCATIONS: &[(&str, f64, f64)] = &[
    ("oslo", 59.91, 10.75),
    ("bergen", 60.39, 5.32),
    ("trondheim", 63.43, 10.39),
    ("stavanger", 58.97, 5.73),
    ("kristiansand", 58.15, 8.02),
    ("tromsø", 69.65, 18.96),
];

/// Resolve a location name to `(lat, lon)`, case-insensitively.
///
/// Returns `None` for unknown names.
pub fn resolve_location(name: &str) -> Option<(f64, f64)> {
    let needle = name.trim().to_lowercase();
    KNOWN_LOCATIONS
        .iter()
        .find(|(known, _, _)| *known == needle)
        .map(|&(_, lat, lon)| (lat, lon))
}

/// Reject coordinates outside the valid WGS84 ranges.
pub fn validate_coordinates(lat: f64, lon: f64) -> EtlResult<()> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(EtlError::InvalidParameter {
            param: "lat".to_string(),
            message: format!("{} is outside [-90, 90]", lat),
        });
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(EtlError::InvalidParameter {
            param: "lon".to_string(),
            message: format!("{} is outside [-180, 180]", lon),
        });
    }
    Ok(())
}
