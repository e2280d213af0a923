//! Timestamp normalization for provider data.
//!
//! Every timestamp leaving this module is a `DateTime<Utc>`. Strings with an
//! explicit offset are converted; naive strings are taken to already be UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, TimeZone, Utc};

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),
}

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Parse an ISO 8601 timestamp into UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim();

    // Full datetime with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Without timezone (assume UTC)
    for format in NAIVE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

/// Storage representation: RFC 3339, whole seconds, `Z` suffix.
///
/// Fixed width so that lexical order in SQLite matches time order.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Drop sub-second precision, matching what [`format_timestamp`] stores.
pub fn truncate_to_second(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.trunc_subsecs(0)
}

/// Parse a `YYYY-MM-DD` date parameter.
pub fn parse_date(s: &str) -> Result<NaiveDate, TimeParseError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| TimeParseError::InvalidFormat(s.to_string()))
}
