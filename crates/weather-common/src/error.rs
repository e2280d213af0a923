//! Error types for the weather ETL pipeline.

use thiserror::Error;

/// Result type alias using EtlError.
pub type EtlResult<T> = Result<T, EtlError>;

/// Primary error type for pipeline and service operations.
#[derive(Debug, Error)]
pub enum EtlError {
    // === Extraction Errors ===
    #[error("Source '{provider}' unavailable: {cause}")]
    SourceUnavailable { provider: String, cause: String },

    // === Transformation Errors ===
    #[error("Malformed payload from '{provider}': {reason}")]
    MalformedPayload { provider: String, reason: String },

    // === Load Errors ===
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    // === Request Errors ===
    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Unknown location: {0}")]
    UnknownLocation(String),

    #[error("Data not available: {0}")]
    DataNotAvailable(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl EtlError {
    pub fn source_unavailable(provider: impl Into<String>, cause: impl ToString) -> Self {
        EtlError::SourceUnavailable {
            provider: provider.into(),
            cause: cause.to_string(),
        }
    }

    pub fn malformed(provider: impl Into<String>, reason: impl ToString) -> Self {
        EtlError::MalformedPayload {
            provider: provider.into(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-readable code, used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            EtlError::SourceUnavailable { .. } => "SourceUnavailable",
            EtlError::MalformedPayload { .. } => "MalformedPayload",
            EtlError::PersistenceFailure(_) => "PersistenceFailure",
            EtlError::InvalidParameter { .. } => "InvalidParameter",
            EtlError::UnknownLocation(_) => "UnknownLocation",
            EtlError::DataNotAvailable(_) => "DataNotAvailable",
            EtlError::InternalError(_) => "InternalError",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            EtlError::InvalidParameter { .. } | EtlError::UnknownLocation(_) => 400,

            EtlError::DataNotAvailable(_) => 404,

            EtlError::SourceUnavailable { .. } => 503,

            _ => 500,
        }
    }
}

impl From<serde_json::Error> for EtlError {
    fn from(err: serde_json::Error) -> Self {
        EtlError::InternalError(format!("JSON error: {}", err))
    }
}
