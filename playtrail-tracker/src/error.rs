//! Error types for playtrail-tracker
//!
//! Every fault a poll cycle can hit maps to one [`TrackerError`] variant. The
//! variant decides the category string written to the error log.

use thiserror::Error;

/// Upstream telemetry call failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Provider error{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
pub struct ProviderError {
    /// HTTP status returned by the provider, when a response was received
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Failure before any HTTP response (DNS, TLS, timeout, body decode)
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }
}

/// A sample that cannot become a snapshot
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Main error type for the tracker
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// History store or error log read/write failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] playtrail_common::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Startup configuration is incomplete or unreadable
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TrackerError {
    /// Category recorded in the error log
    ///
    /// Provider faults use the upstream status code (`"N/A"` without one).
    pub fn category(&self) -> String {
        match self {
            TrackerError::Provider(e) => e
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            TrackerError::Persistence(_) => "persistence".to_string(),
            TrackerError::Validation(_) => "validation".to_string(),
            TrackerError::Config(_) => "config".to_string(),
            TrackerError::Internal(_) => "internal".to_string(),
        }
    }
}

/// Convenience Result type using the tracker Error
pub type Result<T> = std::result::Result<T, TrackerError>;
