//! Error types for the SIEM connector

use crate::alert::BackendKind;
use thiserror::Error;

/// Connector error type
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// Backend rejected the credentials or could not be reached at connect time
    #[error("{backend} authentication failed: {reason}")]
    Authentication { backend: BackendKind, reason: String },

    /// Network failure while talking to a backend
    #[error("{backend} transport error: {reason}")]
    Transport { backend: BackendKind, reason: String },

    /// Backend answered with a non-success status
    #[error("{backend} returned {status}")]
    UnexpectedStatus { backend: BackendKind, status: String },

    /// Time range token could not be parsed
    #[error("invalid time range: {0}")]
    InvalidTimeRange(String),

    /// Every configured backend failed to authenticate
    #[error("all configured backends failed to connect: {}", format_failures(.0))]
    AllBackendsFailed(Vec<(BackendKind, String)>),

    /// Operation aborted by disconnect
    #[error("operation cancelled")]
    Cancelled,

    /// HTTP client construction error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

fn format_failures(failures: &[(BackendKind, String)]) -> String {
    failures
        .iter()
        .map(|(backend, reason)| format!("{backend}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for connector operations
pub type Result<T> = std::result::Result<T, ConnectorError>;
