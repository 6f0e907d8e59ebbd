//! Error types for the security monitor

use soc_connector::ConnectorError;
use thiserror::Error;

/// Monitor error type
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("connector error: {0}")]
    Connector(#[from] ConnectorError),

    #[error("state store error: {0}")]
    Store(String),

    /// Rejected SIEM configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request channel to the monitor service is gone
    #[error("monitor channel closed")]
    ChannelClosed,
}

/// Result type for monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;
