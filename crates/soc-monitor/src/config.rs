//! Monitor configuration

use crate::error::{MonitorError, Result};
use soc_connector::{ConnectorSettings, SiemConfig, TimeRange};
use std::time::Duration;
use url::Url;

/// Runtime options for [`crate::SecurityMonitor`]
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Look-back window for each periodic check
    pub time_range: TimeRange,
    /// Interval between periodic checks
    pub check_interval: Duration,
    pub connector: ConnectorSettings,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            time_range: TimeRange::minutes(5),
            check_interval: Duration::from_secs(300),
            connector: ConnectorSettings::default(),
        }
    }
}

/// Every URL that is set must be an absolute http(s) URL
pub fn validate_config(config: &SiemConfig) -> Result<()> {
    for (backend, raw) in config.urls() {
        let url = Url::parse(raw)
            .map_err(|e| MonitorError::InvalidConfig(format!("{} URL {:?}: {}", backend, raw, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(MonitorError::InvalidConfig(format!(
                "{} URL must use http or https, got {}",
                backend,
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(MonitorError::InvalidConfig(format!("{} URL has no host", backend)));
        }
    }
    Ok(())
}
