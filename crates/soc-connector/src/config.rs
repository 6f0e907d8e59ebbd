//! Connector configuration

use crate::alert::BackendKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shortest delay the supervisor will ever wait between reconnect attempts.
pub const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(10);

/// SIEM backend configuration as kept by the host's configuration store.
///
/// A backend is configured iff both its URL and token are non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiemConfig {
    #[serde(default)]
    pub splunk_url: String,
    #[serde(default)]
    pub splunk_token: String,
    #[serde(default)]
    pub wazuh_url: String,
    #[serde(default)]
    pub wazuh_token: String,
}

impl SiemConfig {
    /// Credentials for the given backend, if it is configured
    pub fn credentials(&self, backend: BackendKind) -> Option<Credentials> {
        let (url, token) = match backend {
            BackendKind::Splunk => (&self.splunk_url, &self.splunk_token),
            BackendKind::Wazuh => (&self.wazuh_url, &self.wazuh_token),
        };
        let url = url.trim();
        let token = token.trim();
        if url.is_empty() || token.is_empty() {
            return None;
        }
        Some(Credentials::new(url, token))
    }

    /// Every configured backend with its credentials
    pub fn configured_backends(&self) -> Vec<(BackendKind, Credentials)> {
        BackendKind::ALL
            .iter()
            .filter_map(|kind| self.credentials(*kind).map(|c| (*kind, c)))
            .collect()
    }

    /// URLs that are set, regardless of whether a token accompanies them
    pub fn urls(&self) -> Vec<(BackendKind, &str)> {
        [
            (BackendKind::Splunk, self.splunk_url.trim()),
            (BackendKind::Wazuh, self.wazuh_url.trim()),
        ]
        .into_iter()
        .filter(|(_, url)| !url.is_empty())
        .collect()
    }
}

/// Backend URL plus bearer token
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub url: String,
    pub token: String,
}

impl Credentials {
    pub fn new(url: &str, token: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Absolute endpoint for a path under the backend base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Reconnect delay policy for stream supervisors.
///
/// `initial == max` gives a fixed delay; otherwise the delay doubles per
/// consecutive failure and is capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn fixed(delay: Duration) -> Self {
        Self { initial: delay, max: delay }
    }

    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// Delay before reconnect attempt number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let initial = self.initial.max(MIN_RECONNECT_DELAY);
        if self.max <= initial {
            return initial;
        }
        let factor = 2u32.saturating_pow(attempt.min(16));
        initial
            .checked_mul(factor)
            .map_or(self.max, |d| d.min(self.max))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5))
    }
}

/// Runtime tuning for the connector
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    /// Timeout applied to authenticate and fetch requests
    pub request_timeout: Duration,
    /// Reconnect policy for live streams
    pub reconnect: Backoff,
    /// Start a stream supervisor for each connected backend
    pub streaming_enabled: bool,
    /// Page size requested from list-style APIs
    pub fetch_limit: u32,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            reconnect: Backoff::default(),
            streaming_enabled: true,
            fetch_limit: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_backends_requires_url_and_token() {
        let config = SiemConfig {
            splunk_url: "https://splunk.local:8089".into(),
            splunk_token: "".into(),
            wazuh_url: "https://wazuh.local:55000/".into(),
            wazuh_token: "tok".into(),
        };

        let configured = config.configured_backends();
        assert_eq!(configured.len(), 1);
        assert_eq!(configured[0].0, BackendKind::Wazuh);
        assert_eq!(configured[0].1.url, "https://wazuh.local:55000");
    }

    #[test]
    fn test_whitespace_only_fields_are_unconfigured() {
        let config = SiemConfig {
            splunk_url: "  ".into(),
            splunk_token: "tok".into(),
            ..Default::default()
        };
        assert!(config.configured_backends().is_empty());
    }

    #[test]
    fn test_credentials_debug_hides_token() {
        let creds = Credentials::new("https://splunk.local", "super-secret");
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("splunk.local"));
    }

    #[test]
    fn test_config_uses_camel_case_keys() {
        let config: SiemConfig = serde_json::from_str(
            r#"{"splunkUrl":"https://s","splunkToken":"a","wazuhUrl":""}"#,
        )
        .unwrap();
        assert_eq!(config.splunk_url, "https://s");
        assert_eq!(config.wazuh_token, "");
    }

    #[test]
    fn test_fixed_backoff() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(0), Duration::from_secs(5));
        assert_eq!(backoff.delay(10), Duration::from_secs(5));
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let backoff = Backoff::exponential(Duration::from_secs(1), Duration::from_secs(30));
        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(3), Duration::from_secs(8));
        assert_eq!(backoff.delay(20), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_delay_is_never_instant() {
        let backoff = Backoff::fixed(Duration::ZERO);
        assert_eq!(backoff.delay(0), MIN_RECONNECT_DELAY);
    }
}
