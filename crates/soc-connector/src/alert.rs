//! Normalized alert schema

use crate::severity::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SIEM backend identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Search/export style API
    Splunk,
    /// REST alerts API
    Wazuh,
}

impl BackendKind {
    pub const ALL: [BackendKind; 2] = [BackendKind::Splunk, BackendKind::Wazuh];

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Splunk => "splunk",
            BackendKind::Wazuh => "wazuh",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert normalized from any backend.
///
/// Built once at parse time and handed to consumers by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub source: BackendKind,
    #[serde(default)]
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub alert_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_ip: Option<String>,
    /// Backend-native payload kept for audit, never reparsed
    #[serde(default)]
    pub raw_data: serde_json::Value,
}

impl Alert {
    /// Minimal alert; optional fields start empty
    pub fn new(
        id: impl Into<String>,
        source: BackendKind,
        severity: Severity,
        timestamp: DateTime<Utc>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source,
            severity,
            timestamp,
            description: description.into(),
            alert_type: None,
            source_ip: None,
            destination_ip: None,
            raw_data: serde_json::Value::Null,
        }
    }

    pub fn with_type(mut self, alert_type: impl Into<String>) -> Self {
        self.alert_type = Some(alert_type.into());
        self
    }

    pub fn with_addresses(mut self, source_ip: Option<String>, destination_ip: Option<String>) -> Self {
        self.source_ip = source_ip;
        self.destination_ip = destination_ip;
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw_data = raw;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_serializes_with_camel_case_and_type() {
        let alert = Alert::new("a-1", BackendKind::Wazuh, Severity::HIGH, Utc::now(), "ssh brute force")
            .with_type("authentication_failed")
            .with_addresses(Some("10.0.0.5".into()), None);

        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["source"], "wazuh");
        assert_eq!(value["severity"], 2);
        assert_eq!(value["type"], "authentication_failed");
        assert_eq!(value["sourceIp"], "10.0.0.5");
        assert!(value.get("destinationIp").is_none());
        assert!(value.get("rawData").is_some());
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(BackendKind::Splunk.to_string(), "splunk");
        assert_eq!(BackendKind::Wazuh.to_string(), "wazuh");
    }
}
