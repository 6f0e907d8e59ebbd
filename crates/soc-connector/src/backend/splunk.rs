//! Splunk adapter (search/export API)

use super::fields::{lookup, string_field, timestamp_field, unwrap_envelope};
use super::{build_client, send_fetch, send_login, BackendAdapter};
use crate::alert::{Alert, BackendKind};
use crate::config::{ConnectorSettings, Credentials};
use crate::error::Result;
use crate::severity;
use crate::stream::AlertStream;
use crate::time_range::TimeRange;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const LOGIN_PATH: &str = "/services/auth/login";
const EXPORT_PATH: &str = "/services/search/jobs/export";
const STREAM_PATH: &str = "/services/collector/event";

const SEVERITY_FILTER: &str = r#"severity IN ("critical", "high", "medium", "low")"#;
const RESULT_FIELDS: &str = "id, severity, timestamp, message, src_ip, dest_ip, event_type";

pub struct SplunkAdapter {
    credentials: Credentials,
    client: reqwest::Client,
    timeout: Duration,
}

impl SplunkAdapter {
    pub fn new(credentials: Credentials, settings: &ConnectorSettings) -> Result<Self> {
        Ok(Self {
            credentials,
            client: build_client(settings)?,
            timeout: settings.request_timeout,
        })
    }

    /// Search language query for a look-back window
    pub fn search_query(range: &TimeRange) -> String {
        format!(
            "search index=* earliest=-{} | where {} | fields {}",
            range, SEVERITY_FILTER, RESULT_FIELDS
        )
    }

    async fn try_fetch(&self, range: &TimeRange) -> Result<Vec<Alert>> {
        let search = Self::search_query(range);
        tracing::debug!(backend = "splunk", %search, "exporting search results");

        let request = self
            .client
            .post(self.credentials.endpoint(EXPORT_PATH))
            .bearer_auth(&self.credentials.token)
            .timeout(self.timeout)
            .form(&[("search", search.as_str()), ("output_mode", "json")]);

        let body = send_fetch(BackendKind::Splunk, request).await?;
        Ok(parse_export(&body))
    }
}

#[async_trait]
impl BackendAdapter for SplunkAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Splunk
    }

    async fn authenticate(&self) -> Result<()> {
        let request = self
            .client
            .post(self.credentials.endpoint(LOGIN_PATH))
            .bearer_auth(&self.credentials.token)
            .timeout(self.timeout);
        send_login(BackendKind::Splunk, request).await
    }

    async fn fetch_window(&self, range: &TimeRange) -> Vec<Alert> {
        match self.try_fetch(range).await {
            Ok(alerts) => {
                tracing::debug!(backend = "splunk", count = alerts.len(), "fetched alerts");
                alerts
            }
            Err(e) => {
                tracing::warn!(backend = "splunk", error = %e, "fetch failed, returning no alerts");
                Vec::new()
            }
        }
    }

    async fn open_stream(&self, cancel: CancellationToken) -> Result<AlertStream> {
        let request = self
            .client
            .get(self.credentials.endpoint(STREAM_PATH))
            .bearer_auth(&self.credentials.token)
            .header(reqwest::header::ACCEPT, "text/event-stream");
        AlertStream::open(BackendKind::Splunk, request, cancel).await
    }
}

/// Parse an export body: one JSON object per line, optionally wrapped in `result`
pub fn parse_export(body: &str) -> Vec<Alert> {
    let mut alerts = Vec::new();
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(backend = "splunk", error = %e, "skipping unparseable export line");
                continue;
            }
        };

        // Some deployments answer with one document holding a `results` array
        if let Some(results) = value.get("results").and_then(Value::as_array) {
            alerts.extend(results.iter().filter(|r| r.is_object()).cloned().map(parse_record));
            continue;
        }

        let record = unwrap_envelope(value);
        if record.is_object() {
            alerts.push(parse_record(record));
        }
    }
    alerts
}

/// Map one Splunk result onto the common schema
pub fn parse_record(record: Value) -> Alert {
    let id = string_field(&record, &["/id", "/_cd"]).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let severity = severity::normalize(BackendKind::Splunk, lookup(&record, &["/severity"]));
    let timestamp = timestamp_field(&record, &["/timestamp", "/_time"]);
    let description = string_field(&record, &["/message", "/_raw"]).unwrap_or_default();
    let source_ip = string_field(&record, &["/src_ip", "/src"]);
    let destination_ip = string_field(&record, &["/dest_ip", "/dest"]);
    let alert_type = string_field(&record, &["/event_type", "/sourcetype"]);

    let mut alert = Alert::new(id, BackendKind::Splunk, severity, timestamp, description)
        .with_addresses(source_ip, destination_ip);
    alert.alert_type = alert_type;
    alert.with_raw(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::Severity;
    use serde_json::json;

    #[test]
    fn test_search_query() {
        let query = SplunkAdapter::search_query(&"5m".parse().unwrap());
        assert!(query.starts_with("search index=* earliest=-5m | where severity IN ("));
        assert!(query.ends_with("| fields id, severity, timestamp, message, src_ip, dest_ip, event_type"));
    }

    #[test]
    fn test_parse_record_primary_fields() {
        let record = json!({
            "id": "evt-1",
            "severity": "critical",
            "timestamp": "2024-03-01T12:00:00Z",
            "message": "malware beacon",
            "src_ip": "10.0.0.5",
            "dest_ip": "203.0.113.9",
            "event_type": "c2"
        });
        let alert = parse_record(record.clone());
        assert_eq!(alert.id, "evt-1");
        assert_eq!(alert.source, BackendKind::Splunk);
        assert_eq!(alert.severity, Severity::CRITICAL);
        assert_eq!(alert.description, "malware beacon");
        assert_eq!(alert.source_ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(alert.destination_ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(alert.alert_type.as_deref(), Some("c2"));
        assert_eq!(alert.raw_data, record);
    }

    #[test]
    fn test_parse_record_fallbacks() {
        let alert = parse_record(json!({
            "_cd": "12:345",
            "_time": "2024-03-01T12:00:00.000+00:00",
            "_raw": "raw line",
            "src": "10.1.1.1",
            "sourcetype": "syslog"
        }));
        assert_eq!(alert.id, "12:345");
        assert_eq!(alert.severity, Severity::INFO);
        assert_eq!(alert.timestamp.timestamp(), 1_709_294_400);
        assert_eq!(alert.description, "raw line");
        assert_eq!(alert.source_ip.as_deref(), Some("10.1.1.1"));
        assert_eq!(alert.alert_type.as_deref(), Some("syslog"));
    }

    #[test]
    fn test_missing_id_is_generated() {
        let a = parse_record(json!({"severity": "low"}));
        let b = parse_record(json!({"severity": "low"}));
        assert!(!a.id.is_empty());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_parse_export_lines() {
        let body = concat!(
            "{\"preview\":false,\"result\":{\"id\":\"1\",\"severity\":\"high\"}}\n",
            "\n",
            "garbage\n",
            "{\"id\":\"2\",\"severity\":\"low\"}\n",
        );
        let alerts = parse_export(body);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].id, "1");
        assert_eq!(alerts[0].severity, Severity::HIGH);
        assert_eq!(alerts[1].id, "2");
    }

    #[test]
    fn test_parse_export_results_document() {
        let body = r#"{"results":[{"id":"a","severity":"medium"},{"id":"b"}]}"#;
        let alerts = parse_export(body);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].severity, Severity::MEDIUM);
        assert_eq!(alerts[1].severity, Severity::INFO);
    }
}
