//! Wazuh adapter (REST alerts API)

use super::fields::{lookup, string_field, timestamp_field};
use super::{build_client, send_fetch, send_login, BackendAdapter};
use crate::alert::{Alert, BackendKind};
use crate::config::{ConnectorSettings, Credentials};
use crate::error::{ConnectorError, Result};
use crate::severity;
use crate::stream::AlertStream;
use crate::time_range::TimeRange;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const LOGIN_PATH: &str = "/security/user/authenticate";
const ALERTS_PATH: &str = "/alerts";
const STREAM_PATH: &str = "/alerts/event-stream";

pub struct WazuhAdapter {
    credentials: Credentials,
    client: reqwest::Client,
    timeout: Duration,
    limit: u32,
}

impl WazuhAdapter {
    pub fn new(credentials: Credentials, settings: &ConnectorSettings) -> Result<Self> {
        Ok(Self {
            credentials,
            client: build_client(settings)?,
            timeout: settings.request_timeout,
            limit: settings.fetch_limit,
        })
    }

    /// `q` filter selecting alerts at or after `start`
    pub fn timestamp_filter(start: DateTime<Utc>) -> String {
        format!("timestamp>={}", start.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    async fn try_fetch(&self, range: &TimeRange) -> Result<Vec<Alert>> {
        let filter = Self::timestamp_filter(range.start_from(Utc::now()));
        tracing::debug!(backend = "wazuh", %filter, "listing alerts");

        let limit = self.limit.to_string();
        let request = self
            .client
            .get(self.credentials.endpoint(ALERTS_PATH))
            .bearer_auth(&self.credentials.token)
            .timeout(self.timeout)
            .query(&[("limit", limit.as_str()), ("sort", "-timestamp"), ("q", filter.as_str())]);

        let body = send_fetch(BackendKind::Wazuh, request).await?;
        let document: Value = serde_json::from_str(&body).map_err(|e| ConnectorError::Transport {
            backend: BackendKind::Wazuh,
            reason: format!("malformed alerts response: {}", e),
        })?;
        Ok(parse_alerts(document))
    }
}

#[async_trait]
impl BackendAdapter for WazuhAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Wazuh
    }

    async fn authenticate(&self) -> Result<()> {
        let request = self
            .client
            .get(self.credentials.endpoint(LOGIN_PATH))
            .bearer_auth(&self.credentials.token)
            .timeout(self.timeout);
        send_login(BackendKind::Wazuh, request).await
    }

    async fn fetch_window(&self, range: &TimeRange) -> Vec<Alert> {
        match self.try_fetch(range).await {
            Ok(alerts) => {
                tracing::debug!(backend = "wazuh", count = alerts.len(), "fetched alerts");
                alerts
            }
            Err(e) => {
                tracing::warn!(backend = "wazuh", error = %e, "fetch failed, returning no alerts");
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
        AlertStream::open(BackendKind::Wazuh, request, cancel).await
    }
}

/// Extract alert records from an alerts API response
pub fn parse_alerts(document: Value) -> Vec<Alert> {
    let items = match document {
        Value::Array(items) => items,
        mut other => ["/data/affected_items", "/data/items"]
            .iter()
            .find_map(|path| match other.pointer_mut(path) {
                Some(Value::Array(items)) => Some(std::mem::take(items)),
                _ => None,
            })
            .unwrap_or_default(),
    };

    items
        .into_iter()
        .filter(Value::is_object)
        .map(parse_record)
        .collect()
}

/// Map one Wazuh alert onto the common schema
pub fn parse_record(record: Value) -> Alert {
    let id = string_field(&record, &["/id", "/_id"]).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let severity = severity::normalize(BackendKind::Wazuh, lookup(&record, &["/rule/level"]));
    let timestamp = timestamp_field(&record, &["/timestamp", "/@timestamp"]);
    let description = string_field(&record, &["/rule/description", "/full_log"]).unwrap_or_default();
    let source_ip = string_field(&record, &["/data/srcip", "/data/src_ip"]);
    let destination_ip = string_field(&record, &["/data/dstip", "/data/dest_ip"]);
    let alert_type = string_field(&record, &["/rule/groups/0", "/decoder/name"]);

    let mut alert = Alert::new(id, BackendKind::Wazuh, severity, timestamp, description)
        .with_addresses(source_ip, destination_ip);
    alert.alert_type = alert_type;
    alert.with_raw(record)
}
