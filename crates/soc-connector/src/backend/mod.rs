//! Backend Adapters
//!
//! One adapter per SIEM product. Each owns its credentials and HTTP client,
//! authenticates, fetches a time window of alerts and opens a live stream.
//! The set of backends is closed: adding one means adding a [`Backend`]
//! variant.

pub mod fields;
pub mod splunk;
pub mod wazuh;

pub use splunk::SplunkAdapter;
pub use wazuh::WazuhAdapter;

use crate::alert::{Alert, BackendKind};
use crate::config::{ConnectorSettings, Credentials};
use crate::error::{ConnectorError, Result};
use crate::stream::AlertStream;
use crate::time_range::TimeRange;
use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Capability shared by every SIEM backend
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Whether `open_stream` is available for this backend
    fn supports_streaming(&self) -> bool {
        true
    }

    /// Issue the backend's login call. Never retries.
    async fn authenticate(&self) -> Result<()>;

    /// Alerts inside the window. Transport and parse failures yield an empty list.
    async fn fetch_window(&self, range: &TimeRange) -> Vec<Alert>;

    /// Open the live event stream; the caller owns reconnection
    async fn open_stream(&self, cancel: CancellationToken) -> Result<AlertStream>;
}

/// Closed set of supported backends
pub enum Backend {
    Splunk(SplunkAdapter),
    Wazuh(WazuhAdapter),
}

impl Backend {
    pub fn new(kind: BackendKind, credentials: Credentials, settings: &ConnectorSettings) -> Result<Self> {
        Ok(match kind {
            BackendKind::Splunk => Backend::Splunk(SplunkAdapter::new(credentials, settings)?),
            BackendKind::Wazuh => Backend::Wazuh(WazuhAdapter::new(credentials, settings)?),
        })
    }

    fn adapter(&self) -> &dyn BackendAdapter {
        match self {
            Backend::Splunk(adapter) => adapter,
            Backend::Wazuh(adapter) => adapter,
        }
    }
}

#[async_trait]
impl BackendAdapter for Backend {
    fn kind(&self) -> BackendKind {
        self.adapter().kind()
    }

    fn supports_streaming(&self) -> bool {
        self.adapter().supports_streaming()
    }

    async fn authenticate(&self) -> Result<()> {
        self.adapter().authenticate().await
    }

    async fn fetch_window(&self, range: &TimeRange) -> Vec<Alert> {
        self.adapter().fetch_window(range).await
    }

    async fn open_stream(&self, cancel: CancellationToken) -> Result<AlertStream> {
        self.adapter().open_stream(cancel).await
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Backend").field(&self.kind()).finish()
    }
}

/// Parse one native record with the given backend's rules
pub fn parse_record(kind: BackendKind, record: Value) -> Alert {
    match kind {
        BackendKind::Splunk => splunk::parse_record(record),
        BackendKind::Wazuh => wazuh::parse_record(record),
    }
}

// =============================================================================
// Shared HTTP plumbing
// =============================================================================

pub(crate) fn build_client(settings: &ConnectorSettings) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .connect_timeout(settings.request_timeout)
        .build()?;
    Ok(client)
}

/// Send an authentication request and map any failure to `Authentication`
pub(crate) async fn send_login(kind: BackendKind, request: reqwest::RequestBuilder) -> Result<()> {
    let response = request.send().await.map_err(|e| ConnectorError::Authentication {
        backend: kind,
        reason: e.to_string(),
    })?;

    if !response.status().is_success() {
        return Err(ConnectorError::Authentication {
            backend: kind,
            reason: response.status().to_string(),
        });
    }

    tracing::debug!(backend = %kind, "authenticated");
    Ok(())
}

/// Send a fetch request and return the body of a successful response
pub(crate) async fn send_fetch(kind: BackendKind, request: reqwest::RequestBuilder) -> Result<String> {
    let transport = |e: reqwest::Error| ConnectorError::Transport {
        backend: kind,
        reason: e.to_string(),
    };

    let response = request.send().await.map_err(transport)?;
    if !response.status().is_success() {
        return Err(ConnectorError::UnexpectedStatus {
            backend: kind,
            status: response.status().to_string(),
        });
    }
    response.text().await.map_err(transport)
}
