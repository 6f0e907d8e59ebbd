//! Request/response channel into the monitor
//!
//! Requests are JSON objects tagged by `action`, e.g.
//! `{"action":"toggleMonitoring","start":true}`.

use crate::error::{MonitorError, Result};
use crate::monitor::SecurityMonitor;
use crate::state::StatusSnapshot;
use serde::{Deserialize, Serialize};
use soc_connector::SiemConfig;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum MonitorRequest {
    GetStatus,
    UpdateConfig { config: SiemConfig },
    ToggleMonitoring { start: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MonitorResponse {
    Status(StatusSnapshot),
    Ack {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl MonitorResponse {
    pub fn ok() -> Self {
        MonitorResponse::Ack {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl std::fmt::Display) -> Self {
        MonitorResponse::Ack {
            success: false,
            error: Some(error.to_string()),
        }
    }
}

impl From<Result<()>> for MonitorResponse {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => Self::failed(e),
        }
    }
}

/// A request paired with its reply slot
pub type Envelope = (MonitorRequest, oneshot::Sender<MonitorResponse>);

/// Cloneable sender side of the channel
#[derive(Clone)]
pub struct MonitorClient {
    tx: mpsc::Sender<Envelope>,
}

impl MonitorClient {
    pub async fn request(&self, request: MonitorRequest) -> Result<MonitorResponse> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((request, reply_tx))
            .await
            .map_err(|_| MonitorError::ChannelClosed)?;
        reply_rx.await.map_err(|_| MonitorError::ChannelClosed)
    }

    pub async fn get_status(&self) -> Result<StatusSnapshot> {
        match self.request(MonitorRequest::GetStatus).await? {
            MonitorResponse::Status(status) => Ok(status),
            MonitorResponse::Ack { error, .. } => Err(MonitorError::Store(
                error.unwrap_or_else(|| "unexpected acknowledgement".into()),
            )),
        }
    }
}

pub fn channel(buffer: usize) -> (MonitorClient, mpsc::Receiver<Envelope>) {
    let (tx, rx) = mpsc::channel(buffer);
    (MonitorClient { tx }, rx)
}

/// Apply one request to the monitor
pub async fn handle_request(monitor: &SecurityMonitor, request: MonitorRequest) -> MonitorResponse {
    match request {
        MonitorRequest::GetStatus => MonitorResponse::Status(monitor.get_status()),
        MonitorRequest::UpdateConfig { config } => monitor.update_config(config).await.into(),
        MonitorRequest::ToggleMonitoring { start } => monitor.toggle_monitoring(start).await.into(),
    }
}

/// Serve requests until the channel closes or `cancel` fires.
///
/// Each request runs in its own task so a slow connect never blocks a
/// status query.
pub async fn serve_requests(
    monitor: Arc<SecurityMonitor>,
    mut requests: mpsc::Receiver<Envelope>,
    cancel: CancellationToken,
) {
    loop {
        let (request, reply) = tokio::select! {
            _ = cancel.cancelled() => break,
            next = requests.recv() => match next {
                Some(envelope) => envelope,
                None => break,
            },
        };

        tracing::debug!(?request, "monitor request");
        let monitor = monitor.clone();
        tokio::spawn(async move {
            let response = handle_request(&monitor, request).await;
            let _ = reply.send(response);
        });
    }
    tracing::debug!("request channel closed");
}
