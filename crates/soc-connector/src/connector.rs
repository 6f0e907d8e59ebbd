//! Connector Facade
//!
//! Owns the registry, dispatcher, poll coordinator and stream supervisors
//! and exposes the connect / fetch / subscribe / disconnect surface.

use crate::alert::{Alert, BackendKind};
use crate::backend::{Backend, BackendAdapter};
use crate::config::{ConnectorSettings, SiemConfig};
use crate::dispatcher::{AlertDispatcher, AlertHandler, DispatchStats, HandlerId};
use crate::error::{ConnectorError, Result};
use crate::poller::PollCoordinator;
use crate::registry::{BackendConnectionState, ConnectionRegistry};
use crate::supervisor::{StreamState, StreamSupervisor, SupervisorHandle};
use crate::time_range::TimeRange;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of a successful [`SiemConnector::connect`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectReport {
    pub connected: Vec<BackendKind>,
    pub failed: Vec<(BackendKind, String)>,
}

impl ConnectReport {
    /// Some configured backends failed while others connected
    pub fn is_partial(&self) -> bool {
        !self.connected.is_empty() && !self.failed.is_empty()
    }
}

pub struct SiemConnector {
    settings: ConnectorSettings,
    registry: Arc<ConnectionRegistry>,
    dispatcher: Arc<AlertDispatcher>,
    poller: PollCoordinator,
    backends: RwLock<Vec<Arc<Backend>>>,
    supervisors: Mutex<Vec<SupervisorHandle>>,
    // Serializes connect/disconnect
    lifecycle: tokio::sync::Mutex<()>,
}

impl SiemConnector {
    pub fn new(settings: ConnectorSettings) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Arc::new(AlertDispatcher::new());
        let poller = PollCoordinator::new(registry.clone(), dispatcher.clone());

        Self {
            settings,
            registry,
            dispatcher,
            poller,
            backends: RwLock::new(Vec::new()),
            supervisors: Mutex::new(Vec::new()),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &ConnectorSettings {
        &self.settings
    }

    /// Authenticate every configured backend and start its stream supervisor.
    ///
    /// Any previous connection is torn down first. Backends without
    /// credentials are skipped. Fails only when every configured backend
    /// fails to authenticate.
    pub async fn connect(&self, config: &SiemConfig) -> Result<ConnectReport> {
        let _guard = self.lifecycle.lock().await;
        self.teardown().await;

        let configured = config.configured_backends();
        if configured.is_empty() {
            tracing::info!("no SIEM backends configured");
            return Ok(ConnectReport::default());
        }

        let mut report = ConnectReport::default();
        let mut candidates = Vec::with_capacity(configured.len());
        for (kind, credentials) in configured {
            self.registry.register(kind, credentials.clone());
            match Backend::new(kind, credentials, &self.settings) {
                Ok(backend) => candidates.push(Arc::new(backend)),
                Err(e) => {
                    self.registry.mark_failed(kind, e.to_string());
                    report.failed.push((kind, e.to_string()));
                }
            }
        }

        let attempts = candidates.into_iter().map(|backend| async move {
            let result = backend.authenticate().await;
            (backend, result)
        });

        let mut connected = Vec::new();
        for (backend, result) in join_all(attempts).await {
            let kind = backend.kind();
            match result {
                Ok(()) => {
                    self.registry.mark_connected(kind);
                    tracing::info!(backend = %kind, "backend connected");
                    report.connected.push(kind);
                    connected.push(backend);
                }
                Err(e) => {
                    tracing::warn!(backend = %kind, error = %e, "backend authentication failed");
                    self.registry.mark_failed(kind, e.to_string());
                    report.failed.push((kind, e.to_string()));
                }
            }
        }

        if connected.is_empty() {
            return Err(ConnectorError::AllBackendsFailed(report.failed));
        }

        if self.settings.streaming_enabled {
            let mut supervisors = self.supervisors.lock();
            for backend in connected.iter().filter(|b| b.supports_streaming()) {
                supervisors.push(StreamSupervisor::spawn(
                    backend.clone(),
                    self.registry.clone(),
                    self.dispatcher.clone(),
                    self.settings.reconnect,
                    CancellationToken::new(),
                ));
            }
        }

        *self.backends.write() = connected;
        Ok(report)
    }

    /// Poll every connected backend for `range` and publish the results
    pub async fn fetch_alerts(&self, range: &TimeRange) -> Vec<Alert> {
        let backends = self.backends.read().clone();
        self.poller.poll_once(&backends, range).await
    }

    pub fn on_new_alert(&self, handler: Arc<dyn AlertHandler>) -> HandlerId {
        self.dispatcher.register(handler)
    }

    pub fn remove_alert_handler(&self, id: HandlerId) -> bool {
        self.dispatcher.remove(id)
    }

    /// Stop every stream supervisor and forget all backends. Safe to repeat.
    pub async fn disconnect(&self) {
        let _guard = self.lifecycle.lock().await;
        self.teardown().await;
    }

    async fn teardown(&self) {
        let supervisors = std::mem::take(&mut *self.supervisors.lock());
        let had_backends = !self.registry.is_empty();

        for supervisor in &supervisors {
            supervisor.cancel();
        }
        join_all(supervisors.into_iter().map(SupervisorHandle::shutdown)).await;

        self.backends.write().clear();
        self.registry.clear();

        if had_backends {
            tracing::info!("disconnected from all backends");
        }
    }

    /// Backends eligible for fetch and stream, in stable order
    pub fn connected_backends(&self) -> Vec<BackendKind> {
        self.registry.active_backends().into_iter().collect()
    }

    pub fn connection_states(&self) -> Vec<BackendConnectionState> {
        self.registry.snapshot()
    }

    pub fn stream_states(&self) -> Vec<(BackendKind, StreamState)> {
        self.supervisors
            .lock()
            .iter()
            .map(|handle| (handle.backend(), handle.state()))
            .collect()
    }

    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        self.poller.last_checked()
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }
}

impl Default for SiemConnector {
    fn default() -> Self {
        Self::new(ConnectorSettings::default())
    }
}

impl Drop for SiemConnector {
    fn drop(&mut self) {
        for supervisor in self.supervisors.get_mut().iter() {
            supervisor.cancel();
        }
    }
}
