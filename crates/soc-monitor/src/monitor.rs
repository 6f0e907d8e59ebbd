//! Security monitor service
//!
//! Owns the connector and the persisted state, and implements the operations
//! the host exposes: start/stop monitoring, periodic checks, status and
//! configuration updates.

use crate::config::{validate_config, MonitorOptions};
use crate::error::{MonitorError, Result};
use crate::handler::HistoryHandler;
use crate::notify::NotificationSink;
use crate::state::{SharedState, StatusSnapshot};
use crate::store::StateStore;
use chrono::Utc;
use soc_connector::{SiemConfig, SiemConnector};
use std::sync::Arc;

pub struct SecurityMonitor {
    connector: Arc<SiemConnector>,
    state: Arc<SharedState>,
    options: MonitorOptions,
    lifecycle: tokio::sync::Mutex<()>,
}

impl SecurityMonitor {
    pub fn new(store: Arc<dyn StateStore>, notifier: Arc<dyn NotificationSink>, options: MonitorOptions) -> Self {
        let connector = Arc::new(SiemConnector::new(options.connector.clone()));
        let state = Arc::new(SharedState::new(store));
        connector.on_new_alert(Arc::new(HistoryHandler::new(state.clone(), notifier)));

        Self {
            connector,
            state,
            options,
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn connector(&self) -> &Arc<SiemConnector> {
        &self.connector
    }

    pub fn options(&self) -> &MonitorOptions {
        &self.options
    }

    /// Restore persisted state. Returns whether anything was found.
    pub async fn load_state(&self) -> Result<bool> {
        let found = self.state.load().await?;
        if found {
            let state = self.state.snapshot();
            tracing::info!(
                is_monitoring = state.is_monitoring,
                alerts = state.alert_count,
                "restored monitor state"
            );
        }
        Ok(found)
    }

    pub fn is_monitoring(&self) -> bool {
        self.state.update(|state| state.is_monitoring)
    }

    /// Connect to the configured backends, run an initial check and persist.
    ///
    /// A no-op when already monitoring with live connections.
    pub async fn start_monitoring(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        if self.is_monitoring() && !self.connector.connected_backends().is_empty() {
            return Ok(());
        }

        let config = self.state.update(|state| state.siem_config.clone());
        if config.configured_backends().is_empty() {
            return Err(MonitorError::InvalidConfig("no SIEM backends configured".into()));
        }

        let report = self.connector.connect(&config).await?;
        for (backend, reason) in &report.failed {
            tracing::warn!(%backend, %reason, "backend unavailable, monitoring without it");
        }

        self.state.update(|state| state.is_monitoring = true);
        tracing::info!(backends = ?report.connected, "security monitoring started");

        self.check_now().await?;
        Ok(())
    }

    pub async fn stop_monitoring(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        self.connector.disconnect().await;
        self.state.update(|state| state.is_monitoring = false);
        tracing::info!("security monitoring stopped");
        self.state.persist().await
    }

    /// Poll all connected backends for the configured window.
    ///
    /// `lastCheck` advances even when every backend fails.
    pub async fn check_now(&self) -> Result<usize> {
        tracing::debug!(range = %self.options.time_range, "checking for new security alerts");
        let alerts = self.connector.fetch_alerts(&self.options.time_range).await;

        let checked_at = self.connector.last_checked().unwrap_or_else(Utc::now);
        self.state.update(|state| state.last_check = Some(checked_at));
        self.state.persist().await?;
        Ok(alerts.len())
    }

    pub fn get_status(&self) -> StatusSnapshot {
        let state = self.state.snapshot();
        StatusSnapshot {
            is_monitoring: state.is_monitoring,
            last_check: state.last_check,
            alert_count: state.alert_count,
            alerts: state.alerts.to_vec(),
            connected_backends: self.connector.connected_backends(),
        }
    }

    /// Validate, persist and apply a new SIEM configuration.
    ///
    /// While monitoring, connections are rebuilt with the new settings.
    pub async fn update_config(&self, config: SiemConfig) -> Result<()> {
        validate_config(&config)?;

        let _guard = self.lifecycle.lock().await;
        self.state.update(|state| state.siem_config = config.clone());
        self.state.persist().await?;

        if self.is_monitoring() {
            let report = self.connector.connect(&config).await?;
            tracing::info!(backends = ?report.connected, "reconnected with updated configuration");
        } else {
            self.connector.disconnect().await;
        }
        Ok(())
    }

    pub async fn toggle_monitoring(&self, start: bool) -> Result<()> {
        if start {
            self.start_monitoring().await
        } else {
            self.stop_monitoring().await
        }
    }

    /// Close every connection, keeping the persisted monitoring flag
    pub async fn shutdown(&self) {
        self.connector.disconnect().await;
        if let Err(e) = self.state.persist().await {
            tracing::warn!(error = %e, "failed to save state on shutdown");
        }
    }
}
