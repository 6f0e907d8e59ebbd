//! Monitor state: bounded alert history, persisted fields, status view

use crate::error::Result;
use crate::store::StateStore;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use soc_connector::{Alert, BackendKind, SiemConfig};
use std::collections::VecDeque;
use std::sync::Arc;

/// Alerts retained in history
pub const HISTORY_CAPACITY: usize = 100;

/// Newest-first list of recent alerts; the oldest falls off past capacity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Alert>", into = "Vec<Alert>")]
pub struct AlertHistory {
    alerts: VecDeque<Alert>,
}

impl AlertHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, alert: Alert) {
        self.alerts.push_front(alert);
        self.alerts.truncate(HISTORY_CAPACITY);
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    pub fn latest(&self) -> Option<&Alert> {
        self.alerts.front()
    }

    pub fn to_vec(&self) -> Vec<Alert> {
        self.alerts.iter().cloned().collect()
    }
}

impl From<Vec<Alert>> for AlertHistory {
    fn from(mut alerts: Vec<Alert>) -> Self {
        alerts.truncate(HISTORY_CAPACITY);
        Self { alerts: alerts.into() }
    }
}

impl From<AlertHistory> for Vec<Alert> {
    fn from(history: AlertHistory) -> Self {
        history.alerts.into()
    }
}

/// Fields written to the state store after every change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    pub is_monitoring: bool,
    pub last_check: Option<DateTime<Utc>>,
    pub alert_count: usize,
    pub alerts: AlertHistory,
    pub siem_config: SiemConfig,
}

impl PersistedState {
    pub fn record(&mut self, alert: Alert) {
        self.alerts.push(alert);
        self.alert_count = self.alerts.len();
    }
}

/// Answer to a status request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub is_monitoring: bool,
    pub last_check: Option<DateTime<Utc>>,
    pub alert_count: usize,
    pub alerts: Vec<Alert>,
    pub connected_backends: Vec<BackendKind>,
}

/// Live state shared between the monitor and its alert handler
pub struct SharedState {
    inner: Mutex<PersistedState>,
    store: Arc<dyn StateStore>,
    save_lock: tokio::sync::Mutex<()>,
}

impl SharedState {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            inner: Mutex::new(PersistedState::default()),
            store,
            save_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut PersistedState) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn snapshot(&self) -> PersistedState {
        self.inner.lock().clone()
    }

    pub fn replace(&self, state: PersistedState) {
        *self.inner.lock() = state;
    }

    /// Load from the store; an empty store leaves defaults in place
    pub async fn load(&self) -> Result<bool> {
        match self.store.load().await? {
            Some(mut state) => {
                state.alert_count = state.alerts.len();
                self.replace(state);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Write the current state. Saves are serialized so the newest
    /// snapshot is always the one left on disk.
    pub async fn persist(&self) -> Result<()> {
        let _guard = self.save_lock.lock().await;
        let snapshot = self.snapshot();
        self.store.save(&snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soc_connector::Severity;

    fn alert(n: usize) -> Alert {
        Alert::new(format!("a-{}", n), BackendKind::Splunk, Severity::LOW, Utc::now(), "test")
    }

    #[test]
    fn test_history_is_bounded_and_newest_first() {
        let mut history = AlertHistory::new();
        for n in 0..150 {
            history.push(alert(n));
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.latest().unwrap().id, "a-149");
        assert_eq!(history.iter().last().unwrap().id, "a-50");
    }

    #[test]
    fn test_oversized_persisted_history_is_truncated() {
        let alerts: Vec<_> = (0..120).map(alert).collect();
        let json = serde_json::to_string(&alerts).unwrap();
        let history: AlertHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.latest().unwrap().id, "a-0");
    }

    #[test]
    fn test_persisted_state_uses_camel_case() {
        let mut state = PersistedState::default();
        state.record(alert(1));
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["isMonitoring"], false);
        assert_eq!(value["alertCount"], 1);
        assert!(value["alerts"].is_array());
        assert!(value["siemConfig"].is_object());
        assert!(value["lastCheck"].is_null());
    }

    #[test]
    fn test_partial_persisted_state_fills_defaults() {
        let state: PersistedState = serde_json::from_str(r#"{"isMonitoring":true}"#).unwrap();
        assert!(state.is_monitoring);
        assert!(state.alerts.is_empty());
        assert_eq!(state.siem_config, SiemConfig::default());
    }
}
