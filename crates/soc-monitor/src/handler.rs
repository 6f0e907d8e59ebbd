//! The monitor's alert handler

use crate::notify::{Notification, NotificationSink};
use crate::state::SharedState;
use async_trait::async_trait;
use soc_connector::{Alert, AlertHandler};
use std::sync::Arc;

/// Records alerts into history, raises notifications for high severity
/// alerts and persists the updated state.
pub struct HistoryHandler {
    state: Arc<SharedState>,
    notifier: Arc<dyn NotificationSink>,
}

impl HistoryHandler {
    pub fn new(state: Arc<SharedState>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self { state, notifier }
    }
}

#[async_trait]
impl AlertHandler for HistoryHandler {
    async fn handle(&self, alert: &Alert) -> anyhow::Result<()> {
        self.state.update(|state| state.record(alert.clone()));

        if alert.severity.is_high() {
            let notification = Notification::for_alert(alert);
            if let Err(e) = self.notifier.notify(&notification).await {
                tracing::warn!(alert_id = %alert.id, error = %e, "notification failed");
            }
        }

        self.state.persist().await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "history"
    }
}
