//! High-severity notifications

use async_trait::async_trait;
use serde::Serialize;
use soc_connector::{Alert, Severity};

/// Priority used for high-severity alert notifications
pub const HIGH_PRIORITY: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub priority: u8,
    pub alert_id: String,
    pub severity: Severity,
}

impl Notification {
    pub fn for_alert(alert: &Alert) -> Self {
        Self {
            title: format!("High Severity Alert - {}", alert.source),
            message: alert.description.clone(),
            priority: HIGH_PRIORITY,
            alert_id: alert.id.clone(),
            severity: alert.severity,
        }
    }
}

/// Destination for user-facing notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        tracing::warn!(
            alert_id = %notification.alert_id,
            severity = %notification.severity,
            priority = notification.priority,
            message = %notification.message,
            "{}",
            notification.title
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use soc_connector::BackendKind;

    #[test]
    fn test_notification_from_alert() {
        let alert = Alert::new("w-7", BackendKind::Wazuh, Severity::CRITICAL, Utc::now(), "rootkit detected");
        let notification = Notification::for_alert(&alert);
        assert_eq!(notification.title, "High Severity Alert - wazuh");
        assert_eq!(notification.message, "rootkit detected");
        assert_eq!(notification.priority, 2);
    }
}
