//! Periodic check trigger

use crate::monitor::SecurityMonitor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Run `check_now` every `period` while monitoring is on, until cancelled
pub async fn periodic_trigger(monitor: Arc<SecurityMonitor>, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if !monitor.is_monitoring() {
                    continue;
                }
                match monitor.check_now().await {
                    Ok(count) => tracing::debug!(alerts = count, "periodic check completed"),
                    Err(e) => tracing::warn!(error = %e, "periodic check failed"),
                }
            }
        }
    }
    tracing::debug!("periodic trigger stopped");
}
