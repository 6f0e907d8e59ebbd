//! Poll Coordinator
//!
//! Pull-side delivery: fetch one time window from every eligible backend
//! concurrently, publish whatever came back and stamp the completion time.

use crate::alert::Alert;
use crate::backend::BackendAdapter;
use crate::dispatcher::AlertDispatcher;
use crate::registry::ConnectionRegistry;
use crate::time_range::TimeRange;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;

pub struct PollCoordinator {
    registry: Arc<ConnectionRegistry>,
    dispatcher: Arc<AlertDispatcher>,
    last_checked: Mutex<Option<DateTime<Utc>>>,
}

impl PollCoordinator {
    pub fn new(registry: Arc<ConnectionRegistry>, dispatcher: Arc<AlertDispatcher>) -> Self {
        Self {
            registry,
            dispatcher,
            last_checked: Mutex::new(None),
        }
    }

    /// Fetch `range` from every eligible backend and publish the results.
    ///
    /// A backend that fails contributes nothing; the others are unaffected.
    /// The completion time is recorded even when nothing was found.
    pub async fn poll_once<B>(&self, backends: &[Arc<B>], range: &TimeRange) -> Vec<Alert>
    where
        B: BackendAdapter + ?Sized,
    {
        let eligible: Vec<_> = backends
            .iter()
            .filter(|backend| self.registry.is_eligible(backend.kind()))
            .collect();

        let fetches = eligible.iter().map(|backend| backend.fetch_window(range));
        let alerts: Vec<Alert> = join_all(fetches).await.into_iter().flatten().collect();

        tracing::info!(
            backends = eligible.len(),
            alerts = alerts.len(),
            range = %range,
            "poll completed"
        );

        for alert in &alerts {
            self.dispatcher.publish(alert).await;
        }

        *self.last_checked.lock() = Some(Utc::now());
        alerts
    }

    /// Completion time of the most recent poll
    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        *self.last_checked.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::BackendKind;
    use crate::config::Credentials;
    use crate::dispatcher::handler_fn;
    use crate::error::{ConnectorError, Result};
    use crate::severity::Severity;
    use crate::stream::AlertStream;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    struct FakeBackend {
        kind: BackendKind,
        alerts: usize,
        fetches: AtomicUsize,
    }

    impl FakeBackend {
        fn new(kind: BackendKind, alerts: usize) -> Arc<Self> {
            Arc::new(Self {
                kind,
                alerts,
                fetches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl BackendAdapter for FakeBackend {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        async fn authenticate(&self) -> Result<()> {
            Ok(())
        }

        async fn fetch_window(&self, _range: &TimeRange) -> Vec<Alert> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            (0..self.alerts)
                .map(|i| Alert::new(format!("{}-{}", self.kind, i), self.kind, Severity::MEDIUM, Utc::now(), "fake"))
                .collect()
        }

        async fn open_stream(&self, _cancel: CancellationToken) -> Result<AlertStream> {
            Err(ConnectorError::Transport {
                backend: self.kind,
                reason: "unsupported".into(),
            })
        }
    }

    fn registry_with(connected: &[BackendKind], failed: &[BackendKind]) -> Arc<ConnectionRegistry> {
        let registry = Arc::new(ConnectionRegistry::new());
        for kind in connected {
            registry.register(*kind, Credentials::new("https://siem.local", "t"));
            registry.mark_connected(*kind);
        }
        for kind in failed {
            registry.register(*kind, Credentials::new("https://siem.local", "t"));
            registry.mark_failed(*kind, "401 Unauthorized");
        }
        registry
    }

    #[tokio::test]
    async fn test_partial_results_are_aggregated() {
        // Splunk's fetch degrades to an empty list; Wazuh returns three
        let splunk = FakeBackend::new(BackendKind::Splunk, 0);
        let wazuh = FakeBackend::new(BackendKind::Wazuh, 3);
        let registry = registry_with(&[BackendKind::Splunk, BackendKind::Wazuh], &[]);
        let dispatcher = Arc::new(AlertDispatcher::new());
        let published = Arc::new(AtomicUsize::new(0));
        let counter = published.clone();
        dispatcher.register(handler_fn("count", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        let poller = PollCoordinator::new(registry, dispatcher);
        assert!(poller.last_checked().is_none());

        let alerts = poller.poll_once(&[splunk, wazuh], &TimeRange::minutes(5)).await;

        assert_eq!(alerts.len(), 3);
        assert!(alerts.iter().all(|a| a.source == BackendKind::Wazuh));
        assert_eq!(published.load(Ordering::SeqCst), 3);
        assert!(poller.last_checked().is_some());
    }

    #[tokio::test]
    async fn test_ineligible_backends_are_not_fetched() {
        let splunk = FakeBackend::new(BackendKind::Splunk, 2);
        let wazuh = FakeBackend::new(BackendKind::Wazuh, 2);
        let registry = registry_with(&[BackendKind::Wazuh], &[BackendKind::Splunk]);
        let poller = PollCoordinator::new(registry, Arc::new(AlertDispatcher::new()));

        let alerts = poller
            .poll_once(&[splunk.clone(), wazuh.clone()], &TimeRange::minutes(5))
            .await;

        assert_eq!(alerts.len(), 2);
        assert_eq!(splunk.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(wazuh.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_poll_still_records_completion() {
        let poller = PollCoordinator::new(Arc::new(ConnectionRegistry::new()), Arc::new(AlertDispatcher::new()));
        let before = Utc::now();
        let alerts = poller.poll_once::<FakeBackend>(&[], &TimeRange::minutes(5)).await;
        assert!(alerts.is_empty());
        assert!(poller.last_checked().is_some_and(|t| t >= before));
    }
}
