//! Monitor service behaviour with an in-memory store and mock SIEM backend

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use soc_connector::{BackendKind, ConnectorSettings, SiemConfig, TimeRange};
use soc_monitor::{
    channel, periodic_trigger, serve_requests, MemoryStore, MonitorError, MonitorOptions, MonitorRequest,
    MonitorResponse, Notification, NotificationSink, PersistedState, SecurityMonitor,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}

fn options() -> MonitorOptions {
    MonitorOptions {
        time_range: TimeRange::minutes(5),
        check_interval: Duration::from_millis(20),
        connector: ConnectorSettings {
            streaming_enabled: false,
            ..Default::default()
        },
    }
}

fn monitor_with(state: Option<PersistedState>) -> (Arc<SecurityMonitor>, Arc<MemoryStore>, Arc<RecordingNotifier>) {
    let store = Arc::new(match state {
        Some(state) => MemoryStore::with_state(state),
        None => MemoryStore::new(),
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = Arc::new(SecurityMonitor::new(store.clone(), notifier.clone(), options()));
    (monitor, store, notifier)
}

async fn wazuh_backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/security/user/authenticate"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/alerts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"affected_items": [
                {"id": "w-1", "rule": {"level": 12, "description": "brute force"}},
                {"id": "w-2", "rule": {"level": 3, "description": "login"}}
            ]}
        })))
        .mount(&server)
        .await;
    server
}

fn wazuh_config(server: &MockServer) -> SiemConfig {
    SiemConfig {
        wazuh_url: server.uri(),
        wazuh_token: "token".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_check_now_advances_last_check_without_backends() {
    let (monitor, store, _) = monitor_with(None);
    assert!(monitor.get_status().last_check.is_none());

    let found = monitor.check_now().await.unwrap();

    assert_eq!(found, 0);
    assert!(monitor.get_status().last_check.is_some());
    assert!(store.saved().unwrap().last_check.is_some());
}

#[tokio::test]
async fn test_start_monitoring_records_and_notifies() {
    let wazuh = wazuh_backend().await;
    let (monitor, store, notifier) = monitor_with(Some(PersistedState {
        siem_config: wazuh_config(&wazuh),
        ..Default::default()
    }));
    monitor.load_state().await.unwrap();

    monitor.start_monitoring().await.unwrap();

    let status = monitor.get_status();
    assert!(status.is_monitoring);
    assert_eq!(status.connected_backends, vec![BackendKind::Wazuh]);
    assert_eq!(status.alert_count, 2);
    assert_eq!(status.alerts[0].id, "w-2");
    assert!(status.last_check.is_some());

    let sent = notifier.sent.lock().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, "High Severity Alert - wazuh");
    assert_eq!(sent[0].message, "brute force");

    assert!(store.saved().unwrap().is_monitoring);

    // Starting again while connected does not reconnect or re-fetch
    monitor.start_monitoring().await.unwrap();
    assert_eq!(monitor.get_status().alert_count, 2);

    monitor.stop_monitoring().await.unwrap();
    let status = monitor.get_status();
    assert!(!status.is_monitoring);
    assert!(status.connected_backends.is_empty());
    assert!(!store.saved().unwrap().is_monitoring);
}

#[tokio::test]
async fn test_start_without_configuration_fails() {
    let (monitor, _, _) = monitor_with(None);
    let err = monitor.start_monitoring().await.unwrap_err();
    assert!(matches!(err, MonitorError::InvalidConfig(_)));
    assert!(!monitor.is_monitoring());
}

#[tokio::test]
async fn test_start_fails_when_backend_rejects_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/security/user/authenticate"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let (monitor, _, _) = monitor_with(Some(PersistedState {
        siem_config: wazuh_config(&server),
        ..Default::default()
    }));
    monitor.load_state().await.unwrap();

    let err = monitor.start_monitoring().await.unwrap_err();
    assert!(matches!(err, MonitorError::Connector(_)));
    assert!(!monitor.is_monitoring());
}

#[tokio::test]
async fn test_update_config_rejects_invalid_urls() {
    let (monitor, store, _) = monitor_with(None);
    let config = SiemConfig {
        splunk_url: "not a url".into(),
        splunk_token: "t".into(),
        ..Default::default()
    };

    let err = monitor.update_config(config).await.unwrap_err();
    assert!(matches!(err, MonitorError::InvalidConfig(_)));
    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn test_update_config_while_monitoring_reconnects() {
    let first = wazuh_backend().await;
    let second = wazuh_backend().await;
    let (monitor, store, _) = monitor_with(Some(PersistedState {
        siem_config: wazuh_config(&first),
        ..Default::default()
    }));
    monitor.load_state().await.unwrap();
    monitor.start_monitoring().await.unwrap();

    monitor.update_config(wazuh_config(&second)).await.unwrap();

    assert_eq!(monitor.get_status().connected_backends, vec![BackendKind::Wazuh]);
    assert_eq!(store.saved().unwrap().siem_config.wazuh_url, second.uri());
    let second_logins = second
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/security/user/authenticate")
        .count();
    assert_eq!(second_logins, 1);
}

#[tokio::test]
async fn test_requests_over_channel() {
    let wazuh = wazuh_backend().await;
    let (monitor, _, _) = monitor_with(None);
    let cancel = CancellationToken::new();
    let (client, requests) = channel(8);
    let server = tokio::spawn(serve_requests(monitor.clone(), requests, cancel.clone()));

    let status = client.get_status().await.unwrap();
    assert!(!status.is_monitoring);

    let response = client
        .request(MonitorRequest::UpdateConfig {
            config: wazuh_config(&wazuh),
        })
        .await
        .unwrap();
    assert_eq!(response, MonitorResponse::ok());

    let response = client
        .request(MonitorRequest::ToggleMonitoring { start: true })
        .await
        .unwrap();
    assert_eq!(response, MonitorResponse::ok());
    assert_eq!(client.get_status().await.unwrap().connected_backends, vec![BackendKind::Wazuh]);

    let response = client
        .request(MonitorRequest::UpdateConfig {
            config: SiemConfig {
                wazuh_url: "ftp://nope".into(),
                ..Default::default()
            },
        })
        .await
        .unwrap();
    match response {
        MonitorResponse::Ack { success, error } => {
            assert!(!success);
            assert!(error.unwrap().contains("invalid configuration"));
        }
        other => panic!("expected ack, got {:?}", other),
    }

    cancel.cancel();
    server.await.unwrap();
    assert!(matches!(client.get_status().await, Err(MonitorError::ChannelClosed)));
    monitor.shutdown().await;
}

#[tokio::test]
async fn test_periodic_trigger_checks_while_monitoring() {
    let (monitor, _, _) = monitor_with(Some(PersistedState {
        is_monitoring: true,
        ..Default::default()
    }));
    monitor.load_state().await.unwrap();

    let cancel = CancellationToken::new();
    let task = tokio::spawn(periodic_trigger(monitor.clone(), Duration::from_millis(20), cancel.clone()));

    tokio::time::timeout(Duration::from_secs(5), async {
        while monitor.get_status().last_check.is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("trigger should run a check");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("trigger stops on cancel")
        .unwrap();
}

#[tokio::test]
async fn test_periodic_trigger_idle_when_not_monitoring() {
    let (monitor, store, _) = monitor_with(None);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(periodic_trigger(monitor.clone(), Duration::from_millis(10), cancel.clone()));

    tokio::time::sleep(Duration::from_millis(80)).await;
    cancel.cancel();
    task.await.unwrap();

    assert!(monitor.get_status().last_check.is_none());
    assert_eq!(store.save_count(), 0);
}
