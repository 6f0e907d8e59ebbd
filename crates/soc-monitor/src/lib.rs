//! Security Monitor
//!
//! Host service around the SIEM connector: keeps a bounded alert history,
//! persists its state, raises notifications for high-severity alerts and
//! answers status / configuration requests.

pub mod config;
pub mod error;
pub mod handler;
pub mod messages;
pub mod monitor;
pub mod notify;
pub mod shutdown;
pub mod state;
pub mod store;
pub mod trigger;

pub use config::{validate_config, MonitorOptions};
pub use error::{MonitorError, Result};
pub use handler::HistoryHandler;
pub use messages::{channel, serve_requests, MonitorClient, MonitorRequest, MonitorResponse};
pub use monitor::SecurityMonitor;
pub use notify::{LogNotifier, Notification, NotificationSink};
pub use state::{AlertHistory, PersistedState, StatusSnapshot, HISTORY_CAPACITY};
pub use store::{JsonFileStore, MemoryStore, StateStore};
pub use trigger::periodic_trigger;
