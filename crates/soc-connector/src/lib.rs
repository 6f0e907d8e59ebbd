//! SOC Alert Connector
//!
//! Pulls and streams security alerts from SIEM backends (Splunk, Wazuh),
//! normalizes them onto one schema and severity scale, and fans them out to
//! registered handlers.
//!
//! # Architecture
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          SiemConnector                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐  │
//! │  │   Splunk     │   │    Wazuh     │   │  ConnectionRegistry  │  │
//! │  │   Adapter    │   │   Adapter    │   │  (eligibility gate)  │  │
//! │  └──────┬───────┘   └──────┬───────┘   └──────────────────────┘  │
//! │         │  fetch_window    │  open_stream                        │
//! │         ▼                  ▼                                     │
//! │  ┌──────────────┐   ┌──────────────────┐                         │
//! │  │    Poll      │   │ StreamSupervisor │  (one task per backend) │
//! │  │ Coordinator  │   │  + reconnect     │                         │
//! │  └──────┬───────┘   └────────┬─────────┘                         │
//! │         └─────────┬──────────┘                                   │
//! │                   ▼                                              │
//! │         ┌──────────────────┐                                     │
//! │         │ AlertDispatcher  │ ──▶ handlers (isolated failures)    │
//! │         └──────────────────┘                                     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod alert;
pub mod backend;
pub mod config;
pub mod connector;
pub mod dispatcher;
pub mod error;
pub mod poller;
pub mod registry;
pub mod severity;
pub mod sse;
pub mod stream;
pub mod supervisor;
pub mod time_range;

pub use alert::{Alert, BackendKind};
pub use backend::{Backend, BackendAdapter};
pub use config::{Backoff, ConnectorSettings, Credentials, SiemConfig};
pub use connector::{ConnectReport, SiemConnector};
pub use dispatcher::{handler_fn, AlertDispatcher, AlertHandler, DispatchOutcome, HandlerId};
pub use error::{ConnectorError, Result};
pub use registry::{BackendConnectionState, BackendStatus, ConnectionRegistry};
pub use severity::Severity;
pub use stream::{AlertStream, StreamEnd};
pub use supervisor::StreamState;
pub use time_range::TimeRange;
