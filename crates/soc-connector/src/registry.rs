//! Connection Registry
//!
//! In-memory bookkeeping of which backends are authenticated and usable.
//! Every transition goes through one mutex; nothing here performs I/O.

use crate::alert::BackendKind;
use crate::config::Credentials;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    Disconnected,
    Connecting,
    Connected,
    Streaming,
    Failed,
}

impl BackendStatus {
    /// Fetch and stream operations are allowed
    pub fn is_eligible(self) -> bool {
        matches!(self, BackendStatus::Connected | BackendStatus::Streaming)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConnectionState {
    pub backend: BackendKind,
    #[serde(skip)]
    pub credentials: Credentials,
    pub status: BackendStatus,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    backends: Mutex<HashMap<BackendKind, BackendConnectionState>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a configured backend; it starts out `Connecting`
    pub fn register(&self, backend: BackendKind, credentials: Credentials) {
        self.backends.lock().insert(
            backend,
            BackendConnectionState {
                backend,
                credentials,
                status: BackendStatus::Connecting,
                last_error: None,
            },
        );
    }

    pub fn mark_connected(&self, backend: BackendKind) {
        self.update(backend, |state| {
            state.status = BackendStatus::Connected;
            state.last_error = None;
        });
    }

    pub fn mark_streaming(&self, backend: BackendKind) {
        self.update(backend, |state| {
            if state.status.is_eligible() {
                state.status = BackendStatus::Streaming;
            }
        });
    }

    /// Stream ended; the backend stays usable for polling
    pub fn mark_stream_lost(&self, backend: BackendKind, error: impl Into<String>) {
        let error = error.into();
        self.update(backend, |state| {
            if state.status == BackendStatus::Streaming {
                state.status = BackendStatus::Connected;
            }
            state.last_error = Some(error);
        });
    }

    pub fn mark_failed(&self, backend: BackendKind, error: impl Into<String>) {
        let error = error.into();
        self.update(backend, |state| {
            state.status = BackendStatus::Failed;
            state.last_error = Some(error);
        });
    }

    pub fn is_eligible(&self, backend: BackendKind) -> bool {
        self.backends
            .lock()
            .get(&backend)
            .is_some_and(|state| state.status.is_eligible())
    }

    pub fn status(&self, backend: BackendKind) -> Option<BackendStatus> {
        self.backends.lock().get(&backend).map(|state| state.status)
    }

    /// Backends currently eligible for fetch and stream
    pub fn active_backends(&self) -> BTreeSet<BackendKind> {
        self.backends
            .lock()
            .values()
            .filter(|state| state.status.is_eligible())
            .map(|state| state.backend)
            .collect()
    }

    /// Per-backend states, ordered by backend
    pub fn snapshot(&self) -> Vec<BackendConnectionState> {
        let mut states: Vec<_> = self.backends.lock().values().cloned().collect();
        states.sort_by_key(|state| state.backend);
        states
    }

    pub fn clear(&self) {
        self.backends.lock().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.backends.lock().is_empty()
    }

    // Unregistered backends are ignored so late supervisor updates after a
    // disconnect cannot resurrect an entry.
    fn update(&self, backend: BackendKind, f: impl FnOnce(&mut BackendConnectionState)) {
        if let Some(state) = self.backends.lock().get_mut(&backend) {
            f(state);
        }
    }
}
