//! Persisted state stores

use crate::error::{MonitorError, Result};
use crate::state::PersistedState;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Key-value home for the monitor's persisted fields
#[async_trait]
pub trait StateStore: Send + Sync {
    /// `None` when nothing has been saved yet
    async fn load(&self) -> Result<Option<PersistedState>>;

    async fn save(&self, state: &PersistedState) -> Result<()>;
}

/// Pretty-printed JSON file, replaced atomically on save
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<Option<PersistedState>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        let value: Value = serde_json::from_str(&content)
            .map_err(|e| MonitorError::Store(format!("{}: {}", self.path.display(), e)))?;
        match serde_json::from_value(value.clone()) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "state file partly unreadable, keeping configuration and dropping alert history"
                );
                Ok(Some(salvage(&value)))
            }
        }
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_vec_pretty(state)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, content).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), "state saved");
        Ok(())
    }
}

/// Recover the fields that do not depend on the alert history
fn salvage(value: &Value) -> PersistedState {
    fn field<T: serde::de::DeserializeOwned + Default>(value: &Value, key: &str) -> T {
        value
            .get(key)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    PersistedState {
        is_monitoring: field(value, "isMonitoring"),
        last_check: field(value, "lastCheck"),
        siem_config: field(value, "siemConfig"),
        ..Default::default()
    }
}

/// In-process store
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<Option<PersistedState>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            saves: AtomicUsize::new(0),
        }
    }

    /// Last saved state
    pub fn saved(&self) -> Option<PersistedState> {
        self.state.lock().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<Option<PersistedState>> {
        Ok(self.state.lock().clone())
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        *self.state.lock() = Some(state.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
