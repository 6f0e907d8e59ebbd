//! Stream Supervisor
//!
//! One task per streaming backend. It keeps a live stream open, publishes
//! every alert in arrival order and reconnects after the configured delay
//! whenever the stream ends. Only cancellation stops it.

use crate::alert::BackendKind;
use crate::backend::BackendAdapter;
use crate::config::Backoff;
use crate::dispatcher::AlertDispatcher;
use crate::error::ConnectorError;
use crate::registry::ConnectionRegistry;
use crate::stream::StreamEnd;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    Idle,
    Connecting,
    Streaming,
    Reconnecting,
    Stopped,
}

pub struct StreamSupervisor {
    backend: Arc<dyn BackendAdapter>,
    registry: Arc<ConnectionRegistry>,
    dispatcher: Arc<AlertDispatcher>,
    backoff: Backoff,
    cancel: CancellationToken,
    state: watch::Sender<StreamState>,
}

impl StreamSupervisor {
    /// Start supervising `backend` on the current runtime
    pub fn spawn(
        backend: Arc<dyn BackendAdapter>,
        registry: Arc<ConnectionRegistry>,
        dispatcher: Arc<AlertDispatcher>,
        backoff: Backoff,
        cancel: CancellationToken,
    ) -> SupervisorHandle {
        let kind = backend.kind();
        let (state, state_rx) = watch::channel(StreamState::Idle);
        let supervisor = Self {
            backend,
            registry,
            dispatcher,
            backoff,
            cancel: cancel.clone(),
            state,
        };
        let task = tokio::spawn(supervisor.run());

        SupervisorHandle {
            backend: kind,
            cancel,
            state: state_rx,
            task,
        }
    }

    async fn run(self) {
        let kind = self.backend.kind();
        let mut attempt: u32 = 0;

        while !self.cancel.is_cancelled() {
            self.set_state(StreamState::Connecting);

            let reason = match self.backend.open_stream(self.cancel.child_token()).await {
                Ok(mut stream) => {
                    attempt = 0;
                    self.registry.mark_streaming(kind);
                    self.set_state(StreamState::Streaming);
                    tracing::info!(backend = %kind, "live stream established");

                    let end = loop {
                        match stream.next_alert().await {
                            Ok(alert) => {
                                tracing::debug!(backend = %kind, alert_id = %alert.id, "streamed alert");
                                self.dispatcher.publish(&alert).await;
                            }
                            Err(end) => break end,
                        }
                    };
                    stream.close();

                    if end == StreamEnd::Cancelled {
                        break;
                    }
                    end.to_string()
                }
                Err(ConnectorError::Cancelled) => break,
                Err(e) => e.to_string(),
            };

            if self.cancel.is_cancelled() {
                break;
            }

            let delay = self.backoff.delay(attempt);
            attempt = attempt.saturating_add(1);
            tracing::warn!(backend = %kind, %reason, ?delay, "stream ended, reconnecting");
            self.registry.mark_stream_lost(kind, reason);
            self.set_state(StreamState::Reconnecting);

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(StreamState::Stopped);
        tracing::info!(backend = %kind, "stream supervisor stopped");
    }

    fn set_state(&self, state: StreamState) {
        self.state.send_replace(state);
    }
}

/// Owner's view of a running supervisor
pub struct SupervisorHandle {
    backend: BackendKind,
    cancel: CancellationToken,
    state: watch::Receiver<StreamState>,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<StreamState> {
        self.state.clone()
    }

    /// Request a stop without waiting for it
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop the supervisor and wait for its task to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(backend = %self.backend, error = %e, "stream supervisor task failed");
        }
    }
}
