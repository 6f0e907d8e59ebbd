//! Alert Dispatcher
//!
//! Fans each alert out to every registered handler. A handler that returns
//! an error or panics is logged and skipped; the remaining handlers still
//! receive the alert.

use crate::alert::Alert;
use async_trait::async_trait;
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Consumer of normalized alerts
#[async_trait]
pub trait AlertHandler: Send + Sync {
    async fn handle(&self, alert: &Alert) -> anyhow::Result<()>;

    /// Label used in logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Adapter turning a closure into an [`AlertHandler`]
pub struct FnHandler<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F> AlertHandler for FnHandler<F>
where
    F: Fn(&Alert) -> anyhow::Result<()> + Send + Sync,
{
    async fn handle(&self, alert: &Alert) -> anyhow::Result<()> {
        (self.f)(alert)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Wrap a synchronous closure as a shareable handler
pub fn handler_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn AlertHandler>
where
    F: Fn(&Alert) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(FnHandler { name: name.into(), f })
}

/// Registration handle returned by [`AlertDispatcher::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Result of one `publish` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub published: u64,
    pub delivered: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

#[derive(Default)]
pub struct AlertDispatcher {
    handlers: Mutex<Vec<(HandlerId, Arc<dyn AlertHandler>)>>,
    next_id: AtomicU64,
    counters: Counters,
}

impl AlertDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Registering the same `Arc` twice returns the
    /// existing id instead of adding a duplicate.
    pub fn register(&self, handler: Arc<dyn AlertHandler>) -> HandlerId {
        let mut handlers = self.handlers.lock();
        if let Some((id, _)) = handlers.iter().find(|(_, h)| same_handler(h, &handler)) {
            return *id;
        }
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(handler = handler.name(), ?id, "alert handler registered");
        handlers.push((id, handler));
        id
    }

    pub fn remove(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    /// Remove by identity rather than by id
    pub fn remove_handler(&self, handler: &Arc<dyn AlertHandler>) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(_, h)| !same_handler(h, handler));
        handlers.len() != before
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Deliver `alert` to every handler registered at call time.
    ///
    /// Returns once every handler has finished; failures never escape.
    pub async fn publish(&self, alert: &Alert) -> DispatchOutcome {
        let handlers: Vec<_> = self.handlers.lock().iter().map(|(_, h)| h.clone()).collect();
        self.counters.published.fetch_add(1, Ordering::Relaxed);

        let mut outcome = DispatchOutcome::default();
        for handler in handlers {
            match AssertUnwindSafe(handler.handle(alert)).catch_unwind().await {
                Ok(Ok(())) => outcome.delivered += 1,
                Ok(Err(e)) => {
                    outcome.failed += 1;
                    tracing::warn!(
                        handler = handler.name(),
                        alert_id = %alert.id,
                        error = %e,
                        "alert handler failed"
                    );
                }
                Err(payload) => {
                    outcome.failed += 1;
                    tracing::warn!(
                        handler = handler.name(),
                        alert_id = %alert.id,
                        panic = panic_message(payload.as_ref()),
                        "alert handler panicked"
                    );
                }
            }
        }

        self.counters.delivered.fetch_add(outcome.delivered as u64, Ordering::Relaxed);
        self.counters.failed.fetch_add(outcome.failed as u64, Ordering::Relaxed);
        outcome
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            published: self.counters.published.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

fn same_handler(a: &Arc<dyn AlertHandler>, b: &Arc<dyn AlertHandler>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
