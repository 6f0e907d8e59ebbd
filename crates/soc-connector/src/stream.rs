//! Live alert streams
//!
//! An [`AlertStream`] wraps one open `text/event-stream` response. It never
//! reconnects on its own: when the connection ends, `next_alert` reports the
//! terminal condition and the caller decides what happens next.

use crate::alert::{Alert, BackendKind};
use crate::backend::parse_record;
use crate::backend::fields::unwrap_envelope;
use crate::error::{ConnectorError, Result};
use crate::sse::{SseDecoder, SseEvent, MAX_LINE_BYTES};
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;

/// Why a stream stopped producing alerts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// Backend closed the connection normally
    Eof,
    /// Connection failed mid-stream
    Transport(String),
    /// Closed locally via the cancellation token
    Cancelled,
}

impl std::fmt::Display for StreamEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamEnd::Eof => write!(f, "stream closed by backend"),
            StreamEnd::Transport(e) => write!(f, "stream transport error: {}", e),
            StreamEnd::Cancelled => write!(f, "stream cancelled"),
        }
    }
}

pub struct AlertStream {
    backend: BackendKind,
    body: BoxStream<'static, std::result::Result<Bytes, String>>,
    decoder: SseDecoder,
    pending: VecDeque<Alert>,
    failed: Option<String>,
    cancel: CancellationToken,
}

impl AlertStream {
    /// Send the stream request and wait for response headers
    pub(crate) async fn open(
        backend: BackendKind,
        request: reqwest::RequestBuilder,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ConnectorError::Cancelled),
            response = request.send() => response.map_err(|e| ConnectorError::Transport {
                backend,
                reason: e.to_string(),
            })?,
        };

        if !response.status().is_success() {
            return Err(ConnectorError::UnexpectedStatus {
                backend,
                status: response.status().to_string(),
            });
        }

        tracing::debug!(%backend, "event stream opened");
        Ok(Self::from_byte_stream(backend, response.bytes_stream(), cancel))
    }

    /// Build a stream over any byte source
    pub fn from_byte_stream<S, E>(backend: BackendKind, body: S, cancel: CancellationToken) -> Self
    where
        S: futures_util::Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: std::fmt::Display,
    {
        Self {
            backend,
            body: body.map(|chunk| chunk.map_err(|e| e.to_string())).boxed(),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            failed: None,
            cancel,
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Next alert in arrival order, or the reason the stream ended
    pub async fn next_alert(&mut self) -> std::result::Result<Alert, StreamEnd> {
        loop {
            if let Some(alert) = self.pending.pop_front() {
                return Ok(alert);
            }
            if let Some(reason) = self.failed.take() {
                return Err(StreamEnd::Transport(reason));
            }

            let chunk = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(StreamEnd::Cancelled),
                chunk = self.body.next() => chunk,
            };

            match chunk {
                None => return Err(StreamEnd::Eof),
                Some(Err(e)) => return Err(StreamEnd::Transport(e)),
                Some(Ok(bytes)) => {
                    for event in self.decoder.feed(&bytes) {
                        if let Some(alert) = decode_event(self.backend, &event) {
                            self.pending.push_back(alert);
                        }
                    }
                    if self.decoder.overflowed() {
                        self.failed = Some(format!("event line longer than {} bytes", MAX_LINE_BYTES));
                    }
                }
            }
        }
    }

    /// Abort the underlying connection
    pub fn close(self) {
        self.cancel.cancel();
    }
}

fn decode_event(backend: BackendKind, event: &SseEvent) -> Option<Alert> {
    let value: serde_json::Value = match serde_json::from_str(&event.data) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(%backend, error = %e, "skipping non-JSON stream event");
            return None;
        }
    };
    let record = unwrap_envelope(value);
    if !record.is_object() {
        tracing::debug!(%backend, "skipping stream event without a record");
        return None;
    }
    Some(parse_record(backend, record))
}
