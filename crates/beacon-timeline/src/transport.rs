// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 beacon contributors

//! Batching HTTP transport.
//!
//! Owns the bounded point buffer, the mapping-template registry, and a
//! single flusher task that posts buffered points to the backend as one
//! JSON array per interval. At most one flush is in flight at any time;
//! a failed batch is retained ahead of newer points for the next flush.

use crate::buffer::PointBuffer;
use crate::config::{Backend, HttpTransportConfig};
use crate::error::TimelineError;
use crate::mapping::{ParamValue, PointTemplate, TemplateRegistry};
use crate::point::{NumberPoint, PointKind, TextPoint};
use parking_lot::{Mutex, RwLock};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Batching HTTP transport for serialized points.
#[derive(Debug)]
pub struct HttpTransport {
    config: HttpTransportConfig,
    method: reqwest::Method,
    headers: HeaderMap,
    client: reqwest::Client,
    registry: RwLock<TemplateRegistry>,
    buffer: Arc<Mutex<PointBuffer>>,
    flush_gate: Arc<tokio::sync::Mutex<()>>,
    shutdown: Arc<Notify>,
    closed: Arc<AtomicBool>,
    flush_ctx: OnceLock<Arc<FlushCtx>>,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl HttpTransport {
    /// Create a transport from configuration.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TimelineError> {
        config.validate()?;

        let method = reqwest::Method::from_bytes(config.method.as_bytes()).map_err(|_| {
            TimelineError::InvalidConfig(format!("invalid HTTP method '{}'", config.method))
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TimelineError::InvalidConfig(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let buffer_size = config.buffer_size;
        Ok(Self {
            config,
            method,
            headers,
            client,
            registry: RwLock::new(TemplateRegistry::default()),
            buffer: Arc::new(Mutex::new(PointBuffer::new(buffer_size))),
            flush_gate: Arc::new(tokio::sync::Mutex::new(())),
            shutdown: Arc::new(Notify::new()),
            closed: Arc::new(AtomicBool::new(false)),
            flush_ctx: OnceLock::new(),
            flusher: Mutex::new(None),
        })
    }

    /// Register an extra header sent with every batch request.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, TimelineError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TimelineError::InvalidConfig(format!("invalid header name '{name}'")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| TimelineError::InvalidConfig("invalid header value".to_string()))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Register a mapping template for numeric points.
    ///
    /// Templates are immutable once the transport has started.
    pub fn override_number_point_mapping(
        &self,
        prototype: &NumberPoint,
        variable: &[&str],
    ) -> Result<(), TimelineError> {
        self.register(PointTemplate::number(prototype, variable)?)
    }

    /// Register a mapping template for textual points.
    pub fn override_text_point_mapping(
        &self,
        prototype: &TextPoint,
        variable: &[&str],
    ) -> Result<(), TimelineError> {
        self.register(PointTemplate::text(prototype, variable)?)
    }

    fn register(&self, template: PointTemplate) -> Result<(), TimelineError> {
        if self.flush_ctx.get().is_some() {
            return Err(TimelineError::AlreadyStarted);
        }
        self.registry.write().register(template)
    }

    /// Resolve a send against the active template for `kind`.
    pub(crate) fn resolve(
        &self,
        kind: PointKind,
        params: &[(&str, ParamValue)],
    ) -> Result<Value, TimelineError> {
        self.registry.read().resolve(kind, params)
    }

    /// Enqueue one resolved point. Never waits on network I/O.
    pub(crate) fn enqueue(&self, point: Value) -> Result<(), TimelineError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TimelineError::Closed);
        }
        self.buffer.lock().push(point)
    }

    /// Number of points currently buffered.
    pub fn buffered_points(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Start the flusher task posting to `backend`.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn start(&self, backend: &Backend) -> Result<(), TimelineError> {
        let url = format!("{}{}", backend.base_url(), self.config.service_endpoint);
        info!(
            url = %url,
            interval_ms = self.config.batch_send_interval_ms,
            "starting transport"
        );

        let ctx = Arc::new(FlushCtx {
            client: self.client.clone(),
            method: self.method.clone(),
            headers: self.headers.clone(),
            url,
            expected_status: self.config.expected_response_status,
            buffer: self.buffer.clone(),
            gate: self.flush_gate.clone(),
        });
        self.flush_ctx
            .set(ctx.clone())
            .map_err(|_| TimelineError::AlreadyStarted)?;

        let shutdown = self.shutdown.clone();
        let interval = self.config.batch_send_interval();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        ctx.flush_once().await;
                    }
                    _ = shutdown.notified() => break,
                }
            }
            // drain whatever is still buffered before the task exits
            ctx.flush_once().await;
            debug!("flusher stopped");
        });
        *self.flusher.lock() = Some(handle);
        Ok(())
    }

    /// Flush the current buffer immediately.
    ///
    /// Shares the single-flight gate with the interval flusher, so an
    /// in-progress flush completes first. Delivery failures are logged
    /// and the batch is retained, as with interval flushes.
    pub async fn flush(&self) {
        if let Some(ctx) = self.flush_ctx.get() {
            ctx.flush_once().await;
        }
    }

    /// Stop the flusher, drain remaining points once, and close.
    ///
    /// Enqueueing after shutdown fails with `Closed`.
    pub(crate) async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.notify_one();
        let handle = self.flusher.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!("transport stopped");
    }
}

/// Everything one flush needs, shared between the flusher task and
/// explicit flushes.
#[derive(Debug)]
struct FlushCtx {
    client: reqwest::Client,
    method: reqwest::Method,
    headers: HeaderMap,
    url: String,
    expected_status: u16,
    buffer: Arc<Mutex<PointBuffer>>,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl FlushCtx {
    async fn flush_once(&self) {
        // single-flight: the next flush waits for the one in progress
        let _flight = self.gate.lock().await;

        let batch = self.buffer.lock().detach();
        if batch.is_empty() {
            return;
        }

        let size = batch.len();
        match self.post(&batch).await {
            Ok(()) => debug!(points = size, "batch delivered"),
            Err(e) => {
                warn!(points = size, error = %e, "batch delivery failed, retaining for next flush");
                let dropped = self.buffer.lock().restore(batch);
                if dropped > 0 {
                    warn!(dropped, "buffer overflow while retaining failed batch");
                }
            }
        }
    }

    async fn post(&self, batch: &[Value]) -> Result<(), TimelineError> {
        let body =
            serde_json::to_vec(batch).map_err(|e| TimelineError::Transport(e.to_string()))?;

        let response = self
            .client
            .request(self.method.clone(), self.url.as_str())
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await
            .map_err(|e| TimelineError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if status == self.expected_status {
            Ok(())
        } else {
            Err(TimelineError::Transport(format!(
                "unexpected response status {status} (expected {})",
                self.expected_status
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport(buffer_size: usize) -> HttpTransport {
        let mut config = HttpTransportConfig::new("/api/put");
        config.buffer_size = buffer_size;
        HttpTransport::new(config).expect("transport")
    }

    #[test]
    fn test_enqueue_respects_buffer_bound() {
        let transport = transport(2);

        transport.enqueue(json!({"n": 1})).expect("first");
        transport.enqueue(json!({"n": 2})).expect("second");
        assert_eq!(transport.buffered_points(), 2);

        let err = transport.enqueue(json!({"n": 3})).unwrap_err();
        assert!(matches!(err, TimelineError::BufferFull));
    }

    #[test]
    fn test_invalid_method_rejected() {
        let mut config = HttpTransportConfig::new("/api/put");
        config.method = "NOT A VERB".to_string();
        let err = HttpTransport::new(config).unwrap_err();
        assert!(matches!(err, TimelineError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_is_closed() {
        let transport = transport(5);

        transport.shutdown().await;
        let err = transport.enqueue(json!({"n": 1})).unwrap_err();
        assert!(matches!(err, TimelineError::Closed));
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let transport = transport(5);
        let backend = Backend::new("127.0.0.1", 1);

        transport.start(&backend).expect("first start");
        let err = transport.start(&backend).unwrap_err();
        assert!(matches!(err, TimelineError::AlreadyStarted));

        transport.shutdown().await;
    }

    #[tokio::test]
    async fn test_mapping_registration_refused_after_start() {
        let transport = transport(5);
        let backend = Backend::new("127.0.0.1", 1);
        transport.start(&backend).expect("start");

        let prototype = NumberPoint::new(crate::point::Point::new("m", 1), 1.0);
        let err = transport
            .override_number_point_mapping(&prototype, &["value"])
            .unwrap_err();
        assert!(matches!(err, TimelineError::AlreadyStarted));

        transport.shutdown().await;
    }
}
