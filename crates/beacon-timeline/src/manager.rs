// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 beacon contributors

//! Public pipeline facade.
//!
//! The [`Manager`] accepts per-point sends from any number of tasks,
//! resolves them against the active mapping templates, and enqueues the
//! result on its transport. Sends return as soon as the point is
//! buffered; delivery happens on the transport's flush cadence.

use crate::config::Backend;
use crate::error::TimelineError;
use crate::mapping::ParamValue;
use crate::point::{NumberPoint, PointKind, TextPoint};
use crate::transport::HttpTransport;

/// Pipeline facade owning the transport and the backend address.
pub struct Manager {
    transport: HttpTransport,
    backend: Backend,
}

impl Manager {
    /// Create a manager posting batches to `backend`.
    pub fn new(transport: HttpTransport, backend: Backend) -> Result<Self, TimelineError> {
        backend.validate()?;
        Ok(Self { transport, backend })
    }

    /// Start the transport's flush timer.
    ///
    /// Must be called from within a tokio runtime. Calling it a second
    /// time fails with [`TimelineError::AlreadyStarted`].
    pub fn start(&self) -> Result<(), TimelineError> {
        self.transport.start(&self.backend)
    }

    /// Stop the flush timer, drain buffered points in one final flush,
    /// and release HTTP resources. Sends after shutdown fail with
    /// [`TimelineError::Closed`].
    pub async fn shutdown(&self) {
        self.transport.shutdown().await;
    }

    /// Flush the buffered points immediately.
    pub async fn flush(&self) {
        self.transport.flush().await;
    }

    /// Send one numeric point described by `name, value` parameters.
    ///
    /// The parameter names must match the active numeric template's
    /// variable-field set exactly. Returns once the resolved point is
    /// buffered; it does not wait for the HTTP request.
    pub fn send_number_point(&self, params: &[(&str, ParamValue)]) -> Result<(), TimelineError> {
        let point = self.transport.resolve(PointKind::Number, params)?;
        self.transport.enqueue(point)
    }

    /// Send one textual point described by `name, value` parameters.
    pub fn send_text_point(&self, params: &[(&str, ParamValue)]) -> Result<(), TimelineError> {
        let point = self.transport.resolve(PointKind::Text, params)?;
        self.transport.enqueue(point)
    }

    /// Register a mapping template for numeric points.
    ///
    /// Only the fields named in `variable` are supplied per send; every
    /// other field keeps the prototype's value. Must be called before
    /// [`Manager::start`].
    pub fn override_number_point_mapping(
        &self,
        prototype: &NumberPoint,
        variable: &[&str],
    ) -> Result<(), TimelineError> {
        self.transport.override_number_point_mapping(prototype, variable)
    }

    /// Register a mapping template for textual points.
    pub fn override_text_point_mapping(
        &self,
        prototype: &TextPoint,
        variable: &[&str],
    ) -> Result<(), TimelineError> {
        self.transport.override_text_point_mapping(prototype, variable)
    }

    /// Number of points currently buffered.
    pub fn buffered_points(&self) -> usize {
        self.transport.buffered_points()
    }
}
