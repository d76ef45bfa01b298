// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 beacon contributors

//! Beacon Timeline
//!
//! Asynchronous batching client for pushing time-series points to an
//! HTTP timeseries backend.
//!
//! This crate provides:
//! - Numeric and textual point shapes sharing a common header
//! - Per-point JSON mapping templates with variable-field overrides
//! - A bounded batch buffer with interval-based flushing
//! - A single-flight HTTP transport with failed-batch retention
//!
//! # Overview
//!
//! Points are submitted individually through the [`Manager`] and
//! accumulated in a bounded buffer. A background flusher posts the
//! buffered points as one JSON array per interval:
//!
//! ```text
//! send_number_point/send_text_point --> template resolution --> buffer
//!                                                                 |
//!                              interval tick / explicit flush --> one HTTP request
//! ```
//!
//! Sends never wait for network I/O; delivery failures are logged and
//! the affected batch is retained for the next flush.

mod buffer;

pub mod config;
pub mod error;
pub mod manager;
pub mod mapping;
pub mod point;
pub mod transport;

pub use config::{Backend, HttpTransportConfig};
pub use error::TimelineError;
pub use manager::Manager;
pub use mapping::{ParamValue, PointTemplate};
pub use point::{NumberPoint, Point, PointKind, TextPoint};
pub use transport::HttpTransport;
