// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 beacon contributors

//! Pipeline error types.

use crate::point::PointKind;
use thiserror::Error;

/// Errors produced by the timeline pipeline.
///
/// Construction-time errors are returned to the caller; failures during
/// a flush are logged by the transport and drive batch retention, never
/// process exit.
#[derive(Debug, Error)]
pub enum TimelineError {
    /// Missing or non-parseable configuration field.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Send-time name or type mismatch against the active template.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// A declared variable name is not a field of the point kind.
    #[error("unknown field '{field}' for {kind} points")]
    InvalidField { kind: PointKind, field: String },

    /// An identical mapping template was already registered.
    #[error("an identical mapping for {0} points is already registered")]
    Duplicate(PointKind),

    /// The buffer already holds `buffer_size` points.
    #[error("point buffer is full")]
    BufferFull,

    /// Operation on a shut-down manager.
    #[error("manager is shut down")]
    Closed,

    /// `start` was called more than once.
    #[error("manager already started")]
    AlreadyStarted,

    /// Network error or unexpected response status during a flush.
    #[error("transport failure: {0}")]
    Transport(String),
}
