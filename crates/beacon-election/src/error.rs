// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 beacon contributors

//! Election error types.

use crate::store::StoreError;
use thiserror::Error;

/// Errors surfaced by the election manager.
///
/// Store errors are returned only from construction and the initial
/// bring-up; once the background loops run, failures are logged and
/// drive state transitions instead.
#[derive(Debug, Error)]
pub enum ElectionError {
    /// Missing or non-parseable configuration field.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The OS hostname could not be resolved.
    #[error("could not resolve this node's hostname")]
    Hostname,

    /// A coordination-store operation failed.
    #[error("coordination store error: {0}")]
    Coordination(#[from] StoreError),

    /// No session with the coordination store is currently held.
    #[error("not connected to the coordination store")]
    NotConnected,

    /// `start` was called more than once.
    #[error("manager already started")]
    AlreadyStarted,

    /// Operation on a terminated manager.
    #[error("manager was terminated")]
    Terminated,
}
