// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 beacon contributors

//! Coordination-store abstraction.
//!
//! Backend-agnostic interface over a hierarchical metadata store with
//! ephemeral nodes and watches. Absence and collision are first-class
//! error variants ([`StoreError::NoNode`], [`StoreError::NodeExists`])
//! so callers never match on error message strings; implementations
//! translate their backend's signals into these variants and map any
//! other failure to [`StoreError::Other`].

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod memory;

/// Coordination-store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The node does not exist.
    #[error("node does not exist: {0}")]
    NoNode(String),

    /// The node already exists.
    #[error("node already exists: {0}")]
    NodeExists(String),

    /// The session backing this handle has ended.
    #[error("session expired")]
    SessionExpired,

    /// Any other backend failure, kept opaque.
    #[error("coordination store error: {0}")]
    Other(String),
}

/// Session lifecycle events delivered on a connection's event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    ConnectedReadOnly,
    SaslAuthenticated,
    HasSession,
    AuthFailed,
    Disconnected,
    Expired,
}

impl SessionState {
    /// Whether this state means the session is gone and election state
    /// must be torn down.
    pub fn is_loss(&self) -> bool {
        matches!(
            self,
            SessionState::AuthFailed | SessionState::Disconnected | SessionState::Expired
        )
    }

    /// Whether this state means the session is usable.
    pub fn is_ready(&self) -> bool {
        matches!(
            self,
            SessionState::SaslAuthenticated | SessionState::HasSession
        )
    }
}

/// Watch events for a single node path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEvent {
    Created,
    Deleted,
    DataChanged,
}

/// A coordination-store backend.
///
/// Connecting yields a session handle together with an unbounded
/// stream of [`SessionState`] events for that session.
pub trait CoordStore: Send + Sync + 'static {
    type Session: CoordSession;

    fn connect(
        &self,
        session_timeout: Duration,
    ) -> impl Future<Output = Result<(Self::Session, mpsc::UnboundedReceiver<SessionState>), StoreError>>
           + Send;
}

/// One session with the store.
///
/// Handles are not required to serialize callers; the election manager
/// owns each handle and serializes its own use of it.
pub trait CoordSession: Send + Sync + 'static {
    /// Read a node's data. Fails with [`StoreError::NoNode`] when the
    /// node is absent.
    fn get(&self, path: &str) -> impl Future<Output = Result<Vec<u8>, StoreError>> + Send;

    /// Create a node. An ephemeral node is deleted automatically when
    /// this session ends. Fails with [`StoreError::NodeExists`] when
    /// the path is taken.
    fn create(
        &self,
        path: &str,
        data: &[u8],
        ephemeral: bool,
    ) -> impl Future<Output = Result<String, StoreError>> + Send;

    /// Delete a node. Fails with [`StoreError::NoNode`] when absent.
    fn delete(&self, path: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// List the names of a node's children. Fails with
    /// [`StoreError::NoNode`] when the parent is absent.
    fn children(&self, path: &str) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Report whether `path` exists and watch it.
    ///
    /// The returned stream yields every create/delete/data event for
    /// the path until the session closes. Backends with one-shot
    /// watches re-arm them internally.
    fn exists_watch(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<(bool, mpsc::UnboundedReceiver<NodeEvent>), StoreError>> + Send;

    /// Close the session, releasing its ephemeral nodes and watches.
    fn close(&self) -> impl Future<Output = ()> + Send;
}
