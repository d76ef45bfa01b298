// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 beacon contributors

//! In-process coordination store.
//!
//! A complete [`CoordStore`] implementation with real session
//! semantics: ephemeral nodes are deleted when their session ends,
//! watches fan out create/delete events, and every session gets its
//! own lifecycle event stream. Backs the integration tests and serves
//! as an embedded store for single-process deployments.
//!
//! Nodes are kept as a flat map of hierarchical names; parents are not
//! required to exist before a child is created.

use super::{CoordSession, CoordStore, NodeEvent, SessionState, StoreError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Shared in-process store. Clones refer to the same node tree.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    nodes: Mutex<HashMap<String, NodeRecord>>,
    watches: Mutex<HashMap<String, Vec<WatchRecord>>>,
    sessions: Mutex<HashMap<u64, mpsc::UnboundedSender<SessionState>>>,
    next_session_id: AtomicU64,
}

struct NodeRecord {
    data: Vec<u8>,
    ephemeral_owner: Option<u64>,
}

struct WatchRecord {
    session: u64,
    events: mpsc::UnboundedSender<NodeEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a node exists.
    pub fn exists(&self, path: &str) -> bool {
        self.inner.nodes.lock().contains_key(path)
    }

    /// A node's data, when present.
    pub fn data(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.nodes.lock().get(path).map(|n| n.data.clone())
    }

    /// End the session owning the ephemeral node at `path`, as if its
    /// timeout elapsed: its ephemerals are deleted, its watches are
    /// dropped, and `Expired` is delivered on its event stream.
    ///
    /// Returns false when the node is absent or not ephemeral.
    pub fn expire_owner_of(&self, path: &str) -> bool {
        let owner = self
            .inner
            .nodes
            .lock()
            .get(path)
            .and_then(|n| n.ephemeral_owner);
        match owner {
            Some(session) => {
                self.inner.end_session(session, true);
                true
            }
            None => false,
        }
    }
}

impl StoreInner {
    fn session_alive(&self, session: u64) -> bool {
        self.sessions.lock().contains_key(&session)
    }

    /// Deliver a node event to every live watcher of `path`.
    fn fire(&self, path: &str, event: NodeEvent) {
        let mut watches = self.watches.lock();
        if let Some(list) = watches.get_mut(path) {
            list.retain(|watch| watch.events.send(event).is_ok());
        }
    }

    fn end_session(&self, session: u64, expired: bool) {
        let Some(events) = self.sessions.lock().remove(&session) else {
            return;
        };

        // Ephemeral cleanup happens before the watches of other
        // sessions learn about it.
        let removed: Vec<String> = {
            let mut nodes = self.nodes.lock();
            let paths: Vec<String> = nodes
                .iter()
                .filter(|(_, node)| node.ephemeral_owner == Some(session))
                .map(|(path, _)| path.clone())
                .collect();
            for path in &paths {
                nodes.remove(path);
            }
            paths
        };

        {
            let mut watches = self.watches.lock();
            for list in watches.values_mut() {
                list.retain(|watch| watch.session != session);
            }
        }

        for path in &removed {
            self.fire(path, NodeEvent::Deleted);
        }

        if expired {
            let _ = events.send(SessionState::Expired);
        }
        debug!(session, expired, ephemerals = removed.len(), "session ended");
    }
}

impl CoordStore for MemoryStore {
    type Session = MemorySession;

    fn connect(
        &self,
        _session_timeout: Duration,
    ) -> impl std::future::Future<
        Output = Result<(Self::Session, mpsc::UnboundedReceiver<SessionState>), StoreError>,
    > + Send {
        let inner = self.inner.clone();
        async move {
            let id = inner.next_session_id.fetch_add(1, Ordering::SeqCst) + 1;
            let (tx, rx) = mpsc::unbounded_channel();
            let _ = tx.send(SessionState::Connected);
            let _ = tx.send(SessionState::HasSession);
            inner.sessions.lock().insert(id, tx);
            debug!(session = id, "session established");
            Ok((MemorySession { id, inner }, rx))
        }
    }
}

/// One session with a [`MemoryStore`].
pub struct MemorySession {
    id: u64,
    inner: Arc<StoreInner>,
}

impl MemorySession {
    fn check_alive(&self) -> Result<(), StoreError> {
        if self.inner.session_alive(self.id) {
            Ok(())
        } else {
            Err(StoreError::SessionExpired)
        }
    }
}

impl CoordSession for MemorySession {
    fn get(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>, StoreError>> + Send {
        let path = path.to_string();
        let inner = self.inner.clone();
        let alive = self.check_alive();
        async move {
            alive?;
            inner
                .nodes
                .lock()
                .get(&path)
                .map(|node| node.data.clone())
                .ok_or(StoreError::NoNode(path))
        }
    }

    fn create(
        &self,
        path: &str,
        data: &[u8],
        ephemeral: bool,
    ) -> impl std::future::Future<Output = Result<String, StoreError>> + Send {
        let path = path.to_string();
        let data = data.to_vec();
        let inner = self.inner.clone();
        let session = self.id;
        let alive = self.check_alive();
        async move {
            alive?;
            {
                let mut nodes = inner.nodes.lock();
                if nodes.contains_key(&path) {
                    return Err(StoreError::NodeExists(path));
                }
                nodes.insert(
                    path.clone(),
                    NodeRecord {
                        data,
                        ephemeral_owner: ephemeral.then_some(session),
                    },
                );
            }
            inner.fire(&path, NodeEvent::Created);
            Ok(path)
        }
    }

    fn delete(&self, path: &str) -> impl std::future::Future<Output = Result<(), StoreError>> + Send {
        let path = path.to_string();
        let inner = self.inner.clone();
        let alive = self.check_alive();
        async move {
            alive?;
            let removed = inner.nodes.lock().remove(&path);
            match removed {
                Some(_) => {
                    inner.fire(&path, NodeEvent::Deleted);
                    Ok(())
                }
                None => Err(StoreError::NoNode(path)),
            }
        }
    }

    fn children(
        &self,
        path: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>, StoreError>> + Send {
        let path = path.to_string();
        let inner = self.inner.clone();
        let alive = self.check_alive();
        async move {
            alive?;
            let nodes = inner.nodes.lock();
            if !nodes.contains_key(&path) {
                return Err(StoreError::NoNode(path));
            }
            let prefix = format!("{path}/");
            let mut names: Vec<String> = nodes
                .keys()
                .filter_map(|key| key.strip_prefix(&prefix))
                .filter(|rest| !rest.is_empty() && !rest.contains('/'))
                .map(str::to_string)
                .collect();
            names.sort();
            Ok(names)
        }
    }

    fn exists_watch(
        &self,
        path: &str,
    ) -> impl std::future::Future<Output = Result<(bool, mpsc::UnboundedReceiver<NodeEvent>), StoreError>>
           + Send {
        let path = path.to_string();
        let inner = self.inner.clone();
        let session = self.id;
        let alive = self.check_alive();
        async move {
            alive?;
            let (tx, rx) = mpsc::unbounded_channel();
            let exists = inner.nodes.lock().contains_key(&path);
            inner
                .watches
                .lock()
                .entry(path)
                .or_default()
                .push(WatchRecord {
                    session,
                    events: tx,
                });
            Ok((exists, rx))
        }
    }

    fn close(&self) -> impl std::future::Future<Output = ()> + Send {
        let inner = self.inner.clone();
        let session = self.id;
        async move {
            inner.end_session(session, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn session(store: &MemoryStore) -> (MemorySession, mpsc::UnboundedReceiver<SessionState>) {
        store
            .connect(Duration::from_secs(5))
            .await
            .expect("connect")
    }

    #[tokio::test]
    async fn test_create_get_delete_roundtrip() {
        let store = MemoryStore::new();
        let (session, _events) = session(&store).await;

        let path = session.create("/a", b"one", false).await.expect("create");
        assert_eq!(path, "/a");
        assert_eq!(session.get("/a").await.expect("get"), b"one".to_vec());

        session.delete("/a").await.expect("delete");
        assert_eq!(
            session.get("/a").await.unwrap_err(),
            StoreError::NoNode("/a".to_string())
        );
    }

    #[tokio::test]
    async fn test_create_collision_is_node_exists() {
        let store = MemoryStore::new();
        let (session, _events) = session(&store).await;

        session.create("/a", b"one", false).await.expect("create");
        assert_eq!(
            session.create("/a", b"two", false).await.unwrap_err(),
            StoreError::NodeExists("/a".to_string())
        );
    }

    #[tokio::test]
    async fn test_children_lists_direct_children_only() {
        let store = MemoryStore::new();
        let (session, _events) = session(&store).await;

        session.create("/dir", &[], false).await.expect("create");
        session.create("/dir/b", &[], false).await.expect("create");
        session.create("/dir/a", &[], false).await.expect("create");
        session.create("/dir/a/nested", &[], false).await.expect("create");
        session.create("/other", &[], false).await.expect("create");

        let children = session.children("/dir").await.expect("children");
        assert_eq!(children, vec!["a".to_string(), "b".to_string()]);

        assert_eq!(
            session.children("/missing").await.unwrap_err(),
            StoreError::NoNode("/missing".to_string())
        );
    }

    #[tokio::test]
    async fn test_close_removes_ephemerals_and_fires_watch() {
        let store = MemoryStore::new();
        let (owner, _owner_events) = session(&store).await;
        let (observer, _observer_events) = session(&store).await;

        owner.create("/leader", b"n1", true).await.expect("create");
        let (exists, mut watch) = observer.exists_watch("/leader").await.expect("watch");
        assert!(exists);

        owner.close().await;

        assert_eq!(watch.recv().await, Some(NodeEvent::Deleted));
        assert!(!store.exists("/leader"));
    }

    #[tokio::test]
    async fn test_persistent_nodes_survive_session_close() {
        let store = MemoryStore::new();
        let (session_a, _events) = session(&store).await;

        session_a.create("/dir", b"keep", false).await.expect("create");
        session_a.close().await;

        assert_eq!(store.data("/dir"), Some(b"keep".to_vec()));
    }

    #[tokio::test]
    async fn test_expire_owner_sends_expired_event() {
        let store = MemoryStore::new();
        let (owner, mut owner_events) = session(&store).await;

        owner.create("/leader", b"n1", true).await.expect("create");
        assert!(store.expire_owner_of("/leader"));

        assert_eq!(owner_events.recv().await, Some(SessionState::Connected));
        assert_eq!(owner_events.recv().await, Some(SessionState::HasSession));
        assert_eq!(owner_events.recv().await, Some(SessionState::Expired));

        assert_eq!(
            owner.get("/leader").await.unwrap_err(),
            StoreError::SessionExpired
        );
        assert!(!store.expire_owner_of("/leader"));
    }

    #[tokio::test]
    async fn test_watch_reports_created_nodes() {
        let store = MemoryStore::new();
        let (watcher, _watcher_events) = session(&store).await;
        let (writer, _writer_events) = session(&store).await;

        let (exists, mut watch) = watcher.exists_watch("/leader").await.expect("watch");
        assert!(!exists);

        writer.create("/leader", b"n2", true).await.expect("create");
        assert_eq!(watch.recv().await, Some(NodeEvent::Created));
    }
}
