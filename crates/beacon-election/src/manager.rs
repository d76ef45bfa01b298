// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 beacon contributors

//! Election state machine and background loops.
//!
//! The manager claims the master node with an ephemeral create; the
//! loser registers under the slaves path. Three loops run per session:
//! the supervisor consuming session events (and owning reconnection),
//! the election watcher reacting to master-node create/delete, and the
//! membership ticker polling the slaves path. Each loop has its own
//! bounded control channel; termination fans out to all of them, and
//! the supervisor awaits its children before spawning replacements so
//! no loop leaks across reconnects.

use crate::cluster::ClusterInfo;
use crate::config::ElectionConfig;
use crate::error::ElectionError;
use crate::feedback::{Feedback, FeedbackStream, FEEDBACK_CAPACITY};
use crate::store::{CoordSession, CoordStore, NodeEvent, SessionState, StoreError};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Capacity of each control channel.
const CONTROL_CAPACITY: usize = 2;

/// Election lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionState {
    /// No session with the coordination store.
    Disconnected,
    /// Session establishment in progress.
    Connecting,
    /// Session held, role not decided yet.
    Candidate,
    /// This node holds the master node.
    Master,
    /// This node is registered under the slaves path.
    Slave,
    /// `terminate` was called; terminal.
    Terminated,
}

/// Signals fanned out to the background loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Disconnected,
    Terminate,
}

/// What ended one pass of the supervisor's session-event loop.
enum SessionOutcome {
    Lost,
    Terminated,
}

/// Election manager over a coordination store.
///
/// Role and membership observations are delivered on the bounded
/// [`FeedbackStream`]; subscribe before calling [`Manager::start`] to
/// observe the initial role event.
pub struct Manager<S: CoordStore> {
    inner: Arc<Inner<S>>,
    terminate_tx: mpsc::Sender<Control>,
    terminate_rx: Mutex<Option<mpsc::Receiver<Control>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

struct Inner<S: CoordStore> {
    store: S,
    config: ElectionConfig,
    node_name: String,
    is_master: AtomicBool,
    state: RwLock<ElectionState>,
    session: RwLock<Option<Arc<S::Session>>>,
    cluster_nodes: Mutex<HashSet<String>>,
    feedback: Mutex<Option<broadcast::Sender<Feedback>>>,
}

/// Everything tied to one established session.
struct SessionRuntime<Sess> {
    session: Arc<Sess>,
    session_events: mpsc::UnboundedReceiver<SessionState>,
    election_ctl: mpsc::Sender<Control>,
    node_ctl: mpsc::Sender<Control>,
    election_task: JoinHandle<()>,
    node_task: JoinHandle<()>,
}

impl<S: CoordStore> Manager<S> {
    /// Create a manager. The node name defaults to the OS hostname
    /// unless overridden in the configuration.
    pub fn new(config: ElectionConfig, store: S) -> Result<Self, ElectionError> {
        config.validate()?;
        let node_name = match config.node_name.clone() {
            Some(name) => name,
            None => hostname().ok_or(ElectionError::Hostname)?,
        };

        let (terminate_tx, terminate_rx) = mpsc::channel(CONTROL_CAPACITY);
        let (feedback_tx, _) = broadcast::channel(FEEDBACK_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                config,
                node_name,
                is_master: AtomicBool::new(false),
                state: RwLock::new(ElectionState::Disconnected),
                session: RwLock::new(None),
                cluster_nodes: Mutex::new(HashSet::new()),
                feedback: Mutex::new(Some(feedback_tx)),
            }),
            terminate_tx,
            terminate_rx: Mutex::new(Some(terminate_rx)),
            supervisor: Mutex::new(None),
        })
    }

    /// Subscribe to the feedback stream.
    pub fn feedback(&self) -> Result<FeedbackStream, ElectionError> {
        let guard = self.inner.feedback.lock();
        let tx = guard.as_ref().ok_or(ElectionError::Terminated)?;
        Ok(FeedbackStream::new(tx.subscribe()))
    }

    /// Connect, run the election, and start the background loops.
    ///
    /// Store errors during this initial bring-up are returned to the
    /// caller; once `start` has returned, failures are logged and
    /// drive reconnection instead.
    pub async fn start(&self) -> Result<(), ElectionError> {
        if self.state() == ElectionState::Terminated {
            return Err(ElectionError::Terminated);
        }
        let terminate_rx = self
            .terminate_rx
            .lock()
            .take()
            .ok_or(ElectionError::AlreadyStarted)?;

        self.inner.set_state(ElectionState::Connecting);
        let runtime = match Inner::bring_up(&self.inner).await {
            Ok(runtime) => runtime,
            Err(e) => {
                self.inner.set_state(ElectionState::Disconnected);
                *self.terminate_rx.lock() = Some(terminate_rx);
                return Err(e);
            }
        };

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move { inner.supervise(runtime, terminate_rx).await });
        *self.supervisor.lock() = Some(handle);
        Ok(())
    }

    /// Stop every loop, close the session, and end the feedback
    /// stream. No feedback events are emitted afterwards.
    pub async fn terminate(&self) {
        let _ = self.terminate_tx.send(Control::Terminate).await;
        let handle = self.supervisor.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        let session = self.inner.session.write().take();
        if let Some(session) = session {
            session.close().await;
        }

        *self.inner.feedback.lock() = None;
        self.inner.is_master.store(false, Ordering::SeqCst);
        self.inner.set_state(ElectionState::Terminated);
    }

    /// Whether this node currently holds the master role.
    pub fn is_master(&self) -> bool {
        self.inner.is_master.load(Ordering::SeqCst)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ElectionState {
        *self.inner.state.read()
    }

    /// This node's identity in the cluster.
    pub fn node_name(&self) -> &str {
        &self.inner.node_name
    }

    /// Derive a membership snapshot from the coordination store.
    ///
    /// An absent master yields an empty `master` field, not an error.
    pub async fn cluster_info(&self) -> Result<ClusterInfo, ElectionError> {
        let session = self
            .inner
            .session
            .read()
            .clone()
            .ok_or(ElectionError::NotConnected)?;
        self.inner.cluster_snapshot(&session).await
    }
}

impl<S: CoordStore> Inner<S> {
    fn set_state(&self, next: ElectionState) {
        let mut state = self.state.write();
        if *state != next {
            debug!(from = ?*state, to = ?next, "election state change");
            *state = next;
        }
    }

    fn emit(&self, event: Feedback) {
        // no subscriber is fine; lagging subscribers lose the oldest
        // events instead of blocking the election
        if let Some(tx) = self.feedback.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Connect and arm everything tied to the new session.
    async fn bring_up(inner: &Arc<Self>) -> Result<SessionRuntime<S::Session>, ElectionError> {
        info!("connecting to the coordination store");
        let (session, session_events) =
            inner.store.connect(inner.config.session_timeout()).await?;
        let session = Arc::new(session);
        *inner.session.write() = Some(session.clone());
        inner.set_state(ElectionState::Candidate);

        let watch = match inner.arm_session(&session).await {
            Ok(watch) => watch,
            Err(e) => {
                inner.session.write().take();
                session.close().await;
                return Err(e);
            }
        };

        let (election_ctl, election_ctl_rx) = mpsc::channel(CONTROL_CAPACITY);
        let (node_ctl, node_ctl_rx) = mpsc::channel(CONTROL_CAPACITY);

        let election_task = tokio::spawn({
            let inner = inner.clone();
            let session = session.clone();
            async move { inner.election_loop(session, watch, election_ctl_rx).await }
        });
        let node_task = tokio::spawn({
            let inner = inner.clone();
            let session = session.clone();
            async move { inner.membership_loop(session, node_ctl_rx).await }
        });

        Ok(SessionRuntime {
            session,
            session_events,
            election_ctl,
            node_ctl,
            election_task,
            node_task,
        })
    }

    /// Run the election, ensure the slaves parent, arm the master-node
    /// watch, and take the initial membership snapshot.
    async fn arm_session(
        &self,
        session: &Arc<S::Session>,
    ) -> Result<mpsc::UnboundedReceiver<NodeEvent>, ElectionError> {
        self.elect_for_master(session).await?;
        self.ensure_slave_dir(session).await?;

        let (_exists, watch) = session.exists_watch(&self.config.election_node_path).await?;

        let cluster = self.cluster_snapshot(session).await?;
        let mut last = self.cluster_nodes.lock();
        last.clear();
        last.extend(cluster.nodes);
        drop(last);

        Ok(watch)
    }

    /// Consume session events; on loss, tear down and reconnect until
    /// a bring-up succeeds or the manager terminates.
    async fn supervise(
        self: Arc<Self>,
        mut runtime: SessionRuntime<S::Session>,
        mut terminate_rx: mpsc::Receiver<Control>,
    ) {
        loop {
            let outcome = Self::watch_session(&mut runtime.session_events, &mut terminate_rx).await;

            match outcome {
                SessionOutcome::Terminated => {
                    info!("terminating the election manager");
                    self.teardown(runtime, Control::Terminate).await;
                    self.set_state(ElectionState::Terminated);
                    return;
                }
                SessionOutcome::Lost => {
                    self.teardown(runtime, Control::Disconnected).await;
                    self.set_state(ElectionState::Disconnected);
                }
            }

            // reconnect loop
            runtime = loop {
                info!(
                    seconds = self.config.reconnection_timeout_secs,
                    "waiting before reconnecting"
                );
                tokio::select! {
                    _ = tokio::time::sleep(self.config.reconnection_timeout()) => {}
                    _ = terminate_rx.recv() => {
                        info!("terminating the election manager while disconnected");
                        self.set_state(ElectionState::Terminated);
                        return;
                    }
                }

                self.set_state(ElectionState::Connecting);
                match Self::bring_up(&self).await {
                    Ok(runtime) => break runtime,
                    Err(e) => {
                        error!(error = %e, "reconnection attempt failed");
                        self.set_state(ElectionState::Disconnected);
                    }
                }
            };
        }
    }

    async fn watch_session(
        session_events: &mut mpsc::UnboundedReceiver<SessionState>,
        terminate_rx: &mut mpsc::Receiver<Control>,
    ) -> SessionOutcome {
        loop {
            let event = tokio::select! {
                event = session_events.recv() => event,
                _ = terminate_rx.recv() => return SessionOutcome::Terminated,
            };
            match event {
                Some(state) if state.is_loss() => {
                    warn!(state = ?state, "coordination session lost");
                    return SessionOutcome::Lost;
                }
                Some(SessionState::Connected | SessionState::ConnectedReadOnly) => {
                    info!("connection established with the coordination store");
                }
                Some(state) if state.is_ready() => {
                    info!("session created in the coordination store");
                }
                Some(_) => {}
                // the backend dropped the stream without a loss event
                None => return SessionOutcome::Lost,
            }
        }
    }

    /// Signal both loops, wait for them, and close the session.
    async fn teardown(&self, runtime: SessionRuntime<S::Session>, signal: Control) {
        let _ = runtime.election_ctl.send(signal).await;
        let _ = runtime.node_ctl.send(signal).await;
        let _ = runtime.election_task.await;
        let _ = runtime.node_task.await;

        self.session.write().take();
        runtime.session.close().await;
        self.is_master.store(false, Ordering::SeqCst);
    }

    /// React to master-node create/delete events.
    async fn election_loop(
        self: Arc<Self>,
        session: Arc<S::Session>,
        mut watch: mpsc::UnboundedReceiver<NodeEvent>,
        mut ctl: mpsc::Receiver<Control>,
    ) {
        let mut watch_open = true;
        loop {
            tokio::select! {
                event = watch.recv(), if watch_open => match event {
                    Some(NodeEvent::Deleted) => {
                        info!("master has quit, trying to claim the master role");
                        self.set_state(ElectionState::Candidate);
                        if let Err(e) = self.elect_for_master(&session).await {
                            error!(error = %e, "election attempt failed");
                        }
                    }
                    Some(NodeEvent::Created) => debug!("a new master has been elected"),
                    Some(NodeEvent::DataChanged) => {}
                    None => watch_open = false,
                },
                cmd = ctl.recv() => match cmd {
                    Some(Control::Disconnected) => {
                        info!("election loop stopping, session lost");
                        self.is_master.store(false, Ordering::SeqCst);
                        self.emit(Feedback::Disconnected);
                        return;
                    }
                    Some(Control::Terminate) | None => {
                        debug!("election loop terminated");
                        return;
                    }
                }
            }
        }
    }

    /// Poll the slaves path and report membership changes.
    async fn membership_loop(
        self: Arc<Self>,
        session: Arc<S::Session>,
        mut ctl: mpsc::Receiver<Control>,
    ) {
        let mut ticker = tokio::time::interval(self.config.cluster_change_check());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.cluster_snapshot(&session).await {
                        Ok(cluster) => {
                            let changed = {
                                let mut last = self.cluster_nodes.lock();
                                let changed = cluster.nodes.len() != last.len()
                                    || cluster.nodes.iter().any(|node| !last.contains(node));
                                if changed {
                                    last.clear();
                                    last.extend(cluster.nodes.iter().cloned());
                                }
                                changed
                            };
                            if changed {
                                info!(nodes = ?cluster.nodes, "cluster membership changed");
                                self.emit(Feedback::ClusterChanged);
                            }
                        }
                        Err(e) => error!(error = %e, "cluster membership check failed"),
                    }
                }
                cmd = ctl.recv() => match cmd {
                    Some(Control::Disconnected) => {
                        info!("membership loop stopping, session lost");
                        return;
                    }
                    Some(Control::Terminate) | None => {
                        debug!("membership loop terminated");
                        return;
                    }
                }
            }
        }
    }

    /// Try to claim the master role; fall back to slave registration.
    async fn elect_for_master(&self, session: &Arc<S::Session>) -> Result<(), ElectionError> {
        let name = self.node_name.as_str();

        match self
            .node_data(session, &self.config.election_node_path)
            .await?
        {
            Some(master) if master == name => {
                // the store still holds our claim from a previous
                // session; re-affirm instead of demoting ourselves
                info!(master = %master, "this node already holds the master entry");
                self.is_master.store(true, Ordering::SeqCst);
                self.set_state(ElectionState::Master);
                self.emit(Feedback::Master);
                return Ok(());
            }
            Some(master) => {
                info!(master = %master, "another node is the master");
                return self.register_as_slave(session).await;
            }
            None => {}
        }

        match session
            .create(&self.config.election_node_path, name.as_bytes(), true)
            .await
        {
            Ok(path) => {
                info!(path = %path, "master entry created, this node is now the master");
                self.is_master.store(true, Ordering::SeqCst);
                self.set_state(ElectionState::Master);
                self.emit(Feedback::Master);
                self.remove_slave_entry(session).await;
                Ok(())
            }
            Err(StoreError::NodeExists(_)) => {
                info!("another node became master before this node");
                self.register_as_slave(session).await
            }
            Err(e) => {
                error!(error = %e, "failed creating the master entry");
                Err(e.into())
            }
        }
    }

    /// Register this node under the slaves path. Idempotent.
    async fn register_as_slave(&self, session: &Arc<S::Session>) -> Result<(), ElectionError> {
        self.ensure_slave_dir(session).await?;

        let path = self.slave_entry_path();
        match session
            .create(&path, self.node_name.as_bytes(), true)
            .await
        {
            Ok(created) => info!(path = %created, "slave entry created"),
            Err(StoreError::NodeExists(_)) => debug!(path = %path, "slave entry already present"),
            Err(e) => return Err(e.into()),
        }

        self.is_master.store(false, Ordering::SeqCst);
        self.set_state(ElectionState::Slave);
        self.emit(Feedback::Slave);
        Ok(())
    }

    /// Create the persistent slaves parent when missing.
    async fn ensure_slave_dir(&self, session: &Arc<S::Session>) -> Result<(), ElectionError> {
        if self
            .node_data(session, &self.config.slave_nodes_path)
            .await?
            .is_none()
        {
            match session.create(&self.config.slave_nodes_path, &[], false).await {
                Ok(path) => info!(path = %path, "slave directory created"),
                // another node raced us to it
                Err(StoreError::NodeExists(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Drop this node's slave entry after winning the election.
    async fn remove_slave_entry(&self, session: &Arc<S::Session>) {
        let path = self.slave_entry_path();
        match session.delete(&path).await {
            Ok(()) => info!(path = %path, "stale slave entry removed"),
            Err(StoreError::NoNode(_)) => {}
            Err(e) => warn!(error = %e, "could not remove the stale slave entry"),
        }
    }

    fn slave_entry_path(&self) -> String {
        format!("{}/{}", self.config.slave_nodes_path, self.node_name)
    }

    /// A node's data, with absence mapped to `None`.
    async fn node_data(
        &self,
        session: &Arc<S::Session>,
        path: &str,
    ) -> Result<Option<String>, ElectionError> {
        match session.get(path).await {
            Ok(data) => Ok(Some(String::from_utf8_lossy(&data).into_owned())),
            Err(StoreError::NoNode(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Derive the cluster snapshot: master (when present) plus slaves.
    async fn cluster_snapshot(
        &self,
        session: &Arc<S::Session>,
    ) -> Result<ClusterInfo, ElectionError> {
        let master = self
            .node_data(session, &self.config.election_node_path)
            .await?
            .unwrap_or_default();

        let slaves = match session.children(&self.config.slave_nodes_path).await {
            Ok(children) => children,
            Err(StoreError::NoNode(_)) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut nodes = Vec::with_capacity(slaves.len() + 1);
        if !master.is_empty() {
            nodes.push(master.clone());
        }
        nodes.extend(slaves.iter().cloned());
        let num_nodes = nodes.len();

        Ok(ClusterInfo {
            is_master: self.is_master.load(Ordering::SeqCst),
            master,
            slaves,
            nodes,
            num_nodes,
        })
    }
}

/// System hostname used as the default node identity.
#[cfg(unix)]
fn hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    // SAFETY:
    // - buf is a valid mutable buffer with known size (256 bytes)
    // - gethostname writes at most buf.len() bytes including NUL
    let ret = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if ret != 0 {
        return None;
    }

    // SAFETY: gethostname succeeded, so buf holds a NUL-terminated
    // string that we copy out immediately.
    let name = unsafe { std::ffi::CStr::from_ptr(buf.as_ptr() as *const libc::c_char) }
        .to_string_lossy()
        .into_owned();

    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(windows)]
fn hostname() -> Option<String> {
    std::env::var("COMPUTERNAME").ok().filter(|name| !name.is_empty())
}
