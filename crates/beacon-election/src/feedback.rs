// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 beacon contributors

//! Role and cluster feedback stream.
//!
//! A bounded ordered stream of election observations. When the
//! consumer falls behind, the oldest events are dropped so election
//! logic never blocks; ordering of the delivered events is preserved.

use tokio::sync::broadcast;
use tracing::trace;

/// Capacity of the feedback stream.
pub(crate) const FEEDBACK_CAPACITY: usize = 5;

/// One election observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    /// This node holds the master role.
    Master,
    /// This node is registered as a slave.
    Slave,
    /// The set of cluster nodes changed.
    ClusterChanged,
    /// The coordination session was lost.
    Disconnected,
}

/// Consumer end of the feedback stream.
pub struct FeedbackStream {
    rx: broadcast::Receiver<Feedback>,
}

impl FeedbackStream {
    pub(crate) fn new(rx: broadcast::Receiver<Feedback>) -> Self {
        Self { rx }
    }

    /// Receive the next event.
    ///
    /// Returns `None` once the manager has terminated and every
    /// buffered event has been delivered.
    pub async fn recv(&mut self) -> Option<Feedback> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    trace!(skipped, "feedback consumer lagged, oldest events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive the next event without waiting.
    pub fn try_recv(&mut self) -> Option<Feedback> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    trace!(skipped, "feedback consumer lagged, oldest events dropped");
                }
                Err(_) => return None,
            }
        }
    }
}
