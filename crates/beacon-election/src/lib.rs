// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 beacon contributors

//! Beacon Election
//!
//! Elects exactly one master among a set of peer nodes through a
//! shared hierarchical coordination store, registers the remaining
//! nodes as slaves, and reports role and membership changes on a
//! bounded feedback stream.
//!
//! This crate provides:
//! - A backend-agnostic coordination-store abstraction with named
//!   not-exist / already-exists error variants
//! - An in-process store implementation with real session semantics
//! - The election state machine with ephemeral master claims
//! - Cluster membership polling with change events
//! - Automatic reconnection after session loss
//!
//! # Overview
//!
//! ```text
//! Manager::start --> connect --> claim master node (ephemeral)
//!                       |            |         \
//!                       |         Master      Slave (ephemeral child)
//!                       |            |         /
//!                       |        feedback stream {Master, Slave, ClusterChanged, Disconnected}
//!                       |
//!                  session loss --> teardown --> reconnect loop
//! ```
//!
//! The feedback stream is bounded; when the consumer lags, the oldest
//! events are dropped so election logic never blocks.

pub mod cluster;
pub mod config;
pub mod error;
pub mod feedback;
pub mod manager;
pub mod store;

pub use cluster::ClusterInfo;
pub use config::ElectionConfig;
pub use error::ElectionError;
pub use feedback::{Feedback, FeedbackStream};
pub use manager::{ElectionState, Manager};
pub use store::memory::MemoryStore;
pub use store::{CoordSession, CoordStore, NodeEvent, SessionState, StoreError};
