// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 beacon contributors

//! Cluster membership snapshot.

use serde::Serialize;

/// Point-in-time view of the election cluster, derived on demand from
/// the coordination store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterInfo {
    /// Whether the local node currently holds the master role.
    pub is_master: bool,
    /// Name of the current master. Empty when no master is elected;
    /// an absent master is a valid cluster state, not an error.
    pub master: String,
    /// Registered slave node names.
    pub slaves: Vec<String>,
    /// Master (when present) followed by the slaves.
    pub nodes: Vec<String>,
    /// Number of entries in `nodes`.
    pub num_nodes: usize,
}
