// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 beacon contributors

//! Election scenarios over the in-process coordination store.

use beacon_election::{
    ElectionConfig, ElectionError, ElectionState, Feedback, FeedbackStream, Manager, MemoryStore,
};
use std::time::Duration;

const MASTER_PATH: &str = "/election/master";
const SLAVES_PATH: &str = "/election/slaves";

/// Install the test subscriber; later calls are no-ops.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn config(name: &str) -> ElectionConfig {
    ElectionConfig {
        node_name: Some(name.to_string()),
        // keep the membership ticker quiet unless a test polls it
        cluster_change_check_ms: 60_000,
        reconnection_timeout_secs: 1,
        ..Default::default()
    }
}

fn polling_config(name: &str) -> ElectionConfig {
    ElectionConfig {
        cluster_change_check_ms: 50,
        ..config(name)
    }
}

async fn recv_within(stream: &mut FeedbackStream, ms: u64) -> Option<Feedback> {
    tokio::time::timeout(Duration::from_millis(ms), stream.recv())
        .await
        .ok()
        .flatten()
}

#[tokio::test]
async fn test_first_node_becomes_master() {
    init_tracing();
    let store = MemoryStore::new();
    let manager = Manager::new(config("node-a"), store.clone()).expect("manager");
    let mut feedback = manager.feedback().expect("feedback");

    manager.start().await.expect("start");

    assert_eq!(recv_within(&mut feedback, 1000).await, Some(Feedback::Master));
    assert!(manager.is_master());
    assert_eq!(manager.state(), ElectionState::Master);
    assert_eq!(store.data(MASTER_PATH), Some(b"node-a".to_vec()));

    manager.terminate().await;
}

#[tokio::test]
async fn test_second_node_registers_as_slave() {
    init_tracing();
    let store = MemoryStore::new();

    let master = Manager::new(config("node-a"), store.clone()).expect("manager");
    let mut master_feedback = master.feedback().expect("feedback");
    master.start().await.expect("start master");
    assert_eq!(
        recv_within(&mut master_feedback, 1000).await,
        Some(Feedback::Master)
    );

    let slave = Manager::new(config("node-b"), store.clone()).expect("manager");
    let mut slave_feedback = slave.feedback().expect("feedback");
    slave.start().await.expect("start slave");

    assert_eq!(
        recv_within(&mut slave_feedback, 1000).await,
        Some(Feedback::Slave)
    );
    assert!(!slave.is_master());
    assert_eq!(slave.state(), ElectionState::Slave);
    assert_eq!(
        store.data(&format!("{SLAVES_PATH}/node-b")),
        Some(b"node-b".to_vec())
    );

    let cluster = slave.cluster_info().await.expect("cluster info");
    assert!(!cluster.is_master);
    assert_eq!(cluster.master, "node-a");
    assert_eq!(cluster.slaves, vec!["node-b".to_string()]);
    assert_eq!(
        cluster.nodes,
        vec!["node-a".to_string(), "node-b".to_string()]
    );
    assert_eq!(cluster.num_nodes, 2);

    slave.terminate().await;
    master.terminate().await;
}

#[tokio::test]
async fn test_slave_takes_over_when_master_quits() {
    init_tracing();
    let store = MemoryStore::new();

    let node_a = Manager::new(config("node-a"), store.clone()).expect("manager");
    let mut feedback_a = node_a.feedback().expect("feedback");
    node_a.start().await.expect("start a");
    assert_eq!(recv_within(&mut feedback_a, 1000).await, Some(Feedback::Master));

    let node_b = Manager::new(config("node-b"), store.clone()).expect("manager");
    let mut feedback_b = node_b.feedback().expect("feedback");
    node_b.start().await.expect("start b");
    assert_eq!(recv_within(&mut feedback_b, 1000).await, Some(Feedback::Slave));

    // the master leaves; its ephemeral claim disappears with the session
    node_a.terminate().await;

    assert_eq!(recv_within(&mut feedback_b, 1000).await, Some(Feedback::Master));
    assert!(node_b.is_master());
    assert_eq!(store.data(MASTER_PATH), Some(b"node-b".to_vec()));
    // the new master's slave entry is gone
    assert!(!store.exists(&format!("{SLAVES_PATH}/node-b")));

    node_b.terminate().await;
}

#[tokio::test]
async fn test_cluster_changed_follows_membership() {
    init_tracing();
    let store = MemoryStore::new();

    let node_a = Manager::new(polling_config("node-a"), store.clone()).expect("manager");
    let mut feedback_a = node_a.feedback().expect("feedback");
    node_a.start().await.expect("start a");
    assert_eq!(recv_within(&mut feedback_a, 1000).await, Some(Feedback::Master));

    // stable single-node cluster: no change events
    assert_eq!(recv_within(&mut feedback_a, 300).await, None);

    let node_b = Manager::new(config("node-b"), store.clone()).expect("manager");
    node_b.start().await.expect("start b");

    assert_eq!(
        recv_within(&mut feedback_a, 1000).await,
        Some(Feedback::ClusterChanged)
    );
    // membership is stable again
    assert_eq!(recv_within(&mut feedback_a, 300).await, None);

    // the slave leaving is a membership change too
    node_b.terminate().await;
    assert_eq!(
        recv_within(&mut feedback_a, 1000).await,
        Some(Feedback::ClusterChanged)
    );

    node_a.terminate().await;
}

#[tokio::test]
async fn test_no_feedback_after_terminate() {
    init_tracing();
    let store = MemoryStore::new();
    let manager = Manager::new(config("node-a"), store.clone()).expect("manager");
    let mut feedback = manager.feedback().expect("feedback");

    manager.start().await.expect("start");
    manager.terminate().await;

    // buffered events drain, then the stream ends
    let mut ended = false;
    for _ in 0..8 {
        if recv_within(&mut feedback, 250).await.is_none() {
            ended = true;
            break;
        }
    }
    assert!(ended, "feedback stream should end after terminate");
    assert_eq!(feedback.recv().await, None);

    assert!(matches!(
        manager.feedback(),
        Err(ElectionError::Terminated)
    ));
    assert_eq!(manager.state(), ElectionState::Terminated);
}

#[tokio::test]
async fn test_master_reconnects_after_session_expiry() {
    init_tracing();
    let store = MemoryStore::new();
    let manager = Manager::new(config("node-a"), store.clone()).expect("manager");
    let mut feedback = manager.feedback().expect("feedback");

    manager.start().await.expect("start");
    assert_eq!(recv_within(&mut feedback, 1000).await, Some(Feedback::Master));

    assert!(store.expire_owner_of(MASTER_PATH));

    assert_eq!(
        recv_within(&mut feedback, 1000).await,
        Some(Feedback::Disconnected)
    );
    assert!(!manager.is_master());

    // reconnects after the reconnection timeout and claims again
    assert_eq!(recv_within(&mut feedback, 3000).await, Some(Feedback::Master));
    assert!(manager.is_master());
    assert_eq!(store.data(MASTER_PATH), Some(b"node-a".to_vec()));

    manager.terminate().await;
}
