//! Deadlock detection specs
//!
//! Crossed waits are reported, locally within a node and globally across
//! nodes that publish their wait-for graphs.

use crate::prelude::*;

/// `holder` holds `held` and then waits for `wanted`
async fn hold_then_wait(
    node: &Arc<Node>,
    who: &str,
    held: &str,
    wanted: &str,
) -> tokio::task::JoinHandle<bool> {
    node.try_lock(&caller(who), held, "k", None).await.unwrap();
    let (node, who, wanted) = (node.clone(), who.to_string(), wanted.to_string());
    tokio::spawn(async move {
        node.lock(
            &caller(&who),
            &wanted,
            "k",
            wait_for(LockProtocol::Reentrant, Duration::from_millis(300)),
        )
        .await
        .is_some()
    })
}

#[tokio::test]
async fn two_way_cycle_on_one_node() {
    let cluster = Cluster::new();
    let node = cluster.node("n1");

    let a = hold_then_wait(&node, "a", "left", "right").await;
    let b = hold_then_wait(&node, "b", "right", "left").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let cycles = node.detect_local_deadlocks();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].len(), 2);

    // Reported, not broken: both waits run out
    assert!(!a.await.unwrap());
    assert!(!b.await.unwrap());
}

#[tokio::test]
async fn two_way_cycle_across_nodes() {
    let cluster = Cluster::new();
    let (n1, n2) = (cluster.node("n1"), cluster.node("n2"));

    let a = hold_then_wait(&n1, "a", "left", "right").await;
    let b = hold_then_wait(&n2, "b", "right", "left").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(n1.detect_local_deadlocks().is_empty());
    assert!(n2.detect_local_deadlocks().is_empty());
    assert!(n1.detect_global_deadlocks().await.is_empty());

    assert!(n1.sync_local_state_to_global().await);
    assert!(n2.sync_local_state_to_global().await);
    assert_eq!(n1.detect_global_deadlocks().await.len(), 1);
    assert_eq!(n2.detect_global_deadlocks().await.len(), 1);

    a.await.unwrap();
    b.await.unwrap();
}

#[tokio::test]
async fn silent_node_drops_out_of_the_global_graph() {
    let cluster = Cluster::new();
    let (n1, n2) = (cluster.node("n1"), cluster.node("n2"));

    let a = hold_then_wait(&n1, "a", "left", "right").await;
    let b = hold_then_wait(&n2, "b", "right", "left").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    n1.sync_local_state_to_global().await;
    n2.sync_local_state_to_global().await;

    // Only n1 keeps publishing after the snapshot lifetime passes
    cluster.advance(n1.config().deadlock.snapshot_ttl + Duration::from_secs(1));
    n1.sync_local_state_to_global().await;
    assert!(n1.detect_global_deadlocks().await.is_empty());

    a.await.unwrap();
    b.await.unwrap();
}
