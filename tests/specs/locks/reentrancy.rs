//! Reentrancy specs
//!
//! A caller that already holds a lock re-enters it without asking the
//! store again, and the store lock survives until the last release.

use crate::prelude::*;

#[tokio::test]
async fn nested_acquires_hit_the_store_once() {
    let cluster = Cluster::new();
    let node = cluster.node("n1");
    let me = caller("req-1");

    let mut handles = Vec::new();
    for _ in 0..5 {
        handles.push(node.try_lock(&me, "order", "o-9", None).await.unwrap());
    }
    assert_eq!(cluster.store().script_count("acquire_exclusive"), 1);
    assert_eq!(node.hold_count(&me, "order", "o-9", LockProtocol::Reentrant), 5);

    while let Some(handle) = handles.pop() {
        assert!(node.unlock(&handle).await);
        let still_locked = node.is_locked("order", "o-9", LockProtocol::Reentrant).await;
        assert_eq!(still_locked, !handles.is_empty());
    }
    assert_eq!(cluster.store().script_count("release_exclusive"), 1);
}

#[tokio::test]
async fn nested_execute_with_lock_runs_inner_action() {
    let cluster = Cluster::new();
    let node = cluster.node("n1");
    let me = caller("req-1");

    let outer: Result<u32, WithLockError<WithLockError<()>>> = node
        .execute_with_lock(&me, "order", "o-9", LockOptions::default(), || async {
            node.execute_with_lock(&me, "order", "o-9", LockOptions::default(), || async {
                Ok(42)
            })
            .await
        })
        .await;

    assert_eq!(outer.unwrap(), 42);
    assert!(!node.is_locked("order", "o-9", LockProtocol::Reentrant).await);
}

#[tokio::test]
async fn other_callers_on_the_same_node_are_excluded() {
    let cluster = Cluster::new();
    let node = cluster.node("n1");

    let _held = node.try_lock(&caller("a"), "order", "o-9", None).await.unwrap();
    assert!(node
        .try_lock(&caller("b"), "order", "o-9", None)
        .await
        .is_none());
    assert_eq!(node.hold_count(&caller("b"), "order", "o-9", LockProtocol::Reentrant), 0);
}
