// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dlm_adapters::FakeStore;
use dlm_core::{CallerId, FakeClock};

const SNAPSHOT_TTL: Duration = Duration::from_secs(180);

fn owner(node: &str, caller: &str) -> OwnerId {
    OwnerId::new(&NodeId::new(node), &CallerId::new(caller))
}

fn key(name: &str) -> LockKey {
    LockKey::new("inventory", name, "sku-1")
}

fn detector(
    store: &FakeStore,
    node: &str,
    enabled: bool,
) -> DistributedDeadlockDetector<FakeStore, FakeClock> {
    DistributedDeadlockDetector::new(
        store.clone(),
        store.clock().clone(),
        NodeId::new(node),
        SNAPSHOT_TTL,
        enabled,
    )
}

/// `owner` holds `held` and waits for `wanted`
fn hold_and_wait(local: &LocalDeadlockDetector, owner: &OwnerId, held: &LockKey, wanted: &LockKey) {
    local.record_grant(owner, held);
    local.record_wait(owner, wanted);
}

#[test]
fn local_two_owner_cycle_is_detected() {
    let local = LocalDeadlockDetector::new();
    let (a, b) = (owner("n1", "a"), owner("n1", "b"));
    let (k1, k2) = (key("k1"), key("k2"));

    hold_and_wait(&local, &a, &k1, &k2);
    assert!(local.detect().is_empty());
    hold_and_wait(&local, &b, &k2, &k1);

    let cycles = local.detect();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].len(), 2);
}

#[test]
fn releasing_a_held_lock_breaks_the_cycle() {
    let local = LocalDeadlockDetector::new();
    let (a, b) = (owner("n1", "a"), owner("n1", "b"));
    let (k1, k2) = (key("k1"), key("k2"));
    hold_and_wait(&local, &a, &k1, &k2);
    hold_and_wait(&local, &b, &k2, &k1);

    local.record_release(&a, &k1);
    assert!(local.detect().is_empty());
}

#[test]
fn abandoned_wait_breaks_the_cycle() {
    let local = LocalDeadlockDetector::new();
    let (a, b) = (owner("n1", "a"), owner("n1", "b"));
    let (k1, k2) = (key("k1"), key("k2"));
    hold_and_wait(&local, &a, &k1, &k2);
    hold_and_wait(&local, &b, &k2, &k1);

    local.record_wait_end(&b, &k1);
    assert!(local.detect().is_empty());
}

#[test]
fn snapshot_key_is_per_node() {
    assert_eq!(node_snapshot_key(&NodeId::new("n7")), "dlm:deadlock:node:n7");
}

#[tokio::test]
async fn cycle_across_nodes_is_found_only_globally() {
    let store = FakeStore::new();
    let (local1, local2) = (LocalDeadlockDetector::new(), LocalDeadlockDetector::new());
    let (k1, k2) = (key("k1"), key("k2"));
    hold_and_wait(&local1, &owner("n1", "a"), &k1, &k2);
    hold_and_wait(&local2, &owner("n2", "b"), &k2, &k1);

    let (global1, global2) = (detector(&store, "n1", true), detector(&store, "n2", true));
    assert!(global1.sync(&local1).await);
    assert!(global2.sync(&local2).await);

    assert!(local1.detect().is_empty());
    assert!(local2.detect().is_empty());
    let cycles = global1.detect().await;
    assert_eq!(cycles.len(), 1);
    assert_eq!(global2.detect().await, cycles);
}

#[tokio::test]
async fn resync_replaces_the_previous_snapshot() {
    let store = FakeStore::new();
    let local = LocalDeadlockDetector::new();
    let a = owner("n1", "a");
    let k1 = key("k1");
    local.record_grant(&a, &k1);

    let global = detector(&store, "n1", true);
    assert!(global.sync(&local).await);
    local.record_release(&a, &k1);
    assert!(global.sync(&local).await);

    assert!(global.global_graph().await.unwrap().is_empty());
}

#[tokio::test]
async fn stale_snapshots_drop_out_of_the_merge() {
    let store = FakeStore::new();
    let local = LocalDeadlockDetector::new();
    local.record_grant(&owner("n1", "a"), &key("k1"));
    let global = detector(&store, "n1", true);
    assert!(global.sync(&local).await);

    store.advance(SNAPSHOT_TTL + Duration::from_secs(1));
    assert!(global.global_graph().await.unwrap().is_empty());
}

#[tokio::test]
async fn undecodable_snapshot_is_skipped() {
    let store = FakeStore::new();
    store
        .set(&node_snapshot_key(&NodeId::new("n9")), "{not json", None)
        .await
        .unwrap();
    let local = LocalDeadlockDetector::new();
    local.record_grant(&owner("n1", "a"), &key("k1"));
    let global = detector(&store, "n1", true);
    global.sync(&local).await;

    assert_eq!(global.global_graph().await.unwrap().edge_count(), 1);
}

#[tokio::test]
async fn disabled_detector_touches_nothing() {
    let store = FakeStore::new();
    let local = LocalDeadlockDetector::new();
    local.record_grant(&owner("n1", "a"), &key("k1"));
    let global = detector(&store, "n1", false);

    assert!(!global.sync(&local).await);
    assert!(global.detect().await.is_empty());
    assert!(store.calls().is_empty());

    global.set_enabled(true);
    assert!(global.is_enabled());
    assert!(global.sync(&local).await);
}

#[tokio::test]
async fn unreachable_store_reports_nothing() {
    let store = FakeStore::new();
    let local = LocalDeadlockDetector::new();
    local.record_grant(&owner("n1", "a"), &key("k1"));
    let global = detector(&store, "n1", true);
    store.set_unavailable(true);

    assert!(!global.sync(&local).await);
    assert!(global.detect().await.is_empty());
    assert!(global.global_graph().await.is_err());
}
