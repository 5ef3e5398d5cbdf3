// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::manager::LockManagerDeps;
use dlm_adapters::{FakeResourceHandler, FakeStore};
use dlm_core::{CallerId, DlmConfig, FakeClock, LockSettings, NodeId, SequentialIdGen};

type TestManager = LockManager<FakeStore, FakeResourceHandler, FakeClock, SequentialIdGen>;

fn manager(store: &FakeStore) -> TestManager {
    let config = DlmConfig::default()
        .with_locks(LockSettings::new("jobs").with_node_id(NodeId::new("n1")));
    LockManager::new(
        LockManagerDeps {
            store: store.clone(),
            handler: FakeResourceHandler::new(),
            clock: store.clock().clone(),
            id_gen: SequentialIdGen::default(),
        },
        config,
    )
    .unwrap()
}

#[tokio::test]
async fn idle_scan_pass_releases_idle_resources() {
    let store = FakeStore::new();
    let manager = manager(&store);
    store.advance(Duration::from_secs(11 * 60));

    let outcome = run_once(&manager, ScheduledKind::IdleScan).await;
    assert_eq!(
        outcome,
        PassOutcome::IdleScan {
            released: vec![ResourceType::BusinessCache, ResourceType::Temporary],
        }
    );
}

#[tokio::test]
async fn deadlock_passes_publish_and_scan() {
    let store = FakeStore::new();
    let manager = manager(&store);
    manager
        .try_lock(&CallerId::new("a"), "import", "batch-1", None)
        .await
        .unwrap();

    assert_eq!(
        run_once(&manager, ScheduledKind::DeadlockSync).await,
        PassOutcome::DeadlockSync { published: true }
    );
    assert!(store.exists("dlm:deadlock:node:n1").await.unwrap());
    assert_eq!(
        run_once(&manager, ScheduledKind::DeadlockScan).await,
        PassOutcome::DeadlockScan { cycles: Vec::new() }
    );
}

#[tokio::test]
async fn deadlock_sync_is_skipped_while_disabled() {
    let store = FakeStore::new();
    let manager = manager(&store);
    manager.set_global_detection_enabled(false);

    assert_eq!(
        run_once(&manager, ScheduledKind::DeadlockSync).await,
        PassOutcome::DeadlockSync { published: false }
    );
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn worker_fires_due_passes_until_shut_down() {
    let store = FakeStore::new();
    let manager = Arc::new(manager(&store));
    let handle = spawn(manager.clone(), Duration::from_millis(5));
    // Let the worker build its schedule before time moves
    tokio::time::sleep(Duration::from_millis(10)).await;

    store.advance(Duration::from_secs(11 * 60));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!manager.lifecycle().is_available(ResourceType::Temporary));
    assert!(store.exists("dlm:deadlock:node:n1").await.unwrap());

    handle.shutdown().await;
}

#[tokio::test]
async fn dropping_the_handle_stops_the_worker() {
    let store = FakeStore::new();
    let manager = Arc::new(manager(&store));
    let handle = spawn(manager.clone(), Duration::from_millis(5));
    let BackgroundHandle { shutdown, task } = handle;

    drop(shutdown);
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();
}
