//! Mutual exclusion specs
//!
//! At most one holder per exclusive lock, leases that expire, and
//! releases that are safe to repeat.

use crate::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn contending_nodes_never_overlap() {
    let cluster = Cluster::new();
    let inside = Arc::new(AtomicUsize::new(0));
    let entries = Arc::new(AtomicUsize::new(0));

    let mut workers = Vec::new();
    for n in 0..3 {
        let node = cluster.node(&format!("node-{n}"));
        for c in 0..4 {
            let (node, inside, entries) = (node.clone(), inside.clone(), entries.clone());
            workers.push(tokio::spawn(async move {
                let me = caller(&format!("worker-{c}"));
                for _ in 0..5 {
                    let result: Result<(), WithLockError<String>> = node
                        .execute_with_lock(
                            &me,
                            "ledger",
                            "acct-1",
                            LockOptions::default(),
                            || async {
                                if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                                    return Err("two holders inside".to_string());
                                }
                                tokio::time::sleep(Duration::from_millis(1)).await;
                                entries.fetch_add(1, Ordering::SeqCst);
                                inside.fetch_sub(1, Ordering::SeqCst);
                                Ok(())
                            },
                        )
                        .await;
                    result.unwrap();
                }
            }));
        }
    }
    for worker in workers {
        worker.await.unwrap();
    }

    assert_eq!(entries.load(Ordering::SeqCst), 3 * 4 * 5);
}

#[tokio::test]
async fn crashed_holder_lease_expires() {
    let cluster = Cluster::new();
    let (n1, n2) = (cluster.node("n1"), cluster.node("n2"));

    // n1 takes the lock and never releases it
    let lost = n1
        .try_lock(&caller("a"), "ledger", "acct-1", Some(Duration::from_secs(10)))
        .await
        .unwrap();
    assert!(n2
        .try_lock(&caller("b"), "ledger", "acct-1", None)
        .await
        .is_none());

    cluster.advance(Duration::from_secs(11));
    let taken = n2.try_lock(&caller("b"), "ledger", "acct-1", None).await;
    assert!(taken.is_some());

    // The old holder's late release does not free the new lease
    assert!(!n1.unlock(&lost).await);
    assert!(n1.is_locked("ledger", "acct-1", LockProtocol::Reentrant).await);
}

#[tokio::test]
async fn release_is_idempotent_for_every_protocol() {
    let cluster = Cluster::new();
    let node = cluster.node("n1");

    let handles = [
        node.try_lock(&caller("a"), "x", "1", None).await.unwrap(),
        node.try_read_lock(&caller("a"), "y", "1", None).await.unwrap(),
        node.try_write_lock(&caller("a"), "z", "1", None).await.unwrap(),
        node.try_fair_lock(&caller("a"), "w", "1", None).await.unwrap(),
    ];
    for handle in &handles {
        assert!(node.unlock(handle).await, "{:?}", handle.protocol);
        assert!(!node.unlock(handle).await, "{:?}", handle.protocol);
    }
}

#[tokio::test]
async fn waiting_writer_enters_after_the_last_reader() {
    let cluster = Cluster::new();
    let (n1, n2) = (cluster.node("n1"), cluster.node("n2"));

    let first = n1
        .try_read_lock(&caller("r"), "catalog", "c-1", None)
        .await
        .unwrap();
    let second = n2
        .try_read_lock(&caller("r"), "catalog", "c-1", None)
        .await
        .unwrap();

    let writer = {
        let n2 = n2.clone();
        tokio::spawn(async move {
            n2.lock(
                &caller("w"),
                "catalog",
                "c-1",
                wait_for(LockProtocol::WriteLock, Duration::from_secs(2)),
            )
            .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(n1.release_read_lock(&first).await);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!writer.is_finished());

    assert!(n2.release_read_lock(&second).await);
    let granted = writer.await.unwrap().unwrap();
    assert_eq!(granted.protocol, LockProtocol::WriteLock);
    assert!(n1
        .try_read_lock(&caller("r"), "catalog", "c-1", None)
        .await
        .is_none());
}

#[tokio::test]
async fn in_memory_store_expires_leases_in_real_time() {
    let store = MemoryStore::new();
    let node = |id: &str| {
        LockManager::new(
            LockManagerDeps {
                store: store.clone(),
                handler: NoOpResourceHandler::new(),
                clock: SystemClock,
                id_gen: UuidIdGen,
            },
            config(id),
        )
        .unwrap()
    };
    let (n1, n2) = (node("n1"), node("n2"));

    let _lost = n1
        .try_lock(&caller("a"), "ledger", "acct-1", Some(Duration::from_millis(100)))
        .await
        .unwrap();
    assert!(n2
        .try_lock(&caller("b"), "ledger", "acct-1", None)
        .await
        .is_none());

    let taken = n2
        .lock(
            &caller("b"),
            "ledger",
            "acct-1",
            wait_for(LockProtocol::Reentrant, Duration::from_secs(1)),
        )
        .await;
    assert!(taken.is_some());
}

#[tokio::test]
async fn exclusive_protocols_share_one_holder_per_key() {
    let cluster = Cluster::new();
    let (n1, n2, n3) = (cluster.node("n1"), cluster.node("n2"), cluster.node("n3"));

    let held = n1
        .try_lock(&caller("a"), "order", "123", None)
        .await
        .unwrap();
    assert!(n2
        .try_write_lock(&caller("b"), "order", "123", None)
        .await
        .is_none());
    assert!(n3
        .try_fair_lock(&caller("c"), "order", "123", None)
        .await
        .is_none());
    assert!(n2
        .try_read_lock(&caller("d"), "order", "123", None)
        .await
        .is_none());

    assert!(n1.unlock(&held).await);
    let reader = n2
        .try_read_lock(&caller("d"), "order", "123", None)
        .await
        .unwrap();
    assert!(n3
        .try_fair_lock(&caller("c"), "order", "123", None)
        .await
        .is_none());
    assert!(n1
        .try_lock(&caller("a"), "order", "123", None)
        .await
        .is_none());

    assert!(n2.release_read_lock(&reader).await);
    let fair = n3
        .try_fair_lock(&caller("c"), "order", "123", None)
        .await
        .unwrap();
    assert!(n2
        .try_write_lock(&caller("b"), "order", "123", None)
        .await
        .is_none());
    assert!(n3.unlock(&fair).await);
}
