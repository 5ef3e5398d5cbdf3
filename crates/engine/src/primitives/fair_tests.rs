// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dlm_adapters::FakeStore;
use dlm_core::{CallerId, NodeId, OwnerId};
use std::sync::{Arc, Mutex};

const POLL: Duration = Duration::from_millis(5);
const TTL: Duration = Duration::from_secs(30);

fn setup() -> (FakeStore, FairLock<FakeStore>) {
    let store = FakeStore::new();
    let lock = FairLock::new(store.clone(), Duration::from_secs(60), POLL);
    (store, lock)
}

fn key() -> LockKey {
    LockKey::new("billing", "invoice", "i-7")
}

fn party(caller: &str) -> (OwnerId, OwnerToken) {
    let owner = OwnerId::new(&NodeId::new("n1"), &CallerId::new(caller));
    let token = OwnerToken::mint(&owner, "1");
    (owner, token)
}

async fn try_take(lock: &FairLock<FakeStore>, key: &LockKey, caller: &str) -> AcquireOutcome {
    let (owner, token) = party(caller);
    lock.try_acquire(AcquireRequest {
        key,
        owner: &owner,
        token: &token,
        ttl: TTL,
    })
    .await
}

#[tokio::test]
async fn contended_try_leaves_the_queue() {
    let (store, lock) = setup();
    let key = key();

    assert!(try_take(&lock, &key, "a").await.token().is_some());
    assert_eq!(try_take(&lock, &key, "b").await, AcquireOutcome::Contended);

    assert_eq!(store.script_count("dequeue"), 1);
    assert!(!store.exists(&key.fair_queue_key()).await.unwrap());
}

#[tokio::test]
async fn waiters_are_granted_in_arrival_order() {
    let (_store, lock) = setup();
    let key = key();
    let (_, a_token) = party("a");
    assert!(try_take(&lock, &key, "a").await.token().is_some());

    let order = Arc::new(Mutex::new(Vec::new()));
    let mut waiters = Vec::new();
    for caller in ["b", "c", "d"] {
        let lock = lock.clone();
        let key = key.clone();
        let order = order.clone();
        waiters.push(tokio::spawn(async move {
            let (owner, token) = party(caller);
            let request = AcquireRequest {
                key: &key,
                owner: &owner,
                token: &token,
                ttl: TTL,
            };
            let outcome = lock
                .acquire_blocking(request, Duration::from_secs(5), || {})
                .await;
            assert_eq!(outcome, AcquireOutcome::Granted(token.clone()));
            order.lock().unwrap().push(caller);
            tokio::time::sleep(Duration::from_millis(15)).await;
            assert!(lock.release(&key, &token).await.unwrap());
        }));
        // Let each waiter join the queue before the next one
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert!(lock.release(&key, &a_token).await.unwrap());
    for waiter in waiters {
        waiter.await.unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec!["b", "c", "d"]);
}

#[tokio::test]
async fn cancelled_waiter_does_not_block_the_queue() {
    let (_store, lock) = setup();
    let key = key();
    let (_, a_token) = party("a");
    assert!(try_take(&lock, &key, "a").await.token().is_some());

    let (b, b_token) = party("b");
    let waiting = lock.acquire_blocking(
        AcquireRequest {
            key: &key,
            owner: &b,
            token: &b_token,
            ttl: TTL,
        },
        Duration::from_secs(10),
        || {},
    );
    assert!(tokio::time::timeout(Duration::from_millis(30), waiting)
        .await
        .is_err());

    // The dropped waiter's dequeue runs on a spawned task
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(lock.release(&key, &a_token).await.unwrap());
    assert!(try_take(&lock, &key, "c").await.token().is_some());
}

#[tokio::test]
async fn abandoned_entry_expires_from_the_head() {
    let (store, lock) = setup();
    let key = key();

    // A waiter that joined and then vanished without leaving
    store
        .eval(&AtomicScript::Enqueue {
            sequence_key: key.fair_sequence_key(),
            queue_key: key.fair_queue_key(),
            entry_ttl: Duration::from_secs(1),
            queue_ttl: Duration::from_secs(60),
        })
        .await
        .unwrap();

    assert_eq!(try_take(&lock, &key, "c").await, AcquireOutcome::Contended);

    store.advance(Duration::from_secs(2));
    assert!(try_take(&lock, &key, "c").await.token().is_some());
}

#[tokio::test]
async fn blocking_waiter_times_out_behind_holder() {
    let (store, lock) = setup();
    let key = key();
    assert!(try_take(&lock, &key, "a").await.token().is_some());

    let (b, b_token) = party("b");
    let outcome = lock
        .acquire_blocking(
            AcquireRequest {
                key: &key,
                owner: &b,
                token: &b_token,
                ttl: TTL,
            },
            Duration::from_millis(30),
            || {},
        )
        .await;

    assert_eq!(outcome, AcquireOutcome::TimedOut);
    assert!(!store.exists(&key.fair_queue_key()).await.unwrap());
}

#[tokio::test]
async fn holder_reentering_is_granted_and_leaves_no_entry() {
    let (store, lock) = setup();
    let key = key();
    let first = try_take(&lock, &key, "a").await;
    let again = try_take(&lock, &key, "a").await;

    assert_eq!(again, first);
    assert!(!store.exists(&key.fair_queue_key()).await.unwrap());
}
