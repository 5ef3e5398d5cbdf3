// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn uuid_gen_creates_unique_nonces() {
    let id_gen = UuidIdGen;
    let id1 = id_gen.next();
    let id2 = id_gen.next();
    assert_ne!(id1, id2);
    assert_eq!(id1.len(), 32);
}

#[test]
fn sequential_gen_is_cloneable_and_shared() {
    let id_gen1 = SequentialIdGen::new("shared");
    let id_gen2 = id_gen1.clone();
    assert_eq!(id_gen1.next(), "shared-1");
    assert_eq!(id_gen2.next(), "shared-2");
    assert_eq!(id_gen1.next(), "shared-3");
}

#[test]
fn token_encodes_node_caller_and_nonce() {
    let owner = OwnerId::new(&NodeId::new("node-a"), &CallerId::new("worker-1"));
    let token = OwnerToken::mint(&owner, "n1");

    assert_eq!(token.as_str(), "node-a:worker-1:n1");
    assert!(token.belongs_to(&owner));
}

#[test]
fn token_does_not_belong_to_caller_with_shared_prefix() {
    let node = NodeId::new("node-a");
    let owner = OwnerId::new(&node, &CallerId::new("worker-1"));
    let other = OwnerId::new(&node, &CallerId::new("worker-10"));
    let token = OwnerToken::mint(&other, "n1");

    assert!(!token.belongs_to(&owner));
}

#[test]
fn token_does_not_belong_to_same_caller_on_other_node() {
    let caller = CallerId::new("worker-1");
    let here = OwnerId::new(&NodeId::new("node-a"), &caller);
    let there = OwnerId::new(&NodeId::new("node-b"), &caller);

    assert!(!OwnerToken::mint(&there, "n1").belongs_to(&here));
}

#[test]
fn current_thread_caller_is_stable_within_thread() {
    assert_eq!(CallerId::current_thread(), CallerId::current_thread());

    let here = CallerId::current_thread();
    let there = std::thread::spawn(CallerId::current_thread).join().unwrap();
    assert_ne!(here, there);
}

#[test]
fn generated_node_ids_are_distinct() {
    assert_ne!(NodeId::generate(), NodeId::generate());
}
