// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Integration tests for the coordination model
//!
//! Exercises configuration, the background schedule, snapshot exchange
//! between nodes and the resource lifecycle through the public API only.

use dlm_core::{
    CallerId, Clock, DlmConfig, FakeClock, GraphSnapshot, LocalRelease, LockHandle, LockKey,
    LockProtocol, NodeId, OwnerId, OwnerToken, RecoveryPath, RecoveryTracker, ReentrancyCounter,
    ResourceRegistry, ResourceState, ResourceType, Schedule, ScheduledKind, WaitForGraph,
};
use std::io::Write;
use std::time::Duration;

const CONFIG: &str = r#"
[locks]
module = "fulfilment"
node_id = "edge-1"
default_ttl = "10s"
poll_interval = "20ms"

[lifecycle]
scan_interval = "30s"
priority_idle = "2m"

[deadlock]
sync_interval = "10s"
"#;

fn load_config() -> DlmConfig {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();
    DlmConfig::load(file.path()).unwrap()
}

// =============================================================================
// Configuration and schedule
// =============================================================================

#[test]
fn config_file_drives_the_schedule() {
    let config = load_config();
    assert_eq!(config.locks.node_id, Some(NodeId::new("edge-1")));
    assert_eq!(config.locks.default_ttl, Duration::from_secs(10));

    let clock = FakeClock::new();
    let mut schedule = Schedule::new();
    schedule.init_defaults(&config, &clock);

    clock.advance(Duration::from_secs(10));
    let kinds: Vec<_> = schedule.poll(clock.now()).into_iter().map(|i| i.kind).collect();
    assert_eq!(kinds, vec![ScheduledKind::DeadlockSync]);

    clock.advance(Duration::from_secs(5));
    let kinds: Vec<_> = schedule.poll(clock.now()).into_iter().map(|i| i.kind).collect();
    assert_eq!(kinds, vec![ScheduledKind::DeadlockScan]);

    clock.advance(Duration::from_secs(15));
    let kinds: Vec<_> = schedule.poll(clock.now()).into_iter().map(|i| i.kind).collect();
    assert!(kinds.contains(&ScheduledKind::IdleScan));
}

// =============================================================================
// Snapshot exchange
// =============================================================================

fn snapshot_of(node: &str, graph: &WaitForGraph, clock: &FakeClock) -> String {
    let snapshot = GraphSnapshot {
        node_id: NodeId::new(node),
        synced_at: clock.utc_now(),
        edges: graph.edges(),
    };
    serde_json::to_string(&snapshot).unwrap()
}

#[test]
fn published_graphs_merge_into_a_cross_node_cycle() {
    let clock = FakeClock::new();
    let (k1, k2) = (
        LockKey::new("fulfilment", "pick", "p-1"),
        LockKey::new("fulfilment", "pack", "p-1"),
    );
    let a = OwnerId::new(&NodeId::new("edge-1"), &CallerId::new("a"));
    let b = OwnerId::new(&NodeId::new("edge-2"), &CallerId::new("b"));

    let mut first = WaitForGraph::new();
    first.record_grant(&a, &k1);
    first.record_wait(&a, &k2);
    let mut second = WaitForGraph::new();
    second.record_grant(&b, &k2);
    second.record_wait(&b, &k1);
    assert!(!first.has_cycle());
    assert!(!second.has_cycle());

    let mut merged = WaitForGraph::new();
    for payload in [
        snapshot_of("edge-1", &first, &clock),
        snapshot_of("edge-2", &second, &clock),
    ] {
        let snapshot: GraphSnapshot = serde_json::from_str(&payload).unwrap();
        merged.merge(snapshot.edges);
    }

    let cycles = merged.find_cycles();
    assert_eq!(cycles.len(), 1);
    let mut owners = cycles[0].owners();
    owners.sort();
    assert_eq!(owners, vec![&a, &b]);
}

// =============================================================================
// Local reentrancy
// =============================================================================

#[test]
fn reentrancy_needs_as_many_releases_as_grants() {
    let config = load_config();
    let key = LockKey::new(&config.locks.module, "ship", "s-1");
    let caller = CallerId::new("worker-3");
    let owner = OwnerId::new(&NodeId::new("edge-1"), &caller);
    let handle = LockHandle {
        name: "ship".to_string(),
        lock_key: key.clone(),
        owner_token: OwnerToken::mint(&owner, "n-1"),
        owner,
        caller: caller.clone(),
        protocol: LockProtocol::Reentrant,
        ttl: config.locks.default_ttl,
    };

    let counter = ReentrancyCounter::new();
    counter.record_grant(&handle);
    assert_eq!(
        counter.reenter(&key, LockProtocol::Reentrant, &caller),
        Some(handle.clone())
    );

    assert_eq!(counter.release(&handle), LocalRelease::StillHeld { remaining: 1 });
    assert_eq!(counter.release(&handle), LocalRelease::Last);
    assert_eq!(counter.release(&handle), LocalRelease::NotHeld);
}

// =============================================================================
// Resource lifecycle
// =============================================================================

#[test]
fn idle_release_and_recovery_round() {
    let config = load_config();
    let clock = FakeClock::new();
    let mut registry = ResourceRegistry::new(clock.now());
    let mut tracker = RecoveryTracker::new();

    clock.advance(Duration::from_secs(3 * 60));
    let candidates = registry.release_candidates(&config.lifecycle, clock.now());
    assert_eq!(
        candidates,
        vec![ResourceType::BusinessCache, ResourceType::Temporary]
    );
    for ty in &candidates {
        assert!(registry.mark_released(*ty, clock.now()));
    }

    assert_eq!(
        registry.touch(ResourceType::Temporary, clock.now()),
        ResourceState::Released
    );
    assert!(registry.begin_recovery(ResourceType::Temporary, clock.now()));
    tracker.begin(ResourceType::Temporary);
    clock.advance(Duration::from_millis(40));
    tracker.finish(
        ResourceType::Temporary,
        Some(RecoveryPath::Fast),
        Duration::from_millis(40),
        clock.now(),
    );
    registry.finish_recovery(ResourceType::Temporary, true, clock.now());

    assert!(registry.get(ResourceType::Temporary).unwrap().is_available());
    assert!(!registry.get(ResourceType::BusinessCache).unwrap().is_available());
    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].average_recovery_time, Duration::from_millis(40));
}
