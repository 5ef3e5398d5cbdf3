// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deadlock detection over wait-for graphs
//!
//! The local detector sees only this process. The distributed detector
//! publishes the local edges under a per-node key with a TTL and merges
//! every node's edges to look for cycles that span processes. Detection
//! only reports; it never breaks a cycle.

use dlm_adapters::{CoordinationStore, StoreError};
use dlm_core::key::STORE_PREFIX;
use dlm_core::{
    Clock, DeadlockCycle, GraphSnapshot, LockKey, NodeId, OwnerId, WaitForEdge, WaitForGraph,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Wait-for graph of this process
#[derive(Debug, Default)]
pub struct LocalDeadlockDetector {
    graph: Mutex<WaitForGraph>,
}

impl LocalDeadlockDetector {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_graph<T>(&self, f: impl FnOnce(&mut WaitForGraph) -> T) -> T {
        let mut graph = self.graph.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut graph)
    }

    pub fn record_wait(&self, owner: &OwnerId, key: &LockKey) {
        self.with_graph(|g| g.record_wait(owner, key));
    }

    pub fn record_wait_end(&self, owner: &OwnerId, key: &LockKey) {
        self.with_graph(|g| g.record_wait_end(owner, key));
    }

    pub fn record_grant(&self, owner: &OwnerId, key: &LockKey) {
        self.with_graph(|g| g.record_grant(owner, key));
    }

    pub fn record_release(&self, owner: &OwnerId, key: &LockKey) {
        self.with_graph(|g| g.record_release(owner, key));
    }

    pub fn edges(&self) -> Vec<WaitForEdge> {
        self.with_graph(|g| g.edges())
    }

    /// Find and log every cycle in the local graph
    pub fn detect(&self) -> Vec<DeadlockCycle> {
        let cycles = self.with_graph(|g| g.find_cycles());
        for cycle in &cycles {
            tracing::warn!(scope = "local", owners = cycle.len(), path = %cycle, "deadlock detected");
        }
        cycles
    }
}

/// Store key under which `node` publishes its edges
pub fn node_snapshot_key(node: &NodeId) -> String {
    format!("{}{}", node_snapshot_prefix(), node)
}

fn node_snapshot_prefix() -> String {
    format!("{}:deadlock:node:", STORE_PREFIX)
}

/// Cross-process detector sharing graphs through the coordination store
pub struct DistributedDeadlockDetector<S, C> {
    store: S,
    clock: C,
    node_id: NodeId,
    snapshot_ttl: Duration,
    enabled: AtomicBool,
}

impl<S: CoordinationStore, C: Clock> DistributedDeadlockDetector<S, C> {
    pub fn new(store: S, clock: C, node_id: NodeId, snapshot_ttl: Duration, enabled: bool) -> Self {
        Self {
            store,
            clock,
            node_id,
            snapshot_ttl,
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::SeqCst);
        if was != enabled {
            tracing::info!(node = %self.node_id, enabled, "global deadlock detection toggled");
        }
    }

    /// Publish the local edges, replacing this node's previous snapshot
    ///
    /// Returns `false` when disabled or when the store could not be reached.
    pub async fn sync(&self, local: &LocalDeadlockDetector) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let snapshot = GraphSnapshot {
            node_id: self.node_id.clone(),
            synced_at: self.clock.utc_now(),
            edges: local.edges(),
        };
        let payload = match serde_json::to_string(&snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode wait-for snapshot");
                return false;
            }
        };
        match self
            .store
            .set(&node_snapshot_key(&self.node_id), &payload, Some(self.snapshot_ttl))
            .await
        {
            Ok(()) => {
                tracing::debug!(node = %self.node_id, edges = snapshot.edges.len(), "published wait-for graph");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to publish wait-for graph");
                false
            }
        }
    }

    /// Union of every live node snapshot
    ///
    /// Snapshots that fail to decode are skipped.
    pub async fn global_graph(&self) -> Result<WaitForGraph, StoreError> {
        let mut graph = WaitForGraph::new();
        for key in self.store.keys(&node_snapshot_prefix()).await? {
            let Some(payload) = self.store.get(&key).await? else {
                continue;
            };
            match serde_json::from_str::<GraphSnapshot>(&payload) {
                Ok(snapshot) => graph.merge(snapshot.edges),
                Err(e) => tracing::warn!(key = %key, error = %e, "skipping undecodable wait-for snapshot"),
            }
        }
        Ok(graph)
    }

    /// Cycles in the merged graph; empty when disabled or the store is unreachable
    pub async fn detect(&self) -> Vec<DeadlockCycle> {
        if !self.is_enabled() {
            return Vec::new();
        }
        let graph = match self.global_graph().await {
            Ok(graph) => graph,
            Err(e) => {
                tracing::warn!(error = %e, "global deadlock scan skipped");
                return Vec::new();
            }
        };
        let cycles = graph.find_cycles();
        for cycle in &cycles {
            tracing::warn!(scope = "global", owners = cycle.len(), path = %cycle, "deadlock detected");
        }
        cycles
    }
}

#[cfg(test)]
#[path = "deadlock_tests.rs"]
mod tests;
