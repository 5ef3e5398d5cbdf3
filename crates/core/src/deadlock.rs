// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wait-for graph and cycle search for deadlock detection
//!
//! The graph is bipartite: owners point at the locks they wait for, locks
//! point at the owners holding them. A cycle `t1 -> k1 -> t2 -> k2 -> t1`
//! means every owner on it waits for another owner on it.

use crate::id::{NodeId, OwnerId};
use crate::key::LockKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// A vertex of the wait-for graph
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum GraphNode {
    Owner(OwnerId),
    Lock(LockKey),
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphNode::Owner(owner) => write!(f, "owner({})", owner),
            GraphNode::Lock(key) => write!(f, "lock({})", key),
        }
    }
}

/// One edge of the wait-for graph
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "edge", rename_all = "snake_case")]
pub enum WaitForEdge {
    /// `owner` is blocked acquiring `key`
    Waits { owner: OwnerId, key: LockKey },
    /// `key` is held by `owner`
    HeldBy { key: LockKey, owner: OwnerId },
}

/// A detected cycle, rotated to start at its smallest owner
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeadlockCycle {
    pub path: Vec<GraphNode>,
}

impl DeadlockCycle {
    fn normalized(mut path: Vec<GraphNode>) -> Self {
        let start = path
            .iter()
            .enumerate()
            .filter(|(_, n)| matches!(n, GraphNode::Owner(_)))
            .min_by(|(_, a), (_, b)| a.cmp(b))
            .map_or(0, |(i, _)| i);
        path.rotate_left(start);
        Self { path }
    }

    /// Owners taking part in the cycle
    pub fn owners(&self) -> Vec<&OwnerId> {
        self.path
            .iter()
            .filter_map(|n| match n {
                GraphNode::Owner(o) => Some(o),
                GraphNode::Lock(_) => None,
            })
            .collect()
    }

    /// Locks taking part in the cycle
    pub fn locks(&self) -> Vec<&LockKey> {
        self.path
            .iter()
            .filter_map(|n| match n {
                GraphNode::Lock(k) => Some(k),
                GraphNode::Owner(_) => None,
            })
            .collect()
    }

    /// Number of owners on the cycle (a "2-cycle" has two)
    pub fn len(&self) -> usize {
        self.owners().len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

impl fmt::Display for DeadlockCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.path {
            write!(f, "{} -> ", node)?;
        }
        match self.path.first() {
            Some(first) => write!(f, "{}", first),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

/// Wait-for graph of one process, or the union of several
#[derive(Clone, Debug, Default)]
pub struct WaitForGraph {
    waits: BTreeMap<OwnerId, BTreeSet<LockKey>>,
    holders: BTreeMap<LockKey, BTreeSet<OwnerId>>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges(edges: impl IntoIterator<Item = WaitForEdge>) -> Self {
        let mut graph = Self::new();
        graph.merge(edges);
        graph
    }

    /// Add edges from another graph (used to build the global view)
    pub fn merge(&mut self, edges: impl IntoIterator<Item = WaitForEdge>) {
        for edge in edges {
            match edge {
                WaitForEdge::Waits { owner, key } => {
                    self.waits.entry(owner).or_default().insert(key);
                }
                WaitForEdge::HeldBy { key, owner } => {
                    self.holders.entry(key).or_default().insert(owner);
                }
            }
        }
    }

    /// `owner` started waiting for `key`
    pub fn record_wait(&mut self, owner: &OwnerId, key: &LockKey) {
        self.waits
            .entry(owner.clone())
            .or_default()
            .insert(key.clone());
    }

    /// `owner` stopped waiting for `key` without a grant
    pub fn record_wait_end(&mut self, owner: &OwnerId, key: &LockKey) {
        if let Some(keys) = self.waits.get_mut(owner) {
            keys.remove(key);
            if keys.is_empty() {
                self.waits.remove(owner);
            }
        }
    }

    /// `owner` was granted `key`; its pending wait becomes a hold
    pub fn record_grant(&mut self, owner: &OwnerId, key: &LockKey) {
        self.record_wait_end(owner, key);
        self.holders
            .entry(key.clone())
            .or_default()
            .insert(owner.clone());
    }

    /// `owner` released `key`
    ///
    /// Only the releasing owner's edge is dropped so concurrent readers of the
    /// same key keep theirs.
    pub fn record_release(&mut self, owner: &OwnerId, key: &LockKey) {
        if let Some(owners) = self.holders.get_mut(key) {
            owners.remove(owner);
            if owners.is_empty() {
                self.holders.remove(key);
            }
        }
    }

    pub fn edges(&self) -> Vec<WaitForEdge> {
        let waits = self.waits.iter().flat_map(|(owner, keys)| {
            keys.iter().map(move |key| WaitForEdge::Waits {
                owner: owner.clone(),
                key: key.clone(),
            })
        });
        let holds = self.holders.iter().flat_map(|(key, owners)| {
            owners.iter().map(move |owner| WaitForEdge::HeldBy {
                key: key.clone(),
                owner: owner.clone(),
            })
        });
        waits.chain(holds).collect()
    }

    pub fn edge_count(&self) -> usize {
        self.waits.values().map(BTreeSet::len).sum::<usize>()
            + self.holders.values().map(BTreeSet::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.waits.is_empty() && self.holders.is_empty()
    }

    /// Number of owners currently waiting
    pub fn waiting_owners(&self) -> usize {
        self.waits.len()
    }

    fn adjacency(&self) -> BTreeMap<GraphNode, Vec<GraphNode>> {
        let mut adj: BTreeMap<GraphNode, Vec<GraphNode>> = BTreeMap::new();
        for (owner, keys) in &self.waits {
            adj.entry(GraphNode::Owner(owner.clone()))
                .or_default()
                .extend(keys.iter().cloned().map(GraphNode::Lock));
        }
        for (key, owners) in &self.holders {
            adj.entry(GraphNode::Lock(key.clone()))
                .or_default()
                .extend(owners.iter().cloned().map(GraphNode::Owner));
        }
        adj
    }

    /// Depth-first search for cycles
    ///
    /// Every back edge found yields one cycle; cycles are deduplicated after
    /// rotation so the same deadlock is reported once.
    pub fn find_cycles(&self) -> Vec<DeadlockCycle> {
        let adj = self.adjacency();
        let mut visits: HashMap<GraphNode, Visit> = HashMap::new();
        let mut stack: Vec<GraphNode> = Vec::new();
        let mut found: Vec<DeadlockCycle> = Vec::new();

        for start in adj.keys() {
            if !visits.contains_key(start) {
                visit(start, &adj, &mut visits, &mut stack, &mut found);
            }
        }
        found
    }

    pub fn has_cycle(&self) -> bool {
        !self.find_cycles().is_empty()
    }
}

fn visit(
    node: &GraphNode,
    adj: &BTreeMap<GraphNode, Vec<GraphNode>>,
    visits: &mut HashMap<GraphNode, Visit>,
    stack: &mut Vec<GraphNode>,
    found: &mut Vec<DeadlockCycle>,
) {
    visits.insert(node.clone(), Visit::InProgress);
    stack.push(node.clone());

    for next in adj.get(node).into_iter().flatten() {
        match visits.get(next) {
            Some(Visit::InProgress) => {
                if let Some(pos) = stack.iter().position(|n| n == next) {
                    let cycle = DeadlockCycle::normalized(stack[pos..].to_vec());
                    if !found.contains(&cycle) {
                        found.push(cycle);
                    }
                }
            }
            Some(Visit::Done) => {}
            None => visit(next, adj, visits, stack, found),
        }
    }

    stack.pop();
    visits.insert(node.clone(), Visit::Done);
}

/// Edges one process published for the global merge
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub node_id: NodeId,
    pub synced_at: DateTime<Utc>,
    pub edges: Vec<WaitForEdge>,
}

#[cfg(test)]
#[path = "deadlock_tests.rs"]
mod tests;
