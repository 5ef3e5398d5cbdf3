// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identities: nodes, callers and the owner tokens that prove lock ownership

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Separator between the parts of an owner token
const TOKEN_SEPARATOR: char = ':';

/// Identity of one process instance participating in coordination
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random node identity for processes that were not given one
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("node-{}", &uuid[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a logical caller inside a process (thread or task)
///
/// Reentrancy and wait-for edges are keyed by this value, so async callers
/// must keep one id for the whole lifetime of a critical section.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallerId(pub String);

impl CallerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Caller id derived from the current OS thread
    ///
    /// Only for synchronous callers that stay on one thread. Async tasks must
    /// not use it: every task polled on the same runtime worker gets the same
    /// id, so those tasks would re-enter each other's locks. Give each task
    /// its own id with [`CallerId::new`] instead.
    pub fn current_thread() -> Self {
        let thread = std::thread::current();
        let id = format!("{:?}", thread.id());
        // "ThreadId(7)" -> "thread-7"
        let digits: String = id.chars().filter(char::is_ascii_digit).collect();
        Self(format!("thread-{}", digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Node-qualified caller identity, the unit of ownership across processes
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(node: &NodeId, caller: &CallerId) -> Self {
        Self(format!("{}{}{}", node, TOKEN_SEPARATOR, caller))
    }

    /// Prefix every token minted for this owner starts with
    pub fn token_prefix(&self) -> String {
        format!("{}{}", self.0, TOKEN_SEPARATOR)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque token stored as the lock value: `<node>:<caller>:<nonce>`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerToken(pub String);

impl OwnerToken {
    pub fn mint(owner: &OwnerId, nonce: &str) -> Self {
        Self(format!("{}{}", owner.token_prefix(), nonce))
    }

    /// Whether this token was minted for `owner`
    pub fn belongs_to(&self, owner: &OwnerId) -> bool {
        self.0.starts_with(&owner.token_prefix())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OwnerToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OwnerToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates unique nonces for owner tokens
pub trait IdGen: Clone + Send + Sync + 'static {
    fn next(&self) -> String;
}

/// UUID-based ID generator for production use
#[derive(Clone, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Sequential ID generator for testing
#[derive(Clone)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("nonce")
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
