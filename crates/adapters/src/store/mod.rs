// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared coordination store adapters
//!
//! The store holds every piece of lock state that more than one process must
//! agree on. Plain key/value and list operations cover inspection and the
//! deadlock snapshots; each multi-step lock transition is an [`AtomicScript`]
//! that the backend must run as a single indivisible step.

mod bounded;
mod memory;
#[cfg(feature = "redis-backend")]
mod redis;

pub use bounded::TimeoutStore;
pub use memory::MemoryStore;
#[cfg(feature = "redis-backend")]
pub use self::redis::RedisStore;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeStore, StoreCall};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from coordination store operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store call {operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
    #[error("wrong value type at key {0}")]
    WrongType(String),
    #[error("unexpected reply from {script}: {reply}")]
    UnexpectedReply { script: &'static str, reply: String },
}

/// A multi-key lock transition executed atomically by the store
///
/// Owner prefixes are `OwnerId::token_prefix()` values: a holder whose token
/// starts with the prefix belongs to the same owner and is refreshed rather
/// than denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomicScript {
    /// Set the holder `key` to `token` if absent, or refresh it if held by the
    /// same owner. A fresh grant also needs the reader set to be empty.
    ///
    /// Shared by every exclusive protocol. Replies `Granted(holder)` or `Denied`.
    AcquireExclusive {
        key: String,
        readers_key: String,
        token: String,
        owner_prefix: String,
        ttl: Duration,
    },
    /// Delete `key` only when its value is `token`. Replies `Flag`.
    ReleaseExclusive { key: String, token: String },
    /// Join the reader set when no exclusive holder is present.
    ///
    /// Each reader carries its own deadline; expired readers are purged first.
    AcquireRead {
        holder_key: String,
        readers_key: String,
        token: String,
        ttl: Duration,
    },
    /// Leave the reader set. Replies `Flag(false)` if the token was not a live reader.
    ReleaseRead { readers_key: String, token: String },
    /// Allocate the next sequence and append it to the wait queue in one step.
    ///
    /// The entry expires after `entry_ttl`; the queue and sequence keys are kept
    /// alive for at least `queue_ttl`. Replies `Count(sequence)`.
    Enqueue {
        sequence_key: String,
        queue_key: String,
        entry_ttl: Duration,
        queue_ttl: Duration,
    },
    /// Try to take a fair lock for the waiter holding `sequence`.
    ///
    /// Expired queue heads are discarded. A holder belonging to the same owner
    /// is refreshed and the waiter's queue entry removed. Otherwise the lock is
    /// granted only when the holder slot is empty, no live readers remain and
    /// `sequence` is the head.
    FairAttempt {
        holder_key: String,
        readers_key: String,
        queue_key: String,
        token: String,
        owner_prefix: String,
        sequence: u64,
        ttl: Duration,
    },
    /// Remove the entry for `sequence` from the wait queue. Replies `Flag`.
    Dequeue { queue_key: String, sequence: u64 },
}

impl AtomicScript {
    /// Short name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            AtomicScript::AcquireExclusive { .. } => "acquire_exclusive",
            AtomicScript::ReleaseExclusive { .. } => "release_exclusive",
            AtomicScript::AcquireRead { .. } => "acquire_read",
            AtomicScript::ReleaseRead { .. } => "release_read",
            AtomicScript::Enqueue { .. } => "enqueue",
            AtomicScript::FairAttempt { .. } => "fair_attempt",
            AtomicScript::Dequeue { .. } => "dequeue",
        }
    }

    /// The primary store key the script operates on
    pub fn primary_key(&self) -> &str {
        match self {
            AtomicScript::AcquireExclusive { key, .. }
            | AtomicScript::ReleaseExclusive { key, .. } => key,
            AtomicScript::AcquireRead { readers_key, .. }
            | AtomicScript::ReleaseRead { readers_key, .. } => readers_key,
            AtomicScript::Enqueue { queue_key, .. } | AtomicScript::Dequeue { queue_key, .. } => {
                queue_key
            }
            AtomicScript::FairAttempt { holder_key, .. } => holder_key,
        }
    }
}

/// Result of an [`AtomicScript`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptReply {
    /// The lock is held by the contained token
    Granted(String),
    Denied,
    Flag(bool),
    Count(u64),
}

impl ScriptReply {
    /// The holder token for a granted acquisition
    pub fn granted(&self) -> Option<&str> {
        match self {
            ScriptReply::Granted(token) => Some(token),
            _ => None,
        }
    }

    pub fn into_flag(self, script: &'static str) -> Result<bool, StoreError> {
        match self {
            ScriptReply::Flag(flag) => Ok(flag),
            other => Err(StoreError::UnexpectedReply {
                script,
                reply: format!("{:?}", other),
            }),
        }
    }

    pub fn into_count(self, script: &'static str) -> Result<u64, StoreError> {
        match self {
            ScriptReply::Count(n) => Ok(n),
            other => Err(StoreError::UnexpectedReply {
                script,
                reply: format!("{:?}", other),
            }),
        }
    }
}

/// Adapter for the shared coordination store
#[async_trait]
pub trait CoordinationStore: Clone + Send + Sync + 'static {
    /// Run a lock transition atomically
    async fn eval(&self, script: &AtomicScript) -> Result<ScriptReply, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set a string value, replacing any previous value and TTL
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Delete a key, returning whether it existed
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Remaining time to live; `None` for missing keys and keys without expiry
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// All live keys starting with `prefix`, sorted
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Append to a list, returning its new length
    async fn list_push(&self, key: &str, value: &str) -> Result<u64, StoreError>;

    /// The head of a list without removing it
    async fn list_peek(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Remove and return the head of a list
    async fn list_pop(&self, key: &str) -> Result<Option<String>, StoreError>;
}

/// Encode a fair-queue entry as `<sequence>|<deadline_ms>`
pub(crate) fn encode_queue_entry(sequence: u64, deadline_ms: u64) -> String {
    format!("{}|{}", sequence, deadline_ms)
}

/// Split a fair-queue entry into its sequence and deadline
pub(crate) fn decode_queue_entry(entry: &str) -> Option<(u64, u64)> {
    let (seq, deadline) = entry.split_once('|')?;
    Some((seq.parse().ok()?, deadline.parse().ok()?))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
