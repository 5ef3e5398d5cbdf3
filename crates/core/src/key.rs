// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock keys, protocols and granted handles

use crate::id::{CallerId, OwnerId, OwnerToken};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Namespace for every key this crate writes to the coordination store
pub const STORE_PREFIX: &str = "dlm";

/// Composite key of module, lock name and business key (`order:process:123`)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LockKey(String);

impl LockKey {
    pub fn new(module: &str, name: &str, business_key: &str) -> Self {
        Self(format!("{}:{}:{}", module, name, business_key))
    }

    /// Wrap an already composed key
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Holder slot shared by every exclusive protocol
    ///
    /// Reentrant, write and fair grants all test and set this one key, so
    /// at most one exclusive owner exists per lock key whatever the protocol.
    pub fn holder_key(&self) -> String {
        format!("{}:lock:{}", STORE_PREFIX, self.0)
    }

    /// Reader set for read locks
    pub fn readers_key(&self) -> String {
        format!("{}:lock:{}:readers", STORE_PREFIX, self.0)
    }

    /// FIFO list of waiting sequences for fair locks
    pub fn fair_queue_key(&self) -> String {
        format!("{}:lock:{}:queue", STORE_PREFIX, self.0)
    }

    /// Counter that hands out fair-lock sequences
    pub fn fair_sequence_key(&self) -> String {
        format!("{}:lock:{}:seq", STORE_PREFIX, self.0)
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lock protocol used for one acquisition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockProtocol {
    Reentrant,
    ReadLock,
    WriteLock,
    Fair,
}

impl LockProtocol {
    pub fn name(&self) -> &'static str {
        match self {
            LockProtocol::Reentrant => "reentrant",
            LockProtocol::ReadLock => "read",
            LockProtocol::WriteLock => "write",
            LockProtocol::Fair => "fair",
        }
    }

    /// Whether at most one holder may exist for the key
    pub fn is_exclusive(&self) -> bool {
        !matches!(self, LockProtocol::ReadLock)
    }

    /// Whether repeated acquisition by the same caller is counted locally
    pub fn is_reentrant(&self) -> bool {
        self.is_exclusive()
    }
}

impl fmt::Display for LockProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One granted lock
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHandle {
    /// Lock name without module or business key, used for statistics
    pub name: String,
    pub lock_key: LockKey,
    pub owner_token: OwnerToken,
    pub owner: OwnerId,
    pub caller: CallerId,
    pub protocol: LockProtocol,
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl LockHandle {
    /// Reentrancy bookkeeping key for this handle
    pub fn reentrancy_key(&self) -> (LockKey, LockProtocol, CallerId) {
        (self.lock_key.clone(), self.protocol, self.caller.clone())
    }
}

#[cfg(test)]
#[path = "key_tests.rs"]
mod tests;
