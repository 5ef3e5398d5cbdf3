// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-local reentrancy bookkeeping
//!
//! Counts repeated acquisitions of one lock by one caller so that only the
//! first acquisition and the last release reach the coordination store. The
//! counter is never shared between processes.

use crate::id::CallerId;
use crate::key::{LockHandle, LockKey, LockProtocol};
use std::collections::HashMap;
use std::sync::Mutex;

type Slot = (LockKey, LockProtocol, CallerId);

#[derive(Debug)]
struct Entry {
    handle: LockHandle,
    count: u32,
}

/// Outcome of a local release
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalRelease {
    /// Other acquisitions by the same caller are still outstanding
    StillHeld { remaining: u32 },
    /// Last local hold dropped; the store must be released now
    Last,
    /// No local hold for this handle (never acquired or token mismatch)
    NotHeld,
}

/// `(lock key, protocol, caller) -> count` map
#[derive(Debug, Default)]
pub struct ReentrancyCounter {
    entries: Mutex<HashMap<Slot, Entry>>,
}

impl ReentrancyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment an existing hold, returning the held handle
    ///
    /// Returns `None` when the caller holds nothing locally, in which case the
    /// store must be consulted.
    pub fn reenter(
        &self,
        key: &LockKey,
        protocol: LockProtocol,
        caller: &CallerId,
    ) -> Option<LockHandle> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get_mut(&(key.clone(), protocol, caller.clone()))?;
        entry.count += 1;
        Some(entry.handle.clone())
    }

    /// Record the first grant obtained from the store
    pub fn record_grant(&self, handle: &LockHandle) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .entry(handle.reentrancy_key())
            .and_modify(|e| e.count += 1)
            .or_insert_with(|| Entry {
                handle: handle.clone(),
                count: 1,
            });
    }

    /// Decrement the hold for `handle`, removing it at zero
    pub fn release(&self, handle: &LockHandle) -> LocalRelease {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let slot = handle.reentrancy_key();
        let Some(entry) = entries.get_mut(&slot) else {
            return LocalRelease::NotHeld;
        };
        if entry.handle.owner_token != handle.owner_token {
            return LocalRelease::NotHeld;
        }

        entry.count -= 1;
        if entry.count == 0 {
            entries.remove(&slot);
            LocalRelease::Last
        } else {
            LocalRelease::StillHeld {
                remaining: entry.count,
            }
        }
    }

    /// Drop a hold regardless of its count (lease lost in the store)
    pub fn forget(&self, handle: &LockHandle) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let slot = handle.reentrancy_key();
        if entries
            .get(&slot)
            .is_some_and(|e| e.handle.owner_token == handle.owner_token)
        {
            entries.remove(&slot);
        }
    }

    /// Current hold count for a caller
    pub fn count(&self, key: &LockKey, protocol: LockProtocol, caller: &CallerId) -> u32 {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&(key.clone(), protocol, caller.clone()))
            .map_or(0, |e| e.count)
    }

    /// Number of distinct locks held locally
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "reentrancy_tests.rs"]
mod tests;
