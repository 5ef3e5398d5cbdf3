// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer-based schedule for background coordination work

use crate::clock::Clock;
use crate::config::DlmConfig;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

/// Background work the schedule can fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduledKind {
    /// Scan resource idle state and release eligible resources
    IdleScan,
    /// Publish local wait-for edges to the coordination store
    DeadlockSync,
    /// Merge every published graph and look for cycles
    DeadlockScan,
}

impl ScheduledKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScheduledKind::IdleScan => "idle-scan",
            ScheduledKind::DeadlockSync => "deadlock-sync",
            ScheduledKind::DeadlockScan => "deadlock-scan",
        }
    }
}

impl fmt::Display for ScheduledKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A scheduled item
#[derive(Debug, Clone)]
pub struct ScheduledItem {
    pub id: String,
    pub fire_at: Instant,
    pub kind: ScheduledKind,
    pub repeat: Option<Duration>,
}

impl PartialEq for ScheduledItem {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.id == other.id
    }
}

impl Eq for ScheduledItem {}

impl PartialOrd for ScheduledItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Min-heap: earliest first, ties broken by id for stable firing order
        Reverse((self.fire_at, &self.id)).cmp(&Reverse((other.fire_at, &other.id)))
    }
}

/// Manages scheduled background work
#[derive(Debug, Default)]
pub struct Schedule {
    items: BinaryHeap<ScheduledItem>,
    cancelled: HashSet<String>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a one-shot item
    pub fn schedule(&mut self, id: impl Into<String>, fire_at: Instant, kind: ScheduledKind) {
        self.items.push(ScheduledItem {
            id: id.into(),
            fire_at,
            kind,
            repeat: None,
        });
    }

    /// Schedule a repeating item
    pub fn schedule_repeating(
        &mut self,
        id: impl Into<String>,
        fire_at: Instant,
        interval: Duration,
        kind: ScheduledKind,
    ) {
        self.items.push(ScheduledItem {
            id: id.into(),
            fire_at,
            kind,
            repeat: Some(interval),
        });
    }

    /// Cancel a scheduled item
    pub fn cancel(&mut self, id: &str) {
        self.cancelled.insert(id.to_string());
    }

    /// Take all items that should fire at or before `now`
    ///
    /// A repeating item that fell several intervals behind fires once and is
    /// rescheduled after `now`, so a stalled worker does not burst.
    pub fn poll(&mut self, now: Instant) -> Vec<ScheduledItem> {
        let mut ready = Vec::new();

        while let Some(item) = self.items.peek() {
            if item.fire_at > now {
                break;
            }

            let Some(item) = self.items.pop() else {
                break;
            };

            if self.cancelled.remove(&item.id) {
                continue;
            }

            if let Some(interval) = item.repeat {
                let mut next = item.fire_at + interval;
                while next <= now {
                    next += interval;
                }
                self.items.push(ScheduledItem {
                    fire_at: next,
                    ..item.clone()
                });
            }

            ready.push(item);
        }

        ready
    }

    /// Install the idle scan and deadlock schedules from configuration
    ///
    /// Deadlock items are always installed; the worker skips them while global
    /// detection is disabled so it can be re-enabled at runtime.
    pub fn init_defaults(&mut self, config: &DlmConfig, clock: &impl Clock) {
        let now = clock.now();
        let scan = config.lifecycle.scan_interval;
        let sync = config.deadlock.sync_interval;

        self.schedule_repeating("idle-scan", now + scan, scan, ScheduledKind::IdleScan);
        self.schedule_repeating("deadlock-sync", now + sync, sync, ScheduledKind::DeadlockSync);
        // scan half an interval after each sync so fresh snapshots are merged
        self.schedule_repeating(
            "deadlock-scan",
            now + sync + sync / 2,
            sync,
            ScheduledKind::DeadlockScan,
        );
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the next fire time, if any
    pub fn next_fire_time(&self) -> Option<Instant> {
        self.items.peek().map(|item| item.fire_at)
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
