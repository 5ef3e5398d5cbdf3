// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock performance counters
//!
//! One monitor per lock manager. Counters are kept per lock name and for the
//! whole process; snapshots are plain values safe to serialize for operators.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Upper bounds of the wait-time histogram buckets; the last bucket is open
pub const WAIT_BUCKETS: [Duration; 5] = [
    Duration::from_millis(10),
    Duration::from_millis(50),
    Duration::from_millis(100),
    Duration::from_millis(500),
    Duration::from_secs(1),
];

/// Why an acquisition did not succeed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquireFailure {
    /// Held by someone else on a non-blocking attempt
    Contended,
    /// Wait budget elapsed
    TimedOut,
    /// Store unreachable or errored
    StoreUnavailable,
}

/// Wait-time distribution
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitHistogram {
    /// `counts[i]` counts waits `<= WAIT_BUCKETS[i]`; the extra slot counts the rest
    pub counts: [u64; WAIT_BUCKETS.len() + 1],
}

impl WaitHistogram {
    pub fn observe(&mut self, wait: Duration) {
        let slot = WAIT_BUCKETS
            .iter()
            .position(|bound| wait <= *bound)
            .unwrap_or(WAIT_BUCKETS.len());
        self.counts[slot] += 1;
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    fn absorb(&mut self, other: &WaitHistogram) {
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts.iter()) {
            *mine += theirs;
        }
    }
}

/// Counters for one lock name (or the whole process)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub contention: u64,
    pub store_errors: u64,
    pub releases: u64,
    pub release_failures: u64,
    #[serde(with = "humantime_serde")]
    pub total_wait: Duration,
    #[serde(with = "humantime_serde")]
    pub max_wait: Duration,
    #[serde(with = "humantime_serde")]
    pub total_hold: Duration,
    #[serde(with = "humantime_serde")]
    pub max_hold: Duration,
    pub wait_histogram: WaitHistogram,
}

impl LockStats {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        self.successes as f64 / self.attempts as f64
    }

    pub fn average_wait(&self) -> Duration {
        average(self.total_wait, self.successes + self.failures)
    }

    pub fn average_hold(&self) -> Duration {
        average(self.total_hold, self.releases)
    }

    /// Grants not yet matched by a successful release
    pub fn currently_held(&self) -> u64 {
        self.successes.saturating_sub(self.releases)
    }

    fn observe_wait(&mut self, wait: Duration) {
        self.total_wait += wait;
        self.max_wait = self.max_wait.max(wait);
        self.wait_histogram.observe(wait);
    }

    fn apply(&mut self, sample: &Sample) {
        match sample {
            Sample::Attempt => self.attempts += 1,
            Sample::Success { wait } => {
                self.successes += 1;
                self.observe_wait(*wait);
            }
            Sample::Failure { wait, reason } => {
                self.failures += 1;
                self.observe_wait(*wait);
                match reason {
                    AcquireFailure::Contended => self.contention += 1,
                    AcquireFailure::TimedOut => {
                        self.timeouts += 1;
                        self.contention += 1;
                    }
                    AcquireFailure::StoreUnavailable => self.store_errors += 1,
                }
            }
            Sample::Release { hold, released } => {
                if *released {
                    self.releases += 1;
                    self.total_hold += *hold;
                    self.max_hold = self.max_hold.max(*hold);
                } else {
                    self.release_failures += 1;
                }
            }
        }
    }

    fn absorb(&mut self, other: &LockStats) {
        self.attempts += other.attempts;
        self.successes += other.successes;
        self.failures += other.failures;
        self.timeouts += other.timeouts;
        self.contention += other.contention;
        self.store_errors += other.store_errors;
        self.releases += other.releases;
        self.release_failures += other.release_failures;
        self.total_wait += other.total_wait;
        self.max_wait = self.max_wait.max(other.max_wait);
        self.total_hold += other.total_hold;
        self.max_hold = self.max_hold.max(other.max_hold);
        self.wait_histogram.absorb(&other.wait_histogram);
    }
}

fn average(total: Duration, count: u64) -> Duration {
    match u32::try_from(count) {
        Ok(0) => Duration::ZERO,
        Ok(n) => total / n,
        Err(_) => Duration::from_secs_f64(total.as_secs_f64() / count as f64),
    }
}

enum Sample {
    Attempt,
    Success { wait: Duration },
    Failure { wait: Duration, reason: AcquireFailure },
    Release { hold: Duration, released: bool },
}

/// Process-scoped performance monitor
#[derive(Debug, Default)]
pub struct PerformanceMonitor {
    by_name: Mutex<HashMap<String, LockStats>>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, name: &str, sample: Sample) {
        let mut by_name = self.by_name.lock().unwrap_or_else(|e| e.into_inner());
        by_name.entry(name.to_string()).or_default().apply(&sample);
    }

    pub fn record_attempt(&self, name: &str) {
        self.record(name, Sample::Attempt);
    }

    pub fn record_success(&self, name: &str, wait: Duration) {
        self.record(name, Sample::Success { wait });
    }

    pub fn record_failure(&self, name: &str, wait: Duration, reason: AcquireFailure) {
        self.record(name, Sample::Failure { wait, reason });
    }

    pub fn record_release(&self, name: &str, hold: Duration, released: bool) {
        self.record(name, Sample::Release { hold, released });
    }

    /// Counters for one lock name
    pub fn stats(&self, name: &str) -> Option<LockStats> {
        self.by_name
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Counters summed over every lock name
    pub fn global(&self) -> LockStats {
        let by_name = self.by_name.lock().unwrap_or_else(|e| e.into_inner());
        let mut total = LockStats::default();
        for stats in by_name.values() {
            total.absorb(stats);
        }
        total
    }

    /// Every lock name seen so far, sorted
    pub fn names(&self) -> Vec<String> {
        let by_name = self.by_name.lock().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = by_name.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn reset(&self) {
        self.by_name
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
