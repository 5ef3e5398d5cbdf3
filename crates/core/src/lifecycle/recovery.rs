// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery timing per resource type

use super::resource::ResourceType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Which path brought a resource back
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPath {
    /// The resource was never released; no recovery ran
    AlreadyAvailable,
    /// Restored from a pre-built instance
    Fast,
    /// Rebuilt from scratch
    Standard,
}

/// Recovery statistics for one resource type
#[derive(Clone, Debug, Default)]
pub struct RecoveryRecord {
    pub is_recovering: bool,
    pub last_recovery_time: Option<Instant>,
    pub recovery_count: u64,
    pub fast_count: u64,
    pub standard_count: u64,
    pub failure_count: u64,
    pub total_recovery_time: Duration,
    pub last_duration: Option<Duration>,
    pub last_path: Option<RecoveryPath>,
}

impl RecoveryRecord {
    pub fn average_recovery_time(&self) -> Duration {
        match u32::try_from(self.recovery_count) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total_recovery_time / n,
            Err(_) => Duration::from_secs_f64(
                self.total_recovery_time.as_secs_f64() / self.recovery_count as f64,
            ),
        }
    }
}

/// Serializable view of a recovery record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoverySnapshot {
    pub resource_type: ResourceType,
    pub is_recovering: bool,
    pub recovery_count: u64,
    pub fast_count: u64,
    pub standard_count: u64,
    pub failure_count: u64,
    #[serde(with = "humantime_serde")]
    pub average_recovery_time: Duration,
    #[serde(with = "humantime_serde")]
    pub last_duration: Option<Duration>,
    pub last_path: Option<RecoveryPath>,
}

/// Lazily created recovery records
#[derive(Clone, Debug, Default)]
pub struct RecoveryTracker {
    records: HashMap<ResourceType, RecoveryRecord>,
}

impl RecoveryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, resource_type: ResourceType) -> Option<&RecoveryRecord> {
        self.records.get(&resource_type)
    }

    pub fn begin(&mut self, resource_type: ResourceType) {
        self.records.entry(resource_type).or_default().is_recovering = true;
    }

    /// Record a finished recovery; `path` is `None` when both paths failed
    pub fn finish(
        &mut self,
        resource_type: ResourceType,
        path: Option<RecoveryPath>,
        duration: Duration,
        now: Instant,
    ) {
        let record = self.records.entry(resource_type).or_default();
        record.is_recovering = false;
        record.last_recovery_time = Some(now);
        record.last_duration = Some(duration);
        record.last_path = path;
        match path {
            Some(path) => {
                record.recovery_count += 1;
                record.total_recovery_time += duration;
                match path {
                    RecoveryPath::Fast => record.fast_count += 1,
                    RecoveryPath::Standard => record.standard_count += 1,
                    RecoveryPath::AlreadyAvailable => {}
                }
            }
            None => record.failure_count += 1,
        }
    }

    /// Reset one type, or all types when `None`
    pub fn reset(&mut self, resource_type: Option<ResourceType>) {
        match resource_type {
            Some(ty) => {
                self.records.remove(&ty);
            }
            None => self.records.clear(),
        }
    }

    pub fn snapshot(&self) -> Vec<RecoverySnapshot> {
        let mut snapshots: Vec<RecoverySnapshot> = self
            .records
            .iter()
            .map(|(ty, r)| RecoverySnapshot {
                resource_type: *ty,
                is_recovering: r.is_recovering,
                recovery_count: r.recovery_count,
                fast_count: r.fast_count,
                standard_count: r.standard_count,
                failure_count: r.failure_count,
                average_recovery_time: r.average_recovery_time(),
                last_duration: r.last_duration,
                last_path: r.last_path,
            })
            .collect();
        snapshots.sort_by_key(|s| s.resource_type);
        snapshots
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
