// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Managed resource types, release levels and idle bookkeeping

use crate::config::LifecycleSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// How aggressively an idle resource may be released, most to least sticky
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseLevel {
    Never,
    Careful,
    Releasable,
    Priority,
}

impl ReleaseLevel {
    pub fn allows_release(&self) -> bool {
        !matches!(self, ReleaseLevel::Never)
    }
}

/// Fixed set of managed resources
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Infrastructure,
    Monitoring,
    CoreService,
    BusinessCache,
    Temporary,
}

impl ResourceType {
    pub const ALL: [ResourceType; 5] = [
        ResourceType::Infrastructure,
        ResourceType::Monitoring,
        ResourceType::CoreService,
        ResourceType::BusinessCache,
        ResourceType::Temporary,
    ];

    pub fn release_level(&self) -> ReleaseLevel {
        match self {
            ResourceType::Infrastructure => ReleaseLevel::Never,
            ResourceType::Monitoring => ReleaseLevel::Careful,
            ResourceType::CoreService => ReleaseLevel::Releasable,
            ResourceType::BusinessCache => ReleaseLevel::Priority,
            ResourceType::Temporary => ReleaseLevel::Priority,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResourceType::Infrastructure => "infrastructure",
            ResourceType::Monitoring => "monitoring",
            ResourceType::CoreService => "core_service",
            ResourceType::BusinessCache => "business_cache",
            ResourceType::Temporary => "temporary",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Availability of a managed resource
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Available,
    Released,
    Recovering,
}

/// Bookkeeping for one resource type
#[derive(Clone, Debug)]
pub struct ResourceRecord {
    pub resource_type: ResourceType,
    pub state: ResourceState,
    pub last_access: Instant,
    pub release_time: Option<Instant>,
    pub access_count: u64,
}

impl ResourceRecord {
    fn new(resource_type: ResourceType, now: Instant) -> Self {
        Self {
            resource_type,
            state: ResourceState::Available,
            last_access: now,
            release_time: None,
            access_count: 0,
        }
    }

    pub fn is_available(&self) -> bool {
        self.state == ResourceState::Available
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_access)
    }
}

/// Serializable view of a resource record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub resource_type: ResourceType,
    pub release_level: ReleaseLevel,
    pub state: ResourceState,
    #[serde(with = "humantime_serde")]
    pub idle_for: Duration,
    /// Time since release, when currently released
    #[serde(with = "humantime_serde")]
    pub released_for: Option<Duration>,
    pub access_count: u64,
}

/// Per-type availability and idle state
#[derive(Clone, Debug)]
pub struct ResourceRegistry {
    records: HashMap<ResourceType, ResourceRecord>,
}

impl ResourceRegistry {
    /// Every resource type starts available and freshly accessed
    pub fn new(now: Instant) -> Self {
        let records = ResourceType::ALL
            .iter()
            .map(|ty| (*ty, ResourceRecord::new(*ty, now)))
            .collect();
        Self { records }
    }

    pub fn get(&self, resource_type: ResourceType) -> Option<&ResourceRecord> {
        self.records.get(&resource_type)
    }

    /// Record an access, returning the state the resource was in
    pub fn touch(&mut self, resource_type: ResourceType, now: Instant) -> ResourceState {
        let record = self
            .records
            .entry(resource_type)
            .or_insert_with(|| ResourceRecord::new(resource_type, now));
        record.last_access = now;
        record.access_count += 1;
        record.state
    }

    /// Resources whose idle time exceeds their level's threshold
    ///
    /// Ordered so the least sticky level comes first and, within a level, the
    /// longest-idle resource comes first. `Never` resources are never listed.
    pub fn release_candidates(
        &self,
        settings: &LifecycleSettings,
        now: Instant,
    ) -> Vec<ResourceType> {
        let mut candidates: Vec<(&ResourceRecord, Duration)> = self
            .records
            .values()
            .filter(|r| r.is_available())
            .filter_map(|r| {
                let threshold = settings.idle_threshold(r.resource_type.release_level())?;
                let idle = r.idle_for(now);
                (idle > threshold).then_some((r, idle))
            })
            .collect();

        candidates.sort_by(|(a, a_idle), (b, b_idle)| {
            b.resource_type
                .release_level()
                .cmp(&a.resource_type.release_level())
                .then(b_idle.cmp(a_idle))
                .then(a.resource_type.cmp(&b.resource_type))
        });
        candidates.into_iter().map(|(r, _)| r.resource_type).collect()
    }

    /// Transition an available resource to released
    ///
    /// Refuses `Never` resources and resources that are not available.
    pub fn mark_released(&mut self, resource_type: ResourceType, now: Instant) -> bool {
        if !resource_type.release_level().allows_release() {
            return false;
        }
        match self.records.get_mut(&resource_type) {
            Some(record) if record.is_available() => {
                record.state = ResourceState::Released;
                record.release_time = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Start recovering a released resource; false if it needs no recovery
    /// or another recovery is already running
    pub fn begin_recovery(&mut self, resource_type: ResourceType, now: Instant) -> bool {
        let record = self
            .records
            .entry(resource_type)
            .or_insert_with(|| {
                let mut record = ResourceRecord::new(resource_type, now);
                record.state = ResourceState::Released;
                record
            });
        if record.state != ResourceState::Released {
            return false;
        }
        record.state = ResourceState::Recovering;
        true
    }

    /// Finish a recovery started with `begin_recovery`
    pub fn finish_recovery(&mut self, resource_type: ResourceType, recovered: bool, now: Instant) {
        if let Some(record) = self.records.get_mut(&resource_type) {
            if record.state != ResourceState::Recovering {
                return;
            }
            if recovered {
                record.state = ResourceState::Available;
                record.release_time = None;
                record.last_access = now;
            } else {
                record.state = ResourceState::Released;
            }
        }
    }

    pub fn snapshot(&self, now: Instant) -> Vec<ResourceSnapshot> {
        let mut snapshots: Vec<ResourceSnapshot> = self
            .records
            .values()
            .map(|r| ResourceSnapshot {
                resource_type: r.resource_type,
                release_level: r.resource_type.release_level(),
                state: r.state,
                idle_for: r.idle_for(now),
                released_for: r.release_time.map(|t| now.saturating_duration_since(t)),
                access_count: r.access_count,
            })
            .collect();
        snapshots.sort_by_key(|s| s.resource_type);
        snapshots
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
