// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource lifecycle manager
//!
//! Releases idle resource classes according to their release level and
//! brings them back on the next access, trying the handler's fast path
//! before its standard path.

use crate::error::LifecycleError;
use dlm_adapters::ResourceHandler;
use dlm_core::{
    Clock, LifecycleSettings, RecoveryPath, RecoverySnapshot, RecoveryTracker, ResourceRegistry,
    ResourceSnapshot, ResourceState, ResourceType,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

pub struct ResourceLifecycleManager<H, C> {
    handler: H,
    clock: C,
    settings: LifecycleSettings,
    registry: Mutex<ResourceRegistry>,
    recovery: Mutex<RecoveryTracker>,
    /// Serializes recovery per type so concurrent accesses recover once
    recovery_gates: HashMap<ResourceType, tokio::sync::Mutex<()>>,
}

impl<H: ResourceHandler, C: Clock> ResourceLifecycleManager<H, C> {
    pub fn new(handler: H, clock: C, settings: LifecycleSettings) -> Self {
        let registry = ResourceRegistry::new(clock.now());
        Self {
            handler,
            clock,
            settings,
            registry: Mutex::new(registry),
            recovery: Mutex::new(RecoveryTracker::new()),
            recovery_gates: ResourceType::ALL
                .iter()
                .map(|ty| (*ty, tokio::sync::Mutex::new(())))
                .collect(),
        }
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, ResourceRegistry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn recovery(&self) -> std::sync::MutexGuard<'_, RecoveryTracker> {
        self.recovery.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Note a use of `resource` without recovering it
    pub fn record_access(&self, resource: ResourceType) -> ResourceState {
        self.registry().touch(resource, self.clock.now())
    }

    pub fn is_available(&self, resource: ResourceType) -> bool {
        // Untracked types have never been released
        !matches!(self.registry().get(resource), Some(r) if !r.is_available())
    }

    /// Release every resource idle past its level's threshold
    ///
    /// State is decided under the registry lock; cleanups run after it is
    /// dropped. Cleanup failures are logged and the resource stays released.
    pub async fn scan_and_release(&self) -> Vec<ResourceType> {
        let now = self.clock.now();
        let released: Vec<ResourceType> = {
            let mut registry = self.registry();
            let candidates = registry.release_candidates(&self.settings, now);
            candidates
                .into_iter()
                .filter(|ty| registry.mark_released(*ty, now))
                .collect()
        };

        for resource in &released {
            self.cleanup(*resource).await;
        }
        if released.is_empty() {
            tracing::debug!("idle scan released nothing");
        } else {
            tracing::info!(count = released.len(), released = ?released, "idle scan released resources");
        }
        released
    }

    /// Release one resource now, regardless of idle time
    ///
    /// Still refuses resources whose level never allows release.
    pub async fn release(&self, resource: ResourceType) -> bool {
        let marked = self.registry().mark_released(resource, self.clock.now());
        if marked {
            self.cleanup(resource).await;
        }
        marked
    }

    async fn cleanup(&self, resource: ResourceType) {
        if let Err(e) = self.handler.cleanup(resource).await {
            tracing::warn!(resource = resource.name(), error = %e, "resource cleanup failed");
        }
    }

    /// Make `resource` usable, recovering it if it was released
    ///
    /// Counts as an access. Available resources return at once; released
    /// ones try the fast path and fall back to the standard path. Both
    /// outcomes are timed into the recovery record.
    pub async fn ensure_available(
        &self,
        resource: ResourceType,
    ) -> Result<RecoveryPath, LifecycleError> {
        if self.record_access(resource) == ResourceState::Available {
            return Ok(RecoveryPath::AlreadyAvailable);
        }

        let _gate = match self.recovery_gates.get(&resource) {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };
        if !self.registry().begin_recovery(resource, self.clock.now()) {
            // Another caller finished the recovery while we waited
            if self.is_available(resource) {
                return Ok(RecoveryPath::AlreadyAvailable);
            }
            return Err(LifecycleError::ResourceUnavailable {
                resource,
                reason: "recovery already in progress".to_string(),
            });
        }
        self.recovery().begin(resource);

        let start = self.clock.now();
        let mut pending = PendingRecovery {
            registry: &self.registry,
            recovery: &self.recovery,
            clock: &self.clock,
            resource,
            start,
            armed: true,
        };
        let result = self.recover(resource).await;
        pending.armed = false;
        let duration = self.clock.since(start);
        let now = self.clock.now();

        let path = result.as_ref().ok().copied();
        self.recovery().finish(resource, path, duration, now);
        self.registry().finish_recovery(resource, path.is_some(), now);

        match &result {
            Ok(RecoveryPath::Fast) if duration > self.settings.fast_recovery_target => {
                tracing::warn!(
                    resource = resource.name(),
                    elapsed = %humantime::format_duration(duration),
                    target = %humantime::format_duration(self.settings.fast_recovery_target),
                    "fast recovery exceeded target"
                );
            }
            Ok(path) => tracing::info!(
                resource = resource.name(),
                path = ?path,
                elapsed_ms = duration.as_millis() as u64,
                "resource recovered"
            ),
            Err(e) => tracing::error!(resource = resource.name(), error = %e, "resource recovery failed"),
        }
        result
    }

    async fn recover(&self, resource: ResourceType) -> Result<RecoveryPath, LifecycleError> {
        match self.handler.fast_recover(resource).await {
            Ok(true) => return Ok(RecoveryPath::Fast),
            Ok(false) => {
                tracing::debug!(resource = resource.name(), "fast path declined");
            }
            Err(e) => {
                tracing::warn!(resource = resource.name(), error = %e, "fast path failed, falling back");
            }
        }
        self.handler
            .standard_recover(resource)
            .await
            .map(|()| RecoveryPath::Standard)
            .map_err(|e| LifecycleError::ResourceUnavailable {
                resource,
                reason: e.to_string(),
            })
    }

    pub fn resource_snapshot(&self) -> Vec<ResourceSnapshot> {
        self.registry().snapshot(self.clock.now())
    }

    pub fn recovery_snapshot(&self) -> Vec<RecoverySnapshot> {
        self.recovery().snapshot()
    }

    /// Clear recovery statistics for one type, or all when `None`
    pub fn reset_recovery_stats(&self, resource: Option<ResourceType>) {
        self.recovery().reset(resource);
    }
}

/// A started recovery whose future may be dropped before it finishes
///
/// Dropping it armed records a failed recovery and puts the resource back
/// to released, so the next access retries instead of finding it stuck.
struct PendingRecovery<'a, C: Clock> {
    registry: &'a Mutex<ResourceRegistry>,
    recovery: &'a Mutex<RecoveryTracker>,
    clock: &'a C,
    resource: ResourceType,
    start: Instant,
    armed: bool,
}

impl<C: Clock> Drop for PendingRecovery<'_, C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let now = self.clock.now();
        let duration = now.saturating_duration_since(self.start);
        self.recovery
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .finish(self.resource, None, duration, now);
        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .finish_recovery(self.resource, false, now);
        tracing::warn!(resource = self.resource.name(), "resource recovery abandoned");
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
