// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock manager facade
//!
//! The single entry point for callers. Every acquisition goes through the
//! local reentrancy counter, then the protocol's primitive, and is recorded
//! in the performance monitor and the local wait-for graph.
//!
//! Public lock operations never fail with a store error: an unreachable
//! store reads as "not acquired" or "not released", with a log entry.

use crate::deadlock::{DistributedDeadlockDetector, LocalDeadlockDetector};
use crate::error::{LifecycleError, WithLockError};
use crate::lifecycle::ResourceLifecycleManager;
use crate::primitives::{holder_key, AcquireOutcome, AcquireRequest, LockPrimitives};
use dlm_adapters::{
    CoordinationStore, ResourceHandler, TimeoutStore, TracedResourceHandler, TracedStore,
};
use dlm_core::{
    CallerId, Clock, ConfigError, DeadlockCycle, DlmConfig, IdGen, LocalRelease, LockHandle,
    LockKey, LockProtocol, LockStats, NodeId, OwnerId, OwnerToken, PerformanceMonitor,
    RecoveryPath, RecoverySnapshot, ReentrancyCounter, ResourceSnapshot, ResourceType,
};
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Store stack every manager talks through
pub type ManagedStore<S> = TracedStore<TimeoutStore<S>>;

/// Adapter dependencies of a [`LockManager`]
pub struct LockManagerDeps<S, H, C, I> {
    pub store: S,
    pub handler: H,
    pub clock: C,
    pub id_gen: I,
}

/// Options for a blocking acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    pub protocol: LockProtocol,
    /// Lease length; the configured default when `None`
    pub ttl: Option<Duration>,
    /// How long to wait; the configured default when `None`
    pub wait_timeout: Option<Duration>,
}

impl LockOptions {
    pub fn new(protocol: LockProtocol) -> Self {
        Self {
            protocol,
            ttl: None,
            wait_timeout: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = Some(wait_timeout);
        self
    }
}

impl Default for LockOptions {
    fn default() -> Self {
        Self::new(LockProtocol::Reentrant)
    }
}

/// Facade over lock primitives, deadlock detection, monitoring and the
/// resource lifecycle
pub struct LockManager<S, H, C, I> {
    config: DlmConfig,
    node_id: NodeId,
    store: ManagedStore<S>,
    primitives: LockPrimitives<ManagedStore<S>>,
    reentrancy: ReentrancyCounter,
    monitor: PerformanceMonitor,
    local_deadlocks: LocalDeadlockDetector,
    global_deadlocks: Option<DistributedDeadlockDetector<ManagedStore<S>, C>>,
    lifecycle: ResourceLifecycleManager<TracedResourceHandler<H>, C>,
    clock: C,
    id_gen: I,
    /// Live leases per owner token, for hold-time statistics and re-entry
    leases: Mutex<HashMap<OwnerToken, Lease>>,
}

/// Local view of a lease obtained from the store
#[derive(Debug, Clone, Copy)]
struct Lease {
    granted_at: Instant,
    expires_at: Instant,
}

impl<S, H, C, I> LockManager<S, H, C, I>
where
    S: CoordinationStore,
    H: ResourceHandler,
    C: Clock,
    I: IdGen,
{
    /// Build a manager over its adapters
    ///
    /// Fails when `config` does not validate.
    pub fn new(deps: LockManagerDeps<S, H, C, I>, config: DlmConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let node_id = config.locks.node_id.clone().unwrap_or_else(NodeId::generate);
        let store = TracedStore::new(TimeoutStore::new(deps.store, config.locks.store_timeout));
        let global_deadlocks = DistributedDeadlockDetector::new(
            store.clone(),
            deps.clock.clone(),
            node_id.clone(),
            config.deadlock.snapshot_ttl,
            config.deadlock.global_enabled,
        );
        tracing::info!(
            node = %node_id,
            module = %config.locks.module,
            global_detection = config.deadlock.global_enabled,
            "lock manager started"
        );
        Ok(Self {
            primitives: LockPrimitives::new(store.clone(), &config.locks),
            store,
            node_id,
            reentrancy: ReentrancyCounter::new(),
            monitor: PerformanceMonitor::new(),
            local_deadlocks: LocalDeadlockDetector::new(),
            global_deadlocks: Some(global_deadlocks),
            lifecycle: ResourceLifecycleManager::new(
                TracedResourceHandler::new(deps.handler),
                deps.clock.clone(),
                config.lifecycle.clone(),
            ),
            clock: deps.clock,
            id_gen: deps.id_gen,
            leases: Mutex::new(HashMap::new()),
            config,
        })
    }

    /// Drop the distributed detector; global deadlock calls become no-ops
    pub fn without_global_detection(mut self) -> Self {
        self.global_deadlocks = None;
        self
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn config(&self) -> &DlmConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Full key for a lock name and business key in this manager's module
    pub fn lock_key(&self, name: &str, business_key: &str) -> LockKey {
        LockKey::new(&self.config.locks.module, name, business_key)
    }

    // -- acquisition ------------------------------------------------------

    pub async fn try_lock(
        &self,
        caller: &CallerId,
        name: &str,
        business_key: &str,
        ttl: Option<Duration>,
    ) -> Option<LockHandle> {
        self.acquire(caller, name, business_key, LockProtocol::Reentrant, ttl, None)
            .await
    }

    pub async fn try_read_lock(
        &self,
        caller: &CallerId,
        name: &str,
        business_key: &str,
        ttl: Option<Duration>,
    ) -> Option<LockHandle> {
        self.acquire(caller, name, business_key, LockProtocol::ReadLock, ttl, None)
            .await
    }

    pub async fn try_write_lock(
        &self,
        caller: &CallerId,
        name: &str,
        business_key: &str,
        ttl: Option<Duration>,
    ) -> Option<LockHandle> {
        self.acquire(caller, name, business_key, LockProtocol::WriteLock, ttl, None)
            .await
    }

    pub async fn try_fair_lock(
        &self,
        caller: &CallerId,
        name: &str,
        business_key: &str,
        ttl: Option<Duration>,
    ) -> Option<LockHandle> {
        self.acquire(caller, name, business_key, LockProtocol::Fair, ttl, None)
            .await
    }

    /// Wait up to the options' timeout for a lock
    pub async fn lock(
        &self,
        caller: &CallerId,
        name: &str,
        business_key: &str,
        options: LockOptions,
    ) -> Option<LockHandle> {
        let wait = options
            .wait_timeout
            .unwrap_or(self.config.locks.default_wait_timeout);
        self.acquire(
            caller,
            name,
            business_key,
            options.protocol,
            options.ttl,
            Some(wait),
        )
        .await
    }

    async fn acquire(
        &self,
        caller: &CallerId,
        name: &str,
        business_key: &str,
        protocol: LockProtocol,
        ttl: Option<Duration>,
        wait: Option<Duration>,
    ) -> Option<LockHandle> {
        let key = self.lock_key(name, business_key);
        self.monitor.record_attempt(name);

        if protocol.is_reentrant() {
            if let Some(handle) = self.reentrancy.reenter(&key, protocol, caller) {
                if self.lease_live(&handle.owner_token) {
                    self.monitor.record_success(name, Duration::ZERO);
                    tracing::trace!(%key, %caller, protocol = protocol.name(), "re-entered");
                    return Some(handle);
                }
                // Lease ran out under the local holds; ask the store again
                self.reentrancy.forget(&handle);
                self.local_deadlocks
                    .record_release(&handle.owner, &handle.lock_key);
                self.end_lease(&handle.owner_token);
                tracing::debug!(%key, %caller, "lease expired under re-entrant hold");
            }
        }

        let owner = OwnerId::new(&self.node_id, caller);
        let token = OwnerToken::mint(&owner, &self.id_gen.next());
        let ttl = ttl.unwrap_or(self.config.locks.default_ttl);
        let request = AcquireRequest {
            key: &key,
            owner: &owner,
            token: &token,
            ttl,
        };

        let start = self.clock.now();
        let outcome = match wait {
            None => self.primitives.try_acquire(protocol, request).await,
            Some(timeout) => {
                let deadlocks = &self.local_deadlocks;
                let (waiter, wanted) = (&owner, &key);
                self.primitives
                    .acquire_blocking(protocol, request, timeout, || {
                        deadlocks.record_wait(waiter, wanted)
                    })
                    .await
            }
        };
        let waited = self.clock.since(start);

        let holder = match outcome {
            AcquireOutcome::Granted(holder) => holder,
            failed => {
                if wait.is_some() {
                    self.local_deadlocks.record_wait_end(&owner, &key);
                }
                if let AcquireOutcome::StoreUnavailable(e) = &failed {
                    tracing::warn!(%key, error = %e, "lock not acquired: store unavailable");
                } else {
                    tracing::debug!(%key, outcome = ?failed, "lock not acquired");
                }
                if let Some(reason) = failed.failure() {
                    self.monitor.record_failure(name, waited, reason);
                }
                return None;
            }
        };

        let handle = LockHandle {
            name: name.to_string(),
            lock_key: key,
            owner_token: holder,
            owner,
            caller: caller.clone(),
            protocol,
            ttl,
        };
        self.local_deadlocks
            .record_grant(&handle.owner, &handle.lock_key);
        if protocol.is_reentrant() {
            self.reentrancy.record_grant(&handle);
        }
        self.start_lease(&handle.owner_token, ttl);
        self.monitor.record_success(name, waited);
        tracing::debug!(
            key = %handle.lock_key,
            %caller,
            protocol = protocol.name(),
            waited_ms = waited.as_millis() as u64,
            "lock acquired"
        );
        Some(handle)
    }

    fn leases(&self) -> std::sync::MutexGuard<'_, HashMap<OwnerToken, Lease>> {
        self.leases.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Track a new grant, dropping leases that have run out
    fn start_lease(&self, token: &OwnerToken, ttl: Duration) {
        let now = self.clock.now();
        let mut leases = self.leases();
        leases.retain(|_, lease| lease.expires_at > now);
        leases.insert(
            token.clone(),
            Lease {
                granted_at: now,
                expires_at: now + ttl,
            },
        );
    }

    fn lease_live(&self, token: &OwnerToken) -> bool {
        let now = self.clock.now();
        self.leases()
            .get(token)
            .is_some_and(|lease| lease.expires_at > now)
    }

    /// Stop tracking a lease, returning how long it was held
    fn end_lease(&self, token: &OwnerToken) -> Duration {
        self.leases()
            .remove(token)
            .map(|lease| self.clock.since(lease.granted_at))
            .unwrap_or_default()
    }

    /// Number of leases tracked for hold-time statistics
    #[cfg(test)]
    fn tracked_leases(&self) -> usize {
        self.leases().len()
    }

    // -- release ----------------------------------------------------------

    /// Release any handle returned by this manager
    ///
    /// Re-entered locks stay held until the last release. Returns `false`
    /// when the lease was already gone or the token is not the holder.
    pub async fn unlock(&self, handle: &LockHandle) -> bool {
        if handle.protocol.is_reentrant() {
            match self.reentrancy.release(handle) {
                LocalRelease::StillHeld { remaining } => {
                    self.monitor
                        .record_release(&handle.name, Duration::ZERO, true);
                    tracing::trace!(key = %handle.lock_key, remaining, "re-entrant hold dropped");
                    return true;
                }
                LocalRelease::Last | LocalRelease::NotHeld => {}
            }
        }

        let released = match self
            .primitives
            .release(handle.protocol, &handle.lock_key, &handle.owner_token)
            .await
        {
            Ok(released) => released,
            Err(e) => {
                tracing::warn!(key = %handle.lock_key, error = %e, "lock release failed: store unavailable");
                false
            }
        };

        self.local_deadlocks
            .record_release(&handle.owner, &handle.lock_key);
        let hold = self.end_lease(&handle.owner_token);
        self.monitor.record_release(&handle.name, hold, released);

        if released {
            tracing::debug!(key = %handle.lock_key, hold_ms = hold.as_millis() as u64, "lock released");
        } else {
            tracing::debug!(key = %handle.lock_key, "release refused: not the holder");
        }
        released
    }

    pub async fn release_read_lock(&self, handle: &LockHandle) -> bool {
        if handle.protocol != LockProtocol::ReadLock {
            tracing::warn!(key = %handle.lock_key, protocol = handle.protocol.name(), "not a read lock");
            return false;
        }
        self.unlock(handle).await
    }

    pub async fn release_write_lock(&self, handle: &LockHandle) -> bool {
        if handle.protocol != LockProtocol::WriteLock {
            tracing::warn!(key = %handle.lock_key, protocol = handle.protocol.name(), "not a write lock");
            return false;
        }
        self.unlock(handle).await
    }

    /// Run `action` while holding a lock
    ///
    /// The lock is released on every exit: success, error and panic. A
    /// panic is resumed after the release. If the returned future is
    /// dropped mid-action, the local hold is dropped at once and the store
    /// release is spawned onto the runtime.
    pub async fn execute_with_lock<T, E, F, Fut>(
        &self,
        caller: &CallerId,
        name: &str,
        business_key: &str,
        options: LockOptions,
        action: F,
    ) -> Result<T, WithLockError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(handle) = self.lock(caller, name, business_key, options).await else {
            return Err(WithLockError::NotAcquired {
                name: name.to_string(),
                key: self.lock_key(name, business_key).to_string(),
            });
        };

        let mut guard = CancelGuard {
            manager: self,
            handle: &handle,
            armed: true,
        };
        let result = AssertUnwindSafe(action()).catch_unwind().await;
        guard.armed = false;
        self.unlock(&handle).await;

        match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(WithLockError::Action(e)),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    // -- inspection -------------------------------------------------------

    /// Whether any holder currently has the lock in the store
    pub async fn is_locked(&self, name: &str, business_key: &str, protocol: LockProtocol) -> bool {
        let key = holder_key(protocol, &self.lock_key(name, business_key));
        match self.store.exists(&key).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "lock inspection failed");
                false
            }
        }
    }

    /// Remaining lease of the lock in the store
    pub async fn remaining_ttl(
        &self,
        name: &str,
        business_key: &str,
        protocol: LockProtocol,
    ) -> Option<Duration> {
        let key = holder_key(protocol, &self.lock_key(name, business_key));
        match self.store.ttl(&key).await {
            Ok(ttl) => ttl,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "lock inspection failed");
                None
            }
        }
    }

    /// Local hold count of a caller on a re-entrant lock
    pub fn hold_count(
        &self,
        caller: &CallerId,
        name: &str,
        business_key: &str,
        protocol: LockProtocol,
    ) -> u32 {
        self.reentrancy
            .count(&self.lock_key(name, business_key), protocol, caller)
    }

    // -- statistics -------------------------------------------------------

    pub fn lock_stats(&self, name: &str) -> Option<LockStats> {
        self.monitor.stats(name)
    }

    pub fn global_stats(&self) -> LockStats {
        self.monitor.global()
    }

    pub fn lock_names(&self) -> Vec<String> {
        self.monitor.names()
    }

    pub fn reset_stats(&self) {
        self.monitor.reset();
    }

    // -- deadlocks --------------------------------------------------------

    pub fn detect_local_deadlocks(&self) -> Vec<DeadlockCycle> {
        self.local_deadlocks.detect()
    }

    /// Cycles across every node's published graph
    pub async fn detect_global_deadlocks(&self) -> Vec<DeadlockCycle> {
        match &self.global_deadlocks {
            Some(detector) => detector.detect().await,
            None => Vec::new(),
        }
    }

    /// Publish this node's wait-for graph; `false` if nothing was published
    pub async fn sync_local_state_to_global(&self) -> bool {
        match &self.global_deadlocks {
            Some(detector) => detector.sync(&self.local_deadlocks).await,
            None => false,
        }
    }

    pub fn set_global_detection_enabled(&self, enabled: bool) {
        if let Some(detector) = &self.global_deadlocks {
            detector.set_enabled(enabled);
        }
    }

    pub fn is_global_detection_enabled(&self) -> bool {
        self.global_deadlocks
            .as_ref()
            .is_some_and(|d| d.is_enabled())
    }

    // -- resources --------------------------------------------------------

    pub fn lifecycle(&self) -> &ResourceLifecycleManager<TracedResourceHandler<H>, C> {
        &self.lifecycle
    }

    pub fn record_resource_access(&self, resource: ResourceType) {
        self.lifecycle.record_access(resource);
    }

    pub async fn ensure_resource_available(
        &self,
        resource: ResourceType,
    ) -> Result<RecoveryPath, LifecycleError> {
        self.lifecycle.ensure_available(resource).await
    }

    pub async fn scan_idle_resources(&self) -> Vec<ResourceType> {
        self.lifecycle.scan_and_release().await
    }

    pub fn resource_snapshot(&self) -> Vec<ResourceSnapshot> {
        self.lifecycle.resource_snapshot()
    }

    pub fn recovery_snapshot(&self) -> Vec<RecoverySnapshot> {
        self.lifecycle.recovery_snapshot()
    }

    pub fn reset_recovery_stats(&self, resource: Option<ResourceType>) {
        self.lifecycle.reset_recovery_stats(resource);
    }
}

/// Releases a lock whose `execute_with_lock` future was dropped mid-action
struct CancelGuard<'a, S, H, C, I>
where
    S: CoordinationStore,
    H: ResourceHandler,
    C: Clock,
    I: IdGen,
{
    manager: &'a LockManager<S, H, C, I>,
    handle: &'a LockHandle,
    armed: bool,
}

impl<S, H, C, I> Drop for CancelGuard<'_, S, H, C, I>
where
    S: CoordinationStore,
    H: ResourceHandler,
    C: Clock,
    I: IdGen,
{
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let manager = self.manager;
        let handle = self.handle;
        if handle.protocol.is_reentrant()
            && matches!(
                manager.reentrancy.release(handle),
                LocalRelease::StillHeld { .. }
            )
        {
            manager
                .monitor
                .record_release(&handle.name, Duration::ZERO, true);
            return;
        }
        manager
            .local_deadlocks
            .record_release(&handle.owner, &handle.lock_key);
        let hold = manager.end_lease(&handle.owner_token);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            // No runtime to release on; the lease expires instead
            manager.monitor.record_release(&handle.name, hold, false);
            return;
        };
        manager.monitor.record_release(&handle.name, hold, true);
        let primitives = manager.primitives.clone();
        let handle = handle.clone();
        tracing::debug!(key = %handle.lock_key, "lock holder cancelled, releasing");
        runtime.spawn(async move {
            if let Err(e) = primitives
                .release(handle.protocol, &handle.lock_key, &handle.owner_token)
                .await
            {
                tracing::warn!(key = %handle.lock_key, error = %e, "release after cancellation failed");
            }
        });
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
