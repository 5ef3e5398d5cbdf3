// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake resource handler for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ResourceError, ResourceHandler};
use async_trait::async_trait;
use dlm_core::ResourceType;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Recorded handler call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceCall {
    Cleanup(ResourceType),
    FastRecover(ResourceType),
    StandardRecover(ResourceType),
}

/// Scripted result of the fast recovery path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FastOutcome {
    Recovered,
    Declined,
    Failed,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<ResourceCall>,
    fast: HashMap<ResourceType, FastOutcome>,
    failing_cleanup: HashSet<ResourceType>,
    failing_standard: HashSet<ResourceType>,
    fast_delay: Option<Duration>,
}

/// Fake resource handler for testing
///
/// Succeeds on every path unless told otherwise.
#[derive(Clone, Default)]
pub struct FakeResourceHandler {
    state: Arc<Mutex<FakeState>>,
}

impl FakeResourceHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ResourceCall> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .calls
            .clone()
    }

    /// Make the fast path return `Ok(false)` for `resource`
    pub fn decline_fast(&self, resource: ResourceType) {
        self.set_fast(resource, FastOutcome::Declined);
    }

    /// Make the fast path return an error for `resource`
    pub fn fail_fast(&self, resource: ResourceType) {
        self.set_fast(resource, FastOutcome::Failed);
    }

    pub fn fail_standard(&self, resource: ResourceType) {
        self.lock().failing_standard.insert(resource);
    }

    pub fn fail_cleanup(&self, resource: ResourceType) {
        self.lock().failing_cleanup.insert(resource);
    }

    /// Sleep this long inside every fast recovery
    pub fn set_fast_delay(&self, delay: Duration) {
        self.lock().fast_delay = Some(delay);
    }

    fn set_fast(&self, resource: ResourceType, outcome: FastOutcome) {
        self.lock().fast.insert(resource, outcome);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ResourceHandler for FakeResourceHandler {
    async fn cleanup(&self, resource: ResourceType) -> Result<(), ResourceError> {
        let fail = {
            let mut state = self.lock();
            state.calls.push(ResourceCall::Cleanup(resource));
            state.failing_cleanup.contains(&resource)
        };
        if fail {
            return Err(ResourceError::CleanupFailed {
                resource,
                reason: "scripted failure".to_string(),
            });
        }
        Ok(())
    }

    async fn fast_recover(&self, resource: ResourceType) -> Result<bool, ResourceError> {
        let (outcome, delay) = {
            let mut state = self.lock();
            state.calls.push(ResourceCall::FastRecover(resource));
            (
                state
                    .fast
                    .get(&resource)
                    .copied()
                    .unwrap_or(FastOutcome::Recovered),
                state.fast_delay,
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match outcome {
            FastOutcome::Recovered => Ok(true),
            FastOutcome::Declined => Ok(false),
            FastOutcome::Failed => Err(ResourceError::RecoveryFailed {
                resource,
                reason: "scripted fast-path failure".to_string(),
            }),
        }
    }

    async fn standard_recover(&self, resource: ResourceType) -> Result<(), ResourceError> {
        let fail = {
            let mut state = self.lock();
            state.calls.push(ResourceCall::StandardRecover(resource));
            state.failing_standard.contains(&resource)
        };
        if fail {
            return Err(ResourceError::RecoveryFailed {
                resource,
                reason: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
