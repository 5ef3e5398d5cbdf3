// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake coordination store for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{AtomicScript, CoordinationStore, MemoryStore, ScriptReply, StoreError};
use async_trait::async_trait;
use dlm_core::FakeClock;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Recorded store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Eval(AtomicScript),
    Get(String),
    Set {
        key: String,
        value: String,
        ttl: Option<Duration>,
    },
    Delete(String),
    Exists(String),
    Ttl(String),
    Keys(String),
    ListPush { key: String, value: String },
    ListPeek(String),
    ListPop(String),
}

impl StoreCall {
    /// Whether this call ran an atomic script with the given name
    pub fn is_script(&self, name: &str) -> bool {
        matches!(self, StoreCall::Eval(script) if script.name() == name)
    }
}

#[derive(Default)]
struct FakeState {
    calls: Vec<StoreCall>,
    unavailable: bool,
}

/// Fake store backed by [`MemoryStore`] on a [`FakeClock`]
///
/// Records every call and can simulate an outage, in which case calls are
/// still recorded but fail with [`StoreError::Unavailable`].
#[derive(Clone)]
pub struct FakeStore {
    inner: MemoryStore<FakeClock>,
    clock: FakeClock,
    state: Arc<Mutex<FakeState>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::with_clock(FakeClock::new())
    }

    /// Share a clock with the code under test so leases expire on `advance`
    pub fn with_clock(clock: FakeClock) -> Self {
        Self {
            inner: MemoryStore::with_clock(clock.clone()),
            clock,
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    pub fn clock(&self) -> &FakeClock {
        &self.clock
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .calls
            .clone()
    }

    /// Number of atomic scripts run with the given name
    pub fn script_count(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| c.is_script(name)).count()
    }

    pub fn clear_calls(&self) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .calls
            .clear();
    }

    /// Simulate the store going away (or coming back)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).unavailable = unavailable;
    }

    fn record(&self, call: StoreCall) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.calls.push(call);
        if state.unavailable {
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }

    /// Advance the shared clock
    pub fn advance(&self, duration: Duration) {
        self.clock.advance(duration);
    }
}

impl Default for FakeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoordinationStore for FakeStore {
    async fn eval(&self, script: &AtomicScript) -> Result<ScriptReply, StoreError> {
        self.record(StoreCall::Eval(script.clone()))?;
        self.inner.eval(script).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.record(StoreCall::Get(key.to_string()))?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.record(StoreCall::Set {
            key: key.to_string(),
            value: value.to_string(),
            ttl,
        })?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.record(StoreCall::Delete(key.to_string()))?;
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.record(StoreCall::Exists(key.to_string()))?;
        self.inner.exists(key).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        self.record(StoreCall::Ttl(key.to_string()))?;
        self.inner.ttl(key).await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.record(StoreCall::Keys(prefix.to_string()))?;
        self.inner.keys(prefix).await
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        self.record(StoreCall::ListPush {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        self.inner.list_push(key, value).await
    }

    async fn list_peek(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.record(StoreCall::ListPeek(key.to_string()))?;
        self.inner.list_peek(key).await
    }

    async fn list_pop(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.record(StoreCall::ListPop(key.to_string()))?;
        self.inner.list_pop(key).await
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
