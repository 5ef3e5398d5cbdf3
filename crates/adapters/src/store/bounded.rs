// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deadline wrapper for store calls

use super::{AtomicScript, CoordinationStore, ScriptReply, StoreError};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Wrapper that fails any store call exceeding `timeout`
///
/// A call that times out surfaces as [`StoreError::Timeout`]; lock primitives
/// treat that the same as an unavailable store.
#[derive(Clone)]
pub struct TimeoutStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S> TimeoutStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                operation,
                timeout: self.timeout,
            }),
        }
    }
}

#[async_trait]
impl<S: CoordinationStore> CoordinationStore for TimeoutStore<S> {
    async fn eval(&self, script: &AtomicScript) -> Result<ScriptReply, StoreError> {
        self.bounded(script.name(), self.inner.eval(script)).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.bounded("get", self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.bounded("set", self.inner.set(key, value, ttl)).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.bounded("delete", self.inner.delete(key)).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.bounded("exists", self.inner.exists(key)).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        self.bounded("ttl", self.inner.ttl(key)).await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.bounded("keys", self.inner.keys(prefix)).await
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        self.bounded("list_push", self.inner.list_push(key, value)).await
    }

    async fn list_peek(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.bounded("list_peek", self.inner.list_peek(key)).await
    }

    async fn list_pop(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.bounded("list_pop", self.inner.list_pop(key)).await
    }
}

#[cfg(test)]
#[path = "bounded_tests.rs"]
mod tests;
