// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::resource::{ResourceError, ResourceHandler};
use crate::store::{AtomicScript, CoordinationStore, ScriptReply, StoreError};
use async_trait::async_trait;
use dlm_core::ResourceType;
use std::time::{Duration, Instant};
use tracing::Instrument;

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Wrapper that adds tracing to any CoordinationStore
#[derive(Clone)]
pub struct TracedStore<S> {
    inner: S,
}

impl<S> TracedStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: CoordinationStore> CoordinationStore for TracedStore<S> {
    async fn eval(&self, script: &AtomicScript) -> Result<ScriptReply, StoreError> {
        let span = tracing::info_span!(
            "store.eval",
            script = script.name(),
            key = script.primary_key()
        );
        async {
            let start = Instant::now();
            let result = self.inner.eval(script).await;
            match &result {
                Ok(reply) => tracing::debug!(
                    elapsed_ms = elapsed_ms(start),
                    granted = reply.granted().is_some(),
                    "script done"
                ),
                Err(e) => tracing::warn!(
                    elapsed_ms = elapsed_ms(start),
                    error = %e,
                    "script failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let result = self.inner.get(key).await;
        tracing::trace!(key, found = ?result.as_ref().map(|v| v.is_some()).ok(), "get");
        result
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let span = tracing::debug_span!("store.set", key, ttl = ?ttl);
        async {
            let result = self.inner.set(key, value, ttl).await;
            match &result {
                Ok(()) => tracing::debug!(value_len = value.len(), "stored"),
                Err(e) => tracing::warn!(error = %e, "set failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let span = tracing::debug_span!("store.delete", key);
        async {
            let result = self.inner.delete(key).await;
            match &result {
                Ok(existed) => tracing::debug!(existed, "deleted"),
                Err(e) => tracing::warn!(error = %e, "delete failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let result = self.inner.exists(key).await;
        tracing::trace!(key, exists = ?result.as_ref().ok(), "checked");
        result
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let result = self.inner.ttl(key).await;
        tracing::trace!(key, ttl = ?result.as_ref().ok(), "ttl");
        result
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let result = self.inner.keys(prefix).await;
        match &result {
            Ok(keys) => tracing::trace!(prefix, count = keys.len(), "listed keys"),
            Err(e) => tracing::warn!(prefix, error = %e, "key listing failed"),
        }
        result
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let result = self.inner.list_push(key, value).await;
        tracing::trace!(key, len = ?result.as_ref().ok(), "pushed");
        result
    }

    async fn list_peek(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.list_peek(key).await
    }

    async fn list_pop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let result = self.inner.list_pop(key).await;
        tracing::trace!(key, popped = ?result.as_ref().map(|v| v.is_some()).ok(), "popped");
        result
    }
}

/// Wrapper that adds tracing to any ResourceHandler
#[derive(Clone)]
pub struct TracedResourceHandler<H> {
    inner: H,
}

impl<H> TracedResourceHandler<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }
}

#[async_trait]
impl<H: ResourceHandler> ResourceHandler for TracedResourceHandler<H> {
    async fn cleanup(&self, resource: ResourceType) -> Result<(), ResourceError> {
        let span = tracing::info_span!("resource.cleanup", resource = resource.name());
        async {
            tracing::info!("starting");
            let start = Instant::now();
            let result = self.inner.cleanup(resource).await;
            match &result {
                Ok(()) => tracing::info!(elapsed_ms = elapsed_ms(start), "released"),
                Err(e) => tracing::warn!(
                    elapsed_ms = elapsed_ms(start),
                    error = %e,
                    "cleanup failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn fast_recover(&self, resource: ResourceType) -> Result<bool, ResourceError> {
        let span = tracing::info_span!("resource.fast_recover", resource = resource.name());
        async {
            let start = Instant::now();
            let result = self.inner.fast_recover(resource).await;
            match &result {
                Ok(recovered) => tracing::info!(
                    recovered,
                    elapsed_ms = elapsed_ms(start),
                    "fast path done"
                ),
                Err(e) => tracing::warn!(
                    elapsed_ms = elapsed_ms(start),
                    error = %e,
                    "fast path failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn standard_recover(&self, resource: ResourceType) -> Result<(), ResourceError> {
        let span = tracing::info_span!("resource.standard_recover", resource = resource.name());
        async {
            let start = Instant::now();
            let result = self.inner.standard_recover(resource).await;
            match &result {
                Ok(()) => tracing::info!(elapsed_ms = elapsed_ms(start), "recovered"),
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed_ms(start),
                    error = %e,
                    "recovery failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
