// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exclusive lock that the same owner may take again

use super::AcquireRequest;
use dlm_adapters::{AtomicScript, CoordinationStore, StoreError};
use dlm_core::{LockKey, OwnerToken};

#[derive(Clone)]
pub struct ReentrantLock<S> {
    store: S,
}

impl<S: CoordinationStore> ReentrantLock<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Take the holder slot if free of holders and readers, or refresh it if ours
    pub async fn attempt(
        &self,
        request: AcquireRequest<'_>,
    ) -> Result<Option<OwnerToken>, StoreError> {
        let reply = self
            .store
            .eval(&AtomicScript::AcquireExclusive {
                key: request.key.holder_key(),
                readers_key: request.key.readers_key(),
                token: request.token.as_str().to_string(),
                owner_prefix: request.owner.token_prefix(),
                ttl: request.ttl,
            })
            .await?;
        Ok(reply.granted().map(OwnerToken::from))
    }

    pub async fn release(&self, key: &LockKey, token: &OwnerToken) -> Result<bool, StoreError> {
        self.store
            .eval(&AtomicScript::ReleaseExclusive {
                key: key.holder_key(),
                token: token.as_str().to_string(),
            })
            .await?
            .into_flag("release_exclusive")
    }
}
