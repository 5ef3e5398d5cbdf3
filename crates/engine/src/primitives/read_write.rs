// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared-reader / exclusive-writer lock
//!
//! Readers are a set of tokens with individual leases, so the reader count
//! is the size of the live set and each reader can only remove itself.
//! The writer uses the key's shared holder slot, so it needs that slot free
//! and no live readers, and it excludes reentrant and fair holders too.

use super::AcquireRequest;
use dlm_adapters::{AtomicScript, CoordinationStore, StoreError};
use dlm_core::{LockKey, OwnerToken};

#[derive(Clone)]
pub struct ReadWriteLock<S> {
    store: S,
}

impl<S: CoordinationStore> ReadWriteLock<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn attempt_read(
        &self,
        request: AcquireRequest<'_>,
    ) -> Result<Option<OwnerToken>, StoreError> {
        let reply = self
            .store
            .eval(&AtomicScript::AcquireRead {
                holder_key: request.key.holder_key(),
                readers_key: request.key.readers_key(),
                token: request.token.as_str().to_string(),
                ttl: request.ttl,
            })
            .await?;
        Ok(reply.granted().map(OwnerToken::from))
    }

    pub async fn attempt_write(
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

    pub async fn release_read(&self, key: &LockKey, token: &OwnerToken) -> Result<bool, StoreError> {
        self.store
            .eval(&AtomicScript::ReleaseRead {
                readers_key: key.readers_key(),
                token: token.as_str().to_string(),
            })
            .await?
            .into_flag("release_read")
    }

    pub async fn release_write(
        &self,
        key: &LockKey,
        token: &OwnerToken,
    ) -> Result<bool, StoreError> {
        self.store
            .eval(&AtomicScript::ReleaseExclusive {
                key: key.holder_key(),
                token: token.as_str().to_string(),
            })
            .await?
            .into_flag("release_exclusive")
    }
}
