// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! FIFO lock
//!
//! A request first takes a sequence number and joins the key's wait queue
//! in one atomic step, then retries a single atomic attempt that grants
//! only to the queue head. Queue entries carry their own deadline, so a
//! waiter that disappears stops blocking the queue once its deadline passes.

use super::{poll_until_granted, AcquireOutcome, AcquireRequest};
use dlm_adapters::{AtomicScript, CoordinationStore, StoreError};
use dlm_core::{LockKey, OwnerToken};
use std::time::Duration;

/// Lower bound on how long a non-blocking request's entry stays queued
const MIN_ENTRY_TTL: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct FairLock<S> {
    store: S,
    queue_ttl: Duration,
    poll_interval: Duration,
}

impl<S: CoordinationStore> FairLock<S> {
    pub fn new(store: S, queue_ttl: Duration, poll_interval: Duration) -> Self {
        Self {
            store,
            queue_ttl,
            poll_interval,
        }
    }

    /// Join the wait queue, returning the assigned sequence
    async fn enqueue(&self, key: &LockKey, entry_ttl: Duration) -> Result<u64, StoreError> {
        self.store
            .eval(&AtomicScript::Enqueue {
                sequence_key: key.fair_sequence_key(),
                queue_key: key.fair_queue_key(),
                entry_ttl,
                queue_ttl: self.queue_ttl,
            })
            .await?
            .into_count("enqueue")
    }

    async fn attempt(
        &self,
        request: AcquireRequest<'_>,
        sequence: u64,
    ) -> Result<Option<OwnerToken>, StoreError> {
        let reply = self
            .store
            .eval(&AtomicScript::FairAttempt {
                holder_key: request.key.holder_key(),
                readers_key: request.key.readers_key(),
                queue_key: request.key.fair_queue_key(),
                token: request.token.as_str().to_string(),
                owner_prefix: request.owner.token_prefix(),
                sequence,
                ttl: request.ttl,
            })
            .await?;
        Ok(reply.granted().map(OwnerToken::from))
    }

    pub async fn try_acquire(&self, request: AcquireRequest<'_>) -> AcquireOutcome {
        let entry_ttl = self.poll_interval.max(MIN_ENTRY_TTL);
        let sequence = match self.enqueue(request.key, entry_ttl).await {
            Ok(sequence) => sequence,
            Err(e) => return AcquireOutcome::StoreUnavailable(e),
        };
        let mut entry = QueueEntry::new(self.store.clone(), request.key, sequence);
        let outcome = AcquireOutcome::from(self.attempt(request, sequence).await);
        if outcome.token().is_some() {
            entry.disarm();
        } else {
            entry.leave().await;
        }
        outcome
    }

    pub async fn acquire_blocking(
        &self,
        request: AcquireRequest<'_>,
        wait_timeout: Duration,
        on_contended: impl FnOnce(),
    ) -> AcquireOutcome {
        let entry_ttl = wait_timeout + self.poll_interval.max(MIN_ENTRY_TTL);
        let sequence = match self.enqueue(request.key, entry_ttl).await {
            Ok(sequence) => sequence,
            Err(e) => return AcquireOutcome::StoreUnavailable(e),
        };
        tracing::debug!(key = %request.key, sequence, "joined fair queue");

        // Dropping this future mid-wait leaves the queue via the entry's Drop
        let mut entry = QueueEntry::new(self.store.clone(), request.key, sequence);
        let outcome =
            poll_until_granted(self.poll_interval, wait_timeout, on_contended, || {
                self.attempt(request, sequence)
            })
            .await;
        if outcome.token().is_some() {
            entry.disarm();
        } else {
            entry.leave().await;
        }
        outcome
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

/// A queued fair request that must leave the queue unless granted
///
/// A grant removes the entry store-side. Any other exit removes it here:
/// explicitly through [`QueueEntry::leave`], or from `Drop` on a spawned
/// task when the waiting future is cancelled.
struct QueueEntry<S: CoordinationStore> {
    store: S,
    queue_key: String,
    sequence: u64,
    armed: bool,
}

impl<S: CoordinationStore> QueueEntry<S> {
    fn new(store: S, key: &LockKey, sequence: u64) -> Self {
        Self {
            store,
            queue_key: key.fair_queue_key(),
            sequence,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    fn script(&self) -> AtomicScript {
        AtomicScript::Dequeue {
            queue_key: self.queue_key.clone(),
            sequence: self.sequence,
        }
    }

    async fn leave(&mut self) {
        self.armed = false;
        if let Err(e) = self.store.eval(&self.script()).await {
            // The entry's own deadline removes it eventually
            tracing::warn!(
                queue = %self.queue_key,
                sequence = self.sequence,
                error = %e,
                "failed to leave fair queue"
            );
        }
    }
}

impl<S: CoordinationStore> Drop for QueueEntry<S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let store = self.store.clone();
        let script = self.script();
        runtime.spawn(async move {
            if let Err(e) = store.eval(&script).await {
                tracing::debug!(error = %e, "cancelled fair request could not leave queue");
            }
        });
    }
}

#[cfg(test)]
#[path = "fair_tests.rs"]
mod tests;
