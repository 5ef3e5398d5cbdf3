// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock primitives: one small set of atomic store operations per protocol
//!
//! - **Reentrant** - set-if-absent-or-owned exclusive lock
//! - **Read/Write** - shared readers, exclusive writer
//! - **Fair** - FIFO grants through a store-side queue
//!
//! Every exclusive protocol shares the key's holder slot and waits out live
//! readers, so protocols exclude each other on the same lock key.
//!
//! Primitives only talk to the store. Local reentrancy, monitoring and
//! deadlock bookkeeping belong to the facade.

mod fair;
mod read_write;
mod reentrant;

pub use fair::FairLock;
pub use read_write::ReadWriteLock;
pub use reentrant::ReentrantLock;

use dlm_adapters::{CoordinationStore, StoreError};
use dlm_core::{AcquireFailure, LockKey, LockProtocol, LockSettings, OwnerId, OwnerToken};
use std::future::Future;
use std::time::Duration;

/// Result of one acquisition, blocking or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Granted; the token now stored as the holder
    Granted(OwnerToken),
    /// Held by someone else
    Contended,
    /// Still held by someone else when the wait budget ran out
    TimedOut,
    /// The store could not be reached on the last attempt
    StoreUnavailable(StoreError),
}

impl AcquireOutcome {
    pub fn token(&self) -> Option<&OwnerToken> {
        match self {
            AcquireOutcome::Granted(token) => Some(token),
            _ => None,
        }
    }

    /// Monitor classification of a failed acquisition
    pub fn failure(&self) -> Option<AcquireFailure> {
        match self {
            AcquireOutcome::Granted(_) => None,
            AcquireOutcome::Contended => Some(AcquireFailure::Contended),
            AcquireOutcome::TimedOut => Some(AcquireFailure::TimedOut),
            AcquireOutcome::StoreUnavailable(_) => Some(AcquireFailure::StoreUnavailable),
        }
    }
}

impl From<Result<Option<OwnerToken>, StoreError>> for AcquireOutcome {
    fn from(result: Result<Option<OwnerToken>, StoreError>) -> Self {
        match result {
            Ok(Some(token)) => AcquireOutcome::Granted(token),
            Ok(None) => AcquireOutcome::Contended,
            Err(e) => AcquireOutcome::StoreUnavailable(e),
        }
    }
}

/// What a single acquisition needs to know
#[derive(Debug, Clone, Copy)]
pub struct AcquireRequest<'a> {
    pub key: &'a LockKey,
    pub owner: &'a OwnerId,
    pub token: &'a OwnerToken,
    pub ttl: Duration,
}

/// Retry `attempt` every `poll_interval` until it grants or `wait_timeout` passes
///
/// `on_contended` runs once, after the first attempt that found the lock
/// held. Store errors count as "not yet" and keep the loop polling.
pub(crate) async fn poll_until_granted<F, Fut>(
    poll_interval: Duration,
    wait_timeout: Duration,
    on_contended: impl FnOnce(),
    mut attempt: F,
) -> AcquireOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<OwnerToken>, StoreError>>,
{
    let deadline = tokio::time::Instant::now() + wait_timeout;
    let mut on_contended = Some(on_contended);
    loop {
        let outcome = AcquireOutcome::from(attempt().await);
        match &outcome {
            AcquireOutcome::Granted(_) => return outcome,
            AcquireOutcome::Contended => {
                if let Some(f) = on_contended.take() {
                    f();
                }
            }
            AcquireOutcome::StoreUnavailable(e) => {
                tracing::warn!(error = %e, "store error while waiting for lock");
            }
            AcquireOutcome::TimedOut => {}
        }

        let now = tokio::time::Instant::now();
        if now >= deadline {
            return match outcome {
                AcquireOutcome::Contended => AcquireOutcome::TimedOut,
                other => other,
            };
        }
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}

/// All lock protocols over one store, selected by [`LockProtocol`]
#[derive(Clone)]
pub struct LockPrimitives<S> {
    reentrant: ReentrantLock<S>,
    read_write: ReadWriteLock<S>,
    fair: FairLock<S>,
    poll_interval: Duration,
}

impl<S: CoordinationStore> LockPrimitives<S> {
    pub fn new(store: S, settings: &LockSettings) -> Self {
        Self {
            reentrant: ReentrantLock::new(store.clone()),
            read_write: ReadWriteLock::new(store.clone()),
            fair: FairLock::new(store, settings.fair_queue_ttl, settings.poll_interval),
            poll_interval: settings.poll_interval,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// One attempt, no waiting
    pub async fn try_acquire(
        &self,
        protocol: LockProtocol,
        request: AcquireRequest<'_>,
    ) -> AcquireOutcome {
        match protocol {
            LockProtocol::Reentrant => self.reentrant.attempt(request).await.into(),
            LockProtocol::ReadLock => self.read_write.attempt_read(request).await.into(),
            LockProtocol::WriteLock => self.read_write.attempt_write(request).await.into(),
            LockProtocol::Fair => self.fair.try_acquire(request).await,
        }
    }

    /// Poll until granted or `wait_timeout` elapses
    pub async fn acquire_blocking(
        &self,
        protocol: LockProtocol,
        request: AcquireRequest<'_>,
        wait_timeout: Duration,
        on_contended: impl FnOnce(),
    ) -> AcquireOutcome {
        let interval = self.poll_interval;
        match protocol {
            LockProtocol::Reentrant => {
                poll_until_granted(interval, wait_timeout, on_contended, || {
                    self.reentrant.attempt(request)
                })
                .await
            }
            LockProtocol::ReadLock => {
                poll_until_granted(interval, wait_timeout, on_contended, || {
                    self.read_write.attempt_read(request)
                })
                .await
            }
            LockProtocol::WriteLock => {
                poll_until_granted(interval, wait_timeout, on_contended, || {
                    self.read_write.attempt_write(request)
                })
                .await
            }
            LockProtocol::Fair => {
                self.fair
                    .acquire_blocking(request, wait_timeout, on_contended)
                    .await
            }
        }
    }

    /// Release if `token` is still the holder
    ///
    /// `Ok(false)` means the lease expired or belongs to someone else.
    pub async fn release(
        &self,
        protocol: LockProtocol,
        key: &LockKey,
        token: &OwnerToken,
    ) -> Result<bool, StoreError> {
        match protocol {
            LockProtocol::Reentrant => self.reentrant.release(key, token).await,
            LockProtocol::ReadLock => self.read_write.release_read(key, token).await,
            LockProtocol::WriteLock => self.read_write.release_write(key, token).await,
            LockProtocol::Fair => self.fair.release(key, token).await,
        }
    }
}

/// Store key holding the lock state a protocol grants on
pub fn holder_key(protocol: LockProtocol, key: &LockKey) -> String {
    match protocol {
        LockProtocol::ReadLock => key.readers_key(),
        LockProtocol::Reentrant | LockProtocol::WriteLock | LockProtocol::Fair => key.holder_key(),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
