// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the lock engine

use dlm_core::ResourceType;
use thiserror::Error;

/// Errors from the resource lifecycle manager
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("resource unavailable: {resource}: {reason}")]
    ResourceUnavailable {
        resource: ResourceType,
        reason: String,
    },
}

/// Errors from [`LockManager::execute_with_lock`](crate::LockManager::execute_with_lock)
#[derive(Debug, Error)]
pub enum WithLockError<E> {
    #[error("lock {name} on {key} not acquired")]
    NotAcquired { name: String, key: String },
    /// The action ran and failed; the lock has already been released
    #[error("action failed under lock: {0}")]
    Action(E),
}

impl<E> WithLockError<E> {
    pub fn is_not_acquired(&self) -> bool {
        matches!(self, WithLockError::NotAcquired { .. })
    }

    /// The action's own error, if the action ran
    pub fn into_action(self) -> Option<E> {
        match self {
            WithLockError::Action(e) => Some(e),
            WithLockError::NotAcquired { .. } => None,
        }
    }
}
