// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Distributed lock engine
//!
//! Lock primitives over a [`CoordinationStore`](dlm_adapters::CoordinationStore),
//! the [`LockManager`] facade, deadlock detectors, the resource lifecycle
//! manager and the background worker that ties them to a schedule.

pub mod background;
mod deadlock;
mod error;
mod lifecycle;
mod manager;
pub mod primitives;

pub use background::{BackgroundHandle, PassOutcome};
pub use deadlock::{node_snapshot_key, DistributedDeadlockDetector, LocalDeadlockDetector};
pub use error::{LifecycleError, WithLockError};
pub use lifecycle::ResourceLifecycleManager;
pub use manager::{LockManager, LockManagerDeps, LockOptions, ManagedStore};
pub use primitives::{AcquireOutcome, AcquireRequest, LockPrimitives};
