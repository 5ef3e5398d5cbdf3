// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dlm-core: building blocks for distributed lock coordination
//!
//! This crate provides:
//! - Identities and owner tokens for lock ownership
//! - Lock keys, protocols and handles
//! - Process-local reentrancy counting
//! - Wait-for graphs with cycle search for deadlock detection
//! - Performance counters
//! - Resource release tiers, idle tracking and recovery records
//! - Configuration and the background schedule
//!
//! Everything here is synchronous and free of I/O; the engine crate drives it.

pub mod clock;
pub mod config;
pub mod deadlock;
pub mod id;
pub mod key;
pub mod lifecycle;
pub mod monitor;
pub mod reentrancy;
pub mod schedule;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, DeadlockSettings, DlmConfig, LifecycleSettings, LockSettings};
pub use deadlock::{DeadlockCycle, GraphNode, GraphSnapshot, WaitForEdge, WaitForGraph};
pub use id::{CallerId, IdGen, NodeId, OwnerId, OwnerToken, SequentialIdGen, UuidIdGen};
pub use key::{LockHandle, LockKey, LockProtocol};
pub use lifecycle::{
    RecoveryPath, RecoveryRecord, RecoverySnapshot, RecoveryTracker, ReleaseLevel,
    ResourceRecord, ResourceRegistry, ResourceSnapshot, ResourceState, ResourceType,
};
pub use monitor::{AcquireFailure, LockStats, PerformanceMonitor, WaitHistogram};
pub use reentrancy::{LocalRelease, ReentrancyCounter};
pub use schedule::{Schedule, ScheduledItem, ScheduledKind};
