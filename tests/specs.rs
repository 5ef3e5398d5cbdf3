//! Behavioral specifications for the lock coordination subsystem.
//!
//! These tests drive whole lock managers as separate nodes sharing one
//! coordination store, and check the guarantees callers rely on.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// locks/
#[path = "specs/locks/exclusion.rs"]
mod locks_exclusion;
#[path = "specs/locks/fairness.rs"]
mod locks_fairness;
#[path = "specs/locks/reentrancy.rs"]
mod locks_reentrancy;

// deadlock/
#[path = "specs/deadlock/detection.rs"]
mod deadlock_detection;

// lifecycle/
#[path = "specs/lifecycle/recovery.rs"]
mod lifecycle_recovery;
