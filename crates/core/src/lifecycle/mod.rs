// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource lifecycle state: release tiers, idle tracking and recovery records
//!
//! - **ResourceRegistry** - per-type availability and idle bookkeeping
//! - **RecoveryTracker** - per-type recovery timing
//!
//! Both are pure; the engine owns them behind a mutex and drives them from
//! its idle scan and recovery paths.

mod recovery;
mod resource;

pub use recovery::{RecoveryPath, RecoveryRecord, RecoverySnapshot, RecoveryTracker};
pub use resource::{
    ReleaseLevel, ResourceRecord, ResourceRegistry, ResourceSnapshot, ResourceState, ResourceType,
};
