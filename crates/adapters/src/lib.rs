// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for the shared coordination store and managed resources

pub mod resource;
pub mod store;
pub mod traced;

pub use resource::{NoOpResourceHandler, ResourceError, ResourceHandler};
pub use store::{
    AtomicScript, CoordinationStore, MemoryStore, ScriptReply, StoreError, TimeoutStore,
};
pub use traced::{TracedResourceHandler, TracedStore};

#[cfg(feature = "redis-backend")]
pub use store::RedisStore;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use resource::{FakeResourceHandler, ResourceCall};
#[cfg(any(test, feature = "test-support"))]
pub use store::{FakeStore, StoreCall};
