// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource handler adapters
//!
//! The lifecycle manager decides *when* a resource class is released or
//! recovered; a handler does the actual work (closing pools, flushing
//! caches, reconnecting).

mod noop;

pub use noop::NoOpResourceHandler;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeResourceHandler, ResourceCall};

use async_trait::async_trait;
use dlm_core::ResourceType;
use thiserror::Error;

/// Errors from resource handlers
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceError {
    #[error("cleanup of {resource} failed: {reason}")]
    CleanupFailed {
        resource: ResourceType,
        reason: String,
    },
    #[error("recovery of {resource} failed: {reason}")]
    RecoveryFailed {
        resource: ResourceType,
        reason: String,
    },
}

/// Adapter that releases and restores one class of resource
#[async_trait]
pub trait ResourceHandler: Clone + Send + Sync + 'static {
    /// Free the resources of an idle class
    async fn cleanup(&self, resource: ResourceType) -> Result<(), ResourceError>;

    /// Cheap recovery attempt (warm standby, cached handles)
    ///
    /// `Ok(false)` means the fast path did not apply and the standard path
    /// should run.
    async fn fast_recover(&self, resource: ResourceType) -> Result<bool, ResourceError>;

    /// Full reinitialisation
    async fn standard_recover(&self, resource: ResourceType) -> Result<(), ResourceError>;
}
