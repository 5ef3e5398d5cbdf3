// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op resource handler for deployments without managed resources.

use super::{ResourceError, ResourceHandler};
use async_trait::async_trait;
use dlm_core::ResourceType;

/// Resource handler that does nothing and always recovers on the fast path.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpResourceHandler;

impl NoOpResourceHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResourceHandler for NoOpResourceHandler {
    async fn cleanup(&self, _resource: ResourceType) -> Result<(), ResourceError> {
        Ok(())
    }

    async fn fast_recover(&self, _resource: ResourceType) -> Result<bool, ResourceError> {
        Ok(true)
    }

    async fn standard_recover(&self, _resource: ResourceType) -> Result<(), ResourceError> {
        Ok(())
    }
}
