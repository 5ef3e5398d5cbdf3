// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration for locks, resource lifecycle and deadlock detection
//!
//! Loaded from TOML; every section and field is optional.
//!
//! ```toml
//! [locks]
//! module = "order"
//! default_ttl = "30s"
//! poll_interval = "100ms"
//!
//! [lifecycle]
//! careful_idle = "2h"
//! releasable_idle = "30m"
//! priority_idle = "10m"
//!
//! [deadlock]
//! global_enabled = true
//! sync_interval = "1m"
//! ```

use crate::id::NodeId;
use crate::lifecycle::ReleaseLevel;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DlmConfig {
    pub locks: LockSettings,
    pub lifecycle: LifecycleSettings,
    pub deadlock: DeadlockSettings,
}

impl DlmConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: DlmConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), module = %config.locks.module, "loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.locks.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("locks.poll_interval must be > 0".into()));
        }
        if self.locks.default_ttl.is_zero() {
            return Err(ConfigError::Invalid("locks.default_ttl must be > 0".into()));
        }
        if self.locks.module.is_empty() {
            return Err(ConfigError::Invalid("locks.module must not be empty".into()));
        }
        let l = &self.lifecycle;
        if !(l.careful_idle >= l.releasable_idle && l.releasable_idle >= l.priority_idle) {
            return Err(ConfigError::Invalid(
                "idle thresholds must satisfy careful >= releasable >= priority".into(),
            ));
        }
        if self.deadlock.sync_interval.is_zero() {
            return Err(ConfigError::Invalid("deadlock.sync_interval must be > 0".into()));
        }
        Ok(())
    }

    pub fn with_locks(mut self, locks: LockSettings) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: LifecycleSettings) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn with_deadlock(mut self, deadlock: DeadlockSettings) -> Self {
        self.deadlock = deadlock;
        self
    }
}

/// Lock acquisition settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    /// Module namespace prepended to every lock key
    pub module: String,
    /// Identity of this process; generated when absent
    pub node_id: Option<NodeId>,
    /// Lease used when callers do not pass one
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,
    /// Wait budget used by blocking acquisition when callers do not pass one
    #[serde(with = "humantime_serde")]
    pub default_wait_timeout: Duration,
    /// Sleep between attempts while waiting
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Upper bound on any single store call
    #[serde(with = "humantime_serde")]
    pub store_timeout: Duration,
    /// TTL of the fair-lock wait queue, refreshed on every enqueue
    #[serde(with = "humantime_serde")]
    pub fair_queue_ttl: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            module: "default".to_string(),
            node_id: None,
            default_ttl: Duration::from_secs(30),
            default_wait_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
            store_timeout: Duration::from_secs(3),
            fair_queue_ttl: Duration::from_secs(60),
        }
    }
}

impl LockSettings {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            ..Self::default()
        }
    }

    pub fn with_node_id(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_default_wait_timeout(mut self, timeout: Duration) -> Self {
        self.default_wait_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_fair_queue_ttl(mut self, ttl: Duration) -> Self {
        self.fair_queue_ttl = ttl;
        self
    }
}

/// Resource lifecycle settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleSettings {
    /// How often the idle scan runs
    #[serde(with = "humantime_serde")]
    pub scan_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub careful_idle: Duration,
    #[serde(with = "humantime_serde")]
    pub releasable_idle: Duration,
    #[serde(with = "humantime_serde")]
    pub priority_idle: Duration,
    /// Recoveries slower than this are logged as missing the fast-path target
    #[serde(with = "humantime_serde")]
    pub fast_recovery_target: Duration,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(60),
            careful_idle: Duration::from_secs(2 * 60 * 60),
            releasable_idle: Duration::from_secs(30 * 60),
            priority_idle: Duration::from_secs(10 * 60),
            fast_recovery_target: Duration::from_millis(100),
        }
    }
}

impl LifecycleSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Set the idle threshold for one release level; `Never` is ignored
    pub fn with_idle_threshold(mut self, level: ReleaseLevel, threshold: Duration) -> Self {
        match level {
            ReleaseLevel::Never => {}
            ReleaseLevel::Careful => self.careful_idle = threshold,
            ReleaseLevel::Releasable => self.releasable_idle = threshold,
            ReleaseLevel::Priority => self.priority_idle = threshold,
        }
        self
    }

    pub fn with_fast_recovery_target(mut self, target: Duration) -> Self {
        self.fast_recovery_target = target;
        self
    }

    /// Idle time after which a resource at `level` may be released
    pub fn idle_threshold(&self, level: ReleaseLevel) -> Option<Duration> {
        match level {
            ReleaseLevel::Never => None,
            ReleaseLevel::Careful => Some(self.careful_idle),
            ReleaseLevel::Releasable => Some(self.releasable_idle),
            ReleaseLevel::Priority => Some(self.priority_idle),
        }
    }
}

/// Distributed deadlock detection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadlockSettings {
    /// Whether global detection runs at startup; toggleable at runtime
    pub global_enabled: bool,
    /// How often local edges are published and the global graph is scanned
    #[serde(with = "humantime_serde")]
    pub sync_interval: Duration,
    /// Lifetime of a published snapshot; stale nodes drop out of the merge
    #[serde(with = "humantime_serde")]
    pub snapshot_ttl: Duration,
}

impl Default for DeadlockSettings {
    fn default() -> Self {
        Self {
            global_enabled: true,
            sync_interval: Duration::from_secs(60),
            snapshot_ttl: Duration::from_secs(180),
        }
    }
}

impl DeadlockSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_global_enabled(mut self, enabled: bool) -> Self {
        self.global_enabled = enabled;
        self
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn with_snapshot_ttl(mut self, ttl: Duration) -> Self {
        self.snapshot_ttl = ttl;
        self
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
