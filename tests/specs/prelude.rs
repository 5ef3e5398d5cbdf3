//! Shared helpers for specs
//!
//! A [`Cluster`] is one fake coordination store; each [`Cluster::node`] is a
//! separate lock manager with its own node id talking to it.

#![allow(dead_code)]

pub use dlm_adapters::{
    FakeResourceHandler, FakeStore, MemoryStore, NoOpResourceHandler, ResourceCall,
};
pub use dlm_core::{
    CallerId, DlmConfig, FakeClock, LockProtocol, LockSettings, RecoveryPath, ResourceType,
    SequentialIdGen, SystemClock, UuidIdGen,
};
pub use dlm_engine::{LockManager, LockManagerDeps, LockOptions, WithLockError};
pub use std::sync::Arc;
pub use std::time::Duration;

pub type Node = LockManager<FakeStore, FakeResourceHandler, FakeClock, SequentialIdGen>;

pub const MODULE: &str = "specs";

/// Nodes sharing one store and one clock
pub struct Cluster {
    store: FakeStore,
}

impl Cluster {
    pub fn new() -> Self {
        Self {
            store: FakeStore::new(),
        }
    }

    pub fn store(&self) -> &FakeStore {
        &self.store
    }

    /// Move the shared clock, expiring leases and snapshots
    pub fn advance(&self, duration: Duration) {
        self.store.advance(duration);
    }

    pub fn node(&self, id: &str) -> Arc<Node> {
        self.node_with(id, FakeResourceHandler::new())
    }

    pub fn node_with(&self, id: &str, handler: FakeResourceHandler) -> Arc<Node> {
        let manager = LockManager::new(
            LockManagerDeps {
                store: self.store.clone(),
                handler,
                clock: self.store.clock().clone(),
                id_gen: SequentialIdGen::new(id),
            },
            config(id),
        )
        .unwrap();
        Arc::new(manager)
    }
}

/// Short polling so blocking specs run quickly
pub fn config(node: &str) -> DlmConfig {
    DlmConfig::default().with_locks(
        LockSettings::new(MODULE)
            .with_node_id(dlm_core::NodeId::new(node))
            .with_poll_interval(Duration::from_millis(2))
            .with_default_wait_timeout(Duration::from_secs(5)),
    )
}

pub fn caller(name: &str) -> CallerId {
    CallerId::new(name)
}

pub fn wait_for(protocol: LockProtocol, wait: Duration) -> LockOptions {
    LockOptions::new(protocol).with_wait_timeout(wait)
}
