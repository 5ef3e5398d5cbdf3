// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background coordination worker
//!
//! Drives the idle scan and deadlock sync/scan passes off a [`Schedule`].
//! The worker wakes every tick, fires whatever the schedule says is due
//! and exits when its handle is shut down or dropped.

use crate::manager::LockManager;
use dlm_adapters::{CoordinationStore, ResourceHandler};
use dlm_core::{Clock, DeadlockCycle, IdGen, ResourceType, Schedule, ScheduledKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// What one background pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    IdleScan { released: Vec<ResourceType> },
    DeadlockSync { published: bool },
    DeadlockScan { cycles: Vec<DeadlockCycle> },
}

/// Run a single pass of `kind` against `manager`
pub async fn run_once<S, H, C, I>(
    manager: &LockManager<S, H, C, I>,
    kind: ScheduledKind,
) -> PassOutcome
where
    S: CoordinationStore,
    H: ResourceHandler,
    C: Clock,
    I: IdGen,
{
    match kind {
        ScheduledKind::IdleScan => PassOutcome::IdleScan {
            released: manager.scan_idle_resources().await,
        },
        ScheduledKind::DeadlockSync => PassOutcome::DeadlockSync {
            published: manager.sync_local_state_to_global().await,
        },
        ScheduledKind::DeadlockScan => PassOutcome::DeadlockScan {
            cycles: manager.detect_global_deadlocks().await,
        },
    }
}

/// Handle to a running background worker
pub struct BackgroundHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl BackgroundHandle {
    /// Stop the worker and wait for its current pass to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "background worker ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn the worker on the current runtime
///
/// `tick` bounds how late a due pass may fire. Must be called from within
/// a tokio runtime.
pub fn spawn<S, H, C, I>(manager: Arc<LockManager<S, H, C, I>>, tick: Duration) -> BackgroundHandle
where
    S: CoordinationStore,
    H: ResourceHandler,
    C: Clock,
    I: IdGen,
{
    let (shutdown, mut stop) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut schedule = Schedule::new();
        schedule.init_defaults(manager.config(), manager.clock());
        tracing::info!(node = %manager.node_id(), tick_ms = tick.as_millis() as u64, "background worker started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(tick) => {
                    for item in schedule.poll(manager.clock().now()) {
                        let outcome = run_once(&manager, item.kind).await;
                        tracing::trace!(pass = %item.kind, ?outcome, "background pass done");
                    }
                }
                changed = stop.changed() => {
                    // A dropped handle counts as a shutdown request
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!(node = %manager.node_id(), "background worker stopped");
    });
    BackgroundHandle { shutdown, task }
}

#[cfg(test)]
#[path = "background_tests.rs"]
mod tests;
