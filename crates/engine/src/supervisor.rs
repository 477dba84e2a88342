// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watcher supervisor: starts one task per distinct folder and enforces the
//! shutdown budget.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{info, warn};

use ptc_core::{FolderStatus, Metrics, Registry, StopSignal};
use ptc_storage::Ledger;

use crate::env;
use crate::executor::CommandExecutor;
use crate::watcher::{FolderWatcher, WatcherShared};

/// Per-task join budget during shutdown.
const JOIN_BUDGET: Duration = Duration::from_secs(1);

/// Wall-clock budget for stopping all watchers.
const STOP_ALL_BUDGET: Duration = Duration::from_secs(3);

struct WatcherHandle {
    shared: Arc<WatcherShared>,
    task: JoinHandle<()>,
}

/// Outcome of `stop_all`: tasks that exited within budget vs. detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopReport {
    pub stopped: usize,
    pub orphaned: usize,
}

/// Owns the set of folder watcher tasks.
pub struct Supervisor {
    registry: Arc<Registry>,
    ledger: Arc<Ledger>,
    metrics: Metrics,
    stop: StopSignal,
    watchers: Vec<WatcherHandle>,
}

impl Supervisor {
    pub fn new(
        registry: Arc<Registry>,
        ledger: Arc<Ledger>,
        metrics: Metrics,
        stop: StopSignal,
    ) -> Self {
        Self {
            registry,
            ledger,
            metrics,
            stop,
            watchers: Vec::new(),
        }
    }

    /// Spawn one watcher per distinct folder, creating missing folders
    /// first. Starts are staggered to smooth the registration burst.
    pub async fn start_all(&mut self) {
        let executor = CommandExecutor::new(
            Arc::clone(&self.ledger),
            self.metrics.clone(),
            self.stop.clone(),
        );

        let groups: Vec<_> = self.registry.folder_groups().to_vec();
        let group_count = groups.len();
        for (i, group) in groups.into_iter().enumerate() {
            if self.stop.is_set() {
                return;
            }

            if let Err(e) = std::fs::create_dir_all(&group.path) {
                warn!(folder = %group.path, error = %e, "cannot create watched folder");
                self.metrics.record_error();
                self.metrics
                    .activity(format!("Folder inaccessible: {}", group.path));
                continue;
            }

            let shared = WatcherShared::new(&group.path);
            let watcher = FolderWatcher {
                shared: Arc::clone(&shared),
                registry: Arc::clone(&self.registry),
                ledger: Arc::clone(&self.ledger),
                executor: executor.clone(),
                metrics: self.metrics.clone(),
                stop: self.stop.clone(),
            };

            info!(folder = %group.path, rules = group.rule_indices.len(), "starting watcher");
            let task = tokio::spawn(watcher.run());
            self.watchers.push(WatcherHandle { shared, task });

            if i + 1 < group_count && self.stop.wait_timeout(env::stagger_ms()).await {
                return;
            }
        }
    }

    /// Two-phase stop. Phase A asks every watcher to exit; phase B joins
    /// each with a bounded budget and detaches any task that overruns.
    pub async fn stop_all(&mut self) -> StopReport {
        for handle in &self.watchers {
            handle.shared.request_stop();
        }

        let deadline = Instant::now() + STOP_ALL_BUDGET;
        let mut report = StopReport {
            stopped: 0,
            orphaned: 0,
        };

        for mut handle in self.watchers.drain(..) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                if handle.task.is_finished() {
                    report.stopped += 1;
                } else {
                    warn!(folder = %handle.shared.folder(), "stop budget exhausted, detaching watcher");
                    report.orphaned += 1;
                }
                continue;
            }

            match tokio::time::timeout(remaining.min(JOIN_BUDGET), &mut handle.task).await {
                Ok(_) => report.stopped += 1,
                Err(_) => {
                    warn!(folder = %handle.shared.folder(), "watcher missed join budget, detaching");
                    report.orphaned += 1;
                }
            }
        }

        info!(
            stopped = report.stopped,
            orphaned = report.orphaned,
            "watchers stopped"
        );
        report
    }

    /// Snapshot rows for the metrics endpoint.
    pub fn folder_statuses(&self) -> Vec<FolderStatus> {
        self.watchers.iter().map(|h| h.shared.status()).collect()
    }

    /// Shared watcher state for the metrics refresher.
    pub fn watcher_shareds(&self) -> Vec<Arc<WatcherShared>> {
        self.watchers
            .iter()
            .map(|h| Arc::clone(&h.shared))
            .collect()
    }

    pub fn active_count(&self) -> u64 {
        self.watchers
            .iter()
            .filter(|h| h.shared.is_active())
            .count() as u64
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
