// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic metrics refresh: process memory and the active-task count.
//!
//! Everything else is updated at its event site; this task only samples
//! what cannot be.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use ptc_core::{Metrics, StopSignal};

use crate::watcher::WatcherShared;

/// Refresh interval.
const REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Spawn the refresher task. It exits when the stop signal fires; the
/// returned handle lets the shutdown path join it with a budget.
pub fn spawn_refresher(
    metrics: Metrics,
    watchers: Vec<Arc<WatcherShared>>,
    stop: StopSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REFRESH_INTERVAL);
        loop {
            tokio::select! {
                _ = stop.wait() => break,
                _ = interval.tick() => {
                    metrics.set_memory_mb(resident_memory_mb());
                    let active = watchers.iter().filter(|w| w.is_active()).count() as u64;
                    metrics.set_active_tasks(active);
                }
            }
        }
    })
}

/// Resident set size in MB, from `/proc/self/status` on Linux.
#[cfg(target_os = "linux")]
fn resident_memory_mb() -> u64 {
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        return 0;
    };
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.trim().split_whitespace().next())
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb / 1024)
        .unwrap_or(0)
}

#[cfg(not(target_os = "linux"))]
fn resident_memory_mb() -> u64 {
    0
}

#[cfg(test)]
#[path = "refresher_tests.rs"]
mod tests;
