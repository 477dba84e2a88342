// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide counters, per-rule statistics, and the recent-activity ring.
//!
//! Scalar counters are atomics updated at their event sites; the per-rule
//! stats and the activity ring sit behind their own mutexes. The HTTP
//! endpoint renders a [`MetricsSnapshot`] from this handle without touching
//! any other core state. Each field is independently consistent; cross-field
//! atomicity is not promised.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use parking_lot::Mutex;
use serde::Serialize;

use crate::pattern::Registry;

/// Bounded size of the recent-activity ring.
const ACTIVITY_RING_SIZE: usize = 20;

/// Cloneable handle to the process-wide metrics.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<Inner>,
}

struct Inner {
    start: Instant,
    total_files_processed: AtomicU64,
    files_processed_today: AtomicU64,
    commands_executed: AtomicU64,
    errors_count: AtomicU64,
    active_tasks: AtomicU64,
    memory_mb: AtomicU64,
    avg: Mutex<ProcessingAvg>,
    last_processed: Mutex<Option<Instant>>,
    today: Mutex<NaiveDate>,
    rules: Mutex<Vec<RuleStats>>,
    activity: Mutex<VecDeque<(String, Instant)>>,
}

#[derive(Default)]
struct ProcessingAvg {
    samples: u64,
    avg_ms: u64,
}

/// Per-rule counters plus the static rule description for rendering.
#[derive(Debug, Clone)]
struct RuleStats {
    name: String,
    folder: String,
    regex: String,
    match_count: u64,
    execution_count: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                start: Instant::now(),
                total_files_processed: AtomicU64::new(0),
                files_processed_today: AtomicU64::new(0),
                commands_executed: AtomicU64::new(0),
                errors_count: AtomicU64::new(0),
                active_tasks: AtomicU64::new(0),
                memory_mb: AtomicU64::new(0),
                avg: Mutex::new(ProcessingAvg::default()),
                last_processed: Mutex::new(None),
                today: Mutex::new(Local::now().date_naive()),
                rules: Mutex::new(Vec::new()),
                activity: Mutex::new(VecDeque::with_capacity(ACTIVITY_RING_SIZE)),
            }),
        }
    }

    /// Seed per-rule stats from the registry (declaration order is kept for
    /// the snapshot's `patterns` array).
    pub fn register_rules(&self, registry: &Registry) {
        let mut rules = self.inner.rules.lock();
        rules.clear();
        rules.extend(registry.rules().iter().map(|r| RuleStats {
            name: r.name.clone(),
            folder: r.folder.clone(),
            regex: r.regex.clone(),
            match_count: 0,
            execution_count: 0,
        }));
    }

    pub fn record_rule_match(&self, rule_idx: usize) {
        if let Some(stats) = self.inner.rules.lock().get_mut(rule_idx) {
            stats.match_count += 1;
        }
    }

    pub fn record_rule_execution(&self, rule_idx: usize) {
        if let Some(stats) = self.inner.rules.lock().get_mut(rule_idx) {
            stats.execution_count += 1;
        }
    }

    pub fn record_command_executed(&self) {
        self.inner.commands_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.inner.errors_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a file as processed: bumps the total, the per-day counter
    /// (resetting it across a date change), and the last-activity instant.
    pub fn note_file_processed(&self) {
        self.inner
            .total_files_processed
            .fetch_add(1, Ordering::Relaxed);

        let today = Local::now().date_naive();
        let mut last_day = self.inner.today.lock();
        if *last_day != today {
            *last_day = today;
            self.inner.files_processed_today.store(0, Ordering::Relaxed);
        }
        self.inner
            .files_processed_today
            .fetch_add(1, Ordering::Relaxed);

        *self.inner.last_processed.lock() = Some(Instant::now());
    }

    /// Fold one execution's elapsed time into the running average.
    pub fn record_processing_time(&self, elapsed: Duration) {
        let mut avg = self.inner.avg.lock();
        let sample = elapsed.as_millis() as u64;
        avg.avg_ms = (avg.avg_ms * avg.samples + sample) / (avg.samples + 1);
        avg.samples += 1;
    }

    pub fn set_memory_mb(&self, mb: u64) {
        self.inner.memory_mb.store(mb, Ordering::Relaxed);
    }

    pub fn set_active_tasks(&self, count: u64) {
        self.inner.active_tasks.store(count, Ordering::Relaxed);
    }

    /// Append a line to the bounded recent-activity ring (newest first).
    pub fn activity(&self, message: impl Into<String>) {
        let mut ring = self.inner.activity.lock();
        ring.push_front((message.into(), Instant::now()));
        ring.truncate(ACTIVITY_RING_SIZE);
    }

    pub fn errors_count(&self) -> u64 {
        self.inner.errors_count.load(Ordering::Relaxed)
    }

    pub fn commands_executed(&self) -> u64 {
        self.inner.commands_executed.load(Ordering::Relaxed)
    }

    pub fn total_files_processed(&self) -> u64 {
        self.inner.total_files_processed.load(Ordering::Relaxed)
    }

    /// Render the JSON-facing snapshot. Folder rows come from the caller
    /// (the supervisor owns watcher state); everything else lives here.
    pub fn snapshot(&self, folders: Vec<FolderStatus>, web_server_running: bool) -> MetricsSnapshot {
        let last_activity_seconds = self
            .inner
            .last_processed
            .lock()
            .map(|at| at.elapsed().as_secs() as i64)
            .unwrap_or(-1);

        let patterns = self
            .inner
            .rules
            .lock()
            .iter()
            .map(|r| PatternStatus {
                name: r.name.clone(),
                folder: r.folder.clone(),
                regex: r.regex.clone(),
                match_count: r.match_count,
                execution_count: r.execution_count,
            })
            .collect::<Vec<_>>();

        let recent_activity = self
            .inner
            .activity
            .lock()
            .iter()
            .map(|(message, at)| ActivityItem {
                message: message.clone(),
                timestamp: at.elapsed().as_secs(),
            })
            .collect();

        MetricsSnapshot {
            total_files_processed: self.inner.total_files_processed.load(Ordering::Relaxed),
            files_processed_today: self.inner.files_processed_today.load(Ordering::Relaxed),
            active_threads: self.inner.active_tasks.load(Ordering::Relaxed),
            memory_usage_mb: self.inner.memory_mb.load(Ordering::Relaxed),
            average_processing_time: self.inner.avg.lock().avg_ms,
            commands_executed: self.inner.commands_executed.load(Ordering::Relaxed),
            errors_count: self.inner.errors_count.load(Ordering::Relaxed),
            uptime_seconds: self.inner.start.elapsed().as_secs(),
            last_activity_seconds,
            folders_monitored: folders.len(),
            patterns_configured: patterns.len(),
            web_server_running,
            folders,
            patterns,
            recent_activity,
        }
    }
}

/// One watched folder's row in the snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderStatus {
    pub path: String,
    pub active: bool,
    pub files_detected: u64,
    pub files_processed: u64,
}

/// One rule's row in the snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternStatus {
    pub name: String,
    pub folder: String,
    pub regex: String,
    pub match_count: u64,
    pub execution_count: u64,
}

/// One recent-activity line; `timestamp` is seconds since the event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub message: String,
    pub timestamp: u64,
}

/// The `/api/metrics` payload. Field names are part of the HTTP contract.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_files_processed: u64,
    pub files_processed_today: u64,
    pub active_threads: u64,
    #[serde(rename = "memoryUsageMB")]
    pub memory_usage_mb: u64,
    pub average_processing_time: u64,
    pub commands_executed: u64,
    pub errors_count: u64,
    pub uptime_seconds: u64,
    /// `-1` until the first file has been processed.
    pub last_activity_seconds: i64,
    pub folders_monitored: usize,
    pub patterns_configured: usize,
    pub web_server_running: bool,
    pub folders: Vec<FolderStatus>,
    pub patterns: Vec<PatternStatus>,
    pub recent_activity: Vec<ActivityItem>,
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
