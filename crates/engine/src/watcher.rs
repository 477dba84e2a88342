// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-folder watcher task: initial scan plus the continuous change loop.
//!
//! Each task owns its `notify` watch handle exclusively. The loop never
//! blocks for more than a second at a time, so the stop signal and the
//! supervisor's `stop_requested` flag are observed promptly; the handle is
//! released when the task exits.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use ptc_core::{FolderStatus, Metrics, Registry, StopSignal};
use ptc_storage::Ledger;

use crate::env;
use crate::executor::{CommandExecutor, ExecOutcome};

/// Consecutive abort-class watch errors tolerated before the watcher
/// assumes it is being torn down and exits.
const MAX_CONSECUTIVE_ABORT_ERRORS: u32 = 3;

/// Watcher lifecycle. Only `Running -> Stopping` is externally triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WatcherPhase {
    Starting = 0,
    Running = 1,
    Stopping = 2,
    Exited = 3,
}

/// State shared between a watcher task, the supervisor, and the metrics
/// refresher. Everything here is atomic; the task owns the rest.
pub struct WatcherShared {
    folder: String,
    phase: AtomicU8,
    stop_requested: AtomicBool,
    stop_wake: Notify,
    files_detected: AtomicU64,
    files_processed: AtomicU64,
}

impl WatcherShared {
    pub fn new(folder: &str) -> Arc<Self> {
        Arc::new(Self {
            folder: folder.to_string(),
            phase: AtomicU8::new(WatcherPhase::Starting as u8),
            stop_requested: AtomicBool::new(false),
            stop_wake: Notify::new(),
            files_detected: AtomicU64::new(0),
            files_processed: AtomicU64::new(0),
        })
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn phase(&self) -> WatcherPhase {
        match self.phase.load(Ordering::SeqCst) {
            0 => WatcherPhase::Starting,
            1 => WatcherPhase::Running,
            2 => WatcherPhase::Stopping,
            _ => WatcherPhase::Exited,
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase() == WatcherPhase::Running
    }

    /// Ask the task to exit (supervisor phase A). Wakes the task's loop
    /// immediately so a blocked wait never outlives the join budget.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        if self.phase.load(Ordering::SeqCst) == WatcherPhase::Running as u8 {
            self.phase
                .store(WatcherPhase::Stopping as u8, Ordering::SeqCst);
        }
        self.stop_wake.notify_waiters();
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Latched wait on `stop_requested`.
    pub(crate) async fn stop_requested_wait(&self) {
        loop {
            let notified = self.stop_wake.notified();
            if self.stop_requested() {
                return;
            }
            notified.await;
        }
    }

    pub fn files_detected(&self) -> u64 {
        self.files_detected.load(Ordering::SeqCst)
    }

    pub fn files_processed(&self) -> u64 {
        self.files_processed.load(Ordering::SeqCst)
    }

    /// Row for the metrics snapshot.
    pub fn status(&self) -> FolderStatus {
        FolderStatus {
            path: self.folder.clone(),
            active: self.is_active(),
            files_detected: self.files_detected(),
            files_processed: self.files_processed(),
        }
    }

    pub(crate) fn set_phase(&self, phase: WatcherPhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
    }
}

/// One folder's watcher task.
pub(crate) struct FolderWatcher {
    pub(crate) shared: Arc<WatcherShared>,
    pub(crate) registry: Arc<Registry>,
    pub(crate) ledger: Arc<Ledger>,
    pub(crate) executor: CommandExecutor,
    pub(crate) metrics: Metrics,
    pub(crate) stop: StopSignal,
}

/// Whether the current event's remaining work should be abandoned.
enum Flow {
    Continue,
    Abandon,
}

impl FolderWatcher {
    /// Task body: scan existing files, then watch for changes until told
    /// to stop or the watch becomes unrecoverable.
    pub(crate) async fn run(self) {
        let folder = PathBuf::from(self.shared.folder());

        self.initial_scan(&folder).await;

        if self.should_exit() {
            self.finish();
            return;
        }

        let (tx, mut rx) = mpsc::channel(256);
        let Some(_watch_guard) = self.register_watch(&folder, tx).await else {
            self.finish();
            return;
        };

        self.shared.set_phase(WatcherPhase::Running);
        info!(folder = %folder.display(), "watcher running");
        self.metrics.activity(format!("Watching {}", folder.display()));

        let mut consecutive_aborts: u32 = 0;
        loop {
            if self.should_exit() {
                break;
            }

            tokio::select! {
                _ = self.stop.wait() => break,

                _ = self.shared.stop_requested_wait() => break,

                received = rx.recv() => match received {
                    None => {
                        warn!(folder = %folder.display(), "watch channel closed");
                        break;
                    }
                    Some(Ok(event)) => {
                        consecutive_aborts = 0;
                        if let Flow::Abandon = self.handle_batch(&folder, event, &mut rx).await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(
                            folder = %folder.display(),
                            error = %e,
                            abort_class = is_abort_class(&e),
                            "watch error"
                        );
                        self.metrics.record_error();
                        match classify_watch_error(&mut consecutive_aborts, &e) {
                            WatchErrorAction::Exit => {
                                // Repeated invalid-handle or access-denied
                                // codes mean the watch is being torn down.
                                break;
                            }
                            WatchErrorAction::Retry => {
                                if self.stop.wait_timeout(env::watch_retry_ms()).await {
                                    break;
                                }
                            }
                        }
                    }
                },

                // Bounded wait so stop_requested is re-checked promptly.
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            }
        }

        // The watch handle drops here, releasing the platform registration.
        self.finish();
        info!(folder = %folder.display(), "watcher exited");
    }

    fn should_exit(&self) -> bool {
        self.stop.is_set() || self.shared.stop_requested()
    }

    fn finish(&self) {
        self.shared.set_phase(WatcherPhase::Exited);
        self.metrics
            .activity(format!("Stopped watching {}", self.shared.folder()));
    }

    /// Enumerate regular files already in the folder and run matching rules
    /// for any not yet in the ledger.
    async fn initial_scan(&self, folder: &Path) {
        let entries = match std::fs::read_dir(folder) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(folder = %folder.display(), error = %e, "initial scan failed");
                self.metrics.record_error();
                return;
            }
        };

        for entry in entries.flatten() {
            if self.should_exit() {
                return;
            }
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name();
            let Some(filename) = name.to_str() else {
                debug!(folder = %folder.display(), "skipping non-UTF-8 filename");
                continue;
            };
            if let Flow::Abandon = self.process_file(folder, filename).await {
                return;
            }
        }
    }

    /// Register the platform watch. Transient failures (a slow-mounting
    /// path, a momentary descriptor shortage) retry forever; only repeated
    /// abort-class failures give the folder up.
    async fn register_watch(
        &self,
        folder: &Path,
        tx: mpsc::Sender<Result<notify::Event, notify::Error>>,
    ) -> Option<RecommendedWatcher> {
        let mut consecutive_aborts: u32 = 0;
        loop {
            match create_watcher(folder, tx.clone()) {
                Ok(watcher) => return Some(watcher),
                Err(e) => {
                    warn!(
                        folder = %folder.display(),
                        error = %e,
                        abort_class = is_abort_class(&e),
                        "watch registration failed"
                    );
                    self.metrics.record_error();
                    if let WatchErrorAction::Exit = classify_watch_error(&mut consecutive_aborts, &e)
                    {
                        self.metrics
                            .activity(format!("Folder inaccessible: {}", folder.display()));
                        return None;
                    }
                    if self.stop.wait_timeout(env::watch_retry_ms()).await
                        || self.shared.stop_requested()
                    {
                        return None;
                    }
                }
            }
        }
    }

    /// Debounce once, drain the channel into one batch, then process each
    /// relevant filename in arrival order.
    async fn handle_batch(
        &self,
        folder: &Path,
        first: notify::Event,
        rx: &mut mpsc::Receiver<Result<notify::Event, notify::Error>>,
    ) -> Flow {
        // One debounce per batch, not per file: give writers time to close.
        if self.stop.wait_timeout(env::debounce_ms()).await {
            return Flow::Abandon;
        }

        let mut filenames = relevant_filenames(&first);
        while let Ok(received) = rx.try_recv() {
            match received {
                Ok(event) => filenames.extend(relevant_filenames(&event)),
                Err(e) => {
                    debug!(folder = %folder.display(), error = %e, "watch error in batch");
                    self.metrics.record_error();
                }
            }
        }

        // Coalesced notifications repeat names; keep first occurrence order.
        let mut seen = std::collections::HashSet::new();
        filenames.retain(|name| seen.insert(name.clone()));

        for filename in filenames {
            self.shared.files_detected.fetch_add(1, Ordering::SeqCst);
            if let Flow::Abandon = self.process_file(folder, &filename).await {
                return Flow::Abandon;
            }
        }
        Flow::Continue
    }

    /// Match one filename against this folder's rules and execute each
    /// matching rule in declaration order.
    async fn process_file(&self, folder: &Path, filename: &str) -> Flow {
        let matches = self.registry.matches(filename, self.shared.folder());
        if matches.is_empty() {
            return Flow::Continue;
        }
        for &idx in &matches {
            self.metrics.record_rule_match(idx);
        }

        let path = folder.join(filename);
        if path.is_dir() {
            return Flow::Continue;
        }
        let file_path = path.display().to_string();

        if self.ledger.contains(&file_path) {
            debug!(file = %file_path, "in ledger, skipping");
            return Flow::Continue;
        }

        info!(file = %file_path, rules = matches.len(), "file matched");
        let mut processed = false;
        for idx in matches {
            let Some(rule) = self.registry.rule(idx) else {
                continue;
            };
            match self.executor.execute(rule, idx, &file_path).await {
                ExecOutcome::Cancelled => {
                    // Remaining rules for this event are skipped.
                    return Flow::Abandon;
                }
                ExecOutcome::Ok { .. } | ExecOutcome::TimeoutOk => processed = true,
                _ => {}
            }
        }
        if processed {
            self.shared.files_processed.fetch_add(1, Ordering::SeqCst);
        }
        Flow::Continue
    }
}

/// What to do after a watch error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchErrorAction {
    Retry,
    Exit,
}

/// Decide the response to one watch error. Transient errors retry after a
/// delay indefinitely and reset the abort streak; abort-class errors exit
/// once [`MAX_CONSECUTIVE_ABORT_ERRORS`] of them arrive back to back.
fn classify_watch_error(consecutive_aborts: &mut u32, error: &notify::Error) -> WatchErrorAction {
    if is_abort_class(error) {
        *consecutive_aborts += 1;
        if *consecutive_aborts >= MAX_CONSECUTIVE_ABORT_ERRORS {
            return WatchErrorAction::Exit;
        }
    } else {
        *consecutive_aborts = 0;
    }
    WatchErrorAction::Retry
}

/// Abort-class means the handle or the folder itself is gone: the watch was
/// removed, the path no longer exists, or access was denied. Anything else
/// (queue overflow, descriptor pressure, generic backend hiccups) is
/// transient and worth retrying.
fn is_abort_class(error: &notify::Error) -> bool {
    match &error.kind {
        notify::ErrorKind::PathNotFound | notify::ErrorKind::WatchNotFound => true,
        notify::ErrorKind::Io(io) => matches!(
            io.kind(),
            std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::NotFound
        ),
        _ => false,
    }
}

/// Create a non-recursive watch on `folder`, bridging notify's callback
/// thread into the task's channel.
fn create_watcher(
    folder: &Path,
    tx: mpsc::Sender<Result<notify::Event, notify::Error>>,
) -> Result<RecommendedWatcher, notify::Error> {
    let mut watcher =
        notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
            let _ = tx.blocking_send(res);
        })?;
    watcher.watch(folder, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Filenames from one notification, filtered to the actions that matter:
/// creation, rename-into, and content modification. Removals, rename-from,
/// and metadata-only changes are ignored.
fn relevant_filenames(event: &notify::Event) -> Vec<String> {
    use notify::event::{EventKind, ModifyKind, RenameMode};

    let relevant = match event.kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => true,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => true,
        _ => false,
    };
    if !relevant {
        return Vec::new();
    }

    event
        .paths
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
        .collect()
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
