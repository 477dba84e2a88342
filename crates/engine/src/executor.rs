// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command execution: readiness gate, child spawn, bounded wait, ledger
//! update.
//!
//! The executor is the only place that writes the ledger during normal
//! operation. Everything here is per-file and per-rule; failures are
//! logged and counted, never propagated upward.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use tokio::process::Command;
use tracing::{debug, info, warn};

use ptc_core::{Metrics, PatternRule, StopSignal};
use ptc_storage::Ledger;

use crate::env;

/// Outcome of one `(rule, file)` execution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Child exited normally; file marked processed.
    Ok { exit_code: Option<i32> },
    /// Child hit the wait ceiling and was terminated; file still marked
    /// processed so a hung handler cannot cause an execution loop.
    TimeoutOk,
    /// Stop signal observed; no side effects beyond child termination.
    Cancelled,
    /// Ledger already contains the file; nothing to do, not an error.
    AlreadyProcessed,
    /// Command path is not a regular file.
    CommandMissing,
    /// File disappeared during the readiness gate.
    Vanished,
    /// File stayed locked past the readiness ceiling.
    Busy,
    /// Child process could not be started.
    SpawnFailed,
    /// Waiting on the child failed; file not marked.
    WaitError,
}

/// Executes matched commands against ready files.
#[derive(Clone)]
pub struct CommandExecutor {
    ledger: Arc<Ledger>,
    metrics: Metrics,
    stop: StopSignal,
}

impl CommandExecutor {
    pub fn new(ledger: Arc<Ledger>, metrics: Metrics, stop: StopSignal) -> Self {
        Self {
            ledger,
            metrics,
            stop,
        }
    }

    /// Run `rule`'s command with `file_path` as its sole argument.
    ///
    /// Contract, in order: stop check, command existence, ledger dedup,
    /// readiness gate, spawn, bounded wait, ledger mark, settle delay.
    pub async fn execute(&self, rule: &PatternRule, rule_idx: usize, file_path: &str) -> ExecOutcome {
        if self.stop.is_set() {
            return ExecOutcome::Cancelled;
        }

        if !Path::new(&rule.command).is_file() {
            warn!(rule = %rule.name, command = %rule.command, "command missing");
            self.metrics.record_error();
            self.metrics
                .activity(format!("Command missing for {}: {}", rule.name, rule.command));
            return ExecOutcome::CommandMissing;
        }

        if self.ledger.contains(file_path) {
            debug!(file = file_path, "already processed, skipping");
            return ExecOutcome::AlreadyProcessed;
        }

        let started = Instant::now();

        match self.wait_until_ready(file_path).await {
            Gate::Ready => {}
            Gate::Cancelled => return ExecOutcome::Cancelled,
            Gate::Vanished => {
                info!(file = file_path, "file vanished before execution");
                return ExecOutcome::Vanished;
            }
            Gate::Busy => {
                warn!(file = file_path, "file still locked after readiness ceiling");
                self.metrics.record_error();
                self.metrics.activity(format!("File busy: {file_path}"));
                return ExecOutcome::Busy;
            }
        }

        let mut command = Command::new(&rule.command);
        command
            .arg(file_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(rule = %rule.name, command = %rule.command, error = %e, "spawn failed");
                self.metrics.record_error();
                return ExecOutcome::SpawnFailed;
            }
        };

        info!(rule = %rule.name, command = %rule.command, file = file_path, "command started");

        let outcome = tokio::select! {
            _ = self.stop.wait() => {
                // Shutdown mid-execution: terminate and leave the file
                // unmarked so no forward progress is recorded beyond
                // acknowledged work.
                let _ = child.start_kill();
                let _ = child.wait().await;
                info!(rule = %rule.name, file = file_path, "execution cancelled by stop");
                return ExecOutcome::Cancelled;
            }
            result = tokio::time::timeout(env::command_timeout_ms(), child.wait()) => {
                match result {
                    Ok(Ok(status)) => {
                        info!(
                            rule = %rule.name,
                            file = file_path,
                            exit_code = ?status.code(),
                            "command finished"
                        );
                        self.mark_processed(file_path);
                        self.metrics.record_command_executed();
                        self.metrics.record_rule_execution(rule_idx);
                        self.metrics.activity(format!(
                            "Executed {} for {file_path}",
                            rule.name
                        ));
                        ExecOutcome::Ok { exit_code: status.code() }
                    }
                    Ok(Err(e)) => {
                        warn!(rule = %rule.name, file = file_path, error = %e, "wait failed");
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        self.metrics.record_error();
                        ExecOutcome::WaitError
                    }
                    Err(_elapsed) => {
                        warn!(
                            rule = %rule.name,
                            file = file_path,
                            timeout_s = env::command_timeout_ms().as_secs(),
                            "command timed out, terminating; file marked processed"
                        );
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        self.mark_processed(file_path);
                        self.metrics.record_command_executed();
                        self.metrics.record_rule_execution(rule_idx);
                        self.metrics.activity(format!(
                            "Timed out {} for {file_path}",
                            rule.name
                        ));
                        ExecOutcome::TimeoutOk
                    }
                }
            }
        };

        self.metrics.record_processing_time(started.elapsed());

        // Give the handler's own cleanup a chance to settle.
        if !self.stop.is_set() {
            let _ = self.stop.wait_timeout(env::settle_ms()).await;
        }

        outcome
    }

    /// Insert into the ledger. A write failure is logged and counted; the
    /// in-memory entry stays authoritative until the next successful write.
    fn mark_processed(&self, file_path: &str) {
        if let Err(e) = self.ledger.mark(file_path) {
            warn!(file = file_path, error = %e, "ledger write failed");
            self.metrics.record_error();
        }
        self.metrics.note_file_processed();
    }

    /// Poll until the file is exclusively openable for read, it vanishes,
    /// the stop signal fires, or the ceiling elapses.
    async fn wait_until_ready(&self, file_path: &str) -> Gate {
        let path = Path::new(file_path);
        let deadline = Instant::now() + env::ready_timeout_ms();

        loop {
            if self.stop.is_set() {
                return Gate::Cancelled;
            }
            match probe(path) {
                Probe::Ready => return Gate::Ready,
                Probe::Vanished => return Gate::Vanished,
                Probe::Busy => {
                    if Instant::now() >= deadline {
                        return Gate::Busy;
                    }
                    if self.stop.wait_timeout(env::ready_poll_ms()).await {
                        return Gate::Cancelled;
                    }
                }
            }
        }
    }
}

enum Gate {
    Ready,
    Cancelled,
    Vanished,
    Busy,
}

enum Probe {
    Ready,
    Busy,
    Vanished,
}

/// Readiness means the file still exists and no other process holds a
/// conflicting handle.
#[cfg(windows)]
fn probe(path: &Path) -> Probe {
    use std::os::windows::fs::OpenOptionsExt;
    match std::fs::OpenOptions::new()
        .read(true)
        .share_mode(0)
        .open(path)
    {
        Ok(_) => Probe::Ready,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Probe::Vanished,
        Err(_) => Probe::Busy,
    }
}

/// Unix has no mandatory share modes; an advisory exclusive lock is the
/// closest probe for "no other writer still holds this file".
#[cfg(not(windows))]
fn probe(path: &Path) -> Probe {
    use fs2::FileExt;
    match std::fs::File::open(path) {
        Ok(file) => {
            if file.try_lock_exclusive().is_ok() {
                let _ = file.unlock();
                Probe::Ready
            } else {
                Probe::Busy
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Probe::Vanished,
        Err(_) => Probe::Busy,
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
