// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The processed-files ledger: the dedup oracle for the whole pipeline.
//!
//! A set of absolute file paths, one per line on disk (UTF-8, LF). A path in
//! the set means some command already ran to completion (or timed out) for
//! that file; the executor consults it before every run and `mark` persists
//! synchronously, so a crash loses at most the in-flight command.
//!
//! One mutex covers both the in-memory set and the file rewrite, keeping the
//! two equal after every successful mutation. Membership is exact string
//! equality; the same filename in two folders is two distinct entries.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, warn};

/// Ledger errors. All of them are write-path: loading is best-effort.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to write ledger {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Durable set of processed absolute paths.
pub struct Ledger {
    path: PathBuf,
    set: Mutex<HashSet<String>>,
}

impl Ledger {
    /// Load the ledger from `path`. A missing file is an empty ledger;
    /// unreadable content is logged and treated the same way.
    pub fn load(path: &Path) -> Self {
        let set = match fs::read_to_string(path) {
            Ok(text) => text
                .lines()
                .map(str::trim_end)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ledger unreadable, starting empty");
                HashSet::new()
            }
        };

        info!(path = %path.display(), entries = set.len(), "ledger loaded");
        Self {
            path: path.to_path_buf(),
            set: Mutex::new(set),
        }
    }

    pub fn contains(&self, file_path: &str) -> bool {
        self.set.lock().contains(file_path)
    }

    pub fn len(&self) -> usize {
        self.set.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.lock().is_empty()
    }

    /// Insert `file_path` and synchronously rewrite the backing file.
    /// Idempotent: re-marking an existing entry rewrites but never duplicates.
    ///
    /// On a write failure the in-memory insert is kept; memory stays
    /// authoritative until the next successful write.
    pub fn mark(&self, file_path: &str) -> Result<(), LedgerError> {
        let mut set = self.set.lock();
        set.insert(file_path.to_string());
        self.rewrite(&set)
    }

    /// Remove `file_path` (used by `reprocess`) and rewrite. Removing an
    /// absent entry is a no-op that still reports write failures.
    pub fn remove(&self, file_path: &str) -> Result<bool, LedgerError> {
        let mut set = self.set.lock();
        let removed = set.remove(file_path);
        self.rewrite(&set)?;
        Ok(removed)
    }

    /// Drop every entry (used by `reset`).
    pub fn clear(&self) -> Result<(), LedgerError> {
        let mut set = self.set.lock();
        set.clear();
        self.rewrite(&set)
    }

    /// Rewrite the backing file from the current in-memory set.
    pub fn save(&self) -> Result<(), LedgerError> {
        let set = self.set.lock();
        self.rewrite(&set)
    }

    /// Atomic rewrite: temp file in the same directory, fsync, rename.
    fn rewrite(&self, set: &HashSet<String>) -> Result<(), LedgerError> {
        let io_err = |source| LedgerError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let tmp = self.path.with_extension("tmp");
        let mut lines: Vec<&str> = set.iter().map(String::as_str).collect();
        lines.sort_unstable();

        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        for line in lines {
            writeln!(file, "{line}").map_err(io_err)?;
        }
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
