// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use ptc_core::{Config, Metrics, StopSignal};
use ptc_engine::{CommandExecutor, ExecOutcome};
use ptc_storage::Ledger;

/// Remove a file's ledger entry and run its matching rules once, in
/// declaration order, printing each outcome.
pub async fn run(config_path: &Path, folder: &str, filename: &str) -> Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let registry = Arc::new(config.registry);

    let matches = registry.matches(filename, folder);
    if matches.is_empty() {
        bail!("no configured rule matches '{filename}' in '{folder}'");
    }

    let file_path = Path::new(folder).join(filename).display().to_string();
    let ledger = Arc::new(Ledger::load(&config.settings.processed_files_db));
    if ledger.remove(&file_path).context("updating ledger")? {
        println!("Forgot ledger entry {file_path}");
    } else {
        println!("No ledger entry for {file_path} (running anyway)");
    }

    let metrics = Metrics::new();
    metrics.register_rules(&registry);
    let executor = CommandExecutor::new(Arc::clone(&ledger), metrics, StopSignal::new());

    let mut failures = 0;
    for idx in matches {
        let Some(rule) = registry.rule(idx) else {
            continue;
        };
        let outcome = executor.execute(rule, idx, &file_path).await;
        println!("{}: {}", rule.name, describe(&outcome));
        if !matches!(
            outcome,
            ExecOutcome::Ok { .. } | ExecOutcome::TimeoutOk | ExecOutcome::AlreadyProcessed
        ) {
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{failures} rule(s) failed");
    }
    Ok(())
}

fn describe(outcome: &ExecOutcome) -> String {
    match outcome {
        ExecOutcome::Ok { exit_code: Some(code) } => format!("ok (exit {code})"),
        ExecOutcome::Ok { exit_code: None } => "ok (terminated by signal)".to_string(),
        ExecOutcome::TimeoutOk => "timed out; file marked processed".to_string(),
        ExecOutcome::Cancelled => "cancelled".to_string(),
        ExecOutcome::AlreadyProcessed => "already processed".to_string(),
        ExecOutcome::CommandMissing => "command missing".to_string(),
        ExecOutcome::Vanished => "file vanished".to_string(),
        ExecOutcome::Busy => "file busy past the readiness ceiling".to_string(),
        ExecOutcome::SpawnFailed => "spawn failed".to_string(),
        ExecOutcome::WaitError => "wait error".to_string(),
    }
}

#[cfg(test)]
#[path = "reprocess_tests.rs"]
mod tests;
