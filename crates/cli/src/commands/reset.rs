// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use anyhow::{Context, Result};

use ptc_core::Config;
use ptc_storage::Ledger;

/// Truncate the processed-files ledger. Every previously handled file
/// becomes eligible again on its next filesystem event.
pub fn run(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let ledger = Ledger::load(&config.settings.processed_files_db);
    let forgotten = ledger.len();
    ledger.clear().context("truncating ledger")?;

    println!(
        "Cleared {} ledger entr{} from {}",
        forgotten,
        if forgotten == 1 { "y" } else { "ies" },
        config.settings.processed_files_db.display()
    );
    Ok(())
}
