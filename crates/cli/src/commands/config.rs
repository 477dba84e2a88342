// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use anyhow::{Context, Result};

use ptc_core::Config;

/// Print the resolved configuration: settings, valid rules, and rules
/// rejected at load with their errors. Writes the default file first when
/// none exists.
pub fn run(config_path: &Path) -> Result<()> {
    let config = Config::load_or_init(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    println!("# {}", config_path.display());
    println!();
    print!("{}", config.settings.render());
    println!();

    println!("[Patterns]  # {} valid rule(s)", config.registry.len());
    for rule in config.registry.rules() {
        println!("{}={}|{}|{}", rule.name, rule.folder, rule.regex, rule.command);
    }

    if !config.rejected.is_empty() {
        println!();
        println!("# rejected rules:");
        for rejected in &config.rejected {
            println!("#   {}: {}", rejected.name, rejected.error);
        }
    }
    Ok(())
}
