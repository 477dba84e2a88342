// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ptc - PatternTriggerCommand CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ptc",
    version,
    about = "Pattern Trigger Command - watch folders, run commands on matching files"
)]
struct Cli {
    /// Configuration file (default: platform config dir)
    #[arg(long = "config", global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register the service with the platform service manager
    Install,
    /// Remove the service registration
    Uninstall,
    /// Run the service in the foreground
    Test,
    /// Show service status and live metrics
    Status,
    /// Truncate the processed-files ledger
    Reset,
    /// Show the resolved configuration and rule validation results
    Config,
    /// Forget a processed file and run its matching rules once
    Reprocess {
        /// Folder the file lives in
        folder: String,
        /// Bare filename (no path components)
        filename: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .unwrap_or_else(ptc_core::config::default_config_path);

    let result = match cli.command {
        Commands::Install => commands::service::install(&config_path),
        Commands::Uninstall => commands::service::uninstall(),
        Commands::Test => commands::test::run(&config_path).await,
        Commands::Status => commands::status::run(&config_path),
        Commands::Reset => commands::reset::run(&config_path),
        Commands::Config => commands::config::run(&config_path),
        Commands::Reprocess { folder, filename } => {
            commands::reprocess::run(&config_path, &folder, &filename).await
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
