// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PatternTriggerCommand daemon (ptcd)
//!
//! Long-lived process that watches the configured folders and runs the
//! associated commands. Typically started by a service manager or by
//! `ptc test` in the foreground.

use std::path::PathBuf;

use ptc_core::config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config_path: Option<PathBuf> = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("ptcd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("ptcd {}", env!("CARGO_PKG_VERSION"));
                println!("PatternTriggerCommand daemon - watches folders and triggers commands");
                println!();
                println!("USAGE:");
                println!("    ptcd [--config <path>]");
                println!();
                println!("OPTIONS:");
                println!("    --config <path>  Configuration file (default: {})",
                    config::default_config_path().display());
                println!("    -h, --help       Print help information");
                println!("    -V, --version    Print version information");
                return Ok(());
            }
            "--config" => match args.next() {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => {
                    eprintln!("error: --config requires a path");
                    std::process::exit(1);
                }
            },
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("Usage: ptcd [--config <path>]");
                std::process::exit(1);
            }
        }
    }

    let config_path = config_path.unwrap_or_else(config::default_config_path);
    if let Err(e) = ptc_daemon::run(&config_path).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
    Ok(())
}
