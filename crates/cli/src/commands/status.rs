// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use ptc_core::Config;
use ptc_storage::Ledger;

const HTTP_TIMEOUT: Duration = Duration::from_secs(1);

/// Print configuration summary, ledger size, and live metrics when the
/// daemon's endpoint is reachable.
pub fn run(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    println!("config:  {}", config_path.display());
    println!("rules:   {}", config.registry.len());
    println!(
        "folders: {}",
        config.registry.folder_groups().len()
    );

    let ledger = Ledger::load(&config.settings.processed_files_db);
    println!("ledger:  {} entries", ledger.len());

    if !config.settings.web_server_enabled {
        println!("daemon:  metrics endpoint disabled in configuration");
        return Ok(());
    }

    match fetch_metrics(config.settings.web_server_port) {
        Ok(metrics) => {
            println!("daemon:  running");
            print_metric(&metrics, "uptimeSeconds", "uptime (s)");
            print_metric(&metrics, "activeThreads", "active watchers");
            print_metric(&metrics, "totalFilesProcessed", "files processed");
            print_metric(&metrics, "commandsExecuted", "commands executed");
            print_metric(&metrics, "errorsCount", "errors");
            print_metric(&metrics, "lastActivitySeconds", "last activity (s)");
        }
        Err(_) => {
            println!(
                "daemon:  not running (metrics endpoint on port {} unreachable)",
                config.settings.web_server_port
            );
        }
    }
    Ok(())
}

fn print_metric(metrics: &serde_json::Value, key: &str, label: &str) {
    if let Some(value) = metrics.get(key) {
        println!("  {label}: {value}");
    }
}

/// Plain-TCP GET against the local metrics endpoint.
fn fetch_metrics(port: u16) -> Result<serde_json::Value> {
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    let mut stream = TcpStream::connect_timeout(&addr, HTTP_TIMEOUT)?;
    stream.set_read_timeout(Some(HTTP_TIMEOUT))?;
    stream.set_write_timeout(Some(HTTP_TIMEOUT))?;

    stream.write_all(b"GET /api/metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")?;

    let mut response = String::new();
    stream.read_to_string(&mut response)?;

    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body)
        .context("malformed HTTP response")?;
    serde_json::from_str(body).context("invalid metrics JSON")
}
