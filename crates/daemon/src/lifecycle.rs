// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service lifecycle: startup wiring and the ordered cooperative shutdown.
//!
//! Shutdown sequence, with hard caps per step:
//! 1. set the stop signal and report `stop-pending`
//! 2. watcher tasks observe the signal within one loop tick
//! 3. stop the HTTP endpoint (2 s, then detach)
//! 4. stop all watchers (3 s overall, 1 s per task, then detach)
//! 5. stop the metrics refresher (1 s, then detach)
//! 6. persist the ledger
//! 7. report `stopped`
//!
//! Any step that overruns detaches its task rather than blocking the host's
//! service-manager handshake; worst case is ~6 s wall-clock.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fs2::FileExt;
use thiserror::Error;
use tracing::{info, warn};

use ptc_core::{config, Config, ConfigError, Metrics, Registry, Settings, StopSignal};
use ptc_engine::{spawn_refresher, Supervisor};
use ptc_storage::Ledger;

use crate::http::{MetricsServer, ServerCtx};

/// Budget for stopping the HTTP endpoint.
const HTTP_STOP_BUDGET: Duration = Duration::from_secs(2);

/// Budget for stopping the metrics refresher.
const REFRESHER_STOP_BUDGET: Duration = Duration::from_secs(1);

/// Lifecycle errors. Everything here is fatal at startup; past startup the
/// service degrades instead of failing.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("another instance is already running (lock held on {path})")]
    AlreadyRunning { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the service in the current process until a host signal or console
/// interrupt sets the stop flag. This is the entry point for both `ptcd`
/// and `ptc test`.
pub async fn run(config_path: &Path) -> Result<(), LifecycleError> {
    let config = Config::load_or_init(config_path)?;
    let _log_guards = setup_logging(&config.settings)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "starting PatternTriggerCommand service"
    );

    let stop = StopSignal::new();
    install_signal_handlers(stop.clone());
    run_with_stop(config, stop).await
}

/// Run the service against an externally owned stop signal. Split out so
/// tests can drive shutdown directly.
pub async fn run_with_stop(config: Config, stop: StopSignal) -> Result<(), LifecycleError> {
    let settings = config.settings;
    let registry = Arc::new(config.registry);
    for rejected in &config.rejected {
        warn!(rule = %rejected.name, error = %rejected.error, "rule rejected at load");
    }

    // One instance per state dir, enforced before any side effects.
    let _pid_lock = acquire_pid_lock(&config::state_dir().join("ptcd.pid"))?;

    let ledger = Arc::new(Ledger::load(&settings.processed_files_db));
    let metrics = Metrics::new();
    metrics.register_rules(&registry);
    log_rules(&registry);

    let mut supervisor = Supervisor::new(
        Arc::clone(&registry),
        Arc::clone(&ledger),
        metrics.clone(),
        stop.clone(),
    );
    supervisor.start_all().await;

    let mut http_task = if settings.web_server_enabled {
        match MetricsServer::bind(settings.web_server_port).await {
            Ok(server) => {
                let ctx = ServerCtx {
                    metrics: metrics.clone(),
                    watchers: supervisor.watcher_shareds(),
                    stop: stop.clone(),
                };
                Some(tokio::spawn(server.run(ctx)))
            }
            Err(e) => {
                // The endpoint is ancillary: bind failure disables it and
                // the core continues.
                warn!(port = settings.web_server_port, error = %e, "http bind failed");
                metrics.record_error();
                None
            }
        }
    } else {
        None
    };

    let mut refresher = spawn_refresher(metrics.clone(), supervisor.watcher_shareds(), stop.clone());

    metrics.activity("Service started");
    info!(
        folders = supervisor.folder_statuses().len(),
        rules = registry.len(),
        "service running"
    );

    stop.wait().await;

    // Ordered shutdown.
    info!(status = "stop-pending", hint_ms = 5000u32, "shutdown starting");

    if let Some(task) = http_task.as_mut() {
        if tokio::time::timeout(HTTP_STOP_BUDGET, task).await.is_err() {
            warn!("http endpoint missed its stop budget, detaching");
        }
    }

    let report = supervisor.stop_all().await;

    if tokio::time::timeout(REFRESHER_STOP_BUDGET, &mut refresher)
        .await
        .is_err()
    {
        warn!("metrics refresher missed its stop budget, detaching");
    }

    if let Err(e) = ledger.save() {
        warn!(error = %e, "final ledger persist failed");
    }

    info!(
        status = "stopped",
        watchers_stopped = report.stopped,
        watchers_orphaned = report.orphaned,
        "service stopped"
    );
    Ok(())
}

/// Take the exclusive PID lock, writing our PID into it.
fn acquire_pid_lock(path: &Path) -> Result<File, LifecycleError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Open without truncating so a failed lock doesn't wipe the running
    // instance's PID.
    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| LifecycleError::AlreadyRunning {
            path: path.to_path_buf(),
        })?;

    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    Ok(lock_file)
}

fn log_rules(registry: &Registry) {
    for rule in registry.rules() {
        info!(
            rule = %rule.name,
            folder = %rule.folder,
            regex = %rule.regex,
            command = %rule.command,
            "rule loaded"
        );
    }
}

/// Host signals and the console interrupt both latch the stop flag.
fn install_signal_handlers(stop: StopSignal) {
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("console interrupt received");
                stop.set();
            }
        });
    }

    #[cfg(unix)]
    {
        tokio::spawn(async move {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    info!("SIGTERM received");
                    stop.set();
                }
                Err(e) => warn!(error = %e, "cannot install SIGTERM handler"),
            }
        });
    }
}

/// Maximum primary log size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep.
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the primary log at startup if it has grown too large.
/// Best-effort: rotation failures never prevent startup.
fn rotate_log_if_needed(log_path: &Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };

    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

/// Set up the primary log appender, plus the detailed appender when
/// `DetailedLogging` is on. Returns the non-blocking writer guards; they
/// must live for the life of the process.
fn setup_logging(
    settings: &Settings,
) -> Result<Vec<tracing_appender::non_blocking::WorkerGuard>, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    rotate_log_if_needed(&settings.log_file);

    let mut guards = Vec::new();
    let (primary_dir, primary_name) = split_log_path(&settings.log_file)?;
    std::fs::create_dir_all(&primary_dir)?;
    let (primary_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(primary_dir, primary_name));
    guards.push(guard);

    let primary_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let primary_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(primary_writer)
        .with_filter(primary_filter);

    if settings.detailed_logging {
        let (detail_dir, detail_name) = split_log_path(&settings.detailed_log_file)?;
        std::fs::create_dir_all(&detail_dir)?;
        let (detail_writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(detail_dir, detail_name));
        guards.push(guard);

        let detail_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(detail_writer)
            .with_filter(EnvFilter::new("debug"));

        tracing_subscriber::registry()
            .with(primary_layer)
            .with(detail_layer)
            .init();
    } else {
        tracing_subscriber::registry().with(primary_layer).init();
    }

    Ok(guards)
}

fn split_log_path(path: &Path) -> Result<(PathBuf, std::ffi::OsString), LifecycleError> {
    let parent = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => PathBuf::from("."),
        Some(p) => p.to_path_buf(),
        None => PathBuf::from("."),
    };
    let name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .ok_or_else(|| {
            LifecycleError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("log path has no file name: {}", path.display()),
            ))
        })?;
    Ok((parent, name))
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
