//! Shared helpers for the behavioral tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ptc_core::{Metrics, PatternRule, Registry, StopSignal};
use ptc_engine::Supervisor;
use ptc_storage::Ledger;

/// Shrink the contract timeouts so specs run in milliseconds. Restored on
/// drop; every test using it is #[serial].
pub struct FastTimeouts;

impl FastTimeouts {
    pub fn set() -> Self {
        std::env::set_var("PTC_SETTLE_MS", "0");
        std::env::set_var("PTC_DEBOUNCE_MS", "50");
        std::env::set_var("PTC_STAGGER_MS", "10");
        FastTimeouts
    }
}

impl Drop for FastTimeouts {
    fn drop(&mut self) {
        for var in ["PTC_SETTLE_MS", "PTC_DEBOUNCE_MS", "PTC_STAGGER_MS"] {
            std::env::remove_var(var);
        }
    }
}

/// Write an executable shell script that appends `<marker> <arg>` to `log`.
#[cfg(unix)]
pub fn write_handler(dir: &Path, name: &str, marker: &str, log: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(
        &path,
        format!("#!/bin/sh\necho \"{marker} $1\" >> {}\n", log.display()),
    )
    .unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Poll `cond` until it holds or `within` elapses.
pub async fn wait_for<F: Fn() -> bool>(cond: F, within: Duration) -> bool {
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    cond()
}

/// Wire up a supervisor over `rules` with a fresh metrics handle and a
/// ledger backed by `ledger_path`.
pub fn build_supervisor(
    rules: Vec<PatternRule>,
    ledger_path: &Path,
) -> (Supervisor, Arc<Ledger>, Metrics, StopSignal) {
    let registry = Arc::new(Registry::new(rules));
    let ledger = Arc::new(Ledger::load(ledger_path));
    let metrics = Metrics::new();
    metrics.register_rules(&registry);
    let stop = StopSignal::new();
    let supervisor = Supervisor::new(
        registry,
        Arc::clone(&ledger),
        metrics.clone(),
        stop.clone(),
    );
    (supervisor, ledger, metrics, stop)
}
