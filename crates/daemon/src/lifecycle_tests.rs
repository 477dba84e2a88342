// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ptc_core::PatternRule;
use std::time::Instant;
use tempfile::tempdir;

fn test_config(dir: &Path) -> Config {
    let mut settings = Settings::default_under(&dir.join("state"));
    settings.web_server_enabled = false;
    let folder = dir.join("watched").display().to_string();
    let registry = Registry::new(vec![
        PatternRule::compile("P1", &folder, r"^a.*\.txt$", "/bin/true").unwrap(),
    ]);
    Config {
        settings,
        registry,
        rejected: Vec::new(),
    }
}

#[test]
fn pid_lock_is_exclusive() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ptcd.pid");

    let _held = acquire_pid_lock(&path).unwrap();
    let second = acquire_pid_lock(&path);
    assert!(matches!(
        second,
        Err(LifecycleError::AlreadyRunning { .. })
    ));

    let pid = std::fs::read_to_string(&path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());
}

#[test]
fn lock_release_allows_reacquire() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ptcd.pid");

    let held = acquire_pid_lock(&path).unwrap();
    drop(held);
    acquire_pid_lock(&path).unwrap();
}

#[test]
fn log_rotation_shifts_files() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("ptc.log");
    std::fs::write(&log, vec![0u8; (MAX_LOG_SIZE + 1) as usize]).unwrap();
    std::fs::write(dir.path().join("ptc.log.1"), b"old").unwrap();

    rotate_log_if_needed(&log);

    assert!(!log.exists());
    assert!(dir.path().join("ptc.log.1").exists());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("ptc.log.2")).unwrap(),
        "old"
    );
}

#[test]
fn small_log_is_left_alone() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("ptc.log");
    std::fs::write(&log, b"short").unwrap();

    rotate_log_if_needed(&log);
    assert!(log.exists());
}

#[tokio::test]
#[serial_test::serial]
async fn run_with_stop_shuts_down_within_budget() {
    let dir = tempdir().unwrap();
    std::env::set_var("PTC_STATE_DIR", dir.path().join("state").display().to_string());
    std::env::set_var("PTC_SETTLE_MS", "0");
    std::env::set_var("PTC_STAGGER_MS", "10");

    let config = test_config(dir.path());
    let ledger_path = config.settings.processed_files_db.clone();
    let stop = StopSignal::new();

    let task = {
        let stop = stop.clone();
        tokio::spawn(async move { run_with_stop(config, stop).await })
    };

    // Let startup finish, then pull the plug.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let begun = Instant::now();
    stop.set();

    let result = tokio::time::timeout(Duration::from_secs(6), task)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
    assert!(begun.elapsed() < Duration::from_secs(6));

    // Step 6 persisted the ledger file even though nothing was processed.
    assert!(ledger_path.exists());

    for var in ["PTC_STATE_DIR", "PTC_SETTLE_MS", "PTC_STAGGER_MS"] {
        std::env::remove_var(var);
    }
}

#[tokio::test]
#[serial_test::serial]
async fn second_instance_is_rejected() {
    let dir = tempdir().unwrap();
    std::env::set_var("PTC_STATE_DIR", dir.path().join("state").display().to_string());
    std::env::set_var("PTC_STAGGER_MS", "10");

    let stop = StopSignal::new();
    let first = {
        let config = test_config(dir.path());
        let stop = stop.clone();
        tokio::spawn(async move { run_with_stop(config, stop).await })
    };
    tokio::time::sleep(Duration::from_millis(500)).await;

    let second = run_with_stop(test_config(dir.path()), StopSignal::new()).await;
    assert!(matches!(
        second,
        Err(LifecycleError::AlreadyRunning { .. })
    ));

    stop.set();
    tokio::time::timeout(Duration::from_secs(6), first)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    std::env::remove_var("PTC_STATE_DIR");
    std::env::remove_var("PTC_STAGGER_MS");
}
