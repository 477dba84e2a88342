//! Shutdown under load: the stop signal must bring every watcher down
//! within the supervisor's budget.

#![cfg(unix)]

use crate::prelude::*;
use ptc_core::PatternRule;
use std::time::{Duration, Instant};
use tempfile::tempdir;

#[tokio::test]
#[serial_test::serial]
async fn stop_brings_all_watchers_down_within_budget() {
    let _fast = FastTimeouts::set();
    let dir = tempdir().unwrap();

    let mut rules = Vec::new();
    for i in 0..10 {
        let folder = dir.path().join(format!("w{i}"));
        rules.push(
            PatternRule::compile(
                &format!("P{i}"),
                &folder.display().to_string(),
                r"^.*\.txt$",
                "/bin/true",
            )
            .unwrap(),
        );
    }
    let (mut supervisor, _ledger, _metrics, stop) =
        build_supervisor(rules, &dir.path().join("processed.txt"));

    supervisor.start_all().await;
    assert!(
        wait_for(|| supervisor.active_count() == 10, Duration::from_secs(15)).await,
        "not all watchers reached Running"
    );

    let begun = Instant::now();
    stop.set();
    let report = supervisor.stop_all().await;

    assert!(begun.elapsed() <= Duration::from_secs(6));
    assert_eq!(report.stopped + report.orphaned, 10);
    assert_eq!(report.orphaned, 0, "idle watchers must not miss the budget");
}

#[tokio::test]
#[serial_test::serial]
async fn handler_mid_execution_is_terminated_without_ledger_entry() {
    use std::os::unix::fs::PermissionsExt;

    let _fast = FastTimeouts::set();
    let dir = tempdir().unwrap();

    // Handler sleeps far longer than the shutdown budget.
    let handler = dir.path().join("slow.sh");
    std::fs::write(&handler, "#!/bin/sh\nsleep 90\n").unwrap();
    std::fs::set_permissions(&handler, std::fs::Permissions::from_mode(0o755)).unwrap();

    let folder = dir.path().join("w");
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(folder.join("a.txt"), b"x").unwrap();

    let rules = vec![PatternRule::compile(
        "Slow",
        &folder.display().to_string(),
        r"^a\.txt$",
        &handler.display().to_string(),
    )
    .unwrap()];
    let (mut supervisor, ledger, metrics, stop) =
        build_supervisor(rules, &dir.path().join("processed.txt"));

    supervisor.start_all().await;

    // Wait until the handler is actually running (it was spawned by the
    // initial scan), then raise the stop signal.
    assert!(
        wait_for(
            || metrics.snapshot(Vec::new(), false).patterns[0].match_count >= 1,
            Duration::from_secs(10)
        )
        .await
    );
    tokio::time::sleep(Duration::from_millis(300)).await;

    let begun = Instant::now();
    stop.set();
    let report = supervisor.stop_all().await;

    // No forward progress beyond acknowledged work: the interrupted
    // handler's file is not in the ledger.
    assert!(begun.elapsed() <= Duration::from_secs(6));
    assert_eq!(report.stopped + report.orphaned, 1);
    assert!(!ledger.contains(&folder.join("a.txt").display().to_string()));
    assert_eq!(metrics.commands_executed(), 0);
}
