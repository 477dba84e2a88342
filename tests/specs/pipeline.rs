//! End-to-end pipeline scenarios: basic match, dedup across restart, and
//! multiple rules firing for one file.

#![cfg(unix)]

use crate::prelude::*;
use ptc_core::PatternRule;
use std::time::Duration;
use tempfile::tempdir;

#[tokio::test]
#[serial_test::serial]
async fn basic_match_runs_handler_once_and_marks_ledger() {
    let _fast = FastTimeouts::set();
    let dir = tempdir().unwrap();
    let log = dir.path().join("invocations");
    let handler = write_handler(dir.path(), "h1.sh", "P1", &log);

    let folder = dir.path().join("w");
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(folder.join("alpha.txt"), b"x").unwrap();

    let rules = vec![PatternRule::compile(
        "P1",
        &folder.display().to_string(),
        r"^a.*\.txt$",
        &handler.display().to_string(),
    )
    .unwrap()];
    let ledger_path = dir.path().join("processed.txt");
    let (mut supervisor, ledger, metrics, stop) = build_supervisor(rules, &ledger_path);

    supervisor.start_all().await;

    let expected = folder.join("alpha.txt").display().to_string();
    assert!(
        wait_for(|| ledger.contains(&expected), Duration::from_secs(10)).await,
        "file never processed"
    );
    assert!(wait_for(|| metrics.commands_executed() == 1, Duration::from_secs(5)).await);

    // Exactly one invocation, with the absolute path as the sole argument.
    let invocations = std::fs::read_to_string(&log).unwrap();
    assert_eq!(invocations.trim(), format!("P1 {expected}"));

    // The ledger gained exactly that line.
    let on_disk = std::fs::read_to_string(&ledger_path).unwrap();
    assert_eq!(on_disk, format!("{expected}\n"));

    stop.set();
    supervisor.stop_all().await;
}

#[tokio::test]
#[serial_test::serial]
async fn dedup_survives_restart() {
    let _fast = FastTimeouts::set();
    let dir = tempdir().unwrap();
    let log = dir.path().join("invocations");
    let handler = write_handler(dir.path(), "h1.sh", "P1", &log);

    let folder = dir.path().join("w");
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(folder.join("alpha.txt"), b"x").unwrap();

    let rule = || {
        PatternRule::compile(
            "P1",
            &folder.display().to_string(),
            r"^a.*\.txt$",
            &handler.display().to_string(),
        )
        .unwrap()
    };
    let ledger_path = dir.path().join("processed.txt");
    let expected = folder.join("alpha.txt").display().to_string();

    // First service run processes the file.
    {
        let (mut supervisor, ledger, _metrics, stop) = build_supervisor(vec![rule()], &ledger_path);
        supervisor.start_all().await;
        assert!(wait_for(|| ledger.contains(&expected), Duration::from_secs(10)).await);
        stop.set();
        supervisor.stop_all().await;
    }

    // Second run reloads the ledger: the initial scan sees the file,
    // finds it processed, and skips silently.
    {
        let (mut supervisor, _ledger, metrics, stop) = build_supervisor(vec![rule()], &ledger_path);
        supervisor.start_all().await;
        assert!(wait_for(|| supervisor.active_count() == 1, Duration::from_secs(10)).await);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(metrics.commands_executed(), 0);
        stop.set();
        supervisor.stop_all().await;
    }

    let invocations = std::fs::read_to_string(&log).unwrap();
    assert_eq!(invocations.lines().count(), 1);
}

#[tokio::test]
#[serial_test::serial]
async fn two_rules_fire_in_declaration_order_for_one_file() {
    let _fast = FastTimeouts::set();
    let dir = tempdir().unwrap();
    let log = dir.path().join("invocations");
    let h1 = write_handler(dir.path(), "h1.sh", "P1", &log);
    let h2 = write_handler(dir.path(), "h2.sh", "P2", &log);

    let folder = dir.path().join("w");
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(folder.join("a.txt"), b"x").unwrap();

    let folder_str = folder.display().to_string();
    let rules = vec![
        PatternRule::compile("P1", &folder_str, r"^a.*\.txt$", &h1.display().to_string()).unwrap(),
        PatternRule::compile("P2", &folder_str, r"^a.*$", &h2.display().to_string()).unwrap(),
    ];
    let ledger_path = dir.path().join("processed.txt");
    let (mut supervisor, ledger, metrics, stop) = build_supervisor(rules, &ledger_path);

    supervisor.start_all().await;

    let expected = folder.join("a.txt").display().to_string();
    assert!(wait_for(|| ledger.contains(&expected), Duration::from_secs(10)).await);
    assert!(
        wait_for(|| metrics.commands_executed() == 2, Duration::from_secs(10)).await,
        "both rules should execute"
    );

    // Declaration order: P1 then P2; a single ledger entry.
    let invocations = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = invocations.lines().collect();
    assert_eq!(lines, vec![
        format!("P1 {expected}").as_str(),
        format!("P2 {expected}").as_str(),
    ]);
    assert_eq!(ledger.len(), 1);

    let snap = metrics.snapshot(supervisor.folder_statuses(), false);
    assert_eq!(snap.patterns[0].execution_count, 1);
    assert_eq!(snap.patterns[1].execution_count, 1);

    stop.set();
    supervisor.stop_all().await;
}

#[tokio::test]
#[serial_test::serial]
async fn empty_folder_produces_zero_executions() {
    let _fast = FastTimeouts::set();
    let dir = tempdir().unwrap();
    let folder = dir.path().join("empty");

    let rules = vec![PatternRule::compile(
        "P1",
        &folder.display().to_string(),
        r"^.*\.txt$",
        "/bin/true",
    )
    .unwrap()];
    let (mut supervisor, ledger, metrics, stop) =
        build_supervisor(rules, &dir.path().join("processed.txt"));

    supervisor.start_all().await;
    assert!(wait_for(|| supervisor.active_count() == 1, Duration::from_secs(10)).await);

    assert_eq!(metrics.commands_executed(), 0);
    assert!(ledger.is_empty());

    stop.set();
    supervisor.stop_all().await;
}
