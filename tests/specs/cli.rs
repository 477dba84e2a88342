//! Black-box checks of the `ptc` binary.

use assert_cmd::Command;
use tempfile::tempdir;

#[test]
fn help_lists_the_subcommands() {
    let output = Command::cargo_bin("ptc").unwrap().arg("--help").output().unwrap();
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    for sub in ["install", "uninstall", "test", "status", "reset", "config", "reprocess"] {
        assert!(text.contains(sub), "help is missing '{sub}'");
    }
}

#[test]
fn version_prints_and_exits_zero() {
    Command::cargo_bin("ptc")
        .unwrap()
        .arg("--version")
        .assert()
        .success();
}

#[test]
fn unknown_subcommand_exits_nonzero() {
    Command::cargo_bin("ptc")
        .unwrap()
        .arg("restart")
        .assert()
        .failure();
}

#[test]
#[serial_test::serial]
fn config_generates_a_default_file_on_first_use() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.ini");

    let output = Command::cargo_bin("ptc")
        .unwrap()
        .env("PTC_STATE_DIR", dir.path().join("state"))
        .args(["config", "--config"])
        .arg(&config_path)
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(config_path.exists());

    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("[Settings]"));
    assert!(text.contains("ExampleTxt"));
}

#[test]
#[serial_test::serial]
fn reset_truncates_the_ledger() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.ini");
    let ledger_path = dir.path().join("processed.txt");
    std::fs::write(&ledger_path, "/data/in/a.txt\n").unwrap();
    std::fs::write(
        &config_path,
        format!(
            "[Settings]\nProcessedFilesDB={}\n[Patterns]\nP=^a$|/bin/true\n",
            ledger_path.display()
        ),
    )
    .unwrap();

    Command::cargo_bin("ptc")
        .unwrap()
        .env("PTC_STATE_DIR", dir.path().join("state"))
        .args(["reset", "--config"])
        .arg(&config_path)
        .assert()
        .success();

    assert_eq!(std::fs::read_to_string(&ledger_path).unwrap(), "");
}
