// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn write_config(dir: &Path, folder: &Path, command: &str) -> std::path::PathBuf {
    let config_path = dir.join("config.ini");
    let state = dir.join("state");
    std::fs::write(
        &config_path,
        format!(
            "[Settings]\n\
             ProcessedFilesDB={}\n\
             LogFile={}\n\
             DetailedLogFile={}\n\
             [Patterns]\n\
             P1={}|^a.*\\.txt$|{}\n",
            state.join("processed.txt").display(),
            state.join("ptc.log").display(),
            state.join("ptc_detailed.log").display(),
            folder.display(),
            command,
        ),
    )
    .unwrap();
    config_path
}

#[cfg(unix)]
#[tokio::test]
#[serial_test::serial]
async fn reprocess_forgets_and_reruns() {
    use std::os::unix::fs::PermissionsExt;

    std::env::set_var("PTC_SETTLE_MS", "0");
    let dir = tempdir().unwrap();
    let folder = dir.path().join("watched");
    std::fs::create_dir_all(&folder).unwrap();

    let marker = dir.path().join("ran");
    let handler = dir.path().join("handler.sh");
    std::fs::write(
        &handler,
        format!("#!/bin/sh\necho \"$1\" >> {}\n", marker.display()),
    )
    .unwrap();
    std::fs::set_permissions(&handler, std::fs::Permissions::from_mode(0o755)).unwrap();

    let config_path = write_config(dir.path(), &folder, &handler.display().to_string());
    let file = folder.join("a.txt");
    std::fs::write(&file, b"x").unwrap();

    // Pretend an earlier run already consumed the file.
    let config = Config::load(&config_path).unwrap();
    let ledger = Ledger::load(&config.settings.processed_files_db);
    ledger.mark(&file.display().to_string()).unwrap();

    run(&config_path, &folder.display().to_string(), "a.txt")
        .await
        .unwrap();

    // The handler ran once and the file is marked processed again.
    let log = std::fs::read_to_string(&marker).unwrap();
    assert_eq!(log.trim(), file.display().to_string());
    let ledger = Ledger::load(&config.settings.processed_files_db);
    assert!(ledger.contains(&file.display().to_string()));

    std::env::remove_var("PTC_SETTLE_MS");
}

#[tokio::test]
async fn reprocess_rejects_unmatched_files() {
    let dir = tempdir().unwrap();
    let folder = dir.path().join("watched");
    std::fs::create_dir_all(&folder).unwrap();
    let config_path = write_config(dir.path(), &folder, "/bin/true");

    let result = run(&config_path, &folder.display().to_string(), "nomatch.bin").await;
    assert!(result.is_err());
}
