// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::pattern::PatternRule;
use std::time::Duration;

fn registry() -> Registry {
    Registry::new(vec![
        PatternRule::compile("P1", "C:\\W", r"^a.*$", "/bin/h1").unwrap(),
        PatternRule::compile("P2", "C:\\W", r"^b.*$", "/bin/h2").unwrap(),
    ])
}

#[test]
fn counters_flow_into_the_snapshot() {
    let metrics = Metrics::new();
    metrics.register_rules(&registry());

    metrics.record_rule_match(0);
    metrics.record_rule_match(0);
    metrics.record_rule_execution(0);
    metrics.record_command_executed();
    metrics.record_error();
    metrics.note_file_processed();

    let snap = metrics.snapshot(Vec::new(), true);
    assert_eq!(snap.total_files_processed, 1);
    assert_eq!(snap.files_processed_today, 1);
    assert_eq!(snap.commands_executed, 1);
    assert_eq!(snap.errors_count, 1);
    assert_eq!(snap.patterns_configured, 2);
    assert_eq!(snap.patterns[0].match_count, 2);
    assert_eq!(snap.patterns[0].execution_count, 1);
    assert_eq!(snap.patterns[1].match_count, 0);
    assert!(snap.web_server_running);
    assert!(snap.last_activity_seconds >= 0);
}

#[test]
fn last_activity_is_minus_one_before_any_processing() {
    let metrics = Metrics::new();
    let snap = metrics.snapshot(Vec::new(), false);
    assert_eq!(snap.last_activity_seconds, -1);
}

#[test]
fn running_average_over_samples() {
    let metrics = Metrics::new();
    metrics.record_processing_time(Duration::from_millis(100));
    metrics.record_processing_time(Duration::from_millis(300));

    let snap = metrics.snapshot(Vec::new(), false);
    assert_eq!(snap.average_processing_time, 200);
}

#[test]
fn activity_ring_is_bounded_and_newest_first() {
    let metrics = Metrics::new();
    for i in 0..25 {
        metrics.activity(format!("event {i}"));
    }

    let snap = metrics.snapshot(Vec::new(), false);
    assert_eq!(snap.recent_activity.len(), 20);
    assert_eq!(snap.recent_activity[0].message, "event 24");
    assert_eq!(snap.recent_activity[19].message, "event 5");
}

#[test]
fn snapshot_serializes_with_contract_field_names() {
    let metrics = Metrics::new();
    metrics.register_rules(&registry());
    let folders = vec![FolderStatus {
        path: "C:\\W".to_string(),
        active: true,
        files_detected: 3,
        files_processed: 2,
    }];

    let json = serde_json::to_value(metrics.snapshot(folders, true)).unwrap();

    for key in [
        "totalFilesProcessed",
        "filesProcessedToday",
        "activeThreads",
        "memoryUsageMB",
        "averageProcessingTime",
        "commandsExecuted",
        "errorsCount",
        "uptimeSeconds",
        "lastActivitySeconds",
        "foldersMonitored",
        "patternsConfigured",
        "webServerRunning",
        "folders",
        "patterns",
        "recentActivity",
    ] {
        assert!(json.get(key).is_some(), "missing key {key}");
    }

    let folder = &json["folders"][0];
    assert_eq!(folder["filesDetected"], 3);
    assert_eq!(folder["filesProcessed"], 2);
    let pattern = &json["patterns"][0];
    assert!(pattern.get("matchCount").is_some());
    assert!(pattern.get("executionCount").is_some());
}
