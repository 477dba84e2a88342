// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the engine crate.
//!
//! The overrides exist for test isolation; production runs use the
//! defaults, which are part of the execution contract.

use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Readiness gate poll interval (default: 250ms).
pub fn ready_poll_ms() -> Duration {
    parse_duration_ms("PTC_READY_POLL_MS").unwrap_or(Duration::from_millis(250))
}

/// Readiness gate ceiling (default: 20s).
pub fn ready_timeout_ms() -> Duration {
    parse_duration_ms("PTC_READY_TIMEOUT_MS").unwrap_or(Duration::from_secs(20))
}

/// Child process wait ceiling (default: 45s).
pub fn command_timeout_ms() -> Duration {
    parse_duration_ms("PTC_COMMAND_TIMEOUT_MS").unwrap_or(Duration::from_secs(45))
}

/// Settle delay after each execution (default: 1s).
pub fn settle_ms() -> Duration {
    parse_duration_ms("PTC_SETTLE_MS").unwrap_or(Duration::from_secs(1))
}

/// Debounce window before evaluating a change batch (default: 500ms).
pub fn debounce_ms() -> Duration {
    parse_duration_ms("PTC_DEBOUNCE_MS").unwrap_or(Duration::from_millis(500))
}

/// Stagger between watcher task starts (default: 500ms).
pub fn stagger_ms() -> Duration {
    parse_duration_ms("PTC_STAGGER_MS").unwrap_or(Duration::from_millis(500))
}

/// Retry delay after a transient watch error (default: 1s).
pub fn watch_retry_ms() -> Duration {
    parse_duration_ms("PTC_WATCH_RETRY_MS").unwrap_or(Duration::from_secs(1))
}
