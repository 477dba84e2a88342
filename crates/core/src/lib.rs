// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ptc-core: shared types for the Pattern Trigger Command service.
//!
//! Holds everything the engine, daemon, and CLI have in common: the INI
//! configuration loader, the compiled pattern registry, folder-key
//! normalization, the process-wide metrics handle, and the latched stop
//! signal that coordinates shutdown.

pub mod config;
pub mod folder;
pub mod metrics;
pub mod pattern;
pub mod stop;

pub use config::{Config, ConfigError, RejectedRule, Settings};
pub use folder::folder_key;
pub use metrics::{ActivityItem, FolderStatus, Metrics, MetricsSnapshot, PatternStatus};
pub use pattern::{FolderGroup, PatternRule, Registry};
pub use stop::StopSignal;
