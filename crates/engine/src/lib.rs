// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ptc-engine: the event-driven multi-folder watcher.
//!
//! One watcher task per distinct folder feeds matched files into the
//! command executor; the supervisor owns the set of watchers and the
//! bounded two-phase stop. The metrics refresher samples process memory
//! and recomputes the active-task count.

pub mod env;
mod executor;
mod refresher;
mod supervisor;
mod watcher;

pub use executor::{CommandExecutor, ExecOutcome};
pub use refresher::spawn_refresher;
pub use supervisor::{StopReport, Supervisor};
pub use watcher::{WatcherPhase, WatcherShared};
