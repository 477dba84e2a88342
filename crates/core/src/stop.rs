// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The latched stop signal.
//!
//! One flag for the whole process: host signals and the console interrupt
//! both set it, and every task observes it cooperatively. Once set it never
//! clears for the life of the process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// Cloneable handle to the process-wide stop flag.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

#[derive(Default)]
struct StopInner {
    flag: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Latch the flag and wake every waiter. Idempotent.
    pub fn set(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Wait until the flag is set. Returns immediately if it already is.
    pub async fn wait(&self) {
        loop {
            // Register interest before checking the flag so a set() between
            // the check and the await is not missed.
            let notified = self.inner.notify.notified();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }

    /// Wait up to `dur`; true if the flag was set within the window.
    pub async fn wait_timeout(&self, dur: Duration) -> bool {
        tokio::select! {
            _ = self.wait() => true,
            _ = tokio::time::sleep(dur) => self.is_set(),
        }
    }
}

#[cfg(test)]
#[path = "stop_tests.rs"]
mod tests;
