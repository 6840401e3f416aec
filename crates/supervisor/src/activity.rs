// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-tracked background work that defers idle shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counter of outstanding background jobs (indexing, sync, ...).
///
/// While any [`ActivityGuard`] is alive the idle timer rearms instead of
/// stopping the worker.
#[derive(Debug, Clone, Default)]
pub struct BackgroundWork {
    active: Arc<AtomicUsize>,
}

impl BackgroundWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a job as running until the returned guard is dropped.
    pub fn begin(&self) -> ActivityGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        ActivityGuard {
            active: Arc::clone(&self.active),
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.active() > 0
    }
}

#[must_use = "background work ends when the guard is dropped"]
#[derive(Debug)]
pub struct ActivityGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_track_active_jobs() {
        let work = BackgroundWork::new();
        assert!(!work.is_active());

        let a = work.begin();
        let b = work.clone().begin();
        assert_eq!(work.active(), 2);

        drop(a);
        assert!(work.is_active());
        drop(b);
        assert!(!work.is_active());
    }
}
