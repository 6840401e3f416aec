// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tunable timing constants for startup, shutdown, locking and recovery.

use std::time::Duration;

/// Deadline for the startup health handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

/// Cooperative shutdown window (shutdown request, wait for exit).
pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Window after SIGTERM before escalating to SIGKILL.
pub const TERMINATE_TIMEOUT: Duration = Duration::from_secs(3);

/// How long to wait for the exit after SIGKILL.
pub const KILL_TIMEOUT: Duration = Duration::from_secs(2);

/// Metadata-less locks younger than this are assumed to be mid-acquisition.
pub const STALE_LOCK_AGE: Duration = Duration::from_secs(10 * 60);

/// Automatic restarts allowed before entering `degraded`.
pub const MAX_RECOVERY_ATTEMPTS: u32 = 3;

pub const RECOVERY_BACKOFF_BASE: Duration = Duration::from_secs(1);
pub const RECOVERY_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Consecutive forced kills before daemon mode is suspended.
pub const FORCED_TERMINATION_THRESHOLD: u32 = 3;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Maximum wait for an executable that disappeared during an environment rebuild.
pub const REBUILD_WAIT: Duration = Duration::from_secs(10);
pub const REBUILD_POLL: Duration = Duration::from_millis(250);

/// Bounds for the retained worker stderr tail.
pub const OUTPUT_TAIL_LINES: usize = 40;
pub const OUTPUT_TAIL_BYTES: usize = 4096;

/// Resolved timing snapshot used by a supervisor instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    pub handshake_timeout: Duration,
    pub graceful_timeout: Duration,
    pub terminate_timeout: Duration,
    pub kill_timeout: Duration,
    pub stale_lock_age: Duration,
    pub max_recovery_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub forced_termination_threshold: u32,
    pub rebuild_wait: Duration,
    pub rebuild_poll: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            handshake_timeout: HANDSHAKE_TIMEOUT,
            graceful_timeout: GRACEFUL_SHUTDOWN_TIMEOUT,
            terminate_timeout: TERMINATE_TIMEOUT,
            kill_timeout: KILL_TIMEOUT,
            stale_lock_age: STALE_LOCK_AGE,
            max_recovery_attempts: MAX_RECOVERY_ATTEMPTS,
            backoff_base: RECOVERY_BACKOFF_BASE,
            backoff_max: RECOVERY_BACKOFF_MAX,
            forced_termination_threshold: FORCED_TERMINATION_THRESHOLD,
            rebuild_wait: REBUILD_WAIT,
            rebuild_poll: REBUILD_POLL,
        }
    }
}

impl Timing {
    /// Upper bound on a full three-phase stop.
    pub fn stop_budget(&self) -> Duration {
        self.graceful_timeout + self.terminate_timeout + self.kill_timeout
    }

    /// Upper bound on `start()`, excluding orphan cleanup.
    pub fn start_budget(&self) -> Duration {
        self.rebuild_wait + self.handshake_timeout + self.kill_timeout
    }
}
