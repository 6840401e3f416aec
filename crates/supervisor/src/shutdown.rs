// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Three-phase shutdown: cooperative request, SIGTERM, SIGKILL.

use std::time::Instant;

use serde::Serialize;
use warden_core::{format_duration, Timing};

use crate::signal;
use crate::worker::WorkerProcess;

/// The phase in which the worker actually exited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPhase {
    /// Exited after the `shutdown` request
    Cooperative,
    /// Exited after SIGTERM
    Escalated,
    /// Required SIGKILL
    Forced,
}

impl ShutdownPhase {
    pub fn is_forced(self) -> bool {
        self == ShutdownPhase::Forced
    }
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ShutdownPhase::Cooperative => "cooperative",
            ShutdownPhase::Escalated => "escalated",
            ShutdownPhase::Forced => "forced",
        })
    }
}

/// Drive the worker to exit. Bounded by `timing.stop_budget()` plus the
/// polling slack of each phase.
pub async fn escalate(worker: &WorkerProcess, timing: &Timing) -> ShutdownPhase {
    let pid = worker.pid();
    if let Some(exit) = worker.exit_info() {
        tracing::debug!(pid, %exit, "worker already exited");
        return ShutdownPhase::Cooperative;
    }

    let started = Instant::now();
    let sent = worker.notify("shutdown", timing.graceful_timeout).await;
    let remaining = timing.graceful_timeout.saturating_sub(started.elapsed());
    if let Some(exit) = worker.wait_exit(remaining).await {
        tracing::info!(pid, %exit, phase = "cooperative", "worker stopped");
        return ShutdownPhase::Cooperative;
    }
    tracing::warn!(
        pid,
        request_sent = sent,
        waited = %format_duration(timing.graceful_timeout),
        "worker ignored shutdown request, sending SIGTERM"
    );

    signal::terminate(pid);
    if let Some(exit) = worker.wait_exit(timing.terminate_timeout).await {
        tracing::info!(pid, %exit, phase = "escalated", "worker stopped");
        return ShutdownPhase::Escalated;
    }
    tracing::warn!(
        pid,
        waited = %format_duration(timing.terminate_timeout),
        "worker ignored SIGTERM, sending SIGKILL"
    );

    worker.kill();
    match worker.wait_exit(timing.kill_timeout).await {
        Some(exit) => tracing::warn!(pid, %exit, phase = "forced", "worker killed"),
        None => tracing::error!(pid, "worker still running after SIGKILL"),
    }
    ShutdownPhase::Forced
}
