// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator-facing status snapshot.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use warden_core::{format_duration, FailureRecord, LifecycleState, RecoveryState};

use crate::config::BridgeMode;
use crate::lock::LockStatus;
use crate::supervisor::Inner;

const SUSPENDED_HINT: &str =
    "Daemon mode is suspended after repeated forced terminations; requests use a fresh worker until a health check succeeds.";

#[derive(Debug, Clone, Serialize)]
pub struct RuntimeInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub pending_requests: usize,
    pub generation: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_ms: Option<u64>,
    pub forced_terminations: u32,
    pub protocol_faults: u64,
    pub background_jobs: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    pub workspace: PathBuf,
    pub state: LifecycleState,
    pub healthy: bool,
    pub daemon_enabled: bool,
    pub daemon_suspended: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<FailureRecord>,
    pub recovery: RecoveryState,
    pub lock: LockStatus,
    pub runtime: RuntimeInfo,
    pub hints: Vec<String>,
}

pub(crate) fn snapshot(inner: &Inner) -> DiagnosticsReport {
    let (workspace, daemon_enabled) = {
        let config = inner.config.lock();
        (
            config.workspace_root.clone(),
            config.bridge_mode == BridgeMode::Daemon,
        )
    };
    let lock = inner.lock.lock().inspect();

    let state = inner.state.lock();
    let process = state.process.as_ref();
    let healthy = state.lifecycle == LifecycleState::Running
        && process.is_some_and(|p| !p.has_exited());

    let mut hints: Vec<String> = state
        .last_failure
        .as_ref()
        .map(|f| f.reason.remediation().iter().map(|h| h.to_string()).collect())
        .unwrap_or_default();
    if state.daemon_suspended {
        hints.push(SUSPENDED_HINT.to_string());
    }

    DiagnosticsReport {
        workspace,
        state: state.lifecycle,
        healthy,
        daemon_enabled,
        daemon_suspended: state.daemon_suspended,
        last_failure: state.last_failure.clone(),
        recovery: state.recovery.clone(),
        lock,
        runtime: RuntimeInfo {
            pid: process.map(|p| p.pid()),
            pending_requests: process.map_or(0, |p| p.pending_count()),
            generation: state.generation,
            uptime_ms: process.map(|p| p.uptime().as_millis() as u64),
            forced_terminations: state.forced_terminations,
            protocol_faults: process.map_or(0, |p| p.protocol_faults()),
            background_jobs: inner.background.active(),
        },
        hints,
    }
}

impl DiagnosticsReport {
    /// Human-readable multi-line rendering.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "workspace:  {}", self.workspace.display());
        let _ = writeln!(
            out,
            "state:      {}{}",
            self.state,
            if self.healthy { " (healthy)" } else { "" }
        );
        let mode = match (self.daemon_enabled, self.daemon_suspended) {
            (false, _) => "per-request",
            (true, true) => "daemon (suspended)",
            (true, false) => "daemon",
        };
        let _ = writeln!(out, "mode:       {mode}");

        if let Some(pid) = self.runtime.pid {
            let uptime = self
                .runtime
                .uptime_ms
                .map(|ms| format_duration(Duration::from_millis(ms)))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "worker:     pid {pid}, up {uptime}, {} pending",
                self.runtime.pending_requests
            );
        }
        if self.runtime.protocol_faults > 0 {
            let _ = writeln!(out, "faults:     {}", self.runtime.protocol_faults);
        }
        if self.recovery.attempts > 0 {
            let _ = writeln!(
                out,
                "recovery:   {}/{} attempts",
                self.recovery.attempts.min(self.recovery.max_attempts),
                self.recovery.max_attempts
            );
        }

        let lock = if self.lock.held {
            "held by this supervisor".to_string()
        } else if let Some(owner) = &self.lock.owner {
            format!("held by pid {}", owner.pid)
        } else if self.lock.exists {
            "present without metadata".to_string()
        } else {
            "free".to_string()
        };
        let _ = writeln!(out, "lock:       {lock}");

        if let Some(failure) = &self.last_failure {
            let _ = writeln!(out, "failure:    {} {}", failure.reason, failure.details);
            for line in &failure.output_tail {
                let _ = writeln!(out, "  | {line}");
            }
        }
        for hint in &self.hints {
            let _ = writeln!(out, "hint:       {hint}");
        }
        out
    }
}
