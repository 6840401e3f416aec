// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stable failure reason codes.
//!
//! Codes are part of the host-facing contract: they appear in diagnostics and
//! error messages and are never repurposed. New failure modes get new codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse grouping of reason codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCategory {
    Startup,
    Lock,
    Blocked,
    Recovery,
    Runtime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    // startup
    SpawnFailed,
    StdioUnavailable,
    StartupTimeout,
    StartupHung,
    HandshakeFailed,
    ProtocolError,
    ImmediateExit,
    // lock
    LockHeld,
    LockAcquisitionFailed,
    // operational blocks
    ExternalMutationInProgress,
    DaemonDisabled,
    // recovery
    RecoveryBudgetExhausted,
    // runtime
    ProcessNotAvailable,
    RequestTimeout,
    StartupInProgress,
    UnexpectedExit,
}

impl ReasonCode {
    pub const ALL: [ReasonCode; 16] = [
        ReasonCode::SpawnFailed,
        ReasonCode::StdioUnavailable,
        ReasonCode::StartupTimeout,
        ReasonCode::StartupHung,
        ReasonCode::HandshakeFailed,
        ReasonCode::ProtocolError,
        ReasonCode::ImmediateExit,
        ReasonCode::LockHeld,
        ReasonCode::LockAcquisitionFailed,
        ReasonCode::ExternalMutationInProgress,
        ReasonCode::DaemonDisabled,
        ReasonCode::RecoveryBudgetExhausted,
        ReasonCode::ProcessNotAvailable,
        ReasonCode::RequestTimeout,
        ReasonCode::StartupInProgress,
        ReasonCode::UnexpectedExit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::SpawnFailed => "SPAWN_FAILED",
            ReasonCode::StdioUnavailable => "STDIO_UNAVAILABLE",
            ReasonCode::StartupTimeout => "STARTUP_TIMEOUT",
            ReasonCode::StartupHung => "STARTUP_HUNG",
            ReasonCode::HandshakeFailed => "HANDSHAKE_FAILED",
            ReasonCode::ProtocolError => "PROTOCOL_ERROR",
            ReasonCode::ImmediateExit => "IMMEDIATE_EXIT",
            ReasonCode::LockHeld => "LOCK_HELD",
            ReasonCode::LockAcquisitionFailed => "LOCK_ACQUISITION_FAILED",
            ReasonCode::ExternalMutationInProgress => "EXTERNAL_MUTATION_IN_PROGRESS",
            ReasonCode::DaemonDisabled => "DAEMON_DISABLED",
            ReasonCode::RecoveryBudgetExhausted => "RECOVERY_BUDGET_EXHAUSTED",
            ReasonCode::ProcessNotAvailable => "PROCESS_NOT_AVAILABLE",
            ReasonCode::RequestTimeout => "REQUEST_TIMEOUT",
            ReasonCode::StartupInProgress => "STARTUP_IN_PROGRESS",
            ReasonCode::UnexpectedExit => "UNEXPECTED_EXIT",
        }
    }

    pub fn category(self) -> ReasonCategory {
        match self {
            ReasonCode::SpawnFailed
            | ReasonCode::StdioUnavailable
            | ReasonCode::StartupTimeout
            | ReasonCode::StartupHung
            | ReasonCode::HandshakeFailed
            | ReasonCode::ProtocolError
            | ReasonCode::ImmediateExit => ReasonCategory::Startup,
            ReasonCode::LockHeld | ReasonCode::LockAcquisitionFailed => ReasonCategory::Lock,
            ReasonCode::ExternalMutationInProgress | ReasonCode::DaemonDisabled => {
                ReasonCategory::Blocked
            }
            ReasonCode::RecoveryBudgetExhausted => ReasonCategory::Recovery,
            ReasonCode::ProcessNotAvailable
            | ReasonCode::RequestTimeout
            | ReasonCode::StartupInProgress
            | ReasonCode::UnexpectedExit => ReasonCategory::Runtime,
        }
    }

    /// Operator-facing remediation hints for this failure.
    pub fn remediation(self) -> &'static [&'static str] {
        match self {
            ReasonCode::SpawnFailed => &[
                "Check that the worker executable exists and is executable.",
                "Set worker.path in .warden/config.toml or WARDEN_WORKER_PATH.",
            ],
            ReasonCode::StdioUnavailable => &[
                "The worker started without usable stdin/stdout/stderr pipes.",
                "Make sure the worker is not detaching or closing its standard streams.",
            ],
            ReasonCode::StartupTimeout => &[
                "The worker produced output but never answered the health check.",
                "Inspect the stderr tail for slow initialization, or raise handshake_timeout_ms.",
            ],
            ReasonCode::StartupHung => &[
                "The worker produced no output at all before the handshake deadline.",
                "Check that the worker reads requests from stdin and flushes stdout.",
            ],
            ReasonCode::HandshakeFailed => &[
                "The worker rejected the health check.",
                "Inspect the stderr tail for configuration or credential errors.",
            ],
            ReasonCode::ProtocolError => &[
                "The worker wrote output that is not newline-delimited JSON.",
                "Make sure logging goes to stderr, never stdout.",
            ],
            ReasonCode::ImmediateExit => &[
                "The worker exited before completing the handshake.",
                "Run the worker by hand to see its startup error.",
            ],
            ReasonCode::LockHeld => &[
                "Another supervisor owns this workspace.",
                "Close the other window or wait for it to stop; `warden status` shows the owner.",
            ],
            ReasonCode::LockAcquisitionFailed => &[
                "The workspace lock could not be created.",
                "Check permissions on the state directory.",
            ],
            ReasonCode::ExternalMutationInProgress => &[
                "The worker environment is being rebuilt.",
                "Retry once the rebuild finishes.",
            ],
            ReasonCode::DaemonDisabled => &[
                "Daemon mode is disabled; requests run in per-request mode.",
                "Set bridge_mode = \"daemon\" to use a persistent worker.",
            ],
            ReasonCode::RecoveryBudgetExhausted => &[
                "The worker crashed repeatedly and automatic restarts were stopped.",
                "Fix the underlying crash, then start the supervisor explicitly.",
            ],
            ReasonCode::ProcessNotAvailable => &[
                "No worker process is running.",
                "Start the supervisor before sending requests.",
            ],
            ReasonCode::RequestTimeout => &[
                "The worker did not answer in time; it may still be processing.",
                "Raise request_timeout_ms for long-running methods.",
            ],
            ReasonCode::StartupInProgress => &["The worker is still starting; retry shortly."],
            ReasonCode::UnexpectedExit => &[
                "The worker exited while running; an automatic restart is scheduled.",
                "Inspect the stderr tail for the crash cause.",
            ],
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "reason_tests.rs"]
mod tests;
