// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup health handshake and its failure classification.

use std::time::Duration;

use serde_json::{json, Value};
use warden_core::ReasonCode;

use crate::pending::CallError;
use crate::worker::WorkerProcess;

/// How long to wait for an exit after the health request could not be written.
const WRITE_FAILURE_EXIT_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeFailure {
    pub reason: ReasonCode,
    pub message: String,
}

impl HandshakeFailure {
    fn new(reason: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

/// Whether a `health` result reports a healthy worker.
///
/// A `status` field, when present, must be `ok` or `healthy`.
pub fn health_ok(result: &Value) -> bool {
    match result.get("status") {
        Some(Value::String(s)) => s.eq_ignore_ascii_case("ok") || s.eq_ignore_ascii_case("healthy"),
        Some(_) => false,
        None => true,
    }
}

/// Send `health` and wait for a healthy answer within `timeout`.
///
/// Any non-protocol stdout line during the handshake fails it immediately.
pub async fn handshake(worker: &WorkerProcess, timeout: Duration) -> Result<(), HandshakeFailure> {
    let mut faults = worker.faults();
    let health = worker.call("health", json!({}), timeout);
    tokio::pin!(health);

    let outcome = tokio::select! {
        biased;
        Ok(()) = faults.changed() => None,
        outcome = &mut health => Some(outcome),
    };

    let outcome = match outcome {
        Some(outcome) if worker.protocol_faults() == 0 => outcome,
        _ => {
            return Err(HandshakeFailure::new(
                ReasonCode::ProtocolError,
                "worker wrote non-protocol output to stdout during startup",
            ))
        }
    };

    match outcome {
        Ok(result) if health_ok(&result) => Ok(()),
        Ok(result) => Err(HandshakeFailure::new(
            ReasonCode::HandshakeFailed,
            format!("health check reported {result}"),
        )),
        Err(CallError::Worker(body)) => Err(HandshakeFailure::new(
            ReasonCode::HandshakeFailed,
            format!("health check failed: {} ({})", body.message, body.code),
        )),
        Err(CallError::Protocol(message)) => Err(HandshakeFailure::new(
            ReasonCode::ProtocolError,
            format!("invalid health response: {message}"),
        )),
        Err(CallError::Duplicate(id)) => Err(HandshakeFailure::new(
            ReasonCode::ProtocolError,
            format!("request id {id} collided"),
        )),
        Err(CallError::Exited(status)) => Err(HandshakeFailure::new(
            ReasonCode::ImmediateExit,
            format!("worker exited during startup ({status})"),
        )),
        Err(CallError::Write(message)) => match worker.wait_exit(WRITE_FAILURE_EXIT_WAIT).await {
            Some(info) => Err(HandshakeFailure::new(
                ReasonCode::ImmediateExit,
                format!("worker exited during startup ({info})"),
            )),
            None => Err(HandshakeFailure::new(
                ReasonCode::StdioUnavailable,
                format!("could not write to worker stdin: {message}"),
            )),
        },
        Err(CallError::Timeout(after)) if worker.output_seen() => Err(HandshakeFailure::new(
            ReasonCode::StartupTimeout,
            format!(
                "worker produced output but did not answer health within {}",
                warden_core::format_duration(after)
            ),
        )),
        Err(CallError::Timeout(after)) => Err(HandshakeFailure::new(
            ReasonCode::StartupHung,
            format!(
                "worker produced no output within {}",
                warden_core::format_duration(after)
            ),
        )),
    }
}
