// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors surfaced to hosts.

use serde_json::Value;
use thiserror::Error;
use warden_core::ReasonCode;

use crate::pending::CallError;

/// Every supervisor failure carries exactly one reason code; worker-level
/// error responses are passed through unchanged.
#[derive(Debug, Clone, Error)]
pub enum SupervisorError {
    #[error("{reason}: {message}")]
    Failure { reason: ReasonCode, message: String },

    #[error("worker error {code}: {message}")]
    Worker {
        code: i64,
        message: String,
        data: Option<Value>,
    },
}

impl SupervisorError {
    pub fn failure(reason: ReasonCode, message: impl Into<String>) -> Self {
        SupervisorError::Failure {
            reason,
            message: message.into(),
        }
    }

    /// Reason code, or `None` for a worker-level error response.
    pub fn reason(&self) -> Option<ReasonCode> {
        match self {
            SupervisorError::Failure { reason, .. } => Some(*reason),
            SupervisorError::Worker { .. } => None,
        }
    }

    pub fn remediation(&self) -> &'static [&'static str] {
        self.reason().map(ReasonCode::remediation).unwrap_or(&[])
    }
}

impl From<CallError> for SupervisorError {
    fn from(err: CallError) -> Self {
        let reason = match &err {
            CallError::Worker(body) => {
                return SupervisorError::Worker {
                    code: body.code,
                    message: body.message.clone(),
                    data: body.data.clone(),
                }
            }
            CallError::Timeout(_) => ReasonCode::RequestTimeout,
            CallError::Protocol(_) | CallError::Duplicate(_) => ReasonCode::ProtocolError,
            CallError::Exited(_) | CallError::Write(_) => ReasonCode::ProcessNotAvailable,
        };
        SupervisorError::failure(reason, err.to_string())
    }
}
