// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::ValueEnum;
use serde::Serialize;
use warden_supervisor::SupervisorError;

#[derive(Clone, Copy, Debug, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// JSON shape of a failed request, shared by `call` and `serve`.
pub fn error_json(err: &SupervisorError) -> serde_json::Value {
    match err {
        SupervisorError::Failure { reason, message } => serde_json::json!({
            "reason": reason,
            "message": message,
            "remediation": reason.remediation(),
        }),
        SupervisorError::Worker {
            code,
            message,
            data,
        } => serde_json::json!({
            "code": code,
            "message": message,
            "data": data,
        }),
    }
}

/// Human-readable error with remediation hints, one per line.
pub fn error_text(err: &SupervisorError) -> String {
    let mut out = err.to_string();
    for hint in err.remediation() {
        out.push_str("\n  hint: ");
        out.push_str(hint);
    }
    out
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
