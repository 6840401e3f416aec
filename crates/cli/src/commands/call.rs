// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `warden call` - one request through a supervised worker

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use warden_supervisor::{Supervisor, SupervisorConfig};

use crate::exit_error::ExitError;
use crate::output::{error_json, error_text, print_json, OutputFormat};

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Worker method to invoke
    pub method: String,

    /// Request parameters as JSON (default: {})
    pub params: Option<String>,

    /// Request timeout in milliseconds (default: configured request timeout)
    #[arg(long = "timeout-ms")]
    pub timeout_ms: Option<u64>,
}

pub fn parse_params(raw: Option<&str>) -> Result<Value> {
    match raw {
        None => Ok(Value::Object(Default::default())),
        Some(raw) => serde_json::from_str(raw).with_context(|| format!("invalid params JSON: {raw}")),
    }
}

pub async fn handle(args: CallArgs, config: SupervisorConfig, format: OutputFormat) -> Result<()> {
    let params = parse_params(args.params.as_deref())?;
    let timeout = args
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(config.request_timeout);

    let supervisor = Supervisor::new(config);
    let result = supervisor
        .request_with_timeout(&args.method, params, timeout)
        .await;
    supervisor.stop("cli call finished").await;

    match (result, format) {
        (Ok(value), OutputFormat::Json) => print_json(&value),
        (Ok(value), OutputFormat::Text) => {
            match value {
                Value::String(s) => println!("{s}"),
                other => println!("{}", serde_json::to_string_pretty(&other)?),
            }
            Ok(())
        }
        (Err(e), OutputFormat::Json) => {
            print_json(&serde_json::json!({ "error": error_json(&e) }))?;
            Err(ExitError::silent(1).into())
        }
        (Err(e), OutputFormat::Text) => Err(ExitError::new(1, error_text(&e)).into()),
    }
}

#[cfg(test)]
#[path = "call_tests.rs"]
mod tests;
