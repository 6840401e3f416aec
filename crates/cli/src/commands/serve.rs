// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `warden serve` - line-delimited JSON bridge over stdio
//!
//! Each input line is `{"id"?, "method", "params"?}`; each output line is
//! `{"id", "result"}` or `{"id", "error"}`. Requests run concurrently, so
//! responses may be written out of order. The worker starts on the first
//! request, stops when idle, and is shut down at end of input.

use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use warden_supervisor::{Supervisor, SupervisorConfig, SupervisorError};

use crate::output::error_json;

#[derive(Debug, Deserialize, PartialEq)]
pub struct ServeRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Parse one input line; `Ok(None)` for blank lines.
pub fn parse_line(line: &str) -> Result<Option<ServeRequest>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let mut request: ServeRequest =
        serde_json::from_str(line).map_err(|e| format!("invalid request: {e}"))?;
    if request.params.is_null() {
        request.params = Value::Object(Default::default());
    }
    Ok(Some(request))
}

pub fn response(id: Value, result: Result<Value, SupervisorError>) -> Value {
    match result {
        Ok(result) => json!({"id": id, "result": result}),
        Err(e) => json!({"id": id, "error": error_json(&e)}),
    }
}

fn parse_error(message: String) -> Value {
    json!({"id": Value::Null, "error": {"reason": "INVALID_REQUEST", "message": message}})
}

pub async fn handle(config: SupervisorConfig) -> Result<()> {
    let supervisor = Supervisor::new(config);

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Value>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(value) = out_rx.recv().await {
            let mut line = value.to_string();
            line.push('\n');
            if stdout.write_all(line.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut ctrl_c => {
                tracing::info!("serve interrupted");
                break;
            }
        };
        let Some(line) = line else { break };

        match parse_line(&line) {
            Ok(None) => {}
            Ok(Some(request)) => {
                let supervisor = supervisor.clone();
                let out_tx = out_tx.clone();
                tasks.spawn(async move {
                    let result = supervisor.request(&request.method, request.params).await;
                    let _ = out_tx.send(response(request.id, result));
                });
            }
            Err(message) => {
                tracing::debug!(%message, "rejecting serve input line");
                let _ = out_tx.send(parse_error(message));
            }
        }
        // Reap finished requests so the set does not grow unbounded
        while tasks.try_join_next().is_some() {}
    }

    while tasks.join_next().await.is_some() {}
    supervisor.dispose().await;
    drop(out_tx);
    let _ = writer.await;
    Ok(())
}

#[cfg(test)]
#[path = "serve_tests.rs"]
mod tests;
