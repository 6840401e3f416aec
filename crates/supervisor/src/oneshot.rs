// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-request bridge: a fresh worker for a single request.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use warden_core::OutputTail;

use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use crate::launcher;
use crate::sink::LogSink;
use crate::worker::WorkerProcess;

/// How long a one-shot worker may take to exit after its stdin closes.
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// Spawn a worker in per-request mode, send one request, and reap it.
pub async fn run_oneshot(
    config: &SupervisorConfig,
    method: &str,
    params: Value,
    timeout: Duration,
    sink: Arc<dyn LogSink>,
) -> Result<Value, SupervisorError> {
    let launch_failure = |e: launcher::LaunchError| SupervisorError::failure(e.reason(), e.to_string());
    let path = launcher::resolve_executable(config)
        .await
        .map_err(launch_failure)?;
    let spawned = launcher::spawn(config, &path, false).map_err(launch_failure)?;

    let tail = OutputTail::default().with_secrets(config.secrets());
    let worker = WorkerProcess::start(spawned, 0, tail, sink, Box::new(|_| {}));
    tracing::debug!(pid = worker.pid(), method, "one-shot worker started");

    let result = worker.call(method, params, timeout).await;

    worker.close_stdin().await;
    if worker.wait_exit(EXIT_GRACE).await.is_none() {
        tracing::debug!(pid = worker.pid(), "one-shot worker lingering, killing");
        worker.kill();
        worker.wait_exit(config.timing.kill_timeout).await;
    }

    result.map_err(SupervisorError::from)
}
