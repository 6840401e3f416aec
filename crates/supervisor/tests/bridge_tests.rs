// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-request bridge mode and worker output handling.

// Allow panic/unwrap/expect in test code (matches lib.rs cfg_attr)
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{eventually, Fixture};
use serde_json::json;
use warden_supervisor::env::DAEMON_MODE_VAR;
use warden_supervisor::{
    run_oneshot, BridgeMode, LifecycleState, MemorySink, Stream, Supervisor, TracingSink,
};

const SECRET: &str = "sk-test-0123456789abcdef";

#[tokio::test]
async fn per_request_mode_spawns_a_worker_per_call() {
    let fx = Fixture::new();
    let mut config = fx.config("normal");
    config.bridge_mode = BridgeMode::PerRequest;
    let supervisor = Supervisor::new(config);

    let first = supervisor.request("health", json!({})).await.unwrap();
    let second = supervisor.request("health", json!({})).await.unwrap();

    assert_ne!(first["pid"], second["pid"]);
    assert_eq!(supervisor.state(), LifecycleState::Stopped);
    assert!(!supervisor.config().lock_dir().exists());
    assert!(!supervisor.diagnostics().daemon_enabled);
}

#[tokio::test]
async fn one_shot_worker_is_told_it_is_not_a_daemon() {
    let fx = Fixture::new();
    let config = fx.config("normal");

    let reply = run_oneshot(
        &config,
        "env",
        json!({"name": DAEMON_MODE_VAR}),
        Duration::from_secs(5),
        Arc::new(TracingSink),
    )
    .await
    .unwrap();
    assert_eq!(reply["value"], "0");
}

#[tokio::test]
async fn one_shot_worker_error_is_returned() {
    let fx = Fixture::new();
    let config = fx.config("normal");

    let err = run_oneshot(&config, "fail", json!({}), Duration::from_secs(5), Arc::new(TracingSink))
        .await
        .unwrap_err();
    assert!(matches!(err, warden_supervisor::SupervisorError::Worker { code: 1, .. }));
}

#[tokio::test]
async fn stderr_reaches_the_sink_with_secrets_redacted() {
    let fx = Fixture::new();
    let mut config = fx.config("normal");
    config
        .worker
        .env
        .insert("WARDEN_TEST_API_KEY".to_string(), SECRET.to_string());
    let sink = Arc::new(MemorySink::new());
    let supervisor = Supervisor::with_sink(config, sink.clone());

    supervisor
        .request("stderr", json!({"line": format!("using key {SECRET}")}))
        .await
        .unwrap();

    assert!(eventually(Duration::from_secs(2), || sink.contains("using key [REDACTED]")).await);
    assert!(!sink.contains(SECRET));
    assert!(sink
        .lines()
        .iter()
        .any(|(stream, line)| *stream == Stream::Stderr && line.contains("using key")));
    supervisor.stop("test").await;
}

#[tokio::test]
async fn redacted_tail_is_kept_in_failure_record() {
    let fx = Fixture::new();
    let mut config = fx.config("normal");
    config
        .worker
        .env
        .insert("WARDEN_TEST_API_KEY".to_string(), SECRET.to_string());
    let supervisor = Supervisor::new(config);
    supervisor.start().await.unwrap();

    supervisor
        .request("stderr", json!({"line": format!("fatal: bad key {SECRET}")}))
        .await
        .unwrap();
    let pid = supervisor.diagnostics().runtime.pid.unwrap();
    // Give the stderr reader a moment before the exit
    tokio::time::sleep(Duration::from_millis(100)).await;
    warden_supervisor::signal::force_kill(pid);

    assert!(eventually(Duration::from_secs(3), || supervisor.last_failure().is_some()).await);
    let failure = supervisor.last_failure().unwrap();
    assert!(failure.output_tail.iter().any(|l| l == "fatal: bad key [REDACTED]"));
    assert!(failure.output_tail.iter().all(|l| !l.contains(SECRET)));
    supervisor.dispose().await;
}
