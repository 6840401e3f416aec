// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idle shutdown and the work that defers it.

// Allow panic/unwrap/expect in test code (matches lib.rs cfg_attr)
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use std::time::Duration;

use common::{wait_for_state, Fixture};
use serde_json::json;
use warden_supervisor::{LifecycleState, Supervisor};

const IDLE: Duration = Duration::from_millis(300);

fn idle_supervisor(fx: &Fixture) -> Supervisor {
    let mut config = fx.config("normal");
    config.idle_timeout = IDLE;
    Supervisor::new(config)
}

#[tokio::test]
async fn idle_worker_is_stopped() {
    let fx = Fixture::new();
    let supervisor = idle_supervisor(&fx);
    supervisor.start().await.unwrap();

    assert!(wait_for_state(&supervisor, LifecycleState::Stopped, Duration::from_secs(4)).await);
    assert!(!supervisor.config().lock_dir().exists());
    assert!(supervisor.last_failure().is_none());
}

#[tokio::test]
async fn idle_stop_is_transparent_to_the_next_request() {
    let fx = Fixture::new();
    let supervisor = idle_supervisor(&fx);
    supervisor.start().await.unwrap();
    assert!(wait_for_state(&supervisor, LifecycleState::Stopped, Duration::from_secs(4)).await);

    let reply = supervisor.request("echo", json!("again")).await.unwrap();
    assert_eq!(reply, json!("again"));
    assert_eq!(supervisor.diagnostics().runtime.generation, 2);
    supervisor.stop("test").await;
}

#[tokio::test]
async fn background_work_defers_idle_stop() {
    let fx = Fixture::new();
    let supervisor = idle_supervisor(&fx);
    supervisor.start().await.unwrap();

    let guard = supervisor.background().begin();
    tokio::time::sleep(IDLE * 3).await;
    assert_eq!(supervisor.state(), LifecycleState::Running);
    assert_eq!(supervisor.diagnostics().runtime.background_jobs, 1);

    drop(guard);
    assert!(wait_for_state(&supervisor, LifecycleState::Stopped, Duration::from_secs(4)).await);
}

#[tokio::test]
async fn in_flight_request_defers_idle_stop() {
    let fx = Fixture::new();
    let supervisor = idle_supervisor(&fx);
    supervisor.start().await.unwrap();

    let reply = supervisor.request("sleep", json!({"ms": 900})).await.unwrap();
    assert_eq!(reply, json!({"slept_ms": 900}));
    assert_eq!(supervisor.state(), LifecycleState::Running);

    assert!(wait_for_state(&supervisor, LifecycleState::Stopped, Duration::from_secs(4)).await);
}

#[tokio::test]
async fn activity_resets_the_idle_deadline() {
    let fx = Fixture::new();
    let supervisor = idle_supervisor(&fx);
    supervisor.start().await.unwrap();

    for _ in 0..5 {
        tokio::time::sleep(IDLE / 2).await;
        supervisor.request("echo", json!({})).await.unwrap();
    }
    assert_eq!(supervisor.state(), LifecycleState::Running);
    assert_eq!(supervisor.diagnostics().runtime.generation, 1);
    supervisor.stop("test").await;
}

#[tokio::test]
async fn zero_idle_timeout_disables_idle_stop() {
    let fx = Fixture::new();
    let supervisor = fx.supervisor("normal");
    assert!(supervisor.config().idle_timeout.is_zero());
    supervisor.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(supervisor.state(), LifecycleState::Running);
    supervisor.stop("test").await;
}
