// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for tests that drive the `warden-echo-worker` binary.

#![allow(dead_code)]

use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use warden_supervisor::{LifecycleState, Supervisor, SupervisorConfig};

pub const ECHO_WORKER: &str = env!("CARGO_BIN_EXE_warden-echo-worker");

/// Install a test-writer subscriber once per binary. Set `WARDEN_LOG` to see output.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("WARDEN_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Workspace and state directory for one test.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        std::fs::create_dir_all(dir.path().join("workspace")).expect("workspace dir");
        Self { dir }
    }

    pub fn workspace(&self) -> PathBuf {
        self.dir.path().join("workspace")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    /// Config pointing at the echo worker in the given fault mode, with
    /// timings short enough for tests.
    pub fn config(&self, mode: &str) -> SupervisorConfig {
        let mut config = SupervisorConfig::new(self.workspace(), self.state_dir());
        config.worker.path = Some(PathBuf::from(ECHO_WORKER));
        config.worker.name = "warden-echo-worker".to_string();
        config
            .worker
            .env
            .insert("WARDEN_ECHO_MODE".to_string(), mode.to_string());
        config.request_timeout = Duration::from_secs(5);
        config.idle_timeout = Duration::ZERO;

        let timing = &mut config.timing;
        timing.handshake_timeout = Duration::from_millis(1500);
        timing.graceful_timeout = Duration::from_millis(400);
        timing.terminate_timeout = Duration::from_millis(400);
        timing.kill_timeout = Duration::from_secs(2);
        timing.backoff_base = Duration::from_millis(20);
        timing.backoff_max = Duration::from_millis(100);
        timing.rebuild_wait = Duration::from_millis(50);
        timing.rebuild_poll = Duration::from_millis(10);
        config
    }

    /// Config whose first launch runs normally and whose later launches exit
    /// immediately.
    pub fn config_launching_once(&self) -> SupervisorConfig {
        let mut config = self.config("normal");
        let marker = self.dir.path().join("launched");
        config.worker.env.insert(
            "WARDEN_ECHO_LAUNCH_MARKER".to_string(),
            marker.display().to_string(),
        );
        config
    }

    pub fn supervisor(&self, mode: &str) -> Supervisor {
        Supervisor::new(self.config(mode))
    }
}

/// Poll `check` until it returns true or `timeout` passes.
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

pub async fn wait_for_state(supervisor: &Supervisor, state: LifecycleState, timeout: Duration) -> bool {
    eventually(timeout, || supervisor.state() == state).await
}

/// Run `fut` and return its output with the elapsed time.
pub async fn timed<F: Future>(fut: F) -> (F::Output, Duration) {
    let start = Instant::now();
    let out = fut.await;
    (out, start.elapsed())
}
