// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervisor: lifecycle state machine and host-facing API.
//!
//! Lifecycle operations (start, stop, restart, recovery) serialize on an async
//! operation mutex. Shared state lives behind a `parking_lot` mutex that is
//! never held across an await point.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::Instrument;
use warden_core::{FailureRecord, LifecycleState, OutputTail, ReasonCode, RecoveryState};

use crate::activity::BackgroundWork;
use crate::config::{BridgeMode, SupervisorConfig};
use crate::diagnostics::{self, DiagnosticsReport};
use crate::error::SupervisorError;
use crate::handshake::{self, health_ok};
use crate::launcher;
use crate::lock::{self, LockManager};
use crate::oneshot;
use crate::shutdown::{self, ShutdownPhase};
use crate::signal;
use crate::sink::{LogSink, TracingSink};
use crate::worker::{ExitInfo, WorkerProcess};
use crate::{idle, recovery};

/// Why a start was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StartKind {
    /// Host call or on-demand start; abandons scheduled recovery.
    Explicit,
    /// Crash recovery; counts against the restart budget until it succeeds.
    Recovery,
}

/// Mutable supervisor state
pub(crate) struct SupervisorState {
    pub lifecycle: LifecycleState,
    pub process: Option<Arc<WorkerProcess>>,
    /// Bumped for every spawned process; background tasks compare it to
    /// detect that the process they belong to is gone.
    pub generation: u64,
    pub recovery: RecoveryState,
    pub forced_terminations: u32,
    pub daemon_suspended: bool,
    pub last_failure: Option<FailureRecord>,
    pub last_activity: Instant,
    pub disposed: bool,
    /// Completed stops that terminated a process, and the last one's phase.
    pub stops_completed: u64,
    pub last_stop: Option<ShutdownPhase>,
}

impl SupervisorState {
    fn new(max_recovery_attempts: u32) -> Self {
        Self {
            lifecycle: LifecycleState::Stopped,
            process: None,
            generation: 0,
            recovery: RecoveryState::new(max_recovery_attempts),
            forced_terminations: 0,
            daemon_suspended: false,
            last_failure: None,
            last_activity: Instant::now(),
            disposed: false,
            stops_completed: 0,
            last_stop: None,
        }
    }

    /// Apply a transition from the adjacency table; invalid ones are refused.
    pub fn transition(&mut self, next: LifecycleState) -> bool {
        match self.lifecycle.transition(next) {
            Ok(state) => {
                tracing::debug!(from = %self.lifecycle, to = %state, "lifecycle transition");
                self.lifecycle = state;
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "refusing lifecycle transition");
                false
            }
        }
    }

    /// A successful health check ends daemon-mode suspension.
    ///
    /// The forced-termination count only clears while suspended, so forced
    /// kills keep accumulating across ordinary start/stop cycles.
    fn health_confirmed(&mut self) {
        if !self.daemon_suspended {
            return;
        }
        tracing::info!("health check succeeded, daemon mode resumed");
        self.daemon_suspended = false;
        self.forced_terminations = 0;
    }
}

pub(crate) struct Inner {
    pub config: Mutex<SupervisorConfig>,
    pub state: Mutex<SupervisorState>,
    pub lock: Mutex<LockManager>,
    pub ops: tokio::sync::Mutex<()>,
    pub sink: Arc<dyn LogSink>,
    pub background: BackgroundWork,
}

impl Inner {
    pub fn release_lock(&self) {
        self.lock.lock().release();
    }

    fn pid_path(&self) -> std::path::PathBuf {
        self.config.lock().pid_path()
    }

    /// Record the most recent failure and build the matching error.
    pub fn fail(&self, reason: ReasonCode, message: String, tail: Vec<String>) -> SupervisorError {
        let correlation = self.lock.lock().correlation_id().clone();
        tracing::warn!(%reason, %message, "supervisor failure");
        let record = FailureRecord::new(reason, message.clone())
            .with_correlation(correlation)
            .with_tail(tail);
        self.state.lock().last_failure = Some(record);
        SupervisorError::failure(reason, message)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let running = self.state.get_mut().process.take().is_some();
        if running {
            lock::remove_pid_marker(&self.config.get_mut().pid_path());
        }
        self.lock.get_mut().release();
    }
}

/// Supervises one worker process for one workspace.
///
/// Cheap to clone; all clones share the same worker.
#[derive(Clone)]
pub struct Supervisor {
    pub(crate) inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    pub fn with_sink(config: SupervisorConfig, sink: Arc<dyn LogSink>) -> Self {
        let lock = LockManager::new(&config);
        let state = SupervisorState::new(config.timing.max_recovery_attempts);
        Self {
            inner: Arc::new(Inner {
                config: Mutex::new(config),
                state: Mutex::new(state),
                lock: Mutex::new(lock),
                ops: tokio::sync::Mutex::new(()),
                sink,
                background: BackgroundWork::new(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    pub fn config(&self) -> SupervisorConfig {
        self.inner.config.lock().clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.state.lock().lifecycle
    }

    pub fn daemon_suspended(&self) -> bool {
        self.inner.state.lock().daemon_suspended
    }

    /// Handle for registering background work that defers idle shutdown.
    pub fn background(&self) -> BackgroundWork {
        self.inner.background.clone()
    }

    pub fn last_failure(&self) -> Option<FailureRecord> {
        self.inner.state.lock().last_failure.clone()
    }

    /// Running with a live process.
    pub fn is_healthy(&self) -> bool {
        let state = self.inner.state.lock();
        state.lifecycle == LifecycleState::Running
            && state.process.as_ref().is_some_and(|p| !p.has_exited())
    }

    /// Replace the configuration snapshot.
    ///
    /// Timeouts and bridge mode apply to the next request; executable and
    /// environment changes apply on the next start.
    pub fn update_config(&self, config: SupervisorConfig) {
        let mut lock = self.inner.lock.lock();
        let relocated = config.lock_dir() != lock.path();
        if relocated && !lock.is_held() {
            *lock = LockManager::new(&config);
        } else if relocated {
            tracing::warn!("lock location changed while held, keeping the current lock until stop");
        }
        drop(lock);
        self.inner.state.lock().recovery.max_attempts = config.timing.max_recovery_attempts;
        *self.inner.config.lock() = config;
    }

    /// Acquire the workspace lock without starting a worker.
    pub fn acquire_lock(&self) -> bool {
        self.inner.lock.lock().acquire()
    }

    pub fn release_lock(&self) {
        self.inner.release_lock();
    }

    /// Start the worker and complete the health handshake.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let _op = self.inner.ops.lock().await;
        self.start_locked(StartKind::Explicit).await
    }

    pub(crate) async fn start_locked(&self, kind: StartKind) -> Result<(), SupervisorError> {
        let config = self.config();
        if config.bridge_mode == BridgeMode::PerRequest {
            return Err(SupervisorError::failure(
                ReasonCode::DaemonDisabled,
                "daemon mode is disabled (bridge_mode = per_request)",
            ));
        }

        {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return Err(SupervisorError::failure(
                    ReasonCode::ProcessNotAvailable,
                    "supervisor has been disposed",
                ));
            }
            match state.lifecycle {
                LifecycleState::Running => return Ok(()),
                s if !s.accepts_start() => {
                    return Err(SupervisorError::failure(
                        ReasonCode::StartupInProgress,
                        format!("cannot start while {s}"),
                    ))
                }
                _ => {}
            }
            match kind {
                StartKind::Explicit => state.recovery.cancel(),
                StartKind::Recovery => state.recovery.mark_attempt(),
            }
            state.transition(LifecycleState::Starting);
        }

        let span = tracing::info_span!("start", workspace = %config.workspace_root.display(), ?kind);
        let outcome = self.launch(&config, kind).instrument(span).await;

        match outcome {
            Ok(()) => {
                tracing::info!(workspace = %config.workspace_root.display(), "worker running");
                Ok(())
            }
            Err(failure) => {
                {
                    let mut state = self.inner.state.lock();
                    state.process = None;
                    state.transition(LifecycleState::FailedStartup);
                }
                self.inner.release_lock();
                let err = self.inner.fail(failure.reason, failure.message, failure.tail);
                if kind == StartKind::Recovery {
                    recovery::schedule(&self.inner);
                }
                Err(err)
            }
        }
    }

    async fn launch(&self, config: &SupervisorConfig, kind: StartKind) -> Result<(), StartFailure> {
        // 1. lock
        let acquired = self.inner.lock.lock().try_acquire();
        if let Err(e) = acquired {
            return Err(StartFailure::new(e.reason(), e.to_string()));
        }

        // 2. orphan from a previous host
        let pid_path = config.pid_path();
        if let Some(pid) = lock::read_pid_marker(&pid_path) {
            if pid != std::process::id() && signal::process_exists(pid) {
                tracing::warn!(pid, "terminating orphaned worker");
                let timing = &config.timing;
                if !signal::terminate_orphan(pid, timing.terminate_timeout, timing.kill_timeout).await
                {
                    tracing::error!(pid, "orphaned worker survived SIGKILL");
                }
            }
            lock::remove_pid_marker(&pid_path);
        }

        // 3. spawn
        let path = launcher::resolve_executable(config)
            .await
            .map_err(|e| StartFailure::new(e.reason(), e.to_string()))?;
        let spawned = launcher::spawn(config, &path, true)
            .map_err(|e| StartFailure::new(e.reason(), e.to_string()))?;

        let generation = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            state.generation
        };
        let weak = self.downgrade();
        let tail = OutputTail::default().with_secrets(config.secrets());
        let worker = Arc::new(WorkerProcess::start(
            spawned,
            generation,
            tail,
            Arc::clone(&self.inner.sink),
            Box::new(move |exit| {
                if let Some(inner) = weak.upgrade() {
                    on_worker_exit(&inner, generation, exit);
                }
            }),
        ));
        self.inner.state.lock().process = Some(Arc::clone(&worker));
        tracing::debug!(pid = worker.pid(), path = %path.display(), "worker launched");

        // 4. handshake
        if let Err(failure) = handshake::handshake(&worker, config.timing.handshake_timeout).await {
            worker.kill();
            worker.wait_exit(config.timing.kill_timeout).await;
            let tail = worker.stderr_tail();
            return Err(StartFailure {
                reason: failure.reason,
                message: failure.message,
                tail,
            });
        }

        // 5. running; an exit observed before this point was ignored by the
        // exit callback, so it must be caught here
        {
            let mut state = self.inner.state.lock();
            if let Some(exit) = worker.exit_info() {
                drop(state);
                return Err(StartFailure {
                    reason: ReasonCode::ImmediateExit,
                    message: format!("worker exited right after the health check ({exit})"),
                    tail: worker.stderr_tail(),
                });
            }
            state.transition(LifecycleState::Running);
            state.health_confirmed();
            state.last_activity = Instant::now();
            match kind {
                StartKind::Explicit => state.recovery.reset(),
                StartKind::Recovery => state.recovery.succeeded(),
            }
        }
        if let Err(e) = lock::write_pid_marker(&pid_path, worker.pid()) {
            tracing::warn!(error = %e, "failed to write recovery marker");
        }
        idle::spawn(self.downgrade(), generation);
        Ok(())
    }

    /// Stop the worker. Idempotent; returns the phase in which the worker
    /// exited, or `None` when no worker was running.
    ///
    /// A caller that queued behind a stop already in progress receives that
    /// stop's phase.
    pub async fn stop(&self, reason: &str) -> Option<ShutdownPhase> {
        let seen = self.inner.state.lock().stops_completed;
        let _op = self.inner.ops.lock().await;
        {
            let state = self.inner.state.lock();
            if state.stops_completed != seen && state.lifecycle == LifecycleState::Stopped {
                return state.last_stop;
            }
        }
        self.stop_locked(reason).await
    }

    /// Stop only if the given process generation is still current.
    pub(crate) async fn stop_generation(&self, generation: u64, reason: &str) {
        let _op = self.inner.ops.lock().await;
        if self.inner.state.lock().generation != generation {
            return;
        }
        self.stop_locked(reason).await;
    }

    pub(crate) async fn stop_locked(&self, reason: &str) -> Option<ShutdownPhase> {
        let (lifecycle, process) = {
            let mut state = self.inner.state.lock();
            let lifecycle = state.lifecycle;
            match lifecycle {
                LifecycleState::Running => {
                    state.transition(LifecycleState::Stopping);
                    (lifecycle, state.process.take())
                }
                LifecycleState::Crashed | LifecycleState::FailedStartup => {
                    state.recovery.reset();
                    state.transition(LifecycleState::Stopped);
                    (lifecycle, None)
                }
                _ => return None,
            }
        };
        let pid_path = self.inner.pid_path();

        let Some(process) = process else {
            if lifecycle == LifecycleState::Running {
                self.inner.state.lock().transition(LifecycleState::Stopped);
            }
            tracing::info!(%reason, from = %lifecycle, "supervisor stopped");
            lock::remove_pid_marker(&pid_path);
            self.inner.release_lock();
            return None;
        };

        let timing = self.inner.config.lock().timing.clone();
        let span = tracing::info_span!("stop", %reason, pid = process.pid());
        let phase = shutdown::escalate(&process, &timing).instrument(span).await;

        {
            let mut state = self.inner.state.lock();
            state.transition(LifecycleState::Stopped);
            state.recovery.reset();
            state.stops_completed += 1;
            state.last_stop = Some(phase);
            if phase.is_forced() {
                state.forced_terminations += 1;
                if state.forced_terminations >= timing.forced_termination_threshold
                    && !state.daemon_suspended
                {
                    state.daemon_suspended = true;
                    tracing::warn!(
                        forced = state.forced_terminations,
                        "repeated forced terminations, daemon mode suspended"
                    );
                }
            } else {
                state.forced_terminations = 0;
            }
        }
        lock::remove_pid_marker(&pid_path);
        self.inner.release_lock();
        tracing::info!(%reason, %phase, "supervisor stopped");
        Some(phase)
    }

    pub async fn restart(&self) -> Result<(), SupervisorError> {
        let _op = self.inner.ops.lock().await;
        self.stop_locked("restart").await;
        self.start_locked(StartKind::Explicit).await
    }

    /// Stop and refuse further starts.
    pub async fn dispose(&self) {
        let _op = self.inner.ops.lock().await;
        self.stop_locked("dispose").await;
        let mut state = self.inner.state.lock();
        state.disposed = true;
        state.recovery.cancel();
        drop(state);
        self.inner.release_lock();
    }

    /// Send a request using the configured request timeout.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, SupervisorError> {
        let timeout = self.inner.config.lock().request_timeout;
        self.request_with_timeout(method, params, timeout).await
    }

    pub async fn request_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, SupervisorError> {
        let config = self.config();
        if config.bridge_mode == BridgeMode::PerRequest || self.use_fallback() {
            return oneshot::run_oneshot(&config, method, params, timeout, Arc::clone(&self.inner.sink))
                .await;
        }

        let worker = self.ready_worker(&config).await?;
        self.touch();
        let result = worker.call(method, params, timeout).await;
        self.touch();
        result.map_err(SupervisorError::from)
    }

    /// Suspended daemons serve requests through a fresh worker each time
    /// until a health check succeeds.
    fn use_fallback(&self) -> bool {
        let state = self.inner.state.lock();
        state.daemon_suspended && state.lifecycle != LifecycleState::Running
    }

    async fn ready_worker(
        &self,
        config: &SupervisorConfig,
    ) -> Result<Arc<WorkerProcess>, SupervisorError> {
        let (lifecycle, process) = {
            let state = self.inner.state.lock();
            (state.lifecycle, state.process.clone())
        };
        match lifecycle {
            LifecycleState::Running => process.ok_or_else(not_available),
            LifecycleState::Starting => Err(SupervisorError::failure(
                ReasonCode::StartupInProgress,
                "worker is starting",
            )),
            LifecycleState::Stopped if config.auto_start => {
                self.start().await?;
                self.inner
                    .state
                    .lock()
                    .process
                    .clone()
                    .ok_or_else(not_available)
            }
            LifecycleState::Degraded => Err(SupervisorError::failure(
                ReasonCode::RecoveryBudgetExhausted,
                "automatic restarts exhausted; start the supervisor explicitly",
            )),
            other => Err(SupervisorError::failure(
                ReasonCode::ProcessNotAvailable,
                format!("worker is {other}"),
            )),
        }
    }

    fn touch(&self) {
        self.inner.state.lock().last_activity = Instant::now();
    }

    /// Run a `health` request against the worker.
    ///
    /// Success clears daemon-mode suspension. While suspended and stopped the
    /// check runs against a one-shot worker.
    pub async fn check_health(&self) -> bool {
        let config = self.config();
        let process = self.inner.state.lock().process.clone();
        let timeout = config.timing.handshake_timeout;

        let healthy = match process {
            Some(worker) => match worker.call("health", Value::Object(Default::default()), timeout).await {
                Ok(result) => health_ok(&result),
                Err(e) => {
                    tracing::debug!(error = %e, "health check failed");
                    false
                }
            },
            None if self.daemon_suspended() => {
                oneshot::run_oneshot(
                    &config,
                    "health",
                    Value::Object(Default::default()),
                    timeout,
                    Arc::clone(&self.inner.sink),
                )
                .await
                .is_ok_and(|result| health_ok(&result))
            }
            None => false,
        };

        if healthy {
            self.inner.state.lock().health_confirmed();
        }
        healthy
    }

    /// Side-effect free snapshot for operators and hosts.
    pub fn diagnostics(&self) -> DiagnosticsReport {
        diagnostics::snapshot(&self.inner)
    }
}

fn not_available() -> SupervisorError {
    SupervisorError::failure(ReasonCode::ProcessNotAvailable, "no worker process is running")
}

struct StartFailure {
    reason: ReasonCode,
    message: String,
    tail: Vec<String>,
}

impl StartFailure {
    fn new(reason: ReasonCode, message: String) -> Self {
        Self {
            reason,
            message,
            tail: Vec::new(),
        }
    }
}

/// Exit callback: a running worker that exits on its own has crashed.
fn on_worker_exit(inner: &Arc<Inner>, generation: u64, exit: ExitInfo) {
    let tail = {
        let mut state = inner.state.lock();
        if state.generation != generation || state.lifecycle != LifecycleState::Running {
            return;
        }
        let tail = state
            .process
            .take()
            .map(|p| p.stderr_tail())
            .unwrap_or_default();
        state.transition(LifecycleState::Crashed);
        tail
    };

    tracing::error!(%exit, "worker exited unexpectedly");
    lock::remove_pid_marker(&inner.pid_path());
    inner.release_lock();
    inner.fail(
        ReasonCode::UnexpectedExit,
        format!("worker exited unexpectedly ({exit})"),
        tail,
    );
    recovery::schedule(inner);
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
