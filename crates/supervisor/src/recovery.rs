// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash recovery scheduling.
//!
//! At most one recovery task is live: every reset or cancel bumps the
//! recovery epoch, and a task whose epoch is stale does nothing when it wakes.

use std::sync::Arc;

use warden_core::{format_duration, Backoff, LifecycleState, ReasonCode, RecoveryDecision};

use crate::supervisor::{Inner, StartKind, Supervisor};

/// Register a failure and either schedule a restart or give up.
pub(crate) fn schedule(inner: &Arc<Inner>) {
    let backoff = {
        let config = inner.config.lock();
        Backoff::new(config.timing.backoff_base, config.timing.backoff_max)
    };

    let (decision, epoch) = {
        let mut state = inner.state.lock();
        if state.disposed {
            return;
        }
        let decision = state.recovery.register_failure(&backoff);
        if let RecoveryDecision::Exhausted { .. } = decision {
            state.transition(LifecycleState::Degraded);
        }
        (decision, state.recovery.epoch)
    };

    match decision {
        RecoveryDecision::Exhausted { attempts } => {
            let tail = inner
                .state
                .lock()
                .last_failure
                .as_ref()
                .map(|f| f.output_tail.clone())
                .unwrap_or_default();
            inner.fail(
                ReasonCode::RecoveryBudgetExhausted,
                format!("worker failed after {attempts} automatic restarts"),
                tail,
            );
        }
        RecoveryDecision::Retry { attempt, delay } => {
            tracing::info!(attempt, delay = %format_duration(delay), "scheduling worker restart");
            let weak = Arc::downgrade(inner);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(inner) = weak.upgrade() {
                    recover(Supervisor::from_inner(inner), epoch).await;
                }
            });
        }
    }
}

async fn recover(supervisor: Supervisor, epoch: u64) {
    let _op = supervisor.inner.ops.lock().await;
    {
        let state = supervisor.inner.state.lock();
        let recoverable = matches!(
            state.lifecycle,
            LifecycleState::Crashed | LifecycleState::FailedStartup
        );
        if state.recovery.epoch != epoch || state.disposed || !recoverable {
            tracing::debug!(state = %state.lifecycle, "recovery attempt abandoned");
            return;
        }
    }
    if let Err(e) = supervisor.start_locked(StartKind::Recovery).await {
        tracing::warn!(error = %e, "recovery attempt failed");
    }
}
