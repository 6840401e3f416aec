// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idle shutdown.
//!
//! One task per process generation. It sleeps until the idle deadline, then
//! re-checks in-flight requests and background work before stopping the
//! worker; either keeps the worker alive for another full interval.

use std::sync::Weak;

use tokio::time::Instant;
use warden_core::{format_duration, LifecycleState};

use crate::supervisor::{Inner, Supervisor};

pub(crate) fn spawn(inner: Weak<Inner>, generation: u64) {
    tokio::spawn(async move {
        let mut rearmed_at = Instant::now();
        loop {
            let deadline = {
                let Some(inner) = inner.upgrade() else { return };
                let timeout = inner.config.lock().idle_timeout;
                if timeout.is_zero() {
                    return;
                }
                let state = inner.state.lock();
                if state.generation != generation || state.lifecycle != LifecycleState::Running {
                    return;
                }
                let last = Instant::from_std(state.last_activity).max(rearmed_at);
                last + timeout
            };
            tokio::time::sleep_until(deadline).await;

            let Some(inner) = inner.upgrade() else { return };
            let timeout = inner.config.lock().idle_timeout;
            if timeout.is_zero() {
                return;
            }
            let (busy, idle_for) = {
                let state = inner.state.lock();
                if state.generation != generation || state.lifecycle != LifecycleState::Running {
                    return;
                }
                let pending = state.process.as_ref().map_or(0, |p| p.pending_count());
                (
                    pending > 0 || inner.background.is_active(),
                    state.last_activity.elapsed(),
                )
            };
            if idle_for < timeout {
                continue;
            }
            if busy {
                tracing::debug!("idle deadline reached with work in flight, rearming");
                rearmed_at = Instant::now();
                continue;
            }

            tracing::info!(idle = %format_duration(idle_for), "idle timeout, stopping worker");
            Supervisor::from_inner(inner)
                .stop_generation(generation, "idle")
                .await;
            return;
        }
    });
}
