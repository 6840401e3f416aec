// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor lifecycle states and the transition table.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lifecycle state of a supervised worker.
///
/// `Stopped` and `Degraded` are terminal until an explicit `start()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Crashed,
    FailedStartup,
    Degraded,
}

/// Rejected lifecycle transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid lifecycle transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

impl LifecycleState {
    /// States reachable from `self` in one step.
    pub fn successors(self) -> &'static [LifecycleState] {
        use LifecycleState::*;
        match self {
            Stopped => &[Starting],
            Starting => &[Running, FailedStartup],
            Running => &[Stopping, Crashed],
            Stopping => &[Stopped],
            Crashed => &[Starting, Degraded, Stopped],
            FailedStartup => &[Starting, Degraded, Stopped],
            Degraded => &[Starting],
        }
    }

    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        self.successors().contains(&next)
    }

    /// Validate a transition, returning the new state on success.
    pub fn transition(self, next: LifecycleState) -> Result<LifecycleState, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }

    /// Whether an explicit `start()` is accepted from this state.
    pub fn accepts_start(self) -> bool {
        self.can_transition_to(LifecycleState::Starting)
    }

    /// True when no worker process is attached and nothing is in progress.
    pub fn is_idle(self) -> bool {
        matches!(
            self,
            LifecycleState::Stopped
                | LifecycleState::Crashed
                | LifecycleState::FailedStartup
                | LifecycleState::Degraded
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Crashed => "crashed",
            LifecycleState::FailedStartup => "failed_startup",
            LifecycleState::Degraded => "degraded",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
