// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash-recovery bookkeeping.
//!
//! Attempts count crash-triggered restarts. The counter resets whenever a
//! start reaches `running` (explicit or automatic) and on a clean stop; only
//! consecutive failed restarts exhaust the budget.

use serde::Serialize;
use std::time::Duration;

use crate::backoff::Backoff;
use crate::failure::epoch_ms;

/// Outcome of registering a crash or failed restart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryDecision {
    /// Restart after the given delay (attempt is 1-based).
    Retry { attempt: u32, delay: Duration },
    /// Budget exhausted; stop recovering.
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryState {
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_attempt_at_ms: Option<u64>,
    pub next_attempt_at_ms: Option<u64>,
    pub active: bool,
    #[serde(rename = "backoff_ms", serialize_with = "serialize_ms")]
    pub backoff: Duration,
    /// Bumped whenever pending recovery must be abandoned.
    #[serde(skip)]
    pub epoch: u64,
}

fn serialize_ms<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl RecoveryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            last_attempt_at_ms: None,
            next_attempt_at_ms: None,
            active: false,
            backoff: Duration::ZERO,
            epoch: 0,
        }
    }

    /// Register a failure that calls for a restart and decide what to do next.
    pub fn register_failure(&mut self, backoff: &Backoff) -> RecoveryDecision {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts > self.max_attempts {
            self.active = false;
            self.next_attempt_at_ms = None;
            self.backoff = Duration::ZERO;
            return RecoveryDecision::Exhausted {
                attempts: self.attempts - 1,
            };
        }

        let delay = backoff.delay(self.attempts);
        self.active = true;
        self.backoff = delay;
        self.next_attempt_at_ms = Some(epoch_ms() + delay.as_millis() as u64);
        RecoveryDecision::Retry {
            attempt: self.attempts,
            delay,
        }
    }

    /// Mark that a scheduled attempt is starting now.
    pub fn mark_attempt(&mut self) {
        self.last_attempt_at_ms = Some(epoch_ms());
        self.next_attempt_at_ms = None;
    }

    /// Clear the counter and abandon any scheduled attempt.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.active = false;
        self.next_attempt_at_ms = None;
        self.backoff = Duration::ZERO;
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// A restart reached `running`: clear the counter but keep the epoch,
    /// since the attempt that succeeded is the one currently live.
    pub fn succeeded(&mut self) {
        self.attempts = 0;
        self.active = false;
        self.next_attempt_at_ms = None;
        self.backoff = Duration::ZERO;
    }

    /// Abandon any scheduled attempt without touching the counter.
    pub fn cancel(&mut self) {
        self.active = false;
        self.next_attempt_at_ms = None;
        self.epoch = self.epoch.wrapping_add(1);
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts > self.max_attempts
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
