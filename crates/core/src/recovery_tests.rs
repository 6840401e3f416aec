// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn backoff() -> Backoff {
    Backoff::new(Duration::from_millis(10), Duration::from_millis(40))
}

#[test]
fn retries_until_budget_then_exhausts() {
    let mut state = RecoveryState::new(3);

    let delays: Vec<_> = (0..3)
        .map(|_| match state.register_failure(&backoff()) {
            RecoveryDecision::Retry { delay, .. } => delay,
            other => panic!("expected retry, got {other:?}"),
        })
        .collect();
    assert_eq!(
        delays,
        vec![
            Duration::from_millis(10),
            Duration::from_millis(20),
            Duration::from_millis(40)
        ]
    );
    assert!(state.active);

    let decision = state.register_failure(&backoff());
    assert_eq!(decision, RecoveryDecision::Exhausted { attempts: 3 });
    assert!(!state.active);
    assert!(state.is_exhausted());
    assert!(state.next_attempt_at_ms.is_none());
}

#[test]
fn reset_clears_attempts_and_bumps_epoch() {
    let mut state = RecoveryState::new(3);
    state.register_failure(&backoff());
    state.register_failure(&backoff());
    let epoch = state.epoch;

    state.reset();

    assert_eq!(state.attempts, 0);
    assert!(!state.active);
    assert_ne!(state.epoch, epoch);
    assert!(matches!(
        state.register_failure(&backoff()),
        RecoveryDecision::Retry { attempt: 1, .. }
    ));
}

#[test]
fn success_clears_attempts_without_bumping_epoch() {
    let mut state = RecoveryState::new(1);
    state.register_failure(&backoff());
    let epoch = state.epoch;

    state.succeeded();

    assert_eq!(state.attempts, 0);
    assert!(!state.active);
    assert_eq!(state.epoch, epoch);
    assert!(matches!(
        state.register_failure(&backoff()),
        RecoveryDecision::Retry { attempt: 1, .. }
    ));
}

#[test]
fn cancel_keeps_counter() {
    let mut state = RecoveryState::new(3);
    state.register_failure(&backoff());
    let epoch = state.epoch;

    state.cancel();

    assert_eq!(state.attempts, 1);
    assert!(!state.active);
    assert_ne!(state.epoch, epoch);
}

#[test]
fn mark_attempt_records_timestamp() {
    let mut state = RecoveryState::new(1);
    state.register_failure(&backoff());
    assert!(state.next_attempt_at_ms.is_some());

    state.mark_attempt();

    assert!(state.last_attempt_at_ms.is_some());
    assert!(state.next_attempt_at_ms.is_none());
}

#[test]
fn zero_budget_exhausts_immediately() {
    let mut state = RecoveryState::new(0);
    assert_eq!(
        state.register_failure(&backoff()),
        RecoveryDecision::Exhausted { attempts: 0 }
    );
}
