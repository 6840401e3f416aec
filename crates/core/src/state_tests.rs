// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::LifecycleState::{self, *};

#[yare::parameterized(
    stopped_to_starting        = { Stopped, Starting },
    starting_to_running        = { Starting, Running },
    starting_to_failed         = { Starting, FailedStartup },
    running_to_stopping        = { Running, Stopping },
    running_to_crashed         = { Running, Crashed },
    stopping_to_stopped        = { Stopping, Stopped },
    crashed_to_starting        = { Crashed, Starting },
    crashed_to_degraded        = { Crashed, Degraded },
    failed_to_starting         = { FailedStartup, Starting },
    failed_to_degraded         = { FailedStartup, Degraded },
    degraded_to_starting       = { Degraded, Starting },
)]
fn allowed(from: LifecycleState, to: LifecycleState) {
    assert!(from.can_transition_to(to), "{from} -> {to} should be allowed");
    assert_eq!(from.transition(to), Ok(to));
}

#[yare::parameterized(
    running_to_stopped    = { Running, Stopped },
    running_to_starting   = { Running, Starting },
    stopped_to_running    = { Stopped, Running },
    stopped_to_degraded   = { Stopped, Degraded },
    degraded_to_stopped   = { Degraded, Stopped },
    degraded_to_running   = { Degraded, Running },
    stopping_to_running   = { Stopping, Running },
    starting_to_stopped   = { Starting, Stopped },
)]
fn rejected(from: LifecycleState, to: LifecycleState) {
    let err = from.transition(to).unwrap_err();
    assert_eq!(err.from, from);
    assert_eq!(err.to, to);
    assert!(err.to_string().contains(from.as_str()));
}

#[test]
fn terminal_states_only_leave_through_start() {
    assert_eq!(Stopped.successors(), &[Starting]);
    assert_eq!(Degraded.successors(), &[Starting]);
}

#[test]
fn start_is_never_blocked_after_a_failure() {
    for state in [Stopped, Crashed, FailedStartup, Degraded] {
        assert!(state.accepts_start(), "{state} must accept start()");
    }
    for state in [Starting, Running, Stopping] {
        assert!(!state.accepts_start(), "{state} must not accept start()");
    }
}

#[test]
fn serializes_as_snake_case() {
    let json = serde_json::to_string(&FailedStartup).unwrap();
    assert_eq!(json, "\"failed_startup\"");
    let back: LifecycleState = serde_json::from_str("\"degraded\"").unwrap();
    assert_eq!(back, Degraded);
}
