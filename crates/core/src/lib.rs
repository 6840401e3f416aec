// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-core: the reliability contract shared by the supervisor and its hosts.
//!
//! Pure data and logic with no I/O: lifecycle states and their transition
//! table, stable failure reason codes, timing constants, failure records and
//! recovery bookkeeping.

pub mod backoff;
pub mod failure;
pub mod id;
pub mod reason;
pub mod recovery;
pub mod state;
pub mod time_fmt;
pub mod timing;

pub use backoff::Backoff;
pub use failure::{epoch_ms, FailureRecord, OutputTail};
pub use id::{CorrelationId, RequestId, ShortId};
pub use reason::ReasonCode;
pub use recovery::{RecoveryDecision, RecoveryState};
pub use state::{LifecycleState, TransitionError};
pub use time_fmt::format_duration;
pub use timing::Timing;
