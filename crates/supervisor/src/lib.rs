// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-supervisor: runs a long-lived stdio worker on behalf of a host.
//!
//! The [`Supervisor`] acquires a per-workspace lock, launches the worker,
//! performs a bounded health handshake, multiplexes requests over
//! newline-delimited JSON, restarts the worker after crashes with capped
//! backoff, stops it when idle, and shuts it down with escalating signals.

pub mod activity;
pub mod config;
pub mod diagnostics;
pub mod env;
pub mod error;
pub mod handshake;
mod idle;
pub mod launcher;
pub mod lock;
pub mod oneshot;
pub mod pending;
pub mod protocol;
mod recovery;
pub mod shutdown;
pub mod signal;
pub mod sink;
mod supervisor;
pub mod worker;

pub use activity::{ActivityGuard, BackgroundWork};
pub use config::{BridgeMode, ConfigError, SupervisorConfig, WorkerConfig};
pub use diagnostics::{DiagnosticsReport, RuntimeInfo};
pub use error::SupervisorError;
pub use lock::{LockError, LockManager, LockOwner, LockStatus};
pub use oneshot::run_oneshot;
pub use shutdown::ShutdownPhase;
pub use sink::{LogSink, MemorySink, Stream, TracingSink};
pub use supervisor::Supervisor;
pub use warden_core::{FailureRecord, LifecycleState, ReasonCode, Timing};
