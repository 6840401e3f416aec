// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process signalling through the system `kill` command.

use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Execute kill command with the given signal and PID
fn kill_signal(signal: &str, pid: u32) -> bool {
    // pid 0 would address our own process group
    if pid == 0 {
        return false;
    }
    Command::new("kill")
        .args([signal, &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Check if a process with the given PID exists
pub fn process_exists(pid: u32) -> bool {
    kill_signal("-0", pid)
}

/// Send SIGTERM
pub fn terminate(pid: u32) -> bool {
    kill_signal("-15", pid)
}

/// Send SIGKILL
pub fn force_kill(pid: u32) -> bool {
    kill_signal("-9", pid)
}

/// Wait for a process to exit
pub async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !process_exists(pid) {
            return true;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    !process_exists(pid)
}

/// Terminate a process that is not our child: TERM, then KILL after `grace`.
///
/// Returns true once the process is gone.
pub async fn terminate_orphan(pid: u32, grace: Duration, kill_wait: Duration) -> bool {
    if pid == std::process::id() || !process_exists(pid) {
        return true;
    }
    terminate(pid);
    if wait_for_exit(pid, grace).await {
        return true;
    }
    tracing::warn!(pid, "orphaned worker ignored SIGTERM, sending SIGKILL");
    force_kill(pid);
    wait_for_exit(pid, kill_wait).await
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
