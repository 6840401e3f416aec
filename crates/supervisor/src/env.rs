// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the supervisor crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::ConfigError;

/// Variable carrying the workspace path into the worker.
pub const WORKSPACE_VAR: &str = "WARDEN_WORKSPACE";

/// Variable telling the worker whether it runs as a persistent daemon (`1`) or per request (`0`).
pub const DAEMON_MODE_VAR: &str = "WARDEN_DAEMON_MODE";

/// Unbuffered-output hint understood by common worker runtimes.
pub const UNBUFFERED_VAR: &str = "PYTHONUNBUFFERED";

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Resolve state directory: WARDEN_STATE_DIR > XDG_STATE_HOME/warden > ~/.local/state/warden
pub fn state_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("WARDEN_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("warden"));
    }
    let home = home_dir().ok_or(ConfigError::NoStateDir)?;
    Ok(home.join(".local/state/warden"))
}

pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Worker executable override
pub fn worker_path() -> Option<PathBuf> {
    std::env::var_os("WARDEN_WORKER_PATH").map(PathBuf::from)
}

/// Bridge mode override (`daemon` or `per_request`)
pub fn bridge_mode() -> Option<String> {
    std::env::var("WARDEN_BRIDGE_MODE").ok()
}

pub fn idle_timeout() -> Option<Duration> {
    parse_duration_ms("WARDEN_IDLE_TIMEOUT_MS")
}

pub fn request_timeout() -> Option<Duration> {
    parse_duration_ms("WARDEN_REQUEST_TIMEOUT_MS")
}

pub fn handshake_timeout() -> Option<Duration> {
    parse_duration_ms("WARDEN_HANDSHAKE_TIMEOUT_MS")
}
