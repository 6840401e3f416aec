// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker executable resolution and spawning.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::time::Instant;
use warden_core::ReasonCode;

use crate::config::SupervisorConfig;
use crate::env::{self, DAEMON_MODE_VAR, UNBUFFERED_VAR, WORKSPACE_VAR};

/// Suffix of the sibling directory an environment manager leaves behind
/// while it rebuilds a tree in place.
const REBUILD_MARKER_SUFFIX: &str = ".backup";

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("worker executable not found (tried {})", display_paths(.tried))]
    NotFound { tried: Vec<PathBuf> },

    #[error("worker environment is being rebuilt ({} exists)", .marker.display())]
    RebuildInProgress { marker: PathBuf },

    #[error("failed to spawn {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("worker {0} pipe unavailable after spawn")]
    StdioUnavailable(&'static str),
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "nothing".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl LaunchError {
    pub fn reason(&self) -> ReasonCode {
        match self {
            LaunchError::NotFound { .. } | LaunchError::Spawn { .. } => ReasonCode::SpawnFailed,
            LaunchError::RebuildInProgress { .. } => ReasonCode::ExternalMutationInProgress,
            LaunchError::StdioUnavailable(_) => ReasonCode::StdioUnavailable,
        }
    }
}

/// A freshly spawned worker with its three pipes
#[derive(Debug)]
pub struct SpawnedWorker {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
    pub path: PathBuf,
}

/// Find the worker executable.
///
/// A configured path wins when it exists. If it is missing because its
/// environment is being rebuilt, wait for the rebuild up to `rebuild_wait`
/// before probing the conventional fallback locations. A rebuild that
/// outlives the wait only fails resolution when no fallback exists either.
pub async fn resolve_executable(config: &SupervisorConfig) -> Result<PathBuf, LaunchError> {
    let mut tried = Vec::new();
    let mut unfinished_rebuild = None;

    if let Some(configured) = &config.worker.path {
        let path = absolutize(configured, &config.workspace_root);
        if is_executable(&path) {
            return Ok(path);
        }
        if rebuild_marker(&path).is_some() {
            unfinished_rebuild = wait_for_rebuild(config, &path).await;
            if is_executable(&path) {
                return Ok(path);
            }
        }
        tried.push(path);
    }

    for candidate in fallback_candidates(config) {
        if is_executable(&candidate) {
            tracing::debug!(path = %candidate.display(), "using fallback worker executable");
            return Ok(candidate);
        }
        tried.push(candidate);
    }

    match unfinished_rebuild {
        Some(marker) => Err(LaunchError::RebuildInProgress { marker }),
        None => Err(LaunchError::NotFound { tried }),
    }
}

/// Poll until the rebuild marker disappears or the executable shows up.
/// Returns the marker when it outlives `rebuild_wait`.
async fn wait_for_rebuild(config: &SupervisorConfig, path: &Path) -> Option<PathBuf> {
    let timing = &config.timing;
    let deadline = Instant::now() + timing.rebuild_wait;
    tracing::info!(path = %path.display(), "worker environment rebuild in progress, waiting");

    loop {
        let marker = rebuild_marker(path)?;
        if is_executable(path) {
            return None;
        }
        if Instant::now() >= deadline {
            tracing::warn!(marker = %marker.display(), "rebuild still in progress, probing fallbacks");
            return Some(marker);
        }
        tokio::time::sleep(timing.rebuild_poll).await;
    }
}

/// Rebuild marker for the executable or one of its two parent directories.
pub fn rebuild_marker(path: &Path) -> Option<PathBuf> {
    path.ancestors().take(3).find_map(|ancestor| {
        let name = ancestor.file_name()?;
        let mut marker_name = name.to_os_string();
        marker_name.push(REBUILD_MARKER_SUFFIX);
        let marker = ancestor.with_file_name(marker_name);
        marker.exists().then_some(marker)
    })
}

/// Fallback locations in probe order.
pub fn fallback_candidates(config: &SupervisorConfig) -> Vec<PathBuf> {
    let name = &config.worker.name;
    let root = &config.workspace_root;
    let mut candidates: Vec<PathBuf> = config
        .worker
        .fallback_paths
        .iter()
        .map(|p| absolutize(p, root))
        .collect();
    candidates.push(root.join(".venv/bin").join(name));
    candidates.push(root.join("venv/bin").join(name));
    if let Some(home) = env::home_dir() {
        candidates.push(home.join(".local/bin").join(name));
    }
    if let Some(path_var) = std::env::var_os("PATH") {
        candidates.extend(std::env::split_paths(&path_var).map(|dir| dir.join(name)));
    }
    candidates
}

fn absolutize(path: &Path, root: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Spawn the worker with piped stdio in the workspace directory.
pub fn spawn(
    config: &SupervisorConfig,
    path: &Path,
    daemon_mode: bool,
) -> Result<SpawnedWorker, LaunchError> {
    let mut command = Command::new(path);
    command
        .args(&config.worker.args)
        .current_dir(&config.workspace_root)
        .env(UNBUFFERED_VAR, "1")
        .envs(&config.worker.env)
        .env(DAEMON_MODE_VAR, if daemon_mode { "1" } else { "0" })
        .env(WORKSPACE_VAR, &config.workspace_root)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|source| LaunchError::Spawn {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), pid = ?child.id(), "worker spawned");
    take_stdio(child, path)
}

fn take_stdio(mut child: Child, path: &Path) -> Result<SpawnedWorker, LaunchError> {
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    match (stdin, stdout, stderr) {
        (Some(stdin), Some(stdout), Some(stderr)) => Ok(SpawnedWorker {
            child,
            stdin,
            stdout,
            stderr,
            path: path.to_path_buf(),
        }),
        (stdin, stdout, _) => {
            let _ = child.start_kill();
            let missing = if stdin.is_none() {
                "stdin"
            } else if stdout.is_none() {
                "stdout"
            } else {
                "stderr"
            };
            Err(LaunchError::StdioUnavailable(missing))
        }
    }
}

#[cfg(test)]
#[path = "launcher_tests.rs"]
mod tests;
