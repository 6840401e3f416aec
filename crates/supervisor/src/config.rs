// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resolved supervisor configuration.
//!
//! A [`SupervisorConfig`] is a snapshot: defaults, then the workspace's
//! `.warden/config.toml`, then environment overrides. Hosts that keep their own
//! settings build the snapshot directly and push changes with
//! `Supervisor::update_config`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use warden_core::timing::{DEFAULT_IDLE_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
use warden_core::Timing;

use crate::env;

/// Default executable name probed in fallback locations.
pub const DEFAULT_WORKER_NAME: &str = "kg-worker";

/// Config file location relative to the workspace root.
pub const CONFIG_FILE: &str = ".warden/config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine state directory (set WARDEN_STATE_DIR or HOME)")]
    NoStateDir,

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Unknown bridge mode '{0}' (expected 'daemon' or 'per_request')")]
    BridgeMode(String),
}

/// How the host talks to the worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeMode {
    /// One persistent worker per workspace
    #[default]
    Daemon,
    /// A fresh worker per request
    PerRequest,
}

impl std::str::FromStr for BridgeMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "daemon" => Ok(BridgeMode::Daemon),
            "per_request" | "per-request" | "spawn" => Ok(BridgeMode::PerRequest),
            other => Err(ConfigError::BridgeMode(other.to_string())),
        }
    }
}

/// Worker executable and environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Configured executable; relative paths resolve against the workspace root.
    pub path: Option<PathBuf>,
    /// Executable name used when probing fallback locations.
    pub name: String,
    pub args: Vec<String>,
    /// Extra locations probed before the conventional ones.
    pub fallback_paths: Vec<PathBuf>,
    /// Host-resolved variables (credentials, provider settings). Values are
    /// redacted from captured worker output.
    pub env: BTreeMap<String, String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            path: None,
            name: DEFAULT_WORKER_NAME.to_string(),
            args: Vec::new(),
            fallback_paths: Vec::new(),
            env: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Logical workspace the supervisor serves; also the worker's cwd.
    pub workspace_root: PathBuf,
    /// Where lock and recovery-marker files live.
    pub state_dir: PathBuf,
    pub worker: WorkerConfig,
    pub bridge_mode: BridgeMode,
    /// Zero disables idle shutdown.
    pub idle_timeout: Duration,
    pub request_timeout: Duration,
    /// Start on demand when a request arrives while stopped.
    pub auto_start: bool,
    pub timing: Timing,
}

impl SupervisorConfig {
    pub fn new(workspace_root: impl Into<PathBuf>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            state_dir: state_dir.into(),
            worker: WorkerConfig::default(),
            bridge_mode: BridgeMode::Daemon,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            auto_start: true,
            timing: Timing::default(),
        }
    }

    /// Load configuration for a workspace.
    ///
    /// Uses the user state directory, the optional workspace config file and
    /// `WARDEN_*` environment overrides.
    pub fn load(workspace_root: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::new(workspace_root, env::state_dir()?);

        let path = workspace_root.join(CONFIG_FILE);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let file: ConfigFile = toml::from_str(&content).map_err(|source| {
                    ConfigError::Parse {
                        path: path.clone(),
                        source,
                    }
                })?;
                file.apply(&mut config);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(ConfigError::Read { path, source }),
        }

        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(path) = env::worker_path() {
            self.worker.path = Some(path);
        }
        if let Some(mode) = env::bridge_mode() {
            self.bridge_mode = mode.parse()?;
        }
        if let Some(d) = env::idle_timeout() {
            self.idle_timeout = d;
        }
        if let Some(d) = env::request_timeout() {
            self.request_timeout = d;
        }
        if let Some(d) = env::handshake_timeout() {
            self.timing.handshake_timeout = d;
        }
        Ok(())
    }

    /// Stable short identifier for the workspace (hex SHA-256 prefix of its path).
    pub fn workspace_id(&self) -> String {
        workspace_id(&self.workspace_root)
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.state_dir.join(format!("{}.lock", self.workspace_id()))
    }

    /// Recovery marker holding the running worker's pid.
    pub fn pid_path(&self) -> PathBuf {
        self.state_dir.join(format!("{}.pid", self.workspace_id()))
    }

    /// Secret values to scrub from captured worker output.
    pub fn secrets(&self) -> Vec<String> {
        self.worker.env.values().cloned().collect()
    }
}

pub fn workspace_id(path: &Path) -> String {
    let normalized = path.to_string_lossy();
    let normalized = normalized.trim_end_matches('/');
    let normalized = if normalized.is_empty() { "/" } else { normalized };
    let digest = Sha256::digest(normalized.as_bytes());
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

/// On-disk shape of `.warden/config.toml`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    worker: WorkerSection,
    bridge_mode: Option<BridgeMode>,
    idle_timeout_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    auto_start: Option<bool>,
    #[serde(default)]
    timing: TimingSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorkerSection {
    path: Option<PathBuf>,
    name: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    fallback_paths: Vec<PathBuf>,
    #[serde(default)]
    env: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TimingSection {
    handshake_timeout_ms: Option<u64>,
    graceful_timeout_ms: Option<u64>,
    terminate_timeout_ms: Option<u64>,
    kill_timeout_ms: Option<u64>,
    stale_lock_age_ms: Option<u64>,
    max_recovery_attempts: Option<u32>,
    backoff_base_ms: Option<u64>,
    backoff_max_ms: Option<u64>,
    forced_termination_threshold: Option<u32>,
    rebuild_wait_ms: Option<u64>,
}

impl ConfigFile {
    fn apply(self, config: &mut SupervisorConfig) {
        let ms = Duration::from_millis;
        let w = self.worker;
        if w.path.is_some() {
            config.worker.path = w.path;
        }
        if let Some(name) = w.name {
            config.worker.name = name;
        }
        if !w.args.is_empty() {
            config.worker.args = w.args;
        }
        config.worker.fallback_paths.extend(w.fallback_paths);
        config.worker.env.extend(w.env);

        if let Some(mode) = self.bridge_mode {
            config.bridge_mode = mode;
        }
        if let Some(v) = self.idle_timeout_ms {
            config.idle_timeout = ms(v);
        }
        if let Some(v) = self.request_timeout_ms {
            config.request_timeout = ms(v);
        }
        if let Some(v) = self.auto_start {
            config.auto_start = v;
        }

        let t = self.timing;
        let timing = &mut config.timing;
        if let Some(v) = t.handshake_timeout_ms {
            timing.handshake_timeout = ms(v);
        }
        if let Some(v) = t.graceful_timeout_ms {
            timing.graceful_timeout = ms(v);
        }
        if let Some(v) = t.terminate_timeout_ms {
            timing.terminate_timeout = ms(v);
        }
        if let Some(v) = t.kill_timeout_ms {
            timing.kill_timeout = ms(v);
        }
        if let Some(v) = t.stale_lock_age_ms {
            timing.stale_lock_age = ms(v);
        }
        if let Some(v) = t.max_recovery_attempts {
            timing.max_recovery_attempts = v;
        }
        if let Some(v) = t.backoff_base_ms {
            timing.backoff_base = ms(v);
        }
        if let Some(v) = t.backoff_max_ms {
            timing.backoff_max = ms(v);
        }
        if let Some(v) = t.forced_termination_threshold {
            timing.forced_termination_threshold = v;
        }
        if let Some(v) = t.rebuild_wait_ms {
            timing.rebuild_wait = ms(v);
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
