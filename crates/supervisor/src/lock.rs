// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-process workspace lock.
//!
//! The lock is a directory created with an atomic `create_dir`, holding an
//! `owner.json` metadata file. Contention is resolved by probing liveness of
//! the recorded worker pid and the owner pid; a lock with no metadata is only
//! considered stale once it is older than the configured age.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_core::{epoch_ms, CorrelationId, ReasonCode};

use crate::config::SupervisorConfig;
use crate::signal::process_exists;

pub const OWNER_FILE: &str = "owner.json";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("workspace lock {path} is held by another process{}", owner_suffix(.owner))]
    Held {
        path: PathBuf,
        owner: Option<LockOwner>,
    },

    #[error("failed to create lock {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stale lock {path} could not be reclaimed: {source}")]
    Reclaim {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn owner_suffix(owner: &Option<LockOwner>) -> String {
    match owner {
        Some(o) => format!(" (pid {})", o.pid),
        None => String::new(),
    }
}

impl LockError {
    pub fn reason(&self) -> ReasonCode {
        match self {
            LockError::Held { .. } => ReasonCode::LockHeld,
            LockError::Create { .. } | LockError::Reclaim { .. } => {
                ReasonCode::LockAcquisitionFailed
            }
        }
    }
}

/// Contents of `owner.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOwner {
    pub created_at_ms: u64,
    pub pid: u32,
    pub correlation_id: CorrelationId,
    pub workspace_id: String,
    pub workspace_path: PathBuf,
}

/// Read-only view of the lock for diagnostics and the CLI
#[derive(Debug, Clone, Serialize)]
pub struct LockStatus {
    pub path: PathBuf,
    pub exists: bool,
    pub held: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<LockOwner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_alive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_ms: Option<u64>,
    pub stale: bool,
    pub detail: String,
}

#[derive(Debug)]
pub struct LockManager {
    lock_dir: PathBuf,
    pid_path: PathBuf,
    workspace_id: String,
    workspace_path: PathBuf,
    correlation_id: CorrelationId,
    stale_age: Duration,
    held: bool,
}

impl LockManager {
    pub fn new(config: &SupervisorConfig) -> Self {
        Self {
            lock_dir: config.lock_dir(),
            pid_path: config.pid_path(),
            workspace_id: config.workspace_id(),
            workspace_path: config.workspace_root.clone(),
            correlation_id: CorrelationId::generate(),
            stale_age: config.timing.stale_lock_age,
            held: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock_dir
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    fn owner_path(&self) -> PathBuf {
        self.lock_dir.join(OWNER_FILE)
    }

    /// Acquire the lock, returning whether it is now held by this instance.
    pub fn acquire(&mut self) -> bool {
        match self.try_acquire() {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "lock acquisition failed");
                false
            }
        }
    }

    /// Acquire the lock, recovering a stale one at most once.
    pub fn try_acquire(&mut self) -> Result<(), LockError> {
        if self.held {
            return Ok(());
        }
        if let Some(parent) = self.lock_dir.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LockError::Create {
                path: self.lock_dir.clone(),
                source,
            })?;
        }

        match std::fs::create_dir(&self.lock_dir) {
            Ok(()) => {
                self.claim();
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => self.recover_stale(),
            Err(source) => Err(LockError::Create {
                path: self.lock_dir.clone(),
                source,
            }),
        }
    }

    fn recover_stale(&mut self) -> Result<(), LockError> {
        let (stale, detail) = self.is_stale();
        if !stale {
            return Err(LockError::Held {
                path: self.lock_dir.clone(),
                owner: self.read_owner(),
            });
        }

        tracing::info!(path = %self.lock_dir.display(), %detail, "recovering stale lock");
        let _ = std::fs::remove_file(self.owner_path());
        if let Err(e) = std::fs::remove_dir_all(&self.lock_dir) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(error = %e, "failed to remove stale lock directory");
            }
        }

        match std::fs::create_dir(&self.lock_dir) {
            Ok(()) => {
                self.claim();
                Ok(())
            }
            Err(source) => Err(LockError::Reclaim {
                path: self.lock_dir.clone(),
                source,
            }),
        }
    }

    fn claim(&mut self) {
        self.held = true;
        let owner = LockOwner {
            created_at_ms: epoch_ms(),
            pid: std::process::id(),
            correlation_id: self.correlation_id.clone(),
            workspace_id: self.workspace_id.clone(),
            workspace_path: self.workspace_path.clone(),
        };
        let written = serde_json::to_vec_pretty(&owner)
            .map_err(std::io::Error::other)
            .and_then(|bytes| std::fs::write(self.owner_path(), bytes));
        if let Err(e) = written {
            tracing::warn!(error = %e, "failed to write lock metadata, lock is still held");
        }
        tracing::debug!(path = %self.lock_dir.display(), "lock acquired");
    }

    /// Release the lock. Always clears the held flag; never deletes a lock
    /// that another instance has since reclaimed.
    pub fn release(&mut self) {
        if !self.held {
            return;
        }
        self.held = false;

        if let Some(owner) = self.read_owner() {
            if owner.correlation_id != self.correlation_id {
                tracing::warn!(
                    owner_pid = owner.pid,
                    "lock was reclaimed by another instance, leaving it in place"
                );
                return;
            }
        }

        if let Err(e) = std::fs::remove_file(self.owner_path()) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(error = %e, "failed to remove lock metadata");
            }
        }
        if let Err(e) = std::fs::remove_dir(&self.lock_dir) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(error = %e, "failed to remove lock directory");
            }
        }
        tracing::debug!(path = %self.lock_dir.display(), "lock released");
    }

    /// Decide whether an existing lock may be reclaimed.
    pub fn is_stale(&self) -> (bool, String) {
        let owner = self.read_owner();
        if owner
            .as_ref()
            .is_some_and(|o| o.correlation_id == self.correlation_id)
        {
            return (false, "held by this instance".to_string());
        }

        if let Some(pid) = read_pid_marker(&self.pid_path) {
            if process_exists(pid) {
                return (false, format!("recorded worker pid {pid} is alive"));
            }
        }

        match owner {
            Some(o) if process_exists(o.pid) => (false, format!("owner pid {} is alive", o.pid)),
            Some(o) => (true, format!("owner pid {} is not running", o.pid)),
            None => match self.age() {
                Some(age) if age > self.stale_age => (
                    true,
                    format!("no metadata and lock is {}s old", age.as_secs()),
                ),
                Some(age) => (
                    false,
                    format!("no metadata but lock is only {}s old", age.as_secs()),
                ),
                None => (false, "lock age unknown".to_string()),
            },
        }
    }

    pub fn read_owner(&self) -> Option<LockOwner> {
        let content = std::fs::read(self.owner_path()).ok()?;
        serde_json::from_slice(&content).ok()
    }

    fn age(&self) -> Option<Duration> {
        let modified = std::fs::metadata(&self.lock_dir).ok()?.modified().ok()?;
        Some(SystemTime::now().duration_since(modified).unwrap_or_default())
    }

    /// Side-effect free snapshot of the on-disk lock.
    pub fn inspect(&self) -> LockStatus {
        let exists = self.lock_dir.is_dir();
        let owner = if exists { self.read_owner() } else { None };
        let owner_alive = owner.as_ref().map(|o| process_exists(o.pid));
        let (stale, detail) = if exists {
            self.is_stale()
        } else {
            (false, "not locked".to_string())
        };
        LockStatus {
            path: self.lock_dir.clone(),
            exists,
            held: self.held,
            owner,
            owner_alive,
            age_ms: if exists {
                self.age().map(|a| a.as_millis() as u64)
            } else {
                None
            },
            stale,
            detail,
        }
    }
}

/// Read the pid recorded in a recovery marker.
pub fn read_pid_marker(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

pub fn write_pid_marker(path: &Path, pid: u32) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("{pid}\n"))
}

pub fn remove_pid_marker(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove recovery marker");
        }
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
