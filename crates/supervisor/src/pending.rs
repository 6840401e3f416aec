// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-flight request tracking.
//!
//! Each request id maps to a oneshot completion. When the worker exits the
//! map is drained and closed in one critical section, so no request can be
//! registered after the rejection sweep and then hang.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;
use warden_core::{format_duration, RequestId};

use crate::protocol::ErrorBody;

/// Why a single request did not produce a result
#[derive(Debug, Clone, Error)]
pub enum CallError {
    #[error("worker error {}: {}", .0.code, .0.message)]
    Worker(ErrorBody),

    #[error("worker exited before responding ({0})")]
    Exited(String),

    #[error("request timed out after {}", format_duration(*.0))]
    Timeout(Duration),

    #[error("request id {0} is already pending")]
    Duplicate(RequestId),

    #[error("malformed response: {0}")]
    Protocol(String),

    #[error("failed to write request: {0}")]
    Write(String),
}

pub type CallResult = Result<Value, CallError>;

struct Entry {
    method: String,
    issued_at: Instant,
    tx: oneshot::Sender<CallResult>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<RequestId, Entry>,
    closed: Option<String>,
}

#[derive(Default)]
pub struct PendingRequests {
    inner: Mutex<Inner>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request and return the receiver its response resolves.
    pub fn insert(
        &self,
        id: RequestId,
        method: &str,
    ) -> Result<oneshot::Receiver<CallResult>, CallError> {
        let mut inner = self.inner.lock();
        if let Some(reason) = &inner.closed {
            return Err(CallError::Exited(reason.clone()));
        }
        if inner.entries.contains_key(&id) {
            return Err(CallError::Duplicate(id));
        }
        let (tx, rx) = oneshot::channel();
        inner.entries.insert(
            id,
            Entry {
                method: method.to_string(),
                issued_at: Instant::now(),
                tx,
            },
        );
        Ok(rx)
    }

    /// Complete a pending request. Returns false when the id is unknown.
    pub fn resolve(&self, id: &RequestId, outcome: CallResult) -> bool {
        let entry = self.inner.lock().entries.remove(id);
        match entry {
            Some(entry) => {
                tracing::trace!(
                    request_id = %id,
                    method = %entry.method,
                    elapsed_ms = entry.issued_at.elapsed().as_millis() as u64,
                    "request resolved"
                );
                // Receiver may have timed out already
                let _ = entry.tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Drop a pending entry without completing it (timeout or write failure).
    pub fn remove(&self, id: &RequestId) -> bool {
        self.inner.lock().entries.remove(id).is_some()
    }

    /// Close the map and reject everything pending. Returns how many were rejected.
    pub fn reject_all(&self, reason: &str) -> usize {
        let drained: Vec<(RequestId, Entry)> = {
            let mut inner = self.inner.lock();
            inner.closed = Some(reason.to_string());
            inner.entries.drain().collect()
        };
        let count = drained.len();
        for (_, entry) in drained {
            let _ = entry.tx.send(Err(CallError::Exited(reason.to_string())));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed.is_some()
    }
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;
