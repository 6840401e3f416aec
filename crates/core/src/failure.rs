// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Last-failure records and the bounded, redacted worker output tail.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::id::CorrelationId;
use crate::reason::ReasonCode;
use crate::timing::{OUTPUT_TAIL_BYTES, OUTPUT_TAIL_LINES};

/// Replacement text for redacted secret values.
pub const REDACTED: &str = "[REDACTED]";

/// Secrets shorter than this are not redacted (too likely to collide with ordinary text).
const MIN_SECRET_LEN: usize = 6;

/// Milliseconds since the Unix epoch.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// The most recent failure observed by a supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub at_ms: u64,
    pub reason: ReasonCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    /// Redacted tail of the worker's stderr at the time of failure.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_tail: Vec<String>,
    pub details: String,
}

impl FailureRecord {
    pub fn new(reason: ReasonCode, details: impl Into<String>) -> Self {
        Self {
            at_ms: epoch_ms(),
            reason,
            correlation_id: None,
            output_tail: Vec::new(),
            details: details.into(),
        }
    }

    pub fn with_correlation(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    pub fn with_tail(mut self, tail: Vec<String>) -> Self {
        self.output_tail = tail;
        self
    }
}

/// Ring buffer of the last lines a worker wrote to its diagnostic stream.
///
/// Bounded both by line count and by total bytes. Known secret values are
/// replaced with [`REDACTED`] as lines are pushed, so secrets never reach a
/// failure record.
#[derive(Debug, Clone)]
pub struct OutputTail {
    lines: VecDeque<String>,
    bytes: usize,
    max_lines: usize,
    max_bytes: usize,
    secrets: Vec<String>,
}

impl Default for OutputTail {
    fn default() -> Self {
        Self::new(OUTPUT_TAIL_LINES, OUTPUT_TAIL_BYTES)
    }
}

impl OutputTail {
    pub fn new(max_lines: usize, max_bytes: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            bytes: 0,
            max_lines: max_lines.max(1),
            max_bytes: max_bytes.max(1),
            secrets: Vec::new(),
        }
    }

    /// Register values that must never appear in the tail.
    pub fn with_secrets<I, S>(mut self, secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secrets = secrets
            .into_iter()
            .map(Into::into)
            .filter(|s| s.len() >= MIN_SECRET_LEN)
            .collect();
        // Longest first so a secret containing another is replaced whole
        self.secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
        self
    }

    pub fn push(&mut self, line: &str) {
        let mut line = redact(line.trim_end_matches(&['\r', '\n'][..]), &self.secrets);
        if line.len() > self.max_bytes {
            let mut cut = line.len() - self.max_bytes;
            while !line.is_char_boundary(cut) {
                cut += 1;
            }
            line = line[cut..].to_string();
        }

        self.bytes += line.len();
        self.lines.push_back(line);
        while self.lines.len() > self.max_lines || self.bytes > self.max_bytes {
            match self.lines.pop_front() {
                Some(old) => self.bytes -= old.len(),
                None => break,
            }
        }
    }

    /// Redact a line with this tail's secrets without recording it.
    pub fn redact(&self, line: &str) -> String {
        redact(line, &self.secrets)
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}

/// Replace every occurrence of each secret in `line`.
pub fn redact(line: &str, secrets: &[String]) -> String {
    let mut out = line.to_string();
    for secret in secrets {
        if out.contains(secret.as_str()) {
            out = out.replace(secret.as_str(), REDACTED);
        }
    }
    out
}

#[cfg(test)]
#[path = "failure_tests.rs"]
mod tests;
