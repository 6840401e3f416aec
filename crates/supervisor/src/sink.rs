// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Destination for worker output that is not protocol traffic.

use std::fmt;

use parking_lot::Mutex;

/// Which worker stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        })
    }
}

/// Receives redacted worker output lines.
pub trait LogSink: Send + Sync + 'static {
    fn line(&self, stream: Stream, line: &str);
}

/// Default sink: forwards to `tracing` under the `warden::worker` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn line(&self, stream: Stream, line: &str) {
        match stream {
            Stream::Stderr => tracing::debug!(target: "warden::worker", %stream, "{line}"),
            Stream::Stdout => tracing::warn!(target: "warden::worker", %stream, "{line}"),
        }
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(Stream, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(Stream, String)> {
        self.lines.lock().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|(_, l)| l.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn line(&self, stream: Stream, line: &str) {
        self.lines.lock().push((stream, line.to_string()));
    }
}
