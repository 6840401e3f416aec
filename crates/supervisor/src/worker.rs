// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A running worker process and the tasks that service its pipes.
//!
//! Three tasks per process: a stdout reader that routes responses to pending
//! requests, a stderr reader that feeds the log sink and the output tail, and
//! an exit watcher that owns the child, rejects everything pending when it
//! exits, and then reports the exit.

use std::os::unix::process::ExitStatusExt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{mpsc, watch};
use tracing::Instrument;
use warden_core::{OutputTail, RequestId};

use crate::launcher::SpawnedWorker;
use crate::pending::{CallError, CallResult, PendingRequests};
use crate::protocol::{decode_response, encode_request, Line, LineBuffer, Payload, WireRequest};
use crate::sink::{LogSink, Stream};

/// Once the child is reaped, stdout is only drained of what is already in
/// the pipe; a descendant holding the pipe open must not delay rejection.
const STDOUT_DRAIN: Duration = Duration::from_millis(20);

/// Fault lines longer than this are truncated in logs.
const FAULT_PREVIEW: usize = 200;

const READ_CHUNK: usize = 8192;

/// How a worker process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitInfo {
    fn from_status(status: std::io::Result<std::process::ExitStatus>) -> Self {
        match status {
            Ok(status) => Self {
                code: status.code(),
                signal: status.signal(),
            },
            Err(_) => Self {
                code: None,
                signal: None,
            },
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl std::fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => f.write_str("unknown exit status"),
        }
    }
}

/// Invoked once by the exit watcher after pending requests are rejected.
pub type ExitCallback = Box<dyn FnOnce(ExitInfo) + Send + 'static>;

/// Worker state shared with the reader tasks.
struct Shared {
    pending: PendingRequests,
    output_seen: AtomicBool,
    faults: AtomicU64,
    fault_tx: watch::Sender<u64>,
    tail: Mutex<OutputTail>,
    sink: Arc<dyn LogSink>,
}

impl Shared {
    fn protocol_fault(&self, detail: &str) {
        let count = self.faults.fetch_add(1, Ordering::SeqCst) + 1;
        self.fault_tx.send_replace(count);
        tracing::warn!(faults = count, detail, "protocol fault on worker stdout");
    }
}

pub struct WorkerProcess {
    pid: u32,
    generation: u64,
    started_at: Instant,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    shared: Arc<Shared>,
    exit_rx: watch::Receiver<Option<ExitInfo>>,
    fault_rx: watch::Receiver<u64>,
    kill_tx: mpsc::Sender<()>,
}

impl WorkerProcess {
    /// Take ownership of a spawned child and start its service tasks.
    pub fn start(
        spawned: SpawnedWorker,
        generation: u64,
        tail: OutputTail,
        sink: Arc<dyn LogSink>,
        on_exit: ExitCallback,
    ) -> Self {
        let SpawnedWorker {
            child,
            stdin,
            stdout,
            stderr,
            ..
        } = spawned;
        let pid = child.id().unwrap_or_default();
        let (fault_tx, fault_rx) = watch::channel(0);
        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = mpsc::channel(1);

        let shared = Arc::new(Shared {
            pending: PendingRequests::new(),
            output_seen: AtomicBool::new(false),
            faults: AtomicU64::new(0),
            fault_tx,
            tail: Mutex::new(tail),
            sink,
        });

        let span = tracing::info_span!("worker", pid, generation);
        let stdout_task =
            tokio::spawn(read_stdout(stdout, Arc::clone(&shared)).instrument(span.clone()));
        tokio::spawn(read_stderr(stderr, Arc::clone(&shared)).instrument(span.clone()));
        tokio::spawn(
            watch_exit(
                child,
                kill_rx,
                stdout_task,
                Arc::clone(&shared),
                exit_tx,
                on_exit,
            )
            .instrument(span),
        );

        Self {
            pid,
            generation,
            started_at: Instant::now(),
            stdin: tokio::sync::Mutex::new(Some(stdin)),
            shared,
            exit_rx,
            fault_rx,
            kill_tx,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }

    /// Whether the worker has written anything to stdout or stderr.
    pub fn output_seen(&self) -> bool {
        self.shared.output_seen.load(Ordering::SeqCst)
    }

    pub fn protocol_faults(&self) -> u64 {
        self.shared.faults.load(Ordering::SeqCst)
    }

    /// Receiver that changes on every protocol fault, including faults
    /// recorded before the call.
    pub fn faults(&self) -> watch::Receiver<u64> {
        self.fault_rx.clone()
    }

    pub fn stderr_tail(&self) -> Vec<String> {
        self.shared.tail.lock().lines()
    }

    pub fn exit_info(&self) -> Option<ExitInfo> {
        self.exit_rx.borrow().clone()
    }

    pub fn has_exited(&self) -> bool {
        self.exit_rx.borrow().is_some()
    }

    /// Send a request and wait for its response, bounded by `timeout`.
    pub async fn call(&self, method: &str, params: Value, timeout: Duration) -> CallResult {
        let id = RequestId::generate();
        let rx = self.shared.pending.insert(id.clone(), method)?;
        let request = WireRequest::new(id.clone(), method, params);
        let bytes = match encode_request(&request) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.shared.pending.remove(&id);
                return Err(CallError::Protocol(e.to_string()));
            }
        };

        let exchange = async {
            if let Err(e) = self.write(&bytes).await {
                self.shared.pending.remove(&id);
                return Err(CallError::Write(e.to_string()));
            }
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(CallError::Exited("response channel closed".to_string())),
            }
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                self.shared.pending.remove(&id);
                tracing::debug!(request_id = %id, method, "request timed out");
                Err(CallError::Timeout(timeout))
            }
        }
    }

    /// Fire-and-forget request; the response, if any, is dropped as unmatched.
    pub async fn notify(&self, method: &str, timeout: Duration) -> bool {
        let request = WireRequest::new(RequestId::generate(), method, Value::Object(Default::default()));
        let Ok(bytes) = encode_request(&request) else {
            return false;
        };
        matches!(
            tokio::time::timeout(timeout, self.write(&bytes)).await,
            Ok(Ok(()))
        )
    }

    async fn write(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut guard = self.stdin.lock().await;
        let Some(stdin) = guard.as_mut() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "worker stdin closed",
            ));
        };
        stdin.write_all(bytes).await?;
        stdin.flush().await
    }

    /// Close the worker's stdin so it sees end of input.
    pub async fn close_stdin(&self) {
        self.stdin.lock().await.take();
    }

    /// Request SIGKILL through the exit watcher, which owns the child.
    /// Dropping the last handle has the same effect.
    pub fn kill(&self) {
        let _ = self.kill_tx.try_send(());
    }

    /// Wait for the process to exit. `None` if it is still running at the deadline.
    pub async fn wait_exit(&self, timeout: Duration) -> Option<ExitInfo> {
        let mut rx = self.exit_rx.clone();
        let observed = match tokio::time::timeout(timeout, rx.wait_for(Option::is_some)).await {
            Ok(Ok(info)) => info.clone(),
            _ => None,
        };
        observed.or_else(|| self.exit_info())
    }
}

async fn watch_exit(
    mut child: Child,
    mut kill_rx: mpsc::Receiver<()>,
    stdout_task: tokio::task::JoinHandle<()>,
    shared: Arc<Shared>,
    exit_tx: watch::Sender<Option<ExitInfo>>,
    on_exit: ExitCallback,
) {
    let mut handle_alive = true;
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            msg = kill_rx.recv(), if handle_alive => {
                handle_alive = msg.is_some();
                if let Err(e) = child.start_kill() {
                    tracing::debug!(error = %e, "kill after exit");
                }
            }
        }
    };
    let info = ExitInfo::from_status(status);

    // Let responses written just before exit reach their callers
    let _ = tokio::time::timeout(STDOUT_DRAIN, stdout_task).await;

    let rejected = shared.pending.reject_all(&info.to_string());
    tracing::info!(exit = %info, rejected, "worker exited");
    exit_tx.send_replace(Some(info.clone()));
    on_exit(info);
}

async fn read_stdout<R: AsyncRead + Unpin>(mut stdout: R, shared: Arc<Shared>) {
    let mut buffer = LineBuffer::default();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = match stdout.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(error = %e, "stdout read failed");
                break;
            }
        };
        shared.output_seen.store(true, Ordering::SeqCst);
        for line in buffer.push(&chunk[..n]) {
            handle_stdout_line(line, &shared);
        }
    }
    if let Some(line) = buffer.finish() {
        handle_stdout_line(line, &shared);
    }
}

fn handle_stdout_line(line: Line, shared: &Shared) {
    let text = match line {
        Line::Text(text) => text,
        Line::Oversized(size) => {
            shared.protocol_fault(&format!("dropped {size}-byte line"));
            return;
        }
    };

    let response = match decode_response(&text) {
        Ok(response) => response,
        Err(e) => {
            let clean = shared.tail.lock().redact(&text);
            let preview: String = clean.chars().take(FAULT_PREVIEW).collect();
            shared.protocol_fault(&format!("{e}: {preview}"));
            shared.sink.line(Stream::Stdout, &clean);
            return;
        }
    };

    let Some(id) = response.id else {
        tracing::debug!("dropping response without id");
        return;
    };
    let outcome = match response.payload {
        Payload::Result(value) => Ok(value),
        Payload::Error(body) => Err(CallError::Worker(body)),
        Payload::Missing => Err(CallError::Protocol(
            "response has neither result nor error".to_string(),
        )),
    };
    if !shared.pending.resolve(&id, outcome) {
        tracing::debug!(request_id = %id, "dropping unmatched response");
    }
}

async fn read_stderr<R: AsyncRead + Unpin>(mut stderr: R, shared: Arc<Shared>) {
    let mut buffer = LineBuffer::default();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = match stderr.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };
        shared.output_seen.store(true, Ordering::SeqCst);
        for line in buffer.push(&chunk[..n]) {
            record_stderr(line, &shared);
        }
    }
    if let Some(line) = buffer.finish() {
        record_stderr(line, &shared);
    }
}

fn record_stderr(line: Line, shared: &Shared) {
    let Line::Text(text) = line else {
        return;
    };
    let clean = {
        let mut tail = shared.tail.lock();
        let clean = tail.redact(&text);
        tail.push(&clean);
        clean
    };
    shared.sink.line(Stream::Stderr, &clean);
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
