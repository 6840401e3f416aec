// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! warden-echo-worker: reference worker speaking the supervisor protocol.
//!
//! Methods: `health`, `echo`, `sleep {ms}`, `fail`, `env {name}`,
//! `stderr {line}`, `spawn_holder`, `shutdown`. `WARDEN_ECHO_MODE` injects
//! startup and shutdown faults for testing the supervisor. When
//! `WARDEN_ECHO_LAUNCH_MARKER` names a file, only the launch that creates it
//! runs normally; every later launch exits immediately.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use warden_supervisor::env::DAEMON_MODE_VAR;
use warden_supervisor::protocol::{ErrorBody, WireRequest, PROTOCOL_VERSION};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    ExitImmediately,
    Hang,
    SilentHang,
    Malformed,
    HealthError,
    IgnoreShutdown,
    IgnoreTerm,
    CrashAfterHealth,
}

impl Mode {
    fn from_env() -> Self {
        match std::env::var("WARDEN_ECHO_MODE").as_deref() {
            Ok("exit_immediately") => Mode::ExitImmediately,
            Ok("hang") => Mode::Hang,
            Ok("silent_hang") => Mode::SilentHang,
            Ok("malformed") => Mode::Malformed,
            Ok("health_error") => Mode::HealthError,
            Ok("ignore_shutdown") => Mode::IgnoreShutdown,
            Ok("ignore_term") => Mode::IgnoreTerm,
            Ok("crash_after_health") => Mode::CrashAfterHealth,
            _ => Mode::Normal,
        }
    }
}

/// Later launches behave like `exit_immediately` once the marker exists.
fn apply_launch_marker(mode: Mode) -> std::io::Result<Mode> {
    let Some(marker) = std::env::var_os("WARDEN_ECHO_LAUNCH_MARKER") else {
        return Ok(mode);
    };
    if std::path::Path::new(&marker).exists() {
        return Ok(Mode::ExitImmediately);
    }
    std::fs::write(&marker, std::process::id().to_string())?;
    Ok(mode)
}

fn crash_delay() -> Duration {
    std::env::var("WARDEN_ECHO_CRASH_DELAY_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(100))
}

fn success(id: &Value, result: Value) -> Value {
    json!({"version": PROTOCOL_VERSION, "id": id, "result": result})
}

fn failure(id: &Value, code: i64, message: &str) -> Value {
    let error = ErrorBody {
        code,
        message: message.to_string(),
        data: None,
    };
    json!({"version": PROTOCOL_VERSION, "id": id, "error": error})
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let mode = apply_launch_marker(Mode::from_env())?;
    let per_request = std::env::var(DAEMON_MODE_VAR).as_deref() == Ok("0");

    match mode {
        Mode::ExitImmediately => {
            eprintln!("fatal: worker configuration is missing");
            std::process::exit(1);
        }
        Mode::SilentHang => {
            // Keep stdin open without reading so nothing is ever written
            tokio::time::sleep(Duration::from_secs(3600)).await;
            return Ok(());
        }
        Mode::Hang => {
            eprintln!("loading index...");
        }
        Mode::IgnoreTerm => {
            let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
            tokio::spawn(async move {
                while term.recv().await.is_some() {
                    eprintln!("ignoring SIGTERM");
                }
            });
        }
        _ => {}
    }

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(bytes) = out_rx.recv().await {
            if stdout.write_all(&bytes).await.is_err() || stdout.flush().await.is_err() {
                break;
            }
        }
    });

    if mode == Mode::Malformed {
        let _ = out_tx.send(b"this is not json\n".to_vec());
    }

    let send = {
        let out_tx = out_tx.clone();
        move |value: Value| {
            let mut bytes = value.to_string().into_bytes();
            bytes.push(b'\n');
            let _ = out_tx.send(bytes);
        }
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if mode == Mode::Hang || line.trim().is_empty() {
            continue;
        }
        let request: WireRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                eprintln!("bad request: {e}");
                continue;
            }
        };
        let id = json!(request.id);

        match request.method.as_str() {
            "health" if mode == Mode::HealthError => {
                send(failure(&id, -32001, "missing credentials"));
            }
            "health" => {
                send(success(&id, json!({"status": "ok", "pid": std::process::id()})));
                if mode == Mode::CrashAfterHealth {
                    let delay = crash_delay();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        eprintln!("panic: simulated crash");
                        std::process::exit(3);
                    });
                }
            }
            "echo" => send(success(&id, request.params)),
            "sleep" => {
                let ms = request.params.get("ms").and_then(Value::as_u64).unwrap_or(0);
                let send = send.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    send(success(&id, json!({"slept_ms": ms})));
                });
                continue;
            }
            "fail" => send(failure(&id, 1, "requested failure")),
            "env" => {
                let name = request.params.get("name").and_then(Value::as_str).unwrap_or_default();
                send(success(&id, json!({"value": std::env::var(name).ok()})));
            }
            "stderr" => {
                let text = request.params.get("line").and_then(Value::as_str).unwrap_or_default();
                eprintln!("{text}");
                send(success(&id, json!({"written": true})));
            }
            "spawn_holder" => {
                // A descendant that inherits stdout and keeps it open
                match tokio::process::Command::new("sleep")
                    .arg("30")
                    .stdin(std::process::Stdio::null())
                    .stderr(std::process::Stdio::null())
                    .spawn()
                {
                    Ok(holder) => send(success(&id, json!({"pid": holder.id()}))),
                    Err(e) => send(failure(&id, 1, &e.to_string())),
                }
            }
            "shutdown" => {
                if matches!(mode, Mode::IgnoreShutdown | Mode::IgnoreTerm) {
                    eprintln!("ignoring shutdown request");
                    continue;
                }
                send(success(&id, json!({"ok": true})));
                break;
            }
            other => send(failure(&id, -32601, &format!("unknown method {other}"))),
        }

        if per_request {
            break;
        }
    }

    drop(send);
    drop(out_tx);
    let _ = writer.await;
    Ok(())
}
