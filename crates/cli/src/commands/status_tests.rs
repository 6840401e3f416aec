// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;
use warden_supervisor::lock::{write_pid_marker, LockOwner, OWNER_FILE};

fn config(dir: &TempDir) -> SupervisorConfig {
    SupervisorConfig::new(dir.path().join("ws"), dir.path().join("state"))
}

#[test]
fn free_lock() {
    let dir = TempDir::new().unwrap();
    let report = collect(&config(&dir));
    assert!(!report.lock.exists);
    assert_eq!(report.worker_pid, None);
    assert!(render_text(&report).contains("status:     free"));
}

#[test]
fn lock_held_by_this_process() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let mut holder = LockManager::new(&config);
    assert!(holder.acquire());
    write_pid_marker(&config.pid_path(), std::process::id()).unwrap();

    let report = collect(&config);
    assert!(report.lock.exists);
    assert!(!report.lock.stale);
    assert_eq!(report.lock.owner.as_ref().map(|o| o.pid), Some(std::process::id()));
    assert!(report.worker_alive);

    let text = render_text(&report);
    assert!(text.contains("status:     held"));
    assert!(text.contains("(alive)"));
    holder.release();
}

#[test]
fn lock_from_dead_owner_is_reported_stale() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    std::fs::create_dir_all(config.lock_dir()).unwrap();
    let owner = LockOwner {
        created_at_ms: 0,
        pid: 999_999_999,
        correlation_id: "gone".into(),
        workspace_id: config.workspace_id(),
        workspace_path: config.workspace_root.clone(),
    };
    std::fs::write(
        config.lock_dir().join(OWNER_FILE),
        serde_json::to_vec(&owner).unwrap(),
    )
    .unwrap();

    let report = collect(&config);
    assert!(report.lock.stale);
    assert_eq!(report.lock.owner_alive, Some(false));
    assert!(render_text(&report).contains("(dead)"));
    // status never mutates the lock
    assert!(config.lock_dir().exists());
}

#[test]
fn json_report_serializes() {
    let dir = TempDir::new().unwrap();
    let report = collect(&config(&dir));
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["lock"]["exists"], false);
    assert!(json.get("worker_pid").is_none());
}
