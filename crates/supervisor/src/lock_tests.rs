// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

/// Far above any real pid_max, so `kill -0` always fails.
const DEAD_PID: u32 = 999_999_999;

fn config(state: &TempDir) -> SupervisorConfig {
    SupervisorConfig::new("/workspace/project", state.path())
}

fn write_owner(manager: &LockManager, pid: u32, correlation: &str) {
    std::fs::create_dir_all(manager.path()).unwrap();
    let owner = LockOwner {
        created_at_ms: epoch_ms(),
        pid,
        correlation_id: CorrelationId::new(correlation),
        workspace_id: "x".to_string(),
        workspace_path: PathBuf::from("/workspace/project"),
    };
    std::fs::write(
        manager.path().join(OWNER_FILE),
        serde_json::to_vec(&owner).unwrap(),
    )
    .unwrap();
}

#[test]
fn acquire_writes_metadata_and_release_removes_it() {
    let state = TempDir::new().unwrap();
    let mut lock = LockManager::new(&config(&state));

    assert!(lock.acquire());
    assert!(lock.is_held());
    let owner = lock.read_owner().unwrap();
    assert_eq!(owner.pid, std::process::id());
    assert_eq!(&owner.correlation_id, lock.correlation_id());

    lock.release();
    assert!(!lock.is_held());
    assert!(!lock.path().exists());
}

#[test]
fn acquire_while_held_is_a_no_op() {
    let state = TempDir::new().unwrap();
    let mut lock = LockManager::new(&config(&state));
    assert!(lock.acquire());
    let before = lock.read_owner().unwrap();

    assert!(lock.acquire());
    assert_eq!(lock.read_owner().unwrap(), before);
}

#[test]
fn second_instance_sees_live_owner() {
    let state = TempDir::new().unwrap();
    let mut first = LockManager::new(&config(&state));
    let mut second = LockManager::new(&config(&state));

    assert!(first.acquire());
    let err = second.try_acquire().unwrap_err();
    assert_eq!(err.reason(), ReasonCode::LockHeld);
    assert!(!second.is_held());

    first.release();
    assert!(second.acquire());
}

#[test]
fn dead_owner_is_reclaimed() {
    let state = TempDir::new().unwrap();
    let mut lock = LockManager::new(&config(&state));
    write_owner(&lock, DEAD_PID, "someone-else");

    let (stale, detail) = lock.is_stale();
    assert!(stale, "{detail}");

    assert!(lock.acquire());
    assert_eq!(&lock.read_owner().unwrap().correlation_id, lock.correlation_id());
}

#[test]
fn live_worker_marker_keeps_lock_valid() {
    let state = TempDir::new().unwrap();
    let config = config(&state);
    let mut lock = LockManager::new(&config);
    write_owner(&lock, DEAD_PID, "someone-else");
    write_pid_marker(&config.pid_path(), std::process::id()).unwrap();

    let (stale, detail) = lock.is_stale();
    assert!(!stale);
    assert!(detail.contains("recorded worker pid"), "{detail}");
    assert!(!lock.acquire());
}

#[test]
fn fresh_lock_without_metadata_is_valid() {
    let state = TempDir::new().unwrap();
    let mut lock = LockManager::new(&config(&state));
    std::fs::create_dir_all(lock.path()).unwrap();

    let (stale, _) = lock.is_stale();
    assert!(!stale);
    assert!(matches!(
        lock.try_acquire(),
        Err(LockError::Held { owner: None, .. })
    ));
}

#[test]
fn old_lock_without_metadata_is_stale() {
    let state = TempDir::new().unwrap();
    let mut config = config(&state);
    config.timing.stale_lock_age = Duration::ZERO;
    let mut lock = LockManager::new(&config);
    std::fs::create_dir_all(lock.path()).unwrap();
    std::thread::sleep(Duration::from_millis(20));

    assert!(lock.is_stale().0);
    assert!(lock.acquire());
}

#[test]
fn failed_reclaim_retries_once_and_reports_failure() {
    let state = TempDir::new().unwrap();
    let mut config = config(&state);
    config.timing.stale_lock_age = Duration::ZERO;
    let mut lock = LockManager::new(&config);
    // A plain file at the lock path looks stale but cannot be removed as a
    // directory, so the single retry of create_dir fails too
    std::fs::create_dir_all(lock.path().parent().unwrap()).unwrap();
    std::fs::write(lock.path(), b"not a lock").unwrap();
    std::thread::sleep(Duration::from_millis(20));
    assert!(lock.is_stale().0);

    let err = lock.try_acquire().unwrap_err();
    assert!(matches!(err, LockError::Reclaim { .. }));
    assert_eq!(err.reason(), ReasonCode::LockAcquisitionFailed);
    assert!(!lock.is_held());

    assert!(!lock.acquire());
    assert!(!lock.is_held());
    assert!(lock.path().is_file());
}

#[test]
fn own_lock_is_never_stale() {
    let state = TempDir::new().unwrap();
    let mut lock = LockManager::new(&config(&state));
    assert!(lock.acquire());

    let (stale, detail) = lock.is_stale();
    assert!(!stale);
    assert_eq!(detail, "held by this instance");
}

#[test]
fn release_leaves_reclaimed_lock_alone() {
    let state = TempDir::new().unwrap();
    let mut lock = LockManager::new(&config(&state));
    assert!(lock.acquire());
    write_owner(&lock, std::process::id(), "new-owner");

    lock.release();

    assert!(!lock.is_held());
    assert!(lock.path().exists());
    assert_eq!(lock.read_owner().unwrap().correlation_id, "new-owner");
}

#[test]
fn release_tolerates_missing_files() {
    let state = TempDir::new().unwrap();
    let mut lock = LockManager::new(&config(&state));
    assert!(lock.acquire());
    std::fs::remove_dir_all(lock.path()).unwrap();

    lock.release();
    assert!(!lock.is_held());
}

#[test]
fn inspect_reports_owner() {
    let state = TempDir::new().unwrap();
    let mut holder = LockManager::new(&config(&state));
    let observer = LockManager::new(&config(&state));

    assert!(!observer.inspect().exists);

    assert!(holder.acquire());
    let status = observer.inspect();
    assert!(status.exists);
    assert!(!status.held);
    assert_eq!(status.owner_alive, Some(true));
    assert!(!status.stale);
}

#[test]
fn pid_marker_round_trip() {
    let state = TempDir::new().unwrap();
    let path = state.path().join("nested/ws.pid");
    write_pid_marker(&path, 4242).unwrap();
    assert_eq!(read_pid_marker(&path), Some(4242));
    remove_pid_marker(&path);
    assert_eq!(read_pid_marker(&path), None);
    remove_pid_marker(&path);
}
