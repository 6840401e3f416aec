// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    "WARDEN_WORKER_PATH",
    "WARDEN_BRIDGE_MODE",
    "WARDEN_IDLE_TIMEOUT_MS",
    "WARDEN_REQUEST_TIMEOUT_MS",
    "WARDEN_HANDSHAKE_TIMEOUT_MS",
];

fn clear_overrides(state: &TempDir) {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
    std::env::set_var("WARDEN_STATE_DIR", state.path());
}

fn write_config(workspace: &TempDir, content: &str) {
    let dir = workspace.path().join(".warden");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), content).unwrap();
}

#[test]
#[serial]
fn load_without_file_uses_defaults() {
    let workspace = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    clear_overrides(&state);

    let config = SupervisorConfig::load(workspace.path()).unwrap();

    assert_eq!(config.state_dir, state.path());
    assert_eq!(config.bridge_mode, BridgeMode::Daemon);
    assert_eq!(config.idle_timeout, DEFAULT_IDLE_TIMEOUT);
    assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    assert!(config.auto_start);
    assert_eq!(config.timing, Timing::default());
    assert_eq!(config.worker.name, DEFAULT_WORKER_NAME);
}

#[test]
#[serial]
fn load_reads_workspace_file() {
    let workspace = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    clear_overrides(&state);
    write_config(
        &workspace,
        r#"
bridge_mode = "per_request"
idle_timeout_ms = 0
auto_start = false

[worker]
path = "bin/worker"
args = ["--stdio"]
env = { API_KEY = "secret-value" }

[timing]
handshake_timeout_ms = 1500
max_recovery_attempts = 5
"#,
    );

    let config = SupervisorConfig::load(workspace.path()).unwrap();

    assert_eq!(config.bridge_mode, BridgeMode::PerRequest);
    assert_eq!(config.idle_timeout, Duration::ZERO);
    assert!(!config.auto_start);
    assert_eq!(config.worker.path, Some(PathBuf::from("bin/worker")));
    assert_eq!(config.worker.args, vec!["--stdio".to_string()]);
    assert_eq!(config.secrets(), vec!["secret-value".to_string()]);
    assert_eq!(config.timing.handshake_timeout, Duration::from_millis(1500));
    assert_eq!(config.timing.max_recovery_attempts, 5);
    assert_eq!(config.timing.kill_timeout, Timing::default().kill_timeout);
}

#[test]
#[serial]
fn env_overrides_file() {
    let workspace = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    clear_overrides(&state);
    write_config(&workspace, "request_timeout_ms = 1000\n");
    std::env::set_var("WARDEN_REQUEST_TIMEOUT_MS", "2500");
    std::env::set_var("WARDEN_WORKER_PATH", "/opt/worker");
    std::env::set_var("WARDEN_HANDSHAKE_TIMEOUT_MS", "700");

    let config = SupervisorConfig::load(workspace.path()).unwrap();
    clear_overrides(&state);

    assert_eq!(config.request_timeout, Duration::from_millis(2500));
    assert_eq!(config.worker.path, Some(PathBuf::from("/opt/worker")));
    assert_eq!(config.timing.handshake_timeout, Duration::from_millis(700));
}

#[test]
#[serial]
fn invalid_bridge_mode_env_is_rejected() {
    let workspace = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    clear_overrides(&state);
    std::env::set_var("WARDEN_BRIDGE_MODE", "sometimes");

    let result = SupervisorConfig::load(workspace.path());
    clear_overrides(&state);

    assert!(matches!(result, Err(ConfigError::BridgeMode(m)) if m == "sometimes"));
}

#[test]
#[serial]
fn unknown_keys_are_a_parse_error() {
    let workspace = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    clear_overrides(&state);
    write_config(&workspace, "idle_timeout = 5\n");

    let err = SupervisorConfig::load(workspace.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got {err:?}");
}

#[yare::parameterized(
    daemon      = { "daemon",      BridgeMode::Daemon },
    per_request = { "per_request", BridgeMode::PerRequest },
    hyphenated  = { "per-request", BridgeMode::PerRequest },
    spawn       = { "spawn",       BridgeMode::PerRequest },
)]
fn bridge_mode_parses(input: &str, expected: BridgeMode) {
    assert_eq!(input.parse::<BridgeMode>().unwrap(), expected);
}

#[test]
fn workspace_id_is_stable_and_short() {
    let a = workspace_id(Path::new("/home/user/project"));
    let b = workspace_id(Path::new("/home/user/project/"));
    let c = workspace_id(Path::new("/home/user/other"));

    assert_eq!(a.len(), 16);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn paths_derive_from_workspace_id() {
    let config = SupervisorConfig::new("/ws", "/state");
    let id = config.workspace_id();
    assert_eq!(config.lock_dir(), PathBuf::from(format!("/state/{id}.lock")));
    assert_eq!(config.pid_path(), PathBuf::from(format!("/state/{id}.pid")));
}
