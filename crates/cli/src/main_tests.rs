// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::FromArgMatches;
use tempfile::TempDir;

use super::{cli_command, format_error, resolve_workspace, Cli, Commands, OutputFormat};

fn parse(args: &[&str]) -> Cli {
    let matches = cli_command().try_get_matches_from(args).unwrap();
    Cli::from_arg_matches(&matches).unwrap()
}

#[test]
fn version_long() {
    let err = cli_command()
        .try_get_matches_from(["warden", "--version"])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DisplayVersion);
}

#[test]
fn call_with_params_and_timeout() {
    let cli = parse(&["warden", "call", "search", r#"{"q":"x"}"#, "--timeout-ms", "250"]);
    let Some(Commands::Call(args)) = cli.command else {
        panic!("expected call command");
    };
    assert_eq!(args.method, "search");
    assert_eq!(args.params.as_deref(), Some(r#"{"q":"x"}"#));
    assert_eq!(args.timeout_ms, Some(250));
}

#[test]
fn global_flags_after_subcommand() {
    let cli = parse(&["warden", "status", "-o", "json", "--workspace", "/tmp/ws"]);
    assert_eq!(cli.output, OutputFormat::Json);
    assert_eq!(cli.workspace, Some(PathBuf::from("/tmp/ws")));
    assert!(matches!(cli.command, Some(Commands::Status)));
}

#[test]
fn output_defaults_to_text() {
    let cli = parse(&["warden", "health"]);
    assert_eq!(cli.output, OutputFormat::Text);
    assert!(cli.workspace.is_none());
}

#[test]
fn call_requires_method() {
    let err = cli_command()
        .try_get_matches_from(["warden", "call"])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
}

#[test]
fn redundant_error_chain_is_collapsed() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
    let err = anyhow::Error::new(io).context("failed to read config: no such file");
    assert_eq!(format_error(&err), "failed to read config: no such file");
}

#[test]
fn distinct_error_chain_is_rendered() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied");
    let err = anyhow::Error::new(io).context("failed to create state directory");
    let text = format_error(&err);
    assert!(text.starts_with("failed to create state directory"));
    assert!(text.contains("Caused by:\n    0: permission denied"));
}

#[test]
fn workspace_is_canonicalized() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("a");
    std::fs::create_dir(&nested).unwrap();
    let resolved = resolve_workspace(Some(&nested.join("..").join("a"))).unwrap();
    assert_eq!(resolved, std::fs::canonicalize(&nested).unwrap());
}

#[test]
fn missing_workspace_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = resolve_workspace(Some(&dir.path().join("absent"))).unwrap_err();
    assert!(err.to_string().contains("is not accessible"));
}
