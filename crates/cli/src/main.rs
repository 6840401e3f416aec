// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden - supervise a workspace's stdio worker from the command line

mod commands;
mod exit_error;
mod output;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{call, health, serve, status};
use output::OutputFormat;
use warden_supervisor::SupervisorConfig;

/// Environment variable holding the log filter directive
const LOG_FILTER_VAR: &str = "WARDEN_LOG";
const LOG_FILE: &str = "warden.log";

#[derive(Parser)]
#[command(
    name = "warden",
    version,
    about = "Warden - supervise a long-lived worker process per workspace"
)]
struct Cli {
    /// Output format
    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value_t,
        global = true
    )]
    output: OutputFormat,

    /// Workspace root (default: current directory)
    #[arg(short = 'w', long = "workspace", global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one request to the worker and print the result
    Call(call::CallArgs),
    /// Start the worker, run a health check and print diagnostics
    Health,
    /// Show the workspace lock and worker marker without changing anything
    Status,
    /// Bridge line-delimited JSON requests from stdin to the worker
    Serve,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let code = e
            .downcast_ref::<exit_error::ExitError>()
            .map_or(1, |c| c.code);
        let msg = format_error(&e);
        if !msg.is_empty() {
            eprintln!("Error: {}", msg);
        }
        std::process::exit(code);
    }
}

/// Format an anyhow error, deduplicating the chain.
///
/// When every source message already appears in the top-level text the
/// "Caused by" chain is dropped; otherwise it is rendered in full.
fn format_error(err: &anyhow::Error) -> String {
    let top = err.to_string();

    let chain_redundant = err
        .chain()
        .skip(1)
        .all(|cause| top.contains(&cause.to_string()));

    if chain_redundant {
        return top;
    }

    let mut buf = top;
    for (i, cause) in err.chain().skip(1).enumerate() {
        buf.push_str(&format!("\n\nCaused by:\n    {}: {}", i, cause));
    }
    buf
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.output;

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            return Ok(());
        }
    };

    let workspace = resolve_workspace(cli.workspace.as_deref())?;
    let config = SupervisorConfig::load(&workspace)
        .with_context(|| format!("failed to load configuration for {}", workspace.display()))?;
    let _log_guard = setup_logging(&config.state_dir)?;
    tracing::debug!(workspace = %workspace.display(), "warden invoked");

    match command {
        Commands::Call(args) => call::handle(args, config, format).await?,
        Commands::Health => health::handle(config, format).await?,
        Commands::Status => status::handle(config, format)?,
        Commands::Serve => serve::handle(config).await?,
    }

    Ok(())
}

/// Absolute workspace root; the lock key depends on the exact path.
fn resolve_workspace(arg: Option<&Path>) -> Result<PathBuf> {
    let path = match arg {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    std::fs::canonicalize(&path)
        .with_context(|| format!("workspace {} is not accessible", path.display()))
}

fn setup_logging(state_dir: &Path) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(state_dir)
        .with_context(|| format!("failed to create state directory {}", state_dir.display()))?;

    let file_appender = tracing_appender::rolling::never(state_dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_env(LOG_FILTER_VAR).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}

#[cfg(test)]
fn cli_command() -> clap::Command {
    use clap::CommandFactory;
    Cli::command()
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
