// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `warden status` - read-only view of the workspace lock

use anyhow::Result;
use serde::Serialize;
use warden_supervisor::lock::read_pid_marker;
use warden_supervisor::signal::process_exists;
use warden_supervisor::{LockManager, LockStatus, SupervisorConfig};

use crate::output::{print_json, OutputFormat};

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub workspace: String,
    pub workspace_id: String,
    pub lock: LockStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_pid: Option<u32>,
    pub worker_alive: bool,
}

pub fn collect(config: &SupervisorConfig) -> StatusReport {
    let lock = LockManager::new(config).inspect();
    let worker_pid = read_pid_marker(&config.pid_path());
    StatusReport {
        workspace: config.workspace_root.display().to_string(),
        workspace_id: config.workspace_id(),
        lock,
        worker_pid,
        worker_alive: worker_pid.is_some_and(process_exists),
    }
}

pub fn render_text(report: &StatusReport) -> String {
    let mut out = format!(
        "workspace:  {} ({})\nlock:       {}\n",
        report.workspace,
        report.workspace_id,
        report.lock.path.display()
    );
    if !report.lock.exists {
        out.push_str("status:     free\n");
        return out;
    }
    let status = if report.lock.stale { "stale" } else { "held" };
    out.push_str(&format!("status:     {status} ({})\n", report.lock.detail));
    if let Some(owner) = &report.lock.owner {
        let alive = match report.lock.owner_alive {
            Some(true) => "alive",
            Some(false) => "dead",
            None => "unknown",
        };
        out.push_str(&format!("owner:      pid {} ({alive})\n", owner.pid));
        out.push_str(&format!("correlation: {}\n", owner.correlation_id));
    }
    if let Some(pid) = report.worker_pid {
        let alive = if report.worker_alive { "alive" } else { "dead" };
        out.push_str(&format!("worker:     pid {pid} ({alive})\n"));
    }
    out
}

pub fn handle(config: SupervisorConfig, format: OutputFormat) -> Result<()> {
    let report = collect(&config);
    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print!("{}", render_text(&report)),
    }
    Ok(())
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
