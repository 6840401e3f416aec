// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `warden health` - start the worker, check it, report diagnostics

use anyhow::Result;
use warden_supervisor::{Supervisor, SupervisorConfig};

use crate::exit_error::ExitError;
use crate::output::{print_json, OutputFormat};

pub async fn handle(config: SupervisorConfig, format: OutputFormat) -> Result<()> {
    let supervisor = Supervisor::new(config);

    let healthy = match supervisor.start().await {
        Ok(()) => supervisor.check_health().await,
        Err(e) => {
            tracing::warn!(error = %e, "health: worker failed to start");
            false
        }
    };
    let report = supervisor.diagnostics();
    supervisor.stop("cli health finished").await;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "healthy": healthy,
            "diagnostics": report,
        }))?,
        OutputFormat::Text => {
            println!("health:     {}", if healthy { "ok" } else { "failed" });
            print!("{}", report.render_text());
        }
    }

    if healthy {
        Ok(())
    } else {
        Err(ExitError::silent(1).into())
    }
}
