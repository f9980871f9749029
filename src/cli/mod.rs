//! CLI command handling
//!
//! Loads configuration and the flow definition, connects to Docker and
//! hands everything to the smoke test runner.

use std::path::PathBuf;
use std::time::Instant;

use colored::Colorize;

use crate::common::{Config, Result};
use crate::container::DockerProvisioner;
use crate::engine::FlowDefinition;
use crate::testing::{print_summary, RunReport, SmokeTest};

/// Run one smoke test with `flow`, or the configured default flow file
///
/// Elapsed times are reported relative to `started`.
pub async fn dispatch(flow: Option<PathBuf>, started: Instant) -> Result<RunReport> {
    let config = Config::load()?;
    let path = flow.unwrap_or_else(|| config.default_flow_file.clone());

    // Load before provisioning so a bad file never starts a container
    let flow = FlowDefinition::load(&path)?;
    println!("{} {}", "Flow definition:".blue().bold(), path.display().to_string().white());

    let provisioner =
        DockerProvisioner::connect_local()?.with_stop_timeout(config.container.stop_timeout_secs);
    let smoke = SmokeTest::new(&config, &provisioner)?.started_at(started);
    let report = smoke.run(&flow, shutdown_signal()).await;

    print_summary(&report);
    Ok(report)
}

/// Resolves on Ctrl-C. If the handler cannot be installed, never resolves.
///
/// The handler is installed on first poll, which happens as soon as
/// provisioning starts.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
