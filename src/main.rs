//! Flow Smoke - end-to-end smoke test for a containerized flow engine
//!
//! Starts the engine in a container, deploys a flow definition, posts a test
//! event and checks that the flow's counter increased.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use flow_smoke::common::logging;
use flow_smoke::testing::EXIT_ABORTED;

#[derive(Parser)]
#[command(name = "flow-smoke", about = "Smoke test a flow definition against a fresh engine container")]
#[command(version, long_about = None)]
struct Cli {
    /// Flow definition JSON file (default: NiFi_Flow.json, or default_flow_file from config)
    flow: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let started = Instant::now();
    logging::init_cli();

    let cli = Cli::parse();

    let code = match flow_smoke::cli::dispatch(cli.flow, started).await {
        Ok(report) => report.exit_code(),
        Err(e) => {
            eprintln!("Error: {e}");
            EXIT_ABORTED
        }
    };

    std::process::exit(code);
}
