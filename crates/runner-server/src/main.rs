mod archive;
mod args;
mod controller;
mod error;
mod handlers;
mod orchestrator;
mod state;
#[cfg(test)]
mod testing;
mod worker;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use runner_common::telemetry::init_tracing;

use crate::args::Args;
use crate::controller::{ActivityController, ServerSettings};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let _telemetry = init_tracing(
        "runner",
        args.otlp_endpoint.as_deref(),
        args.otlp_token.as_deref(),
    );
    tracing::info!(activity = %args.activity, "runner starting");

    let controller = ActivityController::new(ServerSettings::from(&args));
    controller.execute(&args.launch_parameters()).await
}
