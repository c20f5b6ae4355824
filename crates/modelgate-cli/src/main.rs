#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod telemetry;

use std::process;

use anyhow::Context;
use modelgate_pipeline::{Orchestrator, PipelineRun};

use crate::config::{Cli, create_notifications};

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "modelgate_cli::startup";
pub const TRACING_TARGET_CONFIG: &str = "modelgate_cli::config";
pub const TRACING_TARGET_RUN: &str = "modelgate_cli::run";

/// Exit code when the run never started.
const EXIT_SETUP_FAILURE: i32 = 2;

#[tokio::main]
async fn main() {
    let error = match run().await {
        Ok(code) => process::exit(code),
        Err(error) => error,
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_RUN,
            error = %format!("{error:#}"),
            "modelgate terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(EXIT_SETUP_FAILURE);
}

/// Main application entry point; returns the process exit code.
async fn run() -> anyhow::Result<i32> {
    let cli = Cli::init();

    telemetry::init_tracing(cli.logging.verbose, cli.logging.log_format)?;
    cli.log();

    let mut pipeline_config = cli.pipeline.resolve()?;
    cli.backend.adjust(&mut pipeline_config);
    pipeline_config.log();

    let plan = cli.run.plan();
    let (training, endpoints) = cli.backend.create_services()?;
    let notifications = create_notifications(&cli.webhook)?;

    let orchestrator =
        Orchestrator::new(pipeline_config, training, endpoints).with_notifications(notifications);

    tracing::info!(
        target: TRACING_TARGET_RUN,
        mode = %plan.mode(),
        "Starting pipeline run"
    );

    let run = orchestrator
        .run(plan)
        .await
        .context("pipeline run aborted")?;

    report(&run);

    if let Some(path) = &cli.run.output_file {
        run.write_to(path)
            .with_context(|| format!("failed to write run record to {}", path.display()))?;
    }

    Ok(run.exit_code())
}

/// Prints the run summary to stdout and logs the outcome.
fn report(run: &PipelineRun) {
    print!("{run}");

    tracing::info!(
        target: TRACING_TARGET_RUN,
        run_id = %run.run_id,
        state = %run.state,
        exit_code = run.exit_code(),
        "Pipeline run complete"
    );
}
