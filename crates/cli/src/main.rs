//! Report pipeline CLI entry point.
//!
//! This binary is the composition root for the entire system:
//!
//! 1. **Parse arguments** with `clap`.
//! 2. **Wire observability**: `tracing-subscriber` with an `EnvFilter`, a
//!    pretty or JSON layer, and an OpenTelemetry OTLP exporter when
//!    `OTEL_EXPORTER_OTLP_ENDPOINT` is set. All `tracing` spans and structured
//!    events emitted by every crate in the workspace flow through it.
//! 3. **Construct infrastructure**: one shared `ResourcePool` and the built-in
//!    plugins, registered into freshly created registries that are then locked.
//! 4. **Run the command** (`run`, `validate` or `plugins`), close the pool,
//!    and flush telemetry before exiting.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod config;
mod telemetry;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let telemetry = telemetry::init(cli.verbose, cli.log_format)?;

    let result = match cli.command {
        Command::Run(args) => commands::run(args).await,
        Command::Validate(args) => commands::validate(args).await,
        Command::Plugins => commands::plugins().await,
    };

    if let Err(err) = &result {
        tracing::error!(error = %format!("{err:#}"), "Command failed");
    }
    telemetry.shutdown();
    result
}
