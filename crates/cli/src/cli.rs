//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::telemetry::LogFormat;

#[derive(Debug, Parser)]
#[command(
    name = "report-cli",
    version = env!("CARGO_PKG_VERSION"),
    about = "Fetch, aggregate, render and deliver configured reports"
)]
pub struct Cli {
    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true, env = "LOG_FORMAT")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a report end to end
    Run(ReportArgs),
    /// Load and check a report configuration without fetching anything
    Validate(ReportArgs),
    /// List the registered plugins
    Plugins,
}

#[derive(Debug, Clone, Args)]
pub struct ReportArgs {
    /// Report configuration file (.toml, .json, .yaml)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Report date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    pub date: Option<String>,

    /// Template variable, usable as `{{key}}` (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
