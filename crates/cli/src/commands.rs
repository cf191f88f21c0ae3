//! Subcommand implementations.

use std::collections::BTreeMap;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use executor::{ReportOutcome, ReportRunner};
use pipeline::{
    DateContext, PluginDescriptor, Registries, ReportConfig, RuntimeContext, CONTRACTS_VERSION,
};
use plugins::{register_builtins, ResourcePool};
use tracing::{info, warn};

use crate::cli::ReportArgs;
use crate::config::load_report;

/// Registers the built-in plugins and locks every registry.
pub fn bootstrap(pool: Arc<ResourcePool>) -> Result<Registries> {
    let mut registries = Registries::new(CONTRACTS_VERSION);
    register_builtins(&mut registries, pool).context("failed to register built-in plugins")?;
    registries.lock_all();
    Ok(registries)
}

fn context(args: &ReportArgs) -> Result<RuntimeContext> {
    let date = match args.date.as_deref() {
        Some(raw) => DateContext::parse(raw).context("invalid --date")?,
        None => DateContext::today(),
    };
    let vars: BTreeMap<String, String> = args.vars.iter().cloned().collect();
    Ok(RuntimeContext::new(date).with_args(vars))
}

fn prepare(runner: &ReportRunner, args: &ReportArgs, ctx: &RuntimeContext) -> Result<ReportConfig> {
    let raw = load_report(&args.config)?;
    let report = runner
        .prepare(raw, ctx)
        .with_context(|| format!("invalid report configuration in {}", args.config.display()))?;
    runner.check_plugins(&report)?;
    Ok(report)
}

/// `run`: executes the report. Exits non-zero when any data item or action
/// failed.
pub async fn run(args: ReportArgs) -> Result<ExitCode> {
    let pool = Arc::new(ResourcePool::new());
    let runner = ReportRunner::new(Arc::new(bootstrap(Arc::clone(&pool))?));
    let ctx = context(&args)?;
    info!(run_id = %ctx.run_id, date = %ctx.date.raw_date, config = %args.config.display(), "Starting report run");

    let result = match prepare(&runner, &args, &ctx) {
        Ok(report) => runner.run(&report, &ctx).await.map_err(anyhow::Error::from),
        Err(err) => Err(err),
    };
    pool.close().await;

    let outcome = result.context("report run failed")?;
    print_summary(&outcome);
    if outcome.succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!("Report completed with failures");
        Ok(ExitCode::FAILURE)
    }
}

/// `validate`: loads, enhances and checks the configuration.
pub async fn validate(args: ReportArgs) -> Result<ExitCode> {
    let pool = Arc::new(ResourcePool::new());
    let runner = ReportRunner::new(Arc::new(bootstrap(Arc::clone(&pool))?));
    let ctx = context(&args)?;
    let result = prepare(&runner, &args, &ctx);
    pool.close().await;

    let report = result?;
    println!(
        "{}: '{}' is valid ({} fetchers, {} data items, {} actions)",
        args.config.display(),
        report.title,
        report.fetchers.len(),
        report.data.len(),
        report.actions.len()
    );
    Ok(ExitCode::SUCCESS)
}

/// `plugins`: prints every registered plugin.
pub async fn plugins() -> Result<ExitCode> {
    let pool = Arc::new(ResourcePool::new());
    let registries = bootstrap(Arc::clone(&pool))?;
    pool.close().await;

    for line in plugin_lines(&registries) {
        println!("{line}");
    }
    Ok(ExitCode::SUCCESS)
}

fn plugin_lines(registries: &Registries) -> Vec<String> {
    fn line(registry: &str, key: String, d: &PluginDescriptor) -> String {
        format!(
            "{registry:<8} {key:<12} {}@{} (contracts {})",
            d.name, d.version, d.compatible_contracts
        )
    }

    let mut lines = Vec::new();
    for (key, plugin) in registries.data.list() {
        lines.push(line(registries.data.name(), key.to_string(), plugin.descriptor()));
    }
    for (key, plugin) in registries.render.list() {
        lines.push(line(registries.render.name(), key.to_string(), plugin.descriptor()));
    }
    for (key, plugin) in registries.action.list() {
        lines.push(line(registries.action.name(), key.to_string(), plugin.descriptor()));
    }
    for (key, plugin) in registries.enhance.list() {
        lines.push(line(registries.enhance.name(), key.to_string(), plugin.descriptor()));
    }
    lines
}

fn print_summary(outcome: &ReportOutcome) {
    for item in &outcome.data {
        let status = if item.meta.success { "ok" } else { "failed" };
        println!(
            "data    {:<24} {status:<6} {}ms, {} errors",
            item.title,
            item.meta.duration_ms,
            item.meta.errors.len()
        );
    }
    for render in &outcome.renders {
        println!("render  {:<24} {} bytes", render.mode.as_str(), render.content.len());
    }
    for action in &outcome.actions {
        match &action.error {
            None => println!(
                "action  {:<24} ok     {}ms",
                action.action_type.as_str(),
                action.duration_ms
            ),
            Some(err) => println!("action  {:<24} failed {err}", action.action_type.as_str()),
        }
    }
}
