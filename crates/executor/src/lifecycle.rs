//! Report lifecycle: enhance, data, actions and rendering.
//!
//! [`ReportRunner::prepare`] rewrites the raw configuration through every
//! enhance plugin (registration order) and deserialises the result.
//! [`ReportRunner::run`] then:
//!
//! 1. runs one aggregate per data item; an escalated aggregate error aborts
//!    the run,
//! 2. runs `data_ready` actions,
//! 3. renders once per distinct render mode consumed by `report_ready`
//!    actions (`json` when an action names none); skipped when there are no
//!    such actions,
//! 4. runs `report_ready` actions, each with the document of its mode.
//!
//! Action failures never interrupt other actions; each yields an
//! [`ActionOutcome`].

use std::sync::Arc;

use pipeline::{
    ActionConfig, ActionContext, ActionError, ActionEvent, ActionType, DataResult, DataResultMeta,
    EnhanceError, PipelineError, Registries, RegistryError, RenderError, RenderMode,
    RenderResult, ReportConfig, RuntimeContext,
};
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::orchestrator::Orchestrator;

/// Failures that abort a report run.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Enhance(#[from] EnhanceError),

    /// The enhanced configuration does not deserialise into a report.
    #[error("invalid report configuration: {message}")]
    InvalidConfig { message: String },

    /// Validation or fetcher registration failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// An action type or render mode has no registered plugin.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A data item's aggregate escalated an error.
    #[error("data item '{title}' failed: {source}")]
    Data {
        title: String,
        #[source]
        source: PipelineError,
    },

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Result of one action invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub action_type: ActionType,
    pub event: ActionEvent,
    pub duration_ms: u64,
    /// `None` when the action succeeded.
    pub error: Option<ActionError>,
}

impl ActionOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutcome {
    pub data: Vec<DataResult>,
    pub renders: Vec<RenderResult>,
    pub actions: Vec<ActionOutcome>,
}

impl ReportOutcome {
    /// `true` when every data item and every action succeeded.
    pub fn succeeded(&self) -> bool {
        self.data.iter().all(|d| d.meta.success) && self.actions.iter().all(ActionOutcome::succeeded)
    }
}

/// Drives report runs against a locked set of registries.
#[derive(Debug, Clone)]
pub struct ReportRunner {
    registries: Arc<Registries>,
}

impl ReportRunner {
    pub fn new(registries: Arc<Registries>) -> Self {
        Self { registries }
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Applies the enhance chain to `raw` and deserialises a validated report.
    pub fn prepare(&self, raw: Value, ctx: &RuntimeContext) -> Result<ReportConfig, ReportError> {
        let mut config = raw;
        for (name, plugin) in self.registries.enhance.list() {
            tracing::debug!(plugin = %name, "Applying enhance plugin");
            config = plugin.apply(config, ctx)?;
        }
        let report: ReportConfig =
            serde_json::from_value(config).map_err(|e| ReportError::InvalidConfig {
                message: e.to_string(),
            })?;
        report.validate()?;
        Ok(report)
    }

    /// Checks that every action and render mode the report needs is
    /// registered, before anything runs.
    pub fn check_plugins(&self, report: &ReportConfig) -> Result<(), ReportError> {
        for action in &report.actions {
            self.registries.action.require(&action.action_type)?;
        }
        for mode in render_modes(report) {
            self.registries.render.require(&mode)?;
        }
        Ok(())
    }

    /// Runs `report` to completion.
    #[instrument(skip_all, fields(run_id = %ctx.run_id, report = %report.title))]
    pub async fn run(
        &self,
        report: &ReportConfig,
        ctx: &RuntimeContext,
    ) -> Result<ReportOutcome, ReportError> {
        self.check_plugins(report)?;

        let mut orchestrator = Orchestrator::new();
        for fetcher in &report.fetchers {
            orchestrator.register_fetcher(fetcher.clone(), &self.registries.data)?;
        }

        let mut data = Vec::with_capacity(report.data.len());
        for item in &report.data {
            let started = Instant::now();
            let result = orchestrator
                .execute_aggregate(&item.aggregate, ctx)
                .await
                .map_err(|source| ReportError::Data {
                    title: item.title.clone(),
                    source,
                })?;
            data.push(DataResult {
                title: item.title.clone(),
                tag: item.tag.clone(),
                data: result.data,
                meta: DataResultMeta {
                    success: result.success,
                    errors: result.errors,
                    duration_ms: elapsed_ms(started),
                    fetcher_count: item.aggregate.fetchers.len(),
                },
            });
        }
        info!(items = data.len(), "Data phase complete");

        let mut actions = Vec::with_capacity(report.actions.len());
        for action in actions_on(report, ActionEvent::DataReady) {
            let action_ctx = ActionContext {
                runtime: ctx,
                report,
                event: ActionEvent::DataReady,
                data: &data,
                render: None,
            };
            actions.push(self.run_action(action, &action_ctx).await);
        }

        let mut renders = Vec::new();
        for mode in render_modes(report) {
            let plugin = self.registries.render.require(&mode)?;
            info!(mode = %mode, "Rendering report");
            renders.push(plugin.render(&data, report, ctx).await?);
        }

        for action in actions_on(report, ActionEvent::ReportReady) {
            let mode = action_render_mode(action);
            let action_ctx = ActionContext {
                runtime: ctx,
                report,
                event: ActionEvent::ReportReady,
                data: &data,
                render: renders.iter().find(|r| r.mode == mode),
            };
            actions.push(self.run_action(action, &action_ctx).await);
        }

        let outcome = ReportOutcome {
            data,
            renders,
            actions,
        };
        info!(success = outcome.succeeded(), "Report run complete");
        Ok(outcome)
    }

    async fn run_action(&self, action: &ActionConfig, ctx: &ActionContext<'_>) -> ActionOutcome {
        let started = Instant::now();
        let result = match self.registries.action.require(&action.action_type) {
            Ok(plugin) => plugin.execute(&action.spec, ctx).await,
            Err(err) => Err(ActionError::InvalidSpec {
                action: action.action_type.to_string(),
                message: err.to_string(),
            }),
        };
        if let Err(err) = &result {
            warn!(action = %action.action_type, event = ?ctx.event, error = %err, "Action failed");
        }
        ActionOutcome {
            action_type: action.action_type.clone(),
            event: ctx.event,
            duration_ms: elapsed_ms(started),
            error: result.err(),
        }
    }
}

fn actions_on(report: &ReportConfig, event: ActionEvent) -> impl Iterator<Item = &ActionConfig> {
    report.actions.iter().filter(move |a| a.on == event)
}

fn action_render_mode(action: &ActionConfig) -> RenderMode {
    action.render_mode.clone().unwrap_or_else(RenderMode::json)
}

/// Distinct render modes of `report_ready` actions, in first-use order.
fn render_modes(report: &ReportConfig) -> Vec<RenderMode> {
    let mut modes: Vec<RenderMode> = Vec::new();
    for action in actions_on(report, ActionEvent::ReportReady) {
        let mode = action_render_mode(action);
        if !modes.contains(&mode) {
            modes.push(mode);
        }
    }
    modes
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
