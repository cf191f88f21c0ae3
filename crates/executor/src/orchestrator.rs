//! Aggregate orchestration over registered fetch units.
//!
//! An aggregate resolves its fetcher ids up front, runs the units either one
//! at a time or in windows of `maxParallel`, combines their results, applies
//! post-processing and finally the aggregate failure policy.
//!
//! Unit failures never stop the loop: a `throw` failure is captured and
//! recorded in the aggregate's `errors`, in both sequential and parallel
//! mode. Within a window, results are collected in issue order.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use pipeline::aggregator::aggregate;
use pipeline::policy::settle_aggregate;
use pipeline::postprocess::post_process;
use pipeline::{
    AggregateConfig, AggregateOutcome, DataRegistry, FetchError, FetcherConfig, FetcherId,
    PipelineError, PipelineResult, PipelineResultMetadata, RuntimeContext, Timestamp,
};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::unit::{FetchUnit, UnitError};

/// Registered fetch units of one report run.
#[derive(Debug, Default)]
pub struct Orchestrator {
    units: HashMap<FetcherId, Arc<FetchUnit>>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a unit for `config`, bound to the data plugin of its source kind.
    pub fn register_fetcher(
        &mut self,
        config: FetcherConfig,
        data: &DataRegistry,
    ) -> Result<(), PipelineError> {
        if self.units.contains_key(&config.id) {
            return Err(PipelineError::DuplicateFetcher { id: config.id });
        }
        let plugin = Arc::clone(data.require(&config.source.kind())?);
        self.register_unit(FetchUnit::new(config, plugin)?)
    }

    /// Registers a prebuilt unit.
    pub fn register_unit(&mut self, unit: FetchUnit) -> Result<(), PipelineError> {
        if self.units.contains_key(unit.id()) {
            return Err(PipelineError::DuplicateFetcher {
                id: unit.id().clone(),
            });
        }
        self.units.insert(unit.id().clone(), Arc::new(unit));
        Ok(())
    }

    pub fn has_fetcher(&self, id: &FetcherId) -> bool {
        self.units.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Runs a single unit. A `throw` failure surfaces as [`PipelineError::Fetch`].
    pub async fn execute_fetcher(
        &self,
        id: &FetcherId,
        ctx: &RuntimeContext,
    ) -> Result<PipelineResult, PipelineError> {
        let unit = self.resolve(id)?;
        unit.execute(ctx).await.map_err(|e| PipelineError::Fetch(e.error))
    }

    /// Runs every fetcher of `config` and returns the combined result.
    ///
    /// Fails before running anything when an id is not registered. Fails after
    /// running when the failure policy escalates a collected error.
    #[instrument(
        skip_all,
        fields(
            fetchers = config.fetchers.len(),
            strategy = ?config.strategy,
            parallel = config.parallel,
        )
    )]
    pub async fn execute_aggregate(
        &self,
        config: &AggregateConfig,
        ctx: &RuntimeContext,
    ) -> Result<PipelineResult, PipelineError> {
        let started = Instant::now();
        let units = config
            .fetchers
            .iter()
            .map(|id| self.resolve(id))
            .collect::<Result<Vec<_>, _>>()?;

        let mut results = Vec::with_capacity(units.len());
        let mut errors = Vec::new();

        if config.parallel {
            let window = config.window_size();
            for (index, batch) in units.chunks(window).enumerate() {
                info!(window = index, size = batch.len(), "Starting fetch window");
                let settled = join_all(batch.iter().map(|unit| unit.execute(ctx))).await;
                for outcome in settled {
                    collect(outcome, &mut results, &mut errors);
                }
            }
        } else {
            for unit in &units {
                collect(unit.execute(ctx).await, &mut results, &mut errors);
            }
        }

        let mut data = aggregate(
            &results,
            config.strategy,
            config.custom_fn.as_deref(),
            &ctx.extensions,
        );

        if let Some(post) = &config.post_process {
            match post_process(data.clone(), post, &ctx.extensions) {
                Ok(processed) => data = processed,
                Err(err) => {
                    warn!(error = %err, "Post-processing failed, keeping aggregated data");
                    errors.push(err);
                }
            }
        }

        let policy = config.post_process.as_ref().and_then(|p| p.error.as_ref());
        match settle_aggregate(data, &errors, policy) {
            AggregateOutcome::Raise(err) => Err(PipelineError::Fetch(err)),
            AggregateOutcome::Return(data) => {
                let success = errors.is_empty();
                info!(
                    success,
                    errors = errors.len(),
                    contributing = results.iter().filter(|r| r.contributes()).count(),
                    "Aggregate complete"
                );
                Ok(PipelineResult {
                    success,
                    data,
                    errors,
                    metadata: PipelineResultMetadata {
                        fetcher_id: FetcherId::aggregate(),
                        duration_ms: u64::try_from(started.elapsed().as_millis())
                            .unwrap_or(u64::MAX),
                        timestamp_ms: Timestamp::now().as_millis(),
                        success,
                    },
                })
            }
        }
    }

    fn resolve(&self, id: &FetcherId) -> Result<&Arc<FetchUnit>, PipelineError> {
        self.units
            .get(id)
            .ok_or_else(|| PipelineError::UnknownFetcher { id: id.clone() })
    }
}

// Absorbed failures stay on their own result; thrown ones also feed the
// aggregate's error list.
fn collect(
    outcome: Result<PipelineResult, UnitError>,
    results: &mut Vec<PipelineResult>,
    errors: &mut Vec<FetchError>,
) {
    match outcome {
        Ok(result) => results.push(result),
        Err(UnitError { error, metadata }) => {
            errors.push(error.clone());
            results.push(PipelineResult {
                success: false,
                data: Value::Null,
                errors: vec![error],
                metadata,
            });
        }
    }
}
