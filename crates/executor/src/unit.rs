//! Fetch units.
//!
//! A [`FetchUnit`] retrieves one dataset: raw fetch with bounded retry, then
//! formatter, then filter. Once the unit has failed (retries exhausted, or a
//! processing step raised), its error strategy decides the terminal outcome.
//!
//! ```text
//! pending -> fetching -> succeeded
//!                     -> retrying -> fetching
//!                     -> failed_handled | failed_thrown
//! ```
//!
//! State transitions are emitted as `debug` events carrying a `state` field.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use pipeline::{
    DataPlugin, Extensions, FailureOutcome, FetchError, FetcherConfig, FetcherId, Filter,
    Formatter, PipelineResult, PipelineResultMetadata, RetryPolicy, RuntimeContext, Timestamp,
};
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use tracing::Instrument;

use crate::retry::run_with_retry;

/// Lifecycle states of one unit execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Pending,
    Fetching,
    Retrying,
    Succeeded,
    /// Failure absorbed by `skip`, `default` or `retry`.
    FailedHandled,
    /// Failure propagated by `throw`.
    FailedThrown,
}

impl FetchState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::FailedHandled => "failed_handled",
            Self::FailedThrown => "failed_thrown",
        }
    }
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit failure propagated by the `throw` strategy. Carries the metadata
/// of the failed execution.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("fetcher '{}' failed: {error}", .metadata.fetcher_id)]
pub struct UnitError {
    #[source]
    pub error: FetchError,
    pub metadata: PipelineResultMetadata,
}

/// One configured, retryable, policy-governed data retrieval.
pub struct FetchUnit {
    config: FetcherConfig,
    plugin: Arc<dyn DataPlugin>,
    retry: RetryPolicy,
    deadline: Option<Duration>,
}

impl FetchUnit {
    /// Binds `config` to the data plugin serving its source kind.
    ///
    /// Fails when the plugin rejects the source configuration.
    pub fn new(config: FetcherConfig, plugin: Arc<dyn DataPlugin>) -> Result<Self, FetchError> {
        plugin.validate(&config.source)?;
        let retry = RetryPolicy::for_fetcher(config.retry.as_ref(), &config.process.error);
        let deadline = config.timeout_ms.map(Duration::from_millis);
        Ok(Self {
            config,
            plugin,
            retry,
            deadline,
        })
    }

    pub fn id(&self) -> &FetcherId {
        &self.config.id
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Runs the unit once to a terminal state.
    ///
    /// Returns `Err` only for the `throw` strategy; every other failure is
    /// absorbed into the returned result, which keeps the error in `errors`.
    pub async fn execute(&self, ctx: &RuntimeContext) -> Result<PipelineResult, UnitError> {
        let span = tracing::info_span!(
            "fetch_unit",
            fetcher = %self.config.id,
            source = %self.plugin.kind(),
        );
        self.execute_inner(ctx).instrument(span).await
    }

    async fn execute_inner(&self, ctx: &RuntimeContext) -> Result<PipelineResult, UnitError> {
        let started = Instant::now();
        self.transition(FetchState::Pending);

        let outcome = match self.fetch_raw(ctx).await {
            Ok(raw) => self.process(raw, &ctx.extensions),
            Err(err) => Err(err),
        };

        let error = match outcome {
            Ok(data) => {
                self.transition(FetchState::Succeeded);
                return Ok(PipelineResult {
                    success: true,
                    data,
                    errors: Vec::new(),
                    metadata: self.metadata(started, true),
                });
            }
            Err(err) => err,
        };

        let policy = &self.config.process.error;
        match policy.on_failure() {
            FailureOutcome::Propagate => {
                self.transition(FetchState::FailedThrown);
                tracing::error!(fetcher = %self.config.id, error = %error, "Fetch failed");
                Err(UnitError {
                    error,
                    metadata: self.metadata(started, false),
                })
            }
            outcome => {
                self.transition(FetchState::FailedHandled);
                if policy.log_error {
                    tracing::warn!(
                        fetcher = %self.config.id,
                        strategy = ?policy.strategy,
                        error = %error,
                        "Fetch failed, error absorbed by strategy"
                    );
                }
                let (success, data) = match outcome {
                    FailureOutcome::Substitute(value) => (true, value),
                    _ => (false, Value::Null),
                };
                Ok(PipelineResult {
                    success,
                    data,
                    errors: vec![error],
                    metadata: self.metadata(started, success),
                })
            }
        }
    }

    async fn fetch_raw(&self, ctx: &RuntimeContext) -> Result<Value, FetchError> {
        run_with_retry(&self.config.id, &self.retry, self.deadline, move |attempt| {
            self.transition(if attempt == 1 {
                FetchState::Fetching
            } else {
                FetchState::Retrying
            });
            self.plugin.fetch(&self.config.source, ctx)
        })
        .await
    }

    fn process(&self, raw: Value, extensions: &Extensions) -> Result<Value, FetchError> {
        let mut data = raw;
        if let Some(formatter) = &self.config.process.formatter {
            data = Formatter::new(formatter, extensions).format(data)?;
        }
        if let Some(filter) = &self.config.process.filter {
            data = Filter::new(filter, extensions)?.apply(data);
        }
        Ok(data)
    }

    fn transition(&self, state: FetchState) {
        tracing::debug!(fetcher = %self.config.id, state = %state, "Fetch state changed");
    }

    fn metadata(&self, started: Instant, success: bool) -> PipelineResultMetadata {
        PipelineResultMetadata {
            fetcher_id: self.config.id.clone(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            timestamp_ms: Timestamp::now().as_millis(),
            success,
        }
    }
}

impl fmt::Debug for FetchUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchUnit")
            .field("id", &self.config.id)
            .field("source", &self.plugin.kind())
            .field("retry", &self.retry)
            .field("deadline", &self.deadline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pipeline::{
        DateContext, FormatError, Plugin, PluginDescriptor, PluginName, PluginPhase, SourceConfig,
        SourceKind,
    };
    use serde_json::json;

    use super::*;

    /// Always answers with the same text payload.
    struct TextSource {
        descriptor: PluginDescriptor,
    }

    impl TextSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                descriptor: PluginDescriptor {
                    name: PluginName::from_static("text-source"),
                    version: "1.0.0".to_string(),
                    compatible_contracts: "^1.0.0".to_string(),
                    phase: PluginPhase::Data,
                },
            })
        }
    }

    impl Plugin for TextSource {
        fn descriptor(&self) -> &PluginDescriptor {
            &self.descriptor
        }
    }

    #[async_trait]
    impl DataPlugin for TextSource {
        fn kind(&self) -> SourceKind {
            SourceKind::Inline
        }

        async fn fetch(&self, source: &SourceConfig, _ctx: &RuntimeContext) -> Result<Value, FetchError> {
            match source {
                SourceConfig::Inline { data } => Ok(data.clone()),
                _ => Err(FetchError::failed(SourceKind::Inline, "unexpected source")),
            }
        }
    }

    fn unit(process: Value) -> FetchUnit {
        let config = serde_json::from_value(json!({
            "id": "rows",
            "source": { "type": "string", "data": "not json" },
            "process": process
        }))
        .unwrap();
        FetchUnit::new(config, TextSource::new()).unwrap()
    }

    fn ctx() -> RuntimeContext {
        RuntimeContext::new(DateContext::parse("2024-05-01").unwrap())
    }

    fn is_json_error(error: &FetchError) -> bool {
        matches!(error, FetchError::Format(FormatError::InvalidJson { .. }))
    }

    #[tokio::test]
    async fn formatter_failure_is_skipped() {
        let unit = unit(json!({ "formatter": { "type": "json" }, "error": { "strategy": "skip" } }));

        let result = unit.execute(&ctx()).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.data, Value::Null);
        assert!(matches!(result.errors[..], [ref e] if is_json_error(e)));
        assert!(!result.metadata.success);
    }

    #[tokio::test]
    async fn formatter_failure_falls_back_to_default_value() {
        let unit = unit(json!({
            "formatter": { "type": "json" },
            "error": { "strategy": "default", "defaultValue": [] }
        }));

        let result = unit.execute(&ctx()).await.unwrap();

        assert!(result.success);
        assert_eq!(result.data, json!([]));
        assert!(matches!(result.errors[..], [ref e] if is_json_error(e)));
    }

    #[tokio::test]
    async fn formatter_failure_is_thrown() {
        let unit = unit(json!({ "formatter": { "type": "json" }, "error": { "strategy": "throw" } }));

        let err = unit.execute(&ctx()).await.unwrap_err();

        assert!(is_json_error(&err.error));
        assert_eq!(err.metadata.fetcher_id.as_str(), "rows");
        assert!(!err.metadata.success);
    }

    #[tokio::test]
    async fn filter_failure_goes_through_the_same_strategy() {
        let unit = unit(json!({
            "filter": { "type": "value", "rules": [{ "operator": "regex", "pattern": "[" }] },
            "error": { "strategy": "default", "defaultValue": "fallback" }
        }));

        let result = unit.execute(&ctx()).await.unwrap();

        assert_eq!(result.data, json!("fallback"));
        assert!(matches!(result.errors[..], [FetchError::Filter(_)]));
    }

    #[tokio::test]
    async fn processing_failures_are_not_retried() {
        let unit = unit(json!({
            "formatter": { "type": "json" },
            "error": { "strategy": "retry", "maxRetries": 3 }
        }));

        let result = unit.execute(&ctx()).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
    }
}
