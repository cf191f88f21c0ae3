//! Configuration shapes consumed by the pipeline.
//!
//! These are constructed once per report run from the resolved configuration
//! and are read-only thereafter. Field names are camelCase on the wire so that
//! existing report configuration files load unchanged.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::{ActionType, FetcherId, PipelineError, RenderMode, SourceKind};

/// Window size used when an aggregate runs in parallel without `maxParallel`.
pub const DEFAULT_MAX_PARALLEL: usize = 5;

/// Per-attempt HTTP timeout applied when a source does not set one.
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;

// Keeps an explicit JSON `null` as `Some(Value::Null)`; a missing key stays `None`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Fetchers
// ---------------------------------------------------------------------------

/// One configured, retryable, policy-governed data retrieval operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetcherConfig {
    /// Unique within one orchestrator.
    pub id: FetcherId,

    /// Where the raw payload comes from.
    pub source: SourceConfig,

    /// Formatter, filter and error handling applied to the payload.
    #[serde(default)]
    pub process: ProcessConfig,

    /// Bounded re-invocation of the raw fetch. Absent means exactly one attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    /// Deadline for each raw-fetch attempt. Absent means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Source configuration, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Inline data. A string payload is parsed as JSON when possible.
    #[serde(rename = "string", alias = "inline")]
    Inline {
        /// The payload.
        #[serde(default)]
        data: Value,
    },

    /// A local file.
    File {
        /// Path to read; `{{…}}` date placeholders are resolved first.
        path: String,
        /// Text encoding. Only UTF-8 is supported.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        encoding: Option<String>,
    },

    /// An HTTP(S) endpoint.
    Http(HttpSource),

    /// Every file matching a wildcard pattern.
    Glob {
        /// Pattern with at least one of `*`, `?` or `[`; `{{…}}` placeholders
        /// are resolved first.
        pattern: String,
    },
}

impl SourceConfig {
    /// The data registry key of this source.
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Inline { .. } => SourceKind::Inline,
            Self::File { .. } => SourceKind::File,
            Self::Http(_) => SourceKind::Http,
            Self::Glob { .. } => SourceKind::Glob,
        }
    }
}

/// HTTP source parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSource {
    /// Absolute URL.
    pub url: String,
    /// Request method; `GET` unless set.
    #[serde(default)]
    pub method: HttpMethod,
    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Credentials attached to the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
    /// JSON body, sent only for methods that carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Request timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl HttpSource {
    /// Effective request timeout.
    pub fn timeout_ms(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT_MS)
    }
}

/// HTTP request method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    /// `true` for methods whose configured `body` is sent.
    pub fn carries_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

/// HTTP authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum AuthConfig {
    /// HTTP basic authentication.
    Basic {
        #[serde(default)]
        username: String,
        #[serde(default)]
        password: String,
    },
    /// `Authorization: Bearer <token>`.
    Bearer { token: String },
    /// API key in a header (`X-API-Key` unless `apiKeyHeader` is set).
    ApiKey {
        api_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key_header: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Processing
// ---------------------------------------------------------------------------

/// Processing applied to a successful raw payload, and the failure policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessConfig {
    /// Applied first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatter: Option<FormatterConfig>,
    /// Applied to the formatter's output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterConfig>,
    /// What to do once the unit has failed.
    #[serde(default)]
    pub error: ErrorConfig,
}

/// Failure policy for one unit (or for an aggregate, under `postProcess.error`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorConfig {
    /// Terminal outcome selector.
    #[serde(default)]
    pub strategy: ErrorStrategy,
    /// Data substituted by the `default` strategy (`null` when absent).
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Retry budget honoured by the `retry` strategy when no `retry` block is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Log absorbed failures at `warn`.
    #[serde(default = "default_log_error")]
    pub log_error: bool,
}

fn default_log_error() -> bool {
    true
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self {
            strategy: ErrorStrategy::default(),
            default_value: None,
            max_retries: None,
            log_error: true,
        }
    }
}

/// Error strategy names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStrategy {
    /// Propagate the failure to the caller.
    #[default]
    Throw,
    /// Non-successful result with `null` data.
    Skip,
    /// Successful result carrying the configured default value.
    Default,
    /// Same terminal outcome as `skip`; enables the `maxRetries` budget.
    Retry,
}

/// Retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Retries after the first attempt; `0` means exactly one attempt.
    pub max_retries: u32,
    /// Base delay between attempts.
    #[serde(alias = "backoff")]
    pub backoff_ms: u64,
    /// Multiply the delay by `2^retry` (first retry is multiplier 1).
    #[serde(default, alias = "exponentialBackoff")]
    pub exponential: bool,
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Filter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    /// Combination mode.
    #[serde(rename = "type")]
    pub kind: FilterKind,
    /// Rules evaluated per element.
    #[serde(default)]
    pub rules: Vec<FilterRule>,
    /// Named predicate for the `custom` mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fn: Option<String>,
}

/// How a filter combines its rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Keep elements matching every rule.
    Field,
    /// Keep elements matching any rule.
    Value,
    /// Delegate to a named predicate.
    Custom,
}

/// One predicate over a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRule {
    /// Dot path into the record; the record itself when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Comparison to perform.
    pub operator: FilterOperator,
    /// Operand for comparisons, equality and `contains`.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Operand list for `in` / `nin`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
    /// Pattern for `regex`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// Filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    Nin,
    Contains,
    Regex,
    Exists,
}

// ---------------------------------------------------------------------------
// Formatter
// ---------------------------------------------------------------------------

/// Formatter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatterConfig {
    /// Payload format.
    #[serde(rename = "type")]
    pub kind: FormatterKind,
    /// Format-specific options.
    #[serde(default)]
    pub options: FormatterOptions,
}

/// Payload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatterKind {
    Json,
    Csv,
    /// Pass-through.
    Xml,
    /// Pass-through.
    Html,
    /// Named transform; pass-through when unresolved.
    Custom,
}

/// Formatter options. Each format reads only the options relevant to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatterOptions {
    /// JSON: dot path projected out of the parsed document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_path: Option<String>,
    /// CSV: field delimiter (`,` by default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    /// CSV: header handling (first row is the header by default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<CsvHeaders>,
    /// CSV: 1-based line to start reading from.
    #[serde(default, alias = "from_line", skip_serializing_if = "Option::is_none")]
    pub from_line: Option<usize>,
    /// Custom: named transform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_fn: Option<String>,
}

/// CSV header handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CsvHeaders {
    /// `true`: first row names the columns. `false`: rows become arrays.
    Detect(bool),
    /// Explicit column names; every row is data.
    Names(Vec<String>),
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// How unit outputs are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateStrategy {
    Merge,
    Concat,
    Custom,
}

/// One aggregate run over registered fetchers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateConfig {
    /// Fetchers to execute, in issue order.
    pub fetchers: Vec<FetcherId>,
    /// Combination strategy.
    pub strategy: AggregateStrategy,
    /// Run in windows of `maxParallel` concurrent units.
    #[serde(default)]
    pub parallel: bool,
    /// Window size; missing or zero means [`DEFAULT_MAX_PARALLEL`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,
    /// Named aggregator for the `custom` strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fn: Option<String>,
    /// Applied to the aggregated data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_process: Option<PostProcessConfig>,
}

impl AggregateConfig {
    /// Number of units launched together in parallel mode.
    pub fn window_size(&self) -> usize {
        self.max_parallel
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_PARALLEL)
    }
}

/// Post-processing, applied in fixed order: filter, format, sort, offset, limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostProcessConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatter: Option<FormatterConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    /// Aggregate-level failure policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorConfig>,
}

/// Sort key and direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    /// Dot path of the sort key.
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// A complete report definition: fetchers, the data items built from them, and
/// the actions run once data (and optionally a rendered document) is ready.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportConfig {
    /// Report title, passed to renderers.
    pub title: String,
    /// Every fetch unit of the report.
    #[serde(default)]
    pub fetchers: Vec<FetcherConfig>,
    /// One aggregate per data item.
    #[serde(default)]
    pub data: Vec<DataItemConfig>,
    /// Side effects.
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
    /// Free-form metadata handed to renderers.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

/// One titled dataset of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataItemConfig {
    pub title: String,
    pub tag: String,
    pub aggregate: AggregateConfig,
}

/// One configured action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionConfig {
    /// Action registry key.
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// Lifecycle event that triggers the action.
    pub on: ActionEvent,
    /// Render mode whose output the action consumes (`report_ready` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_mode: Option<RenderMode>,
    /// Action-specific payload.
    #[serde(default)]
    pub spec: Map<String, Value>,
}

/// Lifecycle events that trigger actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionEvent {
    /// After every data item has been fetched.
    DataReady,
    /// After rendering.
    ReportReady,
}

impl ReportConfig {
    /// Checks cross-references before anything executes.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let mut ids = HashSet::with_capacity(self.fetchers.len());
        for fetcher in &self.fetchers {
            if !ids.insert(&fetcher.id) {
                return Err(PipelineError::DuplicateFetcher {
                    id: fetcher.id.clone(),
                });
            }
        }

        for item in &self.data {
            if let Some(missing) = item.aggregate.fetchers.iter().find(|id| !ids.contains(id)) {
                return Err(PipelineError::Configuration {
                    message: format!(
                        "data item '{}' references unknown fetcher '{missing}'",
                        item.title
                    ),
                });
            }
        }

        for action in &self.actions {
            if action.on == ActionEvent::DataReady && action.render_mode.is_some() {
                return Err(PipelineError::Configuration {
                    message: format!(
                        "action '{}' runs on data_ready and cannot consume a render mode",
                        action.action_type
                    ),
                });
            }
        }
        Ok(())
    }
}
