//! Standardised result records emitted by fetch units, aggregates and
//! renderers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{FetchError, FetcherId, RenderMode};

/// Timing and identity of one unit or aggregate execution.
///
/// Produced for every execution, whatever its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResultMetadata {
    /// Fetcher that produced the result (`aggregate` for aggregate results).
    pub fetcher_id: FetcherId,
    /// Wall-clock duration of the execution.
    pub duration_ms: u64,
    /// Completion time, milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// Mirrors [`PipelineResult::success`].
    pub success: bool,
}

/// Outcome of one fetch unit or one aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    /// `false` when the unit failed, or when the aggregate collected errors.
    pub success: bool,
    /// Payload; `null` for failed units.
    pub data: Value,
    /// Errors recorded while producing this result.
    pub errors: Vec<FetchError>,
    pub metadata: PipelineResultMetadata,
}

impl PipelineResult {
    /// `true` when the result contributes to an aggregate.
    pub fn contributes(&self) -> bool {
        self.success && !self.data.is_null()
    }
}

/// One titled dataset handed to renderers and actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataResult {
    pub title: String,
    pub tag: String,
    pub data: Value,
    pub meta: DataResultMeta,
}

/// Summary of the aggregate that produced a [`DataResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataResultMeta {
    pub success: bool,
    pub errors: Vec<FetchError>,
    pub duration_ms: u64,
    /// Number of fetchers the aggregate ran.
    pub fetcher_count: usize,
}

/// A rendered document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderResult {
    /// Mode that produced the document; also its file extension.
    pub mode: RenderMode,
    pub content: String,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

/// `true` for `null`, `[]` and `{}`.
pub fn is_empty_data(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
