//! Combination of unit results into one dataset.
//!
//! Only contributing results (successful, non-null data) take part; failed
//! and null results are skipped entirely rather than represented as holes.

use serde_json::{Map, Value};

use crate::config::AggregateStrategy;
use crate::extensions::Extensions;
use crate::PipelineResult;

/// Combines `results`, in iteration order, according to `strategy`.
///
/// `custom` uses the aggregator registered under `custom_fn` and falls back to
/// `concat` when none is resolved.
pub fn aggregate(
    results: &[PipelineResult],
    strategy: AggregateStrategy,
    custom_fn: Option<&str>,
    extensions: &Extensions,
) -> Value {
    match strategy {
        AggregateStrategy::Concat => concat(results),
        AggregateStrategy::Merge => merge(results),
        AggregateStrategy::Custom => match custom_fn.and_then(|name| extensions.aggregator(name)) {
            Some(aggregator) => aggregator(results),
            None => concat(results),
        },
    }
}

/// One flat sequence; sequence data is spliced in one level deep.
pub fn concat(results: &[PipelineResult]) -> Value {
    let mut out = Vec::new();
    for result in results.iter().filter(|r| r.contributes()) {
        match &result.data {
            Value::Array(items) => out.extend(items.iter().cloned()),
            other => out.push(other.clone()),
        }
    }
    Value::Array(out)
}

/// One object; object data is shallow-assigned (later results win), anything
/// else is placed under the fetcher id.
pub fn merge(results: &[PipelineResult]) -> Value {
    let mut out = Map::new();
    for result in results.iter().filter(|r| r.contributes()) {
        match &result.data {
            Value::Object(fields) => {
                out.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            other => {
                out.insert(result.metadata.fetcher_id.to_string(), other.clone());
            }
        }
    }
    Value::Object(out)
}
