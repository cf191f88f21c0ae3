//! Post-processing of aggregated data.
//!
//! Fixed order: filter, format, stable sort, then `offset` followed by
//! `limit`. Sorting and slicing only apply to sequences.

use std::cmp::Ordering;

use serde_json::Value;

use crate::config::{PostProcessConfig, SortConfig, SortOrder};
use crate::extensions::Extensions;
use crate::filter::Filter;
use crate::formatter::Formatter;
use crate::path::get_by_path;
use crate::FetchError;

/// Runs every configured step over `data`.
///
/// A failing step aborts the remaining steps; the caller keeps the data it
/// had before post-processing.
pub fn post_process(
    data: Value,
    config: &PostProcessConfig,
    extensions: &Extensions,
) -> Result<Value, FetchError> {
    let mut data = data;
    if let Some(filter) = &config.filter {
        data = Filter::new(filter, extensions)?.apply(data);
    }
    if let Some(formatter) = &config.formatter {
        data = Formatter::new(formatter, extensions).format(data)?;
    }
    if let Value::Array(items) = &mut data {
        if let Some(sort) = &config.sort {
            sort_records(items, sort);
        }
        let offset = config.offset.unwrap_or(0).min(items.len());
        items.drain(..offset);
        if let Some(limit) = config.limit {
            items.truncate(limit);
        }
    }
    Ok(data)
}

/// Stable sort on the value at `sort.field`.
///
/// Keys rank numbers, then strings, then any other value, and a descending
/// sort reverses that ranking. Records whose key is missing or null always go
/// last.
pub fn sort_records(items: &mut [Value], sort: &SortConfig) {
    items.sort_by(|a, b| {
        let (a, b) = (SortKey::of(a, &sort.field), SortKey::of(b, &sort.field));
        match (a, b) {
            (SortKey::Missing, SortKey::Missing) => Ordering::Equal,
            (SortKey::Missing, _) => Ordering::Greater,
            (_, SortKey::Missing) => Ordering::Less,
            (a, b) => match sort.order {
                SortOrder::Asc => a.compare(&b),
                SortOrder::Desc => b.compare(&a),
            },
        }
    });
}

// Variant order is the rank across types.
#[derive(Debug, Clone, Copy)]
enum SortKey<'a> {
    Number(f64),
    Text(&'a str),
    Other,
    Missing,
}

impl<'a> SortKey<'a> {
    fn of(record: &'a Value, field: &str) -> Self {
        match get_by_path(record, field) {
            None | Some(Value::Null) => Self::Missing,
            Some(Value::Number(n)) => n.as_f64().map_or(Self::Other, Self::Number),
            Some(Value::String(s)) => Self::Text(s),
            Some(_) => Self::Other,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Text(_) => 1,
            Self::Other => 2,
            Self::Missing => 3,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(x), Self::Number(y)) => x.total_cmp(y),
            (Self::Text(x), Self::Text(y)) => x.cmp(y),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn run(config: Value, data: Value) -> Result<Value, FetchError> {
        let config: PostProcessConfig = serde_json::from_value(config).unwrap();
        post_process(data, &config, &Extensions::new())
    }

    #[test]
    fn sort_is_stable_on_equal_keys() {
        let out = run(
            json!({ "sort": { "field": "k", "order": "asc" } }),
            json!([{ "k": 1, "i": "x" }, { "k": 1, "i": "y" }]),
        )
        .unwrap();
        assert_eq!(out, json!([{ "k": 1, "i": "x" }, { "k": 1, "i": "y" }]));
    }

    #[test]
    fn descending_sort_keeps_ties_in_input_order() {
        let out = run(
            json!({ "sort": { "field": "k", "order": "desc" } }),
            json!([{ "k": 1, "i": "a" }, { "k": 2 }, { "k": 1, "i": "b" }]),
        )
        .unwrap();
        assert_eq!(out, json!([{ "k": 2 }, { "k": 1, "i": "a" }, { "k": 1, "i": "b" }]));
    }

    #[test]
    fn records_without_the_key_sort_last() {
        let sort = |order: &str, data: Value| {
            run(json!({ "sort": { "field": "k", "order": order } }), data).unwrap()
        };
        assert_eq!(
            sort("asc", json!([{ "k": 3 }, {}, { "k": 1 }])),
            json!([{ "k": 1 }, { "k": 3 }, {}])
        );
        assert_eq!(
            sort("desc", json!([{ "k": 3 }, { "k": null }, { "k": 1 }, { "k": 7 }])),
            json!([{ "k": 7 }, { "k": 3 }, { "k": 1 }, { "k": null }])
        );
    }

    #[test]
    fn mixed_key_types_are_ranked_numbers_then_strings() {
        let out = run(
            json!({ "sort": { "field": "k" } }),
            json!([{ "k": "b" }, { "i": 1 }, { "k": 10 }, { "k": null }, { "k": "a" }, { "k": 2 }]),
        )
        .unwrap();
        assert_eq!(
            out,
            json!([{ "k": 2 }, { "k": 10 }, { "k": "a" }, { "k": "b" }, { "i": 1 }, { "k": null }])
        );
    }

    #[test]
    fn large_mixed_inputs_come_out_ordered() {
        let data: Vec<Value> = (0..200u64)
            .map(|i| match i % 5 {
                0 => json!({ "i": i }),
                1 => json!({ "k": null }),
                _ => json!({ "k": (i * 37) % 101 }),
            })
            .collect();
        let out = run(json!({ "sort": { "field": "k" } }), Value::Array(data)).unwrap();
        let items = out.as_array().unwrap();
        let numbers: Vec<u64> = items.iter().filter_map(|r| r["k"].as_u64()).collect();
        assert_eq!(numbers.len(), 120);
        assert!(numbers.windows(2).all(|w| w[0] <= w[1]));
        assert!(items[120..].iter().all(|r| r["k"].is_null()));
    }

    #[test]
    fn offset_then_limit() {
        let data = json!([1, 2, 3, 4, 5]);
        assert_eq!(run(json!({ "offset": 1, "limit": 2 }), data.clone()).unwrap(), json!([2, 3]));
        assert_eq!(run(json!({ "limit": 2 }), data.clone()).unwrap(), json!([1, 2]));
        assert_eq!(run(json!({ "offset": 3 }), data.clone()).unwrap(), json!([4, 5]));
        assert_eq!(run(json!({ "offset": 9 }), data).unwrap(), json!([]));
    }

    #[test]
    fn filter_runs_before_sort_and_slice() {
        let out = run(
            json!({
                "filter": { "type": "field", "rules": [{ "field": "v", "operator": "gt", "value": 1 }] },
                "sort": { "field": "v", "order": "desc" },
                "limit": 2
            }),
            json!([{ "v": 1 }, { "v": 3 }, { "v": 2 }, { "v": 4 }]),
        )
        .unwrap();
        assert_eq!(out, json!([{ "v": 4 }, { "v": 3 }]));
    }

    #[test]
    fn non_sequences_are_not_sliced() {
        let out = run(json!({ "limit": 0 }), json!({ "a": 1 })).unwrap();
        assert_eq!(out, json!({ "a": 1 }));
    }

    #[test]
    fn step_failures_surface_as_fetch_errors() {
        let err = run(
            json!({ "formatter": { "type": "json" } }),
            json!("not json"),
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::Format(_)));
    }
}
