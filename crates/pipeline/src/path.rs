//! Dot-path addressing into JSON values.

use serde_json::Value;

/// Resolves a dot-separated path such as `data.items.0.name`.
///
/// Object segments are looked up by key; array segments must parse as an
/// index. Any segment that does not resolve yields `None`. An empty path
/// resolves to the value itself.
pub fn get_by_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

// 2^53: beyond it an integral f64 no longer maps onto consecutive integers.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Loose textual form of a possibly-missing value, as used for pattern
/// matching and for feeding non-text payloads to text formats.
///
/// Strings are returned unquoted, missing values read `undefined`, arrays are
/// joined with `,` and objects collapse to `[object Object]`.
pub fn stringify(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < MAX_SAFE_INTEGER => {
                format!("{}", f as i64)
            }
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e21 => format!("{f:.0}"),
            _ => n.to_string(),
        },
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => stringify(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn resolves_nested_objects_and_indices() {
        let doc = json!({ "data": { "items": [{ "name": "a" }, { "name": "b" }] } });
        assert_eq!(get_by_path(&doc, "data.items.1.name"), Some(&json!("b")));
        assert_eq!(get_by_path(&doc, ""), Some(&doc));
    }

    #[test]
    fn missing_segments_resolve_to_none() {
        let doc = json!({ "a": { "b": 1 }, "list": [1] });
        assert_eq!(get_by_path(&doc, "a.c"), None);
        assert_eq!(get_by_path(&doc, "a.b.c"), None);
        assert_eq!(get_by_path(&doc, "list.x"), None);
        assert_eq!(get_by_path(&doc, "list.3"), None);
    }

    #[test]
    fn stringify_matches_loose_text_form() {
        assert_eq!(stringify(None), "undefined");
        assert_eq!(stringify(Some(&json!(null))), "null");
        assert_eq!(stringify(Some(&json!(5.0))), "5");
        assert_eq!(stringify(Some(&json!(1.5))), "1.5");
        assert_eq!(stringify(Some(&json!(1e20))), "100000000000000000000");
        assert_eq!(stringify(Some(&json!(-9.0e15))), "-9000000000000000");
        assert_eq!(stringify(Some(&json!(["a", 1, null]))), "a,1,");
        assert_eq!(stringify(Some(&json!({ "a": 1 }))), "[object Object]");
    }

    #[test]
    fn explicit_null_is_present() {
        let doc = json!({ "a": null });
        assert_eq!(get_by_path(&doc, "a"), Some(&Value::Null));
    }
}
