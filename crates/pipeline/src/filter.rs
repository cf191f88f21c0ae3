//! Rule-based filtering of record sequences.
//!
//! ## Modes
//!
//! - `field`: keep elements for which **every** rule matches.
//! - `value`: keep elements for which **any** rule matches.
//! - `custom`: keep elements accepted by the named predicate; the data passes
//!   through unchanged when the predicate is not registered.
//!
//! Non-sequence input passes through unchanged in every mode.
//!
//! Rules resolve their `field` by dot path (a missing segment yields a missing
//! value, never an error) and then apply their operator. Regular expressions
//! are compiled once, case-insensitively, when the [`Filter`] is built.

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::{FilterConfig, FilterKind, FilterOperator, FilterRule};
use crate::extensions::{Extensions, FilterPredicate};
use crate::path::{get_by_path, stringify};

/// Errors raised while building a filter.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FilterError {
    /// A `regex` rule carries a pattern that does not compile.
    #[error("invalid regex pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

struct CompiledRule<'a> {
    rule: &'a FilterRule,
    regex: Option<Regex>,
}

/// A filter ready to apply to payloads.
pub struct Filter<'a> {
    kind: FilterKind,
    rules: Vec<CompiledRule<'a>>,
    predicate: Option<&'a FilterPredicate>,
}

impl<'a> Filter<'a> {
    /// Compiles the rules of `config`, resolving `customFn` against `extensions`.
    pub fn new(config: &'a FilterConfig, extensions: &'a Extensions) -> Result<Self, FilterError> {
        let rules = config
            .rules
            .iter()
            .map(|rule| -> Result<CompiledRule<'a>, FilterError> {
                let regex = match (rule.operator, rule.pattern.as_deref()) {
                    (FilterOperator::Regex, Some(pattern)) => Some(
                        RegexBuilder::new(pattern)
                            .case_insensitive(true)
                            .build()
                            .map_err(|e| FilterError::InvalidPattern {
                                pattern: pattern.to_string(),
                                message: e.to_string(),
                            })?,
                    ),
                    _ => None,
                };
                Ok(CompiledRule { rule, regex })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let predicate = match config.kind {
            FilterKind::Custom => config
                .custom_fn
                .as_deref()
                .and_then(|name| extensions.predicate(name)),
            _ => None,
        };

        Ok(Self {
            kind: config.kind,
            rules,
            predicate,
        })
    }

    /// Filters `data`. Non-sequence payloads are returned unchanged.
    pub fn apply(&self, data: Value) -> Value {
        let Value::Array(items) = data else {
            return data;
        };
        let kept = match self.kind {
            FilterKind::Field => items
                .into_iter()
                .filter(|item| self.rules.iter().all(|r| r.matches(item)))
                .collect(),
            FilterKind::Value => items
                .into_iter()
                .filter(|item| self.rules.iter().any(|r| r.matches(item)))
                .collect(),
            FilterKind::Custom => match self.predicate {
                Some(predicate) => items.into_iter().filter(|item| predicate(item)).collect(),
                None => items,
            },
        };
        Value::Array(kept)
    }
}

impl CompiledRule<'_> {
    fn matches(&self, item: &Value) -> bool {
        let value = match self.rule.field.as_deref() {
            Some(field) => get_by_path(item, field),
            None => Some(item),
        };
        let operand = self.rule.value.as_ref();

        match self.rule.operator {
            FilterOperator::Eq => strict_eq(value, operand),
            FilterOperator::Ne => !strict_eq(value, operand),
            FilterOperator::Gt => compare(value, operand) == Some(Ordering::Greater),
            FilterOperator::Lt => compare(value, operand) == Some(Ordering::Less),
            FilterOperator::Gte => matches!(
                compare(value, operand),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOperator::Lte => matches!(
                compare(value, operand),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOperator::In => self.in_values(value),
            FilterOperator::Nin => !self.in_values(value),
            FilterOperator::Contains => contains(value, operand),
            FilterOperator::Exists => !matches!(value, None | Some(Value::Null)),
            FilterOperator::Regex => match &self.regex {
                Some(regex) => regex.is_match(&stringify(value)),
                None => true,
            },
        }
    }

    fn in_values(&self, value: Option<&Value>) -> bool {
        self.rule
            .values
            .as_deref()
            .is_some_and(|values| values.iter().any(|v| strict_eq(value, Some(v))))
    }
}

/// Equality where numbers compare by value and two missing values are equal.
fn strict_eq(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x.as_f64() == y.as_f64(),
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Ordering for number/number and string/string pairs; `None` otherwise.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Option<Ordering> {
    match (a?, b?) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn contains(value: Option<&Value>, operand: Option<&Value>) -> bool {
    match (value, operand) {
        (Some(Value::String(s)), Some(needle)) => s.contains(stringify(Some(needle)).as_str()),
        (Some(Value::Array(items)), needle) => {
            needle.is_some() && items.iter().any(|item| strict_eq(Some(item), needle))
        }
        _ => false,
    }
}
