//! Read-only runtime context shared by every plugin invocation of one run.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::extensions::Extensions;
use crate::{PipelineError, ReportRunId};

/// Report date split into the components used by `{{…}}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateContext {
    /// `YYYY-MM-DD`.
    #[serde(rename = "rawDate")]
    pub raw_date: String,
    #[serde(rename = "YYYY")]
    pub yyyy: String,
    #[serde(rename = "YY")]
    pub yy: String,
    #[serde(rename = "MM")]
    pub mm: String,
    #[serde(rename = "DD")]
    pub dd: String,
    #[serde(rename = "YYYYMMDD")]
    pub yyyymmdd: String,
    #[serde(rename = "YYMMDD")]
    pub yymmdd: String,
    #[serde(rename = "MMDD")]
    pub mmdd: String,
}

impl DateContext {
    pub fn from_date(date: NaiveDate) -> Self {
        let yyyy = format!("{:04}", date.year());
        let yy = yyyy[yyyy.len().saturating_sub(2)..].to_string();
        let mm = format!("{:02}", date.month());
        let dd = format!("{:02}", date.day());
        Self {
            raw_date: format!("{yyyy}-{mm}-{dd}"),
            yyyymmdd: format!("{yyyy}{mm}{dd}"),
            yymmdd: format!("{yy}{mm}{dd}"),
            mmdd: format!("{mm}{dd}"),
            yyyy,
            yy,
            mm,
            dd,
        }
    }

    /// Today's date in UTC.
    pub fn today() -> Self {
        Self::from_date(Utc::now().date_naive())
    }

    /// Parses a `YYYY-MM-DD` date.
    pub fn parse(input: &str) -> Result<Self, PipelineError> {
        NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
            .map(Self::from_date)
            .map_err(|e| PipelineError::Configuration {
                message: format!("invalid report date '{input}': {e}"),
            })
    }

    /// Value of the placeholder `name`, if it is a date placeholder.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        let value = match name {
            "rawDate" => &self.raw_date,
            "YYYY" => &self.yyyy,
            "YY" => &self.yy,
            "MM" => &self.mm,
            "DD" => &self.dd,
            "YYYYMMDD" => &self.yyyymmdd,
            "YYMMDD" => &self.yymmdd,
            "MMDD" => &self.mmdd,
            _ => return None,
        };
        Some(value)
    }
}

/// Context handed to data, render, action and enhance plugins.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    /// Correlates every span of the run.
    pub run_id: ReportRunId,
    pub date: DateContext,
    /// `--var key=value` arguments; usable as `{{key}}` placeholders.
    pub args: BTreeMap<String, String>,
    pub extensions: Arc<Extensions>,
}

impl RuntimeContext {
    pub fn new(date: DateContext) -> Self {
        Self {
            run_id: ReportRunId::new_random(),
            date,
            args: BTreeMap::new(),
            extensions: Arc::new(Extensions::default()),
        }
    }

    pub fn with_args(mut self, args: BTreeMap<String, String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = Arc::new(extensions);
        self
    }

    /// Replaces `{{name}}` placeholders with date components or `args`.
    /// Unknown placeholders are left as written.
    pub fn resolve_template(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                rest = &rest[start..];
                break;
            };
            let name = after[..end].trim();
            match self
                .date
                .lookup(name)
                .or_else(|| self.args.get(name).map(String::as_str))
            {
                Some(value) => out.push_str(value),
                None => out.push_str(&rest[start..start + 2 + end + 2]),
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RuntimeContext {
        RuntimeContext::new(DateContext::parse("2024-03-07").unwrap())
    }

    #[test]
    fn date_components_are_zero_padded() {
        let date = context().date;
        assert_eq!(date.raw_date, "2024-03-07");
        assert_eq!(date.yy, "24");
        assert_eq!(date.yyyymmdd, "20240307");
        assert_eq!(date.yymmdd, "240307");
        assert_eq!(date.mmdd, "0307");
    }

    #[test]
    fn invalid_dates_are_configuration_errors() {
        assert!(matches!(
            DateContext::parse("2024-13-40"),
            Err(PipelineError::Configuration { .. })
        ));
    }

    #[test]
    fn templates_resolve_dates_and_args() {
        let mut args = BTreeMap::new();
        args.insert("team".to_string(), "core".to_string());
        let ctx = context().with_args(args);
        assert_eq!(
            ctx.resolve_template("out/{{team}}/{{YYYY}}/{{MMDD}}-{{ unknown }}.json"),
            "out/core/2024/0307-{{ unknown }}.json"
        );
        assert_eq!(ctx.resolve_template("open {{YYYY"), "open {{YYYY");
        assert_eq!(ctx.resolve_template("{{rawDate}}"), "2024-03-07");
    }
}
