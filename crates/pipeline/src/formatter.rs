//! Payload formatting.
//!
//! `json` parses textual payloads and optionally projects `arrayPath`; `csv`
//! parses delimited text into records. `xml` and `html` are pass-through
//! formats, and `custom` applies a named transform when one is registered and
//! passes the payload through otherwise.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::{CsvHeaders, FormatterConfig, FormatterKind, FormatterOptions};
use crate::extensions::Extensions;
use crate::path::{get_by_path, stringify};

/// Errors raised while formatting a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FormatError {
    /// A textual payload is not valid JSON.
    #[error("failed to parse JSON: {message}")]
    InvalidJson { message: String },

    /// A CSV record could not be parsed.
    #[error("invalid CSV at line {line}: {message}")]
    Csv { line: usize, message: String },

    /// A formatter option is unusable.
    #[error("invalid formatter option: {message}")]
    InvalidOption { message: String },

    /// A named custom transform failed.
    #[error("transform '{name}' failed: {message}")]
    Transform { name: String, message: String },
}

/// A formatter bound to its configuration.
pub struct Formatter<'a> {
    config: &'a FormatterConfig,
    extensions: &'a Extensions,
}

impl<'a> Formatter<'a> {
    pub fn new(config: &'a FormatterConfig, extensions: &'a Extensions) -> Self {
        Self { config, extensions }
    }

    /// Formats `data` according to the configured kind.
    pub fn format(&self, data: Value) -> Result<Value, FormatError> {
        let options = &self.config.options;
        match self.config.kind {
            FormatterKind::Json => format_json(data, options),
            FormatterKind::Csv => {
                let text = match data {
                    Value::String(s) => s,
                    other => stringify(Some(&other)),
                };
                format_csv(&text, options)
            }
            FormatterKind::Xml | FormatterKind::Html => Ok(data),
            FormatterKind::Custom => {
                let Some(name) = options.transform_fn.as_deref() else {
                    return Ok(data);
                };
                match self.extensions.transform(name) {
                    Some(transform) => transform(data).map_err(|message| FormatError::Transform {
                        name: name.to_string(),
                        message,
                    }),
                    None => Ok(data),
                }
            }
        }
    }
}

fn format_json(data: Value, options: &FormatterOptions) -> Result<Value, FormatError> {
    let parsed = match data {
        Value::String(text) => serde_json::from_str(&text).map_err(|e| FormatError::InvalidJson {
            message: e.to_string(),
        })?,
        other => other,
    };
    Ok(match options.array_path.as_deref() {
        Some(path) => get_by_path(&parsed, path).cloned().unwrap_or(Value::Null),
        None => parsed,
    })
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

struct CsvRecord {
    line: usize,
    fields: Vec<String>,
}

fn format_csv(text: &str, options: &FormatterOptions) -> Result<Value, FormatError> {
    let from_line = options.from_line.unwrap_or(1);
    let mut records = parse_records(text, delimiter(options)?)?
        .into_iter()
        .filter(|record| record.line >= from_line);

    let columns = match &options.headers {
        Some(CsvHeaders::Detect(false)) => {
            return Ok(Value::Array(
                records
                    .map(|r| Value::Array(r.fields.into_iter().map(Value::String).collect()))
                    .collect(),
            ));
        }
        Some(CsvHeaders::Names(names)) => names.clone(),
        Some(CsvHeaders::Detect(true)) | None => match records.next() {
            Some(header) => header.fields,
            None => return Ok(Value::Array(Vec::new())),
        },
    };

    records
        .map(|record| {
            if record.fields.len() != columns.len() {
                return Err(FormatError::Csv {
                    line: record.line,
                    message: format!(
                        "expected {} fields, found {}",
                        columns.len(),
                        record.fields.len()
                    ),
                });
            }
            let row: Map<String, Value> = columns
                .iter()
                .cloned()
                .zip(record.fields.into_iter().map(Value::String))
                .collect();
            Ok(Value::Object(row))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn delimiter(options: &FormatterOptions) -> Result<u8, FormatError> {
    match options.delimiter.as_deref().map(str::as_bytes) {
        None => Ok(b','),
        Some([byte]) => Ok(*byte),
        Some(_) => Err(FormatError::InvalidOption {
            message: "CSV delimiter must be a single ASCII character".to_string(),
        }),
    }
}

/// Reads every record of `text` with its starting line. Headers are not
/// detected here because `from_line` has to apply first.
fn parse_records(text: &str, delimiter: u8) -> Result<Vec<CsvRecord>, FormatError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    reader
        .records()
        .map(|record| {
            let record = record.map_err(|e| FormatError::Csv {
                line: e.position().map_or(0, |p| line_number(p.line())),
                message: e.to_string(),
            })?;
            Ok(CsvRecord {
                line: record.position().map_or(0, |p| line_number(p.line())),
                fields: record.iter().map(str::to_string).collect(),
            })
        })
        .collect()
}

fn line_number(line: u64) -> usize {
    usize::try_from(line).unwrap_or(usize::MAX)
}
