use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use pipeline::{
    DataPlugin, Extensions, FetchError, Formatter, FormatterConfig, FormatterKind, Plugin,
    PluginDescriptor, PluginPhase, RuntimeContext, SourceConfig, SourceKind,
};
use serde_json::Value;
use tracing::debug;

use super::unexpected;
use crate::descriptor;

/// Serves `file` sources from the local filesystem.
///
/// `{{…}}` placeholders in the path are resolved against the run context.
/// `.json` files are parsed when they hold valid JSON and `.csv` files become
/// one record per row, keyed by the header row. Everything else is returned
/// as text.
#[derive(Debug)]
pub struct FileData {
    descriptor: PluginDescriptor,
}

impl FileData {
    pub fn new() -> Self {
        Self {
            descriptor: descriptor("file-data", PluginPhase::Data),
        }
    }
}

impl Default for FileData {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for FileData {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl DataPlugin for FileData {
    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    fn validate(&self, source: &SourceConfig) -> Result<(), FetchError> {
        let SourceConfig::File { path, encoding } = source else {
            return Err(unexpected(SourceKind::File, source));
        };
        if path.trim().is_empty() {
            return Err(FetchError::InvalidSource {
                kind: SourceKind::File,
                message: "path must not be empty".into(),
            });
        }
        match encoding.as_deref() {
            None => Ok(()),
            Some(enc) if enc.eq_ignore_ascii_case("utf-8") || enc.eq_ignore_ascii_case("utf8") => {
                Ok(())
            }
            Some(enc) => Err(FetchError::InvalidSource {
                kind: SourceKind::File,
                message: format!("unsupported encoding '{enc}'"),
            }),
        }
    }

    async fn fetch(&self, source: &SourceConfig, ctx: &RuntimeContext) -> Result<Value, FetchError> {
        let SourceConfig::File { path, .. } = source else {
            return Err(unexpected(SourceKind::File, source));
        };
        let path = ctx.resolve_template(path);
        debug!(path = %path, "Reading file source");

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            let message = match e.kind() {
                ErrorKind::NotFound => format!("file not found: {path}"),
                _ => format!("cannot read {path}: {e}"),
            };
            FetchError::failed(SourceKind::File, message)
        })?;

        parse_content(&path, content)
    }
}

/// Decodes file text by extension.
pub(super) fn parse_content(path: &str, content: String) -> Result<Value, FetchError> {
    if has_extension(path, "csv") {
        let config = FormatterConfig {
            kind: FormatterKind::Csv,
            options: Default::default(),
        };
        return Formatter::new(&config, &Extensions::new())
            .format(Value::String(content))
            .map_err(FetchError::from);
    }
    if has_extension(path, "json") {
        if let Ok(parsed) = serde_json::from_str(&content) {
            return Ok(parsed);
        }
    }
    Ok(Value::String(content))
}

fn has_extension(path: &str, wanted: &str) -> bool {
    Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}
