use async_trait::async_trait;
use pipeline::{
    DataPlugin, FetchError, Plugin, PluginDescriptor, PluginPhase, RuntimeContext, SourceConfig,
    SourceKind,
};
use serde_json::Value;

use super::unexpected;
use crate::descriptor;

/// Serves `string` (alias `inline`) sources: the configured `data` itself.
///
/// A string payload that holds JSON text is parsed; any other string is
/// returned unchanged.
#[derive(Debug)]
pub struct InlineData {
    descriptor: PluginDescriptor,
}

impl InlineData {
    pub fn new() -> Self {
        Self {
            descriptor: descriptor("inline-data", PluginPhase::Data),
        }
    }
}

impl Default for InlineData {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for InlineData {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl DataPlugin for InlineData {
    fn kind(&self) -> SourceKind {
        SourceKind::Inline
    }

    fn validate(&self, source: &SourceConfig) -> Result<(), FetchError> {
        match source {
            SourceConfig::Inline { .. } => Ok(()),
            other => Err(unexpected(SourceKind::Inline, other)),
        }
    }

    async fn fetch(&self, source: &SourceConfig, _ctx: &RuntimeContext) -> Result<Value, FetchError> {
        let SourceConfig::Inline { data } = source else {
            return Err(unexpected(SourceKind::Inline, source));
        };
        Ok(match data {
            Value::String(text) => serde_json::from_str(text).unwrap_or_else(|_| data.clone()),
            other => other.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use pipeline::DateContext;
    use serde_json::json;

    use super::*;

    fn ctx() -> RuntimeContext {
        RuntimeContext::new(DateContext::parse("2024-01-31").unwrap())
    }

    #[tokio::test]
    async fn json_text_is_parsed_and_plain_text_kept() {
        let source = InlineData::new();
        let parsed = SourceConfig::Inline { data: json!("[{\"a\":1}]") };
        let text = SourceConfig::Inline { data: json!("not json") };
        let structured = SourceConfig::Inline { data: json!({ "a": 1 }) };

        assert_eq!(source.fetch(&parsed, &ctx()).await.unwrap(), json!([{ "a": 1 }]));
        assert_eq!(source.fetch(&text, &ctx()).await.unwrap(), json!("not json"));
        assert_eq!(source.fetch(&structured, &ctx()).await.unwrap(), json!({ "a": 1 }));
    }

    #[test]
    fn other_source_kinds_are_rejected() {
        let file = SourceConfig::File { path: "a.json".into(), encoding: None };
        let err = InlineData::new().validate(&file).unwrap_err();
        assert!(matches!(err, FetchError::InvalidSource { kind: SourceKind::Inline, .. }));
    }
}
