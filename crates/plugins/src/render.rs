//! The built-in `json` render mode.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use pipeline::{
    DataResult, Plugin, PluginDescriptor, PluginPhase, RenderError, RenderMode, RenderPlugin,
    RenderResult, ReportConfig, RuntimeContext,
};
use serde_json::{json, Map};

use crate::descriptor;

/// Renders the report as a pretty-printed `{ title, generatedAt, data }`
/// document.
#[derive(Debug)]
pub struct JsonRender {
    descriptor: PluginDescriptor,
}

impl JsonRender {
    pub fn new() -> Self {
        Self {
            descriptor: descriptor("json-render", PluginPhase::Render),
        }
    }
}

impl Default for JsonRender {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for JsonRender {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl RenderPlugin for JsonRender {
    fn mode(&self) -> RenderMode {
        RenderMode::json()
    }

    async fn render(
        &self,
        data: &[DataResult],
        report: &ReportConfig,
        _ctx: &RuntimeContext,
    ) -> Result<RenderResult, RenderError> {
        let generated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let document = json!({
            "title": report.title,
            "generatedAt": generated_at,
            "data": data,
        });
        let content =
            serde_json::to_string_pretty(&document).map_err(|e| RenderError::Serialization {
                mode: self.mode().to_string(),
                message: e.to_string(),
            })?;

        let mut meta = Map::new();
        meta.insert("generatedAt".into(), json!(generated_at));
        meta.insert("items".into(), json!(data.len()));
        Ok(RenderResult {
            mode: self.mode(),
            content,
            meta,
        })
    }
}
