//! The built-in `template` enhance plugin.

use pipeline::{EnhanceError, EnhancePlugin, Plugin, PluginDescriptor, PluginPhase, RuntimeContext};
use serde_json::Value;

use crate::descriptor;

pub const TEMPLATE: &str = "template";

/// Resolves `{{…}}` placeholders in every string value of the raw
/// configuration. Keys are left untouched.
#[derive(Debug)]
pub struct TemplateEnhance {
    descriptor: PluginDescriptor,
}

impl TemplateEnhance {
    pub fn new() -> Self {
        Self {
            descriptor: descriptor("template-enhance", PluginPhase::Enhance),
        }
    }
}

impl Default for TemplateEnhance {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for TemplateEnhance {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }
}

impl EnhancePlugin for TemplateEnhance {
    fn apply(&self, config: Value, ctx: &RuntimeContext) -> Result<Value, EnhanceError> {
        Ok(resolve(config, ctx))
    }
}

fn resolve(value: Value, ctx: &RuntimeContext) -> Value {
    match value {
        Value::String(text) => Value::String(ctx.resolve_template(&text)),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| resolve(v, ctx)).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, v)| (key, resolve(v, ctx)))
                .collect(),
        ),
        other => other,
    }
}
