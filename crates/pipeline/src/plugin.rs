//! Plugin ports.
//!
//! Every capability bound in a [`crate::Registry`] implements [`Plugin`] so
//! the registry can check its descriptor, plus one phase-specific trait that
//! the executor invokes. Implementations live in the `plugins` crate or in
//! embedding applications; this crate only defines the contracts.
//!
//! ## Architectural Layer
//!
//! **Port definitions.** No I/O happens here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{ActionEvent, ReportConfig, SourceConfig};
use crate::context::RuntimeContext;
use crate::errors::{ActionError, EnhanceError, FetchError, RenderError};
use crate::result::{DataResult, RenderResult};
use crate::{ActionType, PluginName, PluginPhase, RenderMode, SourceKind};

/// Immutable identity of a plugin, checked once at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    /// Globally unique name.
    pub name: PluginName,
    /// The plugin's own semantic version.
    pub version: String,
    /// Range of contract versions the plugin works with (e.g. `^1.0.0`).
    pub compatible_contracts: String,
    /// Lifecycle stage the plugin belongs to.
    pub phase: PluginPhase,
}

/// Common surface of every plugin.
pub trait Plugin: Send + Sync {
    fn descriptor(&self) -> &PluginDescriptor;
}

/// Raw fetch for one [`SourceKind`].
#[async_trait]
pub trait DataPlugin: Plugin {
    /// Source type served by this plugin.
    fn kind(&self) -> SourceKind;

    /// Rejects configurations the plugin cannot serve, before anything runs.
    fn validate(&self, _source: &SourceConfig) -> Result<(), FetchError> {
        Ok(())
    }

    /// Retrieves the raw payload. Invoked once per attempt.
    async fn fetch(&self, source: &SourceConfig, ctx: &RuntimeContext) -> Result<Value, FetchError>;
}

/// Produces a document from the report's datasets.
#[async_trait]
pub trait RenderPlugin: Plugin {
    fn mode(&self) -> RenderMode;

    async fn render(
        &self,
        data: &[DataResult],
        report: &ReportConfig,
        ctx: &RuntimeContext,
    ) -> Result<RenderResult, RenderError>;
}

/// What an action sees when it runs.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub runtime: &'a RuntimeContext,
    pub report: &'a ReportConfig,
    /// Event that triggered the action.
    pub event: ActionEvent,
    pub data: &'a [DataResult],
    /// Document of the action's render mode; `None` on `data_ready`.
    pub render: Option<&'a RenderResult>,
}

/// Side effect run on a lifecycle event.
#[async_trait]
pub trait ActionPlugin: Plugin {
    fn action_type(&self) -> ActionType;

    async fn execute(
        &self,
        spec: &Map<String, Value>,
        ctx: &ActionContext<'_>,
    ) -> Result<(), ActionError>;
}

/// Pure rewrite of the raw configuration before it is deserialised.
pub trait EnhancePlugin: Plugin {
    fn apply(&self, config: Value, ctx: &RuntimeContext) -> Result<Value, EnhanceError>;
}
