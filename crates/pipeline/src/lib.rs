//! Core domain for the report pipeline.
//!
//! This crate contains every domain concept, newtype identifier, configuration
//! shape and error type used throughout the workspace, together with the pure
//! data-processing steps (filter, formatter, aggregator, post-processing) and
//! the plugin registry. Infrastructure crates implement the plugin traits
//! defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; the `plugins` crate defines *how* to supply it
//! and the `executor` crate decides *when*.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`FetcherId`, `PluginName`, `ReportRunId`, etc.) |
//! | [`types`] | Shared value types (`PluginPhase`, `SourceKind`, `Timestamp`) |
//! | [`version`] | Semantic versions, range expressions and the contract [`VersionGate`] |
//! | [`errors`] | Registry, fetch, pipeline and plugin error types |
//! | [`config`] | Fetcher, aggregate and report configuration shapes |
//! | [`registry`] | Lock-once plugin [`Registry`] and the per-subsystem [`Registries`] |
//! | [`plugin`] | Plugin descriptor and the data/render/action/enhance ports |
//! | [`filter`], [`formatter`], [`aggregator`], [`postprocess`] | Payload processing |
//! | [`policy`] | Retry arithmetic and failure-policy resolution |
//! | [`context`] | Runtime context and date templating |
//! | [`extensions`] | Named custom predicates, transforms and aggregators |
//! | [`result`] | Result records emitted to renderers and actions |

pub mod aggregator;
pub mod config;
pub mod context;
pub mod errors;
pub mod extensions;
pub mod filter;
pub mod formatter;
pub mod identifiers;
pub mod path;
pub mod plugin;
pub mod policy;
pub mod postprocess;
pub mod registry;
pub mod result;
pub mod types;
pub mod version;

// Re-export the common vocabulary at the crate root for downstream crates.
pub use config::{
    ActionConfig, ActionEvent, AggregateConfig, AggregateStrategy, AuthConfig, DataItemConfig,
    ErrorConfig, ErrorStrategy, FetcherConfig, FilterConfig, FormatterConfig, FormatterKind,
    HttpMethod, HttpSource, PostProcessConfig, ProcessConfig, ReportConfig, RetryConfig, SortConfig,
    SortOrder, SourceConfig,
};
pub use context::{DateContext, RuntimeContext};
pub use errors::{
    ActionError, EnhanceError, FetchError, PipelineError, RegistryError, RenderError,
};
pub use extensions::Extensions;
pub use filter::{Filter, FilterError};
pub use formatter::{FormatError, Formatter};
pub use identifiers::{ActionType, FetcherId, PluginName, RenderMode, ReportRunId};
pub use plugin::{
    ActionContext, ActionPlugin, DataPlugin, EnhancePlugin, Plugin, PluginDescriptor,
    RenderPlugin,
};
pub use policy::{AggregateOutcome, FailureOutcome, RetryPolicy};
pub use registry::{
    ActionRegistry, DataRegistry, EnhanceRegistry, Registries, Registry, RenderRegistry,
};
pub use result::{DataResult, DataResultMeta, PipelineResult, PipelineResultMetadata, RenderResult};
pub use types::{PluginPhase, SourceKind, Timestamp};
pub use version::{Version, VersionError, VersionGate, VersionReq, CONTRACTS_VERSION};
