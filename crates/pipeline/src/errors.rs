//! Top-level error types for the report pipeline domain.
//!
//! [`RegistryError`] covers registration-time failures; these are fail-fast and
//! must abort startup. [`FetchError`] covers fetch-time failures, which are
//! recovered according to each fetcher's configured error strategy.
//! [`PipelineError`] covers aggregate-time failures surfaced to the caller of
//! the orchestrator. [`RenderError`], [`ActionError`] and [`EnhanceError`] are
//! returned by plugin invocations during the report lifecycle.
//!
//! Component-level errors ([`crate::filter::FilterError`],
//! [`crate::formatter::FormatError`], [`crate::version::VersionError`]) are
//! defined in their respective modules.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::FilterError;
use crate::formatter::FormatError;
use crate::version::VersionError;
use crate::{FetcherId, PluginPhase, SourceKind};

// ---------------------------------------------------------------------------
// Registration-time errors
// ---------------------------------------------------------------------------

/// Errors raised while registering or resolving plugins.
///
/// Never recovered: registration errors propagate to the bootstrap caller and
/// lookups of unregistered keys are configuration mistakes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry has been locked; no further registrations are accepted.
    #[error("Registry '{registry}' is locked, cannot register plugins")]
    Locked {
        /// Name of the locked registry.
        registry: String,
    },

    /// A plugin is already registered under this key. The first registration
    /// is retained unchanged.
    #[error("Duplicate plugin key registration in '{registry}': {key}")]
    DuplicatePlugin {
        /// Registry the registration was attempted on.
        registry: String,
        /// The duplicated key.
        key: String,
    },

    /// The plugin's declared phase differs from the registry's expected phase.
    #[error("Plugin '{plugin}' has invalid phase: expected '{expected}', got '{actual}'")]
    PluginType {
        /// Name of the rejected plugin.
        plugin: String,
        /// Phase the registry accepts.
        expected: PluginPhase,
        /// Phase the plugin declared.
        actual: PluginPhase,
    },

    /// The plugin's compatibility range does not accept the contract version.
    #[error("Plugin {plugin}@{version} is incompatible with contracts version {contracts}")]
    PluginIncompatible {
        /// Name of the rejected plugin.
        plugin: String,
        /// The plugin's own version.
        version: String,
        /// The contract version enforced by the registry.
        contracts: String,
    },

    /// The plugin's version or compatibility range could not be parsed.
    #[error("Plugin '{plugin}' declares an invalid version: {source}")]
    InvalidVersion {
        /// Name of the rejected plugin.
        plugin: String,
        /// Parse failure.
        #[source]
        source: VersionError,
    },

    /// No plugin is registered for the requested key.
    #[error("No plugin registered in '{registry}' for key: {key}")]
    PluginNotFound {
        /// Registry that was queried.
        registry: String,
        /// The missing key.
        key: String,
    },
}

// ---------------------------------------------------------------------------
// Fetch-time errors
// ---------------------------------------------------------------------------

/// Failures of one fetch unit, or of aggregate post-processing.
///
/// `Clone + Serialize` so they can be carried inside result records and handed
/// to action consumers.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchError {
    /// The source-specific raw fetch failed (I/O, HTTP status, missing file).
    #[error("{kind} source failed: {message}")]
    Source {
        /// Source type of the failing plugin.
        kind: SourceKind,
        /// Human-readable failure description.
        message: String,
    },

    /// A raw-fetch attempt exceeded the configured per-attempt deadline.
    #[error("fetch attempt timed out after {after_ms}ms")]
    Timeout {
        /// The deadline that elapsed.
        after_ms: u64,
    },

    /// The source configuration is not usable by the resolved plugin.
    #[error("invalid {kind} source configuration: {message}")]
    InvalidSource {
        /// Source type of the plugin that rejected the configuration.
        kind: SourceKind,
        /// What is wrong with the configuration.
        message: String,
    },

    /// The formatter rejected the payload.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The filter could not be evaluated.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

impl FetchError {
    /// Shorthand for a [`FetchError::Source`] failure.
    pub fn failed(kind: SourceKind, message: impl Into<String>) -> Self {
        Self::Source {
            kind,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregate-time errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the pipeline orchestrator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// An aggregate referenced a fetcher id that is not registered.
    ///
    /// Fatal to the whole aggregate call; nothing is executed.
    #[error("Fetcher not found: {id}")]
    UnknownFetcher {
        /// The unresolved id.
        id: FetcherId,
    },

    /// A fetcher id was registered twice on the same orchestrator.
    #[error("Fetcher already registered: {id}")]
    DuplicateFetcher {
        /// The duplicated id.
        id: FetcherId,
    },

    /// A fetcher's source type has no registered data plugin.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A unit or post-processing failure escalated to the caller.
    ///
    /// Produced by the `throw` error strategy, or when no usable data resulted
    /// from an aggregate that collected errors.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The pipeline configuration is invalid.
    ///
    /// Produced before anything executes; the pipeline never starts with an
    /// invalid config.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Plugin invocation errors
// ---------------------------------------------------------------------------

/// A render plugin could not produce its document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// The data could not be serialised into the target format.
    #[error("render mode '{mode}' failed to serialise: {message}")]
    Serialization {
        /// Mode that failed.
        mode: String,
        /// Serialiser message.
        message: String,
    },

    /// Any other rendering failure.
    #[error("render mode '{mode}' failed: {message}")]
    Failed {
        /// Mode that failed.
        mode: String,
        /// Failure description.
        message: String,
    },
}

/// An action plugin failed. Never interrupts other actions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    /// The action's `spec` is missing a field or carries an unusable value.
    #[error("action '{action}' has an invalid spec: {message}")]
    InvalidSpec { action: String, message: String },

    /// The action consumes a rendered document but none was produced.
    #[error("action '{action}' requires a render result")]
    MissingRender { action: String },

    /// Filesystem or network failure while performing the action.
    #[error("action '{action}' failed: {message}")]
    Io { action: String, message: String },
}

/// An enhance plugin could not rewrite the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("enhance plugin '{plugin}' failed: {message}")]
pub struct EnhanceError {
    /// Plugin that failed.
    pub plugin: String,
    /// Failure description.
    pub message: String,
}
