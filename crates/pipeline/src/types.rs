//! Shared value types for the report pipeline domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! closed vocabularies (phases, source kinds) or wall-clock values that
//! participate in registry checks and result metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Plugin phases
// ---------------------------------------------------------------------------

/// The stage of the report lifecycle a plugin belongs to.
///
/// Each subsystem registry expects exactly one phase; registering a plugin
/// whose descriptor names a different phase is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginPhase {
    /// Pure configuration rewriting before the run starts.
    Enhance,
    /// Data retrieval.
    Data,
    /// Document rendering.
    Render,
    /// Side-effecting actions (persist, export, notify).
    Action,
}

impl PluginPhase {
    /// Returns the lowercase phase tag used in configuration and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enhance => "enhance",
            Self::Data => "data",
            Self::Render => "render",
            Self::Action => "action",
        }
    }
}

impl std::fmt::Display for PluginPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Source kinds
// ---------------------------------------------------------------------------

/// Closed set of data source types.
///
/// Used as the key of the data registry: each kind maps to exactly one data
/// plugin providing the raw-fetch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Inline data embedded in the configuration.
    #[serde(rename = "string", alias = "inline")]
    Inline,
    /// A local file.
    File,
    /// An HTTP(S) endpoint.
    Http,
    /// Every file matching a wildcard pattern.
    Glob,
}

impl SourceKind {
    /// Returns the configuration tag of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inline => "string",
            Self::File => "file",
            Self::Http => "http",
            Self::Glob => "glob",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Milliseconds since the Unix epoch.
    pub fn as_millis(self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_accepts_inline_alias() {
        let a: SourceKind = serde_json::from_str("\"string\"").unwrap();
        let b: SourceKind = serde_json::from_str("\"inline\"").unwrap();
        assert_eq!(a, SourceKind::Inline);
        assert_eq!(b, SourceKind::Inline);
        assert_eq!(serde_json::to_string(&SourceKind::Http).unwrap(), "\"http\"");
        assert_eq!(serde_json::to_string(&SourceKind::Glob).unwrap(), "\"glob\"");
    }

    #[test]
    fn phase_display_matches_serde_tag() {
        for phase in [
            PluginPhase::Enhance,
            PluginPhase::Data,
            PluginPhase::Render,
            PluginPhase::Action,
        ] {
            let tag = serde_json::to_string(&phase).unwrap();
            assert_eq!(tag.trim_matches('"'), phase.to_string());
        }
    }
}
