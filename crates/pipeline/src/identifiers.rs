//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging a
//! [`FetcherId`] with an [`ActionType`] even though both are strings under the
//! hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, from_static(), as_str(), Display,
// and a validating Deserialize (empty strings are rejected at load time).
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Wraps a non-empty literal, for built-in keys and names.
            pub fn from_static(value: &'static str) -> Self {
                debug_assert!(!value.is_empty(), "identifier literals must not be empty");
                Self(value.to_string())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::new(raw).ok_or_else(|| {
                    serde::de::Error::custom(concat!(stringify!($name), " must not be empty"))
                })
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single report run (one invocation of the CLI `run` command).
///
/// Generated fresh for every run; propagated through spans so all activity from
/// a single run can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportRunId(Uuid);

impl ReportRunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`ReportRunId`] from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ReportRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (configuration names)
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a fetch unit within one orchestrator.
    ///
    /// Declared as `id` on each fetcher in the report configuration and referenced
    /// by `fetchers` lists in aggregate configurations.
    FetcherId
}

impl FetcherId {
    /// Id recorded in the metadata of an aggregate result.
    pub fn aggregate() -> Self {
        Self("aggregate".to_string())
    }
}

string_id! {
    /// Globally unique plugin name (e.g. `"file-output-action"`).
    PluginName
}

string_id! {
    /// Capability key of an action plugin (e.g. `"file_output"`).
    ActionType
}

string_id! {
    /// Capability key of a render plugin (e.g. `"json"`).
    RenderMode
}

impl RenderMode {
    /// Mode used by `report_ready` actions that do not name one.
    pub fn json() -> Self {
        Self("json".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_identifiers_are_rejected() {
        assert!(FetcherId::new("").is_none());
        assert_eq!(FetcherId::new("users").map(|id| id.to_string()), Some("users".into()));
        assert_eq!(Some(ActionType::from_static("file_output")), ActionType::new("file_output"));
    }

    #[test]
    fn deserialising_empty_identifier_fails() {
        let err = serde_json::from_str::<FetcherId>("\"\"").unwrap_err();
        assert!(err.to_string().contains("FetcherId must not be empty"));
        let ok: RenderMode = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(ok.as_str(), "json");
    }
}
