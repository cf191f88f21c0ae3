//! Built-in data sources, one per [`pipeline::SourceKind`].

mod file;
mod glob;
mod http;
mod inline;

pub use file::FileData;
pub use self::glob::GlobData;
pub use http::HttpData;
pub use inline::InlineData;

use pipeline::{FetchError, SourceConfig, SourceKind};

fn unexpected(kind: SourceKind, source: &SourceConfig) -> FetchError {
    FetchError::InvalidSource {
        kind,
        message: format!("cannot serve a '{}' source", source.kind()),
    }
}
