use std::path::PathBuf;

use async_trait::async_trait;
use pipeline::{
    DataPlugin, FetchError, Plugin, PluginDescriptor, PluginPhase, RuntimeContext, SourceConfig,
    SourceKind,
};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{file::parse_content, unexpected};
use crate::descriptor;

const WILDCARDS: [char; 3] = ['*', '?', '['];

/// Serves `glob` sources: every regular file matching the pattern, in path
/// order, as `{ "file", "content" }` records.
///
/// Each file is decoded the way the `file` source decodes it. Files that
/// cannot be read are logged and left out.
#[derive(Debug)]
pub struct GlobData {
    descriptor: PluginDescriptor,
}

impl GlobData {
    pub fn new() -> Self {
        Self {
            descriptor: descriptor("glob-data", PluginPhase::Data),
        }
    }
}

impl Default for GlobData {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for GlobData {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl DataPlugin for GlobData {
    fn kind(&self) -> SourceKind {
        SourceKind::Glob
    }

    fn validate(&self, source: &SourceConfig) -> Result<(), FetchError> {
        let SourceConfig::Glob { pattern } = source else {
            return Err(unexpected(SourceKind::Glob, source));
        };
        if !pattern.contains(WILDCARDS) {
            return Err(invalid(format!("'{pattern}' has no wildcard")));
        }
        glob::Pattern::new(pattern).map_err(|e| invalid(format!("bad pattern '{pattern}': {e}")))?;
        Ok(())
    }

    async fn fetch(&self, source: &SourceConfig, ctx: &RuntimeContext) -> Result<Value, FetchError> {
        let SourceConfig::Glob { pattern } = source else {
            return Err(unexpected(SourceKind::Glob, source));
        };
        let pattern = ctx.resolve_template(pattern);
        let files = matching_files(pattern.clone()).await?;
        debug!(pattern = %pattern, count = files.len(), "Matched files");

        let mut records = Vec::with_capacity(files.len());
        for file in files {
            let file_name = file.to_string_lossy().into_owned();
            match tokio::fs::read_to_string(&file).await {
                Ok(content) => records.push(json!({
                    "file": file_name,
                    "content": parse_content(&file_name, content)?,
                })),
                Err(e) => warn!(file = %file_name, error = %e, "Skipping unreadable file"),
            }
        }
        Ok(Value::Array(records))
    }
}

// Directory walking is blocking, so it runs off the async workers.
async fn matching_files(pattern: String) -> Result<Vec<PathBuf>, FetchError> {
    tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>, FetchError> {
        let paths = glob::glob(&pattern).map_err(|e| {
            FetchError::failed(SourceKind::Glob, format!("glob pattern failed: {pattern} - {e}"))
        })?;
        Ok(paths
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(path = %e.path().display(), error = %e.error(), "Skipping unreadable path");
                    None
                }
            })
            .filter(|path| path.is_file())
            .collect::<Vec<_>>())
    })
    .await
    .map_err(|e| FetchError::failed(SourceKind::Glob, format!("file matching aborted: {e}")))?
}

fn invalid(message: String) -> FetchError {
    FetchError::InvalidSource {
        kind: SourceKind::Glob,
        message,
    }
}

#[cfg(test)]
mod tests {
    use pipeline::DateContext;

    use super::*;

    fn ctx() -> RuntimeContext {
        RuntimeContext::new(DateContext::parse("2024-03-15").unwrap())
    }

    fn glob_source(pattern: String) -> SourceConfig {
        SourceConfig::Glob { pattern }
    }

    #[tokio::test]
    async fn matching_files_are_read_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b-20240315.json"), r#"{"n":2}"#).unwrap();
        std::fs::write(dir.path().join("a-20240315.json"), r#"{"n":1}"#).unwrap();
        std::fs::write(dir.path().join("c-20240314.json"), r#"{"n":0}"#).unwrap();
        std::fs::write(dir.path().join("d-20240315.csv"), "k,v\nx,1\n").unwrap();
        std::fs::create_dir(dir.path().join("e-20240315.json")).unwrap();

        let pattern = format!("{}/*-{{{{YYYYMMDD}}}}.*", dir.path().display());
        let data = GlobData::new().fetch(&glob_source(pattern), &ctx()).await.unwrap();

        let root = dir.path().display();
        assert_eq!(
            data,
            json!([
                { "file": format!("{root}/a-20240315.json"), "content": { "n": 1 } },
                { "file": format!("{root}/b-20240315.json"), "content": { "n": 2 } },
                { "file": format!("{root}/d-20240315.csv"), "content": [{ "k": "x", "v": "1" }] }
            ])
        );
    }

    #[tokio::test]
    async fn no_match_is_an_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.json", dir.path().display());

        let data = GlobData::new().fetch(&glob_source(pattern), &ctx()).await.unwrap();

        assert_eq!(data, json!([]));
    }

    #[test]
    fn patterns_need_a_valid_wildcard() {
        let source = GlobData::new();

        assert!(source.validate(&glob_source("data/*.json".into())).is_ok());
        assert!(source.validate(&glob_source("data/report?.csv".into())).is_ok());
        assert!(matches!(
            source.validate(&glob_source("data/report.json".into())),
            Err(FetchError::InvalidSource { kind: SourceKind::Glob, .. })
        ));
        assert!(source.validate(&glob_source("data/[a.json".into())).is_err());
        let file = SourceConfig::File { path: "a.json".into(), encoding: None };
        assert!(source.validate(&file).is_err());
    }
}
