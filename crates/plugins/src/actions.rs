//! The built-in `file_output` action.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pipeline::{
    ActionContext, ActionError, ActionPlugin, ActionType, Plugin, PluginDescriptor, PluginPhase,
    RenderMode,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::descriptor;

pub const FILE_OUTPUT: &str = "file_output";

/// `spec` of a `file_output` action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileOutputSpec {
    /// Destination; `{{…}}` placeholders are resolved first.
    path: String,
    #[serde(default)]
    overwrite: bool,
    /// Append the render mode's extension when `path` has none.
    #[serde(default = "enabled")]
    auto_extension: bool,
    #[serde(default)]
    encoding: Option<String>,
}

fn enabled() -> bool {
    true
}

/// Writes the rendered document of the action's render mode to a file.
///
/// Parent directories are created as needed. An existing file is only
/// replaced when `overwrite` is set.
#[derive(Debug)]
pub struct FileOutput {
    descriptor: PluginDescriptor,
}

impl FileOutput {
    pub fn new() -> Self {
        Self {
            descriptor: descriptor("file-output-action", PluginPhase::Action),
        }
    }
}

impl Default for FileOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for FileOutput {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl ActionPlugin for FileOutput {
    fn action_type(&self) -> ActionType {
        ActionType::from_static(FILE_OUTPUT)
    }

    async fn execute(
        &self,
        spec: &Map<String, Value>,
        ctx: &ActionContext<'_>,
    ) -> Result<(), ActionError> {
        let spec: FileOutputSpec = serde_json::from_value(Value::Object(spec.clone()))
            .map_err(|e| invalid_spec(e.to_string()))?;
        if let Some(encoding) = spec.encoding.as_deref() {
            if !encoding.eq_ignore_ascii_case("utf-8") && !encoding.eq_ignore_ascii_case("utf8") {
                return Err(invalid_spec(format!("unsupported encoding '{encoding}'")));
            }
        }
        let render = ctx.render.ok_or_else(|| ActionError::MissingRender {
            action: FILE_OUTPUT.into(),
        })?;

        let mut path = PathBuf::from(ctx.runtime.resolve_template(&spec.path));
        if spec.auto_extension && path.extension().is_none() {
            path.as_mut_os_string().push(format!(".{}", extension_for(&render.mode)));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(&path, e))?;
        }
        write(&path, render.content.as_bytes(), spec.overwrite).await?;

        info!(
            path = %path.display(),
            mode = %render.mode,
            bytes = render.content.len(),
            "Report written"
        );
        Ok(())
    }
}

async fn write(path: &Path, content: &[u8], overwrite: bool) -> Result<(), ActionError> {
    if overwrite {
        return tokio::fs::write(path, content)
            .await
            .map_err(|e| io_error(path, e));
    }
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => ActionError::Io {
                action: FILE_OUTPUT.into(),
                message: format!(
                    "file already exists: {}; set overwrite to replace it",
                    path.display()
                ),
            },
            _ => io_error(path, e),
        })?;
    file.write_all(content).await.map_err(|e| io_error(path, e))?;
    file.flush().await.map_err(|e| io_error(path, e))
}

/// File extension for documents of `mode`.
fn extension_for(mode: &RenderMode) -> &str {
    match mode.as_str() {
        "markdown" => "md",
        "email" => "html",
        other => other,
    }
}

fn invalid_spec(message: String) -> ActionError {
    ActionError::InvalidSpec {
        action: FILE_OUTPUT.into(),
        message,
    }
}

fn io_error(path: &Path, err: std::io::Error) -> ActionError {
    ActionError::Io {
        action: FILE_OUTPUT.into(),
        message: format!("{}: {err}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use pipeline::{ActionEvent, DateContext, RenderResult, ReportConfig, RuntimeContext};
    use serde_json::json;

    use super::*;

    struct Fixture {
        runtime: RuntimeContext,
        report: ReportConfig,
        render: RenderResult,
    }

    impl Fixture {
        fn new(mode: &str) -> Self {
            Self {
                runtime: RuntimeContext::new(DateContext::parse("2024-03-05").unwrap()),
                report: serde_json::from_value(json!({ "title": "t" })).unwrap(),
                render: RenderResult {
                    mode: RenderMode::new(mode).unwrap(),
                    content: "<report/>".into(),
                    meta: Map::new(),
                },
            }
        }

        fn ctx(&self, with_render: bool) -> ActionContext<'_> {
            ActionContext {
                runtime: &self.runtime,
                report: &self.report,
                event: ActionEvent::ReportReady,
                data: &[],
                render: with_render.then_some(&self.render),
            }
        }
    }

    fn spec(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("spec must be an object"),
        }
    }

    #[tokio::test]
    async fn writes_to_templated_path_with_mode_extension() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::new("markdown");
        let path = format!("{}/out/{{{{YYYY}}}}/daily-{{{{MMDD}}}}", dir.path().display());

        FileOutput::new()
            .execute(&spec(json!({ "path": path })), &fixture.ctx(true))
            .await
            .unwrap();

        let written = dir.path().join("out/2024/daily-0305.md");
        assert_eq!(std::fs::read_to_string(written).unwrap(), "<report/>");
    }

    #[tokio::test]
    async fn explicit_extension_is_kept_and_auto_extension_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::new("json");
        let action = FileOutput::new();

        let named = dir.path().join("report.txt");
        action
            .execute(&spec(json!({ "path": named })), &fixture.ctx(true))
            .await
            .unwrap();
        let bare = dir.path().join("report");
        action
            .execute(&spec(json!({ "path": bare, "autoExtension": false })), &fixture.ctx(true))
            .await
            .unwrap();

        assert!(named.exists());
        assert!(bare.exists());
        assert!(!dir.path().join("report.txt.json").exists());
    }

    #[tokio::test]
    async fn existing_files_are_kept_unless_overwrite_is_set() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("report.json");
        std::fs::write(&target, "old").unwrap();
        let fixture = Fixture::new("json");
        let action = FileOutput::new();

        let err = action
            .execute(&spec(json!({ "path": target })), &fixture.ctx(true))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("file already exists"));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "old");

        action
            .execute(&spec(json!({ "path": target, "overwrite": true })), &fixture.ctx(true))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "<report/>");
    }

    #[tokio::test]
    async fn missing_render_and_bad_specs_are_rejected() {
        let fixture = Fixture::new("json");
        let action = FileOutput::new();

        let err = action
            .execute(&spec(json!({ "path": "x" })), &fixture.ctx(false))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::MissingRender { .. }));

        let err = action
            .execute(&spec(json!({ "overwrite": true })), &fixture.ctx(true))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidSpec { .. }));

        let err = action
            .execute(&spec(json!({ "path": "x", "encoding": "utf-16" })), &fixture.ctx(true))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidSpec { .. }));
    }
}
