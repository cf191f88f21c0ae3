//! Report configuration loading.
//!
//! The file format is chosen by extension (`.toml`, `.json`, `.yaml`/`.yml`).
//! Environment variables carrying the prefix overlay the file; nested keys
//! are separated by `__` (e.g. `REPORT_TITLE`, `REPORT_META__OWNER`).

use std::path::Path;

use anyhow::{bail, Context, Result};
use figment::providers::{Env, Format, Json, Toml, Yaml};
use figment::Figment;
use serde_json::Value;

/// Prefix of configuration overrides taken from the environment.
pub const ENV_PREFIX: &str = "REPORT_";

/// Loads the raw report configuration from `path`, overlaid with `REPORT_*`
/// environment variables.
pub fn load_report(path: &Path) -> Result<Value> {
    load_with_prefix(path, ENV_PREFIX)
}

fn load_with_prefix(path: &Path, prefix: &str) -> Result<Value> {
    if !path.is_file() {
        bail!("configuration file not found: {}", path.display());
    }
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let figment = match extension.as_str() {
        "toml" => Figment::from(Toml::file(path)),
        "json" => Figment::from(Json::file(path)),
        "yaml" | "yml" => Figment::from(Yaml::file(path)),
        other => bail!(
            "unsupported configuration format '{other}' for {}; expected toml, json or yaml",
            path.display()
        ),
    };

    figment
        .merge(Env::prefixed(prefix).split("__"))
        .extract::<Value>()
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn every_format_yields_the_same_document() {
        let dir = tempfile::tempdir().unwrap();
        let toml = write(
            &dir,
            "r.toml",
            "title = \"Daily\"\n[[fetchers]]\nid = \"a\"\nsource = { type = \"string\", data = \"[1]\" }\n",
        );
        let json = write(
            &dir,
            "r.json",
            r#"{ "title": "Daily", "fetchers": [{ "id": "a", "source": { "type": "string", "data": "[1]" } }] }"#,
        );
        let yaml = write(
            &dir,
            "r.YML",
            "title: Daily\nfetchers:\n  - id: a\n    source:\n      type: string\n      data: \"[1]\"\n",
        );

        let expected = serde_json::json!({
            "title": "Daily",
            "fetchers": [{ "id": "a", "source": { "type": "string", "data": "[1]" } }]
        });
        for path in [toml, json, yaml] {
            assert_eq!(load_with_prefix(&path, "REPORT_TEST_NONE_").unwrap(), expected);
        }
    }

    #[test]
    fn environment_overlays_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "r.json", r#"{ "title": "From file", "meta": { "owner": "ops" } }"#);
        std::env::set_var("REPORT_TEST_OVERLAY_TITLE", "From env");
        std::env::set_var("REPORT_TEST_OVERLAY_META__TEAM", "data");

        let value = load_with_prefix(&path, "REPORT_TEST_OVERLAY_").unwrap();

        assert_eq!(value["title"], "From env");
        assert_eq!(value["meta"]["owner"], "ops");
        assert_eq!(value["meta"]["team"], "data");
    }

    #[test]
    fn missing_files_and_unknown_formats_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_report(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("not found"));

        let ini = write(&dir, "r.ini", "title=x");
        let err = load_report(&ini).unwrap_err();
        assert!(err.to_string().contains("unsupported configuration format 'ini'"));
    }
}
