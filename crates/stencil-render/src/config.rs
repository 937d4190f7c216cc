//! Target configuration and per-stream setting resolution.
//!
//! The configuration file is JSON. Every rendering setting can be given
//! globally and overridden for a single stream under `stream_configs`:
//!
//! ```json
//! {
//!   "template_dir": "templates",
//!   "output_dir": "output",
//!   "template_list": [
//!     {
//!       "header_template_name": "csv/header.csv",
//!       "data_template_name": "csv/line.csv",
//!       "footer_template_name": "",
//!       "output_file_name": "orders.csv"
//!     }
//!   ],
//!   "stream_configs": {
//!     "customers": { "output_dir": "output/customers" }
//!   }
//! }
//! ```
//!
//! [`TargetConfig::resolve`] implements the precedence rule: a stream-specific
//! value always wins, then the global one, otherwise the setting is absent and
//! the caller decides whether that is an error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::template::TemplateSyntax;

/// Settings that can appear both globally and per stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Directory the template names are resolved against.
    pub template_dir: Option<PathBuf>,
    /// Compilation cache location of the template engine. Accepted for
    /// compatibility; templates are compiled in memory.
    pub cache_template_dir: Option<PathBuf>,
    /// Root directory for output files.
    pub output_dir: Option<PathBuf>,
    /// Ordered binding descriptors.
    pub template_list: Option<Vec<TemplateDescriptor>>,
    /// Delimiter flavor used by the templates.
    pub template_syntax: Option<TemplateSyntax>,
}

/// The whole target configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    #[serde(flatten)]
    pub defaults: StreamSettings,
    /// Per-stream overrides keyed by stream id.
    pub stream_configs: HashMap<String, StreamSettings>,
    /// Opt out of the anonymous usage ping.
    pub disable_collection: bool,
}

/// One entry of `template_list`.
///
/// Empty template names mean "skip this phase", exactly like absent ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateDescriptor {
    #[serde(default)]
    pub header_template_name: Option<String>,
    #[serde(default)]
    pub data_template_name: Option<String>,
    #[serde(default)]
    pub footer_template_name: Option<String>,
    pub output_file_name: String,
    #[serde(default)]
    pub one_file_per_record: bool,
    #[serde(default)]
    pub output_file_encoding: Option<String>,
    #[serde(default, rename = "output_file_EOL")]
    pub output_file_eol: Option<String>,
}

impl TargetConfig {
    /// Loads a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolves a setting for a stream.
    ///
    /// The stream-specific override wins when present, then the global value.
    ///
    /// ```rust
    /// use stencil_render::TargetConfig;
    ///
    /// let config: TargetConfig = serde_json::from_value(serde_json::json!({
    ///     "template_dir": "templates",
    ///     "stream_configs": {"orders": {"template_dir": "templates2"}}
    /// })).unwrap();
    ///
    /// let dir = config.resolve("orders", |s| s.template_dir.as_ref());
    /// assert_eq!(dir.unwrap().to_str(), Some("templates2"));
    /// let dir = config.resolve("customers", |s| s.template_dir.as_ref());
    /// assert_eq!(dir.unwrap().to_str(), Some("templates"));
    /// ```
    pub fn resolve<'a, T: ?Sized>(
        &'a self,
        stream: &str,
        select: impl Fn(&'a StreamSettings) -> Option<&'a T>,
    ) -> Option<&'a T> {
        self.stream_configs
            .get(stream)
            .and_then(&select)
            .or_else(|| select(&self.defaults))
    }

    /// Like [`resolve`](Self::resolve), but a missing setting is an error.
    pub fn require<'a, T: ?Sized>(
        &'a self,
        stream: &str,
        key: &'static str,
        select: impl Fn(&'a StreamSettings) -> Option<&'a T>,
    ) -> Result<&'a T, ConfigError> {
        self.resolve(stream, select)
            .ok_or_else(|| ConfigError::MissingSetting {
                key,
                stream: stream.to_string(),
            })
    }

    /// Resolved output directory for a stream, made absolute against the
    /// current directory when relative.
    pub fn output_dir(&self, stream: &str) -> Result<PathBuf, ConfigError> {
        let dir = self.require(stream, "output_dir", |s| s.output_dir.as_deref())?;
        Ok(absolute(dir))
    }

    /// Resolved template directory for a stream.
    pub fn template_dir(&self, stream: &str) -> Result<PathBuf, ConfigError> {
        let dir = self.require(stream, "template_dir", |s| s.template_dir.as_deref())?;
        Ok(absolute(dir))
    }

    pub fn template_list(&self, stream: &str) -> Result<&[TemplateDescriptor], ConfigError> {
        self.require(stream, "template_list", |s| s.template_list.as_deref())
    }

    pub fn template_syntax(&self, stream: &str) -> TemplateSyntax {
        self.resolve(stream, |s| s.template_syntax.as_ref())
            .copied()
            .unwrap_or_default()
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: serde_json::Value) -> TargetConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_resolve_global() {
        let config = config(json!({"template_dir": "templates"}));
        let value = config.resolve("my-stream", |s| s.template_dir.as_deref());
        assert_eq!(value, Some(Path::new("templates")));
    }

    #[test]
    fn test_resolve_stream_specific_wins() {
        let config = config(json!({
            "template_dir": "templates",
            "stream_configs": {"my-stream": {"template_dir": "templates2"}}
        }));
        let value = config.resolve("my-stream", |s| s.template_dir.as_deref());
        assert_eq!(value, Some(Path::new("templates2")));
    }

    #[test]
    fn test_resolve_stream_specific_without_global() {
        let config = config(json!({
            "stream_configs": {"my-stream": {"output_dir": "out"}}
        }));
        assert_eq!(
            config.resolve("my-stream", |s| s.output_dir.as_deref()),
            Some(Path::new("out"))
        );
        assert_eq!(config.resolve("other", |s| s.output_dir.as_deref()), None);
    }

    #[test]
    fn test_resolve_falls_back_when_override_lacks_key() {
        let config = config(json!({
            "output_dir": "out",
            "stream_configs": {"my-stream": {"template_dir": "t"}}
        }));
        assert_eq!(
            config.resolve("my-stream", |s| s.output_dir.as_deref()),
            Some(Path::new("out"))
        );
    }

    #[test]
    fn test_require_missing_setting() {
        let config = TargetConfig::default();
        let err = config.output_dir("orders").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingSetting { key: "output_dir", .. }
        ));
    }

    #[test]
    fn test_template_list_descriptors() {
        let config = config(json!({
            "template_list": [
                {
                    "header_template_name": "csv/sample_header.template.csv",
                    "data_template_name": "csv/sample.template.csv",
                    "footer_template_name": "",
                    "output_file_name": "sample.csv"
                },
                {
                    "data_template_name": "json/sample.template.json",
                    "output_file_name": "sample{record_index}.json",
                    "one_file_per_record": true,
                    "output_file_encoding": "latin-1",
                    "output_file_EOL": "\n"
                }
            ]
        }));
        let list = config.template_list("my-stream").unwrap();
        assert_eq!(list.len(), 2);
        assert!(!list[0].one_file_per_record);
        assert_eq!(list[0].footer_template_name.as_deref(), Some(""));
        assert!(list[1].one_file_per_record);
        assert_eq!(list[1].header_template_name, None);
        assert_eq!(list[1].output_file_encoding.as_deref(), Some("latin-1"));
        assert_eq!(list[1].output_file_eol.as_deref(), Some("\n"));
    }

    #[test]
    fn test_template_syntax_override() {
        let config = config(json!({
            "template_syntax": "mako",
            "stream_configs": {"jinja-stream": {"template_syntax": "jinja"}}
        }));
        assert_eq!(config.template_syntax("orders"), TemplateSyntax::Mako);
        assert_eq!(config.template_syntax("jinja-stream"), TemplateSyntax::Jinja);
    }

    #[test]
    fn test_relative_dirs_are_made_absolute() {
        let config = config(json!({"output_dir": "output"}));
        let dir = config.output_dir("s").unwrap();
        assert!(dir.is_absolute());
        assert!(dir.ends_with("output"));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"output_dir": "o", "disable_collection": true}"#).unwrap();
        let config = TargetConfig::from_path(&path).unwrap();
        assert!(config.disable_collection);
        assert_eq!(config.defaults.output_dir.as_deref(), Some(Path::new("o")));
    }

    #[test]
    fn test_from_path_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            TargetConfig::from_path(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
