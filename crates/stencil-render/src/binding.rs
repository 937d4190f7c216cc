//! Template bindings: one configured header/line/footer triple plus its
//! output routing, and the rendering of each phase into an output file.

use std::path::{Path, PathBuf};

use crate::config::{TargetConfig, TemplateDescriptor};
use crate::error::{ConfigError, ProcessError, RenderError};
use crate::output::{LineEnding, OutputEncoding, OutputFile};
use crate::template::{FileNamePattern, MiniJinjaEngine, RenderScope, TemplateEngine};

/// Template phases of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Header,
    Line,
    Footer,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Header => "header",
            Phase::Line => "line",
            Phase::Footer => "footer",
        }
    }
}

/// A prepared binding. Immutable once resolved.
#[derive(Debug, Clone)]
pub struct TemplateBinding {
    pub header: Option<String>,
    pub line: Option<String>,
    pub footer: Option<String>,
    pub output_file_name: FileNamePattern,
    pub one_file_per_record: bool,
    pub encoding: OutputEncoding,
    pub line_ending: LineEnding,
}

impl TemplateBinding {
    /// Resolves a descriptor, compiling every named template so that a
    /// missing or broken template fails now rather than mid-stream.
    pub fn prepare(
        descriptor: &TemplateDescriptor,
        engine: &dyn TemplateEngine,
    ) -> Result<Self, ConfigError> {
        let load = |name: &Option<String>| -> Result<Option<String>, ConfigError> {
            match name.as_deref().map(str::trim) {
                None | Some("") => Ok(None),
                Some(name) => {
                    engine
                        .load_template(name)
                        .map_err(|source| ConfigError::Template {
                            name: name.to_string(),
                            source,
                        })?;
                    Ok(Some(name.to_string()))
                }
            }
        };

        let encoding = match &descriptor.output_file_encoding {
            Some(name) => name.parse()?,
            None => OutputEncoding::default(),
        };
        let line_ending = match &descriptor.output_file_eol {
            Some(eol) => eol.parse()?,
            None => LineEnding::default(),
        };

        // only per-record names are expanded, shared names stay literal
        let output_file_name = if descriptor.one_file_per_record {
            FileNamePattern::parse(&descriptor.output_file_name)?
        } else {
            FileNamePattern::literal(&descriptor.output_file_name)
        };

        Ok(Self {
            header: load(&descriptor.header_template_name)?,
            line: load(&descriptor.data_template_name)?,
            footer: load(&descriptor.footer_template_name)?,
            output_file_name,
            one_file_per_record: descriptor.one_file_per_record,
            encoding,
            line_ending,
        })
    }

    fn template(&self, phase: Phase) -> Option<&str> {
        match phase {
            Phase::Header => self.header.as_deref(),
            Phase::Line => self.line.as_deref(),
            Phase::Footer => self.footer.as_deref(),
        }
    }

    /// Opens the per-record file for `record`, named by expanding the pattern.
    pub fn open_output(
        &self,
        output_dir: &Path,
        record: &serde_json::Value,
    ) -> Result<OutputFile, ProcessError> {
        let path = output_dir.join(self.output_file_name.expand(record));
        OutputFile::create(&path, self.encoding, self.line_ending)
            .map_err(|source| ProcessError::Output { path, source })
    }

    /// Path of the shared file. Its name is taken literally.
    pub fn shared_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(self.output_file_name.as_str())
    }

    /// Opens the shared file, truncating it unless `append` is set.
    pub fn open_shared(&self, output_dir: &Path, append: bool) -> Result<OutputFile, ProcessError> {
        let path = self.shared_path(output_dir);
        let opened = if append {
            OutputFile::append(&path, self.encoding, self.line_ending)
        } else {
            OutputFile::create(&path, self.encoding, self.line_ending)
        };
        opened.map_err(|source| ProcessError::Output { path, source })
    }
}

/// The engine and prepared bindings of one stream.
pub struct StreamTemplates {
    engine: Box<dyn TemplateEngine>,
    bindings: Vec<TemplateBinding>,
}

impl std::fmt::Debug for StreamTemplates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTemplates")
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

impl StreamTemplates {
    /// Resolves the template directory, syntax and binding list of `stream`
    /// and prepares every binding.
    pub fn load(config: &TargetConfig, stream: &str) -> Result<Self, ConfigError> {
        tracing::info!(stream, "loading templates");
        let template_dir = config.template_dir(stream)?;
        let engine = MiniJinjaEngine::with_syntax(config.template_syntax(stream))
            .map_err(ConfigError::Syntax)?
            .with_template_dir(template_dir);
        Self::new(Box::new(engine), config.template_list(stream)?)
    }

    /// Prepares `descriptors` against an already configured engine.
    pub fn new(
        engine: Box<dyn TemplateEngine>,
        descriptors: &[TemplateDescriptor],
    ) -> Result<Self, ConfigError> {
        if descriptors.is_empty() {
            tracing::warn!("template list is empty, records will not be rendered");
        }
        let bindings = descriptors
            .iter()
            .map(|descriptor| TemplateBinding::prepare(descriptor, engine.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { engine, bindings })
    }

    pub fn bindings(&self) -> &[TemplateBinding] {
        &self.bindings
    }

    /// Renders one phase of `binding` into `file`.
    ///
    /// Render failures are logged and skip only this write. Write failures are
    /// fatal.
    pub fn render_phase(
        &self,
        binding: &TemplateBinding,
        phase: Phase,
        scope: &RenderScope,
        file: &mut OutputFile,
    ) -> Result<(), ProcessError> {
        let Some(name) = binding.template(phase) else {
            return Ok(());
        };
        match self.engine.render_named(name, scope) {
            Ok(text) => file.write_rendered(&text).map_err(|source| ProcessError::Output {
                path: file.path().to_path_buf(),
                source,
            }),
            Err(err) => {
                log_render_error(name, phase, &err);
                Ok(())
            }
        }
    }

    /// Header (first record only), then line, into a shared file.
    pub fn render_shared_record(
        &self,
        binding: &TemplateBinding,
        scope: &RenderScope,
        first: bool,
        file: &mut OutputFile,
    ) -> Result<(), ProcessError> {
        if first {
            self.render_phase(binding, Phase::Header, scope, file)?;
        }
        self.render_phase(binding, Phase::Line, scope, file)
    }

    /// A complete per-record file: header, line, footer, close.
    pub fn render_standalone_record(
        &self,
        binding: &TemplateBinding,
        scope: &RenderScope,
        mut file: OutputFile,
    ) -> Result<(), ProcessError> {
        self.render_phase(binding, Phase::Header, scope, &mut file)?;
        self.render_phase(binding, Phase::Line, scope, &mut file)?;
        self.render_footer(binding, scope, file)
    }

    /// Footer, then close.
    pub fn render_footer(
        &self,
        binding: &TemplateBinding,
        scope: &RenderScope,
        mut file: OutputFile,
    ) -> Result<(), ProcessError> {
        self.render_phase(binding, Phase::Footer, scope, &mut file)?;
        let path = file.path().to_path_buf();
        file.close()
            .map_err(|source| ProcessError::Output { path, source })
    }
}

fn log_render_error(template: &str, phase: Phase, err: &RenderError) {
    if err.is_undefined() {
        tracing::error!(template, phase = phase.as_str(), "{}", err);
    } else {
        tracing::error!(template, phase = phase.as_str(), "{}", err.detail());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::wrap;
    use serde_json::json;
    use std::fs;

    fn engine() -> MiniJinjaEngine {
        let mut engine = MiniJinjaEngine::new();
        engine.add_template("h", "ID;NAME").unwrap();
        engine.add_template("l", "{{ record.id }};{{ record.name }}").unwrap();
        engine.add_template("f", "END {{ record.record_number }}").unwrap();
        engine.add_template("bad", "{{ nope.id }}").unwrap();
        engine
    }

    fn descriptor(value: serde_json::Value) -> TemplateDescriptor {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_prepare_defaults() {
        let binding = TemplateBinding::prepare(
            &descriptor(json!({
                "header_template_name": "h",
                "data_template_name": "l",
                "footer_template_name": "",
                "output_file_name": "out.csv"
            })),
            &engine(),
        )
        .unwrap();
        assert_eq!(binding.header.as_deref(), Some("h"));
        assert_eq!(binding.footer, None);
        assert!(!binding.one_file_per_record);
        assert_eq!(binding.encoding, OutputEncoding::Utf8);
        assert_eq!(binding.line_ending, LineEnding::CrLf);
    }

    #[test]
    fn test_prepare_missing_template_is_fatal() {
        let err = TemplateBinding::prepare(
            &descriptor(json!({"data_template_name": "missing", "output_file_name": "o"})),
            &engine(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Template { ref name, .. } if name == "missing"));
    }

    #[test]
    fn test_prepare_rejects_unknown_encoding() {
        let err = TemplateBinding::prepare(
            &descriptor(json!({"output_file_name": "o", "output_file_encoding": "klingon"})),
            &engine(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEncoding(_)));
    }

    #[test]
    fn test_only_per_record_names_are_patterns() {
        let shared = TemplateBinding::prepare(
            &descriptor(json!({"output_file_name": "data{v1.csv"})),
            &engine(),
        )
        .unwrap();
        assert_eq!(shared.output_file_name.as_str(), "data{v1.csv");

        let err = TemplateBinding::prepare(
            &descriptor(json!({"output_file_name": "data{v1.csv", "one_file_per_record": true})),
            &engine(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_standalone_record_renders_all_phases() {
        let dir = tempfile::tempdir().unwrap();
        let templates = StreamTemplates::new(
            Box::new(engine()),
            &[descriptor(json!({
                "header_template_name": "h",
                "data_template_name": "l",
                "footer_template_name": "f",
                "output_file_name": "rec{record_index}.csv",
                "one_file_per_record": true,
                "output_file_EOL": "\n"
            }))],
        )
        .unwrap();
        let binding = &templates.bindings()[0];
        let raw = json!({"id": 3, "name": "C", "record_index": 2, "record_number": 3});
        let scope = RenderScope::new(&wrap(&raw), &wrap(&json!({})));

        let file = binding.open_output(dir.path(), &raw).unwrap();
        templates.render_standalone_record(binding, &scope, file).unwrap();

        let content = fs::read_to_string(dir.path().join("rec2.csv")).unwrap();
        assert_eq!(content, "ID;NAME\n3;C\nEND 3\n");
    }

    #[test]
    fn test_render_error_skips_only_that_phase() {
        let dir = tempfile::tempdir().unwrap();
        let templates = StreamTemplates::new(
            Box::new(engine()),
            &[descriptor(json!({
                "header_template_name": "bad",
                "data_template_name": "l",
                "output_file_name": "out.csv",
                "output_file_EOL": "\n"
            }))],
        )
        .unwrap();
        let binding = &templates.bindings()[0];
        let raw = json!({"id": 1, "name": "A"});
        let scope = RenderScope::new(&wrap(&raw), &wrap(&json!({})));

        let mut file = binding.open_shared(dir.path(), false).unwrap();
        templates
            .render_shared_record(binding, &scope, true, &mut file)
            .unwrap();
        templates.render_footer(binding, &scope, file).unwrap();

        let content = fs::read_to_string(dir.path().join("out.csv")).unwrap();
        assert_eq!(content, "1;A\n");
    }
}
