//! Template engine abstraction.
//!
//! This module defines the [`TemplateEngine`] trait, the seam between bindings
//! and the actual template backend. The implementation used at runtime is
//! [`MiniJinjaEngine`], which resolves template names against a directory on
//! disk and compiles each template once.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use minijinja::syntax::SyntaxConfig;
use minijinja::{context, AutoEscape, Environment, Error, ErrorKind, Value};
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::value::WrappedValue;

/// Delimiter flavor of a stream's templates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateSyntax {
    /// `{{ expr }}`, `{% stmt %}`, `{# comment #}`.
    #[default]
    Jinja,
    /// `${expr}`, `% stmt` line statements, `## comment` line comments.
    Mako,
}

impl TemplateSyntax {
    fn config(self) -> Result<SyntaxConfig, Error> {
        match self {
            TemplateSyntax::Jinja => Ok(SyntaxConfig::default()),
            TemplateSyntax::Mako => SyntaxConfig::builder()
                .block_delimiters("{%", "%}")
                .variable_delimiters("${", "}")
                .comment_delimiters("{#", "#}")
                .line_statement_prefix("%")
                .line_comment_prefix("##")
                .build(),
        }
    }

    /// Prepares template source for compilation.
    ///
    /// Line endings become `\n`. In Mako mode the trailing `:` of `%` control
    /// lines (`% for t in record.tags:`, `% else:`) is dropped.
    pub fn normalize(self, source: &str) -> String {
        let source = source.replace("\r\n", "\n");
        match self {
            TemplateSyntax::Jinja => source,
            TemplateSyntax::Mako => source
                .split('\n')
                .map(strip_control_colon)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

fn strip_control_colon(line: &str) -> &str {
    if !line.trim_start().starts_with('%') {
        return line;
    }
    let trimmed = line.trim_end();
    trimmed.strip_suffix(':').unwrap_or(line)
}

/// The three names every template invocation sees besides the globals.
///
/// `functions` is registered as an engine global, so the scope only carries
/// the per-record data.
#[derive(Debug, Clone)]
pub struct RenderScope {
    pub record: Value,
    pub schema: Value,
}

impl RenderScope {
    pub fn new(record: &WrappedValue, schema: &WrappedValue) -> Self {
        Self {
            record: record.to_template_value(),
            schema: schema.to_template_value(),
        }
    }
}

/// A template engine that can render named templates against a [`RenderScope`].
pub trait TemplateEngine: Send + Sync {
    /// Renders a template string directly.
    fn render_template(&self, template: &str, scope: &RenderScope) -> Result<String, RenderError>;

    /// Adds a named template to the engine.
    ///
    /// The template is compiled and cached for later use via [`render_named`](Self::render_named).
    fn add_template(&mut self, name: &str, source: &str) -> Result<(), RenderError>;

    /// Loads and compiles a template so that errors surface before rendering.
    fn load_template(&self, name: &str) -> Result<(), RenderError>;

    /// Renders a previously registered or loadable template.
    fn render_named(&self, name: &str, scope: &RenderScope) -> Result<String, RenderError>;

    /// Checks if a template with the given name exists.
    fn has_template(&self, name: &str) -> bool {
        self.load_template(name).is_ok()
    }
}

/// MiniJinja-based template engine.
///
/// # Example
///
/// ```rust
/// use stencil_render::template::{MiniJinjaEngine, RenderScope, TemplateEngine};
/// use stencil_render::wrap;
/// use serde_json::json;
///
/// let mut engine = MiniJinjaEngine::new();
/// engine.add_template("line", "{{ record.id }};{{ record.name | upper }}").unwrap();
///
/// let record = wrap(&json!({"id": 1, "name": "ward"}));
/// let scope = RenderScope::new(&record, &wrap(&json!({})));
/// assert_eq!(engine.render_named("line", &scope).unwrap(), "1;WARD");
/// ```
pub struct MiniJinjaEngine {
    env: Environment<'static>,
    syntax: TemplateSyntax,
}

impl MiniJinjaEngine {
    /// Creates a Jinja-syntax engine with the helper functions registered.
    ///
    /// Output is never escaped, whatever the template name's extension.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        super::functions::register_functions(&mut env);
        Self {
            env,
            syntax: TemplateSyntax::Jinja,
        }
    }

    /// Creates an engine for the given delimiter flavor.
    pub fn with_syntax(syntax: TemplateSyntax) -> Result<Self, RenderError> {
        let mut engine = Self::new();
        engine.env.set_syntax(syntax.config()?);
        engine.syntax = syntax;
        Ok(engine)
    }

    /// Resolves template names against `dir`.
    ///
    /// Names are relative paths (`csv/header.csv`). Sources go through
    /// [`TemplateSyntax::normalize`] before compilation.
    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let syntax = self.syntax;
        self.env
            .set_loader(move |name| load_source(&dir, name, syntax));
        self
    }

    /// Returns a mutable reference to the underlying MiniJinja environment.
    pub fn environment_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for MiniJinjaEngine {
    fn render_template(&self, template: &str, scope: &RenderScope) -> Result<String, RenderError> {
        Ok(self.env.render_str(template, scope_context(scope))?)
    }

    fn add_template(&mut self, name: &str, source: &str) -> Result<(), RenderError> {
        self.env
            .add_template_owned(name.to_string(), self.syntax.normalize(source))?;
        Ok(())
    }

    fn load_template(&self, name: &str) -> Result<(), RenderError> {
        self.env.get_template(name)?;
        Ok(())
    }

    fn render_named(&self, name: &str, scope: &RenderScope) -> Result<String, RenderError> {
        let tmpl = self.env.get_template(name)?;
        Ok(tmpl.render(scope_context(scope))?)
    }
}

fn scope_context(scope: &RenderScope) -> Value {
    context! {
        record => scope.record.clone(),
        schema => scope.schema.clone(),
    }
}

fn load_source(dir: &Path, name: &str, syntax: TemplateSyntax) -> Result<Option<String>, Error> {
    let Some(path) = join_template_path(dir, name) else {
        return Ok(None);
    };
    match fs::read_to_string(&path) {
        Ok(source) => Ok(Some(syntax.normalize(&source))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("could not read template {}", path.display()),
        )
        .with_source(err)),
    }
}

/// Joins a template name onto its directory. Names stepping outside the
/// directory resolve to nothing.
fn join_template_path(dir: &Path, name: &str) -> Option<PathBuf> {
    let mut path = dir.to_path_buf();
    for segment in name.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => return None,
            segment => path.push(segment),
        }
    }
    Some(path)
}
