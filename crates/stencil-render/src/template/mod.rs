//! Template engine binding, helper functions and file name patterns.
//!
//! Three pieces live here:
//!
//! - [`engine`]: the [`TemplateEngine`] seam and its minijinja implementation,
//!   which loads templates by relative name from a stream's template directory.
//! - [`functions`]: the pure formatting helpers templates reach through
//!   `functions.<name>(...)` or as filters.
//! - [`pattern`]: `{field}` substitution for per-record output file names.
//!
//! ## Template syntax
//!
//! Two delimiter flavors are supported, selected per stream with the
//! `template_syntax` setting:
//!
//! | Syntax  | Expression      | Statement                  | Comment      |
//! |---------|-----------------|----------------------------|--------------|
//! | `jinja` | `{{ record.id }}` | `{% for t in record.tags %}` | `{# ... #}` |
//! | `mako`  | `${record.id}`  | `% for t in record.tags` (line) | `## ...` (line) |
//!
//! Both flavors share the same engine, filters and render scope.

pub mod engine;
pub mod functions;
pub mod pattern;

pub use engine::{MiniJinjaEngine, RenderScope, TemplateEngine, TemplateSyntax};
pub use functions::HelperFunctions;
pub use pattern::FileNamePattern;
