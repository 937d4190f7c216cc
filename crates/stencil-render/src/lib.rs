//! # Stencil Render - Template Rendering for Record Streams
//!
//! `stencil-render` turns a stream of newline-delimited `SCHEMA`, `RECORD` and
//! `STATE` messages into text files produced by user-supplied templates. Each
//! stream is bound to one or more header/line/footer template triples; each
//! record is rendered through every binding into a shared file or into a file
//! of its own.
//!
//! This crate holds the whole core. The `stencil` binary only wires it to
//! stdin, stdout and a configuration file.
//!
//! ## Core Concepts
//!
//! - [`WrappedValue`]: null-safe projection of JSON records; any attribute
//!   chain resolves to a value or to the empty sentinel, which renders as `""`
//! - [`TargetConfig`]: global settings with per-stream overrides
//! - [`TemplateBinding`]: header/line/footer templates plus output routing
//! - [`Processor`]: the message state machine
//! - [`template::functions`]: formatting helpers reachable from templates
//!
//! ## Quick Start
//!
//! ```rust
//! use std::io::Cursor;
//! use stencil_render::{persist_lines, TargetConfig};
//! use serde_json::json;
//!
//! let dir = tempfile::tempdir().unwrap();
//! std::fs::write(dir.path().join("line.csv"), "{{ record.id }};{{ record.name }}").unwrap();
//!
//! let config: TargetConfig = serde_json::from_value(json!({
//!     "template_dir": dir.path(),
//!     "output_dir": dir.path().join("out"),
//!     "template_list": [{
//!         "data_template_name": "line.csv",
//!         "output_file_name": "people.csv"
//!     }]
//! })).unwrap();
//!
//! let input = concat!(
//!     r#"{"type":"SCHEMA","stream":"people","schema":{},"key_properties":["id"]}"#, "\n",
//!     r#"{"type":"RECORD","stream":"people","record":{"id":1,"name":"Ada"}}"#, "\n",
//!     r#"{"type":"STATE","value":{"people":1}}"#, "\n",
//! );
//! let state = persist_lines(&config, Cursor::new(input)).unwrap();
//!
//! assert_eq!(state, Some(json!({"people": 1})));
//! let written = std::fs::read_to_string(dir.path().join("out/people.csv")).unwrap();
//! assert_eq!(written, "1;Ada\r\n");
//! ```
//!
//! ## Missing Data
//!
//! Templates never fail because a record lacks a field:
//!
//! ```rust
//! use stencil_render::template::{MiniJinjaEngine, RenderScope, TemplateEngine};
//! use stencil_render::wrap;
//! use serde_json::json;
//!
//! let engine = MiniJinjaEngine::new();
//! let record = wrap(&json!({"customer": null}));
//! let scope = RenderScope::new(&record, &wrap(&json!({})));
//! let output = engine
//!     .render_template("[{{ record.customer.address.city }}]", &scope)
//!     .unwrap();
//! assert_eq!(output, "[]");
//! ```

pub mod binding;
pub mod config;
mod error;
pub mod files;
pub mod message;
pub mod output;
pub mod prelude;
pub mod processor;
pub mod schema;
pub mod template;
pub mod value;

// Error types
pub use error::{ConfigError, ProcessError, RenderError};

pub use binding::{Phase, StreamTemplates, TemplateBinding};
pub use config::{StreamSettings, TargetConfig, TemplateDescriptor};
pub use message::Message;
pub use output::{LineEnding, OutputEncoding, OutputFile};
pub use processor::{emit_state, persist_lines, Processor};
pub use template::{FileNamePattern, MiniJinjaEngine, RenderScope, TemplateEngine, TemplateSyntax};
pub use value::{wrap, Scalar, WrappedValue};
