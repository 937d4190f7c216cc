//! The message stream processor.
//!
//! [`Processor`] is a small state machine fed one input line at a time:
//!
//! - `SCHEMA` stores the stream's schema and validator, prepares its template
//!   bindings and opens its shared output files.
//! - `RECORD` validates the record, injects `record_index` (0-based) and
//!   `record_number` (1-based), and renders it through every binding. It also
//!   clears the pending checkpoint.
//! - `STATE` replaces the pending checkpoint.
//!
//! [`Processor::finish`] renders the footer of every shared file with the
//! stream's last record, closes the files and hands back the checkpoint.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::io::BufReader;
//! use stencil_render::{emit_state, persist_lines, TargetConfig};
//!
//! let config = TargetConfig::from_path("config.json")?;
//! let state = persist_lines(&config, BufReader::new(std::io::stdin()))?;
//! emit_state(state.as_ref(), std::io::stdout())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use serde_json::{Map, Value};

use crate::binding::StreamTemplates;
use crate::config::TargetConfig;
use crate::error::ProcessError;
use crate::files::{StreamOutputs, Target};
use crate::message::Message;
use crate::schema::SchemaValidator;
use crate::template::RenderScope;
use crate::value::{wrap, WrappedValue};

/// Everything known about one stream.
#[derive(Debug)]
struct StreamContext {
    schema: WrappedValue,
    key_properties: Vec<String>,
    validator: SchemaValidator,
    templates: StreamTemplates,
    outputs: StreamOutputs,
    /// Index the next record gets.
    record_index: u64,
    last_record: Option<WrappedValue>,
}

/// Consumes messages and renders records into output files.
#[derive(Debug)]
pub struct Processor {
    config: TargetConfig,
    streams: BTreeMap<String, StreamContext>,
    state: Option<Value>,
}

impl Processor {
    pub fn new(config: TargetConfig) -> Self {
        Self {
            config,
            streams: BTreeMap::new(),
            state: None,
        }
    }

    /// The checkpoint that would be emitted if the input ended now.
    pub fn state(&self) -> Option<&Value> {
        self.state.as_ref()
    }

    /// Number of records rendered so far for `stream`.
    pub fn record_count(&self, stream: &str) -> Option<u64> {
        self.streams.get(stream).map(|ctx| ctx.record_index)
    }

    /// Key properties declared by the latest schema of `stream`.
    pub fn key_properties(&self, stream: &str) -> Option<&[String]> {
        self.streams.get(stream).map(|ctx| ctx.key_properties.as_slice())
    }

    /// Processes one input line. Blank lines are ignored.
    pub fn process_line(&mut self, line: &str) -> Result<(), ProcessError> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            return Ok(());
        }
        self.process(Message::parse(line)?)
    }

    pub fn process(&mut self, message: Message) -> Result<(), ProcessError> {
        match message {
            Message::Schema {
                stream,
                schema,
                key_properties,
            } => self.on_schema(stream, schema, key_properties),
            Message::Record { stream, record } => self.on_record(stream, record),
            Message::State { value } => {
                self.on_state(value);
                Ok(())
            }
        }
    }

    fn on_schema(
        &mut self,
        stream: String,
        schema: Value,
        key_properties: Vec<String>,
    ) -> Result<(), ProcessError> {
        let span = tracing::info_span!("stream", stream = %stream);
        let _enter = span.enter();
        tracing::info!("rendering stream");

        let validator =
            SchemaValidator::compile(&schema).map_err(|message| ProcessError::InvalidSchema {
                stream: stream.clone(),
                message,
            })?;

        // counters survive a schema re-arrival; the old shared handles are
        // closed and the same paths appended to
        let (record_index, last_record, reopened) = match self.streams.remove(&stream) {
            Some(mut previous) => {
                tracing::info!("schema received again, reopening output files");
                let closed = previous.outputs.close_all()?;
                (previous.record_index, previous.last_record, closed)
            }
            None => (0, None, Vec::new()),
        };

        let templates = StreamTemplates::load(&self.config, &stream)?;
        tracing::info!("initializing output files");
        let output_dir = self.config.output_dir(&stream)?;
        let outputs = StreamOutputs::open(output_dir, templates.bindings(), &reopened)?;

        self.streams.insert(
            stream,
            StreamContext {
                schema: wrap(&schema),
                key_properties,
                validator,
                templates,
                outputs,
                record_index,
                last_record,
            },
        );
        Ok(())
    }

    fn on_record(&mut self, stream: String, record: Map<String, Value>) -> Result<(), ProcessError> {
        let ctx = self
            .streams
            .get_mut(&stream)
            .ok_or_else(|| ProcessError::RecordBeforeSchema(stream.clone()))?;
        let span = tracing::info_span!("stream", stream = %stream);
        let _enter = span.enter();

        let record_index = ctx.record_index;
        let record_number = record_index + 1;

        let mut raw = Value::Object(record);
        ctx.validator
            .validate(&raw)
            .map_err(|message| ProcessError::Validation {
                stream: stream.clone(),
                record_number,
                message,
            })?;
        if let Value::Object(fields) = &mut raw {
            fields.insert("record_index".into(), record_index.into());
            fields.insert("record_number".into(), record_number.into());
        }

        let record = wrap(&raw);
        let scope = RenderScope::new(&record, &ctx.schema);
        for (slot, binding) in ctx.templates.bindings().iter().enumerate() {
            match ctx.outputs.target(slot, binding, &raw)? {
                Some(Target::Shared(file)) => {
                    ctx.templates
                        .render_shared_record(binding, &scope, record_index == 0, file)?
                }
                Some(Target::PerRecord(file)) => {
                    ctx.templates
                        .render_standalone_record(binding, &scope, file)?
                }
                None => {}
            }
        }

        ctx.record_index = record_number;
        ctx.last_record = Some(record);
        self.state = None;
        Ok(())
    }

    fn on_state(&mut self, value: Value) {
        tracing::debug!("setting state to {}", value);
        self.state = if value.is_null() { None } else { Some(value) };
    }

    /// Renders the footers of the shared files, closes them, and returns the
    /// last checkpoint.
    pub fn finish(mut self) -> Result<Option<Value>, ProcessError> {
        tracing::info!("rendering footers and closing files");
        for (stream, ctx) in self.streams.iter_mut() {
            let span = tracing::info_span!("stream", stream = %stream);
            let _enter = span.enter();

            for (slot, file) in ctx.outputs.take_shared() {
                match (&ctx.last_record, ctx.templates.bindings().get(slot)) {
                    (Some(record), Some(binding)) => {
                        let scope = RenderScope::new(record, &ctx.schema);
                        ctx.templates.render_footer(binding, &scope, file)?;
                    }
                    _ => {
                        tracing::info!(path = %file.path().display(), "no records, closing without footer");
                        let path = file.path().to_path_buf();
                        file.close()
                            .map_err(|source| ProcessError::Output { path, source })?;
                    }
                }
            }
        }
        Ok(self.state)
    }
}

/// Runs every line of `input` through a [`Processor`] and finishes it.
pub fn persist_lines<R: BufRead>(
    config: &TargetConfig,
    input: R,
) -> Result<Option<Value>, ProcessError> {
    tracing::info!("processing records");
    let mut processor = Processor::new(config.clone());
    for line in input.lines() {
        let line = line.map_err(ProcessError::Input)?;
        processor.process_line(&line)?;
    }
    processor.finish()
}

/// Writes the checkpoint as one JSON line. Nothing is written without one.
pub fn emit_state<W: Write>(state: Option<&Value>, mut out: W) -> io::Result<()> {
    let Some(state) = state else {
        return Ok(());
    };
    let line = state.to_string();
    tracing::debug!("emitting state {}", line);
    writeln!(out, "{}", line)?;
    out.flush()
}
