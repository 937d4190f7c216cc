//! Input messages.
//!
//! Each input line is one JSON object whose `type` is `SCHEMA`, `RECORD` or
//! `STATE`. Parsing checks the keys each type needs; everything else in the
//! object is ignored.

use serde_json::{Map, Value};

use crate::error::ProcessError;

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Schema {
        stream: String,
        schema: Value,
        /// `null` is accepted and means no key properties.
        key_properties: Vec<String>,
    },
    Record {
        stream: String,
        record: Map<String, Value>,
    },
    State {
        value: Value,
    },
}

impl Message {
    /// Parses one input line.
    pub fn parse(line: &str) -> Result<Self, ProcessError> {
        let value: Value = serde_json::from_str(line).map_err(|source| {
            tracing::error!("unable to parse:\n{}", line);
            ProcessError::InvalidJson {
                line: line.to_string(),
                source,
            }
        })?;
        let Value::Object(mut object) = value else {
            return Err(ProcessError::InvalidField {
                key: "type",
                line: line.to_string(),
            });
        };

        let kind = match object.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => return Err(invalid("type", line)),
            None => return Err(missing("type", line)),
        };

        match kind.as_str() {
            "SCHEMA" => {
                let stream = take_stream(&mut object, line)?;
                let schema = object.remove("schema").ok_or_else(|| missing("schema", line))?;
                let key_properties = match object.remove("key_properties") {
                    None => return Err(ProcessError::MissingKeyProperties(stream)),
                    Some(Value::Null) => Vec::new(),
                    Some(value) => serde_json::from_value(value)
                        .map_err(|_| invalid("key_properties", line))?,
                };
                Ok(Message::Schema {
                    stream,
                    schema,
                    key_properties,
                })
            }
            "RECORD" => {
                let stream = take_stream(&mut object, line)?;
                match object.remove("record") {
                    Some(Value::Object(record)) => Ok(Message::Record { stream, record }),
                    Some(_) => Err(invalid("record", line)),
                    None => Err(missing("record", line)),
                }
            }
            "STATE" => {
                let value = object.remove("value").ok_or_else(|| missing("value", line))?;
                Ok(Message::State { value })
            }
            _ => Err(ProcessError::UnknownType {
                kind,
                line: line.to_string(),
            }),
        }
    }

    /// The stream a SCHEMA or RECORD belongs to.
    pub fn stream(&self) -> Option<&str> {
        match self {
            Message::Schema { stream, .. } | Message::Record { stream, .. } => Some(stream),
            Message::State { .. } => None,
        }
    }
}

fn take_stream(object: &mut Map<String, Value>, line: &str) -> Result<String, ProcessError> {
    match object.remove("stream") {
        Some(Value::String(stream)) => Ok(stream),
        Some(_) => Err(invalid("stream", line)),
        None => Err(missing("stream", line)),
    }
}

fn missing(key: &'static str, line: &str) -> ProcessError {
    ProcessError::MissingKey {
        key,
        line: line.to_string(),
    }
}

fn invalid(key: &'static str, line: &str) -> ProcessError {
    ProcessError::InvalidField {
        key,
        line: line.to_string(),
    }
}
