//! Output file name patterns.
//!
//! Per-record output files are named by substituting fields of the raw record
//! into a pattern, format-string style.
//!
//! # Syntax
//!
//! - `{name}` - a top-level field of the record
//! - `{customer.id}` - nested access via dot notation; `{items.0}` indexes arrays
//! - `{record_index:05}` - optional format spec: `<` or `>` alignment, `0` fill,
//!   minimum width (numbers default to right alignment, text to left)
//! - `{{` and `}}` - escaped braces
//!
//! Fields that are absent or `null` expand to the empty string.
//!
//! # Example
//!
//! ```rust
//! use stencil_render::template::FileNamePattern;
//! use serde_json::json;
//!
//! let pattern = FileNamePattern::parse("invoice-{id:06}-{customer.code}.txt").unwrap();
//! let record = json!({"id": 42, "customer": {"code": "ACME"}});
//! assert_eq!(pattern.expand(&record), "invoice-000042-ACME.txt");
//! ```

use std::fmt;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FieldSpec {
    align: Option<Align>,
    zero: bool,
    width: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field { path: Vec<String>, spec: FieldSpec },
}

/// A parsed output file name pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNamePattern {
    source: String,
    segments: Vec<Segment>,
}

impl FileNamePattern {
    /// Parses a pattern. Unclosed or empty placeholders are configuration errors.
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = pattern.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut field = String::new();
                    let mut found_close = false;
                    for inner_ch in chars.by_ref() {
                        if inner_ch == '}' {
                            found_close = true;
                            break;
                        }
                        field.push(inner_ch);
                    }
                    if !found_close {
                        return Err(invalid(format!("unclosed placeholder {{{}", field)));
                    }

                    let (name, spec) = match field.split_once(':') {
                        Some((name, spec)) => (name.trim(), parse_spec(spec).map_err(invalid)?),
                        None => (field.trim(), FieldSpec::default()),
                    };
                    if name.is_empty() {
                        return Err(invalid("empty placeholder".to_string()));
                    }

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field {
                        path: name.split('.').map(str::to_string).collect(),
                        spec,
                    });
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// A name with no placeholders. Braces are kept as written.
    pub fn literal(name: &str) -> Self {
        let segments = if name.is_empty() {
            Vec::new()
        } else {
            vec![Segment::Literal(name.to_string())]
        };
        Self {
            source: name.to_string(),
            segments,
        }
    }

    /// Whether the pattern has no placeholders, i.e. always names the same file.
    pub fn is_constant(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// The pattern as written in the configuration.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Substitutes the record's fields into the pattern.
    pub fn expand(&self, record: &serde_json::Value) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { path, spec } => {
                    let value = resolve_path(record, path);
                    let numeric = matches!(value, Some(serde_json::Value::Number(_)));
                    let text = value.map(format_value).unwrap_or_default();
                    out.push_str(&pad(&text, *spec, numeric));
                }
            }
        }
        out
    }
}

impl fmt::Display for FileNamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_spec(spec: &str) -> Result<FieldSpec, String> {
    let mut rest = spec.trim();
    let mut parsed = FieldSpec::default();

    if let Some(stripped) = rest.strip_prefix('<') {
        parsed.align = Some(Align::Left);
        rest = stripped;
    } else if let Some(stripped) = rest.strip_prefix('>') {
        parsed.align = Some(Align::Right);
        rest = stripped;
    }
    if let Some(stripped) = rest.strip_prefix('0') {
        parsed.zero = true;
        rest = stripped;
    }
    if !rest.is_empty() {
        parsed.width = rest
            .parse()
            .map_err(|_| format!("unsupported format spec '{}'", spec))?;
    }
    Ok(parsed)
}

fn resolve_path<'a>(value: &'a serde_json::Value, path: &[String]) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for part in path {
        current = match current {
            serde_json::Value::Object(map) => map.get(part)?,
            serde_json::Value::Array(arr) => arr.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn pad(text: &str, spec: FieldSpec, numeric: bool) -> String {
    let len = text.chars().count();
    if len >= spec.width {
        return text.to_string();
    }
    let fill = if spec.zero { '0' } else { ' ' };
    let padding: String = std::iter::repeat(fill).take(spec.width - len).collect();
    let align = spec.align.unwrap_or(if numeric || spec.zero {
        Align::Right
    } else {
        Align::Left
    });
    match align {
        Align::Left => format!("{}{}", text, padding),
        Align::Right => format!("{}{}", padding, text),
    }
}
