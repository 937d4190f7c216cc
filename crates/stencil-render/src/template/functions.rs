//! Formatting helpers available to templates.
//!
//! Every helper is reachable two ways:
//!
//! - through the `functions` global: `{{ functions.lfixed(record.name, 10) }}`
//!   or `{{ functions['lfixed'](record.name, 10) }}`
//! - as a filter: `{{ record.name | lfixed(10) }}`
//!
//! ## Helpers
//!
//! - `format_date(value, input_format, output_format)` - reparse a date string
//! - `format_json_date(value, output_format)` - same, input is `%Y-%m-%d`
//! - `fixed_size(value, size)` / `lfixed(value, size)` - truncate, pad right
//! - `rfixed(value, size)` - truncate, pad left with spaces
//! - `nfixed(value, size)` - truncate, pad left with zeros
//! - `null_safe(value)` - empty string for null/missing values
//! - `lower(value)` / `upper(value)` - case conversion
//!
//! Missing values (the wrapper's empty sentinel, `none`, undefined) format as
//! the empty string in every helper.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use minijinja::value::{from_args, Enumerator, Object, ObjectRepr, Rest, Value};
use minijinja::{Environment, Error, ErrorKind, State};

use crate::value::is_missing;

const HELPER_NAMES: &[&str] = &[
    "format_date",
    "format_json_date",
    "fixed_size",
    "lfixed",
    "rfixed",
    "nfixed",
    "null_safe",
    "lower",
    "upper",
];

/// Failure of a formatting helper.
#[derive(Debug, thiserror::Error)]
pub enum HelperError {
    #[error("'{value}' does not match date format '{format}': {source}")]
    DateParse {
        value: String,
        format: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid date output format '{0}'")]
    DateFormat(String),
}

/// Justification used by the fixed-width helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Justify {
    Left,
    Right,
    ZeroFill,
}

/// Parses `value` with `input_format` and reformats it with `output_format`.
///
/// Formats use strftime conventions. Date-only and time-only inputs are
/// accepted; the missing part defaults to midnight / 1900-01-01. An empty value
/// formats as the empty string.
///
/// ```rust
/// use stencil_render::template::functions::format_date;
///
/// assert_eq!(format_date("28/08/2020", "%d/%m/%Y", "%d%m%Y").unwrap(), "28082020");
/// assert_eq!(format_date("", "%d/%m/%Y", "%d%m%Y").unwrap(), "");
/// ```
pub fn format_date(
    value: &str,
    input_format: &str,
    output_format: &str,
) -> Result<String, HelperError> {
    if value.is_empty() {
        return Ok(String::new());
    }
    let parsed = parse_date(value, input_format).map_err(|source| HelperError::DateParse {
        value: value.to_string(),
        format: input_format.to_string(),
        source,
    })?;
    let mut out = String::new();
    write!(out, "{}", parsed.format(output_format))
        .map_err(|_| HelperError::DateFormat(output_format.to_string()))?;
    Ok(out)
}

/// [`format_date`] for ISO dates (`%Y-%m-%d`).
pub fn format_json_date(value: &str, output_format: &str) -> Result<String, HelperError> {
    format_date(value, "%Y-%m-%d", output_format)
}

fn parse_date(value: &str, format: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    match NaiveDateTime::parse_from_str(value, format) {
        Ok(datetime) => Ok(datetime),
        Err(err) => NaiveDate::parse_from_str(value, format)
            .map(|date| date.and_time(NaiveTime::default()))
            .or_else(|_| {
                NaiveTime::parse_from_str(value, format).map(|time| {
                    NaiveDate::from_ymd_opt(1900, 1, 1)
                        .unwrap_or_default()
                        .and_time(time)
                })
            })
            .map_err(|_| err),
    }
}

/// Truncates `value` to `size` characters, then pads it to exactly `size`.
pub fn fixed_size(value: &str, size: usize, justify: Justify) -> String {
    let truncated: String = value.chars().take(size).collect();
    match justify {
        Justify::Left => format!("{:<width$}", truncated, width = size),
        Justify::Right => format!("{:>width$}", truncated, width = size),
        Justify::ZeroFill => format!("{:0>width$}", truncated, width = size),
    }
}

/// Left-justified fixed-width field.
pub fn lfixed(value: &str, size: usize) -> String {
    fixed_size(value, size, Justify::Left)
}

/// Right-justified fixed-width field.
pub fn rfixed(value: &str, size: usize) -> String {
    fixed_size(value, size, Justify::Right)
}

/// Zero-filled, right-justified fixed-width field.
pub fn nfixed(value: &str, size: usize) -> String {
    fixed_size(value, size, Justify::ZeroFill)
}

/// Text form of a template value; missing values are empty.
fn text(value: &Value) -> String {
    if is_missing(value) {
        String::new()
    } else {
        value.to_string()
    }
}

fn helper_error(err: HelperError) -> Error {
    Error::new(ErrorKind::InvalidOperation, err.to_string()).with_source(err)
}

fn null_safe(value: Value) -> Value {
    if is_missing(&value) {
        Value::from("")
    } else {
        value
    }
}

/// Dispatches a helper call by name.
fn call_helper(name: &str, args: &[Value]) -> Result<Value, Error> {
    let result = match name {
        "format_date" => {
            let (value, input, output): (Value, String, String) = from_args(args)?;
            format_date(&text(&value), &input, &output).map_err(helper_error)?
        }
        "format_json_date" => {
            let (value, output): (Value, String) = from_args(args)?;
            format_json_date(&text(&value), &output).map_err(helper_error)?
        }
        "fixed_size" | "lfixed" => {
            let (value, size): (Value, usize) = from_args(args)?;
            lfixed(&text(&value), size)
        }
        "rfixed" => {
            let (value, size): (Value, usize) = from_args(args)?;
            rfixed(&text(&value), size)
        }
        "nfixed" => {
            let (value, size): (Value, usize) = from_args(args)?;
            nfixed(&text(&value), size)
        }
        "null_safe" => {
            let (value,): (Value,) = from_args(args)?;
            return Ok(null_safe(value));
        }
        "lower" => {
            let (value,): (Value,) = from_args(args)?;
            text(&value).to_lowercase()
        }
        "upper" => {
            let (value,): (Value,) = from_args(args)?;
            text(&value).to_uppercase()
        }
        other => {
            return Err(Error::new(
                ErrorKind::UnknownMethod,
                format!("functions has no helper named '{}'", other),
            ))
        }
    };
    Ok(Value::from(result))
}

/// The `functions` global: a mapping from helper name to helper.
///
/// Both `functions.lfixed(x, 5)` and `functions['lfixed'](x, 5)` work.
#[derive(Debug)]
pub struct HelperFunctions;

impl Object for HelperFunctions {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Map
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let name = HELPER_NAMES
            .iter()
            .copied()
            .find(|name| key.as_str() == Some(*name))?;
        Some(Value::from_function(move |args: Rest<Value>| {
            call_helper(name, &args)
        }))
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Str(HELPER_NAMES)
    }

    fn call_method(
        self: &Arc<Self>,
        _state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        call_helper(method, args)
    }
}

/// Registers the `functions` global and one filter per helper.
pub fn register_functions(env: &mut Environment<'static>) {
    env.add_global("functions", Value::from_object(HelperFunctions));

    for name in HELPER_NAMES {
        // filters receive the piped value as their first argument
        env.add_filter(*name, move |value: Value, rest: Rest<Value>| {
            let mut args = Vec::with_capacity(rest.len() + 1);
            args.push(value);
            args.extend(rest.iter().cloned());
            call_helper(name, &args)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{empty_value, wrap};
    use minijinja::context;
    use serde_json::json;

    fn render(template: &str) -> Result<String, Error> {
        let mut env = Environment::new();
        register_functions(&mut env);
        let record = wrap(&json!({"name": "Ward", "day": "2020-08-28", "n": 42, "none": null}));
        env.render_str(template, context! { record => record.to_template_value() })
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("28/08/2020", "%d/%m/%Y", "%d%m%Y").unwrap(), "28082020");
        assert_eq!(format_date("08-28-2020", "%m-%d-%Y", "%d%m%Y").unwrap(), "28082020");
    }

    #[test]
    fn test_format_date_with_time() {
        assert_eq!(
            format_date("2020-08-28 23:05:30", "%Y-%m-%d %H:%M:%S", "%d/%m/%Y %Hh").unwrap(),
            "28/08/2020 23h"
        );
        assert_eq!(format_date("23:05", "%H:%M", "%H%M").unwrap(), "2305");
    }

    #[test]
    fn test_format_date_mismatch() {
        let err = format_date("2020-08-28", "%d/%m/%Y", "%d%m%Y").unwrap_err();
        assert!(matches!(err, HelperError::DateParse { .. }));
    }

    #[test]
    fn test_format_date_bad_output_format() {
        let err = format_date("2020-08-28", "%Y-%m-%d", "%Q").unwrap_err();
        assert!(matches!(err, HelperError::DateFormat(_)));
    }

    #[test]
    fn test_format_json_date() {
        assert_eq!(format_json_date("2020-08-28", "%d%m%Y").unwrap(), "28082020");
    }

    #[test]
    fn test_fixed_size_smaller() {
        let result = lfixed("some content", 30);
        assert_eq!(result.len(), 30);
        assert!(result.starts_with("some content"));
    }

    #[test]
    fn test_fixed_size_bigger() {
        assert_eq!(lfixed("some content", 5), "some ");
        assert_eq!(rfixed("some content", 5), "some ");
        assert_eq!(nfixed("123456", 3), "123");
    }

    #[test]
    fn test_justification() {
        assert_eq!(lfixed("ab", 4), "ab  ");
        assert_eq!(rfixed("ab", 4), "  ab");
        assert_eq!(nfixed("42", 5), "00042");
        assert_eq!(nfixed("", 3), "000");
    }

    #[test]
    fn test_fixed_size_counts_characters() {
        assert_eq!(lfixed("éé", 3), "éé ");
    }

    #[test]
    fn test_functions_namespace() {
        assert_eq!(render("{{ functions.upper(record.name) }}").unwrap(), "WARD");
        assert_eq!(render("{{ functions.lower(record.name) }}").unwrap(), "ward");
        assert_eq!(render("{{ functions.nfixed(record.n, 5) }}").unwrap(), "00042");
        assert_eq!(
            render("{{ functions.format_json_date(record.day, '%d%m%Y') }}").unwrap(),
            "28082020"
        );
        assert_eq!(render("[{{ functions.null_safe(record.none) }}]").unwrap(), "[]");
        assert_eq!(render("{{ functions.null_safe(record.n) }}").unwrap(), "42");
    }

    #[test]
    fn test_functions_is_a_mapping() {
        assert_eq!(render("{{ functions['lfixed'](record.name, 6) }}|").unwrap(), "Ward  |");
        assert_eq!(render("{{ functions['upper'](record.name) }}").unwrap(), "WARD");
        assert_eq!(
            render("{% set pad = functions.nfixed %}{{ pad(record.n, 4) }}").unwrap(),
            "0042"
        );
        assert_eq!(
            render("{{ 'lfixed' in functions }}/{{ functions | length }}").unwrap(),
            "true/9"
        );
        assert_eq!(render("[{{ functions['nope'] }}]").unwrap(), "[]");
    }

    #[test]
    fn test_filters() {
        assert_eq!(render("{{ record.name | rfixed(6) }}").unwrap(), "  Ward");
        assert_eq!(render("{{ record.name | lfixed(2) }}").unwrap(), "Wa");
        assert_eq!(
            render("{{ record.day | format_date('%Y-%m-%d', '%m/%Y') }}").unwrap(),
            "08/2020"
        );
    }

    #[test]
    fn test_missing_values_format_empty() {
        assert_eq!(render("[{{ functions.lfixed(record.missing, 3) }}]").unwrap(), "[   ]");
        assert_eq!(
            render("[{{ functions.format_json_date(record.missing.deep, '%d') }}]").unwrap(),
            "[]"
        );
        assert_eq!(render("[{{ record.none | upper }}]").unwrap(), "[]");
    }

    #[test]
    fn test_unknown_helper() {
        let err = render("{{ functions.nope(1) }}").unwrap_err();
        assert!(err.to_string().contains("nope"), "unexpected error: {err}");
    }

    #[test]
    fn test_helper_failure_is_a_render_error() {
        assert!(render("{{ functions.format_date(record.name, '%Y', '%d') }}").is_err());
    }

    #[test]
    fn test_null_safe_passthrough() {
        assert_eq!(null_safe(empty_value()).to_string(), "");
        assert_eq!(null_safe(Value::from(5)).to_string(), "5");
    }
}
