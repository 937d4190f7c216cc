//! Null-safe value wrapper for template data.
//!
//! Records and schemas arrive as arbitrary JSON. Templates want to write
//! `record.customer.address.city` without guarding every step, so the data is
//! projected into [`WrappedValue`], a closed tagged union in which every
//! lookup succeeds:
//!
//! | JSON input        | Wrapped form                 |
//! |-------------------|------------------------------|
//! | object            | [`WrappedValue::Object`]     |
//! | array             | [`WrappedValue::Sequence`]   |
//! | `null` / missing  | [`WrappedValue::Empty`]      |
//! | bool/number/string| [`WrappedValue::Scalar`]     |
//!
//! Looking up a key that does not exist (or an index out of range, or anything
//! at all on a scalar or on `Empty`) yields `Empty`. `Empty` formats as the
//! empty string and absorbs any further access, so chains of arbitrary depth
//! resolve to either a concrete scalar or `Empty`.
//!
//! # Example
//!
//! ```rust
//! use stencil_render::wrap;
//! use serde_json::json;
//!
//! let record = wrap(&json!({"items": [{"sku": "A-1"}], "note": null}));
//!
//! assert_eq!(record["items"][0]["sku"].to_string(), "A-1");
//! assert_eq!(record["items"][2]["nested"]["missing"]["deep"].to_string(), "");
//! assert!(record["note"].is_empty_sentinel());
//! ```
//!
//! # Templates
//!
//! [`WrappedValue::to_template_value`] turns the tree into minijinja values.
//! Maps and sequences become dynamic objects whose `get_value` never reports a
//! miss to the engine; scalars become native values so comparisons and
//! arithmetic keep working.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use minijinja::value::{Enumerator, Object, ObjectRepr, Value};
use minijinja::{Error, State};

static EMPTY: WrappedValue = WrappedValue::Empty;

/// A non-null JSON leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl Scalar {
    fn to_template_value(&self) -> Value {
        match self {
            Scalar::Bool(b) => Value::from(*b),
            Scalar::String(s) => Value::from(s.as_str()),
            Scalar::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::from(i)
                } else if let Some(u) = n.as_u64() {
                    Value::from(u)
                } else {
                    Value::from(n.as_f64().unwrap_or(f64::NAN))
                }
            }
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Bool(b) => serde_json::Value::Bool(*b),
            Scalar::Number(n) => serde_json::Value::Number(n.clone()),
            Scalar::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

/// A JSON value projected so that field access never fails.
///
/// Cloning is cheap: maps and sequences are shared behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum WrappedValue {
    /// The universal missing/null sentinel.
    #[default]
    Empty,
    Scalar(Scalar),
    Object(Arc<BTreeMap<String, WrappedValue>>),
    Sequence(Arc<Vec<WrappedValue>>),
}

/// Wraps a JSON value tree.
pub fn wrap(value: &serde_json::Value) -> WrappedValue {
    match value {
        serde_json::Value::Null => WrappedValue::Empty,
        serde_json::Value::Bool(b) => WrappedValue::Scalar(Scalar::Bool(*b)),
        serde_json::Value::Number(n) => WrappedValue::Scalar(Scalar::Number(n.clone())),
        serde_json::Value::String(s) => WrappedValue::Scalar(Scalar::String(s.clone())),
        serde_json::Value::Array(items) => {
            WrappedValue::Sequence(Arc::new(items.iter().map(wrap).collect()))
        }
        serde_json::Value::Object(map) => WrappedValue::Object(Arc::new(
            map.iter().map(|(k, v)| (k.clone(), wrap(v))).collect(),
        )),
    }
}

impl WrappedValue {
    /// Looks up a key. Anything other than an existing key of an object yields `Empty`.
    pub fn get(&self, key: &str) -> &WrappedValue {
        match self {
            WrappedValue::Object(map) => map.get(key).unwrap_or(&EMPTY),
            _ => &EMPTY,
        }
    }

    /// Looks up a sequence element. Out of range or non-sequence yields `Empty`.
    pub fn at(&self, index: usize) -> &WrappedValue {
        match self {
            WrappedValue::Sequence(items) => items.get(index).unwrap_or(&EMPTY),
            _ => &EMPTY,
        }
    }

    pub fn is_empty_sentinel(&self) -> bool {
        matches!(self, WrappedValue::Empty)
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            WrappedValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Converts back to JSON. `Empty` becomes `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            WrappedValue::Empty => serde_json::Value::Null,
            WrappedValue::Scalar(s) => s.to_json(),
            WrappedValue::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            WrappedValue::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(|v| v.to_json()).collect())
            }
        }
    }

    /// Converts the tree into a value the template engine can render.
    pub fn to_template_value(&self) -> Value {
        match self {
            WrappedValue::Empty => empty_value(),
            WrappedValue::Scalar(s) => s.to_template_value(),
            WrappedValue::Object(_) | WrappedValue::Sequence(_) => {
                Value::from_object(TemplateNode(self.clone()))
            }
        }
    }
}

impl From<&serde_json::Value> for WrappedValue {
    fn from(value: &serde_json::Value) -> Self {
        wrap(value)
    }
}

impl Index<&str> for WrappedValue {
    type Output = WrappedValue;

    fn index(&self, key: &str) -> &WrappedValue {
        self.get(key)
    }
}

impl Index<usize> for WrappedValue {
    type Output = WrappedValue;

    fn index(&self, index: usize) -> &WrappedValue {
        self.at(index)
    }
}

impl fmt::Display for WrappedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WrappedValue::Empty => Ok(()),
            WrappedValue::Scalar(s) => write!(f, "{}", s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

/// Returns the template-side empty sentinel.
pub fn empty_value() -> Value {
    Value::from_object(EmptyValue)
}

/// Whether a template value is missing: undefined, none, or the empty sentinel.
pub fn is_missing(value: &Value) -> bool {
    value.is_undefined() || value.is_none() || value.downcast_object_ref::<EmptyValue>().is_some()
}

/// Template-side empty sentinel.
///
/// Attribute access, item access, calls and method calls all return the
/// sentinel again. It is falsy, iterates as an empty mapping and renders as
/// nothing.
#[derive(Debug)]
pub struct EmptyValue;

impl Object for EmptyValue {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Map
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        tracing::debug!(attribute = %key, "attribute doesn't exist, returning empty value");
        Some(empty_value())
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Empty
    }

    fn is_true(self: &Arc<Self>) -> bool {
        false
    }

    fn call(self: &Arc<Self>, _state: &State<'_, '_>, _args: &[Value]) -> Result<Value, Error> {
        Ok(empty_value())
    }

    fn call_method(
        self: &Arc<Self>,
        _state: &State<'_, '_>,
        _method: &str,
        _args: &[Value],
    ) -> Result<Value, Error> {
        Ok(empty_value())
    }

    fn render(self: &Arc<Self>, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ok(())
    }
}

/// A wrapped object or sequence exposed to templates.
#[derive(Debug)]
struct TemplateNode(WrappedValue);

impl TemplateNode {
    fn child(&self, key: &Value) -> Option<&WrappedValue> {
        match &self.0 {
            WrappedValue::Object(map) => key.as_str().and_then(|k| map.get(k)),
            WrappedValue::Sequence(items) => {
                let index = key.as_i64()?;
                let index = if index < 0 {
                    items.len().checked_sub(index.unsigned_abs() as usize)?
                } else {
                    index as usize
                };
                items.get(index)
            }
            _ => None,
        }
    }
}

impl Object for TemplateNode {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        match self.0 {
            WrappedValue::Sequence(_) => ObjectRepr::Seq,
            _ => ObjectRepr::Map,
        }
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        match self.child(key) {
            Some(WrappedValue::Empty) => {
                tracing::debug!(attribute = %key, "attribute is null, returning empty value");
                Some(empty_value())
            }
            Some(child) => Some(child.to_template_value()),
            None => {
                tracing::debug!(attribute = %key, "attribute doesn't exist, returning empty value");
                Some(empty_value())
            }
        }
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        match &self.0 {
            WrappedValue::Object(map) => {
                Enumerator::Values(map.keys().map(|k| Value::from(k.as_str())).collect())
            }
            WrappedValue::Sequence(items) => Enumerator::Seq(items.len()),
            _ => Enumerator::Empty,
        }
    }

    fn is_true(self: &Arc<Self>) -> bool {
        match &self.0 {
            WrappedValue::Object(map) => !map.is_empty(),
            WrappedValue::Sequence(items) => !items.is_empty(),
            _ => false,
        }
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
