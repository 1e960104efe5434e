//! Payload containers.
//!
//! A [`Payload`] pairs a shape with the JSON value decoded for one request.
//! Decoding validates the input against the shape; encoding walks the shape
//! so fields come out in declaration order, missing fields take their zero
//! value and undeclared keys are dropped.

use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use super::shape::{Kind, Shape};

/// How strictly input keys are checked against the shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Keys not declared by the shape are rejected.
    Strict,
    /// Keys not declared by the shape are ignored.
    Lenient,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Syntax(#[from] serde_json::Error),

    #[error("unknown field \"{0}\"")]
    UnknownField(String),

    #[error("cannot decode {found} into {expected} field \"{path}\"")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("cannot decode {found} into object {shape}")]
    NotAnObject { shape: String, found: &'static str },
}

impl DecodeError {
    pub fn is_unknown_field(&self) -> bool {
        matches!(self, DecodeError::UnknownField(_))
    }
}

/// Name of a JSON value's type, used in error messages.
pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A shape plus the value populated for it.
#[derive(Debug, Clone)]
pub struct Payload {
    shape: Arc<Shape>,
    value: Value,
}

impl Payload {
    /// Empty container for `shape`.
    pub fn new(shape: Arc<Shape>) -> Self {
        Self {
            shape,
            value: Value::Object(Map::new()),
        }
    }

    /// Container holding an already built value. The value is not validated.
    pub fn with_value(shape: Arc<Shape>, value: Value) -> Self {
        Self { shape, value }
    }

    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Top-level field lookup.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.value.as_object().and_then(|m| m.get(name))
    }

    /// Top-level field lookup returning the string content.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Replace the container value with `bytes` decoded against the shape.
    ///
    /// Keys match a field exactly or, failing that, ignoring ASCII case; they
    /// are stored under the field's declared name.
    pub fn decode(&mut self, bytes: &[u8], mode: DecodeMode) -> Result<(), DecodeError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let map = match value {
            Value::Object(map) => canonical_object(&self.shape, map, "", mode)?,
            other => {
                return Err(DecodeError::NotAnObject {
                    shape: self.shape.name().to_string(),
                    found: json_type(&other),
                })
            }
        };
        self.value = Value::Object(map);
        Ok(())
    }

    /// Serialize in shape order.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.value {
            Value::Object(map) => ShapedObject {
                shape: &self.shape,
                map,
            }
            .serialize(serializer),
            // A hook may have swapped in a non-object value.
            other => other.serialize(serializer),
        }
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

fn canonical_object(
    shape: &Shape,
    map: Map<String, Value>,
    parent: &str,
    mode: DecodeMode,
) -> Result<Map<String, Value>, DecodeError> {
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        match shape.lookup(&key) {
            Some(field) => {
                let value = canonical_value(&field.kind, value, &join_path(parent, &field.name), mode)?;
                out.insert(field.name.clone(), value);
            }
            None if mode == DecodeMode::Strict => {
                return Err(DecodeError::UnknownField(join_path(parent, &key)))
            }
            None => {
                out.insert(key, value);
            }
        }
    }
    Ok(out)
}

/// Check `value` against `kind`, renaming object keys to their declared
/// spelling.
fn canonical_value(kind: &Kind, value: Value, path: &str, mode: DecodeMode) -> Result<Value, DecodeError> {
    match (kind, value) {
        (Kind::Raw, value) => Ok(value),
        (_, Value::Null) => Ok(Value::Null),
        (Kind::String, value @ Value::String(_))
        | (Kind::Number, value @ Value::Number(_))
        | (Kind::Bool, value @ Value::Bool(_)) => Ok(value),
        (Kind::Object(shape), Value::Object(map)) => {
            Ok(Value::Object(canonical_object(shape, map, path, mode)?))
        }
        (Kind::Array(elem), Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| canonical_value(elem, item, &format!("{path}[{i}]"), mode))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (kind, value) => Err(DecodeError::TypeMismatch {
            path: path.to_string(),
            expected: kind.describe(),
            found: json_type(&value),
        }),
    }
}

struct ShapedObject<'a> {
    shape: &'a Shape,
    map: &'a Map<String, Value>,
}

impl Serialize for ShapedObject<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = self.shape.fields();
        let mut out = serializer.serialize_map(Some(fields.len()))?;
        for field in fields {
            out.serialize_entry(
                &field.name,
                &ShapedValue {
                    kind: &field.kind,
                    value: self.map.get(&field.name),
                },
            )?;
        }
        out.end()
    }
}

struct ShapedValue<'a> {
    kind: &'a Kind,
    value: Option<&'a Value>,
}

impl Serialize for ShapedValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match (self.kind, self.value) {
            (Kind::Object(shape), Some(Value::Object(map))) => ShapedObject { shape, map }.serialize(serializer),
            (Kind::Array(elem), Some(Value::Array(items))) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&ShapedValue {
                        kind: elem,
                        value: Some(item),
                    })?;
                }
                seq.end()
            }
            (_, Some(value)) => value.serialize(serializer),
            (kind, None) => kind.zero_value().serialize(serializer),
        }
    }
}
