//! Tag-driven field processing.
//!
//! One walk over a payload, parameterised by a [`ProcessorSet`]. Every string
//! leaf (or string array element) whose field carries a tag in the set is
//! rewritten in place. Nested objects and arrays of objects are descended
//! into; `null` and values of other types are left alone.

use serde_json::{Map, Value};
use thiserror::Error;

use super::container::{json_type, Payload};
use super::shape::{Kind, Shape, Tag};
use super::transforms::{self, Transform, TransformError};

#[derive(Debug, Error)]
pub enum FieldError {
    #[error("processing fields of kind '{0}' is unsupported")]
    NotTraversable(&'static str),

    #[error("could not process field '{name}': {source}")]
    Transform {
        name: String,
        #[source]
        source: TransformError,
    },

    #[error("could not process field '{name}': {source}")]
    Nested {
        name: String,
        #[source]
        source: Box<FieldError>,
    },
}

/// Ordered `tag → transform` pairs.
#[derive(Clone)]
pub struct ProcessorSet {
    entries: Vec<(Tag, Transform)>,
}

impl std::fmt::Debug for ProcessorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|(t, _)| t)).finish()
    }
}

impl ProcessorSet {
    pub fn new(entries: Vec<(Tag, Transform)>) -> Self {
        Self { entries }
    }

    /// Transforms applied to request payloads before proxying.
    pub fn request() -> Self {
        Self::new(vec![(Tag::Hex, transforms::hex_to_base64 as Transform)])
    }

    /// Transforms applied to upstream payloads before they are returned.
    pub fn response() -> Self {
        Self::new(vec![
            (Tag::Hex, transforms::base64_to_hex as Transform),
            (Tag::Enum, transforms::enum_to_lowercase as Transform),
            (Tag::Time, transforms::time_to_unix as Transform),
        ])
    }
}

/// Apply `set` to every tagged leaf of `payload`.
pub fn process_fields(payload: &mut Payload, set: &ProcessorSet) -> Result<(), FieldError> {
    let shape = payload.shape().clone();
    match payload.value_mut() {
        Value::Object(map) => walk_object(&shape, map, set),
        other => Err(FieldError::NotTraversable(json_type(other))),
    }
}

/// Request-direction processing.
pub fn process_request_fields(payload: &mut Payload) -> Result<(), FieldError> {
    process_fields(payload, &ProcessorSet::request())
}

/// Response-direction processing.
pub fn process_response_fields(payload: &mut Payload) -> Result<(), FieldError> {
    process_fields(payload, &ProcessorSet::response())
}

fn walk_object(shape: &Shape, map: &mut Map<String, Value>, set: &ProcessorSet) -> Result<(), FieldError> {
    for field in shape.fields() {
        let Some(value) = map.get_mut(&field.name) else {
            continue;
        };
        walk_value(&field.kind, &field.tags, value, set).map_err(|e| match e {
            WalkError::Transform(source) => FieldError::Transform {
                name: field.name.clone(),
                source,
            },
            WalkError::Field(source) => FieldError::Nested {
                name: field.name.clone(),
                source: Box::new(source),
            },
        })?;
    }
    Ok(())
}

enum WalkError {
    Transform(TransformError),
    Field(FieldError),
}

fn walk_value(kind: &Kind, tags: &[Tag], value: &mut Value, set: &ProcessorSet) -> Result<(), WalkError> {
    match (kind, value) {
        (Kind::String, Value::String(s)) => {
            for (tag, transform) in &set.entries {
                if tags.contains(tag) {
                    *s = transform(s.as_str()).map_err(WalkError::Transform)?;
                }
            }
            Ok(())
        }
        (Kind::Object(shape), Value::Object(map)) => walk_object(shape, map, set).map_err(WalkError::Field),
        (Kind::Array(elem), Value::Array(items)) => {
            for item in items {
                walk_value(elem, tags, item, set)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
