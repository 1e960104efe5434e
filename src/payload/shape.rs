//! Declarative payload shapes.
//!
//! A shape lists the JSON fields of one payload object, the kind of value
//! each field holds and the tags that select field transforms. Shapes are
//! built bottom-up and shared through `Arc`, so a shape graph is always
//! acyclic.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Declarative annotation on a string leaf selecting a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Byte string: `0x` hex on the REST side, base64 on the gRPC side.
    Hex,
    /// gRPC enum name, lowercased on the way out.
    Enum,
    /// RFC3339 timestamp, converted to Unix seconds on the way out.
    Time,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Hex => "hex",
            Tag::Enum => "enum",
            Tag::Time => "time",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of value a field holds.
#[derive(Debug, Clone)]
pub enum Kind {
    String,
    Number,
    Bool,
    /// Nested object described by another shape. `null` is accepted.
    Object(Arc<Shape>),
    /// Homogeneous array. `null` is accepted.
    Array(Box<Kind>),
    /// Any JSON value, passed through untouched.
    Raw,
}

impl Kind {
    /// Value a missing field takes when the container is re-encoded.
    pub fn zero_value(&self) -> Value {
        match self {
            Kind::String => Value::String(String::new()),
            Kind::Number => Value::from(0),
            Kind::Bool => Value::Bool(false),
            Kind::Object(_) | Kind::Array(_) | Kind::Raw => Value::Null,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Number => "number",
            Kind::Bool => "bool",
            Kind::Object(_) => "object",
            Kind::Array(_) => "array",
            Kind::Raw => "any",
        }
    }
}

/// One named field of a shape.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub kind: Kind,
    pub tags: Vec<Tag>,
}

impl Field {
    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Ordered field list describing one JSON object.
#[derive(Debug, Clone)]
pub struct Shape {
    name: String,
    fields: Vec<Field>,
}

impl Shape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field of any kind.
    pub fn field(mut self, name: impl Into<String>, kind: Kind, tags: &[Tag]) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
            tags: tags.to_vec(),
        });
        self
    }

    pub fn string(self, name: impl Into<String>) -> Self {
        self.field(name, Kind::String, &[])
    }

    pub fn hex(self, name: impl Into<String>) -> Self {
        self.field(name, Kind::String, &[Tag::Hex])
    }

    pub fn enumeration(self, name: impl Into<String>) -> Self {
        self.field(name, Kind::String, &[Tag::Enum])
    }

    pub fn time(self, name: impl Into<String>) -> Self {
        self.field(name, Kind::String, &[Tag::Time])
    }

    pub fn number(self, name: impl Into<String>) -> Self {
        self.field(name, Kind::Number, &[])
    }

    pub fn boolean(self, name: impl Into<String>) -> Self {
        self.field(name, Kind::Bool, &[])
    }

    pub fn object(self, name: impl Into<String>, shape: &Arc<Shape>) -> Self {
        self.field(name, Kind::Object(Arc::clone(shape)), &[])
    }

    pub fn array_of(self, name: impl Into<String>, shape: &Arc<Shape>) -> Self {
        self.field(name, Kind::Array(Box::new(Kind::Object(Arc::clone(shape)))), &[])
    }

    /// Array of strings, each element carrying `tags`.
    pub fn strings(self, name: impl Into<String>, tags: &[Tag]) -> Self {
        self.field(name, Kind::Array(Box::new(Kind::String)), tags)
    }

    pub fn raw(self, name: impl Into<String>) -> Self {
        self.field(name, Kind::Raw, &[])
    }

    pub fn build(self) -> Arc<Shape> {
        Arc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Exact match first, then ASCII case-insensitive.
    pub fn lookup(&self, name: &str) -> Option<&Field> {
        self.get(name)
            .or_else(|| self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name)))
    }
}
