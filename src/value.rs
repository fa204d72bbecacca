//! Runtime values flowing through resolution.
//!
//! Sources hand back loosely typed [`Value`]s; coercion narrows them to the
//! option's declared type. A value may carry a [`ProvenanceTag`] describing
//! where it came from. Tags ride alongside the value in [`Tagged`] and never
//! take part in equality.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};

/// An opaque secret that can be turned into its plaintext on demand.
///
/// String coercion calls [`decrypt`](Decryptable::decrypt) when it meets a
/// [`Value::Secret`]; nothing else looks inside.
pub trait Decryptable: fmt::Debug + Send + Sync {
    fn decrypt(&self) -> String;
}

/// Shared handle to a [`Decryptable`].
#[derive(Clone)]
pub struct Secret(Arc<dyn Decryptable>);

impl Secret {
    pub fn new<D: Decryptable + 'static>(inner: D) -> Self {
        Secret(Arc::new(inner))
    }

    pub fn decrypt(&self) -> String {
        self.0.decrypt()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(<redacted>)")
    }
}

/// A loosely typed configuration value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    #[serde(skip_deserializing)]
    Secret(Secret),
}

impl Value {
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Numeric view used for cross-type equality: `true == 1 == 1.0`.
    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Quoted rendering for error messages: strings in single quotes, the
    /// rest as [`Display`](fmt::Display).
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("'{s}'"),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Secret(a), Value::Secret(b)) => Arc::ptr_eq(&a.0, &b.0),
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

/// Render a float the way a human reading a config dump expects: integral
/// values keep a trailing `.0`.
pub(crate) fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        f.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item.repr())?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{key}': {}", item.repr())?;
                }
                write!(f, "}}")
            }
            Value::Secret(_) => write!(f, "<secret>"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::None => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, item) in map {
                    out.serialize_entry(key, item)?;
                }
                out.end()
            }
            Value::Secret(secret) => serializer.serialize_str(&secret.decrypt()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Secret> for Value {
    fn from(s: Secret) -> Self {
        Value::Secret(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::None, Into::into)
    }
}

/// Where a value came from, attached for later diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceTag {
    pub description: String,
}

/// A value with optional provenance. Equality ignores the tag.
#[derive(Debug, Clone, Default)]
pub struct Tagged {
    pub value: Value,
    pub tag: Option<ProvenanceTag>,
}

impl Tagged {
    pub fn new(value: impl Into<Value>, description: impl Into<String>) -> Self {
        Tagged {
            value: value.into(),
            tag: Some(ProvenanceTag {
                description: description.into(),
            }),
        }
    }

    pub fn is_tagged(&self) -> bool {
        self.tag.is_some()
    }

    /// Attach a tag unless one is already present.
    pub fn tag_if_untagged(mut self, description: impl Into<String>) -> Self {
        if self.tag.is_none() {
            self.tag = Some(ProvenanceTag {
                description: description.into(),
            });
        }
        self
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

impl PartialEq for Tagged {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl PartialEq<Value> for Tagged {
    fn eq(&self, other: &Value) -> bool {
        &self.value == other
    }
}

impl From<Value> for Tagged {
    fn from(value: Value) -> Self {
        Tagged { value, tag: None }
    }
}
