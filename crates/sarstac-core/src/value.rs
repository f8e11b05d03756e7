//! Storage-safe value model and the value normalizer.
//!
//! Every property, asset and link that flows through the pipeline is carried as a
//! [`Value`]. The JSON-shaped variants mirror `serde_json`, while a few extra
//! variants describe inputs that need coercion ([`Value::Array`],
//! [`Value::Wrapped`]) and values the pipeline has already resolved into typed
//! form ([`Value::Timestamp`], [`Value::Geometry`], [`Value::Bbox`]).
//!
//! [`normalize`] turns any value into its storage-safe form. It never fails:
//! variants it has no rule for are returned unchanged.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map as JsonMap, Number, Value as JsonValue};

use crate::types::Bbox;

/// A numeric scalar held in a width other than the native `i64` / `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WrappedNumber {
    /// Unsigned 64-bit integer, possibly beyond the `i64` range.
    U64(u64),
    /// Signed 32-bit integer.
    I32(i32),
    /// Single precision float.
    F32(f32),
}

impl WrappedNumber {
    /// Converts the wrapper into a native number, preferring [`Value::Int`].
    #[must_use]
    pub fn into_native(self) -> Value {
        match self {
            WrappedNumber::U64(n) => {
                i64::try_from(n).map_or_else(|_| Value::Float(n as f64), Value::Int)
            },
            WrappedNumber::I32(n) => Value::Int(i64::from(n)),
            WrappedNumber::F32(n) => Value::Float(f64::from(n)),
        }
    }
}

/// The coarse representation of a value, used to check column consistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Shape {
    /// Strings, numbers, booleans and timestamps.
    Scalar,
    /// Ordered sequences, including packed numeric arrays.
    Sequence,
    /// Key/value structures, including bounding boxes.
    Mapping,
    /// A `GeoJSON` geometry.
    Geometry,
}

/// A dynamically typed value flowing through the normalization pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Mapping),
    /// Packed numeric buffer. Normalizes to a [`Value::Sequence`] of floats.
    Array(Vec<f64>),
    /// Numeric scalar in a non-native width. Normalizes to a native number.
    Wrapped(WrappedNumber),
    /// A datetime already resolved to UTC.
    Timestamp(DateTime<Utc>),
    /// A parsed `GeoJSON` geometry.
    Geometry(geojson::Geometry),
    /// A resolved bounding box struct.
    Bbox(Bbox),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` for sequences and mappings, the values a flat column
    /// cannot hold next to scalars.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        matches!(self.shape(), Shape::Sequence | Shape::Mapping)
    }

    #[must_use]
    pub fn is_sequence(&self) -> bool {
        self.shape() == Shape::Sequence
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        match self {
            Value::Sequence(_) | Value::Array(_) => Shape::Sequence,
            Value::Mapping(_) | Value::Bbox(_) => Shape::Mapping,
            Value::Geometry(_) => Shape::Geometry,
            Value::Null
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::String(_)
            | Value::Wrapped(_)
            | Value::Timestamp(_) => Shape::Scalar,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value, accepting every numeric variant.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            Value::Wrapped(n) => n.into_native().as_f64(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Converts the value into plain JSON.
    ///
    /// Timestamps become RFC 3339 strings in UTC, geometries become `GeoJSON`
    /// objects and non-finite floats become `null`.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(n) => JsonValue::Number((*n).into()),
            Value::Float(n) => float_to_json(*n),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Sequence(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Mapping(mapping) => JsonValue::Object(mapping.to_json_object()),
            Value::Array(values) => {
                JsonValue::Array(values.iter().copied().map(float_to_json).collect())
            },
            Value::Wrapped(n) => n.into_native().to_json(),
            Value::Timestamp(ts) => {
                JsonValue::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            },
            Value::Geometry(geometry) => {
                serde_json::to_value(geometry).unwrap_or(JsonValue::Null)
            },
            Value::Bbox(bbox) => bbox.to_json(),
        }
    }

    /// Compact JSON text of the value.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }
}

fn float_to_json(n: f64) -> JsonValue {
    Number::from_f64(n).map_or(JsonValue::Null, JsonValue::Number)
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::Wrapped(WrappedNumber::U64(u))
                } else {
                    n.as_f64().map_or(Value::Null, Value::Float)
                }
            },
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(items) => Value::Sequence(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(object) => Value::Mapping(Mapping::from(object)),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Mapping> for Value {
    fn from(value: Mapping) -> Self {
        Value::Mapping(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// An insertion-ordered string-keyed map.
///
/// Inserting an existing key replaces the value in place and keeps the key's
/// original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    entries: Vec<(String, Value)>,
}

impl Mapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Inserts a value, returning the previous value for the key if any.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        if let Some((_, slot)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(slot, value));
        }
        self.entries.push((key, value));
        None
    }

    /// Removes a key, keeping the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn to_json_object(&self) -> JsonMap<String, JsonValue> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

impl From<JsonMap<String, JsonValue>> for Mapping {
    fn from(object: JsonMap<String, JsonValue>) -> Self {
        object
            .into_iter()
            .map(|(k, v)| (k, Value::from(v)))
            .collect()
    }
}

impl FromIterator<(String, Value)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut mapping = Mapping::new();
        for (key, value) in iter {
            mapping.insert(key, value);
        }
        mapping
    }
}

impl IntoIterator for Mapping {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Makes a value storage-safe.
///
/// Packed numeric arrays become sequences of native numbers, wrapped scalars
/// become native numbers, and sequences and mappings are normalized
/// recursively with their order preserved. Everything else is returned as is.
#[must_use]
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Array(values) => Value::Sequence(values.into_iter().map(Value::Float).collect()),
        Value::Wrapped(n) => n.into_native(),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(normalize).collect()),
        Value::Mapping(mapping) => Value::Mapping(normalize_mapping(mapping)),
        other => other,
    }
}

/// Normalizes every value of a mapping, keeping keys and their order.
#[must_use]
pub fn normalize_mapping(mapping: Mapping) -> Mapping {
    mapping
        .into_iter()
        .map(|(k, v)| (k, normalize(v)))
        .collect()
}
