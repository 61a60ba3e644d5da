#![forbid(unsafe_code)]

//! Dynamic structural values.
//!
//! [`Value`] is the common currency of the structural utilities: records,
//! sequences, scalars, and opaque non-data handles. Typed store states are
//! projected into a `Value` whenever the engine needs to merge, project, or
//! persist them.
//!
//! # Equality
//!
//! `PartialEq` is structural (see [`deep_equal`](crate::structural::deep_equal)):
//!
//! - Record key order is irrelevant.
//! - `Int`, `UInt` and `Float` share one numeric domain, so
//!   `Int(1) == Float(1.0)`. Integers compare exactly against floats.
//! - `NaN` equals `NaN`, so every value equals its own clone.
//! - [`Opaque`] handles compare by pointer identity.
//!
//! # Serialization
//!
//! Values serialize as plain JSON. Opaque handles are not data: record
//! entries holding one are left out, and elsewhere they serialize as `null`.
//! Integers above `i64::MAX` are kept as [`Value::UInt`] so they survive a
//! JSON round trip.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::structural;

/// Record representation used by [`Value::Map`].
pub type Map = BTreeMap<String, Value>;

/// Errors raised while projecting typed data to and from [`Value`].
#[derive(Debug, Error)]
pub enum StructuralError {
    #[error("failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode value: {0}")]
    Decode(#[source] serde_json::Error),
}

/// A non-data value carried through the structural utilities by reference.
///
/// Cloning an `Opaque` shares the underlying handle. Two `Opaque` values are
/// equal only if they point at the same allocation.
#[derive(Clone)]
pub struct Opaque {
    name: Rc<str>,
    inner: Rc<dyn Any>,
}

impl Opaque {
    /// Wrap an arbitrary handle under a diagnostic name.
    #[must_use]
    pub fn new<T: Any>(name: impl Into<Rc<str>>, value: T) -> Self {
        Self {
            name: name.into(),
            inner: Rc::new(value),
        }
    }

    /// Diagnostic name given at construction.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Borrow the handle as a concrete type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Pointer identity.
    #[must_use]
    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({})", self.name)
    }
}

/// Coarse shape of a [`Value`], used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    Str,
    List,
    Map,
    Opaque,
}

impl ValueKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::Str => "string",
            Self::List => "list",
            Self::Map => "map",
            Self::Opaque => "opaque",
        }
    }
}

/// Arbitrary nested record/sequence/scalar data.
#[derive(Clone, Default)]
pub enum Value {
    /// Absent value. Skipped by [`deep_merge`](crate::structural::deep_merge).
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    /// Integer above `i64::MAX`. Smaller unsigned values use `Int`.
    UInt(u64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(Map),
    /// Non-data handle, passed through by reference.
    Opaque(Opaque),
}

impl Value {
    /// Build a record from key/value pairs.
    #[must_use]
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a sequence from items.
    #[must_use]
    pub fn list<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// An empty record.
    #[must_use]
    pub fn empty_map() -> Self {
        Self::Map(Map::new())
    }

    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) | Self::UInt(_) | Self::Float(_) => ValueKind::Number,
            Self::Str(_) => ValueKind::Str,
            Self::List(_) => ValueKind::List,
            Self::Map(_) => ValueKind::Map,
            Self::Opaque(_) => ValueKind::Opaque,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// True for records and sequences.
    #[must_use]
    pub const fn is_container(&self) -> bool {
        matches!(self, Self::List(_) | Self::Map(_))
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view. Floats with no fractional part convert losslessly.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::UInt(u) => i64::try_from(*u).ok(),
            Self::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int(i) => u64::try_from(*i).ok(),
            Self::UInt(u) => Some(*u),
            Self::Float(f) if f.fract() == 0.0 && *f >= 0.0 => Some(*f as u64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::UInt(u) => Some(*u as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a top-level key of a record.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.as_map_mut().and_then(|map| map.get_mut(key))
    }

    /// Follow a path of record keys.
    #[must_use]
    pub fn pointer<'a>(&self, path: impl IntoIterator<Item = &'a str>) -> Option<&Value> {
        path.into_iter().try_fold(self, |cur, key| cur.get(key))
    }

    /// Insert into a record, returning the previous value.
    ///
    /// Has no effect (and returns `None`) when `self` is not a record.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.as_map_mut()
            .and_then(|map| map.insert(key.into(), value.into()))
    }

    /// Project a record onto the given top-level keys.
    ///
    /// Keys that are missing from `self` are omitted. Non-record values
    /// project to an empty record.
    #[must_use]
    pub fn pick<S: AsRef<str>>(&self, fields: &[S]) -> Value {
        let mut out = Map::new();
        if let Some(map) = self.as_map() {
            for field in fields {
                if let Some(v) = map.get(field.as_ref()) {
                    out.insert(field.as_ref().to_string(), v.clone());
                }
            }
        }
        Value::Map(out)
    }

    /// Convert to a `serde_json::Value`. Opaque handles become `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null | Self::Opaque(_) => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::UInt(u) => serde_json::Value::from(*u),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Str(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Self::Map(map) => serde_json::Value::Object(
                data_entries(map)
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Project any serializable value into a `Value`.
    ///
    /// # Errors
    ///
    /// Returns [`StructuralError::Encode`] if serialization fails.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Value, StructuralError> {
        serde_json::to_value(value)
            .map(Value::from)
            .map_err(StructuralError::Encode)
    }

    /// Decode this value into a concrete type.
    ///
    /// # Errors
    ///
    /// Returns [`StructuralError::Decode`] if the shape does not match `T`.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, StructuralError> {
        serde_json::from_value(self.to_json()).map_err(StructuralError::Decode)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        structural::deep_equal(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::UInt(u) => write!(f, "{u}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::List(items) => f.debug_list().entries(items).finish(),
            Self::Map(map) => f.debug_map().entries(map).finish(),
            Self::Opaque(o) => o.fmt(f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Value::Int(i),
                (None, Some(u)) => Value::UInt(u),
                (None, None) => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        i64::try_from(u).map_or(Value::UInt(u), Value::Int)
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

impl From<Opaque> for Value {
    fn from(o: Opaque) -> Self {
        Value::Opaque(o)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(items: Vec<V>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<V: Into<Value>> From<Option<V>> for Value {
    fn from(opt: Option<V>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Serde
// ---------------------------------------------------------------------------

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null | Self::Opaque(_) => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::UInt(u) => serializer.serialize_u64(*u),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Str(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(map) => {
                let mut out = serializer.serialize_map(Some(data_entries(map).count()))?;
                for (k, v) in data_entries(map) {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

/// Record entries that carry data, skipping opaque handles.
fn data_entries(map: &Map) -> impl Iterator<Item = (&String, &Value)> {
    map.iter().filter(|(_, v)| !matches!(v, Value::Opaque(_)))
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
