#![forbid(unsafe_code)]

//! Structural utilities over [`Value`]: deep clone, deep equality, deep merge.
//!
//! All functions are pure and never fail.
//!
//! # Invariants
//!
//! 1. `deep_equal(v, &deep_clone(v))` holds for every `v`.
//! 2. `deep_merge(a, b)` keeps every key of `a` that `b` does not set.
//! 3. `deep_merge` never deletes a key: `Null` in the partial means "absent"
//!    and leaves the target's entry in place.
//! 4. Record key order never affects equality.

use std::collections::btree_map::Entry;

use thiserror::Error;
use tracing::trace;

use crate::value::{Map, Value};

/// Failure of the generic structural cloner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CloneError {
    #[error("value at `{path}` is not cloneable ({name})")]
    NonCloneable { path: String, name: String },
}

/// Clone `value` with no shared mutable substructure.
///
/// Tries the generic structured cloner first. Values it refuses (opaque
/// handles anywhere in the tree) are cloned by manual recursion instead, with
/// opaque handles passed through by reference.
#[must_use]
pub fn deep_clone(value: &Value) -> Value {
    match try_structured_clone(value) {
        Ok(cloned) => cloned,
        Err(err) => {
            trace!(message = "structural.clone_fallback", error = %err);
            clone_recursive(value)
        }
    }
}

/// Generic structured clone: copies pure data, refuses opaque handles.
///
/// # Errors
///
/// Returns [`CloneError::NonCloneable`] naming the first opaque handle found
/// (depth-first, record keys in order).
pub fn try_structured_clone(value: &Value) -> Result<Value, CloneError> {
    structured_clone_at(value, &mut String::from("$"))
}

fn structured_clone_at(value: &Value, path: &mut String) -> Result<Value, CloneError> {
    match value {
        Value::Opaque(o) => Err(CloneError::NonCloneable {
            path: path.clone(),
            name: o.name().to_string(),
        }),
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let len = path.len();
                path.push_str(&format!("[{i}]"));
                let cloned = structured_clone_at(item, path);
                path.truncate(len);
                out.push(cloned?);
            }
            Ok(Value::List(out))
        }
        Value::Map(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                let len = path.len();
                path.push('.');
                path.push_str(k);
                let cloned = structured_clone_at(v, path);
                path.truncate(len);
                out.insert(k.clone(), cloned?);
            }
            Ok(Value::Map(out))
        }
        scalar => Ok(clone_scalar(scalar)),
    }
}

fn clone_recursive(value: &Value) -> Value {
    match value {
        Value::List(items) => Value::List(items.iter().map(clone_recursive).collect()),
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), clone_recursive(v)))
                .collect(),
        ),
        // Shares the handle.
        Value::Opaque(o) => Value::Opaque(o.clone()),
        scalar => clone_scalar(scalar),
    }
}

fn clone_scalar(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(b) => Value::Bool(*b),
        Value::Int(i) => Value::Int(*i),
        Value::UInt(u) => Value::UInt(*u),
        Value::Float(f) => Value::Float(*f),
        Value::Str(s) => Value::Str(s.clone()),
        other => other.clone(),
    }
}

/// Structural equality.
///
/// Same scalar, same-length sequences with pairwise-equal elements in order,
/// or records with the same key set and pairwise-equal values per key.
#[must_use]
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::UInt(x), Value::UInt(y)) => x == y,
        (Value::Int(x), Value::UInt(y)) | (Value::UInt(y), Value::Int(x)) => {
            u64::try_from(*x).is_ok_and(|x| x == *y)
        }
        (Value::Float(x), Value::Float(y)) => float_eq(*x, *y),
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => {
            int_float_eq(i128::from(*x), *y)
        }
        (Value::UInt(x), Value::Float(y)) | (Value::Float(y), Value::UInt(x)) => {
            int_float_eq(i128::from(*x), *y)
        }
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(xs), Value::List(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Map(xs), Value::Map(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| deep_equal(x, y)))
        }
        (Value::Opaque(x), Value::Opaque(y)) => x.ptr_eq(y),
        _ => false,
    }
}

fn float_eq(x: f64, y: f64) -> bool {
    x == y || (x.is_nan() && y.is_nan())
}

/// Exact: the float must be integral and name the same integer.
fn int_float_eq(i: i128, f: f64) -> bool {
    f.is_finite() && f.fract() == 0.0 && f as i128 == i
}

/// Merge `partial` into `target`, returning a new value.
///
/// When both sides are records, every non-`Null` key of `partial` overrides
/// the target's entry, recursing where both entries are records. Any other
/// combination returns `partial` as the replacement.
#[must_use]
pub fn deep_merge(target: &Value, partial: &Value) -> Value {
    match (target, partial) {
        (Value::Map(base), Value::Map(patch)) => {
            let mut out = clone_map(base);
            merge_into(&mut out, patch);
            Value::Map(out)
        }
        _ => deep_clone(partial),
    }
}

fn merge_into(out: &mut Map, patch: &Map) {
    for (key, incoming) in patch {
        if incoming.is_null() {
            continue;
        }
        match out.entry(key.clone()) {
            Entry::Occupied(mut slot) => match (slot.get_mut(), incoming) {
                (Value::Map(existing), Value::Map(nested)) => merge_into(existing, nested),
                (existing, incoming) => *existing = deep_clone(incoming),
            },
            Entry::Vacant(slot) => {
                slot.insert(deep_clone(incoming));
            }
        }
    }
}

fn clone_map(map: &Map) -> Map {
    map.iter().map(|(k, v)| (k.clone(), deep_clone(v))).collect()
}

/// True iff `value` is a record (not a sequence, not null, not a scalar).
#[must_use]
pub fn is_plain_object(value: &Value) -> bool {
    matches!(value, Value::Map(_))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
