#![forbid(unsafe_code)]

//! The [`StoreState`] contract: what a store can own.
//!
//! A store needs two things from its state type beyond `Clone + PartialEq`:
//! a structural projection (for merges, field-subset persistence, and
//! hydration) and the inverse decode.
//!
//! [`Value`] implements it as the identity. Any serde type opts in with an
//! empty marker impl:
//!
//! ```
//! use gridstore_runtime::state::SerdeState;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, PartialEq, Serialize, Deserialize)]
//! struct Counter {
//!     count: i64,
//! }
//!
//! impl SerdeState for Counter {}
//! ```
//!
//! Structural equality of a typed state is its `PartialEq`.

use std::collections::BTreeMap;

use gridstore_core::{StructuralError, Value};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// State that can live inside a [`Store`](crate::store::Store).
pub trait StoreState: Clone + PartialEq + 'static {
    /// Project into a structural value.
    ///
    /// # Errors
    ///
    /// Returns [`StructuralError::Encode`] if the state cannot be encoded.
    fn to_structural(&self) -> Result<Value, StructuralError>;

    /// Decode from a structural value.
    ///
    /// # Errors
    ///
    /// Returns [`StructuralError::Decode`] if `value` does not have the
    /// state's shape.
    fn from_structural(value: Value) -> Result<Self, StructuralError>;
}

impl StoreState for Value {
    fn to_structural(&self) -> Result<Value, StructuralError> {
        Ok(self.clone())
    }

    fn from_structural(value: Value) -> Result<Self, StructuralError> {
        Ok(value)
    }
}

/// Marker for serde types usable as store state.
pub trait SerdeState: Serialize + DeserializeOwned + Clone + PartialEq + 'static {}

impl<T: SerdeState> StoreState for T {
    fn to_structural(&self) -> Result<Value, StructuralError> {
        Value::from_serialize(self)
    }

    fn from_structural(value: Value) -> Result<Self, StructuralError> {
        value.deserialize_into()
    }
}

impl SerdeState for bool {}
impl SerdeState for i32 {}
impl SerdeState for i64 {}
impl SerdeState for u32 {}
impl SerdeState for u64 {}
impl SerdeState for f64 {}
impl SerdeState for String {}
impl<T: SerdeState> SerdeState for Option<T> {}
impl<T: SerdeState> SerdeState for Vec<T> {}
impl<T: SerdeState> SerdeState for BTreeMap<String, T> {}
