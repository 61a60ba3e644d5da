#![forbid(unsafe_code)]

//! The four update shapes accepted by [`Store::set`](super::Store::set).

use std::fmt;
use std::rc::Rc;

use gridstore_core::Value;
use serde::{Deserialize, Serialize};

/// A named action interpreted by a reducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl Action {
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Value::Null,
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self
    }

    /// The action as plain data: `{kind, payload}`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::map([
            ("kind", Value::from(self.kind.as_str())),
            ("payload", self.payload.clone()),
        ])
    }
}

/// Applies an action to a mutable draft of the state.
pub type Reducer<T> = Rc<dyn Fn(&mut T, &Action)>;

/// Mutator over a draft. Returning `Some` replaces the draft.
pub type Mutator<'a, T> = Box<dyn FnOnce(&mut T) -> Option<T> + 'a>;

/// One state update.
pub enum Update<'a, T> {
    /// Use this value as the next state.
    Replace(T),
    /// Structurally merge this partial into a record state. Replaces
    /// non-record states.
    Merge(Value),
    /// Run a mutator over a private draft of the current state.
    Mutate(Mutator<'a, T>),
    /// Hand an action to the configured reducer.
    Dispatch(Action),
}

impl<'a, T> Update<'a, T> {
    #[must_use]
    pub fn replace(value: T) -> Self {
        Self::Replace(value)
    }

    #[must_use]
    pub fn merge(partial: impl Into<Value>) -> Self {
        Self::Merge(partial.into())
    }

    /// Mutate the draft in place.
    #[must_use]
    pub fn mutate(f: impl FnOnce(&mut T) + 'a) -> Self {
        Self::Mutate(Box::new(move |draft| {
            f(draft);
            None
        }))
    }

    /// Mutate the draft, or return a replacement.
    #[must_use]
    pub fn mutate_with(f: impl FnOnce(&mut T) -> Option<T> + 'a) -> Self {
        Self::Mutate(Box::new(f))
    }

    #[must_use]
    pub fn dispatch(action: Action) -> Self {
        Self::Dispatch(action)
    }

    /// Short tag for diagnostics.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Replace(_) => "replace",
            Self::Merge(_) => "merge",
            Self::Mutate(_) => "mutate",
            Self::Dispatch(_) => "dispatch",
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Update<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace(v) => f.debug_tuple("Replace").field(v).finish(),
            Self::Merge(p) => f.debug_tuple("Merge").field(p).finish(),
            Self::Mutate(_) => f.write_str("Mutate(..)"),
            Self::Dispatch(a) => f.debug_tuple("Dispatch").field(a).finish(),
        }
    }
}
