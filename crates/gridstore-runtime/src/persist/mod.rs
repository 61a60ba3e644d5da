#![forbid(unsafe_code)]

//! Selective persistence of store state to a durable key-value layer.
//!
//! On construction the store hydrates from its slot; on every accepted
//! change it mirrors the (optionally field-restricted) value back.
//!
//! # Failure Modes
//!
//! Persistence is best-effort and never fails the caller:
//!
//! - **Hydration**: absent slot, unreadable backend, malformed text, or
//!   content that does not decode into the state type all fall back to the
//!   initial value. Each class is logged with a distinct `reason`.
//! - **Mirroring**: encode or write failures are logged at `WARN` and
//!   counted. The next change tries again.
//!
//! # Format
//!
//! Slots hold compact JSON. With a field list, the slot holds a record of
//! only those top-level keys.

pub mod storage;

use std::fmt;
use std::rc::Rc;

use gridstore_core::{StructuralError, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::state::StoreState;
pub use storage::{MemoryStorage, Storage, StorageError};

#[cfg(feature = "file-storage")]
pub use storage::FileStorage;

/// Which slot to use and which top-level fields to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistSpec {
    /// Slot name in the durable layer.
    pub key: String,
    /// Top-level fields to persist. Empty means the whole value.
    pub fields: Vec<String>,
}

impl PersistSpec {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fields: Vec::new(),
        }
    }

    /// Restrict persistence to these top-level fields.
    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn is_whole_value(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Why a mirror write did not land.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to project state: {0}")]
    Structural(#[from] StructuralError),

    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Why hydration fell back to the initial value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrateFallback {
    /// The slot does not exist.
    Absent,
    /// The backend could not be read.
    ReadFailed,
    /// The slot is not valid JSON.
    Malformed,
    /// The merged content does not decode into the state type.
    DecodeFailed,
}

impl HydrateFallback {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::ReadFailed => "read_failed",
            Self::Malformed => "malformed",
            Self::DecodeFailed => "decode_failed",
        }
    }
}

/// Result of hydration.
#[derive(Debug, Clone, PartialEq)]
pub enum Hydrated<T> {
    /// Stored content was overlaid onto the initial value.
    Restored(T),
    /// The initial value is used as-is.
    Fallback(T, HydrateFallback),
}

impl<T> Hydrated<T> {
    #[must_use]
    pub fn into_value(self) -> T {
        match self {
            Self::Restored(v) | Self::Fallback(v, _) => v,
        }
    }

    #[must_use]
    pub fn is_restored(&self) -> bool {
        matches!(self, Self::Restored(_))
    }
}

/// A [`PersistSpec`] bound to a backend.
#[derive(Clone)]
pub struct Persistence {
    spec: PersistSpec,
    storage: Rc<dyn Storage>,
}

impl Persistence {
    #[must_use]
    pub fn new(spec: PersistSpec, storage: Rc<dyn Storage>) -> Self {
        Self { spec, storage }
    }

    #[must_use]
    pub fn spec(&self) -> &PersistSpec {
        &self.spec
    }

    /// Build the starting value from `initial` and the stored slot.
    ///
    /// With a field list only those keys present in the slot are overlaid;
    /// otherwise the whole stored record is overlaid key by key. A stored
    /// non-record replaces a non-record initial value.
    pub fn hydrate<T: StoreState>(&self, initial: &T) -> Hydrated<T> {
        let key = self.spec.key.as_str();
        let fallback = |reason: HydrateFallback| Hydrated::Fallback(initial.clone(), reason);

        let text = match self.storage.read(key) {
            Ok(Some(text)) => text,
            Ok(None) => {
                debug!(message = "persist.hydrate_fallback", key, reason = "absent");
                return fallback(HydrateFallback::Absent);
            }
            Err(err) => {
                warn!(message = "persist.hydrate_fallback", key, reason = "read_failed", error = %err);
                return fallback(HydrateFallback::ReadFailed);
            }
        };

        let stored: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(err) => {
                warn!(message = "persist.hydrate_fallback", key, reason = "malformed", error = %err);
                return fallback(HydrateFallback::Malformed);
            }
        };

        let merged = initial
            .to_structural()
            .map(|base| self.overlay(base, stored))
            .and_then(T::from_structural);

        match merged {
            Ok(value) => {
                debug!(message = "persist.hydrated", key, fields = self.spec.fields.len());
                Hydrated::Restored(value)
            }
            Err(err) => {
                warn!(message = "persist.hydrate_fallback", key, reason = "decode_failed", error = %err);
                fallback(HydrateFallback::DecodeFailed)
            }
        }
    }

    fn overlay(&self, base: Value, stored: Value) -> Value {
        let stored = if self.spec.is_whole_value() {
            stored
        } else {
            stored.pick(&self.spec.fields)
        };
        match (base, stored) {
            (Value::Map(mut base), Value::Map(stored)) => {
                for (key, value) in stored {
                    // Handles are never written; a stored null must not clear one.
                    if value.is_null() && matches!(base.get(&key), Some(Value::Opaque(_))) {
                        continue;
                    }
                    base.insert(key, value);
                }
                Value::Map(base)
            }
            (base, stored) if self.spec.is_whole_value() => {
                if stored.is_null() { base } else { stored }
            }
            (base, _) => base,
        }
    }

    /// Serialize the persisted part of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the state cannot be projected or encoded.
    pub fn encode<T: StoreState>(&self, value: &T) -> Result<String, PersistError> {
        let structural = value.to_structural()?;
        let persisted = if self.spec.is_whole_value() {
            structural
        } else {
            structural.pick(&self.spec.fields)
        };
        Ok(serde_json::to_string(&persisted)?)
    }

    /// Write the persisted part of `value` to the slot.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] on encode or storage failure. Callers log
    /// and continue.
    pub fn mirror<T: StoreState>(&self, value: &T) -> Result<(), PersistError> {
        let text = self.encode(value)?;
        self.storage.write(&self.spec.key, &text)?;
        Ok(())
    }
}

impl fmt::Debug for Persistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persistence")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}
