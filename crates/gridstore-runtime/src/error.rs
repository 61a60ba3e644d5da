#![forbid(unsafe_code)]

use gridstore_core::StructuralError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced to store callers.
///
/// Storage and hydration failures never appear here: they are contained and
/// logged at the persistence boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state is not representable: {0}")]
    Structural(#[from] StructuralError),

    #[error("action `{kind}` dispatched but no reducer is configured")]
    MissingReducer { kind: String },

    #[error("store has been disposed")]
    Disposed,

    #[error("no `{type_name}` store is in scope; wrap the caller in `scope::provide`")]
    Unbound { type_name: &'static str },
}

impl StoreError {
    /// Programmer errors that indicate misuse rather than bad data.
    #[must_use]
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            Self::MissingReducer { .. } | Self::Disposed | Self::Unbound { .. }
        )
    }
}
