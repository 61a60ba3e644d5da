#![forbid(unsafe_code)]

//! Derived views over stores.
//!
//! - [`Selected`]: a lazily recomputed, memoized value derived from one or
//!   two stores.
//! - [`Bridge`]: a selected slice packaged for external rendering hosts,
//!   with a stable snapshot, a server snapshot, and slice-level
//!   subscription.
//!
//! # Architecture
//!
//! Both hold strong [`Store`](crate::store::Store) handles and are
//! single-threaded. Staleness is decided by the store version, not by a
//! callback, so reads stay fresh in deferred notification mode.
//!
//! # Invariants
//!
//! 1. A derived read never returns a value older than the last accepted
//!    change.
//! 2. Structurally equal slices are handed out as the same `Rc`.

pub mod bridge;
pub mod selected;

pub use bridge::Bridge;
pub use selected::Selected;
