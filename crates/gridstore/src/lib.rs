#![forbid(unsafe_code)]

//! gridstore public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.

pub use gridstore_core::{KeyEvent, Value};
pub use gridstore_runtime::{Store, StoreError, Update};

pub mod prelude {
    pub use gridstore_core as core;
    pub use gridstore_runtime as runtime;
    #[cfg(feature = "table")]
    pub use gridstore_table as table;

    pub use gridstore_core::{KeyEvent, Value};
    pub use gridstore_runtime::{
        Action, HistoryConfig, HistoryKeymap, KeyRouter, MemoryStorage, NotifyMode, PersistSpec,
        SerdeState, Store, StoreState, Subscription, Update, bind_history_keys, scope,
    };
}
