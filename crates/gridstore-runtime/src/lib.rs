#![forbid(unsafe_code)]

//! Runtime: the observable store engine, snapshot history, persistence, and
//! derived views.

pub mod error;
pub mod persist;
pub mod reactive;
pub mod scope;
pub mod state;
pub mod store;
pub mod undo;

pub use error::{Result, StoreError};
pub use persist::{
    HydrateFallback, Hydrated, MemoryStorage, PersistError, PersistSpec, Persistence, Storage,
    StorageError,
};
#[cfg(feature = "file-storage")]
pub use persist::FileStorage;
pub use reactive::{Bridge, Selected};
pub use state::{SerdeState, StoreState};
pub use store::{
    Action, Listener, NotifyMode, PollOutcome, Store, StoreBuilder, StoreConfig, Subscription,
    Update, WeakStore,
};
pub use undo::{
    HistoryCommand, HistoryConfig, HistoryKeymap, KeyBinding, KeyChord, KeyOutcome, KeyRouter,
    bind_history_keys,
};
