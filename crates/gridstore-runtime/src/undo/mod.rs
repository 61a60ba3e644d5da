#![forbid(unsafe_code)]

//! Snapshot history for stores.
//!
//! - [`History`]: bounded linear list of immutable snapshots plus a cursor.
//! - [`Debouncer`]: the cancellable deadline that turns a burst of changes
//!   into one snapshot.
//! - [`keymap`]: undo/redo keyboard bindings routed through a [`KeyRouter`].
//!
//! # Invariants
//!
//! 1. `0 <= cursor < len` and `1 <= len <= capacity`.
//! 2. Recording a snapshot discards everything after the cursor.
//! 3. At capacity the oldest snapshot is evicted and the cursor shifts down
//!    with it, so it keeps pointing at the same snapshot.
//! 4. Undo at index 0 and redo at the last index are no-ops.

pub mod debounce;
pub mod history;
pub mod keymap;

pub use debounce::{DebounceState, Debouncer};
pub use history::{DEFAULT_CAPACITY, DEFAULT_DEBOUNCE, History, HistoryConfig, PushOutcome};
pub use keymap::{
    HistoryCommand, HistoryKeymap, KeyBinding, KeyChord, KeyHandler, KeyOutcome, KeyRouter,
    bind_history_keys,
};
