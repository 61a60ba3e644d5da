#![forbid(unsafe_code)]

//! Core: structural values, deep clone/equal/merge, key events, and clocks.

pub mod clock;
pub mod event;
pub mod structural;
pub mod value;

pub use clock::{Clock, LabClock, SystemClock};
pub use event::KeyEvent;
pub use structural::{
    CloneError, deep_clone, deep_equal, deep_merge, is_plain_object, try_structured_clone,
};
pub use value::{Map, Opaque, StructuralError, Value, ValueKind};
