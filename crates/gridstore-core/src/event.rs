#![forbid(unsafe_code)]

//! Keyboard events as delivered by the host environment.
//!
//! Only the logical key and two modifier flags are needed to recognise
//! history chords. `ctrl_or_meta` folds Control (Linux/Windows) and
//! Command (macOS) into one flag.

use std::fmt;

/// A raw key-down event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    /// Logical key as reported by the environment (`"z"`, `"Z"`, `"Enter"`).
    pub key: String,
    /// Control or Meta/Command held.
    pub ctrl_or_meta: bool,
    /// Shift held.
    pub shift: bool,
}

impl KeyEvent {
    /// A key press with no modifiers.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl_or_meta: false,
            shift: false,
        }
    }

    /// A key press with Control/Meta held.
    #[must_use]
    pub fn ctrl(key: impl Into<String>) -> Self {
        Self::new(key).with_ctrl_or_meta(true)
    }

    #[must_use]
    pub fn with_ctrl_or_meta(mut self, held: bool) -> Self {
        self.ctrl_or_meta = held;
        self
    }

    #[must_use]
    pub fn with_shift(mut self, held: bool) -> Self {
        self.shift = held;
        self
    }

    /// Key compared case-insensitively.
    ///
    /// Environments report `"Z"` rather than `"z"` while Shift is held.
    #[must_use]
    pub fn key_matches(&self, key: &str) -> bool {
        self.key.eq_ignore_ascii_case(key)
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl_or_meta {
            f.write_str("Ctrl+")?;
        }
        if self.shift {
            f.write_str("Shift+")?;
        }
        if self.key.chars().count() == 1 {
            write!(f, "{}", self.key.to_uppercase())
        } else {
            f.write_str(&self.key)
        }
    }
}
