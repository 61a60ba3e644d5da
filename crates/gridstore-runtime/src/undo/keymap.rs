#![forbid(unsafe_code)]

//! Keyboard bindings for undo and redo.
//!
//! The host owns a [`KeyRouter`] and feeds it every key-down event. A store
//! attaches to it with [`bind_history_keys`]; the returned [`KeyBinding`]
//! detaches on drop.
//!
//! Default chords, with Control and Meta/Command treated alike:
//!
//! | Chord              | Command |
//! |--------------------|---------|
//! | `Ctrl+Z`           | undo    |
//! | `Ctrl+Shift+Z`     | redo    |
//! | `Ctrl+Y`           | redo    |

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use gridstore_core::KeyEvent;
use tracing::debug;

use crate::state::StoreState;
use crate::store::Store;

/// What a history chord asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryCommand {
    Undo,
    Redo,
}

impl HistoryCommand {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Undo => "undo",
            Self::Redo => "redo",
        }
    }
}

/// A key plus exact modifier state. The key compares case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord {
    pub key: String,
    pub ctrl_or_meta: bool,
    pub shift: bool,
}

impl KeyChord {
    /// `Ctrl/Meta + key`, without Shift.
    #[must_use]
    pub fn ctrl(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl_or_meta: true,
            shift: false,
        }
    }

    #[must_use]
    pub fn with_shift(mut self, shift: bool) -> Self {
        self.shift = shift;
        self
    }

    #[must_use]
    pub fn matches(&self, event: &KeyEvent) -> bool {
        event.ctrl_or_meta == self.ctrl_or_meta
            && event.shift == self.shift
            && event.key_matches(&self.key)
    }
}

/// Chord table resolving key events to history commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryKeymap {
    bindings: Vec<(KeyChord, HistoryCommand)>,
}

impl Default for HistoryKeymap {
    fn default() -> Self {
        Self::empty()
            .bind(KeyChord::ctrl("z"), HistoryCommand::Undo)
            .bind(KeyChord::ctrl("z").with_shift(true), HistoryCommand::Redo)
            .bind(KeyChord::ctrl("y"), HistoryCommand::Redo)
    }
}

impl HistoryKeymap {
    /// A keymap with no chords.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Add a chord. Earlier chords win on overlap.
    #[must_use]
    pub fn bind(mut self, chord: KeyChord, command: HistoryCommand) -> Self {
        self.bindings.push((chord, command));
        self
    }

    #[must_use]
    pub fn resolve(&self, event: &KeyEvent) -> Option<HistoryCommand> {
        self.bindings
            .iter()
            .find(|(chord, _)| chord.matches(event))
            .map(|(_, command)| *command)
    }

    #[must_use]
    pub fn bindings(&self) -> &[(KeyChord, HistoryCommand)] {
        &self.bindings
    }
}

/// Whether a handler consumed a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Consumed. The host suppresses the environment's default action.
    Handled,
    Ignored,
}

/// A global key-down handler.
pub type KeyHandler = Rc<dyn Fn(&KeyEvent) -> KeyOutcome>;

#[derive(Default)]
struct RouterInner {
    next_id: u64,
    handlers: Vec<(u64, KeyHandler)>,
}

/// Environment-side registry of global key handlers.
///
/// Cloning creates a new handle to the same registry.
#[derive(Clone, Default)]
pub struct KeyRouter {
    inner: Rc<RefCell<RouterInner>>,
}

impl KeyRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` until the returned binding is detached or dropped.
    pub fn add(&self, handler: impl Fn(&KeyEvent) -> KeyOutcome + 'static) -> KeyBinding {
        let id = {
            let mut inner = self.inner.borrow_mut();
            inner.next_id += 1;
            let id = inner.next_id;
            inner.handlers.push((id, Rc::new(handler)));
            id
        };
        KeyBinding {
            router: Rc::downgrade(&self.inner),
            id: Some(id),
        }
    }

    /// Offer `event` to handlers in registration order until one handles it.
    pub fn dispatch(&self, event: &KeyEvent) -> KeyOutcome {
        let handlers: Vec<KeyHandler> = self
            .inner
            .borrow()
            .handlers
            .iter()
            .map(|(_, h)| Rc::clone(h))
            .collect();
        handlers
            .into_iter()
            .find(|handler| handler(event) == KeyOutcome::Handled)
            .map_or(KeyOutcome::Ignored, |_| KeyOutcome::Handled)
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.inner.borrow().handlers.len()
    }
}

impl fmt::Debug for KeyRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRouter")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

/// Guard for a registered key handler.
#[must_use = "dropping a KeyBinding detaches it immediately"]
pub struct KeyBinding {
    router: Weak<RefCell<RouterInner>>,
    id: Option<u64>,
}

impl KeyBinding {
    /// Remove the handler. Returns `false` if it was already detached.
    pub fn detach(&mut self) -> bool {
        let Some(id) = self.id.take() else {
            return false;
        };
        if let Some(router) = self.router.upgrade() {
            router.borrow_mut().handlers.retain(|(hid, _)| *hid != id);
        }
        true
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.id.is_some() && self.router.strong_count() > 0
    }
}

impl Drop for KeyBinding {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for KeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBinding")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Route history chords from `router` to `store`.
///
/// A matching chord is always reported as handled, even when there is
/// nothing to undo or redo. The binding holds the store weakly.
pub fn bind_history_keys<T: StoreState>(
    router: &KeyRouter,
    store: &Store<T>,
    keymap: HistoryKeymap,
) -> KeyBinding {
    let store = store.downgrade();
    router.add(move |event| {
        let Some(command) = keymap.resolve(event) else {
            return KeyOutcome::Ignored;
        };
        let Some(store) = store.upgrade() else {
            return KeyOutcome::Ignored;
        };
        let moved = match command {
            HistoryCommand::Undo => store.undo(),
            HistoryCommand::Redo => store.redo(),
        };
        debug!(message = "history.key", command = command.as_str(), chord = %event, moved);
        KeyOutcome::Handled
    })
}
