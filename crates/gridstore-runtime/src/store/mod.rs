#![forbid(unsafe_code)]

//! The versioned observable store.
//!
//! A [`Store<T>`] owns one value of `T` and applies [`Update`]s to it. Every
//! update that produces a structurally different value is an *accepted
//! change*: it becomes the live value, is mirrored to persistence, schedules
//! a debounced history snapshot, and notifies listeners.
//!
//! # Architecture
//!
//! `Store<T>` is a cheap handle over `Rc<..>` shared state, single-threaded
//! like the rest of the runtime. The live value is an `Rc<T>` that is never
//! mutated in place: readers get the `Rc` itself, and every change swaps in a
//! new allocation (copy-on-write). Mutators and reducers only ever see a
//! private draft.
//!
//! Deferred work (the history snapshot, deferred notifications) is owned by
//! the store and advanced by [`Store::poll`], which the host calls from its
//! event loop.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per accepted change, undo, redo,
//!    rollback, or reset.
//! 2. Listeners are notified in registration order, once per accepted change
//!    (immediate mode) or once per flush (deferred mode).
//! 3. An update producing a structurally equal value is a no-op: no version
//!    bump, no persistence write, no history scheduling, no notification.
//! 4. A burst of changes closer together than the debounce window produces
//!    one history snapshot holding the burst's final value.
//! 5. After [`Store::dispose`] no timer fires and no listener runs.
//!
//! # Example
//!
//! ```
//! use gridstore_core::Value;
//! use gridstore_runtime::store::{Store, Update};
//!
//! let store = Store::new(Value::map([("columnVisibility", Value::empty_map())]));
//! let changed = store
//!     .set(Update::merge(Value::map([(
//!         "columnVisibility",
//!         Value::map([("id", false)]),
//!     )])))
//!     .unwrap();
//! assert!(changed);
//! assert_eq!(
//!     store.get().pointer(["columnVisibility", "id"]),
//!     Some(&Value::Bool(false))
//! );
//! ```

mod subscribers;
pub mod update;

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use gridstore_core::clock::{Clock, SystemClock};
use gridstore_core::{Value, deep_merge, is_plain_object};
use tracing::{debug, trace, warn};

use crate::error::{Result, StoreError};
use crate::persist::{PersistSpec, Persistence, Storage};
use crate::state::StoreState;
use crate::undo::debounce::Debouncer;
use crate::undo::history::{History, HistoryConfig};

pub use subscribers::{Listener, Subscription};
pub use update::{Action, Mutator, Reducer, Update};

use subscribers::Subscribers;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// When listeners run relative to the change that triggered them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyMode {
    /// Synchronously, inside `set`.
    #[default]
    Immediate,
    /// Once, at the next [`Store::poll`] or [`Store::flush_notifications`].
    Deferred,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// History recording. `None` disables undo/redo entirely.
    pub history: Option<HistoryConfig>,
    /// Notification timing.
    pub notify: NotifyMode,
    /// Reject actions dispatched without a reducer instead of treating them
    /// as plain data.
    pub strict_actions: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history: Some(HistoryConfig::default()),
            notify: NotifyMode::Immediate,
            strict_actions: false,
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn with_history(mut self, history: HistoryConfig) -> Self {
        self.history = Some(history);
        self
    }

    #[must_use]
    pub fn without_history(mut self) -> Self {
        self.history = None;
        self
    }

    #[must_use]
    pub fn with_notify(mut self, notify: NotifyMode) -> Self {
        self.notify = notify;
        self
    }

    #[must_use]
    pub fn with_strict_actions(mut self, strict: bool) -> Self {
        self.strict_actions = strict;
        self
    }
}

/// What one [`Store::poll`] accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollOutcome {
    /// A debounced history snapshot was recorded.
    pub snapshot_recorded: bool,
    /// Deferred listeners were run.
    pub listeners_notified: bool,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct Core<T> {
    value: Rc<T>,
    version: u64,
    history: Option<History<T>>,
    debouncer: Option<Debouncer>,
    notify_pending: bool,
    disposed: bool,
    persist_failures: u64,
}

struct StoreInner<T> {
    core: RefCell<Core<T>>,
    subscribers: RefCell<Subscribers<T>>,
    /// The constructor's value, before hydration.
    initial: Rc<T>,
    reducer: Option<Reducer<T>>,
    persistence: Option<Persistence>,
    clock: Rc<dyn Clock>,
    config: StoreConfig,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for a [`Store`].
pub struct StoreBuilder<T> {
    initial: T,
    config: StoreConfig,
    reducer: Option<Reducer<T>>,
    persistence: Option<Persistence>,
    clock: Option<Rc<dyn Clock>>,
}

impl<T: StoreState> StoreBuilder<T> {
    #[must_use]
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn history(mut self, history: HistoryConfig) -> Self {
        self.config.history = Some(history);
        self
    }

    #[must_use]
    pub fn without_history(mut self) -> Self {
        self.config.history = None;
        self
    }

    #[must_use]
    pub fn notify(mut self, notify: NotifyMode) -> Self {
        self.config.notify = notify;
        self
    }

    #[must_use]
    pub fn strict_actions(mut self, strict: bool) -> Self {
        self.config.strict_actions = strict;
        self
    }

    /// Interpret [`Update::Dispatch`] actions with `reducer`.
    #[must_use]
    pub fn reducer(mut self, reducer: impl Fn(&mut T, &Action) + 'static) -> Self {
        self.reducer = Some(Rc::new(reducer));
        self
    }

    /// Hydrate from and mirror to `storage` under `spec`.
    #[must_use]
    pub fn persist(self, spec: PersistSpec, storage: impl Storage + 'static) -> Self {
        self.persist_shared(spec, Rc::new(storage))
    }

    /// Like [`persist`](Self::persist) with an already shared backend.
    #[must_use]
    pub fn persist_shared(mut self, spec: PersistSpec, storage: Rc<dyn Storage>) -> Self {
        self.persistence = Some(Persistence::new(spec, storage));
        self
    }

    /// Time source for the debounce window.
    #[must_use]
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Rc::new(clock));
        self
    }

    #[must_use]
    pub fn build(self) -> Store<T> {
        let value = match &self.persistence {
            Some(p) => p.hydrate(&self.initial).into_value(),
            None => self.initial.clone(),
        };
        let value = Rc::new(value);
        let history = self
            .config
            .history
            .map(|cfg| History::new(Rc::clone(&value), cfg.capacity));
        let debouncer = self.config.history.map(|cfg| Debouncer::new(cfg.debounce));

        Store {
            inner: Rc::new(StoreInner {
                core: RefCell::new(Core {
                    value,
                    version: 0,
                    history,
                    debouncer,
                    notify_pending: false,
                    disposed: false,
                    persist_failures: 0,
                }),
                subscribers: RefCell::new(Subscribers::new()),
                initial: Rc::new(self.initial),
                reducer: self.reducer,
                persistence: self.persistence,
                clock: self.clock.unwrap_or_else(|| Rc::new(SystemClock)),
                config: self.config,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// A versioned observable store over `T`.
///
/// Cloning a `Store` creates a new handle to the **same** state.
pub struct Store<T> {
    inner: Rc<StoreInner<T>>,
}

/// Non-owning handle to a [`Store`].
pub struct WeakStore<T> {
    inner: Weak<StoreInner<T>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Clone for WeakStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> WeakStore<T> {
    #[must_use]
    pub fn upgrade(&self) -> Option<Store<T>> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

impl<T: StoreState> Store<T> {
    /// A store with default configuration: history on, immediate
    /// notification, no persistence.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self::builder(initial).build()
    }

    #[must_use]
    pub fn builder(initial: T) -> StoreBuilder<T> {
        StoreBuilder {
            initial,
            config: StoreConfig::default(),
            reducer: None,
            persistence: None,
            clock: None,
        }
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// The live value. Never mutated after it is handed out.
    #[must_use]
    pub fn get(&self) -> Rc<T> {
        Rc::clone(&self.inner.core.borrow().value)
    }

    /// Access the live value by reference.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.get();
        f(&value)
    }

    /// The constructor's value, before hydration.
    #[must_use]
    pub fn initial(&self) -> Rc<T> {
        Rc::clone(&self.inner.initial)
    }

    /// Monotonic change counter.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.core.borrow().version
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.core.borrow().disposed
    }

    /// Number of mirror writes that failed since construction.
    #[must_use]
    pub fn persist_failures(&self) -> u64 {
        self.inner.core.borrow().persist_failures
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakStore<T> {
        WeakStore {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same store.
    #[must_use]
    pub fn ptr_eq(&self, other: &Store<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Apply `update`.
    ///
    /// Returns `Ok(true)` for an accepted change and `Ok(false)` when the
    /// resolved value equals the current one.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Disposed`] after [`dispose`](Self::dispose).
    /// - [`StoreError::MissingReducer`] for a dispatch without reducer when
    ///   strict actions are on.
    /// - [`StoreError::Structural`] when a merge result does not decode into
    ///   `T`. The store is left untouched.
    pub fn set(&self, update: Update<'_, T>) -> Result<bool> {
        if self.is_disposed() {
            return Err(StoreError::Disposed);
        }
        let tag = update.tag();
        let current = self.get();
        let next = self.resolve(&current, update)?;

        if *current == next {
            trace!(message = "store.set_noop", tag, version = self.version());
            return Ok(false);
        }

        self.commit(Rc::new(next), true);
        debug!(message = "store.set", tag, version = self.version());
        Ok(true)
    }

    /// Shorthand for [`Update::Replace`].
    pub fn replace(&self, value: T) -> Result<bool> {
        self.set(Update::Replace(value))
    }

    /// Shorthand for [`Update::Merge`].
    pub fn merge(&self, partial: impl Into<Value>) -> Result<bool> {
        self.set(Update::merge(partial))
    }

    /// Shorthand for an in-place [`Update::Mutate`].
    pub fn mutate(&self, f: impl FnOnce(&mut T)) -> Result<bool> {
        self.set(Update::mutate(f))
    }

    /// Shorthand for [`Update::Dispatch`].
    pub fn dispatch(&self, action: Action) -> Result<bool> {
        self.set(Update::Dispatch(action))
    }

    fn resolve(&self, current: &T, update: Update<'_, T>) -> Result<T> {
        match update {
            Update::Replace(value) => Ok(value),
            Update::Mutate(f) => {
                let mut draft = current.clone();
                Ok(f(&mut draft).unwrap_or(draft))
            }
            Update::Dispatch(action) => match &self.inner.reducer {
                Some(reducer) => {
                    let mut draft = current.clone();
                    reducer(&mut draft, &action);
                    Ok(draft)
                }
                None if self.inner.config.strict_actions => {
                    Err(StoreError::MissingReducer { kind: action.kind })
                }
                None => {
                    warn!(message = "store.action_without_reducer", kind = %action.kind);
                    self.merge_or_replace(current, action.to_value())
                }
            },
            Update::Merge(partial) => self.merge_or_replace(current, partial),
        }
    }

    fn merge_or_replace(&self, current: &T, partial: Value) -> Result<T> {
        let base = current.to_structural()?;
        let next = if is_plain_object(&base) {
            deep_merge(&base, &partial)
        } else {
            partial
        };
        Ok(T::from_structural(next)?)
    }

    /// Install `next` as the live value, then persist and notify.
    fn commit(&self, next: Rc<T>, schedule_snapshot: bool) {
        let version = {
            let mut core = self.inner.core.borrow_mut();
            core.value = Rc::clone(&next);
            core.version += 1;
            if schedule_snapshot && let Some(debouncer) = core.debouncer.as_mut() {
                debouncer.schedule(self.inner.clock.now());
            }
            core.version
        };
        self.mirror(&next);
        match self.inner.config.notify {
            NotifyMode::Immediate => self.deliver(&next, version),
            NotifyMode::Deferred => self.inner.core.borrow_mut().notify_pending = true,
        }
    }

    fn mirror(&self, value: &T) {
        let Some(persistence) = &self.inner.persistence else {
            return;
        };
        if let Err(err) = persistence.mirror(value) {
            let failures = {
                let mut core = self.inner.core.borrow_mut();
                core.persist_failures += 1;
                core.persist_failures
            };
            warn!(
                message = "persist.write_failed",
                key = %persistence.spec().key,
                failures,
                error = %err
            );
        }
    }

    /// Run listeners for the change that produced `version`.
    ///
    /// A listener that writes to the store starts a newer delivery; the
    /// remaining listeners then get the newer value from it, never the stale
    /// one from this loop.
    fn deliver(&self, value: &T, version: u64) {
        let listeners = self.inner.subscribers.borrow().snapshot();
        trace!(message = "store.notify", listeners = listeners.len(), version);
        for listener in listeners {
            listener(value);
            if self.version() != version {
                trace!(message = "store.notify_superseded", version);
                return;
            }
        }
    }

    // ── Subscriptions ───────────────────────────────────────────────

    /// Register `listener` for accepted changes.
    ///
    /// Registering the same `Rc` twice shares one registration. After
    /// disposal this returns an inert subscription.
    pub fn subscribe(&self, listener: Listener<T>) -> Subscription {
        if self.is_disposed() {
            return Subscription::inert();
        }
        let id = self.inner.subscribers.borrow_mut().add(listener);
        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.subscribers.borrow_mut().remove(id);
            }
        })
    }

    /// Register a closure as a listener.
    pub fn subscribe_fn(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        self.subscribe(Rc::new(listener))
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    // ── Scheduling ──────────────────────────────────────────────────

    /// Cooperative tick: record a due history snapshot and run deferred
    /// listeners.
    pub fn poll(&self) -> PollOutcome {
        let now = self.inner.clock.now();
        let snapshot_recorded = {
            let mut core = self.inner.core.borrow_mut();
            let core = &mut *core;
            let due = core.debouncer.as_mut().is_some_and(|d| d.take_due(now));
            due && Self::record_snapshot(core)
        };
        let listeners_notified = self.flush_notifications();
        PollOutcome {
            snapshot_recorded,
            listeners_notified,
        }
    }

    /// Record a pending history snapshot now, ignoring the debounce window.
    pub fn flush_history(&self) -> bool {
        let mut core = self.inner.core.borrow_mut();
        let core = &mut *core;
        let pending = core.debouncer.as_mut().is_some_and(Debouncer::take_pending);
        pending && Self::record_snapshot(core)
    }

    /// Run deferred listeners if a change is waiting.
    pub fn flush_notifications(&self) -> bool {
        let pending = std::mem::take(&mut self.inner.core.borrow_mut().notify_pending);
        if pending {
            self.deliver(&self.get(), self.version());
        }
        pending
    }

    /// Whether a history snapshot is waiting for its debounce window.
    #[must_use]
    pub fn has_pending_snapshot(&self) -> bool {
        self.inner
            .core
            .borrow()
            .debouncer
            .as_ref()
            .is_some_and(Debouncer::is_pending)
    }

    fn record_snapshot(core: &mut Core<T>) -> bool {
        let snapshot = Rc::clone(&core.value);
        match core.history.as_mut() {
            Some(history) => {
                history.push(snapshot);
                true
            }
            None => false,
        }
    }

    // ── History ─────────────────────────────────────────────────────

    /// Step back one snapshot. No-op at the oldest snapshot.
    pub fn undo(&self) -> bool {
        self.travel("undo", History::undo)
    }

    /// Step forward one snapshot. No-op at the newest snapshot.
    pub fn redo(&self) -> bool {
        self.travel("redo", History::redo)
    }

    /// Jump to snapshot `index`. Out-of-range indices are a no-op.
    pub fn rollback_to(&self, index: usize) -> bool {
        self.travel("rollback", |h| h.rollback_to(index))
    }

    fn travel(&self, op: &'static str, step: impl FnOnce(&mut History<T>) -> Option<Rc<T>>) -> bool {
        if self.is_disposed() {
            return false;
        }
        // A change still inside its debounce window is recorded first so it
        // stays reachable by redo.
        self.flush_history();
        let moved = {
            let mut core = self.inner.core.borrow_mut();
            core.history
                .as_mut()
                .and_then(|h| step(h).map(|target| (target, h.cursor())))
        };
        let Some((target, cursor)) = moved else {
            trace!(message = "history.travel_noop", op);
            return false;
        };
        debug!(message = "history.travel", op, cursor);
        self.commit(target, false);
        true
    }

    /// Restore the constructor's value and collapse history to it.
    ///
    /// Always notifies, even if the live value already equals the initial
    /// one. Returns `false` only after disposal.
    pub fn reset(&self) -> bool {
        if self.is_disposed() {
            return false;
        }
        let initial = Rc::clone(&self.inner.initial);
        {
            let mut core = self.inner.core.borrow_mut();
            if let Some(debouncer) = core.debouncer.as_mut() {
                debouncer.cancel();
            }
            if let Some(history) = core.history.as_mut() {
                history.reset(Rc::clone(&initial));
            }
        }
        debug!(message = "store.reset");
        self.commit(initial, false);
        true
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.inner
            .core
            .borrow()
            .history
            .as_ref()
            .is_some_and(History::can_undo)
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.inner
            .core
            .borrow()
            .history
            .as_ref()
            .is_some_and(History::can_redo)
    }

    /// Number of recorded snapshots (0 without history).
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.inner.core.borrow().history.as_ref().map_or(0, History::len)
    }

    /// Cursor into the history, if history is enabled.
    #[must_use]
    pub fn history_cursor(&self) -> Option<usize> {
        self.inner.core.borrow().history.as_ref().map(History::cursor)
    }

    /// All recorded snapshots, oldest first.
    #[must_use]
    pub fn history_entries(&self) -> Vec<Rc<T>> {
        self.inner
            .core
            .borrow()
            .history
            .as_ref()
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Cancel pending work and drop every listener.
    ///
    /// The last value stays readable. Further writes fail with
    /// [`StoreError::Disposed`]; history travel becomes a no-op.
    pub fn dispose(&self) {
        {
            let mut core = self.inner.core.borrow_mut();
            if core.disposed {
                return;
            }
            core.disposed = true;
            core.notify_pending = false;
            if let Some(debouncer) = core.debouncer.as_mut() {
                debouncer.cancel();
            }
        }
        self.inner.subscribers.borrow_mut().clear();
        debug!(message = "store.dispose");
    }
}

impl<T: fmt::Debug> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.core.borrow();
        f.debug_struct("Store")
            .field("value", &core.value)
            .field("version", &core.version)
            .field("history", &core.history)
            .field("disposed", &core.disposed)
            .field("subscribers", &self.inner.subscribers.borrow().len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryStorage;
    use gridstore_core::clock::LabClock;
    use serde::{Deserialize, Serialize};
    use std::cell::Cell;
    use tracing_test::traced_test;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        count: i64,
    }

    impl crate::state::SerdeState for Counter {}

    fn counter_store(clock: &LabClock) -> Store<Counter> {
        Store::builder(Counter { count: 5 })
            .clock(clock.clone())
            .build()
    }

    fn notifications<T: StoreState>(store: &Store<T>) -> (Rc<Cell<u32>>, Subscription) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let sub = store.subscribe_fn(move |_| c.set(c.get() + 1));
        (count, sub)
    }

    #[test]
    fn mutate_in_place_increments() {
        let clock = LabClock::new();
        let store = counter_store(&clock);
        let (count, _sub) = notifications(&store);

        assert!(store.mutate(|d| d.count += 1).unwrap());
        assert_eq!(store.get().count, 6);
        assert_eq!(count.get(), 1);
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn mutate_with_replacement_wins_over_draft() {
        let store = Store::new(Counter { count: 1 });
        let changed = store
            .set(Update::mutate_with(|d: &mut Counter| {
                d.count = 100;
                Some(Counter { count: 2 })
            }))
            .unwrap();
        assert!(changed);
        assert_eq!(store.get().count, 2);
    }

    #[test]
    fn scalar_state_mutator() {
        let store = Store::new(10i64);
        store.set(Update::mutate_with(|n: &mut i64| Some(*n * 2))).unwrap();
        assert_eq!(*store.get(), 20);
        store.mutate(|n| *n -= 1).unwrap();
        assert_eq!(*store.get(), 19);
    }

    #[test]
    fn structurally_equal_set_is_noop() {
        let store = Store::new(Value::map([("a", Value::map([("b", 1)]))]));
        let (count, _sub) = notifications(&store);
        let copy = Value::clone(&store.get());
        assert!(!store.replace(copy).unwrap());
        assert!(!store.merge(Value::map([("a", Value::map([("b", 1)]))])).unwrap());
        assert_eq!(count.get(), 0);
        assert_eq!(store.version(), 0);
        assert!(!store.has_pending_snapshot());
    }

    #[test]
    fn merge_on_record_state() {
        let store = Store::new(Value::map([("columnVisibility", Value::empty_map())]));
        store
            .merge(Value::map([("columnVisibility", Value::map([("id", false)]))]))
            .unwrap();
        assert_eq!(
            *store.get(),
            Value::map([("columnVisibility", Value::map([("id", false)]))])
        );
    }

    #[test]
    fn merge_on_scalar_state_replaces() {
        let store = Store::new(Value::from(1));
        store.merge(Value::from("two")).unwrap();
        assert_eq!(*store.get(), Value::from("two"));
    }

    #[test]
    fn merge_on_list_state_replaces() {
        let store = Store::new(Value::list([1, 2]));
        store.merge(Value::list([3])).unwrap();
        assert_eq!(*store.get(), Value::list([3]));
    }

    #[test]
    fn merge_that_breaks_typed_shape_is_rejected() {
        let store = Store::new(Counter { count: 1 });
        let err = store.merge(Value::map([("count", "lots")])).unwrap_err();
        assert!(matches!(err, StoreError::Structural(_)));
        assert_eq!(store.get().count, 1);
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn typed_merge_applies() {
        let store = Store::new(Counter { count: 1 });
        assert!(store.merge(Value::map([("count", 9)])).unwrap());
        assert_eq!(store.get().count, 9);
    }

    #[test]
    fn dispatch_runs_reducer_on_draft() {
        let store = Store::builder(Counter { count: 0 })
            .reducer(|draft, action| match action.kind.as_str() {
                "add" => draft.count += action.payload.as_i64().unwrap_or(0),
                "clear" => draft.count = 0,
                _ => {}
            })
            .build();
        store.dispatch(Action::new("add").with_payload(3)).unwrap();
        store.dispatch(Action::new("add").with_payload(4)).unwrap();
        assert_eq!(store.get().count, 7);
        assert!(!store.dispatch(Action::new("unknown")).unwrap());
        store.dispatch(Action::new("clear")).unwrap();
        assert_eq!(store.get().count, 0);
    }

    #[test]
    fn dispatch_without_reducer_falls_through_to_merge() {
        let store = Store::new(Value::map([("count", 1)]));
        store.dispatch(Action::new("bump").with_payload(2)).unwrap();
        assert_eq!(
            *store.get(),
            Value::map([
                ("count", Value::from(1)),
                ("kind", Value::from("bump")),
                ("payload", Value::from(2)),
            ])
        );
    }

    #[test]
    fn strict_actions_reject_missing_reducer() {
        let store = Store::builder(Value::map([("count", 1)]))
            .strict_actions(true)
            .build();
        let err = store.dispatch(Action::new("bump")).unwrap_err();
        assert!(matches!(err, StoreError::MissingReducer { ref kind } if kind == "bump"));
        assert!(err.is_misuse());
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn live_value_is_copy_on_write() {
        let store = Store::new(Counter { count: 1 });
        let before = store.get();
        store.mutate(|d| d.count = 2).unwrap();
        assert_eq!(before.count, 1);
        assert_eq!(store.get().count, 2);
        assert!(!Rc::ptr_eq(&before, &store.get()));
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let store = Store::new(0i64);
        let log = Rc::new(RefCell::new(Vec::new()));
        let subs: Vec<_> = (0..3)
            .map(|i| {
                let log = Rc::clone(&log);
                store.subscribe_fn(move |v: &i64| log.borrow_mut().push((i, *v)))
            })
            .collect();
        store.replace(7).unwrap();
        assert_eq!(*log.borrow(), vec![(0, 7), (1, 7), (2, 7)]);
        drop(subs);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn same_listener_registered_twice_fires_once() {
        let store = Store::new(0i64);
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let listener: Listener<i64> = Rc::new(move |_| c.set(c.get() + 1));
        let a = store.subscribe(Rc::clone(&listener));
        let b = store.subscribe(listener);
        assert_eq!(store.subscriber_count(), 1);
        store.replace(1).unwrap();
        assert_eq!(count.get(), 1);
        a.unsubscribe();
        b.unsubscribe();
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn listener_may_read_store_during_notification() {
        let store = Store::new(0i64);
        let seen = Rc::new(Cell::new(-1));
        let s = store.clone();
        let seen2 = Rc::clone(&seen);
        let _sub = store.subscribe_fn(move |_| seen2.set(*s.get()));
        store.replace(42).unwrap();
        assert_eq!(seen.get(), 42);
    }

    #[test]
    fn debounce_coalesces_burst_into_one_snapshot() {
        let clock = LabClock::new();
        let store = counter_store(&clock);
        for _ in 0..10 {
            store.mutate(|d| d.count += 1).unwrap();
            clock.advance_ms(50);
            assert!(!store.poll().snapshot_recorded);
        }
        assert_eq!(store.history_len(), 1);
        clock.advance_ms(200);
        assert!(store.poll().snapshot_recorded);
        assert_eq!(store.history_len(), 2);
        assert_eq!(store.history_entries()[1].count, 15);
        assert!(!store.poll().snapshot_recorded);
    }

    #[test]
    fn burst_returning_to_start_still_records_and_drops_redo() {
        let clock = LabClock::new();
        let store = counter_store(&clock);
        store.mutate(|d| d.count = 6).unwrap();
        store.flush_history();
        store.undo();
        assert!(store.can_redo());

        store.mutate(|d| d.count = 1).unwrap();
        store.mutate(|d| d.count = 5).unwrap();
        clock.advance_ms(250);
        assert!(store.poll().snapshot_recorded);

        let counts: Vec<_> = store.history_entries().iter().map(|c| c.count).collect();
        assert_eq!(counts, vec![5, 5]);
        assert!(!store.can_redo());
    }

    #[test]
    fn write_from_listener_supersedes_outer_delivery() {
        let store = Store::new(0i64);
        let s = store.clone();
        let _writer = store.subscribe_fn(move |v: &i64| {
            if *v == 1 {
                s.replace(2).unwrap();
            }
        });
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let _reader = store.subscribe_fn(move |v: &i64| log.borrow_mut().push(*v));

        store.replace(1).unwrap();
        assert_eq!(*store.get(), 2);
        assert_eq!(store.version(), 2);
        assert_eq!(*seen.borrow(), vec![2]);
    }

    #[test]
    fn earlier_listeners_see_changes_in_order() {
        let store = Store::new(0i64);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let _reader = store.subscribe_fn(move |v: &i64| log.borrow_mut().push(*v));
        let s = store.clone();
        let _writer = store.subscribe_fn(move |v: &i64| {
            if *v == 1 {
                s.replace(2).unwrap();
            }
        });

        store.replace(1).unwrap();
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn undo_redo_round_trip() {
        let clock = LabClock::new();
        let store = counter_store(&clock);
        store.mutate(|d| d.count = 9).unwrap();
        clock.advance_ms(200);
        store.poll();

        let (count, _sub) = notifications(&store);
        assert!(store.undo());
        assert_eq!(store.get().count, 5);
        assert!(!store.undo());
        assert!(store.redo());
        assert_eq!(store.get().count, 9);
        assert!(!store.redo());
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn undo_flushes_pending_snapshot_first() {
        let clock = LabClock::new();
        let store = counter_store(&clock);
        store.mutate(|d| d.count = 6).unwrap();
        assert!(store.has_pending_snapshot());
        assert!(store.undo());
        assert_eq!(store.get().count, 5);
        assert!(store.redo());
        assert_eq!(store.get().count, 6);
    }

    #[test]
    fn write_after_undo_discards_redo_branch() {
        let clock = LabClock::new();
        let store = counter_store(&clock);
        store.mutate(|d| d.count = 6).unwrap();
        store.flush_history();
        store.mutate(|d| d.count = 7).unwrap();
        store.flush_history();
        store.undo();
        store.mutate(|d| d.count = 100).unwrap();
        store.flush_history();
        assert!(!store.can_redo());
        let counts: Vec<_> = store.history_entries().iter().map(|c| c.count).collect();
        assert_eq!(counts, vec![5, 6, 100]);
    }

    #[test]
    fn rollback_to_index() {
        let clock = LabClock::new();
        let store = counter_store(&clock);
        for n in [6, 7, 8] {
            store.mutate(|d| d.count = n).unwrap();
            store.flush_history();
        }
        assert!(store.rollback_to(1));
        assert_eq!(store.get().count, 6);
        assert_eq!(store.history_cursor(), Some(1));
        assert!(!store.rollback_to(99));
        assert_eq!(store.get().count, 6);
    }

    #[test]
    fn reset_restores_initial_and_cancels_timer() {
        let clock = LabClock::new();
        let store = counter_store(&clock);
        store.mutate(|d| d.count = 6).unwrap();
        store.flush_history();
        store.mutate(|d| d.count = 7).unwrap();
        assert!(store.has_pending_snapshot());

        let (count, _sub) = notifications(&store);
        assert!(store.reset());
        assert_eq!(store.get().count, 5);
        assert_eq!(store.history_len(), 1);
        assert_eq!(store.history_cursor(), Some(0));
        assert!(!store.has_pending_snapshot());
        assert_eq!(count.get(), 1);

        clock.advance_ms(1_000);
        assert!(!store.poll().snapshot_recorded);
        assert_eq!(store.history_len(), 1);
    }

    #[test]
    fn history_is_bounded() {
        let clock = LabClock::new();
        let store = Store::builder(0i64)
            .history(HistoryConfig::default().with_capacity(5))
            .clock(clock.clone())
            .build();
        for n in 1..=20 {
            store.replace(n).unwrap();
            store.flush_history();
        }
        let entries: Vec<i64> = store.history_entries().iter().map(|v| **v).collect();
        assert_eq!(entries, vec![16, 17, 18, 19, 20]);
        assert_eq!(store.history_cursor(), Some(4));
    }

    #[test]
    fn without_history_undo_is_noop() {
        let store = Store::builder(0i64).without_history().build();
        store.replace(1).unwrap();
        assert!(!store.has_pending_snapshot());
        assert!(!store.undo());
        assert_eq!(store.history_len(), 0);
        assert_eq!(store.history_cursor(), None);
        assert_eq!(*store.get(), 1);
    }

    #[test]
    fn deferred_notifications_coalesce() {
        let store = Store::builder(0i64).notify(NotifyMode::Deferred).build();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = store.subscribe_fn(move |v: &i64| s.borrow_mut().push(*v));
        store.replace(1).unwrap();
        store.replace(2).unwrap();
        assert!(seen.borrow().is_empty());
        assert!(store.poll().listeners_notified);
        assert_eq!(*seen.borrow(), vec![2]);
        assert!(!store.flush_notifications());
    }

    #[test]
    fn persistence_mirrors_field_subset() {
        let storage = MemoryStorage::new();
        let store = Store::builder(Value::map([
            ("columnVisibility", Value::empty_map()),
            ("scroll", Value::from(0)),
        ]))
        .persist(
            PersistSpec::new("grid").fields(["columnVisibility"]),
            storage.clone(),
        )
        .build();
        store
            .merge(Value::map([
                ("columnVisibility", Value::map([("id", false)])),
                ("scroll", Value::from(40)),
            ]))
            .unwrap();
        assert_eq!(
            storage.get("grid").as_deref(),
            Some(r#"{"columnVisibility":{"id":false}}"#)
        );
    }

    #[test]
    fn noop_set_does_not_write() {
        let storage = MemoryStorage::new();
        let store = Store::builder(0i64)
            .persist(PersistSpec::new("n"), storage.clone())
            .build();
        store.replace(0).unwrap();
        assert_eq!(storage.write_count(), 0);
        store.replace(1).unwrap();
        assert_eq!(storage.write_count(), 1);
    }

    #[test]
    fn write_failure_is_contained() {
        let storage = MemoryStorage::new();
        storage.set_read_only(true);
        let store = Store::builder(0i64)
            .persist(PersistSpec::new("n"), storage.clone())
            .build();
        assert!(store.replace(1).unwrap());
        assert!(store.replace(2).unwrap());
        assert_eq!(*store.get(), 2);
        assert_eq!(store.persist_failures(), 2);

        storage.set_read_only(false);
        store.replace(3).unwrap();
        assert_eq!(storage.get("n").as_deref(), Some("3"));
        assert_eq!(store.persist_failures(), 2);
    }

    #[test]
    #[traced_test]
    fn write_failure_is_logged_with_key() {
        let storage = MemoryStorage::new();
        storage.set_read_only(true);
        let store = Store::builder(0i64)
            .persist(PersistSpec::new("counter"), storage)
            .build();
        store.replace(1).unwrap();
        assert!(logs_contain("persist.write_failed"));
        assert!(logs_contain("counter"));
    }

    #[test]
    #[traced_test]
    fn reducerless_dispatch_warns() {
        let store = Store::new(Value::empty_map());
        store.dispatch(Action::new("toggle")).unwrap();
        assert!(logs_contain("store.action_without_reducer"));
    }

    #[test]
    fn hydration_seeds_value_but_not_initial() {
        let storage = MemoryStorage::new();
        storage.insert("n", "41");
        let store = Store::builder(0i64)
            .persist(PersistSpec::new("n"), storage)
            .build();
        assert_eq!(*store.get(), 41);
        assert_eq!(*store.initial(), 0);
        assert!(store.reset());
        assert_eq!(*store.get(), 0);
    }

    #[test]
    fn dispose_stops_everything() {
        let clock = LabClock::new();
        let store = counter_store(&clock);
        let (count, sub) = notifications(&store);
        store.mutate(|d| d.count += 1).unwrap();
        store.dispose();

        assert!(matches!(store.replace(Counter { count: 0 }), Err(StoreError::Disposed)));
        clock.advance_ms(1_000);
        assert_eq!(store.poll(), PollOutcome::default());
        assert_eq!(store.history_len(), 1);
        assert!(!store.undo());
        assert_eq!(count.get(), 1);
        assert_eq!(store.get().count, 6);
        assert!(store.is_disposed());
        drop(sub);
        assert!(!store.subscribe_fn(|_| {}).is_active());
    }

    #[test]
    fn weak_handle_does_not_keep_store_alive() {
        let store = Store::new(0i64);
        let weak = store.downgrade();
        assert!(weak.upgrade().is_some_and(|s| s.ptr_eq(&store)));
        drop(store);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn debug_format() {
        let store = Store::new(3i64);
        let dbg = format!("{store:?}");
        assert!(dbg.contains("Store"));
        assert!(dbg.contains("version: 0"));
    }
}
