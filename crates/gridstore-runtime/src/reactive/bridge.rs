#![forbid(unsafe_code)]

//! External-subscription bridge for rendering hosts.
//!
//! A host that re-renders on store changes needs three things: a way to
//! subscribe, a snapshot that is stable between changes, and a snapshot for
//! non-interactive (server) rendering. [`Bridge`] provides all three for a
//! selected slice of a store.
//!
//! # Invariants
//!
//! 1. `get_snapshot()` returns the same `Rc` for as long as the selected
//!    slice is structurally unchanged, even across unrelated store changes.
//! 2. `get_server_snapshot()` is computed once from the store's initial
//!    value and never changes.
//! 3. Bridge listeners run only when their slice changes.

use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::state::StoreState;
use crate::store::{Store, Subscription};

type Selector<T, S> = Rc<dyn Fn(&T) -> S>;

struct BridgeInner<T, S> {
    store: Store<T>,
    selector: Selector<T, S>,
    /// Store version and slice from the last snapshot.
    last: RefCell<Option<(u64, Rc<S>)>>,
    server: OnceCell<Rc<S>>,
}

/// A selected view of a store for external subscribers.
///
/// Cloning creates a new handle to the same memo.
pub struct Bridge<T, S> {
    inner: Rc<BridgeInner<T, S>>,
}

impl<T, S> Clone for Bridge<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: StoreState, S: PartialEq + 'static> Bridge<T, S> {
    pub fn new(store: &Store<T>, selector: impl Fn(&T) -> S + 'static) -> Self {
        Self {
            inner: Rc::new(BridgeInner {
                store: store.clone(),
                selector: Rc::new(selector),
                last: RefCell::new(None),
                server: OnceCell::new(),
            }),
        }
    }

    /// The selected slice of the live value.
    ///
    /// Returns the previous `Rc` when the slice is structurally equal to the
    /// last one handed out.
    #[must_use]
    pub fn get_snapshot(&self) -> Rc<S> {
        let version = self.inner.store.version();
        if let Some((seen, slice)) = &*self.inner.last.borrow()
            && *seen == version
        {
            return Rc::clone(slice);
        }

        let next = (self.inner.selector)(&self.inner.store.get());
        let mut last = self.inner.last.borrow_mut();
        let slice = match last.take() {
            Some((_, prev)) if *prev == next => prev,
            _ => Rc::new(next),
        };
        *last = Some((version, Rc::clone(&slice)));
        slice
    }

    /// The slice of the store's initial value, for non-interactive rendering.
    #[must_use]
    pub fn get_server_snapshot(&self) -> Rc<S> {
        let slice = self
            .inner
            .server
            .get_or_init(|| Rc::new((self.inner.selector)(&self.inner.store.initial())));
        Rc::clone(slice)
    }

    /// Run `listener` whenever the selected slice changes.
    pub fn subscribe(&self, listener: impl Fn(&S) + 'static) -> Subscription {
        let selector = Rc::clone(&self.inner.selector);
        let seen = RefCell::new(Some(self.get_snapshot()));
        self.inner.store.subscribe_fn(move |value: &T| {
            let next = selector(value);
            let changed = seen.borrow().as_deref().is_none_or(|prev| *prev != next);
            if changed {
                let next = Rc::new(next);
                *seen.borrow_mut() = Some(Rc::clone(&next));
                listener(&next);
            }
        })
    }

    /// Run `on_change` on every store change, without the slice.
    pub fn subscribe_raw(&self, on_change: impl Fn() + 'static) -> Subscription {
        self.inner.store.subscribe_fn(move |_| on_change())
    }

    #[must_use]
    pub fn store(&self) -> &Store<T> {
        &self.inner.store
    }
}

impl<T, S: fmt::Debug> fmt::Debug for Bridge<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("last", &*self.inner.last.borrow())
            .finish_non_exhaustive()
    }
}

impl<T: StoreState> Store<T> {
    /// A bridge over the slice chosen by `selector`.
    pub fn bridge<S: PartialEq + 'static>(
        &self,
        selector: impl Fn(&T) -> S + 'static,
    ) -> Bridge<T, S> {
        Bridge::new(self, selector)
    }

    /// A bridge over the whole value.
    pub fn identity_bridge(&self) -> Bridge<T, T> {
        Bridge::new(self, T::clone)
    }
}
