#![forbid(unsafe_code)]

//! Context-scoped stores.
//!
//! [`provide`] makes a store reachable from any code running inside a
//! closure, without passing the handle down explicitly. Scopes nest; the
//! innermost store of the requested type wins. Lookup is typed, so stores
//! of different state types never shadow each other.
//!
//! Using a store outside any scope is a programmer error: [`use_store`]
//! panics with the state type name, and [`try_use_store`] returns
//! [`StoreError::Unbound`].
//!
//! ```
//! use gridstore_runtime::scope;
//! use gridstore_runtime::store::Store;
//!
//! let store = Store::new(1i64);
//! scope::provide(&store, || {
//!     let inner = scope::use_store::<i64>();
//!     inner.replace(2).unwrap();
//! });
//! assert_eq!(*store.get(), 2);
//! assert!(scope::try_use_store::<i64>().is_err());
//! ```

use std::any::{Any, type_name};
use std::cell::RefCell;

use tracing::trace;

use crate::error::{Result, StoreError};
use crate::state::StoreState;
use crate::store::Store;

thread_local! {
    static SCOPES: RefCell<Vec<Box<dyn Any>>> = const { RefCell::new(Vec::new()) };
}

/// Pops the scope entry even if the scoped closure unwinds.
struct ScopeGuard;

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        SCOPES.with(|scopes| {
            scopes.borrow_mut().pop();
        });
    }
}

/// Run `f` with `store` in scope.
pub fn provide<T: StoreState, R>(store: &Store<T>, f: impl FnOnce() -> R) -> R {
    let depth = SCOPES.with(|scopes| {
        let mut scopes = scopes.borrow_mut();
        scopes.push(Box::new(store.clone()));
        scopes.len()
    });
    trace!(message = "scope.enter", state = type_name::<T>(), depth);
    let _guard = ScopeGuard;
    f()
}

/// The innermost store of state type `T` in scope.
///
/// # Errors
///
/// Returns [`StoreError::Unbound`] when no such store is in scope.
pub fn try_use_store<T: StoreState>() -> Result<Store<T>> {
    SCOPES
        .with(|scopes| {
            scopes
                .borrow()
                .iter()
                .rev()
                .find_map(|entry| entry.downcast_ref::<Store<T>>().cloned())
        })
        .ok_or(StoreError::Unbound {
            type_name: type_name::<T>(),
        })
}

/// The innermost store of state type `T` in scope.
///
/// # Panics
///
/// Panics when no such store is in scope.
#[must_use]
pub fn use_store<T: StoreState>() -> Store<T> {
    match try_use_store() {
        Ok(store) => store,
        Err(err) => panic!("{err}"),
    }
}

/// Whether a store of state type `T` is in scope.
#[must_use]
pub fn is_bound<T: StoreState>() -> bool {
    try_use_store::<T>().is_ok()
}
