#![forbid(unsafe_code)]

//! Lazy derived values over one or more stores.
//!
//! # Design
//!
//! [`Selected<S>`] wraps a compute function and its cached result. Instead
//! of listening for change callbacks it remembers the version of every
//! source store it read. The cache is stale as soon as any source version
//! moves, so deferred notification mode never yields a stale read.
//!
//! # Invariants
//!
//! 1. `get()` is consistent with the current value of every source.
//! 2. The compute function runs at most once per source change.
//! 3. With no source change `get()` returns the cached `Rc` in O(sources).
//! 4. Version increments by exactly 1 per recomputation.
//!
//! # Failure Modes
//!
//! - **Compute function panics**: the previous cache and source versions are
//!   kept, so the next `get()` retries.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::state::StoreState;
use crate::store::Store;

type VersionProbe = Box<dyn Fn() -> u64>;

struct SelectedInner<S> {
    compute: Box<dyn Fn() -> S>,
    sources: Vec<VersionProbe>,
    cached: Option<Rc<S>>,
    /// Source versions observed at the last recomputation.
    seen: Vec<u64>,
    version: u64,
}

impl<S> SelectedInner<S> {
    fn current_versions(&self) -> Vec<u64> {
        self.sources.iter().map(|version_of| version_of()).collect()
    }

    fn is_stale(&self) -> bool {
        self.cached.is_none() || self.current_versions() != self.seen
    }

    fn refresh(&mut self) -> Rc<S> {
        let versions = self.current_versions();
        if let Some(cached) = &self.cached
            && versions == self.seen
        {
            return Rc::clone(cached);
        }
        let value = Rc::new((self.compute)());
        self.cached = Some(Rc::clone(&value));
        self.seen = versions;
        self.version += 1;
        value
    }
}

/// A memoized value derived from store state.
///
/// Cloning creates a new handle to the **same** cache.
pub struct Selected<S> {
    inner: Rc<RefCell<SelectedInner<S>>>,
}

impl<S> Clone for Selected<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Selected<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Selected")
            .field("cached", &inner.cached)
            .field("version", &inner.version)
            .finish()
    }
}

impl<S: 'static> Selected<S> {
    /// Derive from one store.
    pub fn from_store<T: StoreState>(store: &Store<T>, map: impl Fn(&T) -> S + 'static) -> Self {
        let source = store.clone();
        let versioned = store.clone();
        Self::from_parts(
            move || map(&source.get()),
            vec![Box::new(move || versioned.version())],
        )
    }

    /// Derive from two stores.
    pub fn from2<A, B>(a: &Store<A>, b: &Store<B>, map: impl Fn(&A, &B) -> S + 'static) -> Self
    where
        A: StoreState,
        B: StoreState,
    {
        let (sa, sb) = (a.clone(), b.clone());
        let (pa, pb) = (a.clone(), b.clone());
        Self::from_parts(
            move || map(&sa.get(), &sb.get()),
            vec![
                Box::new(move || pa.version()),
                Box::new(move || pb.version()),
            ],
        )
    }

    fn from_parts(compute: impl Fn() -> S + 'static, sources: Vec<VersionProbe>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SelectedInner {
                compute: Box::new(compute),
                sources,
                cached: None,
                seen: Vec::new(),
                version: 0,
            })),
        }
    }

    /// Current value, recomputed if any source changed.
    ///
    /// # Panics
    ///
    /// Panics if the compute function reads this same `Selected`.
    #[must_use]
    pub fn get(&self) -> Rc<S> {
        self.inner.borrow_mut().refresh()
    }

    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let value = self.get();
        f(&value)
    }

    /// Whether the next `get()` will recompute.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.borrow().is_stale()
    }

    /// Drop the cache. The next `get()` recomputes.
    pub fn invalidate(&self) {
        self.inner.borrow_mut().cached = None;
    }

    /// Increments by 1 on each recomputation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }
}

impl<T: StoreState> Store<T> {
    /// A lazily recomputed slice of this store.
    pub fn select<S: 'static>(&self, map: impl Fn(&T) -> S + 'static) -> Selected<S> {
        Selected::from_store(self, map)
    }
}
