#![forbid(unsafe_code)]

//! [`TableController`]: table preferences backed by a persisted store.
//!
//! The controller is a thin layer over `Store<TablePrefs>`. Every
//! preference change goes through the store, so it is versioned, undoable,
//! persisted, and observable like any other store update.

use std::rc::Rc;

use gridstore_runtime::store::Store;
use gridstore_runtime::{PersistSpec, Storage};
use tracing::debug;

use crate::paging::{FetchError, Page, PageRequest, RowSource, page_count};
use crate::prefs::{SortSpec, TablePrefs};

/// Fields of [`TablePrefs`] written to durable storage.
pub const PERSISTED_FIELDS: [&str; 4] = ["column_visibility", "column_order", "sorting", "page_size"];

/// Table preferences plus a row source.
pub struct TableController<R> {
    store: Store<TablePrefs>,
    source: Rc<dyn RowSource<R>>,
}

impl<R> Clone for TableController<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            source: Rc::clone(&self.source),
        }
    }
}

impl<R> TableController<R> {
    /// Wrap an existing preferences store.
    pub fn new(store: Store<TablePrefs>, source: impl RowSource<R> + 'static) -> Self {
        Self {
            store,
            source: Rc::new(source),
        }
    }

    /// Build a store over `initial` persisted under `key`, then wrap it.
    pub fn persisted(
        key: impl Into<String>,
        initial: TablePrefs,
        storage: impl Storage + 'static,
        source: impl RowSource<R> + 'static,
    ) -> Self {
        let store = Store::builder(initial)
            .persist(PersistSpec::new(key).fields(PERSISTED_FIELDS), storage)
            .build();
        Self::new(store, source)
    }

    #[must_use]
    pub fn store(&self) -> &Store<TablePrefs> {
        &self.store
    }

    #[must_use]
    pub fn prefs(&self) -> Rc<TablePrefs> {
        self.store.get()
    }

    // ── Columns ─────────────────────────────────────────────────────

    /// Flip a column's visibility. Unknown columns start visible.
    pub fn toggle_column(&self, column: &str) -> gridstore_runtime::Result<bool> {
        self.store.mutate(|prefs| {
            let visible = prefs.is_column_visible(column);
            prefs.column_visibility.insert(column.to_string(), !visible);
        })
    }

    pub fn set_column_visible(&self, column: &str, visible: bool) -> gridstore_runtime::Result<bool> {
        self.store.mutate(|prefs| {
            prefs.column_visibility.insert(column.to_string(), visible);
        })
    }

    #[must_use]
    pub fn is_column_visible(&self, column: &str) -> bool {
        self.store.get().is_column_visible(column)
    }

    /// Visible columns of `all`, in display order.
    #[must_use]
    pub fn visible_columns<S: AsRef<str>>(&self, all: &[S]) -> Vec<String> {
        self.store.get().visible_columns(all)
    }

    pub fn set_column_order<I, S>(&self, order: I) -> gridstore_runtime::Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let order: Vec<String> = order.into_iter().map(Into::into).collect();
        self.store.mutate(move |prefs| prefs.column_order = order)
    }

    // ── Sorting ─────────────────────────────────────────────────────

    pub fn set_sort(&self, sorting: Vec<SortSpec>) -> gridstore_runtime::Result<bool> {
        self.store.mutate(move |prefs| prefs.sorting = sorting)
    }

    /// Cycle single-column sorting on `column`: ascending, descending, off.
    ///
    /// Sorting a new column replaces any existing sort.
    pub fn toggle_sort(&self, column: &str) -> gridstore_runtime::Result<bool> {
        let next = match self.store.get().sort_of(column) {
            None => vec![SortSpec::asc(column)],
            Some(spec) if !spec.descending => vec![SortSpec::desc(column)],
            Some(_) => Vec::new(),
        };
        self.set_sort(next)
    }

    // ── Paging ──────────────────────────────────────────────────────

    /// Set rows per page. Zero is raised to one.
    pub fn set_page_size(&self, page_size: usize) -> gridstore_runtime::Result<bool> {
        let page_size = page_size.max(1);
        self.store.mutate(move |prefs| prefs.page_size = page_size)
    }

    #[must_use]
    pub fn page_request(&self, page_index: usize) -> PageRequest {
        let prefs = self.store.get();
        let page_size = prefs.page_size.max(1);
        PageRequest {
            offset: page_index.saturating_mul(page_size),
            page_size,
            sort: prefs.sorting.clone(),
        }
    }

    /// Fetch page `page_index` from the row source.
    ///
    /// # Errors
    ///
    /// Propagates the row source's [`FetchError`].
    pub fn fetch_page(&self, page_index: usize) -> Result<Page<R>, FetchError> {
        let request = self.page_request(page_index);
        let page = self.source.fetch(&request)?;
        debug!(
            message = "table.fetch",
            page_index,
            offset = request.offset,
            rows = page.rows.len(),
            total = page.total_count
        );
        Ok(page)
    }

    /// Pages needed for `total` rows at the current page size.
    #[must_use]
    pub fn page_count(&self, total: usize) -> usize {
        page_count(total, self.store.get().page_size)
    }
}

impl<R> std::fmt::Debug for TableController<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableController")
            .field("prefs", &self.store.get())
            .finish_non_exhaustive()
    }
}
