#![forbid(unsafe_code)]

//! Paged row fetching.
//!
//! Rows come from a caller-provided [`RowSource`]. The table layer only
//! builds requests from stored preferences; it never caches rows.

use thiserror::Error;

use crate::prefs::SortSpec;

/// One page request: offset, size, and the active sort keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub page_size: usize,
    pub sort: Vec<SortSpec>,
}

/// One fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<R> {
    pub rows: Vec<R>,
    /// Total rows available across all pages.
    pub total_count: usize,
}

impl<R> Page<R> {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            total_count: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("row source unavailable: {0}")]
    Unavailable(String),

    #[error("cannot sort by unknown column `{0}`")]
    UnknownColumn(String),

    #[error("offset {offset} is past the last row ({total_count} rows)")]
    OutOfRange { offset: usize, total_count: usize },
}

/// Supplies rows for a [`PageRequest`].
pub trait RowSource<R> {
    /// Fetch one page.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] when the page cannot be produced.
    fn fetch(&self, request: &PageRequest) -> Result<Page<R>, FetchError>;
}

impl<R, F> RowSource<R> for F
where
    F: Fn(&PageRequest) -> Result<Page<R>, FetchError>,
{
    fn fetch(&self, request: &PageRequest) -> Result<Page<R>, FetchError> {
        self(request)
    }
}

/// Pages needed for `total` rows. Zero rows still make one (empty) page.
#[must_use]
pub fn page_count(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1)).max(1)
}
