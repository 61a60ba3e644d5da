#![forbid(unsafe_code)]

//! Table: persisted column/sort/page preferences and paged row fetching.

pub mod controller;
pub mod paging;
pub mod prefs;

pub use controller::{PERSISTED_FIELDS, TableController};
pub use paging::{FetchError, Page, PageRequest, RowSource, page_count};
pub use prefs::{DEFAULT_PAGE_SIZE, SortSpec, TablePrefs};
