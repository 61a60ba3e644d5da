#![forbid(unsafe_code)]

//! User-level table preferences held in a store.

use std::collections::BTreeMap;

use gridstore_runtime::SerdeState;
use serde::{Deserialize, Serialize};

/// Rows per page when nothing else is configured.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    #[serde(default)]
    pub descending: bool,
}

impl SortSpec {
    #[must_use]
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    #[must_use]
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// Column visibility, column order, sorting, and page size.
///
/// Columns absent from `column_visibility` are visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePrefs {
    #[serde(default)]
    pub column_visibility: BTreeMap<String, bool>,
    #[serde(default)]
    pub column_order: Vec<String>,
    #[serde(default)]
    pub sorting: Vec<SortSpec>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for TablePrefs {
    fn default() -> Self {
        Self {
            column_visibility: BTreeMap::new(),
            column_order: Vec::new(),
            sorting: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl SerdeState for TablePrefs {}

impl TablePrefs {
    #[must_use]
    pub fn is_column_visible(&self, column: &str) -> bool {
        self.column_visibility.get(column).copied().unwrap_or(true)
    }

    /// `all` reordered by `column_order`, hidden columns removed.
    ///
    /// Ordered columns come first; columns missing from the order keep their
    /// position relative to each other after them. Unknown names in
    /// `column_order` are ignored.
    #[must_use]
    pub fn visible_columns<S: AsRef<str>>(&self, all: &[S]) -> Vec<String> {
        let known = |name: &str| all.iter().any(|c| c.as_ref() == name);
        let ordered = self
            .column_order
            .iter()
            .map(String::as_str)
            .filter(|name| known(name));
        let rest = all
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| !self.column_order.iter().any(|o| o == name));

        let mut out: Vec<String> = Vec::with_capacity(all.len());
        for name in ordered.chain(rest) {
            if self.is_column_visible(name) && !out.iter().any(|c| c == name) {
                out.push(name.to_string());
            }
        }
        out
    }

    /// Sort direction for `column`, if it is sorted.
    #[must_use]
    pub fn sort_of(&self, column: &str) -> Option<&SortSpec> {
        self.sorting.iter().find(|s| s.column == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let prefs = TablePrefs::default();
        assert_eq!(prefs.page_size, 50);
        assert!(prefs.is_column_visible("anything"));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let prefs: TablePrefs =
            serde_json::from_str(r#"{"column_visibility":{"id":false}}"#).unwrap();
        assert!(!prefs.is_column_visible("id"));
        assert_eq!(prefs.page_size, DEFAULT_PAGE_SIZE);
        assert!(prefs.sorting.is_empty());
    }

    #[test]
    fn visible_columns_respect_order_and_visibility() {
        let mut prefs = TablePrefs::default();
        prefs.column_order = vec!["status".into(), "ghost".into(), "id".into()];
        prefs.column_visibility.insert("email".into(), false);
        let all = ["id", "name", "email", "status"];
        assert_eq!(prefs.visible_columns(&all), vec!["status", "id", "name"]);
    }

    #[test]
    fn sort_lookup() {
        let mut prefs = TablePrefs::default();
        prefs.sorting.push(SortSpec::desc("created"));
        assert_eq!(prefs.sort_of("created"), Some(&SortSpec::desc("created")));
        assert_eq!(prefs.sort_of("id"), None);
    }
}
