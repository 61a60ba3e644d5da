//! Table preferences across sessions backed by on-disk storage.

#![cfg(feature = "file-storage")]

use gridstore_runtime::FileStorage;
use gridstore_table::{FetchError, Page, PageRequest, SortSpec, TableController, TablePrefs};

fn rows(total: usize) -> impl Fn(&PageRequest) -> Result<Page<String>, FetchError> {
    move |req: &PageRequest| {
        if let Some(sort) = req.sort.iter().find(|s| s.column != "id") {
            return Err(FetchError::UnknownColumn(sort.column.clone()));
        }
        let mut ids: Vec<usize> = (1..=total).collect();
        if req.sort.first().is_some_and(|s| s.descending) {
            ids.reverse();
        }
        Ok(Page {
            rows: ids
                .into_iter()
                .skip(req.offset)
                .take(req.page_size)
                .map(|id| format!("order-{id}"))
                .collect(),
            total_count: total,
        })
    }
}

#[test]
fn preferences_survive_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let table = TableController::persisted(
            "orders/grid",
            TablePrefs::default(),
            FileStorage::new(dir.path()),
            rows(120),
        );
        table.set_column_visible("email", false).unwrap();
        table.set_page_size(25).unwrap();
        table.toggle_sort("id").unwrap();
        table.toggle_sort("id").unwrap();
        assert_eq!(table.page_count(120), 5);
    }

    let table = TableController::persisted(
        "orders/grid",
        TablePrefs::default(),
        FileStorage::new(dir.path()),
        rows(120),
    );
    assert!(!table.is_column_visible("email"));
    assert_eq!(table.prefs().sorting, vec![SortSpec::desc("id")]);

    let first = table.fetch_page(0).unwrap();
    assert_eq!(first.rows.len(), 25);
    assert_eq!(first.rows[0], "order-120");
    assert_eq!(first.total_count, 120);
}

#[test]
fn corrupted_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path());
    std::fs::write(storage.path_for("orders/grid"), "{\"page_size\": ").unwrap();

    let table = TableController::persisted("orders/grid", TablePrefs::default(), storage, rows(3));
    assert_eq!(*table.prefs(), TablePrefs::default());
}

#[test]
fn source_errors_propagate() {
    let dir = tempfile::tempdir().unwrap();
    let table = TableController::persisted(
        "orders/grid",
        TablePrefs::default(),
        FileStorage::new(dir.path()),
        rows(3),
    );
    table.toggle_sort("customer").unwrap();
    let err = table.fetch_page(0).unwrap_err();
    assert!(matches!(err, FetchError::UnknownColumn(ref c) if c == "customer"));
}
