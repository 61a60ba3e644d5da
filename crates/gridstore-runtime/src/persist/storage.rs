#![forbid(unsafe_code)]

//! Durable key-value backends.
//!
//! The store treats a backend as an opaque string slot per key. Backends
//! never interpret the text they hold.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use thiserror::Error;

/// Errors reported by a [`Storage`] backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on slot `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("access to slot `{key}` denied")]
    Denied { key: String },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A durable string key-value layer.
pub trait Storage {
    /// Read a slot. `Ok(None)` when the slot does not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace a slot's content.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend rejects the write.
    fn write(&self, key: &str, data: &str) -> Result<(), StorageError>;

    /// Delete a slot. Deleting a missing slot succeeds.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend rejects the removal.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<S: Storage + ?Sized> Storage for Rc<S> {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, data: &str) -> Result<(), StorageError> {
        (**self).write(key, data)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryInner {
    slots: AHashMap<String, String>,
    read_only: bool,
    writes: u64,
}

/// In-process storage. Clones share the same slots.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a slot directly, bypassing the read-only flag.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<String>) {
        self.inner
            .borrow_mut()
            .slots
            .insert(key.into(), data.into());
    }

    /// Raw slot content.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.borrow().slots.get(key).cloned()
    }

    /// Reject every subsequent write and removal with [`StorageError::Denied`].
    pub fn set_read_only(&self, read_only: bool) {
        self.inner.borrow_mut().read_only = read_only;
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.inner.borrow().writes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().slots.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get(key))
    }

    fn write(&self, key: &str, data: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.borrow_mut();
        if inner.read_only {
            return Err(StorageError::Denied {
                key: key.to_string(),
            });
        }
        inner.slots.insert(key.to_string(), data.to_string());
        inner.writes += 1;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.borrow_mut();
        if inner.read_only {
            return Err(StorageError::Denied {
                key: key.to_string(),
            });
        }
        inner.slots.remove(key);
        Ok(())
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("MemoryStorage")
            .field("slots", &inner.slots.len())
            .field("read_only", &inner.read_only)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// FileStorage
// ---------------------------------------------------------------------------

#[cfg(feature = "file-storage")]
pub use file::FileStorage;

#[cfg(feature = "file-storage")]
mod file {
    use std::io::ErrorKind;
    use std::path::{Path, PathBuf};

    use super::{Storage, StorageError};

    /// One JSON file per slot inside a directory.
    ///
    /// Writes go to a temporary sibling first and are renamed into place, so
    /// a crash mid-write leaves the previous content intact.
    #[derive(Debug, Clone)]
    pub struct FileStorage {
        dir: PathBuf,
    }

    impl FileStorage {
        /// Use `dir` as the slot directory. It is created on first write.
        #[must_use]
        pub fn new(dir: impl Into<PathBuf>) -> Self {
            Self { dir: dir.into() }
        }

        #[must_use]
        pub fn dir(&self) -> &Path {
            &self.dir
        }

        /// File backing `key`. Characters outside `[A-Za-z0-9._-]` map to `_`.
        #[must_use]
        pub fn path_for(&self, key: &str) -> PathBuf {
            let name: String = key
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                        c
                    } else {
                        '_'
                    }
                })
                .collect();
            self.dir.join(format!("{name}.json"))
        }

        fn io_err(key: &str, source: std::io::Error) -> StorageError {
            if source.kind() == ErrorKind::PermissionDenied {
                StorageError::Denied {
                    key: key.to_string(),
                }
            } else {
                StorageError::Io {
                    key: key.to_string(),
                    source,
                }
            }
        }
    }

    impl Storage for FileStorage {
        fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
            match std::fs::read_to_string(self.path_for(key)) {
                Ok(data) => Ok(Some(data)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(Self::io_err(key, e)),
            }
        }

        fn write(&self, key: &str, data: &str) -> Result<(), StorageError> {
            std::fs::create_dir_all(&self.dir).map_err(|e| Self::io_err(key, e))?;
            let path = self.path_for(key);
            let tmp = path.with_extension("json.tmp");
            std::fs::write(&tmp, data).map_err(|e| Self::io_err(key, e))?;
            std::fs::rename(&tmp, &path).map_err(|e| Self::io_err(key, e))
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            match std::fs::remove_file(self.path_for(key)) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(Self::io_err(key, e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_round_trip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.read("k").unwrap(), None);
        storage.write("k", "{}").unwrap();
        assert_eq!(storage.read("k").unwrap().as_deref(), Some("{}"));
        assert_eq!(storage.write_count(), 1);
        storage.remove("k").unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn memory_clones_share_slots() {
        let a = MemoryStorage::new();
        let b = a.clone();
        a.write("k", "1").unwrap();
        assert_eq!(b.get("k").as_deref(), Some("1"));
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn memory_read_only_denies_writes() {
        let storage = MemoryStorage::new();
        storage.insert("k", "seed");
        storage.set_read_only(true);
        let err = storage.write("k", "new").unwrap_err();
        assert!(matches!(err, StorageError::Denied { ref key } if key == "k"));
        assert!(storage.remove("k").is_err());
        assert_eq!(storage.get("k").as_deref(), Some("seed"));
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn rc_storage_delegates() {
        let storage: Rc<dyn Storage> = Rc::new(MemoryStorage::new());
        storage.write("k", "v").unwrap();
        assert_eq!(storage.read("k").unwrap().as_deref(), Some("v"));
    }

    #[cfg(feature = "file-storage")]
    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("slots"));
        assert_eq!(storage.read("grid/prefs").unwrap(), None);
        storage.write("grid/prefs", r#"{"a":1}"#).unwrap();
        assert_eq!(
            storage.read("grid/prefs").unwrap().as_deref(),
            Some(r#"{"a":1}"#)
        );
        assert!(storage.path_for("grid/prefs").ends_with("grid_prefs.json"));
        storage.remove("grid/prefs").unwrap();
        storage.remove("grid/prefs").unwrap();
        assert_eq!(storage.read("grid/prefs").unwrap(), None);
    }

    #[cfg(feature = "file-storage")]
    #[test]
    fn file_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.write("k", "one").unwrap();
        storage.write("k", "two").unwrap();
        assert_eq!(storage.read("k").unwrap().as_deref(), Some("two"));
        assert!(!storage.path_for("k").with_extension("json.tmp").exists());
    }
}
