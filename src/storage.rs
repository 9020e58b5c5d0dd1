// Key-value persistence backends for the store.
// The store only ever talks to `StorageBackend`, so tests swap in `MemoryStorage`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// String-keyed storage holding JSON-encoded values.
pub trait StorageBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-memory backend. Can be told to fail writes to exercise degraded mode.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
    fail_writes: bool,
    writes: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Write {
                key: key.to_string(),
                reason: "quota exceeded".to_string(),
            });
        }
        self.entries.insert(key.to_string(), value.to_string());
        self.writes += 1;
        Ok(())
    }
}

/// One JSON file per key inside a data directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl StorageBackend for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| StorageError::Read {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let write_err = |e: std::io::Error| StorageError::Write {
            key: key.to_string(),
            reason: e.to_string(),
        };

        fs::create_dir_all(&self.dir).map_err(|e| {
            StorageError::Unavailable(format!("{}: {}", self.dir.display(), e))
        })?;

        // Write to tmp, then rename, so a crash never leaves a half-written value.
        let path = self.path_for(key);
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, value).map_err(write_err)?;
        fs::rename(&tmp_path, &path).map_err(write_err)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_storage_round_trips_values() {
        let tmp = TempDir::new().unwrap();
        let mut storage = FileStorage::new(tmp.path().join("data"));

        assert_eq!(storage.get("navigator_sites").unwrap(), None);
        storage.set("navigator_sites", "[]").unwrap();
        assert_eq!(storage.get("navigator_sites").unwrap().as_deref(), Some("[]"));
        assert!(!tmp.path().join("data/navigator_sites.tmp").exists());
    }

    #[test]
    fn unusable_data_dir_reports_unavailable() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("not-a-dir");
        fs::write(&file, "x").unwrap();

        let mut storage = FileStorage::new(file.join("data"));
        assert!(matches!(
            storage.set("navigator_sites", "[]"),
            Err(StorageError::Unavailable(_))
        ));
    }

    #[test]
    fn memory_storage_can_refuse_writes() {
        let mut storage = MemoryStorage::new();
        storage.set_fail_writes(true);
        assert!(matches!(
            storage.set("k", "v"),
            Err(StorageError::Write { .. })
        ));
        assert_eq!(storage.write_count(), 0);
        assert_eq!(storage.get("k").unwrap(), None);
    }
}
