//! Redb storage backend implementation.
//!
//! All logical tables share one redb table; keys are namespaced as
//! `table:key` so a prefix scan over one logical table is a range scan.

use crate::error::Result;
use lru::LruCache;
use parking_lot::Mutex;
use redb::{Database, TableDefinition};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use unibridge_core::storage::{Result as CoreResult, StorageBackend};

const UNIFIED_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("unified_storage");

const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Path marker for a throwaway database backed by a temporary file.
pub const TEMPORARY_PATH: &str = ":memory:";

/// Configuration for RedbBackend.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct RedbBackendConfig {
    /// Path to the database file.
    pub path: String,

    /// Create parent directories if they don't exist.
    #[serde(default = "default_create_dirs")]
    pub create_dirs: bool,

    /// LRU cache capacity (number of entries). 0 disables caching.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_create_dirs() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

impl RedbBackendConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            create_dirs: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    pub fn with_create_dirs(mut self, create_dirs: bool) -> Self {
        self.create_dirs = create_dirs;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// A database living in a temporary file that is removed on drop.
    pub fn temporary() -> Self {
        Self {
            path: TEMPORARY_PATH.to_string(),
            create_dirs: false,
            cache_capacity: 256,
        }
    }
}

fn make_key(table: &str, key: &str) -> String {
    let mut result = String::with_capacity(table.len() + key.len() + 1);
    result.push_str(table);
    result.push(':');
    result.push_str(key);
    result
}

/// redb-based persistent storage backend with an optional LRU read cache.
pub struct RedbBackend {
    db: Database,
    path: String,
    temp_path: Option<PathBuf>,
    cache: Option<Mutex<LruCache<String, Vec<u8>>>>,
}

impl RedbBackend {
    /// Create a new RedbBackend with the given configuration.
    pub fn new(config: RedbBackendConfig) -> Result<Self> {
        let (db, temp_path) = if config.path == TEMPORARY_PATH {
            let temp_path =
                std::env::temp_dir().join(format!("unibridge_{}.redb", uuid::Uuid::new_v4()));
            (Database::create(&temp_path)?, Some(temp_path))
        } else {
            let path = Path::new(&config.path);
            if config.create_dirs {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            (Database::create(path)?, None)
        };

        // Make sure the table exists so read transactions can always open it.
        let txn = db.begin_write()?;
        txn.open_table(UNIFIED_TABLE)?;
        txn.commit()?;

        let cache = NonZeroUsize::new(config.cache_capacity).map(|cap| Mutex::new(LruCache::new(cap)));

        tracing::debug!(path = %config.path, cached = cache.is_some(), "Opened redb backend");

        Ok(Self {
            db,
            path: config.path,
            temp_path,
            cache,
        })
    }

    /// Open or create a redb backend at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(RedbBackendConfig::new(
            path.as_ref().to_string_lossy().to_string(),
        ))
    }

    /// Get the storage path.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn cache_put(&self, key: String, value: Vec<u8>) {
        if let Some(cache) = &self.cache {
            cache.lock().put(key, value);
        }
    }

    fn cache_get(&self, key: &str) -> Option<Vec<u8>> {
        self.cache
            .as_ref()
            .and_then(|cache| cache.lock().get(key).cloned())
    }

    fn cache_pop(&self, key: &str) {
        if let Some(cache) = &self.cache {
            cache.lock().pop(key);
        }
    }

    fn insert_all(&self, items: &[(String, Vec<u8>)]) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut t = txn.open_table(UNIFIED_TABLE)?;
            for (key, value) in items {
                t.insert(key.as_str(), value.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let txn = self.db.begin_read()?;
        let t = txn.open_table(UNIFIED_TABLE)?;
        let value = t.get(key)?.map(|v| v.value().to_vec());
        Ok(value)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut t = txn.open_table(UNIFIED_TABLE)?;
            let existed = t.remove(key)?.is_some();
            existed
        };
        txn.commit()?;
        Ok(removed)
    }

    fn range_prefix(&self, prefix: &str, strip: usize) -> Result<Vec<(String, Vec<u8>)>> {
        let txn = self.db.begin_read()?;
        let t = txn.open_table(UNIFIED_TABLE)?;

        let mut results = Vec::new();
        for item in t.range(prefix..)? {
            let (key, value) = item?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            if let Some(rest) = key.get(strip..) {
                results.push((rest.to_string(), value.value().to_vec()));
            }
        }
        Ok(results)
    }
}

impl StorageBackend for RedbBackend {
    fn write(&self, table: &str, key: &str, value: &[u8]) -> CoreResult<()> {
        let namespaced = make_key(table, key);
        self.insert_all(&[(namespaced.clone(), value.to_vec())])?;
        self.cache_put(namespaced, value.to_vec());
        Ok(())
    }

    fn read(&self, table: &str, key: &str) -> CoreResult<Option<Vec<u8>>> {
        let namespaced = make_key(table, key);
        if let Some(cached) = self.cache_get(&namespaced) {
            return Ok(Some(cached));
        }

        let value = self.get(&namespaced)?;
        if let Some(data) = &value {
            self.cache_put(namespaced, data.clone());
        }
        Ok(value)
    }

    fn delete(&self, table: &str, key: &str) -> CoreResult<bool> {
        let namespaced = make_key(table, key);
        self.cache_pop(&namespaced);
        Ok(self.remove(&namespaced)?)
    }

    fn scan(&self, table: &str, prefix: &str) -> CoreResult<Vec<(String, Vec<u8>)>> {
        let full_prefix = make_key(table, prefix);
        Ok(self.range_prefix(&full_prefix, table.len() + 1)?)
    }

    fn write_batch(&self, table: &str, items: Vec<(String, Vec<u8>)>) -> CoreResult<()> {
        let namespaced: Vec<(String, Vec<u8>)> = items
            .into_iter()
            .map(|(key, value)| (make_key(table, &key), value))
            .collect();
        self.insert_all(&namespaced)?;
        for (key, value) in namespaced {
            self.cache_put(key, value);
        }
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        self.temp_path.is_none()
    }
}

impl Drop for RedbBackend {
    fn drop(&mut self) {
        if let Some(temp_path) = &self.temp_path {
            if let Err(e) = std::fs::remove_file(temp_path) {
                tracing::debug!(
                    "Failed to remove temporary database file {}: {}",
                    temp_path.display(),
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = RedbBackendConfig::new("./data/test.redb")
            .with_create_dirs(false)
            .with_cache_capacity(0);

        assert_eq!(config.path, "./data/test.redb");
        assert!(!config.create_dirs);
        assert_eq!(config.cache_capacity, 0);
    }

    #[test]
    fn test_make_key() {
        assert_eq!(make_key("group_mappings", "1/3"), "group_mappings:1/3");
    }

    #[test]
    fn test_temporary_backend_is_not_persistent() {
        let backend = RedbBackend::new(RedbBackendConfig::temporary()).unwrap();
        assert!(!backend.is_persistent());
        backend.write("t", "a", b"1").unwrap();
        assert_eq!(backend.read("t", "a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn test_scan_is_scoped_to_table() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RedbBackend::open(dir.path().join("scan.redb")).unwrap();

        backend.write("groups", "1/1", b"a").unwrap();
        backend.write("groups", "1/2", b"b").unwrap();
        backend.write("groups", "2/1", b"c").unwrap();
        backend.write("groupsx", "1/9", b"d").unwrap();

        let fabric_one = backend.scan("groups", "1/").unwrap();
        let keys: Vec<_> = fabric_one.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["1/1", "1/2"]);

        assert_eq!(backend.scan("groups", "").unwrap().len(), 3);
    }

    #[test]
    fn test_uncached_delete() {
        let dir = tempfile::tempdir().unwrap();
        let backend =
            RedbBackend::new(RedbBackendConfig::new(dir.path().join("d.redb").to_string_lossy()).with_cache_capacity(0))
                .unwrap();

        backend.write("t", "k", b"v").unwrap();
        assert!(backend.delete("t", "k").unwrap());
        assert!(!backend.delete("t", "k").unwrap());
        assert_eq!(backend.read("t", "k").unwrap(), None);
    }
}
