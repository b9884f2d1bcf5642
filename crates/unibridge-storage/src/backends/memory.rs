//! In-memory storage backend.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use unibridge_core::storage::{Result, StorageBackend};

/// Volatile backend keyed by `(table, key)`.
#[derive(Default)]
pub struct MemoryBackend {
    data: RwLock<BTreeMap<(String, String), Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries across all tables.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl StorageBackend for MemoryBackend {
    fn write(&self, table: &str, key: &str, value: &[u8]) -> Result<()> {
        self.data
            .write()
            .insert((table.to_string(), key.to_string()), value.to_vec());
        Ok(())
    }

    fn read(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .data
            .read()
            .get(&(table.to_string(), key.to_string()))
            .cloned())
    }

    fn delete(&self, table: &str, key: &str) -> Result<bool> {
        Ok(self
            .data
            .write()
            .remove(&(table.to_string(), key.to_string()))
            .is_some())
    }

    fn scan(&self, table: &str, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let data = self.data.read();
        let start = (table.to_string(), prefix.to_string());
        Ok(data
            .range(start..)
            .take_while(|((t, k), _)| t == table && k.starts_with(prefix))
            .map(|((_, k), v)| (k.clone(), v.clone()))
            .collect())
    }

    fn write_batch(&self, table: &str, items: Vec<(String, Vec<u8>)>) -> Result<()> {
        let mut data = self.data.write();
        for (key, value) in items {
            data.insert((table.to_string(), key), value);
        }
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_respects_table_and_prefix() {
        let backend = MemoryBackend::new();
        backend.write("a", "x1", b"1").unwrap();
        backend.write("a", "x2", b"2").unwrap();
        backend.write("a", "y1", b"3").unwrap();
        backend.write("b", "x3", b"4").unwrap();

        let hits = backend.scan("a", "x").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, "x1");
        assert_eq!(backend.len(), 4);
    }

    #[test]
    fn test_batch_and_delete() {
        let backend = MemoryBackend::new();
        backend
            .write_batch("t", vec![("k1".into(), vec![1]), ("k2".into(), vec![2])])
            .unwrap();
        assert_eq!(backend.read("t", "k2").unwrap(), Some(vec![2]));
        assert!(backend.delete("t", "k1").unwrap());
        assert!(!backend.delete("t", "k1").unwrap());
        assert!(!backend.is_empty());
    }
}
