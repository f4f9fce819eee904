use crate::errors::{DbError, DbResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// String-keyed durable storage with a finite capacity.
///
/// `set` must fail with [`DbError::QuotaExceeded`] when the write would not fit,
/// leaving the previous value for that key untouched.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn get(&self, key: &str) -> DbResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> DbResult<()>;

    async fn remove(&self, key: &str) -> DbResult<()>;
}

/// In-process storage, optionally capped at a total number of value bytes.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStorage {
    entries: Mutex<HashMap<String, String>>,
    capacity_bytes: Option<usize>,
}

impl MemoryKeyValueStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity_bytes: Some(capacity_bytes),
        }
    }

    /// Total bytes held across all values
    pub fn used_bytes(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.values().map(|v| v.len()).sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl KeyValueStorage for MemoryKeyValueStorage {
    async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| DbError::Lock(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| DbError::Lock(e.to_string()))?;

        if let Some(capacity) = self.capacity_bytes {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            if others + value.len() > capacity {
                return Err(DbError::QuotaExceeded { key: key.to_string() });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> DbResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| DbError::Lock(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_set_remove() {
        let storage = MemoryKeyValueStorage::new();
        assert_eq!(storage.get("k").await.unwrap(), None);

        storage.set("k", "v1").await.unwrap();
        storage.set("k", "v2").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap().as_deref(), Some("v2"));

        storage.remove("k").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn quota_rejects_write_and_keeps_old_value() {
        let storage = MemoryKeyValueStorage::with_capacity(10);
        storage.set("a", "12345").await.unwrap();
        storage.set("b", "1234").await.unwrap();

        let err = storage.set("b", "123456").await.unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(storage.get("b").await.unwrap().as_deref(), Some("1234"));

        // Replacing a key only counts its new size.
        storage.set("a", "123456").await.unwrap();
        assert_eq!(storage.used_bytes(), 10);
    }
}
