//! In-memory key/value store for tests/dev.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::store::validate_key;
use crate::{KeyValueStore, StorageError};

/// In-memory store.
///
/// - No IO
/// - Optional quota (total bytes of keys + values), mirroring the way a
///   browser rejects `setItem` once its storage is full
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<BTreeMap<String, String>>,
    quota: Option<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses writes once keys + values would exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
            quota: Some(bytes),
        }
    }

    /// Bytes currently used (keys + values).
    pub fn used_bytes(&self) -> usize {
        let map = self.inner.read().unwrap_or_else(|p| p.into_inner());
        map.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let map = self.inner.read().unwrap_or_else(|p| p.into_inner());
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let mut map = self.inner.write().unwrap_or_else(|p| p.into_inner());

        if let Some(quota) = self.quota {
            let used: usize = map
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = key.len() + value.len();
            let available = quota.saturating_sub(used);
            if needed > available {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available,
                });
            }
        }

        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.inner.write().unwrap_or_else(|p| p.into_inner());
        map.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let map = self.inner.read().unwrap_or_else(|p| p.into_inner());
        Ok(map.keys().cloned().collect())
    }
}
