//! File-backed key/value store: one file per key.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use storefront_core::TenantId;

use crate::store::validate_key;
use crate::{KeyValueStore, StorageError};

const EXTENSION: &str = "json";

/// Directory-backed store.
///
/// Each key maps to `{dir}/{key}.json`. Writes go to a temporary sibling file
/// first and are renamed into place, so a crash never leaves a torn value.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| StorageError::io(dir.to_string_lossy(), e))?;
        Ok(Self { dir })
    }

    /// Open the store for one tenant: `{base}/tenants/{tenant_id}`.
    ///
    /// Tenants never share keys, so switching storefronts cannot leak a cart
    /// from one merchant into another.
    pub fn for_tenant(base: impl AsRef<Path>, tenant_id: TenantId) -> Result<Self, StorageError> {
        Self::open(base.as_ref().join("tenants").join(tenant_id.to_string()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.{EXTENSION}")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(key, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        fs::write(&tmp, value).map_err(|e| StorageError::io(key, e))?;
        fs::rename(&tmp, &path).map_err(|e| StorageError::io(key, e))?;
        tracing::trace!(key, bytes = value.len(), "stored value");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(key, e)),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| StorageError::io(self.dir.to_string_lossy(), e))?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(self.dir.to_string_lossy(), e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.set("cart-storage", r#"{"version":1,"items":[]}"#).unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(
            reopened.get("cart-storage").unwrap().as_deref(),
            Some(r#"{"version":1,"items":[]}"#)
        );
        assert_eq!(reopened.keys().unwrap(), vec!["cart-storage".to_string()]);
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.set("cart_items", "[]").unwrap();
        store.remove("cart_items").unwrap();
        store.remove("cart_items").unwrap();
        assert_eq!(store.get("cart_items").unwrap(), None);
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn tenants_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let a = FileStore::for_tenant(dir.path(), TenantId::new()).unwrap();
        let b = FileStore::for_tenant(dir.path(), TenantId::new()).unwrap();

        a.set("cart-storage", "a").unwrap();
        assert_eq!(b.get("cart-storage").unwrap(), None);
        assert_ne!(a.dir(), b.dir());
    }

    #[test]
    fn invalid_keys_never_touch_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(store.set("../escape", "x"), Err(StorageError::InvalidKey(_))));
    }
}
