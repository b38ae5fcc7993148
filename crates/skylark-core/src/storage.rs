//! Persistent key-value storage.
//!
//! The platform provides the real backend (async, string-keyed and
//! string-valued); `FileStorage` is the desktop/test implementation, a
//! single JSON map file loaded on open and written through on mutation.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::warn;

use crate::error::{CoreError, Result};

/// Platform key-value storage seam. Single-key writes are atomic; callers
/// must not fire overlapping writes to the same key without awaiting the
/// prior one.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn list_keys(&self) -> Result<Vec<String>>;
    async fn remove_many(&self, keys: &[String]) -> Result<()>;
}

/// In-memory backend. Useful for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    async fn remove_many(&self, keys: &[String]) -> Result<()> {
        let mut entries = self.entries.write();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}

const STORAGE_FILE: &str = "storage.json";

/// File-backed storage: one JSON object per data directory, loaded on open.
/// A corrupt or unreadable file starts the store empty rather than failing —
/// cached data is always reconstructible from the remote services.
pub struct FileStorage {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStorage {
    pub fn from_config(config: &crate::config::CoreConfig) -> Result<Self> {
        Self::open(&config.data_dir)
    }

    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir).map_err(CoreError::storage)?;
        let path = data_dir.join(STORAGE_FILE);
        let entries = Self::load_from_file(&path);
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    fn load_from_file(path: &Path) -> HashMap<String, String> {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "storage file corrupt, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "storage file unreadable, starting empty");
                HashMap::new()
            }
        }
    }

    fn save_to_file(&self, entries: &HashMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries).map_err(CoreError::storage)?;
        fs::write(&self.path, json).map_err(CoreError::storage)
    }
}

#[async_trait]
impl KeyValueStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let snapshot = {
            let mut entries = self.entries.write();
            entries.insert(key.to_string(), value.to_string());
            entries.clone()
        };
        self.save_to_file(&snapshot)
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    async fn remove_many(&self, keys: &[String]) -> Result<()> {
        let snapshot = {
            let mut entries = self.entries.write();
            for key in keys {
                entries.remove(key);
            }
            entries.clone()
        };
        self.save_to_file(&snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        storage.set("a", "1").await.unwrap();
        assert_eq!(storage.get("a").await.unwrap(), Some("1".to_string()));
        assert_eq!(storage.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_storage_survives_reopen() {
        let dir = tempdir().unwrap();

        {
            let storage = FileStorage::open(dir.path()).unwrap();
            storage.set("profile:u1", "{\"x\":1}").await.unwrap();
            storage.set("conversations:u1", "[]").await.unwrap();
        }

        let storage = FileStorage::open(dir.path()).unwrap();
        assert_eq!(
            storage.get("profile:u1").await.unwrap(),
            Some("{\"x\":1}".to_string())
        );
        let mut keys = storage.list_keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["conversations:u1", "profile:u1"]);
    }

    #[tokio::test]
    async fn test_file_storage_remove_many() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        storage.set("a", "1").await.unwrap();
        storage.set("b", "2").await.unwrap();
        storage
            .remove_many(&["a".to_string(), "nope".to_string()])
            .await
            .unwrap();
        assert_eq!(storage.get("a").await.unwrap(), None);
        assert_eq!(storage.get("b").await.unwrap(), Some("2".to_string()));
    }

    #[tokio::test]
    async fn test_from_config_uses_data_dir() {
        let dir = tempdir().unwrap();
        let config = crate::config::CoreConfig::new(dir.path());

        let storage = FileStorage::from_config(&config).unwrap();
        storage.set("a", "1").await.unwrap();
        assert!(dir.path().join(STORAGE_FILE).exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(STORAGE_FILE), "{ not json").unwrap();

        let storage = FileStorage::open(dir.path()).unwrap();
        assert!(storage.list_keys().await.unwrap().is_empty());

        // And the store is usable afterwards
        storage.set("a", "1").await.unwrap();
        assert_eq!(storage.get("a").await.unwrap(), Some("1".to_string()));
    }
}
