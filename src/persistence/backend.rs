//! Key/value storage backends
//!
//! A backend stores opaque strings under namespace keys, the same shape as
//! browser local storage. The store never talks to a backend directly; it goes
//! through a [`Persister`](super::Persister).

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::PersistError;

// ============================================================================
// Backend Trait
// ============================================================================

/// Trait for durable key/value storage
pub trait StorageBackend: Send + Sync {
    /// Read the value stored under `key`
    fn get_item(&self, key: &str) -> Result<Option<String>, PersistError>;

    /// Write (or overwrite) the value stored under `key`
    fn set_item(&self, key: &str, value: &str) -> Result<(), PersistError>;

    /// Remove `key`; removing a missing key is not an error
    fn remove_item(&self, key: &str) -> Result<(), PersistError>;
}

// ============================================================================
// In-Memory Backend
// ============================================================================

/// Process-local storage with an optional size quota
#[derive(Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects writes once keys and values exceed `bytes`
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            quota: Some(bytes),
        }
    }

    /// Total bytes currently stored (keys plus values)
    pub fn used_bytes(&self) -> usize {
        self.items
            .read()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), PersistError> {
        let mut items = self.items.write();

        if let Some(limit) = self.quota {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > limit {
                return Err(PersistError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    limit,
                });
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), PersistError> {
        self.items.write().remove(key);
        Ok(())
    }
}

// ============================================================================
// Filesystem Backend
// ============================================================================

/// One `<key>.json` file per key inside a directory
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Use `base_path`, creating it if needed
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn item_path(&self, key: &str) -> Result<PathBuf, PersistError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(PersistError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(format!("{}.json", key)))
    }

    fn write_file(path: &Path, value: &str) -> io::Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, PersistError> {
        let path = self.item_path(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), PersistError> {
        let path = self.item_path(key)?;
        let tmp_path = path.with_extension("json.tmp");

        let written =
            Self::write_file(&tmp_path, value).and_then(|()| fs::rename(&tmp_path, &path));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&tmp_path) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    tracing::debug!(
                        path = %tmp_path.display(),
                        error = %cleanup,
                        "Failed to remove temp file"
                    );
                }
            }
            return Err(e.into());
        }

        tracing::trace!(key = %key, bytes = value.len(), path = %path.display(), "Wrote storage item");
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), PersistError> {
        let path = self.item_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
