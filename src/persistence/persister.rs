//! Versioned state envelope over a storage backend
//!
//! State is written as `{"state": <T>, "version": <n>}` under a fixed
//! namespace key. Loading never fails: absent, unparseable or newer-version
//! data all come back as `None`.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{PersistError, StorageBackend};

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    state: &'a T,
    version: u32,
}

#[derive(Deserialize)]
struct Envelope<T> {
    state: T,
    #[serde(default)]
    version: u32,
}

/// Loads and saves one value of type `T` under a namespace
pub struct Persister<T> {
    backend: Arc<dyn StorageBackend>,
    name: String,
    version: u32,
    _state: PhantomData<fn() -> T>,
}

impl<T> Clone for Persister<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            name: self.name.clone(),
            version: self.version,
            _state: PhantomData,
        }
    }
}

impl<T> Persister<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Persister for namespace `name` at format version 0
    pub fn new(backend: Arc<dyn StorageBackend>, name: &str) -> Self {
        Self {
            backend,
            name: name.to_string(),
            version: 0,
            _state: PhantomData,
        }
    }

    /// Set the format version written and accepted by this persister
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Namespace key
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Load the stored state, if there is a usable one
    pub fn load(&self) -> Option<T> {
        let raw = match self.backend.get_item(&self.name) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(namespace = %self.name, "No persisted state");
                return None;
            }
            Err(e) => {
                tracing::warn!(namespace = %self.name, error = %e, "Failed to read persisted state");
                return None;
            }
        };

        let envelope: Envelope<T> = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(namespace = %self.name, error = %e, "Discarding unparseable persisted state");
                return None;
            }
        };

        if envelope.version > self.version {
            tracing::warn!(
                namespace = %self.name,
                stored = envelope.version,
                supported = self.version,
                "Discarding persisted state from a newer format version"
            );
            return None;
        }

        Some(envelope.state)
    }

    /// Write `state`, replacing whatever was stored
    pub fn save(&self, state: &T) -> Result<(), PersistError> {
        let json = serde_json::to_string(&EnvelopeRef {
            state,
            version: self.version,
        })?;
        self.backend.set_item(&self.name, &json)
    }

    /// Remove the stored state
    pub fn clear(&self) -> Result<(), PersistError> {
        self.backend.remove_item(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStorage;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Counter {
        count: u32,
        #[serde(default)]
        label: Option<String>,
    }

    fn persister(storage: &Arc<MemoryStorage>) -> Persister<Counter> {
        Persister::new(storage.clone() as Arc<dyn StorageBackend>, "counter")
    }

    #[test]
    fn test_save_and_load() {
        let storage = Arc::new(MemoryStorage::new());
        let persister = persister(&storage);

        assert_eq!(persister.load(), None);

        persister
            .save(&Counter {
                count: 3,
                label: None,
            })
            .unwrap();

        assert_eq!(
            storage.get_item("counter").unwrap().as_deref(),
            Some(r#"{"state":{"count":3,"label":null},"version":0}"#)
        );
        assert_eq!(
            persister.load(),
            Some(Counter {
                count: 3,
                label: None
            })
        );
    }

    #[test]
    fn test_load_tolerates_unknown_and_missing_fields() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set_item("counter", r#"{"state":{"count":7,"extra":true}}"#)
            .unwrap();

        assert_eq!(
            persister(&storage).load(),
            Some(Counter {
                count: 7,
                label: None
            })
        );
    }

    #[test]
    fn test_load_corrupt_data() {
        let storage = Arc::new(MemoryStorage::new());
        let persister = persister(&storage);

        for raw in ["not json", "{}", r#"{"state":{"count":"seven"}}"#, "null"] {
            storage.set_item("counter", raw).unwrap();
            assert_eq!(persister.load(), None, "raw = {}", raw);
        }
    }

    #[test]
    fn test_newer_version_is_discarded() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set_item("counter", r#"{"state":{"count":1},"version":2}"#)
            .unwrap();

        assert_eq!(persister(&storage).load(), None);
        assert_eq!(
            persister(&storage).with_version(2).load(),
            Some(Counter {
                count: 1,
                label: None
            })
        );
    }

    #[test]
    fn test_clear() {
        let storage = Arc::new(MemoryStorage::new());
        let persister = persister(&storage);

        persister
            .save(&Counter {
                count: 1,
                label: None,
            })
            .unwrap();
        persister.clear().unwrap();

        assert_eq!(persister.load(), None);
    }
}
