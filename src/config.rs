//! Configuration management for the annotation server

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::persistence::{FileStorage, PersistError, StorageBackend};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    /// Directory for the file backend
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageProvider {
    /// One JSON file per namespace under `path`
    File,
    /// Nothing persisted; state lives for the process lifetime
    Memory,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid SERVER_PORT: {0}")]
    InvalidPort(String),

    #[error("Unknown STORAGE_BACKEND: {0}")]
    UnknownBackend(String),

    #[error("STORAGE_BACKEND=file requires STORAGE_DIR")]
    MissingStorageDir,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            storage: StorageConfig {
                provider: StorageProvider::Memory,
                path: None,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match var("SERVER_PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            None => 3000,
        };

        let path = var("STORAGE_DIR").map(PathBuf::from);
        let provider = match var("STORAGE_BACKEND").map(|v| v.to_lowercase()) {
            Some(name) if name == "file" => StorageProvider::File,
            Some(name) if name == "memory" => StorageProvider::Memory,
            Some(name) => return Err(ConfigError::UnknownBackend(name)),
            None if path.is_some() => StorageProvider::File,
            None => StorageProvider::Memory,
        };

        if provider == StorageProvider::File && path.is_none() {
            return Err(ConfigError::MissingStorageDir);
        }

        Ok(Config {
            server: ServerConfig {
                host: var("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port,
            },
            storage: StorageConfig { provider, path },
        })
    }

    /// Open the configured backend; `None` means memory-only stores
    pub fn storage_backend(&self) -> Result<Option<Arc<dyn StorageBackend>>, PersistError> {
        match (self.storage.provider, &self.storage.path) {
            (StorageProvider::File, Some(path)) => {
                let storage = FileStorage::new(path)?;
                Ok(Some(Arc::new(storage)))
            }
            _ => Ok(None),
        }
    }
}
