//! Persistence module
//!
//! Stores are handed a [`Persister`] rather than owning storage themselves,
//! so the backend can be swapped (files, memory) and tests run without any
//! real durable storage.

mod backend;
mod persister;

use thiserror::Error;

pub use backend::{FileStorage, MemoryStorage, StorageBackend};
pub use persister::Persister;

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Quota exceeded writing {key}: {needed} bytes needed, limit {limit}")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },

    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),
}
