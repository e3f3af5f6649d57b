//! Credential persistence for the CropWatch client.
//!
//! Two storage layers sit behind one interface:
//! - **fast**: in-process cache (`MemoryBackend`)
//! - **durable**: SQLite key/value table (`SqliteBackend`)
//!
//! `DualStore` mirrors every write to both and repairs the fast cache on read.

mod credentials;
mod dual;
mod keys;
mod memory;
mod sqlite;
mod token_cache;
mod traits;

pub use credentials::{CredentialRecord, CredentialStore, UserProfile, WriteTicket};
pub use dual::{DualStore, Layer};
pub use keys::StorageKeys;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
pub use token_cache::TokenCache;
pub use traits::StorageBackend;

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Key not found
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// One layer accepted the write, the other did not (even after a retry).
    #[error("Partial write: {failed} layer failed: {message}")]
    PartialWrite {
        failed: &'static str,
        message: String,
    },

    /// A newer write landed after the caller's ticket was issued.
    #[error("Stale write rejected")]
    StaleWrite,
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Open the dual store backed by a SQLite file and return the credential and
/// delivery-token views over it.
pub fn open_stores(path: &Path) -> StorageResult<(CredentialStore, TokenCache)> {
    let durable = SqliteBackend::open(path)?;
    Ok(stores_over(DualStore::new(
        Box::new(MemoryBackend::new()),
        Box::new(durable),
    )))
}

/// Build both views over an existing dual store.
pub fn stores_over(dual: DualStore) -> (CredentialStore, TokenCache) {
    let dual = Arc::new(dual);
    (CredentialStore::new(dual.clone()), TokenCache::new(dual))
}
