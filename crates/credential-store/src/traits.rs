//! Storage trait definitions.

use crate::StorageResult;

/// A single persistence layer holding string values by key.
pub trait StorageBackend: Send + Sync {
    /// Short layer name used in logs and errors ("fast", "durable", ...).
    fn name(&self) -> &'static str;

    /// Store a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value. Returns whether something was removed.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
