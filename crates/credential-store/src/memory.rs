//! In-process fast cache layer.

use crate::{StorageBackend, StorageResult};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Volatile key/value layer. Contents vanish with the process, which is the
/// same failure mode as a browser dropping its synchronous storage.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "fast"
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.data.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.data.lock().remove(key).is_some())
    }
}
