//! Cached push delivery token.

use crate::{DualStore, StorageKeys, StorageResult};
use std::sync::Arc;

/// Locally cached delivery token, stored alongside the credential record.
#[derive(Clone)]
pub struct TokenCache {
    inner: Arc<DualStore>,
}

impl TokenCache {
    pub fn new(inner: Arc<DualStore>) -> Self {
        Self { inner }
    }

    pub fn get(&self) -> StorageResult<Option<String>> {
        self.inner.get(StorageKeys::DELIVERY_TOKEN)
    }

    pub fn set(&self, token: &str) -> StorageResult<()> {
        self.inner.put(StorageKeys::DELIVERY_TOKEN, token)
    }

    pub fn clear(&self) -> StorageResult<()> {
        self.inner.remove(StorageKeys::DELIVERY_TOKEN)
    }
}
