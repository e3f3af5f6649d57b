//! Dual-layer persistence: a fast cache in front of a durable store.
//!
//! `DualStore` is the only type that touches the two layers. Writes go to
//! both; reads prefer the fast cache and repair it from the durable copy.

use crate::{StorageBackend, StorageError, StorageResult};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Which persistence layer an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Fast,
    Durable,
}

/// Two storage layers kept in sync from a single call site.
pub struct DualStore {
    fast: Box<dyn StorageBackend>,
    durable: Box<dyn StorageBackend>,
}

impl DualStore {
    pub fn new(fast: Box<dyn StorageBackend>, durable: Box<dyn StorageBackend>) -> Self {
        Self { fast, durable }
    }

    /// Direct access to one layer, used to inspect each copy independently.
    pub fn layer(&self, layer: Layer) -> &dyn StorageBackend {
        match layer {
            Layer::Fast => self.fast.as_ref(),
            Layer::Durable => self.durable.as_ref(),
        }
    }

    /// Write a value to both layers.
    ///
    /// Each failing layer is retried once. If a layer still fails the write
    /// is reported as partial while the other copy stays in place.
    pub fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        let fast = set_with_retry(self.fast.as_ref(), key, value);
        let durable = set_with_retry(self.durable.as_ref(), key, value);

        match (fast, durable) {
            (Ok(()), Ok(())) => {
                debug!(key, "Value written to both layers");
                Ok(())
            }
            (Err(fast_err), Err(durable_err)) => {
                warn!(key, fast = %fast_err, durable = %durable_err, "Write failed on both layers");
                Err(durable_err)
            }
            (Err(e), Ok(())) => {
                warn!(key, layer = self.fast.name(), error = %e, "Write degraded, durable copy only");
                Err(StorageError::PartialWrite {
                    failed: self.fast.name(),
                    message: e.to_string(),
                })
            }
            (Ok(()), Err(e)) => {
                warn!(key, layer = self.durable.name(), error = %e, "Write degraded, fast copy only");
                Err(StorageError::PartialWrite {
                    failed: self.durable.name(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Read a raw value, repairing the fast cache from the durable copy.
    pub fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match self.fast.get(key) {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => {}
            Err(e) => warn!(key, error = %e, "Fast cache read failed, falling back"),
        }
        self.read_durable_and_repair(key)
    }

    /// Read and decode a JSON value. A corrupt fast-cache entry counts as a
    /// miss and is repaired from the durable copy.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.fast.get(key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => warn!(key, error = %e, "Corrupt fast cache entry, repairing"),
            },
            Ok(None) => {}
            Err(e) => warn!(key, error = %e, "Fast cache read failed, falling back"),
        }

        match self.read_durable_and_repair(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StorageError::Encoding(e.to_string())),
            None => Ok(None),
        }
    }

    /// Remove a key from both layers. Missing entries are not an error.
    pub fn remove(&self, key: &str) -> StorageResult<()> {
        let fast = self.fast.delete(key);
        let durable = self.durable.delete(key);

        if let Err(ref e) = fast {
            warn!(key, layer = self.fast.name(), error = %e, "Delete failed");
        }
        if let Err(ref e) = durable {
            warn!(key, layer = self.durable.name(), error = %e, "Delete failed");
        }

        fast?;
        durable?;
        Ok(())
    }

    fn read_durable_and_repair(&self, key: &str) -> StorageResult<Option<String>> {
        let Some(value) = self.durable.get(key)? else {
            return Ok(None);
        };

        if let Err(e) = self.fast.set(key, &value) {
            warn!(key, error = %e, "Failed to repair fast cache");
        } else {
            debug!(key, "Fast cache repaired from durable copy");
        }
        Ok(Some(value))
    }
}

fn set_with_retry(backend: &dyn StorageBackend, key: &str, value: &str) -> StorageResult<()> {
    match backend.set(key, value) {
        Ok(()) => Ok(()),
        Err(first) => {
            debug!(key, layer = backend.name(), error = %first, "Write failed, retrying once");
            backend.set(key, value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Backend that fails the first `failures` writes.
    struct FlakyBackend {
        inner: MemoryBackend,
        failures: AtomicUsize,
        attempts: Arc<AtomicUsize>,
    }

    impl FlakyBackend {
        fn new(failures: usize) -> (Self, Arc<AtomicUsize>) {
            let attempts = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    inner: MemoryBackend::new(),
                    failures: AtomicUsize::new(failures),
                    attempts: attempts.clone(),
                },
                attempts,
            )
        }
    }

    impl StorageBackend for FlakyBackend {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StorageError::Platform("quota exceeded".to_string()));
            }
            self.inner.set(key, value)
        }

        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            self.inner.get(key)
        }

        fn delete(&self, key: &str) -> StorageResult<bool> {
            self.inner.delete(key)
        }
    }

    fn memory_pair() -> DualStore {
        DualStore::new(Box::new(MemoryBackend::new()), Box::new(MemoryBackend::new()))
    }

    #[test]
    fn test_put_writes_both_layers() {
        let store = memory_pair();
        store.put("k", "v").unwrap();

        assert_eq!(store.layer(Layer::Fast).get("k").unwrap(), Some("v".into()));
        assert_eq!(store.layer(Layer::Durable).get("k").unwrap(), Some("v".into()));
    }

    #[test]
    fn test_put_retries_failed_layer_once() {
        let (flaky, attempts) = FlakyBackend::new(1);
        let store = DualStore::new(Box::new(flaky), Box::new(MemoryBackend::new()));

        store.put("k", "v").unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(store.layer(Layer::Fast).get("k").unwrap(), Some("v".into()));
    }

    #[test]
    fn test_put_reports_partial_write_and_keeps_other_copy() {
        let (flaky, attempts) = FlakyBackend::new(5);
        let store = DualStore::new(Box::new(MemoryBackend::new()), Box::new(flaky));

        let err = store.put("k", "v").unwrap_err();
        assert!(matches!(err, StorageError::PartialWrite { failed: "flaky", .. }));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(store.layer(Layer::Fast).get("k").unwrap(), Some("v".into()));
    }

    #[test]
    fn test_get_repairs_fast_cache() {
        let store = memory_pair();
        store.layer(Layer::Durable).set("k", "v").unwrap();

        assert_eq!(store.get("k").unwrap(), Some("v".into()));
        assert_eq!(store.layer(Layer::Fast).get("k").unwrap(), Some("v".into()));
    }

    #[test]
    fn test_get_json_treats_corrupt_fast_entry_as_miss() {
        let store = memory_pair();
        store.layer(Layer::Fast).set("k", "{not json").unwrap();
        store.layer(Layer::Durable).set("k", "[1,2,3]").unwrap();

        let value: Vec<u32> = store.get_json("k").unwrap().unwrap();
        assert_eq!(value, vec![1, 2, 3]);
        assert_eq!(
            store.layer(Layer::Fast).get("k").unwrap(),
            Some("[1,2,3]".into())
        );
    }

    #[test]
    fn test_remove_tolerates_empty_layers() {
        let store = memory_pair();
        store.remove("missing").unwrap();

        store.layer(Layer::Durable).set("k", "v").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
