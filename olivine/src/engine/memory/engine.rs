use crate::engine::memory::collection::InMemoryCollection;
use crate::engine::{EngineCollection, StorageEngine, StorageEngineProvider};
use crate::errors::{ErrorKind, OlivineError, OlivineResult};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A storage engine holding all collections in process memory.
///
/// This is the default engine. It keeps no on-disk state, so `flush` is a
/// no-op and `size_on_disk` reports zero. `close` marks the engine and
/// every collection opened through it as unusable.
pub struct InMemoryEngine {
    inner: Arc<InMemoryEngineInner>,
}

struct InMemoryEngineInner {
    collections: DashMap<String, EngineCollection>,
    closed: Arc<AtomicBool>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        InMemoryEngine {
            inner: Arc::new(InMemoryEngineInner {
                collections: DashMap::new(),
                closed: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    /// Wraps a fresh in-memory engine in the engine handle.
    pub fn create() -> StorageEngine {
        StorageEngine::new(InMemoryEngine::new())
    }

    fn check_opened(&self) -> OlivineResult<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            log::error!("Storage engine used after close");
            return Err(OlivineError::new(
                "Storage engine used after close",
                ErrorKind::Closed,
            ));
        }
        Ok(())
    }
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        InMemoryEngine::new()
    }
}

impl StorageEngineProvider for InMemoryEngine {
    fn open_collection(&self, name: &str) -> OlivineResult<EngineCollection> {
        self.check_opened()?;
        if name.is_empty() {
            return Err(OlivineError::new(
                "Collection name cannot be empty",
                ErrorKind::InvalidOperation,
            ));
        }
        let collection = self
            .inner
            .collections
            .entry(name.to_string())
            .or_insert_with(|| {
                EngineCollection::new(InMemoryCollection::new(name, self.inner.closed.clone()))
            })
            .clone();
        Ok(collection)
    }

    fn collection_names(&self) -> OlivineResult<Vec<String>> {
        self.check_opened()?;
        Ok(self
            .inner
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .collect())
    }

    fn flush(&self) -> OlivineResult<()> {
        self.check_opened()?;
        Ok(())
    }

    fn close(&self) -> OlivineResult<()> {
        self.inner.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn size_on_disk(&self) -> OlivineResult<u64> {
        self.check_opened()?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_open_collection_returns_same_instance() {
        let engine = InMemoryEngine::new();
        let first = engine.open_collection("records").unwrap();
        let second = engine.open_collection("records").unwrap();

        let mut document = doc! { name: "shared" };
        document.id().unwrap();
        first.insert_batch(vec![document]).unwrap();
        assert_eq!(second.size().unwrap(), 1);
    }

    #[test]
    fn test_collection_names() {
        let engine = InMemoryEngine::new();
        engine.open_collection("a").unwrap();
        engine.open_collection("b").unwrap();

        let mut names = engine.collection_names().unwrap();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_empty_collection_name_is_rejected() {
        let engine = InMemoryEngine::new();
        assert!(engine.open_collection("").is_err());
    }

    #[test]
    fn test_close_poisons_open_collections() {
        let engine = InMemoryEngine::new();
        let collection = engine.open_collection("records").unwrap();
        assert!(!engine.is_closed());

        engine.close().unwrap();
        assert!(engine.is_closed());
        assert!(engine.open_collection("records").is_err());
        assert!(collection.size().is_err());
    }

    #[test]
    fn test_flush_and_size_on_disk() {
        let engine = InMemoryEngine::new();
        engine.flush().unwrap();
        assert_eq!(engine.size_on_disk().unwrap(), 0);
    }
}
