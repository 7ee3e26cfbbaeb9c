//! The narrow storage-engine boundary the facade drives.
//!
//! An engine stores documents keyed by [`OlivineId`](crate::olivine_id::OlivineId),
//! enforces unique indexes atomically per write batch, and hands out
//! monotonic per-collection sequences for auto-assigned keys. Everything
//! else (filter compilation, sorting, pagination, projection, joins,
//! events) lives above this boundary.

pub mod memory;
pub mod predicate;

use crate::document::Document;
use crate::errors::OlivineResult;
use crate::olivine_id::OlivineId;
use std::sync::Arc;

pub use predicate::{CompareMode, Predicate, PredicateProvider};

/// The behavior of a storage engine: a named set of collections plus
/// lifecycle operations.
pub trait StorageEngineProvider: Send + Sync {
    /// Opens a collection, creating it if it does not exist yet.
    fn open_collection(&self, name: &str) -> OlivineResult<EngineCollection>;

    fn collection_names(&self) -> OlivineResult<Vec<String>>;

    /// Forces buffered state to durable storage.
    fn flush(&self) -> OlivineResult<()>;

    /// Closes the engine. Further use of any handle fails.
    fn close(&self) -> OlivineResult<()>;

    fn is_closed(&self) -> bool;

    /// Bytes the engine occupies on disk; zero for purely in-memory engines.
    fn size_on_disk(&self) -> OlivineResult<u64>;
}

/// Shared handle to a storage engine.
#[derive(Clone)]
pub struct StorageEngine {
    inner: Arc<dyn StorageEngineProvider>,
}

impl StorageEngine {
    pub fn new(provider: impl StorageEngineProvider + 'static) -> Self {
        StorageEngine {
            inner: Arc::new(provider),
        }
    }

    pub fn open_collection(&self, name: &str) -> OlivineResult<EngineCollection> {
        self.inner.open_collection(name)
    }

    pub fn collection_names(&self) -> OlivineResult<Vec<String>> {
        self.inner.collection_names()
    }

    pub fn flush(&self) -> OlivineResult<()> {
        self.inner.flush()
    }

    pub fn close(&self) -> OlivineResult<()> {
        self.inner.close()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn size_on_disk(&self) -> OlivineResult<u64> {
        self.inner.size_on_disk()
    }
}

/// The behavior of a single engine collection.
///
/// Mutations are atomic: `insert_batch` either applies every document or
/// none, and `replace` validates unique indexes before touching the
/// primary map. Reads may run concurrently with writes and see a
/// consistent point-in-time view of each document.
pub trait EngineCollectionProvider: Send + Sync {
    fn name(&self) -> String;

    fn size(&self) -> OlivineResult<u64>;

    fn contains(&self, id: &OlivineId) -> OlivineResult<bool>;

    fn get(&self, id: &OlivineId) -> OlivineResult<Option<Document>>;

    /// First id in the primary map, which is insertion order.
    fn first_id(&self) -> OlivineResult<Option<OlivineId>>;

    /// Smallest id strictly greater than `after`; drives lazy scans.
    fn next_id(&self, after: &OlivineId) -> OlivineResult<Option<OlivineId>>;

    /// Inserts a batch of documents, all or nothing. Every document must
    /// already carry its id. Unique-index collisions, either with stored
    /// documents or within the batch, reject the whole batch.
    fn insert_batch(&self, documents: Vec<Document>) -> OlivineResult<()>;

    /// Replaces the document stored under `id`. Returns false when no
    /// document with that id exists.
    fn replace(&self, id: &OlivineId, document: Document) -> OlivineResult<bool>;

    /// Removes and returns the document stored under `id`.
    fn remove(&self, id: &OlivineId) -> OlivineResult<Option<Document>>;

    /// Creates an index over `field`, building entries for documents
    /// already stored. Creating an index that already exists is a no-op.
    fn create_index(&self, field: &str, unique: bool) -> OlivineResult<()>;

    fn has_index(&self, field: &str) -> OlivineResult<bool>;

    /// Next value of this collection's monotonic sequence, starting at 1.
    fn next_sequence(&self) -> OlivineResult<u64>;
}

/// Shared handle to an engine collection.
#[derive(Clone)]
pub struct EngineCollection {
    inner: Arc<dyn EngineCollectionProvider>,
}

impl EngineCollection {
    pub fn new(provider: impl EngineCollectionProvider + 'static) -> Self {
        EngineCollection {
            inner: Arc::new(provider),
        }
    }

    pub fn name(&self) -> String {
        self.inner.name()
    }

    pub fn size(&self) -> OlivineResult<u64> {
        self.inner.size()
    }

    pub fn contains(&self, id: &OlivineId) -> OlivineResult<bool> {
        self.inner.contains(id)
    }

    pub fn get(&self, id: &OlivineId) -> OlivineResult<Option<Document>> {
        self.inner.get(id)
    }

    pub fn first_id(&self) -> OlivineResult<Option<OlivineId>> {
        self.inner.first_id()
    }

    pub fn next_id(&self, after: &OlivineId) -> OlivineResult<Option<OlivineId>> {
        self.inner.next_id(after)
    }

    pub fn insert_batch(&self, documents: Vec<Document>) -> OlivineResult<()> {
        self.inner.insert_batch(documents)
    }

    pub fn replace(&self, id: &OlivineId, document: Document) -> OlivineResult<bool> {
        self.inner.replace(id, document)
    }

    pub fn remove(&self, id: &OlivineId) -> OlivineResult<Option<Document>> {
        self.inner.remove(id)
    }

    pub fn create_index(&self, field: &str, unique: bool) -> OlivineResult<()> {
        self.inner.create_index(field, unique)
    }

    pub fn has_index(&self, field: &str) -> OlivineResult<bool> {
        self.inner.has_index(field)
    }

    pub fn next_sequence(&self) -> OlivineResult<u64> {
        self.inner.next_sequence()
    }
}
