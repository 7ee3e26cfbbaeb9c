use crate::common::Value;
use crate::document::{Document, DOC_ID};
use crate::engine::EngineCollectionProvider;
use crate::errors::{ErrorKind, OlivineError, OlivineResult};
use crate::olivine_id::OlivineId;
use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use parking_lot::Mutex;
use smallvec::{smallvec, SmallVec};
use std::collections::HashSet;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

type IdList = SmallVec<[OlivineId; 4]>;

struct IndexStore {
    unique: bool,
    entries: SkipMap<Value, IdList>,
}

impl IndexStore {
    fn new(unique: bool) -> Self {
        IndexStore {
            unique,
            entries: SkipMap::new(),
        }
    }

    fn add(&self, value: Value, id: OlivineId) {
        match self.entries.get(&value) {
            Some(entry) => {
                let mut ids = entry.value().clone();
                if !ids.contains(&id) {
                    ids.push(id);
                }
                self.entries.insert(value, ids);
            }
            None => {
                self.entries.insert(value, smallvec![id]);
            }
        }
    }

    fn remove(&self, value: &Value, id: &OlivineId) {
        if let Some(entry) = self.entries.get(value) {
            let mut ids = entry.value().clone();
            ids.retain(|existing| existing != id);
            if ids.is_empty() {
                self.entries.remove(value);
            } else {
                self.entries.insert(value.clone(), ids);
            }
        }
    }

    fn occupied_by_other(&self, value: &Value, id: &OlivineId) -> bool {
        match self.entries.get(value) {
            Some(entry) => entry.value().iter().any(|existing| existing != id),
            None => false,
        }
    }
}

/// An in-memory engine collection.
///
/// The primary map is a lock-free skip list keyed by id, so reads and
/// scans never block. Mutations serialize on a collection-wide mutex and
/// follow a validate-then-apply discipline: a batch that would violate a
/// unique index is rejected before any document or index entry changes.
pub(crate) struct InMemoryCollection {
    inner: Arc<InMemoryCollectionInner>,
}

struct InMemoryCollectionInner {
    name: String,
    primary: SkipMap<OlivineId, Document>,
    indexes: DashMap<String, IndexStore>,
    sequence: AtomicU64,
    write_lock: Mutex<()>,
    closed: Arc<AtomicBool>,
}

impl InMemoryCollection {
    pub(crate) fn new(name: &str, closed: Arc<AtomicBool>) -> Self {
        InMemoryCollection {
            inner: Arc::new(InMemoryCollectionInner {
                name: name.to_string(),
                primary: SkipMap::new(),
                indexes: DashMap::new(),
                sequence: AtomicU64::new(0),
                write_lock: Mutex::new(()),
                closed,
            }),
        }
    }
}

impl InMemoryCollectionInner {
    fn check_opened(&self) -> OlivineResult<()> {
        if self.closed.load(Ordering::Acquire) {
            log::error!("Collection '{}' used after close", self.name);
            return Err(OlivineError::new(
                &format!("Collection '{}' used after close", self.name),
                ErrorKind::Closed,
            ));
        }
        Ok(())
    }

    /// The indexable value of a field; absent values are not indexed.
    fn index_value(document: &Document, field: &str) -> OlivineResult<Option<Value>> {
        let value = document.get(field)?;
        if value.is_null() {
            Ok(None)
        } else {
            Ok(Some(value))
        }
    }

    fn add_index_entries(&self, document: &Document, id: OlivineId) -> OlivineResult<()> {
        for index in self.indexes.iter() {
            if let Some(value) = Self::index_value(document, index.key())? {
                index.value().add(value, id);
            }
        }
        Ok(())
    }

    fn remove_index_entries(&self, document: &Document, id: &OlivineId) -> OlivineResult<()> {
        for index in self.indexes.iter() {
            if let Some(value) = Self::index_value(document, index.key())? {
                index.value().remove(&value, id);
            }
        }
        Ok(())
    }
}

impl EngineCollectionProvider for InMemoryCollection {
    fn name(&self) -> String {
        self.inner.name.clone()
    }

    fn size(&self) -> OlivineResult<u64> {
        self.inner.check_opened()?;
        Ok(self.inner.primary.len() as u64)
    }

    fn contains(&self, id: &OlivineId) -> OlivineResult<bool> {
        self.inner.check_opened()?;
        Ok(self.inner.primary.contains_key(id))
    }

    fn get(&self, id: &OlivineId) -> OlivineResult<Option<Document>> {
        self.inner.check_opened()?;
        Ok(self.inner.primary.get(id).map(|entry| entry.value().clone()))
    }

    fn first_id(&self) -> OlivineResult<Option<OlivineId>> {
        self.inner.check_opened()?;
        Ok(self.inner.primary.front().map(|entry| *entry.key()))
    }

    fn next_id(&self, after: &OlivineId) -> OlivineResult<Option<OlivineId>> {
        self.inner.check_opened()?;
        Ok(self
            .inner
            .primary
            .range((Bound::Excluded(*after), Bound::Unbounded))
            .next()
            .map(|entry| *entry.key()))
    }

    fn insert_batch(&self, documents: Vec<Document>) -> OlivineResult<()> {
        self.inner.check_opened()?;
        let _guard = self.inner.write_lock.lock();

        // Validation phase: nothing is applied until the whole batch passes.
        let mut ids = Vec::with_capacity(documents.len());
        let mut batch_ids = HashSet::new();
        for document in &documents {
            let id = document.maybe_id().ok_or_else(|| {
                log::error!("Document in batch carries no id");
                OlivineError::new("Document in batch carries no id", ErrorKind::Internal)
            })?;
            ids.push(id);
            if self.inner.primary.contains_key(&id) || !batch_ids.insert(id) {
                log::error!("Duplicate document id {} in collection '{}'", id, self.inner.name);
                return Err(OlivineError::new(
                    &format!("Duplicate document id {} in collection '{}'", id, self.inner.name),
                    ErrorKind::UniqueViolation(DOC_ID.to_string()),
                ));
            }
        }

        for index in self.inner.indexes.iter() {
            if !index.value().unique {
                continue;
            }
            let field = index.key();
            let mut batch_values = HashSet::new();
            for document in &documents {
                if let Some(value) = InMemoryCollectionInner::index_value(document, field)? {
                    if index.value().entries.contains_key(&value) || !batch_values.insert(value) {
                        log::error!(
                            "Unique constraint violation on field '{}' in collection '{}'",
                            field,
                            self.inner.name
                        );
                        return Err(OlivineError::new(
                            &format!(
                                "Unique constraint violation on field '{}' in collection '{}'",
                                field, self.inner.name
                            ),
                            ErrorKind::UniqueViolation(field.clone()),
                        ));
                    }
                }
            }
        }

        // Apply phase: cannot fail on constraints anymore.
        for (id, document) in ids.into_iter().zip(documents) {
            self.inner.add_index_entries(&document, id)?;
            self.inner.primary.insert(id, document);
        }
        Ok(())
    }

    fn replace(&self, id: &OlivineId, document: Document) -> OlivineResult<bool> {
        self.inner.check_opened()?;
        let _guard = self.inner.write_lock.lock();

        let old = match self.inner.primary.get(id) {
            Some(entry) => entry.value().clone(),
            None => return Ok(false),
        };

        for index in self.inner.indexes.iter() {
            if !index.value().unique {
                continue;
            }
            let field = index.key();
            if let Some(value) = InMemoryCollectionInner::index_value(&document, field)? {
                if index.value().occupied_by_other(&value, id) {
                    log::error!(
                        "Unique constraint violation on field '{}' in collection '{}'",
                        field,
                        self.inner.name
                    );
                    return Err(OlivineError::new(
                        &format!(
                            "Unique constraint violation on field '{}' in collection '{}'",
                            field, self.inner.name
                        ),
                        ErrorKind::UniqueViolation(field.clone()),
                    ));
                }
            }
        }

        self.inner.remove_index_entries(&old, id)?;
        self.inner.add_index_entries(&document, *id)?;
        self.inner.primary.insert(*id, document);
        Ok(true)
    }

    fn remove(&self, id: &OlivineId) -> OlivineResult<Option<Document>> {
        self.inner.check_opened()?;
        let _guard = self.inner.write_lock.lock();

        let entry = match self.inner.primary.remove(id) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        let document = entry.value().clone();
        self.inner.remove_index_entries(&document, id)?;
        Ok(Some(document))
    }

    fn create_index(&self, field: &str, unique: bool) -> OlivineResult<()> {
        self.inner.check_opened()?;
        if field.is_empty() {
            return Err(OlivineError::new(
                "Index field name cannot be empty",
                ErrorKind::InvalidOperation,
            ));
        }
        let _guard = self.inner.write_lock.lock();

        if self.inner.indexes.contains_key(field) {
            return Ok(());
        }

        // Build the full store first so a failure leaves no partial index.
        let store = IndexStore::new(unique);
        for entry in self.inner.primary.iter() {
            if let Some(value) = InMemoryCollectionInner::index_value(entry.value(), field)? {
                if unique && store.entries.contains_key(&value) {
                    log::error!(
                        "Cannot build unique index on field '{}': duplicate value in collection '{}'",
                        field,
                        self.inner.name
                    );
                    return Err(OlivineError::new(
                        &format!(
                            "Cannot build unique index on field '{}': duplicate value in collection '{}'",
                            field, self.inner.name
                        ),
                        ErrorKind::UniqueViolation(field.to_string()),
                    ));
                }
                store.add(value, *entry.key());
            }
        }
        self.inner.indexes.insert(field.to_string(), store);
        Ok(())
    }

    fn has_index(&self, field: &str) -> OlivineResult<bool> {
        self.inner.check_opened()?;
        Ok(self.inner.indexes.contains_key(field))
    }

    fn next_sequence(&self) -> OlivineResult<u64> {
        self.inner.check_opened()?;
        Ok(self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }
}
