use crate::common::SubscriberRef;
use crate::document::Document;
use crate::engine::StorageEngine;
use crate::errors::{ErrorKind, OlivineError, OlivineResult};
use crate::events::{ChangeEvent, ChangeKind, ChangeListener};
use crate::filter::Filter;
use crate::find_options::FindOptions;
use crate::join::{join_documents, Lookup};
use crate::keys::PrimaryKey;
use crate::olivine_builder::OlivineBuilder;
use crate::olivine_config::OlivineConfig;
use crate::olivine_id::OlivineId;
use crate::ops::cursor::{DocumentCursor, RecordCursor};
use crate::ops::{read, write, CollectionContext};
use crate::projection::inject_fields;
use crate::registration::Entity;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// An embedded document store.
///
/// An `Olivine` instance owns a set of collections declared up front on
/// the [builder]: typed record collections backed by an [`Entity`]
/// mapping, and schemaless document collections addressed by name. All
/// operations are synchronous and the handle is cheap to clone and share
/// across threads.
///
/// # Examples
///
/// ```rust,ignore
/// let db = Olivine::builder()
///     .register(
///         EntityRegistration::<Compound>::new("compounds")
///             .with_key("serial", KeyKind::I64),
///     )
///     .open()?;
///
/// db.insert(&Compound::new("caffeine"))?;
/// let found = db
///     .find::<Compound>(&field("name").eq("caffeine"), &FindOptions::new())?
///     .records()?;
///
/// db.close()?;
/// ```
///
/// [builder]: OlivineBuilder
#[derive(Clone)]
pub struct Olivine {
    inner: Arc<OlivineInner>,
}

impl std::fmt::Debug for Olivine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Olivine").finish_non_exhaustive()
    }
}

impl Olivine {
    /// Creates a builder for configuring and opening a store.
    pub fn builder() -> OlivineBuilder {
        OlivineBuilder::new()
    }

    pub(crate) fn open(config: OlivineConfig) -> OlivineResult<Olivine> {
        let OlivineConfig {
            engine,
            registrations,
            bindings,
        } = config;

        let mut contexts = HashMap::new();
        for data in registrations {
            let collection = engine.open_collection(&data.name)?;
            // The key index goes first so declared indexes cannot shadow it.
            if let Some(key) = &data.key {
                collection.create_index(key.field(), true)?;
            }
            for index in &data.indexes {
                collection.create_index(index.field(), index.is_unique())?;
            }
            contexts.insert(
                data.name.clone(),
                Arc::new(CollectionContext::new(data, collection)),
            );
        }

        Ok(Olivine {
            inner: Arc::new(OlivineInner {
                engine,
                contexts,
                bindings,
                closed: RwLock::new(false),
            }),
        })
    }

    // ----- mutation, typed ------------------------------------------------

    /// Inserts one record. Returns the number of records written.
    pub fn insert<T: Entity>(&self, record: &T) -> OlivineResult<u64> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for::<T>()?;
        let ids = write::insert_documents(&context, vec![record.to_document()?])?;
        Ok(ids.len() as u64)
    }

    /// Inserts a batch of records, all or nothing.
    pub fn insert_all<T: Entity>(&self, records: &[T]) -> OlivineResult<u64> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for::<T>()?;
        let mut documents = Vec::with_capacity(records.len());
        for record in records {
            documents.push(record.to_document()?);
        }
        let ids = write::insert_documents(&context, documents)?;
        Ok(ids.len() as u64)
    }

    /// Inserts or replaces one record, addressed by its key field.
    pub fn upsert<T: Entity>(&self, record: &T) -> OlivineResult<u64> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for::<T>()?;
        write::upsert_by_key(&context, record.to_document()?)?;
        Ok(1)
    }

    /// Upserts a batch of records. Every record must carry a set key.
    pub fn upsert_all<T: Entity>(&self, records: &[T]) -> OlivineResult<u64> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for::<T>()?;
        let descriptor = context.key_descriptor()?.clone();

        // Validate the whole batch before touching the store.
        let mut documents = Vec::with_capacity(records.len());
        for record in records {
            let document = record.to_document()?;
            let value = document.get(descriptor.field())?;
            if PrimaryKey::from_field_value(&value, descriptor.kind())?.is_none() {
                log::error!(
                    "Upsert into '{}' requires a set key for field '{}'",
                    context.name,
                    descriptor.field()
                );
                return Err(OlivineError::new(
                    &format!(
                        "Upsert into '{}' requires a set key for field '{}'",
                        context.name,
                        descriptor.field()
                    ),
                    ErrorKind::KeyViolation,
                ));
            }
            documents.push(document);
        }

        let affected = documents.len() as u64;
        for document in documents {
            write::upsert_by_key(&context, document)?;
        }
        Ok(affected)
    }

    /// Reads the record addressed by the key, applies the mutation, and
    /// writes it back. Returns 1 when the key existed, 0 otherwise.
    ///
    /// Concurrent calls on the same key serialize; calls on different
    /// keys do not block each other. The mutation must not change the
    /// key itself.
    pub fn modify<T, M>(&self, key: &PrimaryKey, mutate: M) -> OlivineResult<u64>
    where
        T: Entity,
        M: FnOnce(T) -> OlivineResult<T>,
    {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for::<T>()?;
        write::modify(&context, key, |document| {
            let record = T::from_document(&document)?;
            let updated = mutate(record)?;
            updated.to_document()
        })
    }

    /// Removes one record by its identity. Returns the number removed.
    pub fn remove<T: Entity>(&self, record: &T) -> OlivineResult<u64> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for::<T>()?;
        let descriptor = context.key_descriptor()?.clone();
        let document = record.to_document()?;
        let value = document.get(descriptor.field())?;
        let key = PrimaryKey::from_field_value(&value, descriptor.kind())?.ok_or_else(|| {
            log::error!(
                "Remove from '{}' requires a set key for field '{}'",
                context.name,
                descriptor.field()
            );
            OlivineError::new(
                &format!(
                    "Remove from '{}' requires a set key for field '{}'",
                    context.name,
                    descriptor.field()
                ),
                ErrorKind::KeyViolation,
            )
        })?;
        write::remove_by_key(&context, &key)
    }

    /// Removes a batch of records by their identities. Every record must
    /// carry a set key; keys that no longer exist are skipped, and the
    /// count reflects actual removals.
    pub fn remove_batch<T: Entity>(&self, records: &[T]) -> OlivineResult<u64> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for::<T>()?;
        let descriptor = context.key_descriptor()?.clone();

        // Validate the whole batch before touching the store.
        let mut keys = Vec::with_capacity(records.len());
        for record in records {
            let document = record.to_document()?;
            let value = document.get(descriptor.field())?;
            let key = PrimaryKey::from_field_value(&value, descriptor.kind())?.ok_or_else(|| {
                log::error!(
                    "Remove from '{}' requires a set key for field '{}'",
                    context.name,
                    descriptor.field()
                );
                OlivineError::new(
                    &format!(
                        "Remove from '{}' requires a set key for field '{}'",
                        context.name,
                        descriptor.field()
                    ),
                    ErrorKind::KeyViolation,
                )
            })?;
            keys.push(key);
        }

        let mut removed = 0;
        for key in &keys {
            removed += write::remove_by_key(&context, key)?;
        }
        Ok(removed)
    }

    /// Removes the record addressed by the key. Returns the number removed.
    pub fn remove_by_key<T: Entity>(&self, key: &PrimaryKey) -> OlivineResult<u64> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for::<T>()?;
        write::remove_by_key(&context, key)
    }

    /// Removes every record matching the filter. Returns the number removed.
    pub fn remove_all<T: Entity>(&self, filter: &Filter) -> OlivineResult<u64> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for::<T>()?;
        write::remove_all(&context, Some(filter))
    }

    // ----- query, typed ---------------------------------------------------

    /// Finds records matching the filter.
    pub fn find<T: Entity>(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> OlivineResult<RecordCursor<T>> {
        self.find_with_fields(filter, options, &[])
    }

    /// Finds records matching the filter, keeping the named optional
    /// fields in the results.
    pub fn find_with_fields<T: Entity>(
        &self,
        filter: &Filter,
        options: &FindOptions,
        fields: &[&str],
    ) -> OlivineResult<RecordCursor<T>> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for::<T>()?;
        let cursor = read::find(&context, Some(filter), options, &to_owned_fields(fields))?;
        Ok(RecordCursor::new(cursor))
    }

    /// Finds every record of the type.
    pub fn find_all<T: Entity>(&self, options: &FindOptions) -> OlivineResult<RecordCursor<T>> {
        self.find_all_with_fields(options, &[])
    }

    /// Finds every record of the type, keeping the named optional fields.
    pub fn find_all_with_fields<T: Entity>(
        &self,
        options: &FindOptions,
        fields: &[&str],
    ) -> OlivineResult<RecordCursor<T>> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for::<T>()?;
        let cursor = read::find(&context, None, options, &to_owned_fields(fields))?;
        Ok(RecordCursor::new(cursor))
    }

    /// Counts records matching the filter, honoring skip and limit caps.
    pub fn count<T: Entity>(&self, filter: &Filter, options: &FindOptions) -> OlivineResult<u64> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for::<T>()?;
        read::count(&context, Some(filter), options)
    }

    /// Counts every record of the type, honoring skip and limit caps.
    pub fn count_all<T: Entity>(&self, options: &FindOptions) -> OlivineResult<u64> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for::<T>()?;
        read::count(&context, None, options)
    }

    /// Point lookup by primary key. Absent keys return `None`.
    pub fn get_by_primary_key<T: Entity>(&self, key: &PrimaryKey) -> OlivineResult<Option<T>> {
        self.get_by_primary_key_with_fields(key, &[])
    }

    /// Point lookup by primary key, keeping the named optional fields.
    pub fn get_by_primary_key_with_fields<T: Entity>(
        &self,
        key: &PrimaryKey,
        fields: &[&str],
    ) -> OlivineResult<Option<T>> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for::<T>()?;
        context.check_key_kind(key)?;
        match read::get_by_key_value(&context, &key.to_value(), &to_owned_fields(fields))? {
            None => Ok(None),
            Some(document) => T::from_document(&document).map(Some),
        }
    }

    // ----- mutation, documents --------------------------------------------

    /// Inserts a batch of documents into a named collection, all or
    /// nothing. Returns the generated document ids in batch order.
    pub fn insert_documents(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> OlivineResult<Vec<OlivineId>> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for_name(collection)?;
        write::insert_documents(&context, documents)
    }

    /// Inserts or replaces one document, addressed by its id.
    pub fn upsert_document(
        &self,
        collection: &str,
        document: Document,
    ) -> OlivineResult<OlivineId> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for_name(collection)?;
        write::upsert_document(&context, document)
    }

    /// Removes one document by its id. Returns the number removed.
    pub fn remove_document(&self, collection: &str, id: &OlivineId) -> OlivineResult<u64> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for_name(collection)?;
        write::remove_by_id(&context, id)
    }

    /// Removes every document matching the filter. Returns the number
    /// removed.
    pub fn remove_documents(&self, collection: &str, filter: &Filter) -> OlivineResult<u64> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for_name(collection)?;
        write::remove_all(&context, Some(filter))
    }

    // ----- query, documents -----------------------------------------------

    /// Finds documents matching the filter.
    pub fn find_documents(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> OlivineResult<DocumentCursor> {
        self.find_documents_with_fields(collection, filter, options, &[])
    }

    /// Finds documents matching the filter, keeping the named optional
    /// fields in the results.
    pub fn find_documents_with_fields(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
        fields: &[&str],
    ) -> OlivineResult<DocumentCursor> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for_name(collection)?;
        read::find(&context, Some(filter), options, &to_owned_fields(fields))
    }

    /// Finds every document of a collection.
    pub fn find_all_documents(
        &self,
        collection: &str,
        options: &FindOptions,
    ) -> OlivineResult<DocumentCursor> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for_name(collection)?;
        read::find(&context, None, options, &[])
    }

    /// Counts documents matching the filter, honoring skip and limit caps.
    pub fn count_documents(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> OlivineResult<u64> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for_name(collection)?;
        read::count(&context, Some(filter), options)
    }

    /// Counts every document of a collection, honoring skip and limit caps.
    pub fn count_all_documents(
        &self,
        collection: &str,
        options: &FindOptions,
    ) -> OlivineResult<u64> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for_name(collection)?;
        read::count(&context, None, options)
    }

    /// Point lookup by document id. Absent ids return `None`.
    pub fn get_by_document_id(
        &self,
        collection: &str,
        id: &OlivineId,
    ) -> OlivineResult<Option<Document>> {
        self.get_by_document_id_with_fields(collection, id, &[])
    }

    /// Point lookup by document id, keeping the named optional fields.
    pub fn get_by_document_id_with_fields(
        &self,
        collection: &str,
        id: &OlivineId,
        fields: &[&str],
    ) -> OlivineResult<Option<Document>> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for_name(collection)?;
        read::get_by_id(&context, id, &to_owned_fields(fields))
    }

    // ----- joins ----------------------------------------------------------

    /// Attaches every matching child record to each parent, under the
    /// lookup's target field. Parents with no matching children keep the
    /// target field absent.
    pub fn join_all_children<P: Entity, C: Entity>(
        &self,
        parents: &[P],
        lookup: &Lookup,
    ) -> OlivineResult<Vec<Document>> {
        self.join_children_inner::<P, C>(parents, None, lookup)
    }

    /// Like [`join_all_children`], but only children matching the filter
    /// are attached. A filter no child can satisfy leaves every parent
    /// without the target field.
    ///
    /// [`join_all_children`]: Olivine::join_all_children
    pub fn join_children<P: Entity, C: Entity>(
        &self,
        parents: &[P],
        child_filter: &Filter,
        lookup: &Lookup,
    ) -> OlivineResult<Vec<Document>> {
        self.join_children_inner::<P, C>(parents, Some(child_filter), lookup)
    }

    fn join_children_inner<P: Entity, C: Entity>(
        &self,
        parents: &[P],
        child_filter: Option<&Filter>,
        lookup: &Lookup,
    ) -> OlivineResult<Vec<Document>> {
        let _state = self.inner.read_state()?;
        let child_context = self.inner.context_for::<C>()?;
        let children =
            read::find(&child_context, child_filter, &FindOptions::new(), &[])?.documents()?;

        let mut parent_documents = Vec::with_capacity(parents.len());
        for parent in parents {
            parent_documents.push(parent.to_document()?);
        }
        join_documents(parent_documents, &children, lookup)
    }

    /// Attaches matching documents of a child collection to each parent
    /// document.
    pub fn join_all_document_children(
        &self,
        parents: Vec<Document>,
        child_collection: &str,
        lookup: &Lookup,
    ) -> OlivineResult<Vec<Document>> {
        self.join_document_children_inner(parents, child_collection, None, lookup)
    }

    /// Like [`join_all_document_children`], restricted to children
    /// matching the filter.
    ///
    /// [`join_all_document_children`]: Olivine::join_all_document_children
    pub fn join_document_children(
        &self,
        parents: Vec<Document>,
        child_collection: &str,
        child_filter: &Filter,
        lookup: &Lookup,
    ) -> OlivineResult<Vec<Document>> {
        self.join_document_children_inner(parents, child_collection, Some(child_filter), lookup)
    }

    fn join_document_children_inner(
        &self,
        parents: Vec<Document>,
        child_collection: &str,
        child_filter: Option<&Filter>,
        lookup: &Lookup,
    ) -> OlivineResult<Vec<Document>> {
        let _state = self.inner.read_state()?;
        let child_context = self.inner.context_for_name(child_collection)?;
        let children =
            read::find(&child_context, child_filter, &FindOptions::new(), &[])?.documents()?;
        join_documents(parents, &children, lookup)
    }

    // ----- optional field injection ---------------------------------------

    /// Injects the named optional fields into a previously fetched
    /// record, reading their freshest stored values. Injection is
    /// idempotent; names that are not declared optional are ignored.
    pub fn inject_optional_fields<T: Entity>(
        &self,
        record: T,
        fields: &[&str],
    ) -> OlivineResult<T> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for::<T>()?;
        let descriptor = context.key_descriptor()?.clone();

        let mut document = record.to_document()?;
        let value = document.get(descriptor.field())?;
        let key = match PrimaryKey::from_field_value(&value, descriptor.kind())? {
            Some(key) => key,
            None => return Ok(record),
        };
        let stored = match read::find_raw_by_field(&context, descriptor.field(), &key.to_value())? {
            Some(stored) => stored,
            None => return Ok(record),
        };

        let declared = declared_fields(&context, fields);
        inject_fields(&mut document, &stored, &declared)?;
        T::from_document(&document)
    }

    /// Injects the named optional fields into a batch of records.
    pub fn inject_optional_fields_all<T: Entity>(
        &self,
        records: Vec<T>,
        fields: &[&str],
    ) -> OlivineResult<Vec<T>> {
        let mut injected = Vec::with_capacity(records.len());
        for record in records {
            injected.push(self.inject_optional_fields(record, fields)?);
        }
        Ok(injected)
    }

    /// Injects the named optional fields into a previously fetched
    /// document, addressed by its id.
    pub fn inject_document_fields(
        &self,
        collection: &str,
        mut document: Document,
        fields: &[&str],
    ) -> OlivineResult<Document> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for_name(collection)?;
        let id = match document.maybe_id() {
            Some(id) => id,
            None => return Ok(document),
        };
        let stored = match context.engine.get(&id)? {
            Some(stored) => stored,
            None => return Ok(document),
        };
        let declared = declared_fields(&context, fields);
        inject_fields(&mut document, &stored, &declared)?;
        Ok(document)
    }

    /// Injects the named optional fields into a batch of documents.
    pub fn inject_document_fields_all(
        &self,
        collection: &str,
        documents: Vec<Document>,
        fields: &[&str],
    ) -> OlivineResult<Vec<Document>> {
        let mut injected = Vec::with_capacity(documents.len());
        for document in documents {
            injected.push(self.inject_document_fields(collection, document, fields)?);
        }
        Ok(injected)
    }

    // ----- change events --------------------------------------------------

    /// Registers a listener for record inserts. The listener receives
    /// each inserted record, in write order.
    pub fn on_insert<T, F>(&self, listener: F) -> OlivineResult<SubscriberRef>
    where
        T: Entity,
        F: Fn(T) -> OlivineResult<()> + Send + Sync + 'static,
    {
        self.on_record_event(ChangeKind::Insert, listener)
    }

    /// Registers a listener for record updates.
    pub fn on_update<T, F>(&self, listener: F) -> OlivineResult<SubscriberRef>
    where
        T: Entity,
        F: Fn(T) -> OlivineResult<()> + Send + Sync + 'static,
    {
        self.on_record_event(ChangeKind::Update, listener)
    }

    /// Registers a listener for record removals. The listener receives
    /// each record as it stood before removal.
    pub fn on_remove<T, F>(&self, listener: F) -> OlivineResult<SubscriberRef>
    where
        T: Entity,
        F: Fn(T) -> OlivineResult<()> + Send + Sync + 'static,
    {
        self.on_record_event(ChangeKind::Remove, listener)
    }

    fn on_record_event<T, F>(&self, kind: ChangeKind, listener: F) -> OlivineResult<SubscriberRef>
    where
        T: Entity,
        F: Fn(T) -> OlivineResult<()> + Send + Sync + 'static,
    {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for::<T>()?;
        context.dispatcher.subscribe(ChangeListener::for_kind(
            kind,
            move |event: ChangeEvent| {
                let record = T::from_document(event.item())?;
                listener(record)
            },
        ))
    }

    /// Registers a listener for document inserts on a collection.
    pub fn on_document_insert<F>(&self, collection: &str, listener: F) -> OlivineResult<SubscriberRef>
    where
        F: Fn(ChangeEvent) -> OlivineResult<()> + Send + Sync + 'static,
    {
        self.on_document_event(collection, ChangeKind::Insert, listener)
    }

    /// Registers a listener for document updates on a collection.
    pub fn on_document_update<F>(&self, collection: &str, listener: F) -> OlivineResult<SubscriberRef>
    where
        F: Fn(ChangeEvent) -> OlivineResult<()> + Send + Sync + 'static,
    {
        self.on_document_event(collection, ChangeKind::Update, listener)
    }

    /// Registers a listener for document removals on a collection.
    pub fn on_document_remove<F>(&self, collection: &str, listener: F) -> OlivineResult<SubscriberRef>
    where
        F: Fn(ChangeEvent) -> OlivineResult<()> + Send + Sync + 'static,
    {
        self.on_document_event(collection, ChangeKind::Remove, listener)
    }

    fn on_document_event<F>(
        &self,
        collection: &str,
        kind: ChangeKind,
        listener: F,
    ) -> OlivineResult<SubscriberRef>
    where
        F: Fn(ChangeEvent) -> OlivineResult<()> + Send + Sync + 'static,
    {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for_name(collection)?;
        context
            .dispatcher
            .subscribe(ChangeListener::for_kind(kind, listener))
    }

    /// Removes a listener registered for a record type.
    pub fn unsubscribe<T: Entity>(&self, subscriber: SubscriberRef) -> OlivineResult<()> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for::<T>()?;
        context.dispatcher.unsubscribe(subscriber)
    }

    /// Removes a listener registered for a document collection.
    pub fn unsubscribe_collection(
        &self,
        collection: &str,
        subscriber: SubscriberRef,
    ) -> OlivineResult<()> {
        let _state = self.inner.read_state()?;
        let context = self.inner.context_for_name(collection)?;
        context.dispatcher.unsubscribe(subscriber)
    }

    // ----- lifecycle ------------------------------------------------------

    /// Flushes pending engine state to durable storage.
    pub fn flush(&self) -> OlivineResult<()> {
        let _state = self.inner.read_state()?;
        self.inner.engine.flush()
    }

    /// Closes the store, releasing engine resources.
    ///
    /// Close is not idempotent: a second call fails with
    /// [`ErrorKind::Closed`], as does any operation after the first.
    pub fn close(&self) -> OlivineResult<()> {
        let mut closed = self.inner.closed.write();
        if *closed {
            log::error!("Store is already closed");
            return Err(OlivineError::new(
                "Store is already closed",
                ErrorKind::Closed,
            ));
        }
        for context in self.inner.contexts.values() {
            context.dispatcher.close()?;
        }
        self.inner.engine.flush()?;
        self.inner.engine.close()?;
        *closed = true;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.read_recursive()
    }

    /// The engine's on-disk footprint in bytes. The in-memory engine
    /// reports zero.
    pub fn size_on_disk(&self) -> OlivineResult<u64> {
        let _state = self.inner.read_state()?;
        self.inner.engine.size_on_disk()
    }

    /// The names of all registered collections.
    pub fn collection_names(&self) -> OlivineResult<Vec<String>> {
        let _state = self.inner.read_state()?;
        let mut names: Vec<String> = self.inner.contexts.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Opaque implementation state behind the [`Olivine`] handle.
struct OlivineInner {
    engine: StorageEngine,
    contexts: HashMap<String, Arc<CollectionContext>>,
    bindings: HashMap<TypeId, String>,
    closed: RwLock<bool>,
}

impl OlivineInner {
    /// Guards an operation against a closed store. The returned read
    /// guard is recursive, so listeners running inside a write may issue
    /// further operations on the same thread.
    fn read_state(&self) -> OlivineResult<parking_lot::RwLockReadGuard<'_, bool>> {
        let guard = self.closed.read_recursive();
        if *guard {
            log::error!("Store is closed");
            return Err(OlivineError::new("Store is closed", ErrorKind::Closed));
        }
        Ok(guard)
    }

    fn context_for_name(&self, name: &str) -> OlivineResult<Arc<CollectionContext>> {
        self.contexts.get(name).cloned().ok_or_else(|| {
            log::error!("Collection '{}' is not registered with this store", name);
            OlivineError::new(
                &format!("Collection '{}' is not registered with this store", name),
                ErrorKind::Configuration,
            )
        })
    }

    fn context_for<T: Entity>(&self) -> OlivineResult<Arc<CollectionContext>> {
        let name = self.bindings.get(&TypeId::of::<T>()).ok_or_else(|| {
            log::error!("Record type is not registered with this store");
            OlivineError::new(
                "Record type is not registered with this store",
                ErrorKind::Configuration,
            )
        })?;
        self.context_for_name(name)
    }
}

impl Drop for OlivineInner {
    fn drop(&mut self) {
        if !*self.closed.get_mut() {
            let _ = self.engine.flush();
            let _ = self.engine.close();
        }
    }
}

fn to_owned_fields(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|field| field.to_string()).collect()
}

/// Restricts requested field names to the collection's declared optional
/// fields; undeclared names are silently dropped.
fn declared_fields(context: &CollectionContext, fields: &[&str]) -> Vec<String> {
    fields
        .iter()
        .filter(|field| {
            context
                .optional_fields
                .iter()
                .any(|declared| declared == *field)
        })
        .map(|field| field.to_string())
        .collect()
}
