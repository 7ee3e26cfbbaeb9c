use crate::common::get_current_time_or_zero;
use crate::document::{Document, DOC_ID, DOC_MODIFIED, DOC_REVISION};
use crate::errors::{ErrorKind, OlivineError, OlivineResult};
use crate::events::ChangeKind;
use crate::filter::{Filter, FilterCompiler};
use crate::keys::{resolve_insert_key, PrimaryKey};
use crate::olivine_id::OlivineId;
use crate::ops::cursor::{FilteredStream, ScanStream};
use crate::ops::read::find_raw_by_field;
use crate::ops::CollectionContext;

fn stamp_new(document: &mut Document) -> OlivineResult<()> {
    document.put(DOC_REVISION, 1u64)?;
    document.put(DOC_MODIFIED, get_current_time_or_zero() as u64)?;
    Ok(())
}

fn stamp_updated(document: &mut Document, previous_revision: u64) -> OlivineResult<()> {
    document.put(DOC_REVISION, previous_revision + 1)?;
    document.put(DOC_MODIFIED, get_current_time_or_zero() as u64)?;
    Ok(())
}

/// A unique violation on the key field is a key violation to callers;
/// violations on secondary indexes pass through untouched.
fn remap_key_violation(context: &CollectionContext, error: OlivineError) -> OlivineError {
    if let Some(descriptor) = &context.key {
        if let ErrorKind::UniqueViolation(field) = error.kind() {
            if field == descriptor.field() {
                return OlivineError::new_with_cause(
                    &format!(
                        "Duplicate key '{}' in collection '{}'",
                        descriptor.field(),
                        context.name
                    ),
                    ErrorKind::KeyViolation,
                    error,
                );
            }
        }
    }
    error
}

fn stored_id(context: &CollectionContext, document: &Document) -> OlivineResult<OlivineId> {
    document.maybe_id().ok_or_else(|| {
        log::error!("Stored document in '{}' carries no id", context.name);
        OlivineError::new(
            &format!("Stored document in '{}' carries no id", context.name),
            ErrorKind::Internal,
        )
    })
}

/// Inserts a batch of documents, resolving keys and stamping metadata.
///
/// The whole batch is applied or none of it is. One insert event per
/// document is published after the batch succeeds, in batch order.
pub(crate) fn insert_documents(
    context: &CollectionContext,
    documents: Vec<Document>,
) -> OlivineResult<Vec<OlivineId>> {
    let mut prepared = Vec::with_capacity(documents.len());
    let mut ids = Vec::with_capacity(documents.len());
    for mut document in documents {
        ids.push(document.id()?);
        if let Some(descriptor) = &context.key {
            resolve_insert_key(
                &mut document,
                descriptor,
                context.generator.as_ref(),
                &context.engine,
            )?;
        }
        stamp_new(&mut document)?;
        prepared.push(document);
    }

    context
        .engine
        .insert_batch(prepared.clone())
        .map_err(|e| remap_key_violation(context, e))?;

    for document in prepared {
        context
            .dispatcher
            .dispatch(ChangeKind::Insert, document, &context.name);
    }
    Ok(ids)
}

/// Inserts a single document whose key, if any, is already in place.
/// The key generator is not consulted.
fn insert_prepared(context: &CollectionContext, mut document: Document) -> OlivineResult<OlivineId> {
    let id = document.id()?;
    stamp_new(&mut document)?;
    context
        .engine
        .insert_batch(vec![document.clone()])
        .map_err(|e| remap_key_violation(context, e))?;
    context
        .dispatcher
        .dispatch(ChangeKind::Insert, document, &context.name);
    Ok(id)
}

/// Inserts or replaces one document, addressed by its id.
pub(crate) fn upsert_document(
    context: &CollectionContext,
    mut document: Document,
) -> OlivineResult<OlivineId> {
    let existing = match document.maybe_id() {
        Some(id) => context.engine.get(&id)?,
        None => None,
    };
    match existing {
        Some(previous) => {
            let id = document.id()?;
            stamp_updated(&mut document, previous.revision())?;
            let replaced = context
                .engine
                .replace(&id, document.clone())
                .map_err(|e| remap_key_violation(context, e))?;
            if replaced {
                context
                    .dispatcher
                    .dispatch(ChangeKind::Update, document, &context.name);
                Ok(id)
            } else {
                insert_prepared(context, document)
            }
        }
        None => insert_prepared(context, document),
    }
}

/// Inserts or replaces one document, addressed by its key field value.
///
/// Upserts never consult the key generator or the sequence: the document
/// must arrive with a set key.
pub(crate) fn upsert_by_key(context: &CollectionContext, mut document: Document) -> OlivineResult<()> {
    let descriptor = context.key_descriptor()?.clone();
    let value = document.get(descriptor.field())?;
    let key = PrimaryKey::from_field_value(&value, descriptor.kind())?.ok_or_else(|| {
        log::error!(
            "Upsert into '{}' requires a set key for field '{}'",
            context.name,
            descriptor.field()
        );
        OlivineError::new(
            &format!(
                "Upsert into '{}' requires a set key for field '{}'",
                context.name,
                descriptor.field()
            ),
            ErrorKind::KeyViolation,
        )
    })?;

    let key_value = key.to_value();
    let lock = context.key_locks.lock_for(&key_value);
    let _guard = lock.write();

    match find_raw_by_field(context, descriptor.field(), &key_value)? {
        Some(existing) => {
            let id = stored_id(context, &existing)?;
            document.put(DOC_ID, id)?;
            stamp_updated(&mut document, existing.revision())?;
            let replaced = context
                .engine
                .replace(&id, document.clone())
                .map_err(|e| remap_key_violation(context, e))?;
            if replaced {
                context
                    .dispatcher
                    .dispatch(ChangeKind::Update, document, &context.name);
                Ok(())
            } else {
                insert_prepared(context, document).map(|_| ())
            }
        }
        None => insert_prepared(context, document).map(|_| ()),
    }
}

/// Applies a mutation to the record addressed by the key.
///
/// Returns the number of records changed, which is zero when no record
/// carries the key. The mutation must not change the key itself.
pub(crate) fn modify<M>(
    context: &CollectionContext,
    key: &PrimaryKey,
    mutate: M,
) -> OlivineResult<u64>
where
    M: FnOnce(Document) -> OlivineResult<Document>,
{
    let descriptor = context.key_descriptor()?.clone();
    context.check_key_kind(key)?;

    let key_value = key.to_value();
    let lock = context.key_locks.lock_for(&key_value);
    let _guard = lock.write();

    let existing = match find_raw_by_field(context, descriptor.field(), &key_value)? {
        Some(existing) => existing,
        None => return Ok(0),
    };
    let id = stored_id(context, &existing)?;
    let revision = existing.revision();

    let mut updated = mutate(existing)?;
    let new_value = updated.get(descriptor.field())?;
    let new_key = PrimaryKey::from_field_value(&new_value, descriptor.kind())?;
    if new_key.as_ref() != Some(key) {
        log::error!(
            "Modify cannot change the key of field '{}' in collection '{}'",
            descriptor.field(),
            context.name
        );
        return Err(OlivineError::new(
            &format!(
                "Modify cannot change the key of field '{}' in collection '{}'",
                descriptor.field(),
                context.name
            ),
            ErrorKind::KeyViolation,
        ));
    }

    updated.put(DOC_ID, id)?;
    stamp_updated(&mut updated, revision)?;
    let replaced = context
        .engine
        .replace(&id, updated.clone())
        .map_err(|e| remap_key_violation(context, e))?;
    if !replaced {
        return Ok(0);
    }
    context
        .dispatcher
        .dispatch(ChangeKind::Update, updated, &context.name);
    Ok(1)
}

/// Removes the record addressed by the key. Returns the number removed.
pub(crate) fn remove_by_key(context: &CollectionContext, key: &PrimaryKey) -> OlivineResult<u64> {
    let descriptor = context.key_descriptor()?.clone();
    context.check_key_kind(key)?;

    let key_value = key.to_value();
    let lock = context.key_locks.lock_for(&key_value);
    let _guard = lock.write();

    let existing = match find_raw_by_field(context, descriptor.field(), &key_value)? {
        Some(existing) => existing,
        None => return Ok(0),
    };
    let id = stored_id(context, &existing)?;
    match context.engine.remove(&id)? {
        Some(removed) => {
            context
                .dispatcher
                .dispatch(ChangeKind::Remove, removed, &context.name);
            Ok(1)
        }
        None => Ok(0),
    }
}

/// Removes one document by its id. Returns the number removed.
pub(crate) fn remove_by_id(context: &CollectionContext, id: &OlivineId) -> OlivineResult<u64> {
    match context.engine.remove(id)? {
        Some(removed) => {
            context
                .dispatcher
                .dispatch(ChangeKind::Remove, removed, &context.name);
            Ok(1)
        }
        None => Ok(0),
    }
}

/// Removes every document matching the filter, in scan order. A missing
/// filter removes everything.
pub(crate) fn remove_all(
    context: &CollectionContext,
    filter: Option<&Filter>,
) -> OlivineResult<u64> {
    let matching: Vec<Document> = match filter {
        Some(filter) => {
            let predicate = FilterCompiler::compile(filter)?;
            FilteredStream::new(Box::new(ScanStream::new(context.engine.clone())), predicate)
                .collect::<OlivineResult<_>>()?
        }
        None => ScanStream::new(context.engine.clone()).collect::<OlivineResult<_>>()?,
    };

    let mut removed_count = 0u64;
    for document in matching {
        let id = stored_id(context, &document)?;
        if let Some(removed) = context.engine.remove(&id)? {
            context
                .dispatcher
                .dispatch(ChangeKind::Remove, removed, &context.name);
            removed_count += 1;
        }
    }
    Ok(removed_count)
}
