use crate::common::Value;
use crate::document::Document;
use crate::engine::Predicate;
use crate::errors::{ErrorKind, OlivineError, OlivineResult};
use crate::filter::{Filter, FilterCompiler};
use crate::find_options::FindOptions;
use crate::olivine_id::OlivineId;
use crate::ops::cursor::{
    DocumentCursor, DocumentStream, FilteredStream, ProjectedStream, ScanStream, SortedStream,
};
use crate::ops::CollectionContext;
use crate::projection::strip_optional_fields;
use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorPreferences};

/// Runs a find over a collection.
///
/// The pipeline is scan, filter, sort, paginate, project. Pagination
/// applies after sorting, and optional fields are stripped last so a sort
/// on an optional field still sees the full document.
pub(crate) fn find(
    context: &CollectionContext,
    filter: Option<&Filter>,
    options: &FindOptions,
    keep_fields: &[String],
) -> OlivineResult<DocumentCursor> {
    let mut stream: DocumentStream = Box::new(ScanStream::new(context.engine.clone()));

    if let Some(filter) = filter {
        let predicate = FilterCompiler::compile(filter)?;
        stream = Box::new(FilteredStream::new(stream, predicate));
    }

    if let Some(sort_by) = &options.sort_by {
        if !sort_by.is_empty() {
            let preferences = options
                .collator_preferences
                .clone()
                .unwrap_or_default();
            let collator_options = options.collator_options.clone().unwrap_or_default();
            let collator = Collator::try_new(preferences, collator_options).map_err(|_| {
                log::error!("Failed to create collator for sorting");
                OlivineError::new(
                    "Failed to create collator for sorting",
                    ErrorKind::Internal,
                )
            })?;
            stream = Box::new(SortedStream::new(stream, sort_by.fields(), Some(collator)));
        }
    }

    stream = paginate(stream, options);

    if !context.optional_fields.is_empty() {
        stream = Box::new(ProjectedStream::new(
            stream,
            context.optional_fields.clone(),
            keep_fields.to_vec(),
        ));
    }

    Ok(DocumentCursor::new(stream))
}

/// Counts matching documents, honoring skip and limit caps.
pub(crate) fn count(
    context: &CollectionContext,
    filter: Option<&Filter>,
    options: &FindOptions,
) -> OlivineResult<u64> {
    let mut stream: DocumentStream = Box::new(ScanStream::new(context.engine.clone()));
    if let Some(filter) = filter {
        let predicate = FilterCompiler::compile(filter)?;
        stream = Box::new(FilteredStream::new(stream, predicate));
    }
    let stream = paginate(stream, options);

    let mut matched = 0u64;
    for document in stream {
        document?;
        matched += 1;
    }
    Ok(matched)
}

fn paginate(stream: DocumentStream, options: &FindOptions) -> DocumentStream {
    if options.skip.is_none() && options.limit.is_none() {
        return stream;
    }
    let skip = options.skip.unwrap_or(0) as usize;
    let limit = options.limit.map(|limit| limit as usize).unwrap_or(usize::MAX);
    Box::new(stream.skip(skip).take(limit))
}

/// Fetches one document by its id, with optional fields stripped.
pub(crate) fn get_by_id(
    context: &CollectionContext,
    id: &OlivineId,
    keep_fields: &[String],
) -> OlivineResult<Option<Document>> {
    match context.engine.get(id)? {
        None => Ok(None),
        Some(mut document) => {
            strip_optional_fields(&mut document, &context.optional_fields, keep_fields)?;
            Ok(Some(document))
        }
    }
}

/// Fetches one document by its key field value, with optional fields
/// stripped.
pub(crate) fn get_by_key_value(
    context: &CollectionContext,
    key_value: &Value,
    keep_fields: &[String],
) -> OlivineResult<Option<Document>> {
    let descriptor = context.key_descriptor()?;
    match find_raw_by_field(context, descriptor.field(), key_value)? {
        None => Ok(None),
        Some(mut document) => {
            strip_optional_fields(&mut document, &context.optional_fields, keep_fields)?;
            Ok(Some(document))
        }
    }
}

/// Scans for the first document whose field equals the value, without
/// projection. Write paths use this to locate records by key.
pub(crate) fn find_raw_by_field(
    context: &CollectionContext,
    field: &str,
    value: &Value,
) -> OlivineResult<Option<Document>> {
    let predicate = Predicate::eq(field, value.clone());
    let stream = FilteredStream::new(Box::new(ScanStream::new(context.engine.clone())), predicate);
    for document in stream {
        return document.map(Some);
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SortOrder;
    use crate::doc;
    use crate::engine::memory::collection::InMemoryCollection;
    use crate::engine::EngineCollection;
    use crate::filter::field;
    use crate::find_options::order_by;
    use crate::olivine_config::RegistrationData;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn test_context(optional_fields: Vec<String>) -> CollectionContext {
        let engine = EngineCollection::new(InMemoryCollection::new(
            "reads",
            Arc::new(AtomicBool::new(false)),
        ));
        CollectionContext::new(
            RegistrationData {
                name: "reads".to_string(),
                key: None,
                generator: None,
                indexes: Vec::new(),
                optional_fields,
            },
            engine,
        )
    }

    fn seed(context: &CollectionContext, documents: Vec<Document>) {
        let documents = documents
            .into_iter()
            .map(|mut document| {
                document.id().unwrap();
                document
            })
            .collect();
        context.engine.insert_batch(documents).unwrap();
    }

    #[test]
    fn test_find_filters_and_sorts() {
        let context = test_context(Vec::new());
        seed(
            &context,
            vec![
                doc! { name: "carol", age: 41i64 },
                doc! { name: "alice", age: 34i64 },
                doc! { name: "bob", age: 19i64 },
            ],
        );

        let filter = field("age").gt(20i64);
        let mut cursor = find(
            &context,
            Some(&filter),
            &order_by("name", SortOrder::Ascending),
            &[],
        )
        .unwrap();

        let names: Vec<Value> = cursor
            .documents()
            .unwrap()
            .iter()
            .map(|document| document.get("name").unwrap())
            .collect();
        assert_eq!(names, vec![Value::from("alice"), Value::from("carol")]);
    }

    #[test]
    fn test_find_paginates_after_sort() {
        let context = test_context(Vec::new());
        seed(
            &context,
            vec![doc! { n: 3i64 }, doc! { n: 1i64 }, doc! { n: 2i64 }],
        );

        let options = order_by("n", SortOrder::Ascending).skip(1).limit(1);
        let mut cursor = find(&context, None, &options, &[]).unwrap();
        let documents = cursor.documents().unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].get("n").unwrap(), Value::I64(2));
    }

    #[test]
    fn test_count_honors_caps() {
        let context = test_context(Vec::new());
        seed(
            &context,
            vec![doc! { n: 1i64 }, doc! { n: 2i64 }, doc! { n: 3i64 }],
        );

        assert_eq!(count(&context, None, &FindOptions::new()).unwrap(), 3);
        assert_eq!(
            count(&context, None, &FindOptions::new().skip(1)).unwrap(),
            2
        );
        assert_eq!(
            count(&context, None, &FindOptions::new().limit(2)).unwrap(),
            2
        );
        let filter = field("n").gte(2i64);
        assert_eq!(
            count(&context, Some(&filter), &FindOptions::new()).unwrap(),
            2
        );
    }

    #[test]
    fn test_projection_strips_unless_kept() {
        let context = test_context(vec!["notes".to_string()]);
        seed(&context, vec![doc! { name: "a", notes: "n" }]);

        let mut stripped = find(&context, None, &FindOptions::new(), &[]).unwrap();
        let document = stripped.first().unwrap().unwrap();
        assert!(!document.has_field("notes"));

        let mut kept = find(&context, None, &FindOptions::new(), &["notes".to_string()]).unwrap();
        let document = kept.first().unwrap().unwrap();
        assert_eq!(document.get("notes").unwrap(), Value::from("n"));
    }

    #[test]
    fn test_get_by_id_projects() {
        let context = test_context(vec!["notes".to_string()]);
        let mut document = doc! { name: "a", notes: "n" };
        let id = document.id().unwrap();
        context.engine.insert_batch(vec![document]).unwrap();

        let fetched = get_by_id(&context, &id, &[]).unwrap().unwrap();
        assert!(!fetched.has_field("notes"));
        assert!(get_by_id(&context, &OlivineId::new(), &[]).unwrap().is_none());
    }

    #[test]
    fn test_find_raw_by_field_sees_optional_fields() {
        let context = test_context(vec!["notes".to_string()]);
        seed(&context, vec![doc! { name: "a", notes: "n" }]);

        let raw = find_raw_by_field(&context, "name", &Value::from("a"))
            .unwrap()
            .unwrap();
        assert!(raw.has_field("notes"));
    }
}
