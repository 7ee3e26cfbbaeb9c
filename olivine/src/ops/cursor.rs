use crate::document::Document;
use crate::engine::{EngineCollection, Predicate};
use crate::errors::{OlivineError, OlivineResult};
use crate::olivine_id::OlivineId;
use crate::projection::strip_optional_fields;
use crate::registration::Entity;
use crate::{common::SortOrder, errors::ErrorKind};
use icu_collator::CollatorBorrowed;
use std::marker::PhantomData;

pub(crate) type DocumentStream = Box<dyn Iterator<Item = OlivineResult<Document>>>;

/// Lazy id-ordered walk over an engine collection.
///
/// The walk tolerates concurrent removals: an id that disappears between
/// being yielded by the engine and being fetched is silently skipped.
pub(crate) struct ScanStream {
    engine: EngineCollection,
    position: Option<OlivineId>,
    done: bool,
}

impl ScanStream {
    pub(crate) fn new(engine: EngineCollection) -> Self {
        ScanStream {
            engine,
            position: None,
            done: false,
        }
    }
}

impl Iterator for ScanStream {
    type Item = OlivineResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            let next_id = match &self.position {
                None => self.engine.first_id(),
                Some(position) => self.engine.next_id(position),
            };
            match next_id {
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Ok(Some(id)) => {
                    self.position = Some(id);
                    match self.engine.get(&id) {
                        Err(e) => {
                            self.done = true;
                            return Some(Err(e));
                        }
                        Ok(None) => continue,
                        Ok(Some(document)) => return Some(Ok(document)),
                    }
                }
            }
        }
    }
}

/// Applies a compiled predicate to a stream.
pub(crate) struct FilteredStream {
    underlying: DocumentStream,
    predicate: Predicate,
    done: bool,
}

impl FilteredStream {
    pub(crate) fn new(underlying: DocumentStream, predicate: Predicate) -> Self {
        FilteredStream {
            underlying,
            predicate,
            done: false,
        }
    }
}

impl Iterator for FilteredStream {
    type Item = OlivineResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            match self.underlying.next() {
                None => return None,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(document)) => match self.predicate.apply(&document) {
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                    Ok(true) => return Some(Ok(document)),
                    Ok(false) => continue,
                },
            }
        }
    }
}

/// Blocking sort over a fully collected stream.
///
/// An error in the input stream is reported once, before any document, so
/// callers never act on a partially sorted result.
pub(crate) struct SortedStream {
    sorted: Vec<Document>,
    error: Option<OlivineError>,
    current_index: usize,
}

impl SortedStream {
    pub(crate) fn new<I: Iterator<Item = OlivineResult<Document>>>(
        raw_stream: I,
        sort_order: &[(String, SortOrder)],
        collator: Option<CollatorBorrowed<'_>>,
    ) -> Self {
        let mut error = None;
        let mut cleaned = Vec::new();
        for document in raw_stream {
            match document {
                Ok(document) => cleaned.push(document),
                Err(e) => {
                    error = Some(e);
                    break;
                }
            }
        }

        cleaned.sort_by(|a, b| {
            for (field, order) in sort_order {
                let a_value = a.get(field).unwrap_or_default();
                let b_value = b.get(field).unwrap_or_default();

                // Nulls sort first regardless of direction.
                let cmp = if a_value.is_null() && !b_value.is_null() {
                    std::cmp::Ordering::Less
                } else if !a_value.is_null() && b_value.is_null() {
                    std::cmp::Ordering::Greater
                } else if a_value.is_null() && b_value.is_null() {
                    std::cmp::Ordering::Equal
                } else if let (Some(a), Some(b), Some(collator)) =
                    (a_value.as_str(), b_value.as_str(), collator.as_ref())
                {
                    collator.compare(a, b)
                } else {
                    a_value.cmp(&b_value)
                };

                if cmp != std::cmp::Ordering::Equal {
                    return match order {
                        SortOrder::Ascending => cmp,
                        SortOrder::Descending => cmp.reverse(),
                    };
                }
            }
            std::cmp::Ordering::Equal
        });

        SortedStream {
            sorted: cleaned,
            error,
            current_index: 0,
        }
    }
}

impl Iterator for SortedStream {
    type Item = OlivineResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(error) = self.error.take() {
            return Some(Err(error));
        }
        if self.current_index < self.sorted.len() {
            let document = self.sorted[self.current_index].clone();
            self.current_index += 1;
            Some(Ok(document))
        } else {
            None
        }
    }
}

/// Strips optional fields from every document leaving the store.
pub(crate) struct ProjectedStream {
    underlying: DocumentStream,
    optional_fields: Vec<String>,
    keep: Vec<String>,
}

impl ProjectedStream {
    pub(crate) fn new(
        underlying: DocumentStream,
        optional_fields: Vec<String>,
        keep: Vec<String>,
    ) -> Self {
        ProjectedStream {
            underlying,
            optional_fields,
            keep,
        }
    }
}

impl Iterator for ProjectedStream {
    type Item = OlivineResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.underlying.next() {
            None => None,
            Some(Err(e)) => Some(Err(e)),
            Some(Ok(mut document)) => {
                match strip_optional_fields(&mut document, &self.optional_fields, &self.keep) {
                    Ok(()) => Some(Ok(document)),
                    Err(e) => Some(Err(e)),
                }
            }
        }
    }
}

/// A cursor over documents matching a find.
///
/// Iteration is lazy and cached: a second pass after [`reset`] replays the
/// results already seen without touching the store again.
///
/// [`reset`]: DocumentCursor::reset
pub struct DocumentCursor {
    underlying: Option<DocumentStream>,
    cache: Vec<OlivineResult<Document>>,
    current_index: usize,
}

impl DocumentCursor {
    pub(crate) fn new(underlying: DocumentStream) -> Self {
        DocumentCursor {
            underlying: Some(underlying),
            cache: Vec::new(),
            current_index: 0,
        }
    }

    /// Restarts iteration from the beginning.
    pub fn reset(&mut self) {
        self.current_index = 0;
    }

    /// The number of documents in the result, consuming the stream.
    pub fn size(&mut self) -> usize {
        if self.underlying.is_none() {
            self.reset();
            return self.cache.len();
        }
        for _ in self.by_ref() {}
        self.reset();
        self.cache.len()
    }

    /// The first document of the result, if any.
    pub fn first(&mut self) -> Option<OlivineResult<Document>> {
        self.reset();
        self.next()
    }

    /// Collects the remaining documents, failing on the first error.
    pub fn documents(&mut self) -> OlivineResult<Vec<Document>> {
        self.by_ref().collect()
    }
}

impl Iterator for DocumentCursor {
    type Item = OlivineResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_index < self.cache.len() {
            let result = self.cache[self.current_index].clone();
            self.current_index += 1;
            return Some(result);
        }

        if let Some(ref mut underlying) = self.underlying {
            if let Some(item) = underlying.next() {
                self.cache.push(item.clone());
                self.current_index += 1;
                return Some(item);
            }
            self.underlying = None;
        }
        None
    }
}

/// A cursor over typed records, mapped from a [`DocumentCursor`].
pub struct RecordCursor<T: Entity> {
    documents: DocumentCursor,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> std::fmt::Debug for RecordCursor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCursor").finish_non_exhaustive()
    }
}

impl<T: Entity> RecordCursor<T> {
    pub(crate) fn new(documents: DocumentCursor) -> Self {
        RecordCursor {
            documents,
            _marker: PhantomData,
        }
    }

    /// Restarts iteration from the beginning.
    pub fn reset(&mut self) {
        self.documents.reset();
    }

    /// The number of records in the result, consuming the stream.
    pub fn size(&mut self) -> usize {
        self.documents.size()
    }

    /// The first record of the result, if any.
    pub fn first(&mut self) -> Option<OlivineResult<T>> {
        self.documents.first().map(|result| {
            result.and_then(|document| map_record::<T>(&document))
        })
    }

    /// Collects the remaining records, failing on the first error.
    pub fn records(&mut self) -> OlivineResult<Vec<T>> {
        self.by_ref().collect()
    }
}

impl<T: Entity> Iterator for RecordCursor<T> {
    type Item = OlivineResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.documents.next().map(|result| {
            result.and_then(|document| map_record::<T>(&document))
        })
    }
}

fn map_record<T: Entity>(document: &Document) -> OlivineResult<T> {
    T::from_document(document).map_err(|e| {
        log::error!("Failed to map document to record: {}", e);
        OlivineError::new_with_cause(
            "Failed to map document to record",
            ErrorKind::ObjectMapping,
            e,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::engine::memory::collection::InMemoryCollection;
    use crate::filter::{field, FilterCompiler};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn seeded_engine(names: &[&str]) -> EngineCollection {
        let engine = EngineCollection::new(InMemoryCollection::new(
            "cursor",
            Arc::new(AtomicBool::new(false)),
        ));
        let documents = names
            .iter()
            .map(|name| {
                let mut document = doc! { name: (*name) };
                document.id().unwrap();
                document
            })
            .collect();
        engine.insert_batch(documents).unwrap();
        engine
    }

    #[test]
    fn test_scan_yields_insertion_order() {
        let engine = seeded_engine(&["a", "b", "c"]);
        let names: Vec<String> = ScanStream::new(engine)
            .map(|document| {
                document
                    .unwrap()
                    .get("name")
                    .unwrap()
                    .as_str()
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_filtered_stream() {
        let engine = seeded_engine(&["a", "b", "a"]);
        let predicate = FilterCompiler::compile(&field("name").eq("a")).unwrap();
        let stream = FilteredStream::new(Box::new(ScanStream::new(engine)), predicate);
        assert_eq!(stream.count(), 2);
    }

    #[test]
    fn test_sorted_stream_orders_and_replays_nulls_first() {
        let documents = vec![
            Ok(doc! { name: "b" }),
            Ok(doc! { other: 1i64 }),
            Ok(doc! { name: "a" }),
        ];
        let sorted = SortedStream::new(
            documents.into_iter(),
            &[("name".to_string(), SortOrder::Ascending)],
            None,
        );
        let names: Vec<Option<String>> = sorted
            .map(|document| {
                document
                    .unwrap()
                    .get("name")
                    .unwrap()
                    .as_str()
                    .map(str::to_string)
            })
            .collect();
        assert_eq!(
            names,
            vec![None, Some("a".to_string()), Some("b".to_string())]
        );
    }

    #[test]
    fn test_sorted_stream_reports_error_once() {
        let documents: Vec<OlivineResult<Document>> = vec![
            Ok(doc! { name: "b" }),
            Err(OlivineError::new("scan failed", ErrorKind::Internal)),
        ];
        let mut sorted = SortedStream::new(documents.into_iter(), &[], None);
        assert!(matches!(sorted.next(), Some(Err(_))));
        assert!(sorted.next().is_none());
    }

    #[test]
    fn test_cursor_caches_and_resets() {
        let engine = seeded_engine(&["a", "b"]);
        let mut cursor = DocumentCursor::new(Box::new(ScanStream::new(engine)));

        assert_eq!(cursor.size(), 2);
        let first = cursor.first().unwrap().unwrap();
        assert_eq!(first.get("name").unwrap().as_str(), Some("a"));

        cursor.reset();
        assert_eq!(cursor.documents().unwrap().len(), 2);
    }
}
