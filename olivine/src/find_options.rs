use crate::common::SortOrder;
use icu_collator::options::CollatorOptions;
use icu_collator::CollatorPreferences;

/// An ordered list of `(field, direction)` pairs to sort by.
///
/// The first pair is the most significant. Records that compare equal on
/// every pair keep their insertion order, because the sort is stable.
#[derive(Debug, Clone, Default)]
pub struct SortableFields {
    fields: Vec<(String, SortOrder)>,
}

impl SortableFields {
    pub fn new() -> Self {
        SortableFields { fields: Vec::new() }
    }

    pub fn add(&mut self, field: impl Into<String>, order: SortOrder) {
        self.fields.push((field.into(), order));
    }

    pub fn fields(&self) -> &[(String, SortOrder)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<(String, SortOrder)> for SortableFields {
    fn from((field, order): (String, SortOrder)) -> Self {
        SortableFields {
            fields: vec![(field, order)],
        }
    }
}

/// Options shaping a find: sorting, pagination, and string collation.
///
/// Pagination always applies the offset before the limit. Both default to
/// "everything".
#[derive(Debug, Clone)]
pub struct FindOptions {
    pub(crate) sort_by: Option<SortableFields>,
    pub(crate) skip: Option<u64>,
    pub(crate) limit: Option<u64>,
    pub(crate) collator_options: Option<CollatorOptions>,
    pub(crate) collator_preferences: Option<CollatorPreferences>,
}

impl FindOptions {
    pub fn new() -> Self {
        FindOptions {
            sort_by: None,
            skip: None,
            limit: None,
            collator_options: Some(CollatorOptions::default()),
            collator_preferences: Some(CollatorPreferences::default()),
        }
    }

    /// Skips the first `skip` records of the result.
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Caps the result at `limit` records, applied after any skip.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Adds a sort field. Repeated calls add secondary sort keys.
    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        let mut fields = self.sort_by.take().unwrap_or_default();
        fields.add(field, order);
        self.sort_by = Some(fields);
        self
    }

    /// Overrides the collation used for string comparison during sorting.
    pub fn with_collation(
        mut self,
        preferences: CollatorPreferences,
        options: CollatorOptions,
    ) -> Self {
        self.collator_preferences = Some(preferences);
        self.collator_options = Some(options);
        self
    }
}

impl Default for FindOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Starts options sorted by a single field.
pub fn order_by(field: &str, order: SortOrder) -> FindOptions {
    FindOptions::new().sort_by(field, order)
}

/// Starts options that skip the first `skip` records.
pub fn skip_by(skip: u64) -> FindOptions {
    FindOptions::new().skip(skip)
}

/// Starts options capped at `limit` records.
pub fn limit_to(limit: u64) -> FindOptions {
    FindOptions::new().limit(limit)
}
