//! Record type and collection registration.
//!
//! All record types and document collections are declared up front on the
//! store builder. A registration names the backing collection and carries
//! the key descriptor, the key generator, the secondary indexes, and the
//! optional fields of the type. Registrations are validated when the
//! store opens, never later.

use crate::document::{Document, DOC_ID, DOC_MODIFIED, DOC_REVISION};
use crate::errors::{ErrorKind, OlivineError, OlivineResult};
use crate::keys::{KeyDescriptor, KeyGenerator, KeyKind};
use std::marker::PhantomData;

/// A type that can be stored as a record.
///
/// Implementations map a value to and from its document form. Mapping
/// failures should carry [`ErrorKind::ObjectMapping`].
pub trait Entity: Send + Sync + Sized + 'static {
    fn to_document(&self) -> OlivineResult<Document>;
    fn from_document(document: &Document) -> OlivineResult<Self>;
}

/// A secondary index declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexSpec {
    pub(crate) field: String,
    pub(crate) unique: bool,
}

impl IndexSpec {
    pub fn unique(field: impl Into<String>) -> Self {
        IndexSpec {
            field: field.into(),
            unique: true,
        }
    }

    pub fn non_unique(field: impl Into<String>) -> Self {
        IndexSpec {
            field: field.into(),
            unique: false,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }
}

/// Declares how a record type is stored.
pub struct EntityRegistration<T: Entity> {
    pub(crate) collection: String,
    pub(crate) key: Option<KeyDescriptor>,
    pub(crate) generator: Option<KeyGenerator>,
    pub(crate) indexes: Vec<IndexSpec>,
    pub(crate) optional_fields: Vec<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> EntityRegistration<T> {
    pub fn new(collection: impl Into<String>) -> Self {
        EntityRegistration {
            collection: collection.into(),
            key: None,
            generator: None,
            indexes: Vec::new(),
            optional_fields: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Declares the primary key field of the type.
    pub fn with_key(mut self, field: impl Into<String>, kind: KeyKind) -> Self {
        self.key = Some(KeyDescriptor::new(field, kind));
        self
    }

    /// Registers a key generator; it is consulted on every insert.
    pub fn with_generator(mut self, generator: KeyGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    /// Marks a field as optional: stripped from read results unless asked
    /// for, and injectable after the fact.
    pub fn with_optional_field(mut self, field: impl Into<String>) -> Self {
        self.optional_fields.push(field.into());
        self
    }

    pub(crate) fn validate(&self) -> OlivineResult<()> {
        validate_collection_name(&self.collection)?;
        if let Some(key) = &self.key {
            if key.field().is_empty() {
                return Err(configuration_error(&format!(
                    "Key field for collection '{}' cannot be empty",
                    self.collection
                )));
            }
        }
        match (&self.key, &self.generator) {
            (None, Some(_)) => {
                return Err(configuration_error(&format!(
                    "Collection '{}' registers a key generator without a key field",
                    self.collection
                )));
            }
            (Some(key), Some(generator)) if key.kind() != generator.kind() => {
                return Err(configuration_error(&format!(
                    "Key generator for collection '{}' produces {} keys but the key field is {}",
                    self.collection,
                    generator.kind(),
                    key.kind()
                )));
            }
            _ => {}
        }
        validate_indexes(&self.collection, &self.indexes, self.key.as_ref())?;
        validate_optional_fields(
            &self.collection,
            &self.optional_fields,
            self.key.as_ref().map(|key| key.field()),
        )
    }
}

/// Declares a raw document collection.
///
/// Document collections are keyed by their generated ids only; they never
/// carry a primary key descriptor.
#[derive(Clone, Debug)]
pub struct CollectionRegistration {
    pub(crate) name: String,
    pub(crate) indexes: Vec<IndexSpec>,
    pub(crate) optional_fields: Vec<String>,
}

impl CollectionRegistration {
    pub fn new(name: impl Into<String>) -> Self {
        CollectionRegistration {
            name: name.into(),
            indexes: Vec::new(),
            optional_fields: Vec::new(),
        }
    }

    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn with_optional_field(mut self, field: impl Into<String>) -> Self {
        self.optional_fields.push(field.into());
        self
    }

    pub(crate) fn validate(&self) -> OlivineResult<()> {
        validate_collection_name(&self.name)?;
        validate_indexes(&self.name, &self.indexes, None)?;
        validate_optional_fields(&self.name, &self.optional_fields, None)
    }
}

fn configuration_error(message: &str) -> OlivineError {
    log::error!("{}", message);
    OlivineError::new(message, ErrorKind::Configuration)
}

fn validate_collection_name(name: &str) -> OlivineResult<()> {
    if name.is_empty() {
        return Err(configuration_error("Collection name cannot be empty"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(configuration_error(&format!(
            "Collection name '{}' cannot contain whitespace",
            name
        )));
    }
    Ok(())
}

fn validate_indexes(
    collection: &str,
    indexes: &[IndexSpec],
    key: Option<&KeyDescriptor>,
) -> OlivineResult<()> {
    for (position, index) in indexes.iter().enumerate() {
        if index.field.is_empty() {
            return Err(configuration_error(&format!(
                "Index field for collection '{}' cannot be empty",
                collection
            )));
        }
        if let Some(key) = key {
            // The key field is implicitly unique-indexed.
            if index.field == key.field() && !index.unique {
                return Err(configuration_error(&format!(
                    "Field '{}' is the key of collection '{}' and cannot carry a non-unique index",
                    index.field, collection
                )));
            }
        }
        let conflict = indexes[..position]
            .iter()
            .any(|earlier| earlier.field == index.field && earlier.unique != index.unique);
        if conflict {
            return Err(configuration_error(&format!(
                "Field '{}' of collection '{}' is declared both unique and non-unique",
                index.field, collection
            )));
        }
    }
    Ok(())
}

fn validate_optional_fields(
    collection: &str,
    optional_fields: &[String],
    key_field: Option<&str>,
) -> OlivineResult<()> {
    for field in optional_fields {
        if field.is_empty() {
            return Err(configuration_error(&format!(
                "Optional field for collection '{}' cannot be empty",
                collection
            )));
        }
        if field == DOC_ID || field == DOC_REVISION || field == DOC_MODIFIED {
            return Err(configuration_error(&format!(
                "Reserved field '{}' of collection '{}' cannot be optional",
                field, collection
            )));
        }
        if Some(field.as_str()) == key_field {
            return Err(configuration_error(&format!(
                "Key field '{}' of collection '{}' cannot be optional",
                field, collection
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    struct Probe;

    impl Entity for Probe {
        fn to_document(&self) -> OlivineResult<Document> {
            Ok(doc! {})
        }

        fn from_document(_document: &Document) -> OlivineResult<Self> {
            Ok(Probe)
        }
    }

    #[test]
    fn test_valid_registration() {
        let registration = EntityRegistration::<Probe>::new("probes")
            .with_key("serial", KeyKind::Str)
            .with_generator(KeyGenerator::of_string(|| "s-1".to_string()))
            .with_index(IndexSpec::non_unique("site"))
            .with_index(IndexSpec::unique("tag"))
            .with_optional_field("notes");
        registration.validate().unwrap();
    }

    #[test]
    fn test_collection_name_rules() {
        assert!(EntityRegistration::<Probe>::new("").validate().is_err());
        assert!(EntityRegistration::<Probe>::new("has space").validate().is_err());
        assert!(CollectionRegistration::new("\t").validate().is_err());
    }

    #[test]
    fn test_generator_requires_matching_key() {
        let no_key = EntityRegistration::<Probe>::new("probes")
            .with_generator(KeyGenerator::of_i64(|| 1));
        assert!(no_key.validate().is_err());

        let wrong_kind = EntityRegistration::<Probe>::new("probes")
            .with_key("serial", KeyKind::Str)
            .with_generator(KeyGenerator::of_i64(|| 1));
        let error = wrong_kind.validate().unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::Configuration);
    }

    #[test]
    fn test_key_field_index_must_be_unique() {
        let registration = EntityRegistration::<Probe>::new("probes")
            .with_key("serial", KeyKind::Str)
            .with_index(IndexSpec::non_unique("serial"));
        assert!(registration.validate().is_err());

        let redundant = EntityRegistration::<Probe>::new("probes")
            .with_key("serial", KeyKind::Str)
            .with_index(IndexSpec::unique("serial"));
        redundant.validate().unwrap();
    }

    #[test]
    fn test_conflicting_index_uniqueness() {
        let registration = CollectionRegistration::new("records")
            .with_index(IndexSpec::unique("code"))
            .with_index(IndexSpec::non_unique("code"));
        assert!(registration.validate().is_err());
    }

    #[test]
    fn test_optional_field_rules() {
        assert!(CollectionRegistration::new("records")
            .with_optional_field(DOC_ID)
            .validate()
            .is_err());
        assert!(CollectionRegistration::new("records")
            .with_optional_field(DOC_REVISION)
            .validate()
            .is_err());
        assert!(EntityRegistration::<Probe>::new("probes")
            .with_key("serial", KeyKind::Str)
            .with_optional_field("serial")
            .validate()
            .is_err());
        CollectionRegistration::new("records")
            .with_optional_field("notes")
            .validate()
            .unwrap();
    }
}
