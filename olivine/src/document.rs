use crate::common::Value;
use crate::errors::{ErrorKind, OlivineError, OlivineResult};
use crate::olivine_id::OlivineId;
use im::OrdMap;
use itertools::Itertools;
use std::cmp::Ordering;
use std::fmt::Display;
use std::hash::{Hash, Hasher};

/// Reserved field holding the engine-assigned identity of a document.
pub const DOC_ID: &str = "_id";
/// Reserved field holding the write revision of a document, starting at 1.
pub const DOC_REVISION: &str = "_revision";
/// Reserved field holding the last modification time in epoch milliseconds.
pub const DOC_MODIFIED: &str = "_modified";

pub(crate) const FIELD_SEPARATOR: &str = ".";

/// Strips the quotes that `stringify!` adds around string-literal keys.
pub fn normalize(key: &str) -> &str {
    key.trim_matches('"')
}

/// A schemaless record: an ordered map from field names to [`Value`]s.
///
/// Field names may address nested documents with a dot-separated path, so
/// `document.get("address.city")` descends into the embedded `address`
/// document. Cloning is cheap because the backing map is persistent.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Document {
    data: OrdMap<String, Value>,
}

impl Document {
    pub fn new() -> Document {
        Document {
            data: OrdMap::new(),
        }
    }

    /// Sets a field to a value, creating intermediate documents for nested
    /// paths as needed.
    pub fn put(&mut self, key: &str, value: impl Into<Value>) -> OlivineResult<()> {
        let value = value.into();
        if key.is_empty() {
            log::error!("Document field name cannot be empty");
            return Err(OlivineError::new(
                "Document field name cannot be empty",
                ErrorKind::InvalidOperation,
            ));
        }
        if key == DOC_ID && value.as_id().is_none() {
            log::error!("Field '{}' only accepts an id value", DOC_ID);
            return Err(OlivineError::new(
                &format!("Field '{}' only accepts an id value", DOC_ID),
                ErrorKind::InvalidOperation,
            ));
        }

        match key.split_once(FIELD_SEPARATOR) {
            None => {
                self.data.insert(key.to_string(), value);
                Ok(())
            }
            Some((head, rest)) => {
                if head.is_empty() || rest.is_empty() {
                    return Err(OlivineError::new(
                        &format!("'{}' is not a valid field path", key),
                        ErrorKind::InvalidOperation,
                    ));
                }
                let mut embedded = match self.data.get(head) {
                    Some(Value::Document(document)) => document.clone(),
                    Some(_) => {
                        log::error!("Field '{}' does not hold an embedded document", head);
                        return Err(OlivineError::new(
                            &format!("Field '{}' does not hold an embedded document", head),
                            ErrorKind::InvalidOperation,
                        ));
                    }
                    None => Document::new(),
                };
                embedded.put(rest, value)?;
                self.data.insert(head.to_string(), Value::Document(embedded));
                Ok(())
            }
        }
    }

    /// Reads a field, descending into embedded documents for dotted paths.
    /// Absent fields read as [`Value::Null`].
    pub fn get(&self, key: &str) -> OlivineResult<Value> {
        if key.is_empty() {
            return Err(OlivineError::new(
                "Document field name cannot be empty",
                ErrorKind::InvalidOperation,
            ));
        }
        match key.split_once(FIELD_SEPARATOR) {
            None => Ok(self.data.get(key).cloned().unwrap_or(Value::Null)),
            Some((head, rest)) => match self.data.get(head) {
                Some(Value::Document(document)) => document.get(rest),
                _ => Ok(Value::Null),
            },
        }
    }

    /// Returns true when the field is present, even if it holds `Null`.
    pub fn has_field(&self, key: &str) -> bool {
        match key.split_once(FIELD_SEPARATOR) {
            None => self.data.contains_key(key),
            Some((head, rest)) => match self.data.get(head) {
                Some(Value::Document(document)) => document.has_field(rest),
                _ => false,
            },
        }
    }

    /// Removes a field if present. Removing an absent field is a no-op.
    pub fn remove(&mut self, key: &str) -> OlivineResult<()> {
        if key.is_empty() {
            return Err(OlivineError::new(
                "Document field name cannot be empty",
                ErrorKind::InvalidOperation,
            ));
        }
        match key.split_once(FIELD_SEPARATOR) {
            None => {
                self.data.remove(key);
                Ok(())
            }
            Some((head, rest)) => {
                if let Some(Value::Document(document)) = self.data.get(head) {
                    let mut embedded = document.clone();
                    embedded.remove(rest)?;
                    self.data.insert(head.to_string(), Value::Document(embedded));
                }
                Ok(())
            }
        }
    }

    /// Returns the document id, allocating and storing a fresh one if the
    /// document has none yet.
    pub fn id(&mut self) -> OlivineResult<OlivineId> {
        match self.data.get(DOC_ID) {
            Some(Value::Id(id)) => Ok(*id),
            Some(other) => {
                log::error!("Field '{}' holds a {} instead of an id", DOC_ID, other.type_name());
                Err(OlivineError::new(
                    &format!("Field '{}' holds a {} instead of an id", DOC_ID, other.type_name()),
                    ErrorKind::InvalidOperation,
                ))
            }
            None => {
                let id = OlivineId::new();
                self.data.insert(DOC_ID.to_string(), Value::Id(id));
                Ok(id)
            }
        }
    }

    /// Returns the document id without allocating one.
    pub fn maybe_id(&self) -> Option<OlivineId> {
        match self.data.get(DOC_ID) {
            Some(Value::Id(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn revision(&self) -> u64 {
        self.data
            .get(DOC_REVISION)
            .and_then(|value| value.as_u64())
            .unwrap_or(0)
    }

    pub fn last_modified(&self) -> u64 {
        self.data
            .get(DOC_MODIFIED)
            .and_then(|value| value.as_u64())
            .unwrap_or(0)
    }

    /// Top-level field names, excluding the reserved metadata fields.
    pub fn fields(&self) -> Vec<String> {
        self.data
            .keys()
            .filter(|key| {
                key.as_str() != DOC_ID
                    && key.as_str() != DOC_REVISION
                    && key.as_str() != DOC_MODIFIED
            })
            .cloned()
            .collect()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for Document {}

impl PartialOrd for Document {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Document {
    fn cmp(&self, other: &Self) -> Ordering {
        self.data.iter().cmp(other.data.iter())
    }
}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.data.len());
        for (key, value) in self.data.iter() {
            key.hash(state);
            value.hash(state);
        }
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields = self
            .data
            .iter()
            .map(|(key, value)| format!("{}: {}", key, value))
            .join(", ");
        write!(f, "{{{}}}", fields)
    }
}

/// Builds a [`Document`] from `key: value` pairs.
///
/// Values go through [`val!`], so nested braces become embedded documents
/// and brackets become arrays.
#[macro_export]
macro_rules! doc {
    () => {
        $crate::document::Document::new()
    };
    ($($key:tt : $value:tt),* $(,)?) => {{
        let mut document = $crate::document::Document::new();
        $(
            document
                .put($crate::document::normalize(stringify!($key)), $crate::val!($value))
                .expect("failed to put value into document");
        )*
        document
    }};
}

/// Builds a [`Value`] from a literal, an expression, a `{...}` document, or
/// a `[...]` array.
#[macro_export]
macro_rules! val {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Document($crate::doc!($($key : $value),*))
    };
    ([ $($element:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$( $crate::val!($element) ),*])
    };
    (null) => {
        $crate::common::Value::Null
    };
    ($other:expr) => {
        $crate::common::Value::from($other)
    };
}
