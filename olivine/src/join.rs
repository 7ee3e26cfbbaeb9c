//! Hash joins between collections.
//!
//! A join buckets the child documents by their foreign field value and
//! attaches each bucket to the matching parents as an array under the
//! target field. A parent with no matching children keeps the target
//! field absent rather than carrying an empty array.

use crate::common::Value;
use crate::document::Document;
use crate::errors::{ErrorKind, OlivineError, OlivineResult};
use std::collections::HashMap;

/// Describes how child documents attach to parent documents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lookup {
    /// Parent field whose value is matched against the children.
    pub local_field: String,
    /// Child field whose value is matched against the parents.
    pub foreign_field: String,
    /// Parent field under which the matching children are stored.
    pub target_field: String,
}

impl Lookup {
    pub fn new(
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
        target_field: impl Into<String>,
    ) -> Self {
        Lookup {
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            target_field: target_field.into(),
        }
    }

    fn validate(&self) -> OlivineResult<()> {
        if self.local_field.is_empty() || self.foreign_field.is_empty() || self.target_field.is_empty()
        {
            log::error!("Join lookup fields cannot be empty");
            return Err(OlivineError::new(
                "Join lookup fields cannot be empty",
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}

/// Joins children onto parents per the lookup, preserving parent order.
pub(crate) fn join_documents(
    parents: Vec<Document>,
    children: &[Document],
    lookup: &Lookup,
) -> OlivineResult<Vec<Document>> {
    lookup.validate()?;

    // Children with an absent foreign field can never match.
    let mut buckets: HashMap<Value, Vec<Value>> = HashMap::new();
    for child in children {
        let key = child.get(&lookup.foreign_field)?;
        if key.is_null() {
            continue;
        }
        buckets
            .entry(key)
            .or_default()
            .push(Value::Document(child.clone()));
    }

    let mut joined = Vec::with_capacity(parents.len());
    for mut parent in parents {
        let key = parent.get(&lookup.local_field)?;
        if !key.is_null() {
            if let Some(bucket) = buckets.get(&key) {
                parent.put(&lookup.target_field, Value::Array(bucket.clone()))?;
            }
        }
        joined.push(parent);
    }
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn lookup() -> Lookup {
        Lookup::new("serial", "probe_serial", "readings")
    }

    #[test]
    fn test_join_attaches_matching_children() {
        let parents = vec![doc! { serial: "p-1" }, doc! { serial: "p-2" }];
        let children = vec![
            doc! { probe_serial: "p-1", value: 1i64 },
            doc! { probe_serial: "p-2", value: 2i64 },
            doc! { probe_serial: "p-1", value: 3i64 },
        ];

        let joined = join_documents(parents, &children, &lookup()).unwrap();
        assert_eq!(joined.len(), 2);

        let readings = joined[0].get("readings").unwrap();
        let readings = readings.as_array().unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(
            readings[0].as_document().unwrap().get("value").unwrap(),
            Value::I64(1)
        );
        assert_eq!(
            readings[1].as_document().unwrap().get("value").unwrap(),
            Value::I64(3)
        );
        assert_eq!(
            joined[1].get("readings").unwrap().as_array().unwrap().len(),
            1
        );
    }

    #[test]
    fn test_unmatched_parent_has_no_target_field() {
        let parents = vec![doc! { serial: "p-1" }, doc! { serial: "lonely" }];
        let children = vec![doc! { probe_serial: "p-1", value: 1i64 }];

        let joined = join_documents(parents, &children, &lookup()).unwrap();
        assert!(joined[0].has_field("readings"));
        assert!(!joined[1].has_field("readings"));
        assert_eq!(joined[1].get("readings").unwrap(), Value::Null);
    }

    #[test]
    fn test_null_keys_never_match() {
        let parents = vec![doc! { serial: "p-1" }, doc! { name: "keyless" }];
        let children = vec![doc! { value: 9i64 }];

        let joined = join_documents(parents, &children, &lookup()).unwrap();
        assert!(!joined[0].has_field("readings"));
        assert!(!joined[1].has_field("readings"));
    }

    #[test]
    fn test_cross_width_numeric_keys_match() {
        let parents = vec![doc! { serial: 7i64 }];
        let children = vec![doc! { probe_serial: 7i32, value: 1i64 }];

        let joined = join_documents(parents, &children, &lookup()).unwrap();
        assert!(joined[0].has_field("readings"));
    }

    #[test]
    fn test_empty_lookup_field_is_rejected() {
        let bad = Lookup::new("", "b", "c");
        assert!(join_documents(vec![], &[], &bad).is_err());
    }

    #[test]
    fn test_parent_order_is_preserved() {
        let parents = vec![
            doc! { serial: "c" },
            doc! { serial: "a" },
            doc! { serial: "b" },
        ];
        let joined = join_documents(parents, &[], &lookup()).unwrap();
        let order: Vec<Value> = joined
            .iter()
            .map(|parent| parent.get("serial").unwrap())
            .collect();
        assert_eq!(
            order,
            vec![Value::from("c"), Value::from("a"), Value::from("b")]
        );
    }
}
