use crate::errors::{ErrorKind, OlivineError, OlivineResult};
use crate::ID_GENERATOR;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Display;

static ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{1,20}$").unwrap_or_else(|err| {
        // The pattern is a compile-time literal, so this cannot fail.
        unreachable!("invalid id pattern: {}", err)
    })
});

/// The engine-assigned identity of a stored document.
///
/// Every document carries exactly one `OlivineId` under the reserved `_id`
/// field. Ids are time-ordered, so iterating the primary map yields
/// documents in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OlivineId {
    id: u64,
}

impl OlivineId {
    /// Allocates a fresh, unique id.
    pub fn new() -> OlivineId {
        OlivineId {
            id: ID_GENERATOR.next_id(),
        }
    }

    /// Wraps an already-allocated raw id value.
    pub fn from_value(id: u64) -> OlivineId {
        OlivineId { id }
    }

    /// Parses an id from its decimal string form.
    pub fn parse(value: &str) -> OlivineResult<OlivineId> {
        if !ID_PATTERN.is_match(value) {
            log::error!("Invalid id string '{}'", value);
            return Err(OlivineError::new(
                &format!("'{}' is not a valid id", value),
                ErrorKind::InvalidOperation,
            ));
        }
        value.parse::<u64>().map(OlivineId::from_value).map_err(|err| {
            OlivineError::new(
                &format!("'{}' is not a valid id: {}", value, err),
                ErrorKind::InvalidOperation,
            )
        })
    }

    pub fn value(&self) -> u64 {
        self.id
    }
}

impl Default for OlivineId {
    fn default() -> Self {
        OlivineId::new()
    }
}

impl Display for OlivineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}
