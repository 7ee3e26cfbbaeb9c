//! Validated store configuration.
//!
//! The builder erases typed registrations into [`RegistrationData`] and
//! collects them here. An [`OlivineConfig`] is immutable once built; the
//! store facade consumes it at open time.

use crate::engine::StorageEngine;
use crate::errors::{ErrorKind, OlivineError, OlivineResult};
use crate::keys::{KeyDescriptor, KeyGenerator};
use crate::registration::IndexSpec;
use std::any::TypeId;
use std::collections::HashMap;

/// One registered collection, with the record type erased.
#[derive(Clone)]
pub(crate) struct RegistrationData {
    pub(crate) name: String,
    pub(crate) key: Option<KeyDescriptor>,
    pub(crate) generator: Option<KeyGenerator>,
    pub(crate) indexes: Vec<IndexSpec>,
    pub(crate) optional_fields: Vec<String>,
}

/// The configuration an [`Olivine`] store opens with.
///
/// [`Olivine`]: crate::olivine::Olivine
pub struct OlivineConfig {
    pub(crate) engine: StorageEngine,
    pub(crate) registrations: Vec<RegistrationData>,
    pub(crate) bindings: HashMap<TypeId, String>,
}

impl OlivineConfig {
    pub(crate) fn new(
        engine: StorageEngine,
        registrations: Vec<RegistrationData>,
        bindings: HashMap<TypeId, String>,
    ) -> Self {
        OlivineConfig {
            engine,
            registrations,
            bindings,
        }
    }

    /// The collection name a record type was registered under.
    pub(crate) fn collection_of(&self, type_id: &TypeId) -> OlivineResult<&str> {
        self.bindings.get(type_id).map(String::as_str).ok_or_else(|| {
            log::error!("Record type is not registered with this store");
            OlivineError::new(
                "Record type is not registered with this store",
                ErrorKind::Configuration,
            )
        })
    }
}
