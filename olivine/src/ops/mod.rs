//! Per-collection operation plumbing.
//!
//! A [`CollectionContext`] bundles everything an operation needs for one
//! collection: the engine handle, the key declaration, the optional field
//! list, the change dispatcher, and the per-key lock registry. The store
//! facade builds one context per registered collection at open time and
//! hands it to the read and write paths.

pub mod cursor;
pub(crate) mod read;
pub(crate) mod write;

use crate::common::KeyLockRegistry;
use crate::engine::EngineCollection;
use crate::errors::{ErrorKind, OlivineError, OlivineResult};
use crate::events::ChangeDispatcher;
use crate::keys::{KeyDescriptor, KeyGenerator, PrimaryKey};
use crate::olivine_config::RegistrationData;

pub(crate) struct CollectionContext {
    pub(crate) name: String,
    pub(crate) engine: EngineCollection,
    pub(crate) key: Option<KeyDescriptor>,
    pub(crate) generator: Option<KeyGenerator>,
    pub(crate) optional_fields: Vec<String>,
    pub(crate) dispatcher: ChangeDispatcher,
    pub(crate) key_locks: KeyLockRegistry,
}

impl CollectionContext {
    pub(crate) fn new(data: RegistrationData, engine: EngineCollection) -> Self {
        CollectionContext {
            name: data.name,
            engine,
            key: data.key,
            generator: data.generator,
            optional_fields: data.optional_fields,
            dispatcher: ChangeDispatcher::new(),
            key_locks: KeyLockRegistry::default(),
        }
    }

    /// The declared key, or an error for key-less collections.
    pub(crate) fn key_descriptor(&self) -> OlivineResult<&KeyDescriptor> {
        self.key.as_ref().ok_or_else(|| {
            log::error!("Collection '{}' declares no key field", self.name);
            OlivineError::new(
                &format!("Collection '{}' declares no key field", self.name),
                ErrorKind::InvalidOperation,
            )
        })
    }

    /// A key addressing this collection must match the declared kind.
    pub(crate) fn check_key_kind(&self, key: &PrimaryKey) -> OlivineResult<()> {
        let descriptor = self.key_descriptor()?;
        if key.kind() != descriptor.kind() {
            log::error!(
                "A {} key cannot address collection '{}' with {} keys",
                key.kind(),
                self.name,
                descriptor.kind()
            );
            return Err(OlivineError::new(
                &format!(
                    "A {} key cannot address collection '{}' with {} keys",
                    key.kind(),
                    self.name,
                    descriptor.kind()
                ),
                ErrorKind::KeyViolation,
            ));
        }
        Ok(())
    }
}
