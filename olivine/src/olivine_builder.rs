use crate::engine::memory::InMemoryEngine;
use crate::engine::StorageEngine;
use crate::errors::{ErrorKind, OlivineError, OlivineResult};
use crate::olivine::Olivine;
use crate::olivine_config::{OlivineConfig, RegistrationData};
use crate::registration::{CollectionRegistration, Entity, EntityRegistration};
use std::any::TypeId;
use std::collections::HashMap;

/// Builder for configuring and opening an [`Olivine`] store.
///
/// All record types and document collections are registered here, before
/// the store opens. Configuration errors are captured at the call that
/// caused them and returned from [`open`], so registration chains do not
/// need intermediate error handling.
///
/// # Examples
///
/// ```rust,ignore
/// let db = Olivine::builder()
///     .register(
///         EntityRegistration::<Probe>::new("probes")
///             .with_key("serial", KeyKind::Str)
///             .with_index(IndexSpec::non_unique("site")),
///     )
///     .register_collection(CollectionRegistration::new("readings"))
///     .open()?;
/// ```
///
/// [`open`]: OlivineBuilder::open
#[derive(Default)]
pub struct OlivineBuilder {
    error: Option<OlivineError>,
    engine: Option<StorageEngine>,
    registrations: Vec<RegistrationData>,
    bindings: HashMap<TypeId, String>,
}

impl OlivineBuilder {
    pub fn new() -> Self {
        OlivineBuilder {
            error: None,
            engine: None,
            registrations: Vec::new(),
            bindings: HashMap::new(),
        }
    }

    /// Uses the given storage engine instead of the in-memory default.
    pub fn with_engine(mut self, engine: StorageEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Registers a record type.
    pub fn register<T: Entity>(mut self, registration: EntityRegistration<T>) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.add_entity(registration) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Registers a schemaless document collection.
    pub fn register_collection(mut self, registration: CollectionRegistration) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.add_collection(registration) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Validates the configuration and opens the store.
    pub fn open(self) -> OlivineResult<Olivine> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let engine = self.engine.unwrap_or_else(InMemoryEngine::create);
        let config = OlivineConfig::new(engine, self.registrations, self.bindings);
        Olivine::open(config)
    }

    fn add_entity<T: Entity>(&mut self, registration: EntityRegistration<T>) -> OlivineResult<()> {
        registration.validate()?;
        self.check_collection_name(&registration.collection)?;
        let type_id = TypeId::of::<T>();
        if self.bindings.contains_key(&type_id) {
            log::error!(
                "Record type is already registered under collection '{}'",
                registration.collection
            );
            return Err(OlivineError::new(
                &format!(
                    "Record type is already registered under collection '{}'",
                    registration.collection
                ),
                ErrorKind::Configuration,
            ));
        }
        self.bindings.insert(type_id, registration.collection.clone());
        self.registrations.push(RegistrationData {
            name: registration.collection,
            key: registration.key,
            generator: registration.generator,
            indexes: registration.indexes,
            optional_fields: registration.optional_fields,
        });
        Ok(())
    }

    fn add_collection(&mut self, registration: CollectionRegistration) -> OlivineResult<()> {
        registration.validate()?;
        self.check_collection_name(&registration.name)?;
        self.registrations.push(RegistrationData {
            name: registration.name,
            key: None,
            generator: None,
            indexes: registration.indexes,
            optional_fields: registration.optional_fields,
        });
        Ok(())
    }

    fn check_collection_name(&self, name: &str) -> OlivineResult<()> {
        if self.registrations.iter().any(|existing| existing.name == name) {
            log::error!("Collection '{}' is registered twice", name);
            return Err(OlivineError::new(
                &format!("Collection '{}' is registered twice", name),
                ErrorKind::Configuration,
            ));
        }
        Ok(())
    }
}
