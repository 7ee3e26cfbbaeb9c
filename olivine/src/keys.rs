//! Primary key kinds, values, and generators.
//!
//! Every registered record type and document collection may declare a key
//! field. A key is resolved at insert time in a fixed order: a registered
//! generator always wins, an unset value on an integer kind falls back to
//! the collection sequence, and anything else must be set explicitly.
//! Unset means `Null`, a number that is zero or negative, or an empty
//! string.

use crate::common::Value;
use crate::engine::EngineCollection;
use crate::errors::{ErrorKind, OlivineError, OlivineResult};
use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// The set of types a primary key can take.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyKind {
    I32,
    I64,
    Float,
    BigInt,
    BigDecimal,
    Str,
}

impl KeyKind {
    /// Integer kinds are eligible for sequence auto-assignment.
    pub(crate) fn is_integer(&self) -> bool {
        matches!(self, KeyKind::I32 | KeyKind::I64 | KeyKind::BigInt)
    }
}

impl Display for KeyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            KeyKind::I32 => "i32",
            KeyKind::I64 => "i64",
            KeyKind::Float => "f64",
            KeyKind::BigInt => "big-int",
            KeyKind::BigDecimal => "big-decimal",
            KeyKind::Str => "string",
        };
        write!(f, "{}", name)
    }
}

/// A resolved, set primary key value.
#[derive(Clone, Debug, PartialEq)]
pub enum PrimaryKey {
    I32(i32),
    I64(i64),
    Float(f64),
    BigInt(BigInt),
    BigDecimal(BigDecimal),
    Str(String),
}

impl PrimaryKey {
    pub fn kind(&self) -> KeyKind {
        match self {
            PrimaryKey::I32(_) => KeyKind::I32,
            PrimaryKey::I64(_) => KeyKind::I64,
            PrimaryKey::Float(_) => KeyKind::Float,
            PrimaryKey::BigInt(_) => KeyKind::BigInt,
            PrimaryKey::BigDecimal(_) => KeyKind::BigDecimal,
            PrimaryKey::Str(_) => KeyKind::Str,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            PrimaryKey::I32(v) => Value::I32(*v),
            PrimaryKey::I64(v) => Value::I64(*v),
            PrimaryKey::Float(v) => Value::F64(*v),
            PrimaryKey::BigInt(v) => Value::BigInt(v.clone()),
            PrimaryKey::BigDecimal(v) => Value::BigDecimal(v.clone()),
            PrimaryKey::Str(v) => Value::String(v.clone()),
        }
    }

    /// Reads a key of the given kind out of a field value.
    ///
    /// Returns `Ok(None)` when the value is unset for that kind and an
    /// error with [`ErrorKind::KeyViolation`] when the value cannot be a
    /// key of that kind at all.
    pub fn from_field_value(value: &Value, kind: KeyKind) -> OlivineResult<Option<PrimaryKey>> {
        if value.is_null() {
            return Ok(None);
        }
        let mismatch = || {
            log::error!("Value of type '{}' is not a valid {} key", value.type_name(), kind);
            OlivineError::new(
                &format!("Value of type '{}' is not a valid {} key", value.type_name(), kind),
                ErrorKind::KeyViolation,
            )
        };
        match kind {
            KeyKind::I32 => match value {
                Value::F32(_) | Value::F64(_) => Err(mismatch()),
                _ => {
                    let v = value.as_i32().ok_or_else(mismatch)?;
                    Ok((v > 0).then_some(PrimaryKey::I32(v)))
                }
            },
            KeyKind::I64 => match value {
                Value::F32(_) | Value::F64(_) => Err(mismatch()),
                _ => {
                    let v = value.as_i64().ok_or_else(mismatch)?;
                    Ok((v > 0).then_some(PrimaryKey::I64(v)))
                }
            },
            KeyKind::Float => {
                if !value.is_number() {
                    return Err(mismatch());
                }
                let v = value.as_f64().ok_or_else(mismatch)?;
                Ok((v > 0.0).then_some(PrimaryKey::Float(v)))
            }
            KeyKind::BigInt => {
                let v = value.as_big_int().ok_or_else(mismatch)?;
                Ok((v.sign() == Sign::Plus).then_some(PrimaryKey::BigInt(v)))
            }
            KeyKind::BigDecimal => {
                if !value.is_number() {
                    return Err(mismatch());
                }
                let v = value.as_big_decimal().ok_or_else(mismatch)?;
                Ok((v.sign() == Sign::Plus).then_some(PrimaryKey::BigDecimal(v)))
            }
            KeyKind::Str => {
                let v = value.as_str().ok_or_else(mismatch)?;
                Ok((!v.is_empty()).then(|| PrimaryKey::Str(v.to_string())))
            }
        }
    }
}

/// Declares which field of a record holds its primary key, and of what kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyDescriptor {
    pub(crate) field: String,
    pub(crate) kind: KeyKind,
}

impl KeyDescriptor {
    pub fn new(field: impl Into<String>, kind: KeyKind) -> Self {
        KeyDescriptor {
            field: field.into(),
            kind,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }
}

#[derive(Clone)]
enum GeneratorFn {
    I32(Arc<dyn Fn() -> i32 + Send + Sync>),
    I64(Arc<dyn Fn() -> i64 + Send + Sync>),
    Float(Arc<dyn Fn() -> f64 + Send + Sync>),
    BigInt(Arc<dyn Fn() -> BigInt + Send + Sync>),
    BigDecimal(Arc<dyn Fn() -> BigDecimal + Send + Sync>),
    Str(Arc<dyn Fn() -> String + Send + Sync>),
}

/// A user supplied key source.
///
/// When a generator is registered for a collection it is consulted on
/// every insert, regardless of what the key field already holds.
#[derive(Clone)]
pub struct KeyGenerator {
    inner: GeneratorFn,
}

impl KeyGenerator {
    pub fn of_i32(f: impl Fn() -> i32 + Send + Sync + 'static) -> Self {
        KeyGenerator {
            inner: GeneratorFn::I32(Arc::new(f)),
        }
    }

    pub fn of_i64(f: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        KeyGenerator {
            inner: GeneratorFn::I64(Arc::new(f)),
        }
    }

    pub fn of_float(f: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        KeyGenerator {
            inner: GeneratorFn::Float(Arc::new(f)),
        }
    }

    pub fn of_big_int(f: impl Fn() -> BigInt + Send + Sync + 'static) -> Self {
        KeyGenerator {
            inner: GeneratorFn::BigInt(Arc::new(f)),
        }
    }

    pub fn of_big_decimal(f: impl Fn() -> BigDecimal + Send + Sync + 'static) -> Self {
        KeyGenerator {
            inner: GeneratorFn::BigDecimal(Arc::new(f)),
        }
    }

    pub fn of_string(f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        KeyGenerator {
            inner: GeneratorFn::Str(Arc::new(f)),
        }
    }

    pub fn kind(&self) -> KeyKind {
        match &self.inner {
            GeneratorFn::I32(_) => KeyKind::I32,
            GeneratorFn::I64(_) => KeyKind::I64,
            GeneratorFn::Float(_) => KeyKind::Float,
            GeneratorFn::BigInt(_) => KeyKind::BigInt,
            GeneratorFn::BigDecimal(_) => KeyKind::BigDecimal,
            GeneratorFn::Str(_) => KeyKind::Str,
        }
    }

    pub(crate) fn generate(&self) -> Value {
        match &self.inner {
            GeneratorFn::I32(f) => Value::I32(f()),
            GeneratorFn::I64(f) => Value::I64(f()),
            GeneratorFn::Float(f) => Value::F64(f()),
            GeneratorFn::BigInt(f) => Value::BigInt(f()),
            GeneratorFn::BigDecimal(f) => Value::BigDecimal(f()),
            GeneratorFn::Str(f) => Value::String(f()),
        }
    }
}

impl std::fmt::Debug for KeyGenerator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyGenerator")
            .field("kind", &self.kind())
            .finish()
    }
}

/// Resolves the primary key for a document about to be inserted and
/// writes it back into the key field.
pub(crate) fn resolve_insert_key(
    document: &mut crate::document::Document,
    descriptor: &KeyDescriptor,
    generator: Option<&KeyGenerator>,
    engine: &EngineCollection,
) -> OlivineResult<PrimaryKey> {
    if let Some(generator) = generator {
        let value = generator.generate();
        return match PrimaryKey::from_field_value(&value, descriptor.kind)? {
            Some(key) => {
                document.put(&descriptor.field, value)?;
                Ok(key)
            }
            None => {
                log::error!(
                    "Key generator produced an unset value for field '{}'",
                    descriptor.field
                );
                Err(OlivineError::new(
                    &format!(
                        "Key generator produced an unset value for field '{}'",
                        descriptor.field
                    ),
                    ErrorKind::KeyViolation,
                ))
            }
        };
    }

    let current = document.get(&descriptor.field)?;
    if let Some(key) = PrimaryKey::from_field_value(&current, descriptor.kind)? {
        return Ok(key);
    }

    if descriptor.kind.is_integer() {
        let sequence = engine.next_sequence()?;
        let key = match descriptor.kind {
            KeyKind::I32 => {
                let v = i32::try_from(sequence).map_err(|_| {
                    log::error!("Sequence exceeded the i32 key range for field '{}'", descriptor.field);
                    OlivineError::new(
                        &format!(
                            "Sequence exceeded the i32 key range for field '{}'",
                            descriptor.field
                        ),
                        ErrorKind::KeyViolation,
                    )
                })?;
                PrimaryKey::I32(v)
            }
            KeyKind::I64 => {
                let v = i64::try_from(sequence).map_err(|_| {
                    log::error!("Sequence exceeded the i64 key range for field '{}'", descriptor.field);
                    OlivineError::new(
                        &format!(
                            "Sequence exceeded the i64 key range for field '{}'",
                            descriptor.field
                        ),
                        ErrorKind::KeyViolation,
                    )
                })?;
                PrimaryKey::I64(v)
            }
            KeyKind::BigInt => PrimaryKey::BigInt(BigInt::from(sequence)),
            _ => unreachable!(),
        };
        document.put(&descriptor.field, key.to_value())?;
        return Ok(key);
    }

    log::error!(
        "No value provided for key field '{}' and no generator is registered",
        descriptor.field
    );
    Err(OlivineError::new(
        &format!(
            "No value provided for key field '{}' and no generator is registered",
            descriptor.field
        ),
        ErrorKind::KeyViolation,
    ))
}
