use crate::common::{atomic, Atomic, ReadExecutor};
use backtrace::Backtrace;
use std::fmt::{Debug, Display};

/// Classifies every error the store can produce.
///
/// The kind is part of the public contract: callers match on it to decide
/// whether a failure is a caller bug (configuration, key or filter misuse),
/// a data conflict (unique constraint), or an environmental problem.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// Invalid registration, unknown type or collection, or a malformed
    /// filter tree.
    Configuration,
    /// A primary key was missing, unset, of the wrong type, or collided
    /// with an existing record.
    KeyViolation,
    /// A write collided with an existing value on a unique index. Carries
    /// the indexed field name.
    UniqueViolation(String),
    /// A filter could not be compiled into a runnable predicate.
    FilterError,
    /// A record could not be converted to or from its document form.
    ObjectMapping,
    /// An underlying I/O operation failed.
    IoError,
    /// The event bus failed to register, deregister, or deliver.
    EventError,
    /// The store was used after `close()`.
    Closed,
    /// The operation is not valid in the current state.
    InvalidOperation,
    /// An unexpected internal failure.
    Internal,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "Configuration error"),
            ErrorKind::KeyViolation => write!(f, "Primary key violation"),
            ErrorKind::UniqueViolation(field) => {
                write!(f, "Unique constraint violation on field '{}'", field)
            }
            ErrorKind::FilterError => write!(f, "Filter error"),
            ErrorKind::ObjectMapping => write!(f, "Object mapping error"),
            ErrorKind::IoError => write!(f, "I/O error"),
            ErrorKind::EventError => write!(f, "Event error"),
            ErrorKind::Closed => write!(f, "Store already closed"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::Internal => write!(f, "Internal error"),
        }
    }
}

/// The error type used throughout the store.
///
/// Carries a message, an [`ErrorKind`], an optional cause chain, and a
/// backtrace captured at construction time.
#[derive(Clone)]
pub struct OlivineError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<OlivineError>>,
    backtrace: Atomic<Backtrace>,
}

/// Result alias used by every fallible operation in the crate.
pub type OlivineResult<T> = Result<T, OlivineError>;

impl OlivineError {
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        OlivineError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: OlivineError) -> Self {
        OlivineError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&OlivineError> {
        self.cause.as_deref()
    }
}

impl Display for OlivineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for OlivineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_kind, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, "\ncaused by: {:?}", cause)?;
        } else {
            self.backtrace
                .read_with(|backtrace| write!(f, "\nbacktrace:\n{:?}", backtrace))?;
        }
        Ok(())
    }
}

impl std::error::Error for OlivineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for OlivineError {
    fn from(error: std::io::Error) -> Self {
        OlivineError::new(&format!("I/O error: {}", error), ErrorKind::IoError)
    }
}
