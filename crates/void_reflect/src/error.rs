//! Error types for the reflection registry

use thiserror::Error;

/// Reflection errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReflectError {
    /// A Rust type was used that has no registry entry
    #[error("Type not registered: {0}")]
    UnknownType(String),
    /// A type name has no registry entry
    #[error("No type registered under the name '{0}'")]
    UnknownTypeName(String),
    /// A dynamic type is not a descendant of the declared type
    #[error("Type '{actual}' is not a '{declared}'")]
    TypeConfusion { declared: String, actual: String },
    /// A type, name or name hash was registered twice
    #[error("Duplicate registration: {0}")]
    DuplicateRegistration(String),
    /// The name hashes to the value reserved for null type tags
    #[error("Type name '{0}' hashes to the reserved null tag")]
    ReservedHash(String),
    /// Container shape does not support the requested operation
    #[error("{shape} containers do not support '{operation}'")]
    Unsupported {
        shape: &'static str,
        operation: &'static str,
    },
    /// An object was not of the Rust type an accessor expected
    #[error("Object is not a '{expected}'")]
    ObjectMismatch { expected: String },
    /// An entity was required but a plain value was supplied
    #[error("Type '{0}' is not an entity")]
    NotAnEntity(String),
    /// A fixed-length container received more elements than it holds
    #[error("Fixed array of {capacity} elements is full")]
    CapacityExceeded { capacity: usize },
    /// A read-only field was assigned through its setter
    #[error("Field '{0}' is read-only")]
    ReadOnly(String),
    /// A programmer-error assertion failed
    #[error("Assertion failed: {0}")]
    Assertion(String),
}

impl ReflectError {
    /// Shorthand for an object mismatch on a Rust type
    pub(crate) fn mismatch<T: ?Sized>() -> Self {
        Self::ObjectMismatch {
            expected: core::any::type_name::<T>().into(),
        }
    }
}

/// Result type alias
pub type Result<T> = core::result::Result<T, ReflectError>;
