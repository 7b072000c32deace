//! Error types for object streams

use thiserror::Error;
use void_reflect::ReflectError;

/// Serialisation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerialError {
    /// The registry rejected an operation
    #[error(transparent)]
    Reflect(#[from] ReflectError),
    /// A type tag names no registered type
    #[error("Unknown type hash {0:#010x}")]
    UnknownTypeHash(u32),
    /// A type tag names a type that does not derive from the declared type
    #[error("Type '{actual}' is not a '{declared}'")]
    TypeConfusion { declared: String, actual: String },
    /// The stream ended early or holds an impossible value
    #[error("Malformed stream at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },
    /// A leaf value could not be converted
    #[error("Invalid '{ty}' value: {reason}")]
    InvalidLeaf { ty: String, reason: String },
    /// A path segment in the stream did not match the requested path
    #[error("Stream path mismatch: expected '{expected}', found '{found}'")]
    PathMismatch { expected: String, found: String },
    /// A length read from or written to the stream exceeds the configured limit
    #[error("{what} length {len} exceeds the limit of {limit}")]
    LimitExceeded {
        what: &'static str,
        len: usize,
        limit: usize,
    },
    /// A null was met where the stream cannot represent one
    #[error("Unexpected null value for '{0}'")]
    NullValue(String),
}

/// Result type alias
pub type Result<T> = core::result::Result<T, SerialError>;
