//! # void_serialize - Reflection-Driven Serialisation
//!
//! Walks object graphs described by `void_reflect` and streams them:
//! - **Walkers**: [`Serialiser`] and [`Deserialiser`] share one depth-first walk
//! - **Protocols**: [`WriteProtocol`] / [`ReadProtocol`] hooks hold everything format specific
//! - **Binary**: [`BinaryWriter`] / [`BinaryReader`], a compact tagged byte stream
//!
//! Polymorphic positions (the top-level object and every pointer) carry a
//! type tag. On read, a tag must name the declared type or one of its
//! descendants, and that is checked before anything is constructed.
//!
//! ## Example
//!
//! ```ignore
//! use void_serialize::prelude::*;
//!
//! let bytes = void_serialize::to_bytes(&db, &scene)?;
//! let scene: Box<Scene> = void_serialize::from_bytes(&db, &bytes)?;
//! ```

pub mod binary;
pub mod config;
pub mod deserialiser;
pub mod error;
pub mod linear;
pub mod protocol;
pub mod serialiser;

use core::any::Any;

use void_reflect::TypeDb;

pub use binary::{BinaryReader, BinaryWriter};
pub use config::StreamConfig;
pub use deserialiser::Deserialiser;
pub use error::{Result, SerialError};
pub use linear::{LinearReader, LinearWriter};
pub use protocol::{ReadProtocol, WriteProtocol};
pub use serialiser::Serialiser;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::binary::{BinaryReader, BinaryWriter};
    pub use crate::config::StreamConfig;
    pub use crate::deserialiser::Deserialiser;
    pub use crate::error::{Result, SerialError};
    pub use crate::protocol::{ReadProtocol, WriteProtocol};
    pub use crate::serialiser::Serialiser;
}

/// Write one object to a tagged binary stream
pub fn to_bytes<T: Any>(db: &TypeDb, object: &T) -> Result<Vec<u8>> {
    let mut serialiser = Serialiser::new(db, BinaryWriter::new(StreamConfig::default()));
    serialiser.serialise(object)?;
    Ok(serialiser.into_protocol().into_bytes())
}

/// Read one object of exactly type `T` from a tagged binary stream
pub fn from_bytes<T: Any>(db: &TypeDb, bytes: &[u8]) -> Result<Box<T>> {
    let mut deserialiser = Deserialiser::new(db, BinaryReader::new(bytes, StreamConfig::default()));
    deserialiser.deserialise_as::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_round_trip() {
        let db = TypeDb::with_builtins().unwrap();
        let bytes = to_bytes(&db, &-42i64).unwrap();
        assert_eq!(*from_bytes::<i64>(&db, &bytes).unwrap(), -42);

        let bytes = to_bytes(&db, &String::from("void")).unwrap();
        assert_eq!(*from_bytes::<String>(&db, &bytes).unwrap(), "void");
    }

    #[test]
    fn test_exact_type_required() {
        let db = TypeDb::with_builtins().unwrap();
        let bytes = to_bytes(&db, &1u8).unwrap();
        assert!(matches!(
            from_bytes::<u16>(&db, &bytes),
            Err(SerialError::TypeConfusion { .. })
        ));
    }
}
