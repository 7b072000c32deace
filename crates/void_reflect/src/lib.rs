//! # void_reflect - Runtime Reflection
//!
//! A runtime type registry that lets engine structures describe their own
//! shape without compiler-generated metadata:
//! - **Types**: name, size, constructor, single base type, enum constants
//! - **Fields**: typed accessors, attributes, container adapters
//! - **Entities**: polymorphic objects tagged with their concrete type
//!
//! The registry is consumed by `void_serialize`, which walks these shapes to
//! read and write object graphs.
//!
//! ## Example
//!
//! ```ignore
//! use void_reflect::prelude::*;
//!
//! #[derive(Default)]
//! struct Vector3f { x: f32, y: f32, z: f32 }
//! impl Member for Vector3f {}
//!
//! let mut db = TypeDb::with_builtins()?;
//! db.create::<Vector3f>("Vector3f")?
//!     .field("x", |v| &v.x, |v| &mut v.x)
//!     .field("y", |v| &v.y, |v| &mut v.y)
//!     .field("z", |v| &v.z, |v| &mut v.z);
//! ```

pub mod assert;
pub mod builder;
pub mod container;
pub mod entity;
pub mod error;
pub mod field;
pub mod leaf;
pub mod manager;
pub mod member;
pub mod pointer;
pub mod type_db;
pub mod type_info;

pub use assert::AssertMode;
pub use builder::TypeBuilder;
pub use container::{
    ContainerAdapter, ContainerShape, Cursor, ElementInfo, FieldContainer, ReadIterator,
    WriteIterator,
};
pub use entity::{AsAny, Entity, EntityCore, Instance, Options};
pub use error::{ReflectError, Result};
pub use field::{Field, FieldAccess, FieldAttributes, MemberKind, PointerInfo};
pub use leaf::{RawCodec, ReflectEnum, Stringify};
pub use manager::EntityManager;
pub use member::Member;
pub use pointer::{EntityPtr, PointerAccess, PointerSlot};
pub use type_db::{type_name_hash, SharedTypeDb, TypeDb, TypeKey, TypeRef};
pub use type_info::{EnumConstant, FieldEntry, Type};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::builder::TypeBuilder;
    pub use crate::entity::{Entity, EntityCore, Instance, Options};
    pub use crate::error::{ReflectError, Result};
    pub use crate::field::FieldAttributes;
    pub use crate::leaf::ReflectEnum;
    pub use crate::manager::EntityManager;
    pub use crate::member::Member;
    pub use crate::pointer::EntityPtr;
    pub use crate::type_db::{TypeDb, TypeKey};
    pub use crate::type_info::Type;
}
