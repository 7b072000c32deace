//! Field - metadata for one member of a reflected type
//!
//! Fields are addressed through typed accessor function pairs rather than
//! byte offsets. The accessors are erased behind [`FieldAccess`] so a walker
//! can reach a member knowing only the owning object as `dyn Any`.

use core::any::Any;
use core::fmt;

use bitflags::bitflags;

use crate::container::FieldContainer;
use crate::entity::Instance;
use crate::error::{ReflectError, Result};
use crate::member::Member;
use crate::pointer::PointerAccess;
use crate::type_db::TypeRef;

bitflags! {
    /// Per-field behaviour flags
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FieldAttributes: u8 {
        /// Not editable through setters
        const READ_ONLY = 1 << 0;
        /// Excluded from serialisation
        const TRANSIENT = 1 << 1;
        /// Presented inline by tools
        const INLINE = 1 << 2;
        /// Presented in hexadecimal by tools
        const HEX = 1 << 3;
        /// Changing the field triggers a refresh
        const REFRESH = 1 << 4;
    }
}

/// Type-erased access to a member of an object
pub trait FieldAccess: Send + Sync {
    /// Borrow the member, or None if `object` is not the owning type
    fn get<'a>(&self, object: &'a dyn Any) -> Option<&'a dyn Any>;

    /// Mutably borrow the member, or None if `object` is not the owning type
    fn get_mut<'a>(&self, object: &'a mut dyn Any) -> Option<&'a mut dyn Any>;

    /// Replace the member with an owned value
    fn assign(&self, object: &mut dyn Any, value: Instance) -> Result<()>;
}

/// Typed accessor pair for member `M` of owner `T`
pub(crate) struct Accessor<T, M> {
    get: fn(&T) -> &M,
    get_mut: fn(&mut T) -> &mut M,
}

impl<T, M> Accessor<T, M> {
    pub(crate) fn new(get: fn(&T) -> &M, get_mut: fn(&mut T) -> &mut M) -> Self {
        Self { get, get_mut }
    }
}

impl<T: Any, M: Member> FieldAccess for Accessor<T, M> {
    fn get<'a>(&self, object: &'a dyn Any) -> Option<&'a dyn Any> {
        object.downcast_ref::<T>().map(|owner| (self.get)(owner) as &dyn Any)
    }

    fn get_mut<'a>(&self, object: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        object
            .downcast_mut::<T>()
            .map(|owner| (self.get_mut)(owner) as &mut dyn Any)
    }

    fn assign(&self, object: &mut dyn Any, value: Instance) -> Result<()> {
        let owner = object.downcast_mut::<T>().ok_or_else(ReflectError::mismatch::<T>)?;
        *(self.get_mut)(owner) = M::from_instance(value)?;
        Ok(())
    }
}

/// Declared type and access of a pointer member
#[derive(Clone, Copy)]
pub struct PointerInfo {
    /// Declared static type of the pointee
    pub target: TypeRef,
    /// Access to the pointer slot
    pub access: PointerAccess,
}

impl fmt::Debug for PointerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointerInfo")
            .field("target", &self.target.rust_name())
            .finish()
    }
}

/// What kind of member a field holds
pub enum MemberKind {
    /// A value of the declared type, stored inline
    Value(TypeRef),
    /// An owning pointer to the declared type or a descendant
    Pointer(PointerInfo),
    /// A supported container shape
    Container(FieldContainer),
}

impl MemberKind {
    /// Declared type of a value or pointer member
    pub fn declared_type(&self) -> Option<TypeRef> {
        match self {
            MemberKind::Value(type_ref) => Some(*type_ref),
            MemberKind::Pointer(info) => Some(info.target),
            MemberKind::Container(_) => None,
        }
    }
}

impl fmt::Debug for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKind::Value(type_ref) => f.debug_tuple("Value").field(&type_ref.rust_name()).finish(),
            MemberKind::Pointer(info) => f.debug_tuple("Pointer").field(info).finish(),
            MemberKind::Container(container) => f.debug_tuple("Container").field(container).finish(),
        }
    }
}

/// Metadata for one member of a reflected type
pub struct Field {
    name: String,
    member: TypeRef,
    kind: MemberKind,
    access: Box<dyn FieldAccess>,
    pub(crate) attributes: FieldAttributes,
    pub(crate) group: Option<String>,
    pub(crate) description: Option<String>,
}

impl Field {
    pub(crate) fn new<T: Any, M: Member>(name: &str, get: fn(&T) -> &M, get_mut: fn(&mut T) -> &mut M) -> Self {
        Self {
            name: name.into(),
            member: TypeRef::of::<M>(),
            kind: M::member_kind(),
            access: Box::new(Accessor::new(get, get_mut)),
            attributes: FieldAttributes::empty(),
            group: None,
            description: None,
        }
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rust type of the member itself
    pub fn member_type(&self) -> TypeRef {
        self.member
    }

    /// Member kind
    pub fn kind(&self) -> &MemberKind {
        &self.kind
    }

    /// Declared type of a value or pointer member
    pub fn declared_type(&self) -> Option<TypeRef> {
        self.kind.declared_type()
    }

    /// Whether the member is an owning pointer
    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, MemberKind::Pointer(_))
    }

    /// Container adapter, if the member is a supported container
    pub fn container(&self) -> Option<&FieldContainer> {
        match &self.kind {
            MemberKind::Container(container) => Some(container),
            _ => None,
        }
    }

    /// Attribute flags
    pub fn attributes(&self) -> FieldAttributes {
        self.attributes
    }

    /// Whether the field is excluded from serialisation
    pub fn is_transient(&self) -> bool {
        self.attributes.contains(FieldAttributes::TRANSIENT)
    }

    /// Whether the field rejects assignment through [`Field::set`]
    pub fn is_read_only(&self) -> bool {
        self.attributes.contains(FieldAttributes::READ_ONLY)
    }

    /// Tool grouping
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Human readable description
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Borrow the member of `object`
    pub fn get<'a>(&self, object: &'a dyn Any) -> Option<&'a dyn Any> {
        self.access.get(object)
    }

    /// Mutably borrow the member of `object`
    pub fn get_mut<'a>(&self, object: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        self.access.get_mut(object)
    }

    /// Replace the member of `object` with an owned value
    pub fn set(&self, object: &mut dyn Any, value: Instance) -> Result<()> {
        if self.is_read_only() {
            return Err(ReflectError::ReadOnly(self.name.clone()));
        }
        self.access.assign(object, value)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("attributes", &self.attributes)
            .finish()
    }
}
