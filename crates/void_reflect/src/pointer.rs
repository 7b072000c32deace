//! Owning pointers as reflected members
//!
//! A pointer member is walked polymorphically: its target is written with
//! a type tag, and on read the tag chooses which concrete type to build.
//! [`EntityPtr`] holds any entity deriving from its declared type `B`;
//! `Option<Box<T>>` holds exactly a `T`.

use core::any::{Any, TypeId};
use core::fmt;
use core::marker::PhantomData;

use crate::entity::{Entity, Instance};
use crate::error::{ReflectError, Result};
use crate::field::{MemberKind, PointerInfo};
use crate::member::Member;
use crate::type_db::TypeRef;

/// Type-erased view of an owning, nullable pointer
pub trait PointerSlot: Any {
    /// The pointee, if any
    fn target(&self) -> Option<&dyn Any>;

    /// The pointee, mutably, if any
    fn target_mut(&mut self) -> Option<&mut dyn Any>;

    /// Take ownership of a freshly built pointee
    fn assign(&mut self, instance: Instance) -> Result<()>;

    /// Drop the pointee
    fn clear(&mut self);

    /// Whether the pointer is null
    fn is_null(&self) -> bool {
        self.target().is_none()
    }
}

/// Access to the [`PointerSlot`] behind a pointer member
#[derive(Clone, Copy)]
pub struct PointerAccess {
    slot: fn(&dyn Any) -> Option<&dyn PointerSlot>,
    slot_mut: fn(&mut dyn Any) -> Option<&mut dyn PointerSlot>,
}

fn slot_ref<P: PointerSlot>(member: &dyn Any) -> Option<&dyn PointerSlot> {
    member.downcast_ref::<P>().map(|pointer| pointer as &dyn PointerSlot)
}

fn slot_mut<P: PointerSlot>(member: &mut dyn Any) -> Option<&mut dyn PointerSlot> {
    member.downcast_mut::<P>().map(|pointer| pointer as &mut dyn PointerSlot)
}

impl PointerAccess {
    /// Access for pointer type `P`
    pub fn of<P: PointerSlot>() -> Self {
        Self {
            slot: slot_ref::<P>,
            slot_mut: slot_mut::<P>,
        }
    }

    /// View a pointer member as a slot
    pub fn slot<'a>(&self, member: &'a dyn Any) -> Option<&'a dyn PointerSlot> {
        (self.slot)(member)
    }

    /// View a mutable pointer member as a slot
    pub fn slot_mut<'a>(&self, member: &'a mut dyn Any) -> Option<&'a mut dyn PointerSlot> {
        (self.slot_mut)(member)
    }
}

impl fmt::Debug for PointerAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PointerAccess")
    }
}

/// Owning, nullable pointer to an entity deriving from `B`
pub struct EntityPtr<B> {
    inner: Option<Box<dyn Entity>>,
    _marker: PhantomData<fn() -> B>,
}

impl<B: Entity> EntityPtr<B> {
    /// A null pointer
    pub fn null() -> Self {
        Self {
            inner: None,
            _marker: PhantomData,
        }
    }

    /// Point at a new entity
    pub fn new<T: Entity>(entity: T) -> Self {
        Self::from_box(Box::new(entity))
    }

    /// Take ownership of a boxed entity
    pub fn from_box(entity: Box<dyn Entity>) -> Self {
        Self {
            inner: Some(entity),
            _marker: PhantomData,
        }
    }

    /// Borrow the pointee
    pub fn get(&self) -> Option<&dyn Entity> {
        match &self.inner {
            Some(entity) => Some(&**entity),
            None => None,
        }
    }

    /// Mutably borrow the pointee
    pub fn get_mut(&mut self) -> Option<&mut dyn Entity> {
        match &mut self.inner {
            Some(entity) => Some(&mut **entity),
            None => None,
        }
    }

    /// Whether the pointer is null
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// Take the pointee, leaving the pointer null
    pub fn take(&mut self) -> Option<Box<dyn Entity>> {
        self.inner.take()
    }

    /// Downcast the pointee to a concrete type
    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        self.get()?.downcast_ref::<T>()
    }

    /// Mutably downcast the pointee to a concrete type
    pub fn downcast_mut<T: Entity>(&mut self) -> Option<&mut T> {
        self.get_mut()?.downcast_mut::<T>()
    }
}

impl<B> Default for EntityPtr<B> {
    fn default() -> Self {
        Self {
            inner: None,
            _marker: PhantomData,
        }
    }
}

impl<B> fmt::Debug for EntityPtr<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(entity) => f
                .debug_struct("EntityPtr")
                .field("declared", &core::any::type_name::<B>())
                .field("type_key", &entity.entity_type())
                .finish(),
            None => write!(f, "EntityPtr<{}>(null)", core::any::type_name::<B>()),
        }
    }
}

impl<B: Entity> PointerSlot for EntityPtr<B> {
    fn target(&self) -> Option<&dyn Any> {
        match &self.inner {
            Some(entity) => Some((**entity).as_any()),
            None => None,
        }
    }

    fn target_mut(&mut self) -> Option<&mut dyn Any> {
        match &mut self.inner {
            Some(entity) => Some((**entity).as_any_mut()),
            None => None,
        }
    }

    fn assign(&mut self, instance: Instance) -> Result<()> {
        match instance {
            Instance::Entity(entity) => {
                self.inner = Some(entity);
                Ok(())
            }
            value @ Instance::Value(_) => Err(ReflectError::NotAnEntity(format!("{:?}", value))),
        }
    }

    fn clear(&mut self) {
        self.inner = None;
    }
}

impl<B: Entity> Member for EntityPtr<B> {
    fn member_kind() -> MemberKind {
        MemberKind::Pointer(PointerInfo {
            target: TypeRef::of::<B>(),
            access: PointerAccess::of::<Self>(),
        })
    }

    fn from_instance(instance: Instance) -> Result<Self> {
        match instance {
            Instance::Entity(entity) => Ok(Self::from_box(entity)),
            Instance::Value(value) if (*value).type_id() == TypeId::of::<Self>() => value
                .downcast::<Self>()
                .map(|pointer| *pointer)
                .map_err(|_| ReflectError::mismatch::<Self>()),
            value => Err(ReflectError::NotAnEntity(format!("{:?}", value))),
        }
    }
}

impl<T: Member> PointerSlot for Option<Box<T>> {
    fn target(&self) -> Option<&dyn Any> {
        match self {
            Some(value) => Some(&**value),
            None => None,
        }
    }

    fn target_mut(&mut self) -> Option<&mut dyn Any> {
        match self {
            Some(value) => Some(&mut **value),
            None => None,
        }
    }

    fn assign(&mut self, instance: Instance) -> Result<()> {
        let value = instance
            .into_any()
            .downcast::<T>()
            .map_err(|_| ReflectError::mismatch::<T>())?;
        *self = Some(value);
        Ok(())
    }

    fn clear(&mut self) {
        *self = None;
    }
}

impl<T: Member> Member for Option<Box<T>> {
    fn member_kind() -> MemberKind {
        MemberKind::Pointer(PointerInfo {
            target: TypeRef::of::<T>(),
            access: PointerAccess::of::<Self>(),
        })
    }

    fn from_instance(instance: Instance) -> Result<Self> {
        match instance.into_any().downcast::<Self>() {
            Ok(pointer) => Ok(*pointer),
            Err(value) => value
                .downcast::<T>()
                .map(Some)
                .map_err(|_| ReflectError::mismatch::<T>()),
        }
    }
}
