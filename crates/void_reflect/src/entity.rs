//! Entity - polymorphic reflected objects
//!
//! An entity carries the [`TypeKey`] of its concrete registered type in an
//! [`EntityCore`]. The tag is written once, by the [`EntityManager`], after
//! construction, so a value built through a base type's handle can still be
//! recognised as the derived type it really is.
//!
//! [`EntityManager`]: crate::manager::EntityManager

use core::any::{Any, TypeId};
use core::fmt;

use crate::type_db::TypeKey;

/// Upcasts to `Any` for every sized `'static` type
pub trait AsAny: Any {
    /// Get as Any reference (for downcasting)
    fn as_any(&self) -> &dyn Any;

    /// Get as mutable Any reference (for downcasting)
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Convert a boxed value into a boxed Any
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Result of a lifecycle hook
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Options {
    /// Process the object normally
    #[default]
    Normal,
    /// Leave this object out of the operation entirely
    Skip,
    /// Process the object's value but none of its fields
    IgnoreFields,
}

/// Type tag storage embedded in every entity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct EntityCore {
    type_key: Option<TypeKey>,
}

impl EntityCore {
    /// Create an unstamped core
    pub const fn new() -> Self {
        Self { type_key: None }
    }

    /// The concrete type this entity was created as, if stamped
    #[inline]
    pub const fn type_key(&self) -> Option<TypeKey> {
        self.type_key
    }

    /// Whether the factory has stamped this entity
    #[inline]
    pub const fn is_stamped(&self) -> bool {
        self.type_key.is_some()
    }

    /// Stamp the concrete type. Returns false if already stamped.
    pub(crate) fn stamp(&mut self, key: TypeKey) -> bool {
        if self.type_key.is_some() {
            return false;
        }
        self.type_key = Some(key);
        true
    }
}

/// A reflectable, polymorphic object
///
/// Implementors embed an [`EntityCore`] (directly or through their base
/// struct) and expose it through [`Entity::core`] / [`Entity::core_mut`].
pub trait Entity: AsAny {
    /// The embedded type tag
    fn core(&self) -> &EntityCore;

    /// Mutable access to the embedded type tag
    fn core_mut(&mut self) -> &mut EntityCore;

    /// Called before the object is written
    fn on_pre_saved(&self) -> Options {
        Options::Normal
    }

    /// Called after the object has been written
    fn on_saved(&self) {}

    /// Called before the engine mutates the object's fields
    fn on_pre_changed(&mut self) -> Options {
        Options::Normal
    }

    /// Called after the engine has mutated the object's fields
    fn on_changed(&mut self) {}
}

impl<'e> dyn Entity + 'e {
    /// The stamped concrete type, if any
    pub fn entity_type(&self) -> Option<TypeKey> {
        self.core().type_key()
    }

    /// Check the concrete Rust type
    pub fn is<T: Entity>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Downcast to a concrete type
    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    /// Downcast to a mutable concrete type
    pub fn downcast_mut<T: Entity>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }
}

/// An owned, materialised reflected value
pub enum Instance {
    /// A plain value (leaf or composite)
    Value(Box<dyn Any>),
    /// A polymorphic entity
    Entity(Box<dyn Entity>),
}

impl Instance {
    /// Borrow the value as Any
    pub fn as_any(&self) -> &dyn Any {
        match self {
            Instance::Value(value) => &**value,
            Instance::Entity(entity) => (**entity).as_any(),
        }
    }

    /// Borrow the value as mutable Any
    pub fn as_any_mut(&mut self) -> &mut dyn Any {
        match self {
            Instance::Value(value) => &mut **value,
            Instance::Entity(entity) => (**entity).as_any_mut(),
        }
    }

    /// Convert into a boxed Any
    pub fn into_any(self) -> Box<dyn Any> {
        match self {
            Instance::Value(value) => value,
            Instance::Entity(entity) => entity.into_any(),
        }
    }

    /// Borrow as an entity
    pub fn as_entity(&self) -> Option<&dyn Entity> {
        match self {
            Instance::Value(_) => None,
            Instance::Entity(entity) => Some(&**entity),
        }
    }

    /// Take ownership of the entity, if this is one
    pub fn into_entity(self) -> Option<Box<dyn Entity>> {
        match self {
            Instance::Value(_) => None,
            Instance::Entity(entity) => Some(entity),
        }
    }

    /// Whether this instance is an entity
    pub fn is_entity(&self) -> bool {
        matches!(self, Instance::Entity(_))
    }

    /// TypeId of the concrete value
    pub fn value_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    /// Downcast to a concrete type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    /// Downcast to a mutable concrete type
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }

    /// Take the concrete value out, or give the instance back
    pub fn downcast<T: Any>(self) -> core::result::Result<Box<T>, Instance> {
        if self.as_any().is::<T>() {
            match self.into_any().downcast::<T>() {
                Ok(value) => Ok(value),
                Err(value) => Err(Instance::Value(value)),
            }
        } else {
            Err(self)
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instance::Value(_) => f.debug_tuple("Value").field(&self.value_type_id()).finish(),
            Instance::Entity(entity) => f
                .debug_struct("Entity")
                .field("type_id", &self.value_type_id())
                .field("type_key", &entity.entity_type())
                .finish(),
        }
    }
}
