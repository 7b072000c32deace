//! Entity manager - the factory that constructs and disposes reflected values

use core::any::Any;

use crate::entity::Instance;
use crate::error::{ReflectError, Result};
use crate::type_db::{TypeDb, TypeKey};
use crate::type_info::Type;

/// Constructs values through their registered constructors and stamps
/// entities with the type they were created as.
#[derive(Clone, Copy, Debug)]
pub struct EntityManager<'db> {
    db: &'db TypeDb,
}

impl<'db> EntityManager<'db> {
    /// Create a manager over a type database
    pub fn new(db: &'db TypeDb) -> Self {
        Self { db }
    }

    /// The type database
    pub fn db(&self) -> &'db TypeDb {
        self.db
    }

    fn lookup(&self, key: TypeKey) -> Result<&'db Type> {
        self.db.get_by_key(key).ok_or_else(|| {
            log::error!("No type registered for key {}", key);
            ReflectError::UnknownType(key.to_string())
        })
    }

    fn construct(&self, ty: &Type) -> Instance {
        let mut instance = ty.new_instance();
        if let Instance::Entity(entity) = &mut instance {
            if !entity.core_mut().stamp(ty.key()) {
                log::warn!("Entity of type '{}' was already stamped on construction", ty.name());
            }
        }
        log::trace!("Created instance of '{}'", ty.name());
        instance
    }

    /// Construct a default value of the type `key`
    pub fn create(&self, key: TypeKey) -> Result<Instance> {
        let ty = self.lookup(key)?;
        Ok(self.construct(ty))
    }

    /// Construct a default value of the type registered as `name`
    pub fn create_by_name(&self, name: &str) -> Result<Instance> {
        let ty = self.db.get_by_name(name).ok_or_else(|| {
            log::error!("No type registered under the name '{}'", name);
            ReflectError::UnknownTypeName(name.into())
        })?;
        Ok(self.construct(ty))
    }

    /// Construct a value of type `key`, which must be `B` or derive from it.
    ///
    /// The ancestry check happens before anything is constructed.
    pub fn create_as<B: Any>(&self, key: TypeKey) -> Result<Instance> {
        let declared = self.db.get::<B>().ok_or_else(|| {
            log::error!("Type not registered: {}", core::any::type_name::<B>());
            ReflectError::UnknownType(core::any::type_name::<B>().into())
        })?;
        let ty = self.lookup(key)?;
        if !ty.is_type_key(self.db, declared.key()) {
            log::error!("Type confusion: '{}' is not a '{}'", ty.name(), declared.name());
            return Err(ReflectError::TypeConfusion {
                declared: declared.name().into(),
                actual: ty.name().into(),
            });
        }
        Ok(self.construct(ty))
    }

    /// Construct a default `T` through its registered constructor
    pub fn create_typed<T: Any>(&self) -> Result<Box<T>> {
        let key = self.db.key_of::<T>().ok_or_else(|| {
            log::error!("Type not registered: {}", core::any::type_name::<T>());
            ReflectError::UnknownType(core::any::type_name::<T>().into())
        })?;
        self.create(key)?
            .downcast::<T>()
            .map_err(|_| ReflectError::mismatch::<T>())
    }

    /// The registered type of an instance: its stamp for entities, its Rust type otherwise
    pub fn type_of(&self, instance: &Instance) -> Option<&'db Type> {
        match instance.as_entity().and_then(|entity| entity.entity_type()) {
            Some(key) => self.db.get_by_key(key),
            None => self.db.get_by_type_id(instance.value_type_id()),
        }
    }

    /// Dispose of an instance through its registered type
    pub fn delete(&self, instance: Instance) -> Result<()> {
        match self.type_of(&instance) {
            Some(ty) => ty.delete(instance),
            None => Err(self
                .db
                .assert_mode()
                .fail(format!("deleting an instance of an unregistered type: {:?}", instance))),
        }
    }
}
