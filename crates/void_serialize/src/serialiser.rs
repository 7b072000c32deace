//! Serialiser - writes an object graph through a [`WriteProtocol`]

use core::any::Any;

use void_reflect::{
    ElementInfo, Entity, EntityManager, FieldContainer, Instance, MemberKind, Options,
    PointerAccess, ReadIterator, ReflectError, Type, TypeDb, TypeKey, TypeRef,
};

use crate::error::{Result, SerialError};
use crate::protocol::{path_segments, WriteProtocol};

pub(crate) fn unregistered(name: &str) -> SerialError {
    log::error!("Type not registered: {}", name);
    SerialError::Reflect(ReflectError::UnknownType(name.into()))
}

pub(crate) fn mismatch(ty: &Type) -> SerialError {
    log::error!("Object is not a '{}'", ty.name());
    SerialError::Reflect(ReflectError::ObjectMismatch {
        expected: ty.name().into(),
    })
}

/// Walks objects depth first and hands every step to a write protocol
pub struct Serialiser<'db, P> {
    db: &'db TypeDb,
    manager: EntityManager<'db>,
    protocol: P,
}

impl<'db, P: WriteProtocol> Serialiser<'db, P> {
    pub fn new(db: &'db TypeDb, protocol: P) -> Self {
        Self {
            db,
            manager: EntityManager::new(db),
            protocol,
        }
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    pub fn protocol_mut(&mut self) -> &mut P {
        &mut self.protocol
    }

    pub fn into_protocol(self) -> P {
        self.protocol
    }

    /// Write an object of a registered Rust type
    pub fn serialise<T: Any>(&mut self, object: &T) -> Result<()> {
        let ty = self
            .db
            .get::<T>()
            .ok_or_else(|| unregistered(core::any::type_name::<T>()))?;
        self.serialise_object(ty.key(), object)
    }

    /// Write an object as the registered type `key`
    pub fn serialise_object(&mut self, key: TypeKey, object: &dyn Any) -> Result<()> {
        let ty = self.db.get_by_key(key).ok_or_else(|| unregistered(&key.to_string()))?;
        if !ty.is_instance(object) {
            return Err(self
                .protocol
                .assert_mode()
                .fail(format!("object handed to the serialiser is not a '{}'", ty.name()))
                .into());
        }

        log::debug!("Serialising '{}'", ty.name());
        if self.protocol.carries_type_tags() {
            self.protocol.on_type(Some(ty))?;
        }
        self.write_object(ty, object)
    }

    /// Write an entity as the type it was created as
    pub fn serialise_entity(&mut self, entity: &dyn Entity) -> Result<()> {
        let object = entity.as_any();
        let ty = match entity.entity_type() {
            Some(key) => self.db.get_by_key(key),
            None => self.db.get_by_type_id((*object).type_id()),
        };
        let ty = ty.ok_or_else(|| unregistered(&format!("{:?}", (*object).type_id())))?;
        self.serialise_object(ty.key(), object)
    }

    /// Write the segments of a `/`-separated path, then the object
    pub fn serialise_at<T: Any>(&mut self, path: &str, object: &T) -> Result<()> {
        for segment in path_segments(path) {
            self.protocol.on_path_segment(segment)?;
        }
        self.serialise(object)
    }

    fn write_object(&mut self, ty: &'db Type, object: &dyn Any) -> Result<()> {
        let options = ty
            .as_entity(object)
            .map_or(Options::Normal, |entity| entity.on_pre_saved());

        if options == Options::Skip {
            // The stream keeps its shape: a default value stands in for the skipped one
            log::trace!("Writing a default '{}' in place of a skipped object", ty.name());
            let stand_in = self.manager.create(ty.key())?;
            let result = self.write_body(ty, stand_in.as_any(), Options::Normal);
            dispose(&self.manager, stand_in);
            return result;
        }

        self.write_body(ty, object, options)?;
        if let Some(entity) = ty.as_entity(object) {
            entity.on_saved();
        }
        Ok(())
    }

    fn write_body(&mut self, ty: &'db Type, object: &dyn Any, options: Options) -> Result<()> {
        self.protocol.begin_value(ty)?;
        let handled = self.protocol.on_value(ty, object)?;
        if !handled && options != Options::IgnoreFields {
            self.write_fields(ty, object)?;
        }
        self.protocol.end_value(ty)
    }

    fn write_fields(&mut self, ty: &'db Type, object: &dyn Any) -> Result<()> {
        for entry in ty.all_fields(self.db)? {
            let field = entry.field();
            if field.is_transient() {
                continue;
            }
            let owner = entry.owner();
            let base = self
                .db
                .upcast(object, ty.key(), owner.key())
                .ok_or_else(|| mismatch(owner))?;
            let member = field.get(base).ok_or_else(|| mismatch(owner))?;

            self.protocol.begin_field(field)?;
            match field.kind() {
                MemberKind::Value(declared) => {
                    let member_ty = self.db.resolve(*declared)?;
                    self.write_object(member_ty, member)?;
                }
                MemberKind::Pointer(info) => self.write_pointer(info.target, info.access, member)?,
                MemberKind::Container(container) => self.write_container(container, member)?,
            }
            self.protocol.end_field(field)?;
        }
        Ok(())
    }

    fn write_pointer(&mut self, declared: TypeRef, access: PointerAccess, member: &dyn Any) -> Result<()> {
        let declared = self.db.resolve(declared)?;
        let slot = access.slot(member).ok_or_else(|| mismatch(declared))?;
        let tagged = self.protocol.carries_type_tags();

        let Some(target) = slot.target() else {
            if !tagged {
                log::error!("Null pointer to '{}' in a stream without type tags", declared.name());
                return Err(SerialError::NullValue(declared.name().into()));
            }
            return self.protocol.on_type(None);
        };

        let concrete = self
            .db
            .get_by_type_id((*target).type_id())
            .ok_or_else(|| unregistered(&format!("{:?}", (*target).type_id())))?;
        let confused = if tagged {
            !concrete.is_type_key(self.db, declared.key())
        } else {
            concrete.key() != declared.key()
        };
        if confused {
            log::error!("Type confusion: '{}' is not a '{}'", concrete.name(), declared.name());
            return Err(SerialError::TypeConfusion {
                declared: declared.name().into(),
                actual: concrete.name().into(),
            });
        }

        if tagged {
            self.protocol.on_type(Some(concrete))?;
        }
        self.write_object(concrete, target)
    }

    fn write_container(&mut self, container: &'db FieldContainer, member: &dyn Any) -> Result<()> {
        let mut cursor = container.read_iter(member)?;
        self.protocol.on_container(cursor.count())?;

        while cursor.is_valid() {
            if let Some(key_info) = container.key_info() {
                let key = cursor
                    .key()
                    .ok_or_else(|| self.protocol.assert_mode().fail("map entry without a key"))?;
                self.write_element(key_info, key)?;
            }
            let value = cursor
                .value()
                .ok_or_else(|| self.protocol.assert_mode().fail("container entry without a value"))?;
            self.write_element(container.value_info(), value)?;
            cursor.inc_next();
        }
        Ok(())
    }

    fn write_element(&mut self, info: &ElementInfo, element: &dyn Any) -> Result<()> {
        match info.pointer() {
            Some(access) => self.write_pointer(info.ty(), access, element),
            None => {
                let element_ty = self.db.resolve(info.ty())?;
                self.write_object(element_ty, element)
            }
        }
    }
}

/// Discard an instance the walker no longer needs
pub(crate) fn dispose(manager: &EntityManager<'_>, instance: Instance) {
    if let Err(err) = manager.delete(instance) {
        log::warn!("Failed to dispose of a temporary: {}", err);
    }
}
