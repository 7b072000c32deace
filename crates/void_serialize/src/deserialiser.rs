//! Deserialiser - rebuilds an object graph from a [`ReadProtocol`]
//!
//! The walk mirrors the [`Serialiser`](crate::Serialiser) step for step.
//! Type tags are checked against the declared type before anything is
//! constructed, and every public entry point rewinds the stream to where the
//! failed object started.

use core::any::Any;

use void_reflect::{
    ContainerShape, ElementInfo, Entity, EntityManager, FieldContainer, Instance, MemberKind,
    Options, PointerAccess, ReflectError, Type, TypeDb, TypeKey, TypeRef,
};

use crate::error::{Result, SerialError};
use crate::protocol::ReadProtocol;
use crate::serialiser::{dispose, mismatch, unregistered};

fn confusion(declared: &Type, actual: &Type) -> SerialError {
    log::error!("Type confusion: '{}' is not a '{}'", actual.name(), declared.name());
    SerialError::TypeConfusion {
        declared: declared.name().into(),
        actual: actual.name().into(),
    }
}

/// Reads objects depth first, constructing them through the entity manager
pub struct Deserialiser<'db, P> {
    db: &'db TypeDb,
    manager: EntityManager<'db>,
    protocol: P,
}

impl<'db, P: ReadProtocol> Deserialiser<'db, P> {
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

    /// Whether no further object follows
    pub fn is_stream_ended(&self) -> bool {
        self.protocol.is_stream_ended()
    }

    /// Read the next object as whatever type its tag names
    pub fn deserialise(&mut self) -> Result<(TypeKey, Instance)> {
        self.guarded(|this| {
            let ty = this.read_root(None, false)?;
            let instance = this.construct_and_read(ty)?;
            Ok((ty.key(), instance))
        })
    }

    /// Read the next object, which must be exactly a `T`
    pub fn deserialise_as<T: Any>(&mut self) -> Result<Box<T>> {
        let declared = self.declared::<T>()?;
        self.guarded(|this| {
            let ty = this.read_root(Some(declared), true)?;
            let instance = this.construct_and_read(ty)?;
            instance.downcast::<T>().map_err(|instance| {
                dispose(&this.manager, instance);
                mismatch(declared)
            })
        })
    }

    /// Read the next object as an entity that is a `B` or derives from it
    pub fn deserialise_entity<B: Any>(&mut self) -> Result<Box<dyn Entity>> {
        let declared = self.declared::<B>()?;
        self.guarded(|this| {
            let ty = this.read_root(Some(declared), false)?;
            match this.construct_and_read(ty)? {
                Instance::Entity(entity) => Ok(entity),
                instance => {
                    dispose(&this.manager, instance);
                    log::error!("Type '{}' is not an entity", ty.name());
                    Err(ReflectError::NotAnEntity(ty.name().into()).into())
                }
            }
        })
    }

    /// Read the next object into an existing `T`
    pub fn deserialise_into<T: Any>(&mut self, target: &mut T) -> Result<()> {
        let declared = self.declared::<T>()?;
        self.guarded(|this| {
            let ty = this.read_root(Some(declared), true)?;
            this.read_object(ty, target)
        })
    }

    /// Match the segments of a `/`-separated path, then read the object after them
    pub fn deserialise_at(&mut self, path: &str) -> Result<(TypeKey, Instance)> {
        self.guarded(|this| {
            this.protocol.traverse_stream(path)?;
            let ty = this.read_root(None, false)?;
            let instance = this.construct_and_read(ty)?;
            Ok((ty.key(), instance))
        })
    }

    fn declared<T: Any>(&self) -> Result<&'db Type> {
        self.db
            .get::<T>()
            .ok_or_else(|| unregistered(core::any::type_name::<T>()))
    }

    fn guarded<R>(&mut self, read: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let start = self.protocol.position();
        let result = read(self);
        if result.is_err() {
            log::debug!("Rewinding stream to offset {}", start);
            self.protocol.rewind(start);
        }
        result
    }

    fn read_root(&mut self, declared: Option<&'db Type>, exact: bool) -> Result<&'db Type> {
        if !self.protocol.carries_type_tags() {
            return match declared {
                Some(ty) => Ok(ty),
                None => Err(self
                    .protocol
                    .assert_mode()
                    .fail("untagged stream read without a declared type")
                    .into()),
            };
        }

        match self.protocol.on_type()? {
            Some(hash) => self.resolve_tag(hash, declared, exact),
            None => {
                log::error!("Null type tag where a top-level object was expected");
                Err(SerialError::NullValue("top-level object".into()))
            }
        }
    }

    /// Map a tag to its type, checking it against the declared type
    fn resolve_tag(&self, hash: u32, declared: Option<&'db Type>, exact: bool) -> Result<&'db Type> {
        let ty = self.db.get_by_hash(hash).ok_or_else(|| {
            log::error!("Unknown type hash {:#010x}", hash);
            SerialError::UnknownTypeHash(hash)
        })?;

        if let Some(declared) = declared {
            let confused = if exact {
                ty.key() != declared.key()
            } else {
                !ty.is_type_key(self.db, declared.key())
            };
            if confused {
                return Err(confusion(declared, ty));
            }
        }
        Ok(ty)
    }

    fn construct_and_read(&mut self, ty: &'db Type) -> Result<Instance> {
        let mut instance = self.manager.create(ty.key())?;
        match self.read_object(ty, instance.as_any_mut()) {
            Ok(()) => Ok(instance),
            Err(err) => {
                dispose(&self.manager, instance);
                Err(err)
            }
        }
    }

    fn read_object(&mut self, ty: &'db Type, object: &mut dyn Any) -> Result<()> {
        let options = ty
            .as_entity_mut(object)
            .map_or(Options::Normal, |entity| entity.on_pre_changed());

        if options == Options::Skip {
            // Bytes are consumed into a scratch value so the stream stays in step
            log::trace!("Discarding a skipped '{}'", ty.name());
            let mut scratch = self.manager.create(ty.key())?;
            let result = self.read_body(ty, scratch.as_any_mut(), Options::Normal);
            dispose(&self.manager, scratch);
            return result;
        }

        self.read_body(ty, object, options)?;
        if let Some(entity) = ty.as_entity_mut(object) {
            entity.on_changed();
        }
        Ok(())
    }

    fn read_body(&mut self, ty: &'db Type, object: &mut dyn Any, options: Options) -> Result<()> {
        self.protocol.begin_value(ty)?;
        let handled = self.protocol.on_value(ty, object)?;
        if !handled && options != Options::IgnoreFields {
            self.read_fields(ty, object)?;
        }
        self.protocol.end_value(ty)
    }

    fn read_fields(&mut self, ty: &'db Type, object: &mut dyn Any) -> Result<()> {
        for entry in ty.all_fields(self.db)? {
            let field = entry.field();
            if field.is_transient() {
                continue;
            }
            let owner = entry.owner();
            let base = self
                .db
                .upcast_mut(object, ty.key(), owner.key())
                .ok_or_else(|| mismatch(owner))?;
            let member = field.get_mut(base).ok_or_else(|| mismatch(owner))?;

            self.protocol.begin_field(field)?;
            match field.kind() {
                MemberKind::Value(declared) => {
                    let member_ty = self.db.resolve(*declared)?;
                    self.read_object(member_ty, member)?;
                }
                MemberKind::Pointer(info) => self.read_pointer(info.target, info.access, member)?,
                MemberKind::Container(container) => self.read_container(container, member)?,
            }
            self.protocol.end_field(field)?;
        }
        Ok(())
    }

    fn read_pointer(&mut self, declared: TypeRef, access: PointerAccess, member: &mut dyn Any) -> Result<()> {
        let declared = self.db.resolve(declared)?;
        let slot = access.slot_mut(member).ok_or_else(|| mismatch(declared))?;

        let concrete = if self.protocol.carries_type_tags() {
            match self.protocol.on_type()? {
                Some(hash) => self.resolve_tag(hash, Some(declared), false)?,
                None => {
                    slot.clear();
                    return Ok(());
                }
            }
        } else {
            declared
        };

        let instance = self.construct_and_read(concrete)?;
        slot.assign(instance)?;
        Ok(())
    }

    fn read_container(&mut self, container: &'db FieldContainer, member: &mut dyn Any) -> Result<()> {
        let count = self.protocol.on_container()?;
        let mut writer = container.write_iter(member)?;

        for _ in 0..count {
            match container.shape() {
                ContainerShape::Map => {
                    let key_info = container
                        .key_info()
                        .ok_or_else(|| self.protocol.assert_mode().fail("map without a key type"))?;
                    let key = self.read_temp(key_info)?;
                    let value = self.read_temp(container.value_info())?;
                    if !writer.add_keyed(key, value)? {
                        log::warn!("Duplicate map key in stream, keeping the first value");
                    }
                }
                ContainerShape::Set => {
                    let value = self.read_temp(container.value_info())?;
                    writer.add(value)?;
                }
                ContainerShape::FixedArray | ContainerShape::Sequence => {
                    let element = writer.add_empty()?;
                    self.read_element(container.value_info(), element)?;
                }
            }
        }
        Ok(())
    }

    /// Read a standalone element, to be moved into its container
    fn read_temp(&mut self, info: &ElementInfo) -> Result<Instance> {
        let mut temp = info.construct();
        self.read_element(info, &mut *temp)?;
        Ok(Instance::Value(temp))
    }

    fn read_element(&mut self, info: &ElementInfo, element: &mut dyn Any) -> Result<()> {
        match info.pointer() {
            Some(access) => self.read_pointer(info.ty(), access, element),
            None => {
                let element_ty = self.db.resolve(info.ty())?;
                self.read_object(element_ty, element)
            }
        }
    }
}
