//! Type - the runtime descriptor of one reflected data shape

use core::any::{Any, TypeId};
use core::fmt;

use crate::entity::{Entity, Instance};
use crate::error::{ReflectError, Result};
use crate::field::{Accessor, Field, FieldAccess};
use crate::leaf::{RawCodec, Stringify};
use crate::member::Member;
use crate::type_db::{TypeDb, TypeKey, TypeRef};

/// A named enum constant
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumConstant {
    pub name: String,
    pub value: i64,
}

/// One field of a type's flattened field list
#[derive(Clone, Copy)]
pub struct FieldEntry<'a> {
    owner: &'a Type,
    field: &'a Field,
}

impl<'a> FieldEntry<'a> {
    /// The type that declares the field
    pub fn owner(&self) -> &'a Type {
        self.owner
    }

    /// The field itself
    pub fn field(&self) -> &'a Field {
        self.field
    }
}

impl fmt::Debug for FieldEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner.name(), self.field.name())
    }
}

/// Link from a derived type to its base sub-object
pub(crate) struct BaseLink {
    type_ref: TypeRef,
    access: Box<dyn FieldAccess>,
}

impl BaseLink {
    pub(crate) fn new<T: Any, P: Member>(upcast: fn(&T) -> &P, upcast_mut: fn(&mut T) -> &mut P) -> Self {
        Self {
            type_ref: TypeRef::of::<P>(),
            access: Box::new(Accessor::new(upcast, upcast_mut)),
        }
    }

    pub(crate) fn type_ref(&self) -> TypeRef {
        self.type_ref
    }

    pub(crate) fn upcast<'o>(&self, object: &'o dyn Any) -> Option<&'o dyn Any> {
        self.access.get(object)
    }

    pub(crate) fn upcast_mut<'o>(&self, object: &'o mut dyn Any) -> Option<&'o mut dyn Any> {
        self.access.get_mut(object)
    }
}

/// Entity conversions for an entity type
#[derive(Clone, Copy)]
pub(crate) struct EntityVtable {
    as_entity: fn(&dyn Any) -> Option<&dyn Entity>,
    as_entity_mut: fn(&mut dyn Any) -> Option<&mut dyn Entity>,
}

fn entity_ref<T: Entity>(object: &dyn Any) -> Option<&dyn Entity> {
    object.downcast_ref::<T>().map(|entity| entity as &dyn Entity)
}

fn entity_mut<T: Entity>(object: &mut dyn Any) -> Option<&mut dyn Entity> {
    object.downcast_mut::<T>().map(|entity| entity as &mut dyn Entity)
}

fn construct_value<T: Any + Default>() -> Instance {
    Instance::Value(Box::new(T::default()))
}

fn construct_entity<T: Entity + Default>() -> Instance {
    Instance::Entity(Box::new(T::default()))
}

/// Runtime descriptor of a reflected type
pub struct Type {
    pub(crate) key: TypeKey,
    pub(crate) name: String,
    pub(crate) hash: u32,
    pub(crate) type_ref: TypeRef,
    /// Byte width of the raw wire form
    pub(crate) size: usize,
    pub(crate) constructor: fn() -> Instance,
    pub(crate) base: Option<BaseLink>,
    /// Own fields only, never inherited ones
    pub(crate) fields: Vec<Field>,
    pub(crate) constants: Vec<EnumConstant>,
    pub(crate) stringifier: Option<Box<dyn Stringify>>,
    pub(crate) raw: Option<Box<dyn RawCodec>>,
    pub(crate) entity: Option<EntityVtable>,
    pub(crate) is_string: bool,
}

impl Type {
    pub(crate) fn new<T: Member + Default>(key: TypeKey, name: &str, hash: u32) -> Self {
        Self {
            key,
            name: name.into(),
            hash,
            type_ref: TypeRef::of::<T>(),
            size: core::mem::size_of::<T>(),
            constructor: construct_value::<T>,
            base: None,
            fields: Vec::new(),
            constants: Vec::new(),
            stringifier: None,
            raw: None,
            entity: None,
            is_string: false,
        }
    }

    pub(crate) fn make_entity<T: Entity + Default>(&mut self) {
        self.constructor = construct_entity::<T>;
        self.entity = Some(EntityVtable {
            as_entity: entity_ref::<T>,
            as_entity_mut: entity_mut::<T>,
        });
    }

    /// Key inside the owning database
    #[inline]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Stable type name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hash of the name, as written in type tags
    #[inline]
    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// Rust TypeId of the described type
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_ref.id()
    }

    /// Rust type name, for diagnostics
    #[inline]
    pub fn rust_name(&self) -> &'static str {
        self.type_ref.rust_name()
    }

    /// Static reference to the described type
    #[inline]
    pub fn type_ref(&self) -> TypeRef {
        self.type_ref
    }

    /// Byte width of the value's raw form
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Fields declared by this type, excluding inherited ones
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Own field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name() == name)
    }

    /// Enum constants, in declaration order
    pub fn constants(&self) -> &[EnumConstant] {
        &self.constants
    }

    /// Enum constant by name
    pub fn constant_by_name(&self, name: &str) -> Option<&EnumConstant> {
        self.constants.iter().find(|constant| constant.name == name)
    }

    /// First enum constant with the given value
    pub fn constant_by_value(&self, value: i64) -> Option<&EnumConstant> {
        self.constants.iter().find(|constant| constant.value == value)
    }

    /// Whether this type participates in entity polymorphism
    #[inline]
    pub fn is_entity(&self) -> bool {
        self.entity.is_some()
    }

    /// Whether this is the built-in string type
    #[inline]
    pub fn is_string(&self) -> bool {
        self.is_string
    }

    /// Whether values of this type have a string conversion pair
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.stringifier.is_some()
    }

    /// Whether values of this type have a fixed-width raw form
    #[inline]
    pub fn has_raw(&self) -> bool {
        self.raw.is_some()
    }

    pub(crate) fn base_link(&self) -> Option<&BaseLink> {
        self.base.as_ref()
    }

    /// Static reference to the base type, if any
    pub fn base_ref(&self) -> Option<TypeRef> {
        self.base.as_ref().map(BaseLink::type_ref)
    }

    /// The base type entry, if any
    pub fn base_type<'a>(&self, db: &'a TypeDb) -> Result<Option<&'a Type>> {
        match &self.base {
            None => Ok(None),
            Some(link) => db.resolve(link.type_ref()).map(Some),
        }
    }

    /// Whether this type is named `ancestor` or derives from it
    pub fn is_type(&self, db: &TypeDb, ancestor: &str) -> bool {
        self.find_ancestor(db, |ty| ty.name() == ancestor)
    }

    /// Whether this type is `ancestor` or derives from it
    pub fn is_type_key(&self, db: &TypeDb, ancestor: TypeKey) -> bool {
        self.find_ancestor(db, |ty| ty.key() == ancestor)
    }

    fn find_ancestor(&self, db: &TypeDb, matches: impl Fn(&Type) -> bool) -> bool {
        let mut current = Some(self);
        // Bounded so a cyclic base declaration cannot loop forever
        for _ in 0..=db.len() {
            match current {
                Some(ty) if matches(ty) => return true,
                Some(ty) => current = ty.base_ref().and_then(|base| db.get_by_type_id(base.id())),
                None => return false,
            }
        }
        false
    }

    /// All fields, most-base ancestor first and own fields last
    pub fn all_fields<'a>(&'a self, db: &'a TypeDb) -> Result<Vec<FieldEntry<'a>>> {
        let mut chain = vec![self];
        let mut current = self;
        while let Some(base) = current.base_type(db)? {
            if chain.len() > db.len() {
                return Err(db
                    .assert_mode()
                    .fail(format!("cyclic base chain on '{}'", self.name)));
            }
            chain.push(base);
            current = base;
        }

        Ok(chain
            .into_iter()
            .rev()
            .flat_map(|owner| owner.fields.iter().map(move |field| FieldEntry { owner, field }))
            .collect())
    }

    /// Find a field by name, including inherited fields
    pub fn find_field<'a>(&'a self, db: &'a TypeDb, name: &str) -> Option<FieldEntry<'a>> {
        let mut current = Some(self);
        for _ in 0..=db.len() {
            let ty = current?;
            if let Some(field) = ty.field(name) {
                return Some(FieldEntry { owner: ty, field });
            }
            current = ty.base_type(db).ok().flatten();
        }
        None
    }

    /// Check that `object` is a value of this type
    pub fn is_instance(&self, object: &dyn Any) -> bool {
        (*object).type_id() == self.type_ref.id()
    }

    /// Construct a default value through the stored constructor.
    ///
    /// Entities come back unstamped; use the `EntityManager` to create
    /// correctly tagged entities.
    pub fn new_instance(&self) -> Instance {
        (self.constructor)()
    }

    /// Dispose of a value created for this type
    pub fn delete(&self, instance: Instance) -> Result<()> {
        if instance.value_type_id() != self.type_ref.id() {
            return Err(ReflectError::ObjectMismatch {
                expected: self.name.clone(),
            });
        }
        log::trace!("Deleting instance of '{}'", self.name);
        drop(instance);
        Ok(())
    }

    /// View a value of this type as an entity
    pub fn as_entity<'o>(&self, object: &'o dyn Any) -> Option<&'o dyn Entity> {
        match self.entity {
            Some(vtable) => (vtable.as_entity)(object),
            None => None,
        }
    }

    /// View a mutable value of this type as an entity
    pub fn as_entity_mut<'o>(&self, object: &'o mut dyn Any) -> Option<&'o mut dyn Entity> {
        match self.entity {
            Some(vtable) => (vtable.as_entity_mut)(object),
            None => None,
        }
    }

    /// Convert a value to its canonical string form
    pub fn to_string(&self, value: &dyn Any) -> Option<String> {
        self.stringifier.as_ref()?.to_string(self, value)
    }

    /// Parse a value from its string form into `value`
    pub fn from_string(&self, text: &str, value: &mut dyn Any) -> bool {
        match &self.stringifier {
            Some(stringifier) => stringifier.from_string(self, text, value),
            None => false,
        }
    }

    /// Append the raw bytes of `value`
    pub fn write_raw(&self, value: &dyn Any, out: &mut Vec<u8>) -> bool {
        match &self.raw {
            Some(raw) => raw.write(value, out),
            None => false,
        }
    }

    /// Read `value` from exactly [`Type::size`] raw bytes
    pub fn read_raw(&self, bytes: &[u8], value: &mut dyn Any) -> bool {
        match &self.raw {
            Some(raw) => raw.read(bytes, value),
            None => false,
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Type")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("hash", &format_args!("{:#010x}", self.hash))
            .field("size", &self.size)
            .field("base", &self.base_ref().map(|base| base.rust_name()))
            .field("fields", &self.fields.len())
            .field("constants", &self.constants.len())
            .field("is_entity", &self.is_entity())
            .field("is_leaf", &self.is_leaf())
            .finish()
    }
}
