//! Type database - the process-wide registry of reflected types
//!
//! Every reflected data shape owns exactly one [`Type`] entry, addressed by a
//! dense [`TypeKey`]. Entries are looked up by Rust `TypeId`, by stable name,
//! or by the 32-bit hash of that name (the wire-format type tag).
//!
//! Built-in leaf types are not registered implicitly: call
//! [`TypeDb::bootstrap`] once at start-up, or build the database with
//! [`TypeDb::with_builtins`].

use core::any::{Any, TypeId};
use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::assert::AssertMode;
use crate::builder::TypeBuilder;
use crate::entity::Entity;
use crate::error::{ReflectError, Result};
use crate::leaf::{
    BoolCodec, CharCodec, EnumCodec, EnumStringifier, ParseStringifier, PodCodec, RawCodec,
    ReflectEnum,
};
use crate::member::Member;
use crate::type_info::Type;

/// A type database shared between threads
///
/// The database performs no locking of its own; callers that share one
/// across threads wrap it in this lock.
pub type SharedTypeDb = Arc<RwLock<TypeDb>>;

/// Index of a [`Type`] inside its [`TypeDb`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeKey(u32);

impl TypeKey {
    /// Invalid type key
    pub const INVALID: Self = Self(u32::MAX);

    /// Create a new type key
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Get the raw index value
    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// Check if this is a valid key
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Static reference to a Rust type, resolved against a [`TypeDb`] at use time
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeRef {
    id: TypeId,
    rust_name: &'static str,
}

impl TypeRef {
    /// Reference a Rust type
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            rust_name: core::any::type_name::<T>(),
        }
    }

    /// The Rust TypeId
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The Rust type name, for diagnostics
    #[inline]
    pub fn rust_name(&self) -> &'static str {
        self.rust_name
    }
}

/// Hash of a type name as written in type tags
pub fn type_name_hash(name: &str) -> u32 {
    xxhash_rust::xxh32::xxh32(name.as_bytes(), 0)
}

/// Registry of all reflected types
pub struct TypeDb {
    /// Registered types by key
    types: Vec<Type>,
    /// TypeId to key mapping
    by_type_id: HashMap<TypeId, TypeKey>,
    /// Name to key mapping
    by_name: HashMap<String, TypeKey>,
    /// Name hash to key mapping
    by_hash: HashMap<u32, TypeKey>,
    /// Escalation of programmer errors
    assert_mode: AssertMode,
}

impl TypeDb {
    /// Create an empty database
    pub fn new() -> Self {
        Self {
            types: Vec::new(),
            by_type_id: HashMap::new(),
            by_name: HashMap::new(),
            by_hash: HashMap::new(),
            assert_mode: AssertMode::default(),
        }
    }

    /// Create a database with the built-in leaf types registered
    pub fn with_builtins() -> Result<Self> {
        let mut db = Self::new();
        db.bootstrap()?;
        Ok(db)
    }

    /// Register the built-in primitive, bool, char and string types.
    ///
    /// Safe to call more than once.
    pub fn bootstrap(&mut self) -> Result<()> {
        self.create_leaf::<bool>("Bool", Box::new(BoolCodec))?;
        self.create_leaf::<i8>("Int8", Box::new(PodCodec::<i8>::new()))?;
        self.create_leaf::<i16>("Int16", Box::new(PodCodec::<i16>::new()))?;
        self.create_leaf::<i32>("Int32", Box::new(PodCodec::<i32>::new()))?;
        self.create_leaf::<i64>("Int64", Box::new(PodCodec::<i64>::new()))?;
        self.create_leaf::<u8>("UInt8", Box::new(PodCodec::<u8>::new()))?;
        self.create_leaf::<u16>("UInt16", Box::new(PodCodec::<u16>::new()))?;
        self.create_leaf::<u32>("UInt32", Box::new(PodCodec::<u32>::new()))?;
        self.create_leaf::<u64>("UInt64", Box::new(PodCodec::<u64>::new()))?;
        self.create_leaf::<f32>("Float32", Box::new(PodCodec::<f32>::new()))?;
        self.create_leaf::<f64>("Float64", Box::new(PodCodec::<f64>::new()))?;
        self.create_leaf::<char>("Char", Box::new(CharCodec))?;

        let key = self
            .create::<String>("String")?
            .with_stringifier(Box::new(ParseStringifier::<String>::new()))
            .key();
        self.types[key.index()].is_string = true;

        log::debug!("Type database bootstrapped with {} types", self.types.len());
        Ok(())
    }

    fn create_leaf<T>(&mut self, name: &str, raw: Box<dyn RawCodec>) -> Result<()>
    where
        T: Member + Default + fmt::Display + core::str::FromStr,
    {
        self.create::<T>(name)?
            .with_stringifier(Box::new(ParseStringifier::<T>::new()))
            .with_raw(raw);
        Ok(())
    }

    /// Get or create the entry for `T` and return a builder for it.
    ///
    /// Creating the same type under the same name again reopens the existing
    /// entry. The same Rust type under another name, or a name (or name
    /// hash) already owned by a different type, is a duplicate registration.
    pub fn create<T: Member + Default>(&mut self, name: &str) -> Result<TypeBuilder<'_, T>> {
        let key = self.register::<T>(name)?;
        Ok(TypeBuilder::new(&mut self.types[key.index()]))
    }

    /// Get or create an entity type
    pub fn create_entity<T: Entity + Member + Default>(&mut self, name: &str) -> Result<TypeBuilder<'_, T>> {
        let key = self.register::<T>(name)?;
        let ty = &mut self.types[key.index()];
        ty.make_entity::<T>();
        Ok(TypeBuilder::new(ty))
    }

    /// Get or create an enum type, with name/value stringification
    pub fn create_enum<T: ReflectEnum>(&mut self, name: &str) -> Result<TypeBuilder<'_, T>> {
        Ok(self
            .create::<T>(name)?
            .with_stringifier(Box::new(EnumStringifier::<T>::new()))
            .with_raw(Box::new(EnumCodec::<T>::new())))
    }

    fn register<T: Member + Default>(&mut self, name: &str) -> Result<TypeKey> {
        let type_id = TypeId::of::<T>();

        // Check if already registered
        if let Some(&key) = self.by_type_id.get(&type_id) {
            let existing = &self.types[key.index()];
            if existing.name() != name {
                let message = format!(
                    "{} is already registered as '{}'",
                    core::any::type_name::<T>(),
                    existing.name()
                );
                log::error!("Duplicate registration: {}", message);
                return Err(ReflectError::DuplicateRegistration(message));
            }
            return Ok(key);
        }

        if self.by_name.contains_key(name) {
            log::error!("Duplicate registration: type name '{}' is already in use", name);
            return Err(ReflectError::DuplicateRegistration(format!(
                "type name '{}' is already in use",
                name
            )));
        }

        let hash = type_name_hash(name);
        if hash == 0 {
            log::error!("Type name '{}' hashes to the null tag", name);
            return Err(ReflectError::ReservedHash(name.into()));
        }
        if let Some(&other) = self.by_hash.get(&hash) {
            let message = format!(
                "type name '{}' collides with '{}' (hash {:#010x})",
                name,
                self.types[other.index()].name(),
                hash
            );
            log::error!("Duplicate registration: {}", message);
            return Err(ReflectError::DuplicateRegistration(message));
        }

        let key = TypeKey::new(self.types.len() as u32);
        self.types.push(Type::new::<T>(key, name, hash));
        self.by_type_id.insert(type_id, key);
        self.by_name.insert(name.into(), key);
        self.by_hash.insert(hash, key);

        log::trace!("Registered type '{}' as {}", name, key);
        Ok(key)
    }

    /// Get the entry for `T`
    pub fn get<T: Any>(&self) -> Option<&Type> {
        self.get_by_type_id(TypeId::of::<T>())
    }

    /// Get the key for `T`
    pub fn key_of<T: Any>(&self) -> Option<TypeKey> {
        self.by_type_id.get(&TypeId::of::<T>()).copied()
    }

    /// Get an entry by key
    pub fn get_by_key(&self, key: TypeKey) -> Option<&Type> {
        self.types.get(key.index())
    }

    /// Get an entry by Rust TypeId
    pub fn get_by_type_id(&self, type_id: TypeId) -> Option<&Type> {
        self.by_type_id.get(&type_id).and_then(|key| self.get_by_key(*key))
    }

    /// Get an entry by stable name
    pub fn get_by_name(&self, name: &str) -> Option<&Type> {
        self.by_name.get(name).and_then(|key| self.get_by_key(*key))
    }

    /// Get an entry by the hash of its name
    pub fn get_by_hash(&self, hash: u32) -> Option<&Type> {
        self.by_hash.get(&hash).and_then(|key| self.get_by_key(*key))
    }

    /// Resolve a static type reference, failing when it is not registered
    pub fn resolve(&self, type_ref: TypeRef) -> Result<&Type> {
        self.get_by_type_id(type_ref.id()).ok_or_else(|| {
            log::error!("Type not registered: {}", type_ref.rust_name());
            ReflectError::UnknownType(type_ref.rust_name().into())
        })
    }

    /// Check whether `key` is `ancestor` or derives from it
    pub fn is_type(&self, key: TypeKey, ancestor: TypeKey) -> bool {
        self.get_by_key(key)
            .map(|ty| ty.is_type_key(self, ancestor))
            .unwrap_or(false)
    }

    /// Project an object of type `from` onto the sub-object of its ancestor `to`
    pub fn upcast<'a>(&self, object: &'a dyn Any, from: TypeKey, to: TypeKey) -> Option<&'a dyn Any> {
        let mut current = object;
        let mut ty = self.get_by_key(from)?;
        for _ in 0..=self.types.len() {
            if ty.key() == to {
                return Some(current);
            }
            let link = ty.base_link()?;
            current = link.upcast(current)?;
            ty = self.get_by_type_id(link.type_ref().id())?;
        }
        None
    }

    /// Mutable variant of [`TypeDb::upcast`]
    pub fn upcast_mut<'a>(&self, object: &'a mut dyn Any, from: TypeKey, to: TypeKey) -> Option<&'a mut dyn Any> {
        let mut current = object;
        let mut ty = self.get_by_key(from)?;
        for _ in 0..=self.types.len() {
            if ty.key() == to {
                return Some(current);
            }
            let link = ty.base_link()?;
            current = link.upcast_mut(current)?;
            ty = self.get_by_type_id(link.type_ref().id())?;
        }
        None
    }

    /// Iterate over all registered types
    pub fn iter(&self) -> impl Iterator<Item = &Type> {
        self.types.iter()
    }

    /// Get the number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Escalation mode for programmer errors
    pub fn assert_mode(&self) -> AssertMode {
        self.assert_mode
    }

    /// Set the escalation mode for programmer errors
    pub fn set_assert_mode(&mut self, mode: AssertMode) {
        self.assert_mode = mode;
    }

    /// Wrap the database for sharing between threads
    pub fn into_shared(self) -> SharedTypeDb {
        Arc::new(RwLock::new(self))
    }
}

impl Default for TypeDb {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDb")
            .field("types", &self.types.len())
            .field("assert_mode", &self.assert_mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Position;

    impl Member for Position {}

    #[derive(Default)]
    struct Other;

    impl Member for Other {}

    #[test]
    fn test_bootstrap_registers_builtins() {
        let db = TypeDb::with_builtins().unwrap();
        for name in [
            "Bool", "Int8", "Int16", "Int32", "Int64", "UInt8", "UInt16", "UInt32", "UInt64",
            "Float32", "Float64", "Char", "String",
        ] {
            let ty = db.get_by_name(name).unwrap();
            assert!(ty.is_leaf(), "{} should be a leaf", name);
        }
        assert!(db.get::<String>().unwrap().is_string());
        assert_eq!(db.get::<f32>().unwrap().size(), 4);
        assert_eq!(db.get::<u64>().unwrap().name(), "UInt64");
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let mut db = TypeDb::with_builtins().unwrap();
        let count = db.len();
        db.bootstrap().unwrap();
        assert_eq!(db.len(), count);
    }

    #[test]
    fn test_create_is_get_or_create() {
        let mut db = TypeDb::new();
        let first = db.create::<Position>("Position").unwrap().key();
        let second = db.create::<Position>("Position").unwrap().key();
        assert_eq!(first, second);
        assert_eq!(db.len(), 1);
        assert_eq!(db.key_of::<Position>(), Some(first));
        assert_eq!(db.get_by_hash(type_name_hash("Position")).unwrap().key(), first);
    }

    #[test]
    fn test_duplicate_registration() {
        let mut db = TypeDb::new();
        db.create::<Position>("Position").unwrap();

        let err = db.create::<Position>("Point").err().unwrap();
        assert!(matches!(err, ReflectError::DuplicateRegistration(_)));

        let err = db.create::<Other>("Position").err().unwrap();
        assert!(matches!(err, ReflectError::DuplicateRegistration(_)));
    }

    #[test]
    fn test_lookup_does_not_create() {
        let db = TypeDb::new();
        assert!(db.get::<Position>().is_none());
        assert!(db.get_by_name("Position").is_none());
        assert!(db.is_empty());

        let err = db.resolve(TypeRef::of::<Position>()).unwrap_err();
        assert!(matches!(err, ReflectError::UnknownType(_)));
    }

    #[test]
    fn test_shared_db() {
        let shared = TypeDb::with_builtins().unwrap().into_shared();
        let reader = Arc::clone(&shared);
        let handle = std::thread::spawn(move || reader.read().get::<i32>().map(|ty| ty.name().to_string()));
        assert_eq!(handle.join().unwrap().as_deref(), Some("Int32"));

        shared.write().create::<Position>("Position").unwrap();
        assert!(shared.read().get::<Position>().is_some());
    }
}
