//! Container members - fixed arrays, sequences, sets and maps
//!
//! Each supported Rust collection is described by a [`FieldContainer`]: its
//! shape, the element types and an adapter that hands out iterators. Read
//! iterators are cursors over borrowed elements; write iterators reset the
//! container and append to it.

use core::any::Any;
use core::fmt;
use core::hash::Hash;
use core::marker::PhantomData;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use crate::entity::Instance;
use crate::error::{ReflectError, Result};
use crate::field::MemberKind;
use crate::member::Member;
use crate::pointer::PointerAccess;
use crate::type_db::TypeRef;

/// Container shape
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContainerShape {
    /// `[T; N]`
    FixedArray,
    /// `Vec<T>`, `VecDeque<T>`
    Sequence,
    /// `HashSet<T>`, `BTreeSet<T>`
    Set,
    /// `HashMap<K, V>`, `BTreeMap<K, V>`
    Map,
}

impl ContainerShape {
    /// Shape name
    pub const fn as_str(&self) -> &'static str {
        match self {
            ContainerShape::FixedArray => "fixed array",
            ContainerShape::Sequence => "sequence",
            ContainerShape::Set => "set",
            ContainerShape::Map => "map",
        }
    }

    fn unsupported(self, operation: &'static str) -> ReflectError {
        log::error!("{} containers do not support '{}'", self.as_str(), operation);
        ReflectError::Unsupported {
            shape: self.as_str(),
            operation,
        }
    }
}

impl fmt::Display for ContainerShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-pass cursor over a container's elements
pub trait ReadIterator<'a> {
    /// Key of the current element, for maps
    fn key(&self) -> Option<&'a dyn Any>;

    /// Value of the current element
    fn value(&self) -> Option<&'a dyn Any>;

    /// Advance. Returns whether an element is now current.
    fn inc_next(&mut self) -> bool;

    /// Whether an element is current
    fn is_valid(&self) -> bool;

    /// Total number of elements in the container
    fn count(&self) -> usize;
}

/// Appends elements to a container that was reset when the iterator was created
pub trait WriteIterator {
    /// Shape of the container being written
    fn shape(&self) -> ContainerShape;

    /// Move an owned element into the container
    fn add(&mut self, _value: Instance) -> Result<()> {
        Err(self.shape().unsupported("add"))
    }

    /// Insert a key/value pair. Returns false, keeping the existing value, if the key was present.
    fn add_keyed(&mut self, _key: Instance, _value: Instance) -> Result<bool> {
        Err(self.shape().unsupported("add_keyed"))
    }

    /// Append a default element and return it for in-place filling
    fn add_empty(&mut self) -> Result<&mut dyn Any> {
        Err(self.shape().unsupported("add_empty"))
    }

    /// Get or create the value for `key` and return it for in-place filling
    fn add_empty_keyed(&mut self, _key: Instance) -> Result<&mut dyn Any> {
        Err(self.shape().unsupported("add_empty_keyed"))
    }
}

type Entry<'a> = (Option<&'a dyn Any>, &'a dyn Any);

fn value_entry<T: Any>(value: &T) -> Entry<'_> {
    (None, value as &dyn Any)
}

fn map_entry<'a, K: Any, V: Any>((key, value): (&'a K, &'a V)) -> Entry<'a> {
    (Some(key as &dyn Any), value as &dyn Any)
}

/// The [`ReadIterator`] handed out by every built-in adapter
pub struct Cursor<'a> {
    entries: Box<dyn Iterator<Item = Entry<'a>> + 'a>,
    current: Option<Entry<'a>>,
    count: usize,
}

impl<'a> Cursor<'a> {
    /// Create a cursor positioned on the first entry
    pub fn new(count: usize, entries: impl Iterator<Item = Entry<'a>> + 'a) -> Self {
        let mut entries: Box<dyn Iterator<Item = Entry<'a>> + 'a> = Box::new(entries);
        let current = entries.next();
        Self {
            entries,
            current,
            count,
        }
    }
}

impl<'a> ReadIterator<'a> for Cursor<'a> {
    fn key(&self) -> Option<&'a dyn Any> {
        self.current.and_then(|(key, _)| key)
    }

    fn value(&self) -> Option<&'a dyn Any> {
        self.current.map(|(_, value)| value)
    }

    fn inc_next(&mut self) -> bool {
        if self.current.is_some() {
            self.current = self.entries.next();
        }
        self.current.is_some()
    }

    fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    fn count(&self) -> usize {
        self.count
    }
}

/// Creates iterators over one concrete container type
pub trait ContainerAdapter: Send + Sync {
    /// Cursor over the elements of `container`
    fn read_iter<'a>(&self, container: &'a dyn Any) -> Result<Cursor<'a>>;

    /// Reset `container` and return an iterator appending to it
    fn write_iter<'a>(&self, container: &'a mut dyn Any) -> Result<Box<dyn WriteIterator + 'a>>;
}

/// Declared type of a container element
#[derive(Clone, Copy)]
pub struct ElementInfo {
    ty: TypeRef,
    pointer: Option<PointerAccess>,
    construct: fn() -> Box<dyn Any>,
}

fn construct_element<T: Any + Default>() -> Box<dyn Any> {
    Box::new(T::default())
}

impl ElementInfo {
    /// Element info for `T`, or None if `T` is itself a container
    pub fn of<T: Member + Default>() -> Option<Self> {
        let (ty, pointer) = match T::member_kind() {
            MemberKind::Value(ty) => (ty, None),
            MemberKind::Pointer(info) => (info.target, Some(info.access)),
            MemberKind::Container(_) => return None,
        };
        Some(Self {
            ty,
            pointer,
            construct: construct_element::<T>,
        })
    }

    /// Declared value type, or the declared pointee type for pointer elements
    pub fn ty(&self) -> TypeRef {
        self.ty
    }

    /// Pointer access, for pointer elements
    pub fn pointer(&self) -> Option<PointerAccess> {
        self.pointer
    }

    /// Whether the element is an owning pointer
    pub fn is_pointer(&self) -> bool {
        self.pointer.is_some()
    }

    /// Build a default element, for filling before it is moved into the container
    pub fn construct(&self) -> Box<dyn Any> {
        (self.construct)()
    }
}

impl fmt::Debug for ElementInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementInfo")
            .field("ty", &self.ty.rust_name())
            .field("pointer", &self.is_pointer())
            .finish()
    }
}

/// Reflection of a container member
pub struct FieldContainer {
    shape: ContainerShape,
    key: Option<ElementInfo>,
    value: ElementInfo,
    adapter: Box<dyn ContainerAdapter>,
}

impl FieldContainer {
    /// Container shape
    pub fn shape(&self) -> ContainerShape {
        self.shape
    }

    /// Whether elements are addressed by key
    pub fn is_associative(&self) -> bool {
        self.key.is_some()
    }

    /// Key element info, for maps
    pub fn key_info(&self) -> Option<&ElementInfo> {
        self.key.as_ref()
    }

    /// Value element info
    pub fn value_info(&self) -> &ElementInfo {
        &self.value
    }

    /// Declared key type, for maps
    pub fn key_type(&self) -> Option<TypeRef> {
        self.key.map(|key| key.ty)
    }

    /// Declared value type
    pub fn value_type(&self) -> TypeRef {
        self.value.ty
    }

    /// Whether keys are owning pointers
    pub fn is_key_pointer(&self) -> bool {
        self.key.map_or(false, |key| key.is_pointer())
    }

    /// Whether values are owning pointers
    pub fn is_value_pointer(&self) -> bool {
        self.value.is_pointer()
    }

    /// Cursor over the elements of `container`
    pub fn read_iter<'a>(&self, container: &'a dyn Any) -> Result<Cursor<'a>> {
        self.adapter.read_iter(container)
    }

    /// Reset `container` and return an iterator appending to it
    pub fn write_iter<'a>(&self, container: &'a mut dyn Any) -> Result<Box<dyn WriteIterator + 'a>> {
        self.adapter.write_iter(container)
    }
}

impl fmt::Debug for FieldContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldContainer")
            .field("shape", &self.shape)
            .field("key", &self.key)
            .field("value", &self.value)
            .finish()
    }
}

fn nested<C: Any>() -> MemberKind {
    log::debug!(
        "{} nests a container and is reflected as a plain value",
        core::any::type_name::<C>()
    );
    MemberKind::Value(TypeRef::of::<C>())
}

fn element_kind<C: Any, T: Member + Default>(shape: ContainerShape, adapter: Box<dyn ContainerAdapter>) -> MemberKind {
    match ElementInfo::of::<T>() {
        Some(value) => MemberKind::Container(FieldContainer {
            shape,
            key: None,
            value,
            adapter,
        }),
        None => nested::<C>(),
    }
}

fn map_kind<C, K, V>(adapter: Box<dyn ContainerAdapter>) -> MemberKind
where
    C: Any,
    K: Member + Default,
    V: Member + Default,
{
    match (ElementInfo::of::<K>(), ElementInfo::of::<V>()) {
        (Some(key), Some(value)) => MemberKind::Container(FieldContainer {
            shape: ContainerShape::Map,
            key: Some(key),
            value,
            adapter,
        }),
        _ => nested::<C>(),
    }
}

fn downcast<C: Any>(container: &dyn Any) -> Result<&C> {
    container
        .downcast_ref::<C>()
        .ok_or_else(ReflectError::mismatch::<C>)
}

fn downcast_mut<C: Any>(container: &mut dyn Any) -> Result<&mut C> {
    container
        .downcast_mut::<C>()
        .ok_or_else(ReflectError::mismatch::<C>)
}

// ----------------------------------------------------------------------------
// Fixed arrays

struct FixedArrayAdapter<T, const N: usize>(PhantomData<fn() -> T>);

struct FixedArrayWriter<'a, T, const N: usize> {
    slots: &'a mut [T; N],
    next: usize,
}

impl<'a, T: Member + Default, const N: usize> FixedArrayWriter<'a, T, N> {
    fn next_slot(&mut self) -> Result<&mut T> {
        if self.next >= N {
            log::error!("Fixed array of {} elements overflowed", N);
            return Err(ReflectError::CapacityExceeded { capacity: N });
        }
        let slot = &mut self.slots[self.next];
        self.next += 1;
        Ok(slot)
    }
}

impl<'a, T: Member + Default, const N: usize> WriteIterator for FixedArrayWriter<'a, T, N> {
    fn shape(&self) -> ContainerShape {
        ContainerShape::FixedArray
    }

    fn add(&mut self, value: Instance) -> Result<()> {
        let value = T::from_instance(value)?;
        *self.next_slot()? = value;
        Ok(())
    }

    fn add_empty(&mut self) -> Result<&mut dyn Any> {
        Ok(self.next_slot()?)
    }
}

impl<T: Member + Default, const N: usize> ContainerAdapter for FixedArrayAdapter<T, N> {
    fn read_iter<'a>(&self, container: &'a dyn Any) -> Result<Cursor<'a>> {
        let array = downcast::<[T; N]>(container)?;
        Ok(Cursor::new(N, array.iter().map(value_entry)))
    }

    fn write_iter<'a>(&self, container: &'a mut dyn Any) -> Result<Box<dyn WriteIterator + 'a>> {
        let slots = downcast_mut::<[T; N]>(container)?;
        slots.iter_mut().for_each(|slot| *slot = T::default());
        Ok(Box::new(FixedArrayWriter { slots, next: 0 }))
    }
}

impl<T: Member + Default, const N: usize> Member for [T; N] {
    fn member_kind() -> MemberKind {
        element_kind::<Self, T>(
            ContainerShape::FixedArray,
            Box::new(FixedArrayAdapter::<T, N>(PhantomData)),
        )
    }
}

// ----------------------------------------------------------------------------
// Sequences

trait SequenceStorage: Any {
    type Item: Member + Default;

    fn cursor(&self) -> Cursor<'_>;
    fn clear(&mut self);
    fn push(&mut self, item: Self::Item) -> &mut Self::Item;
}

impl<T: Member + Default> SequenceStorage for Vec<T> {
    type Item = T;

    fn cursor(&self) -> Cursor<'_> {
        Cursor::new(self.len(), self.iter().map(value_entry))
    }

    fn clear(&mut self) {
        Vec::clear(self);
    }

    fn push(&mut self, item: T) -> &mut T {
        Vec::push(self, item);
        let last = self.len() - 1;
        &mut self[last]
    }
}

impl<T: Member + Default> SequenceStorage for VecDeque<T> {
    type Item = T;

    fn cursor(&self) -> Cursor<'_> {
        Cursor::new(self.len(), self.iter().map(value_entry))
    }

    fn clear(&mut self) {
        VecDeque::clear(self);
    }

    fn push(&mut self, item: T) -> &mut T {
        self.push_back(item);
        let last = self.len() - 1;
        &mut self[last]
    }
}

struct SequenceAdapter<C>(PhantomData<fn() -> C>);

struct SequenceWriter<'a, C> {
    sequence: &'a mut C,
}

impl<'a, C: SequenceStorage> WriteIterator for SequenceWriter<'a, C> {
    fn shape(&self) -> ContainerShape {
        ContainerShape::Sequence
    }

    fn add(&mut self, value: Instance) -> Result<()> {
        self.sequence.push(C::Item::from_instance(value)?);
        Ok(())
    }

    fn add_empty(&mut self) -> Result<&mut dyn Any> {
        Ok(self.sequence.push(C::Item::default()))
    }
}

impl<C: SequenceStorage> ContainerAdapter for SequenceAdapter<C> {
    fn read_iter<'a>(&self, container: &'a dyn Any) -> Result<Cursor<'a>> {
        Ok(downcast::<C>(container)?.cursor())
    }

    fn write_iter<'a>(&self, container: &'a mut dyn Any) -> Result<Box<dyn WriteIterator + 'a>> {
        let sequence = downcast_mut::<C>(container)?;
        sequence.clear();
        Ok(Box::new(SequenceWriter { sequence }))
    }
}

impl<T: Member + Default> Member for Vec<T> {
    fn member_kind() -> MemberKind {
        element_kind::<Self, T>(
            ContainerShape::Sequence,
            Box::new(SequenceAdapter::<Self>(PhantomData)),
        )
    }
}

impl<T: Member + Default> Member for VecDeque<T> {
    fn member_kind() -> MemberKind {
        element_kind::<Self, T>(
            ContainerShape::Sequence,
            Box::new(SequenceAdapter::<Self>(PhantomData)),
        )
    }
}

// ----------------------------------------------------------------------------
// Sets

trait SetStorage: Any {
    type Item: Member + Default;

    fn cursor(&self) -> Cursor<'_>;
    fn clear(&mut self);
    fn insert(&mut self, item: Self::Item) -> bool;
}

impl<T: Member + Default + Hash + Eq> SetStorage for HashSet<T> {
    type Item = T;

    fn cursor(&self) -> Cursor<'_> {
        Cursor::new(self.len(), self.iter().map(value_entry))
    }

    fn clear(&mut self) {
        HashSet::clear(self);
    }

    fn insert(&mut self, item: T) -> bool {
        HashSet::insert(self, item)
    }
}

impl<T: Member + Default + Ord> SetStorage for BTreeSet<T> {
    type Item = T;

    fn cursor(&self) -> Cursor<'_> {
        Cursor::new(self.len(), self.iter().map(value_entry))
    }

    fn clear(&mut self) {
        BTreeSet::clear(self);
    }

    fn insert(&mut self, item: T) -> bool {
        BTreeSet::insert(self, item)
    }
}

struct SetAdapter<C>(PhantomData<fn() -> C>);

struct SetWriter<'a, C> {
    set: &'a mut C,
}

impl<'a, C: SetStorage> WriteIterator for SetWriter<'a, C> {
    fn shape(&self) -> ContainerShape {
        ContainerShape::Set
    }

    fn add(&mut self, value: Instance) -> Result<()> {
        if !self.set.insert(C::Item::from_instance(value)?) {
            log::trace!("Duplicate element dropped from {}", core::any::type_name::<C>());
        }
        Ok(())
    }
}

impl<C: SetStorage> ContainerAdapter for SetAdapter<C> {
    fn read_iter<'a>(&self, container: &'a dyn Any) -> Result<Cursor<'a>> {
        Ok(downcast::<C>(container)?.cursor())
    }

    fn write_iter<'a>(&self, container: &'a mut dyn Any) -> Result<Box<dyn WriteIterator + 'a>> {
        let set = downcast_mut::<C>(container)?;
        set.clear();
        Ok(Box::new(SetWriter { set }))
    }
}

impl<T: Member + Default + Hash + Eq> Member for HashSet<T> {
    fn member_kind() -> MemberKind {
        element_kind::<Self, T>(ContainerShape::Set, Box::new(SetAdapter::<Self>(PhantomData)))
    }
}

impl<T: Member + Default + Ord> Member for BTreeSet<T> {
    fn member_kind() -> MemberKind {
        element_kind::<Self, T>(ContainerShape::Set, Box::new(SetAdapter::<Self>(PhantomData)))
    }
}

// ----------------------------------------------------------------------------
// Maps

trait MapStorage: Any {
    type Key: Member + Default;
    type Value: Member + Default;

    fn cursor(&self) -> Cursor<'_>;
    fn clear(&mut self);
    fn insert_new(&mut self, key: Self::Key, value: Self::Value) -> bool;
    fn get_or_default(&mut self, key: Self::Key) -> &mut Self::Value;
}

impl<K, V> MapStorage for HashMap<K, V>
where
    K: Member + Default + Hash + Eq,
    V: Member + Default,
{
    type Key = K;
    type Value = V;

    fn cursor(&self) -> Cursor<'_> {
        Cursor::new(self.len(), self.iter().map(map_entry))
    }

    fn clear(&mut self) {
        HashMap::clear(self);
    }

    fn insert_new(&mut self, key: K, value: V) -> bool {
        match self.entry(key) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        }
    }

    fn get_or_default(&mut self, key: K) -> &mut V {
        self.entry(key).or_default()
    }
}

impl<K, V> MapStorage for BTreeMap<K, V>
where
    K: Member + Default + Ord,
    V: Member + Default,
{
    type Key = K;
    type Value = V;

    fn cursor(&self) -> Cursor<'_> {
        Cursor::new(self.len(), self.iter().map(map_entry))
    }

    fn clear(&mut self) {
        BTreeMap::clear(self);
    }

    fn insert_new(&mut self, key: K, value: V) -> bool {
        match self.entry(key) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        }
    }

    fn get_or_default(&mut self, key: K) -> &mut V {
        self.entry(key).or_default()
    }
}

struct MapAdapter<C>(PhantomData<fn() -> C>);

struct MapWriter<'a, C> {
    map: &'a mut C,
}

impl<'a, C: MapStorage> WriteIterator for MapWriter<'a, C> {
    fn shape(&self) -> ContainerShape {
        ContainerShape::Map
    }

    fn add_keyed(&mut self, key: Instance, value: Instance) -> Result<bool> {
        let key = C::Key::from_instance(key)?;
        let value = C::Value::from_instance(value)?;
        Ok(self.map.insert_new(key, value))
    }

    fn add_empty_keyed(&mut self, key: Instance) -> Result<&mut dyn Any> {
        let key = C::Key::from_instance(key)?;
        Ok(self.map.get_or_default(key))
    }
}

impl<C: MapStorage> ContainerAdapter for MapAdapter<C> {
    fn read_iter<'a>(&self, container: &'a dyn Any) -> Result<Cursor<'a>> {
        Ok(downcast::<C>(container)?.cursor())
    }

    fn write_iter<'a>(&self, container: &'a mut dyn Any) -> Result<Box<dyn WriteIterator + 'a>> {
        let map = downcast_mut::<C>(container)?;
        map.clear();
        Ok(Box::new(MapWriter { map }))
    }
}

impl<K, V> Member for HashMap<K, V>
where
    K: Member + Default + Hash + Eq,
    V: Member + Default,
{
    fn member_kind() -> MemberKind {
        map_kind::<Self, K, V>(Box::new(MapAdapter::<Self>(PhantomData)))
    }
}

impl<K, V> Member for BTreeMap<K, V>
where
    K: Member + Default + Ord,
    V: Member + Default,
{
    fn member_kind() -> MemberKind {
        map_kind::<Self, K, V>(Box::new(MapAdapter::<Self>(PhantomData)))
    }
}
