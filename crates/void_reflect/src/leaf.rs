//! Leaf conversions - string and raw-byte forms of indivisible values
//!
//! A type with a [`Stringify`] implementation is a leaf: the serialiser
//! writes it whole instead of walking its fields. A [`RawCodec`] adds a
//! fixed-width binary form that the binary stream prefers when it is
//! shorter than the text.

use core::any::Any;
use core::fmt::Display;
use core::marker::PhantomData;
use core::str::FromStr;

use bytemuck::Pod;

use crate::member::Member;
use crate::type_info::Type;

/// String conversion pair for a leaf type
pub trait Stringify: Send + Sync {
    /// Canonical string form of `value`, or None if it is not of this type
    fn to_string(&self, ty: &Type, value: &dyn Any) -> Option<String>;

    /// Parse `text` into `value`. Returns false on failure, leaving `value` untouched.
    fn from_string(&self, ty: &Type, text: &str, value: &mut dyn Any) -> bool;
}

/// Stringifier built on `Display` and `FromStr`
pub struct ParseStringifier<T>(PhantomData<fn() -> T>);

impl<T> ParseStringifier<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for ParseStringifier<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Any + Display + FromStr> Stringify for ParseStringifier<T> {
    fn to_string(&self, _ty: &Type, value: &dyn Any) -> Option<String> {
        value.downcast_ref::<T>().map(ToString::to_string)
    }

    fn from_string(&self, _ty: &Type, text: &str, value: &mut dyn Any) -> bool {
        match (value.downcast_mut::<T>(), text.parse::<T>()) {
            (Some(slot), Ok(parsed)) => {
                *slot = parsed;
                true
            }
            _ => false,
        }
    }
}

/// Stringifier built from a user-supplied function pair
pub struct TypedStringifier<T> {
    to: fn(&T) -> String,
    from: fn(&str) -> Option<T>,
}

impl<T> TypedStringifier<T> {
    pub fn new(to: fn(&T) -> String, from: fn(&str) -> Option<T>) -> Self {
        Self { to, from }
    }
}

impl<T: Any> Stringify for TypedStringifier<T> {
    fn to_string(&self, _ty: &Type, value: &dyn Any) -> Option<String> {
        value.downcast_ref::<T>().map(self.to)
    }

    fn from_string(&self, _ty: &Type, text: &str, value: &mut dyn Any) -> bool {
        match (value.downcast_mut::<T>(), (self.from)(text)) {
            (Some(slot), Some(parsed)) => {
                *slot = parsed;
                true
            }
            _ => false,
        }
    }
}

/// A fieldless enum exposed to reflection through its integer values
///
/// ```ignore
/// #[derive(Clone, Copy, Default)]
/// enum Blend { #[default] Opaque, Additive }
///
/// impl Member for Blend {}
/// impl ReflectEnum for Blend {
///     fn to_i64(self) -> i64 { self as i64 }
///     fn from_i64(value: i64) -> Option<Self> {
///         match value { 0 => Some(Blend::Opaque), 1 => Some(Blend::Additive), _ => None }
///     }
/// }
/// ```
pub trait ReflectEnum: Member + Copy + Default {
    /// Integer value of the variant
    fn to_i64(self) -> i64;

    /// Variant for an integer value
    fn from_i64(value: i64) -> Option<Self>;
}

/// Stringifier for enums: constant names, falling back to the integer form
pub struct EnumStringifier<T>(PhantomData<fn() -> T>);

impl<T> EnumStringifier<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for EnumStringifier<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ReflectEnum> Stringify for EnumStringifier<T> {
    fn to_string(&self, ty: &Type, value: &dyn Any) -> Option<String> {
        let value = value.downcast_ref::<T>()?.to_i64();
        Some(match ty.constant_by_value(value) {
            Some(constant) => constant.name.clone(),
            None => value.to_string(),
        })
    }

    fn from_string(&self, ty: &Type, text: &str, value: &mut dyn Any) -> bool {
        let number = match ty.constant_by_name(text) {
            Some(constant) => constant.value,
            None => match text.parse::<i64>() {
                Ok(number) => number,
                Err(_) => return false,
            },
        };
        match (value.downcast_mut::<T>(), T::from_i64(number)) {
            (Some(slot), Some(parsed)) => {
                *slot = parsed;
                true
            }
            _ => false,
        }
    }
}

/// Fixed-width binary form of a leaf value
pub trait RawCodec: Send + Sync {
    /// Number of bytes written and read
    fn size(&self) -> usize;

    /// Append the raw form of `value`. Returns false if it is not of this type.
    fn write(&self, value: &dyn Any, out: &mut Vec<u8>) -> bool;

    /// Read `value` from exactly [`RawCodec::size`] bytes
    fn read(&self, bytes: &[u8], value: &mut dyn Any) -> bool;
}

/// In-memory bytes of a plain-old-data value, host order
pub struct PodCodec<T>(PhantomData<fn() -> T>);

impl<T> PodCodec<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for PodCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Pod> RawCodec for PodCodec<T> {
    fn size(&self) -> usize {
        core::mem::size_of::<T>()
    }

    fn write(&self, value: &dyn Any, out: &mut Vec<u8>) -> bool {
        match value.downcast_ref::<T>() {
            Some(value) => {
                out.extend_from_slice(bytemuck::bytes_of(value));
                true
            }
            None => false,
        }
    }

    fn read(&self, bytes: &[u8], value: &mut dyn Any) -> bool {
        match (value.downcast_mut::<T>(), bytemuck::try_pod_read_unaligned::<T>(bytes)) {
            (Some(slot), Ok(read)) => {
                *slot = read;
                true
            }
            _ => false,
        }
    }
}

/// `bool` as a single 0/1 byte
pub struct BoolCodec;

impl RawCodec for BoolCodec {
    fn size(&self) -> usize {
        1
    }

    fn write(&self, value: &dyn Any, out: &mut Vec<u8>) -> bool {
        match value.downcast_ref::<bool>() {
            Some(value) => {
                out.push(u8::from(*value));
                true
            }
            None => false,
        }
    }

    fn read(&self, bytes: &[u8], value: &mut dyn Any) -> bool {
        let parsed = match bytes {
            [0] => false,
            [1] => true,
            _ => return false,
        };
        match value.downcast_mut::<bool>() {
            Some(slot) => {
                *slot = parsed;
                true
            }
            None => false,
        }
    }
}

/// `char` as its 4-byte scalar value, host order
pub struct CharCodec;

impl RawCodec for CharCodec {
    fn size(&self) -> usize {
        4
    }

    fn write(&self, value: &dyn Any, out: &mut Vec<u8>) -> bool {
        match value.downcast_ref::<char>() {
            Some(value) => {
                out.extend_from_slice(&u32::from(*value).to_ne_bytes());
                true
            }
            None => false,
        }
    }

    fn read(&self, bytes: &[u8], value: &mut dyn Any) -> bool {
        let parsed = <[u8; 4]>::try_from(bytes)
            .ok()
            .and_then(|raw| char::from_u32(u32::from_ne_bytes(raw)));
        match (value.downcast_mut::<char>(), parsed) {
            (Some(slot), Some(parsed)) => {
                *slot = parsed;
                true
            }
            _ => false,
        }
    }
}

/// Enum value as a 4-byte signed integer, host order
pub struct EnumCodec<T>(PhantomData<fn() -> T>);

impl<T> EnumCodec<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for EnumCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ReflectEnum> RawCodec for EnumCodec<T> {
    fn size(&self) -> usize {
        4
    }

    fn write(&self, value: &dyn Any, out: &mut Vec<u8>) -> bool {
        let Some(value) = value.downcast_ref::<T>() else {
            return false;
        };
        match i32::try_from(value.to_i64()) {
            Ok(raw) => {
                out.extend_from_slice(&raw.to_ne_bytes());
                true
            }
            Err(_) => false,
        }
    }

    fn read(&self, bytes: &[u8], value: &mut dyn Any) -> bool {
        let parsed = <[u8; 4]>::try_from(bytes)
            .ok()
            .and_then(|raw| T::from_i64(i64::from(i32::from_ne_bytes(raw))));
        match (value.downcast_mut::<T>(), parsed) {
            (Some(slot), Some(parsed)) => {
                *slot = parsed;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_db::TypeDb;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    enum Blend {
        #[default]
        Opaque,
        Additive,
        Multiply,
    }

    impl Member for Blend {}

    impl ReflectEnum for Blend {
        fn to_i64(self) -> i64 {
            self as i64
        }

        fn from_i64(value: i64) -> Option<Self> {
            match value {
                0 => Some(Blend::Opaque),
                1 => Some(Blend::Additive),
                2 => Some(Blend::Multiply),
                _ => None,
            }
        }
    }

    fn round_trip<T: Any + Default + PartialEq + core::fmt::Debug>(db: &TypeDb, value: T) {
        let ty = db.get::<T>().unwrap();
        let text = ty.to_string(&value).unwrap();
        let mut parsed = T::default();
        assert!(ty.from_string(&text, &mut parsed), "{} failed to parse '{}'", ty.name(), text);
        assert_eq!(parsed, value);

        let mut raw = Vec::new();
        if ty.write_raw(&value, &mut raw) {
            assert_eq!(raw.len(), ty.size());
            let mut parsed = T::default();
            assert!(ty.read_raw(&raw, &mut parsed));
            assert_eq!(parsed, value);
        }
    }

    #[test]
    fn test_builtin_leaves_round_trip() {
        let db = TypeDb::with_builtins().unwrap();
        round_trip(&db, true);
        round_trip(&db, -7i8);
        round_trip(&db, -300i16);
        round_trip(&db, i32::MIN);
        round_trip(&db, i64::MAX);
        round_trip(&db, 200u8);
        round_trip(&db, 65_000u16);
        round_trip(&db, u32::MAX);
        round_trip(&db, u64::MAX);
        round_trip(&db, 1.2345f32);
        round_trip(&db, -0.1f64);
        round_trip(&db, 'λ');
        round_trip(&db, String::from("hello world"));
    }

    #[test]
    fn test_enum_names_and_fallback() {
        let mut db = TypeDb::new();
        db.create_enum::<Blend>("Blend")
            .unwrap()
            .constant("Opaque", Blend::Opaque)
            .constant("Additive", Blend::Additive);

        let ty = db.get::<Blend>().unwrap();
        assert_eq!(ty.size(), 4);
        assert_eq!(ty.to_string(&Blend::Additive).as_deref(), Some("Additive"));
        assert_eq!(ty.to_string(&Blend::Multiply).as_deref(), Some("2"));

        let mut value = Blend::Opaque;
        assert!(ty.from_string("2", &mut value));
        assert_eq!(value, Blend::Multiply);
        assert!(ty.from_string("Additive", &mut value));
        assert_eq!(value, Blend::Additive);
        assert!(!ty.from_string("Screen", &mut value));
        assert!(!ty.from_string("9", &mut value));
        assert_eq!(value, Blend::Additive);

        round_trip(&db, Blend::Multiply);
    }

    #[test]
    fn test_codecs_reject_bad_input() {
        let mut flag = false;
        assert!(!BoolCodec.read(&[2], &mut flag));
        assert!(!BoolCodec.read(&[1, 0], &mut flag));

        let mut letter = 'a';
        assert!(!CharCodec.read(&0xD800u32.to_ne_bytes(), &mut letter));
        assert_eq!(letter, 'a');

        let codec = PodCodec::<u32>::new();
        let mut out = Vec::new();
        assert!(!codec.write(&1u16, &mut out));
        assert!(out.is_empty());
        let mut value = 0u32;
        assert!(!codec.read(&[1, 2], &mut value));
    }
}
