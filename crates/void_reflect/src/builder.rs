//! Fluent declaration of a type's shape

use core::marker::PhantomData;

use crate::field::{Field, FieldAttributes};
use crate::leaf::{PodCodec, RawCodec, ReflectEnum, Stringify, TypedStringifier};
use crate::member::Member;
use crate::type_db::TypeKey;
use crate::type_info::{BaseLink, EnumConstant, Type};

/// Builder returned by [`TypeDb::create`](crate::TypeDb::create)
///
/// Attribute, group and description modifiers apply to the most recently
/// declared field.
pub struct TypeBuilder<'a, T> {
    ty: &'a mut Type,
    last: Option<usize>,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Member> TypeBuilder<'a, T> {
    pub(crate) fn new(ty: &'a mut Type) -> Self {
        Self {
            ty,
            last: None,
            _marker: PhantomData,
        }
    }

    /// Key of the type being built
    pub fn key(&self) -> TypeKey {
        self.ty.key()
    }

    /// Declare a field through its accessor pair
    ///
    /// A field with the same name replaces the earlier declaration.
    pub fn field<M: Member>(mut self, name: &str, get: fn(&T) -> &M, get_mut: fn(&mut T) -> &mut M) -> Self {
        let field = Field::new(name, get, get_mut);
        match self.ty.fields.iter().position(|existing| existing.name() == name) {
            Some(index) => {
                log::warn!("Field '{}' redeclared on type '{}'", name, self.ty.name());
                self.ty.fields[index] = field;
                self.last = Some(index);
            }
            None => {
                self.ty.fields.push(field);
                self.last = Some(self.ty.fields.len() - 1);
            }
        }
        self
    }

    fn last_field(&mut self, modifier: &str) -> Option<&mut Field> {
        if self.last.is_none() {
            log::warn!("'{}' applied to type '{}' before any field", modifier, self.ty.name());
        }
        let index = self.last?;
        self.ty.fields.get_mut(index)
    }

    /// Set the attributes of the last declared field
    pub fn attributes(mut self, attributes: FieldAttributes) -> Self {
        if let Some(field) = self.last_field("attributes") {
            field.attributes = attributes;
        }
        self
    }

    /// Set the tool grouping of the last declared field
    pub fn group(mut self, group: &str) -> Self {
        if let Some(field) = self.last_field("group") {
            field.group = Some(group.into());
        }
        self
    }

    /// Set the description of the last declared field
    pub fn describe(mut self, description: &str) -> Self {
        if let Some(field) = self.last_field("describe") {
            field.description = Some(description.into());
        }
        self
    }

    /// Declare the single base type and how to reach its sub-object
    pub fn base<P: Member>(self, upcast: fn(&T) -> &P, upcast_mut: fn(&mut T) -> &mut P) -> Self {
        if let Some(previous) = self.ty.base_ref() {
            log::warn!(
                "Base of type '{}' changed from {}",
                self.ty.name(),
                previous.rust_name()
            );
        }
        self.ty.base = Some(BaseLink::new(upcast, upcast_mut));
        self
    }

    /// Give the type a string conversion pair, making it a leaf
    pub fn stringify(self, to: fn(&T) -> String, from: fn(&str) -> Option<T>) -> Self {
        self.with_stringifier(Box::new(TypedStringifier::new(to, from)))
    }

    pub(crate) fn with_stringifier(self, stringifier: Box<dyn Stringify>) -> Self {
        self.ty.stringifier = Some(stringifier);
        self
    }

    pub(crate) fn with_raw(self, raw: Box<dyn RawCodec>) -> Self {
        self.ty.size = raw.size();
        self.ty.raw = Some(raw);
        self
    }
}

impl<'a, T: Member + bytemuck::Pod> TypeBuilder<'a, T> {
    /// Use the value's in-memory bytes as its raw form
    pub fn raw_bytes(self) -> Self {
        self.with_raw(Box::new(PodCodec::<T>::new()))
    }
}

impl<'a, T: ReflectEnum> TypeBuilder<'a, T> {
    /// Declare a named enum constant
    pub fn constant(self, name: &str, value: T) -> Self {
        let value = value.to_i64();
        if self.ty.constant_by_name(name).is_some() {
            log::warn!("Constant '{}' redeclared on enum '{}'", name, self.ty.name());
            self.ty.constants.retain(|constant| constant.name != name);
        }
        self.ty.constants.push(EnumConstant {
            name: name.into(),
            value,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_db::TypeDb;

    #[derive(Default)]
    struct Camera {
        fov: f32,
        near: f32,
    }

    impl Member for Camera {}

    #[test]
    fn test_field_modifiers_apply_to_last_field() {
        let mut db = TypeDb::with_builtins().unwrap();
        db.create::<Camera>("Camera")
            .unwrap()
            .field("fov", |c| &c.fov, |c| &mut c.fov)
            .attributes(FieldAttributes::HEX)
            .field("near", |c| &c.near, |c| &mut c.near)
            .attributes(FieldAttributes::TRANSIENT | FieldAttributes::READ_ONLY)
            .group("clip")
            .describe("Near clip distance");

        let camera = db.get::<Camera>().unwrap();
        assert_eq!(camera.field("fov").unwrap().attributes(), FieldAttributes::HEX);

        let near = camera.field("near").unwrap();
        assert!(near.is_transient());
        assert!(near.is_read_only());
        assert_eq!(near.group(), Some("clip"));
        assert_eq!(near.description(), Some("Near clip distance"));
    }

    #[test]
    fn test_redeclared_field_replaces() {
        let mut db = TypeDb::new();
        db.create::<Camera>("Camera")
            .unwrap()
            .field("fov", |c| &c.fov, |c| &mut c.fov)
            .field("fov", |c| &c.near, |c| &mut c.near);

        let camera = db.get::<Camera>().unwrap();
        assert_eq!(camera.fields().len(), 1);

        let value = Camera { fov: 1.0, near: 2.0 };
        let fov = camera.field("fov").unwrap().get(&value).unwrap();
        assert_eq!(fov.downcast_ref::<f32>(), Some(&2.0));
    }

    #[test]
    fn test_custom_stringifier_makes_leaf() {
        let mut db = TypeDb::new();
        db.create::<Camera>("Camera").unwrap().stringify(
            |c| format!("{} {}", c.fov, c.near),
            |text| {
                let mut parts = text.split(' ');
                let fov = parts.next()?.parse().ok()?;
                let near = parts.next()?.parse().ok()?;
                Some(Camera { fov, near })
            },
        );

        let camera = db.get::<Camera>().unwrap();
        assert!(camera.is_leaf());
        assert!(!camera.has_raw());
        assert_eq!(camera.to_string(&Camera { fov: 60.0, near: 0.5 }).as_deref(), Some("60 0.5"));

        let mut parsed = Camera::default();
        assert!(camera.from_string("90 0.25", &mut parsed));
        assert_eq!((parsed.fov, parsed.near), (90.0, 0.25));
    }
}
