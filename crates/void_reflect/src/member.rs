//! Member - how a Rust type appears as a field of a reflected type

use core::any::Any;

use crate::entity::Instance;
use crate::error::{ReflectError, Result};
use crate::field::MemberKind;
use crate::type_db::TypeRef;

/// A Rust type that can be declared as a reflected field
///
/// Plain values use the defaults. Owning pointers and containers override
/// [`Member::member_kind`] so a walker can tell the three kinds apart.
pub trait Member: Any + Sized {
    /// How fields of this type are walked
    fn member_kind() -> MemberKind {
        MemberKind::Value(TypeRef::of::<Self>())
    }

    /// Take an owned value of this type out of an instance
    fn from_instance(instance: Instance) -> Result<Self> {
        instance
            .into_any()
            .downcast::<Self>()
            .map(|value| *value)
            .map_err(|_| ReflectError::mismatch::<Self>())
    }
}

macro_rules! impl_member {
    ($($ty:ty),* $(,)?) => {
        $(impl Member for $ty {})*
    };
}

impl_member!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, char, String);
