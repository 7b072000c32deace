//! Stream protocol hooks
//!
//! The [`Serialiser`](crate::Serialiser) and
//! [`Deserialiser`](crate::Deserialiser) walk an object graph identically for
//! every format. Everything format specific happens in these hooks: how a
//! type tag, a leaf value and a container header are encoded, and what (if
//! anything) brackets each value and field. A flat stream such as
//! [`BinaryWriter`](crate::BinaryWriter) ignores the brackets; a tree format
//! would open and close nodes in them.

use core::any::Any;

use void_reflect::{AssertMode, Field, Type};

use crate::error::Result;

/// Format hooks used while writing
pub trait WriteProtocol {
    /// Whether polymorphic positions carry a type tag
    fn carries_type_tags(&self) -> bool {
        true
    }

    /// Escalation of programmer errors
    fn assert_mode(&self) -> AssertMode {
        AssertMode::default()
    }

    /// Write the type tag of a polymorphic position; None is a null pointer
    fn on_type(&mut self, ty: Option<&Type>) -> Result<()>;

    /// Write `value` whole if the format treats `ty` as a leaf.
    ///
    /// Returns `true` when the value was fully handled and its fields must
    /// not be walked.
    fn on_value(&mut self, ty: &Type, value: &dyn Any) -> Result<bool>;

    /// Write a container header
    fn on_container(&mut self, count: usize) -> Result<()>;

    /// Write one segment of an addressing path
    fn on_path_segment(&mut self, segment: &str) -> Result<()>;

    /// Open a value; tree formats start a node here
    fn begin_value(&mut self, _ty: &Type) -> Result<()> {
        Ok(())
    }

    /// Close the value opened by `begin_value`
    fn end_value(&mut self, _ty: &Type) -> Result<()> {
        Ok(())
    }

    /// Open a field; tree formats start a named child here
    fn begin_field(&mut self, _field: &Field) -> Result<()> {
        Ok(())
    }

    /// Close the field opened by `begin_field`
    fn end_field(&mut self, _field: &Field) -> Result<()> {
        Ok(())
    }
}

/// Format hooks used while reading
pub trait ReadProtocol {
    /// Whether polymorphic positions carry a type tag
    fn carries_type_tags(&self) -> bool {
        true
    }

    /// Escalation of programmer errors
    fn assert_mode(&self) -> AssertMode {
        AssertMode::default()
    }

    /// Read the type tag of a polymorphic position; None is a null pointer
    fn on_type(&mut self) -> Result<Option<u32>>;

    /// Read `value` whole if the format treats `ty` as a leaf.
    ///
    /// Returns `true` when the value was fully handled and its fields must
    /// not be walked.
    fn on_value(&mut self, ty: &Type, value: &mut dyn Any) -> Result<bool>;

    /// Read a container header, returning the element count
    fn on_container(&mut self) -> Result<usize>;

    /// Consume and match the segments of a `/`-separated path
    fn traverse_stream(&mut self, path: &str) -> Result<()>;

    /// Whether no further object follows
    fn is_stream_ended(&self) -> bool;

    /// Current read position
    fn position(&self) -> usize;

    /// Return to an earlier read position
    fn rewind(&mut self, position: usize);

    /// Open a value; tree formats start a node here
    fn begin_value(&mut self, _ty: &Type) -> Result<()> {
        Ok(())
    }

    /// Close the value opened by `begin_value`
    fn end_value(&mut self, _ty: &Type) -> Result<()> {
        Ok(())
    }

    /// Open a field; tree formats start a named child here
    fn begin_field(&mut self, _field: &Field) -> Result<()> {
        Ok(())
    }

    /// Close the field opened by `begin_field`
    fn end_field(&mut self, _field: &Field) -> Result<()> {
        Ok(())
    }
}

/// Split an addressing path into its non-empty segments
pub(crate) fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}
