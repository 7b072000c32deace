//! Binary stream format
//!
//! Layout:
//! - type tag: `u32` name hash, `0` for a null pointer
//! - container header: `u32` element count
//! - `String`: `u32` byte length, then the UTF-8 bytes
//! - other leaves: `u8` flag; `1` then the NUL-terminated canonical string
//!   when it is shorter than the raw form, `0` then exactly `size` raw bytes
//! - path prefix: each segment as a NUL-terminated string
//!
//! Integers written by the format are little-endian; raw leaf bytes are in
//! host order.

use core::any::Any;

use void_reflect::{AssertMode, ReflectError, Type};

use crate::config::StreamConfig;
use crate::error::{Result, SerialError};
use crate::linear::{LinearReader, LinearWriter};
use crate::protocol::{path_segments, ReadProtocol, WriteProtocol};

const LEAF_RAW: u8 = 0;
const LEAF_TEXT: u8 = 1;

fn invalid_leaf(ty: &Type, reason: impl Into<String>) -> SerialError {
    let reason = reason.into();
    log::error!("Invalid '{}' value: {}", ty.name(), reason);
    SerialError::InvalidLeaf {
        ty: ty.name().into(),
        reason,
    }
}

fn wrong_value(ty: &Type) -> SerialError {
    log::error!("Value handed to the '{}' leaf writer is not a {}", ty.name(), ty.rust_name());
    SerialError::Reflect(ReflectError::ObjectMismatch {
        expected: ty.name().into(),
    })
}

fn check_limit(what: &'static str, len: usize, limit: usize) -> Result<()> {
    if len > limit {
        log::error!("{} length {} exceeds the limit of {}", what, len, limit);
        return Err(SerialError::LimitExceeded { what, len, limit });
    }
    Ok(())
}

/// Writes objects to a byte buffer
#[derive(Debug, Default)]
pub struct BinaryWriter {
    out: LinearWriter,
    config: StreamConfig,
}

impl BinaryWriter {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            out: LinearWriter::new(),
            config,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Bytes written so far
    pub fn as_bytes(&self) -> &[u8] {
        self.out.as_bytes()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.out.into_bytes()
    }

    fn write_len(&mut self, what: &'static str, len: usize) -> Result<()> {
        let len = u32::try_from(len).map_err(|_| {
            log::error!("{} length {} does not fit the stream", what, len);
            SerialError::LimitExceeded {
                what,
                len,
                limit: u32::MAX as usize,
            }
        })?;
        self.out.write_u32_le(len);
        Ok(())
    }
}

impl WriteProtocol for BinaryWriter {
    fn carries_type_tags(&self) -> bool {
        self.config.type_tags
    }

    fn assert_mode(&self) -> AssertMode {
        self.config.assert_mode
    }

    fn on_type(&mut self, ty: Option<&Type>) -> Result<()> {
        self.out.write_u32_le(ty.map_or(0, Type::hash));
        Ok(())
    }

    fn on_value(&mut self, ty: &Type, value: &dyn Any) -> Result<bool> {
        if !ty.is_leaf() {
            return Ok(false);
        }
        let text = ty.to_string(value).ok_or_else(|| wrong_value(ty))?;

        // The text form is NUL-terminated, so it cannot carry a NUL itself
        let text_fits = !text.contains('\0');
        if ty.is_string() {
            self.write_len("string", text.len())?;
            self.out.write_bytes(text.as_bytes());
        } else if text_fits && (!ty.has_raw() || text.len() < ty.size()) {
            self.out.write_u8(LEAF_TEXT);
            self.out.write_cstr(&text);
        } else if ty.has_raw() {
            self.out.write_u8(LEAF_RAW);
            if !ty.write_raw(value, self.out.buffer_mut()) {
                return Err(wrong_value(ty));
            }
        } else {
            return Err(invalid_leaf(ty, "text form contains a NUL byte and there is no raw form"));
        }
        Ok(true)
    }

    fn on_container(&mut self, count: usize) -> Result<()> {
        self.write_len("container", count)
    }

    fn on_path_segment(&mut self, segment: &str) -> Result<()> {
        self.out.write_cstr(segment);
        Ok(())
    }
}

/// Reads objects from a byte buffer
#[derive(Debug)]
pub struct BinaryReader<'a> {
    input: LinearReader<'a>,
    config: StreamConfig,
}

impl<'a> BinaryReader<'a> {
    pub fn new(bytes: &'a [u8], config: StreamConfig) -> Self {
        Self {
            input: LinearReader::new(bytes),
            config,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.input.remaining()
    }

    fn read_string(&mut self, ty: &Type, value: &mut dyn Any) -> Result<()> {
        let len = self.input.read_u32_le()? as usize;
        check_limit("string", len, self.config.max_string_len)?;
        let bytes = self.input.read_bytes(len)?;
        let text = core::str::from_utf8(bytes).map_err(|err| invalid_leaf(ty, err.to_string()))?;
        if !ty.from_string(text, value) {
            return Err(wrong_value(ty));
        }
        Ok(())
    }
}

impl ReadProtocol for BinaryReader<'_> {
    fn carries_type_tags(&self) -> bool {
        self.config.type_tags
    }

    fn assert_mode(&self) -> AssertMode {
        self.config.assert_mode
    }

    fn on_type(&mut self) -> Result<Option<u32>> {
        let hash = self.input.read_u32_le()?;
        Ok((hash != 0).then_some(hash))
    }

    fn on_value(&mut self, ty: &Type, value: &mut dyn Any) -> Result<bool> {
        if !ty.is_leaf() {
            return Ok(false);
        }
        if ty.is_string() {
            self.read_string(ty, value)?;
            return Ok(true);
        }

        let offset = self.input.offset();
        match self.input.read_u8()? {
            LEAF_TEXT => {
                let text = self.input.read_cstr()?;
                if !ty.from_string(text, value) {
                    return Err(invalid_leaf(ty, format!("cannot parse '{}'", text)));
                }
            }
            LEAF_RAW => {
                if !ty.has_raw() {
                    return Err(invalid_leaf(ty, "type has no raw form"));
                }
                let bytes = self.input.read_bytes(ty.size())?;
                if !ty.read_raw(bytes, value) {
                    return Err(invalid_leaf(ty, "raw bytes do not hold a valid value"));
                }
            }
            flag => {
                let reason = format!("unknown leaf encoding {}", flag);
                log::error!("Malformed stream at offset {}: {}", offset, reason);
                return Err(SerialError::Malformed { offset, reason });
            }
        }
        Ok(true)
    }

    fn on_container(&mut self) -> Result<usize> {
        let count = self.input.read_u32_le()? as usize;
        check_limit("container", count, self.config.max_container_len)?;
        Ok(count)
    }

    fn traverse_stream(&mut self, path: &str) -> Result<()> {
        for expected in path_segments(path) {
            let found = self.input.read_cstr()?;
            if found != expected {
                log::error!("Stream path mismatch: expected '{}', found '{}'", expected, found);
                return Err(SerialError::PathMismatch {
                    expected: expected.into(),
                    found: found.into(),
                });
            }
        }
        Ok(())
    }

    fn is_stream_ended(&self) -> bool {
        self.input.peek_u32_le().map_or(true, |tag| tag == 0)
    }

    fn position(&self) -> usize {
        self.input.offset()
    }

    fn rewind(&mut self, position: usize) {
        self.input.set_offset(position);
    }
}
