//! Byte cursors for flat streams
//!
//! Integers are little-endian. Reads are bounds-checked and report the
//! offset at which the stream ran short.

use crate::error::{Result, SerialError};

fn malformed(offset: usize, reason: impl Into<String>) -> SerialError {
    let reason = reason.into();
    log::error!("Malformed stream at offset {}: {}", offset, reason);
    SerialError::Malformed { offset, reason }
}

/// Generate little-endian read methods for primitive types
macro_rules! impl_read_le {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> Result<$type> {
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(self.read_bytes($size)?);
            Ok(<$type>::from_le_bytes(bytes))
        }
    };
}

/// Growable output buffer
#[derive(Debug, Default, Clone)]
pub struct LinearWriter {
    buffer: Vec<u8>,
}

impl LinearWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_u32_le(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Write the bytes of `text` followed by a NUL terminator
    pub fn write_cstr(&mut self, text: &str) {
        self.buffer.extend_from_slice(text.as_bytes());
        self.buffer.push(0);
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Direct access for codecs that append in place
    pub fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

/// Bounds-checked input cursor
#[derive(Debug, Clone)]
pub struct LinearReader<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> LinearReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    impl_read_le!(read_u32_le, u32, 4);

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(malformed(
                self.offset,
                format!("needed {} bytes, {} left", len, self.remaining()),
            ));
        }
        let slice = &self.buffer[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    /// Read a NUL-terminated UTF-8 string, consuming the terminator
    pub fn read_cstr(&mut self) -> Result<&'a str> {
        let rest = &self.buffer[self.offset..];
        let Some(end) = rest.iter().position(|&byte| byte == 0) else {
            return Err(malformed(self.offset, "unterminated string"));
        };
        let text = core::str::from_utf8(&rest[..end])
            .map_err(|err| malformed(self.offset, format!("invalid UTF-8: {}", err)))?;
        self.offset += end + 1;
        Ok(text)
    }

    /// The next little-endian `u32`, without consuming it
    pub fn peek_u32_le(&self) -> Option<u32> {
        let bytes = self.buffer.get(self.offset..self.offset + 4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(bytes);
        Some(u32::from_le_bytes(raw))
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Move the cursor back to an earlier offset
    pub fn set_offset(&mut self, offset: usize) {
        self.offset = offset.min(self.buffer.len());
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    pub fn is_eof(&self) -> bool {
        self.offset >= self.buffer.len()
    }
}
