//! Bounds-checked little-endian field cursor.
//!
//! The wire formats are fixed positional layouts: every field has a fixed
//! width and decoding walks the buffer front to back. This cursor is the
//! single low-level unpack helper shared by all three packet decoders, so
//! field order and widths live in exactly one place per format.

use crate::{ReplayError, Result};

pub(crate) struct FieldCursor<'a> {
    data: &'a [u8],
    offset: usize,
    context: &'static str,
}

impl<'a> FieldCursor<'a> {
    pub(crate) fn new(data: &'a [u8], context: &'static str) -> Self {
        Self { data, offset: 0, context }
    }

    /// Current byte offset, for error reporting.
    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.offset.checked_add(len).ok_or_else(|| ReplayError::Parse {
            context: self.context.to_string(),
            details: format!("field offset overflow at {}", self.offset),
        })?;
        if end > self.data.len() {
            return Err(ReplayError::Parse {
                context: self.context.to_string(),
                details: format!(
                    "field at offset {} extends beyond packet ({} > {})",
                    self.offset,
                    end,
                    self.data.len()
                ),
            });
        }
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn i16(&mut self) -> Result<i16> {
        let bytes = self.take(2)?;
        Ok(i16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn f32(&mut self) -> Result<f32> {
        let bytes = self.take(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Fixed-width UTF-8 name block, truncated at the first embedded NUL.
    /// Invalid UTF-8 is a decode error, matching the strict decoding the
    /// capture format has always been read with.
    pub(crate) fn name(&mut self, width: usize) -> Result<String> {
        let start = self.offset;
        let bytes = self.take(width)?;
        let trimmed = match bytes.iter().position(|&b| b == 0) {
            Some(nul) => &bytes[..nul],
            None => bytes,
        };
        String::from_utf8(trimmed.to_vec()).map_err(|e| ReplayError::Parse {
            context: self.context.to_string(),
            details: format!("invalid UTF-8 in name field at offset {start}: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fields_in_order() {
        let data = [0x34, 0x12, 0xFF, 0x00, 0x00, 0x80, 0x3F];
        let mut cursor = FieldCursor::new(&data, "test");
        assert_eq!(cursor.u16().unwrap(), 0x1234);
        assert_eq!(cursor.i8().unwrap(), -1);
        assert_eq!(cursor.f32().unwrap(), 1.0);
        assert_eq!(cursor.offset(), 7);
    }

    #[test]
    fn overrun_is_parse_error() {
        let data = [0u8; 2];
        let mut cursor = FieldCursor::new(&data, "test");
        assert!(cursor.f32().is_err());
    }

    #[test]
    fn name_truncates_at_nul() {
        let mut block = vec![0u8; 16];
        block[..5].copy_from_slice(b"Felix");
        block[5] = 0;
        block[6..9].copy_from_slice(b"xyz"); // garbage after the NUL
        let mut cursor = FieldCursor::new(&block, "test");
        assert_eq!(cursor.name(16).unwrap(), "Felix");
        assert_eq!(cursor.offset(), 16);
    }

    #[test]
    fn name_without_nul_uses_full_width() {
        let block = [b'A'; 8];
        let mut cursor = FieldCursor::new(&block, "test");
        assert_eq!(cursor.name(8).unwrap(), "AAAAAAAA");
    }
}
