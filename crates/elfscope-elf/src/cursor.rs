//! Endianness-aware raw byte access.

use crate::header::{Class, Endian};
use crate::{ElfError, Result};

/// Read-only view over the whole file buffer.
///
/// The byte order defaults to little-endian and is switched once, right after
/// the identification bytes of the file header have been read.
#[derive(Clone, Copy, Debug)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    endian: Endian,
}

impl<'a> ByteCursor<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            endian: Endian::Little,
        }
    }

    pub const fn with_endian(data: &'a [u8], endian: Endian) -> Self {
        Self { data, endian }
    }

    pub const fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    #[must_use]
    pub const fn endian(&self) -> Endian {
        self.endian
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Borrow `N` bytes starting at `offset`.
    fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        offset
            .checked_add(N)
            .and_then(|end| self.data.get(offset..end))
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(ElfError::OutOfBounds {
                offset,
                width: N,
                len: self.data.len(),
            })
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        Ok(self.array::<1>(offset)?[0])
    }

    pub fn read_u16(&self, offset: usize) -> Result<u16> {
        let bytes = self.array(offset)?;
        Ok(match self.endian {
            Endian::Little => u16::from_le_bytes(bytes),
            Endian::Big => u16::from_be_bytes(bytes),
        })
    }

    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        let bytes = self.array(offset)?;
        Ok(match self.endian {
            Endian::Little => u32::from_le_bytes(bytes),
            Endian::Big => u32::from_be_bytes(bytes),
        })
    }

    pub fn read_u64(&self, offset: usize) -> Result<u64> {
        let bytes = self.array(offset)?;
        Ok(match self.endian {
            Endian::Little => u64::from_le_bytes(bytes),
            Endian::Big => u64::from_be_bytes(bytes),
        })
    }

    /// Read an address/offset sized field: 4 bytes for ELF32, 8 for ELF64.
    pub fn read_word(&self, offset: usize, class: Class) -> Result<u64> {
        match class {
            Class::Elf32 => self.read_u32(offset).map(u64::from),
            Class::Elf64 => self.read_u64(offset),
        }
    }

    /// Read a NUL-terminated string of at most `max_len` bytes.
    ///
    /// Stops at the first NUL, at `max_len`, or at the end of the buffer,
    /// whichever comes first. Only an `offset` past the end is an error.
    pub fn read_cstr(&self, offset: usize, max_len: usize) -> Result<String> {
        if offset > self.data.len() {
            return Err(ElfError::OutOfBounds {
                offset,
                width: 1,
                len: self.data.len(),
            });
        }
        let end = offset.saturating_add(max_len).min(self.data.len());
        let bytes = &self.data[offset..end];
        let bytes = bytes
            .iter()
            .position(|&b| b == 0)
            .map_or(bytes, |nul| &bytes[..nul]);
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Sequential field reader over a [`ByteCursor`].
///
/// ELF structures are decoded field by field in format order; the running
/// position is what keeps 32-bit and 64-bit layouts apart.
#[derive(Debug)]
pub struct FieldReader<'c, 'a> {
    cursor: &'c ByteCursor<'a>,
    pos: usize,
    class: Class,
}

impl<'c, 'a> FieldReader<'c, 'a> {
    pub const fn new(cursor: &'c ByteCursor<'a>, pos: usize, class: Class) -> Self {
        Self { cursor, pos, class }
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    pub const fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn u8(&mut self) -> Result<u8> {
        let value = self.cursor.read_u8(self.pos)?;
        self.pos += 1;
        Ok(value)
    }

    pub fn u16(&mut self) -> Result<u16> {
        let value = self.cursor.read_u16(self.pos)?;
        self.pos += 2;
        Ok(value)
    }

    pub fn u32(&mut self) -> Result<u32> {
        let value = self.cursor.read_u32(self.pos)?;
        self.pos += 4;
        Ok(value)
    }

    /// Class-sized field.
    pub fn word(&mut self) -> Result<u64> {
        let value = self.cursor.read_word(self.pos, self.class)?;
        self.pos += self.class.word_size();
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_respects_byte_order() {
        let data = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_u16(0).unwrap(), 0x3412);
        assert_eq!(cursor.read_u32(0).unwrap(), 0x7856_3412);
        assert_eq!(cursor.read_u64(0).unwrap(), 0xF0DE_BC9A_7856_3412);

        cursor.set_endian(Endian::Big);
        assert_eq!(cursor.read_u16(0).unwrap(), 0x1234);
        assert_eq!(cursor.read_u32(4).unwrap(), 0x9ABC_DEF0);
        assert_eq!(cursor.read_u64(0).unwrap(), 0x1234_5678_9ABC_DEF0);
    }

    #[test]
    fn test_out_of_range_is_error() {
        let data = [0u8; 4];
        let cursor = ByteCursor::new(&data);
        assert!(cursor.read_u32(0).is_ok());
        assert_eq!(
            cursor.read_u32(1),
            Err(ElfError::OutOfBounds {
                offset: 1,
                width: 4,
                len: 4
            })
        );
        assert!(cursor.read_u8(usize::MAX).is_err());
    }

    #[test]
    fn test_read_cstr_stops_at_nul_or_limit() {
        let data = b"hello\0world";
        let cursor = ByteCursor::new(data);
        assert_eq!(cursor.read_cstr(0, 64).unwrap(), "hello");
        assert_eq!(cursor.read_cstr(0, 3).unwrap(), "hel");
        // Truncated at buffer end: returns what was read.
        assert_eq!(cursor.read_cstr(6, 64).unwrap(), "world");
        assert_eq!(cursor.read_cstr(11, 4).unwrap(), "");
        assert!(cursor.read_cstr(12, 4).is_err());
    }

    #[test]
    fn test_field_reader_word_width() {
        let data = [1, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0];
        let cursor = ByteCursor::new(&data);

        let mut r32 = FieldReader::new(&cursor, 0, Class::Elf32);
        assert_eq!(r32.word().unwrap(), 1);
        assert_eq!(r32.position(), 4);

        let mut r64 = FieldReader::new(&cursor, 4, Class::Elf64);
        assert_eq!(r64.word().unwrap(), 2);
        assert_eq!(r64.position(), 12);
    }
}
