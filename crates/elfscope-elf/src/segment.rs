//! Program header (segment) decoding.

use std::fmt;

use crate::constants::*;
use crate::cursor::{ByteCursor, FieldReader};
use crate::header::{Class, FileHeader};
use crate::{ElfError, Result};

/// Segment type (`p_type`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentType(pub u32);

impl SegmentType {
    pub const NULL: Self = Self(PT_NULL);
    pub const LOAD: Self = Self(PT_LOAD);
    pub const DYNAMIC: Self = Self(PT_DYNAMIC);
    pub const NOTE: Self = Self(PT_NOTE);
    pub const PHDR: Self = Self(PT_PHDR);
    pub const TLS: Self = Self(PT_TLS);

    /// Name with the `PT_` prefix stripped.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            PT_NULL => "NULL",
            PT_LOAD => "LOAD",
            PT_DYNAMIC => "DYNAMIC",
            PT_INTERP => "INTERP",
            PT_NOTE => "NOTE",
            PT_SHLIB => "SHLIB",
            PT_PHDR => "PHDR",
            PT_TLS => "TLS",
            PT_GNU_EH_FRAME => "GNU_EH_FRAME",
            PT_GNU_STACK => "GNU_STACK",
            PT_GNU_RELRO => "GNU_RELRO",
            PT_GNU_PROPERTY => "GNU_PROPERTY",
            PT_GNU_SFRAME => "GNU_SFRAME",
            PT_ARM_EXIDX => "ARM_EXIDX",
            _ => return None,
        })
    }

    /// Whether the type lies in the `PT_GNU_MBIND_LO..=PT_GNU_MBIND_HI` range.
    #[must_use]
    pub const fn is_gnu_mbind(self) -> bool {
        self.0 >= PT_GNU_MBIND_LO && self.0 <= PT_GNU_MBIND_HI
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.name() {
            f.write_str(name)
        } else if self.is_gnu_mbind() {
            write!(f, "GNU_MBIND+{:#x}", self.0 - PT_GNU_MBIND_LO)
        } else {
            f.write_str("UNKNOWN")
        }
    }
}

/// Segment permission flags (`p_flags`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SegmentFlags(pub u32);

impl SegmentFlags {
    #[must_use]
    pub const fn contains(self, flag: u32) -> bool {
        self.0 & flag != 0
    }
}

impl fmt::Display for SegmentFlags {
    /// `R`, `W`, `X` letters in readelf order, blanks for unset bits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = if self.contains(PF_R) { 'R' } else { ' ' };
        let w = if self.contains(PF_W) { 'W' } else { ' ' };
        let x = if self.contains(PF_X) { 'X' } else { ' ' };
        write!(f, "{r}{w}{x}")
    }
}

/// Decoded program header plus the indices of the sections it contains.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgramHeader {
    pub p_type: SegmentType,
    pub flags: SegmentFlags,
    pub offset: u64,
    pub vaddr: u64,
    pub paddr: u64,
    pub filesz: u64,
    pub memsz: u64,
    pub align: u64,
    /// Section header indices, filled by the containment pass.
    pub sections: Vec<usize>,
}

impl ProgramHeader {
    /// Decode one entry at `offset`.
    ///
    /// The flags word sits right after the type in ELF64 and after `p_memsz`
    /// in ELF32.
    pub fn decode(cursor: &ByteCursor<'_>, offset: usize, class: Class) -> Result<Self> {
        let mut r = FieldReader::new(cursor, offset, class);
        let p_type = SegmentType(r.u32()?);
        let mut ph = match class {
            Class::Elf64 => Self {
                p_type,
                flags: SegmentFlags(r.u32()?),
                offset: r.word()?,
                vaddr: r.word()?,
                paddr: r.word()?,
                filesz: r.word()?,
                memsz: r.word()?,
                ..Self::default()
            },
            Class::Elf32 => Self {
                p_type,
                offset: r.word()?,
                vaddr: r.word()?,
                paddr: r.word()?,
                filesz: r.word()?,
                memsz: r.word()?,
                flags: SegmentFlags(r.u32()?),
                ..Self::default()
            },
        };
        ph.align = r.word()?;
        Ok(ph)
    }

    /// Decode the whole program header table described by `header`.
    pub fn decode_table(cursor: &ByteCursor<'_>, header: &FileHeader) -> Result<Vec<Self>> {
        let count = usize::from(header.phnum);
        let stride = usize::from(header.phentsize);
        (0..count)
            .map(|index| {
                table_entry_offset(header.phoff, index, stride)
                    .and_then(|offset| Self::decode(cursor, offset, header.class).ok())
                    .ok_or(ElfError::ProgramOutOfBounds { index })
            })
            .collect()
    }

    #[must_use]
    pub fn is_load(&self) -> bool {
        self.p_type == SegmentType::LOAD
    }
}

/// File offset of entry `index` in a header table, or `None` on overflow.
pub(crate) fn table_entry_offset(base: u64, index: usize, stride: usize) -> Option<usize> {
    let base = usize::try_from(base).ok()?;
    index.checked_mul(stride)?.checked_add(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Endian;

    #[test]
    fn test_decode_elf32_flags_after_memsz() {
        let mut data = Vec::new();
        for word in [PT_LOAD, 0x100, 0x0800_0000, 0x0800_0000, 0x40, 0x80, PF_R | PF_X, 4] {
            data.extend_from_slice(&word.to_le_bytes());
        }
        let cursor = ByteCursor::new(&data);
        let ph = ProgramHeader::decode(&cursor, 0, Class::Elf32).unwrap();
        assert!(ph.is_load());
        assert_eq!(ph.offset, 0x100);
        assert_eq!(ph.vaddr, 0x0800_0000);
        assert_eq!(ph.filesz, 0x40);
        assert_eq!(ph.memsz, 0x80);
        assert_eq!(ph.flags.to_string(), "R X");
        assert_eq!(ph.align, 4);
    }

    #[test]
    fn test_decode_elf64_flags_second() {
        let mut data = Vec::new();
        data.extend_from_slice(&PT_TLS.to_be_bytes());
        data.extend_from_slice(&(PF_R | PF_W).to_be_bytes());
        for word in [0x2000u64, 0x1_0000, 0x1_0000, 0x10, 0x20, 8] {
            data.extend_from_slice(&word.to_be_bytes());
        }
        let cursor = ByteCursor::with_endian(&data, Endian::Big);
        let ph = ProgramHeader::decode(&cursor, 0, Class::Elf64).unwrap();
        assert_eq!(ph.p_type, SegmentType::TLS);
        assert_eq!(ph.flags.to_string(), "RW ");
        assert_eq!(ph.offset, 0x2000);
        assert_eq!(ph.memsz, 0x20);
        assert_eq!(ph.align, 8);
    }

    #[test]
    fn test_segment_type_names() {
        assert_eq!(SegmentType(PT_GNU_STACK).to_string(), "GNU_STACK");
        assert_eq!(SegmentType(PT_GNU_MBIND_LO + 2).to_string(), "GNU_MBIND+0x2");
        assert!(SegmentType(PT_GNU_MBIND_HI).is_gnu_mbind());
        assert!(!SegmentType(PT_GNU_SFRAME).is_gnu_mbind());
        assert_eq!(SegmentType(0x1234).to_string(), "UNKNOWN");
    }

    #[test]
    fn test_truncated_entry_is_error() {
        let data = [0u8; 20];
        let cursor = ByteCursor::new(&data);
        assert!(ProgramHeader::decode(&cursor, 0, Class::Elf32).is_err());
    }
}
