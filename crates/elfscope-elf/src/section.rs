//! Section header decoding and name resolution.

use std::fmt;

use tracing::warn;

use crate::constants::*;
use crate::cursor::{ByteCursor, FieldReader};
use crate::header::{Class, FileHeader};
use crate::segment::table_entry_offset;
use crate::{ElfError, Result};

/// Section type (`sh_type`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SectionType(pub u32);

impl SectionType {
    pub const NULL: Self = Self(SHT_NULL);
    pub const PROGBITS: Self = Self(SHT_PROGBITS);
    pub const SYMTAB: Self = Self(SHT_SYMTAB);
    pub const STRTAB: Self = Self(SHT_STRTAB);
    pub const NOBITS: Self = Self(SHT_NOBITS);
    pub const DYNSYM: Self = Self(SHT_DYNSYM);
    pub const ARM_ATTRIBUTES: Self = Self(SHT_ARM_ATTRIBUTES);

    /// Name with the `SHT_` prefix stripped.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            SHT_NULL => "NULL",
            SHT_PROGBITS => "PROGBITS",
            SHT_SYMTAB => "SYMTAB",
            SHT_STRTAB => "STRTAB",
            SHT_RELA => "RELA",
            SHT_HASH => "HASH",
            SHT_DYNAMIC => "DYNAMIC",
            SHT_NOTE => "NOTE",
            SHT_NOBITS => "NOBITS",
            SHT_REL => "REL",
            SHT_SHLIB => "SHLIB",
            SHT_DYNSYM => "DYNSYM",
            SHT_INIT_ARRAY => "INIT_ARRAY",
            SHT_FINI_ARRAY => "FINI_ARRAY",
            SHT_PREINIT_ARRAY => "PREINIT_ARRAY",
            SHT_GROUP => "GROUP",
            SHT_SYMTAB_SHNDX => "SYMTAB_SHNDX",
            SHT_RELR => "RELR",
            SHT_GNU_ATTRIBUTES => "GNU_ATTRIBUTES",
            SHT_GNU_HASH => "GNU_HASH",
            SHT_GNU_LIBLIST => "GNU_LIBLIST",
            SHT_GNU_VERDEF => "GNU_VERDEF",
            SHT_GNU_VERNEED => "GNU_VERNEED",
            SHT_GNU_VERSYM => "GNU_VERSYM",
            SHT_ARM_EXIDX => "ARM_EXIDX",
            SHT_ARM_PREEMPTMAP => "ARM_PREEMPTMAP",
            SHT_ARM_ATTRIBUTES => "ARM_ATTRIBUTES",
            SHT_ARM_DEBUGOVERLAY => "ARM_DEBUGOVERLAY",
            SHT_ARM_OVERLAYSECTION => "ARM_OVERLAYSECTION",
            _ => return None,
        })
    }

    #[must_use]
    pub fn is_symbol_table(self) -> bool {
        self == Self::SYMTAB || self == Self::DYNSYM
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().unwrap_or("UNKNOWN"))
    }
}

const FLAG_NAMES: [(u64, &str); 12] = [
    (SHF_WRITE, "WRITE"),
    (SHF_ALLOC, "ALLOC"),
    (SHF_EXECINSTR, "EXECINSTR"),
    (SHF_MERGE, "MERGE"),
    (SHF_STRINGS, "STRINGS"),
    (SHF_INFO_LINK, "INFO_LINK"),
    (SHF_LINK_ORDER, "LINK_ORDER"),
    (SHF_OS_NONCONFORMING, "OS_NONCONFORMING"),
    (SHF_GROUP, "GROUP"),
    (SHF_TLS, "TLS"),
    (SHF_ORDERED, "ORDERED"),
    (SHF_EXCLUDE, "EXCLUDE"),
];

/// Section attribute flags (`sh_flags`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SectionFlags(pub u64);

impl SectionFlags {
    #[must_use]
    pub const fn contains(self, flag: u64) -> bool {
        self.0 & flag != 0
    }

    #[must_use]
    pub const fn is_alloc(self) -> bool {
        self.contains(SHF_ALLOC)
    }

    #[must_use]
    pub const fn is_tls(self) -> bool {
        self.contains(SHF_TLS)
    }
}

impl fmt::Display for SectionFlags {
    /// Known flag names joined with `|`; leftover bits are shown in hex.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rest = self.0;
        let mut first = true;
        for (bit, name) in FLAG_NAMES {
            if rest & bit != 0 {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                rest &= !bit;
                first = false;
            }
        }
        if rest != 0 {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{rest:#x}")?;
        }
        Ok(())
    }
}

/// Decoded section header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SectionHeader {
    /// Offset of the name in the section name string table.
    pub name_offset: u32,
    /// Resolved name; empty when it could not be resolved.
    pub name: String,
    pub sh_type: SectionType,
    pub flags: SectionFlags,
    pub addr: u64,
    pub offset: u64,
    pub size: u64,
    pub link: u32,
    pub info: u32,
    pub addralign: u64,
    pub entsize: u64,
}

impl SectionHeader {
    /// Decode one entry at `offset`. The name is left unresolved.
    pub fn decode(cursor: &ByteCursor<'_>, offset: usize, class: Class) -> Result<Self> {
        let mut r = FieldReader::new(cursor, offset, class);
        Ok(Self {
            name_offset: r.u32()?,
            name: String::new(),
            sh_type: SectionType(r.u32()?),
            flags: SectionFlags(r.word()?),
            addr: r.word()?,
            offset: r.word()?,
            size: r.word()?,
            link: r.u32()?,
            info: r.u32()?,
            addralign: r.word()?,
            entsize: r.word()?,
        })
    }

    /// Decode the section header table and resolve every section name
    /// through the section at `e_shstrndx`.
    pub fn decode_table(cursor: &ByteCursor<'_>, header: &FileHeader) -> Result<Vec<Self>> {
        let count = usize::from(header.shnum);
        let stride = usize::from(header.shentsize);
        let mut sections = (0..count)
            .map(|index| {
                table_entry_offset(header.shoff, index, stride)
                    .and_then(|offset| Self::decode(cursor, offset, header.class).ok())
                    .ok_or(ElfError::SectionOutOfBounds { index })
            })
            .collect::<Result<Vec<_>>>()?;

        for (index, section) in sections.iter().enumerate() {
            if section.sh_type.name().is_none() {
                warn!(
                    index,
                    sh_type = format_args!("{:#x}", section.sh_type.0),
                    "unknown section type"
                );
            }
        }

        let Some(strtab) = sections.get(usize::from(header.shstrndx)).cloned() else {
            if count > 0 {
                warn!(shstrndx = header.shstrndx, "section name string table missing");
            }
            return Ok(sections);
        };
        for section in &mut sections {
            section.name = strtab.string_at(cursor, section.name_offset);
        }
        Ok(sections)
    }

    /// Read the string at `index` in this string table section.
    ///
    /// Reads are bounded by the section size, never by the end of the file.
    /// Offsets outside the table give an empty string.
    #[must_use]
    pub fn string_at(&self, cursor: &ByteCursor<'_>, index: u32) -> String {
        let index = u64::from(index);
        if index >= self.size {
            return String::new();
        }
        let Some(start) = self
            .offset
            .checked_add(index)
            .and_then(|start| usize::try_from(start).ok())
        else {
            return String::new();
        };
        let max_len = usize::try_from(self.size - index).unwrap_or(usize::MAX);
        cursor.read_cstr(start, max_len).unwrap_or_else(|e| {
            warn!(section = %self.name, index, error = %e, "string outside file");
            String::new()
        })
    }

    /// Raw contents of the section, or `None` for NOBITS and out-of-file
    /// ranges.
    #[must_use]
    pub fn data<'a>(&self, bytes: &'a [u8]) -> Option<&'a [u8]> {
        if self.sh_type == SectionType::NOBITS {
            return None;
        }
        let start = usize::try_from(self.offset).ok()?;
        let len = usize::try_from(self.size).ok()?;
        bytes.get(start..start.checked_add(len)?)
    }

    #[must_use]
    pub const fn is_nobits(&self) -> bool {
        self.sh_type.0 == SHT_NOBITS
    }
}
