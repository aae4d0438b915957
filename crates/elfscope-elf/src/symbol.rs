//! Symbol table decoding.

use std::fmt;

use tracing::warn;

use crate::constants::*;
use crate::cursor::{ByteCursor, FieldReader};
use crate::header::Class;
use crate::section::SectionHeader;
use crate::segment::table_entry_offset;
use crate::Result;

/// Symbol type, the low nibble of `st_info`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SymbolType(pub u8);

impl SymbolType {
    pub const NOTYPE: Self = Self(STT_NOTYPE);
    pub const OBJECT: Self = Self(STT_OBJECT);
    pub const FUNC: Self = Self(STT_FUNC);
    pub const SECTION: Self = Self(STT_SECTION);
    pub const FILE: Self = Self(STT_FILE);

    #[must_use]
    pub const fn from_info(info: u8) -> Self {
        Self(info & 0x0F)
    }

    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            STT_NOTYPE => "NOTYPE",
            STT_OBJECT => "OBJECT",
            STT_FUNC => "FUNC",
            STT_SECTION => "SECTION",
            STT_FILE => "FILE",
            STT_COMMON => "COMMON",
            STT_TLS => "TLS",
            _ => return None,
        })
    }
}

/// Symbol binding, the high nibble of `st_info`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SymbolBinding(pub u8);

impl SymbolBinding {
    pub const LOCAL: Self = Self(STB_LOCAL);
    pub const GLOBAL: Self = Self(STB_GLOBAL);
    pub const WEAK: Self = Self(STB_WEAK);

    #[must_use]
    pub const fn from_info(info: u8) -> Self {
        Self(info >> 4)
    }

    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            STB_LOCAL => "LOCAL",
            STB_GLOBAL => "GLOBAL",
            STB_WEAK => "WEAK",
            _ => return None,
        })
    }
}

/// Symbol visibility, the low two bits of `st_other`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SymbolVisibility(pub u8);

impl SymbolVisibility {
    #[must_use]
    pub const fn from_other(other: u8) -> Self {
        Self(other & 0x03)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self.0 {
            STV_DEFAULT => "DEFAULT",
            STV_INTERNAL => "INTERNAL",
            STV_HIDDEN => "HIDDEN",
            STV_PROTECTED => "PROTECTED",
            _ => "UNKNOWN",
        }
    }
}

macro_rules! display_by_name {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.name() {
                    Some(name) => f.write_str(name),
                    None => write!(f, "UNKNOWN({})", self.0),
                }
            }
        }
    )*};
}

display_by_name!(SymbolType, SymbolBinding);

impl fmt::Display for SymbolVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded symbol table entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Symbol {
    /// Index within its symbol table.
    pub index: usize,
    pub name_offset: u32,
    pub name: String,
    pub info: u8,
    pub other: u8,
    pub sym_type: SymbolType,
    pub binding: SymbolBinding,
    pub visibility: SymbolVisibility,
    pub shndx: u16,
    pub value: u64,
    pub size: u64,
    /// Name of the owning section, `UND`/`ABS`/`COM` for reserved indices.
    pub section_name: Option<String>,
}

impl Symbol {
    /// Decode the raw fields of one entry at `offset`.
    ///
    /// ELF64 groups `st_info`, `st_other` and `st_shndx` right after the
    /// name; ELF32 puts them after `st_value` and `st_size`.
    pub fn decode(cursor: &ByteCursor<'_>, offset: usize, class: Class) -> Result<Self> {
        let mut r = FieldReader::new(cursor, offset, class);
        let name_offset = r.u32()?;
        let (info, other, shndx, value, size) = match class {
            Class::Elf64 => {
                let info = r.u8()?;
                let other = r.u8()?;
                let shndx = r.u16()?;
                (info, other, shndx, r.word()?, r.word()?)
            }
            Class::Elf32 => {
                let value = r.word()?;
                let size = r.word()?;
                (r.u8()?, r.u8()?, r.u16()?, value, size)
            }
        };
        Ok(Self {
            name_offset,
            info,
            other,
            sym_type: SymbolType::from_info(info),
            binding: SymbolBinding::from_info(info),
            visibility: SymbolVisibility::from_other(other),
            shndx,
            value,
            size,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn is_function(&self) -> bool {
        self.sym_type == SymbolType::FUNC
    }

    #[must_use]
    pub const fn is_absolute(&self) -> bool {
        self.shndx == SHN_ABS
    }
}

/// Resolve the section name for a symbol's section index.
///
/// Mirrors readelf: `UND` for undefined, the section's name for an existing
/// index, `ABS`/`COM` for those reserved indices, `None` otherwise.
#[must_use]
pub fn section_name_for_index(sections: &[SectionHeader], shndx: u16) -> Option<String> {
    if shndx == SHN_UNDEF {
        return Some("UND".to_string());
    }
    if let Some(section) = sections.get(usize::from(shndx)) {
        return Some(section.name.clone());
    }
    match shndx {
        SHN_ABS => Some("ABS".to_string()),
        SHN_COMMON => Some("COM".to_string()),
        _ => None,
    }
}

/// One decoded `SHT_SYMTAB` or `SHT_DYNSYM` section.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SymbolTable {
    /// Section header index of the table.
    pub section_index: usize,
    pub name: String,
    pub symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// Decode the symbol table stored in `sections[section_index]`.
    ///
    /// Problems confined to this table are logged and yield a partial or
    /// empty table rather than an error.
    #[must_use]
    pub fn decode(
        cursor: &ByteCursor<'_>,
        class: Class,
        sections: &[SectionHeader],
        section_index: usize,
    ) -> Self {
        let mut table = Self {
            section_index,
            ..Self::default()
        };
        let Some(section) = sections.get(section_index) else {
            return table;
        };
        table.name.clone_from(&section.name);

        if section.entsize == 0 {
            warn!(section = %section.name, "symbol table has zero entry size, skipped");
            return table;
        }
        let count = usize::try_from(section.size / section.entsize).unwrap_or(0);
        let stride = usize::try_from(section.entsize).unwrap_or(usize::MAX);
        let strtab = sections.get(section.link as usize);
        if strtab.is_none() {
            warn!(section = %section.name, link = section.link, "symbol string table missing");
        }

        table.symbols.reserve(count.min(cursor.len() / stride));
        for index in 0..count {
            let decoded = table_entry_offset(section.offset, index, stride)
                .map(|offset| Symbol::decode(cursor, offset, class));
            let mut symbol = match decoded {
                Some(Ok(symbol)) => symbol,
                Some(Err(e)) => {
                    warn!(section = %section.name, index, error = %e, "symbol table truncated");
                    break;
                }
                None => {
                    warn!(section = %section.name, index, "symbol offset overflows");
                    break;
                }
            };
            symbol.index = index;
            if let Some(strtab) = strtab.filter(|_| symbol.name_offset != 0) {
                symbol.name = strtab.string_at(cursor, symbol.name_offset);
            }
            symbol.section_name = section_name_for_index(sections, symbol.shndx);
            if symbol.section_name.is_none() && symbol.shndx < SHN_LORESERVE {
                warn!(
                    symbol = %symbol.name,
                    shndx = symbol.shndx,
                    "symbol refers to a missing section"
                );
            }
            if symbol.sym_type == SymbolType::SECTION && symbol.name.is_empty() {
                if let Some(owner) = sections.get(usize::from(symbol.shndx)) {
                    symbol.name.clone_from(&owner.name);
                }
            }
            table.symbols.push(symbol);
        }
        table
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
