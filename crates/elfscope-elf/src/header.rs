//! ELF file header.

use std::fmt;

use crate::constants::*;
use crate::cursor::{ByteCursor, FieldReader};
use crate::{ElfError, Result};

/// ELF class (word size).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Class {
    Elf32,
    Elf64,
}

impl Class {
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            ELF_CLASS_32 => Some(Self::Elf32),
            ELF_CLASS_64 => Some(Self::Elf64),
            _ => None,
        }
    }

    /// Width of address and offset fields in bytes.
    #[must_use]
    pub const fn word_size(self) -> usize {
        match self {
            Self::Elf32 => 4,
            Self::Elf64 => 8,
        }
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::Elf32 => 32,
            Self::Elf64 => 64,
        }
    }
}

/// Byte order of all multi-byte fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            ELF_DATA_LSB => Some(Self::Little),
            ELF_DATA_MSB => Some(Self::Big),
            _ => None,
        }
    }
}

impl fmt::Display for Endian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Little => "little endian",
            Self::Big => "big endian",
        })
    }
}

/// Object file type (`e_type`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FileType(pub u16);

impl FileType {
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            ET_NONE => "NONE",
            ET_REL => "REL",
            ET_EXEC => "EXEC",
            ET_DYN => "DYN",
            ET_CORE => "CORE",
            _ => return None,
        })
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "UNKNOWN({:#x})", self.0),
        }
    }
}

/// Target machine (`e_machine`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Machine(pub u16);

impl Machine {
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            EM_NONE => "NONE",
            EM_386 => "386",
            EM_ARM => "ARM",
            EM_X86_64 => "X86_64",
            EM_XTENSA => "XTENSA",
            EM_AARCH64 => "AARCH64",
            EM_RISCV => "RISCV",
            _ => return None,
        })
    }

    #[must_use]
    pub const fn is_arm(self) -> bool {
        self.0 == EM_ARM
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "UNKNOWN({})", self.0),
        }
    }
}

/// ELF file header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileHeader {
    pub class: Class,
    pub endian: Endian,
    pub ident_version: u8,
    pub os_abi: u8,
    pub abi_version: u8,
    pub file_type: FileType,
    pub machine: Machine,
    pub version: u32,
    pub entry: u64,
    pub phoff: u64,
    pub shoff: u64,
    pub flags: u32,
    pub ehsize: u16,
    pub phentsize: u16,
    pub phnum: u16,
    pub shentsize: u16,
    pub shnum: u16,
    pub shstrndx: u16,
}

impl FileHeader {
    /// Decode the file header and switch `cursor` to the file's byte order.
    ///
    /// Fields are read with a running position in the order the format lays
    /// them out; the class decides the width of every address/offset field.
    pub fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        if cursor.len() < MIN_HEADER_SIZE {
            return Err(ElfError::TooSmall {
                len: cursor.len(),
                min: MIN_HEADER_SIZE,
            });
        }

        let magic = [
            cursor.read_u8(0)?,
            cursor.read_u8(1)?,
            cursor.read_u8(2)?,
            cursor.read_u8(3)?,
        ];
        if magic != ELF_MAGIC {
            return Err(ElfError::InvalidMagic);
        }

        let raw_class = cursor.read_u8(4)?;
        let class = Class::from_raw(raw_class).ok_or(ElfError::UnsupportedClass(raw_class))?;
        let raw_data = cursor.read_u8(5)?;
        let endian = Endian::from_raw(raw_data).ok_or(ElfError::UnsupportedEncoding(raw_data))?;
        cursor.set_endian(endian);

        let ident_version = cursor.read_u8(6)?;
        let os_abi = cursor.read_u8(7)?;
        let abi_version = cursor.read_u8(8)?;

        // Padding up to EI_NIDENT is skipped.
        let mut r = FieldReader::new(cursor, EI_NIDENT, class);
        Ok(Self {
            class,
            endian,
            ident_version,
            os_abi,
            abi_version,
            file_type: FileType(r.u16()?),
            machine: Machine(r.u16()?),
            version: r.u32()?,
            entry: r.word()?,
            phoff: r.word()?,
            shoff: r.word()?,
            flags: r.u32()?,
            ehsize: r.u16()?,
            phentsize: r.u16()?,
            phnum: r.u16()?,
            shentsize: r.u16()?,
            shnum: r.u16()?,
            shstrndx: r.u16()?,
        })
    }

    #[must_use]
    pub const fn is_64bit(&self) -> bool {
        matches!(self.class, Class::Elf64)
    }
}
