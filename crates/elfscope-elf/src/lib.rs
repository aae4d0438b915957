//! ELF decoder for embedded ARM and RISC-V binaries.
//!
//! Decodes the file header, the segment and section tables, symbol tables and
//! the ARM EABI build attributes from an in-memory byte buffer. Both ELF
//! classes and both byte orders are supported.

pub mod attributes;
mod comment;
mod constants;
pub mod containment;
mod cursor;
mod file;
mod header;
pub mod leb128;
mod section;
mod segment;
mod symbol;

pub use attributes::{ArchProfile, ArmAttributes, Compatibility, CpuArch};
pub use comment::{Compiler, CommentInfo};
pub use constants::*;
pub use containment::is_section_in_segment;
pub use cursor::{ByteCursor, FieldReader};
pub use file::*;
pub use header::*;
pub use section::*;
pub use segment::*;
pub use symbol::*;

use thiserror::Error;

/// ELF decoding errors.
///
/// Every variant is fatal for the file being decoded: once raised, offsets
/// for later tables can no longer be trusted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ElfError {
    #[error("ELF data too small: {len} bytes, need at least {min}")]
    TooSmall { len: usize, min: usize },
    #[error("Invalid ELF magic number")]
    InvalidMagic,
    #[error("Unsupported ELF class: {0}")]
    UnsupportedClass(u8),
    #[error("Unsupported ELF data encoding: {0}")]
    UnsupportedEncoding(u8),
    #[error("Read of {width} bytes at offset {offset:#x} is outside the {len}-byte buffer")]
    OutOfBounds {
        offset: usize,
        width: usize,
        len: usize,
    },
    #[error("Program header {index} out of bounds")]
    ProgramOutOfBounds { index: usize },
    #[error("Section header {index} out of bounds")]
    SectionOutOfBounds { index: usize },
}

pub type Result<T> = std::result::Result<T, ElfError>;
