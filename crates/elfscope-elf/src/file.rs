//! ELF file parser.

use tracing::{debug, warn};

use crate::attributes::ArmAttributes;
use crate::comment::CommentInfo;
use crate::containment::assign_sections;
use crate::cursor::ByteCursor;
use crate::header::FileHeader;
use crate::section::{SectionHeader, SectionType};
use crate::segment::ProgramHeader;
use crate::symbol::{Symbol, SymbolTable, section_name_for_index};
use crate::Result;

/// Parsed ELF file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElfFile {
    pub header: FileHeader,
    /// Segments, each with the indices of the sections it contains.
    pub program_headers: Vec<ProgramHeader>,
    pub sections: Vec<SectionHeader>,
    /// Every `SHT_SYMTAB` and `SHT_DYNSYM` table, in section order.
    pub symbol_tables: Vec<SymbolTable>,
    /// Build attributes, only for ARM objects carrying `.ARM.attributes`.
    pub arm_attributes: Option<ArmAttributes>,
    pub comment: Option<CommentInfo>,
}

impl ElfFile {
    /// Parse an ELF file from raw bytes.
    ///
    /// Header and table errors are fatal; problems confined to a single
    /// symbol table, attribute section or name are logged and skipped.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(data);
        let header = FileHeader::decode(&mut cursor)?;
        debug!(
            class = header.class.bits(),
            endian = %header.endian,
            machine = %header.machine,
            phnum = header.phnum,
            shnum = header.shnum,
            "decoded file header"
        );

        let mut program_headers = ProgramHeader::decode_table(&cursor, &header)?;
        let sections = SectionHeader::decode_table(&cursor, &header)?;
        assign_sections(&sections, &mut program_headers);

        let symbol_tables = sections
            .iter()
            .enumerate()
            .filter(|(_, s)| s.sh_type.is_symbol_table())
            .map(|(index, _)| SymbolTable::decode(&cursor, header.class, &sections, index))
            .collect();

        let arm_attributes = if header.machine.is_arm() {
            Self::parse_arm_attributes(data, &header, &sections)
        } else {
            None
        };

        let comment = sections
            .iter()
            .find(|s| s.name == ".comment")
            .and_then(|s| s.data(data))
            .map(CommentInfo::parse);
        if comment.is_none() {
            debug!(".comment section not found");
        }

        Ok(Self {
            header,
            program_headers,
            sections,
            symbol_tables,
            arm_attributes,
            comment,
        })
    }

    fn parse_arm_attributes(
        data: &[u8],
        header: &FileHeader,
        sections: &[SectionHeader],
    ) -> Option<ArmAttributes> {
        let section = sections
            .iter()
            .find(|s| s.sh_type == SectionType::ARM_ATTRIBUTES)?;
        let Some(bytes) = section.data(data) else {
            warn!(section = %section.name, "attribute section outside file");
            return None;
        };
        ArmAttributes::parse(bytes, header.endian)
    }

    /// Section name for a section index, with readelf's names for the
    /// reserved indices.
    #[must_use]
    pub fn section_name(&self, index: u16) -> Option<String> {
        section_name_for_index(&self.sections, index)
    }

    #[must_use]
    pub fn find_section(&self, name: &str) -> Option<&SectionHeader> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// All symbols across all symbol tables, in load order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbol_tables.iter().flat_map(|t| t.symbols.iter())
    }

    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.symbol_tables.iter().map(SymbolTable::len).sum()
    }
}
