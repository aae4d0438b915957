//! Section-to-segment mapping.
//!
//! Follows the rules binutils uses for `ELF_SECTION_IN_SEGMENT`. Every rule
//! must hold; the first failing one rejects the section.

use crate::constants::*;
use crate::section::{SectionHeader, SectionType};
use crate::segment::{ProgramHeader, SegmentType};

/// Size a section occupies for containment checks.
///
/// A TLS NOBITS section outside a TLS segment occupies nothing: NOBITS has
/// no file bytes and `.tbss` only takes memory in the TLS template.
#[must_use]
pub fn effective_section_size(section: &SectionHeader, segment: &ProgramHeader) -> u64 {
    if section.flags.is_tls()
        && section.sh_type == SectionType::NOBITS
        && segment.p_type != SegmentType::TLS
    {
        0
    } else {
        section.size
    }
}

/// Whether `section` lies inside `segment`.
///
/// `check_vma` enables the address range check for ALLOC sections. `strict`
/// additionally requires the section start to lie strictly before the end of
/// the segment, which rejects zero-sized segments.
#[must_use]
pub fn is_section_in_segment(
    section: &SectionHeader,
    segment: &ProgramHeader,
    check_vma: bool,
    strict: bool,
) -> bool {
    tls_compatible(section, segment)
        && alloc_compatible(section, segment)
        && file_range_inside(section, segment, strict)
        && (!check_vma || vma_range_inside(section, segment, strict))
        && not_empty_at_dynamic_or_note_edge(section, segment)
}

/// TLS sections only go into TLS, `GNU_RELRO` or LOAD segments. TLS segments
/// hold only TLS sections and PHDR holds no sections at all.
fn tls_compatible(section: &SectionHeader, segment: &ProgramHeader) -> bool {
    let ty = segment.p_type.0;
    if section.flags.is_tls() {
        matches!(ty, PT_TLS | PT_GNU_RELRO | PT_LOAD)
    } else {
        ty != PT_TLS && ty != PT_PHDR
    }
}

/// Loadable and similar segments only hold ALLOC sections.
fn alloc_compatible(section: &SectionHeader, segment: &ProgramHeader) -> bool {
    if section.flags.is_alloc() {
        return true;
    }
    let ty = segment.p_type;
    !(matches!(
        ty.0,
        PT_LOAD | PT_DYNAMIC | PT_GNU_EH_FRAME | PT_GNU_STACK | PT_GNU_RELRO | PT_GNU_SFRAME
    ) || ty.is_gnu_mbind())
}

/// Any section but NOBITS must have its file bytes inside the segment.
fn file_range_inside(section: &SectionHeader, segment: &ProgramHeader, strict: bool) -> bool {
    if section.sh_type == SectionType::NOBITS {
        return true;
    }
    range_inside(
        section.offset,
        segment.offset,
        segment.filesz,
        effective_section_size(section, segment),
        strict,
    )
}

/// ALLOC sections must have their addresses inside the segment.
fn vma_range_inside(section: &SectionHeader, segment: &ProgramHeader, strict: bool) -> bool {
    if !section.flags.is_alloc() {
        return true;
    }
    range_inside(
        section.addr,
        segment.vaddr,
        segment.memsz,
        effective_section_size(section, segment),
        strict,
    )
}

/// `start..start+size` within `base..base+len`. In strict mode `start` must
/// also be at most `len - 1` past `base`, which fails for `len == 0`.
fn range_inside(start: u64, base: u64, len: u64, size: u64, strict: bool) -> bool {
    let Some(delta) = start.checked_sub(base) else {
        return false;
    };
    if strict && len.checked_sub(1).is_none_or(|last| delta > last) {
        return false;
    }
    delta.checked_add(size).is_some_and(|end| end <= len)
}

/// No zero-sized sections at the start or end of DYNAMIC or NOTE segments.
///
/// The offset and address checks here are strict comparisons regardless of
/// the `strict` flag.
fn not_empty_at_dynamic_or_note_edge(section: &SectionHeader, segment: &ProgramHeader) -> bool {
    let ty = segment.p_type.0;
    if (ty != PT_DYNAMIC && ty != PT_NOTE) || section.size != 0 || segment.memsz == 0 {
        return true;
    }
    let file_ok = section.sh_type == SectionType::NOBITS
        || (section.offset > segment.offset && section.offset - segment.offset < segment.filesz);
    let addr_ok = !section.flags.is_alloc()
        || (section.addr > segment.vaddr && section.addr - segment.vaddr < segment.memsz);
    file_ok && addr_ok
}

/// Fill every segment's section index list.
///
/// Section order is preserved, so each list is ascending.
pub fn assign_sections(sections: &[SectionHeader], segments: &mut [ProgramHeader]) {
    for segment in segments.iter_mut() {
        segment.sections = sections
            .iter()
            .enumerate()
            .filter(|(_, section)| is_section_in_segment(section, segment, true, true))
            .map(|(index, _)| index)
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::SectionFlags;
    use crate::segment::SegmentFlags;

    fn segment(p_type: u32, offset: u64, vaddr: u64, filesz: u64, memsz: u64) -> ProgramHeader {
        ProgramHeader {
            p_type: SegmentType(p_type),
            flags: SegmentFlags(PF_R),
            offset,
            vaddr,
            paddr: vaddr,
            filesz,
            memsz,
            align: 4,
            sections: Vec::new(),
        }
    }

    fn section(sh_type: u32, flags: u64, offset: u64, addr: u64, size: u64) -> SectionHeader {
        SectionHeader {
            sh_type: SectionType(sh_type),
            flags: SectionFlags(flags),
            offset,
            addr,
            size,
            ..SectionHeader::default()
        }
    }

    #[test]
    fn test_progbits_inside_load() {
        let load = segment(PT_LOAD, 0x1000, 0x0800_0000, 0x200, 0x200);
        let text = section(SHT_PROGBITS, SHF_ALLOC | SHF_EXECINSTR, 0x1000, 0x0800_0000, 0x200);
        assert!(is_section_in_segment(&text, &load, true, true));

        let spill = section(SHT_PROGBITS, SHF_ALLOC, 0x1100, 0x0800_0100, 0x101);
        assert!(!is_section_in_segment(&spill, &load, true, true));

        let before = section(SHT_PROGBITS, SHF_ALLOC, 0xFFF, 0x0800_0000, 4);
        assert!(!is_section_in_segment(&before, &load, true, true));
    }

    #[test]
    fn test_tls_section_only_in_tls_relro_load() {
        let tdata = section(SHT_PROGBITS, SHF_ALLOC | SHF_WRITE | SHF_TLS, 0x100, 0x2000, 0x10);
        for ty in [PT_TLS, PT_GNU_RELRO, PT_LOAD] {
            let seg = segment(ty, 0x100, 0x2000, 0x10, 0x10);
            assert!(is_section_in_segment(&tdata, &seg, true, true), "type {ty:#x}");
        }
        // Overlap does not matter for any other segment type.
        for ty in [PT_NULL, PT_DYNAMIC, PT_NOTE, PT_PHDR, PT_INTERP, PT_GNU_STACK, PT_ARM_EXIDX] {
            let seg = segment(ty, 0x100, 0x2000, 0x10, 0x10);
            assert!(!is_section_in_segment(&tdata, &seg, true, true), "type {ty:#x}");
            assert!(!is_section_in_segment(&tdata, &seg, false, false), "type {ty:#x}");
        }
    }

    #[test]
    fn test_tls_and_phdr_segments_reject_plain_sections() {
        let data = section(SHT_PROGBITS, SHF_ALLOC | SHF_WRITE, 0x100, 0x2000, 0x10);
        assert!(!is_section_in_segment(&data, &segment(PT_TLS, 0x100, 0x2000, 0x10, 0x10), true, true));
        assert!(!is_section_in_segment(&data, &segment(PT_PHDR, 0x100, 0x2000, 0x10, 0x10), true, true));
    }

    #[test]
    fn test_non_alloc_rejected_by_load_like_segments() {
        let comment = section(SHT_PROGBITS, SHF_MERGE | SHF_STRINGS, 0x100, 0, 0x10);
        for ty in [PT_LOAD, PT_DYNAMIC, PT_GNU_EH_FRAME, PT_GNU_STACK, PT_GNU_RELRO, PT_GNU_SFRAME] {
            let seg = segment(ty, 0x100, 0, 0x10, 0x10);
            assert!(!is_section_in_segment(&comment, &seg, true, true), "type {ty:#x}");
        }
        let mbind = segment(PT_GNU_MBIND_LO + 1, 0x100, 0, 0x10, 0x10);
        assert!(!is_section_in_segment(&comment, &mbind, true, true));

        // A NOTE segment may hold non-ALLOC sections.
        let note = segment(PT_NOTE, 0x100, 0, 0x10, 0x10);
        let note_section = section(SHT_NOTE, 0, 0x100, 0, 0x10);
        assert!(is_section_in_segment(&note_section, &note, true, true));
    }

    #[test]
    fn test_nobits_ignores_file_range() {
        let load = segment(PT_LOAD, 0x1000, 0x2000_0000, 0x10, 0x100);
        let bss = section(SHT_NOBITS, SHF_ALLOC | SHF_WRITE, 0x9999, 0x2000_0010, 0xF0);
        assert!(is_section_in_segment(&bss, &load, true, true));
        let too_big = section(SHT_NOBITS, SHF_ALLOC | SHF_WRITE, 0x9999, 0x2000_0010, 0xF1);
        assert!(!is_section_in_segment(&too_big, &load, true, true));
        assert!(is_section_in_segment(&too_big, &load, false, true));
    }

    #[test]
    fn test_tbss_has_no_size_outside_tls_segment() {
        let tbss = section(SHT_NOBITS, SHF_ALLOC | SHF_WRITE | SHF_TLS, 0x200, 0x2000_0100, 0x40);
        let load = segment(PT_LOAD, 0x0, 0x2000_0000, 0x200, 0x100);
        let tls = segment(PT_TLS, 0x200, 0x2000_0100, 0, 0x20);
        assert_eq!(effective_section_size(&tbss, &load), 0);
        assert_eq!(effective_section_size(&tbss, &tls), 0x40);
        // Starts exactly at the end of the LOAD memory window: strict rejects.
        assert!(!is_section_in_segment(&tbss, &load, true, true));
        assert!(is_section_in_segment(&tbss, &load, true, false));
        // Too large for the TLS template.
        assert!(!is_section_in_segment(&tbss, &tls, true, true));
    }

    #[test]
    fn test_strict_rejects_start_at_segment_end() {
        let load = segment(PT_LOAD, 0x100, 0x1000, 0x10, 0x10);
        let empty_at_end = section(SHT_PROGBITS, SHF_ALLOC, 0x110, 0x1010, 0);
        assert!(!is_section_in_segment(&empty_at_end, &load, true, true));
        assert!(is_section_in_segment(&empty_at_end, &load, true, false));
    }

    #[test]
    fn test_zero_sized_segment_strict() {
        let empty = segment(PT_LOAD, 0x100, 0x1000, 0, 0);
        let s = section(SHT_PROGBITS, SHF_ALLOC, 0x100, 0x1000, 0);
        assert!(!is_section_in_segment(&s, &empty, true, true));
        assert!(is_section_in_segment(&s, &empty, true, false));
    }

    #[test]
    fn test_vma_check_can_be_disabled() {
        let load = segment(PT_LOAD, 0x100, 0x1000, 0x10, 0x10);
        let elsewhere = section(SHT_PROGBITS, SHF_ALLOC, 0x100, 0x9000, 0x10);
        assert!(!is_section_in_segment(&elsewhere, &load, true, true));
        assert!(is_section_in_segment(&elsewhere, &load, false, true));
    }

    #[test]
    fn test_overflowing_ranges_are_rejected() {
        let load = segment(PT_LOAD, 0, 0, u64::MAX, u64::MAX);
        let s = section(SHT_PROGBITS, SHF_ALLOC, u64::MAX - 1, u64::MAX - 1, 4);
        assert!(!is_section_in_segment(&s, &load, true, true));
    }

    // Zero-sized sections at DYNAMIC/NOTE edges. These pin the current
    // behaviour, which mixes strict offset and address comparisons.

    #[test]
    fn test_empty_section_at_dynamic_start_rejected() {
        let dynamic = segment(PT_DYNAMIC, 0x100, 0x1000, 0x40, 0x40);
        let at_start = section(SHT_PROGBITS, SHF_ALLOC, 0x100, 0x1000, 0);
        assert!(!is_section_in_segment(&at_start, &dynamic, true, true));
        assert!(!is_section_in_segment(&at_start, &dynamic, false, false));
    }

    #[test]
    fn test_empty_section_inside_dynamic_accepted() {
        let dynamic = segment(PT_DYNAMIC, 0x100, 0x1000, 0x40, 0x40);
        let inside = section(SHT_PROGBITS, SHF_ALLOC, 0x120, 0x1020, 0);
        assert!(is_section_in_segment(&inside, &dynamic, true, true));
    }

    #[test]
    fn test_empty_section_address_checked_even_without_vma() {
        let dynamic = segment(PT_DYNAMIC, 0x100, 0x1000, 0x40, 0x40);
        // File offset inside, address at the segment start.
        let s = section(SHT_PROGBITS, SHF_ALLOC, 0x120, 0x1000, 0);
        assert!(!is_section_in_segment(&s, &dynamic, false, true));
        // Non-ALLOC sections skip the address part.
        let note = segment(PT_NOTE, 0x100, 0x1000, 0x40, 0x40);
        let s = section(SHT_NOTE, 0, 0x120, 0x1000, 0);
        assert!(is_section_in_segment(&s, &note, true, true));
    }

    #[test]
    fn test_empty_nobits_in_note_uses_address_only() {
        let note = segment(PT_NOTE, 0x100, 0x1000, 0x40, 0x40);
        let bss = section(SHT_NOBITS, SHF_ALLOC, 0, 0x1010, 0);
        assert!(is_section_in_segment(&bss, &note, true, true));
        let at_start = section(SHT_NOBITS, SHF_ALLOC, 0, 0x1000, 0);
        assert!(!is_section_in_segment(&at_start, &note, true, true));
    }

    #[test]
    fn test_empty_section_in_zero_memsz_dynamic_skips_edge_rule() {
        let s = section(SHT_PROGBITS, SHF_ALLOC, 0x100, 0x1000, 0);
        let dynamic = segment(PT_DYNAMIC, 0x100, 0x1000, 0x40, 0);
        assert!(is_section_in_segment(&s, &dynamic, false, true));
        // Same placement with memory is rejected by the edge rule.
        let dynamic = segment(PT_DYNAMIC, 0x100, 0x1000, 0x40, 0x40);
        assert!(!is_section_in_segment(&s, &dynamic, false, true));
    }

    #[test]
    fn test_assign_sections_preserves_order() {
        let sections = vec![
            SectionHeader::default(),
            section(SHT_PROGBITS, SHF_ALLOC | SHF_EXECINSTR, 0x100, 0x1000, 0x20),
            section(SHT_PROGBITS, SHF_ALLOC, 0x120, 0x1020, 0x10),
            section(SHT_NOBITS, SHF_ALLOC | SHF_WRITE, 0x130, 0x2000, 0x40),
            section(SHT_PROGBITS, 0, 0x200, 0, 0x10),
        ];
        let mut segments = vec![
            segment(PT_LOAD, 0x100, 0x1000, 0x30, 0x30),
            segment(PT_LOAD, 0x130, 0x2000, 0, 0x40),
        ];
        assign_sections(&sections, &mut segments);
        assert_eq!(segments[0].sections, vec![1, 2]);
        assert_eq!(segments[1].sections, vec![3]);
    }
}
