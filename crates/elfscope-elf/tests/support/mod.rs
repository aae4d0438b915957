//! In-memory ELF image builder for tests.
//!
//! Lays out: file header, program header table, section contents, then the
//! section header table. `.symtab`, `.strtab` and `.shstrtab` are appended
//! automatically after the user sections.

#![allow(dead_code)]

use elfscope_elf::{
    Class, Endian, ELF_MAGIC, EM_ARM, ET_EXEC, SHN_ABS, SHN_COMMON, SHN_UNDEF, SHT_NOBITS,
    SHT_PROGBITS, SHT_STRTAB, SHT_SYMTAB,
};

pub struct SectionSpec {
    pub name: String,
    pub sh_type: u32,
    pub flags: u64,
    pub addr: u64,
    pub data: Vec<u8>,
    pub nobits_size: u64,
    pub link: u32,
    pub info: u32,
    pub align: u64,
    pub entsize: u64,
}

impl SectionSpec {
    pub fn new(name: &str, sh_type: u32) -> Self {
        Self {
            name: name.to_string(),
            sh_type,
            flags: 0,
            addr: 0,
            data: Vec::new(),
            nobits_size: 0,
            link: 0,
            info: 0,
            align: 1,
            entsize: 0,
        }
    }
}

struct SegmentSpec {
    p_type: u32,
    flags: u32,
    first: String,
    last: String,
}

pub enum Shndx {
    Undef,
    Abs,
    Common,
    Section(String),
}

struct SymbolSpec {
    name: String,
    value: u64,
    size: u64,
    info: u8,
    other: u8,
    shndx: Shndx,
}

pub struct ElfBuilder {
    class: Class,
    endian: Endian,
    machine: u16,
    entry: u64,
    sections: Vec<SectionSpec>,
    segments: Vec<SegmentSpec>,
    symbols: Vec<SymbolSpec>,
}

struct Writer {
    class: Class,
    endian: Endian,
    buf: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        match self.endian {
            Endian::Little => self.buf.extend_from_slice(&v.to_le_bytes()),
            Endian::Big => self.buf.extend_from_slice(&v.to_be_bytes()),
        }
    }

    fn u32(&mut self, v: u32) {
        match self.endian {
            Endian::Little => self.buf.extend_from_slice(&v.to_le_bytes()),
            Endian::Big => self.buf.extend_from_slice(&v.to_be_bytes()),
        }
    }

    fn u64(&mut self, v: u64) {
        match self.endian {
            Endian::Little => self.buf.extend_from_slice(&v.to_le_bytes()),
            Endian::Big => self.buf.extend_from_slice(&v.to_be_bytes()),
        }
    }

    fn word(&mut self, v: u64) {
        match self.class {
            Class::Elf32 => self.u32(u32::try_from(v).unwrap()),
            Class::Elf64 => self.u64(v),
        }
    }

    fn align(&mut self, align: u64) {
        let align = usize::try_from(align.max(1)).unwrap();
        while self.buf.len() % align != 0 {
            self.buf.push(0);
        }
    }
}

/// NUL-separated string table; returns the table and each string's offset.
fn string_table<'a>(names: impl Iterator<Item = &'a str>) -> (Vec<u8>, Vec<u32>) {
    let mut table = vec![0u8];
    let mut offsets = Vec::new();
    for name in names {
        if name.is_empty() {
            offsets.push(0);
            continue;
        }
        offsets.push(u32::try_from(table.len()).unwrap());
        table.extend_from_slice(name.as_bytes());
        table.push(0);
    }
    (table, offsets)
}

struct Placed {
    offset: u64,
    size: u64,
}

impl ElfBuilder {
    pub fn new(class: Class, endian: Endian) -> Self {
        Self {
            class,
            endian,
            machine: EM_ARM,
            entry: 0,
            sections: Vec::new(),
            segments: Vec::new(),
            symbols: Vec::new(),
        }
    }

    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    pub fn entry(mut self, entry: u64) -> Self {
        self.entry = entry;
        self
    }

    pub fn section(mut self, spec: SectionSpec) -> Self {
        self.sections.push(spec);
        self
    }

    pub fn progbits(self, name: &str, flags: u64, addr: u64, data: &[u8]) -> Self {
        let mut spec = SectionSpec::new(name, SHT_PROGBITS);
        spec.flags = flags;
        spec.addr = addr;
        spec.data = data.to_vec();
        spec.align = 4;
        self.section(spec)
    }

    pub fn nobits(self, name: &str, flags: u64, addr: u64, size: u64) -> Self {
        let mut spec = SectionSpec::new(name, SHT_NOBITS);
        spec.flags = flags;
        spec.addr = addr;
        spec.nobits_size = size;
        spec.align = 4;
        self.section(spec)
    }

    /// Segment spanning the sections `first..=last` (by name).
    pub fn segment(mut self, p_type: u32, flags: u32, first: &str, last: &str) -> Self {
        self.segments.push(SegmentSpec {
            p_type,
            flags,
            first: first.to_string(),
            last: last.to_string(),
        });
        self
    }

    pub fn symbol(
        mut self,
        name: &str,
        value: u64,
        size: u64,
        sym_type: u8,
        bind: u8,
        shndx: Shndx,
    ) -> Self {
        self.symbols.push(SymbolSpec {
            name: name.to_string(),
            value,
            size,
            info: (bind << 4) | (sym_type & 0x0F),
            other: 0,
            shndx,
        });
        self
    }

    fn section_index(&self, name: &str) -> u16 {
        let pos = self
            .sections
            .iter()
            .position(|s| s.name == name)
            .unwrap_or_else(|| panic!("no section named {name}"));
        u16::try_from(pos + 1).unwrap()
    }

    fn symtab_data(&self, strtab_offsets: &[u32]) -> Vec<u8> {
        let mut w = Writer {
            class: self.class,
            endian: self.endian,
            buf: Vec::new(),
        };
        // Null symbol first.
        let null = SymbolSpec {
            name: String::new(),
            value: 0,
            size: 0,
            info: 0,
            other: 0,
            shndx: Shndx::Undef,
        };
        for (i, sym) in std::iter::once(&null).chain(&self.symbols).enumerate() {
            let name = if i == 0 { 0 } else { strtab_offsets[i - 1] };
            let shndx = match &sym.shndx {
                Shndx::Undef => SHN_UNDEF,
                Shndx::Abs => SHN_ABS,
                Shndx::Common => SHN_COMMON,
                Shndx::Section(s) => self.section_index(s),
            };
            w.u32(name);
            match self.class {
                Class::Elf32 => {
                    w.word(sym.value);
                    w.word(sym.size);
                    w.u8(sym.info);
                    w.u8(sym.other);
                    w.u16(shndx);
                }
                Class::Elf64 => {
                    w.u8(sym.info);
                    w.u8(sym.other);
                    w.u16(shndx);
                    w.word(sym.value);
                    w.word(sym.size);
                }
            }
        }
        w.buf
    }

    pub fn build(&self) -> Vec<u8> {
        let is64 = self.class == Class::Elf64;
        let (ehsize, phentsize, shentsize, symsize) =
            if is64 { (64, 56, 64, 24) } else { (52, 32, 40, 16) };

        let mut all: Vec<SectionSpec> = self
            .sections
            .iter()
            .map(|s| SectionSpec {
                name: s.name.clone(),
                data: s.data.clone(),
                ..*s
            })
            .collect();
        if !self.symbols.is_empty() {
            let (strtab, offsets) = string_table(self.symbols.iter().map(|s| s.name.as_str()));
            let strtab_index = u32::try_from(all.len() + 2).unwrap();
            let mut symtab = SectionSpec::new(".symtab", SHT_SYMTAB);
            symtab.data = self.symtab_data(&offsets);
            symtab.link = strtab_index;
            symtab.info = 1;
            symtab.align = 4;
            symtab.entsize = symsize;
            all.push(symtab);
            let mut strtab_spec = SectionSpec::new(".strtab", SHT_STRTAB);
            strtab_spec.data = strtab;
            all.push(strtab_spec);
        }
        let shstrtab_names: Vec<&str> = all
            .iter()
            .map(|s| s.name.as_str())
            .chain(std::iter::once(".shstrtab"))
            .collect();
        let (shstrtab, name_offsets) = string_table(shstrtab_names.into_iter());
        let mut shstrtab_spec = SectionSpec::new(".shstrtab", SHT_STRTAB);
        shstrtab_spec.data = shstrtab;
        all.push(shstrtab_spec);

        let mut w = Writer {
            class: self.class,
            endian: self.endian,
            buf: vec![0u8; ehsize + self.segments.len() * phentsize],
        };

        let mut placed = Vec::with_capacity(all.len());
        for spec in &all {
            w.align(spec.align);
            let offset = w.buf.len() as u64;
            if spec.sh_type == SHT_NOBITS {
                placed.push(Placed {
                    offset,
                    size: spec.nobits_size,
                });
            } else {
                w.buf.extend_from_slice(&spec.data);
                placed.push(Placed {
                    offset,
                    size: spec.data.len() as u64,
                });
            }
        }

        w.align(8);
        let shoff = w.buf.len() as u64;
        // Null section header.
        w.buf.resize(w.buf.len() + shentsize, 0);
        for ((spec, place), name) in all.iter().zip(&placed).zip(&name_offsets) {
            w.u32(*name);
            w.u32(spec.sh_type);
            w.word(spec.flags);
            w.word(spec.addr);
            w.word(place.offset);
            w.word(place.size);
            w.u32(spec.link);
            w.u32(spec.info);
            w.word(spec.align);
            w.word(spec.entsize);
        }
        let shnum = u16::try_from(all.len() + 1).unwrap();

        let mut ph = Writer {
            class: self.class,
            endian: self.endian,
            buf: Vec::new(),
        };
        for seg in &self.segments {
            let first = usize::from(self.section_index(&seg.first)) - 1;
            let last = usize::from(self.section_index(&seg.last)) - 1;
            let offset = placed[first].offset;
            let file_end = (first..=last)
                .filter(|&i| all[i].sh_type != SHT_NOBITS)
                .map(|i| placed[i].offset + placed[i].size)
                .max()
                .unwrap_or(offset);
            let vaddr = all[first].addr;
            let mem_end = all[last].addr + placed[last].size;
            ph.u32(seg.p_type);
            if is64 {
                ph.u32(seg.flags);
            }
            ph.word(offset);
            ph.word(vaddr);
            ph.word(vaddr);
            ph.word(file_end - offset);
            ph.word(mem_end - vaddr);
            if !is64 {
                ph.u32(seg.flags);
            }
            ph.word(4);
        }
        w.buf[ehsize..ehsize + ph.buf.len()].copy_from_slice(&ph.buf);

        let mut hdr = Writer {
            class: self.class,
            endian: self.endian,
            buf: Vec::new(),
        };
        hdr.buf.extend_from_slice(&ELF_MAGIC);
        hdr.u8(if is64 { 2 } else { 1 });
        hdr.u8(match self.endian {
            Endian::Little => 1,
            Endian::Big => 2,
        });
        hdr.u8(1);
        hdr.buf.resize(16, 0);
        hdr.u16(ET_EXEC);
        hdr.u16(self.machine);
        hdr.u32(1);
        hdr.word(self.entry);
        hdr.word(if self.segments.is_empty() { 0 } else { ehsize as u64 });
        hdr.word(shoff);
        hdr.u32(0x0500_0000);
        hdr.u16(u16::try_from(ehsize).unwrap());
        hdr.u16(u16::try_from(phentsize).unwrap());
        hdr.u16(u16::try_from(self.segments.len()).unwrap());
        hdr.u16(u16::try_from(shentsize).unwrap());
        hdr.u16(shnum);
        hdr.u16(shnum - 1);
        w.buf[..ehsize].copy_from_slice(&hdr.buf);
        w.buf
    }
}
