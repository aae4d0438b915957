//! `sections`, `segments` and `symbols` listings.

use std::cmp::Reverse;

use elfscope::{ElfParser, ModelSymbol};

use super::{hex, note_missing_stack_data};
use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS, SymbolSort};
use crate::terminal::Table;

pub fn cmd_sections(parser: &ElfParser) -> i32 {
    let Some(model) = parser.model() else {
        return EXIT_FAILURE;
    };

    let mut table = Table::new(["Nr", "Name", "Type", "Flags", "Address", "Offset", "Size", "Align"])
        .right_aligned(&[0, 4, 5, 6, 7]);
    for (i, s) in model.elf.sections.iter().enumerate() {
        table.add_row(vec![
            i.to_string(),
            s.name.clone(),
            s.sh_type.to_string(),
            s.flags.to_string(),
            hex(s.addr),
            hex(s.offset),
            hex(s.size),
            s.addralign.to_string(),
        ]);
    }
    table.print();
    EXIT_SUCCESS
}

pub fn cmd_segments(parser: &ElfParser) -> i32 {
    let Some(model) = parser.model() else {
        return EXIT_FAILURE;
    };
    let sections = &model.elf.sections;

    let mut table = Table::new([
        "Nr", "Type", "Flags", "Offset", "VirtAddr", "PhysAddr", "FileSiz", "MemSiz", "Sections",
    ])
    .right_aligned(&[0, 3, 4, 5, 6, 7]);
    for (i, p) in model.elf.program_headers.iter().enumerate() {
        let names: Vec<&str> = p
            .sections
            .iter()
            .filter_map(|&s| sections.get(s).map(|s| s.name.as_str()))
            .collect();
        table.add_row(vec![
            i.to_string(),
            p.p_type.to_string(),
            p.flags.to_string(),
            hex(p.offset),
            hex(p.vaddr),
            hex(p.paddr),
            hex(p.filesz),
            hex(p.memsz),
            names.join(" "),
        ]);
    }
    table.print();
    EXIT_SUCCESS
}

pub fn cmd_symbols(
    parser: &ElfParser,
    functions: bool,
    sort: SymbolSort,
    limit: Option<usize>,
) -> i32 {
    let Some(model) = parser.model() else {
        return EXIT_FAILURE;
    };

    let mut symbols: Vec<&ModelSymbol> = model
        .iter_symbols()
        .map(|(_, s)| s)
        .filter(|s| !s.name().is_empty())
        .filter(|s| !functions || s.symbol.is_function())
        .collect();
    match sort {
        SymbolSort::Address => symbols.sort_by_key(|s| s.symbol.value),
        SymbolSort::Name => symbols.sort_by(|a, b| a.display_name().cmp(b.display_name())),
        SymbolSort::Size => symbols.sort_by_key(|s| Reverse(s.symbol.size)),
        SymbolSort::Stack => {
            note_missing_stack_data(parser);
            symbols.sort_by_key(|s| Reverse(s.stack.or(s.local_stack)));
        }
    }
    if let Some(limit) = limit {
        symbols.truncate(limit);
    }

    let mut table = Table::new([
        "Address", "Size", "Type", "Bind", "Section", "Name", "Local", "Stack", "Depth", "Recursion",
    ])
    .right_aligned(&[0, 1, 6, 7, 8]);
    for s in symbols {
        let sym = &s.symbol;
        table.add_row(vec![
            hex(sym.value),
            sym.size.to_string(),
            sym.sym_type.to_string(),
            sym.binding.to_string(),
            sym.section_name.clone().unwrap_or_default(),
            s.display_name().to_string(),
            optional(s.local_stack),
            optional(s.stack),
            optional(s.depth),
            s.graph_recursion()
                .map(|r| r.to_string())
                .unwrap_or_default(),
        ]);
    }
    table.print();
    EXIT_SUCCESS
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
