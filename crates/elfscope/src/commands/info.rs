//! `info`, `attributes` and `heuristics` commands.

use elfscope::ElfParser;

use super::hex;
use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal::{self, Table, field, header};

pub fn cmd_info(parser: &ElfParser) -> i32 {
    let Some(model) = parser.model() else {
        return EXIT_FAILURE;
    };
    let h = &model.elf.header;

    header("File");
    field("Path", parser.path().display());
    field("Class", format!("ELF{}", h.class.bits()));
    field("Byte order", h.endian);
    field("Type", h.file_type);
    field("Machine", h.machine);
    field("Entry point", hex(h.entry));
    field("Flags", format!("{:#x}", h.flags));
    field("Segments", h.phnum);
    field("Sections", h.shnum);
    field("Symbols", model.symbol_count());

    header("Toolchain");
    match model.heuristics.compiler {
        Some(compiler) => field("Compiler", compiler),
        None => field("Compiler", "unknown"),
    }
    if let Some(comment) = &model.elf.comment {
        for line in &comment.comments {
            field("Comment", line);
        }
    }
    match model.heuristics.platform() {
        Some(platform) => field("Platform", platform),
        None => field("Platform", "not detected"),
    }

    header("Stack analysis");
    field("Stack usage", yes_no(model.has_stack_usage));
    field("Call graph", yes_no(model.has_call_graph));
    if let Some(worst) = model
        .iter_symbols()
        .filter_map(|(_, s)| s.stack.map(|stack| (stack, s)))
        .max_by_key(|(stack, _)| *stack)
    {
        field(
            "Deepest function",
            format!("{} ({} bytes)", worst.1.display_name(), worst.0),
        );
    }
    EXIT_SUCCESS
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

pub fn cmd_attributes(parser: &ElfParser) -> i32 {
    let Some(model) = parser.model() else {
        return EXIT_FAILURE;
    };
    let Some(attributes) = &model.elf.arm_attributes else {
        terminal::warning("no ARM build attributes in this file");
        return EXIT_SUCCESS;
    };

    let mut table = Table::new(["Attribute", "Value"]);
    for (name, value) in attributes.entries() {
        table.add_row(vec![name.to_string(), value]);
    }
    table.print();
    EXIT_SUCCESS
}

pub fn cmd_heuristics(parser: &ElfParser) -> i32 {
    let Some(model) = parser.model() else {
        return EXIT_FAILURE;
    };
    let heuristics = &model.heuristics;
    let Some(platform) = heuristics.platform() else {
        terminal::warning("no platform markers found");
        return EXIT_SUCCESS;
    };

    header(&format!("Platform: {platform}"));
    let mut table = Table::new(["Setting", "Symbol", "Value"]).right_aligned(&[2]);
    for entry in heuristics.entries() {
        table.add_row(vec![
            entry.label.to_string(),
            entry.symbol.to_string(),
            entry.display.clone(),
        ]);
    }
    table.print();
    EXIT_SUCCESS
}
