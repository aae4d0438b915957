//! Loading a firmware image with its side files and querying the result.

#[path = "../../elfscope-elf/tests/support/mod.rs"]
mod support;

use std::fs;
use std::path::PathBuf;

use elfscope::elf::{
    Class, ElfError, Endian, PF_R, PF_W, PF_X, PT_LOAD, SHF_ALLOC, SHF_EXECINSTR, SHF_WRITE,
    STB_GLOBAL, STT_FUNC, STT_OBJECT,
};
use elfscope::stack::RecursionKind;
use elfscope::{DataResult, ElfParser, Error, LoadOptions, Platform, QueryError, Value};
use support::{ElfBuilder, Shndx};
use tempfile::TempDir;

const MAIN_SU: &str = "\
src/main.c:10:5:main\t24\tstatic
src/main.c:20:6:parse\t48\tstatic
src/main.c:30:6:eval\t64\tstatic
src/main.c:40:6:scratch\t128\tdynamic
";

const MAIN_CGRAPH: &str = "\
Optimized Symbol table:

main/0 (main) @0x7f1
  Type: function definition analyzed
  Calls: parse/1 (1073741824 per call) puts/3 (1073741824 per call)
parse/1 (parse) @0x7f2
  Type: function definition analyzed
  Calls: eval/2 (1073741824 per call)
eval/2 (eval) @0x7f3
  Type: function definition analyzed
  Calls: parse/1 (1073741824 per call)
puts/3 (puts) @0x7f4
  Type: function
Materializing clones
";

const UTIL_SU: &str = "\
src/util.c:3:5:helper\t16\tstatic
src/util.c:9:5:parse\t8\tstatic
";

fn firmware() -> Vec<u8> {
    let text = || Shndx::Section(".text".into());
    ElfBuilder::new(Class::Elf32, Endian::Little)
        .entry(0x0800_0001)
        .progbits(".text", SHF_ALLOC | SHF_EXECINSTR, 0x0800_0000, &[0u8; 0x80])
        .progbits(".data", SHF_ALLOC | SHF_WRITE, 0x2000_0000, &[0u8; 0x10])
        .nobits(".bss", SHF_ALLOC | SHF_WRITE, 0x2000_0010, 0x200)
        .segment(PT_LOAD, PF_R | PF_X, ".text", ".text")
        .segment(PT_LOAD, PF_R | PF_W, ".data", ".bss")
        .symbol("main", 0x0800_0001, 0x20, STT_FUNC, STB_GLOBAL, text())
        .symbol("parse", 0x0800_0021, 0x20, STT_FUNC, STB_GLOBAL, text())
        .symbol("eval", 0x0800_0041, 0x20, STT_FUNC, STB_GLOBAL, text())
        .symbol("helper", 0x0800_0061, 0x10, STT_FUNC, STB_GLOBAL, text())
        .symbol("CONFIG_FLASH_SIZE", 512, 0, STT_OBJECT, STB_GLOBAL, Shndx::Abs)
        .symbol("CONFIG_SRAM_SIZE", 128, 0, STT_OBJECT, STB_GLOBAL, Shndx::Abs)
        .build()
}

/// A build directory with the image and, optionally, its call graph.
fn build_dir(with_graph: bool) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let objs = dir.path().join("obj");
    fs::create_dir_all(&objs).unwrap();
    fs::write(objs.join("main.c.su"), MAIN_SU).unwrap();
    if with_graph {
        fs::write(objs.join("main.c.000i.cgraph"), MAIN_CGRAPH).unwrap();
    }
    fs::write(objs.join("util.c.su"), UTIL_SU).unwrap();
    let elf = dir.path().join("fw.elf");
    fs::write(&elf, firmware()).unwrap();
    (dir, elf)
}

fn loaded(options: LoadOptions) -> (TempDir, ElfParser) {
    let (dir, elf) = build_dir(true);
    let mut parser = ElfParser::new(elf).with_options(options);
    assert_eq!(parser.initialize().unwrap(), DataResult::Ok);
    (dir, parser)
}

#[test]
fn test_model_enriched_from_side_files() {
    let (_dir, parser) = loaded(LoadOptions::new());
    let model = parser.model().unwrap();
    assert!(model.has_stack_usage);
    assert!(model.has_call_graph);

    let main = model.symbol(model.find_by_name("main")[0]).unwrap();
    assert_eq!(main.local_stack, Some(24));
    assert_eq!(main.stack, Some(136));
    assert_eq!(main.depth, Some(2));
    assert_eq!(main.graph_recursion(), Some(RecursionKind::ReachesRecursion));
    assert_eq!(main.source.as_ref().unwrap().to_string(), "src/main.c:10:5");
    assert_eq!(main.callees, model.find_by_name("parse"));

    let helper = model.symbol(model.find_by_name("helper")[0]).unwrap();
    assert_eq!(helper.local_stack, Some(16));
    assert_eq!(helper.stack, None);
    assert_eq!(helper.graph_recursion(), None);

    assert_eq!(model.heuristics.platform(), Some(Platform::Zephyr));
    let labels: Vec<_> = model
        .heuristics
        .entries()
        .iter()
        .map(|e| (e.label, e.display.as_str()))
        .collect();
    assert_eq!(labels, [("Flash size", "512 KB"), ("SRAM size", "128 KB")]);
}

#[test]
fn test_symbols_table() {
    let (_dir, parser) = loaded(LoadOptions::new());
    let rows = parser
        .query(
            "SELECT name, stack, stackdepth, recursive FROM symbols \
             WHERE stack IS NOT NULL ORDER BY stack DESC, name",
            &[],
        )
        .unwrap();
    let got: Vec<Vec<String>> = rows
        .rows
        .iter()
        .map(|r| r.iter().map(ToString::to_string).collect())
        .collect();
    assert_eq!(
        got,
        [
            ["main", "136", "2", "1"],
            ["eval", "112", "1", "3"],
            ["parse", "112", "1", "3"],
        ]
    );

    let rows = parser
        .query("SELECT * FROM symbols WHERE name = ?", &[Value::from("helper")])
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.get(0, "id"), Some(&Value::Int(5)));
    assert_eq!(rows.get(0, "type"), Some(&Value::from("FUNC")));
    assert_eq!(rows.get(0, "section"), Some(&Value::from(".text")));
    assert_eq!(rows.get(0, "localstack"), Some(&Value::Int(16)));
    assert_eq!(rows.get(0, "recursive"), Some(&Value::Null));
    assert_eq!(rows.get(0, "path"), Some(&Value::from("src/util.c:3:5")));

    let rows = parser
        .query("SELECT COUNT(*) FROM symbols WHERE name LIKE 'config%'", &[])
        .unwrap();
    assert_eq!(rows.rows, [[Value::Int(2)]]);
}

#[test]
fn test_callers_sections_segments_tables() {
    let (_dir, parser) = loaded(LoadOptions::new());

    let rows = parser
        .query("SELECT callee_id FROM callers WHERE caller_id = 2", &[])
        .unwrap();
    assert_eq!(rows.rows, [[Value::Int(3)]]);
    let rows = parser.query("SELECT COUNT(*) FROM callers", &[]).unwrap();
    assert_eq!(rows.rows, [[Value::Int(3)]]);

    let rows = parser
        .query("SELECT id, name FROM sections WHERE type = 'NOBITS'", &[])
        .unwrap();
    assert_eq!(rows.rows, [[Value::Int(3), Value::from(".bss")]]);

    let rows = parser
        .query("SELECT type, sections FROM segments ORDER BY id", &[])
        .unwrap();
    assert_eq!(
        rows.rows,
        [
            [Value::from("LOAD"), Value::from("1")],
            [Value::from("LOAD"), Value::from("2,3")],
        ]
    );
}

#[test]
fn test_missing_call_graph_keeps_stack_usage() {
    let (_dir, elf) = build_dir(false);
    let mut parser = ElfParser::new(elf);
    assert_eq!(parser.initialize().unwrap(), DataResult::Ok);
    let model = parser.model().unwrap();
    assert!(model.has_stack_usage);
    assert!(!model.has_call_graph);

    let rows = parser
        .query("SELECT localstack, stack, recursive FROM symbols WHERE name = 'main'", &[])
        .unwrap();
    assert_eq!(rows.rows, [[Value::Int(24), Value::Null, Value::Null]]);
}

#[test]
fn test_side_files_disabled() {
    let (_dir, parser) = loaded(LoadOptions::new().with_side_files(false));
    let model = parser.model().unwrap();
    assert!(!model.has_stack_usage);
    let rows = parser
        .query("SELECT COUNT(*) FROM symbols WHERE localstack IS NOT NULL", &[])
        .unwrap();
    assert_eq!(rows.rows, [[Value::Int(0)]]);
}

#[test]
fn test_side_file_root_override() {
    let (dir, _) = build_dir(true);
    let elf = tempfile::tempdir().unwrap();
    let elf_path = elf.path().join("fw.elf");
    fs::write(&elf_path, firmware()).unwrap();

    let mut parser =
        ElfParser::new(&elf_path).with_options(LoadOptions::new().with_side_file_root(dir.path()));
    parser.initialize().unwrap();
    assert!(parser.model().unwrap().has_call_graph);
}

#[test]
fn test_strict_side_files() {
    let (_dir, elf) = build_dir(true);
    let options = LoadOptions::new()
        .with_side_file_root("/nonexistent/elfscope/build")
        .with_strict_side_files(true);
    let mut parser = ElfParser::new(&elf).with_options(options.clone());
    assert!(matches!(parser.initialize(), Err(Error::Stack(_))));

    let mut lenient = ElfParser::new(&elf).with_options(options.with_strict_side_files(false));
    assert_eq!(lenient.initialize().unwrap(), DataResult::Ok);
    assert!(!lenient.model().unwrap().has_stack_usage);
}

#[test]
fn test_database_disabled() {
    let (_dir, parser) = loaded(LoadOptions::new().with_database(false));
    assert!(parser.model().is_some());
    assert!(matches!(
        parser.query("SELECT * FROM symbols", &[]),
        Err(Error::NotLoaded)
    ));
}

#[test]
fn test_initialize_is_idempotent() {
    let (_dir, elf) = build_dir(true);
    let mut parser = ElfParser::new(elf);
    parser.initialize().unwrap();
    let first = parser.model().cloned();
    parser.initialize().unwrap();
    assert_eq!(first.as_ref(), parser.model());

    let data = firmware();
    parser.initialize_from_bytes(&data).unwrap();
    assert_eq!(first.as_ref(), parser.model());
}

#[test]
fn test_invalid_input() {
    let dir = tempfile::tempdir().unwrap();
    let short = dir.path().join("short.elf");
    fs::write(&short, [0x7f, b'E', b'L', b'F', 1, 1]).unwrap();
    let mut parser = ElfParser::new(&short);
    assert_eq!(
        parser.initialize().unwrap(),
        DataResult::Invalid(ElfError::TooSmall { len: 6, min: 52 })
    );
    assert!(parser.model().is_none());

    let garbage = dir.path().join("garbage.elf");
    fs::write(&garbage, [0u8; 52]).unwrap();
    let mut parser = ElfParser::new(&garbage);
    assert_eq!(
        parser.initialize().unwrap(),
        DataResult::Invalid(ElfError::InvalidMagic)
    );
}

#[test]
fn test_read_only_guard() {
    let (_dir, parser) = loaded(LoadOptions::new());
    let store = parser.store().unwrap();

    for sql in [
        "DROP TABLE symbols",
        "  delete from sections",
        "Insert into callers",
        "\"DROP\" TABLE symbols",
        "\"delete\" FROM sections",
    ] {
        let err = parser.query(sql, &[]).unwrap_err();
        assert!(matches!(err, Error::Query(QueryError::ReadOnly { .. })), "{sql}");
    }
    assert!(store.is_read_only());

    parser.drop_symbols_table().unwrap();
    assert!(store.is_read_only());
    assert!(matches!(
        parser.query("SELECT * FROM symbols", &[]),
        Err(Error::Query(QueryError::UnknownTable(_)))
    ));
    assert!(matches!(
        parser.query("DELETE FROM callers", &[]),
        Err(Error::Query(QueryError::ReadOnly { .. }))
    ));

    // Dropping again fails, and the guard is still restored.
    assert!(matches!(
        parser.drop_symbols_table(),
        Err(Error::Query(QueryError::UnknownTable(_)))
    ));
    assert!(store.is_read_only());
    assert_eq!(store.table_names(), ["callers", "sections", "segments"]);
}
