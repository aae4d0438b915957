//! Enriched view of a parsed ELF file.
//!
//! Symbols from every symbol table are wrapped with what the side files and
//! the demangler add: readable names, stack figures, recursion class, source
//! location and callees. The model is built once and is read-only afterwards.

use std::fmt;

use elfscope_elf::{ElfFile, Symbol};
use elfscope_stack::{CallGraph, RecursionKind, StackData, StackUsageRecord, merge_stack_usage};
use rayon::prelude::*;
use cpp_demangle::DemangleOptions;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::heuristics::Heuristics;

const ITANIUM_PREFIXES: [&str; 2] = ["_Z", "__Z"];

/// Position of a symbol across all symbol tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolRef {
    pub table: usize,
    pub index: usize,
}

/// Source position of a function, from the stack-usage file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl SourceLocation {
    fn from_record(record: &StackUsageRecord) -> Self {
        Self {
            file: record.file.clone(),
            line: record.line,
            column: record.column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
        }
        if let Some(column) = self.column.filter(|&c| c != 0) {
            write!(f, ":{column}")?;
        }
        Ok(())
    }
}

/// A symbol with its enrichment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSymbol {
    pub symbol: Symbol,
    pub demangled: Option<String>,
    /// Own frame size from `.su` files.
    pub local_stack: Option<u64>,
    /// Worst-case stack including callees, from the call graph.
    pub stack: Option<u64>,
    pub recursion: RecursionKind,
    /// Calls along the worst-case stack path.
    pub depth: Option<u32>,
    pub source: Option<SourceLocation>,
    pub callees: Vec<SymbolRef>,
}

impl ModelSymbol {
    fn new(symbol: Symbol) -> Self {
        let demangled = demangle(&symbol.name);
        Self {
            symbol,
            demangled,
            local_stack: None,
            stack: None,
            recursion: RecursionKind::NoRecursion,
            depth: None,
            source: None,
            callees: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.symbol.name
    }

    /// Demangled name when known, otherwise the raw name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.demangled.as_deref().unwrap_or(&self.symbol.name)
    }

    /// Recursion class, reported only once a call-graph stack is known.
    #[must_use]
    pub fn graph_recursion(&self) -> Option<RecursionKind> {
        self.stack
            .and(Some(self.recursion))
            .filter(|r| r.is_recursive())
    }
}

/// Demangle a Rust or Itanium C++ symbol. A linker version (`@@…`) or
/// compiler clone (`.constprop.0`) suffix is kept as is.
fn demangle(name: &str) -> Option<String> {
    if is_rust_symbol(name) {
        return rustc_demangle::try_demangle(name)
            .ok()
            .map(|d| format!("{d:#}"))
            .filter(|d| d != name);
    }
    if !is_mangled(name) {
        return None;
    }

    let split = [name.find("@@"), name.find('.')]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(name.len());
    let (base, suffix) = name.split_at(split);
    let base = base.strip_prefix('_').filter(|b| b.starts_with("_Z")).unwrap_or(base);
    let symbol = cpp_demangle::Symbol::new(base).ok()?;
    let demangled = symbol.demangle(&DemangleOptions::default()).ok()?;
    Some(format!("{demangled}{suffix}"))
}

fn is_mangled(name: &str) -> bool {
    ITANIUM_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// `_R…` v0 names, or legacy `_ZN…17h<hash>E` names.
fn is_rust_symbol(name: &str) -> bool {
    if name.starts_with("_R") {
        return true;
    }
    let base = name.split('.').next().unwrap_or(name);
    base.starts_with("_ZN")
        && base
            .strip_suffix('E')
            .and_then(|b| b.len().checked_sub(19).and_then(|i| b.get(i..)))
            .and_then(|tail| tail.strip_prefix("17h"))
            .is_some_and(|hash| hash.bytes().all(|c| c.is_ascii_hexdigit()))
}

/// The loaded file and everything derived from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataModel {
    pub elf: ElfFile,
    /// One list per symbol table, parallel to `elf.symbol_tables`.
    pub symbols: Vec<Vec<ModelSymbol>>,
    pub heuristics: Heuristics,
    /// `localstack` figures are available.
    pub has_stack_usage: bool,
    /// `stack`, `recursive` and `stackdepth` figures and callers are available.
    pub has_call_graph: bool,
    by_name: FxHashMap<String, Vec<SymbolRef>>,
}

impl DataModel {
    /// Build the model from a parsed file and optional side-file data.
    #[must_use]
    pub fn build(elf: ElfFile, stack: Option<&StackData>) -> Self {
        let symbols: Vec<Vec<ModelSymbol>> = elf
            .symbol_tables
            .iter()
            .map(|table| {
                table
                    .symbols
                    .par_iter()
                    .cloned()
                    .map(ModelSymbol::new)
                    .collect()
            })
            .collect();

        let mut heuristics = Heuristics::new();
        let mut by_name: FxHashMap<String, Vec<SymbolRef>> = FxHashMap::default();
        for (table, list) in symbols.iter().enumerate() {
            for (index, sym) in list.iter().enumerate() {
                heuristics.collect(&sym.symbol);
                if !sym.symbol.name.is_empty() {
                    by_name
                        .entry(sym.symbol.name.clone())
                        .or_default()
                        .push(SymbolRef { table, index });
                }
            }
        }
        heuristics.compiler = elf.comment.as_ref().and_then(|c| c.compiler);

        let mut model = Self {
            elf,
            symbols,
            heuristics,
            has_stack_usage: false,
            has_call_graph: false,
            by_name,
        };
        if let Some(stack) = stack {
            model.apply_stack_usage(stack);
            let updated: usize = stack.graphs.iter().map(|g| model.apply_call_graph(g)).sum();
            model.has_call_graph = updated > 0;
        }
        debug!(
            symbols = model.symbol_count(),
            stack_usage = model.has_stack_usage,
            call_graph = model.has_call_graph,
            "model built"
        );
        model
    }

    fn apply_stack_usage(&mut self, stack: &StackData) {
        let merged = merge_stack_usage(&stack.usage);
        for record in merged.iter() {
            for name in record.symbol_names() {
                let refs = self.find_by_name(name).to_vec();
                if refs.is_empty() {
                    debug!(name, stack = record.stack, "no symbol for stack-usage record");
                }
                for r in refs {
                    let sym = &mut self.symbols[r.table][r.index];
                    if sym.demangled.is_none() && is_mangled(name) {
                        sym.demangled = Some(record.function.clone());
                    }
                    if record.stack > 0 {
                        sym.local_stack = Some(record.stack);
                        sym.source = Some(SourceLocation::from_record(record));
                        self.has_stack_usage = true;
                    }
                }
            }
        }
    }

    /// Apply one graph's results; returns the number of symbols given a
    /// call-graph stack.
    fn apply_call_graph(&mut self, graph: &CallGraph) -> usize {
        let mut updated = 0;
        for node in &graph.nodes {
            let targets = self.first_per_table(&node.mangled_name);
            if targets.is_empty() {
                if node.max_stack > 0 {
                    debug!(name = %node.mangled_name, "no symbol for call-graph node");
                }
                continue;
            }

            let callees: Vec<SymbolRef> = node
                .callees
                .iter()
                .flat_map(|&c| self.first_per_table(&graph.nodes[c].mangled_name))
                .collect();

            for r in targets {
                let sym = &mut self.symbols[r.table][r.index];
                sym.recursion = sym.recursion.max(node.recursion);
                if node.max_stack > 0 && sym.stack.is_none_or(|s| s < node.max_stack) {
                    sym.stack = Some(node.max_stack);
                    sym.local_stack = Some(node.local_stack);
                    sym.depth = Some(node.depth);
                    updated += 1;
                }
                for &callee in &callees {
                    if callee != r && !sym.callees.contains(&callee) {
                        sym.callees.push(callee);
                    }
                }
            }
        }
        updated
    }

    /// All symbols with exactly this name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> &[SymbolRef] {
        self.by_name.get(name).map_or(&[], Vec::as_slice)
    }

    fn first_per_table(&self, name: &str) -> Vec<SymbolRef> {
        let mut refs: Vec<SymbolRef> = Vec::new();
        for &r in self.find_by_name(name) {
            if refs.last().is_none_or(|last| last.table != r.table) {
                refs.push(r);
            }
        }
        refs
    }

    #[must_use]
    pub fn symbol(&self, r: SymbolRef) -> Option<&ModelSymbol> {
        self.symbols.get(r.table)?.get(r.index)
    }

    /// All symbols in load order.
    pub fn iter_symbols(&self) -> impl Iterator<Item = (SymbolRef, &ModelSymbol)> {
        self.symbols.iter().enumerate().flat_map(|(table, list)| {
            list.iter()
                .enumerate()
                .map(move |(index, sym)| (SymbolRef { table, index }, sym))
        })
    }

    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.symbols.iter().map(Vec::len).sum()
    }

    /// 1-based position of a symbol in load order, as used for table ids.
    #[must_use]
    pub fn symbol_id(&self, r: SymbolRef) -> Option<usize> {
        let list = self.symbols.get(r.table)?;
        let before: usize = self.symbols[..r.table].iter().map(Vec::len).sum();
        (r.index < list.len()).then_some(before + r.index + 1)
    }
}
