//! GCC `-fstack-usage` (`.su`) files.
//!
//! Each line is `location\tbytes\tqualifiers` where `location` is
//! `path:line:column:function`. Only `static` rows are kept.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::{Result, StackError};

const STATIC_KIND: &str = "static";

/// One function's stack usage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackUsageRecord {
    /// Function name as GCC printed it (demangled for C++).
    pub function: String,
    /// Static stack frame size in bytes.
    pub stack: u64,
    pub kind: String,
    /// `file:line:column`, file including its directory.
    pub path: String,
    pub file: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
    /// Number of further definitions of the same function seen.
    pub duplicates: u32,
    /// Linker names of this function, filled in from the call graph.
    pub mangled_names: Vec<String>,
}

impl StackUsageRecord {
    /// Parse one line. Returns `None` for non-`static` rows and malformed lines.
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split('\t').map(str::trim);
        let location = fields.next().filter(|s| !s.is_empty())?;
        let size = fields.next().filter(|s| !s.is_empty())?;
        let kind = fields.next()?;
        if kind != STATIC_KIND {
            return None;
        }

        // Paths may contain ':' (drive letters), so split only the file name.
        let start = location
            .rfind('/')
            .or_else(|| location.rfind('\\'))
            .map_or(0, |i| i + 1);
        let (dir, rest) = location.split_at(start);
        let mut parts = rest.splitn(4, ':');
        let file = format!("{dir}{}", parts.next()?);
        let line_str = parts.next()?;
        let column_str = parts.next()?;
        let function = parts.next().filter(|f| !f.is_empty())?;

        let Ok(stack) = size.parse::<u64>() else {
            debug!(line, "skipping stack-usage line with bad size");
            return None;
        };

        Some(Self {
            function: function.to_string(),
            stack,
            kind: kind.to_string(),
            path: format!("{file}:{line_str}:{column_str}"),
            file,
            line: line_str.parse().ok(),
            column: column_str.parse().ok(),
            duplicates: 0,
            mangled_names: Vec::new(),
        })
    }

    /// Record a linker name for this function, ignoring repeats.
    pub fn add_mangled_name(&mut self, name: &str) {
        if !self.mangled_names.iter().any(|n| n == name) {
            self.mangled_names.push(name.to_string());
        }
    }

    /// Names to look up in the symbol table. C functions have no linker
    /// name recorded, so the function name itself is used.
    #[must_use]
    pub fn symbol_names(&self) -> Vec<&str> {
        if self.mangled_names.is_empty() {
            vec![self.function.as_str()]
        } else {
            self.mangled_names.iter().map(String::as_str).collect()
        }
    }
}

/// Stack-usage records keyed by function name, in first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackUsage {
    records: Vec<StackUsageRecord>,
    index: FxHashMap<String, usize>,
}

impl StackUsage {
    #[must_use]
    pub fn get(&self, function: &str) -> Option<&StackUsageRecord> {
        self.index.get(function).map(|&i| &self.records[i])
    }

    pub fn get_mut(&mut self, function: &str) -> Option<&mut StackUsageRecord> {
        self.index.get(function).map(|&i| &mut self.records[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &StackUsageRecord> {
        self.records.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert a record from the same translation unit. The first definition
    /// wins; later ones only bump its duplicate counter.
    fn insert_first(&mut self, record: StackUsageRecord, source: &Path) {
        if let Some(existing) = self.get_mut(&record.function) {
            if existing.stack != record.stack {
                warn!(
                    function = %record.function,
                    file = %source.display(),
                    kept = existing.stack,
                    ignored = record.stack,
                    "duplicate function in stack-usage file"
                );
            }
            existing.duplicates += 1;
            return;
        }
        self.push(record);
    }

    /// Insert a record from another translation unit. The larger stack
    /// wins; linker names from both are kept.
    fn insert_max(&mut self, record: &StackUsageRecord) {
        let Some(existing) = self.get_mut(&record.function) else {
            self.push(record.clone());
            return;
        };
        if existing.stack < record.stack {
            debug!(
                function = %record.function,
                old = existing.stack,
                new = record.stack,
                path = %record.path,
                "larger stack in another stack-usage file"
            );
            existing.stack = record.stack;
            existing.kind.clone_from(&record.kind);
            existing.path.clone_from(&record.path);
            existing.file.clone_from(&record.file);
            existing.line = record.line;
            existing.column = record.column;
        }
        existing.duplicates += 1 + record.duplicates;
        for name in &record.mangled_names {
            existing.add_mangled_name(name);
        }
    }

    fn push(&mut self, record: StackUsageRecord) {
        self.index
            .insert(record.function.clone(), self.records.len());
        self.records.push(record);
    }
}

/// A parsed `.su` file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackUsageFile {
    pub path: PathBuf,
    pub usage: StackUsage,
}

impl StackUsageFile {
    /// Parse `.su` text. `path` is used for diagnostics only.
    #[must_use]
    pub fn parse(path: &Path, text: &str) -> Self {
        let mut usage = StackUsage::default();
        for record in text.lines().filter_map(StackUsageRecord::parse_line) {
            usage.insert_first(record, path);
        }
        Self {
            path: path.to_path_buf(),
            usage,
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| StackError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(path, &text))
    }
}

/// Merge the records of several `.su` files; on conflicts the larger stack
/// wins.
#[must_use]
pub fn merge_stack_usage<'a>(files: impl IntoIterator<Item = &'a StackUsageFile>) -> StackUsage {
    let mut merged = StackUsage::default();
    for file in files {
        for record in file.usage.iter() {
            merged.insert_max(record);
        }
    }
    merged
}
