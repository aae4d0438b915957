//! In-memory tables over the data model, behind a read-only guard.
//!
//! All access goes through [`Store`], which owns the tables under a mutex.
//! Queries see the guard enabled; [`Store::with_mutation_allowed`] lifts it
//! for the duration of one closure while still holding the lock.

use std::cmp::Ordering;
use std::fmt;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::QueryError;
use crate::model::DataModel;
use crate::query;

pub const SYMBOLS_TABLE: &str = "symbols";
pub const CALLERS_TABLE: &str = "callers";
pub const SECTIONS_TABLE: &str = "sections";
pub const SEGMENTS_TABLE: &str = "segments";

const SYMBOLS_COLUMNS: [&str; 14] = [
    "id",
    "name",
    "demangled",
    "type",
    "address",
    "section",
    "size",
    "localstack",
    "stack",
    "bind",
    "visibility",
    "recursive",
    "path",
    "stackdepth",
];
const CALLERS_COLUMNS: [&str; 2] = ["caller_id", "callee_id"];
const SECTIONS_COLUMNS: [&str; 11] = [
    "id", "name", "type", "flags", "address", "offset", "size", "link", "info", "alignment",
    "entsize",
];
const SEGMENTS_COLUMNS: [&str; 10] = [
    "id", "type", "flags", "offset", "vaddr", "paddr", "filesz", "memsz", "alignment", "sections",
];

/// A cell value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Null,
    Int(i128),
    Text(String),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i128> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    fn int(value: impl Into<i128>) -> Self {
        Self::Int(value.into())
    }

    fn count(value: usize) -> Self {
        Self::Int(i128::try_from(value).unwrap_or(i128::MAX))
    }

    fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    fn opt_int(value: Option<impl Into<i128>>) -> Self {
        value.map_or(Self::Null, Self::int)
    }

    fn opt_text(value: Option<impl Into<String>>) -> Self {
        value.map_or(Self::Null, Self::text)
    }

    /// SQL comparison: `None` when either side is NULL.
    ///
    /// Text that parses as an integer compares numerically with integers.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => None,
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Text(b)) => Some(match b.trim().parse::<i128>() {
                Ok(b) => a.cmp(&b),
                Err(_) => a.to_string().cmp(b),
            }),
            (Self::Text(_), Self::Int(_)) => other.compare(self).map(Ordering::reverse),
        }
    }

    /// Total order for sorting: NULL, then integers, then text.
    #[must_use]
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        const fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Int(_) => 1,
                Value::Text(_) => 2,
            }
        }
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::text(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// A named table. Column names are matched case-insensitively.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    #[must_use]
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }
}

/// The set of tables.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Database {
    tables: Vec<Table>,
}

impl Database {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table, replacing one with the same name.
    pub fn insert_table(&mut self, table: Table) {
        self.tables.retain(|t| !t.name.eq_ignore_ascii_case(&table.name));
        self.tables.push(table);
    }

    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn drop_table(&mut self, name: &str) -> Result<Table, QueryError> {
        let pos = self
            .tables
            .iter()
            .position(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| QueryError::UnknownTable(name.to_string()))?;
        Ok(self.tables.remove(pos))
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    /// Tables for a loaded model.
    #[must_use]
    pub fn from_model(model: &DataModel) -> Self {
        let mut db = Self::new();
        db.insert_table(symbols_table(model));
        db.insert_table(callers_table(model));
        db.insert_table(sections_table(model));
        db.insert_table(segments_table(model));
        debug!(tables = db.tables.len(), "database populated");
        db
    }
}

fn symbols_table(model: &DataModel) -> Table {
    let mut table = Table::new(SYMBOLS_TABLE, &SYMBOLS_COLUMNS);
    for (id, (_, sym)) in model.iter_symbols().enumerate() {
        let s = &sym.symbol;
        table.push(vec![
            Value::count(id + 1),
            Value::text(s.name.clone()),
            Value::opt_text(sym.demangled.clone()),
            Value::text(s.sym_type.to_string()),
            Value::int(s.value),
            Value::opt_text(s.section_name.clone()),
            Value::int(s.size),
            Value::opt_int(sym.local_stack),
            Value::opt_int(sym.stack),
            Value::text(s.binding.to_string()),
            Value::text(s.visibility.to_string()),
            Value::opt_int(sym.graph_recursion().map(|r| r as u8)),
            Value::text(sym.source.as_ref().map(ToString::to_string).unwrap_or_default()),
            Value::opt_int(sym.depth),
        ]);
    }
    table
}

fn callers_table(model: &DataModel) -> Table {
    let mut table = Table::new(CALLERS_TABLE, &CALLERS_COLUMNS);
    for (caller, sym) in model.iter_symbols() {
        let Some(caller_id) = model.symbol_id(caller) else {
            continue;
        };
        for &callee in &sym.callees {
            if let Some(callee_id) = model.symbol_id(callee) {
                table.push(vec![Value::count(caller_id), Value::count(callee_id)]);
            }
        }
    }
    table
}

fn sections_table(model: &DataModel) -> Table {
    let mut table = Table::new(SECTIONS_TABLE, &SECTIONS_COLUMNS);
    for (id, s) in model.elf.sections.iter().enumerate() {
        table.push(vec![
            Value::count(id),
            Value::text(s.name.clone()),
            Value::text(s.sh_type.to_string()),
            Value::text(s.flags.to_string()),
            Value::int(s.addr),
            Value::int(s.offset),
            Value::int(s.size),
            Value::int(s.link),
            Value::int(s.info),
            Value::int(s.addralign),
            Value::int(s.entsize),
        ]);
    }
    table
}

fn segments_table(model: &DataModel) -> Table {
    let mut table = Table::new(SEGMENTS_TABLE, &SEGMENTS_COLUMNS);
    for (id, p) in model.elf.program_headers.iter().enumerate() {
        let sections: Vec<String> = p.sections.iter().map(ToString::to_string).collect();
        table.push(vec![
            Value::count(id),
            Value::text(p.p_type.to_string()),
            Value::text(p.flags.to_string()),
            Value::int(p.offset),
            Value::int(p.vaddr),
            Value::int(p.paddr),
            Value::int(p.filesz),
            Value::int(p.memsz),
            Value::int(p.align),
            Value::text(sections.join(",")),
        ]);
    }
    table
}

/// Query result: column names and rows of values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Rows {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Value of `column` in row `row`.
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        self.rows.get(row)?.get(self.column(column)?)
    }

    /// All values of one column.
    #[must_use]
    pub fn column_values(&self, column: &str) -> Vec<&Value> {
        self.column(column)
            .map(|i| self.rows.iter().map(|r| &r[i]).collect())
            .unwrap_or_default()
    }
}

/// Tables plus the read-only flag, only reachable through [`Store`].
#[derive(Debug)]
pub struct Session {
    database: Database,
    read_only: bool,
}

impl Session {
    /// Run one statement against the tables.
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<Rows, QueryError> {
        query::execute(&mut self.database, self.read_only, sql, params)
    }

    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.database
    }
}

/// Lifts the read-only flag until dropped.
struct MutationScope<'a> {
    session: &'a mut Session,
}

impl<'a> MutationScope<'a> {
    fn enter(session: &'a mut Session) -> Self {
        session.read_only = false;
        Self { session }
    }

    fn session(&mut self) -> &mut Session {
        self.session
    }
}

impl Drop for MutationScope<'_> {
    fn drop(&mut self) {
        self.session.read_only = true;
    }
}

/// Guarded, shareable store.
#[derive(Debug)]
pub struct Store {
    inner: Mutex<Session>,
}

impl Store {
    #[must_use]
    pub fn new(database: Database) -> Self {
        Self {
            inner: Mutex::new(Session {
                database,
                read_only: true,
            }),
        }
    }

    /// Run a read-only query. Mutating statements are rejected before
    /// execution.
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<Rows, QueryError> {
        self.inner.lock().execute(sql, params)
    }

    /// Run `f` with the read-only guard lifted.
    ///
    /// The lock is held throughout, so no query observes the lifted guard,
    /// and the guard is restored however `f` exits.
    pub fn with_mutation_allowed<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut session = self.inner.lock();
        let mut scope = MutationScope::enter(&mut session);
        f(scope.session())
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.inner.lock().read_only
    }

    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.inner
            .lock()
            .database
            .table_names()
            .map(str::to_string)
            .collect()
    }
}
