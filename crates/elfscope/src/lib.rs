//! ELF inspector for embedded firmware.
//!
//! [`ElfParser`] reads an ELF file, decodes it with [`elfscope_elf`], merges
//! the compiler's stack-usage and call-graph side files found next to it, and
//! detects the target platform from build-time constants. The result is a
//! read-only [`DataModel`] plus a small set of tables that can be queried with
//! a restricted SQL dialect:
//!
//! ```no_run
//! use elfscope::{DataResult, ElfParser, Value};
//!
//! let mut parser = ElfParser::new("build/zephyr/zephyr.elf");
//! if parser.initialize()? == DataResult::Ok {
//!     let rows = parser.query(
//!         "SELECT name, stack FROM symbols WHERE stack > ? ORDER BY stack DESC",
//!         &[Value::Int(512)],
//!     )?;
//!     for row in &rows.rows {
//!         println!("{} {}", row[0], row[1]);
//!     }
//! }
//! # Ok::<(), elfscope::Error>(())
//! ```

mod error;
pub mod heuristics;
pub mod model;
mod options;
mod parser;
mod query;
pub mod store;

pub use error::{Error, QueryError, Result};
pub use heuristics::{HeuristicEntry, Heuristics, Platform};
pub use model::{DataModel, ModelSymbol, SourceLocation, SymbolRef};
pub use options::LoadOptions;
pub use parser::{DataResult, ElfParser};
pub use query::mutating_keyword;
pub use store::{Rows, Store, Value};

pub use elfscope_elf as elf;
pub use elfscope_stack as stack;
