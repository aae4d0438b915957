use std::path::PathBuf;

use thiserror::Error;

/// Inspector errors.
///
/// Malformed ELF input is not an error here: `initialize` reports it as
/// [`DataResult::Invalid`](crate::DataResult::Invalid).
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("side-file error: {0}")]
    Stack(#[from] elfscope_stack::StackError),
    #[error("no ELF file loaded: call initialize first")]
    NotLoaded,
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Query rejections, raised before any row is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("{operation} rejected: the database is read-only")]
    ReadOnly { operation: String },
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("no value bound for parameter {0}")]
    MissingParameter(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
