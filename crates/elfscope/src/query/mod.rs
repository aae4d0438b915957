//! Restricted SQL over the in-memory tables.
//!
//! Supported: `SELECT <* | columns | COUNT(*)> FROM table [WHERE expr]
//! [ORDER BY col [ASC|DESC], ...] [LIMIT n]` and, only while the read-only
//! guard is lifted, `DROP TABLE name`.

mod exec;
mod lexer;
mod parser;

use tracing::debug;

use crate::error::QueryError;
use crate::store::{Database, Rows, Value};
use lexer::{Lexer, Token};
use parser::{Parser, Statement};

const MUTATING_KEYWORDS: [&str; 6] = ["INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER"];

/// The mutating keyword `sql` starts with, if any. The first token is
/// checked whether bare or double-quoted.
#[must_use]
pub fn mutating_keyword(sql: &str) -> Option<&'static str> {
    let (_, token) = Lexer::new(sql).next_token();
    let (Token::Ident(word) | Token::QuotedIdent(word)) = token else {
        return None;
    };
    MUTATING_KEYWORDS
        .into_iter()
        .find(|k| k.eq_ignore_ascii_case(&word))
}

/// Parse and run one statement.
pub(crate) fn execute(
    database: &mut Database,
    read_only: bool,
    sql: &str,
    params: &[Value],
) -> Result<Rows, QueryError> {
    if read_only {
        if let Some(operation) = mutating_keyword(sql) {
            return Err(QueryError::ReadOnly {
                operation: operation.to_string(),
            });
        }
    }

    let parsed = Parser::new(sql).parse()?;
    exec::check_parameters(parsed.parameters, params)?;

    match parsed.statement {
        Statement::Select(select) => {
            let table = database
                .table(&select.table)
                .ok_or_else(|| QueryError::UnknownTable(select.table.clone()))?;
            let rows = exec::select(table, &select, params);
            debug!(table = %select.table, rows = rows.len(), "query");
            Ok(rows)
        }
        Statement::DropTable(_) if read_only => Err(QueryError::ReadOnly {
            operation: "DROP".to_string(),
        }),
        Statement::DropTable(name) => {
            database.drop_table(&name)?;
            debug!(table = %name, "table dropped");
            Ok(Rows::default())
        }
    }
}
