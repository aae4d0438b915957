//! `query` command.

use elfscope::{ElfParser, Value};

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS, OutputFormat};
use crate::terminal::{self, Table};

/// Bind a command-line parameter: integers (decimal or `0x` hex) become
/// numbers, everything else text.
fn parse_param(raw: &str) -> Value {
    let trimmed = raw.trim();
    let number = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => i128::from_str_radix(hex, 16).ok(),
        None => trimmed.parse().ok(),
    };
    number.map_or_else(|| Value::Text(raw.to_string()), Value::Int)
}

pub fn cmd_query(parser: &ElfParser, sql: &str, params: &[String], format: OutputFormat) -> i32 {
    let params: Vec<Value> = params.iter().map(|p| parse_param(p)).collect();
    let rows = match parser.query(sql, &params) {
        Ok(rows) => rows,
        Err(err) => {
            terminal::error(&err.to_string());
            return EXIT_FAILURE;
        }
    };

    match format {
        OutputFormat::Table => {
            let numeric: Vec<usize> = (0..rows.columns.len())
                .filter(|&i| rows.rows.first().is_some_and(|r| matches!(r[i], Value::Int(_))))
                .collect();
            let mut table = Table::new(rows.columns.iter().cloned()).right_aligned(&numeric);
            for row in &rows.rows {
                table.add_row(row.iter().map(ToString::to_string).collect());
            }
            table.print();
        }
        OutputFormat::Tsv => {
            println!("{}", rows.columns.join("\t"));
            for row in &rows.rows {
                let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
                println!("{}", cells.join("\t"));
            }
        }
    }
    EXIT_SUCCESS
}
