//! Statement evaluation over in-memory tables.

use std::cmp::Ordering;

use super::parser::{CompareOp, Expr, Projection, Select};
use crate::error::QueryError;
use crate::store::{Rows, Table, Value};

const COUNT_COLUMN: &str = "COUNT(*)";

/// Row context for expression evaluation.
struct Scope<'a> {
    table: &'a Table,
    row: &'a [Value],
    params: &'a [Value],
}

impl Scope<'_> {
    fn column(&self, name: &str) -> Value {
        self.table
            .column_index(name)
            .and_then(|i| self.row.get(i))
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn eval(&self, expr: &Expr) -> Value {
        match expr {
            Expr::Column(name) => self.column(name),
            Expr::Literal(v) => v.clone(),
            Expr::Param(i) => self.params.get(*i).cloned().unwrap_or(Value::Null),
            Expr::Neg(inner) => to_int(&self.eval(inner))
                .and_then(i128::checked_neg)
                .map_or(Value::Null, Value::Int),
            Expr::Not(inner) => from_truth(truth(&self.eval(inner)).map(|b| !b)),
            Expr::And(a, b) => {
                let (a, b) = (truth(&self.eval(a)), truth(&self.eval(b)));
                from_truth(match (a, b) {
                    (Some(false), _) | (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                })
            }
            Expr::Or(a, b) => {
                let (a, b) = (truth(&self.eval(a)), truth(&self.eval(b)));
                from_truth(match (a, b) {
                    (Some(true), _) | (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                })
            }
            Expr::Compare(op, a, b) => {
                let ordering = self.eval(a).compare(&self.eval(b));
                from_truth(ordering.map(|o| compare(*op, o)))
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let (value, pattern) = (self.eval(expr), self.eval(pattern));
                if value.is_null() || pattern.is_null() {
                    return Value::Null;
                }
                let matched = like(&pattern.to_string(), &value.to_string());
                from_truth(Some(matched != *negated))
            }
            Expr::IsNull { expr, negated } => {
                from_truth(Some(self.eval(expr).is_null() != *negated))
            }
        }
    }
}

fn compare(op: CompareOp, ordering: Ordering) -> bool {
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
    }
}

fn to_int(value: &Value) -> Option<i128> {
    match value {
        Value::Null => None,
        Value::Int(v) => Some(*v),
        Value::Text(s) => s.trim().parse().ok(),
    }
}

/// SQL truthiness: NULL is unknown, text counts as its numeric value.
fn truth(value: &Value) -> Option<bool> {
    match value {
        Value::Null => None,
        Value::Int(v) => Some(*v != 0),
        Value::Text(_) => Some(to_int(value).is_some_and(|v| v != 0)),
    }
}

fn from_truth(truth: Option<bool>) -> Value {
    truth.map_or(Value::Null, |b| Value::Int(i128::from(b)))
}

/// Case-insensitive `LIKE` with `%` and `_` wildcards.
pub fn like(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    let text: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();

    // matched[j]: pattern prefix seen so far matches text[..j]
    let mut matched = vec![false; text.len() + 1];
    matched[0] = true;
    for &p in &pattern {
        let mut next = vec![false; text.len() + 1];
        match p {
            '%' => {
                let mut any = false;
                for j in 0..=text.len() {
                    any |= matched[j];
                    next[j] = any;
                }
            }
            _ => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1] && (p == '_' || p == text[j - 1]);
                }
            }
        }
        matched = next;
    }
    matched[text.len()]
}

pub fn select(table: &Table, query: &Select, params: &[Value]) -> Rows {
    let mut rows: Vec<&Vec<Value>> = table
        .rows
        .iter()
        .filter(|row| {
            query.filter.as_ref().is_none_or(|filter| {
                let scope = Scope {
                    table,
                    row: row.as_slice(),
                    params,
                };
                truth(&scope.eval(filter)) == Some(true)
            })
        })
        .collect();

    if !query.order_by.is_empty() {
        let keys: Vec<(Option<usize>, bool)> = query
            .order_by
            .iter()
            .map(|k| (table.column_index(&k.column), k.descending))
            .collect();
        rows.sort_by(|a, b| {
            keys.iter()
                .filter_map(|&(index, descending)| {
                    let index = index?;
                    let ordering = a[index].sort_cmp(&b[index]);
                    Some(if descending { ordering.reverse() } else { ordering })
                })
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        });
    }

    let (columns, mut out): (Vec<String>, Vec<Vec<Value>>) = match &query.projection {
        Projection::Count => (
            vec![COUNT_COLUMN.to_string()],
            vec![vec![Value::Int(i128::try_from(rows.len()).unwrap_or(i128::MAX))]],
        ),
        Projection::All => (
            table.columns.clone(),
            rows.into_iter().cloned().collect(),
        ),
        Projection::Columns(names) => {
            let indices: Vec<Option<usize>> =
                names.iter().map(|n| table.column_index(n)).collect();
            let out = rows
                .into_iter()
                .map(|row| {
                    indices
                        .iter()
                        .map(|i| i.and_then(|i| row.get(i)).cloned().unwrap_or(Value::Null))
                        .collect()
                })
                .collect();
            (names.clone(), out)
        }
    };

    if let Some(limit) = query.limit {
        out.truncate(limit);
    }
    Rows { columns, rows: out }
}

/// Check that every placeholder has a bound value.
pub fn check_parameters(used: usize, params: &[Value]) -> Result<(), QueryError> {
    if used > params.len() {
        Err(QueryError::MissingParameter(params.len() + 1))
    } else {
        Ok(())
    }
}
