//! Recursive-descent parser producing a [`Statement`].

use std::mem;

use super::lexer::{Lexer, Token};
use crate::error::QueryError;
use crate::store::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    Select(Select),
    DropTable(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Select {
    pub projection: Projection,
    pub table: String,
    pub filter: Option<Expr>,
    pub order_by: Vec<OrderKey>,
    pub limit: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Projection {
    All,
    Columns(Vec<String>),
    Count,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderKey {
    pub column: String,
    pub descending: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Column(String),
    Literal(Value),
    /// Zero-based positional parameter.
    Param(usize),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
}

const RESERVED: [&str; 13] = [
    "SELECT", "FROM", "WHERE", "ORDER", "BY", "LIMIT", "AND", "OR", "NOT", "LIKE", "IS", "ASC",
    "DESC",
];

fn is_reserved(name: &str) -> bool {
    RESERVED.iter().any(|k| k.eq_ignore_ascii_case(name))
}

/// Parsed statement plus the number of `?` placeholders it uses.
#[derive(Debug)]
pub struct Parsed {
    pub statement: Statement,
    pub parameters: usize,
}

pub struct Parser<'input> {
    lexer: Lexer<'input>,
    current: (usize, Token),
    next: (usize, Token),
    parameters: usize,
}

impl<'input> Parser<'input> {
    pub fn new(input: &'input str) -> Self {
        let mut parser = Self {
            lexer: Lexer::new(input),
            current: (0, Token::End),
            next: (0, Token::End),
            parameters: 0,
        };
        parser.advance_token();
        parser.advance_token();
        parser
    }

    fn advance_token(&mut self) -> Token {
        let next = self.lexer.next_token();
        let cur = mem::replace(&mut self.next, next);
        mem::replace(&mut self.current, cur).1
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, QueryError> {
        let message = match &self.current.1 {
            Token::Invalid(reason) => reason.clone(),
            _ => message.into(),
        };
        Err(QueryError::Syntax {
            offset: self.current.0,
            message,
        })
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.current.1.is_keyword(word) {
            self.advance_token();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<(), QueryError> {
        if self.eat_keyword(word) {
            Ok(())
        } else {
            self.error(format!("expected {word}"))
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<(), QueryError> {
        if &self.current.1 == token {
            self.advance_token();
            Ok(())
        } else {
            self.error(format!("expected {what}"))
        }
    }

    fn identifier(&mut self, what: &str) -> Result<String, QueryError> {
        match &self.current.1 {
            Token::Ident(name) if !is_reserved(name) => {
                let name = name.clone();
                self.advance_token();
                Ok(name)
            }
            Token::QuotedIdent(name) => {
                let name = name.clone();
                self.advance_token();
                Ok(name)
            }
            _ => self.error(format!("expected {what}")),
        }
    }

    pub fn parse(mut self) -> Result<Parsed, QueryError> {
        let statement = if self.eat_keyword("SELECT") {
            Statement::Select(self.parse_select()?)
        } else if self.eat_keyword("DROP") {
            self.expect_keyword("TABLE")?;
            Statement::DropTable(self.identifier("table name")?)
        } else {
            return self.error("expected SELECT");
        };

        if self.current.1 == Token::Semicolon {
            self.advance_token();
        }
        if self.current.1 != Token::End {
            return self.error("unexpected input after statement");
        }
        Ok(Parsed {
            statement,
            parameters: self.parameters,
        })
    }

    fn parse_select(&mut self) -> Result<Select, QueryError> {
        let projection = self.parse_projection()?;
        self.expect_keyword("FROM")?;
        let table = self.identifier("table name")?;

        let filter = if self.eat_keyword("WHERE") {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let mut order_by = Vec::new();
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let column = self.identifier("column name")?;
                let descending = if self.eat_keyword("DESC") {
                    true
                } else {
                    self.eat_keyword("ASC");
                    false
                };
                order_by.push(OrderKey { column, descending });
                if self.current.1 != Token::Comma {
                    break;
                }
                self.advance_token();
            }
        }

        let limit = if self.eat_keyword("LIMIT") {
            match self.current.1 {
                Token::Int(n) => {
                    let Ok(n) = usize::try_from(n) else {
                        return self.error("LIMIT out of range");
                    };
                    self.advance_token();
                    Some(n)
                }
                _ => return self.error("expected row count"),
            }
        } else {
            None
        };

        Ok(Select {
            projection,
            table,
            filter,
            order_by,
            limit,
        })
    }

    fn parse_projection(&mut self) -> Result<Projection, QueryError> {
        if self.current.1 == Token::Star {
            self.advance_token();
            return Ok(Projection::All);
        }
        if self.current.1.is_keyword("COUNT") && self.next.1 == Token::LParen {
            self.advance_token();
            self.advance_token();
            self.expect(&Token::Star, "'*'")?;
            self.expect(&Token::RParen, "')'")?;
            return Ok(Projection::Count);
        }
        let mut columns = vec![self.identifier("column name")?];
        while self.current.1 == Token::Comma {
            self.advance_token();
            columns.push(self.identifier("column name")?);
        }
        Ok(Projection::Columns(columns))
    }

    fn parse_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("OR") {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("AND") {
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, QueryError> {
        if self.eat_keyword("NOT") {
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_predicate()
    }

    fn parse_predicate(&mut self) -> Result<Expr, QueryError> {
        let left = self.parse_operand()?;

        let op = match self.current.1 {
            Token::Eq => Some(CompareOp::Eq),
            Token::NotEq => Some(CompareOp::Ne),
            Token::Lt => Some(CompareOp::Lt),
            Token::Le => Some(CompareOp::Le),
            Token::Gt => Some(CompareOp::Gt),
            Token::Ge => Some(CompareOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            self.advance_token();
            let right = self.parse_operand()?;
            return Ok(Expr::Compare(op, Box::new(left), Box::new(right)));
        }

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(Expr::IsNull {
                expr: Box::new(left),
                negated,
            });
        }

        let negated = self.current.1.is_keyword("NOT") && self.next.1.is_keyword("LIKE");
        if negated {
            self.advance_token();
        }
        if self.eat_keyword("LIKE") {
            let pattern = self.parse_operand()?;
            return Ok(Expr::Like {
                expr: Box::new(left),
                pattern: Box::new(pattern),
                negated,
            });
        }
        Ok(left)
    }

    fn parse_operand(&mut self) -> Result<Expr, QueryError> {
        let expr = match &self.current.1 {
            Token::Minus => {
                self.advance_token();
                return Ok(Expr::Neg(Box::new(self.parse_operand()?)));
            }
            Token::LParen => {
                self.advance_token();
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen, "')'")?;
                return Ok(inner);
            }
            Token::Int(v) => Expr::Literal(Value::Int(*v)),
            Token::Str(s) => Expr::Literal(Value::Text(s.clone())),
            Token::Param => {
                self.parameters += 1;
                Expr::Param(self.parameters - 1)
            }
            Token::Ident(name) if name.eq_ignore_ascii_case("NULL") => Expr::Literal(Value::Null),
            Token::Ident(name) if !is_reserved(name) => Expr::Column(name.clone()),
            Token::QuotedIdent(name) => Expr::Column(name.clone()),
            _ => return self.error("expected a value"),
        };
        self.advance_token();
        Ok(expr)
    }
}
