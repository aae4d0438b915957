//! Tokenizer for the query language.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// Bare identifier. Keywords are identifiers too and are matched
    /// case-insensitively by the parser.
    Ident(String),
    /// Double-quoted identifier; never a keyword.
    QuotedIdent(String),
    Str(String),
    Int(i128),
    Param,
    Star,
    Comma,
    LParen,
    RParen,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Minus,
    Semicolon,
    Invalid(String),
    End,
}

impl Token {
    /// Whether this is the keyword `word`.
    pub fn is_keyword(&self, word: &str) -> bool {
        matches!(self, Self::Ident(s) if s.eq_ignore_ascii_case(word))
    }
}

pub struct Lexer<'input> {
    input: &'input [u8],
    current_pos: usize,
}

impl<'input> Lexer<'input> {
    pub const fn new(input: &'input str) -> Self {
        Self {
            input: input.as_bytes(),
            current_pos: 0,
        }
    }

    fn peek_next_char(&self) -> Option<u8> {
        self.input.get(self.current_pos).copied()
    }

    /// Next token and the byte offset it starts at.
    pub fn next_token(&mut self) -> (usize, Token) {
        self.eat_whitespace();
        let start = self.current_pos;

        let Some(cur) = self.peek_next_char() else {
            return (start, Token::End);
        };
        self.current_pos += 1;

        let token = match cur {
            b'*' => Token::Star,
            b',' => Token::Comma,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'?' => Token::Param,
            b'-' => Token::Minus,
            b';' => Token::Semicolon,
            b'=' => {
                if self.peek_next_char() == Some(b'=') {
                    self.current_pos += 1;
                }
                Token::Eq
            }
            b'!' => {
                if self.peek_next_char() == Some(b'=') {
                    self.current_pos += 1;
                    Token::NotEq
                } else {
                    Token::Invalid("expected '=' after '!'".into())
                }
            }
            b'<' => match self.peek_next_char() {
                Some(b'=') => {
                    self.current_pos += 1;
                    Token::Le
                }
                Some(b'>') => {
                    self.current_pos += 1;
                    Token::NotEq
                }
                _ => Token::Lt,
            },
            b'>' => {
                if self.peek_next_char() == Some(b'=') {
                    self.current_pos += 1;
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            b'\'' => self.get_quoted(b'\'').map_or_else(
                || Token::Invalid("unterminated string".into()),
                Token::Str,
            ),
            b'"' => self.get_quoted(b'"').map_or_else(
                || Token::Invalid("unterminated identifier".into()),
                Token::QuotedIdent,
            ),
            c if c.is_ascii_digit() => {
                self.current_pos -= 1;
                self.get_number()
            }
            c if is_ident_start(c) => {
                self.current_pos -= 1;
                Token::Ident(self.get_ident())
            }
            c => Token::Invalid(format!("unexpected character '{}'", char::from(c))),
        };
        (start, token)
    }

    fn eat_whitespace(&mut self) {
        while self.peek_next_char().is_some_and(|c| c.is_ascii_whitespace()) {
            self.current_pos += 1;
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'input [u8] {
        let input = self.input;
        let start = self.current_pos;
        while self.peek_next_char().is_some_and(&pred) {
            self.current_pos += 1;
        }
        &input[start..self.current_pos]
    }

    fn get_ident(&mut self) -> String {
        let bytes = self.take_while(is_ident_char);
        String::from_utf8_lossy(bytes).into_owned()
    }

    fn get_number(&mut self) -> Token {
        let hex = self.input[self.current_pos..].starts_with(b"0x")
            || self.input[self.current_pos..].starts_with(b"0X");
        let (digits, radix) = if hex {
            self.current_pos += 2;
            (self.take_while(|c| c.is_ascii_hexdigit()), 16)
        } else {
            (self.take_while(|c| c.is_ascii_digit()), 10)
        };
        if self.peek_next_char().is_some_and(is_ident_char) {
            return Token::Invalid("malformed number".into());
        }
        std::str::from_utf8(digits)
            .ok()
            .and_then(|d| i128::from_str_radix(d, radix).ok())
            .map_or_else(|| Token::Invalid("malformed number".into()), Token::Int)
    }

    /// Quoted text after the opening quote; a doubled quote is a literal one.
    fn get_quoted(&mut self, quote: u8) -> Option<String> {
        let mut bytes = Vec::new();
        loop {
            let cur = self.peek_next_char()?;
            self.current_pos += 1;
            if cur == quote {
                if self.peek_next_char() == Some(quote) {
                    self.current_pos += 1;
                } else {
                    return Some(String::from_utf8_lossy(&bytes).into_owned());
                }
            }
            bytes.push(cur);
        }
    }
}

const fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

const fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'.'
}
