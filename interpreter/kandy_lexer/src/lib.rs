//! Lexer for KandyScript.
//!
//! A hand-written character scanner producing one token per
//! [`Lexer::next_token`] call. The position can be rewound to any previously
//! observed token offset with [`Lexer::back`], which the parser uses for
//! one-token lookahead with replay.

mod error;
mod number;
mod string;

pub use error::LexError;

use kandy_ir::{Position, Token, TokenKind};

/// Saved scanner state, restored by [`Lexer::restore`].
#[derive(Copy, Clone, Debug)]
pub struct LexState {
    pos: usize,
    line: u32,
    column: u32,
    current: Option<char>,
}

/// The scanner. `pos` always points one past the current character.
pub struct Lexer {
    text: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    current: Option<char>,
}

impl Default for Lexer {
    fn default() -> Self {
        Lexer::new()
    }
}

impl Lexer {
    pub fn new() -> Self {
        Lexer {
            text: Vec::new(),
            pos: 0,
            line: 1,
            column: 0,
            current: None,
        }
    }

    /// Load a fresh source text and prime the first character.
    pub fn load(&mut self, text: &str) {
        self.text = text.chars().collect();
        self.pos = 0;
        self.line = 1;
        self.column = 0;
        self.current = None;
        self.advance();
    }

    /// Character offset of the current (already read) character.
    fn current_offset(&self) -> u32 {
        self.pos.saturating_sub(1) as u32
    }

    fn position(&self) -> Position {
        Position::new(self.current_offset(), self.line, self.column)
    }

    /// Rewind so the next scan starts at character `offset`.
    ///
    /// Line and column are recomputed from the prefix, so re-lexing from a
    /// rewound position yields tokens equal to the original pass.
    pub fn back(&mut self, offset: u32) {
        let offset = offset as usize;
        self.line = 1;
        self.column = 0;
        for &c in self.text.iter().take(offset) {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        self.pos = offset;
        self.current = None;
        self.advance();
    }

    /// Snapshot the scanner state for speculative scanning.
    pub fn state(&self) -> LexState {
        LexState {
            pos: self.pos,
            line: self.line,
            column: self.column,
            current: self.current,
        }
    }

    /// Restore a snapshot taken with [`Lexer::state`].
    pub fn restore(&mut self, state: LexState) {
        self.pos = state.pos;
        self.line = state.line;
        self.column = state.column;
        self.current = state.current;
    }

    /// The source text from character `offset` to the end.
    pub fn text_from(&self, offset: u32) -> String {
        self.text
            .get(offset as usize..)
            .map(|chars| chars.iter().collect())
            .unwrap_or_default()
    }

    /// The source text before character `offset`.
    pub fn text_until(&self, offset: u32) -> String {
        let end = (offset as usize).min(self.text.len());
        self.text[..end].iter().collect()
    }

    fn advance(&mut self) {
        if self.pos >= self.text.len() {
            self.current = None;
        } else {
            let c = self.text[self.pos];
            self.current = Some(c);
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
    }

    /// Peek at the next `count` characters without consuming them.
    fn peek(&self, count: usize) -> String {
        self.text
            .iter()
            .skip(self.pos)
            .take(count)
            .collect()
    }

    fn peek_char(&self) -> Option<char> {
        self.text.get(self.pos).copied()
    }

    fn error<T>(&self, found: &str) -> Result<T, LexError> {
        Err(LexError::UnrecognizedChar {
            found: found.to_string(),
            pos: self.position(),
        })
    }

    /// Scan the next token.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        while let Some(c) = self.current {
            match c {
                ' ' | '\r' | '\n' | '\t' => {
                    self.skip_whitespace();
                }
                '#' => {
                    self.skip_comment();
                }
                _ if c.is_ascii_digit()
                    || (c == '.' && self.peek_char().is_some_and(|p| p.is_ascii_digit())) =>
                {
                    return self.scan_number();
                }
                'r' | 'p' | 'b' | 'n' | 'f' | 'R' | 'P' | 'B' | 'N' | 'F'
                    if matches!(self.peek_char(), Some('\'') | Some('"')) =>
                {
                    return self.scan_string();
                }
                '\'' | '"' => {
                    return self.scan_string();
                }
                _ if c.is_alphabetic() || c == '_' => {
                    return Ok(self.scan_identifier());
                }
                _ => {
                    return self.scan_operator(c);
                }
            }
        }

        Ok(Token::new(
            TokenKind::Eof,
            Position::new(self.pos as u32, self.line, self.column),
        ))
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current, Some(' ' | '\r' | '\n' | '\t')) {
            self.advance();
        }
    }

    /// `# ...` to end of line, or non-nested `#* ... *#`.
    fn skip_comment(&mut self) {
        self.advance();
        if self.current == Some('*') {
            while self.current.is_some() {
                self.advance();
                if self.current == Some('*') && self.peek(1) == "#" {
                    self.advance();
                    self.advance();
                    break;
                }
            }
        } else {
            while !matches!(self.current, None | Some('\n')) {
                self.advance();
            }
        }
    }

    fn scan_identifier(&mut self) -> Token {
        let start = self.position();
        let mut name = String::new();
        while let Some(c) = self.current {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let kind = match name.as_str() {
            "None" => TokenKind::NoneLit,
            "True" => TokenKind::Bool(true),
            "False" => TokenKind::Bool(false),
            "Undefined" => TokenKind::UndefinedLit,
            _ => TokenKind::keyword(&name).unwrap_or(TokenKind::Ident(name)),
        };
        Token::new(kind, start)
    }

    fn scan_operator(&mut self, c: char) -> Result<Token, LexError> {
        let start = self.position();
        let pair: String = [Some(c), self.peek_char()].iter().flatten().collect();

        let two = match pair.as_str() {
            "==" => Some(TokenKind::EqEq),
            "!=" => Some(TokenKind::NotEq),
            ">=" => Some(TokenKind::GtEq),
            "<=" => Some(TokenKind::LtEq),
            "<<" => Some(TokenKind::Shl),
            ">>" => Some(TokenKind::Shr),
            "=>" => Some(TokenKind::Arrow),
            "**" => Some(TokenKind::StarStar),
            "%%" => Some(TokenKind::PercentPercent),
            "//" => Some(TokenKind::SlashSlash),
            ":=" => Some(TokenKind::ExprAssign),
            "?=" => Some(TokenKind::QuestionAssign),
            _ => None,
        };
        if let Some(kind) = two {
            self.advance();
            self.advance();
            return Ok(Token::new(kind, start));
        }

        let one = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '|' => TokenKind::BitOr,
            '&' => TokenKind::BitAnd,
            '^' => TokenKind::BitXor,
            '~' => TokenKind::BitNot,
            '@' => TokenKind::At,
            '=' => TokenKind::Assign,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semi,
            ':' => TokenKind::Colon,
            '?' => TokenKind::Question,
            '!' => TokenKind::Bang,
            '$' => TokenKind::Dollar,
            _ => return self.error(&c.to_string()),
        };
        self.advance();
        Ok(Token::new(one, start))
    }
}

#[cfg(test)]
mod tests;
