//! Number scanning.

use kandy_ir::{Token, TokenKind};

use crate::{LexError, Lexer};

impl Lexer {
    /// Scan an integer or float literal.
    ///
    /// `0x`/`0o`/`0b`/`0d` prefixes select the base; `_` separators are
    /// discarded; a leading `.digit` reads as `0.digit`; presence of `.` or
    /// an exponent yields a float.
    pub(crate) fn scan_number(&mut self) -> Result<Token, LexError> {
        let start = self.position();

        if self.current == Some('0')
            && matches!(
                self.peek_char().map(|c| c.to_ascii_lowercase()),
                Some('x' | 'o' | 'b' | 'd')
            )
        {
            self.advance();
            let base = match self.current.map(|c| c.to_ascii_lowercase()) {
                Some('x') => 16,
                Some('o') => 8,
                Some('b') => 2,
                _ => 10,
            };
            self.advance();

            let mut digits = String::new();
            while let Some(c) = self.current {
                if c == '_' {
                    self.advance();
                } else if c.is_digit(base) {
                    digits.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            if digits.is_empty() {
                return Err(LexError::InvalidNumber {
                    literal: format!("0{}", base_marker(base)),
                    pos: start,
                });
            }
            let value = i64::from_str_radix(&digits, base).map_err(|_| LexError::InvalidNumber {
                literal: digits.clone(),
                pos: start,
            })?;
            return Ok(Token::new(TokenKind::Int(value), start));
        }

        let mut literal = String::new();
        let mut has_dot = false;
        let mut has_exp = false;

        if self.current == Some('.') {
            literal.push_str("0.");
            has_dot = true;
            self.advance();
        }

        while let Some(c) = self.current {
            match c {
                '0'..='9' => {
                    literal.push(c);
                    self.advance();
                }
                '_' => {
                    self.advance();
                }
                '.' if !has_dot && !has_exp => {
                    literal.push('.');
                    has_dot = true;
                    self.advance();
                }
                'e' | 'E' if !has_exp => {
                    has_exp = true;
                    literal.push('e');
                    self.advance();
                    if let Some(sign @ ('+' | '-')) = self.current {
                        literal.push(sign);
                        self.advance();
                    }
                }
                _ => break,
            }
        }

        if has_dot || has_exp {
            let value: f64 = literal.parse().map_err(|_| LexError::InvalidNumber {
                literal: literal.clone(),
                pos: start,
            })?;
            Ok(Token::new(TokenKind::Float(value), start))
        } else {
            // Decimal literals too large for i64 keep their value as floats.
            match literal.parse::<i64>() {
                Ok(value) => Ok(Token::new(TokenKind::Int(value), start)),
                Err(_) => {
                    let value: f64 = literal.parse().map_err(|_| LexError::InvalidNumber {
                        literal: literal.clone(),
                        pos: start,
                    })?;
                    Ok(Token::new(TokenKind::Float(value), start))
                }
            }
        }
    }
}

fn base_marker(base: u32) -> char {
    match base {
        16 => 'x',
        8 => 'o',
        2 => 'b',
        _ => 'd',
    }
}
