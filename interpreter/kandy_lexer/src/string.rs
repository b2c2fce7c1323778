//! String scanning: prefixes, escapes, and interpolation capture.

use kandy_ir::{StrFlavor, StringLiteral, Token, TokenKind};

use crate::{LexError, Lexer};

impl Lexer {
    /// Scan a string or bytes literal.
    ///
    /// Interpolation slots (`$name` and balanced `{expr}`) are replaced in
    /// the content by `{exprN}` placeholders; the raw slot sources are kept
    /// on the token and re-parsed lazily by the evaluator.
    pub(crate) fn scan_string(&mut self) -> Result<Token, LexError> {
        let start = self.position();

        let mut is_bytes = false;
        let mut flavor = StrFlavor::Format;
        if let Some(c) = self.current {
            match c.to_ascii_lowercase() {
                'b' => {
                    is_bytes = true;
                    self.advance();
                }
                'r' => {
                    flavor = StrFlavor::Raw;
                    self.advance();
                }
                'p' => {
                    flavor = StrFlavor::Path;
                    self.advance();
                }
                'n' => {
                    flavor = StrFlavor::Normal;
                    self.advance();
                }
                'f' => {
                    flavor = StrFlavor::Format;
                    self.advance();
                }
                _ => {}
            }
        }

        let Some(quote) = self.current else {
            return Err(LexError::UnterminatedString { pos: start });
        };
        self.advance();
        let mut triple = false;
        if self.current == Some(quote) && self.peek(1) == quote.to_string() {
            triple = true;
            self.advance();
            self.advance();
        }

        let mut content = String::new();
        let mut exprs: Vec<(String, String)> = Vec::new();
        let escapes_allowed = !matches!(flavor, StrFlavor::Path | StrFlavor::Raw);
        // `$name` works everywhere but raw/normal; `{expr}` only in format.
        let dollar_slots = !matches!(flavor, StrFlavor::Raw | StrFlavor::Normal);
        let brace_slots = matches!(flavor, StrFlavor::Format);

        loop {
            let Some(c) = self.current else {
                return Err(LexError::UnterminatedString { pos: start });
            };

            // Closing delimiter.
            if c == quote {
                if triple {
                    if self.peek(2) == format!("{quote}{quote}") {
                        self.advance();
                        self.advance();
                        self.advance();
                        break;
                    }
                } else {
                    self.advance();
                    break;
                }
            }

            if c == '\\' && escapes_allowed {
                self.scan_escape(&mut content)?;
                continue;
            }

            if c == '\n' && !triple {
                return Err(LexError::NewlineInString {
                    pos: self.position(),
                });
            }

            // `$name` slot.
            if c == '$' && dollar_slots {
                self.advance();
                let mut source = String::new();
                while let Some(c) = self.current {
                    if c.is_alphanumeric() || c == '_' {
                        source.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
                push_slot(&mut content, &mut exprs, source);
                continue;
            }

            // `{ expr }` slot with brace-depth tracking.
            if c == '{' && brace_slots {
                self.advance();
                let mut source = String::new();
                let mut depth = 1usize;
                loop {
                    let Some(c) = self.current else {
                        return Err(LexError::UnterminatedString { pos: start });
                    };
                    if c == quote && (!triple || self.peek(2) == format!("{quote}{quote}")) {
                        break;
                    }
                    if c == '\n' && !triple {
                        return Err(LexError::NewlineInString {
                            pos: self.position(),
                        });
                    }
                    if c == '}' {
                        depth -= 1;
                        if depth == 0 {
                            self.advance();
                            break;
                        }
                    } else if c == '{' {
                        depth += 1;
                    }
                    source.push(c);
                    self.advance();
                }
                push_slot(&mut content, &mut exprs, source);
                continue;
            }

            content.push(c);
            self.advance();
        }

        let literal = StringLiteral {
            flavor,
            quote,
            triple,
            content,
            exprs,
        };
        let kind = if is_bytes {
            TokenKind::Bytes(literal)
        } else {
            TokenKind::Str(literal)
        };
        Ok(Token::new(kind, start))
    }

    /// Consume a `\\`-escape and append its expansion.
    fn scan_escape(&mut self, content: &mut String) -> Result<(), LexError> {
        let escape_pos = self.position();
        self.advance(); // consume the backslash
        let Some(c) = self.current else {
            return Err(LexError::UnterminatedString { pos: escape_pos });
        };
        match c {
            'x' => {
                self.advance();
                let mut hex = String::new();
                for _ in 0..2 {
                    let Some(d) = self.current else {
                        return Err(LexError::UnterminatedString { pos: escape_pos });
                    };
                    hex.push(d);
                    self.advance();
                }
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => content.push(decoded),
                    None => content.push('?'),
                }
            }
            'u' => {
                self.advance();
                let mut hex = String::new();
                for _ in 0..4 {
                    let Some(d) = self.current else {
                        return Err(LexError::UnterminatedString { pos: escape_pos });
                    };
                    hex.push(d);
                    self.advance();
                }
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => content.push(decoded),
                    None => content.push('?'),
                }
            }
            _ => {
                let expansion = match c {
                    '\'' => "'",
                    '"' => "\"",
                    'n' => "\n",
                    't' => "\t",
                    'r' => "\r",
                    'a' => "\x07",
                    'b' => "\x08",
                    'v' => "\x0b",
                    '\\' => "\\",
                    // Line continuation: the escaped newline disappears.
                    '\r' | '\n' => "",
                    '\t' => "    ",
                    '{' => "{",
                    '}' => "}",
                    '$' => "$",
                    _ => "?",
                };
                content.push_str(expansion);
                self.advance();
            }
        }
        Ok(())
    }
}

fn push_slot(content: &mut String, exprs: &mut Vec<(String, String)>, source: String) {
    let name = format!("expr{}", exprs.len());
    content.push('{');
    content.push_str(&name);
    content.push('}');
    exprs.push((name, source));
}
