//! Recursive-descent parser for KandyScript.
//!
//! The parser drives a rewindable [`Lexer`] with a single token of state.
//! Tentative parses (postfix `if` expressions, declaration-vs-expression
//! statements) roll back by rewinding the lexer to a previously observed
//! token and replaying.
//!
//! # Module structure
//!
//! - `lib.rs`: parser core (token navigation, entry points)
//! - `grammar/stmt.rs`: statement dispatcher and statement productions
//! - `grammar/expr.rs`: precedence cascade and primary expressions

mod error;
mod grammar;

pub use error::ParseError;

use kandy_ir::{Expr, Position, ReturnMode, Stmt, StmtKind, Token, TokenKind};
use kandy_lexer::{LexState, Lexer};

/// Result of parsing one interpolation slot: the leading expression plus the
/// raw text the expression did not consume (a `:format` spec or the `=`
/// sentinel of the debug-print form).
#[derive(Debug, Clone, PartialEq)]
pub struct InterpParse {
    pub expr: Expr,
    /// Source consumed by the expression.
    pub consumed: String,
    /// Unconsumed trailing source; empty when the expression used it all.
    pub rest: String,
}

/// Parse a full program into a compound statement.
pub fn parse_program(text: &str) -> Result<Stmt, ParseError> {
    Parser::new(text)?.program()
}

/// Parse a single expression; trailing tokens are an error.
pub fn parse_expression(text: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(text)?;
    let expr = parser.expression()?;
    parser.eat(&TokenKind::Eof)?;
    Ok(expr)
}

/// Parse the leading expression of an interpolation slot, keeping whatever
/// raw source remains after it.
pub fn parse_interpolation(source: &str) -> Result<InterpParse, ParseError> {
    let mut parser = Parser::new(source)?;
    let expr = parser.expression()?;
    if parser.current.kind == TokenKind::Eof {
        Ok(InterpParse {
            expr,
            consumed: source.to_string(),
            rest: String::new(),
        })
    } else {
        let offset = parser.current.pos.offset;
        Ok(InterpParse {
            expr,
            consumed: parser.lexer.text_until(offset),
            rest: parser.lexer.text_from(offset),
        })
    }
}

/// The parser: a lexer plus the current token.
pub struct Parser {
    lexer: Lexer,
    current: Token,
}

impl Parser {
    pub fn new(text: &str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new();
        lexer.load(text);
        let current = lexer.next_token()?;
        Ok(Parser { lexer, current })
    }

    /// Parse `program: statement_list EOF`.
    pub fn program(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.current.pos;
        let body = self.statement_list()?;
        self.eat(&TokenKind::Eof)?;
        Ok(Stmt::new(
            StmtKind::Compound {
                body,
                mode: ReturnMode::Unwrap,
            },
            pos,
        ))
    }

    pub(crate) fn pos(&self) -> Position {
        self.current.pos
    }

    /// Validate the current token kind and step to the next one.
    pub(crate) fn eat(&mut self, kind: &TokenKind) -> Result<Token, ParseError> {
        if self.current.kind.same_kind(kind) {
            let next = self.lexer.next_token()?;
            Ok(std::mem::replace(&mut self.current, next))
        } else {
            Err(ParseError::UnexpectedToken {
                expected: kind.display_name().to_string(),
                found: self.current.kind.display_name().to_string(),
                pos: self.current.pos,
            })
        }
    }

    /// Step unconditionally, returning the consumed token.
    pub(crate) fn advance(&mut self) -> Result<Token, ParseError> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    #[inline]
    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.current.kind.same_kind(kind)
    }

    /// Consume an identifier, returning its name.
    pub(crate) fn ident(&mut self) -> Result<(String, Position), ParseError> {
        match &self.current.kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                let pos = self.current.pos;
                self.advance()?;
                Ok((name, pos))
            }
            other => Err(ParseError::UnexpectedToken {
                expected: "identifier".to_string(),
                found: other.display_name().to_string(),
                pos: self.current.pos,
            }),
        }
    }

    /// Look at the next `count` tokens without consuming them.
    pub(crate) fn peek(&mut self, count: usize) -> Result<Vec<TokenKind>, ParseError> {
        let snapshot = self.snapshot();
        let mut kinds = Vec::with_capacity(count);
        for _ in 0..count {
            match self.lexer.next_token() {
                Ok(token) => kinds.push(token.kind),
                Err(err) => {
                    self.restore(snapshot);
                    return Err(err.into());
                }
            }
        }
        self.restore(snapshot);
        Ok(kinds)
    }

    fn snapshot(&self) -> (LexState, Token) {
        (self.lexer.state(), self.current.clone())
    }

    fn restore(&mut self, snapshot: (LexState, Token)) {
        self.lexer.restore(snapshot.0);
        self.current = snapshot.1;
    }

    /// Rewind the lexer so `token` becomes current again.
    pub(crate) fn back_to(&mut self, token: &Token) -> Result<(), ParseError> {
        tracing::trace!(offset = token.pos.offset, "parser backtrack");
        self.lexer.back(token.pos.offset);
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    pub(crate) fn invalid<T>(&self, message: impl Into<String>) -> Result<T, ParseError> {
        Err(ParseError::InvalidSyntax {
            message: message.into(),
            pos: self.current.pos,
        })
    }
}

#[cfg(test)]
mod tests;
