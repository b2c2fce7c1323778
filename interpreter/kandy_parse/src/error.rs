//! Parser errors.

use kandy_ir::Position;
use kandy_lexer::LexError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    /// The parser expected a specific token kind and found another.
    #[error("Unexpected token: expected {expected}, found {found} at {pos}")]
    UnexpectedToken {
        expected: String,
        found: String,
        pos: Position,
    },

    /// A construct that lexes and parses but violates a grammar-level rule.
    #[error("{message} (at {pos})")]
    InvalidSyntax { message: String, pos: Position },
}

impl ParseError {
    pub fn position(&self) -> Position {
        match self {
            ParseError::Lex(err) => err.position(),
            ParseError::UnexpectedToken { pos, .. } | ParseError::InvalidSyntax { pos, .. } => *pos,
        }
    }
}
