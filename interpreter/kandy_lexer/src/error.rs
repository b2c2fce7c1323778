//! Lexer errors.

use kandy_ir::Position;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("Unrecognized character {found:?} at {pos}")]
    UnrecognizedChar { found: String, pos: Position },

    #[error("Invalid number literal {literal:?} at {pos}")]
    InvalidNumber { literal: String, pos: Position },

    #[error("Newline inside a single-delimiter string at {pos}")]
    NewlineInString { pos: Position },

    #[error("Unterminated string literal starting at {pos}")]
    UnterminatedString { pos: Position },
}

impl LexError {
    pub fn position(&self) -> Position {
        match self {
            LexError::UnrecognizedChar { pos, .. }
            | LexError::InvalidNumber { pos, .. }
            | LexError::NewlineInString { pos }
            | LexError::UnterminatedString { pos } => *pos,
        }
    }
}
