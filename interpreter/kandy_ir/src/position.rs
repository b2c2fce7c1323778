//! Source positions.

use std::fmt;

/// A location in the source text.
///
/// `offset` is a character index from the start of the source; `line` is
/// 1-based; `column` counts characters since the last newline.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Position {
    pub offset: u32,
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const START: Position = Position {
        offset: 0,
        line: 1,
        column: 0,
    };

    pub const fn new(offset: u32, line: u32, column: u32) -> Self {
        Position {
            offset,
            line,
            column,
        }
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.line, self.column, self.offset)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} column {}", self.line, self.column)
    }
}
