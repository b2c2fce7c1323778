//! Runtime error values and the exception class tree.
//!
//! ```text
//! BaseException
//! +-- SystemExit
//! +-- KeyboardInterrupt
//! +-- Exception
//!     +-- LexerError
//!     +-- ParserError
//!     |   +-- SyntaxError
//!     +-- SemanticError
//!     +-- InterpreterError
//!     +-- Protect
//!     +-- (host-layer classes: TypeError, NameError, ValueError, ...)
//! ```

use kandy_ir::Position;
use kandy_parse::ParseError;
use thiserror::Error;

/// Exception classes, matchable from scripts by name through `Errors`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ExcClass {
    BaseException,
    SystemExit,
    KeyboardInterrupt,
    Exception,
    LexerError,
    ParserError,
    SyntaxError,
    SemanticError,
    InterpreterError,
    Protect,
    // Host-layer classes surfaced directly to scripts.
    TypeError,
    NameError,
    ValueError,
    ZeroDivisionError,
    IndexError,
    KeyError,
    AttributeError,
    StopIteration,
    ModuleNotFoundError,
    OverflowError,
    IOError,
}

impl ExcClass {
    pub const ALL: [ExcClass; 21] = [
        ExcClass::BaseException,
        ExcClass::SystemExit,
        ExcClass::KeyboardInterrupt,
        ExcClass::Exception,
        ExcClass::LexerError,
        ExcClass::ParserError,
        ExcClass::SyntaxError,
        ExcClass::SemanticError,
        ExcClass::InterpreterError,
        ExcClass::Protect,
        ExcClass::TypeError,
        ExcClass::NameError,
        ExcClass::ValueError,
        ExcClass::ZeroDivisionError,
        ExcClass::IndexError,
        ExcClass::KeyError,
        ExcClass::AttributeError,
        ExcClass::StopIteration,
        ExcClass::ModuleNotFoundError,
        ExcClass::OverflowError,
        ExcClass::IOError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExcClass::BaseException => "BaseException",
            ExcClass::SystemExit => "SystemExit",
            ExcClass::KeyboardInterrupt => "KeyboardInterrupt",
            ExcClass::Exception => "Exception",
            ExcClass::LexerError => "LexerError",
            ExcClass::ParserError => "ParserError",
            ExcClass::SyntaxError => "SyntaxError",
            ExcClass::SemanticError => "SemanticError",
            ExcClass::InterpreterError => "InterpreterError",
            ExcClass::Protect => "Protect",
            ExcClass::TypeError => "TypeError",
            ExcClass::NameError => "NameError",
            ExcClass::ValueError => "ValueError",
            ExcClass::ZeroDivisionError => "ZeroDivisionError",
            ExcClass::IndexError => "IndexError",
            ExcClass::KeyError => "KeyError",
            ExcClass::AttributeError => "AttributeError",
            ExcClass::StopIteration => "StopIteration",
            ExcClass::ModuleNotFoundError => "ModuleNotFoundError",
            ExcClass::OverflowError => "OverflowError",
            ExcClass::IOError => "IOError",
        }
    }

    fn parent(self) -> Option<ExcClass> {
        match self {
            ExcClass::BaseException => None,
            ExcClass::SystemExit | ExcClass::KeyboardInterrupt | ExcClass::Exception => {
                Some(ExcClass::BaseException)
            }
            ExcClass::SyntaxError => Some(ExcClass::ParserError),
            _ => Some(ExcClass::Exception),
        }
    }

    /// Subtype test used by `except` clause matching.
    pub fn is_subclass(self, of: ExcClass) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class == of {
                return true;
            }
            current = class.parent();
        }
        false
    }
}

/// A raised error: class, message, and the source position when known.
#[derive(Error, Clone, Debug, PartialEq)]
#[error("{}: {}", .class.name(), .message)]
pub struct KandyError {
    pub class: ExcClass,
    pub message: String,
    pub pos: Option<Position>,
}

impl KandyError {
    pub fn new(class: ExcClass, message: impl Into<String>) -> Self {
        KandyError {
            class,
            message: message.into(),
            pos: None,
        }
    }

    pub fn at(mut self, pos: Position) -> Self {
        self.pos.get_or_insert(pos);
        self
    }
}

impl From<ParseError> for KandyError {
    fn from(err: ParseError) -> Self {
        let pos = err.position();
        let class = match err {
            ParseError::Lex(_) => ExcClass::LexerError,
            ParseError::UnexpectedToken { .. } => ExcClass::SyntaxError,
            ParseError::InvalidSyntax { .. } => ExcClass::SyntaxError,
        };
        KandyError::new(class, err.to_string()).at(pos)
    }
}

pub type EvalResult<T> = Result<T, KandyError>;

// Error constructors, one per failure mode.

pub fn type_error(message: impl Into<String>) -> KandyError {
    KandyError::new(ExcClass::TypeError, message)
}

pub fn name_error(name: &str) -> KandyError {
    KandyError::new(ExcClass::NameError, format!("name '{name}' is not defined"))
}

pub fn value_error(message: impl Into<String>) -> KandyError {
    KandyError::new(ExcClass::ValueError, message)
}

pub fn zero_division() -> KandyError {
    KandyError::new(ExcClass::ZeroDivisionError, "division by zero")
}

pub fn modulo_zero() -> KandyError {
    KandyError::new(ExcClass::ZeroDivisionError, "integer modulo by zero")
}

pub fn index_error(message: impl Into<String>) -> KandyError {
    KandyError::new(ExcClass::IndexError, message)
}

pub fn key_error(key_repr: &str) -> KandyError {
    KandyError::new(ExcClass::KeyError, key_repr.to_string())
}

pub fn attribute_error(type_name: &str, attr: &str) -> KandyError {
    KandyError::new(
        ExcClass::AttributeError,
        format!("'{type_name}' object has no attribute '{attr}'"),
    )
}

pub fn protect_error() -> KandyError {
    KandyError::new(
        ExcClass::Protect,
        "Access denied to edit values in this space.",
    )
}

pub fn interpreter_error(message: impl Into<String>) -> KandyError {
    KandyError::new(ExcClass::InterpreterError, message)
}

pub fn syntax_error(message: impl Into<String>) -> KandyError {
    KandyError::new(ExcClass::SyntaxError, message)
}

pub fn stop_iteration() -> KandyError {
    KandyError::new(ExcClass::StopIteration, "")
}

pub fn module_not_found(name: &str) -> KandyError {
    KandyError::new(
        ExcClass::ModuleNotFoundError,
        format!("No module named '{name}'"),
    )
}

pub fn overflow_error(operation: &str) -> KandyError {
    KandyError::new(
        ExcClass::OverflowError,
        format!("integer overflow in {operation}"),
    )
}

pub fn io_error(message: impl Into<String>) -> KandyError {
    KandyError::new(ExcClass::IOError, message)
}

pub fn not_iterable(type_name: &str) -> KandyError {
    type_error(format!("'{type_name}' object is not iterable"))
}

pub fn not_callable(type_name: &str) -> KandyError {
    type_error(format!("'{type_name}' object is not callable"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtype_chain() {
        assert!(ExcClass::SyntaxError.is_subclass(ExcClass::ParserError));
        assert!(ExcClass::SyntaxError.is_subclass(ExcClass::Exception));
        assert!(ExcClass::SyntaxError.is_subclass(ExcClass::BaseException));
        assert!(!ExcClass::SyntaxError.is_subclass(ExcClass::SemanticError));
        assert!(ExcClass::ZeroDivisionError.is_subclass(ExcClass::Exception));
        assert!(!ExcClass::SystemExit.is_subclass(ExcClass::Exception));
    }
}
