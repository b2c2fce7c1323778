//! Kandy IR - token and AST types for the KandyScript interpreter.
//!
//! This crate holds everything the lexer produces and the parser builds:
//! source positions, the token model, the expression/statement sums, the
//! operator enums, and the format-spec mini-language used by interpolated
//! strings.

pub mod ast;
mod format_spec;
mod position;
mod token;

pub use ast::{
    ActionKind, ActionStmt, ClassStmt, CondLoop, ExceptArm, Expr, ExprKind, ForCLoop,
    ForFromToLoop, ForInLoop, FunctionDef, IfArm, ImportItem, ImportStmt, InterpSlot,
    CallableKind, Param, ParamMode, RepeatLoop, ReturnMode, StringLit, Stmt, StmtKind, SwitchArm,
    SwitchStmt, TryStmt, TypeAnnotation, UsingStmt, WhenArm, WithStmt,
};
pub use ast::operators::{BinaryOp, UnaryOp};
pub use format_spec::{float_repr, Align, FormatSpec, Sign};
pub use position::Position;
pub use token::{StrFlavor, StringLiteral, Token, TokenKind};
