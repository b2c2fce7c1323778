//! AST node definitions.
//!
//! Expressions and statements are exhaustive tagged sums; every evaluator
//! dispatch is a `match` over these kinds.

mod expr;
pub mod operators;
mod stmt;

pub use expr::{Expr, ExprKind, InterpSlot, StringLit, WhenArm};
pub use stmt::{
    ActionKind, ActionStmt, CallableKind, ClassStmt, CondLoop, ExceptArm, ForCLoop, ForFromToLoop,
    ForInLoop, FunctionDef, IfArm, ImportItem, ImportStmt, Param, ParamMode, RepeatLoop,
    ReturnMode, Stmt, StmtKind, SwitchArm, SwitchStmt, TryStmt, TypeAnnotation, UsingStmt,
    WithStmt,
};
