//! User-declared callables: procedures, functions, and lambdas.
//!
//! A callable captures its declaration-site frame (the closure), a runtime
//! parameter list with defaults evaluated at declaration time, and the body
//! AST. Inside a class body, a missing leading `self` parameter is inserted
//! at declaration time.

use std::cell::RefCell;
use std::rc::Rc;

use kandy_ir::{CallableKind, FunctionDef, ParamMode, TypeAnnotation};

use crate::callstack::ScopeRef;
use crate::record::TypeConstraint;
use crate::value::Value;

/// A parameter after declaration-time processing.
#[derive(Clone)]
pub struct RuntimeParam {
    pub name: String,
    pub ty: Option<TypeAnnotation>,
    /// Default value, evaluated once at declaration.
    pub default: Option<Value>,
    pub mode: ParamMode,
}

/// Resolution state of a function's return-type annotation.
///
/// The annotation is an expression resolved in the declaration-site frame on
/// first invocation, then memoized.
pub enum ReturnTypeState {
    None,
    Unresolved(TypeAnnotation),
    Resolved(Option<TypeConstraint>),
}

pub struct Callable {
    pub name: String,
    pub kind: CallableKind,
    pub def: Rc<FunctionDef>,
    pub params: Vec<RuntimeParam>,
    /// Declaration-site frame: the lexical parent of every call frame.
    pub closure: ScopeRef,
    /// Reuse the caller's frame instead of pushing a new one.
    pub is_local: bool,
    /// Declared inside a class body; calls bind the receiver as `self`.
    pub inside_class: bool,
    pub return_type: RefCell<ReturnTypeState>,
    pub strict_return: bool,
}

impl Callable {
    pub fn new(
        def: Rc<FunctionDef>,
        params: Vec<RuntimeParam>,
        closure: ScopeRef,
        inside_class: bool,
    ) -> Self {
        let name = def
            .name
            .clone()
            .unwrap_or_else(|| "<lambda>".to_string());
        let strict_return = def
            .return_type
            .as_ref()
            .map(TypeAnnotation::is_strict)
            .unwrap_or(false);
        let return_type = match &def.return_type {
            Some(annotation) => ReturnTypeState::Unresolved(annotation.clone()),
            None => ReturnTypeState::None,
        };
        Callable {
            name,
            kind: def.kind,
            is_local: def.is_local,
            params,
            closure,
            inside_class,
            return_type: RefCell::new(return_type),
            strict_return,
            def,
        }
    }

    pub fn repr(&self) -> String {
        match self.kind {
            CallableKind::Procedure => format!("<procedure {}>", self.name),
            CallableKind::Function => format!("<function {}>", self.name),
            CallableKind::Lambda => "<lambda>".to_string(),
        }
    }
}
