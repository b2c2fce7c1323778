//! Expression nodes.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::operators::{BinaryOp, UnaryOp};
use super::stmt::{FunctionDef, Stmt};
use crate::{Position, StrFlavor};

/// Expression node.
#[derive(Clone, PartialEq, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Position) -> Self {
        Expr { kind, pos }
    }
}

/// One parsed interpolation slot of a string literal.
#[derive(Clone, PartialEq, Debug)]
pub struct InterpSlot {
    /// Placeholder name inside the content (`expr0`, `expr1`, ...).
    pub name: String,
    pub expr: Expr,
    /// Text printed before the value; `Some("x=")` for the `{x=}` debug form.
    pub label: Option<String>,
    /// Raw format spec captured after `:`, if any.
    pub spec: Option<String>,
}

/// A string or bytes literal with lazily parsed interpolation slots.
///
/// The slot cache is filled on first evaluation and lives as long as the
/// node; a fresh parse builds a fresh node with an empty cache.
#[derive(Clone, Debug)]
pub struct StringLit {
    pub flavor: StrFlavor,
    pub content: String,
    pub exprs: Vec<(String, String)>,
    pub slots: RefCell<Option<Rc<Vec<InterpSlot>>>>,
}

impl StringLit {
    pub fn new(flavor: StrFlavor, content: String, exprs: Vec<(String, String)>) -> Self {
        StringLit {
            flavor,
            content,
            exprs,
            slots: RefCell::new(None),
        }
    }
}

// The slot cache is a memo of `exprs`; structural equality ignores it.
impl PartialEq for StringLit {
    fn eq(&self, other: &Self) -> bool {
        self.flavor == other.flavor && self.content == other.content && self.exprs == other.exprs
    }
}

/// One arm of a `when` expression.
#[derive(Clone, PartialEq, Debug)]
pub struct WhenArm {
    pub tests: Vec<Expr>,
    pub value: Expr,
}

/// Expression variants.
#[derive(Clone, PartialEq)]
pub enum ExprKind {
    /// Placeholder produced where the grammar admits an absent expression.
    Empty,

    // Literals
    Int(i64),
    Float(f64),
    Bool(bool),
    NoneLit,
    Undefined,
    Str(StringLit),
    BytesLit(StringLit),
    Tuple(Vec<Expr>),
    List(Vec<Expr>),
    Set(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),

    /// Variable reference.
    Var(String),

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `*seq` splat.
    StarredTuple(Box<Expr>),
    /// `**map` splat.
    StarredDict(Box<Expr>),

    Attribute {
        base: Box<Expr>,
        name: String,
    },
    /// Index or slice access with 1-3 index expressions.
    Slicing {
        base: Box<Expr>,
        indices: Vec<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },

    /// `a if cond else b` / `cond ? a : b`.
    IfExpr {
        cond: Box<Expr>,
        on_true: Box<Expr>,
        on_false: Option<Box<Expr>>,
    },
    /// `a unless cond else b`.
    UnlessExpr {
        cond: Box<Expr>,
        on_true: Box<Expr>,
        on_false: Option<Box<Expr>>,
    },
    /// `value ?? fallback`.
    IfNotNull {
        value: Box<Expr>,
        fallback: Box<Expr>,
    },

    /// Expression-form assignment `target := value`, evaluating to the value.
    AssignExpr {
        target: Box<Expr>,
        value: Box<Expr>,
    },

    Lambda(Rc<FunctionDef>),

    /// `when` expression: the head is compared against each arm's tests.
    When {
        subject: Box<Expr>,
        arms: Vec<WhenArm>,
        default: Option<Box<Stmt>>,
    },

    /// A compound statement in expression position.
    Block(Box<Stmt>),
}

impl fmt::Debug for ExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprKind::Empty => write!(f, "Empty"),
            ExprKind::Int(n) => write!(f, "Int({n})"),
            ExprKind::Float(x) => write!(f, "Float({x})"),
            ExprKind::Bool(b) => write!(f, "Bool({b})"),
            ExprKind::NoneLit => write!(f, "None"),
            ExprKind::Undefined => write!(f, "Undefined"),
            ExprKind::Str(s) => write!(f, "Str({:?})", s.content),
            ExprKind::BytesLit(s) => write!(f, "Bytes({:?})", s.content),
            ExprKind::Tuple(v) => f.debug_tuple("Tuple").field(v).finish(),
            ExprKind::List(v) => f.debug_tuple("List").field(v).finish(),
            ExprKind::Set(v) => f.debug_tuple("Set").field(v).finish(),
            ExprKind::Dict(v) => f.debug_tuple("Dict").field(v).finish(),
            ExprKind::Var(name) => write!(f, "Var({name})"),
            ExprKind::Binary { op, left, right } => f
                .debug_struct("Binary")
                .field("op", op)
                .field("left", left)
                .field("right", right)
                .finish(),
            ExprKind::Unary { op, operand } => f
                .debug_struct("Unary")
                .field("op", op)
                .field("operand", operand)
                .finish(),
            ExprKind::StarredTuple(e) => f.debug_tuple("StarredTuple").field(e).finish(),
            ExprKind::StarredDict(e) => f.debug_tuple("StarredDict").field(e).finish(),
            ExprKind::Attribute { base, name } => f
                .debug_struct("Attribute")
                .field("base", base)
                .field("name", name)
                .finish(),
            ExprKind::Slicing { base, indices } => f
                .debug_struct("Slicing")
                .field("base", base)
                .field("indices", indices)
                .finish(),
            ExprKind::Call {
                callee,
                args,
                kwargs,
            } => f
                .debug_struct("Call")
                .field("callee", callee)
                .field("args", args)
                .field("kwargs", kwargs)
                .finish(),
            ExprKind::IfExpr {
                cond,
                on_true,
                on_false,
            } => f
                .debug_struct("IfExpr")
                .field("cond", cond)
                .field("on_true", on_true)
                .field("on_false", on_false)
                .finish(),
            ExprKind::UnlessExpr {
                cond,
                on_true,
                on_false,
            } => f
                .debug_struct("UnlessExpr")
                .field("cond", cond)
                .field("on_true", on_true)
                .field("on_false", on_false)
                .finish(),
            ExprKind::IfNotNull { value, fallback } => f
                .debug_struct("IfNotNull")
                .field("value", value)
                .field("fallback", fallback)
                .finish(),
            ExprKind::AssignExpr { target, value } => f
                .debug_struct("AssignExpr")
                .field("target", target)
                .field("value", value)
                .finish(),
            ExprKind::Lambda(def) => write!(f, "Lambda({} params)", def.params.len()),
            ExprKind::When {
                subject,
                arms,
                default,
            } => f
                .debug_struct("When")
                .field("subject", subject)
                .field("arms", arms)
                .field("default", default)
                .finish(),
            ExprKind::Block(s) => f.debug_tuple("Block").field(s).finish(),
        }
    }
}
