#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
#![expect(clippy::expect_used, reason = "Tests use expect for clarity")]

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use kandy_ir::{ActionKind, BinaryOp, ExprKind, ParamMode, StmtKind, TypeAnnotation};

use crate::{parse_expression, parse_interpolation, parse_program};

fn program_body(source: &str) -> Vec<kandy_ir::Stmt> {
    match parse_program(source).expect("parse error").kind {
        StmtKind::Compound { body, .. } => body,
        other => panic!("expected compound, got {other:?}"),
    }
}

#[test]
fn arithmetic_precedence() {
    let expr = parse_expression("1 + 2 * 3").unwrap();
    match expr.kind {
        ExprKind::Binary { op, right, .. } => {
            assert_eq!(op, BinaryOp::Add);
            assert!(matches!(
                right.kind,
                ExprKind::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            ));
        }
        other => panic!("expected binary, got {other:?}"),
    }
}

#[test]
fn power_is_right_associative() {
    let expr = parse_expression("2 ** 3 ** 2").unwrap();
    match expr.kind {
        ExprKind::Binary { op, left, right } => {
            assert_eq!(op, BinaryOp::Pow);
            assert!(matches!(left.kind, ExprKind::Int(2)));
            assert!(matches!(
                right.kind,
                ExprKind::Binary {
                    op: BinaryOp::Pow,
                    ..
                }
            ));
        }
        other => panic!("expected binary, got {other:?}"),
    }
}

#[test]
fn not_in_parses_as_negated_containment() {
    let expr = parse_expression("x not in items").unwrap();
    match expr.kind {
        ExprKind::Unary { operand, .. } => {
            assert!(matches!(
                operand.kind,
                ExprKind::Binary {
                    op: BinaryOp::In,
                    ..
                }
            ));
        }
        other => panic!("expected unary, got {other:?}"),
    }
}

#[test]
fn ternary_and_postfix_if() {
    let expr = parse_expression("a ? b : c").unwrap();
    assert!(matches!(expr.kind, ExprKind::IfExpr { .. }));

    let expr = parse_expression("a if cond else b").unwrap();
    match expr.kind {
        ExprKind::IfExpr { on_true, .. } => {
            assert!(matches!(on_true.kind, ExprKind::Var(ref n) if n == "a"));
        }
        other => panic!("expected if-expr, got {other:?}"),
    }
}

#[test]
fn postfix_if_without_else_backtracks() {
    // The `if` belongs to the statement level, not the expression.
    let body = program_body("x if y { 1 }");
    assert!(matches!(body[0].kind, StmtKind::Expr(_)));
    assert!(matches!(body[1].kind, StmtKind::If { .. }));
}

#[test]
fn if_not_null_operator() {
    let expr = parse_expression("x ?? 5").unwrap();
    assert!(matches!(expr.kind, ExprKind::IfNotNull { .. }));
}

#[test]
fn assignment_forms() {
    let body = program_body("x = 5");
    assert!(
        matches!(&body[0].kind, StmtKind::Assign { ty: None, question: false, aug: None, .. })
    );

    let body = program_body("x += 3");
    assert!(matches!(
        &body[0].kind,
        StmtKind::Assign {
            aug: Some(BinaryOp::Add),
            ..
        }
    ));

    let body = program_body("x ?= 3");
    assert!(matches!(&body[0].kind, StmtKind::Assign { question: true, .. }));
}

#[test]
fn typed_declarations() {
    let body = program_body("const PI = 3.14");
    assert!(matches!(
        &body[0].kind,
        StmtKind::Assign {
            ty: Some(TypeAnnotation::Const { .. }),
            ..
        }
    ));

    let body = program_body("int x = 5");
    assert!(matches!(
        &body[0].kind,
        StmtKind::Assign {
            ty: Some(TypeAnnotation::Named { .. }),
            ..
        }
    ));

    let body = program_body("strict var y = 1");
    assert!(matches!(
        &body[0].kind,
        StmtKind::Assign {
            ty: Some(TypeAnnotation::Var { strict: true, .. }),
            ..
        }
    ));

    let body = program_body("multiple(int, float) z = 1");
    assert!(matches!(
        &body[0].kind,
        StmtKind::Assign {
            ty: Some(TypeAnnotation::Multiple { .. }),
            ..
        }
    ));
}

#[test]
fn bare_declaration_initializes_undefined() {
    let body = program_body("var x;");
    match &body[0].kind {
        StmtKind::Assign { value, .. } => assert!(matches!(value.kind, ExprKind::Undefined)),
        other => panic!("expected assign, got {other:?}"),
    }
}

#[test]
fn dynamic_strict_is_rejected() {
    assert!(parse_program("strict dynamic x = 1").is_err());
}

#[test]
fn default_before_required_param_is_rejected() {
    assert!(parse_program("def f(a = 1, b) => a").is_err());
}

#[test]
fn starred_param_with_type_is_rejected() {
    assert!(parse_program("def f(*int rest) => rest").is_err());
}

#[test]
fn call_statement_parses_as_expression() {
    let body = program_body("print(1, 2)");
    match &body[0].kind {
        StmtKind::Expr(expr) => assert!(matches!(expr.kind, ExprKind::Call { .. })),
        other => panic!("expected expression, got {other:?}"),
    }
}

#[test]
fn call_arguments_split_positional_and_keyword() {
    let expr = parse_expression("f(1, 2, b=3, c=4)").unwrap();
    match expr.kind {
        ExprKind::Call { args, kwargs, .. } => {
            assert_eq!(args.len(), 2);
            assert_eq!(kwargs.len(), 2);
            assert_eq!(kwargs[0].0, "b");
        }
        other => panic!("expected call, got {other:?}"),
    }
}

#[test]
fn duplicate_keyword_argument_is_rejected() {
    assert!(parse_expression("f(a=1, a=2)").is_err());
}

#[test]
fn function_declaration_with_arrow_body() {
    let body = program_body("def add(a, b) => a + b");
    match &body[0].kind {
        StmtKind::FunctionDecl(def) => {
            assert_eq!(def.name.as_deref(), Some("add"));
            assert_eq!(def.params.len(), 2);
        }
        other => panic!("expected function, got {other:?}"),
    }
}

#[test]
fn function_declaration_with_return_type() {
    let body = program_body("def int double(x) => x * 2");
    match &body[0].kind {
        StmtKind::FunctionDecl(def) => {
            assert!(matches!(
                def.return_type,
                Some(TypeAnnotation::Named { .. })
            ));
        }
        other => panic!("expected function, got {other:?}"),
    }
}

#[test]
fn starred_params() {
    let body = program_body("def f(a, *rest, **kw) { return a }");
    match &body[0].kind {
        StmtKind::FunctionDecl(def) => {
            assert_eq!(def.params[1].mode, ParamMode::TupleRest);
            assert_eq!(def.params[2].mode, ParamMode::DictRest);
        }
        other => panic!("expected function, got {other:?}"),
    }
}

#[test]
fn for_variants() {
    let body = program_body("for i from 1 to 5 { }");
    assert!(matches!(&body[0].kind, StmtKind::ForFromTo(_)));

    let body = program_body("for a, b in pairs take 2 { }");
    match &body[0].kind {
        StmtKind::ForIn(data) => {
            assert_eq!(data.targets.len(), 2);
            assert!(data.take.is_some());
        }
        other => panic!("expected for-in, got {other:?}"),
    }

    let body = program_body("for (i = 0; i < 5; i += 1) { }");
    assert!(matches!(&body[0].kind, StmtKind::ForC(_)));
}

#[test]
fn loop_as_binding_and_else() {
    let body = program_body("while x as c { } else { }");
    match &body[0].kind {
        StmtKind::While(data) => {
            assert!(data.binding.is_some());
            assert!(data.or_else.is_some());
        }
        other => panic!("expected while, got {other:?}"),
    }
}

#[test]
fn switch_fuses_case_labels_and_break() {
    let body = program_body("switch x { case 1: case 2: y = 1 break case 3: y = 2 default: y = 3 }");
    match &body[0].kind {
        StmtKind::Switch(data) => {
            assert_eq!(data.arms.len(), 2);
            assert_eq!(data.arms[0].tests.len(), 2);
            assert!(data.default.is_some());
        }
        other => panic!("expected switch, got {other:?}"),
    }
}

#[test]
fn when_is_an_expression() {
    let expr = parse_expression("when x { case 1: \"one\" default: \"other\" }").unwrap();
    match expr.kind {
        ExprKind::When { arms, default, .. } => {
            assert_eq!(arms.len(), 1);
            assert!(default.is_some());
        }
        other => panic!("expected when, got {other:?}"),
    }
}

#[test]
fn try_except_finally_else() {
    let body = program_body(
        "try { x } except Errors.ValueError as e { y } else { z } finally { w }",
    );
    match &body[0].kind {
        StmtKind::Try(data) => {
            assert_eq!(data.handlers.len(), 1);
            assert!(data.handlers[0].binding.is_some());
            assert!(data.or_else.is_some());
            assert!(data.finally.is_some());
        }
        other => panic!("expected try, got {other:?}"),
    }
}

#[test]
fn import_forms() {
    let body = program_body("import m as alias, n");
    match &body[0].kind {
        StmtKind::Import(stmt) => {
            assert!(!stmt.python);
            assert_eq!(stmt.modules[0].alias.as_deref(), Some("alias"));
            assert_eq!(stmt.modules[1].name, "n");
        }
        other => panic!("expected import, got {other:?}"),
    }

    let body = program_body("python import math");
    assert!(matches!(&body[0].kind, StmtKind::Import(s) if s.python));
}

#[test]
fn dict_and_set_literals() {
    let expr = parse_expression("${\"a\": 1, \"b\": 2}").unwrap();
    assert!(matches!(expr.kind, ExprKind::Dict(ref entries) if entries.len() == 2));

    let expr = parse_expression("${1, 2, 3}").unwrap();
    assert!(matches!(expr.kind, ExprKind::Set(ref values) if values.len() == 3));

    let expr = parse_expression("${}").unwrap();
    assert!(matches!(expr.kind, ExprKind::Dict(ref entries) if entries.is_empty()));
}

#[test]
fn slicing_with_up_to_three_indices() {
    let expr = parse_expression("a[1:2:3]").unwrap();
    assert!(matches!(expr.kind, ExprKind::Slicing { ref indices, .. } if indices.len() == 3));
}

#[test]
fn expression_assignment_yields_value() {
    let expr = parse_expression("(x := 5)").unwrap();
    assert!(matches!(expr.kind, ExprKind::AssignExpr { .. }));
}

#[test]
fn class_with_bases() {
    let body = program_body("class Dog(Animal) { def bark(self) => 1 }");
    match &body[0].kind {
        StmtKind::Class(data) => {
            assert_eq!(data.name, "Dog");
            assert_eq!(data.bases.len(), 1);
        }
        other => panic!("expected class, got {other:?}"),
    }
}

#[test]
fn export_action() {
    let body = program_body("export");
    assert!(matches!(
        &body[0].kind,
        StmtKind::Action(action) if action.kind == ActionKind::Export
    ));
}

#[test]
fn break_with_target() {
    let body = program_body("break outer");
    match &body[0].kind {
        StmtKind::Action(action) => {
            assert_eq!(action.kind, ActionKind::Break);
            assert!(action.value.is_some());
        }
        other => panic!("expected action, got {other:?}"),
    }
}

#[test]
fn interpolation_splits_format_spec() {
    let parsed = parse_interpolation("x:>10").unwrap();
    assert!(matches!(parsed.expr.kind, ExprKind::Var(ref n) if n == "x"));
    assert_eq!(parsed.rest, ":>10");

    let parsed = parse_interpolation("x=").unwrap();
    assert_eq!(parsed.consumed, "x");
    assert_eq!(parsed.rest, "=");

    let parsed = parse_interpolation("a + b").unwrap();
    assert_eq!(parsed.rest, "");
}

#[test]
fn unexpected_token_reports_expectation() {
    let err = parse_program("def f(").unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("expected"), "message: {rendered}");
}

proptest! {
    /// Parsing is deterministic: repeated parses yield equal trees.
    #[test]
    fn parser_is_deterministic(source in "[a-z0-9+\\-*/ ()=<>.;]{0,60}") {
        let first = parse_program(&source);
        let second = parse_program(&source);
        match (first, second) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(_), Err(_)) => {}
            other => prop_assert!(false, "non-deterministic outcome: {other:?}"),
        }
    }
}
