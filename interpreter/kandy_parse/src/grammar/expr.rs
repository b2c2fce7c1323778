//! Expression productions: the precedence cascade and primaries.
//!
//! Precedence, low to high: lambda, if/unless expression, `or`, `xor`,
//! `and`, `not`, comparisons, `|`, `^`, `&`, shifts, additive,
//! multiplicative, unary, power, attribute chain, primary.

use std::rc::Rc;

use kandy_ir::{
    BinaryOp, CallableKind, Expr, ExprKind, FunctionDef, ReturnMode, StringLit, TokenKind, UnaryOp,
    WhenArm,
};

use crate::{ParseError, Parser};

/// Generate one left-folded binary precedence level.
macro_rules! binary_level {
    ($(#[doc = $doc:literal])* $name:ident, $next:ident, { $($token:ident => $op:ident),+ $(,)? }) => {
        $(#[doc = $doc])*
        fn $name(&mut self) -> Result<Expr, ParseError> {
            let mut node = self.$next()?;
            loop {
                let op = match self.current.kind {
                    $(TokenKind::$token => BinaryOp::$op,)+
                    _ => break,
                };
                let pos = self.current.pos;
                self.advance()?;
                let right = self.$next()?;
                node = Expr::new(
                    ExprKind::Binary {
                        op,
                        left: Box::new(node),
                        right: Box::new(right),
                    },
                    pos,
                );
            }
            Ok(node)
        }
    };
}

impl Parser {
    /// `expression: expr_lambda`
    pub(crate) fn expression(&mut self) -> Result<Expr, ParseError> {
        self.expr_lambda()
    }

    /// `expr_lambda: (LOCAL)? LAMBDA ([function_type])? ( params ) body`
    pub(crate) fn expr_lambda(&mut self) -> Result<Expr, ParseError> {
        let pos = self.pos();
        let is_local = self.check(&TokenKind::Local);
        if is_local {
            self.advance()?;
        }

        if self.check(&TokenKind::Lambda) {
            self.advance()?;

            let return_type = if self.check(&TokenKind::LBracket) {
                self.advance()?;
                let ty = self.function_type()?;
                self.eat(&TokenKind::RBracket)?;
                ty
            } else {
                None
            };

            self.eat(&TokenKind::LParen)?;
            let params = self.param_list_declaration()?;
            self.eat(&TokenKind::RParen)?;

            let body = if self.check(&TokenKind::Colon) {
                self.advance()?;
                self.statement(ReturnMode::Unwrap)?
            } else if self.check(&TokenKind::Arrow) {
                self.arrow_statement(ReturnMode::Propagate)?
            } else {
                self.compound_statement(ReturnMode::Unwrap)?
            };

            return Ok(Expr::new(
                ExprKind::Lambda(Rc::new(FunctionDef {
                    name: None,
                    kind: CallableKind::Lambda,
                    params,
                    body,
                    return_type,
                    is_local,
                })),
                pos,
            ));
        }

        if is_local {
            return self.invalid("Invalid Lambda declaration.");
        }
        self.expr_if_unless()
    }

    /// `expr_if_unless`: postfix conditional forms.
    ///
    /// A postfix `a if cond` without `else` rolls the lexer back and yields
    /// the plain expression, letting the statement level re-read the `if`.
    fn expr_if_unless(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.expr_or()?;

        loop {
            let token = self.current.clone();
            match token.kind {
                TokenKind::Question => {
                    self.advance()?;
                    if self.check(&TokenKind::Question) {
                        self.advance()?;
                        let fallback = self.expr_or()?;
                        node = Expr::new(
                            ExprKind::IfNotNull {
                                value: Box::new(node),
                                fallback: Box::new(fallback),
                            },
                            token.pos,
                        );
                    } else {
                        let on_true = self.expr_or()?;
                        self.eat(&TokenKind::Colon)?;
                        let on_false = self.expr_or()?;
                        node = Expr::new(
                            ExprKind::IfExpr {
                                cond: Box::new(node),
                                on_true: Box::new(on_true),
                                on_false: Some(Box::new(on_false)),
                            },
                            token.pos,
                        );
                    }
                }
                TokenKind::If => {
                    self.advance()?;
                    let cond = self.expr_or()?;
                    if !self.check(&TokenKind::Else) {
                        self.back_to(&token)?;
                        return Ok(node);
                    }
                    self.advance()?;
                    let on_false = self.expr_or()?;
                    node = Expr::new(
                        ExprKind::IfExpr {
                            cond: Box::new(cond),
                            on_true: Box::new(node),
                            on_false: Some(Box::new(on_false)),
                        },
                        token.pos,
                    );
                }
                TokenKind::Unless => {
                    self.advance()?;
                    let cond = self.expr_or()?;
                    if !self.check(&TokenKind::Else) {
                        self.back_to(&token)?;
                        return Ok(node);
                    }
                    self.advance()?;
                    let on_false = self.expr_or()?;
                    node = Expr::new(
                        ExprKind::UnlessExpr {
                            cond: Box::new(cond),
                            on_true: Box::new(node),
                            on_false: Some(Box::new(on_false)),
                        },
                        token.pos,
                    );
                }
                _ => break,
            }
        }

        Ok(node)
    }

    binary_level!(
        /// `expr_or: expr_xor (OR expr_xor)*`
        expr_or, expr_xor, { Or => Or }
    );
    binary_level!(
        /// `expr_xor: expr_and (XOR expr_and)*`
        expr_xor, expr_and, { Xor => Xor }
    );
    binary_level!(
        /// `expr_and: expr_not (AND expr_not)*`
        expr_and, expr_not, { And => And }
    );

    /// `expr_not: NOT expr_not | expr_comparisons`
    fn expr_not(&mut self) -> Result<Expr, ParseError> {
        if self.check(&TokenKind::Not) {
            let pos = self.pos();
            self.advance()?;
            let operand = self.expr_not()?;
            Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                pos,
            ))
        } else {
            self.expr_comparisons()
        }
    }

    /// Comparison ladder, left-associative and left-folded; also handles the
    /// two-token forms `is not` and `not in`.
    fn expr_comparisons(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.expr_bitwise_or()?;

        loop {
            let pos = self.current.pos;
            let op = match self.current.kind {
                TokenKind::Is => BinaryOp::Is,
                TokenKind::In => BinaryOp::In,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::LtEq,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::GtEq,
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                TokenKind::Not => {
                    self.advance()?;
                    self.eat(&TokenKind::In)?;
                    let right = self.expr_bitwise_or()?;
                    node = Expr::new(
                        ExprKind::Unary {
                            op: UnaryOp::Not,
                            operand: Box::new(Expr::new(
                                ExprKind::Binary {
                                    op: BinaryOp::In,
                                    left: Box::new(node),
                                    right: Box::new(right),
                                },
                                pos,
                            )),
                        },
                        pos,
                    );
                    continue;
                }
                _ => break,
            };

            self.advance()?;
            let right = self.expr_bitwise_or()?;
            node = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(node),
                    right: Box::new(right),
                },
                pos,
            );

            // `a is not b` negates the identity test.
            if op == BinaryOp::Is && self.check(&TokenKind::Not) {
                let not_pos = self.pos();
                self.advance()?;
                node = Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(node),
                    },
                    not_pos,
                );
            }
        }

        Ok(node)
    }

    binary_level!(
        /// `expr_bitwise_or: expr_bitwise_xor (BIT_OR expr_bitwise_xor)*`
        expr_bitwise_or, expr_bitwise_xor, { BitOr => BitOr }
    );
    binary_level!(
        /// `expr_bitwise_xor: expr_bitwise_and (BIT_XOR expr_bitwise_and)*`
        expr_bitwise_xor, expr_bitwise_and, { BitXor => BitXor }
    );
    binary_level!(
        /// `expr_bitwise_and: expr_shifts (BIT_AND expr_shifts)*`
        expr_bitwise_and, expr_shifts, { BitAnd => BitAnd }
    );
    binary_level!(
        /// `expr_shifts: expr_plus ((SHIFT_L|SHIFT_R) expr_plus)*`
        expr_shifts, expr_plus, { Shl => Shl, Shr => Shr }
    );
    binary_level!(
        /// `expr_plus: expr_term ((PLUS|MINUS) expr_term)*`
        expr_plus, expr_term, { Plus => Add, Minus => Sub }
    );
    binary_level!(
        /// `expr_term: expr_unary ((MULT|DIV|FLOORDIV|MOD|SUBMOD|MATRIX_MUL) expr_unary)*`
        expr_term, expr_unary, {
            Star => Mul,
            Slash => Div,
            SlashSlash => FloorDiv,
            Percent => Mod,
            PercentPercent => SubMod,
            At => MatMul,
        }
    );

    /// `expr_unary: (PLUS|MINUS|BIT_NOT|EXCLAMATION)? expr_pow`
    fn expr_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.current.kind {
            TokenKind::Plus => Some(UnaryOp::Pos),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::BitNot => Some(UnaryOp::BitNot),
            TokenKind::Bang => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            let pos = self.pos();
            self.advance()?;
            let operand = self.expr_pow()?;
            Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                pos,
            ))
        } else {
            self.expr_pow()
        }
    }

    /// `expr_pow: expr_attr (POW expr_pow)?` - right-associative.
    fn expr_pow(&mut self) -> Result<Expr, ParseError> {
        let node = self.expr_attr()?;
        if self.check(&TokenKind::StarStar) {
            let pos = self.pos();
            self.advance()?;
            let right = self.expr_pow()?;
            return Ok(Expr::new(
                ExprKind::Binary {
                    op: BinaryOp::Pow,
                    left: Box::new(node),
                    right: Box::new(right),
                },
                pos,
            ));
        }
        Ok(node)
    }

    /// `expr_attr: expr_value (attributes)?`
    fn expr_attr(&mut self) -> Result<Expr, ParseError> {
        let node = self.expr_value()?;
        self.attributes(node, true)
    }

    /// Primary expressions.
    fn expr_value(&mut self) -> Result<Expr, ParseError> {
        let pos = self.pos();
        match self.current.kind.clone() {
            TokenKind::Int(value) => {
                self.advance()?;
                Ok(Expr::new(ExprKind::Int(value), pos))
            }
            TokenKind::Float(value) => {
                self.advance()?;
                Ok(Expr::new(ExprKind::Float(value), pos))
            }
            TokenKind::Bool(value) => {
                self.advance()?;
                Ok(Expr::new(ExprKind::Bool(value), pos))
            }
            TokenKind::NoneLit => {
                self.advance()?;
                Ok(Expr::new(ExprKind::NoneLit, pos))
            }
            TokenKind::UndefinedLit => {
                self.advance()?;
                Ok(Expr::new(ExprKind::Undefined, pos))
            }
            TokenKind::Str(literal) => {
                self.advance()?;
                Ok(Expr::new(
                    ExprKind::Str(StringLit::new(literal.flavor, literal.content, literal.exprs)),
                    pos,
                ))
            }
            TokenKind::Bytes(literal) => {
                self.advance()?;
                Ok(Expr::new(
                    ExprKind::BytesLit(StringLit::new(
                        literal.flavor,
                        literal.content,
                        literal.exprs,
                    )),
                    pos,
                ))
            }
            TokenKind::LParen => self.literal_tuple_expression(),
            TokenKind::LBracket => self.literal_list(),
            TokenKind::Dollar => self.literal_dict_set(),
            TokenKind::Ident(_) => self.expr_variable(),
            TokenKind::LBrace | TokenKind::Begin => {
                let block = self.compound_statement(ReturnMode::Unwrap)?;
                Ok(Expr::new(ExprKind::Block(Box::new(block)), pos))
            }
            TokenKind::Star => {
                self.advance()?;
                let inner = self.expression()?;
                Ok(Expr::new(ExprKind::StarredTuple(Box::new(inner)), pos))
            }
            TokenKind::StarStar => {
                self.advance()?;
                let inner = self.expression()?;
                Ok(Expr::new(ExprKind::StarredDict(Box::new(inner)), pos))
            }
            TokenKind::When => self.when_expression(),
            other => Err(ParseError::UnexpectedToken {
                expected: "expression".to_string(),
                found: other.display_name().to_string(),
                pos,
            }),
        }
    }

    /// `expr_variable: variable_with_attributes (EXPR_ASSIGN expression)?`
    fn expr_variable(&mut self) -> Result<Expr, ParseError> {
        let var = self.variable_with_attributes(true)?;
        if self.check(&TokenKind::ExprAssign) {
            let pos = self.pos();
            self.advance()?;
            let value = self.expression()?;
            return Ok(Expr::new(
                ExprKind::AssignExpr {
                    target: Box::new(var),
                    value: Box::new(value),
                },
                pos,
            ));
        }
        Ok(var)
    }

    /// Postfix chain: calls, attribute access, and slicing.
    pub(crate) fn attributes(&mut self, node: Expr, can_call: bool) -> Result<Expr, ParseError> {
        let mut node = node;
        loop {
            match self.current.kind {
                TokenKind::LParen if can_call => {
                    let pos = self.pos();
                    self.advance()?;
                    let mut args = self.argument_list()?;
                    let kwargs = self.kw_argument_list(&mut args)?;
                    self.eat(&TokenKind::RParen)?;
                    node = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(node),
                            args,
                            kwargs,
                        },
                        pos,
                    );
                }
                TokenKind::Dot => {
                    let pos = self.pos();
                    self.advance()?;
                    let (name, _) = self.ident()?;
                    node = Expr::new(
                        ExprKind::Attribute {
                            base: Box::new(node),
                            name,
                        },
                        pos,
                    );
                }
                TokenKind::LBracket => {
                    let pos = self.pos();
                    self.advance()?;
                    let mut indices = vec![self.slice_component()?];
                    if self.check(&TokenKind::Colon) {
                        self.advance()?;
                        indices.push(self.slice_component()?);
                        if self.check(&TokenKind::Colon) {
                            self.advance()?;
                            indices.push(self.slice_component()?);
                        }
                    }
                    self.eat(&TokenKind::RBracket)?;
                    node = Expr::new(
                        ExprKind::Slicing {
                            base: Box::new(node),
                            indices,
                        },
                        pos,
                    );
                }
                _ => break,
            }
        }
        Ok(node)
    }

    /// One slice component; omitted components (`a[1:]`, `a[:2]`) read as
    /// empty expressions.
    fn slice_component(&mut self) -> Result<Expr, ParseError> {
        if self.current.kind.can_start_expr() {
            self.expression()
        } else {
            Ok(Expr::new(ExprKind::Empty, self.pos()))
        }
    }

    /// Positional arguments, stopping where the keyword section begins.
    fn argument_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.check(&TokenKind::RParen) {
            return Ok(args);
        }
        if self.at_keyword_argument()? {
            return Ok(args);
        }

        args.push(self.expression()?);
        while self.check(&TokenKind::Comma) {
            self.advance()?;
            if self.at_keyword_argument()? {
                break;
            }
            if !self.check(&TokenKind::RParen) {
                args.push(self.expression()?);
            }
        }
        Ok(args)
    }

    /// Keyword arguments. `**map` splats that appear in this section are
    /// pushed into `args`, where the evaluator merges them.
    fn kw_argument_list(
        &mut self,
        args: &mut Vec<Expr>,
    ) -> Result<Vec<(String, Expr)>, ParseError> {
        let mut kwargs: Vec<(String, Expr)> = Vec::new();
        if self.check(&TokenKind::RParen) {
            return Ok(kwargs);
        }
        if !self.at_keyword_argument()? {
            return Ok(kwargs);
        }

        loop {
            if self.check(&TokenKind::StarStar) || self.check(&TokenKind::Star) {
                args.push(self.expression()?);
            } else {
                let (name, name_pos) = self.ident()?;
                self.eat(&TokenKind::Assign)?;
                if kwargs.iter().any(|(existing, _)| existing == &name) {
                    return Err(ParseError::InvalidSyntax {
                        message: format!("got multiple values for keyword argument '{name}'"),
                        pos: name_pos,
                    });
                }
                let value = self.expression()?;
                kwargs.push((name, value));
            }

            if self.check(&TokenKind::Comma) {
                self.advance()?;
                if self.check(&TokenKind::RParen) {
                    break;
                }
            } else {
                break;
            }
        }
        Ok(kwargs)
    }

    /// Whether the current position starts a `name=value` argument.
    fn at_keyword_argument(&mut self) -> Result<bool, ParseError> {
        if let TokenKind::Ident(_) = self.current.kind {
            Ok(matches!(self.peek(1)?.first(), Some(TokenKind::Assign)))
        } else {
            Ok(false)
        }
    }

    /// `( )` empty tuple, `( expr )` grouping, or `( a, b, ... )` tuple.
    fn literal_tuple_expression(&mut self) -> Result<Expr, ParseError> {
        let pos = self.pos();
        self.eat(&TokenKind::LParen)?;
        if self.check(&TokenKind::RParen) {
            self.advance()?;
            return Ok(Expr::new(ExprKind::Tuple(Vec::new()), pos));
        }

        let first = self.expression()?;
        if self.check(&TokenKind::Comma) {
            let mut values = vec![first];
            while self.check(&TokenKind::Comma) {
                self.advance()?;
                if !self.check(&TokenKind::RParen) {
                    values.push(self.expression()?);
                }
            }
            self.eat(&TokenKind::RParen)?;
            return Ok(Expr::new(ExprKind::Tuple(values), pos));
        }

        self.eat(&TokenKind::RParen)?;
        Ok(first)
    }

    /// `[ a, b, ... ]`
    fn literal_list(&mut self) -> Result<Expr, ParseError> {
        let pos = self.pos();
        self.eat(&TokenKind::LBracket)?;
        let mut values = Vec::new();
        if self.check(&TokenKind::RBracket) {
            self.advance()?;
            return Ok(Expr::new(ExprKind::List(values), pos));
        }

        values.push(self.expression()?);
        while self.check(&TokenKind::Comma) {
            self.advance()?;
            if !self.check(&TokenKind::RBracket) {
                values.push(self.expression()?);
            }
        }
        self.eat(&TokenKind::RBracket)?;
        Ok(Expr::new(ExprKind::List(values), pos))
    }

    /// `${ k: v, ... }` dict or `${ a, b, ... }` set.
    fn literal_dict_set(&mut self) -> Result<Expr, ParseError> {
        let pos = self.pos();
        self.eat(&TokenKind::Dollar)?;
        self.eat(&TokenKind::LBrace)?;

        if self.check(&TokenKind::RBrace) {
            self.advance()?;
            return Ok(Expr::new(ExprKind::Dict(Vec::new()), pos));
        }

        let first = self.expression()?;
        if self.check(&TokenKind::Colon) {
            self.advance()?;
            let value = self.expression()?;
            let mut entries = vec![(first, value)];
            while self.check(&TokenKind::Comma) {
                self.advance()?;
                if !self.check(&TokenKind::RBrace) {
                    let key = self.expression()?;
                    self.eat(&TokenKind::Colon)?;
                    let value = self.expression()?;
                    entries.push((key, value));
                }
            }
            self.eat(&TokenKind::RBrace)?;
            return Ok(Expr::new(ExprKind::Dict(entries), pos));
        }

        let mut values = vec![first];
        while self.check(&TokenKind::Comma) {
            self.advance()?;
            if !self.check(&TokenKind::RBrace) {
                values.push(self.expression()?);
            }
        }
        self.eat(&TokenKind::RBrace)?;
        Ok(Expr::new(ExprKind::Set(values), pos))
    }

    /// `when expr (COLON)? { (case expr COLON expr)* (default COLON statement)? }`
    fn when_expression(&mut self) -> Result<Expr, ParseError> {
        let pos = self.pos();
        self.eat(&TokenKind::When)?;
        let subject = self.expression()?;
        if self.check(&TokenKind::Colon) {
            self.advance()?;
        }
        self.eat(&TokenKind::LBrace)?;

        let mut arms = Vec::new();
        while self.check(&TokenKind::Case) {
            arms.push(self.when_cases_block()?);
        }

        let default = if self.check(&TokenKind::Default) {
            self.advance()?;
            self.eat(&TokenKind::Colon)?;
            Some(Box::new(self.statement(ReturnMode::Unwrap)?))
        } else {
            None
        };
        self.eat(&TokenKind::RBrace)?;

        Ok(Expr::new(
            ExprKind::When {
                subject: Box::new(subject),
                arms,
                default,
            },
            pos,
        ))
    }

    /// One when arm: consecutive empty case labels share the arm value.
    fn when_cases_block(&mut self) -> Result<WhenArm, ParseError> {
        let mut tests = Vec::new();
        loop {
            self.eat(&TokenKind::Case)?;
            tests.push(self.expression()?);
            self.eat(&TokenKind::Colon)?;
            if self.check(&TokenKind::Case) {
                continue;
            }
            let value = self.expression()?;
            return Ok(WhenArm { tests, value });
        }
    }
}
