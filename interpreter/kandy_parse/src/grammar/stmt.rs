//! Statement productions.

use std::rc::Rc;

use kandy_ir::{
    ActionKind, ActionStmt, BinaryOp, CallableKind, ClassStmt, CondLoop, ExceptArm, Expr, ExprKind,
    ForCLoop, ForFromToLoop, ForInLoop, FunctionDef, IfArm, ImportItem, ImportStmt, Param,
    ParamMode, RepeatLoop, ReturnMode, Stmt, StmtKind, SwitchArm, SwitchStmt, TokenKind, TryStmt,
    TypeAnnotation, UsingStmt, WithStmt,
};

use crate::{ParseError, Parser};

impl Parser {
    /// `statement_list: statement (SEMI statement)*`
    ///
    /// The list ends at a closing brace, `end`, end of input, or when a
    /// statement parses as empty.
    pub(crate) fn statement_list(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut nodes = Vec::new();
        let mut stmt = self.statement(ReturnMode::Unwrap)?;
        let mut empty = matches!(stmt.kind, StmtKind::Empty);
        nodes.push(stmt);

        while !empty {
            if self.check(&TokenKind::RBrace)
                || self.check(&TokenKind::End)
                || self.check(&TokenKind::Eof)
            {
                break;
            }
            if self.check(&TokenKind::Semi) {
                self.advance()?;
            }
            stmt = self.statement(ReturnMode::Unwrap)?;
            empty = matches!(stmt.kind, StmtKind::Empty);
            nodes.push(stmt);
        }

        Ok(nodes)
    }

    /// The statement dispatcher. `mode` applies when the statement turns out
    /// to be a compound (or arrow) block.
    pub(crate) fn statement(&mut self, mode: ReturnMode) -> Result<Stmt, ParseError> {
        let kind = self.current.kind.clone();
        match &kind {
            TokenKind::Begin | TokenKind::LBrace => self.compound_statement(mode),
            TokenKind::Ident(_)
            | TokenKind::Const
            | TokenKind::Var
            | TokenKind::Dynamic
            | TokenKind::Strict
            | TokenKind::Private
            | TokenKind::Multiple => self.assignment_statement(),
            TokenKind::Local => match self.peek(1)?.first() {
                Some(TokenKind::Proc) => self.procedure_declaration(),
                Some(TokenKind::Def) => self.function_declaration(),
                Some(TokenKind::Lambda) => {
                    let pos = self.pos();
                    let lambda = self.expr_lambda()?;
                    Ok(Stmt::new(StmtKind::Expr(lambda), pos))
                }
                _ => self.invalid("expected 'proc', 'def' or 'lambda' after 'local'"),
            },
            TokenKind::Proc => self.procedure_declaration(),
            TokenKind::Def => self.function_declaration(),
            TokenKind::Class => self.class_statement(),
            TokenKind::If => self.if_statement(),
            TokenKind::Unless => self.unless_statement(),
            TokenKind::While | TokenKind::Until => self.while_until_statement(),
            TokenKind::Do => self.do_while_until_statement(),
            TokenKind::Return | TokenKind::Break | TokenKind::Continue | TokenKind::Export => {
                self.actions_statement()
            }
            TokenKind::Repeat => self.repeat_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::Switch => self.switch_statement(),
            TokenKind::With => self.with_statement(),
            TokenKind::Try => self.try_statement(),
            TokenKind::Pass => {
                let pos = self.pos();
                self.advance()?;
                Ok(Stmt::new(StmtKind::Empty, pos))
            }
            TokenKind::Using => self.using_statement(),
            TokenKind::Python | TokenKind::From | TokenKind::Import => self.import_statement(),
            TokenKind::Del => self.del_statement(),
            kind if kind.can_start_expr() => {
                let pos = self.pos();
                let expr = self.expression()?;
                Ok(Stmt::new(StmtKind::Expr(expr), pos))
            }
            _ => Ok(Stmt::new(StmtKind::Empty, self.pos())),
        }
    }

    /// `compound_statement: LBRACES statement_list RBRACES | BEGIN statement_list END`
    pub(crate) fn compound_statement(&mut self, mode: ReturnMode) -> Result<Stmt, ParseError> {
        let pos = self.pos();
        let mut body = Vec::new();

        if self.check(&TokenKind::Begin) {
            self.advance()?;
            body = self.statement_list()?;
            self.eat(&TokenKind::End)?;
        } else if self.check(&TokenKind::LBrace) {
            self.advance()?;
            body = self.statement_list()?;
            self.eat(&TokenKind::RBrace)?;
        }

        Ok(Stmt::new(StmtKind::Compound { body, mode }, pos))
    }

    /// `arrow_statement: ARROW expression` - sugar for `{ return expr }`.
    pub(crate) fn arrow_statement(&mut self, mode: ReturnMode) -> Result<Stmt, ParseError> {
        let pos = self.pos();
        self.eat(&TokenKind::Arrow)?;
        let value = self.expression()?;
        let action = Stmt::new(
            StmtKind::Action(ActionStmt {
                kind: ActionKind::Return,
                value: Some(value),
            }),
            pos,
        );
        Ok(Stmt::new(
            StmtKind::Compound {
                body: vec![action],
                mode,
            },
            pos,
        ))
    }

    /// `then_block: (THEN|COLON) statement | arrow_statement | compound_statement`
    fn then_block(&mut self) -> Result<Stmt, ParseError> {
        if self.check(&TokenKind::Then) || self.check(&TokenKind::Colon) {
            self.advance()?;
            self.statement(ReturnMode::Propagate)
        } else if self.check(&TokenKind::Arrow) {
            self.arrow_statement(ReturnMode::Propagate)
        } else {
            self.compound_statement(ReturnMode::Propagate)
        }
    }

    /// `do_block: (DO|COLON) statement | arrow_statement | compound_statement`
    pub(crate) fn do_block(&mut self) -> Result<Stmt, ParseError> {
        if self.check(&TokenKind::Do) || self.check(&TokenKind::Colon) {
            self.advance()?;
            self.statement(ReturnMode::Propagate)
        } else if self.check(&TokenKind::Arrow) {
            self.arrow_statement(ReturnMode::Propagate)
        } else {
            self.compound_statement(ReturnMode::Propagate)
        }
    }

    /// `else_block: ELSE (COLON)? (statement|arrow_statement)`
    fn else_block(&mut self) -> Result<Stmt, ParseError> {
        self.eat(&TokenKind::Else)?;
        if self.check(&TokenKind::Colon) {
            self.advance()?;
        }
        if self.check(&TokenKind::Arrow) {
            self.arrow_statement(ReturnMode::Propagate)
        } else {
            self.statement(ReturnMode::Propagate)
        }
    }

    /// `actions_statement: RETURN (expr)? | EXPORT | (CONTINUE|BREAK) ((COLON)? expr)?`
    fn actions_statement(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.pos();
        let kind = match self.current.kind {
            TokenKind::Return => ActionKind::Return,
            TokenKind::Break => ActionKind::Break,
            TokenKind::Continue => ActionKind::Continue,
            _ => ActionKind::Export,
        };
        self.advance()?;

        let value = match kind {
            ActionKind::Return => {
                if self.current.kind.can_start_expr() {
                    Some(self.expression()?)
                } else {
                    None
                }
            }
            ActionKind::Break | ActionKind::Continue => {
                if self.check(&TokenKind::Colon) {
                    self.advance()?;
                }
                if self.current.kind.can_start_expr() {
                    Some(self.expression()?)
                } else {
                    None
                }
            }
            ActionKind::Export => None,
        };

        Ok(Stmt::new(StmtKind::Action(ActionStmt { kind, value }), pos))
    }

    /// `del_statement: DEL expression`
    fn del_statement(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.pos();
        self.eat(&TokenKind::Del)?;
        let expr = self.expression()?;
        Ok(Stmt::new(StmtKind::Delete(expr), pos))
    }

    // Declarations

    /// `procedure_declaration: (LOCAL)? PROC ID ( params ) body`
    fn procedure_declaration(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.pos();
        let is_local = self.check(&TokenKind::Local);
        if is_local {
            self.advance()?;
        }
        self.eat(&TokenKind::Proc)?;
        let (name, _) = self.ident()?;
        self.eat(&TokenKind::LParen)?;
        let params = self.param_list_declaration()?;
        self.eat(&TokenKind::RParen)?;

        let body = if self.check(&TokenKind::Colon) {
            self.advance()?;
            self.statement(ReturnMode::Forbid)?
        } else {
            self.compound_statement(ReturnMode::Forbid)?
        };

        Ok(Stmt::new(
            StmtKind::ProcedureDecl(Rc::new(FunctionDef {
                name: Some(name),
                kind: CallableKind::Procedure,
                params,
                body,
                return_type: None,
                is_local,
            })),
            pos,
        ))
    }

    /// `function_declaration: (LOCAL)? DEF (function_type)? ID ( params ) body`
    fn function_declaration(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.pos();
        let is_local = self.check(&TokenKind::Local);
        if is_local {
            self.advance()?;
        }
        self.eat(&TokenKind::Def)?;
        let (return_type, name) = self.function_variable_declaration()?;
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

        Ok(Stmt::new(
            StmtKind::FunctionDecl(Rc::new(FunctionDef {
                name: Some(name),
                kind: CallableKind::Function,
                params,
                body,
                return_type,
                is_local,
            })),
            pos,
        ))
    }

    /// `function_type: (STRICT)? ID | DYNAMIC | (STRICT)? MULTIPLE ( types )`
    pub(crate) fn function_type(&mut self) -> Result<Option<TypeAnnotation>, ParseError> {
        let strict = self.check(&TokenKind::Strict);
        if strict {
            self.advance()?;
        }

        match &self.current.kind {
            TokenKind::Dynamic => {
                self.advance()?;
                if strict {
                    return self.invalid("The 'dynamic' variables can't be 'strict'.");
                }
                Ok(Some(TypeAnnotation::Dynamic { private: false }))
            }
            TokenKind::Multiple => {
                self.advance()?;
                let types = self.multiple_type_list()?;
                Ok(Some(TypeAnnotation::Multiple {
                    types,
                    strict,
                    private: false,
                }))
            }
            TokenKind::Ident(_) => {
                let ty = self.variable_with_attributes(false)?;
                Ok(Some(TypeAnnotation::Named {
                    ty: Box::new(ty),
                    strict,
                    private: false,
                }))
            }
            TokenKind::Const => self.invalid("Functions can't return a 'const' value."),
            TokenKind::Var => self.invalid("Functions can't return an 'auto-detect-type' value."),
            TokenKind::Private => {
                self.invalid("'private' is not valid in a function-type position.")
            }
            _ => Ok(None),
        }
    }

    /// `function_variable_declaration: (function_type)? variable`
    ///
    /// When no variable follows, the parsed type expression was the name.
    fn function_variable_declaration(
        &mut self,
    ) -> Result<(Option<TypeAnnotation>, String), ParseError> {
        let ty = self.function_type()?;

        if let TokenKind::Ident(_) = self.current.kind {
            let (name, _) = self.ident()?;
            return Ok((ty, name));
        }

        match ty {
            Some(TypeAnnotation::Named { ty, .. }) => match ty.kind {
                ExprKind::Var(name) => Ok((None, name)),
                _ => self.invalid("invalid function name"),
            },
            _ => self.invalid("invalid syntax."),
        }
    }

    /// `param_list_declaration`: comma-separated parameters; defaults may not
    /// precede non-defaults; `*rest`/`**rest` close the positional section.
    pub(crate) fn param_list_declaration(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();
        let mut default_seen = false;
        let mut starred_seen = false;

        if self.check(&TokenKind::RParen) {
            return Ok(params);
        }

        loop {
            if self.check(&TokenKind::Star) || self.check(&TokenKind::StarStar) {
                params.extend(self.param_declaration_starred()?);
                starred_seen = true;
            } else if !self.check(&TokenKind::RParen) {
                if starred_seen {
                    return self.invalid("Invalid syntax");
                }
                let param = self.param_declaration(&mut default_seen)?;
                params.push(param);
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

        Ok(params)
    }

    /// `param_declaration: variable_declaration (ASSIGN expression)?`
    fn param_declaration(&mut self, default_seen: &mut bool) -> Result<Param, ParseError> {
        let (ty, target) = self.variable_declaration()?;
        let name = match target.kind {
            ExprKind::Var(name) => name,
            _ => return self.invalid("invalid parameter name"),
        };

        if self.check(&TokenKind::Assign) {
            self.advance()?;
            let default = self.expression()?;
            *default_seen = true;
            Ok(Param {
                ty,
                name,
                default: Some(default),
                mode: ParamMode::Normal,
            })
        } else if *default_seen {
            self.invalid("non-default argument follows default argument.")
        } else {
            Ok(Param {
                ty,
                name,
                default: None,
                mode: ParamMode::Normal,
            })
        }
    }

    /// `param_declaration_starred: MULT variable | POW variable`
    fn param_declaration_starred(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();

        if self.check(&TokenKind::Star) {
            self.advance()?;
            let (ty, target) = self.variable_declaration()?;
            if ty.is_some() {
                return self.invalid("The Starred-syntax don't support 'variable-type' assignment.");
            }
            let name = match target.kind {
                ExprKind::Var(name) => name,
                _ => return self.invalid("invalid parameter name"),
            };
            params.push(Param {
                ty: None,
                name,
                default: None,
                mode: ParamMode::TupleRest,
            });
        }

        if self.check(&TokenKind::StarStar) {
            self.advance()?;
            let (ty, target) = self.variable_declaration()?;
            if ty.is_some() {
                return self.invalid("The Starred-syntax don't support 'variable-type' assignment.");
            }
            let name = match target.kind {
                ExprKind::Var(name) => name,
                _ => return self.invalid("invalid parameter name"),
            };
            params.push(Param {
                ty: None,
                name,
                default: None,
                mode: ParamMode::DictRest,
            });
        }

        Ok(params)
    }

    // Assignment

    /// `assignment_statement: variable_declaration [op]? (=|?=) expression`
    ///
    /// A bare declaration followed by `;` initializes with `Undefined`; a
    /// declaration that turns out to be untyped and unassigned re-parses as
    /// an expression statement.
    pub(crate) fn assignment_statement(&mut self) -> Result<Stmt, ParseError> {
        let master = self.current.clone();
        let pos = self.pos();
        let (ty, target) = self.variable_declaration()?;

        if self.check(&TokenKind::Assign) || self.check(&TokenKind::QuestionAssign) {
            let question = self.check(&TokenKind::QuestionAssign);
            self.advance()?;
            let value = self.expression()?;
            return Ok(Stmt::new(
                StmtKind::Assign {
                    ty,
                    target,
                    question,
                    aug: None,
                    value,
                },
                pos,
            ));
        }

        if let Some(op) = BinaryOp::from_token(&self.current.kind) {
            let peeked = self.peek(1)?;
            if matches!(
                peeked.first(),
                Some(TokenKind::Assign | TokenKind::QuestionAssign)
            ) {
                self.advance()?;
                let question = self.check(&TokenKind::QuestionAssign);
                self.advance()?;
                let value = self.expression()?;
                return Ok(Stmt::new(
                    StmtKind::Assign {
                        ty,
                        target,
                        question,
                        aug: Some(op),
                        value,
                    },
                    pos,
                ));
            }
        }

        if ty.is_none() {
            self.back_to(&master)?;
            let expr = self.expression()?;
            return Ok(Stmt::new(StmtKind::Expr(expr), pos));
        }

        if self.check(&TokenKind::Semi) {
            self.advance()?;
            return Ok(Stmt::new(
                StmtKind::Assign {
                    ty,
                    target,
                    question: false,
                    aug: None,
                    value: Expr::new(ExprKind::Undefined, pos),
                },
                pos,
            ));
        }

        self.invalid("invalid syntax.")
    }

    /// `variable_declaration: (variable_type)? variable (attributes)?`
    pub(crate) fn variable_declaration(
        &mut self,
    ) -> Result<(Option<TypeAnnotation>, Expr), ParseError> {
        let ty = self.variable_type()?;

        let target = if let TokenKind::Ident(_) = self.current.kind {
            self.variable()?
        } else {
            // No second identifier: the "type" expression was the target.
            match ty {
                Some(TypeAnnotation::Named { ty, private, .. }) => {
                    if private {
                        return self.invalid(
                            "Invalid Private syntax. Example of use: private dynamic variable = value",
                        );
                    }
                    let target = *ty;
                    return Ok((None, self.attributes(target, true)?));
                }
                _ => return self.invalid("invalid syntax."),
            }
        };

        let target = self.attributes(target, true)?;
        Ok((ty, target))
    }

    /// `variable_type: (PRIVATE)? (STRICT)? (VAR|ID|MULTIPLE(...)) | (PRIVATE)? (CONST|DYNAMIC)`
    fn variable_type(&mut self) -> Result<Option<TypeAnnotation>, ParseError> {
        let private = self.check(&TokenKind::Private);
        if private {
            self.advance()?;
        }
        let strict = self.check(&TokenKind::Strict);
        if strict {
            self.advance()?;
        }

        match &self.current.kind {
            TokenKind::Var => {
                self.advance()?;
                Ok(Some(TypeAnnotation::Var { strict, private }))
            }
            TokenKind::Dynamic => {
                self.advance()?;
                if strict {
                    return self.invalid("The 'dynamic' variables can't be 'strict'.");
                }
                Ok(Some(TypeAnnotation::Dynamic { private }))
            }
            TokenKind::Const => {
                self.advance()?;
                if strict {
                    return self.invalid("The 'const' variables can't be 'strict'.");
                }
                Ok(Some(TypeAnnotation::Const { private }))
            }
            TokenKind::Multiple => {
                self.advance()?;
                let types = self.multiple_type_list()?;
                Ok(Some(TypeAnnotation::Multiple {
                    types,
                    strict,
                    private,
                }))
            }
            TokenKind::Ident(_) => {
                let ty = self.variable_with_attributes(false)?;
                Ok(Some(TypeAnnotation::Named {
                    ty: Box::new(ty),
                    strict,
                    private,
                }))
            }
            _ => Ok(None),
        }
    }

    /// `MULTIPLE LPARENT type (COMMA type)* RPARENT`
    fn multiple_type_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut types = Vec::new();
        self.eat(&TokenKind::LParen)?;
        if let TokenKind::Ident(_) = self.current.kind {
            types.push(self.variable_with_attributes(false)?);
            while self.check(&TokenKind::Comma) {
                self.advance()?;
                if !self.check(&TokenKind::RParen) {
                    types.push(self.variable_with_attributes(false)?);
                }
            }
        }
        self.eat(&TokenKind::RParen)?;
        Ok(types)
    }

    /// `variable: ID`
    pub(crate) fn variable(&mut self) -> Result<Expr, ParseError> {
        let (name, pos) = self.ident()?;
        Ok(Expr::new(ExprKind::Var(name), pos))
    }

    /// `variable_with_attributes: variable (attributes)?`
    pub(crate) fn variable_with_attributes(&mut self, can_call: bool) -> Result<Expr, ParseError> {
        let var = self.variable()?;
        self.attributes(var, can_call)
    }

    // Control-flow statements

    /// `if_statement: IF expr then_block ((ELIF|ELSE IF) expr then_block)* (else_block)?`
    fn if_statement(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.pos();
        self.eat(&TokenKind::If)?;
        let mut arms = Vec::new();
        let mut or_else = None;

        let cond = self.expression()?;
        let body = self.then_block()?;
        arms.push(IfArm { cond, body });

        loop {
            if self.check(&TokenKind::Elif) {
                self.advance()?;
                let cond = self.expression()?;
                let body = self.then_block()?;
                arms.push(IfArm { cond, body });
            } else if self.check(&TokenKind::Else) {
                if matches!(self.peek(1)?.first(), Some(TokenKind::If)) {
                    self.advance()?;
                    self.advance()?;
                    let cond = self.expression()?;
                    let body = self.then_block()?;
                    arms.push(IfArm { cond, body });
                } else {
                    or_else = Some(Box::new(self.else_block()?));
                    break;
                }
            } else {
                break;
            }
        }

        Ok(Stmt::new(StmtKind::If { arms, or_else }, pos))
    }

    /// `unless_statement: UNLESS expr then_block (ELSE UNLESS expr then_block)* (else_block)?`
    fn unless_statement(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.pos();
        self.eat(&TokenKind::Unless)?;
        let mut arms = Vec::new();
        let mut or_else = None;

        let cond = self.expression()?;
        let body = self.then_block()?;
        arms.push(IfArm { cond, body });

        while self.check(&TokenKind::Else) {
            if matches!(self.peek(1)?.first(), Some(TokenKind::Unless)) {
                self.advance()?;
                self.advance()?;
                let cond = self.expression()?;
                let body = self.then_block()?;
                arms.push(IfArm { cond, body });
            } else {
                or_else = Some(Box::new(self.else_block()?));
                break;
            }
        }

        Ok(Stmt::new(StmtKind::Unless { arms, or_else }, pos))
    }

    /// `while_until_statement: (WHILE|UNTIL) expr (AS var)? do_block (else_block)?`
    fn while_until_statement(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.pos();
        let until = self.check(&TokenKind::Until);
        self.advance()?;

        let cond = self.expression()?;
        let binding = self.loop_binding()?;
        let body = self.do_block()?;
        let or_else = self.optional_else()?;

        let data = Box::new(CondLoop {
            cond,
            body,
            or_else,
            binding,
            do_first: false,
        });
        let kind = if until {
            StmtKind::Until(data)
        } else {
            StmtKind::While(data)
        };
        Ok(Stmt::new(kind, pos))
    }

    /// `do_while_until_statement: DO (COLON)? statement (WHILE|UNTIL) expr (AS var)? (else_block)?`
    fn do_while_until_statement(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.pos();
        self.eat(&TokenKind::Do)?;
        if self.check(&TokenKind::Colon) {
            self.advance()?;
        }
        let body = self.statement(ReturnMode::Unwrap)?;

        let until = self.check(&TokenKind::Until);
        if !until {
            self.eat(&TokenKind::While)?;
        } else {
            self.advance()?;
        }
        let cond = self.expression()?;
        let binding = self.loop_binding()?;
        let or_else = self.optional_else()?;

        let data = Box::new(CondLoop {
            cond,
            body,
            or_else,
            binding,
            do_first: true,
        });
        let kind = if until {
            StmtKind::Until(data)
        } else {
            StmtKind::While(data)
        };
        Ok(Stmt::new(kind, pos))
    }

    /// `repeat_statement: REPEAT expr (AS var)? do_block (else_block)?`
    fn repeat_statement(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.pos();
        self.eat(&TokenKind::Repeat)?;
        let count = self.expression()?;
        let binding = self.loop_binding()?;
        let body = self.do_block()?;
        let or_else = self.optional_else()?;

        Ok(Stmt::new(
            StmtKind::Repeat(Box::new(RepeatLoop {
                count,
                body,
                or_else,
                binding,
            })),
            pos,
        ))
    }

    /// `for_statement: (for_c | for_in | for_from_to) (AS var)? do_block (else_block)?`
    fn for_statement(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.pos();
        self.eat(&TokenKind::For)?;

        // C-style header.
        if self.check(&TokenKind::LParen) {
            self.advance()?;
            let init = self.assignment_statement()?;
            self.eat(&TokenKind::Semi)?;
            let cond = self.expression()?;
            self.eat(&TokenKind::Semi)?;
            let step = self.assignment_statement()?;
            self.eat(&TokenKind::RParen)?;

            let binding = self.loop_binding()?;
            let body = self.do_block()?;
            let or_else = self.optional_else()?;
            return Ok(Stmt::new(
                StmtKind::ForC(Box::new(ForCLoop {
                    init,
                    cond,
                    step,
                    body,
                    or_else,
                    binding,
                })),
                pos,
            ));
        }

        let first = self.variable_with_attributes(true)?;

        // from/to range.
        if self.check(&TokenKind::From) {
            self.advance()?;
            let start = self.expression()?;
            self.eat(&TokenKind::To)?;
            let end = self.expression()?;

            let binding = self.loop_binding()?;
            let body = self.do_block()?;
            let or_else = self.optional_else()?;
            return Ok(Stmt::new(
                StmtKind::ForFromTo(Box::new(ForFromToLoop {
                    target: first,
                    start,
                    end,
                    body,
                    or_else,
                    binding,
                })),
                pos,
            ));
        }

        // for-in, possibly with multiple unpacking targets.
        let mut targets = vec![first];
        while self.check(&TokenKind::Comma) {
            self.advance()?;
            targets.push(self.variable_with_attributes(true)?);
        }
        self.eat(&TokenKind::In)?;
        let iterable = self.expression()?;

        let take = if self.check(&TokenKind::Take) {
            self.advance()?;
            Some(self.expression()?)
        } else {
            None
        };

        let binding = self.loop_binding()?;
        let body = self.do_block()?;
        let or_else = self.optional_else()?;
        Ok(Stmt::new(
            StmtKind::ForIn(Box::new(ForInLoop {
                targets,
                iterable,
                take,
                body,
                or_else,
                binding,
            })),
            pos,
        ))
    }

    fn loop_binding(&mut self) -> Result<Option<Expr>, ParseError> {
        if self.check(&TokenKind::As) {
            self.advance()?;
            Ok(Some(self.variable_with_attributes(true)?))
        } else {
            Ok(None)
        }
    }

    fn optional_else(&mut self) -> Result<Option<Stmt>, ParseError> {
        if self.check(&TokenKind::Else) {
            Ok(Some(self.else_block()?))
        } else {
            Ok(None)
        }
    }

    /// `switch_statement: SWITCH expr (COLON)? LBRACES case-arms (DEFAULT COLON statement)? RBRACES`
    fn switch_statement(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.pos();
        self.eat(&TokenKind::Switch)?;
        let subject = self.expression()?;
        if self.check(&TokenKind::Colon) {
            self.advance()?;
        }
        self.eat(&TokenKind::LBrace)?;

        let mut arms = Vec::new();
        while self.check(&TokenKind::Case) {
            arms.push(self.switch_cases_block()?);
        }

        let default = if self.check(&TokenKind::Default) {
            self.advance()?;
            self.eat(&TokenKind::Colon)?;
            Some(self.statement(ReturnMode::Unwrap)?)
        } else {
            None
        };
        self.eat(&TokenKind::RBrace)?;

        Ok(Stmt::new(
            StmtKind::Switch(Box::new(SwitchStmt {
                subject,
                arms,
                default,
            })),
            pos,
        ))
    }

    /// One switch arm: consecutive empty `case expr:` labels fuse with the
    /// following statement, and an immediately trailing `break` folds into
    /// the arm body.
    fn switch_cases_block(&mut self) -> Result<SwitchArm, ParseError> {
        let mut tests = Vec::new();

        loop {
            self.eat(&TokenKind::Case)?;
            tests.push(self.expression()?);
            self.eat(&TokenKind::Colon)?;
            if self.check(&TokenKind::Case) {
                continue;
            }

            let mut body = self.statement(ReturnMode::Unwrap)?;
            if self.check(&TokenKind::Break) {
                let action = self.actions_statement()?;
                body = match body.kind {
                    StmtKind::Compound { mut body, mode } => {
                        let pos = action.pos;
                        body.push(action);
                        Stmt::new(StmtKind::Compound { body, mode }, pos)
                    }
                    _ => {
                        let pos = body.pos;
                        Stmt::new(
                            StmtKind::Compound {
                                body: vec![body, action],
                                mode: ReturnMode::Propagate,
                            },
                            pos,
                        )
                    }
                };
            }
            return Ok(SwitchArm { tests, body });
        }
    }

    /// `with_statement: WITH expr (AS var)? do_block`
    fn with_statement(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.pos();
        self.eat(&TokenKind::With)?;
        let resource = self.expression()?;
        let binding = if self.check(&TokenKind::As) {
            self.advance()?;
            Some(self.variable_with_attributes(true)?)
        } else {
            None
        };
        let body = self.do_block()?;
        Ok(Stmt::new(
            StmtKind::With(Box::new(WithStmt {
                resource,
                binding,
                body,
            })),
            pos,
        ))
    }

    /// `try_statement: TRY do_block (except_block)* (else_block)? (FINALLY do_block)? (else_block)?`
    fn try_statement(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.pos();
        self.eat(&TokenKind::Try)?;
        let body = self.do_block()?;

        let mut handlers = Vec::new();
        while self.check(&TokenKind::Except) {
            handlers.push(self.except_block()?);
        }

        let mut or_else = None;
        if self.check(&TokenKind::Else) {
            or_else = Some(self.else_block()?);
        }

        let finally = if self.check(&TokenKind::Finally) {
            self.advance()?;
            Some(self.do_block()?)
        } else {
            None
        };

        if or_else.is_none() && self.check(&TokenKind::Else) {
            or_else = Some(self.else_block()?);
        }

        Ok(Stmt::new(
            StmtKind::Try(Box::new(TryStmt {
                body,
                handlers,
                or_else,
                finally,
            })),
            pos,
        ))
    }

    /// `except_block: EXCEPT expr (AS var)? do_block`
    fn except_block(&mut self) -> Result<ExceptArm, ParseError> {
        self.eat(&TokenKind::Except)?;
        let class = self.expression()?;
        let binding = if self.check(&TokenKind::As) {
            self.advance()?;
            Some(self.variable_with_attributes(true)?)
        } else {
            None
        };
        let body = self.do_block()?;
        Ok(ExceptArm {
            class,
            binding,
            body,
        })
    }

    /// `import_statement: (PYTHON)? (FROM dotted_name)? IMPORT name (AS var)? (COMMA ...)*`
    fn import_statement(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.pos();
        let python = self.check(&TokenKind::Python);
        if python {
            self.advance()?;
        }

        let mut package = Vec::new();
        if self.check(&TokenKind::From) {
            self.advance()?;
            package.push(self.ident()?.0);
            while self.check(&TokenKind::Dot) {
                self.advance()?;
                package.push(self.ident()?.0);
            }
        }

        self.eat(&TokenKind::Import)?;
        let mut modules = vec![self.module_name()?];
        while self.check(&TokenKind::Comma) {
            self.advance()?;
            modules.push(self.module_name()?);
        }

        Ok(Stmt::new(
            StmtKind::Import(ImportStmt {
                package,
                modules,
                python,
            }),
            pos,
        ))
    }

    /// `module_name: ID (AS ID)?`
    fn module_name(&mut self) -> Result<ImportItem, ParseError> {
        let (name, _) = self.ident()?;
        let alias = if self.check(&TokenKind::As) {
            self.advance()?;
            Some(self.ident()?.0)
        } else {
            None
        };
        Ok(ImportItem { name, alias })
    }

    /// `using_statement: USING variable_with_attributes do_block`
    fn using_statement(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.pos();
        self.eat(&TokenKind::Using)?;
        let space = self.variable_with_attributes(true)?;
        let body = self.do_block()?;
        Ok(Stmt::new(
            StmtKind::Using(Box::new(UsingStmt { space, body })),
            pos,
        ))
    }

    /// `class_statement: CLASS ID ( bases ) compound_statement`
    fn class_statement(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.pos();
        self.eat(&TokenKind::Class)?;
        let (name, _) = self.ident()?;

        self.eat(&TokenKind::LParen)?;
        let mut bases = Vec::new();
        if !self.check(&TokenKind::RParen) {
            bases.push(self.variable_with_attributes(true)?);
            while self.check(&TokenKind::Comma) {
                self.advance()?;
                if !self.check(&TokenKind::RParen) {
                    bases.push(self.variable_with_attributes(true)?);
                }
            }
        }
        self.eat(&TokenKind::RParen)?;

        let body = self.compound_statement(ReturnMode::Forbid)?;
        Ok(Stmt::new(
            StmtKind::Class(Box::new(ClassStmt { name, bases, body })),
            pos,
        ))
    }
}
