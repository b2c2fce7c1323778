//! The tree-walking evaluator.
//!
//! `eval_stmt` dispatches over statement kinds; expression evaluation lives
//! in `exprs.rs`, assignment resolution in `assign.rs`, and module imports
//! in `imports.rs`. Control flow travels as [`ScriptAction`] values that
//! bubble through compound bodies until a construct consumes them.

mod assign;
mod exprs;
mod imports;
mod interpolation;

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use kandy_ir::{
    ActionKind, CallableKind, CondLoop, ForCLoop, ForFromToLoop, ForInLoop, FunctionDef,
    ParamMode, RepeatLoop, ReturnMode, Stmt, StmtKind, SwitchStmt, TryStmt, TypeAnnotation,
    UsingStmt, WithStmt,
};

use crate::builtins::{call_builtin, call_type, Builtin};
use crate::callable::{Callable, ReturnTypeState, RuntimeParam};
use crate::callstack::{lookup, ActivationRecord, ArKind, CallStack, ScopeRef};
use crate::exception::{
    interpreter_error, name_error, not_callable, syntax_error, type_error, value_error,
    EvalResult, ExcClass, KandyError,
};
use crate::loop_control::{LoopControl, TakeSplitter};
use crate::methods::dispatch_method;
use crate::object::{ClassObject, InstanceObject, MethodTarget};
use crate::print_handler::PrintHandler;
use crate::record::{Record, TypeConstraint, TypeRef};
use crate::spaces::{SpaceKind, SpaceObject};
use crate::value::{iterate, truthy, value_eq, HashKey, TypeTag, Value, ValueDict};

pub(crate) use imports::{call_native, ModuleEntry};

static EVALUATOR_IDS: AtomicU64 = AtomicU64::new(1);

const KANDY_VERSION: f64 = 1.0;
const KANDY_AUTHOR: &str = "KandyScript developers";

/// A control-flow carrier for `return`/`break`/`continue`.
///
/// `export` is rewritten into `return <space>` when evaluated, so only the
/// three kinds above travel.
pub struct ScriptAction {
    pub kind: ActionKind,
    /// Return payload, or the `break name`/`continue name` target.
    pub payload: Value,
}

/// Result of evaluating one statement.
pub enum Exec {
    Value(Value),
    Action(ScriptAction),
}

impl Exec {
    fn unit() -> Exec {
        Exec::Value(Value::None)
    }
}

/// How a loop body iteration ended.
enum LoopFlow {
    /// Body ran to completion (or was skipped by the ignore counter).
    Finished,
    /// A matching `continue`.
    Continued,
    /// A matching `break`.
    BreakLoop,
    /// A foreign-target action or a `return`, re-raised to the caller.
    Propagate(ScriptAction),
}

/// The evaluator: a call stack of activation records plus the module cache.
pub struct Evaluator {
    pub(crate) stack: CallStack,
    main_ar: ScopeRef,
    module_ar: ScopeRef,
    user_ar: ScopeRef,
    global_ar: ScopeRef,
    private_ar: ScopeRef,
    /// Identity token gating the `Private` space handle.
    id: u64,
    inside_class: Option<String>,
    /// Imported modules memoized by absolute path, shared with sibling
    /// evaluators so cyclic imports observe in-flight entries.
    modules: Rc<std::cell::RefCell<FxHashMap<PathBuf, ModuleEntry>>>,
    pub filename: Option<PathBuf>,
    pub library_dir: Option<PathBuf>,
    printer: PrintHandler,
}

impl Default for Evaluator {
    fn default() -> Self {
        Evaluator::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Evaluator::with_print_handler(PrintHandler::Stdout)
    }

    pub fn with_print_handler(printer: PrintHandler) -> Self {
        let mut ev = Evaluator {
            stack: CallStack::new(),
            main_ar: ActivationRecord::new("unseeded", ArKind::BuiltIn, 0, None),
            module_ar: ActivationRecord::new("unseeded", ArKind::Module, 1, None),
            user_ar: ActivationRecord::new("unseeded", ArKind::User, 2, None),
            global_ar: ActivationRecord::new("unseeded", ArKind::Global, 3, None),
            private_ar: ActivationRecord::new("unseeded", ArKind::Private, 4, None),
            id: EVALUATOR_IDS.fetch_add(1, Ordering::Relaxed),
            inside_class: None,
            modules: Rc::new(std::cell::RefCell::new(FxHashMap::default())),
            filename: None,
            library_dir: None,
            printer,
        };
        ev.init_components(None);
        ev
    }

    /// Reset the evaluator to its seeded state.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.init_components(None);
    }

    /// Interpret a program from scratch.
    pub fn interpret(&mut self, text: &str) -> EvalResult<Value> {
        self.filename = None;
        self.reset();
        self.run_program(text)
    }

    /// Interpret one REPL entry, keeping the accumulated state.
    pub fn repl_step(&mut self, text: &str) -> EvalResult<Value> {
        self.run_program(text)
    }

    /// Interpret a `.ks` file.
    pub fn interpret_file(&mut self, path: &Path) -> EvalResult<Value> {
        let abs = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());
        let text = std::fs::read_to_string(&abs)
            .map_err(|err| crate::exception::io_error(format!("{}: {err}", abs.display())))?;
        self.filename = Some(abs);
        self.reset();
        self.run_program(&text)
    }

    /// Parse and run a program against the current state. The result is the
    /// value of the last executed top-level statement.
    pub(crate) fn run_program(&mut self, text: &str) -> EvalResult<Value> {
        let program = kandy_parse::parse_program(text)?;
        let StmtKind::Compound { body, .. } = &program.kind else {
            return Err(interpreter_error("parser produced a non-compound program"));
        };
        let mut last = Value::None;
        for stmt in body {
            match self.eval_stmt(stmt)? {
                Exec::Value(value) => last = value,
                Exec::Action(action) => match action.kind {
                    ActionKind::Return => return Ok(action.payload),
                    ActionKind::Break => {
                        return Err(interpreter_error("'break' outside loop"))
                    }
                    _ => return Err(interpreter_error("'continue' outside loop")),
                },
            }
        }
        Ok(last)
    }

    pub(crate) fn print(&mut self, text: &str) {
        self.printer.write(text);
    }

    // Seeding

    fn init_components(&mut self, module_name: Option<&str>) {
        let name = module_name.unwrap_or("Kandy-Script-Stack (KSS)");
        let ar0 = ActivationRecord::new(name, ArKind::BuiltIn, 0, None);
        let ar1 = ActivationRecord::new("Module", ArKind::Module, 1, Some(ar0.clone()));
        let ar2 = ActivationRecord::new("User", ArKind::User, 2, Some(ar1.clone()));
        let ar3 = ActivationRecord::new("Global", ArKind::Global, 3, Some(ar2.clone()));
        let ar4 = ActivationRecord::new("Private", ArKind::Private, 4, Some(ar3.clone()));

        self.stack.push(ar0.clone());
        self.stack.push(ar1.clone());
        self.stack.push(ar2.clone());
        self.stack.push(ar3.clone());

        self.main_ar = ar0.clone();
        self.module_ar = ar1;
        self.user_ar = ar2.clone();
        self.global_ar = ar3.clone();
        self.private_ar = ar4;

        {
            let mut builtin = ar0.borrow_mut();

            // Host-type constants.
            for (name, tag) in [
                ("bool", TypeTag::Bool),
                ("bytes", TypeTag::Bytes),
                ("complex", TypeTag::Complex),
                ("dict", TypeTag::Dict),
                ("float", TypeTag::Float),
                ("frozenset", TypeTag::FrozenSet),
                ("int", TypeTag::Int),
                ("list", TypeTag::List),
                ("object", TypeTag::Object),
                ("set", TypeTag::Set),
                ("str", TypeTag::Str),
                ("tuple", TypeTag::Tuple),
                ("type", TypeTag::Type),
            ] {
                builtin.set_unchecked(name, Record::constant(Value::Type(tag)));
            }

            // Built-in functions.
            for (name, function) in Builtin::ALL {
                builtin.set_unchecked(name, Record::constant(Value::Builtin(function)));
            }

            // Capability objects.
            builtin.set_unchecked(
                "MultipleTypesClass",
                Record::constant(Value::Builtin(Builtin::MultipleTypes)),
            );
            builtin.set_unchecked(
                "numeric",
                Record::constant(Value::MultipleTypes(Rc::new(vec![
                    TypeRef::Tag(TypeTag::Int),
                    TypeRef::Tag(TypeTag::Float),
                ]))),
            );
            builtin.set_unchecked(
                "Iterable",
                Record::constant(Value::MultipleTypes(Rc::new(vec![
                    TypeRef::Tag(TypeTag::List),
                    TypeRef::Tag(TypeTag::Tuple),
                    TypeRef::Tag(TypeTag::Dict),
                ]))),
            );
            builtin.set_unchecked(
                "Text",
                Record::constant(Value::MultipleTypes(Rc::new(vec![
                    TypeRef::Tag(TypeTag::Str),
                    TypeRef::Tag(TypeTag::Bytes),
                ]))),
            );

            // Exception classes, exposed as a read-only space.
            let errors_ar = ActivationRecord::new("Errors", ArKind::BuiltIn, 0, None);
            {
                let mut errors = errors_ar.borrow_mut();
                for class in ExcClass::ALL {
                    errors.set_unchecked(class.name(), Record::constant(Value::ExcType(class)));
                }
            }
            errors_ar.borrow_mut().read_only = true;
            builtin.set_unchecked(
                "Errors",
                Record::constant(Value::Space(Rc::new(SpaceObject::fixed(
                    "Errors", errors_ar,
                )))),
            );

            // Space handles.
            builtin.set_unchecked(
                "Global",
                Record::constant(Value::Space(Rc::new(SpaceObject::fixed(
                    "Global",
                    ar3.clone(),
                )))),
            );
            builtin.set_unchecked(
                "User",
                Record::constant(Value::Space(Rc::new(SpaceObject::fixed(
                    "User",
                    ar2.clone(),
                )))),
            );
            builtin.set_unchecked(
                "BuiltIn",
                Record::constant(Value::Space(Rc::new(SpaceObject::fixed(
                    "BuiltIn",
                    ar0.clone(),
                )))),
            );
            builtin.set_unchecked(
                "Now",
                Record::constant(Value::Space(Rc::new(SpaceObject {
                    name: "CurrentSpace".to_string(),
                    kind: SpaceKind::Current,
                }))),
            );
            builtin.set_unchecked(
                "Prev",
                Record::constant(Value::Space(Rc::new(SpaceObject {
                    name: "PrevSpace".to_string(),
                    kind: SpaceKind::Prev,
                }))),
            );
            builtin.set_unchecked(
                "Private",
                Record::constant(Value::Space(Rc::new(SpaceObject {
                    name: "PrivateSpace".to_string(),
                    kind: SpaceKind::Private { owner: self.id },
                }))),
            );

            // Interpreter constants.
            builtin.set_unchecked("KANDY_VERSION", Record::constant(Value::Float(KANDY_VERSION)));
            builtin.set_unchecked("KANDY_AUTHOR", Record::constant(Value::string(KANDY_AUTHOR)));
            let file = self
                .filename
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<VirtualFile>".to_string());
            builtin.set_unchecked("KANDY_FILE", Record::constant(Value::string(file)));
            builtin.set_unchecked("KANDY_MAIN", Record::constant(Value::Bool(true)));
            builtin.set_unchecked("KANDY_TYPE", Record::constant(Value::string("program")));
            let start = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            builtin.set_unchecked("PROGRAM_START", Record::constant(Value::Float(start)));
        }

        ar0.borrow_mut().read_only = true;
        ar2.borrow_mut().read_only = true;
    }

    /// Build a sibling evaluator for a module import.
    pub(crate) fn sibling_for_module(&self, name: &str) -> Evaluator {
        let mut child = Evaluator {
            stack: CallStack::new(),
            main_ar: ActivationRecord::new("unseeded", ArKind::BuiltIn, 0, None),
            module_ar: ActivationRecord::new("unseeded", ArKind::Module, 1, None),
            user_ar: ActivationRecord::new("unseeded", ArKind::User, 2, None),
            global_ar: ActivationRecord::new("unseeded", ArKind::Global, 3, None),
            private_ar: ActivationRecord::new("unseeded", ArKind::Private, 4, None),
            id: EVALUATOR_IDS.fetch_add(1, Ordering::Relaxed),
            inside_class: None,
            modules: self.modules.clone(),
            filename: None,
            library_dir: self.library_dir.clone(),
            printer: self.printer.clone(),
        };
        child.init_components(Some(name));

        // The module is not the main program.
        {
            let mut main = child.main_ar.borrow_mut();
            main.read_only = false;
            main.set_unchecked("KANDY_MAIN", Record::constant(Value::Bool(false)));
            main.set_unchecked("KANDY_TYPE", Record::constant(Value::string("module")));
            main.read_only = true;
        }
        // Copy the importer's User bindings, ignoring read-only protection.
        {
            let src = self.user_ar.borrow();
            let mut dst = child.user_ar.borrow_mut();
            for (key, record) in src.entries() {
                dst.set_unchecked(key.clone(), record.clone());
            }
        }
        child
    }

    pub(crate) fn global_frame(&self) -> ScopeRef {
        self.global_ar.clone()
    }

    pub(crate) fn module_frame(&self) -> ScopeRef {
        self.module_ar.clone()
    }

    // Statements

    pub(crate) fn eval_stmt(&mut self, stmt: &Stmt) -> EvalResult<Exec> {
        match &stmt.kind {
            StmtKind::Empty => Ok(Exec::unit()),
            StmtKind::Expr(expr) => Ok(Exec::Value(self.eval_expr(expr)?)),
            StmtKind::Compound { body, mode } => self.eval_compound(body, *mode),
            StmtKind::Assign {
                ty,
                target,
                question,
                aug,
                value,
            } => {
                let value = self.eval_expr(value)?;
                if *question && !truthy(&value) {
                    return Ok(Exec::unit());
                }
                self.general_assign(target, ty.as_ref(), value, *aug)?;
                Ok(Exec::unit())
            }
            StmtKind::Action(action) => match action.kind {
                ActionKind::Export => {
                    let ar = self.stack.peek();
                    let name = format!("Space-Exported-{}", ar.borrow().name);
                    let space = Value::Space(Rc::new(SpaceObject::fixed(name, ar)));
                    Ok(Exec::Action(ScriptAction {
                        kind: ActionKind::Return,
                        payload: space,
                    }))
                }
                kind => {
                    let payload = match &action.value {
                        Some(expr) => self.eval_expr(expr)?,
                        None => Value::None,
                    };
                    Ok(Exec::Action(ScriptAction { kind, payload }))
                }
            },
            StmtKind::If { arms, or_else } => {
                for arm in arms {
                    if truthy(&self.eval_expr(&arm.cond)?) {
                        return self.eval_stmt(&arm.body);
                    }
                }
                match or_else {
                    Some(stmt) => self.eval_stmt(stmt),
                    None => Ok(Exec::unit()),
                }
            }
            StmtKind::Unless { arms, or_else } => {
                for arm in arms {
                    if !truthy(&self.eval_expr(&arm.cond)?) {
                        return self.eval_stmt(&arm.body);
                    }
                }
                match or_else {
                    Some(stmt) => self.eval_stmt(stmt),
                    None => Ok(Exec::unit()),
                }
            }
            StmtKind::While(data) => self.eval_cond_loop(data, false),
            StmtKind::Until(data) => self.eval_cond_loop(data, true),
            StmtKind::Repeat(data) => self.eval_repeat(data),
            StmtKind::ForIn(data) => self.eval_for_in(data),
            StmtKind::ForFromTo(data) => self.eval_for_from_to(data),
            StmtKind::ForC(data) => self.eval_for_c(data),
            StmtKind::Switch(data) => self.eval_switch(data),
            StmtKind::With(data) => self.eval_with(data),
            StmtKind::Try(data) => self.eval_try(data),
            StmtKind::Using(data) => self.eval_using(data),
            StmtKind::Class(data) => self.eval_class(data),
            StmtKind::Import(data) => self.eval_import(data),
            StmtKind::Delete(expr) => {
                // Recognized but deliberately inert.
                self.eval_expr(expr)?;
                Ok(Exec::unit())
            }
            StmtKind::ProcedureDecl(def) | StmtKind::FunctionDecl(def) => {
                let callable = self.make_callable(def)?;
                let name = callable.name.clone();
                let value = Value::Callable(Rc::new(callable));
                self.assign_in_top(&name, None, value, None)?;
                Ok(Exec::unit())
            }
        }
    }

    fn eval_compound(&mut self, body: &[Stmt], mode: ReturnMode) -> EvalResult<Exec> {
        let mut last = Value::None;
        for child in body {
            match self.eval_stmt(child)? {
                Exec::Value(value) => last = value,
                Exec::Action(action) => {
                    if action.kind == ActionKind::Return {
                        return match mode {
                            ReturnMode::Unwrap => Ok(Exec::Value(action.payload)),
                            ReturnMode::Propagate => Ok(Exec::Action(action)),
                            ReturnMode::Forbid => Err(syntax_error(
                                "The 'return' statement can't be used here.",
                            )),
                        };
                    }
                    return Ok(Exec::Action(action));
                }
            }
        }
        Ok(Exec::Value(last))
    }

    // Loops

    fn bind_loop_control(
        &mut self,
        binding: &Option<kandy_ir::Expr>,
        control: &Rc<LoopControl>,
    ) -> EvalResult<()> {
        if let Some(target) = binding {
            self.general_assign(target, None, Value::LoopControl(control.clone()), None)?;
        }
        Ok(())
    }

    /// Run one iteration's body and classify the outcome.
    fn loop_body(&mut self, body: &Stmt, control: &Rc<LoopControl>) -> EvalResult<LoopFlow> {
        match self.eval_stmt(body)? {
            Exec::Value(_) => {
                control.mark_finished();
                Ok(LoopFlow::Finished)
            }
            Exec::Action(action) => match action.kind {
                ActionKind::Continue if loop_target_matches(&action.payload, control) => {
                    Ok(LoopFlow::Continued)
                }
                ActionKind::Break if loop_target_matches(&action.payload, control) => {
                    Ok(LoopFlow::BreakLoop)
                }
                _ => Ok(LoopFlow::Propagate(action)),
            },
        }
    }

    /// Begin an iteration; true when the ignore counter swallows it.
    fn skip_ignored(control: &Rc<LoopControl>) -> bool {
        control.mark_count();
        if control.remaining_ignore() > 0 {
            control.mark_ignored();
            control.mark_finished();
            true
        } else {
            false
        }
    }

    fn finish_loop(
        &mut self,
        control: &Rc<LoopControl>,
        broke: bool,
        or_else: &Option<Stmt>,
    ) -> EvalResult<Exec> {
        control.finish();
        if !broke {
            if let Some(stmt) = or_else {
                if let Exec::Action(action) = self.eval_stmt(stmt)? {
                    return Ok(Exec::Action(action));
                }
            }
        }
        Ok(Exec::unit())
    }

    fn eval_cond_loop(&mut self, data: &CondLoop, until: bool) -> EvalResult<Exec> {
        let control = Rc::new(LoopControl::new());
        self.bind_loop_control(&data.binding, &control)?;
        let mut broke = false;

        if data.do_first && !Self::skip_ignored(&control) {
            match self.loop_body(&data.body, &control)? {
                LoopFlow::Finished | LoopFlow::Continued => {}
                LoopFlow::BreakLoop => {
                    return self.finish_loop(&control, true, &data.or_else);
                }
                LoopFlow::Propagate(action) => {
                    control.finish();
                    return Ok(Exec::Action(action));
                }
            }
        }

        loop {
            let cond = truthy(&self.eval_expr(&data.cond)?);
            if cond == until {
                break;
            }
            if Self::skip_ignored(&control) {
                continue;
            }
            match self.loop_body(&data.body, &control)? {
                LoopFlow::Finished | LoopFlow::Continued => {}
                LoopFlow::BreakLoop => {
                    broke = true;
                    break;
                }
                LoopFlow::Propagate(action) => {
                    control.finish();
                    return Ok(Exec::Action(action));
                }
            }
        }

        self.finish_loop(&control, broke, &data.or_else)
    }

    fn eval_repeat(&mut self, data: &RepeatLoop) -> EvalResult<Exec> {
        let control = Rc::new(LoopControl::new());
        self.bind_loop_control(&data.binding, &control)?;

        let count = match self.eval_expr(&data.count)? {
            Value::Int(n) => n,
            Value::Bool(b) => i64::from(b),
            other => {
                return Err(type_error(format!(
                    "'{}' object cannot be interpreted as an integer",
                    other.type_name()
                )))
            }
        };

        let mut broke = false;
        for _ in 0..count.max(0) {
            if Self::skip_ignored(&control) {
                continue;
            }
            match self.loop_body(&data.body, &control)? {
                LoopFlow::Finished | LoopFlow::Continued => {}
                LoopFlow::BreakLoop => {
                    broke = true;
                    break;
                }
                LoopFlow::Propagate(action) => {
                    control.finish();
                    return Ok(Exec::Action(action));
                }
            }
        }
        self.finish_loop(&control, broke, &data.or_else)
    }

    fn eval_for_from_to(&mut self, data: &ForFromToLoop) -> EvalResult<Exec> {
        let control = Rc::new(LoopControl::new());
        self.bind_loop_control(&data.binding, &control)?;

        let start = self.expect_int(&data.start, "for-from")?;
        let end = self.expect_int(&data.end, "for-to")?;
        let step = if end > start { 1 } else { -1 };

        let mut broke = false;
        let mut current = start;
        loop {
            let done = if step > 0 { current > end } else { current < end };
            if done {
                break;
            }
            if Self::skip_ignored(&control) {
                current += step;
                continue;
            }
            self.general_assign(&data.target, None, Value::Int(current), None)?;
            match self.loop_body(&data.body, &control)? {
                LoopFlow::Finished | LoopFlow::Continued => {}
                LoopFlow::BreakLoop => {
                    broke = true;
                    break;
                }
                LoopFlow::Propagate(action) => {
                    control.finish();
                    return Ok(Exec::Action(action));
                }
            }
            current += step;
        }
        self.finish_loop(&control, broke, &data.or_else)
    }

    fn eval_for_c(&mut self, data: &ForCLoop) -> EvalResult<Exec> {
        let control = Rc::new(LoopControl::new());
        self.bind_loop_control(&data.binding, &control)?;

        if let Exec::Action(action) = self.eval_stmt(&data.init)? {
            return Ok(Exec::Action(action));
        }

        let mut broke = false;
        while truthy(&self.eval_expr(&data.cond)?) {
            if Self::skip_ignored(&control) {
                continue;
            }
            match self.loop_body(&data.body, &control)? {
                LoopFlow::Finished => {
                    // The step runs only after an uninterrupted iteration;
                    // `continue` skips it.
                    if let Exec::Action(action) = self.eval_stmt(&data.step)? {
                        control.finish();
                        return Ok(Exec::Action(action));
                    }
                }
                LoopFlow::Continued => {}
                LoopFlow::BreakLoop => {
                    broke = true;
                    break;
                }
                LoopFlow::Propagate(action) => {
                    control.finish();
                    return Ok(Exec::Action(action));
                }
            }
        }
        self.finish_loop(&control, broke, &data.or_else)
    }

    fn eval_for_in(&mut self, data: &ForInLoop) -> EvalResult<Exec> {
        let control = Rc::new(LoopControl::new());
        self.bind_loop_control(&data.binding, &control)?;

        let iterable = self.eval_expr(&data.iterable)?;
        let mut items: Box<dyn Iterator<Item = EvalResult<Value>>> = match &data.take {
            Some(take) => {
                let chunk = self.expect_int(take, "take")?;
                if chunk <= 0 {
                    return Err(value_error("take count must be positive"));
                }
                Box::new(TakeSplitter::new(
                    iterate(&iterable)?,
                    chunk as usize,
                    data.targets.len(),
                ))
            }
            None => Box::new(iterate(&iterable)?.map(Ok)),
        };

        let mut broke = false;
        while let Some(item) = items.next() {
            let item = item?;
            if Self::skip_ignored(&control) {
                continue;
            }

            if data.targets.len() == 1 {
                self.general_assign(&data.targets[0], None, item, None)?;
            } else {
                let parts: Vec<Value> = iterate(&item)?.collect();
                if parts.len() > data.targets.len() {
                    return Err(value_error(format!(
                        "too many values to unpack (expected {})",
                        data.targets.len()
                    )));
                }
                if parts.len() < data.targets.len() {
                    return Err(value_error(format!(
                        "not enough values to unpack (expected {}, got {})",
                        data.targets.len(),
                        parts.len()
                    )));
                }
                for (target, part) in data.targets.iter().zip(parts) {
                    self.general_assign(target, None, part, None)?;
                }
            }

            match self.loop_body(&data.body, &control)? {
                LoopFlow::Finished | LoopFlow::Continued => {}
                LoopFlow::BreakLoop => {
                    broke = true;
                    break;
                }
                LoopFlow::Propagate(action) => {
                    control.finish();
                    return Ok(Exec::Action(action));
                }
            }
        }
        self.finish_loop(&control, broke, &data.or_else)
    }

    // Switch

    fn eval_switch(&mut self, data: &SwitchStmt) -> EvalResult<Exec> {
        let subject = self.eval_expr(&data.subject)?;
        let mut matched = false;

        for arm in &data.arms {
            let mut hit = false;
            for test in &arm.tests {
                if value_eq(&subject, &self.eval_expr(test)?) {
                    hit = true;
                    break;
                }
            }
            if !hit {
                continue;
            }
            matched = true;
            match self.eval_stmt(&arm.body)? {
                Exec::Value(value) => return Ok(Exec::Value(value)),
                Exec::Action(action) => match action.kind {
                    // Only a targetless break ends the switch.
                    ActionKind::Break if matches!(action.payload, Value::None) => {
                        return Ok(Exec::unit());
                    }
                    ActionKind::Continue if matches!(action.payload, Value::None) => {
                        continue;
                    }
                    _ => return Ok(Exec::Action(action)),
                },
            }
        }

        if !matched {
            if let Some(default) = &data.default {
                return self.eval_stmt(default);
            }
        }
        Ok(Exec::unit())
    }

    // With / Try / Using / Class

    fn eval_with(&mut self, data: &WithStmt) -> EvalResult<Exec> {
        let resource = self.eval_expr(&data.resource)?;
        let entered = self.enter_resource(&resource)?;

        let bound = match &data.binding {
            Some(binding) => self.general_assign(binding, None, entered, None).map(|_| ()),
            None => Ok(()),
        };
        let result = match bound {
            Ok(()) => self.eval_stmt(&data.body),
            Err(err) => Err(err),
        };

        // Release on every exit path, including errors and actions.
        let release = self.exit_resource(&resource);
        let exec = result?;
        release?;
        Ok(exec)
    }

    fn enter_resource(&mut self, resource: &Value) -> EvalResult<Value> {
        match resource {
            Value::File(_) => Ok(resource.clone()),
            Value::Instance(instance) => match instance.class.find_member("__enter__") {
                Some(record) => self.call_value(&record.value, vec![resource.clone()], Vec::new()),
                None => Err(type_error(format!(
                    "'{}' object does not support the resource protocol",
                    instance.class.name
                ))),
            },
            other => Err(type_error(format!(
                "'{}' object does not support the resource protocol",
                other.type_name()
            ))),
        }
    }

    fn exit_resource(&mut self, resource: &Value) -> EvalResult<()> {
        match resource {
            Value::File(file) => {
                file.borrow_mut().close();
                Ok(())
            }
            Value::Instance(instance) => {
                if let Some(record) = instance.class.find_member("__exit__") {
                    self.call_value(&record.value, vec![resource.clone()], Vec::new())?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn eval_try(&mut self, data: &TryStmt) -> EvalResult<Exec> {
        let outcome = self.eval_stmt(&data.body);
        let mut raised = false;

        let mut result: EvalResult<Exec> = match outcome {
            Ok(exec) => Ok(exec),
            Err(err) => {
                raised = true;
                let mut handled: Option<EvalResult<Exec>> = None;
                for handler in &data.handlers {
                    // Failures while resolving the handler itself replace
                    // the outcome but still flow through `finally`.
                    let matches = self
                        .eval_expr(&handler.class)
                        .and_then(|class_value| exception_matches(&err, &class_value));
                    match matches {
                        Ok(false) => {}
                        Ok(true) => {
                            let bound = match &handler.binding {
                                Some(binding) => self
                                    .general_assign(
                                        binding,
                                        None,
                                        Value::Exception(Rc::new(err.clone())),
                                        None,
                                    )
                                    .map(|_| ()),
                                None => Ok(()),
                            };
                            handled = Some(match bound {
                                Ok(()) => self.eval_stmt(&handler.body),
                                Err(bind_err) => Err(bind_err),
                            });
                            break;
                        }
                        Err(resolve_err) => {
                            handled = Some(Err(resolve_err));
                            break;
                        }
                    }
                }
                handled.unwrap_or(Err(err))
            }
        };

        // `else` runs only when no exception occurred and the body did not
        // leave through an action.
        if !raised {
            if matches!(result, Ok(Exec::Value(_))) {
                if let Some(or_else) = &data.or_else {
                    result = self.eval_stmt(or_else);
                }
            }
        }

        // `finally` always runs; its errors and actions take precedence.
        if let Some(finally) = &data.finally {
            match self.eval_stmt(finally)? {
                Exec::Value(_) => {}
                Exec::Action(action) => return Ok(Exec::Action(action)),
            }
        }

        result
    }

    fn eval_using(&mut self, data: &UsingStmt) -> EvalResult<Exec> {
        let space = self.eval_expr(&data.space)?;
        let ar = self.resolve_space(&space)?;
        self.stack.push(ar);
        let result = self.eval_stmt(&data.body);
        self.stack.pop();
        match result? {
            Exec::Action(action) => Ok(Exec::Action(action)),
            Exec::Value(_) => Ok(Exec::unit()),
        }
    }

    fn eval_class(&mut self, data: &kandy_ir::ClassStmt) -> EvalResult<Exec> {
        let mut bases = Vec::new();
        for base in &data.bases {
            let value = self.eval_expr(base)?;
            bases.push(crate::builtins::expect_class(&value)?);
        }

        let current = self.stack.peek();
        let level = current.borrow().nesting_level;
        let class_ar =
            ActivationRecord::new(data.name.as_str(), ArKind::Class, level, Some(current.clone()));

        self.stack.push(class_ar.clone());
        let saved = self.inside_class.replace(data.name.clone());
        let body_result = self.eval_stmt(&data.body);
        self.inside_class = saved;
        self.stack.pop();
        body_result?;

        let class = Rc::new(ClassObject {
            name: data.name.clone(),
            ar: class_ar,
            bases,
        });
        let record = Record::constant(Value::Class(class));
        current.borrow_mut().set(data.name.clone(), record)?;
        Ok(Exec::unit())
    }

    // Callables

    /// Build a callable from a declaration, evaluating parameter defaults and
    /// inserting `self` for class-body declarations.
    pub(crate) fn make_callable(&mut self, def: &Rc<FunctionDef>) -> EvalResult<Callable> {
        let inside_class = self.inside_class.is_some();
        let mut params: Vec<RuntimeParam> = Vec::with_capacity(def.params.len() + 1);

        if inside_class && def.params.first().map(|p| p.name.as_str()) != Some("self") {
            params.push(RuntimeParam {
                name: "self".to_string(),
                ty: None,
                default: None,
                mode: ParamMode::Normal,
            });
        }

        for param in &def.params {
            let default = match &param.default {
                Some(expr) => Some(self.eval_expr(expr)?),
                None => None,
            };
            params.push(RuntimeParam {
                name: param.name.clone(),
                ty: param.ty.clone(),
                default,
                mode: param.mode,
            });
        }

        Ok(Callable::new(
            def.clone(),
            params,
            self.stack.peek(),
            inside_class,
        ))
    }

    /// Call any callable value.
    pub fn call_value(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> EvalResult<Value> {
        match callee {
            Value::Builtin(builtin) => call_builtin(self, *builtin, args, kwargs),
            Value::Type(tag) => {
                if let Some((name, _)) = kwargs.first() {
                    return Err(type_error(format!(
                        "{}() got an unexpected keyword argument '{name}'",
                        tag.name()
                    )));
                }
                call_type(*tag, &args)
            }
            Value::Callable(callable) => self.call_callable(callable, None, args, kwargs),
            Value::BoundMethod(method) => match &method.target {
                MethodTarget::Builtin(name) => {
                    let receiver = method.receiver.clone();
                    dispatch_method(self, &receiver, name, args, kwargs)
                }
                MethodTarget::User(callable) => {
                    self.call_callable(callable, Some(method.receiver.clone()), args, kwargs)
                }
            },
            Value::Class(class) => self.instantiate(class, args, kwargs),
            Value::ExcType(class) => {
                let message = args
                    .first()
                    .map(crate::value::value_str)
                    .unwrap_or_default();
                Ok(Value::Exception(Rc::new(KandyError::new(*class, message))))
            }
            other => Err(not_callable(other.type_name())),
        }
    }

    fn call_callable(
        &mut self,
        callable: &Rc<Callable>,
        receiver: Option<Value>,
        mut args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> EvalResult<Value> {
        if let Some(receiver) = receiver {
            args.insert(0, receiver);
        }

        tracing::debug!(name = %callable.name, args = args.len(), "call");

        let pushed = !callable.is_local;
        if pushed {
            let kind = match callable.kind {
                CallableKind::Procedure => ArKind::Procedure,
                _ => ArKind::Function,
            };
            let level = self.stack.peek().borrow().nesting_level + 1;
            let frame = ActivationRecord::new(
                callable.name.clone(),
                kind,
                level,
                Some(callable.closure.clone()),
            );
            self.stack.push(frame);
        }

        let bound = self.bind_parameters(callable, args, kwargs);
        let result = match bound {
            Ok(()) => self.eval_stmt(&callable.def.body),
            Err(err) => Err(err),
        };
        if pushed {
            self.stack.pop();
        }
        let exec = result?;

        if callable.kind == CallableKind::Procedure {
            return match exec {
                Exec::Value(_) => Ok(Value::None),
                Exec::Action(action) if action.kind == ActionKind::Return => Ok(Value::None),
                Exec::Action(_) => Err(interpreter_error("'break' outside loop")),
            };
        }

        let mut value = match exec {
            Exec::Value(value) => value,
            Exec::Action(action) if action.kind == ActionKind::Return => action.payload,
            Exec::Action(_) => return Err(interpreter_error("'break' outside loop")),
        };

        if let Some(constraint) = self.resolved_return_type(callable)? {
            if !matches!(value, Value::None) {
                let record = Record::new(Value::None, constraint, callable.strict_return, false);
                value = record.validated(value)?;
            }
        }
        Ok(value)
    }

    /// Bind call arguments into the current frame per the declaration.
    fn bind_parameters(
        &mut self,
        callable: &Rc<Callable>,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> EvalResult<()> {
        let name = &callable.name;
        let params = &callable.params;

        // 1. Initialize every parameter to its default record.
        for param in params {
            match param.mode {
                ParamMode::Normal => {
                    let initial = param.default.clone().unwrap_or(Value::Undefined);
                    self.declare_binding(&param.name, initial, param.ty.as_ref())?;
                }
                ParamMode::TupleRest | ParamMode::DictRest => {
                    self.declare_binding(&param.name, Value::None, None)?;
                }
            }
        }

        let mut satisfied: Vec<&str> = params
            .iter()
            .filter(|p| p.default.is_some() || p.mode != ParamMode::Normal)
            .map(|p| p.name.as_str())
            .collect();

        // 2. Keyword arguments.
        let dict_rest = params.iter().find(|p| p.mode == ParamMode::DictRest);
        let mut rest_kwargs = ValueDict::default();
        let mut kw_names: Vec<String> = Vec::new();
        for (kw, value) in kwargs {
            match params
                .iter()
                .find(|p| p.mode == ParamMode::Normal && p.name == kw)
            {
                Some(param) => {
                    if kw_names.contains(&kw) {
                        return Err(type_error(format!(
                            "{name}() got multiple values for keyword argument '{kw}'"
                        )));
                    }
                    self.assign_in_top(&param.name, None, value, None)?;
                    if !satisfied.contains(&param.name.as_str()) {
                        satisfied.push(param.name.as_str());
                    }
                    kw_names.push(kw);
                }
                None => match dict_rest {
                    Some(_) => {
                        rest_kwargs.insert(HashKey::Str(Rc::from(kw.as_str())), value);
                    }
                    None => {
                        return Err(type_error(format!(
                            "{name}() got an unexpected keyword argument '{kw}'"
                        )))
                    }
                },
            }
        }

        // 3. Positional arguments.
        let mut pos = 0usize;
        for param in params {
            match param.mode {
                ParamMode::TupleRest => {
                    let rest: Vec<Value> = args[pos.min(args.len())..].to_vec();
                    pos = args.len();
                    self.assign_in_top(&param.name, None, Value::tuple(rest), None)?;
                }
                ParamMode::DictRest => {}
                ParamMode::Normal => {
                    if pos < args.len() {
                        if kw_names.contains(&param.name) {
                            return Err(type_error(format!(
                                "{name}() got multiple values for argument '{}'",
                                param.name
                            )));
                        }
                        self.assign_in_top(&param.name, None, args[pos].clone(), None)?;
                        if !satisfied.contains(&param.name.as_str()) {
                            satisfied.push(param.name.as_str());
                        }
                        pos += 1;
                    }
                }
            }
        }
        if pos < args.len() {
            let capacity = params
                .iter()
                .filter(|p| p.mode == ParamMode::Normal)
                .count();
            return Err(type_error(format!(
                "{name}() takes {capacity} positional arguments but {} were given",
                args.len()
            )));
        }

        // 4. Every non-default parameter must have received a value.
        for param in params {
            if param.mode == ParamMode::Normal && !satisfied.contains(&param.name.as_str()) {
                return Err(type_error(format!(
                    "{name}() missing 1 required positional argument: '{}'",
                    param.name
                )));
            }
        }

        if let Some(rest) = dict_rest {
            if !rest_kwargs.is_empty() {
                let rest_name = rest.name.clone();
                self.assign_in_top(&rest_name, None, Value::dict(rest_kwargs), None)?;
            }
        }
        Ok(())
    }

    /// Resolve (and memoize) a function's return-type constraint in its
    /// declaration-site frame.
    fn resolved_return_type(
        &mut self,
        callable: &Rc<Callable>,
    ) -> EvalResult<Option<TypeConstraint>> {
        let pending = {
            let state = callable.return_type.borrow();
            match &*state {
                ReturnTypeState::None => return Ok(None),
                ReturnTypeState::Resolved(constraint) => return Ok(constraint.clone()),
                ReturnTypeState::Unresolved(annotation) => annotation.clone(),
            }
        };

        self.stack.push(callable.closure.clone());
        let resolved = self.resolve_annotation(&pending);
        self.stack.pop();
        let constraint = resolved?;

        *callable.return_type.borrow_mut() = ReturnTypeState::Resolved(constraint.clone());
        Ok(constraint)
    }

    /// Turn a type annotation into a record constraint, resolving named
    /// types against the current frame.
    pub(crate) fn resolve_annotation(
        &mut self,
        annotation: &TypeAnnotation,
    ) -> EvalResult<Option<TypeConstraint>> {
        match annotation {
            TypeAnnotation::Dynamic { .. } => Ok(None),
            TypeAnnotation::Const { .. } => Ok(Some(TypeConstraint::Constant)),
            TypeAnnotation::Var { .. } => Ok(None),
            TypeAnnotation::Named { ty, .. } => {
                let value = self.eval_expr(ty)?;
                let refs = crate::builtins::as_type_refs(&value)?;
                Ok(Some(union_constraint(refs)))
            }
            TypeAnnotation::Multiple { types, .. } => {
                let mut refs = Vec::new();
                for ty in types {
                    let value = self.eval_expr(ty)?;
                    refs.extend(crate::builtins::as_type_refs(&value)?);
                }
                Ok(Some(union_constraint(refs)))
            }
        }
    }

    fn instantiate(
        &mut self,
        class: &Rc<ClassObject>,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> EvalResult<Value> {
        let level = class.ar.borrow().nesting_level + 1;
        let instance_ar =
            ActivationRecord::new("InternClassAR", ArKind::InternClass, level, Some(class.ar.clone()));
        let instance = Rc::new(InstanceObject {
            class: class.clone(),
            ar: instance_ar,
        });

        match class.find_member("__init__") {
            Some(record) => {
                if let Value::Callable(init) = record.value {
                    self.call_callable(&init, Some(Value::Instance(instance.clone())), args, kwargs)?;
                }
            }
            None => {
                if !args.is_empty() || !kwargs.is_empty() {
                    return Err(type_error(format!(
                        "{}() takes no arguments",
                        class.name
                    )));
                }
            }
        }
        Ok(Value::Instance(instance))
    }

    // Spaces

    /// Resolve a scope-object or class-instance handle to its frame.
    pub(crate) fn resolve_space(&self, value: &Value) -> EvalResult<ScopeRef> {
        match value {
            Value::Space(space) => match &space.kind {
                SpaceKind::Fixed(ar) => Ok(ar.clone()),
                SpaceKind::Current => Ok(self.stack.peek()),
                SpaceKind::Prev => Ok(self.stack.peek_prev()),
                SpaceKind::Private { owner } => {
                    if *owner == self.id {
                        Ok(self.private_ar.clone())
                    } else {
                        Err(value_error(
                            "Can't enter into this private area. Use the 'Private' builtin \
                             object to access the private area of this code.",
                        ))
                    }
                }
            },
            Value::Module(module) => Ok(module.globals.clone()),
            Value::Instance(instance) => Ok(instance.ar.clone()),
            other => Err(value_error(format!(
                "Invalid Space: '{}' is not a space, module, or instance \
                 (use Global, BuiltIn, User, Now, Prev, Private, or an exported space)",
                other.type_name()
            ))),
        }
    }

    /// Names visible on a value, for `dir()`.
    pub(crate) fn dir_names(&mut self, value: &Value) -> Vec<String> {
        match value {
            Value::Space(_) | Value::Module(_) => match self.resolve_space(value) {
                Ok(ar) => ar.borrow().names(),
                Err(_) => Vec::new(),
            },
            Value::Instance(instance) => {
                let mut names = instance.ar.borrow().names();
                for name in instance.class.ar.borrow().names() {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
                names
            }
            Value::Class(class) => class.ar.borrow().names(),
            other => crate::methods::method_names(other)
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    // Shared helpers

    pub(crate) fn expect_int(&mut self, expr: &kandy_ir::Expr, what: &str) -> EvalResult<i64> {
        match self.eval_expr(expr)? {
            Value::Int(n) => Ok(n),
            Value::Bool(b) => Ok(i64::from(b)),
            other => Err(type_error(format!(
                "{what} expects an integer, not '{}'",
                other.type_name()
            ))),
        }
    }

    pub(crate) fn lookup_name(&self, name: &str) -> EvalResult<Value> {
        let top = self.stack.peek();
        match lookup(&top, name, false, true) {
            Some(record) => Ok(record.value),
            None => Err(name_error(name)),
        }
    }
}

fn union_constraint(mut refs: Vec<TypeRef>) -> TypeConstraint {
    if refs.len() == 1 {
        TypeConstraint::Single(refs.remove(0))
    } else {
        TypeConstraint::Union(refs)
    }
}

fn loop_target_matches(payload: &Value, control: &Rc<LoopControl>) -> bool {
    match payload {
        Value::None => true,
        Value::LoopControl(target) => Rc::ptr_eq(target, control),
        _ => false,
    }
}

/// Match a raised error against an `except` clause's class expression.
fn exception_matches(err: &KandyError, class_value: &Value) -> EvalResult<bool> {
    match class_value {
        Value::ExcType(class) => Ok(err.class.is_subclass(*class)),
        Value::Tuple(classes) => {
            for class in classes.iter() {
                if exception_matches(err, class)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        other => Err(type_error(format!(
            "catching '{}' values is not allowed; except clauses take exception classes",
            other.type_name()
        ))),
    }
}
