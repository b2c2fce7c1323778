//! Module imports.
//!
//! A native import instantiates a fresh sibling evaluator, runs the module
//! file to completion, freezes its Global frame, and caches the module by
//! absolute path. Cyclic imports observe an in-flight entry holding a view
//! of the partially populated Global frame. `python import` resolves against
//! a small registry of native host modules.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use rand::seq::SliceRandom;
use rand::Rng;

use kandy_ir::ImportStmt;

use crate::builtins::Builtin;
use crate::callstack::{ActivationRecord, ArKind, ScopeRef};
use crate::exception::{io_error, module_not_found, EvalResult};
use crate::interpreter::{Evaluator, Exec};
use crate::record::Record;
use crate::spaces::{ModuleObject, SpaceObject};
use crate::value::Value;

/// State of one entry in the shared module memo.
pub(crate) enum ModuleEntry {
    /// The module body is still running; importers get a space view of its
    /// Global frame.
    InFlight(ScopeRef),
    Loaded(Value),
}

impl Evaluator {
    pub(crate) fn eval_import(&mut self, stmt: &ImportStmt) -> EvalResult<Exec> {
        for item in &stmt.modules {
            let bound_name = item.alias.as_deref().unwrap_or(&item.name);
            let value = if stmt.python {
                let dotted = if stmt.package.is_empty() {
                    item.name.clone()
                } else {
                    format!("{}.{}", stmt.package.join("."), item.name)
                };
                native_module(&dotted)?
            } else {
                let mut relative = PathBuf::new();
                for part in &stmt.package {
                    relative.push(part);
                }
                relative.push(format!("{}.ks", item.name));
                let filename = self.resolve_module_path(&relative, &item.name)?;
                self.import_module(filename, &item.name)?
            };
            self.module_frame()
                .borrow_mut()
                .set(bound_name, Record::constant(value))?;
        }
        Ok(Exec::Value(Value::None))
    }

    /// Search order: the directory of the current file, then the configured
    /// library directory.
    fn resolve_module_path(&self, relative: &Path, name: &str) -> EvalResult<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(current) = &self.filename {
            if let Some(dir) = current.parent() {
                candidates.push(dir.join(relative));
            }
        } else {
            candidates.push(relative.to_path_buf());
        }
        if let Some(library) = &self.library_dir {
            candidates.push(library.join(relative));
        }

        for candidate in candidates {
            if candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(module_not_found(name))
    }

    fn import_module(&mut self, filename: PathBuf, name: &str) -> EvalResult<Value> {
        let abs = filename
            .canonicalize()
            .unwrap_or_else(|_| filename.clone());

        // A module importing itself observes its own in-flight globals.
        if self.filename.as_ref() == Some(&abs) {
            return Ok(Value::Space(Rc::new(SpaceObject::fixed(
                "RecursionImportedModule",
                self.global_frame(),
            ))));
        }

        {
            let modules = self.modules.borrow();
            match modules.get(&abs) {
                Some(ModuleEntry::Loaded(value)) => return Ok(value.clone()),
                Some(ModuleEntry::InFlight(globals)) => {
                    return Ok(Value::Space(Rc::new(SpaceObject::fixed(
                        format!("InFlight-{name}"),
                        globals.clone(),
                    ))));
                }
                None => {}
            }
        }

        tracing::debug!(module = name, file = %abs.display(), "importing module");

        let text = std::fs::read_to_string(&abs)
            .map_err(|err| io_error(format!("{}: {err}", abs.display())))?;

        let mut child = self.sibling_for_module(name);
        child.filename = Some(abs.clone());
        self.modules
            .borrow_mut()
            .insert(abs.clone(), ModuleEntry::InFlight(child.global_frame()));

        let run = child.run_program(&text);
        if let Err(err) = run {
            self.modules.borrow_mut().remove(&abs);
            return Err(err);
        }

        // Freeze the module's Global frame before exposing it.
        child.global_frame().borrow_mut().read_only = true;
        let module = Value::Module(Rc::new(ModuleObject {
            name: name.to_string(),
            filename: abs.clone(),
            globals: child.global_frame(),
        }));
        self.modules
            .borrow_mut()
            .insert(abs, ModuleEntry::Loaded(module.clone()));
        Ok(module)
    }
}

/// Build a native host module as a frozen space.
fn native_module(name: &str) -> EvalResult<Value> {
    let ar = ActivationRecord::new(name, ArKind::BuiltIn, 0, None);
    {
        let mut frame = ar.borrow_mut();
        match name {
            "math" => {
                frame.set_unchecked("pi", Record::constant(Value::Float(std::f64::consts::PI)));
                frame.set_unchecked("e", Record::constant(Value::Float(std::f64::consts::E)));
                frame.set_unchecked("tau", Record::constant(Value::Float(std::f64::consts::TAU)));
                frame.set_unchecked("inf", Record::constant(Value::Float(f64::INFINITY)));
                frame.set_unchecked("sqrt", Record::constant(Value::Builtin(Builtin::MathSqrt)));
                frame.set_unchecked("floor", Record::constant(Value::Builtin(Builtin::MathFloor)));
                frame.set_unchecked("ceil", Record::constant(Value::Builtin(Builtin::MathCeil)));
                frame.set_unchecked("pow", Record::constant(Value::Builtin(Builtin::MathPow)));
            }
            "time" => {
                frame.set_unchecked("time", Record::constant(Value::Builtin(Builtin::TimeTime)));
            }
            "random" => {
                frame.set_unchecked(
                    "random",
                    Record::constant(Value::Builtin(Builtin::RandomRandom)),
                );
                frame.set_unchecked(
                    "randint",
                    Record::constant(Value::Builtin(Builtin::RandomRandint)),
                );
                frame.set_unchecked(
                    "choice",
                    Record::constant(Value::Builtin(Builtin::RandomChoice)),
                );
            }
            "os" => {
                frame.set_unchecked("getcwd", Record::constant(Value::Builtin(Builtin::OsGetcwd)));
                frame.set_unchecked(
                    "sep",
                    Record::constant(Value::string(std::path::MAIN_SEPARATOR.to_string())),
                );
                frame.set_unchecked(
                    "linesep",
                    Record::constant(Value::string(if cfg!(windows) { "\r\n" } else { "\n" })),
                );
            }
            _ => return Err(module_not_found(name)),
        }
    }
    ar.borrow_mut().read_only = true;
    Ok(Value::Space(Rc::new(SpaceObject::fixed(name, ar))))
}

/// Native-module function implementations, dispatched from `call_builtin`.
pub(crate) fn call_native(
    builtin: Builtin,
    args: &[Value],
) -> EvalResult<Value> {
    use crate::exception::{type_error, value_error};

    let number = |value: &Value, what: &str| -> EvalResult<f64> {
        match value {
            Value::Int(n) => Ok(*n as f64),
            Value::Float(x) => Ok(*x),
            Value::Bool(b) => Ok(f64::from(u8::from(*b))),
            other => Err(type_error(format!(
                "{what} argument must be a number, not '{}'",
                other.type_name()
            ))),
        }
    };

    match builtin {
        Builtin::MathSqrt => {
            let x = number(args.first().ok_or_else(|| type_error("sqrt() missing argument"))?, "sqrt()")?;
            if x < 0.0 {
                return Err(value_error("math domain error"));
            }
            Ok(Value::Float(x.sqrt()))
        }
        Builtin::MathFloor => {
            let x = number(args.first().ok_or_else(|| type_error("floor() missing argument"))?, "floor()")?;
            Ok(Value::Int(x.floor() as i64))
        }
        Builtin::MathCeil => {
            let x = number(args.first().ok_or_else(|| type_error("ceil() missing argument"))?, "ceil()")?;
            Ok(Value::Int(x.ceil() as i64))
        }
        Builtin::MathPow => {
            let a = number(args.first().ok_or_else(|| type_error("pow() missing argument"))?, "pow()")?;
            let b = number(args.get(1).ok_or_else(|| type_error("pow() missing argument"))?, "pow()")?;
            Ok(Value::Float(a.powf(b)))
        }
        Builtin::TimeTime => {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            Ok(Value::Float(now))
        }
        Builtin::RandomRandom => Ok(Value::Float(rand::thread_rng().gen::<f64>())),
        Builtin::RandomRandint => {
            let low = match args.first() {
                Some(Value::Int(n)) => *n,
                _ => return Err(type_error("randint() takes two integer arguments")),
            };
            let high = match args.get(1) {
                Some(Value::Int(n)) => *n,
                _ => return Err(type_error("randint() takes two integer arguments")),
            };
            if low > high {
                return Err(value_error("empty range for randint()"));
            }
            Ok(Value::Int(rand::thread_rng().gen_range(low..=high)))
        }
        Builtin::RandomChoice => {
            let seq = args
                .first()
                .ok_or_else(|| type_error("choice() missing argument"))?;
            let items: Vec<Value> = crate::value::iterate(seq)?.collect();
            items
                .choose(&mut rand::thread_rng())
                .cloned()
                .ok_or_else(|| value_error("cannot choose from an empty sequence"))
        }
        Builtin::OsGetcwd => {
            let cwd = std::env::current_dir()
                .map_err(|err| io_error(err.to_string()))?;
            Ok(Value::string(cwd.display().to_string()))
        }
        other => Err(type_error(format!(
            "'{}' is not a native module function",
            other.name()
        ))),
    }
}
