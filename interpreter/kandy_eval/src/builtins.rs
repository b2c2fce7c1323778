//! Built-in functions seeded into the BuiltIn frame.

use std::io::Write;
use std::rc::Rc;

use kandy_ir::BinaryOp;

use crate::convert::convert_to_tag;
use crate::exception::{stop_iteration, type_error, value_error, EvalResult, ExcClass};
use crate::interpreter::Evaluator;
use crate::object::{ClassObject, FileObject};
use crate::operators::{self, make_range};
use crate::record::TypeRef;
use crate::value::{iterate, truthy, value_repr, value_str, IterState, TypeTag, Value};

/// Every built-in function, dispatched by a single match.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Builtin {
    Abs,
    All,
    Any,
    Chr,
    Divmod,
    Enumerate,
    Filter,
    Getattr,
    Hasattr,
    Hex,
    Id,
    Input,
    Isinstance,
    Issubclass,
    Iter,
    Len,
    Map,
    Max,
    Min,
    Next,
    Oct,
    Open,
    Ord,
    Pow,
    Print,
    Range,
    Repr,
    Reversed,
    Round,
    Setattr,
    Sorted,
    Sum,
    Zip,
    Dir,
    /// The `MultipleTypesClass` capability constructor.
    MultipleTypes,
    // Native host-module functions (`python import math`, ...).
    MathSqrt,
    MathFloor,
    MathCeil,
    MathPow,
    TimeTime,
    RandomRandom,
    RandomRandint,
    RandomChoice,
    OsGetcwd,
}

impl Builtin {
    pub const ALL: [(&'static str, Builtin); 34] = [
        ("abs", Builtin::Abs),
        ("all", Builtin::All),
        ("any", Builtin::Any),
        ("chr", Builtin::Chr),
        ("divmod", Builtin::Divmod),
        ("enumerate", Builtin::Enumerate),
        ("filter", Builtin::Filter),
        ("getattr", Builtin::Getattr),
        ("hasattr", Builtin::Hasattr),
        ("hex", Builtin::Hex),
        ("id", Builtin::Id),
        ("input", Builtin::Input),
        ("isinstance", Builtin::Isinstance),
        ("issubclass", Builtin::Issubclass),
        ("iter", Builtin::Iter),
        ("len", Builtin::Len),
        ("map", Builtin::Map),
        ("max", Builtin::Max),
        ("min", Builtin::Min),
        ("next", Builtin::Next),
        ("oct", Builtin::Oct),
        ("open", Builtin::Open),
        ("ord", Builtin::Ord),
        ("pow", Builtin::Pow),
        ("print", Builtin::Print),
        ("range", Builtin::Range),
        ("repr", Builtin::Repr),
        ("reversed", Builtin::Reversed),
        ("round", Builtin::Round),
        ("setattr", Builtin::Setattr),
        ("sorted", Builtin::Sorted),
        ("sum", Builtin::Sum),
        ("zip", Builtin::Zip),
        ("dir", Builtin::Dir),
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::MultipleTypes => "MultipleTypesClass",
            Builtin::MathSqrt => "sqrt",
            Builtin::MathFloor => "floor",
            Builtin::MathCeil => "ceil",
            Builtin::MathPow => "pow",
            Builtin::TimeTime => "time",
            Builtin::RandomRandom => "random",
            Builtin::RandomRandint => "randint",
            Builtin::RandomChoice => "choice",
            Builtin::OsGetcwd => "getcwd",
            other => Builtin::ALL
                .iter()
                .find(|(_, b)| *b == other)
                .map(|(name, _)| *name)
                .unwrap_or("builtin"),
        }
    }
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> EvalResult<()> {
    if args.len() < min || args.len() > max {
        let expected = if max == usize::MAX {
            format!("at least {min}")
        } else if min == max {
            format!("{min}")
        } else {
            format!("{min} to {max}")
        };
        return Err(type_error(format!(
            "{name}() takes {expected} arguments but {} were given",
            args.len()
        )));
    }
    Ok(())
}

fn expect_int(name: &str, value: &Value) -> EvalResult<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(type_error(format!(
            "{name}() argument must be an integer, not '{}'",
            other.type_name()
        ))),
    }
}

/// Dispatch a built-in call.
pub fn call_builtin(
    ev: &mut Evaluator,
    builtin: Builtin,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> EvalResult<Value> {
    match builtin {
        Builtin::Print => return builtin_print(ev, &args, kwargs),
        Builtin::Sorted => return builtin_sorted(ev, args, kwargs),
        Builtin::MathSqrt
        | Builtin::MathFloor
        | Builtin::MathCeil
        | Builtin::MathPow
        | Builtin::TimeTime
        | Builtin::RandomRandom
        | Builtin::RandomRandint
        | Builtin::RandomChoice
        | Builtin::OsGetcwd => {
            return crate::interpreter::call_native(builtin, &args);
        }
        _ => {}
    }
    if let Some((name, _)) = kwargs.first() {
        return Err(type_error(format!(
            "{}() got an unexpected keyword argument '{name}'",
            builtin.name()
        )));
    }

    match builtin {
        Builtin::Abs => {
            arity("abs", &args, 1, 1)?;
            match &args[0] {
                Value::Int(n) => Ok(Value::Int(n.abs())),
                Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                Value::Float(x) => Ok(Value::Float(x.abs())),
                Value::Complex(re, im) => Ok(Value::Float((re * re + im * im).sqrt())),
                other => Err(type_error(format!(
                    "bad operand type for abs(): '{}'",
                    other.type_name()
                ))),
            }
        }
        Builtin::All => {
            arity("all", &args, 1, 1)?;
            Ok(Value::Bool(iterate(&args[0])?.all(|v| truthy(&v))))
        }
        Builtin::Any => {
            arity("any", &args, 1, 1)?;
            Ok(Value::Bool(iterate(&args[0])?.any(|v| truthy(&v))))
        }
        Builtin::Chr => {
            arity("chr", &args, 1, 1)?;
            let code = expect_int("chr", &args[0])?;
            u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .map(|c| Value::string(c.to_string()))
                .ok_or_else(|| value_error("chr() arg not in range(0x110000)"))
        }
        Builtin::Ord => {
            arity("ord", &args, 1, 1)?;
            if let Value::Str(s) = &args[0] {
                let mut chars = s.chars();
                if let (Some(c), None) = (chars.next(), chars.next()) {
                    return Ok(Value::Int(c as i64));
                }
            }
            Err(type_error(format!(
                "ord() expected a character, but got '{}'",
                value_repr(&args[0])
            )))
        }
        Builtin::Divmod => {
            arity("divmod", &args, 2, 2)?;
            let quot = operators::binary(BinaryOp::FloorDiv, &args[0], &args[1])?;
            let rem = operators::binary(BinaryOp::Mod, &args[0], &args[1])?;
            Ok(Value::tuple(vec![quot, rem]))
        }
        Builtin::Enumerate => {
            arity("enumerate", &args, 1, 2)?;
            let start = match args.get(1) {
                Some(v) => expect_int("enumerate", v)?,
                None => 0,
            };
            let items: Vec<Value> = iterate(&args[0])?
                .enumerate()
                .map(|(i, v)| Value::tuple(vec![Value::Int(start + i as i64), v]))
                .collect();
            Ok(Value::list(items))
        }
        Builtin::Filter => {
            arity("filter", &args, 2, 2)?;
            let mut out = Vec::new();
            for item in iterate(&args[1])? {
                let keep = match &args[0] {
                    Value::None => truthy(&item),
                    func => truthy(&ev.call_value(func, vec![item.clone()], Vec::new())?),
                };
                if keep {
                    out.push(item);
                }
            }
            Ok(Value::list(out))
        }
        Builtin::Map => {
            arity("map", &args, 2, usize::MAX)?;
            let func = args[0].clone();
            let mut iters: Vec<_> = args[1..]
                .iter()
                .map(iterate)
                .collect::<EvalResult<Vec<_>>>()?;
            let mut out = Vec::new();
            'outer: loop {
                let mut call_args = Vec::with_capacity(iters.len());
                for iter in &mut iters {
                    match iter.next() {
                        Some(item) => call_args.push(item),
                        None => break 'outer,
                    }
                }
                out.push(ev.call_value(&func, call_args, Vec::new())?);
            }
            Ok(Value::list(out))
        }
        Builtin::Getattr => {
            arity("getattr", &args, 2, 3)?;
            let name = expect_str("getattr", &args[1])?;
            match ev.attribute(&args[0], &name) {
                Ok(value) => Ok(value),
                Err(err) if err.class == ExcClass::AttributeError => match args.get(2) {
                    Some(default) => Ok(default.clone()),
                    None => Err(err),
                },
                Err(err) => Err(err),
            }
        }
        Builtin::Hasattr => {
            arity("hasattr", &args, 2, 2)?;
            let name = expect_str("hasattr", &args[1])?;
            Ok(Value::Bool(ev.attribute(&args[0], &name).is_ok()))
        }
        Builtin::Setattr => {
            arity("setattr", &args, 3, 3)?;
            let name = expect_str("setattr", &args[1])?;
            ev.set_attribute(&args[0], &name, args[2].clone())?;
            Ok(Value::None)
        }
        Builtin::Hex => {
            arity("hex", &args, 1, 1)?;
            let n = expect_int("hex", &args[0])?;
            Ok(Value::string(if n < 0 {
                format!("-0x{:x}", n.unsigned_abs())
            } else {
                format!("0x{n:x}")
            }))
        }
        Builtin::Oct => {
            arity("oct", &args, 1, 1)?;
            let n = expect_int("oct", &args[0])?;
            Ok(Value::string(if n < 0 {
                format!("-0o{:o}", n.unsigned_abs())
            } else {
                format!("0o{n:o}")
            }))
        }
        Builtin::Id => {
            arity("id", &args, 1, 1)?;
            Ok(Value::Int(value_id(&args[0])))
        }
        Builtin::Input => {
            arity("input", &args, 0, 1)?;
            if let Some(prompt) = args.first() {
                print!("{}", value_str(prompt));
                let _ = std::io::stdout().flush();
            }
            let mut line = String::new();
            std::io::stdin()
                .read_line(&mut line)
                .map_err(|err| crate::exception::io_error(err.to_string()))?;
            while line.ends_with('\n') || line.ends_with('\r') {
                line.pop();
            }
            Ok(Value::string(line))
        }
        Builtin::Isinstance => {
            arity("isinstance", &args, 2, 2)?;
            Ok(Value::Bool(isinstance(&args[0], &args[1])?))
        }
        Builtin::Issubclass => {
            arity("issubclass", &args, 2, 2)?;
            Ok(Value::Bool(issubclass(&args[0], &args[1])?))
        }
        Builtin::Iter => {
            arity("iter", &args, 1, 1)?;
            if let Value::Iterator(state) = &args[0] {
                return Ok(Value::Iterator(state.clone()));
            }
            let items: Vec<Value> = iterate(&args[0])?.collect();
            Ok(Value::Iterator(Rc::new(std::cell::RefCell::new(
                IterState::new(items),
            ))))
        }
        Builtin::Next => {
            arity("next", &args, 1, 2)?;
            match &args[0] {
                Value::Iterator(state) => match state.borrow_mut().next_value() {
                    Some(value) => Ok(value),
                    None => match args.get(1) {
                        Some(default) => Ok(default.clone()),
                        None => Err(stop_iteration()),
                    },
                },
                other => Err(type_error(format!(
                    "'{}' object is not an iterator",
                    other.type_name()
                ))),
            }
        }
        Builtin::Len => {
            arity("len", &args, 1, 1)?;
            let length = match &args[0] {
                Value::Str(s) => s.chars().count() as i64,
                Value::Bytes(b) => b.len() as i64,
                Value::List(items) => items.borrow().len() as i64,
                Value::Tuple(items) => items.len() as i64,
                Value::Set(items) => items.borrow().len() as i64,
                Value::FrozenSet(items) => items.len() as i64,
                Value::Dict(entries) => entries.borrow().len() as i64,
                Value::Range(range) => range.len(),
                other => {
                    return Err(type_error(format!(
                        "object of type '{}' has no len()",
                        other.type_name()
                    )))
                }
            };
            Ok(Value::Int(length))
        }
        Builtin::Max => extremum("max", args, false),
        Builtin::Min => extremum("min", args, true),
        Builtin::Open => {
            arity("open", &args, 1, 2)?;
            let path = expect_str("open", &args[0])?;
            let mode = match args.get(1) {
                Some(v) => expect_str("open", v)?,
                None => "r".to_string(),
            };
            let file = FileObject::open(&path, &mode)?;
            Ok(Value::File(Rc::new(std::cell::RefCell::new(file))))
        }
        Builtin::Pow => {
            arity("pow", &args, 2, 3)?;
            match args.get(2) {
                None => operators::binary(BinaryOp::Pow, &args[0], &args[1]),
                Some(modulus) => {
                    let base = expect_int("pow", &args[0])?;
                    let exp = expect_int("pow", &args[1])?;
                    let modulus = expect_int("pow", modulus)?;
                    if exp < 0 {
                        return Err(value_error(
                            "pow() 2nd argument cannot be negative when 3rd argument specified",
                        ));
                    }
                    if modulus == 0 {
                        return Err(value_error("pow() 3rd argument cannot be 0"));
                    }
                    Ok(Value::Int(mod_pow(base, exp as u64, modulus)))
                }
            }
        }
        Builtin::Range => {
            arity("range", &args, 1, 3)?;
            let a = expect_int("range", &args[0])?;
            match (args.get(1), args.get(2)) {
                (None, _) => make_range(0, a, 1),
                (Some(b), None) => make_range(a, expect_int("range", b)?, 1),
                (Some(b), Some(c)) => {
                    make_range(a, expect_int("range", b)?, expect_int("range", c)?)
                }
            }
        }
        Builtin::Repr => {
            arity("repr", &args, 1, 1)?;
            Ok(Value::string(value_repr(&args[0])))
        }
        Builtin::Reversed => {
            arity("reversed", &args, 1, 1)?;
            let mut items: Vec<Value> = iterate(&args[0])?.collect();
            items.reverse();
            Ok(Value::list(items))
        }
        Builtin::Round => {
            arity("round", &args, 1, 2)?;
            let digits = match args.get(1) {
                Some(v) => expect_int("round", v)?,
                None => 0,
            };
            match &args[0] {
                Value::Int(n) => Ok(Value::Int(*n)),
                Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                Value::Float(x) => {
                    let factor = 10f64.powi(digits as i32);
                    let rounded = (x * factor).round_ties_even() / factor;
                    if digits <= 0 {
                        Ok(Value::Int(rounded as i64))
                    } else {
                        Ok(Value::Float(rounded))
                    }
                }
                other => Err(type_error(format!(
                    "type {} doesn't define a rounding method",
                    other.type_name()
                ))),
            }
        }
        Builtin::Sum => {
            arity("sum", &args, 1, 2)?;
            let mut total = args.get(1).cloned().unwrap_or(Value::Int(0));
            for item in iterate(&args[0])? {
                total = operators::binary(BinaryOp::Add, &total, &item)?;
            }
            Ok(total)
        }
        Builtin::Zip => {
            let mut iters: Vec<_> = args
                .iter()
                .map(iterate)
                .collect::<EvalResult<Vec<_>>>()?;
            let mut out = Vec::new();
            'outer: loop {
                let mut row = Vec::with_capacity(iters.len());
                for iter in &mut iters {
                    match iter.next() {
                        Some(item) => row.push(item),
                        None => break 'outer,
                    }
                }
                if iters.is_empty() {
                    break;
                }
                out.push(Value::tuple(row));
            }
            Ok(Value::list(out))
        }
        Builtin::Dir => {
            arity("dir", &args, 1, 1)?;
            Ok(Value::list(
                ev.dir_names(&args[0])
                    .into_iter()
                    .map(Value::string)
                    .collect(),
            ))
        }
        Builtin::MultipleTypes => {
            let mut types = Vec::new();
            for arg in &args {
                types.extend(as_type_refs(arg)?);
            }
            Ok(Value::MultipleTypes(Rc::new(types)))
        }
        Builtin::Print
        | Builtin::Sorted
        | Builtin::MathSqrt
        | Builtin::MathFloor
        | Builtin::MathCeil
        | Builtin::MathPow
        | Builtin::TimeTime
        | Builtin::RandomRandom
        | Builtin::RandomRandint
        | Builtin::RandomChoice
        | Builtin::OsGetcwd => unreachable!("handled before the kwargs check"),
    }
}

fn builtin_print(
    ev: &mut Evaluator,
    args: &[Value],
    kwargs: Vec<(String, Value)>,
) -> EvalResult<Value> {
    let mut sep = " ".to_string();
    let mut end = "\n".to_string();
    for (name, value) in kwargs {
        match name.as_str() {
            "sep" => sep = value_str(&value),
            "end" => end = value_str(&value),
            other => {
                return Err(type_error(format!(
                    "print() got an unexpected keyword argument '{other}'"
                )))
            }
        }
    }
    let rendered: Vec<String> = args.iter().map(value_str).collect();
    ev.print(&format!("{}{}", rendered.join(&sep), end));
    Ok(Value::None)
}

fn builtin_sorted(
    ev: &mut Evaluator,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> EvalResult<Value> {
    arity("sorted", &args, 1, 1)?;
    let mut reverse = false;
    let mut key: Option<Value> = None;
    for (name, value) in kwargs {
        match name.as_str() {
            "reverse" => reverse = truthy(&value),
            "key" => key = Some(value),
            other => {
                return Err(type_error(format!(
                    "sorted() got an unexpected keyword argument '{other}'"
                )))
            }
        }
    }

    let items: Vec<Value> = iterate(&args[0])?.collect();
    let mut keyed: Vec<(Value, Value)> = Vec::with_capacity(items.len());
    for item in items {
        let sort_key = match &key {
            Some(func) => ev.call_value(func, vec![item.clone()], Vec::new())?,
            None => item.clone(),
        };
        keyed.push((sort_key, item));
    }

    // Insertion sort keeps the comparison fallible and the sort stable.
    let mut sorted: Vec<(Value, Value)> = Vec::with_capacity(keyed.len());
    for entry in keyed {
        let mut at = sorted.len();
        for (i, existing) in sorted.iter().enumerate() {
            if operators::compare(&entry.0, &existing.0)? == std::cmp::Ordering::Less {
                at = i;
                break;
            }
        }
        sorted.insert(at, entry);
    }
    if reverse {
        sorted.reverse();
    }
    Ok(Value::list(sorted.into_iter().map(|(_, v)| v).collect()))
}

fn extremum(name: &str, args: Vec<Value>, minimum: bool) -> EvalResult<Value> {
    let items: Vec<Value> = if args.len() == 1 {
        iterate(&args[0])?.collect()
    } else {
        args
    };
    let mut best: Option<Value> = None;
    for item in items {
        best = Some(match best {
            None => item,
            Some(current) => {
                let take = match operators::compare(&item, &current)? {
                    std::cmp::Ordering::Less => minimum,
                    std::cmp::Ordering::Greater => !minimum,
                    std::cmp::Ordering::Equal => false,
                };
                if take {
                    item
                } else {
                    current
                }
            }
        });
    }
    best.ok_or_else(|| value_error(format!("{name}() arg is an empty sequence")))
}

fn expect_str(name: &str, value: &Value) -> EvalResult<String> {
    match value {
        Value::Str(s) => Ok(s.to_string()),
        other => Err(type_error(format!(
            "{name}() argument must be str, not '{}'",
            other.type_name()
        ))),
    }
}

fn mod_pow(base: i64, mut exp: u64, modulus: i64) -> i64 {
    let modulus = modulus as i128;
    let mut base = (base as i128).rem_euclid(modulus);
    let mut result: i128 = 1;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result * base % modulus;
        }
        base = base * base % modulus;
        exp >>= 1;
    }
    result as i64
}

fn value_id(value: &Value) -> i64 {
    match value {
        Value::Str(v) => Rc::as_ptr(v) as *const u8 as i64,
        Value::Bytes(v) => Rc::as_ptr(v) as *const u8 as i64,
        Value::List(v) => Rc::as_ptr(v) as i64,
        Value::Tuple(v) => Rc::as_ptr(v) as i64,
        Value::Set(v) => Rc::as_ptr(v) as i64,
        Value::FrozenSet(v) => Rc::as_ptr(v) as i64,
        Value::Dict(v) => Rc::as_ptr(v) as i64,
        Value::Range(v) => Rc::as_ptr(v) as i64,
        Value::Iterator(v) => Rc::as_ptr(v) as i64,
        Value::Callable(v) => Rc::as_ptr(v) as i64,
        Value::BoundMethod(v) => Rc::as_ptr(v) as i64,
        Value::Class(v) => Rc::as_ptr(v) as i64,
        Value::Instance(v) => Rc::as_ptr(v) as i64,
        Value::Module(v) => Rc::as_ptr(v) as i64,
        Value::Space(v) => Rc::as_ptr(v) as i64,
        Value::LoopControl(v) => Rc::as_ptr(v) as i64,
        Value::Exception(v) => Rc::as_ptr(v) as i64,
        Value::File(v) => Rc::as_ptr(v) as i64,
        Value::Int(n) => *n,
        Value::Float(x) => x.to_bits() as i64,
        Value::Bool(true) => 1,
        Value::Bool(false) => 0,
        _ => 0,
    }
}

/// Interpret a value as a set of type references.
pub fn as_type_refs(value: &Value) -> EvalResult<Vec<TypeRef>> {
    match value {
        Value::Type(tag) => Ok(vec![TypeRef::Tag(*tag)]),
        Value::Class(class) => Ok(vec![TypeRef::Class(class.clone())]),
        Value::MultipleTypes(types) => Ok(types.as_ref().clone()),
        other => Err(type_error(format!(
            "'{}' is not a type",
            value_repr(other)
        ))),
    }
}

/// `isinstance(value, target)` with tuple and capability targets.
pub fn isinstance(value: &Value, target: &Value) -> EvalResult<bool> {
    match target {
        Value::Tuple(targets) => {
            for t in targets.iter() {
                if isinstance(value, t)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::ExcType(class) => Ok(matches!(
            value,
            Value::Exception(err) if err.class.is_subclass(*class)
        )),
        Value::Type(_) | Value::Class(_) | Value::MultipleTypes(_) => {
            let refs = as_type_refs(target)?;
            Ok(refs.iter().any(|ty| ty.matches(value)))
        }
        other => Err(type_error(format!(
            "isinstance() arg 2 must be a type or tuple of types, not '{}'",
            other.type_name()
        ))),
    }
}

/// `issubclass(cls, target)`.
pub fn issubclass(class: &Value, target: &Value) -> EvalResult<bool> {
    match (class, target) {
        (Value::ExcType(a), Value::ExcType(b)) => Ok(a.is_subclass(*b)),
        (Value::Class(a), Value::Class(b)) => Ok(a.is_subclass_of(b)),
        (Value::Class(_), Value::Tuple(targets)) | (Value::Type(_), Value::Tuple(targets)) => {
            for t in targets.iter() {
                if issubclass(class, t)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        (Value::Type(a), Value::Type(b)) => {
            Ok(a == b || (*a == TypeTag::Bool && *b == TypeTag::Int) || *b == TypeTag::Object)
        }
        (Value::Type(tag), Value::MultipleTypes(types)) => Ok(types
            .iter()
            .any(|ty| matches!(ty, TypeRef::Tag(t) if t == tag))),
        (Value::Class(class), Value::MultipleTypes(types)) => Ok(types
            .iter()
            .any(|ty| matches!(ty, TypeRef::Class(c) if class.is_subclass_of(c)))),
        _ => Err(type_error("issubclass() arg 1 must be a class")),
    }
}

/// Helper for `class X(Base)` resolution.
pub fn expect_class(value: &Value) -> EvalResult<Rc<ClassObject>> {
    match value {
        Value::Class(class) => Ok(class.clone()),
        other => Err(type_error(format!(
            "class base must be a class, not '{}'",
            other.type_name()
        ))),
    }
}

/// Construct a value by calling a built-in type.
pub fn call_type(tag: TypeTag, args: &[Value]) -> EvalResult<Value> {
    match (tag, args.len()) {
        (TypeTag::Complex, 2) => {
            let re = match &args[0] {
                Value::Int(n) => *n as f64,
                Value::Float(x) => *x,
                other => {
                    return Err(type_error(format!(
                        "complex() argument must be a number, not '{}'",
                        other.type_name()
                    )))
                }
            };
            let im = match &args[1] {
                Value::Int(n) => *n as f64,
                Value::Float(x) => *x,
                other => {
                    return Err(type_error(format!(
                        "complex() argument must be a number, not '{}'",
                        other.type_name()
                    )))
                }
            };
            Ok(Value::Complex(re, im))
        }
        (_, 0) => empty_value(tag),
        (_, 1) => convert_to_tag(tag, &args[0]),
        _ => Err(type_error(format!(
            "{}() takes at most 1 argument ({} given)",
            tag.name(),
            args.len()
        ))),
    }
}

fn empty_value(tag: TypeTag) -> EvalResult<Value> {
    Ok(match tag {
        TypeTag::Bool => Value::Bool(false),
        TypeTag::Int => Value::Int(0),
        TypeTag::Float => Value::Float(0.0),
        TypeTag::Complex => Value::Complex(0.0, 0.0),
        TypeTag::Str => Value::string(""),
        TypeTag::Bytes => Value::bytes(Vec::new()),
        TypeTag::List => Value::list(Vec::new()),
        TypeTag::Tuple => Value::tuple(Vec::new()),
        TypeTag::Set => Value::set(Default::default()),
        TypeTag::FrozenSet => Value::FrozenSet(Rc::new(Default::default())),
        TypeTag::Dict => Value::dict(Default::default()),
        other => {
            return Err(type_error(format!(
                "cannot construct '{}' values",
                other.name()
            )))
        }
    })
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;
    use crate::value::value_eq;

    #[test]
    fn mod_pow_matches_direct_computation() {
        assert_eq!(mod_pow(3, 13, 7), 3_i64.pow(13).rem_euclid(7));
        assert_eq!(mod_pow(2, 10, 1000), 24);
    }

    #[test]
    fn isinstance_accepts_bool_as_int() {
        assert!(isinstance(&Value::Bool(true), &Value::Type(TypeTag::Int)).unwrap());
        assert!(!isinstance(&Value::string("x"), &Value::Type(TypeTag::Int)).unwrap());
    }

    #[test]
    fn empty_constructors() {
        assert!(value_eq(&call_type(TypeTag::Int, &[]).unwrap(), &Value::Int(0)));
        assert!(value_eq(
            &call_type(TypeTag::Str, &[Value::Int(5)]).unwrap(),
            &Value::string("5")
        ));
    }
}
