//! Method dispatch for built-in types.
//!
//! Attribute access on a primitive value resolves here: a known name yields
//! a bound method, dispatched by `dispatch_method` when called. The tables
//! include the enrichment methods (`is_even`, `reverse`, `random_choice`,
//! ...) layered over each type.

use std::rc::Rc;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::exception::{type_error, value_error, EvalResult};
use crate::interpreter::Evaluator;
use crate::loop_control::LoopControl;
use crate::value::{iterate, truthy, value_eq, value_str, HashKey, Value, ValueDict, ValueSet};

pub const STR_METHODS: &[&str] = &[
    "upper", "lower", "strip", "lstrip", "rstrip", "split", "splitlines", "join", "replace",
    "startswith", "endswith", "find", "index", "count", "title", "capitalize", "isdigit",
    "isalpha", "isalnum", "islower", "isupper", "isspace", "encode", "zfill", "center", "ljust",
    "rjust", "reverse", "replace_with_dict", "filter", "for_each", "map", "unsort",
];

pub const NUMERIC_METHODS: &[&str] = &[
    "is_odd", "is_even", "is_positive", "get_percent_of", "get_percent", "random", "between",
    "round", "ceil", "floor", "limit_range", "integer_part", "decimal_part", "is_integer",
];

pub const LIST_METHODS: &[&str] = &[
    "append", "extend", "insert", "pop", "remove", "clear", "index", "count", "sort", "reverse",
    "copy", "random_choice", "unsort", "sort_by_position_list", "for_each", "filter", "map",
];

pub const TUPLE_METHODS: &[&str] = &[
    "count", "index", "random_choice", "unsort", "sort_by_position_list", "for_each", "filter",
    "map",
];

pub const DICT_METHODS: &[&str] = &[
    "get", "keys", "values", "items", "pop", "update", "clear", "copy", "setdefault",
    "random_choice", "unsort", "sort", "sort_by_keys", "sort_by_value", "for_each", "filter",
    "map",
];

pub const SET_METHODS: &[&str] = &[
    "add", "remove", "discard", "clear", "copy", "union", "intersection", "difference",
];

pub const BYTES_METHODS: &[&str] = &["decode"];

pub const FILE_METHODS: &[&str] = &["read", "readlines", "write", "close"];

pub const LOOP_CONTROL_METHODS: &[&str] = &[
    "get_count",
    "get_count_finished",
    "get_ignored",
    "get_remaining_ignore_count",
    "ignore_next_iterations",
    "reset_ignore",
    "get_time_total",
    "get_time_average",
    "get_time_of_last_iteration",
    "is_running",
];

/// The method table for a value's type.
pub fn method_names(value: &Value) -> &'static [&'static str] {
    match value {
        Value::Str(_) => STR_METHODS,
        Value::Int(_) | Value::Float(_) | Value::Bool(_) => NUMERIC_METHODS,
        Value::List(_) => LIST_METHODS,
        Value::Tuple(_) => TUPLE_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Set(_) | Value::FrozenSet(_) => SET_METHODS,
        Value::Bytes(_) => BYTES_METHODS,
        Value::File(_) => FILE_METHODS,
        Value::LoopControl(_) => LOOP_CONTROL_METHODS,
        _ => &[],
    }
}

pub fn has_method(value: &Value, name: &str) -> bool {
    method_names(value).contains(&name)
}

/// Call a method on a built-in value.
pub fn dispatch_method(
    ev: &mut Evaluator,
    receiver: &Value,
    name: &str,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> EvalResult<Value> {
    if let Some((kw, _)) = kwargs.first() {
        return Err(type_error(format!(
            "{name}() got an unexpected keyword argument '{kw}'"
        )));
    }
    match receiver {
        Value::Str(text) => str_method(ev, text, name, args),
        Value::Int(_) | Value::Float(_) | Value::Bool(_) => numeric_method(receiver, name, args),
        Value::List(items) => list_method(ev, items, name, args),
        Value::Tuple(items) => tuple_method(ev, items, name, args),
        Value::Dict(entries) => dict_method(ev, entries, name, args),
        Value::Set(items) => set_method(items, name, args),
        Value::FrozenSet(items) => frozen_set_method(items, name, args),
        Value::Bytes(data) => bytes_method(data, name, args),
        Value::File(file) => file_method(file, name, args),
        Value::LoopControl(control) => loop_control_method(control, name, args),
        other => Err(crate::exception::attribute_error(other.type_name(), name)),
    }
}

fn no_args(name: &str, args: &[Value]) -> EvalResult<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(type_error(format!(
            "{name}() takes no arguments ({} given)",
            args.len()
        )))
    }
}

fn one_arg<'a>(name: &str, args: &'a [Value]) -> EvalResult<&'a Value> {
    match args {
        [value] => Ok(value),
        _ => Err(type_error(format!(
            "{name}() takes exactly one argument ({} given)",
            args.len()
        ))),
    }
}

fn as_str(name: &str, value: &Value) -> EvalResult<String> {
    match value {
        Value::Str(s) => Ok(s.to_string()),
        other => Err(type_error(format!(
            "{name}() argument must be str, not '{}'",
            other.type_name()
        ))),
    }
}

fn as_int(name: &str, value: &Value) -> EvalResult<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(type_error(format!(
            "{name}() argument must be int, not '{}'",
            other.type_name()
        ))),
    }
}

fn as_f64(name: &str, value: &Value) -> EvalResult<f64> {
    match value {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(x) => Ok(*x),
        Value::Bool(b) => Ok(f64::from(u8::from(*b))),
        other => Err(type_error(format!(
            "{name}() argument must be a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn str_method(ev: &mut Evaluator, text: &Rc<str>, name: &str, args: Vec<Value>) -> EvalResult<Value> {
    match name {
        "upper" => {
            no_args(name, &args)?;
            Ok(Value::string(text.to_uppercase()))
        }
        "lower" => {
            no_args(name, &args)?;
            Ok(Value::string(text.to_lowercase()))
        }
        "strip" => {
            no_args(name, &args)?;
            Ok(Value::string(text.trim().to_string()))
        }
        "lstrip" => {
            no_args(name, &args)?;
            Ok(Value::string(text.trim_start().to_string()))
        }
        "rstrip" => {
            no_args(name, &args)?;
            Ok(Value::string(text.trim_end().to_string()))
        }
        "split" => {
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::None) => text
                    .split_whitespace()
                    .map(|p| Value::string(p.to_string()))
                    .collect(),
                Some(sep) => {
                    let sep = as_str(name, sep)?;
                    if sep.is_empty() {
                        return Err(value_error("empty separator"));
                    }
                    text.split(sep.as_str())
                        .map(|p| Value::string(p.to_string()))
                        .collect()
                }
            };
            Ok(Value::list(parts))
        }
        "splitlines" => {
            no_args(name, &args)?;
            Ok(Value::list(
                text.lines().map(|l| Value::string(l.to_string())).collect(),
            ))
        }
        "join" => {
            let iterable = one_arg(name, &args)?;
            let mut parts = Vec::new();
            for item in iterate(iterable)? {
                match item {
                    Value::Str(s) => parts.push(s.to_string()),
                    other => {
                        return Err(type_error(format!(
                            "sequence item: expected str instance, '{}' found",
                            other.type_name()
                        )))
                    }
                }
            }
            Ok(Value::string(parts.join(&**text)))
        }
        "replace" => {
            if args.len() < 2 || args.len() > 3 {
                return Err(type_error("replace() takes 2 or 3 arguments"));
            }
            let old = as_str(name, &args[0])?;
            let new = as_str(name, &args[1])?;
            let replaced = match args.get(2) {
                Some(count) => text.replacen(old.as_str(), &new, as_int(name, count)?.max(0) as usize),
                None => text.replace(old.as_str(), &new),
            };
            Ok(Value::string(replaced))
        }
        "startswith" => {
            let prefix = as_str(name, one_arg(name, &args)?)?;
            Ok(Value::Bool(text.starts_with(prefix.as_str())))
        }
        "endswith" => {
            let suffix = as_str(name, one_arg(name, &args)?)?;
            Ok(Value::Bool(text.ends_with(suffix.as_str())))
        }
        "find" => {
            let needle = as_str(name, one_arg(name, &args)?)?;
            match text.find(needle.as_str()) {
                Some(byte_at) => Ok(Value::Int(text[..byte_at].chars().count() as i64)),
                None => Ok(Value::Int(-1)),
            }
        }
        "index" => {
            let needle = as_str(name, one_arg(name, &args)?)?;
            match text.find(needle.as_str()) {
                Some(byte_at) => Ok(Value::Int(text[..byte_at].chars().count() as i64)),
                None => Err(value_error("substring not found")),
            }
        }
        "count" => {
            let needle = as_str(name, one_arg(name, &args)?)?;
            if needle.is_empty() {
                return Ok(Value::Int(text.chars().count() as i64 + 1));
            }
            Ok(Value::Int(text.matches(needle.as_str()).count() as i64))
        }
        "title" => {
            no_args(name, &args)?;
            let mut out = String::with_capacity(text.len());
            let mut at_word_start = true;
            for c in text.chars() {
                if c.is_alphabetic() {
                    if at_word_start {
                        out.extend(c.to_uppercase());
                    } else {
                        out.extend(c.to_lowercase());
                    }
                    at_word_start = false;
                } else {
                    out.push(c);
                    at_word_start = true;
                }
            }
            Ok(Value::string(out))
        }
        "capitalize" => {
            no_args(name, &args)?;
            let mut chars = text.chars();
            let out = match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            };
            Ok(Value::string(out))
        }
        "isdigit" => {
            no_args(name, &args)?;
            Ok(Value::Bool(
                !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()),
            ))
        }
        "isalpha" => {
            no_args(name, &args)?;
            Ok(Value::Bool(
                !text.is_empty() && text.chars().all(char::is_alphabetic),
            ))
        }
        "isalnum" => {
            no_args(name, &args)?;
            Ok(Value::Bool(
                !text.is_empty() && text.chars().all(char::is_alphanumeric),
            ))
        }
        "islower" => {
            no_args(name, &args)?;
            Ok(Value::Bool(
                text.chars().any(char::is_alphabetic)
                    && text.chars().filter(|c| c.is_alphabetic()).all(char::is_lowercase),
            ))
        }
        "isupper" => {
            no_args(name, &args)?;
            Ok(Value::Bool(
                text.chars().any(char::is_alphabetic)
                    && text.chars().filter(|c| c.is_alphabetic()).all(char::is_uppercase),
            ))
        }
        "isspace" => {
            no_args(name, &args)?;
            Ok(Value::Bool(
                !text.is_empty() && text.chars().all(char::is_whitespace),
            ))
        }
        "encode" => Ok(Value::bytes(text.as_bytes().to_vec())),
        "zfill" => {
            let width = as_int(name, one_arg(name, &args)?)?.max(0) as usize;
            let len = text.chars().count();
            if len >= width {
                Ok(Value::string(text.to_string()))
            } else if let Some(rest) = text.strip_prefix('-') {
                Ok(Value::string(format!("-{}{}", "0".repeat(width - len), rest)))
            } else {
                Ok(Value::string(format!("{}{}", "0".repeat(width - len), text)))
            }
        }
        "center" | "ljust" | "rjust" => {
            if args.is_empty() || args.len() > 2 {
                return Err(type_error(format!("{name}() takes 1 or 2 arguments")));
            }
            let width = as_int(name, &args[0])?.max(0) as usize;
            let fill = match args.get(1) {
                Some(v) => {
                    let s = as_str(name, v)?;
                    s.chars().next().unwrap_or(' ')
                }
                None => ' ',
            };
            let len = text.chars().count();
            if len >= width {
                return Ok(Value::string(text.to_string()));
            }
            let missing = width - len;
            let out = match name {
                "ljust" => format!("{}{}", text, fill.to_string().repeat(missing)),
                "rjust" => format!("{}{}", fill.to_string().repeat(missing), text),
                _ => {
                    let left = missing / 2;
                    format!(
                        "{}{}{}",
                        fill.to_string().repeat(left),
                        text,
                        fill.to_string().repeat(missing - left)
                    )
                }
            };
            Ok(Value::string(out))
        }
        // Enrichment methods.
        "reverse" => {
            no_args(name, &args)?;
            Ok(Value::string(text.chars().rev().collect::<String>()))
        }
        "replace_with_dict" => {
            let mapping = one_arg(name, &args)?;
            let Value::Dict(entries) = mapping else {
                return Err(type_error("replace_with_dict() argument must be a dict"));
            };
            let mut out = text.to_string();
            for (key, value) in entries.borrow().iter() {
                let from = value_str(&key.to_value());
                let to = value_str(value);
                out = out.replace(&from, &to);
            }
            Ok(Value::string(out))
        }
        "filter" => {
            let func = one_arg(name, &args)?.clone();
            let mut out = String::new();
            for c in text.chars() {
                let ch = Value::string(c.to_string());
                if truthy(&ev.call_value(&func, vec![ch], Vec::new())?) {
                    out.push(c);
                }
            }
            Ok(Value::string(out))
        }
        "for_each" => {
            let func = one_arg(name, &args)?.clone();
            let mut out = String::new();
            for c in text.chars() {
                let ch = Value::string(c.to_string());
                out.push_str(&value_str(&ev.call_value(&func, vec![ch], Vec::new())?));
            }
            Ok(Value::string(out))
        }
        "map" => {
            let func = one_arg(name, &args)?.clone();
            let mut out = Vec::new();
            for c in text.chars() {
                let ch = Value::string(c.to_string());
                out.push(ev.call_value(&func, vec![ch], Vec::new())?);
            }
            Ok(Value::list(out))
        }
        "unsort" => {
            no_args(name, &args)?;
            let mut chars: Vec<char> = text.chars().collect();
            chars.shuffle(&mut rand::thread_rng());
            Ok(Value::string(chars.into_iter().collect::<String>()))
        }
        _ => Err(crate::exception::attribute_error("str", name)),
    }
}

fn numeric_method(receiver: &Value, name: &str, args: Vec<Value>) -> EvalResult<Value> {
    let as_float = match receiver {
        Value::Int(n) => *n as f64,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Float(x) => *x,
        _ => unreachable!("numeric_method receiver checked by dispatch"),
    };
    let is_int = !matches!(receiver, Value::Float(_));

    match name {
        "is_odd" => {
            no_args(name, &args)?;
            Ok(Value::Bool((as_float as i64) % 2 != 0))
        }
        "is_even" => {
            no_args(name, &args)?;
            Ok(Value::Bool((as_float as i64) % 2 == 0))
        }
        "is_positive" => {
            no_args(name, &args)?;
            Ok(Value::Bool(as_float >= 0.0))
        }
        "get_percent_of" => {
            let total = match args.first() {
                Some(v) => as_f64(name, v)?,
                None => 1.0,
            };
            if total == 0.0 {
                return Err(crate::exception::zero_division());
            }
            Ok(Value::Float(as_float / total * 100.0))
        }
        "get_percent" => {
            let percent = match args.first() {
                Some(v) => as_f64(name, v)?,
                None => 100.0,
            };
            Ok(Value::Float(as_float * (percent / 100.0)))
        }
        "random" => {
            no_args(name, &args)?;
            let mut rng = rand::thread_rng();
            if is_int {
                let bound = (as_float as i64).abs();
                if bound == 0 {
                    return Ok(Value::Int(0));
                }
                Ok(Value::Int(rng.gen_range(-bound..=bound)))
            } else {
                let bound = as_float.abs();
                if bound == 0.0 {
                    return Ok(Value::Float(0.0));
                }
                Ok(Value::Float(rng.gen_range(-bound..=bound)))
            }
        }
        "between" => {
            if args.len() != 2 {
                return Err(type_error("between() takes exactly 2 arguments"));
            }
            let low = as_f64(name, &args[0])?;
            let high = as_f64(name, &args[1])?;
            Ok(Value::Bool(as_float >= low && as_float <= high))
        }
        "round" | "ceil" | "floor" => {
            let decimals = match args.first() {
                Some(v) => as_int(name, v)?,
                None => 0,
            };
            let factor = 10f64.powi(decimals as i32);
            let scaled = as_float * factor;
            let result = match name {
                "ceil" => scaled.ceil(),
                "floor" => scaled.floor(),
                _ => scaled.round_ties_even(),
            } / factor;
            if is_int || decimals <= 0 {
                Ok(Value::Int(result as i64))
            } else {
                Ok(Value::Float(result))
            }
        }
        "limit_range" => {
            let low = match args.first() {
                Some(v) => as_f64(name, v)?,
                None => 0.0,
            };
            let high = match args.get(1) {
                Some(v) => as_f64(name, v)?,
                None => 100.0,
            };
            let clamped = as_float.clamp(low, high);
            if is_int {
                Ok(Value::Int(clamped as i64))
            } else {
                Ok(Value::Float(clamped))
            }
        }
        "integer_part" => {
            no_args(name, &args)?;
            Ok(Value::Int(as_float.trunc() as i64))
        }
        "decimal_part" => {
            no_args(name, &args)?;
            if is_int {
                Ok(Value::Int(0))
            } else {
                Ok(Value::Float(as_float.fract()))
            }
        }
        "is_integer" => {
            no_args(name, &args)?;
            Ok(Value::Bool(as_float == as_float.trunc()))
        }
        _ => Err(crate::exception::attribute_error(receiver.type_name(), name)),
    }
}

fn list_method(
    ev: &mut Evaluator,
    items: &Rc<std::cell::RefCell<Vec<Value>>>,
    name: &str,
    args: Vec<Value>,
) -> EvalResult<Value> {
    match name {
        "append" => {
            let value = one_arg(name, &args)?;
            items.borrow_mut().push(value.clone());
            Ok(Value::None)
        }
        "extend" => {
            let iterable = one_arg(name, &args)?;
            let extra: Vec<Value> = iterate(iterable)?.collect();
            items.borrow_mut().extend(extra);
            Ok(Value::None)
        }
        "insert" => {
            if args.len() != 2 {
                return Err(type_error("insert() takes exactly 2 arguments"));
            }
            let at = as_int(name, &args[0])?;
            let mut items = items.borrow_mut();
            let len = items.len() as i64;
            let at = at.clamp(-len, len);
            let at = if at < 0 { (len + at) as usize } else { at as usize };
            items.insert(at, args[1].clone());
            Ok(Value::None)
        }
        "pop" => {
            let mut items = items.borrow_mut();
            if items.is_empty() {
                return Err(crate::exception::index_error("pop from empty list"));
            }
            let at = match args.first() {
                Some(v) => {
                    let raw = as_int(name, v)?;
                    let len = items.len() as i64;
                    let at = if raw < 0 { raw + len } else { raw };
                    if at < 0 || at >= len {
                        return Err(crate::exception::index_error("pop index out of range"));
                    }
                    at as usize
                }
                None => items.len() - 1,
            };
            Ok(items.remove(at))
        }
        "remove" => {
            let target = one_arg(name, &args)?;
            let mut items = items.borrow_mut();
            match items.iter().position(|v| value_eq(v, target)) {
                Some(at) => {
                    items.remove(at);
                    Ok(Value::None)
                }
                None => Err(value_error("list.remove(x): x not in list")),
            }
        }
        "clear" => {
            no_args(name, &args)?;
            items.borrow_mut().clear();
            Ok(Value::None)
        }
        "index" => {
            let target = one_arg(name, &args)?;
            let items = items.borrow();
            items
                .iter()
                .position(|v| value_eq(v, target))
                .map(|at| Value::Int(at as i64))
                .ok_or_else(|| value_error("value not in list"))
        }
        "count" => {
            let target = one_arg(name, &args)?;
            Ok(Value::Int(
                items.borrow().iter().filter(|v| value_eq(v, target)).count() as i64,
            ))
        }
        "sort" => {
            no_args(name, &args)?;
            let snapshot = items.borrow().clone();
            let mut sorted: Vec<Value> = Vec::with_capacity(snapshot.len());
            for value in snapshot {
                let mut at = sorted.len();
                for (i, existing) in sorted.iter().enumerate() {
                    if crate::operators::compare(&value, existing)? == std::cmp::Ordering::Less {
                        at = i;
                        break;
                    }
                }
                sorted.insert(at, value);
            }
            *items.borrow_mut() = sorted;
            Ok(Value::None)
        }
        "reverse" => {
            no_args(name, &args)?;
            items.borrow_mut().reverse();
            Ok(Value::None)
        }
        "copy" => {
            no_args(name, &args)?;
            Ok(Value::list(items.borrow().clone()))
        }
        "random_choice" => {
            let n = match args.first() {
                Some(v) => as_int(name, v)?.max(0) as usize,
                None => 1,
            };
            let items = items.borrow();
            if n > items.len() {
                return Err(value_error("sample larger than population"));
            }
            let chosen: Vec<Value> = items
                .choose_multiple(&mut rand::thread_rng(), n)
                .cloned()
                .collect();
            Ok(Value::list(chosen))
        }
        "unsort" => {
            no_args(name, &args)?;
            items.borrow_mut().shuffle(&mut rand::thread_rng());
            Ok(Value::None)
        }
        "sort_by_position_list" => {
            let order = one_arg(name, &args)?;
            let positions: Vec<Value> = iterate(order)?.collect();
            let current = items.borrow().clone();
            let mut reordered = Vec::with_capacity(positions.len());
            for position in positions {
                let at = as_int(name, &position)?;
                let value = current.get(at as usize).cloned().ok_or_else(|| {
                    crate::exception::index_error("list index out of range")
                })?;
                reordered.push(value);
            }
            *items.borrow_mut() = reordered;
            Ok(Value::None)
        }
        "for_each" => {
            let func = one_arg(name, &args)?.clone();
            let current = items.borrow().clone();
            let mut mapped = Vec::with_capacity(current.len());
            for item in current {
                mapped.push(ev.call_value(&func, vec![item], Vec::new())?);
            }
            *items.borrow_mut() = mapped.clone();
            Ok(Value::list(mapped))
        }
        "filter" => {
            let func = one_arg(name, &args)?.clone();
            let current = items.borrow().clone();
            let mut kept = Vec::new();
            for item in current {
                if truthy(&ev.call_value(&func, vec![item.clone()], Vec::new())?) {
                    kept.push(item);
                }
            }
            *items.borrow_mut() = kept;
            Ok(Value::None)
        }
        "map" => {
            let func = one_arg(name, &args)?.clone();
            let current = items.borrow().clone();
            let mut mapped = Vec::with_capacity(current.len());
            for item in current {
                mapped.push(ev.call_value(&func, vec![item], Vec::new())?);
            }
            Ok(Value::list(mapped))
        }
        _ => Err(crate::exception::attribute_error("list", name)),
    }
}

fn tuple_method(
    ev: &mut Evaluator,
    items: &Rc<Vec<Value>>,
    name: &str,
    args: Vec<Value>,
) -> EvalResult<Value> {
    match name {
        "count" => {
            let target = one_arg(name, &args)?;
            Ok(Value::Int(
                items.iter().filter(|v| value_eq(v, target)).count() as i64
            ))
        }
        "index" => {
            let target = one_arg(name, &args)?;
            items
                .iter()
                .position(|v| value_eq(v, target))
                .map(|at| Value::Int(at as i64))
                .ok_or_else(|| value_error("value not in tuple"))
        }
        "random_choice" => {
            let n = match args.first() {
                Some(v) => as_int(name, v)?.max(0) as usize,
                None => 1,
            };
            if n > items.len() {
                return Err(value_error("sample larger than population"));
            }
            let chosen: Vec<Value> = items
                .choose_multiple(&mut rand::thread_rng(), n)
                .cloned()
                .collect();
            Ok(Value::list(chosen))
        }
        "unsort" => {
            no_args(name, &args)?;
            let mut shuffled = items.as_ref().clone();
            shuffled.shuffle(&mut rand::thread_rng());
            Ok(Value::tuple(shuffled))
        }
        "sort_by_position_list" => {
            let order = one_arg(name, &args)?;
            let positions: Vec<Value> = iterate(order)?.collect();
            let mut reordered = Vec::with_capacity(positions.len());
            for position in positions {
                let at = as_int(name, &position)?;
                let value = items.get(at as usize).cloned().ok_or_else(|| {
                    crate::exception::index_error("tuple index out of range")
                })?;
                reordered.push(value);
            }
            Ok(Value::tuple(reordered))
        }
        "for_each" => {
            let func = one_arg(name, &args)?.clone();
            let mut mapped = Vec::with_capacity(items.len());
            for item in items.iter() {
                mapped.push(ev.call_value(&func, vec![item.clone()], Vec::new())?);
            }
            Ok(Value::tuple(mapped))
        }
        "filter" => {
            let func = one_arg(name, &args)?.clone();
            let mut kept = Vec::new();
            for item in items.iter() {
                if truthy(&ev.call_value(&func, vec![item.clone()], Vec::new())?) {
                    kept.push(item.clone());
                }
            }
            Ok(Value::tuple(kept))
        }
        "map" => {
            let func = one_arg(name, &args)?.clone();
            let mut mapped = Vec::with_capacity(items.len());
            for item in items.iter() {
                mapped.push(ev.call_value(&func, vec![item.clone()], Vec::new())?);
            }
            Ok(Value::list(mapped))
        }
        _ => Err(crate::exception::attribute_error("tuple", name)),
    }
}

fn dict_method(
    ev: &mut Evaluator,
    entries: &Rc<std::cell::RefCell<ValueDict>>,
    name: &str,
    args: Vec<Value>,
) -> EvalResult<Value> {
    match name {
        "get" => {
            if args.is_empty() || args.len() > 2 {
                return Err(type_error("get() takes 1 or 2 arguments"));
            }
            let key = HashKey::from_value(&args[0])?;
            Ok(entries
                .borrow()
                .get(&key)
                .cloned()
                .or_else(|| args.get(1).cloned())
                .unwrap_or(Value::None))
        }
        "keys" => {
            no_args(name, &args)?;
            Ok(Value::list(
                entries.borrow().keys().map(HashKey::to_value).collect(),
            ))
        }
        "values" => {
            no_args(name, &args)?;
            Ok(Value::list(entries.borrow().values().cloned().collect()))
        }
        "items" => {
            no_args(name, &args)?;
            Ok(Value::list(
                entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| Value::tuple(vec![k.to_value(), v.clone()]))
                    .collect(),
            ))
        }
        "pop" => {
            if args.is_empty() || args.len() > 2 {
                return Err(type_error("pop() takes 1 or 2 arguments"));
            }
            let key = HashKey::from_value(&args[0])?;
            match entries.borrow_mut().shift_remove(&key) {
                Some(value) => Ok(value),
                None => args
                    .get(1)
                    .cloned()
                    .ok_or_else(|| crate::exception::key_error(&value_str(&args[0]))),
            }
        }
        "update" => {
            let other = one_arg(name, &args)?;
            let Value::Dict(other) = other else {
                return Err(type_error("update() argument must be a dict"));
            };
            let additions: Vec<(HashKey, Value)> = other
                .borrow()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let mut entries = entries.borrow_mut();
            for (key, value) in additions {
                entries.insert(key, value);
            }
            Ok(Value::None)
        }
        "clear" => {
            no_args(name, &args)?;
            entries.borrow_mut().clear();
            Ok(Value::None)
        }
        "copy" => {
            no_args(name, &args)?;
            Ok(Value::dict(entries.borrow().clone()))
        }
        "setdefault" => {
            if args.is_empty() || args.len() > 2 {
                return Err(type_error("setdefault() takes 1 or 2 arguments"));
            }
            let key = HashKey::from_value(&args[0])?;
            let default = args.get(1).cloned().unwrap_or(Value::None);
            let mut entries = entries.borrow_mut();
            Ok(entries.entry(key).or_insert(default).clone())
        }
        "random_choice" => {
            let n = match args.first() {
                Some(v) => as_int(name, v)?.max(0) as usize,
                None => 1,
            };
            let pairs: Vec<Value> = entries
                .borrow()
                .iter()
                .map(|(k, v)| Value::tuple(vec![k.to_value(), v.clone()]))
                .collect();
            if n > pairs.len() {
                return Err(value_error("sample larger than population"));
            }
            let chosen: Vec<Value> = pairs
                .choose_multiple(&mut rand::thread_rng(), n)
                .cloned()
                .collect();
            Ok(Value::list(chosen))
        }
        "unsort" => {
            no_args(name, &args)?;
            let mut pairs: Vec<(HashKey, Value)> = entries
                .borrow()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            pairs.shuffle(&mut rand::thread_rng());
            *entries.borrow_mut() = pairs.into_iter().collect();
            Ok(Value::None)
        }
        "sort" | "sort_by_keys" => {
            no_args(name, &args)?;
            let pairs = sorted_pairs(entries, true)?;
            if name == "sort" {
                *entries.borrow_mut() = pairs
                    .iter()
                    .filter_map(|pair| match pair {
                        Value::Tuple(kv) => {
                            HashKey::from_value(&kv[0]).ok().map(|k| (k, kv[1].clone()))
                        }
                        _ => None,
                    })
                    .collect();
                Ok(Value::None)
            } else {
                Ok(Value::list(pairs))
            }
        }
        "sort_by_value" => {
            no_args(name, &args)?;
            Ok(Value::list(sorted_pairs(entries, false)?))
        }
        "for_each" => {
            let func = one_arg(name, &args)?.clone();
            let pairs: Vec<Value> = entries
                .borrow()
                .iter()
                .map(|(k, v)| Value::tuple(vec![k.to_value(), v.clone()]))
                .collect();
            let mut out = ValueDict::default();
            for pair in pairs {
                let result = ev.call_value(&func, vec![pair], Vec::new())?;
                let parts: Vec<Value> = iterate(&result)?.collect();
                match parts.as_slice() {
                    [key, value] => {
                        out.insert(HashKey::from_value(key)?, value.clone());
                    }
                    _ => {
                        return Err(value_error(
                            "for_each() callback must return a (key, value) pair",
                        ))
                    }
                }
            }
            Ok(Value::dict(out))
        }
        "filter" => {
            let func = one_arg(name, &args)?.clone();
            let pairs: Vec<(HashKey, Value)> = entries
                .borrow()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let mut out = ValueDict::default();
            for (key, value) in pairs {
                let pair = Value::tuple(vec![key.to_value(), value.clone()]);
                if truthy(&ev.call_value(&func, vec![pair], Vec::new())?) {
                    out.insert(key, value);
                }
            }
            Ok(Value::dict(out))
        }
        "map" => {
            let func = one_arg(name, &args)?.clone();
            let pairs: Vec<Value> = entries
                .borrow()
                .iter()
                .map(|(k, v)| Value::tuple(vec![k.to_value(), v.clone()]))
                .collect();
            let mut out = Vec::with_capacity(pairs.len());
            for pair in pairs {
                out.push(ev.call_value(&func, vec![pair], Vec::new())?);
            }
            Ok(Value::list(out))
        }
        _ => Err(crate::exception::attribute_error("dict", name)),
    }
}

fn sorted_pairs(
    entries: &Rc<std::cell::RefCell<ValueDict>>,
    by_key: bool,
) -> EvalResult<Vec<Value>> {
    let pairs: Vec<(Value, Value)> = entries
        .borrow()
        .iter()
        .map(|(k, v)| (k.to_value(), v.clone()))
        .collect();
    let mut sorted: Vec<(Value, Value)> = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let mut at = sorted.len();
        for (i, existing) in sorted.iter().enumerate() {
            let (a, b) = if by_key {
                (&pair.0, &existing.0)
            } else {
                (&pair.1, &existing.1)
            };
            if crate::operators::compare(a, b)? == std::cmp::Ordering::Less {
                at = i;
                break;
            }
        }
        sorted.insert(at, pair);
    }
    Ok(sorted
        .into_iter()
        .map(|(k, v)| Value::tuple(vec![k, v]))
        .collect())
}

fn set_method(
    items: &Rc<std::cell::RefCell<ValueSet>>,
    name: &str,
    args: Vec<Value>,
) -> EvalResult<Value> {
    match name {
        "add" => {
            let value = one_arg(name, &args)?;
            items.borrow_mut().insert(HashKey::from_value(value)?);
            Ok(Value::None)
        }
        "remove" => {
            let value = one_arg(name, &args)?;
            let key = HashKey::from_value(value)?;
            if items.borrow_mut().shift_remove(&key) {
                Ok(Value::None)
            } else {
                Err(crate::exception::key_error(&value_str(value)))
            }
        }
        "discard" => {
            let value = one_arg(name, &args)?;
            let key = HashKey::from_value(value)?;
            items.borrow_mut().shift_remove(&key);
            Ok(Value::None)
        }
        "clear" => {
            no_args(name, &args)?;
            items.borrow_mut().clear();
            Ok(Value::None)
        }
        "copy" => {
            no_args(name, &args)?;
            Ok(Value::set(items.borrow().clone()))
        }
        "union" | "intersection" | "difference" => {
            let other = one_arg(name, &args)?;
            let mut other_set = ValueSet::default();
            for item in iterate(other)? {
                other_set.insert(HashKey::from_value(&item)?);
            }
            let items = items.borrow();
            let result: ValueSet = match name {
                "union" => items.union(&other_set).cloned().collect(),
                "intersection" => items.intersection(&other_set).cloned().collect(),
                _ => items.difference(&other_set).cloned().collect(),
            };
            Ok(Value::set(result))
        }
        _ => Err(crate::exception::attribute_error("set", name)),
    }
}

fn frozen_set_method(items: &Rc<ValueSet>, name: &str, args: Vec<Value>) -> EvalResult<Value> {
    match name {
        "copy" => {
            no_args(name, &args)?;
            Ok(Value::FrozenSet(items.clone()))
        }
        "union" | "intersection" | "difference" => {
            let other = one_arg(name, &args)?;
            let mut other_set = ValueSet::default();
            for item in iterate(other)? {
                other_set.insert(HashKey::from_value(&item)?);
            }
            let result: ValueSet = match name {
                "union" => items.union(&other_set).cloned().collect(),
                "intersection" => items.intersection(&other_set).cloned().collect(),
                _ => items.difference(&other_set).cloned().collect(),
            };
            Ok(Value::FrozenSet(Rc::new(result)))
        }
        _ => Err(crate::exception::attribute_error("frozenset", name)),
    }
}

fn bytes_method(data: &Rc<[u8]>, name: &str, args: Vec<Value>) -> EvalResult<Value> {
    match name {
        "decode" => {
            // The optional encoding argument is accepted and must be utf-8.
            if let Some(encoding) = args.first() {
                let encoding = as_str(name, encoding)?;
                if !encoding.eq_ignore_ascii_case("utf-8") && !encoding.eq_ignore_ascii_case("utf8")
                {
                    return Err(value_error(format!("unknown encoding: {encoding}")));
                }
            }
            match std::str::from_utf8(data) {
                Ok(text) => Ok(Value::string(text.to_string())),
                Err(_) => Err(value_error("invalid utf-8 sequence")),
            }
        }
        _ => Err(crate::exception::attribute_error("bytes", name)),
    }
}

fn file_method(
    file: &Rc<std::cell::RefCell<crate::object::FileObject>>,
    name: &str,
    args: Vec<Value>,
) -> EvalResult<Value> {
    match name {
        "read" => {
            no_args(name, &args)?;
            Ok(Value::string(file.borrow_mut().read_all()?))
        }
        "readlines" => {
            no_args(name, &args)?;
            Ok(Value::list(
                file.borrow_mut()
                    .read_lines()?
                    .into_iter()
                    .map(Value::string)
                    .collect(),
            ))
        }
        "write" => {
            let text = as_str(name, one_arg(name, &args)?)?;
            Ok(Value::Int(file.borrow_mut().write_text(&text)?))
        }
        "close" => {
            no_args(name, &args)?;
            file.borrow_mut().close();
            Ok(Value::None)
        }
        _ => Err(crate::exception::attribute_error("file", name)),
    }
}

fn loop_control_method(control: &Rc<LoopControl>, name: &str, args: Vec<Value>) -> EvalResult<Value> {
    match name {
        "get_count" => {
            no_args(name, &args)?;
            Ok(Value::Int(control.count() as i64))
        }
        "get_count_finished" => {
            no_args(name, &args)?;
            Ok(Value::Int(control.count_finished() as i64))
        }
        "get_ignored" => {
            no_args(name, &args)?;
            Ok(Value::Int(control.ignored() as i64))
        }
        "get_remaining_ignore_count" => {
            no_args(name, &args)?;
            Ok(Value::Int(control.remaining_ignore() as i64))
        }
        "ignore_next_iterations" => {
            let count = as_int(name, one_arg(name, &args)?)?.max(0) as u64;
            control.ignore_next_iterations(count);
            Ok(Value::None)
        }
        "reset_ignore" => {
            no_args(name, &args)?;
            control.reset_ignore();
            Ok(Value::None)
        }
        "get_time_total" => {
            no_args(name, &args)?;
            Ok(Value::Float(control.time_total()))
        }
        "get_time_average" => {
            no_args(name, &args)?;
            Ok(Value::Float(control.time_average()))
        }
        "get_time_of_last_iteration" => {
            no_args(name, &args)?;
            Ok(Value::Float(control.time_of_last_iteration()))
        }
        "is_running" => {
            no_args(name, &args)?;
            Ok(Value::Bool(control.is_running()))
        }
        _ => Err(crate::exception::attribute_error("LoopControl", name)),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;

    #[test]
    fn method_tables_cover_enrichment() {
        assert!(has_method(&Value::Int(2), "is_even"));
        assert!(has_method(&Value::string("x"), "reverse"));
        assert!(has_method(&Value::list(vec![]), "random_choice"));
        assert!(!has_method(&Value::Int(2), "upper"));
    }

    #[test]
    fn numeric_enrichment() {
        let result = numeric_method(&Value::Int(4), "is_even", vec![]).unwrap();
        assert!(matches!(result, Value::Bool(true)));
        let result = numeric_method(&Value::Int(7), "is_odd", vec![]).unwrap();
        assert!(matches!(result, Value::Bool(true)));
        let result =
            numeric_method(&Value::Int(50), "get_percent_of", vec![Value::Int(200)]).unwrap();
        assert!(matches!(result, Value::Float(x) if x == 25.0));
        let result = numeric_method(
            &Value::Int(150),
            "limit_range",
            vec![Value::Int(0), Value::Int(100)],
        )
        .unwrap();
        assert!(value_eq(&result, &Value::Int(100)));
    }

    #[test]
    fn set_algebra_methods() {
        let a = Value::set(
            [HashKey::Int(1), HashKey::Int(2)].into_iter().collect(),
        );
        let Value::Set(items) = &a else { unreachable!() };
        let other = Value::list(vec![Value::Int(2), Value::Int(3)]);
        let union = set_method(items, "union", vec![other]).unwrap();
        let Value::Set(result) = union else {
            panic!("expected set")
        };
        assert_eq!(result.borrow().len(), 3);
    }
}
