//! Conversions: calling a built-in type as a constructor or coercer.

use crate::exception::{type_error, value_error, EvalResult};
use crate::value::{
    iterate, truthy, value_str, HashKey, TypeTag, Value, ValueDict, ValueSet,
};

/// Convert `value` by calling the type `tag` as a constructor, the way
/// `int("5")` or `list(some_tuple)` does.
pub fn convert_to_tag(tag: TypeTag, value: &Value) -> EvalResult<Value> {
    match tag {
        TypeTag::Bool => Ok(Value::Bool(truthy(value))),
        TypeTag::Int => to_int(value),
        TypeTag::Float => to_float(value),
        TypeTag::Complex => to_complex(value),
        TypeTag::Str => Ok(Value::string(value_str(value))),
        TypeTag::Bytes => to_bytes(value),
        TypeTag::List => Ok(Value::list(iterate(value)?.collect())),
        TypeTag::Tuple => Ok(Value::tuple(iterate(value)?.collect())),
        TypeTag::Set => {
            let mut items = ValueSet::default();
            for item in iterate(value)? {
                items.insert(HashKey::from_value(&item)?);
            }
            Ok(Value::set(items))
        }
        TypeTag::FrozenSet => {
            let mut items = ValueSet::default();
            for item in iterate(value)? {
                items.insert(HashKey::from_value(&item)?);
            }
            Ok(Value::FrozenSet(std::rc::Rc::new(items)))
        }
        TypeTag::Dict => to_dict(value),
        TypeTag::Type => Ok(Value::Type(value.type_tag())),
        other => Err(type_error(format!(
            "cannot construct '{}' values",
            other.name()
        ))),
    }
}

fn to_int(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(x) => Ok(Value::Int(*x as i64)),
        Value::Str(s) => {
            let text = s.trim();
            text.parse::<i64>()
                .map(Value::Int)
                .map_err(|_| value_error(format!("invalid literal for int(): '{text}'")))
        }
        other => Err(type_error(format!(
            "int() argument must be a number or string, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_float(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Bool(b) => Ok(Value::Float(f64::from(u8::from(*b)))),
        Value::Int(n) => Ok(Value::Float(*n as f64)),
        Value::Float(x) => Ok(Value::Float(*x)),
        Value::Str(s) => {
            let text = s.trim();
            text.parse::<f64>()
                .map(Value::Float)
                .map_err(|_| value_error(format!("could not convert string to float: '{text}'")))
        }
        other => Err(type_error(format!(
            "float() argument must be a number or string, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_complex(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Bool(b) => Ok(Value::Complex(f64::from(u8::from(*b)), 0.0)),
        Value::Int(n) => Ok(Value::Complex(*n as f64, 0.0)),
        Value::Float(x) => Ok(Value::Complex(*x, 0.0)),
        Value::Complex(re, im) => Ok(Value::Complex(*re, *im)),
        other => Err(type_error(format!(
            "complex() argument must be a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_bytes(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Bytes(b) => Ok(Value::Bytes(b.clone())),
        Value::Str(s) => Ok(Value::bytes(s.as_bytes().to_vec())),
        Value::List(_) | Value::Tuple(_) => {
            let mut data = Vec::new();
            for item in iterate(value)? {
                match item {
                    Value::Int(n) if (0..=255).contains(&n) => data.push(n as u8),
                    Value::Int(_) => {
                        return Err(value_error("bytes must be in range(0, 256)"));
                    }
                    other => {
                        return Err(type_error(format!(
                            "'{}' object cannot be interpreted as an integer",
                            other.type_name()
                        )))
                    }
                }
            }
            Ok(Value::bytes(data))
        }
        other => Err(type_error(format!(
            "cannot convert '{}' object to bytes",
            other.type_name()
        ))),
    }
}

fn to_dict(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Dict(entries) => Ok(Value::dict(entries.borrow().clone())),
        Value::List(_) | Value::Tuple(_) => {
            let mut entries = ValueDict::default();
            for pair in iterate(value)? {
                let mut parts = iterate(&pair)?;
                let key = parts.next();
                let val = parts.next();
                match (key, val, parts.next()) {
                    (Some(key), Some(val), None) => {
                        entries.insert(HashKey::from_value(&key)?, val);
                    }
                    _ => {
                        return Err(value_error(
                            "dictionary update sequence elements must have length 2",
                        ))
                    }
                }
            }
            Ok(Value::dict(entries))
        }
        other => Err(type_error(format!(
            "cannot convert '{}' object to dict",
            other.type_name()
        ))),
    }
}
