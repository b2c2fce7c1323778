//! Binary and unary operator evaluation.
//!
//! Direct enum-based dispatch over the fixed value set. `and`/`or` never
//! reach this module; the evaluator short-circuits them.

use std::cmp::Ordering;
use std::rc::Rc;

use kandy_ir::{BinaryOp, UnaryOp};

use crate::exception::{
    modulo_zero, overflow_error, type_error, value_error, zero_division, EvalResult,
};
use crate::value::{truthy, value_eq, value_identity, HashKey, RangeObject, Value};

/// Evaluate a binary operation on two values.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(value_eq(left, right))),
        BinaryOp::NotEq => return Ok(Value::Bool(!value_eq(left, right))),
        BinaryOp::Is => return Ok(Value::Bool(value_identity(left, right))),
        BinaryOp::In => return contains(right, left).map(Value::Bool),
        BinaryOp::Xor => {
            let l = truthy(left);
            let r = truthy(right);
            return Ok(Value::Bool((l && !r) || (r && !l)));
        }
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ordering = compare(left, right)?;
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::LtEq => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            return Ok(Value::Bool(result));
        }
        _ => {}
    }

    if let Some(result) = sequence_binary(op, left, right)? {
        return Ok(result);
    }
    numeric_binary(op, left, right)
}

/// Evaluate a unary operation.
pub fn unary(op: UnaryOp, value: &Value) -> EvalResult<Value> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!truthy(value))),
        UnaryOp::Neg => match value {
            Value::Int(n) => Ok(Value::Int(-n)),
            Value::Bool(b) => Ok(Value::Int(-i64::from(*b))),
            Value::Float(x) => Ok(Value::Float(-x)),
            Value::Complex(re, im) => Ok(Value::Complex(-re, -im)),
            other => Err(type_error(format!(
                "bad operand type for unary -: '{}'",
                other.type_name()
            ))),
        },
        UnaryOp::Pos => match value {
            Value::Int(_) | Value::Float(_) | Value::Complex(..) => Ok(value.clone()),
            Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
            other => Err(type_error(format!(
                "bad operand type for unary +: '{}'",
                other.type_name()
            ))),
        },
        UnaryOp::BitNot => match value {
            Value::Int(n) => Ok(Value::Int(!n)),
            Value::Bool(b) => Ok(Value::Int(!i64::from(*b))),
            other => Err(type_error(format!(
                "bad operand type for unary ~: '{}'",
                other.type_name()
            ))),
        },
    }
}

/// Containment: `item in container`.
pub fn contains(container: &Value, item: &Value) -> EvalResult<bool> {
    match container {
        Value::Str(text) => match item {
            Value::Str(needle) => Ok(text.contains(needle.as_ref())),
            other => Err(type_error(format!(
                "'in <string>' requires string as left operand, not '{}'",
                other.type_name()
            ))),
        },
        Value::Bytes(data) => match item {
            Value::Int(byte) => Ok(data.contains(&(*byte as u8))),
            Value::Bytes(needle) => Ok(data
                .windows(needle.len().max(1))
                .any(|window| window == needle.as_ref())),
            other => Err(type_error(format!(
                "a bytes-like object is required, not '{}'",
                other.type_name()
            ))),
        },
        Value::List(items) => Ok(items.borrow().iter().any(|v| value_eq(v, item))),
        Value::Tuple(items) => Ok(items.iter().any(|v| value_eq(v, item))),
        Value::Set(items) => Ok(HashKey::from_value(item)
            .map(|key| items.borrow().contains(&key))
            .unwrap_or(false)),
        Value::FrozenSet(items) => Ok(HashKey::from_value(item)
            .map(|key| items.contains(&key))
            .unwrap_or(false)),
        Value::Dict(entries) => Ok(HashKey::from_value(item)
            .map(|key| entries.borrow().contains_key(&key))
            .unwrap_or(false)),
        Value::Range(range) => match item {
            Value::Int(n) => Ok(range.contains(*n)),
            _ => Ok(false),
        },
        other => Err(type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

/// Ordering comparison, or a type error for incomparable operands.
pub fn compare(left: &Value, right: &Value) -> EvalResult<Ordering> {
    if let (Some(a), Some(b)) = (as_float(left), as_float(right)) {
        return a
            .partial_cmp(&b)
            .ok_or_else(|| value_error("cannot order NaN values"));
    }
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::Bytes(a), Value::Bytes(b)) => Ok(a.cmp(b)),
        (Value::List(a), Value::List(b)) => {
            let (a, b) = (a.borrow().clone(), b.borrow().clone());
            compare_sequences(&a, &b)
        }
        (Value::Tuple(a), Value::Tuple(b)) => compare_sequences(a, b),
        _ => Err(type_error(format!(
            "'<' not supported between instances of '{}' and '{}'",
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn compare_sequences(a: &[Value], b: &[Value]) -> EvalResult<Ordering> {
    for (x, y) in a.iter().zip(b.iter()) {
        if !value_eq(x, y) {
            return compare(x, y);
        }
    }
    Ok(a.len().cmp(&b.len()))
}

/// Concatenation, repetition, merging, and set algebra. Returns `None` when
/// neither operand shape applies, letting the numeric path take over.
fn sequence_binary(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Option<Value>> {
    match (op, left, right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => {
            Ok(Some(Value::string(format!("{a}{b}"))))
        }
        (BinaryOp::Add, Value::Str(_), other) | (BinaryOp::Add, other, Value::Str(_))
            if !matches!(other, Value::Str(_)) =>
        {
            Err(type_error(format!(
                "can only concatenate str to str, not '{}'",
                other.type_name()
            )))
        }
        (BinaryOp::Add, Value::Bytes(a), Value::Bytes(b)) => {
            let mut data = a.to_vec();
            data.extend_from_slice(b);
            Ok(Some(Value::bytes(data)))
        }
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Some(Value::list(items)))
        }
        (BinaryOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            let mut items = a.as_ref().clone();
            items.extend(b.iter().cloned());
            Ok(Some(Value::tuple(items)))
        }
        (BinaryOp::Mul, Value::Str(text), Value::Int(n))
        | (BinaryOp::Mul, Value::Int(n), Value::Str(text)) => {
            Ok(Some(Value::string(text.repeat((*n).max(0) as usize))))
        }
        (BinaryOp::Mul, Value::List(items), Value::Int(n))
        | (BinaryOp::Mul, Value::Int(n), Value::List(items)) => {
            let items = items.borrow();
            let mut out = Vec::with_capacity(items.len() * (*n).max(0) as usize);
            for _ in 0..(*n).max(0) {
                out.extend(items.iter().cloned());
            }
            Ok(Some(Value::list(out)))
        }
        (BinaryOp::Mul, Value::Tuple(items), Value::Int(n))
        | (BinaryOp::Mul, Value::Int(n), Value::Tuple(items)) => {
            let mut out = Vec::with_capacity(items.len() * (*n).max(0) as usize);
            for _ in 0..(*n).max(0) {
                out.extend(items.iter().cloned());
            }
            Ok(Some(Value::tuple(out)))
        }
        (BinaryOp::BitOr, Value::Set(a), Value::Set(b)) => {
            let merged: crate::value::ValueSet =
                a.borrow().union(&b.borrow()).cloned().collect();
            Ok(Some(Value::set(merged)))
        }
        (BinaryOp::BitAnd, Value::Set(a), Value::Set(b)) => {
            let merged: crate::value::ValueSet =
                a.borrow().intersection(&b.borrow()).cloned().collect();
            Ok(Some(Value::set(merged)))
        }
        (BinaryOp::BitXor, Value::Set(a), Value::Set(b)) => {
            let merged: crate::value::ValueSet = a
                .borrow()
                .symmetric_difference(&b.borrow())
                .cloned()
                .collect();
            Ok(Some(Value::set(merged)))
        }
        (BinaryOp::Sub, Value::Set(a), Value::Set(b)) => {
            let merged: crate::value::ValueSet =
                a.borrow().difference(&b.borrow()).cloned().collect();
            Ok(Some(Value::set(merged)))
        }
        (BinaryOp::BitOr, Value::Dict(a), Value::Dict(b)) => {
            let mut merged = a.borrow().clone();
            for (k, v) in b.borrow().iter() {
                merged.insert(k.clone(), v.clone());
            }
            Ok(Some(Value::dict(merged)))
        }
        _ => Ok(None),
    }
}

#[derive(Copy, Clone)]
enum Num {
    Int(i64),
    Float(f64),
    Complex(f64, f64),
}

impl Num {
    fn complex_parts(self) -> (f64, f64) {
        match self {
            Num::Int(n) => (n as f64, 0.0),
            Num::Float(x) => (x, 0.0),
            Num::Complex(re, im) => (re, im),
        }
    }

    fn float(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(x) => x,
            Num::Complex(re, _) => re,
        }
    }
}

fn as_num(value: &Value) -> Option<Num> {
    match value {
        Value::Bool(b) => Some(Num::Int(i64::from(*b))),
        Value::Int(n) => Some(Num::Int(*n)),
        Value::Float(x) => Some(Num::Float(*x)),
        Value::Complex(re, im) => Some(Num::Complex(*re, *im)),
        _ => None,
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        Value::Int(n) => Some(*n as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    }
}

fn numeric_binary(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let (Some(a), Some(b)) = (as_num(left), as_num(right)) else {
        return Err(type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        )));
    };

    if matches!(a, Num::Complex(..)) || matches!(b, Num::Complex(..)) {
        return complex_binary(op, a.complex_parts(), b.complex_parts());
    }
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => int_binary(op, a, b),
        (a, b) => float_binary(op, a.float(), b.float()),
    }
}

fn int_binary(op: BinaryOp, a: i64, b: i64) -> EvalResult<Value> {
    match op {
        // Arithmetic overflow falls back to float evaluation.
        BinaryOp::Add => Ok(a
            .checked_add(b)
            .map(Value::Int)
            .unwrap_or(Value::Float(a as f64 + b as f64))),
        BinaryOp::Sub => Ok(a
            .checked_sub(b)
            .map(Value::Int)
            .unwrap_or(Value::Float(a as f64 - b as f64))),
        BinaryOp::Mul => Ok(a
            .checked_mul(b)
            .map(Value::Int)
            .unwrap_or(Value::Float(a as f64 * b as f64))),
        BinaryOp::Div => {
            if b == 0 {
                Err(zero_division())
            } else {
                Ok(Value::Float(a as f64 / b as f64))
            }
        }
        BinaryOp::FloorDiv => {
            if b == 0 {
                Err(zero_division())
            } else {
                Ok(Value::Int(floor_div(a, b)))
            }
        }
        BinaryOp::Mod => {
            if b == 0 {
                Err(modulo_zero())
            } else {
                Ok(Value::Int(py_mod(a, b)))
            }
        }
        BinaryOp::SubMod => {
            if b == 0 {
                Err(modulo_zero())
            } else {
                Ok(Value::Int(b - py_mod(a, b)))
            }
        }
        BinaryOp::Pow => {
            if b < 0 {
                Ok(Value::Float((a as f64).powi(b as i32)))
            } else {
                match u32::try_from(b).ok().and_then(|exp| a.checked_pow(exp)) {
                    Some(result) => Ok(Value::Int(result)),
                    None => Ok(Value::Float((a as f64).powf(b as f64))),
                }
            }
        }
        BinaryOp::BitOr => Ok(Value::Int(a | b)),
        BinaryOp::BitAnd => Ok(Value::Int(a & b)),
        BinaryOp::BitXor => Ok(Value::Int(a ^ b)),
        BinaryOp::Shl => {
            if b < 0 {
                Err(value_error("negative shift count"))
            } else {
                a.checked_shl(b as u32)
                    .map(Value::Int)
                    .ok_or_else(|| overflow_error("left shift"))
            }
        }
        BinaryOp::Shr => {
            if b < 0 {
                Err(value_error("negative shift count"))
            } else {
                Ok(Value::Int(a.checked_shr(b as u32).unwrap_or(0)))
            }
        }
        BinaryOp::MatMul => Err(type_error(
            "unsupported operand type(s) for @: 'int' and 'int'",
        )),
        other => Err(type_error(format!(
            "unsupported operand type(s) for {}: 'int' and 'int'",
            other.symbol()
        ))),
    }
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> EvalResult<Value> {
    match op {
        BinaryOp::Add => Ok(Value::Float(a + b)),
        BinaryOp::Sub => Ok(Value::Float(a - b)),
        BinaryOp::Mul => Ok(Value::Float(a * b)),
        BinaryOp::Div => {
            if b == 0.0 {
                Err(zero_division())
            } else {
                Ok(Value::Float(a / b))
            }
        }
        BinaryOp::FloorDiv => {
            if b == 0.0 {
                Err(zero_division())
            } else {
                Ok(Value::Float((a / b).floor()))
            }
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                Err(modulo_zero())
            } else {
                Ok(Value::Float(py_fmod(a, b)))
            }
        }
        BinaryOp::SubMod => {
            if b == 0.0 {
                Err(modulo_zero())
            } else {
                Ok(Value::Float(b - py_fmod(a, b)))
            }
        }
        BinaryOp::Pow => Ok(Value::Float(a.powf(b))),
        other => Err(type_error(format!(
            "unsupported operand type(s) for {}: 'float' and 'float'",
            other.symbol()
        ))),
    }
}

fn complex_binary(op: BinaryOp, a: (f64, f64), b: (f64, f64)) -> EvalResult<Value> {
    let (ar, ai) = a;
    let (br, bi) = b;
    match op {
        BinaryOp::Add => Ok(Value::Complex(ar + br, ai + bi)),
        BinaryOp::Sub => Ok(Value::Complex(ar - br, ai - bi)),
        BinaryOp::Mul => Ok(Value::Complex(ar * br - ai * bi, ar * bi + ai * br)),
        BinaryOp::Div => {
            let denom = br * br + bi * bi;
            if denom == 0.0 {
                Err(zero_division())
            } else {
                Ok(Value::Complex(
                    (ar * br + ai * bi) / denom,
                    (ai * br - ar * bi) / denom,
                ))
            }
        }
        other => Err(type_error(format!(
            "unsupported operand type(s) for {}: 'complex' and 'complex'",
            other.symbol()
        ))),
    }
}

/// Floor division rounding toward negative infinity.
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

/// Modulo whose sign follows the divisor.
fn py_mod(a: i64, b: i64) -> i64 {
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        r + b
    } else {
        r
    }
}

fn py_fmod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
}

/// Build a range value the way `range(...)` does.
pub fn make_range(start: i64, stop: i64, step: i64) -> EvalResult<Value> {
    if step == 0 {
        return Err(value_error("range() arg 3 must not be zero"));
    }
    Ok(Value::Range(Rc::new(RangeObject { start, stop, step })))
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;
    use crate::value::{value_eq, value_repr};
    use pretty_assertions::assert_eq;

    fn eval(op: BinaryOp, a: Value, b: Value) -> String {
        value_repr(&binary(op, &a, &b).unwrap())
    }

    #[test]
    fn division_yields_floats() {
        assert_eq!(eval(BinaryOp::Div, Value::Int(7), Value::Int(2)), "3.5");
        assert_eq!(eval(BinaryOp::FloorDiv, Value::Int(7), Value::Int(2)), "3");
        assert_eq!(
            eval(BinaryOp::FloorDiv, Value::Int(-7), Value::Int(2)),
            "-4"
        );
    }

    #[test]
    fn modulo_sign_follows_divisor() {
        assert_eq!(eval(BinaryOp::Mod, Value::Int(-7), Value::Int(3)), "2");
        assert_eq!(eval(BinaryOp::Mod, Value::Int(7), Value::Int(-3)), "-2");
    }

    #[test]
    fn submod_identity() {
        // a %% b == b - (a mod b)
        for (a, b) in [(7, 3), (-7, 3), (10, 4), (5, 5)] {
            let direct = binary(BinaryOp::SubMod, &Value::Int(a), &Value::Int(b)).unwrap();
            let modulo = binary(BinaryOp::Mod, &Value::Int(a), &Value::Int(b)).unwrap();
            let expected = binary(BinaryOp::Sub, &Value::Int(b), &modulo).unwrap();
            assert!(value_eq(&direct, &expected), "a={a} b={b}");
        }
    }

    #[test]
    fn zero_division_is_an_error() {
        assert!(binary(BinaryOp::Div, &Value::Int(1), &Value::Int(0)).is_err());
        assert!(binary(BinaryOp::Mod, &Value::Int(1), &Value::Int(0)).is_err());
    }

    #[test]
    fn string_and_list_algebra() {
        assert_eq!(
            eval(BinaryOp::Add, Value::string("ab"), Value::string("cd")),
            "'abcd'"
        );
        assert_eq!(eval(BinaryOp::Mul, Value::string("ab"), Value::Int(3)), "'ababab'");
        assert_eq!(
            eval(
                BinaryOp::Add,
                Value::list(vec![Value::Int(1)]),
                Value::list(vec![Value::Int(2)])
            ),
            "[1, 2]"
        );
    }

    #[test]
    fn power_promotes_on_overflow() {
        let result = binary(BinaryOp::Pow, &Value::Int(2), &Value::Int(100)).unwrap();
        assert!(matches!(result, Value::Float(_)));
        let result = binary(BinaryOp::Pow, &Value::Int(2), &Value::Int(10)).unwrap();
        assert!(value_eq(&result, &Value::Int(1024)));
    }

    #[test]
    fn comparisons() {
        assert_eq!(eval(BinaryOp::Lt, Value::Int(1), Value::Float(1.5)), "True");
        assert_eq!(
            eval(BinaryOp::Gt, Value::string("b"), Value::string("a")),
            "True"
        );
        assert!(binary(BinaryOp::Lt, &Value::Int(1), &Value::string("a")).is_err());
    }

    #[test]
    fn xor_is_logical() {
        assert_eq!(eval(BinaryOp::Xor, Value::Int(1), Value::Int(0)), "True");
        assert_eq!(eval(BinaryOp::Xor, Value::Int(1), Value::Int(2)), "False");
    }

    #[test]
    fn matmul_has_no_numeric_surface() {
        assert!(binary(BinaryOp::MatMul, &Value::Int(1), &Value::Int(2)).is_err());
    }

    #[test]
    fn containment() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(eval(BinaryOp::In, Value::Int(2), list), "True");
        assert_eq!(
            eval(BinaryOp::In, Value::string("el"), Value::string("hello")),
            "True"
        );
    }
}
