//! Runtime values.
//!
//! One fixed sum covers every value a script can touch; heap variants share
//! ownership through `Rc` so activation records, spaces, and closures can
//! alias them.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::callable::Callable;
use crate::exception::{not_iterable, type_error, EvalResult, ExcClass, KandyError};
use crate::loop_control::LoopControl;
use crate::object::{BoundMethod, ClassObject, FileObject, InstanceObject};
use crate::record::TypeRef;
use crate::spaces::{ModuleObject, SpaceObject};
use kandy_ir::float_repr;

/// Insertion-ordered set of hashable values.
pub type ValueSet = IndexSet<HashKey>;
/// Insertion-ordered mapping from hashable keys to values.
pub type ValueDict = IndexMap<HashKey, Value>;

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    None,
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(f64, f64),
    Str(Rc<str>),
    Bytes(Rc<[u8]>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    Set(Rc<RefCell<ValueSet>>),
    FrozenSet(Rc<ValueSet>),
    Dict(Rc<RefCell<ValueDict>>),
    Range(Rc<RangeObject>),
    Iterator(Rc<RefCell<IterState>>),
    /// A built-in type used as a constant, converter, or `isinstance` target.
    Type(TypeTag),
    /// A union-of-types capability (`numeric`, `Iterable`, `Text`, ...).
    MultipleTypes(Rc<Vec<TypeRef>>),
    Builtin(crate::builtins::Builtin),
    Callable(Rc<Callable>),
    BoundMethod(Rc<BoundMethod>),
    Class(Rc<ClassObject>),
    Instance(Rc<InstanceObject>),
    Module(Rc<ModuleObject>),
    Space(Rc<SpaceObject>),
    LoopControl(Rc<LoopControl>),
    ExcType(ExcClass),
    Exception(Rc<KandyError>),
    File(Rc<RefCell<FileObject>>),
}

impl Value {
    pub fn string(text: impl Into<String>) -> Value {
        Value::Str(Rc::from(text.into().into_boxed_str()))
    }

    pub fn bytes(data: Vec<u8>) -> Value {
        Value::Bytes(Rc::from(data.into_boxed_slice()))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(Rc::new(items))
    }

    pub fn set(items: ValueSet) -> Value {
        Value::Set(Rc::new(RefCell::new(items)))
    }

    pub fn dict(entries: ValueDict) -> Value {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    pub fn type_name(&self) -> &'static str {
        self.type_tag().name()
    }

    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::None => TypeTag::NoneType,
            Value::Undefined => TypeTag::UndefinedType,
            Value::Bool(_) => TypeTag::Bool,
            Value::Int(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::Complex(..) => TypeTag::Complex,
            Value::Str(_) => TypeTag::Str,
            Value::Bytes(_) => TypeTag::Bytes,
            Value::List(_) => TypeTag::List,
            Value::Tuple(_) => TypeTag::Tuple,
            Value::Set(_) => TypeTag::Set,
            Value::FrozenSet(_) => TypeTag::FrozenSet,
            Value::Dict(_) => TypeTag::Dict,
            Value::Range(_) => TypeTag::Range,
            Value::Iterator(_) => TypeTag::Iterator,
            Value::Type(_) => TypeTag::Type,
            Value::MultipleTypes(_) => TypeTag::MultipleTypes,
            Value::Builtin(_) | Value::Callable(_) | Value::BoundMethod(_) => TypeTag::Function,
            Value::Class(_) => TypeTag::Type,
            Value::Instance(_) => TypeTag::Object,
            Value::Module(_) => TypeTag::Module,
            Value::Space(_) => TypeTag::Space,
            Value::LoopControl(_) => TypeTag::LoopControl,
            Value::ExcType(_) => TypeTag::Type,
            Value::Exception(_) => TypeTag::Exception,
            Value::File(_) => TypeTag::File,
        }
    }
}

/// Tags for every built-in runtime type. The seed table exposes a subset of
/// these as first-class constants.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TypeTag {
    NoneType,
    UndefinedType,
    Bool,
    Int,
    Float,
    Complex,
    Str,
    Bytes,
    List,
    Tuple,
    Set,
    FrozenSet,
    Dict,
    Range,
    Iterator,
    Type,
    Object,
    Function,
    Module,
    Space,
    LoopControl,
    Exception,
    File,
    MultipleTypes,
}

impl TypeTag {
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::NoneType => "NoneType",
            TypeTag::UndefinedType => "Undefined",
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Complex => "complex",
            TypeTag::Str => "str",
            TypeTag::Bytes => "bytes",
            TypeTag::List => "list",
            TypeTag::Tuple => "tuple",
            TypeTag::Set => "set",
            TypeTag::FrozenSet => "frozenset",
            TypeTag::Dict => "dict",
            TypeTag::Range => "range",
            TypeTag::Iterator => "iterator",
            TypeTag::Type => "type",
            TypeTag::Object => "object",
            TypeTag::Function => "function",
            TypeTag::Module => "module",
            TypeTag::Space => "space",
            TypeTag::LoopControl => "LoopControl",
            TypeTag::Exception => "exception",
            TypeTag::File => "file",
            TypeTag::MultipleTypes => "MultipleTypesClass",
        }
    }
}

/// Integer range, as produced by `range(...)` and `for x from a to b`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeObject {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl RangeObject {
    pub fn len(&self) -> i64 {
        if self.step > 0 {
            ((self.stop - self.start) + self.step - 1).div_euclid(self.step).max(0)
        } else {
            ((self.start - self.stop) + (-self.step) - 1).div_euclid(-self.step).max(0)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, value: i64) -> bool {
        if self.step > 0 {
            value >= self.start && value < self.stop && (value - self.start) % self.step == 0
        } else {
            value <= self.start && value > self.stop && (self.start - value) % (-self.step) == 0
        }
    }

    pub fn values(&self) -> Vec<Value> {
        let mut out = Vec::new();
        let mut current = self.start;
        if self.step > 0 {
            while current < self.stop {
                out.push(Value::Int(current));
                current += self.step;
            }
        } else {
            while current > self.stop {
                out.push(Value::Int(current));
                current += self.step;
            }
        }
        out
    }
}

/// State of an explicit iterator value produced by `iter(...)`.
#[derive(Debug)]
pub struct IterState {
    items: Vec<Value>,
    index: usize,
}

impl IterState {
    pub fn new(items: Vec<Value>) -> Self {
        IterState { items, index: 0 }
    }

    pub fn next_value(&mut self) -> Option<Value> {
        let value = self.items.get(self.index).cloned();
        if value.is_some() {
            self.index += 1;
        }
        value
    }
}

/// Iterator over a value's elements, used by `for ... in` and the eager
/// sequence builtins.
pub enum ValueIter {
    Owned(std::vec::IntoIter<Value>),
    Shared(Rc<RefCell<IterState>>),
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            ValueIter::Owned(inner) => inner.next(),
            ValueIter::Shared(state) => state.borrow_mut().next_value(),
        }
    }
}

/// Build an iterator over `value`, snapshotting mutable containers.
pub fn iterate(value: &Value) -> EvalResult<ValueIter> {
    let items: Vec<Value> = match value {
        Value::List(items) => items.borrow().clone(),
        Value::Tuple(items) => items.as_ref().clone(),
        Value::Str(text) => text.chars().map(|c| Value::string(c.to_string())).collect(),
        Value::Bytes(data) => data.iter().map(|b| Value::Int(i64::from(*b))).collect(),
        Value::Set(items) => items.borrow().iter().map(HashKey::to_value).collect(),
        Value::FrozenSet(items) => items.iter().map(HashKey::to_value).collect(),
        Value::Dict(entries) => entries.borrow().keys().map(HashKey::to_value).collect(),
        Value::Range(range) => range.values(),
        Value::Iterator(state) => return Ok(ValueIter::Shared(state.clone())),
        other => return Err(not_iterable(other.type_name())),
    };
    Ok(ValueIter::Owned(items.into_iter()))
}

/// A hashable snapshot of a value, usable as a dict key or set element.
///
/// Integral floats normalize to their integer form so `1` and `1.0` land on
/// the same key.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum HashKey {
    None,
    Undefined,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(Rc<str>),
    Bytes(Rc<[u8]>),
    Tuple(Rc<Vec<HashKey>>),
}

impl HashKey {
    pub fn from_value(value: &Value) -> EvalResult<HashKey> {
        Ok(match value {
            Value::None => HashKey::None,
            Value::Undefined => HashKey::Undefined,
            Value::Bool(b) => HashKey::Bool(*b),
            Value::Int(n) => HashKey::Int(*n),
            Value::Float(x) => {
                if *x == x.trunc() && x.abs() < 9e18 {
                    HashKey::Int(*x as i64)
                } else {
                    HashKey::Float(x.to_bits())
                }
            }
            Value::Str(s) => HashKey::Str(s.clone()),
            Value::Bytes(b) => HashKey::Bytes(b.clone()),
            Value::Tuple(items) => {
                let keys: EvalResult<Vec<HashKey>> = items.iter().map(HashKey::from_value).collect();
                HashKey::Tuple(Rc::new(keys?))
            }
            other => {
                return Err(type_error(format!(
                    "unhashable type: '{}'",
                    other.type_name()
                )))
            }
        })
    }

    pub fn to_value(&self) -> Value {
        match self {
            HashKey::None => Value::None,
            HashKey::Undefined => Value::Undefined,
            HashKey::Bool(b) => Value::Bool(*b),
            HashKey::Int(n) => Value::Int(*n),
            HashKey::Float(bits) => Value::Float(f64::from_bits(*bits)),
            HashKey::Str(s) => Value::Str(s.clone()),
            HashKey::Bytes(b) => Value::Bytes(b.clone()),
            HashKey::Tuple(keys) => Value::tuple(keys.iter().map(HashKey::to_value).collect()),
        }
    }
}

/// Truthiness: `None`, `Undefined`, zero, and empty containers are falsy.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::None | Value::Undefined => false,
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::Float(x) => *x != 0.0,
        Value::Complex(re, im) => *re != 0.0 || *im != 0.0,
        Value::Str(s) => !s.is_empty(),
        Value::Bytes(b) => !b.is_empty(),
        Value::List(items) => !items.borrow().is_empty(),
        Value::Tuple(items) => !items.is_empty(),
        Value::Set(items) => !items.borrow().is_empty(),
        Value::FrozenSet(items) => !items.is_empty(),
        Value::Dict(entries) => !entries.borrow().is_empty(),
        Value::Range(range) => !range.is_empty(),
        _ => true,
    }
}

/// Structural equality with numeric cross-type comparison.
pub fn value_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::None, Value::None) | (Value::Undefined, Value::Undefined) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        // Booleans compare as integers against numbers.
        (Value::Bool(a), Value::Int(b)) | (Value::Int(b), Value::Bool(a)) => i64::from(*a) == *b,
        (Value::Bool(a), Value::Float(b)) | (Value::Float(b), Value::Bool(a)) => {
            f64::from(u8::from(*a)) == *b
        }
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a == b,
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
        (Value::Complex(ar, ai), Value::Complex(br, bi)) => ar == br && ai == bi,
        (Value::Complex(re, im), Value::Int(n)) | (Value::Int(n), Value::Complex(re, im)) => {
            *im == 0.0 && *re == *n as f64
        }
        (Value::Complex(re, im), Value::Float(x)) | (Value::Float(x), Value::Complex(re, im)) => {
            *im == 0.0 && re == x
        }
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Bytes(a), Value::Bytes(b)) => a == b,
        (Value::List(a), Value::List(b)) => {
            if Rc::ptr_eq(a, b) {
                return true;
            }
            let (a, b) = (a.borrow(), b.borrow());
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| value_eq(x, y))
        }
        (Value::Tuple(a), Value::Tuple(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| value_eq(x, y))
        }
        (Value::Set(a), Value::Set(b)) => {
            Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
        }
        (Value::FrozenSet(a), Value::FrozenSet(b)) => a == b,
        (Value::Dict(a), Value::Dict(b)) => {
            if Rc::ptr_eq(a, b) {
                return true;
            }
            let (a, b) = (a.borrow(), b.borrow());
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| value_eq(v, other)))
        }
        (Value::Range(a), Value::Range(b)) => a == b,
        (Value::Type(a), Value::Type(b)) => a == b,
        (Value::ExcType(a), Value::ExcType(b)) => a == b,
        _ => value_identity(left, right),
    }
}

/// Identity: pointer equality for shared values, kind equality for unit
/// values. Primitives are identical when equal.
pub fn value_identity(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::None, Value::None) | (Value::Undefined, Value::Undefined) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
        (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
        (Value::Bytes(a), Value::Bytes(b)) => Rc::ptr_eq(a, b),
        (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
        (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
        (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b),
        (Value::FrozenSet(a), Value::FrozenSet(b)) => Rc::ptr_eq(a, b),
        (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
        (Value::Range(a), Value::Range(b)) => Rc::ptr_eq(a, b),
        (Value::Iterator(a), Value::Iterator(b)) => Rc::ptr_eq(a, b),
        (Value::Type(a), Value::Type(b)) => a == b,
        (Value::MultipleTypes(a), Value::MultipleTypes(b)) => Rc::ptr_eq(a, b),
        (Value::Builtin(a), Value::Builtin(b)) => a == b,
        (Value::Callable(a), Value::Callable(b)) => Rc::ptr_eq(a, b),
        (Value::BoundMethod(a), Value::BoundMethod(b)) => Rc::ptr_eq(a, b),
        (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
        (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
        (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
        (Value::Space(a), Value::Space(b)) => Rc::ptr_eq(a, b),
        (Value::LoopControl(a), Value::LoopControl(b)) => Rc::ptr_eq(a, b),
        (Value::ExcType(a), Value::ExcType(b)) => a == b,
        (Value::Exception(a), Value::Exception(b)) => Rc::ptr_eq(a, b),
        (Value::File(a), Value::File(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

/// `str()`-style rendering: strings stay unquoted.
pub fn value_str(value: &Value) -> String {
    match value {
        Value::Str(s) => s.to_string(),
        other => value_repr(other),
    }
}

/// `repr()`-style rendering.
pub fn value_repr(value: &Value) -> String {
    match value {
        Value::None => "None".to_string(),
        Value::Undefined => "Undefined".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(x) => float_repr(*x),
        Value::Complex(re, im) => {
            if *re == 0.0 {
                format!("{}j", float_repr(*im))
            } else if *im < 0.0 {
                format!("({}{}j)", float_repr(*re), float_repr(*im))
            } else {
                format!("({}+{}j)", float_repr(*re), float_repr(*im))
            }
        }
        Value::Str(s) => {
            // Prefer single quotes; switch to double quotes when the text
            // contains a single quote but no double quote.
            let quote = if s.contains('\'') && !s.contains('"') {
                '"'
            } else {
                '\''
            };
            format!("{quote}{}{quote}", escape_str(s, quote))
        }
        Value::Bytes(b) => {
            let mut out = String::from("b'");
            for byte in b.iter() {
                match byte {
                    b'\\' => out.push_str("\\\\"),
                    b'\'' => out.push_str("\\'"),
                    b'\n' => out.push_str("\\n"),
                    b'\t' => out.push_str("\\t"),
                    b'\r' => out.push_str("\\r"),
                    0x20..=0x7e => out.push(*byte as char),
                    _ => out.push_str(&format!("\\x{byte:02x}")),
                }
            }
            out.push('\'');
            out
        }
        Value::List(items) => {
            let inner: Vec<String> = items.borrow().iter().map(value_repr).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Tuple(items) => {
            let inner: Vec<String> = items.iter().map(value_repr).collect();
            if inner.len() == 1 {
                format!("({},)", inner[0])
            } else {
                format!("({})", inner.join(", "))
            }
        }
        Value::Set(items) => {
            let items = items.borrow();
            if items.is_empty() {
                "set()".to_string()
            } else {
                let inner: Vec<String> =
                    items.iter().map(|k| value_repr(&k.to_value())).collect();
                format!("{{{}}}", inner.join(", "))
            }
        }
        Value::FrozenSet(items) => {
            let inner: Vec<String> = items.iter().map(|k| value_repr(&k.to_value())).collect();
            format!("frozenset({{{}}})", inner.join(", "))
        }
        Value::Dict(entries) => {
            let inner: Vec<String> = entries
                .borrow()
                .iter()
                .map(|(k, v)| format!("{}: {}", value_repr(&k.to_value()), value_repr(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
        Value::Range(range) => {
            if range.step == 1 {
                format!("range({}, {})", range.start, range.stop)
            } else {
                format!("range({}, {}, {})", range.start, range.stop, range.step)
            }
        }
        Value::Iterator(_) => "<iterator>".to_string(),
        Value::Type(tag) => format!("<class '{}'>", tag.name()),
        Value::MultipleTypes(types) => {
            let names: Vec<&str> = types.iter().map(TypeRef::name).collect();
            format!("MultipleTypesClass({})", names.join(", "))
        }
        Value::Builtin(builtin) => format!("<built-in function {}>", builtin.name()),
        Value::Callable(callable) => callable.repr(),
        Value::BoundMethod(method) => method.repr(),
        Value::Class(class) => format!("<class '{}'>", class.name),
        Value::Instance(instance) => format!("<{} object>", instance.class.name),
        Value::Module(module) => module.repr(),
        Value::Space(space) => space.repr(),
        Value::LoopControl(control) => control.repr(),
        Value::ExcType(class) => format!("<class '{}'>", class.name()),
        Value::Exception(err) => format!("{}({:?})", err.class.name(), err.message),
        Value::File(file) => file.borrow().repr(),
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", value_repr(self))
    }
}

fn escape_str(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn truthiness() {
        assert!(!truthy(&Value::None));
        assert!(!truthy(&Value::Undefined));
        assert!(!truthy(&Value::Int(0)));
        assert!(!truthy(&Value::string("")));
        assert!(truthy(&Value::Int(3)));
        assert!(truthy(&Value::string("x")));
        assert!(!truthy(&Value::list(vec![])));
    }

    #[test]
    fn numeric_cross_equality() {
        assert!(value_eq(&Value::Int(1), &Value::Float(1.0)));
        assert!(value_eq(&Value::Bool(true), &Value::Int(1)));
        assert!(!value_eq(&Value::Int(1), &Value::string("1")));
    }

    #[test]
    fn reprs() {
        assert_eq!(value_repr(&Value::Float(1.0)), "1.0");
        // Quote selection follows the content.
        assert_eq!(value_repr(&Value::string("a'b")), "\"a'b\"");
        assert_eq!(value_repr(&Value::string("a\"b'c")), "'a\"b\\'c'");
        assert_eq!(
            value_repr(&Value::tuple(vec![Value::Int(1)])),
            "(1,)"
        );
        assert_eq!(
            value_repr(&Value::list(vec![Value::Int(1), Value::string("x")])),
            "[1, 'x']"
        );
    }

    #[test]
    fn hash_key_normalizes_integral_floats() {
        let a = HashKey::from_value(&Value::Int(1)).unwrap();
        let b = HashKey::from_value(&Value::Float(1.0)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn range_semantics() {
        let range = RangeObject {
            start: 1,
            stop: 6,
            step: 1,
        };
        assert_eq!(range.len(), 5);
        assert!(range.contains(5));
        assert!(!range.contains(6));

        let down = RangeObject {
            start: 5,
            stop: 0,
            step: -1,
        };
        assert_eq!(down.len(), 5);
        assert!(down.contains(1));
    }
}
