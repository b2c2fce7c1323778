//! Binding cells: typed, constness- and privacy-annotated storage.

use std::rc::Rc;

use crate::exception::{type_error, EvalResult};
use crate::object::ClassObject;
use crate::value::{TypeTag, Value};

/// A resolvable type: a built-in tag or a user class.
#[derive(Clone)]
pub enum TypeRef {
    Tag(TypeTag),
    Class(Rc<ClassObject>),
}

impl std::fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl TypeRef {
    pub fn name(&self) -> &str {
        match self {
            TypeRef::Tag(tag) => tag.name(),
            TypeRef::Class(class) => &class.name,
        }
    }

    /// Whether `value`'s runtime type is this type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            TypeRef::Tag(tag) => {
                // `bool` is accepted where `int` is expected.
                if *tag == TypeTag::Int && matches!(value, Value::Bool(_)) {
                    return true;
                }
                if *tag == TypeTag::Object {
                    return true;
                }
                value.type_tag() == *tag
            }
            TypeRef::Class(class) => match value {
                Value::Instance(instance) => instance.class.is_subclass_of(class),
                _ => false,
            },
        }
    }
}

/// The type constraint stored on a record.
#[derive(Clone, Debug)]
pub enum TypeConstraint {
    /// No constraint.
    Dynamic,
    /// Rejects every reassignment.
    Constant,
    Single(TypeRef),
    Union(Vec<TypeRef>),
}

impl TypeConstraint {
    /// The primary type, used as the coercion converter.
    pub fn primary(&self) -> Option<&TypeRef> {
        match self {
            TypeConstraint::Single(ty) => Some(ty),
            TypeConstraint::Union(types) => types.first(),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TypeConstraint::Dynamic => "dynamic".to_string(),
            TypeConstraint::Constant => "Constant".to_string(),
            TypeConstraint::Single(ty) => ty.name().to_string(),
            TypeConstraint::Union(types) => {
                let names: Vec<&str> = types.iter().map(TypeRef::name).collect();
                names.join(" | ")
            }
        }
    }
}

/// A binding cell.
#[derive(Clone, Debug)]
pub struct Record {
    pub value: Value,
    pub constraint: TypeConstraint,
    /// Disables coercion: mismatched assignments fail outright.
    pub strict: bool,
    /// Invisible to lookups that cross a frame boundary.
    pub private: bool,
}

impl Record {
    pub fn dynamic(value: Value) -> Self {
        Record {
            value,
            constraint: TypeConstraint::Dynamic,
            strict: false,
            private: false,
        }
    }

    pub fn constant(value: Value) -> Self {
        Record {
            value,
            constraint: TypeConstraint::Constant,
            strict: true,
            private: false,
        }
    }

    pub fn new(value: Value, constraint: TypeConstraint, strict: bool, private: bool) -> Self {
        Record {
            value,
            constraint,
            strict,
            private,
        }
    }

    /// `None` satisfies every constraint; otherwise the value's type must be
    /// permitted.
    pub fn accepts(&self, value: &Value) -> bool {
        if matches!(value, Value::None) {
            return true;
        }
        match &self.constraint {
            TypeConstraint::Dynamic => true,
            TypeConstraint::Constant => false,
            TypeConstraint::Single(ty) => ty.matches(value),
            TypeConstraint::Union(types) => types.iter().any(|ty| ty.matches(value)),
        }
    }

    /// Validate a plain (non-augmented) assignment, applying coercion via the
    /// primary constraint type when permitted. Class-typed constraints
    /// validate by instance check only.
    pub fn validated(&self, value: Value) -> EvalResult<Value> {
        if matches!(self.constraint, TypeConstraint::Constant) {
            return Err(type_error("Can't reassign a value to 'Constant'."));
        }
        if matches!(value, Value::Undefined) {
            return Err(type_error(
                "Can't assign again the 'Undefined' value. Use 'None' instead.",
            ));
        }
        if self.accepts(&value) {
            return Ok(value);
        }
        if self.strict {
            return Err(type_error(format!(
                "Can't assign '{}' to '{}' (strict mode is enabled).",
                value.type_name(),
                self.constraint.describe()
            )));
        }
        match self.constraint.primary() {
            Some(TypeRef::Tag(tag)) => {
                let converted = crate::convert::convert_to_tag(*tag, &value);
                match converted {
                    Ok(converted) if self.accepts(&converted) => Ok(converted),
                    _ => Err(type_error(format!(
                        "Can't assign '{}' to '{}'",
                        value.type_name(),
                        self.constraint.describe()
                    ))),
                }
            }
            _ => Err(type_error(format!(
                "Can't assign '{}' to '{}'",
                value.type_name(),
                self.constraint.describe()
            ))),
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;
    use crate::value::value_eq;

    #[test]
    fn constant_rejects_reassignment() {
        let record = Record::constant(Value::Float(3.14));
        let err = record.validated(Value::Int(4)).unwrap_err();
        assert_eq!(err.message, "Can't reassign a value to 'Constant'.");
    }

    #[test]
    fn coercion_converts_through_primary_type() {
        let record = Record::new(
            Value::Int(1),
            TypeConstraint::Single(TypeRef::Tag(TypeTag::Int)),
            false,
            false,
        );
        let coerced = record.validated(Value::string("42")).unwrap();
        assert!(value_eq(&coerced, &Value::Int(42)));
    }

    #[test]
    fn strict_skips_coercion() {
        let record = Record::new(
            Value::Int(1),
            TypeConstraint::Single(TypeRef::Tag(TypeTag::Int)),
            true,
            false,
        );
        assert!(record.validated(Value::string("42")).is_err());
        assert!(record.validated(Value::Int(7)).is_ok());
    }

    #[test]
    fn undefined_cannot_be_reassigned() {
        let record = Record::dynamic(Value::Int(1));
        assert!(record.validated(Value::Undefined).is_err());
    }

    #[test]
    fn none_is_always_valid() {
        let record = Record::new(
            Value::Int(1),
            TypeConstraint::Single(TypeRef::Tag(TypeTag::Int)),
            true,
            false,
        );
        assert!(record.validated(Value::None).is_ok());
    }

    #[test]
    fn union_accepts_any_member() {
        let record = Record::new(
            Value::Int(1),
            TypeConstraint::Union(vec![TypeRef::Tag(TypeTag::Int), TypeRef::Tag(TypeTag::Float)]),
            true,
            false,
        );
        assert!(record.validated(Value::Float(2.5)).is_ok());
        assert!(record.validated(Value::string("x")).is_err());
    }
}
