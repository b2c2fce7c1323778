//! Assignment resolution.
//!
//! Targets resolve to either a name in the current frame, an attribute of a
//! scope-object/instance (whose frame is pushed for the write), or an
//! indexed element of a container.

use kandy_ir::{BinaryOp, Expr, ExprKind, TypeAnnotation};

use crate::exception::{
    interpreter_error, key_error, name_error, type_error, EvalResult,
};
use crate::interpreter::exprs::normalize_index;
use crate::interpreter::Evaluator;
use crate::operators;
use crate::record::{Record, TypeConstraint, TypeRef};
use crate::value::{HashKey, Value};

impl Evaluator {
    /// Assign `value` to an arbitrary target expression. Returns the value
    /// actually stored (after any coercion), which `:=` yields.
    pub(crate) fn general_assign(
        &mut self,
        target: &Expr,
        ty: Option<&TypeAnnotation>,
        value: Value,
        aug: Option<BinaryOp>,
    ) -> EvalResult<Value> {
        match &target.kind {
            ExprKind::Var(name) => self.assign_in_top(name, ty, value, aug),
            ExprKind::Attribute { base, name } => {
                let object = self.eval_expr(base)?;
                match object {
                    Value::Space(_) | Value::Module(_) | Value::Instance(_) | Value::Class(_) => {
                        let ar = match &object {
                            Value::Class(class) => class.ar.clone(),
                            _ => self.resolve_space(&object)?,
                        };
                        self.stack.push(ar);
                        let result = self.assign_in_top(name, ty, value, aug);
                        self.stack.pop();
                        result
                    }
                    other => Err(type_error(format!(
                        "cannot set attribute '{name}' on '{}' object",
                        other.type_name()
                    ))),
                }
            }
            ExprKind::Slicing { base, indices } => {
                if indices.len() != 1 || matches!(indices[0].kind, ExprKind::Empty) {
                    return Err(interpreter_error(
                        "slice-range assignment is not supported; assign one element at a time",
                    ));
                }
                let container = self.eval_expr(base)?;
                let index = self.eval_expr(&indices[0])?;
                self.assign_index(&container, &index, value, aug)
            }
            ExprKind::Call { .. } => Err(interpreter_error(
                "Can't assign to a call function result directly.",
            )),
            _ => Err(interpreter_error("invalid assignment target")),
        }
    }

    /// Bind or rebind a name in the top frame.
    ///
    /// Existing records reject re-annotation and validate/coerce through
    /// their constraint; augmented assignment requires an existing binding.
    pub(crate) fn assign_in_top(
        &mut self,
        name: &str,
        ty: Option<&TypeAnnotation>,
        value: Value,
        aug: Option<BinaryOp>,
    ) -> EvalResult<Value> {
        let ar = self.stack.peek();
        let existing = ar.borrow().get_local(name);

        if let Some(record) = existing {
            if ty.is_some() {
                return Err(type_error("Can't reassign the 'variable-type'."));
            }
            let incoming = match aug {
                Some(op) => operators::binary(op, &record.value, &value)?,
                None => value,
            };
            let validated = record.validated(incoming)?;
            let mut updated = record;
            updated.value = validated.clone();
            ar.borrow_mut().set(name, updated)?;
            return Ok(validated);
        }

        if aug.is_some() {
            return Err(name_error(name));
        }

        let record = self.build_record(value, ty)?;
        let stored = record.value.clone();
        ar.borrow_mut().set(name, record)?;
        Ok(stored)
    }

    /// Create a fresh binding without constraint validation against any
    /// previous record; used for parameter initialization.
    pub(crate) fn declare_binding(
        &mut self,
        name: &str,
        value: Value,
        ty: Option<&TypeAnnotation>,
    ) -> EvalResult<()> {
        let record = self.build_record(value, ty)?;
        let ar = self.stack.peek();
        ar.borrow_mut().set(name, record)?;
        Ok(())
    }

    /// Derive a record from a declaration's type annotation.
    pub(crate) fn build_record(
        &mut self,
        value: Value,
        ty: Option<&TypeAnnotation>,
    ) -> EvalResult<Record> {
        let annotation = match ty {
            None => return Ok(Record::dynamic(value)),
            Some(annotation) => annotation,
        };

        let private = annotation.is_private();
        match annotation {
            TypeAnnotation::Dynamic { .. } => {
                let mut record = Record::dynamic(value);
                record.private = private;
                Ok(record)
            }
            TypeAnnotation::Const { .. } => {
                let mut record = Record::constant(value);
                record.private = private;
                Ok(record)
            }
            TypeAnnotation::Var { strict, .. } => {
                if matches!(value, Value::None | Value::Undefined) {
                    let mut record = Record::dynamic(value);
                    record.private = private;
                    Ok(record)
                } else {
                    let constraint = TypeConstraint::Single(type_of(&value));
                    Ok(Record::new(value, constraint, *strict, private))
                }
            }
            TypeAnnotation::Named { .. } | TypeAnnotation::Multiple { .. } => {
                let strict = annotation.is_strict();
                let constraint = self
                    .resolve_annotation(annotation)?
                    .unwrap_or(TypeConstraint::Dynamic);
                let mut record = Record::new(Value::None, constraint, strict, private);
                // The initial value passes through the same validation and
                // coercion path as later assignments; the Undefined sentinel
                // may only be stored at declaration.
                record.value = if matches!(value, Value::Undefined) {
                    value
                } else {
                    record.validated(value)?
                };
                Ok(record)
            }
        }
    }

    /// `container[index] = value`, applying the augmented operator in place.
    fn assign_index(
        &mut self,
        container: &Value,
        index: &Value,
        value: Value,
        aug: Option<BinaryOp>,
    ) -> EvalResult<Value> {
        match container {
            Value::List(items) => {
                let at = normalize_index(index, items.borrow().len(), "list")?;
                let stored = match aug {
                    Some(op) => {
                        let old = items.borrow()[at].clone();
                        operators::binary(op, &old, &value)?
                    }
                    None => value,
                };
                items.borrow_mut()[at] = stored.clone();
                Ok(stored)
            }
            Value::Dict(entries) => {
                let key = HashKey::from_value(index)?;
                let stored = match aug {
                    Some(op) => {
                        let old = entries
                            .borrow()
                            .get(&key)
                            .cloned()
                            .ok_or_else(|| key_error(&crate::value::value_repr(index)))?;
                        operators::binary(op, &old, &value)?
                    }
                    None => value,
                };
                entries.borrow_mut().insert(key, stored.clone());
                Ok(stored)
            }
            other => Err(type_error(format!(
                "'{}' object does not support item assignment",
                other.type_name()
            ))),
        }
    }
}

/// The runtime type of a value, as a constraint reference.
pub(crate) fn type_of(value: &Value) -> TypeRef {
    match value {
        Value::Instance(instance) => TypeRef::Class(instance.class.clone()),
        other => TypeRef::Tag(other.type_tag()),
    }
}
