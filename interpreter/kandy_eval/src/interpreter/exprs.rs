//! Expression evaluation.

use std::rc::Rc;

use smallvec::SmallVec;

use kandy_ir::{BinaryOp, Expr, ExprKind};

use crate::exception::{
    attribute_error, index_error, key_error, type_error, value_error, EvalResult,
};
use crate::interpreter::{Evaluator, Exec};
use crate::methods::has_method;
use crate::object::{BoundMethod, MethodTarget};
use crate::operators;
use crate::value::{
    iterate, truthy, value_eq, value_repr, HashKey, Value, ValueDict, ValueSet,
};

impl Evaluator {
    pub(crate) fn eval_expr(&mut self, expr: &Expr) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::Empty => Ok(Value::None),
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Float(x) => Ok(Value::Float(*x)),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::NoneLit => Ok(Value::None),
            ExprKind::Undefined => Ok(Value::Undefined),
            ExprKind::Str(lit) => {
                let text = self.render_string(lit)?;
                Ok(Value::string(text))
            }
            ExprKind::BytesLit(lit) => {
                let text = self.render_string(lit)?;
                Ok(Value::bytes(text.into_bytes()))
            }
            ExprKind::Tuple(items) => {
                let values: EvalResult<Vec<Value>> =
                    items.iter().map(|e| self.eval_expr(e)).collect();
                Ok(Value::tuple(values?))
            }
            ExprKind::List(items) => {
                let values: EvalResult<Vec<Value>> =
                    items.iter().map(|e| self.eval_expr(e)).collect();
                Ok(Value::list(values?))
            }
            ExprKind::Set(items) => {
                let mut set = ValueSet::default();
                for item in items {
                    let value = self.eval_expr(item)?;
                    set.insert(HashKey::from_value(&value)?);
                }
                Ok(Value::set(set))
            }
            ExprKind::Dict(entries) => {
                let mut dict = ValueDict::default();
                for (key_expr, value_expr) in entries {
                    let key = self.eval_expr(key_expr)?;
                    let value = self.eval_expr(value_expr)?;
                    dict.insert(HashKey::from_value(&key)?, value);
                }
                Ok(Value::dict(dict))
            }
            ExprKind::Var(name) => self.lookup_name(name).map_err(|err| err.at(expr.pos)),
            ExprKind::Binary { op, left, right } => match op {
                // Short-circuit forms yield the deciding operand.
                BinaryOp::And => {
                    let left = self.eval_expr(left)?;
                    if truthy(&left) {
                        self.eval_expr(right)
                    } else {
                        Ok(left)
                    }
                }
                BinaryOp::Or => {
                    let left = self.eval_expr(left)?;
                    if truthy(&left) {
                        Ok(left)
                    } else {
                        self.eval_expr(right)
                    }
                }
                _ => {
                    let left = self.eval_expr(left)?;
                    let right = self.eval_expr(right)?;
                    operators::binary(*op, &left, &right).map_err(|err| err.at(expr.pos))
                }
            },
            ExprKind::Unary { op, operand } => {
                let value = self.eval_expr(operand)?;
                operators::unary(*op, &value).map_err(|err| err.at(expr.pos))
            }
            ExprKind::StarredTuple(inner) => {
                let value = self.eval_expr(inner)?;
                Ok(Value::tuple(iterate(&value)?.collect()))
            }
            ExprKind::StarredDict(inner) => {
                let value = self.eval_expr(inner)?;
                match value {
                    Value::Dict(entries) => Ok(Value::dict(entries.borrow().clone())),
                    other => Err(type_error(format!(
                        "argument after ** must be a mapping, not '{}'",
                        other.type_name()
                    ))),
                }
            }
            ExprKind::Attribute { base, name } => {
                let value = self.eval_expr(base)?;
                self.attribute(&value, name).map_err(|err| err.at(expr.pos))
            }
            ExprKind::Slicing { base, indices } => {
                let value = self.eval_expr(base)?;
                self.eval_slicing(&value, indices).map_err(|err| err.at(expr.pos))
            }
            ExprKind::Call {
                callee,
                args,
                kwargs,
            } => {
                let callee_value = self.eval_expr(callee)?;
                let (args, kwargs) = self.eval_call_arguments(args, kwargs)?;
                self.call_value(&callee_value, args, kwargs)
                    .map_err(|err| err.at(expr.pos))
            }
            ExprKind::IfExpr {
                cond,
                on_true,
                on_false,
            } => {
                if truthy(&self.eval_expr(cond)?) {
                    self.eval_expr(on_true)
                } else {
                    match on_false {
                        Some(expr) => self.eval_expr(expr),
                        None => Ok(Value::None),
                    }
                }
            }
            ExprKind::UnlessExpr {
                cond,
                on_true,
                on_false,
            } => {
                if !truthy(&self.eval_expr(cond)?) {
                    self.eval_expr(on_true)
                } else {
                    match on_false {
                        Some(expr) => self.eval_expr(expr),
                        None => Ok(Value::None),
                    }
                }
            }
            ExprKind::IfNotNull { value, fallback } => {
                let value = self.eval_expr(value)?;
                if matches!(value, Value::None | Value::Undefined) {
                    self.eval_expr(fallback)
                } else {
                    Ok(value)
                }
            }
            ExprKind::AssignExpr { target, value } => {
                let value = self.eval_expr(value)?;
                self.general_assign(target, None, value, None)
            }
            ExprKind::Lambda(def) => {
                let callable = self.make_callable(def)?;
                Ok(Value::Callable(Rc::new(callable)))
            }
            ExprKind::When {
                subject,
                arms,
                default,
            } => {
                let subject = self.eval_expr(subject)?;
                for arm in arms {
                    for test in &arm.tests {
                        if value_eq(&subject, &self.eval_expr(test)?) {
                            return self.eval_expr(&arm.value);
                        }
                    }
                }
                match default {
                    Some(stmt) => match self.eval_stmt(stmt)? {
                        Exec::Value(value) => Ok(value),
                        Exec::Action(_) => Err(crate::exception::interpreter_error(
                            "invalid script-action in 'when' default",
                        )),
                    },
                    None => Ok(Value::None),
                }
            }
            ExprKind::Block(stmt) => match self.eval_stmt(stmt)? {
                Exec::Value(value) => Ok(value),
                Exec::Action(action) if action.kind == kandy_ir::ActionKind::Return => {
                    Ok(action.payload)
                }
                Exec::Action(_) => Err(crate::exception::interpreter_error(
                    "invalid script-action in expression block",
                )),
            },
        }
    }

    /// Evaluate call arguments, expanding `*seq` and `**map` splats.
    pub(crate) fn eval_call_arguments(
        &mut self,
        arg_exprs: &[Expr],
        kwarg_exprs: &[(String, Expr)],
    ) -> EvalResult<(Vec<Value>, Vec<(String, Value)>)> {
        let mut args = Vec::with_capacity(arg_exprs.len());
        let mut kwargs: Vec<(String, Value)> = Vec::new();

        for expr in arg_exprs {
            match &expr.kind {
                ExprKind::StarredTuple(inner) => {
                    let seq = self.eval_expr(inner)?;
                    args.extend(iterate(&seq)?);
                }
                ExprKind::StarredDict(inner) => {
                    let map = self.eval_expr(inner)?;
                    let Value::Dict(entries) = &map else {
                        return Err(type_error(format!(
                            "argument after ** must be a mapping, not '{}'",
                            map.type_name()
                        )));
                    };
                    for (key, value) in entries.borrow().iter() {
                        let HashKey::Str(name) = key else {
                            return Err(type_error("keywords must be strings"));
                        };
                        push_kwarg(&mut kwargs, name.to_string(), value.clone())?;
                    }
                }
                _ => args.push(self.eval_expr(expr)?),
            }
        }

        for (name, expr) in kwarg_exprs {
            let value = self.eval_expr(expr)?;
            push_kwarg(&mut kwargs, name.clone(), value)?;
        }

        Ok((args, kwargs))
    }

    /// Attribute access with the special-type registry: primitives resolve
    /// through the per-type method table.
    pub fn attribute(&mut self, value: &Value, name: &str) -> EvalResult<Value> {
        match value {
            Value::Module(module) => {
                match crate::callstack::lookup(&module.globals, name, false, true) {
                    Some(record) => Ok(record.value),
                    None => Err(attribute_error("module", name)),
                }
            }
            Value::Space(_) => {
                let ar = self.resolve_space(value)?;
                match crate::callstack::lookup(&ar, name, false, true) {
                    Some(record) => Ok(record.value),
                    None => Err(attribute_error("space", name)),
                }
            }
            Value::Instance(instance) => {
                if let Some(record) = instance.ar.borrow().get_local(name) {
                    return Ok(self.bind_if_method(value, record.value));
                }
                match instance.class.find_member(name) {
                    Some(record) => Ok(self.bind_if_method(value, record.value)),
                    None => Err(attribute_error(&instance.class.name, name)),
                }
            }
            Value::Class(class) => match class.find_member(name) {
                Some(record) => Ok(record.value),
                None => Err(attribute_error(&class.name, name)),
            },
            Value::Exception(err) => match name {
                "message" => Ok(Value::string(err.message.clone())),
                "name" => Ok(Value::string(err.class.name())),
                _ => Err(attribute_error("exception", name)),
            },
            other if has_method(other, name) => Ok(Value::BoundMethod(Rc::new(BoundMethod {
                receiver: other.clone(),
                target: MethodTarget::Builtin(name.to_string()),
            }))),
            other => Err(attribute_error(other.type_name(), name)),
        }
    }

    /// Wrap class-body callables as bound methods of the receiver.
    fn bind_if_method(&self, receiver: &Value, value: Value) -> Value {
        match &value {
            Value::Callable(callable) if callable.inside_class => {
                Value::BoundMethod(Rc::new(BoundMethod {
                    receiver: receiver.clone(),
                    target: MethodTarget::User(callable.clone()),
                }))
            }
            _ => value,
        }
    }

    /// Write an attribute on an object that supports it.
    pub fn set_attribute(&mut self, target: &Value, name: &str, value: Value) -> EvalResult<()> {
        match target {
            Value::Instance(_) | Value::Space(_) | Value::Module(_) | Value::Class(_) => {
                let ar = match target {
                    Value::Class(class) => class.ar.clone(),
                    _ => self.resolve_space(target)?,
                };
                self.stack.push(ar);
                let result = self.assign_in_top(name, None, value, None);
                self.stack.pop();
                result.map(|_| ())
            }
            other => Err(type_error(format!(
                "cannot set attribute '{name}' on '{}' object",
                other.type_name()
            ))),
        }
    }

    // Indexing and slicing

    fn eval_slicing(&mut self, base: &Value, indices: &[Expr]) -> EvalResult<Value> {
        if indices.len() == 1 && !matches!(indices[0].kind, ExprKind::Empty) {
            let index = self.eval_expr(&indices[0])?;
            return self.eval_index(base, &index);
        }

        // Slice form: evaluate up to three optional components.
        let mut parts: SmallVec<[Option<i64>; 3]> = SmallVec::new();
        for index in indices {
            if matches!(index.kind, ExprKind::Empty) {
                parts.push(None);
            } else {
                match self.eval_expr(index)? {
                    Value::Int(n) => parts.push(Some(n)),
                    Value::None => parts.push(None),
                    other => {
                        return Err(type_error(format!(
                            "slice indices must be integers or None, not '{}'",
                            other.type_name()
                        )))
                    }
                }
            }
        }
        while parts.len() < 3 {
            parts.push(None);
        }
        let step = parts[2].unwrap_or(1);
        if step == 0 {
            return Err(value_error("slice step cannot be zero"));
        }

        match base {
            Value::Str(text) => {
                let chars: Vec<char> = text.chars().collect();
                let picked = slice_indices(chars.len(), parts[0], parts[1], step);
                Ok(Value::string(
                    picked.into_iter().map(|i| chars[i]).collect::<String>(),
                ))
            }
            Value::Bytes(data) => {
                let picked = slice_indices(data.len(), parts[0], parts[1], step);
                Ok(Value::bytes(picked.into_iter().map(|i| data[i]).collect()))
            }
            Value::List(items) => {
                let items = items.borrow();
                let picked = slice_indices(items.len(), parts[0], parts[1], step);
                Ok(Value::list(
                    picked.into_iter().map(|i| items[i].clone()).collect(),
                ))
            }
            Value::Tuple(items) => {
                let picked = slice_indices(items.len(), parts[0], parts[1], step);
                Ok(Value::tuple(
                    picked.into_iter().map(|i| items[i].clone()).collect(),
                ))
            }
            other => Err(type_error(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }

    fn eval_index(&mut self, base: &Value, index: &Value) -> EvalResult<Value> {
        match base {
            Value::List(items) => {
                let items = items.borrow();
                let at = normalize_index(index, items.len(), "list")?;
                Ok(items[at].clone())
            }
            Value::Tuple(items) => {
                let at = normalize_index(index, items.len(), "tuple")?;
                Ok(items[at].clone())
            }
            Value::Str(text) => {
                let chars: Vec<char> = text.chars().collect();
                let at = normalize_index(index, chars.len(), "string")?;
                Ok(Value::string(chars[at].to_string()))
            }
            Value::Bytes(data) => {
                let at = normalize_index(index, data.len(), "bytes")?;
                Ok(Value::Int(i64::from(data[at])))
            }
            Value::Dict(entries) => {
                let key = HashKey::from_value(index)?;
                entries
                    .borrow()
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| key_error(&value_repr(index)))
            }
            Value::Range(range) => {
                let values = range.values();
                let at = normalize_index(index, values.len(), "range")?;
                Ok(values[at].clone())
            }
            other => Err(type_error(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }
}

fn push_kwarg(kwargs: &mut Vec<(String, Value)>, name: String, value: Value) -> EvalResult<()> {
    if kwargs.iter().any(|(existing, _)| existing == &name) {
        return Err(type_error(format!(
            "got multiple values for keyword argument '{name}'"
        )));
    }
    kwargs.push((name, value));
    Ok(())
}

/// Resolve a single index value against a sequence length.
pub(crate) fn normalize_index(index: &Value, len: usize, what: &str) -> EvalResult<usize> {
    let raw = match index {
        Value::Int(n) => *n,
        Value::Bool(b) => i64::from(*b),
        other => {
            return Err(type_error(format!(
                "{what} indices must be integers, not '{}'",
                other.type_name()
            )))
        }
    };
    let len = len as i64;
    let at = if raw < 0 { raw + len } else { raw };
    if at < 0 || at >= len {
        return Err(index_error(format!("{what} index out of range")));
    }
    Ok(at as usize)
}

/// Compute the element indices selected by a slice.
fn slice_indices(len: usize, start: Option<i64>, stop: Option<i64>, step: i64) -> Vec<usize> {
    let len = len as i64;
    let clamp = |raw: i64| -> i64 {
        let adjusted = if raw < 0 { raw + len } else { raw };
        adjusted.clamp(if step > 0 { 0 } else { -1 }, len)
    };

    let (default_start, default_stop) = if step > 0 { (0, len) } else { (len - 1, -1) };
    let start = start.map(clamp).unwrap_or(default_start);
    let stop = match stop {
        Some(raw) => {
            let adjusted = if raw < 0 { raw + len } else { raw };
            adjusted.clamp(-1, len)
        }
        None => default_stop,
    };

    let mut out = Vec::new();
    let mut current = start;
    if step > 0 {
        while current < stop {
            if (0..len).contains(&current) {
                out.push(current as usize);
            }
            current += step;
        }
    } else {
        while current > stop {
            if (0..len).contains(&current) {
                out.push(current as usize);
            }
            current += step;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::slice_indices;
    use pretty_assertions::assert_eq;

    #[test]
    fn forward_slices() {
        assert_eq!(slice_indices(5, Some(1), Some(3), 1), vec![1, 2]);
        assert_eq!(slice_indices(5, None, None, 1), vec![0, 1, 2, 3, 4]);
        assert_eq!(slice_indices(5, Some(-2), None, 1), vec![3, 4]);
        assert_eq!(slice_indices(5, None, None, 2), vec![0, 2, 4]);
        assert_eq!(slice_indices(3, Some(10), None, 1), Vec::<usize>::new());
    }

    #[test]
    fn backward_slices() {
        assert_eq!(slice_indices(5, None, None, -1), vec![4, 3, 2, 1, 0]);
        assert_eq!(slice_indices(5, Some(3), Some(0), -1), vec![3, 2, 1]);
    }
}
