//! String-literal rendering and interpolation.
//!
//! A literal carries raw slot sources captured by the lexer. Each slot is
//! parsed once and memoized on the node; evaluation substitutes the slot's
//! rendered value into the `{exprN}` placeholder, applying any trailing
//! format spec and the `=` debug-print prefix.

use std::rc::Rc;

use kandy_ir::{FormatSpec, InterpSlot, StringLit};

use crate::exception::{interpreter_error, EvalResult};
use crate::interpreter::Evaluator;
use crate::value::{value_str, Value};

impl Evaluator {
    /// Render a string literal, evaluating interpolation slots in the
    /// current frame.
    pub(crate) fn render_string(&mut self, lit: &StringLit) -> EvalResult<String> {
        if lit.exprs.is_empty() {
            return Ok(lit.content.clone());
        }

        let slots = parsed_slots(lit)?;
        let mut content = lit.content.clone();
        for slot in slots.iter() {
            let value = self.eval_expr(&slot.expr)?;
            let rendered = render_slot(slot, &value)?;
            let placeholder = format!("{{{}}}", slot.name);
            content = content.replacen(&placeholder, &rendered, 1);
        }
        Ok(content)
    }
}

/// Parse the literal's slot sources, caching the result on the node.
fn parsed_slots(lit: &StringLit) -> EvalResult<Rc<Vec<InterpSlot>>> {
    if let Some(slots) = lit.slots.borrow().as_ref() {
        return Ok(slots.clone());
    }

    let mut slots = Vec::with_capacity(lit.exprs.len());
    for (name, source) in &lit.exprs {
        let parsed = kandy_parse::parse_interpolation(source)?;

        // A trailing `=` selects the debug-print form: the source text is
        // echoed before the value. A `:`-prefixed remainder is a format spec.
        let (label, spec_text) = match parsed.rest.strip_suffix('=') {
            Some(stripped) => (Some(format!("{}=", parsed.consumed)), stripped),
            None => (None, parsed.rest.as_str()),
        };
        let spec = match spec_text.strip_prefix(':') {
            Some(spec) => Some(spec.to_string()),
            None if spec_text.is_empty() => None,
            None => {
                return Err(interpreter_error(format!(
                    "invalid interpolation '{source}': unexpected trailing '{spec_text}'"
                )))
            }
        };

        slots.push(InterpSlot {
            name: name.clone(),
            expr: parsed.expr,
            label,
            spec,
        });
    }

    let slots = Rc::new(slots);
    *lit.slots.borrow_mut() = Some(slots.clone());
    Ok(slots)
}

fn render_slot(slot: &InterpSlot, value: &Value) -> EvalResult<String> {
    let body = match &slot.spec {
        None => value_str(value),
        Some(spec_text) => {
            let spec = FormatSpec::parse(spec_text)
                .map_err(|message| interpreter_error(format!("bad format spec: {message}")))?;
            match value {
                Value::Int(n) => spec.format_int(*n),
                Value::Bool(b) => spec.format_int(i64::from(*b)),
                Value::Float(x) => spec.format_float(*x),
                other => spec.format_str(&value_str(other)),
            }
        }
    };
    match &slot.label {
        Some(label) => Ok(format!("{label}{body}")),
        None => Ok(body),
    }
}
