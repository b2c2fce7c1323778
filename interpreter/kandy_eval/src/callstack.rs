//! Activation records and the call stack.
//!
//! An activation record is an insertion-ordered map of name to [`Record`],
//! tagged with its kind and nesting level, and linked to its lexical parent.
//! The call stack is the dynamic chain; the top frame is the current binding
//! target.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::exception::{protect_error, EvalResult};
use crate::record::Record;

/// Shared handle to an activation record.
pub type ScopeRef = Rc<RefCell<ActivationRecord>>;

/// What a frame represents.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ArKind {
    BuiltIn,
    Module,
    User,
    Global,
    Private,
    Procedure,
    Function,
    Class,
    InternClass,
}

impl ArKind {
    pub fn name(self) -> &'static str {
        match self {
            ArKind::BuiltIn => "BuiltIn",
            ArKind::Module => "Module",
            ArKind::User => "User",
            ArKind::Global => "Global",
            ArKind::Private => "Private",
            ArKind::Procedure => "Procedure",
            ArKind::Function => "Function",
            ArKind::Class => "Class",
            ArKind::InternClass => "InternClass",
        }
    }
}

/// One frame of bindings.
pub struct ActivationRecord {
    pub name: String,
    pub kind: ArKind,
    pub nesting_level: usize,
    /// Static (lexical) parent.
    pub parent: Option<ScopeRef>,
    members: IndexMap<String, Record>,
    pub read_only: bool,
}

impl ActivationRecord {
    pub fn new(
        name: impl Into<String>,
        kind: ArKind,
        nesting_level: usize,
        parent: Option<ScopeRef>,
    ) -> ScopeRef {
        Rc::new(RefCell::new(ActivationRecord {
            name: name.into(),
            kind,
            nesting_level,
            parent,
            members: IndexMap::new(),
            read_only: false,
        }))
    }

    pub fn get_local(&self, name: &str) -> Option<Record> {
        self.members.get(name).cloned()
    }

    /// Write a record, honoring the read-only flag.
    pub fn set(&mut self, name: impl Into<String>, record: Record) -> EvalResult<()> {
        if self.read_only {
            return Err(protect_error());
        }
        self.members.insert(name.into(), record);
        Ok(())
    }

    /// Privileged write used when seeding frames and copying module user
    /// bindings.
    pub fn set_unchecked(&mut self, name: impl Into<String>, record: Record) {
        self.members.insert(name.into(), record);
    }

    pub fn names(&self) -> Vec<String> {
        self.members.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &Record)> {
        self.members.iter()
    }
}

impl fmt::Debug for ActivationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AR level {}: [{}] {} ({} members)",
            self.nesting_level,
            self.kind.name(),
            self.name,
            self.members.len()
        )
    }
}

/// Look `name` up in `ar` and, unless `local_only`, along the parent chain.
///
/// Private records are only visible in the frame the lookup starts from;
/// crossing to a parent forces `private_allowed` off, so private names are
/// not inherited.
pub fn lookup(ar: &ScopeRef, name: &str, local_only: bool, private_allowed: bool) -> Option<Record> {
    let mut current = ar.clone();
    let mut allowed = private_allowed;
    loop {
        let parent = {
            let frame = current.borrow();
            if let Some(record) = frame.members.get(name) {
                if !record.private || allowed {
                    return Some(record.clone());
                }
            }
            if local_only {
                return None;
            }
            frame.parent.clone()
        };
        match parent {
            Some(next) => {
                current = next;
                allowed = false;
            }
            None => return None,
        }
    }
}

/// LIFO of activation records: the dynamic invocation chain.
pub struct CallStack {
    records: Vec<ScopeRef>,
}

impl Default for CallStack {
    fn default() -> Self {
        CallStack::new()
    }
}

impl CallStack {
    pub fn new() -> Self {
        CallStack {
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, ar: ScopeRef) {
        self.records.push(ar);
    }

    pub fn pop(&mut self) -> Option<ScopeRef> {
        self.records.pop()
    }

    /// The current binding target.
    #[expect(
        clippy::expect_used,
        reason = "the stack is seeded with four frames before any evaluation and never drains below them"
    )]
    pub fn peek(&self) -> ScopeRef {
        self.records
            .last()
            .expect("call stack is never empty after seeding")
            .clone()
    }

    /// The frame below the top; the bottom frame when only one exists.
    pub fn peek_prev(&self) -> ScopeRef {
        if self.records.len() >= 2 {
            self.records[self.records.len() - 2].clone()
        } else {
            self.peek()
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn lookup_walks_the_parent_chain() {
        let root = ActivationRecord::new("root", ArKind::BuiltIn, 0, None);
        root.borrow_mut()
            .set_unchecked("x", Record::dynamic(Value::Int(1)));
        let child = ActivationRecord::new("child", ArKind::Function, 1, Some(root));

        let found = lookup(&child, "x", false, true).unwrap();
        assert!(matches!(found.value, Value::Int(1)));
        assert!(lookup(&child, "x", true, true).is_none());
    }

    #[test]
    fn private_records_stay_in_their_frame() {
        let root = ActivationRecord::new("root", ArKind::Global, 0, None);
        let mut secret = Record::dynamic(Value::Int(7));
        secret.private = true;
        root.borrow_mut().set_unchecked("token", secret);
        let child = ActivationRecord::new("child", ArKind::Function, 1, Some(root.clone()));

        // Visible locally, invisible across the frame boundary.
        assert!(lookup(&root, "token", false, true).is_some());
        assert!(lookup(&child, "token", false, true).is_none());
    }

    #[test]
    fn read_only_frames_reject_writes() {
        let frame = ActivationRecord::new("frozen", ArKind::Module, 0, None);
        frame.borrow_mut().read_only = true;
        let err = frame
            .borrow_mut()
            .set("x", Record::dynamic(Value::None))
            .unwrap_err();
        assert_eq!(err.class, crate::exception::ExcClass::Protect);
    }

    #[test]
    fn peek_prev_clamps_to_bottom() {
        let mut stack = CallStack::new();
        let a = ActivationRecord::new("a", ArKind::Global, 0, None);
        stack.push(a.clone());
        assert!(Rc::ptr_eq(&stack.peek_prev(), &a));
    }
}
