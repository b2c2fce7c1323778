//! Reflective scope handles.
//!
//! A space exposes an activation record as a first-class value. `Now` and
//! `Prev` resolve lazily against the call stack; `Private` is gated by the
//! owning evaluator's identity.

use std::path::PathBuf;

use crate::callstack::ScopeRef;

/// How a space finds its activation record.
pub enum SpaceKind {
    /// A fixed frame: `Global`, `User`, `BuiltIn`, exported spaces.
    Fixed(ScopeRef),
    /// The live top frame.
    Current,
    /// The frame below the top.
    Prev,
    /// The evaluator's private frame, opened only by its owner.
    Private { owner: u64 },
}

pub struct SpaceObject {
    pub name: String,
    pub kind: SpaceKind,
}

impl SpaceObject {
    pub fn fixed(name: impl Into<String>, ar: ScopeRef) -> Self {
        SpaceObject {
            name: name.into(),
            kind: SpaceKind::Fixed(ar),
        }
    }

    pub fn repr(&self) -> String {
        match &self.kind {
            SpaceKind::Fixed(ar) => {
                let ar = ar.borrow();
                format!(
                    "Space(<Name: '{}', Space: {}, Values: {}>)",
                    self.name,
                    ar.name,
                    ar.len()
                )
            }
            _ => format!("Space(<Name: '{}'>)", self.name),
        }
    }
}

/// An imported module: the frozen Global frame of a sibling evaluator.
pub struct ModuleObject {
    pub name: String,
    pub filename: PathBuf,
    pub globals: ScopeRef,
}

impl ModuleObject {
    pub fn repr(&self) -> String {
        format!(
            "Module(<Name: '{}', File: {}>)",
            self.name,
            self.filename.display()
        )
    }
}
