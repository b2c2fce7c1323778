//! User classes, instances, bound methods, and file handles.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::rc::Rc;

use crate::callable::Callable;
use crate::callstack::ScopeRef;
use crate::exception::{io_error, value_error, EvalResult};
use crate::value::Value;

/// A class descriptor: the frozen body frame plus resolved bases.
pub struct ClassObject {
    pub name: String,
    /// The class body's activation record, lexical parent of instances.
    pub ar: ScopeRef,
    pub bases: Vec<Rc<ClassObject>>,
}

impl ClassObject {
    pub fn is_subclass_of(&self, other: &Rc<ClassObject>) -> bool {
        if std::ptr::eq(self, Rc::as_ptr(other)) {
            return true;
        }
        self.bases.iter().any(|base| {
            Rc::ptr_eq(base, other) || base.is_subclass_of(other)
        })
    }

    /// Find a name in this class body or any base class body.
    pub fn find_member(&self, name: &str) -> Option<crate::record::Record> {
        if let Some(record) = self.ar.borrow().get_local(name) {
            return Some(record);
        }
        self.bases.iter().find_map(|base| base.find_member(name))
    }
}

/// An instance: a per-instance frame whose lexical parent is the class body.
pub struct InstanceObject {
    pub class: Rc<ClassObject>,
    pub ar: ScopeRef,
}

/// A method picked off a receiver, waiting to be called.
pub struct BoundMethod {
    pub receiver: Value,
    pub target: MethodTarget,
}

pub enum MethodTarget {
    /// Dispatched through the built-in method table by name.
    Builtin(String),
    /// A user callable declared in a class body; the receiver becomes the
    /// first argument.
    User(Rc<Callable>),
}

impl BoundMethod {
    pub fn repr(&self) -> String {
        match &self.target {
            MethodTarget::Builtin(name) => format!(
                "<built-in method {} of {} object>",
                name,
                self.receiver.type_name()
            ),
            MethodTarget::User(callable) => format!("<bound method {}>", callable.name),
        }
    }
}

/// Open-file state for `open(...)` values.
pub struct FileObject {
    pub path: String,
    pub mode: String,
    handle: Option<FileHandle>,
}

enum FileHandle {
    Read(BufReader<File>),
    Write(File),
}

impl FileObject {
    pub fn open(path: &str, mode: &str) -> EvalResult<FileObject> {
        let handle = match mode {
            "r" => FileHandle::Read(BufReader::new(
                File::open(path).map_err(|err| io_error(format!("{path}: {err}")))?,
            )),
            "w" => FileHandle::Write(
                File::create(path).map_err(|err| io_error(format!("{path}: {err}")))?,
            ),
            "a" => FileHandle::Write(
                std::fs::OpenOptions::new()
                    .append(true)
                    .create(true)
                    .open(path)
                    .map_err(|err| io_error(format!("{path}: {err}")))?,
            ),
            other => return Err(value_error(format!("invalid mode: '{other}'"))),
        };
        Ok(FileObject {
            path: path.to_string(),
            mode: mode.to_string(),
            handle: Some(handle),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    pub fn read_all(&mut self) -> EvalResult<String> {
        match self.handle.as_mut() {
            Some(FileHandle::Read(reader)) => {
                let mut text = String::new();
                reader
                    .read_to_string(&mut text)
                    .map_err(|err| io_error(err.to_string()))?;
                Ok(text)
            }
            Some(FileHandle::Write(_)) => Err(io_error("file not open for reading")),
            None => Err(value_error("I/O operation on closed file.")),
        }
    }

    pub fn read_lines(&mut self) -> EvalResult<Vec<String>> {
        match self.handle.as_mut() {
            Some(FileHandle::Read(reader)) => {
                let mut lines = Vec::new();
                loop {
                    let mut line = String::new();
                    let n = reader
                        .read_line(&mut line)
                        .map_err(|err| io_error(err.to_string()))?;
                    if n == 0 {
                        break;
                    }
                    lines.push(line);
                }
                Ok(lines)
            }
            Some(FileHandle::Write(_)) => Err(io_error("file not open for reading")),
            None => Err(value_error("I/O operation on closed file.")),
        }
    }

    pub fn write_text(&mut self, text: &str) -> EvalResult<i64> {
        match self.handle.as_mut() {
            Some(FileHandle::Write(file)) => {
                file.write_all(text.as_bytes())
                    .map_err(|err| io_error(err.to_string()))?;
                Ok(text.len() as i64)
            }
            Some(FileHandle::Read(_)) => Err(io_error("file not open for writing")),
            None => Err(value_error("I/O operation on closed file.")),
        }
    }

    pub fn close(&mut self) {
        self.handle = None;
    }

    pub fn repr(&self) -> String {
        if self.is_closed() {
            format!("<closed file '{}'>", self.path)
        } else {
            format!("<file '{}', mode '{}'>", self.path, self.mode)
        }
    }
}
