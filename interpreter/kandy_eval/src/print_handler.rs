//! Print output routing.
//!
//! `print` writes through the evaluator's handler so embedders and tests can
//! capture output instead of spilling to stdout.

use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone)]
pub enum PrintHandler {
    Stdout,
    Collect(Rc<RefCell<String>>),
}

impl PrintHandler {
    /// A handler that buffers output, plus the shared buffer to read back.
    pub fn collector() -> (PrintHandler, Rc<RefCell<String>>) {
        let buffer = Rc::new(RefCell::new(String::new()));
        (PrintHandler::Collect(buffer.clone()), buffer)
    }

    pub fn write(&self, text: &str) {
        match self {
            PrintHandler::Stdout => print!("{text}"),
            PrintHandler::Collect(buffer) => buffer.borrow_mut().push_str(text),
        }
    }
}

impl Default for PrintHandler {
    fn default() -> Self {
        PrintHandler::Stdout
    }
}
