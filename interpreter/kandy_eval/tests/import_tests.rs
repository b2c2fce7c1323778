//! Module import protocol: search path, memoization, frozen globals, and
//! native `python import` modules.

#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
#![expect(clippy::expect_used, reason = "Tests use expect for clarity")]

use std::fs;
use std::path::PathBuf;

use pretty_assertions::assert_eq;

use kandy_eval::{value_repr, Evaluator, ExcClass};

/// A scratch directory that doubles as the module library path.
struct ModuleDir {
    root: PathBuf,
}

impl ModuleDir {
    fn new(label: &str) -> Self {
        let root = std::env::temp_dir().join(format!(
            "kandy-mod-{label}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).expect("create module dir");
        ModuleDir { root }
    }

    fn write(&self, name: &str, source: &str) {
        fs::write(self.root.join(name), source).expect("write module");
    }

    fn evaluator(&self) -> Evaluator {
        let mut ev = Evaluator::new();
        ev.library_dir = Some(self.root.clone());
        ev
    }
}

impl Drop for ModuleDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

#[test]
fn import_exposes_module_globals() {
    let dir = ModuleDir::new("basic");
    dir.write("m.ks", "x = 10\nexport");

    let mut ev = dir.evaluator();
    let result = ev.interpret("import m; m.x").unwrap();
    assert_eq!(value_repr(&result), "10");
}

#[test]
fn import_is_memoized_by_absolute_path() {
    let dir = ModuleDir::new("memo");
    dir.write("m.ks", "x = 1");

    let mut ev = dir.evaluator();
    let result = ev
        .interpret("import m; a = m; import m as m2; a is m2")
        .unwrap();
    assert_eq!(value_repr(&result), "True");
}

#[test]
fn module_functions_close_over_module_globals() {
    let dir = ModuleDir::new("funcs");
    dir.write("util.ks", "base = 100\ndef bump(n) => base + n");

    let mut ev = dir.evaluator();
    let result = ev.interpret("import util; util.bump(5)").unwrap();
    assert_eq!(value_repr(&result), "105");
}

#[test]
fn module_globals_are_frozen_after_load() {
    let dir = ModuleDir::new("frozen");
    dir.write("m.ks", "x = 1");

    let mut ev = dir.evaluator();
    let err = ev.interpret("import m; m.x = 2").unwrap_err();
    assert_eq!(err.class, ExcClass::Protect);
}

#[test]
fn import_alias_binds_the_alias_only() {
    let dir = ModuleDir::new("alias");
    dir.write("m.ks", "x = 3");

    let mut ev = dir.evaluator();
    let result = ev.interpret("import m as helper; helper.x").unwrap();
    assert_eq!(value_repr(&result), "3");

    let mut ev = dir.evaluator();
    let err = ev.interpret("import m as helper; m.x").unwrap_err();
    assert_eq!(err.class, ExcClass::NameError);
}

#[test]
fn modules_see_each_other_through_the_shared_cache() {
    let dir = ModuleDir::new("chain");
    dir.write("a.ks", "import b\nvalue = b.value + 1");
    dir.write("b.ks", "value = 41");

    let mut ev = dir.evaluator();
    let result = ev.interpret("import a; a.value").unwrap();
    assert_eq!(value_repr(&result), "42");
}

#[test]
fn cyclic_imports_observe_the_in_flight_globals() {
    let dir = ModuleDir::new("cycle");
    // `first` binds `early` before importing `second`, which reads it
    // through the partially populated in-flight view.
    dir.write("first.ks", "early = 7\nimport second\nlate = second.seen");
    dir.write("second.ks", "import first\nseen = first.early");

    let mut ev = dir.evaluator();
    let result = ev.interpret("import first; first.late").unwrap();
    assert_eq!(value_repr(&result), "7");
}

#[test]
fn missing_module_raises() {
    let dir = ModuleDir::new("missing");
    let mut ev = dir.evaluator();
    let err = ev.interpret("import nothing_here").unwrap_err();
    assert_eq!(err.class, ExcClass::ModuleNotFoundError);
}

#[test]
fn module_flags_mark_modules_as_non_main() {
    let dir = ModuleDir::new("flags");
    dir.write("m.ks", "main_flag = KANDY_MAIN\nkind = KANDY_TYPE");

    let mut ev = dir.evaluator();
    let result = ev
        .interpret("import m; (m.main_flag, m.kind, KANDY_MAIN)")
        .unwrap();
    assert_eq!(value_repr(&result), "(False, 'module', True)");
}

#[test]
fn python_import_native_modules() {
    let mut ev = Evaluator::new();
    let result = ev.interpret("python import math; math.sqrt(9)").unwrap();
    assert_eq!(value_repr(&result), "3.0");

    let mut ev = Evaluator::new();
    let result = ev.interpret("python import math; math.floor(2.7)").unwrap();
    assert_eq!(value_repr(&result), "2");

    let mut ev = Evaluator::new();
    let err = ev.interpret("python import no_such_host_module").unwrap_err();
    assert_eq!(err.class, ExcClass::ModuleNotFoundError);
}
