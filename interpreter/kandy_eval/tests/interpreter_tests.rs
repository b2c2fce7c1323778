//! End-to-end programs driven through `Evaluator::interpret`.

#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
#![expect(clippy::expect_used, reason = "Tests use expect for clarity")]

use pretty_assertions::assert_eq;

use kandy_eval::{value_eq, value_repr, Evaluator, ExcClass, PrintHandler, Value};

fn eval(source: &str) -> Value {
    Evaluator::new()
        .interpret(source)
        .unwrap_or_else(|err| panic!("program failed: {err}\nsource: {source}"))
}

fn eval_err(source: &str) -> kandy_eval::KandyError {
    Evaluator::new()
        .interpret(source)
        .expect_err("program unexpectedly succeeded")
}

fn eval_with_output(source: &str) -> (Value, String) {
    let (handler, buffer) = PrintHandler::collector();
    let mut ev = Evaluator::with_print_handler(handler);
    let value = ev
        .interpret(source)
        .unwrap_or_else(|err| panic!("program failed: {err}"));
    let output = buffer.borrow().clone();
    (value, output)
}

fn repr(source: &str) -> String {
    value_repr(&eval(source))
}

fn as_f64(value: &Value) -> f64 {
    match value {
        Value::Int(n) => *n as f64,
        Value::Float(x) => *x,
        other => panic!("expected number, got {}", value_repr(other)),
    }
}

// Arithmetic and operators

#[test]
fn arithmetic_expression() {
    let result = eval("7 + 3 * (10 / (12 / (3 + 1) - 1)) / (2 + 3) - 5 - 3 + 8.2 + 10.2 ** 2");
    assert!((as_f64(&result) - 114.24).abs() < 1e-9);
}

#[test]
fn submod_identity() {
    assert_eq!(repr("10 %% 4"), repr("4 - (10 % 4)"));
    assert_eq!(repr("10 %% 4"), "2");
    assert_eq!(repr("7 %% 3"), "2");
}

#[test]
fn division_and_floor_division() {
    assert_eq!(repr("7 / 2"), "3.5");
    assert_eq!(repr("7 // 2"), "3");
    assert_eq!(repr("2 ** 10"), "1024");
}

#[test]
fn boolean_operators_yield_operands() {
    assert_eq!(repr("0 or \"x\""), "'x'");
    assert_eq!(repr("1 and 2"), "2");
    assert_eq!(repr("False and 2"), "False");
    assert_eq!(repr("1 xor 0"), "True");
    assert_eq!(repr("1 xor 2"), "False");
}

#[test]
fn comparisons_and_membership() {
    assert_eq!(repr("1 < 2"), "True");
    assert_eq!(repr("2 in [1, 2, 3]"), "True");
    assert_eq!(repr("5 not in [1, 2, 3]"), "True");
    assert_eq!(repr("None is None"), "True");
    assert_eq!(repr("1 is not 2"), "True");
    assert_eq!(repr("\"el\" in \"hello\""), "True");
}

#[test]
fn matmul_is_parsed_but_unsupported() {
    let err = eval_err("1 @ 2");
    assert_eq!(err.class, ExcClass::TypeError);
}

#[test]
fn zero_division_raises() {
    assert_eq!(eval_err("1 / 0").class, ExcClass::ZeroDivisionError);
}

// Assignment and records

#[test]
fn assignment_and_augmented_assignment() {
    assert_eq!(repr("x = 5; x += 3; x"), "8");
    assert_eq!(repr("x = 2; x **= 3; x"), "8");
    assert_eq!(repr("d = ${\"k\": 1}; d[\"k\"] += 4; d[\"k\"]"), "5");
    assert_eq!(repr("l = [1, 2]; l[0] = 9; l"), "[9, 2]");
}

#[test]
fn augmented_assignment_requires_existing_binding() {
    assert_eq!(eval_err("missing += 1").class, ExcClass::NameError);
}

#[test]
fn constant_rejects_reassignment_and_keeps_value() {
    let mut ev = Evaluator::new();
    ev.repl_step("const PI = 3.14").unwrap();
    let err = ev.repl_step("PI = 4").unwrap_err();
    assert_eq!(err.message, "Can't reassign a value to 'Constant'.");
    let preserved = ev.repl_step("PI").unwrap();
    assert!(value_eq(&preserved, &Value::Float(3.14)));
}

#[test]
fn typed_records_coerce_by_construction() {
    assert_eq!(repr("int x = \"42\"; x"), "42");
    assert_eq!(repr("int x = 1; x = \"7\"; x"), "7");
    assert_eq!(repr("str s = 5; s"), "'5'");
}

#[test]
fn strict_records_skip_coercion() {
    let err = eval_err("strict int x = \"42\"");
    assert_eq!(err.class, ExcClass::TypeError);
    assert!(err.message.contains("strict mode is enabled"));
}

#[test]
fn var_locks_to_first_value_type() {
    assert_eq!(repr("var v = 5; v = \"8\"; v"), "8");
    let err = eval_err("strict var v = 5; v = \"8\"");
    assert_eq!(err.class, ExcClass::TypeError);
}

#[test]
fn multiple_union_types() {
    assert_eq!(repr("multiple(int, str) z = 5; z = \"ok\"; z"), "'ok'");
    assert_eq!(repr("numeric n = 5; n = 2.5; n"), "2.5");
}

#[test]
fn none_satisfies_any_constraint() {
    assert_eq!(repr("strict int x = 5; x = None; x"), "None");
}

#[test]
fn undefined_sentinel_rules() {
    assert_eq!(repr("var x; x"), "Undefined");
    let err = eval_err("x = 1; x = Undefined");
    assert!(err.message.contains("Undefined"));
}

#[test]
fn question_assign_skips_falsy() {
    assert_eq!(repr("x ?= 5; x"), "5");
    assert_eq!(eval_err("z ?= 0; z").class, ExcClass::NameError);
}

#[test]
fn expression_assignment_yields_value() {
    assert_eq!(repr("y = (x := 5) + 1; x + y"), "11");
}

#[test]
fn type_annotation_cannot_be_reassigned() {
    let err = eval_err("int x = 1; float x = 2.0");
    assert!(err.message.contains("variable-type"));
}

// Conditional forms

#[test]
fn conditional_expressions() {
    assert_eq!(repr("1 if True else 2"), "1");
    assert_eq!(repr("1 unless True else 2"), "2");
    assert_eq!(repr("True ? \"y\" : \"n\""), "'y'");
    assert_eq!(repr("None ?? 7"), "7");
    assert_eq!(repr("0 ?? 7"), "0");
}

#[test]
fn if_elif_else_statement() {
    let source = "x = 7
        if x > 10 { r = \"big\" }
        elif x > 5 { r = \"mid\" }
        else { r = \"small\" }
        r";
    assert_eq!(repr(source), "'mid'");
}

#[test]
fn unless_statement() {
    assert_eq!(repr("unless False { r = 1 } else { r = 2 }; r"), "1");
}

// Loops

#[test]
fn for_from_to_is_inclusive() {
    assert_eq!(repr("s = 0; for i from 1 to 5 { s += i }; s"), "15");
    assert_eq!(repr("out = []; for i from 3 to 1 { out.append(i) }; out"), "[3, 2, 1]");
}

#[test]
fn while_until_and_do_loops() {
    assert_eq!(repr("n = 0; while n < 3 { n += 1 }; n"), "3");
    assert_eq!(repr("n = 0; until n >= 3 { n += 1 }; n"), "3");
    assert_eq!(repr("n = 0; do { n += 1 } while n < 3; n"), "3");
    assert_eq!(repr("n = 10; do { n += 1 } while n < 3; n"), "11");
    assert_eq!(repr("s = 0; repeat 4 { s += 2 }; s"), "8");
}

#[test]
fn for_c_loop() {
    assert_eq!(repr("s = 0; for (i = 0; i < 5; i += 1) { s += i }; s"), "10");
}

#[test]
fn for_in_iterates_values() {
    assert_eq!(repr("s = 0; for x in [1, 2, 3] { s += x }; s"), "6");
    assert_eq!(repr("out = []; for c in \"abc\" { out.append(c) }; out"), "['a', 'b', 'c']");
    assert_eq!(repr("s = 0; for k in ${\"a\": 1, \"b\": 2} { s += 1 }; s"), "2");
}

#[test]
fn for_in_unpacks_pairs() {
    let source = "keys = []
        for k, v in [(\"a\", 1), (\"b\", 2)] { keys.append(k) }
        keys";
    assert_eq!(repr(source), "['a', 'b']");
}

#[test]
fn unpacking_cardinality_is_exact() {
    let err = eval_err("for a, b in [[1, 2, 3]] { pass }");
    assert_eq!(err.class, ExcClass::ValueError);
    assert!(err.message.contains("too many values"));

    let err = eval_err("for a, b in [[1]] { pass }");
    assert_eq!(err.class, ExcClass::ValueError);
}

#[test]
fn take_chunks_with_final_short_chunk() {
    assert_eq!(
        repr("out = []; for chunk in [1, 2, 3, 4, 5] take 2 { out.append(chunk) }; out"),
        "[(1, 2), (3, 4), (5,)]"
    );
}

#[test]
fn take_transposes_for_multiple_targets() {
    let source = "firsts = []
        for a, b in [[1, 10], [2, 20], [3, 30], [4, 40]] take 2 { firsts.append(a) }
        firsts";
    assert_eq!(repr(source), "[(1, 2), (3, 4)]");
}

#[test]
fn loop_else_runs_only_without_break() {
    assert_eq!(
        repr("r = 0; for i from 1 to 3 { pass } else { r = 1 }; r"),
        "1"
    );
    assert_eq!(
        repr("r = 0; for i from 1 to 3 { break } else { r = 1 }; r"),
        "0"
    );
    assert_eq!(repr("r = 0; while False { } else { r = 1 }; r"), "1");
}

#[test]
fn break_and_continue() {
    assert_eq!(
        repr("s = 0; for i from 1 to 10 { if i > 3 { break }; s += i }; s"),
        "6"
    );
    assert_eq!(
        repr("s = 0; for i from 1 to 5 { if i % 2 == 0 { continue }; s += i }; s"),
        "9"
    );
}

#[test]
fn targeted_break_unwinds_to_the_named_loop() {
    let source = "hits = 0
        for i from 1 to 3 as outer {
            for j from 1 to 3 {
                hits += 1
                break outer
            }
        }
        hits";
    assert_eq!(repr(source), "1");
}

#[test]
fn loop_control_handle_queries() {
    let source = "n = 0
        while n < 3 as c { n += 1 }
        (c.get_count(), c.get_count_finished(), c.is_running())";
    assert_eq!(repr(source), "(3, 3, False)");
}

#[test]
fn loop_control_ignore_counters() {
    let source = "s = 0
        repeat 5 as c {
            if c.get_count() == 1 { c.ignore_next_iterations(2) }
            s += c.get_count()
        }
        (s, c.get_ignored())";
    assert_eq!(repr(source), "(10, 2)");
}

// Switch / when

#[test]
fn switch_selects_first_matching_arm() {
    let source = "x = 2
        switch x {
            case 1: r = \"one\" break
            case 2: r = \"two\" break
            default: r = \"other\"
        }
        r";
    assert_eq!(repr(source), "'two'");
}

#[test]
fn switch_fused_case_labels_share_a_body() {
    let source = "r = \"\"
        switch 2 {
            case 1: case 2: r = \"low\" break
            case 3: r = \"high\" break
        }
        r";
    assert_eq!(repr(source), "'low'");
}

#[test]
fn switch_default_only_without_match() {
    let source = "switch 9 {
            case 1: r = 1 break
            default: r = 42
        }
        r";
    assert_eq!(repr(source), "42");
}

#[test]
fn when_is_an_expression() {
    let source = "x = 3
        when x {
            case 1: \"one\"
            case 2: case 3: \"few\"
            default: \"many\"
        }";
    assert_eq!(repr(source), "'few'");
}

// Functions, procedures, lambdas

#[test]
fn function_declaration_and_calls() {
    assert_eq!(repr("def add(a, b) => a + b; add(1, 2)"), "3");
    assert_eq!(repr("def add(a, b) => a + b; add(b=10, a=5)"), "15");
}

#[test]
fn too_many_positional_arguments() {
    let err = eval_err("def add(a, b) => a + b; add(1, 2, 3)");
    assert_eq!(
        err.message,
        "add() takes 2 positional arguments but 3 were given"
    );
}

#[test]
fn missing_argument() {
    let err = eval_err("def add(a, b) => a + b; add(1)");
    assert!(err.message.contains("missing 1 required positional argument"));
}

#[test]
fn unexpected_keyword_argument() {
    let err = eval_err("def add(a, b) => a + b; add(1, c=2)");
    assert!(err.message.contains("unexpected keyword argument 'c'"));
}

#[test]
fn duplicate_argument_value() {
    let err = eval_err("def add(a, b) => a + b; add(1, 2, a=3)");
    assert!(err.message.contains("multiple values"));
}

#[test]
fn parameter_defaults() {
    assert_eq!(repr("def f(a, b = 10) => a + b; f(1)"), "11");
    assert_eq!(repr("def f(a, b = 10) => a + b; f(1, 2)"), "3");
}

#[test]
fn rest_parameters() {
    assert_eq!(repr("def f(a, *rest) => rest; f(1, 2, 3)"), "(2, 3)");
    assert_eq!(repr("def f(**kw) => kw[\"x\"]; f(x=9)"), "9");
    assert_eq!(repr("def f(*rest) => rest; f()"), "()");
}

#[test]
fn splat_arguments() {
    assert_eq!(repr("def add(a, b, c) => a + b + c; add(*[1, 2, 3])"), "6");
    assert_eq!(
        repr("def add(a, b) => a + b; add(**${\"a\": 1, \"b\": 2})"),
        "3"
    );
}

#[test]
fn procedures_have_no_result_channel() {
    assert_eq!(repr("proc p(a) { a + 1 }; r = p(5); r"), "None");
    let err = eval_err("proc p() { return 5 }; p()");
    assert!(err.message.contains("return"));
}

#[test]
fn lambdas_and_higher_order_use() {
    assert_eq!(repr("f = lambda (x) => x * 2; f(4)"), "8");
    assert_eq!(repr("map(lambda (x) => x + 1, [1, 2, 3])"), "[2, 3, 4]");
    assert_eq!(repr("filter(lambda (x) => x % 2, [1, 2, 3, 4])"), "[1, 3]");
}

#[test]
fn closures_capture_their_declaration_frame() {
    let source = "def outer() {
            b = 10
            def inner() => b
            return inner
        }
        g = outer()
        g()";
    assert_eq!(repr(source), "10");
}

#[test]
fn scope_isolation_for_functions() {
    let err = eval_err("def f() { hidden = 1 }; f(); hidden");
    assert_eq!(err.class, ExcClass::NameError);
}

#[test]
fn local_callables_reuse_the_caller_frame() {
    assert_eq!(repr("local def g() { shared = 7 }; g(); shared"), "7");
}

#[test]
fn function_return_type_validates_and_coerces() {
    assert_eq!(repr("def int f() => \"42\"; f()"), "42");
    let err = eval_err("def strict int f() => \"42\"; f()");
    assert_eq!(err.class, ExcClass::TypeError);
}

#[test]
fn stray_break_is_an_error() {
    let err = eval_err("def f() { break }; f()");
    assert!(err.message.contains("break"));
}

// Strings, interpolation, collections

#[test]
fn string_interpolation_forms() {
    assert_eq!(repr("name = \"World\"; \"Hello $name!\""), "'Hello World!'");
    assert_eq!(repr("x = 5; \"{x + 1}\""), "'6'");
    assert_eq!(repr("x = 5; \"{x=}\""), "'x=5'");
    assert_eq!(repr("\"{3.14159:.2f}\""), "'3.14'");
    assert_eq!(repr("v = 7; \"{v:>4}\""), "'   7'");
    assert_eq!(repr("r\"no {slots} here\""), "'no {slots} here'");
}

#[test]
fn interpolated_bytes() {
    assert_eq!(repr("n = 1; b\"v$n\""), "b'v1'");
}

#[test]
fn dict_literal_and_indexing() {
    assert_eq!(repr("x = ${\"a\": 1, \"b\": 2}; x[\"b\"]"), "2");
    assert_eq!(repr("${1, 2, 3} | ${3, 4}"), "{1, 2, 3, 4}");
    let err = eval_err("x = ${}; x[\"missing\"]");
    assert_eq!(err.class, ExcClass::KeyError);
}

#[test]
fn slicing_and_negative_indices() {
    assert_eq!(repr("\"hello\"[0]"), "'h'");
    assert_eq!(repr("\"hello\"[-1]"), "'o'");
    assert_eq!(repr("\"hello\"[1:3]"), "'el'");
    assert_eq!(repr("\"hello\"[::-1]"), "'olleh'");
    assert_eq!(repr("[1, 2, 3, 4][1:]"), "[2, 3, 4]");
    assert_eq!(repr("[1, 2, 3, 4][:2]"), "[1, 2]");
    let err = eval_err("[1, 2][5]");
    assert_eq!(err.class, ExcClass::IndexError);
}

#[test]
fn builtin_methods() {
    assert_eq!(repr("\"hello\".upper()"), "'HELLO'");
    assert_eq!(repr("\"a,b,c\".split(\",\")"), "['a', 'b', 'c']");
    assert_eq!(repr("\"-\".join([\"a\", \"b\"])"), "'a-b'");
    assert_eq!(repr("l = [3, 1, 2]; l.sort(); l"), "[1, 2, 3]");
    assert_eq!(repr("l = [1]; l.append(2); l.pop(0); l"), "[2]");
    assert_eq!(repr("${\"a\": 1}.get(\"b\", 99)"), "99");
    assert_eq!(repr("(1, 2, 2, 3).count(2)"), "2");
}

#[test]
fn enrichment_methods() {
    assert_eq!(repr("(4).is_even()"), "True");
    assert_eq!(repr("(7).is_odd()"), "True");
    assert_eq!(repr("(50).get_percent_of(200)"), "25.0");
    assert_eq!(repr("(150).limit_range(0, 100)"), "100");
    assert_eq!(repr("(2.5).integer_part()"), "2");
    assert_eq!(repr("\"abc\".reverse()"), "'cba'");
    assert_eq!(repr("(5).between(1, 10)"), "True");
}

#[test]
fn builtin_functions() {
    assert_eq!(repr("len(\"abc\")"), "3");
    assert_eq!(repr("sum([1, 2, 3])"), "6");
    assert_eq!(repr("list(range(3))"), "[0, 1, 2]");
    assert_eq!(repr("max(3, 1, 2)"), "3");
    assert_eq!(repr("min([3, 1, 2])"), "1");
    assert_eq!(repr("abs(-4)"), "4");
    assert_eq!(repr("sorted([3, 1, 2])"), "[1, 2, 3]");
    assert_eq!(repr("sorted([1, 2, 3], reverse=True)"), "[3, 2, 1]");
    assert_eq!(repr("enumerate([\"a\", \"b\"])"), "[(0, 'a'), (1, 'b')]");
    assert_eq!(repr("zip([1, 2], [\"a\", \"b\"])"), "[(1, 'a'), (2, 'b')]");
    assert_eq!(repr("divmod(7, 2)"), "(3, 1)");
    assert_eq!(repr("repr(\"x\")"), "\"'x'\"");
    assert_eq!(repr("isinstance(5, int)"), "True");
    assert_eq!(repr("isinstance(5, Text)"), "False");
    assert_eq!(repr("isinstance(5.0, numeric)"), "True");
    assert_eq!(repr("it = iter([1, 2]); next(it); next(it)"), "2");
    assert_eq!(repr("next(iter([]), \"done\")"), "'done'");
}

#[test]
fn print_goes_through_the_handler() {
    let (_, output) = eval_with_output("print(\"a\", 1, sep=\"-\")");
    assert_eq!(output, "a-1\n");
    let (_, output) = eval_with_output("print(\"x\", end=\"\")");
    assert_eq!(output, "x");
}

// Exceptions

#[test]
fn try_except_finally_scenario() {
    let (value, output) = eval_with_output(
        "try { 1 / 0 } except Errors.ZeroDivisionError as e { \"caught\" } finally { print(\"done\") }",
    );
    assert_eq!(value_repr(&value), "'caught'");
    assert_eq!(output, "done\n");
}

#[test]
fn try_else_runs_only_without_exception() {
    let (_, output) = eval_with_output(
        "try { print(\"t\") } except Errors.ValueError { print(\"h\") } else { print(\"e\") } finally { print(\"f\") }",
    );
    assert_eq!(output, "t\ne\nf\n");

    let (_, output) = eval_with_output(
        "try { 1 / 0 } except Errors.ZeroDivisionError { print(\"h\") } else { print(\"e\") } finally { print(\"f\") }",
    );
    assert_eq!(output, "h\nf\n");
}

#[test]
fn unmatched_exceptions_propagate_after_finally() {
    let (handler, buffer) = PrintHandler::collector();
    let mut ev = Evaluator::with_print_handler(handler);
    let err = ev
        .interpret("try { 1 / 0 } except Errors.ValueError { print(\"h\") } finally { print(\"f\") }")
        .unwrap_err();
    assert_eq!(err.class, ExcClass::ZeroDivisionError);
    assert_eq!(buffer.borrow().as_str(), "f\n");
}

#[test]
fn exception_binding_exposes_message_and_name() {
    let source = "try { 1 / 0 } except Errors.Exception as e { e.name }";
    assert_eq!(repr(source), "'ZeroDivisionError'");
}

#[test]
fn exception_hierarchy_matching() {
    // ZeroDivisionError is an Exception, so the broad handler catches it.
    assert_eq!(
        repr("try { 1 / 0 } except Errors.Exception { \"caught\" }"),
        "'caught'"
    );
}

// Classes

#[test]
fn class_with_init_and_methods() {
    let source = "class Counter() {
            def __init__(self, start) { self.value = start }
            def bump(self) { self.value = self.value + 1; return self.value }
        }
        c = Counter(5)
        c.bump()
        c.bump()";
    assert_eq!(repr(source), "7");
}

#[test]
fn method_self_is_inserted_at_declaration() {
    let source = "class A() {
            def answer() => 42
        }
        a = A()
        a.answer()";
    assert_eq!(repr(source), "42");
}

#[test]
fn instance_attributes_fall_back_to_class_body() {
    let source = "class Config() {
            retries = 3
        }
        c = Config()
        before = c.retries
        c.retries = 5
        (before, c.retries)";
    assert_eq!(repr(source), "(3, 5)");
}

#[test]
fn inheritance_finds_base_methods() {
    let source = "class Animal() {
            def noise(self) => \"...\"
        }
        class Dog(Animal) {
            def name(self) => \"dog\"
        }
        d = Dog()
        (d.noise(), d.name())";
    assert_eq!(repr(source), "('...', 'dog')");
}

#[test]
fn isinstance_with_user_classes() {
    let source = "class Animal() { }
        class Dog(Animal) { }
        d = Dog()
        (isinstance(d, Dog), isinstance(d, Animal), isinstance(5, Dog))";
    assert_eq!(repr(source), "(True, True, False)");
}

// Spaces, using, export

#[test]
fn current_space_reflects_the_top_frame() {
    assert_eq!(repr("x = 1; Now.x"), "1");
}

#[test]
fn using_redirects_writes_to_the_space() {
    let source = "using Global { y = 5 }
        y";
    assert_eq!(repr(source), "5");
}

#[test]
fn private_space_persists_and_stays_hidden() {
    let source = "using Private { secret = 9 }
        found = 0
        try { secret } except Errors.NameError { found = 1 }
        found";
    assert_eq!(repr(source), "1");
    assert_eq!(
        repr("using Private { secret = 9 }; Private.secret"),
        "9"
    );
}

#[test]
fn builtin_space_is_read_only() {
    let err = eval_err("using BuiltIn { brand_new = 5 }");
    assert_eq!(err.class, ExcClass::Protect);
}

#[test]
fn export_returns_a_space_view() {
    let source = "def make() {
            a = 1
            b = 2
            export
        }
        s = make()
        s.a + s.b";
    assert_eq!(repr(source), "3");
}

#[test]
fn exported_space_supports_using() {
    let source = "def make() { a = 1; export }
        s = make()
        using s { a += 10 }
        s.a";
    assert_eq!(repr(source), "11");
}

// Seeds

#[test]
fn seeded_constants_exist() {
    assert_eq!(repr("KANDY_MAIN"), "True");
    assert_eq!(repr("KANDY_TYPE"), "'program'");
    assert_eq!(repr("KANDY_VERSION"), "1.0");
    assert!(matches!(eval("PROGRAM_START"), Value::Float(_)));
    assert_eq!(repr("type(KANDY_FILE)"), "<class 'str'>");
}

#[test]
fn seeded_types_act_as_converters() {
    assert_eq!(repr("int(\"5\") + float(\"1.5\")"), "6.5");
    assert_eq!(repr("str(12)"), "'12'");
    assert_eq!(repr("bool([])"), "False");
    assert_eq!(repr("tuple([1, 2])"), "(1, 2)");
    assert_eq!(repr("type(5) is int"), "True");
}

#[test]
fn multiple_types_capability() {
    assert_eq!(
        repr("t = MultipleTypesClass(int, float); isinstance(1.5, t)"),
        "True"
    );
}

// REPL-style stateful evaluation

#[test]
fn repl_steps_share_state() {
    let mut ev = Evaluator::new();
    ev.repl_step("a = 1").unwrap();
    let result = ev.repl_step("a + 1").unwrap();
    assert!(value_eq(&result, &Value::Int(2)));
}

#[test]
fn interpret_resets_state() {
    let mut ev = Evaluator::new();
    ev.interpret("a = 1").unwrap();
    let err = ev.interpret("a").unwrap_err();
    assert_eq!(err.class, ExcClass::NameError);
}

// Parser-facing failure surface

#[test]
fn parse_errors_surface_as_syntax_errors() {
    let err = eval_err("def f(");
    assert_eq!(err.class, ExcClass::SyntaxError);
    assert!(err.pos.is_some());
}

#[test]
fn lex_errors_surface_with_positions() {
    let err = eval_err("x = `");
    assert_eq!(err.class, ExcClass::LexerError);
}

#[test]
fn with_statement_closes_files_on_every_path() {
    let dir = std::env::temp_dir().join(format!("kandy-with-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let file = dir.join("data.txt");
    std::fs::write(&file, "payload").unwrap();

    let source = format!(
        "with open(\"{}\") as f {{ f.read() }}",
        file.display().to_string().replace('\\', "/")
    );
    assert_eq!(repr(&source), "'payload'");

    let _ = std::fs::remove_dir_all(&dir);
}
