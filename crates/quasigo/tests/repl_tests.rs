//! End-to-end tests for `ReplSession`: one turn each of
//! *parse → macro-expand → eval* against a persistent environment.

use pretty_assertions::assert_eq;
use quasigo::{CollectSink, Kind, Options, ReplCommand, ReplSession, Value};

fn session() -> (ReplSession, CollectSink) {
    let sink = CollectSink::new();
    (ReplSession::with_output(Box::new(sink.clone())), sink)
}

fn eval(src: &str) -> Value {
    let (mut session, _) = session();
    session.execute(src).unwrap()
}

#[test]
fn arithmetic_on_fresh_binding() {
    assert_eq!(eval("x := 1 + 2; x*10"), Value::int(30));
}

#[test]
fn map_index_comma_ok_on_missing_key() {
    let (mut s, _) = session();
    s.execute(r#"m := map[string]int{"a":1}"#).unwrap();
    assert_eq!(s.execute(r#"v, ok := m["b"]; ok"#).unwrap(), Value::Bool(false));
    assert_eq!(s.execute("v").unwrap(), Value::int(0));
    // the miss did not insert
    assert_eq!(s.execute("len(m)").unwrap(), Value::int(1));
}

#[test]
fn multi_valued_function_results() {
    let (mut s, _) = session();
    s.execute("f := func(a, b int) (int, int) { return a+b, a-b }")
        .unwrap();
    assert_eq!(s.execute("s, d := f(7, 3); s*10 + d").unwrap(), Value::int(104));
}

#[test]
fn toplevel_defers_run_lifo_at_turn_end() {
    let (mut s, sink) = session();
    s.execute("defer print(1); defer print(2); print(3)").unwrap();
    assert_eq!(sink.output(), "321");
}

#[test]
fn macro_definition_and_expansion_in_one_turn() {
    let out = eval("macro sqr(a interface{}) interface{} { ~`{~,a * ~,a} }; sqr; 4");
    assert_eq!(out, Value::int(16));
}

#[test]
fn type_switch_binds_matched_type() {
    let out = eval("switch x := interface{}(3).(type) { case int: x+1; case string: 0 }");
    assert_eq!(out, Value::int(4));
}

#[test]
fn bindings_persist_across_turns() {
    let (mut s, _) = session();
    s.execute("x := 42").unwrap();
    s.execute("f := func() int { return x }").unwrap();
    assert_eq!(s.execute("f()").unwrap(), Value::int(42));
}

#[test]
fn closures_survive_their_defining_turn() {
    let (mut s, _) = session();
    s.execute("counter := func() func() int { n := 0; return func() int { n = n + 1; return n } }")
        .unwrap();
    s.execute("next := counter()").unwrap();
    assert_eq!(s.execute("next()").unwrap(), Value::int(1));
    assert_eq!(s.execute("next()").unwrap(), Value::int(2));
}

#[test]
fn failed_turn_keeps_earlier_bindings() {
    let (mut s, _) = session();
    s.execute("kept := 7").unwrap();
    let err = s.execute("undefined_name").unwrap_err();
    assert!(err.to_string().contains("undefined identifier"), "got: {err}");
    assert_eq!(s.execute("kept").unwrap(), Value::int(7));
}

#[test]
fn syntax_errors_abort_the_turn() {
    let (mut s, _) = session();
    let err = s.execute("x := := 1").unwrap_err();
    assert!(err.to_string().contains("Syntax"), "got: {err}");
}

#[test]
fn unhandled_panic_is_reported() {
    let (mut s, _) = session();
    let err = s.execute(r#"panic("boom")"#).unwrap_err();
    assert_eq!(err.to_string(), "panic: boom");
    // the session is still usable
    assert_eq!(s.execute("1 + 1").unwrap(), Value::int(2));
}

#[test]
fn parse_and_eval_display_options() {
    let (mut s, sink) = session();
    s.toggle_options("Parse Eval");
    s.execute("1 + 2").unwrap();
    let out = sink.output();
    assert!(out.contains("// parse: 1 + 2"), "got: {out}");
    assert!(out.contains("// eval: 3"), "got: {out}");
}

#[test]
fn options_commands_toggle_and_quit() {
    let (mut s, _) = session();
    assert_eq!(s.try_command(":quit"), Some(ReplCommand::Quit));
    assert_eq!(s.try_command(":o TrapPanic"), Some(ReplCommand::Handled));
    assert!(s.options().contains(Options::TRAP_PANIC));
    assert_eq!(s.try_command(":o Trap"), Some(ReplCommand::Handled));
    assert!(!s.options().contains(Options::TRAP_PANIC));
    assert_eq!(s.try_command("not a command"), None);
}

#[test]
fn collect_declarations_accumulates_sources() {
    let (mut s, _) = session();
    s.toggle_options("Declarations");
    s.execute("func twice(x int) int { return 2 * x }").unwrap();
    s.execute("twice(21)").unwrap();
    assert_eq!(s.collected().len(), 1);
    assert!(s.collected()[0].starts_with("func twice"), "got: {}", s.collected()[0]);
}

#[test]
fn imports_resolve_package_symbols() {
    let (mut s, _) = session();
    s.execute(r#"import "strings""#).unwrap();
    assert_eq!(
        s.execute(r#"strings.ToUpper("abc")"#).unwrap(),
        Value::str("ABC")
    );
    let err = s.execute("strings.Nope(1)").unwrap_err();
    assert!(err.to_string().contains("has no symbol"), "got: {err}");
}

#[test]
fn math_package_functions_and_constants() {
    let (mut s, _) = session();
    s.execute(r#"import "math""#).unwrap();
    assert_eq!(s.execute("math.Sqrt(9.0)").unwrap(), Value::float64(3.0));
    assert_eq!(s.execute("math.Max(1.5, 2.5)").unwrap(), Value::float64(2.5));
}

#[test]
fn rand_package_is_seedable() {
    let (mut s, _) = session();
    s.execute(r#"import "math/rand""#).unwrap();
    s.execute("rand.Seed(42)").unwrap();
    assert_eq!(
        s.execute("n := rand.Intn(10); n >= 0 && n < 10").unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn iota_enumerates_const_group_lines() {
    let out = eval("const (\n\ta = iota\n\tb\n\tc\n)\nc");
    assert_eq!(out, Value::int(2));
}

#[test]
fn integer_kinds_stay_distinct() {
    assert_eq!(eval("int8(100)"), Value::Int(Kind::Int8, 100));
    assert_eq!(eval("int8(200)"), Value::Int(Kind::Int8, -56));
    assert_eq!(eval("uint16(65536 + 7)"), Value::Uint(Kind::Uint16, 7));
}
