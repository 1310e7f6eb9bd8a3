//! Macro-expansion behavior through the public session API: quotation,
//! quasiquotation, splicing, sibling consumption, and the expansion
//! fixed point.

use pretty_assertions::assert_eq;
use quasigo::{ReplSession, Value};

fn session() -> ReplSession {
    ReplSession::with_output(Box::new(quasigo::NullSink))
}

#[test]
fn quote_evaluates_to_a_syntax_fragment() {
    let mut s = session();
    let out = s.execute("quote{1 + 2}").unwrap();
    assert_eq!(out.to_string(), "1 + 2");
}

#[test]
fn quasiquote_substitutes_unquoted_values() {
    let mut s = session();
    s.execute("x := quote{10}").unwrap();
    let out = s.execute("~`{~,x * 2}").unwrap();
    assert_eq!(out.to_string(), "10 * 2");
}

#[test]
fn unquote_splice_inlines_a_statement_sequence() {
    let mut s = session();
    s.execute("args := quote{10; 20}").unwrap();
    s.execute("add := func(a, b int) int { a + b }").unwrap();
    s.execute("macro sum2() interface{} { ~`{add(~,@args)} }").unwrap();
    assert_eq!(s.execute("sum2").unwrap(), Value::int(30));
}

#[test]
fn macro_consumes_following_siblings() {
    let mut s = session();
    s.execute("macro add3(a, b, c interface{}) interface{} { ~`{~,a + ~,b + ~,c} }")
        .unwrap();
    assert_eq!(s.execute("add3; 1; 2; 3").unwrap(), Value::int(6));
}

#[test]
fn macro_arguments_are_full_expressions() {
    let mut s = session();
    s.execute("macro sqr(a interface{}) interface{} { ~`{~,a * ~,a} }").unwrap();
    assert_eq!(s.execute("sqr; 2 + 1").unwrap(), Value::int(9));
}

#[test]
fn expansion_reaches_a_fixed_point_through_macro_chains() {
    let mut s = session();
    s.execute("macro sqr(a interface{}) interface{} { ~`{~,a * ~,a} }").unwrap();
    s.execute("macro sqr6() interface{} { ~'{sqr; 6} }").unwrap();
    // sqr6 expands to the sequence `sqr; 6`, which must expand again
    assert_eq!(s.execute("sqr6").unwrap(), Value::int(36));
}

#[test]
fn expansion_runs_inside_nested_function_bodies() {
    let mut s = session();
    s.execute("macro inc(a interface{}) interface{} { ~`{~,a + 1} }").unwrap();
    s.execute("f := func() int { inc; 41 }").unwrap();
    assert_eq!(s.execute("f()").unwrap(), Value::int(42));
}

#[test]
fn quote_suppresses_expansion_at_depth_zero() {
    let mut s = session();
    s.execute("macro zero() interface{} { ~'{0} }").unwrap();
    let out = s.execute("quote{zero}").unwrap();
    // inside quote the macro name stays a bare identifier
    assert_eq!(out.to_string(), "zero");
}

#[test]
fn macro_returning_nil_leaves_no_hole() {
    let mut s = session();
    s.execute("macro vanish() interface{} { nil }").unwrap();
    // the nil return is replaced by the identifier nil, which evaluates
    assert_eq!(s.execute("vanish").unwrap(), Value::Nil);
}

#[test]
fn insufficient_macro_arguments_are_diagnosed() {
    let mut s = session();
    s.execute("macro pair(a, b interface{}) interface{} { ~`{~,a + ~,b} }").unwrap();
    let err = s.execute("pair; 1").unwrap_err();
    assert!(err.to_string().contains("not enough arguments"), "got: {err}");
}

#[test]
fn non_syntax_macro_returns_are_diagnosed() {
    let mut s = session();
    s.execute("macro bad() interface{} { make(map[string]int) }").unwrap();
    let err = s.execute("bad").unwrap_err();
    assert!(err.to_string().contains("cannot convert"), "got: {err}");
}

#[test]
fn scalar_macro_returns_become_literals() {
    let mut s = session();
    s.execute("macro five() interface{} { 5 }").unwrap();
    assert_eq!(s.execute("five").unwrap(), Value::int(5));
}

#[test]
fn macro_can_build_composite_code() {
    let mut s = session();
    s.execute("macro listof(a interface{}) interface{} { ~`{[]int{1, ~,a, 3}} }").unwrap();
    let out = s.execute("listof; 2").unwrap();
    assert_eq!(out.to_string(), "[1 2 3]");
}

#[test]
fn macros_in_earlier_turns_expand_in_later_ones() {
    let mut s = session();
    s.execute("macro twice(a interface{}) interface{} { ~`{~,a; ~,a} }").unwrap();
    s.execute("n := 0").unwrap();
    s.execute("twice; n = n + 1").unwrap();
    assert_eq!(s.execute("n").unwrap(), Value::int(2));
}
