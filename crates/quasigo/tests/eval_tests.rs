//! Evaluator behavior: operators, control flow, composite values,
//! channels, defer/panic/recover.

use pretty_assertions::assert_eq;
use quasigo::{CollectSink, ReplSession, Value};

fn session() -> (ReplSession, CollectSink) {
    let sink = CollectSink::new();
    (ReplSession::with_output(Box::new(sink.clone())), sink)
}

fn eval(src: &str) -> Value {
    let (mut session, _) = session();
    session.execute(src).unwrap()
}

fn eval_err(src: &str) -> String {
    let (mut session, _) = session();
    session.execute(src).unwrap_err().to_string()
}

// ----------------------------------------------------------------------
// operators

#[test]
fn short_circuit_skips_the_right_operand() {
    let (mut s, _) = session();
    s.execute("calls := 0").unwrap();
    s.execute("f := func() bool { calls = calls + 1; return true }")
        .unwrap();
    s.execute("a := false && f()").unwrap();
    s.execute("b := true || f()").unwrap();
    assert_eq!(s.execute("calls").unwrap(), Value::int(0));
    s.execute("c := true && f()").unwrap();
    assert_eq!(s.execute("calls").unwrap(), Value::int(1));
    assert_eq!(s.execute("a || b || c").unwrap(), Value::Bool(true));
}

#[test]
fn logical_operators_demand_booleans() {
    let err = eval_err("1 && true");
    assert!(err.contains("expecting bool"), "got: {err}");
}

#[test]
fn division_by_zero_is_a_domain_error() {
    let err = eval_err("1 / 0");
    assert!(err.contains("divide by zero"), "got: {err}");
}

#[test]
fn string_concat_and_comparison() {
    assert_eq!(eval(r#""foo" + "bar""#), Value::str("foobar"));
    assert_eq!(eval(r#""abc" < "abd""#), Value::Bool(true));
}

#[test]
fn nil_comparisons() {
    assert_eq!(eval("var p *int; p == nil"), Value::Bool(true));
    assert_eq!(eval("p := new(int); p != nil"), Value::Bool(true));
}

// ----------------------------------------------------------------------
// composite literals and indexing

#[test]
fn slice_literal_with_keyed_and_positional_entries() {
    let (mut s, _) = session();
    s.execute("x := []int{0: 10, 1: 20, 0: 30, 99}").unwrap();
    // the keyed index decreased: slot 0 is overwritten, the following
    // positional entry lands at 1, earlier entries stay
    assert_eq!(s.execute("x[0]").unwrap(), Value::int(30));
    assert_eq!(s.execute("x[1]").unwrap(), Value::int(99));
    assert_eq!(s.execute("len(x)").unwrap(), Value::int(2));
}

#[test]
fn slice_literal_grows_with_zero_padding() {
    let (mut s, _) = session();
    s.execute("x := []int{3: 7}").unwrap();
    assert_eq!(s.execute("len(x)").unwrap(), Value::int(4));
    assert_eq!(s.execute("x[1]").unwrap(), Value::int(0));
}

#[test]
fn struct_literals_keyed_or_positional_not_both() {
    let (mut s, _) = session();
    s.execute("type Pt struct { x, y int }").unwrap();
    assert_eq!(s.execute("p := Pt{1, 2}; p.x + p.y").unwrap(), Value::int(3));
    assert_eq!(s.execute("q := Pt{y: 5}; q.x*10 + q.y").unwrap(), Value::int(5));
    let err = s.execute("Pt{1, y: 2}").unwrap_err().to_string();
    assert!(err.contains("cannot mix"), "got: {err}");
}

#[test]
fn map_literal_requires_key_value_pairs() {
    let err = eval_err("map[string]int{1}");
    assert!(err.contains("key: value"), "got: {err}");
}

#[test]
fn slice_bounds_are_checked() {
    assert!(eval_err("a := []int{1,2,3}; a[1:5]").contains("out of range"));
    assert!(eval_err("a := []int{1,2,3}; a[2:1]").contains("out of range"));
    assert!(eval_err("a := []int{1,2,3}; a[0:3:2]").contains("out of range"));
    assert!(eval_err("a := []int{1,2,3}; a[5]").contains("out of range"));
}

#[test]
fn slices_share_their_backing_store() {
    let (mut s, _) = session();
    s.execute("a := []int{1, 2, 3}; b := a[0:2]").unwrap();
    s.execute("b[1] = 20").unwrap();
    assert_eq!(s.execute("a[1]").unwrap(), Value::int(20));
}

#[test]
fn append_and_copy() {
    let (mut s, _) = session();
    s.execute("a := []int{1}; a = append(a, 2, 3)").unwrap();
    assert_eq!(s.execute("len(a)").unwrap(), Value::int(3));
    assert_eq!(s.execute("a[2]").unwrap(), Value::int(3));
    s.execute("b := make([]int, 2); n := copy(b, a)").unwrap();
    assert_eq!(s.execute("n").unwrap(), Value::int(2));
    assert_eq!(s.execute("b[1]").unwrap(), Value::int(2));
}

#[test]
fn delete_removes_map_entries() {
    let (mut s, _) = session();
    s.execute(r#"m := map[string]int{"a": 1, "b": 2}"#).unwrap();
    s.execute(r#"delete(m, "a")"#).unwrap();
    assert_eq!(s.execute("len(m)").unwrap(), Value::int(1));
}

#[test]
fn string_indexing_and_slicing() {
    assert_eq!(eval(r#""abc"[1:3]"#), Value::str("bc"));
    assert_eq!(eval(r#"s := "abc"; s[0] == 97"#), Value::Bool(true));
}

#[test]
fn pointers_deref_and_assign() {
    let (mut s, _) = session();
    s.execute("p := new(int); *p = 42").unwrap();
    assert_eq!(s.execute("*p").unwrap(), Value::int(42));
    s.execute("x := 5; q := &x; *q = 6").unwrap();
    assert_eq!(s.execute("x").unwrap(), Value::int(6));
}

#[test]
fn methods_dispatch_through_named_types() {
    let (mut s, _) = session();
    s.execute("type Ctr struct { n int }").unwrap();
    s.execute("func (c Ctr) get() int { return c.n }").unwrap();
    assert_eq!(s.execute("Ctr{7}.get()").unwrap(), Value::int(7));
}

// ----------------------------------------------------------------------
// control flow

#[test]
fn three_clause_for_loop() {
    assert_eq!(eval("s := 0; for i := 0; i < 5; i++ { s += i }; s"), Value::int(10));
}

#[test]
fn for_range_over_slice_string_and_map() {
    assert_eq!(
        eval("t := 0; for i, v := range []int{10, 20, 30} { t += i * v }; t"),
        Value::int(80)
    );
    // string iteration is codepoint-wise: key is the byte offset
    assert_eq!(
        eval(r#"n := 0; for i, _ := range "héllo" { n += i }; n"#),
        Value::int(13)
    );
    assert_eq!(
        eval(r#"t := 0; for _, v := range map[string]int{"a": 1, "b": 2} { t += v }; t"#),
        Value::int(3)
    );
}

#[test]
fn for_range_assign_form_reuses_existing_variables() {
    assert_eq!(
        eval("i := 0; v := 0; t := 0; for i, v = range []int{5, 6} { t = t + i + v }; t + i + v"),
        Value::int(19)
    );
}

#[test]
fn labeled_break_and_continue() {
    assert_eq!(
        eval("c := 0; outer: for i := 0; i < 3; i++ { for j := 0; j < 3; j++ { c++; if c == 4 { break outer } } }; c"),
        Value::int(4)
    );
    assert_eq!(
        eval("c := 0; outer: for i := 0; i < 3; i++ { for j := 0; j < 3; j++ { continue outer }; c = 100 }; c"),
        Value::int(0)
    );
}

#[test]
fn goto_jumps_to_a_label() {
    assert_eq!(eval("i := 0; loop: i = i + 1; if i < 3 { goto loop }; i"), Value::int(3));
}

#[test]
fn goto_to_a_missing_label_fails() {
    let err = eval_err("goto nowhere");
    assert!(err.contains("label nowhere not defined"), "got: {err}");
}

#[test]
fn switch_matches_cases_and_default() {
    assert_eq!(eval(r#"switch 2 { case 1: "a"; case 2: "b"; default: "c" }"#), Value::str("b"));
    assert_eq!(eval(r#"switch 9 { case 1: "a"; default: "c" }"#), Value::str("c"));
    // a missing tag defaults to true
    assert_eq!(eval(r#"x := 7; switch { case x > 5: "big"; default: "small" }"#), Value::str("big"));
}

#[test]
fn switch_fallthrough_transfers_to_next_clause() {
    assert_eq!(
        eval("r := 0; switch 1 { case 1: r = 1; fallthrough; case 2: r = r + 10; default: r = 99 }; r"),
        Value::int(11)
    );
}

#[test]
fn fallthrough_from_the_last_case_is_a_noop() {
    let (mut s, _) = session();
    s.execute("r := 0; switch 1 { case 9: r = 9; case 1: r = 1; fallthrough }")
        .unwrap();
    assert_eq!(s.execute("r").unwrap(), Value::int(1));
}

#[test]
fn type_switch_default_keeps_the_interface_view() {
    assert_eq!(
        eval(r#"switch v := interface{}("z").(type) { case int: 1; default: v }"#),
        Value::str("z")
    );
    assert_eq!(
        eval(r#"r := ""; switch interface{}(3.5).(type) { case int: r = "int"; case float64: r = "float" }; r"#),
        Value::str("float")
    );
}

#[test]
fn type_assertions_single_and_comma_ok() {
    let (mut s, _) = session();
    s.execute(r#"var i interface{} = "hi""#).unwrap();
    assert_eq!(s.execute("s := i.(string); s").unwrap(), Value::str("hi"));
    assert_eq!(s.execute("n, ok := i.(int); ok").unwrap(), Value::Bool(false));
    assert_eq!(s.execute("n").unwrap(), Value::int(0));
    let err = s.execute("i.(int) + 1").unwrap_err().to_string();
    assert!(err.contains("type assertion failed"), "got: {err}");
}

// ----------------------------------------------------------------------
// functions

#[test]
fn variadic_functions_pack_and_spread() {
    let (mut s, _) = session();
    s.execute("sum := func(xs ...int) int { t := 0; for _, x := range xs { t += x }; t }")
        .unwrap();
    assert_eq!(s.execute("sum(1, 2, 3)").unwrap(), Value::int(6));
    assert_eq!(s.execute("ys := []int{4, 5}; sum(ys...)").unwrap(), Value::int(9));
    assert_eq!(s.execute("sum()").unwrap(), Value::int(0));
}

#[test]
fn multi_values_spread_into_call_arguments() {
    let (mut s, _) = session();
    s.execute("swap := func(a, b int) (int, int) { return b, a }").unwrap();
    s.execute("f := func(a, b int) int { a*10 + b }").unwrap();
    assert_eq!(s.execute("f(swap(1, 2))").unwrap(), Value::int(21));
}

#[test]
fn wrong_arity_calls_fail() {
    let err = eval_err("f := func(a int) int { a }; f(1, 2)");
    assert!(err.contains("expects 1 arguments, found 2"), "got: {err}");
}

#[test]
fn named_results_are_returned_on_bare_return() {
    assert_eq!(
        eval("f := func() (n int) { n = 5; return }; f()"),
        Value::int(5)
    );
}

// ----------------------------------------------------------------------
// defer / panic / recover

#[test]
fn defers_run_lifo_on_normal_return() {
    let (mut s, sink) = session();
    s.execute("f := func() { defer print(1); defer print(2); print(3) }; f()")
        .unwrap();
    assert_eq!(sink.output(), "321");
}

#[test]
fn defers_run_when_unwinding_a_panic() {
    let (mut s, sink) = session();
    let err = s
        .execute(r#"f := func() { defer print("d"); panic("boom") }; f()"#)
        .unwrap_err();
    assert_eq!(err.to_string(), "panic: boom");
    assert_eq!(sink.output(), "d");
}

#[test]
fn recover_in_a_deferred_call_stops_the_panic() {
    let out = eval(
        r#"f := func() (r int) { defer func() { if recover() != nil { r = 9 } }(); panic("boom") }; f()"#,
    );
    assert_eq!(out, Value::int(9));
}

#[test]
fn recover_outside_a_deferred_call_returns_nil() {
    assert_eq!(eval("recover() == nil"), Value::Bool(true));
}

#[test]
fn panics_cross_nested_frames_until_recovered() {
    let (mut s, _) = session();
    s.execute(r#"inner := func() { panic("deep") }"#).unwrap();
    s.execute(r#"outer := func() (r string) { defer func() { v := recover(); r = v.(string) }(); inner(); return "unreached" }"#)
        .unwrap();
    assert_eq!(s.execute("outer()").unwrap(), Value::str("deep"));
}

// ----------------------------------------------------------------------
// channels and goroutines

#[test]
fn range_over_a_closed_channel_drains_it() {
    let out = eval("ch := make(chan int, 3); ch <- 1; ch <- 2; ch <- 3; close(ch); s := 0; for v := range ch { s += v }; s");
    assert_eq!(out, Value::int(6));
}

#[test]
fn goroutines_run_when_a_receive_blocks() {
    let out = eval("ch := make(chan int); go func() { ch <- 7; close(ch) }(); t := 0; for v := range ch { t += v }; t");
    assert_eq!(out, Value::int(7));
}

#[test]
fn receive_comma_ok_reports_closed_channels() {
    let (mut s, _) = session();
    s.execute("ch := make(chan int, 1); ch <- 5; close(ch)").unwrap();
    assert_eq!(s.execute("v, ok := <-ch; ok").unwrap(), Value::Bool(true));
    assert_eq!(s.execute("v").unwrap(), Value::int(5));
    assert_eq!(s.execute("w, ok2 := <-ch; ok2").unwrap(), Value::Bool(false));
    assert_eq!(s.execute("w").unwrap(), Value::int(0));
}

#[test]
fn send_on_closed_channel_panics() {
    let err = eval_err("ch := make(chan int, 1); close(ch); ch <- 1");
    assert_eq!(err, "panic: send on closed channel");
}

#[test]
fn select_picks_a_ready_clause_or_default() {
    assert_eq!(
        eval("ch := make(chan int, 1); ch <- 5; x := 0; select { case v := <-ch: x = v; default: x = -1 }; x"),
        Value::int(5)
    );
    assert_eq!(
        eval("ch := make(chan int); x := 0; select { case v := <-ch: x = v; default: x = -1 }; x"),
        Value::int(-1)
    );
}

#[test]
fn blocked_receive_with_no_goroutines_is_a_deadlock() {
    let err = eval_err("ch := make(chan int); <-ch");
    assert!(err.contains("deadlock"), "got: {err}");
}
