//! Predeclared bindings: `true`, `false`, `nil`, and the builtin
//! functions `len cap append copy delete close print println panic
//! recover make new`.
//!
//! Most builtins are natives taking evaluated values; `make` and `new`
//! receive their argument expressions unevaluated because their first
//! argument is a type.

use std::rc::Rc;

use smallvec::smallvec;

use crate::arith::to_int;
use crate::ast::Expr;
use crate::env::Env;
use crate::error::{EvalError, Flow, Unwind};
use crate::types::{self, zero_value, Kind};
use crate::value::{
    value_to_type, Builtin, ExprOut, FuncImpl, FuncVal, NativeFunc, Value, Values,
};

/// Installs the predeclared bindings into the root frame.
pub fn install(root: &Rc<Env>) {
    root.define_var(Rc::from("true"), None, Value::Bool(true));
    root.define_var(Rc::from("false"), None, Value::Bool(false));
    root.define_var(Rc::from("nil"), None, Value::Nil);

    let natives: &[(&'static str, i32, fn(&Rc<Env>, Vec<Value>) -> Flow<Values>)] = &[
        ("len", 1, builtin_len),
        ("cap", 1, builtin_cap),
        ("append", -1, builtin_append),
        ("copy", 2, builtin_copy),
        ("delete", 2, builtin_delete),
        ("close", 1, builtin_close),
        ("print", -1, builtin_print),
        ("println", -1, builtin_println),
        ("panic", 1, builtin_panic),
        ("recover", 0, builtin_recover),
    ];
    for &(name, arg_num, f) in natives {
        root.define_var(
            Rc::from(name),
            None,
            Value::Func(FuncVal::new(
                types::func_of(vec![], vec![], false),
                FuncImpl::Native(NativeFunc { name, arg_num, f }),
            )),
        );
    }

    root.define_var(
        Rc::from("make"),
        None,
        Value::Builtin(Builtin {
            name: "make",
            arg_num: -1,
            exec: builtin_make,
        }),
    );
    root.define_var(
        Rc::from("new"),
        None,
        Value::Builtin(Builtin {
            name: "new",
            arg_num: 1,
            exec: builtin_new,
        }),
    );
}

fn one(v: Value) -> Flow<Values> {
    Ok(smallvec![v])
}

fn builtin_len(_env: &Rc<Env>, args: Vec<Value>) -> Flow<Values> {
    let n = match &args[0] {
        Value::Str(s) => s.len(),
        Value::Slice(s) | Value::Array(s) => s.len(),
        Value::Map(m) => m.len(),
        Value::Chan(c) => c.len(),
        Value::Nil => 0,
        other => return Err(EvalError::type_(format!("invalid argument for len: {other:?}")).into()),
    };
    one(Value::int(n as i64))
}

fn builtin_cap(_env: &Rc<Env>, args: Vec<Value>) -> Flow<Values> {
    let n = match &args[0] {
        Value::Slice(s) | Value::Array(s) => s.cap(),
        Value::Chan(c) => {
            let state = c.state.borrow();
            state.cap
        }
        Value::Nil => 0,
        other => return Err(EvalError::type_(format!("invalid argument for cap: {other:?}")).into()),
    };
    one(Value::int(n as i64))
}

fn builtin_append(_env: &Rc<Env>, args: Vec<Value>) -> Flow<Values> {
    let mut args = args.into_iter();
    let first = args
        .next()
        .ok_or_else(|| EvalError::type_("append expects at least 1 argument"))?;
    let rest: Vec<Value> = args.collect();
    match first {
        Value::Slice(s) => {
            let elem = s.elem_type();
            let mut converted = Vec::with_capacity(rest.len());
            for v in rest {
                converted.push(value_to_type(&v, &elem)?);
            }
            one(Value::Slice(s.append(converted)))
        }
        Value::Nil => {
            // appending to a nil slice makes a fresh one; the element
            // type comes from the first appended value
            let elem = rest
                .first()
                .map_or_else(types::empty_interface, Value::type_of);
            let ty = types::slice_of(elem.clone());
            let mut converted = Vec::with_capacity(rest.len());
            for v in rest {
                converted.push(value_to_type(&v, &elem)?);
            }
            one(Value::new_slice(ty, converted))
        }
        other => Err(EvalError::type_(format!("first argument to append must be a slice, found {other:?}")).into()),
    }
}

fn builtin_copy(_env: &Rc<Env>, args: Vec<Value>) -> Flow<Values> {
    let (dst, src) = (&args[0], &args[1]);
    let (Value::Slice(dst), Value::Slice(src) | Value::Array(src)) = (dst, src) else {
        return Err(EvalError::type_(format!("copy expects slices, found {dst:?} and {src:?}")).into());
    };
    let n = dst.len().min(src.len());
    let elem = dst.elem_type();
    for i in 0..n {
        let v = src.get(i).unwrap_or(Value::Nil);
        dst.set(i, value_to_type(&v, &elem)?);
    }
    one(Value::int(n as i64))
}

fn builtin_delete(_env: &Rc<Env>, args: Vec<Value>) -> Flow<Values> {
    match &args[0] {
        Value::Map(m) => {
            let key = value_to_type(&args[1], &m.key_type())?;
            m.remove(&key)?;
            Ok(Values::new())
        }
        Value::Nil => Ok(Values::new()),
        other => Err(EvalError::type_(format!("first argument to delete must be a map, found {other:?}")).into()),
    }
}

fn builtin_close(_env: &Rc<Env>, args: Vec<Value>) -> Flow<Values> {
    crate::channel::chan_close(&args[0])?;
    Ok(Values::new())
}

fn builtin_print(env: &Rc<Env>, args: Vec<Value>) -> Flow<Values> {
    let text = args.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ");
    env.shared.output.borrow_mut().write_str(&text);
    Ok(Values::new())
}

fn builtin_println(env: &Rc<Env>, args: Vec<Value>) -> Flow<Values> {
    let text = args.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ");
    env.shared.write_line(&text);
    Ok(Values::new())
}

fn builtin_panic(env: &Rc<Env>, args: Vec<Value>) -> Flow<Values> {
    let value = args.into_iter().next().unwrap_or(Value::Nil);
    env.debugf(
        crate::options::Options::DEBUG_PANIC_RECOVER,
        format_args!("panic: {value}"),
    );
    Err(Unwind::Panic(value))
}

/// `recover()` returns the in-flight panic value and clears it, but only
/// when called directly from a deferred call of the panicking frame.
fn builtin_recover(env: &Rc<Env>, _args: Vec<Value>) -> Flow<Values> {
    let mut stack = env.shared.call_stack.borrow_mut();
    let depth = stack.frames.len();
    // the deferred call's own frame sits directly on top of the frame
    // whose defers are running
    if depth >= 2 {
        let below = &mut stack.frames[depth - 2];
        if below.running_defers && below.panicking {
            below.panicking = false;
            let value = below.panic.take().unwrap_or(Value::Nil);
            drop(stack);
            env.debugf(
                crate::options::Options::DEBUG_PANIC_RECOVER,
                format_args!("recovered: {value}"),
            );
            return one(value);
        }
    }
    one(Value::Nil)
}

fn builtin_make(env: &Rc<Env>, args: &[Expr]) -> Flow<ExprOut> {
    if args.is_empty() || args.len() > 3 {
        return Err(EvalError::type_(format!("make expects 1 to 3 arguments, found {}", args.len())).into());
    }
    let ty = env.eval_type(&args[0])?;
    let mut sizes = Vec::with_capacity(2);
    for arg in &args[1..] {
        let v = env.eval_expr1(arg)?;
        let n = to_int(&v)
            .filter(|n| *n >= 0)
            .ok_or_else(|| EvalError::type_(format!("invalid size argument for make: {v:?}")))?;
        sizes.push(n as usize);
    }
    let value = match ty.kind() {
        Kind::Slice => {
            let len = sizes.first().copied().unwrap_or(0);
            let elem = ty.elem().unwrap_or_else(types::empty_interface);
            let cells = (0..len).map(|_| zero_value(&elem)).collect();
            Value::new_slice(ty, cells)
        }
        Kind::Map => Value::new_map(ty),
        Kind::Chan => Value::new_chan(ty, sizes.first().copied().unwrap_or(0)),
        _ => return Err(EvalError::type_(format!("cannot make {ty}")).into()),
    };
    Ok((value, Values::new()))
}

fn builtin_new(env: &Rc<Env>, args: &[Expr]) -> Flow<ExprOut> {
    let ty = env.eval_type(&args[0])?;
    let cell = Rc::new(std::cell::RefCell::new(zero_value(&ty)));
    Ok((Value::new_ptr(ty, cell), Values::new()))
}
