//! Call machinery: closure construction, invocation, variadic packing,
//! multi-value returns, the deferred-call stack, and panic/recover
//! semantics.

use std::rc::Rc;

use smallvec::smallvec;

use crate::ast::{BlockStmt, CallExpr, Expr, FuncType};
use crate::env::{CallFrame, DeferredCall, Env};
use crate::error::{EvalError, Flow, Unwind};
use crate::options::Options;
use crate::token::Pos;
use crate::types::{self, zero_value, Type};
use crate::value::{
    value_to_type, DeclaredFunc, ExprOut, FuncImpl, FuncVal, Param, Value, Values,
};

/// Evaluates a signature's parameter and result types.
pub fn signature_types(env: &Rc<Env>, ft: &FuncType) -> Flow<(Vec<Type>, Vec<Type>, bool)> {
    let (params, results, variadic) = signature_params(env, ft)?;
    Ok((
        params.into_iter().map(|p| p.ty).collect(),
        results.into_iter().map(|p| p.ty).collect(),
        variadic,
    ))
}

/// Evaluates a signature to named parameter/result lists. A variadic
/// last parameter is represented with its slice type.
pub fn signature_params(env: &Rc<Env>, ft: &FuncType) -> Flow<(Vec<Param>, Vec<Param>, bool)> {
    let mut variadic = false;
    let mut params = vec![];
    let last_field = ft.params.list.len().saturating_sub(1);
    for (fi, field) in ft.params.list.iter().enumerate() {
        let (ty, is_variadic) = match &field.ty {
            Some(Expr::Ellipsis(e)) => {
                let elem = match &e.elt {
                    Some(elt) => env.eval_type(elt)?,
                    None => types::empty_interface(),
                };
                (types::slice_of(elem), true)
            }
            Some(other) => (env.eval_type(other)?, false),
            None => (types::empty_interface(), false),
        };
        if is_variadic {
            if fi != last_field {
                return Err(EvalError::type_("can only use ... with the final parameter").into());
            }
            variadic = true;
        }
        if field.names.is_empty() {
            params.push(Param { name: None, ty });
        } else {
            for name in &field.names {
                params.push(Param {
                    name: Some(name.name.clone()),
                    ty: ty.clone(),
                });
            }
        }
    }
    let mut results = vec![];
    for field in &ft.results.list {
        let ty = match &field.ty {
            Some(ty) => env.eval_type(ty)?,
            None => types::empty_interface(),
        };
        if field.names.is_empty() {
            results.push(Param { name: None, ty });
        } else {
            for name in &field.names {
                results.push(Param {
                    name: Some(name.name.clone()),
                    ty: ty.clone(),
                });
            }
        }
    }
    Ok((params, results, variadic))
}

/// Builds a closure over the current frame chain.
pub fn build_closure(env: &Rc<Env>, name: Option<Rc<str>>, ft: &FuncType, body: &BlockStmt) -> Flow<FuncVal> {
    let (params, results, variadic) = signature_params(env, ft)?;
    let ty = types::func_of(
        params.iter().map(|p| p.ty.clone()).collect(),
        results.iter().map(|p| p.ty.clone()).collect(),
        variadic,
    );
    Ok(FuncVal::new(
        ty,
        FuncImpl::Declared(DeclaredFunc {
            name,
            params,
            results,
            variadic,
            body: body.clone(),
            captured: env.chain(),
        }),
    ))
}

impl Env {
    /// Evaluates a call expression: a builtin, a type conversion, or a
    /// function/closure invocation.
    pub fn eval_call(self: &Rc<Self>, node: &CallExpr) -> Flow<ExprOut> {
        let mut fun = &node.fun;
        while let Expr::Paren(p) = fun {
            fun = &p.x;
        }

        // explicit type expressions are conversions
        if matches!(
            fun,
            Expr::ArrayType(_)
                | Expr::MapType(_)
                | Expr::ChanType(_)
                | Expr::FuncType(_)
                | Expr::StructType(_)
                | Expr::InterfaceType(_)
        ) {
            return self.eval_conversion(fun, node);
        }
        // so is a bare identifier naming a type rather than a value
        if let Expr::Ident(id) = fun {
            if !id.is_blank() && self.resolve_ident(id).is_none() && self.eval_type(fun).is_ok() {
                return self.eval_conversion(fun, node);
            }
        }

        let callee = self.eval_expr1(fun)?;
        if let Value::Builtin(b) = &callee {
            if b.arg_num >= 0 && node.args.len() != b.arg_num as usize {
                return Err(EvalError::type_(format!(
                    "{} expects {} arguments, found {}",
                    b.name,
                    b.arg_num,
                    node.args.len()
                ))
                .at(node.pos)
                .into());
            }
            return (b.exec)(self, &node.args);
        }

        // how many values the call site itself must supply (a bound
        // receiver is prepended later and does not count)
        let expected = match &callee {
            Value::Func(f) => match &*f.imp {
                FuncImpl::Declared(d) => Some(d.params.len().saturating_sub(usize::from(f.recv.is_some()))),
                FuncImpl::Native(_) => None,
            },
            _ => None,
        };
        // a single call argument spreads its multiple return values
        let args = match expected {
            Some(want) if node.args.len() == 1 && want > 1 => self.eval_exprs_multi(&node.args, want)?,
            _ => self.eval_exprs(&node.args)?,
        };
        let results = call_function(self, &callee, args, node.ellipsis, node.pos)?;
        let value = results.first().cloned().unwrap_or(Value::Void);
        if results.len() > 1 {
            Ok((value, results))
        } else {
            Ok((value, Values::new()))
        }
    }

    fn eval_conversion(self: &Rc<Self>, ty_expr: &Expr, node: &CallExpr) -> Flow<ExprOut> {
        if node.args.len() != 1 {
            return Err(EvalError::type_(format!(
                "conversion to {ty_expr} expects 1 argument, found {}",
                node.args.len()
            ))
            .at(node.pos)
            .into());
        }
        let ty = self.eval_type(ty_expr)?;
        let value = self.eval_expr1(&node.args[0])?;
        Ok((value_to_type(&value, &ty)?, Values::new()))
    }
}

/// Invokes a callable with already-evaluated arguments.
pub fn call_value(env: &Rc<Env>, callee: &Value, args: Vec<Value>, pos: Pos) -> Flow<Values> {
    call_function(env, callee, args, false, pos)
}

pub fn call_function(env: &Rc<Env>, callee: &Value, mut args: Vec<Value>, spread: bool, pos: Pos) -> Flow<Values> {
    match callee {
        Value::Func(f) => {
            if let Some(recv) = &f.recv {
                args.insert(0, (**recv).clone());
            }
            match &*f.imp {
                FuncImpl::Native(n) => {
                    if n.arg_num >= 0 && args.len() != n.arg_num as usize {
                        return Err(EvalError::type_(format!(
                            "{} expects {} arguments, found {}",
                            n.name,
                            n.arg_num,
                            args.len()
                        ))
                        .at(pos)
                        .into());
                    }
                    (n.f)(env, args)
                }
                FuncImpl::Declared(d) => call_declared(env, f, d, args, spread, pos),
            }
        }
        Value::Macro(m) => call_value(env, &Value::Func(m.func.clone()), args, pos),
        Value::Nil => Err(EvalError::domain("call of nil function").at(pos).into()),
        other => Err(EvalError::type_(format!("called object is not a function: {other:?}"))
            .at(pos)
            .into()),
    }
}

fn call_declared(
    env: &Rc<Env>,
    f: &FuncVal,
    d: &DeclaredFunc,
    args: Vec<Value>,
    spread: bool,
    pos: Pos,
) -> Flow<Values> {
    let fixed = d.params.len() - usize::from(d.variadic);
    let arity_ok = if d.variadic {
        args.len() >= fixed
    } else {
        args.len() == d.params.len()
    };
    if !arity_ok {
        return Err(EvalError::type_(format!(
            "{} expects {}{} arguments, found {}",
            f.name(),
            fixed,
            if d.variadic { "+" } else { "" },
            args.len()
        ))
        .at(pos)
        .into());
    }

    let defining = d
        .captured
        .first()
        .cloned()
        .unwrap_or_else(|| env.clone());
    let fenv = defining.child(f.name().to_owned());

    // bind parameters
    let mut args = args.into_iter();
    for param in d.params.iter().take(fixed) {
        let arg = args.next().expect("arity checked");
        let arg = value_to_type(&arg, &param.ty)?;
        if let Some(name) = &param.name {
            fenv.define_var(name.clone(), Some(param.ty.clone()), arg);
        }
    }
    if d.variadic {
        let param = d.params.last().expect("variadic has a final parameter");
        let rest: Vec<Value> = args.collect();
        let packed = if spread && rest.len() == 1 {
            // f(xs...) passes the slice through unchanged
            rest.into_iter().next().expect("len checked")
        } else {
            let elem = param.ty.elem().unwrap_or_else(types::empty_interface);
            let mut cells = Vec::with_capacity(rest.len());
            for v in rest {
                cells.push(value_to_type(&v, &elem)?);
            }
            Value::new_slice(param.ty.clone(), cells)
        };
        if let Some(name) = &param.name {
            fenv.define_var(name.clone(), Some(param.ty.clone()), packed);
        }
    }
    // named results start at their zero values
    for result in &d.results {
        if let Some(name) = &result.name {
            fenv.define_var(name.clone(), Some(result.ty.clone()), zero_value(&result.ty));
        }
    }

    let frame_idx = {
        let mut stack = env.shared.call_stack.borrow_mut();
        stack.frames.push(CallFrame::named(f.name().to_owned()));
        stack.frames.len() - 1
    };
    if env.has_option(Options::DEBUG_CALL_STACK) {
        env.debugf(
            Options::DEBUG_CALL_STACK,
            format_args!("entering {} (depth {})", f.name(), frame_idx + 1),
        );
    }

    let outcome = fenv.eval_stmt_list(&d.body.list);
    let result = finish_call(env, &fenv, d, frame_idx, outcome);

    let frame = env.shared.call_stack.borrow_mut().frames.pop();
    if env.has_option(Options::DEBUG_CALL_STACK) {
        env.debugf(
            Options::DEBUG_CALL_STACK,
            format_args!("leaving {} (depth {})", f.name(), frame_idx + 1),
        );
    }
    debug_assert!(frame.is_some(), "call frame must still be on the stack");
    result
}

/// Resolves the function outcome to result values, running deferred
/// calls (which may recover an in-flight panic) on every exit path.
fn finish_call(
    env: &Rc<Env>,
    fenv: &Rc<Env>,
    d: &DeclaredFunc,
    frame_idx: usize,
    outcome: Flow<ExprOut>,
) -> Flow<Values> {
    let mut completed: Option<Values> = None;
    let mut escape: Option<Unwind> = None;
    match outcome {
        Ok((value, extra)) => {
            completed = Some(fall_off_results(fenv, d, value, extra));
        }
        Err(Unwind::Return(values)) => {
            completed = Some(if values.is_empty() {
                named_results(fenv, d)
            } else {
                values
            });
        }
        Err(Unwind::Panic(value)) => {
            let mut stack = env.shared.call_stack.borrow_mut();
            let frame = &mut stack.frames[frame_idx];
            frame.panic = Some(value);
            frame.panicking = true;
            if env.has_option(Options::DEBUG_PANIC_RECOVER) {
                drop(stack);
                env.debugf(Options::DEBUG_PANIC_RECOVER, format_args!("panicking in {}", fenv.name));
            }
        }
        Err(other @ (Unwind::Break(_) | Unwind::Continue(_) | Unwind::Goto(_))) => {
            escape = Some(Unwind::Fault(other.escape_fault()));
        }
        Err(fault) => escape = Some(fault),
    }

    run_deferred(env, frame_idx)?;

    if let Some(escape) = escape {
        return Err(escape);
    }
    // a deferred recover() clears the panic; otherwise it keeps travelling
    let panic = {
        let mut stack = env.shared.call_stack.borrow_mut();
        let frame = &mut stack.frames[frame_idx];
        if frame.panicking {
            frame.panic.take()
        } else {
            None
        }
    };
    if let Some(value) = panic {
        return Err(Unwind::Panic(value));
    }
    match completed {
        Some(values) => Ok(values),
        // the panic was recovered: named results (or zeros) are returned
        None => Ok(if d.results.iter().any(|r| r.name.is_some()) {
            named_results(fenv, d)
        } else {
            d.results.iter().map(|r| zero_value(&r.ty)).collect()
        }),
    }
}

/// Result values when the body falls off the end without `return`: named
/// results if declared, the last expression's value(s) otherwise.
fn fall_off_results(fenv: &Rc<Env>, d: &DeclaredFunc, value: Value, extra: Values) -> Values {
    if d.results.is_empty() {
        return Values::new();
    }
    if d.results.iter().all(|r| r.name.is_some()) && !d.results.is_empty() {
        let named = named_results(fenv, d);
        // an expression-valued last statement still wins at the REPL
        if value.is_void() && extra.is_empty() {
            return named;
        }
    }
    if !extra.is_empty() {
        extra
    } else if value.is_void() {
        d.results.iter().map(|r| zero_value(&r.ty)).collect()
    } else {
        smallvec![value]
    }
}

fn named_results(fenv: &Rc<Env>, d: &DeclaredFunc) -> Values {
    d.results
        .iter()
        .map(|r| match &r.name {
            Some(name) => fenv
                .resolve_cell(name)
                .map_or_else(|| zero_value(&r.ty), |cell| cell.borrow().clone()),
            None => zero_value(&r.ty),
        })
        .collect()
}

/// Runs the frame's deferred calls in LIFO order. A panic raised by a
/// deferred call replaces the frame's in-flight panic; a fault aborts
/// immediately.
fn run_deferred(env: &Rc<Env>, frame_idx: usize) -> Flow<()> {
    loop {
        let next = {
            let mut stack = env.shared.call_stack.borrow_mut();
            let frame = &mut stack.frames[frame_idx];
            frame.running_defers = true;
            frame.defers.pop()
        };
        let Some(DeferredCall { callee, args }) = next else {
            let mut stack = env.shared.call_stack.borrow_mut();
            stack.frames[frame_idx].running_defers = false;
            return Ok(());
        };
        match call_function(env, &callee, args, false, Pos::NONE) {
            Ok(_) => {}
            Err(Unwind::Panic(value)) => {
                let mut stack = env.shared.call_stack.borrow_mut();
                let frame = &mut stack.frames[frame_idx];
                frame.panic = Some(value);
                frame.panicking = true;
            }
            Err(fault) => {
                let mut stack = env.shared.call_stack.borrow_mut();
                stack.frames[frame_idx].running_defers = false;
                return Err(fault);
            }
        }
    }
}

/// Runs a specific frame's deferred calls; the REPL uses this for its
/// synthetic toplevel frame.
pub fn run_frame_defers(env: &Rc<Env>, frame_idx: usize) -> Flow<()> {
    if env.shared.call_stack.borrow().frames.len() <= frame_idx {
        return Ok(());
    }
    run_deferred(env, frame_idx)
}

/// Pushes a deferred call onto the innermost call frame; arguments are
/// already evaluated.
pub fn push_deferred(env: &Rc<Env>, callee: Value, args: Vec<Value>) -> Flow<()> {
    let mut stack = env.shared.call_stack.borrow_mut();
    match stack.frames.last_mut() {
        Some(frame) => {
            frame.defers.push(DeferredCall { callee, args });
            Ok(())
        }
        None => Err(EvalError::domain("defer outside function").into()),
    }
}
