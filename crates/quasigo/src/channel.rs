//! Channels, `select`, and the cooperative goroutine run queue.
//!
//! The evaluator is single-threaded: `go` enqueues the call, sends
//! buffer without blocking, and a receive that cannot proceed drains the
//! run queue (running each pending goroutine to completion) before
//! retrying. An unsatisfiable receive with an empty run queue is a
//! deadlock fault.

use std::rc::Rc;

use crate::ast::{Expr, GoStmt, SelectStmt, Stmt};
use crate::env::{Env, PendingGo};
use crate::error::{EvalError, Flow, Unwind};
use crate::stmt::void;
use crate::token::Token;
use crate::types::zero_value;
use crate::value::{value_to_type, ExprOut, Value};

/// Sends `value` on `ch`. Sending on a closed channel panics; sending on
/// a nil channel deadlocks.
pub fn chan_send(ch: &Value, value: Value) -> Flow<()> {
    match ch {
        Value::Chan(c) => {
            let elem_ty = c.elem_type();
            let value = value_to_type(&value, &elem_ty)?;
            let mut state = c.state.borrow_mut();
            if state.closed {
                return Err(Unwind::Panic(Value::str("send on closed channel")));
            }
            state.queue.push_back(value);
            Ok(())
        }
        Value::Nil => Err(deadlock()),
        other => Err(EvalError::type_(format!("send to non-channel: {other:?}")).into()),
    }
}

/// Receives from `ch`: `(value, true)` for a queued item,
/// `(zero, false)` once the channel is closed and drained. Blocks by
/// running pending goroutines until one of those holds.
pub fn chan_recv(env: &Rc<Env>, ch: &Value) -> Flow<(Value, bool)> {
    let Value::Chan(c) = ch else {
        return match ch {
            Value::Nil => Err(deadlock()),
            other => Err(EvalError::type_(format!("receive from non-channel: {other:?}")).into()),
        };
    };
    loop {
        {
            let mut state = c.state.borrow_mut();
            if let Some(value) = state.queue.pop_front() {
                return Ok((value, true));
            }
            if state.closed {
                return Ok((zero_value(&c.elem_type()), false));
            }
        }
        if !run_one_pending(env)? {
            return Err(deadlock());
        }
    }
}

pub fn chan_close(ch: &Value) -> Flow<()> {
    match ch {
        Value::Chan(c) => {
            let mut state = c.state.borrow_mut();
            if state.closed {
                return Err(Unwind::Panic(Value::str("close of closed channel")));
            }
            state.closed = true;
            Ok(())
        }
        Value::Nil => Err(Unwind::Panic(Value::str("close of nil channel"))),
        other => Err(EvalError::type_(format!("close of non-channel: {other:?}")).into()),
    }
}

/// Runs one pending goroutine to completion. An unrecovered panic or
/// fault inside it crosses to the caller.
fn run_one_pending(env: &Rc<Env>) -> Flow<bool> {
    let next = env.shared.run_queue.borrow_mut().pop_front();
    let Some(PendingGo { callee, args }) = next else {
        return Ok(false);
    };
    crate::call::call_value(env, &callee, args, crate::token::Pos::NONE)?;
    Ok(true)
}

fn deadlock() -> Unwind {
    EvalError::domain("all goroutines are asleep - deadlock").into()
}

impl Env {
    /// `go f(args)`: the callee and arguments are evaluated now, the call
    /// itself is enqueued. The parent does not wait for it.
    pub fn eval_go(self: &Rc<Self>, node: &GoStmt) -> Flow<()> {
        let Expr::Call(call) = &node.call else {
            return Err(EvalError::syntax("expression in go must be a function call")
                .at(node.pos)
                .into());
        };
        let callee = self.eval_expr1(&call.fun)?;
        let args = self.eval_exprs(&call.args)?;
        self.shared.run_queue.borrow_mut().push_back(PendingGo { callee, args });
        Ok(())
    }

    /// `select`: the first ready clause wins; with none ready, the
    /// default clause runs if present, otherwise pending goroutines run
    /// until a clause becomes ready.
    pub fn eval_select(self: &Rc<Self>, node: &SelectStmt, label: Option<Rc<str>>) -> Flow<ExprOut> {
        let clauses: Vec<&crate::ast::CommClause> = node
            .body
            .list
            .iter()
            .filter_map(|s| match s {
                Stmt::Comm(c) => Some(&**c),
                _ => None,
            })
            .collect();
        loop {
            let mut default_clause = None;
            for clause in &clauses {
                let Some(comm) = &clause.comm else {
                    default_clause = Some(clause);
                    continue;
                };
                if self.comm_ready(comm)? {
                    return self.eval_comm_clause(clause, &label);
                }
            }
            if let Some(clause) = default_clause {
                return self.eval_comm_clause(clause, &label);
            }
            if !run_one_pending(self)? {
                return Err(deadlock());
            }
        }
    }

    /// Whether a send/receive clause can proceed without blocking.
    fn comm_ready(self: &Rc<Self>, comm: &Stmt) -> Flow<bool> {
        match comm {
            Stmt::Send(send) => {
                let ch = self.eval_expr1(&send.chan)?;
                Ok(!ch.is_nil())
            }
            other => {
                let Some(recv) = comm_recv_expr(other) else {
                    return Err(EvalError::syntax(format!("invalid select case: {other}")).into());
                };
                let ch = self.eval_expr1(recv)?;
                match &ch {
                    Value::Chan(c) => {
                        let state = c.state.borrow();
                        Ok(!state.queue.is_empty() || state.closed)
                    }
                    Value::Nil => Ok(false),
                    other => Err(EvalError::type_(format!("receive from non-channel: {other:?}")).into()),
                }
            }
        }
    }

    fn eval_comm_clause(self: &Rc<Self>, clause: &crate::ast::CommClause, label: &Option<Rc<str>>) -> Flow<ExprOut> {
        let env = self.child("select case");
        if let Some(comm) = &clause.comm {
            env.eval_stmt(comm)?;
        }
        match env.eval_stmt_list(&clause.body) {
            Ok(out) => Ok(out),
            Err(Unwind::Break(None)) => Ok(void()),
            Err(Unwind::Break(Some(l))) if Some(&l) == label.as_ref() => Ok(void()),
            Err(other) => Err(other),
        }
    }
}

/// The `<-ch` operand of a receive clause: `v := <-ch`, `v = <-ch`, or a
/// bare `<-ch`.
fn comm_recv_expr(comm: &Stmt) -> Option<&Expr> {
    let expr = match comm {
        Stmt::Expr(es) => &es.x,
        Stmt::Assign(a) if a.rhs.len() == 1 => &a.rhs[0],
        _ => return None,
    };
    match expr {
        Expr::Unary(u) if u.op == Token::Arrow => Some(&u.x),
        _ => None,
    }
}
