//! `for` loops: the 3-clause form and `range` over channels, maps,
//! slices, arrays, strings, and pointers to arrays.

use std::rc::Rc;

use crate::ast::{Expr, ForStmt, RangeStmt};
use crate::env::Env;
use crate::error::{EvalError, Flow, Unwind};
use crate::stmt::{assign_place, void};
use crate::token::Token;
use crate::types::{self, zero_value, Kind, Type};
use crate::value::{ExprOut, Value};

impl Env {
    pub fn eval_for(self: &Rc<Self>, node: &ForStmt, label: Option<Rc<str>>) -> Flow<ExprOut> {
        let env = match &node.init {
            Some(init) => {
                let env = self.child("for {}");
                env.eval_stmt(init)?;
                env
            }
            None => self.clone(),
        };
        loop {
            if let Some(cond) = &node.cond {
                let value = env.eval_expr1(cond)?;
                match value.as_bool() {
                    Some(true) => {}
                    Some(false) => break,
                    None => {
                        return Err(EvalError::type_(format!(
                            "for: invalid condition {value:?}, expecting bool"
                        ))
                        .at(node.pos)
                        .into())
                    }
                }
            }
            if !env.eval_loop_body(&node.body.list, &label)? {
                break;
            }
            if let Some(post) = &node.post {
                env.eval_stmt(post)?;
            }
        }
        Ok(void())
    }

    pub fn eval_for_range(self: &Rc<Self>, node: &RangeStmt, label: Option<Rc<str>>) -> Flow<ExprOut> {
        let container = self.eval_expr1(&node.x)?;
        if container.is_nil() || container.is_void() {
            return Err(EvalError::domain(format!(
                "invalid for range: cannot iterate on nil: {}",
                node.x
            ))
            .at(node.pos)
            .into());
        }
        match &container {
            Value::Chan(_) => self.range_channel(&container, node, &label),
            Value::Map(m) => {
                let pairs = m.pairs();
                self.range_pairs(pairs, m.key_type(), m.elem_type(), node, &label)
            }
            Value::Slice(s) | Value::Array(s) => {
                let pairs = indexed_pairs(s);
                self.range_pairs(pairs, types::primitive(Kind::Int), s.elem_type(), node, &label)
            }
            Value::Str(s) => {
                // codepoint-wise: key is the byte offset, value the rune
                let pairs: Vec<(Value, Value)> = s
                    .char_indices()
                    .map(|(i, c)| (Value::int(i as i64), Value::rune(c)))
                    .collect();
                self.range_pairs(
                    pairs,
                    types::primitive(Kind::Int),
                    types::primitive(Kind::Int32),
                    node,
                    &label,
                )
            }
            Value::Ptr(p) => {
                let elem = p.cell.borrow().clone();
                match &elem {
                    Value::Array(s) => {
                        let pairs = indexed_pairs(s);
                        self.range_pairs(pairs, types::primitive(Kind::Int), s.elem_type(), node, &label)
                    }
                    other => Err(invalid_range_target(other).at(node.pos).into()),
                }
            }
            other => Err(invalid_range_target(other).at(node.pos).into()),
        }
    }

    fn range_channel(self: &Rc<Self>, ch: &Value, node: &RangeStmt, label: &Option<Rc<str>>) -> Flow<ExprOut> {
        if node.value.is_some() {
            return Err(EvalError::type_(
                "range over channel permits at most one iteration variable",
            )
            .at(node.pos)
            .into());
        }
        let elem_ty = match ch {
            Value::Chan(c) => c.elem_type(),
            _ => types::empty_interface(),
        };
        let knode = non_blank(node.key.as_ref());
        if node.tok == Token::Define {
            let env = self.child("range channel {}");
            let kcell = env.define_iter_var(knode, &elem_ty)?;
            loop {
                let (recv, ok) = crate::channel::chan_recv(&env, ch)?;
                if !ok {
                    break;
                }
                if let Some(cell) = &kcell {
                    *cell.borrow_mut() = recv;
                }
                if !env.eval_loop_body(&node.body.list, label)? {
                    break;
                }
            }
        } else {
            loop {
                let (recv, ok) = crate::channel::chan_recv(self, ch)?;
                if !ok {
                    break;
                }
                // the left-hand expression is re-evaluated each iteration
                if let Some(key) = knode {
                    let place = self.eval_place(key)?;
                    assign_place(&place, recv)?;
                }
                if !self.eval_loop_body(&node.body.list, label)? {
                    break;
                }
            }
        }
        Ok(void())
    }

    fn range_pairs(
        self: &Rc<Self>,
        pairs: Vec<(Value, Value)>,
        key_ty: Type,
        elem_ty: Type,
        node: &RangeStmt,
        label: &Option<Rc<str>>,
    ) -> Flow<ExprOut> {
        let knode = non_blank(node.key.as_ref());
        let vnode = non_blank(node.value.as_ref());
        if node.tok == Token::Define {
            // a single variable pair is reused across iterations
            let env = self.child("range {}");
            let kcell = env.define_iter_var(knode, &key_ty)?;
            let vcell = env.define_iter_var(vnode, &elem_ty)?;
            for (key, value) in pairs {
                if let Some(cell) = &kcell {
                    *cell.borrow_mut() = key;
                }
                if let Some(cell) = &vcell {
                    *cell.borrow_mut() = value;
                }
                if !env.eval_loop_body(&node.body.list, label)? {
                    break;
                }
            }
        } else {
            for (key, value) in pairs {
                // left-hand expressions are re-evaluated each iteration
                if let Some(kexpr) = knode {
                    let place = self.eval_place(kexpr)?;
                    assign_place(&place, key)?;
                }
                if let Some(vexpr) = vnode {
                    let place = self.eval_place(vexpr)?;
                    assign_place(&place, value)?;
                }
                if !self.eval_loop_body(&node.body.list, label)? {
                    break;
                }
            }
        }
        Ok(void())
    }

    /// One pass over the loop body in a fresh frame. Returns whether the
    /// loop should continue; `break`/`continue` addressed to an outer
    /// label keep travelling.
    pub fn eval_loop_body(self: &Rc<Self>, body: &[crate::ast::Stmt], label: &Option<Rc<str>>) -> Flow<bool> {
        let inner = self.child("loop body");
        match inner.eval_stmt_list(body) {
            Ok(_) => Ok(true),
            Err(Unwind::Break(None)) => Ok(false),
            Err(Unwind::Break(Some(l))) if Some(&l) == label.as_ref() => Ok(false),
            Err(Unwind::Continue(None)) => Ok(true),
            Err(Unwind::Continue(Some(l))) if Some(&l) == label.as_ref() => Ok(true),
            Err(other) => Err(other),
        }
    }

    fn define_iter_var(
        self: &Rc<Self>,
        node: Option<&Expr>,
        ty: &Type,
    ) -> Flow<Option<Rc<std::cell::RefCell<Value>>>> {
        let Some(expr) = node else { return Ok(None) };
        let Expr::Ident(id) = expr else {
            return Err(EvalError::syntax(format!("non-name {expr} in range declaration")).into());
        };
        self.define_var(id.name.clone(), Some(ty.clone()), zero_value(ty));
        Ok(self.resolve_cell(&id.name))
    }
}

fn indexed_pairs(s: &crate::value::SliceVal) -> Vec<(Value, Value)> {
    (0..s.len())
        .map(|i| (Value::int(i as i64), s.get(i).unwrap_or(Value::Nil)))
        .collect()
}

fn non_blank(node: Option<&Expr>) -> Option<&Expr> {
    match node {
        Some(Expr::Ident(id)) if id.is_blank() => None,
        other => other,
    }
}

fn invalid_range_target(v: &Value) -> EvalError {
    EvalError::type_(format!(
        "invalid for range: expecting array, channel, map, slice, string, or pointer to array, found {v:?}"
    ))
}
