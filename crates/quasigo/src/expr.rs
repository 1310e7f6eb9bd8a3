//! The expression evaluator.
//!
//! `eval_expr` returns the primary value plus the full tuple for
//! multi-valued forms (map index, comma-ok type assertion, channel
//! receive, multi-return calls); `eval_expr1` demands a single value,
//! warning when extra values are discarded, and turns a failed
//! single-value type assertion into an error.

use std::rc::Rc;

use smallvec::smallvec;

use crate::arith::{eval_binary_op, eval_unary_op, to_int};
use crate::ast::{Expr, Ident, SelectorExpr, SliceExpr, TypeAssertExpr, UnaryExpr};
use crate::env::Env;
use crate::error::{EvalError, Flow, Unwind};
use crate::token::Token;
use crate::types::{zero_value, Kind};
use crate::value::{value_to_type, ExprOut, FuncVal, Value, Values};

impl Env {
    /// Evaluates `x` to exactly one value.
    pub fn eval_expr1(self: &Rc<Self>, x: &Expr) -> Flow<Value> {
        let mut x = x;
        loop {
            match x {
                Expr::Paren(p) => {
                    x = &p.x;
                }
                // in single-value context a failed assertion fails loudly
                Expr::TypeAssert(t) => return Ok(self.eval_type_assert(t, true)?.0),
                _ => break,
            }
        }
        let (value, extra) = self.eval_expr(x)?;
        if extra.len() > 1 {
            self.warnf(format_args!(
                "expression returned {} values, using only the first one: {x}",
                extra.len()
            ));
        }
        Ok(value)
    }

    pub fn eval_expr(self: &Rc<Self>, x: &Expr) -> Flow<ExprOut> {
        match x {
            Expr::Basic(lit) => Ok((crate::literal::eval_literal(lit)?, Values::new())),
            Expr::Ident(id) => Ok((self.eval_ident(id)?, Values::new())),
            Expr::Binary(b) => self.eval_binary(b.op, b.op_pos, &b.x, &b.y),
            Expr::Unary(u) => self.eval_unary(u),
            Expr::Call(c) => self.eval_call(c),
            Expr::Index(ix) => self.eval_index(&ix.x, &ix.index),
            Expr::Slice(s) => self.eval_slice(s),
            Expr::Selector(sel) => self.eval_selector(sel),
            Expr::Star(s) => {
                let val = self.eval_expr1(&s.x)?;
                match val {
                    Value::Ptr(p) => Ok((p.cell.borrow().clone(), Values::new())),
                    Value::Nil => Err(EvalError::domain("nil pointer dereference").at(s.pos).into()),
                    other => Err(EvalError::type_(format!("dereference of non-pointer: {other:?}"))
                        .at(s.pos)
                        .into()),
                }
            }
            Expr::Paren(p) => self.eval_expr(&p.x),
            Expr::TypeAssert(t) => self.eval_type_assert(t, false),
            Expr::Composite(c) => self.eval_composite_lit(c, None),
            Expr::FuncLit(f) => self.eval_func_lit(f),
            other => Err(EvalError::type_(format!("not an expression: {other}"))
                .at(other.pos())
                .into()),
        }
    }

    pub fn eval_exprs(self: &Rc<Self>, xs: &[Expr]) -> Flow<Vec<Value>> {
        let mut out = Vec::with_capacity(xs.len());
        for x in xs {
            out.push(self.eval_expr1(x)?);
        }
        Ok(out)
    }

    /// Evaluates `xs` expecting `expected` values in total: either one
    /// value per expression, or a single multi-valued expression
    /// supplying all of them.
    pub fn eval_exprs_multi(self: &Rc<Self>, xs: &[Expr], expected: usize) -> Flow<Vec<Value>> {
        if xs.len() == expected {
            return self.eval_exprs(xs);
        }
        if xs.len() != 1 {
            return Err(EvalError::type_(format!(
                "value count mismatch: cannot assign {} values to {expected} places",
                xs.len()
            ))
            .into());
        }
        let (value, extra) = self.eval_expr(&xs[0])?;
        let mut values: Vec<Value> = if extra.is_empty() {
            vec![value]
        } else {
            extra.into_iter().collect()
        };
        if values.len() < expected {
            return Err(EvalError::type_(format!(
                "value count mismatch: expression returned {} values, cannot assign them to {expected} places: {}",
                values.len(),
                xs[0]
            ))
            .into());
        }
        if values.len() > expected {
            self.warnf(format_args!(
                "expression returned {} values, using only {expected} of them: {}",
                values.len(),
                xs[0]
            ));
            values.truncate(expected);
        }
        Ok(values)
    }

    fn eval_ident(self: &Rc<Self>, id: &Ident) -> Result<Value, EvalError> {
        if id.is_blank() {
            return Err(EvalError::resolution("cannot use _ as value").at(id.pos));
        }
        self.resolve_ident(id)
            .ok_or_else(|| EvalError::resolution(format!("undefined identifier: {}", id.name)).at(id.pos))
    }

    fn eval_binary(self: &Rc<Self>, op: Token, op_pos: crate::token::Pos, x: &Expr, y: &Expr) -> Flow<ExprOut> {
        if matches!(op, Token::LAnd | Token::LOr) {
            let xv = self.eval_expr1(x)?;
            let Some(xb) = xv.as_bool() else {
                return Err(self.logical_operand_error(op, &xv, op_pos));
            };
            // the right operand is evaluated only when the left does not
            // already decide the outcome
            if (op == Token::LOr) == xb {
                return Ok((xv, Values::new()));
            }
            let yv = self.eval_expr1(y)?;
            if yv.as_bool().is_none() {
                return Err(self.logical_operand_error(op, &yv, op_pos));
            }
            return Ok((yv, Values::new()));
        }
        let xv = self.eval_expr1(x)?;
        let yv = self.eval_expr1(y)?;
        Ok((eval_binary_op(op, &xv, &yv).map_err(|e| e.at(op_pos))?, Values::new()))
    }

    fn logical_operand_error(&self, op: Token, v: &Value, pos: crate::token::Pos) -> Unwind {
        EvalError::type_(format!(
            "unsupported type in logical operation {op}: expecting bool, found {v:?}"
        ))
        .at(pos)
        .into()
    }

    fn eval_unary(self: &Rc<Self>, u: &UnaryExpr) -> Flow<ExprOut> {
        match u.op {
            Token::Quote | Token::Quasiquote | Token::Unquote | Token::UnquoteSplice | Token::Macro => {
                self.eval_quote_expr(u)
            }
            Token::Arrow => {
                let ch = self.eval_expr1(&u.x)?;
                let (value, ok) = crate::channel::chan_recv(self, &ch)?;
                let pair = smallvec![value.clone(), Value::Bool(ok)];
                Ok((value, pair))
            }
            Token::And => {
                let value = self.eval_addr_of(&u.x)?;
                Ok((value, Values::new()))
            }
            _ => {
                let xv = self.eval_expr1(&u.x)?;
                Ok((eval_unary_op(u.op, &xv).map_err(|e| e.at(u.op_pos))?, Values::new()))
            }
        }
    }

    /// `&x`: a pointer sharing the binding cell of an addressable place,
    /// or a fresh cell for a composite literal.
    fn eval_addr_of(self: &Rc<Self>, x: &Expr) -> Flow<Value> {
        if let Expr::Composite(_) = x {
            let value = self.eval_expr1(x)?;
            let ty = value.type_of();
            return Ok(Value::new_ptr(ty, Rc::new(std::cell::RefCell::new(value))));
        }
        if let Expr::Ident(id) = x {
            if let Some(cell) = self.resolve_cell(&id.name) {
                let ty = cell.borrow().type_of();
                return Ok(Value::new_ptr(ty, cell));
            }
            return Err(EvalError::resolution(format!("undefined identifier: {}", id.name))
                .at(id.pos)
                .into());
        }
        Err(EvalError::type_(format!("cannot take the address of {x}")).into())
    }

    fn eval_index(self: &Rc<Self>, xe: &Expr, index: &Expr) -> Flow<ExprOut> {
        // left-to-right order of evaluation
        let mut obj = self.eval_expr1(xe)?;
        let idx = self.eval_expr1(index)?;
        if let Value::Ptr(p) = &obj {
            let inner = p.cell.borrow().clone();
            obj = inner;
        }
        match &obj {
            Value::Map(m) => {
                let key = value_to_type(&idx, &m.key_type())?;
                let (value, present) = m.index(&key)?;
                let pair = smallvec![value.clone(), Value::Bool(present)];
                Ok((value, pair))
            }
            Value::Array(s) | Value::Slice(s) => {
                let i = to_int(&idx)
                    .ok_or_else(|| EvalError::type_(format!("invalid index, expecting an int: {idx:?}")))?;
                let value = usize::try_from(i).ok().and_then(|i| s.get(i)).ok_or_else(|| {
                    EvalError::domain(format!("index out of range: {i} with length {}", s.len()))
                })?;
                Ok((value, Values::new()))
            }
            Value::Str(s) => {
                let i = to_int(&idx)
                    .ok_or_else(|| EvalError::type_(format!("invalid index, expecting an int: {idx:?}")))?;
                let byte = usize::try_from(i)
                    .ok()
                    .and_then(|i| s.as_bytes().get(i).copied())
                    .ok_or_else(|| {
                        EvalError::domain(format!("index out of range: {i} with length {}", s.len()))
                    })?;
                Ok((Value::Uint(Kind::Uint8, u64::from(byte)), Values::new()))
            }
            Value::Nil => Err(EvalError::domain("index of nil value").into()),
            other => Err(EvalError::type_(format!(
                "unsupported index operation on {other:?}: not an array, map, slice or string"
            ))
            .into()),
        }
    }

    fn eval_slice(self: &Rc<Self>, node: &SliceExpr) -> Flow<ExprOut> {
        let mut obj = self.eval_expr1(&node.x)?;
        if let Value::Ptr(p) = &obj {
            let inner = p.cell.borrow().clone();
            obj = inner;
        }
        let len = match &obj {
            Value::Array(s) | Value::Slice(s) => s.len(),
            Value::Str(s) => s.len(),
            other => {
                return Err(EvalError::type_(format!(
                    "slice operation expects array, slice or string, found {other:?}"
                ))
                .into())
            }
        };
        let mut bound = |e: &Option<Expr>, default: usize| -> Flow<usize> {
            match e {
                None => Ok(default),
                Some(e) => {
                    let v = self.eval_expr1(e)?;
                    let i = to_int(&v)
                        .ok_or_else(|| EvalError::type_(format!("invalid slice bound: {v:?}")))?;
                    usize::try_from(i)
                        .map_err(|_| EvalError::domain(format!("invalid slice bound: {i}")).into())
                }
            }
        };
        let lo = bound(&node.low, 0)?;
        let hi = bound(&node.high, len)?;
        let max = bound(&node.max, hi)?;
        let out_of_range =
            || EvalError::domain(format!("slice bounds out of range [{lo}:{hi}:{max}] with length {len}"));
        match &obj {
            Value::Str(s) => {
                if lo > hi || hi > len || max < hi {
                    return Err(out_of_range().into());
                }
                let sub = String::from_utf8_lossy(&s.as_bytes()[lo..hi]).into_owned();
                Ok((Value::str(sub), Values::new()))
            }
            Value::Array(s) | Value::Slice(s) => {
                let sub = s.subslice(lo, hi, max).ok_or_else(out_of_range)?;
                Ok((Value::Slice(sub), Values::new()))
            }
            _ => unreachable!("kind checked above"),
        }
    }

    /// `x.sel`: package symbol, struct field, or method, resolved by the
    /// kind of `x`.
    fn eval_selector(self: &Rc<Self>, node: &SelectorExpr) -> Flow<ExprOut> {
        let obj = self.eval_expr1(&node.x)?;
        let name = &*node.sel.name;
        let found = match &obj {
            Value::Package(pkg) => {
                return match pkg.pkg.binds.get(name) {
                    Some(bind) => Ok((bind.clone(), Values::new())),
                    None => Err(EvalError::resolution(format!(
                        "package {} {:?} has no symbol {name}",
                        pkg.name, pkg.path
                    ))
                    .at(node.sel.pos)
                    .into()),
                }
            }
            Value::Ptr(p) => {
                let elem = p.cell.borrow().clone();
                let mut found = None;
                if let Value::Struct(s) = &elem {
                    if let Some((i, _)) = s.ty.field_by_name(name) {
                        found = s.get(i);
                    }
                }
                if found.is_none() {
                    // pointer-receiver methods take precedence
                    found = bind_method(&p.elem_ty, name, &obj, Some(true))
                        .or_else(|| bind_method(&p.elem_ty, name, &elem, Some(false)));
                }
                found
            }
            Value::Struct(s) => {
                let field = s.ty.field_by_name(name).and_then(|(i, _)| s.get(i));
                field.or_else(|| bind_method(&s.ty, name, &obj, None))
            }
            other => bind_method(&other.type_of(), name, other, None),
        };
        match found {
            Some(value) => Ok((value, Values::new())),
            None => Err(EvalError::resolution(format!(
                "<{}> has no field or method {name}",
                obj.type_of()
            ))
            .at(node.sel.pos)
            .into()),
        }
    }

    /// `x.(T)`: on success the converted value; on mismatch, an error in
    /// single-value context, `(zero(T), false)` in comma-ok context.
    fn eval_type_assert(self: &Rc<Self>, node: &TypeAssertExpr, panic_on_fail: bool) -> Flow<ExprOut> {
        let Some(ty_expr) = &node.ty else {
            return Err(EvalError::syntax("x.(type) is only valid inside a type switch").into());
        };
        let val = self.eval_expr1(&node.x)?;
        let t2 = self.eval_type(ty_expr)?;
        if !val.is_nil() && !val.is_void() {
            let t1 = val.type_of();
            if t1.assignable_to(&t2) {
                let converted = value_to_type(&val, &t2)?;
                return Ok((converted, Values::new()));
            }
            if panic_on_fail {
                return Err(EvalError::domain(format!(
                    "type assertion failed: {val} <{t1}> is not a <{t2}>"
                ))
                .into());
            }
        } else if panic_on_fail {
            return Err(EvalError::domain(format!("type assertion failed: nil is not a <{t2}>")).into());
        }
        let zero = zero_value(&t2);
        let pair = smallvec![zero.clone(), Value::Bool(false)];
        Ok((zero, pair))
    }
}

/// Looks up a method on a (named) type and binds the receiver.
/// `want_ptr_recv` restricts the receiver form: `Some(true)` matches
/// pointer-receiver methods only, `Some(false)` value-receiver only,
/// `None` either.
fn bind_method(ty: &crate::types::Type, name: &str, receiver: &Value, want_ptr_recv: Option<bool>) -> Option<Value> {
    let def = ty.method_by_name(name)?;
    if let Some(want) = want_ptr_recv {
        if def.ptr_recv != want {
            return None;
        }
    }
    match def.func {
        Value::Func(f) => Some(Value::Func(FuncVal {
            ty: f.ty.clone(),
            imp: f.imp.clone(),
            recv: Some(Box::new(receiver.clone())),
        })),
        other => Some(other),
    }
}
