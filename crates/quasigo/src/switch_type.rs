//! The type switch.
//!
//! The governing expression takes the forms `x.(type)` or
//! `v := x.(type)`. The dynamic type of `x` is tested against each
//! case's type list; the first `assignable_to` match wins. The bound
//! variable, if present, is defined with the matched case's type in a
//! regular clause and with the interface type of `x` in the default
//! clause.

use std::rc::Rc;

use crate::ast::{CaseClause, Expr, Ident, Stmt, TypeSwitchStmt};
use crate::env::Env;
use crate::error::{Flow, Unwind};
use crate::stmt::void;
use crate::switch::bad_switch_header;
use crate::token::Token;
use crate::types::{self, Type};
use crate::value::{value_to_type, ExprOut, Value};

impl Env {
    pub fn eval_type_switch(self: &Rc<Self>, node: &TypeSwitchStmt, label: Option<Rc<str>>) -> Flow<ExprOut> {
        // init and assign bindings scope over the whole switch
        let env = match &node.init {
            Some(init) => {
                let env = self.child("type switch");
                env.eval_stmt(init)?;
                env
            }
            None => self.clone(),
        };
        let (varname, expr) = extract_assert(&node.assign)?;
        let val = env.eval_expr1(expr)?;
        let dynamic: Option<Type> = if val.is_nil() || val.is_void() {
            None
        } else {
            Some(val.type_of())
        };

        let cases: Vec<&CaseClause> = node
            .body
            .list
            .iter()
            .filter_map(|s| match s {
                Stmt::Case(c) => Some(&**c),
                _ => None,
            })
            .collect();
        let mut default_case: Option<&CaseClause> = None;
        for case in &cases {
            if case.list.is_empty() {
                default_case = Some(case);
            } else if let Some(matched) = env.typecase_matches(dynamic.as_ref(), &case.list)? {
                return env.eval_typecase_body(varname, &matched, &val, case, false, &label);
            }
        }
        if let Some(case) = default_case {
            return env.eval_typecase_body(varname, &types::empty_interface(), &val, case, true, &label);
        }
        Ok(void())
    }

    fn typecase_matches(self: &Rc<Self>, dynamic: Option<&Type>, list: &[Expr]) -> Flow<Option<Type>> {
        for expr in list {
            match self.eval_type_or_nil(expr)? {
                None => {
                    // a literal nil case matches an untyped nil value
                    if dynamic.is_none() {
                        return Ok(Some(types::empty_interface()));
                    }
                }
                Some(t) => {
                    if let Some(vt) = dynamic {
                        if vt.assignable_to(&t) {
                            return Ok(Some(t));
                        }
                    }
                }
            }
        }
        Ok(None)
    }

    fn eval_typecase_body(
        self: &Rc<Self>,
        varname: Option<&Ident>,
        matched: &Type,
        val: &Value,
        case: &CaseClause,
        is_default: bool,
        label: &Option<Rc<str>>,
    ) -> Flow<ExprOut> {
        if case.body.is_empty() {
            return Ok(void());
        }
        let env = self.child(if is_default { "default:" } else { "case:" });
        if let Some(name) = varname {
            // the bound variable carries the matched case's type and the
            // original value; the default clause keeps the interface view
            let bound = if is_default || val.is_nil() || val.is_void() {
                val.clone()
            } else {
                value_to_type(val, matched)?
            };
            env.define_var(name.name.clone(), Some(matched.clone()), bound);
        }
        match env.eval_stmt_list(&case.body) {
            Ok(out) => Ok(out),
            Err(Unwind::Break(None)) => Ok(void()),
            Err(Unwind::Break(Some(l))) if Some(&l) == label.as_ref() => Ok(void()),
            Err(other) => Err(other),
        }
    }
}

/// Pulls `(v, x)` out of `v := x.(type)` or `(None, x)` out of a bare
/// `x.(type)`.
fn extract_assert(stmt: &Stmt) -> Flow<(Option<&Ident>, &Expr)> {
    match stmt {
        Stmt::Expr(es) => match &es.x {
            Expr::TypeAssert(t) if t.ty.is_none() => Ok((None, &t.x)),
            _ => Err(bad_switch_header(stmt).into()),
        },
        Stmt::Assign(a) if a.tok == Token::Define && a.lhs.len() == 1 && a.rhs.len() == 1 => {
            let Expr::Ident(name) = &a.lhs[0] else {
                return Err(bad_switch_header(stmt).into());
            };
            match &a.rhs[0] {
                Expr::TypeAssert(t) if t.ty.is_none() => Ok((Some(name), &t.x)),
                _ => Err(bad_switch_header(stmt).into()),
            }
        }
        _ => Err(bad_switch_header(stmt).into()),
    }
}
