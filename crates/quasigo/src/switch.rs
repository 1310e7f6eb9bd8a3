//! The expression switch.
//!
//! A missing tag defaults to the constant `true`. Cases are tried top to
//! bottom; the default clause is remembered and used only if nothing
//! matches. A `fallthrough` as the last statement of a clause transfers
//! control to the next clause's body without re-evaluating its
//! expressions, and may appear in the default clause too.

use std::rc::Rc;

use crate::ast::{CaseClause, Expr, Stmt, SwitchStmt};
use crate::env::Env;
use crate::error::{EvalError, Flow, Unwind};
use crate::stmt::void;
use crate::token::Token;
use crate::value::{value_to_type, values_equal, ExprOut, Value};

impl Env {
    pub fn eval_switch(self: &Rc<Self>, node: &SwitchStmt, label: Option<Rc<str>>) -> Flow<ExprOut> {
        // the scope of init bindings is the switch itself
        let env = match &node.init {
            Some(init) => {
                let env = self.child("switch");
                env.eval_stmt(init)?;
                env
            }
            None => self.clone(),
        };
        let tag = match &node.tag {
            Some(tag) => env.eval_expr1(tag)?,
            None => Value::Bool(true),
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
        if cases.is_empty() {
            return Ok(void());
        }

        let n = cases.len();
        let mut default_idx = n;
        let mut fell_through = false;
        for (i, case) in cases.iter().enumerate() {
            if !fell_through && case.list.is_empty() {
                // default runs later, only if no case matches
                default_idx = i;
            } else if fell_through || env.case_matches(&tag, &case.list)? {
                let (out, fallthrough) = env.eval_case_body(case, i == default_idx, &label)?;
                if !fallthrough {
                    return Ok(out);
                }
                fell_through = true;
            }
        }
        // even "default:" can end with fallthrough
        for (i, case) in cases.iter().enumerate().skip(default_idx) {
            let (out, fallthrough) = env.eval_case_body(case, i == default_idx, &label)?;
            if !fallthrough {
                return Ok(out);
            }
        }
        Ok(void())
    }

    fn case_matches(self: &Rc<Self>, tag: &Value, list: &[Expr]) -> Flow<bool> {
        for expr in list {
            let v = self.eval_expr1(expr)?;
            if tag.is_nil() || tag.is_void() {
                if v.is_nil() || v.is_void() {
                    return Ok(true);
                }
                continue;
            }
            let v = match value_to_type(&v, &tag.type_of()) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if values_equal(&v, tag) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Runs one clause body in its own frame. Returns the clause result
    /// and whether it ended in `fallthrough`.
    fn eval_case_body(
        self: &Rc<Self>,
        case: &CaseClause,
        is_default: bool,
        label: &Option<Rc<str>>,
    ) -> Flow<(ExprOut, bool)> {
        if case.body.is_empty() {
            return Ok((void(), false));
        }
        let mut body = &case.body[..];
        let mut fallthrough = false;
        if let Some(Stmt::Branch(last)) = body.last() {
            if last.tok == Token::Fallthrough {
                fallthrough = true;
                body = &body[..body.len() - 1];
            }
        }
        let env = self.child(if is_default { "default:" } else { "case:" });
        match env.eval_stmt_list(body) {
            Ok(out) => Ok((out, fallthrough)),
            Err(Unwind::Break(None)) => Ok((void(), false)),
            Err(Unwind::Break(Some(l))) if Some(&l) == label.as_ref() => Ok((void(), false)),
            Err(other) => Err(other),
        }
    }
}

pub(crate) fn bad_switch_header(stmt: &Stmt) -> EvalError {
    EvalError::syntax(format!(
        "invalid type switch expression, expecting x.(type) or v := x.(type), found {stmt}"
    ))
}
