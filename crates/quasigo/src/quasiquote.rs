//! Evaluation of quotation expressions.
//!
//! `quote{…}` evaluates to the quoted AST fragment as a value.
//! `quasiquote{…}` walks its fragment substituting `unquote` /
//! `unquote_splice` content evaluated at depth 0; nesting quasiquotes
//! increments the depth, unquoting decrements it. A `MACRO`-tagged
//! unary (a block in expression position) simply evaluates its block.

use std::rc::Rc;

use crate::ast::{BlockStmt, Expr, Node, Stmt, UnaryExpr};
use crate::ast_walk::unwrap_trivial;
use crate::env::Env;
use crate::error::{EvalError, Flow};
use crate::options::Options;
use crate::parser::make_quote;
use crate::token::Token;
use crate::value::{ExprOut, Value, Values};

/// The quoted content of a §4.7-encoded quotation: the body of the
/// zero-parameter function literal, collapsed to a single node.
pub fn quoted_node(body: &BlockStmt) -> Node {
    match body.list.len() {
        0 => Node::Stmt(Stmt::Block(Box::new(body.clone()))),
        1 => unwrap_trivial(Node::Stmt(body.list[0].clone())),
        _ => Node::Stmt(Stmt::Block(Box::new(body.clone()))),
    }
}

/// The quotation shape test: a unary whose operand is a function literal
/// carrying the quoted block.
pub fn quote_body(u: &UnaryExpr) -> Option<&BlockStmt> {
    match &u.x {
        Expr::FuncLit(f) => Some(&f.body),
        _ => None,
    }
}

impl Env {
    pub fn eval_quote_expr(self: &Rc<Self>, u: &UnaryExpr) -> Flow<ExprOut> {
        let Some(body) = quote_body(u) else {
            return Err(EvalError::syntax(format!("malformed quotation: {}", Expr::Unary(Box::new(u.clone()))))
                .at(u.op_pos)
                .into());
        };
        match u.op {
            Token::Quote => Ok((Value::Ast(Rc::new(quoted_node(body))), Values::new())),
            Token::Quasiquote => {
                let node = self.quasi_expand(quoted_node(body), 1)?;
                self.debugf(Options::DEBUG_QUASIQUOTE, format_args!("quasiquote expanded to: {node}"));
                Ok((Value::Ast(Rc::new(node)), Values::new()))
            }
            Token::Macro => {
                // a block in expression position: evaluate it
                let inner = self.child("block");
                inner.eval_stmt_list(&body.list)
            }
            other => Err(EvalError::syntax(format!("{other} outside quasiquote")).at(u.op_pos).into()),
        }
    }

    /// Rewrites `node` at the given quasiquotation depth, evaluating
    /// unquoted fragments once the depth reaches zero.
    fn quasi_expand(self: &Rc<Self>, node: Node, depth: u32) -> Flow<Node> {
        if let Node::Expr(Expr::Unary(u)) = &node {
            if let Some(body) = quote_body(u) {
                match u.op {
                    Token::Quote => {
                        let inner = self.quasi_expand(quoted_node(body), depth)?;
                        return make_quote(Token::Quote, u.op_pos, Some(inner))
                            .map(Node::Expr)
                            .map_err(|msg| EvalError::macro_(msg).into());
                    }
                    Token::Quasiquote => {
                        let inner = self.quasi_expand(quoted_node(body), depth + 1)?;
                        return make_quote(Token::Quasiquote, u.op_pos, Some(inner))
                            .map(Node::Expr)
                            .map_err(|msg| EvalError::macro_(msg).into());
                    }
                    Token::Unquote => {
                        if depth == 1 {
                            self.debugf(
                                Options::DEBUG_QUASIQUOTE,
                                format_args!("unquote evaluating: {}", quoted_node(body)),
                            );
                            let value = self.eval_quoted_content(body)?;
                            return value_to_node(&value);
                        }
                        let inner = self.quasi_expand(quoted_node(body), depth - 1)?;
                        return make_quote(Token::Unquote, u.op_pos, Some(inner))
                            .map(Node::Expr)
                            .map_err(|msg| EvalError::macro_(msg).into());
                    }
                    Token::UnquoteSplice => {
                        if depth == 1 {
                            return Err(EvalError::macro_(
                                "unquote_splice must appear inside a statement or expression sequence",
                            )
                            .at(u.op_pos)
                            .into());
                        }
                        let inner = self.quasi_expand(quoted_node(body), depth - 1)?;
                        return make_quote(Token::UnquoteSplice, u.op_pos, Some(inner))
                            .map(Node::Expr)
                            .map_err(|msg| EvalError::macro_(msg).into());
                    }
                    _ => {}
                }
            }
        }

        let size = node.size();
        if size == 0 {
            return Ok(node);
        }
        let mut out = node.new_like();
        if out.is_seq() {
            for i in 0..size {
                // unwrap so an unquote inside an expression statement is
                // seen at the quotation level (it may substitute a
                // statement, which re-wraps on append)
                let child = unwrap_trivial(node.get(i));
                if let Some(splice_body) = splice_at_depth1(&child, depth) {
                    let value = self.eval_quoted_content(splice_body)?;
                    for spliced in splice_values(&value)? {
                        out.append(spliced).map_err(EvalError::macro_)?;
                    }
                    continue;
                }
                let walked = self.quasi_expand(child, depth)?;
                out.append(walked).map_err(EvalError::macro_)?;
            }
        } else {
            for i in 0..size {
                let child = node.get(i);
                if child.is_none() {
                    continue;
                }
                let walked = self.quasi_expand(child, depth)?;
                out.set(i, walked).map_err(EvalError::macro_)?;
            }
        }
        Ok(out)
    }

    /// Evaluates unquoted content: a single expression evaluates as one,
    /// anything else runs as a block.
    fn eval_quoted_content(self: &Rc<Self>, body: &BlockStmt) -> Flow<Value> {
        match quoted_node(body) {
            Node::Expr(x) => self.eval_expr1(&x),
            _ => {
                let inner = self.child("unquote");
                Ok(inner.eval_stmt_list(&body.list)?.0)
            }
        }
    }
}

/// Recognizes an `unquote_splice{…}` child at substitution depth.
fn splice_at_depth1(child: &Node, depth: u32) -> Option<&BlockStmt> {
    if depth != 1 {
        return None;
    }
    match child {
        Node::Expr(Expr::Unary(u)) if u.op == Token::UnquoteSplice => quote_body(u),
        Node::Stmt(Stmt::Expr(es)) => match &es.x {
            Expr::Unary(u) if u.op == Token::UnquoteSplice => quote_body(u),
            _ => None,
        },
        _ => None,
    }
}

/// Converts an evaluated value back into an AST node.
pub fn value_to_node(value: &Value) -> Flow<Node> {
    match value {
        Value::Ast(node) => Ok((**node).clone()),
        Value::Nil => Ok(Node::Expr(Expr::ident("nil", crate::token::Pos::NONE))),
        Value::Bool(b) => Ok(Node::Expr(Expr::ident(if *b { "true" } else { "false" }, crate::token::Pos::NONE))),
        Value::Int(_, _) | Value::Uint(_, _) => Ok(synth_literal(Token::Int, value.to_string())),
        Value::Float(_, _) => Ok(synth_literal(Token::Float, value.to_string())),
        Value::Str(s) => Ok(synth_literal(Token::Str, format!("{s:?}"))),
        other => Err(EvalError::macro_(format!("cannot convert {other:?} to a syntax node")).into()),
    }
}

fn synth_literal(kind: Token, text: String) -> Node {
    Node::Expr(Expr::Basic(crate::ast::BasicLit {
        kind,
        value: text,
        pos: crate::token::Pos::NONE,
    }))
}

/// The node list contributed by an `unquote_splice` value: the children
/// of a sequence node, the elements of a slice of fragments, or a single
/// fragment.
fn splice_values(value: &Value) -> Flow<Vec<Node>> {
    match value {
        Value::Ast(node) => {
            if node.is_seq() {
                Ok((0..node.size()).map(|i| node.get(i)).collect())
            } else {
                Ok(vec![(**node).clone()])
            }
        }
        Value::Slice(s) | Value::Array(s) => {
            let mut out = Vec::with_capacity(s.len());
            for v in s.to_vec() {
                out.push(value_to_node(&v)?);
            }
            Ok(out)
        }
        other => value_to_node(other).map(|n| vec![n]),
    }
}
