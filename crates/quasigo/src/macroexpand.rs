//! The macro-expansion engine.
//!
//! Two public operations:
//!
//! - `macro_expand`: iterate single-step expansion to a fixed point;
//! - `macro_expand_codewalk`: pre-order traversal of the whole tree,
//!   attempting expansion at each node before recursing into children,
//!   with the quasiquotation depth threaded through the recursion.
//!
//! Quotation discipline: `quote` at depth 0 is opaque; `quasiquote`
//! increments the depth; `unquote`/`unquote_splice` decrement it; at
//! depth ≥ 1 no expansion happens at the current node, but recursion
//! continues to find inner unquotes. Termination of the fixed point is
//! the macro author's responsibility.

use std::rc::Rc;

use crate::ast::{EmptyStmt, Expr, Node, Stmt};
use crate::ast_walk::{collapse_singleton, unwrap_trivial};
use crate::env::Env;
use crate::error::{EvalError, Flow};
use crate::options::Options;
use crate::parser::make_quote;
use crate::quasiquote::{quote_body, value_to_node};
use crate::token::{Pos, Token};
use crate::value::{MacroVal, Value};

impl Env {
    /// Repeats single-step expansion until a pass reports no change.
    pub fn macro_expand(self: &Rc<Self>, node: Node) -> Flow<(Node, bool)> {
        let mut node = node;
        let mut ever_expanded = false;
        loop {
            let (next, expanded) = self.macro_expand_once(node)?;
            node = next;
            if !expanded {
                return Ok((node, ever_expanded));
            }
            ever_expanded = true;
        }
    }

    /// Pre-order code walk over the whole tree, expanding macros and
    /// honoring quotation boundaries.
    pub fn macro_expand_codewalk(self: &Rc<Self>, node: Node) -> Flow<(Node, bool)> {
        self.codewalk(node, 0)
    }

    fn codewalk(self: &Rc<Self>, node: Node, depth: i32) -> Flow<(Node, bool)> {
        if node.is_none() || node.size() == 0 {
            return Ok((node, false));
        }
        let mut anything_expanded = false;
        let mut node = node;
        if depth <= 0 {
            self.debugf(
                Options::DEBUG_MACRO_EXPAND,
                format_args!("codewalk: qq = {depth}, macroexpanding {node}"),
            );
            let (expanded_node, expanded) = self.macro_expand(node)?;
            node = expanded_node;
            anything_expanded = expanded;
        }
        let node = unwrap_trivial(node);
        let saved = node.clone();

        if let Node::Expr(Expr::Unary(u)) = &node {
            if quote_body(u).is_some() {
                let mut child_depth = depth;
                let mut is_block_within_expr = false;
                match u.op {
                    Token::Macro => is_block_within_expr = true,
                    Token::Quote => {
                        // QUOTE prevents expansion only outside any QUASIQUOTE
                        if depth == 0 {
                            return Ok((saved, anything_expanded));
                        }
                    }
                    Token::Quasiquote => child_depth += 1,
                    Token::Unquote | Token::UnquoteSplice => child_depth -= 1,
                    _ => {}
                }
                if u.op.is_quote() {
                    let op = u.op;
                    let op_pos = u.op_pos;
                    let child = unwrap_trivial(node.get(0).get(1));
                    let (out_child, expanded) = self.codewalk(child, child_depth)?;
                    if is_block_within_expr {
                        return Ok((out_child, expanded));
                    }
                    if expanded {
                        let rebuilt = make_quote(op, op_pos, Some(out_child))
                            .map(Node::Expr)
                            .map_err(EvalError::macro_)?;
                        return Ok((rebuilt, true));
                    }
                    return Ok((saved, anything_expanded));
                }
            }
        }

        self.debugf(
            Options::DEBUG_MACRO_EXPAND,
            format_args!("codewalk: qq = {depth}, recursing on {node}"),
        );
        let size = node.size();
        let mut out = node.new_like();
        if out.is_seq() {
            for i in 0..size {
                let child = unwrap_trivial(node.get(i));
                let walked = if child.size() == 0 {
                    child
                } else {
                    let (walked, expanded) = self.codewalk(child, depth)?;
                    anything_expanded |= expanded;
                    walked
                };
                out.append(walked).map_err(EvalError::macro_)?;
            }
        } else {
            for i in 0..size {
                let child = unwrap_trivial(node.get(i));
                if child.is_none() {
                    continue;
                }
                let (walked, expanded) = self.codewalk(child, depth)?;
                anything_expanded |= expanded;
                out.set(i, walked).map_err(EvalError::macro_)?;
            }
        }
        self.debugf(
            Options::DEBUG_MACRO_EXPAND,
            format_args!("codewalk: qq = {depth}, expanded to {out}"),
        );
        Ok((out, anything_expanded))
    }

    /// A bound macro named by this node, if any.
    fn extract_macro_call(self: &Rc<Self>, node: Node) -> Option<MacroVal> {
        match unwrap_trivial(node) {
            Node::Expr(Expr::Ident(id)) => match self.resolve_ident(&id) {
                Some(Value::Macro(m)) => Some(m),
                _ => None,
            },
            _ => None,
        }
    }

    /// Single-step expansion of a statement sequence.
    ///
    /// Scans left to right; an element naming a bound macro consumes the
    /// next `arg_num` siblings as its arguments (each passed as a
    /// reflected syntax fragment) and is replaced by the macro's return
    /// value.
    pub fn macro_expand_once(self: &Rc<Self>, node: Node) -> Flow<(Node, bool)> {
        let node = unwrap_trivial(node);
        if !node.is_seq() {
            return Ok((node, false));
        }
        self.debugf(
            Options::DEBUG_MACRO_EXPAND,
            format_args!("macro_expand_once: found list: {node}"),
        );
        let n = node.size();
        let mut outs = node.new_like();
        let mut expanded = false;
        let mut i = 0;
        while i < n {
            let elt = node.get(i);
            let Some(mac) = self.extract_macro_call(elt.clone()) else {
                outs.append(elt).map_err(EvalError::macro_)?;
                i += 1;
                continue;
            };
            let argn = mac.arg_num;
            let leftn = n - i - 1;
            if argn > leftn {
                return Err(EvalError::macro_(format!(
                    "not enough arguments for macroexpansion of {}: expecting {argn}, found {leftn}",
                    mac.func.name()
                ))
                .into());
            }
            self.debugf(
                Options::DEBUG_MACRO_EXPAND,
                format_args!("macro_expand_once: found macro call {} at position {i}", mac.func.name()),
            );
            // wrap each following sibling as a syntax fragment
            let args: Vec<Value> = (0..argn)
                .map(|j| Value::Ast(Rc::new(node.get(i + j + 1))))
                .collect();
            let results = crate::call::call_value(self, &Value::Func(mac.func.clone()), args, Pos::NONE)?;
            self.debugf(
                Options::DEBUG_MACRO_EXPAND,
                format_args!("macro_expand_once: macro expanded to {} result(s)", results.len()),
            );
            let out = match results.len() {
                0 => Node::Expr(Expr::ident("nil", Pos::NONE)),
                n_results => {
                    if n_results > 1 {
                        self.warnf(format_args!(
                            "macroexpansion returned {n_results} values, using only the first one"
                        ));
                    }
                    match &results[0] {
                        // do not insert missing nodes, they would leave
                        // holes: convert them to the identifier nil
                        Value::Nil | Value::Void => Node::Expr(Expr::ident("nil", Pos::NONE)),
                        other => value_to_node(other)?,
                    }
                }
            };
            outs.append(out).map_err(EvalError::macro_)?;
            i += argn + 1;
            expanded = true;
        }
        if !expanded {
            return Ok((node, false));
        }
        if outs.size() == 0 {
            return Ok((Node::Stmt(Stmt::Empty(EmptyStmt { pos: Pos::NONE })), true));
        }
        Ok((collapse_singleton(outs), true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Shared;
    use crate::io::NullSink;
    use crate::parser::parse;

    fn env() -> Rc<Env> {
        let root = Env::new_root(Shared::new(Box::new(NullSink)), "test");
        crate::builtins::install(&root);
        root
    }

    fn parse_turn(src: &str) -> Node {
        Node::NodeSlice(parse(src, 1).unwrap())
    }

    #[test]
    fn expansion_without_macros_is_identity() {
        let env = env();
        let node = parse_turn("x := 1 + 2; x * 10");
        let (out, expanded) = env.macro_expand_codewalk(node.clone()).unwrap();
        assert!(!expanded);
        assert_eq!(unwrap_trivial(out), unwrap_trivial(node));
    }

    #[test]
    fn expansion_is_idempotent() {
        let env = env();
        let (decl, _) = env
            .macro_expand_codewalk(parse_turn("macro twice(a interface{}) interface{} { ~`{~,a; ~,a} }"))
            .unwrap();
        env.eval_node(&decl).unwrap();

        let node = parse_turn("twice; f()");
        let (once, expanded) = env.macro_expand(node).unwrap();
        assert!(expanded);
        let (twice, expanded_again) = env.macro_expand(once.clone()).unwrap();
        assert!(!expanded_again);
        assert_eq!(once, twice);
    }

    #[test]
    fn insufficient_macro_arguments_fail() {
        let env = env();
        let (decl, _) = env
            .macro_expand_codewalk(parse_turn("macro pair(a, b interface{}) interface{} { ~`{~,a + ~,b} }"))
            .unwrap();
        env.eval_node(&decl).unwrap();

        let err = env.macro_expand(parse_turn("pair; 1")).unwrap_err();
        match err {
            crate::error::Unwind::Fault(e) => {
                assert_eq!(e.kind, crate::error::ErrorKind::Macro);
                assert!(e.msg.contains("not enough arguments"), "got: {}", e.msg);
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn quote_is_opaque_at_depth_zero() {
        let env = env();
        let (decl, _) = env
            .macro_expand_codewalk(parse_turn("macro zero() interface{} { ~'{0} }"))
            .unwrap();
        env.eval_node(&decl).unwrap();

        // inside quote{...} the macro name must NOT expand
        let node = parse_turn("quote{zero}");
        let (out, expanded) = env.macro_expand_codewalk(node.clone()).unwrap();
        assert!(!expanded);
        assert_eq!(out, unwrap_trivial(node));
    }
}
