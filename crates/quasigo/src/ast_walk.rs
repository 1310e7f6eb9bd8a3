//! Uniform traversal surface over the heterogeneous AST.
//!
//! The macro code-walker must visit ordered children by index without
//! special-casing every variant, so every node exposes:
//!
//! - `size()` — number of ordered child slots
//! - `get(i)` / `set(i, child)` — child access and replacement
//! - `new_like()` — a fresh node of the same variant with the same
//!   positional anchors; sequence carriers start with no children
//! - `op()` — the token characterizing the node
//!
//! Variants carrying a homogeneous child sequence additionally support
//! `append` and `slice_children`. The separators reported by the slice
//! carriers' `op()` are advisory only (they match the customary printer).

use crate::ast::{Decl, DeclStmt, Expr, Field, FieldList, Ident, Node, Spec, Stmt};
use crate::token::{Pos, Token};

/// Child-slot coercion failure: a macro produced a node that cannot sit
/// in the slot it targets.
pub type SlotError = String;

fn mismatch(wanted: &str, got: &Node) -> SlotError {
    format!("expecting {wanted}, found {got:?}")
}

/// Coerces a node to an expression, unwrapping an expression statement.
pub fn node_to_expr(node: Node) -> Result<Expr, SlotError> {
    match node {
        Node::Expr(x) => Ok(x),
        Node::Stmt(Stmt::Expr(es)) => Ok(es.x),
        other => Err(mismatch("expression", &other)),
    }
}

fn node_to_opt_expr(node: Node) -> Result<Option<Expr>, SlotError> {
    if node.is_none() {
        Ok(None)
    } else {
        node_to_expr(node).map(Some)
    }
}

/// Coerces a node to a statement, wrapping a bare expression or
/// declaration in its statement carrier.
pub fn node_to_stmt(node: Node) -> Result<Stmt, SlotError> {
    match node {
        Node::Stmt(s) => Ok(s),
        Node::Expr(x) => Ok(Stmt::expr(x)),
        Node::Decl(d) => Ok(Stmt::Decl(Box::new(DeclStmt { decl: d }))),
        other => Err(mismatch("statement", &other)),
    }
}

fn node_to_opt_stmt(node: Node) -> Result<Option<Stmt>, SlotError> {
    if node.is_none() {
        Ok(None)
    } else {
        node_to_stmt(node).map(Some)
    }
}

pub fn node_to_ident(node: Node) -> Result<Ident, SlotError> {
    match node {
        Node::Expr(Expr::Ident(id)) => Ok(id),
        other => Err(mismatch("identifier", &other)),
    }
}

fn node_to_block(node: Node) -> Result<crate::ast::BlockStmt, SlotError> {
    match node {
        Node::Stmt(Stmt::Block(b)) => Ok(*b),
        other => Err(mismatch("block statement", &other)),
    }
}

fn node_to_decl(node: Node) -> Result<Decl, SlotError> {
    match node {
        Node::Decl(d) => Ok(d),
        Node::Stmt(Stmt::Decl(ds)) => Ok(ds.decl),
        other => Err(mismatch("declaration", &other)),
    }
}

fn node_to_field(node: Node) -> Result<Field, SlotError> {
    match node {
        Node::Field(f) => Ok(f),
        other => Err(mismatch("field", &other)),
    }
}

fn node_to_field_list(node: Node) -> Result<FieldList, SlotError> {
    match node {
        Node::FieldList(fl) => Ok(fl),
        other => Err(mismatch("field list", &other)),
    }
}

fn node_to_spec(node: Node) -> Result<Spec, SlotError> {
    match node {
        Node::Spec(s) => Ok(s),
        other => Err(mismatch("spec", &other)),
    }
}

fn node_to_func_type(node: Node) -> Result<crate::ast::FuncType, SlotError> {
    match node {
        Node::Expr(Expr::FuncType(ft)) => Ok(*ft),
        other => Err(mismatch("function type", &other)),
    }
}

impl Node {
    /// Number of ordered child slots. Fixed-arity variants count absent
    /// optional slots; sequence carriers count their elements.
    pub fn size(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Expr(x) => expr_size(x),
            Self::Stmt(s) => stmt_size(s),
            Self::Decl(d) => match d {
                Decl::Gen(g) => g.specs.len(),
                Decl::Func(_) => 4,
            },
            Self::Spec(s) => match s {
                Spec::Import(_) => 2,
                Spec::Value(_) => 3,
                Spec::Type(_) => 2,
            },
            Self::Field(_) => 2,
            Self::FieldList(fl) => fl.list.len(),
            Self::File(f) => f.decls.len(),
            Self::NodeSlice(v) => v.len(),
            Self::ExprSlice(v) => v.len(),
            Self::FieldSlice(v) => v.len(),
            Self::DeclSlice(v) => v.len(),
            Self::IdentSlice(v) => v.len(),
            Self::SpecSlice(v) => v.len(),
            Self::StmtSlice(v) => v.len(),
        }
    }

    /// The `i`-th child, or `Node::None` for an absent optional slot.
    pub fn get(&self, i: usize) -> Self {
        match self {
            Self::None => Self::None,
            Self::Expr(x) => expr_get(x, i),
            Self::Stmt(s) => stmt_get(s, i),
            Self::Decl(d) => decl_get(d, i),
            Self::Spec(s) => spec_get(s, i),
            Self::Field(f) => match i {
                0 => Self::IdentSlice(f.names.clone()),
                1 => Self::opt_expr_child(f.ty.as_ref()),
                _ => Self::None,
            },
            Self::FieldList(fl) => fl.list.get(i).cloned().map_or(Self::None, Self::Field),
            Self::File(f) => f.decls.get(i).cloned().map_or(Self::None, Self::Decl),
            Self::NodeSlice(v) => v.get(i).cloned().unwrap_or(Self::None),
            Self::ExprSlice(v) => v.get(i).cloned().map_or(Self::None, Self::Expr),
            Self::FieldSlice(v) => v.get(i).cloned().map_or(Self::None, Self::Field),
            Self::DeclSlice(v) => v.get(i).cloned().map_or(Self::None, Self::Decl),
            Self::IdentSlice(v) => v.get(i).cloned().map_or(Self::None, |id| Self::Expr(Expr::Ident(id))),
            Self::SpecSlice(v) => v.get(i).cloned().map_or(Self::None, Self::Spec),
            Self::StmtSlice(v) => v.get(i).cloned().map_or(Self::None, Self::Stmt),
        }
    }

    /// Replaces the `i`-th child, coercing statement/expression wrappers
    /// as needed. Fails when the child cannot occupy the slot.
    pub fn set(&mut self, i: usize, child: Self) -> Result<(), SlotError> {
        match self {
            Self::None => Err(mismatch("node with children", &Self::None)),
            Self::Expr(x) => expr_set(x, i, child),
            Self::Stmt(s) => stmt_set(s, i, child),
            Self::Decl(d) => decl_set(d, i, child),
            Self::Spec(s) => spec_set(s, i, child),
            Self::Field(f) => match i {
                0 => {
                    f.names = ident_vec(child)?;
                    Ok(())
                }
                1 => {
                    f.ty = node_to_opt_expr(child)?;
                    Ok(())
                }
                _ => Err(format!("field child index {i} out of range")),
            },
            Self::FieldList(fl) => {
                fl.list[i] = node_to_field(child)?;
                Ok(())
            }
            Self::File(f) => {
                f.decls[i] = node_to_decl(child)?;
                Ok(())
            }
            Self::NodeSlice(v) => {
                v[i] = child;
                Ok(())
            }
            Self::ExprSlice(v) => {
                v[i] = node_to_expr(child)?;
                Ok(())
            }
            Self::FieldSlice(v) => {
                v[i] = node_to_field(child)?;
                Ok(())
            }
            Self::DeclSlice(v) => {
                v[i] = node_to_decl(child)?;
                Ok(())
            }
            Self::IdentSlice(v) => {
                v[i] = node_to_ident(child)?;
                Ok(())
            }
            Self::SpecSlice(v) => {
                v[i] = node_to_spec(child)?;
                Ok(())
            }
            Self::StmtSlice(v) => {
                v[i] = node_to_stmt(child)?;
                Ok(())
            }
        }
    }

    /// A fresh node of the same variant keeping positional anchors.
    /// Sequence carriers come back with no children; fixed-arity variants
    /// keep their slots (the walker overwrites every slot in order).
    pub fn new_like(&self) -> Self {
        match self {
            Self::Stmt(Stmt::Block(b)) => Self::Stmt(Stmt::Block(Box::new(crate::ast::BlockStmt {
                list: vec![],
                lbrace: b.lbrace,
                rbrace: b.rbrace,
            }))),
            Self::Stmt(Stmt::Return(r)) => Self::Stmt(Stmt::Return(Box::new(crate::ast::ReturnStmt {
                results: vec![],
                pos: r.pos,
            }))),
            Self::Decl(Decl::Gen(g)) => Self::Decl(Decl::Gen(Box::new(crate::ast::GenDecl {
                tok: g.tok,
                specs: vec![],
                pos: g.pos,
            }))),
            Self::FieldList(fl) => Self::FieldList(FieldList { list: vec![], pos: fl.pos }),
            Self::File(f) => Self::File(crate::ast::File {
                name: f.name.clone(),
                decls: vec![],
            }),
            Self::NodeSlice(_) => Self::NodeSlice(vec![]),
            Self::ExprSlice(_) => Self::ExprSlice(vec![]),
            Self::FieldSlice(_) => Self::FieldSlice(vec![]),
            Self::DeclSlice(_) => Self::DeclSlice(vec![]),
            Self::IdentSlice(_) => Self::IdentSlice(vec![]),
            Self::SpecSlice(_) => Self::SpecSlice(vec![]),
            Self::StmtSlice(_) => Self::StmtSlice(vec![]),
            _ => self.clone(),
        }
    }

    /// The token characterizing this node: its stored operator where it
    /// has one, a structural token otherwise.
    pub fn op(&self) -> Token {
        match self {
            Self::None => Token::Illegal,
            Self::Expr(x) => expr_op(x),
            Self::Stmt(s) => stmt_op(s),
            Self::Decl(Decl::Gen(g)) => g.tok,
            Self::Decl(Decl::Func(f)) => {
                if f.is_macro {
                    Token::Macro
                } else {
                    Token::Func
                }
            }
            Self::Spec(Spec::Import(_)) => Token::Import,
            Self::Spec(Spec::Value(_)) => Token::Var,
            Self::Spec(Spec::Type(_)) => Token::Type,
            Self::Field(_) => Token::Semicolon,
            Self::FieldList(_) => Token::Ellipsis,
            Self::File(_) => Token::Eof,
            Self::NodeSlice(_) | Self::ExprSlice(_) | Self::IdentSlice(_) => Token::Comma,
            Self::FieldSlice(_) | Self::DeclSlice(_) | Self::SpecSlice(_) | Self::StmtSlice(_) => Token::Semicolon,
        }
    }

    /// True for the variants holding a homogeneous child sequence.
    pub fn is_seq(&self) -> bool {
        matches!(
            self,
            Self::Stmt(Stmt::Block(_))
                | Self::Stmt(Stmt::Return(_))
                | Self::Decl(Decl::Gen(_))
                | Self::FieldList(_)
                | Self::File(_)
                | Self::NodeSlice(_)
                | Self::ExprSlice(_)
                | Self::FieldSlice(_)
                | Self::DeclSlice(_)
                | Self::IdentSlice(_)
                | Self::SpecSlice(_)
                | Self::StmtSlice(_)
        )
    }

    /// Appends a child to a sequence variant.
    pub fn append(&mut self, child: Self) -> Result<(), SlotError> {
        match self {
            Self::Stmt(Stmt::Block(b)) => {
                b.list.push(node_to_stmt(child)?);
                Ok(())
            }
            Self::Stmt(Stmt::Return(r)) => {
                r.results.push(node_to_expr(child)?);
                Ok(())
            }
            Self::Decl(Decl::Gen(g)) => {
                g.specs.push(node_to_spec(child)?);
                Ok(())
            }
            Self::FieldList(fl) => {
                fl.list.push(node_to_field(child)?);
                Ok(())
            }
            Self::File(f) => {
                f.decls.push(node_to_decl(child)?);
                Ok(())
            }
            Self::NodeSlice(v) => {
                v.push(child);
                Ok(())
            }
            Self::ExprSlice(v) => {
                v.push(node_to_expr(child)?);
                Ok(())
            }
            Self::FieldSlice(v) => {
                v.push(node_to_field(child)?);
                Ok(())
            }
            Self::DeclSlice(v) => {
                v.push(node_to_decl(child)?);
                Ok(())
            }
            Self::IdentSlice(v) => {
                v.push(node_to_ident(child)?);
                Ok(())
            }
            Self::SpecSlice(v) => {
                v.push(node_to_spec(child)?);
                Ok(())
            }
            Self::StmtSlice(v) => {
                v.push(node_to_stmt(child)?);
                Ok(())
            }
            other => Err(mismatch("sequence node", other)),
        }
    }

    /// Restricts a sequence variant to children `lo..hi`.
    pub fn slice_children(&mut self, lo: usize, hi: usize) -> Result<(), SlotError> {
        fn cut<T>(v: &mut Vec<T>, lo: usize, hi: usize) {
            v.truncate(hi);
            v.drain(..lo);
        }
        match self {
            Self::Stmt(Stmt::Block(b)) => cut(&mut b.list, lo, hi),
            Self::Stmt(Stmt::Return(r)) => cut(&mut r.results, lo, hi),
            Self::Decl(Decl::Gen(g)) => cut(&mut g.specs, lo, hi),
            Self::FieldList(fl) => cut(&mut fl.list, lo, hi),
            Self::File(f) => cut(&mut f.decls, lo, hi),
            Self::NodeSlice(v) => cut(v, lo, hi),
            Self::ExprSlice(v) => cut(v, lo, hi),
            Self::FieldSlice(v) => cut(v, lo, hi),
            Self::DeclSlice(v) => cut(v, lo, hi),
            Self::IdentSlice(v) => cut(v, lo, hi),
            Self::SpecSlice(v) => cut(v, lo, hi),
            Self::StmtSlice(v) => cut(v, lo, hi),
            other => return Err(mismatch("sequence node", other)),
        }
        Ok(())
    }
}

fn ident_vec(node: Node) -> Result<Vec<Ident>, SlotError> {
    match node {
        Node::IdentSlice(v) => Ok(v),
        Node::Expr(Expr::Ident(id)) => Ok(vec![id]),
        other => Err(mismatch("identifier list", &other)),
    }
}

fn expr_size(x: &Expr) -> usize {
    match x {
        Expr::Basic(_) | Expr::Ident(_) => 0,
        Expr::Unary(_) | Expr::Star(_) | Expr::Paren(_) | Expr::Ellipsis(_) | Expr::ChanType(_) => 1,
        Expr::StructType(_) | Expr::InterfaceType(_) => 1,
        Expr::Slice(_) => 4,
        _ => 2,
    }
}

fn expr_get(x: &Expr, i: usize) -> Node {
    let child = |e: &Expr| Node::Expr(e.clone());
    match (x, i) {
        (Expr::Binary(b), 0) => child(&b.x),
        (Expr::Binary(b), 1) => child(&b.y),
        (Expr::Unary(u), 0) => child(&u.x),
        (Expr::Call(c), 0) => child(&c.fun),
        (Expr::Call(c), 1) => Node::ExprSlice(c.args.clone()),
        (Expr::Index(ix), 0) => child(&ix.x),
        (Expr::Index(ix), 1) => child(&ix.index),
        (Expr::Slice(s), 0) => child(&s.x),
        (Expr::Slice(s), 1) => Node::opt_expr_child(s.low.as_ref()),
        (Expr::Slice(s), 2) => Node::opt_expr_child(s.high.as_ref()),
        (Expr::Slice(s), 3) => Node::opt_expr_child(s.max.as_ref()),
        (Expr::Selector(s), 0) => child(&s.x),
        (Expr::Selector(s), 1) => Node::Expr(Expr::Ident(s.sel.clone())),
        (Expr::Star(s), 0) => child(&s.x),
        (Expr::Paren(p), 0) => child(&p.x),
        (Expr::TypeAssert(t), 0) => child(&t.x),
        (Expr::TypeAssert(t), 1) => Node::opt_expr_child(t.ty.as_ref()),
        (Expr::Composite(c), 0) => Node::opt_expr_child(c.ty.as_ref()),
        (Expr::Composite(c), 1) => Node::ExprSlice(c.elts.clone()),
        (Expr::KeyValue(kv), 0) => child(&kv.key),
        (Expr::KeyValue(kv), 1) => child(&kv.value),
        (Expr::Ellipsis(e), 0) => Node::opt_expr_child(e.elt.as_ref()),
        (Expr::FuncLit(f), 0) => Node::Expr(Expr::FuncType(Box::new(f.ty.clone()))),
        (Expr::FuncLit(f), 1) => Node::Stmt(Stmt::Block(Box::new(f.body.clone()))),
        (Expr::FuncType(f), 0) => Node::FieldList(f.params.clone()),
        (Expr::FuncType(f), 1) => Node::FieldList(f.results.clone()),
        (Expr::ArrayType(a), 0) => Node::opt_expr_child(a.len.as_ref()),
        (Expr::ArrayType(a), 1) => child(&a.elt),
        (Expr::MapType(m), 0) => child(&m.key),
        (Expr::MapType(m), 1) => child(&m.value),
        (Expr::ChanType(c), 0) => child(&c.value),
        (Expr::StructType(s), 0) => Node::FieldList(s.fields.clone()),
        (Expr::InterfaceType(it), 0) => Node::FieldList(it.methods.clone()),
        _ => Node::None,
    }
}

fn expr_set(x: &mut Expr, i: usize, child: Node) -> Result<(), SlotError> {
    match (&mut *x, i) {
        (Expr::Binary(b), 0) => b.x = node_to_expr(child)?,
        (Expr::Binary(b), 1) => b.y = node_to_expr(child)?,
        (Expr::Unary(u), 0) => u.x = node_to_expr(child)?,
        (Expr::Call(c), 0) => c.fun = node_to_expr(child)?,
        (Expr::Call(c), 1) => c.args = expr_vec(child)?,
        (Expr::Index(ix), 0) => ix.x = node_to_expr(child)?,
        (Expr::Index(ix), 1) => ix.index = node_to_expr(child)?,
        (Expr::Slice(s), 0) => s.x = node_to_expr(child)?,
        (Expr::Slice(s), 1) => s.low = node_to_opt_expr(child)?,
        (Expr::Slice(s), 2) => s.high = node_to_opt_expr(child)?,
        (Expr::Slice(s), 3) => s.max = node_to_opt_expr(child)?,
        (Expr::Selector(s), 0) => s.x = node_to_expr(child)?,
        (Expr::Selector(s), 1) => s.sel = node_to_ident(child)?,
        (Expr::Star(s), 0) => s.x = node_to_expr(child)?,
        (Expr::Paren(p), 0) => p.x = node_to_expr(child)?,
        (Expr::TypeAssert(t), 0) => t.x = node_to_expr(child)?,
        (Expr::TypeAssert(t), 1) => t.ty = node_to_opt_expr(child)?,
        (Expr::Composite(c), 0) => c.ty = node_to_opt_expr(child)?,
        (Expr::Composite(c), 1) => c.elts = expr_vec(child)?,
        (Expr::KeyValue(kv), 0) => kv.key = node_to_expr(child)?,
        (Expr::KeyValue(kv), 1) => kv.value = node_to_expr(child)?,
        (Expr::Ellipsis(e), 0) => e.elt = node_to_opt_expr(child)?,
        (Expr::FuncLit(f), 0) => f.ty = node_to_func_type(child)?,
        (Expr::FuncLit(f), 1) => f.body = node_to_block(child)?,
        (Expr::FuncType(f), 0) => f.params = node_to_field_list(child)?,
        (Expr::FuncType(f), 1) => f.results = node_to_field_list(child)?,
        (Expr::ArrayType(a), 0) => a.len = node_to_opt_expr(child)?,
        (Expr::ArrayType(a), 1) => a.elt = node_to_expr(child)?,
        (Expr::MapType(m), 0) => m.key = node_to_expr(child)?,
        (Expr::MapType(m), 1) => m.value = node_to_expr(child)?,
        (Expr::ChanType(c), 0) => c.value = node_to_expr(child)?,
        (Expr::StructType(s), 0) => s.fields = node_to_field_list(child)?,
        (Expr::InterfaceType(it), 0) => it.methods = node_to_field_list(child)?,
        _ => return Err(format!("expression child index {i} out of range")),
    }
    Ok(())
}

fn expr_vec(node: Node) -> Result<Vec<Expr>, SlotError> {
    match node {
        Node::ExprSlice(v) => Ok(v),
        Node::None => Ok(vec![]),
        other => node_to_expr(other).map(|e| vec![e]),
    }
}

fn stmt_vec(node: Node) -> Result<Vec<Stmt>, SlotError> {
    match node {
        Node::StmtSlice(v) => Ok(v),
        Node::None => Ok(vec![]),
        other => node_to_stmt(other).map(|s| vec![s]),
    }
}

fn stmt_size(s: &Stmt) -> usize {
    match s {
        Stmt::Empty(_) => 0,
        Stmt::Expr(_) | Stmt::IncDec(_) | Stmt::Branch(_) | Stmt::Select(_) | Stmt::Go(_) | Stmt::Defer(_) => 1,
        Stmt::Decl(_) => 1,
        Stmt::Assign(_) | Stmt::Case(_) | Stmt::Comm(_) | Stmt::Labeled(_) | Stmt::Send(_) => 2,
        Stmt::Switch(_) | Stmt::TypeSwitch(_) => 3,
        Stmt::If(_) | Stmt::For(_) | Stmt::Range(_) => 4,
        Stmt::Block(b) => b.list.len(),
        Stmt::Return(r) => r.results.len(),
    }
}

fn stmt_get(s: &Stmt, i: usize) -> Node {
    match (s, i) {
        (Stmt::Expr(es), 0) => Node::Expr(es.x.clone()),
        (Stmt::Assign(a), 0) => Node::ExprSlice(a.lhs.clone()),
        (Stmt::Assign(a), 1) => Node::ExprSlice(a.rhs.clone()),
        (Stmt::IncDec(ids), 0) => Node::Expr(ids.x.clone()),
        (Stmt::Block(b), _) => b.list.get(i).cloned().map_or(Node::None, Node::Stmt),
        (Stmt::If(f), 0) => Node::opt_stmt_child(f.init.as_ref()),
        (Stmt::If(f), 1) => Node::Expr(f.cond.clone()),
        (Stmt::If(f), 2) => Node::Stmt(Stmt::Block(Box::new(f.body.clone()))),
        (Stmt::If(f), 3) => Node::opt_stmt_child(f.els.as_ref()),
        (Stmt::For(f), 0) => Node::opt_stmt_child(f.init.as_ref()),
        (Stmt::For(f), 1) => Node::opt_expr_child(f.cond.as_ref()),
        (Stmt::For(f), 2) => Node::opt_stmt_child(f.post.as_ref()),
        (Stmt::For(f), 3) => Node::Stmt(Stmt::Block(Box::new(f.body.clone()))),
        (Stmt::Range(r), 0) => Node::opt_expr_child(r.key.as_ref()),
        (Stmt::Range(r), 1) => Node::opt_expr_child(r.value.as_ref()),
        (Stmt::Range(r), 2) => Node::Expr(r.x.clone()),
        (Stmt::Range(r), 3) => Node::Stmt(Stmt::Block(Box::new(r.body.clone()))),
        (Stmt::Switch(sw), 0) => Node::opt_stmt_child(sw.init.as_ref()),
        (Stmt::Switch(sw), 1) => Node::opt_expr_child(sw.tag.as_ref()),
        (Stmt::Switch(sw), 2) => Node::Stmt(Stmt::Block(Box::new(sw.body.clone()))),
        (Stmt::TypeSwitch(ts), 0) => Node::opt_stmt_child(ts.init.as_ref()),
        (Stmt::TypeSwitch(ts), 1) => Node::Stmt(ts.assign.clone()),
        (Stmt::TypeSwitch(ts), 2) => Node::Stmt(Stmt::Block(Box::new(ts.body.clone()))),
        (Stmt::Case(c), 0) => Node::ExprSlice(c.list.clone()),
        (Stmt::Case(c), 1) => Node::StmtSlice(c.body.clone()),
        (Stmt::Comm(c), 0) => Node::opt_stmt_child(c.comm.as_ref()),
        (Stmt::Comm(c), 1) => Node::StmtSlice(c.body.clone()),
        (Stmt::Return(r), _) => r.results.get(i).cloned().map_or(Node::None, Node::Expr),
        (Stmt::Branch(b), 0) => b.label.clone().map_or(Node::None, |id| Node::Expr(Expr::Ident(id))),
        (Stmt::Labeled(l), 0) => Node::Expr(Expr::Ident(l.label.clone())),
        (Stmt::Labeled(l), 1) => Node::Stmt(l.stmt.clone()),
        (Stmt::Send(snd), 0) => Node::Expr(snd.chan.clone()),
        (Stmt::Send(snd), 1) => Node::Expr(snd.value.clone()),
        (Stmt::Select(sel), 0) => Node::Stmt(Stmt::Block(Box::new(sel.body.clone()))),
        (Stmt::Go(g), 0) => Node::Expr(g.call.clone()),
        (Stmt::Defer(d), 0) => Node::Expr(d.call.clone()),
        (Stmt::Decl(ds), 0) => Node::Decl(ds.decl.clone()),
        _ => Node::None,
    }
}

fn stmt_set(s: &mut Stmt, i: usize, child: Node) -> Result<(), SlotError> {
    match (&mut *s, i) {
        (Stmt::Expr(es), 0) => es.x = node_to_expr(child)?,
        (Stmt::Assign(a), 0) => a.lhs = expr_vec(child)?,
        (Stmt::Assign(a), 1) => a.rhs = expr_vec(child)?,
        (Stmt::IncDec(ids), 0) => ids.x = node_to_expr(child)?,
        (Stmt::Block(b), _) => b.list[i] = node_to_stmt(child)?,
        (Stmt::If(f), 0) => f.init = node_to_opt_stmt(child)?,
        (Stmt::If(f), 1) => f.cond = node_to_expr(child)?,
        (Stmt::If(f), 2) => f.body = node_to_block(child)?,
        (Stmt::If(f), 3) => f.els = node_to_opt_stmt(child)?,
        (Stmt::For(f), 0) => f.init = node_to_opt_stmt(child)?,
        (Stmt::For(f), 1) => f.cond = node_to_opt_expr(child)?,
        (Stmt::For(f), 2) => f.post = node_to_opt_stmt(child)?,
        (Stmt::For(f), 3) => f.body = node_to_block(child)?,
        (Stmt::Range(r), 0) => r.key = node_to_opt_expr(child)?,
        (Stmt::Range(r), 1) => r.value = node_to_opt_expr(child)?,
        (Stmt::Range(r), 2) => r.x = node_to_expr(child)?,
        (Stmt::Range(r), 3) => r.body = node_to_block(child)?,
        (Stmt::Switch(sw), 0) => sw.init = node_to_opt_stmt(child)?,
        (Stmt::Switch(sw), 1) => sw.tag = node_to_opt_expr(child)?,
        (Stmt::Switch(sw), 2) => sw.body = node_to_block(child)?,
        (Stmt::TypeSwitch(ts), 0) => ts.init = node_to_opt_stmt(child)?,
        (Stmt::TypeSwitch(ts), 1) => ts.assign = node_to_stmt(child)?,
        (Stmt::TypeSwitch(ts), 2) => ts.body = node_to_block(child)?,
        (Stmt::Case(c), 0) => c.list = expr_vec(child)?,
        (Stmt::Case(c), 1) => c.body = stmt_vec(child)?,
        (Stmt::Comm(c), 0) => c.comm = node_to_opt_stmt(child)?,
        (Stmt::Comm(c), 1) => c.body = stmt_vec(child)?,
        (Stmt::Return(r), _) => r.results[i] = node_to_expr(child)?,
        (Stmt::Branch(b), 0) => {
            b.label = if child.is_none() { None } else { Some(node_to_ident(child)?) };
        }
        (Stmt::Labeled(l), 0) => l.label = node_to_ident(child)?,
        (Stmt::Labeled(l), 1) => l.stmt = node_to_stmt(child)?,
        (Stmt::Send(snd), 0) => snd.chan = node_to_expr(child)?,
        (Stmt::Send(snd), 1) => snd.value = node_to_expr(child)?,
        (Stmt::Select(sel), 0) => sel.body = node_to_block(child)?,
        (Stmt::Go(g), 0) => g.call = node_to_expr(child)?,
        (Stmt::Defer(d), 0) => d.call = node_to_expr(child)?,
        (Stmt::Decl(ds), 0) => ds.decl = node_to_decl(child)?,
        _ => return Err(format!("statement child index {i} out of range")),
    }
    Ok(())
}

fn decl_get(d: &Decl, i: usize) -> Node {
    match d {
        Decl::Gen(g) => g.specs.get(i).cloned().map_or(Node::None, Node::Spec),
        Decl::Func(f) => match i {
            0 => f.recv.clone().map_or(Node::None, Node::Field),
            1 => Node::Expr(Expr::Ident(f.name.clone())),
            2 => Node::Expr(Expr::FuncType(Box::new(f.ty.clone()))),
            3 => f
                .body
                .clone()
                .map_or(Node::None, |b| Node::Stmt(Stmt::Block(Box::new(b)))),
            _ => Node::None,
        },
    }
}

fn decl_set(d: &mut Decl, i: usize, child: Node) -> Result<(), SlotError> {
    match d {
        Decl::Gen(g) => {
            g.specs[i] = node_to_spec(child)?;
            Ok(())
        }
        Decl::Func(f) => {
            match i {
                0 => f.recv = if child.is_none() { None } else { Some(node_to_field(child)?) },
                1 => f.name = node_to_ident(child)?,
                2 => f.ty = node_to_func_type(child)?,
                3 => f.body = if child.is_none() { None } else { Some(node_to_block(child)?) },
                _ => return Err(format!("function declaration child index {i} out of range")),
            }
            Ok(())
        }
    }
}

fn spec_get(s: &Spec, i: usize) -> Node {
    match (s, i) {
        (Spec::Import(im), 0) => im.name.clone().map_or(Node::None, |id| Node::Expr(Expr::Ident(id))),
        (Spec::Import(im), 1) => Node::Expr(Expr::Basic(im.path.clone())),
        (Spec::Value(v), 0) => Node::IdentSlice(v.names.clone()),
        (Spec::Value(v), 1) => Node::opt_expr_child(v.ty.as_ref()),
        (Spec::Value(v), 2) => Node::ExprSlice(v.values.clone()),
        (Spec::Type(t), 0) => Node::Expr(Expr::Ident(t.name.clone())),
        (Spec::Type(t), 1) => Node::Expr(t.ty.clone()),
        _ => Node::None,
    }
}

fn spec_set(s: &mut Spec, i: usize, child: Node) -> Result<(), SlotError> {
    match (&mut *s, i) {
        (Spec::Import(im), 0) => {
            im.name = if child.is_none() { None } else { Some(node_to_ident(child)?) };
        }
        (Spec::Import(im), 1) => match node_to_expr(child)? {
            Expr::Basic(b) => im.path = b,
            other => return Err(mismatch("string literal", &Node::Expr(other))),
        },
        (Spec::Value(v), 0) => v.names = ident_vec(child)?,
        (Spec::Value(v), 1) => v.ty = node_to_opt_expr(child)?,
        (Spec::Value(v), 2) => v.values = expr_vec(child)?,
        (Spec::Type(t), 0) => t.name = node_to_ident(child)?,
        (Spec::Type(t), 1) => t.ty = node_to_expr(child)?,
        _ => return Err(format!("spec child index {i} out of range")),
    }
    Ok(())
}

fn expr_op(x: &Expr) -> Token {
    match x {
        Expr::Basic(b) => b.kind,
        Expr::Ident(_) => Token::Ident,
        Expr::Binary(b) => b.op,
        Expr::Unary(u) => u.op,
        Expr::Call(_) | Expr::Paren(_) => Token::Lparen,
        Expr::Index(_) | Expr::Slice(_) | Expr::ArrayType(_) => Token::Lbrack,
        Expr::Selector(_) | Expr::TypeAssert(_) => Token::Period,
        Expr::Star(_) => Token::Mul,
        Expr::Composite(_) => Token::Lbrace,
        Expr::KeyValue(_) => Token::Colon,
        Expr::Ellipsis(_) => Token::Ellipsis,
        Expr::FuncLit(_) | Expr::FuncType(_) => Token::Func,
        Expr::MapType(_) => Token::Map,
        Expr::ChanType(_) => Token::Chan,
        Expr::StructType(_) => Token::Struct,
        Expr::InterfaceType(_) => Token::Interface,
    }
}

fn stmt_op(s: &Stmt) -> Token {
    match s {
        Stmt::Expr(es) => expr_op(&es.x),
        Stmt::Empty(_) => Token::Semicolon,
        Stmt::Assign(a) => a.tok,
        Stmt::IncDec(ids) => ids.tok,
        Stmt::Block(_) => Token::Lbrace,
        Stmt::If(_) => Token::If,
        Stmt::For(_) => Token::For,
        Stmt::Range(_) => Token::Range,
        Stmt::Switch(_) | Stmt::TypeSwitch(_) => Token::Switch,
        Stmt::Case(_) | Stmt::Comm(_) => Token::Case,
        Stmt::Return(_) => Token::Return,
        Stmt::Branch(b) => b.tok,
        Stmt::Labeled(_) => Token::Colon,
        Stmt::Send(_) => Token::Arrow,
        Stmt::Select(_) => Token::Select,
        Stmt::Go(_) => Token::Go,
        Stmt::Defer(_) => Token::Defer,
        Stmt::Decl(ds) => match &ds.decl {
            Decl::Gen(g) => g.tok,
            Decl::Func(_) => Token::Func,
        },
    }
}

/// Strips the trivial wrappers: declaration statements, parenthesized
/// expressions, and expression statements. Sequence carriers are left
/// alone (a one-element sequence is still a sequence: macro calls scan
/// sequences).
pub fn unwrap_trivial(mut node: Node) -> Node {
    loop {
        node = match node {
            Node::Stmt(Stmt::Expr(es)) => Node::Expr(es.x),
            Node::Stmt(Stmt::Decl(ds)) => Node::Decl(ds.decl),
            Node::Expr(Expr::Paren(p)) => Node::Expr(p.x),
            done => return done,
        };
    }
}

/// Collapses a one-element sequence carrier to its element; the shape
/// macro expansion returns when a rewrite left a single node behind.
pub fn collapse_singleton(node: Node) -> Node {
    if node.is_seq() && node.size() == 1 {
        unwrap_trivial(node.get(0))
    } else {
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BlockStmt;

    fn ident(name: &str) -> Expr {
        Expr::ident(name, Pos::new(1, 1))
    }

    #[test]
    fn new_like_empties_sequences_and_keeps_anchors() {
        let block = Node::Stmt(Stmt::Block(Box::new(BlockStmt::new(
            vec![Stmt::expr(ident("a")), Stmt::expr(ident("b"))],
            Pos::new(3, 7),
            Pos::new(5, 1),
        ))));
        let fresh = block.new_like();
        assert_eq!(fresh.size(), 0);
        match fresh {
            Node::Stmt(Stmt::Block(b)) => {
                assert_eq!(b.lbrace, Pos::new(3, 7));
                assert_eq!(b.rbrace, Pos::new(5, 1));
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn unwrap_strips_trivial_wrappers() {
        let inner = ident("x");
        let wrapped = Node::Stmt(Stmt::expr(Expr::Paren(Box::new(crate::ast::ParenExpr {
            x: inner.clone(),
        }))));
        assert_eq!(unwrap_trivial(wrapped), Node::Expr(inner));
    }

    #[test]
    fn unwrap_leaves_sequences_alone() {
        let node = Node::StmtSlice(vec![Stmt::expr(ident("x"))]);
        assert_eq!(unwrap_trivial(node.clone()), node);
        assert_eq!(collapse_singleton(node), Node::Expr(ident("x")));
    }

    #[test]
    fn get_set_roundtrip_on_binary() {
        let mut node = Node::Expr(Expr::Binary(Box::new(crate::ast::BinaryExpr {
            x: ident("a"),
            op: Token::Add,
            op_pos: Pos::new(1, 3),
            y: ident("b"),
        })));
        assert_eq!(node.size(), 2);
        assert_eq!(node.op(), Token::Add);
        let y = node.get(1);
        node.set(0, y).unwrap();
        assert_eq!(node.get(0), Node::Expr(ident("b")));
    }

    #[test]
    fn append_and_slice_on_carrier() {
        let mut node = Node::ExprSlice(vec![]);
        for name in ["a", "b", "c"] {
            node.append(Node::Expr(ident(name))).unwrap();
        }
        node.slice_children(1, 3).unwrap();
        assert_eq!(node.size(), 2);
        assert_eq!(node.get(0), Node::Expr(ident("b")));
    }
}
