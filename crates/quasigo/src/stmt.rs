//! The statement evaluator: assignment and places, declarations,
//! blocks, `if`, branch statements, labels and `goto`, `defer`.
//!
//! `for`/`range`, the two switches, and the channel statements live in
//! their own modules; everything dispatches from `eval_stmt` here.

use std::rc::Rc;

use crate::ast::{AssignStmt, Decl, Expr, FuncDecl, GenDecl, Ident, Node, Spec, Stmt, ValueSpec};
use crate::env::Env;
use crate::error::{EvalError, Flow, Unwind};
use crate::token::Token;
use crate::types::{self, zero_value, Kind, MethodDef, Type};
use crate::value::{value_to_type, ExprOut, MacroVal, MapVal, SliceVal, StructVal, Value, Values};

/// An assignable location.
pub enum Place {
    /// The blank identifier: assignments vanish.
    Blank,
    Var(Rc<std::cell::RefCell<Value>>),
    SliceIndex(SliceVal, usize),
    MapIndex(MapVal, Value),
    Field(StructVal, usize, Type),
    Deref(Rc<std::cell::RefCell<Value>>, Type),
}

impl Env {
    pub fn eval_stmt(self: &Rc<Self>, stmt: &Stmt) -> Flow<ExprOut> {
        match stmt {
            Stmt::Expr(es) => self.eval_expr(&es.x),
            Stmt::Empty(_) => Ok(void()),
            Stmt::Assign(a) => self.eval_assign(a),
            Stmt::IncDec(ids) => {
                let place = self.eval_place(&ids.x)?;
                let cur = read_place(&place)?;
                let op = if ids.tok == Token::Inc { Token::Add } else { Token::Sub };
                let next = crate::arith::eval_binary_op(op, &cur, &Value::int(1)).map_err(|e| e.at(ids.pos))?;
                assign_place(&place, next)?;
                Ok(void())
            }
            Stmt::Block(b) => {
                let inner = self.child("block");
                inner.eval_stmt_list(&b.list)
            }
            Stmt::If(node) => {
                let env = match &node.init {
                    Some(init) => {
                        let env = self.child("if");
                        env.eval_stmt(init)?;
                        env
                    }
                    None => self.clone(),
                };
                let cond = env.eval_expr1(&node.cond)?;
                match cond.as_bool() {
                    Some(true) => {
                        let body = env.child("if {}");
                        body.eval_stmt_list(&node.body.list)
                    }
                    Some(false) => match &node.els {
                        Some(els) => env.eval_stmt(els),
                        None => Ok(void()),
                    },
                    None => Err(EvalError::type_(format!(
                        "if: invalid condition {cond:?}, expecting bool"
                    ))
                    .at(node.pos)
                    .into()),
                }
            }
            Stmt::For(node) => self.eval_for(node, None),
            Stmt::Range(node) => self.eval_for_range(node, None),
            Stmt::Switch(node) => self.eval_switch(node, None),
            Stmt::TypeSwitch(node) => self.eval_type_switch(node, None),
            Stmt::Select(node) => self.eval_select(node, None),
            Stmt::Return(node) => {
                let values: Values = if node.results.is_empty() {
                    Values::new()
                } else if node.results.len() == 1 {
                    let (value, extra) = self.eval_expr(&node.results[0])?;
                    if extra.is_empty() {
                        Values::from_iter([value])
                    } else {
                        extra
                    }
                } else {
                    self.eval_exprs(&node.results)?.into_iter().collect()
                };
                Err(Unwind::Return(values))
            }
            Stmt::Branch(node) => match node.tok {
                Token::Break => Err(Unwind::Break(node.label.as_ref().map(|l| l.name.clone()))),
                Token::Continue => Err(Unwind::Continue(node.label.as_ref().map(|l| l.name.clone()))),
                Token::Goto => match &node.label {
                    Some(label) => Err(Unwind::Goto(label.name.clone())),
                    None => Err(EvalError::syntax("goto without label").at(node.pos).into()),
                },
                Token::Fallthrough => {
                    Err(EvalError::syntax("fallthrough statement out of place").at(node.pos).into())
                }
                other => Err(EvalError::syntax(format!("unexpected branch token {other}")).into()),
            },
            Stmt::Labeled(node) => self.eval_labeled(node),
            Stmt::Send(node) => {
                let ch = self.eval_expr1(&node.chan)?;
                let value = self.eval_expr1(&node.value)?;
                crate::channel::chan_send(&ch, value)?;
                Ok(void())
            }
            Stmt::Go(node) => {
                self.eval_go(node)?;
                Ok(void())
            }
            Stmt::Defer(node) => {
                let Expr::Call(call) = &node.call else {
                    return Err(EvalError::syntax("expression in defer must be a function call")
                        .at(node.pos)
                        .into());
                };
                // callee and arguments are evaluated at defer time
                let callee = self.eval_expr1(&call.fun)?;
                let args = self.eval_exprs(&call.args)?;
                crate::call::push_deferred(self, callee, args)?;
                Ok(void())
            }
            Stmt::Decl(ds) => self.eval_decl(&ds.decl),
            Stmt::Case(_) | Stmt::Comm(_) => {
                Err(EvalError::syntax("case clause outside switch or select").into())
            }
        }
    }

    /// Evaluates a statement list, resolving `goto` targets against the
    /// labels of this list.
    pub fn eval_stmt_list(self: &Rc<Self>, stmts: &[Stmt]) -> Flow<ExprOut> {
        let mut last = void();
        let mut i = 0;
        while i < stmts.len() {
            match self.eval_stmt(&stmts[i]) {
                Ok(out) => {
                    last = out;
                    i += 1;
                }
                Err(Unwind::Goto(label)) => match find_label(stmts, &label) {
                    Some(target) => i = target,
                    None => return Err(Unwind::Goto(label)),
                },
                Err(other) => return Err(other),
            }
        }
        Ok(last)
    }

    fn eval_labeled(self: &Rc<Self>, node: &crate::ast::LabeledStmt) -> Flow<ExprOut> {
        let label = Some(node.label.name.clone());
        let result = match &node.stmt {
            Stmt::For(f) => self.eval_for(f, label.clone()),
            Stmt::Range(r) => self.eval_for_range(r, label.clone()),
            Stmt::Switch(s) => self.eval_switch(s, label.clone()),
            Stmt::TypeSwitch(s) => self.eval_type_switch(s, label.clone()),
            Stmt::Select(s) => self.eval_select(s, label.clone()),
            other => self.eval_stmt(other),
        };
        match result {
            // `break label` addressed to this statement stops here
            Err(Unwind::Break(Some(l))) if Some(&l) == label.as_ref() => Ok(void()),
            other => other,
        }
    }

    // ------------------------------------------------------------------
    // assignment

    fn eval_assign(self: &Rc<Self>, node: &AssignStmt) -> Flow<ExprOut> {
        match node.tok {
            Token::Define => {
                let values = self.eval_exprs_multi(&node.rhs, node.lhs.len())?;
                for (lhs, value) in node.lhs.iter().zip(values) {
                    let id = want_ident(lhs)?;
                    if id.is_blank() {
                        continue;
                    }
                    let ty = value.type_of();
                    self.define_var(id.name.clone(), Some(ty), value);
                }
                Ok(void())
            }
            Token::Assign => {
                let values = self.eval_exprs_multi(&node.rhs, node.lhs.len())?;
                let mut places = Vec::with_capacity(node.lhs.len());
                for lhs in &node.lhs {
                    places.push(self.eval_place(lhs)?);
                }
                for (place, value) in places.iter().zip(values) {
                    assign_place(place, value)?;
                }
                Ok(void())
            }
            tok if tok.is_op_assign() => {
                if node.lhs.len() != 1 || node.rhs.len() != 1 {
                    return Err(EvalError::syntax("assignment operation needs single operands")
                        .at(node.tok_pos)
                        .into());
                }
                let place = self.eval_place(&node.lhs[0])?;
                let cur = read_place(&place)?;
                let rhs = self.eval_expr1(&node.rhs[0])?;
                let next =
                    crate::arith::eval_binary_op(tok.strip_assign(), &cur, &rhs).map_err(|e| e.at(node.tok_pos))?;
                assign_place(&place, next)?;
                Ok(void())
            }
            other => Err(EvalError::syntax(format!("unexpected assignment token {other}")).into()),
        }
    }

    /// Resolves an expression to an assignable place.
    pub fn eval_place(self: &Rc<Self>, x: &Expr) -> Flow<Place> {
        match x {
            Expr::Paren(p) => self.eval_place(&p.x),
            Expr::Ident(id) => {
                if id.is_blank() {
                    return Ok(Place::Blank);
                }
                self.resolve_cell(&id.name).map(Place::Var).ok_or_else(|| {
                    EvalError::resolution(format!("undefined identifier: {}", id.name))
                        .at(id.pos)
                        .into()
                })
            }
            Expr::Index(ix) => {
                let mut obj = self.eval_expr1(&ix.x)?;
                let idx = self.eval_expr1(&ix.index)?;
                if let Value::Ptr(p) = &obj {
                    let inner = p.cell.borrow().clone();
                    obj = inner;
                }
                match obj {
                    Value::Map(m) => {
                        let key = value_to_type(&idx, &m.key_type())?;
                        Ok(Place::MapIndex(m, key))
                    }
                    Value::Slice(s) | Value::Array(s) => {
                        let i = crate::arith::to_int(&idx)
                            .and_then(|i| usize::try_from(i).ok())
                            .filter(|&i| i < s.len())
                            .ok_or_else(|| {
                                EvalError::domain(format!("index out of range: {idx:?} with length {}", s.len()))
                            })?;
                        Ok(Place::SliceIndex(s, i))
                    }
                    Value::Nil => Err(EvalError::domain("assignment to entry in nil map or slice").into()),
                    other => Err(EvalError::type_(format!("cannot assign into {other:?}")).into()),
                }
            }
            Expr::Selector(sel) => {
                let mut obj = self.eval_expr1(&sel.x)?;
                if let Value::Ptr(p) = &obj {
                    let inner = p.cell.borrow().clone();
                    obj = inner;
                }
                match obj {
                    Value::Struct(s) => {
                        let (i, field) = s.ty.field_by_name(&sel.sel.name).ok_or_else(|| {
                            EvalError::resolution(format!("struct <{}> has no field {}", s.ty, sel.sel.name))
                                .at(sel.sel.pos)
                        })?;
                        Ok(Place::Field(s, i, field.ty))
                    }
                    other => Err(EvalError::type_(format!(
                        "cannot assign to field of non-struct {other:?}"
                    ))
                    .at(sel.sel.pos)
                    .into()),
                }
            }
            Expr::Star(s) => {
                let val = self.eval_expr1(&s.x)?;
                match val {
                    Value::Ptr(p) => Ok(Place::Deref(p.cell, p.elem_ty)),
                    Value::Nil => Err(EvalError::domain("nil pointer dereference").at(s.pos).into()),
                    other => Err(EvalError::type_(format!("dereference of non-pointer: {other:?}"))
                        .at(s.pos)
                        .into()),
                }
            }
            other => Err(EvalError::type_(format!("cannot assign to {other}")).at(other.pos()).into()),
        }
    }

    // ------------------------------------------------------------------
    // declarations

    pub fn eval_decl(self: &Rc<Self>, decl: &Decl) -> Flow<ExprOut> {
        match decl {
            Decl::Gen(g) => self.eval_gen_decl(g),
            Decl::Func(f) => self.eval_func_decl(f),
        }
    }

    fn eval_gen_decl(self: &Rc<Self>, node: &GenDecl) -> Flow<ExprOut> {
        match node.tok {
            Token::Var => {
                for spec in &node.specs {
                    if let Spec::Value(v) = spec {
                        self.eval_var_spec(v)?;
                    }
                }
                Ok(void())
            }
            Token::Const => {
                // iota counts lines from the first spec of the group
                let saved = self.iota_offset.get();
                let first_line = node.specs.first().map_or(node.pos.line, |spec| match spec {
                    Spec::Value(v) => v.pos.line,
                    _ => node.pos.line,
                });
                let mut carried: Option<&ValueSpec> = None;
                let mut result = Ok(void());
                for spec in &node.specs {
                    if let Spec::Value(v) = spec {
                        // a spec without values repeats the previous
                        // expression list; iota still advances with the
                        // spec's own line, so shift the offset by the
                        // distance to the repeated expressions
                        let template = if v.values.is_empty() { carried } else { Some(&**v) };
                        match template {
                            Some(t) if !t.values.is_empty() => {
                                self.iota_offset
                                    .set(t.pos.line.wrapping_sub(v.pos.line.wrapping_sub(first_line)));
                                result = self.eval_const_spec(&v.names, t);
                            }
                            _ => {
                                result = Err(EvalError::syntax("missing value in const declaration").into());
                            }
                        }
                        if result.is_err() {
                            break;
                        }
                        if !v.values.is_empty() {
                            carried = Some(v);
                        }
                    }
                }
                self.iota_offset.set(saved);
                result
            }
            Token::Type => {
                for spec in &node.specs {
                    if let Spec::Type(t) = spec {
                        let underlying = self.eval_type(&t.ty)?;
                        let named = types::named(t.name.name.clone(), &underlying);
                        self.define_type(t.name.name.clone(), named);
                    }
                }
                Ok(void())
            }
            Token::Import => {
                for spec in &node.specs {
                    if let Spec::Import(im) = spec {
                        let path = crate::literal::eval_literal(&im.path)?;
                        let Value::Str(path) = path else {
                            return Err(EvalError::syntax("import path must be a string literal").into());
                        };
                        let Some(pkg) = crate::imports::lookup_package(self, &path) else {
                            return Err(EvalError::resolution(format!("unknown package {path:?}"))
                                .at(im.path.pos)
                                .into());
                        };
                        let bind_name = im.name.as_ref().map_or_else(|| pkg.name.clone(), |n| n.name.clone());
                        self.define_var(bind_name, None, Value::Package(pkg));
                    }
                }
                Ok(void())
            }
            other => Err(EvalError::syntax(format!("unexpected declaration token {other}")).into()),
        }
    }

    fn eval_var_spec(self: &Rc<Self>, spec: &ValueSpec) -> Flow<()> {
        let declared: Option<Type> = match &spec.ty {
            Some(ty_expr) => Some(self.eval_type(ty_expr)?),
            None => None,
        };
        if spec.values.is_empty() {
            let ty = declared
                .ok_or_else(|| EvalError::syntax("variable declaration needs a type or a value").at(spec.pos))?;
            for name in &spec.names {
                if !name.is_blank() {
                    self.define_var(name.name.clone(), Some(ty.clone()), zero_value(&ty));
                }
            }
            return Ok(());
        }
        let values = self.eval_exprs_multi(&spec.values, spec.names.len())?;
        for (name, value) in spec.names.iter().zip(values) {
            if name.is_blank() {
                continue;
            }
            let value = match &declared {
                Some(ty) => value_to_type(&value, ty)?,
                None => value,
            };
            let ty = declared.clone().unwrap_or_else(|| value.type_of());
            self.define_var(name.name.clone(), Some(ty), value);
        }
        Ok(())
    }

    /// One spec of a const group; `template` supplies the expression list
    /// (its own, or the previous spec's for value-less specs).
    fn eval_const_spec(self: &Rc<Self>, names: &[Ident], template: &ValueSpec) -> Flow<ExprOut> {
        let declared: Option<Type> = match &template.ty {
            Some(ty_expr) => Some(self.eval_type(ty_expr)?),
            None => None,
        };
        let values = self.eval_exprs_multi(&template.values, names.len())?;
        for (name, value) in names.iter().zip(values) {
            if name.is_blank() {
                continue;
            }
            let value = match &declared {
                Some(ty) => value_to_type(&value, ty)?,
                None => value,
            };
            self.define_var(name.name.clone(), declared.clone(), value);
        }
        Ok(void())
    }

    fn eval_func_decl(self: &Rc<Self>, node: &FuncDecl) -> Flow<ExprOut> {
        let Some(body) = &node.body else {
            return Err(EvalError::syntax(format!("function {} has no body", node.name.name)).into());
        };
        if node.is_macro {
            let func = crate::call::build_closure(self, Some(node.name.name.clone()), &node.ty, body)?;
            let arg_num = node.ty.params.list.iter().map(|f| f.names.len().max(1)).sum();
            self.define_var(
                node.name.name.clone(),
                None,
                Value::Macro(MacroVal { func, arg_num }),
            );
            return Ok(void());
        }
        if let Some(recv) = &node.recv {
            // method declaration: bind into the receiver type's method set
            let recv_ty_expr = recv
                .ty
                .as_ref()
                .ok_or_else(|| EvalError::syntax("method receiver needs a type"))?;
            let (ptr_recv, base_expr) = match recv_ty_expr {
                Expr::Star(star) => (true, &star.x),
                other => (false, other),
            };
            let base_ty = self.eval_type(base_expr)?;
            if base_ty.name.is_none() {
                return Err(EvalError::type_("method receiver must be a named type").into());
            }
            // the receiver becomes the closure's leading parameter
            let mut ft = node.ty.clone();
            ft.params.list.insert(0, recv.clone());
            let func = crate::call::build_closure(self, Some(node.name.name.clone()), &ft, body)?;
            base_ty.add_method(
                node.name.name.clone(),
                MethodDef {
                    func: Value::Func(func),
                    ptr_recv,
                },
            );
            return Ok(void());
        }
        let func = crate::call::build_closure(self, Some(node.name.name.clone()), &node.ty, body)?;
        self.define_var(node.name.name.clone(), Some(func.ty.clone()), Value::Func(func));
        Ok(void())
    }
}

impl Env {
    /// Evaluates any toplevel node: an expression, statement,
    /// declaration, file, or a sequence of them (yielding the last
    /// value).
    pub fn eval_node(self: &Rc<Self>, node: &Node) -> Flow<ExprOut> {
        match node {
            Node::None => Ok(void()),
            Node::Expr(x) => self.eval_expr(x),
            Node::Stmt(s) => self.eval_stmt(s),
            Node::Decl(d) => self.eval_decl(d),
            Node::File(f) => {
                for decl in &f.decls {
                    self.eval_decl(decl)?;
                }
                Ok(void())
            }
            Node::NodeSlice(nodes) => {
                // goto targets resolve against this sequence's labels,
                // the same way they do inside a block
                let mut last = void();
                let mut i = 0;
                while i < nodes.len() {
                    match self.eval_node(&nodes[i]) {
                        Ok(out) => {
                            last = out;
                            i += 1;
                        }
                        Err(Unwind::Goto(label)) => {
                            let target = nodes.iter().position(|n| {
                                matches!(n, Node::Stmt(Stmt::Labeled(l)) if *l.label.name == *label)
                            });
                            match target {
                                Some(j) => i = j,
                                None => return Err(Unwind::Goto(label)),
                            }
                        }
                        Err(other) => return Err(other),
                    }
                }
                Ok(last)
            }
            Node::StmtSlice(stmts) => self.eval_stmt_list(stmts),
            Node::ExprSlice(exprs) => {
                let mut last = void();
                for x in exprs {
                    last = self.eval_expr(x)?;
                }
                Ok(last)
            }
            other => Err(EvalError::type_(format!("cannot evaluate {other:?}")).into()),
        }
    }
}

pub fn void() -> ExprOut {
    (Value::Void, Values::new())
}

fn want_ident(x: &Expr) -> Result<&Ident, EvalError> {
    match x {
        Expr::Ident(id) => Ok(id),
        other => Err(EvalError::syntax(format!("non-name {other} on left side of :="))),
    }
}

fn find_label(stmts: &[Stmt], label: &str) -> Option<usize> {
    stmts.iter().position(|s| match s {
        Stmt::Labeled(l) => &*l.label.name == label,
        _ => false,
    })
}

pub fn read_place(place: &Place) -> Flow<Value> {
    match place {
        Place::Blank => Err(EvalError::resolution("cannot use _ as value").into()),
        Place::Var(cell) | Place::Deref(cell, _) => Ok(cell.borrow().clone()),
        Place::SliceIndex(s, i) => s
            .get(*i)
            .ok_or_else(|| EvalError::domain(format!("index out of range: {i}")).into()),
        Place::MapIndex(m, key) => Ok(m.index(key)?.0),
        Place::Field(s, i, _) => s
            .get(*i)
            .ok_or_else(|| EvalError::domain(format!("field index out of range: {i}")).into()),
    }
}

pub fn assign_place(place: &Place, value: Value) -> Flow<()> {
    match place {
        Place::Blank => Ok(()),
        Place::Var(cell) => {
            let converted = {
                let cur = cell.borrow();
                if cur.is_nil() || cur.is_void() || cur.kind() == Kind::Invalid {
                    value
                } else {
                    value_to_type(&value, &cur.type_of())?
                }
            };
            *cell.borrow_mut() = converted;
            Ok(())
        }
        Place::Deref(cell, ty) => {
            let converted = value_to_type(&value, ty)?;
            *cell.borrow_mut() = converted;
            Ok(())
        }
        Place::SliceIndex(s, i) => {
            let converted = value_to_type(&value, &s.elem_type())?;
            if s.set(*i, converted) {
                Ok(())
            } else {
                Err(EvalError::domain(format!("index out of range: {i}")).into())
            }
        }
        Place::MapIndex(m, key) => {
            let converted = value_to_type(&value, &m.elem_type())?;
            m.insert(key.clone(), converted)?;
            Ok(())
        }
        Place::Field(s, i, ty) => {
            let converted = value_to_type(&value, ty)?;
            if s.set(*i, converted) {
                Ok(())
            } else {
                Err(EvalError::domain(format!("field index out of range: {i}")).into())
            }
        }
    }
}
