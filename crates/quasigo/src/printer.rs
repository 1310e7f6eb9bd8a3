//! Source-form rendering of AST nodes, used by the `Parse` and
//! `MacroExpand` display options and by macro-expansion traces.
//!
//! The output is one-line, normalized source: good enough to read back,
//! not a formatter.

use std::fmt;

use crate::ast::{CaseClause, ChanDir, CommClause, Decl, Expr, Field, FieldList, Node, Spec, Stmt};

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic(b) => f.write_str(&b.value),
            Self::Ident(id) => f.write_str(&id.name),
            Self::Binary(b) => write!(f, "{} {} {}", b.x, b.op, b.y),
            Self::Unary(u) => {
                if u.op.is_quote() {
                    // quotation carrying a block: print the keyword and body
                    if let Expr::FuncLit(fun) = &u.x {
                        write!(f, "{}{}", u.op, Blockish(&fun.body.list))
                    } else {
                        write!(f, "{}{}", u.op, u.x)
                    }
                } else {
                    write!(f, "{}{}", u.op, u.x)
                }
            }
            Self::Call(c) => {
                write!(f, "{}(", c.fun)?;
                comma_list(f, &c.args)?;
                if c.ellipsis {
                    f.write_str("...")?;
                }
                f.write_str(")")
            }
            Self::Index(ix) => write!(f, "{}[{}]", ix.x, ix.index),
            Self::Slice(s) => {
                write!(f, "{}[", s.x)?;
                if let Some(low) = &s.low {
                    write!(f, "{low}")?;
                }
                f.write_str(":")?;
                if let Some(high) = &s.high {
                    write!(f, "{high}")?;
                }
                if s.slice3 {
                    f.write_str(":")?;
                    if let Some(max) = &s.max {
                        write!(f, "{max}")?;
                    }
                }
                f.write_str("]")
            }
            Self::Selector(s) => write!(f, "{}.{}", s.x, s.sel.name),
            Self::Star(s) => write!(f, "*{}", s.x),
            Self::Paren(p) => write!(f, "({})", p.x),
            Self::TypeAssert(t) => match &t.ty {
                Some(ty) => write!(f, "{}.({ty})", t.x),
                None => write!(f, "{}.(type)", t.x),
            },
            Self::Composite(c) => {
                if let Some(ty) = &c.ty {
                    write!(f, "{ty}")?;
                }
                f.write_str("{")?;
                comma_list(f, &c.elts)?;
                f.write_str("}")
            }
            Self::KeyValue(kv) => write!(f, "{}: {}", kv.key, kv.value),
            Self::Ellipsis(e) => match &e.elt {
                Some(elt) => write!(f, "...{elt}"),
                None => f.write_str("..."),
            },
            Self::FuncLit(fun) => write!(f, "func{}{}", Sig(&fun.ty.params, &fun.ty.results), Blockish(&fun.body.list)),
            Self::FuncType(ft) => write!(f, "func{}", Sig(&ft.params, &ft.results)),
            Self::ArrayType(a) => match &a.len {
                Some(len) => write!(f, "[{len}]{}", a.elt),
                None => write!(f, "[]{}", a.elt),
            },
            Self::MapType(m) => write!(f, "map[{}]{}", m.key, m.value),
            Self::ChanType(c) => match c.dir {
                ChanDir::Recv => write!(f, "<-chan {}", c.value),
                ChanDir::Send => write!(f, "chan<- {}", c.value),
                ChanDir::Both => write!(f, "chan {}", c.value),
            },
            Self::StructType(s) => write!(f, "struct {{{}}}", Fields(&s.fields)),
            Self::InterfaceType(i) => {
                if i.methods.list.is_empty() {
                    f.write_str("interface{}")
                } else {
                    write!(f, "interface {{{}}}", Fields(&i.methods))
                }
            }
        }
    }
}

fn comma_list(f: &mut fmt::Formatter<'_>, list: &[Expr]) -> fmt::Result {
    for (i, x) in list.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{x}")?;
    }
    Ok(())
}

struct Sig<'a>(&'a FieldList, &'a FieldList);

impl fmt::Display for Sig<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", Fields(self.0))?;
        match self.1.list.len() {
            0 => Ok(()),
            1 if self.1.list[0].names.is_empty() => match &self.1.list[0].ty {
                Some(ty) => write!(f, " {ty}"),
                None => Ok(()),
            },
            _ => write!(f, " ({})", Fields(self.1)),
        }
    }
}

struct Fields<'a>(&'a FieldList);

impl fmt::Display for Fields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.0.list.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{field}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in self.names.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&name.name)?;
        }
        if let Some(ty) = &self.ty {
            if !self.names.is_empty() {
                f.write_str(" ")?;
            }
            write!(f, "{ty}")?;
        }
        Ok(())
    }
}

struct Blockish<'a>(&'a [Stmt]);

impl fmt::Display for Blockish<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{ ")?;
        for (i, stmt) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{stmt}")?;
        }
        f.write_str(" }")
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expr(es) => write!(f, "{}", es.x),
            Self::Empty(_) => Ok(()),
            Self::Assign(a) => {
                comma_list(f, &a.lhs)?;
                write!(f, " {} ", a.tok)?;
                comma_list(f, &a.rhs)
            }
            Self::IncDec(ids) => write!(f, "{}{}", ids.x, ids.tok),
            Self::Block(b) => write!(f, "{}", Blockish(&b.list)),
            Self::If(s) => {
                f.write_str("if ")?;
                if let Some(init) = &s.init {
                    write!(f, "{init}; ")?;
                }
                write!(f, "{} {}", s.cond, Blockish(&s.body.list))?;
                if let Some(els) = &s.els {
                    write!(f, " else {els}")?;
                }
                Ok(())
            }
            Self::For(s) => {
                f.write_str("for ")?;
                if s.init.is_some() || s.post.is_some() {
                    if let Some(init) = &s.init {
                        write!(f, "{init}")?;
                    }
                    f.write_str("; ")?;
                    if let Some(cond) = &s.cond {
                        write!(f, "{cond}")?;
                    }
                    f.write_str("; ")?;
                    if let Some(post) = &s.post {
                        write!(f, "{post}")?;
                    }
                    f.write_str(" ")?;
                } else if let Some(cond) = &s.cond {
                    write!(f, "{cond} ")?;
                }
                write!(f, "{}", Blockish(&s.body.list))
            }
            Self::Range(s) => {
                f.write_str("for ")?;
                match (&s.key, &s.value) {
                    (Some(k), Some(v)) => write!(f, "{k}, {v} {} ", s.tok)?,
                    (Some(k), None) => write!(f, "{k} {} ", s.tok)?,
                    _ => {}
                }
                write!(f, "range {} {}", s.x, Blockish(&s.body.list))
            }
            Self::Switch(s) => {
                f.write_str("switch ")?;
                if let Some(init) = &s.init {
                    write!(f, "{init}; ")?;
                }
                if let Some(tag) = &s.tag {
                    write!(f, "{tag} ")?;
                }
                write!(f, "{}", Blockish(&s.body.list))
            }
            Self::TypeSwitch(s) => {
                f.write_str("switch ")?;
                if let Some(init) = &s.init {
                    write!(f, "{init}; ")?;
                }
                write!(f, "{} {}", s.assign, Blockish(&s.body.list))
            }
            Self::Case(c) => write!(f, "{c}"),
            Self::Comm(c) => write!(f, "{c}"),
            Self::Return(r) => {
                f.write_str("return")?;
                if !r.results.is_empty() {
                    f.write_str(" ")?;
                    comma_list(f, &r.results)?;
                }
                Ok(())
            }
            Self::Branch(b) => {
                write!(f, "{}", b.tok)?;
                if let Some(label) = &b.label {
                    write!(f, " {}", label.name)?;
                }
                Ok(())
            }
            Self::Labeled(l) => write!(f, "{}: {}", l.label.name, l.stmt),
            Self::Send(s) => write!(f, "{} <- {}", s.chan, s.value),
            Self::Select(s) => write!(f, "select {}", Blockish(&s.body.list)),
            Self::Go(g) => write!(f, "go {}", g.call),
            Self::Defer(d) => write!(f, "defer {}", d.call),
            Self::Decl(ds) => write!(f, "{}", ds.decl),
        }
    }
}

impl fmt::Display for CaseClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.list.is_empty() {
            f.write_str("default:")?;
        } else {
            f.write_str("case ")?;
            comma_list(f, &self.list)?;
            f.write_str(":")?;
        }
        for stmt in &self.body {
            write!(f, " {stmt};")?;
        }
        Ok(())
    }
}

impl fmt::Display for CommClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.comm {
            Some(comm) => write!(f, "case {comm}:")?,
            None => f.write_str("default:")?,
        }
        for stmt in &self.body {
            write!(f, " {stmt};")?;
        }
        Ok(())
    }
}

impl fmt::Display for Decl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gen(g) => {
                write!(f, "{}", g.tok)?;
                match g.specs.len() {
                    1 => write!(f, " {}", g.specs[0]),
                    _ => {
                        f.write_str(" (")?;
                        for spec in &g.specs {
                            write!(f, " {spec};")?;
                        }
                        f.write_str(" )")
                    }
                }
            }
            Self::Func(fun) => {
                if fun.is_macro {
                    f.write_str("macro ")?;
                } else {
                    f.write_str("func ")?;
                }
                if let Some(recv) = &fun.recv {
                    write!(f, "({recv}) ")?;
                }
                write!(f, "{}{}", fun.name.name, Sig(&fun.ty.params, &fun.ty.results))?;
                match &fun.body {
                    Some(body) => write!(f, " {}", Blockish(&body.list)),
                    None => Ok(()),
                }
            }
        }
    }
}

impl fmt::Display for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Import(im) => match &im.name {
                Some(name) => write!(f, "{} {}", name.name, im.path.value),
                None => f.write_str(&im.path.value),
            },
            Self::Value(v) => {
                for (i, name) in v.names.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&name.name)?;
                }
                if let Some(ty) = &v.ty {
                    write!(f, " {ty}")?;
                }
                if !v.values.is_empty() {
                    f.write_str(" = ")?;
                    comma_list(f, &v.values)?;
                }
                Ok(())
            }
            Self::Type(t) => write!(f, "{} {}", t.name.name, t.ty),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Expr(x) => write!(f, "{x}"),
            Self::Stmt(s) => write!(f, "{s}"),
            Self::Decl(d) => write!(f, "{d}"),
            Self::Spec(s) => write!(f, "{s}"),
            Self::Field(field) => write!(f, "{field}"),
            Self::FieldList(fl) => write!(f, "{}", Fields(fl)),
            Self::File(file) => {
                if let Some(name) = &file.name {
                    write!(f, "package {}", name.name)?;
                }
                for decl in &file.decls {
                    write!(f, "; {decl}")?;
                }
                Ok(())
            }
            Self::NodeSlice(v) => {
                for (i, n) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{n}")?;
                }
                Ok(())
            }
            Self::ExprSlice(v) => comma_list(f, v),
            Self::FieldSlice(v) => {
                for (i, field) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{field}")?;
                }
                Ok(())
            }
            Self::DeclSlice(v) => {
                for (i, d) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{d}")?;
                }
                Ok(())
            }
            Self::IdentSlice(v) => {
                for (i, id) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&id.name)?;
                }
                Ok(())
            }
            Self::SpecSlice(v) => {
                for (i, s) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{s}")?;
                }
                Ok(())
            }
            Self::StmtSlice(v) => {
                for (i, s) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{s}")?;
                }
                Ok(())
            }
        }
    }
}
