//! Lexically nested binding frames and session-wide shared state.
//!
//! Frames link outward through weak references; identifier resolution
//! walks the chain from the innermost frame. Closures and deferred calls
//! keep the chain alive by owning a strong `Vec<Rc<Env>>` from their
//! defining frame to the root (see `Env::chain`).
//!
//! The root frame's `Shared` carries interpreter-wide state: the options
//! flag-set, the imported-package registry, the output sink, the call
//! stack, and the goroutine run queue. It is threaded explicitly; there
//! are no hidden globals.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;

use crate::ast::Ident;
use crate::io::OutputSink;
use crate::options::Options;
use crate::types::Type;
use crate::value::Value;

/// One deferred call: callee and arguments, both evaluated at `defer`
/// time.
pub struct DeferredCall {
    pub callee: Value,
    pub args: Vec<Value>,
}

/// One frame of the interpreted call stack.
#[derive(Default)]
pub struct CallFrame {
    pub name: Rc<str>,
    /// LIFO deferred-call list, run on function exit.
    pub defers: Vec<DeferredCall>,
    /// The in-flight panic value, if any.
    pub panic: Option<Value>,
    pub panicking: bool,
    pub running_defers: bool,
}

impl CallFrame {
    pub fn named(name: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Default)]
pub struct CallStack {
    pub frames: Vec<CallFrame>,
}

impl CallStack {
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// A `go` statement pending execution on the cooperative run queue.
pub struct PendingGo {
    pub callee: Value,
    pub args: Vec<Value>,
}

/// Session-wide interpreter state, owned by the root frame.
pub struct Shared {
    pub options: Cell<Options>,
    /// import path -> bound package reference
    pub packages: RefCell<AHashMap<Rc<str>, Rc<crate::value::PackageRef>>>,
    pub output: RefCell<Box<dyn OutputSink>>,
    pub call_stack: RefCell<CallStack>,
    pub run_queue: RefCell<VecDeque<PendingGo>>,
}

impl Shared {
    pub fn new(output: Box<dyn OutputSink>) -> Rc<Self> {
        Rc::new(Self {
            options: Cell::new(Options::empty()),
            packages: RefCell::new(AHashMap::new()),
            output: RefCell::new(output),
            call_stack: RefCell::new(CallStack::default()),
            run_queue: RefCell::new(VecDeque::new()),
        })
    }

    pub fn has_option(&self, opt: Options) -> bool {
        self.options.get().contains(opt)
    }

    pub fn toggle_options(&self, toggle: Options) {
        self.options.set(self.options.get() ^ toggle);
    }

    pub fn write_line(&self, line: &str) {
        self.output.borrow_mut().write_line(line);
    }
}

/// One lexical binding frame.
pub struct Env {
    /// Diagnostic label ("for {}", "case:", function name, …).
    pub name: Rc<str>,
    pub path: Rc<str>,
    outer: Option<Weak<Env>>,
    pub binds: RefCell<AHashMap<Rc<str>, Rc<RefCell<Value>>>>,
    pub types: RefCell<AHashMap<Rc<str>, Type>>,
    /// Lexical line of the first spec of the enclosing const group;
    /// `iota` resolves to `usage_line - iota_offset`.
    pub iota_offset: Cell<u32>,
    pub shared: Rc<Shared>,
}

impl Env {
    pub fn new_root(shared: Rc<Shared>, name: impl Into<Rc<str>>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            path: Rc::from("main"),
            outer: None,
            binds: RefCell::new(AHashMap::new()),
            types: RefCell::new(AHashMap::new()),
            iota_offset: Cell::new(0),
            shared,
        })
    }

    /// Pushes a fresh inner frame.
    pub fn child(self: &Rc<Self>, name: impl Into<Rc<str>>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            path: self.path.clone(),
            outer: Some(Rc::downgrade(self)),
            binds: RefCell::new(AHashMap::new()),
            types: RefCell::new(AHashMap::new()),
            iota_offset: Cell::new(self.iota_offset.get()),
            shared: self.shared.clone(),
        })
    }

    pub fn outer(&self) -> Option<Rc<Self>> {
        self.outer.as_ref().and_then(Weak::upgrade)
    }

    /// The strong frame chain from this frame to the root. Closures and
    /// deferred calls store this to keep their captured scope alive.
    pub fn chain(self: &Rc<Self>) -> Vec<Rc<Self>> {
        let mut frames = vec![self.clone()];
        let mut cur = self.outer();
        while let Some(env) = cur {
            cur = env.outer();
            frames.push(env);
        }
        frames
    }

    /// Walks outward for the binding cell of `name`; the innermost frame
    /// that binds it wins.
    pub fn resolve_cell(self: &Rc<Self>, name: &str) -> Option<Rc<RefCell<Value>>> {
        let mut env = self.clone();
        loop {
            if let Some(cell) = env.binds.borrow().get(name) {
                return Some(cell.clone());
            }
            env = env.outer()?;
        }
    }

    /// Resolves an identifier to its current value. The special
    /// identifier `iota` yields `line - iota_offset`.
    pub fn resolve_ident(self: &Rc<Self>, ident: &Ident) -> Option<Value> {
        if &*ident.name == "iota" {
            return Some(Value::int(i64::from(ident.pos.line.saturating_sub(self.iota_offset.get()))));
        }
        self.resolve_cell(&ident.name).map(|cell| cell.borrow().clone())
    }

    /// Defines (or redefines) a binding in this frame.
    pub fn define_var(&self, name: Rc<str>, ty: Option<Type>, value: Value) {
        if let Some(ty) = ty {
            self.types.borrow_mut().insert(name.clone(), ty);
        }
        self.binds
            .borrow_mut()
            .insert(name, Rc::new(RefCell::new(value)));
    }

    pub fn define_type(&self, name: Rc<str>, ty: Type) {
        self.types.borrow_mut().insert(name, ty);
    }

    pub fn lookup_type(self: &Rc<Self>, name: &str) -> Option<Type> {
        let mut env = self.clone();
        loop {
            if let Some(ty) = env.types.borrow().get(name) {
                return Some(ty.clone());
            }
            env = env.outer()?;
        }
    }

    pub fn has_option(&self, opt: Options) -> bool {
        self.shared.has_option(opt)
    }

    /// Emits a diagnostic-trace line when `opt` is set.
    pub fn debugf(&self, opt: Options, args: fmt::Arguments<'_>) {
        if self.has_option(opt) {
            self.shared.write_line(&format!("// debug: {args}"));
        }
    }

    /// Emits a non-fatal warning.
    pub fn warnf(&self, args: fmt::Arguments<'_>) {
        self.shared.write_line(&format!("// warning: {args}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::NullSink;
    use crate::token::Pos;

    fn root() -> Rc<Env> {
        Env::new_root(Shared::new(Box::new(NullSink)), "test")
    }

    #[test]
    fn inner_frames_shadow_outer_bindings() {
        let outer = root();
        outer.define_var(Rc::from("x"), None, Value::int(1));
        let inner = outer.child("block");
        assert_eq!(
            inner.resolve_cell("x").map(|c| c.borrow().clone()),
            Some(Value::int(1))
        );
        inner.define_var(Rc::from("x"), None, Value::int(2));
        assert_eq!(
            inner.resolve_cell("x").map(|c| c.borrow().clone()),
            Some(Value::int(2))
        );
        // the outer binding is untouched
        assert_eq!(
            outer.resolve_cell("x").map(|c| c.borrow().clone()),
            Some(Value::int(1))
        );
    }

    #[test]
    fn chain_keeps_dropped_scopes_reachable() {
        let outer = root();
        outer.define_var(Rc::from("captured"), None, Value::int(7));
        let chain = {
            let inner = outer.child("closure birthplace");
            inner.chain()
        };
        // the inner frame itself is owned only by the chain now
        assert_eq!(chain.len(), 2);
        assert_eq!(
            chain[0].resolve_cell("captured").map(|c| c.borrow().clone()),
            Some(Value::int(7))
        );
    }

    #[test]
    fn iota_resolves_from_line_offset() {
        let env = root();
        env.iota_offset.set(10);
        let ident = Ident::new("iota", Pos::new(12, 1));
        assert_eq!(env.resolve_ident(&ident), Some(Value::int(2)));
    }
}
