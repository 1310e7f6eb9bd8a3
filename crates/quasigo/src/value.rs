//! The runtime value model.
//!
//! A `Value` is a tagged union: small scalars are stored inline with an
//! explicit kind tag (so `int8` and `int64` stay distinct while sharing
//! an `i64` payload), while composites are `Rc`-shared boxes carrying
//! their `Type` descriptor. Cloning a composite clones the handle, not
//! the payload, which gives slices, maps and pointers their aliasing
//! semantics.
//!
//! Two sentinels: `Nil` (no value present) and `Void` (the unit marker a
//! statement evaluates to when it produces nothing).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::ast::{BlockStmt, Expr};
use crate::env::Env;
use crate::error::{EvalError, Flow};
use crate::imports::Package;
use crate::types::{self, Kind, Type};

/// A multi-value tuple (function results, comma-ok pairs).
pub type Values = SmallVec<[Value; 2]>;

/// An expression result: the primary value plus, when the expression is
/// multi-valued, the full tuple (whose first element repeats the primary
/// value).
pub type ExprOut = (Value, Values);

#[derive(Clone)]
pub enum Value {
    /// No value present (an unbound slot, a nil pointer/slice/map/chan).
    Nil,
    /// The unit marker: "this produced no value".
    Void,
    Bool(bool),
    Int(Kind, i64),
    Uint(Kind, u64),
    Float(Kind, f64),
    Complex(Kind, f64, f64),
    Str(Rc<str>),
    Array(SliceVal),
    Slice(SliceVal),
    Map(MapVal),
    Struct(StructVal),
    Ptr(PtrVal),
    Chan(ChanVal),
    Func(FuncVal),
    Macro(MacroVal),
    /// An expression-level builtin (`make`, `new`) that inspects its
    /// argument expressions before evaluation.
    Builtin(Builtin),
    /// A named handle for an imported package; selector access reads the
    /// package binds.
    Package(Rc<PackageRef>),
    /// A quoted AST fragment: what `quote{…}` evaluates to, and what
    /// macros receive and return.
    Ast(Rc<crate::ast::Node>),
}

impl Value {
    pub fn int(v: i64) -> Self {
        Self::Int(Kind::Int, v)
    }

    pub fn rune(c: char) -> Self {
        Self::Int(Kind::Int32, c as i64)
    }

    pub fn float64(v: f64) -> Self {
        Self::Float(Kind::Float64, v)
    }

    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Self::Str(s.into())
    }

    pub fn new_slice(ty: Type, elems: Vec<Value>) -> Self {
        Self::Slice(SliceVal::new(ty, elems))
    }

    pub fn new_array(ty: Type, elems: Vec<Value>) -> Self {
        Self::Array(SliceVal::new(ty, elems))
    }

    pub fn new_map(ty: Type) -> Self {
        Self::Map(MapVal {
            ty,
            entries: Rc::new(RefCell::new(IndexMap::new())),
        })
    }

    pub fn new_struct(ty: Type, fields: Vec<Value>) -> Self {
        Self::Struct(StructVal {
            ty,
            fields: Rc::new(RefCell::new(fields)),
        })
    }

    pub fn new_ptr(elem_ty: Type, cell: Rc<RefCell<Value>>) -> Self {
        Self::Ptr(PtrVal { elem_ty, cell })
    }

    pub fn new_chan(ty: Type, cap: usize) -> Self {
        Self::Chan(ChanVal {
            ty,
            state: Rc::new(RefCell::new(ChanState {
                queue: VecDeque::new(),
                closed: false,
                cap,
            })),
        })
    }

    pub fn kind(&self) -> Kind {
        match self {
            Self::Nil | Self::Void => Kind::Invalid,
            Self::Bool(_) => Kind::Bool,
            Self::Int(k, _) | Self::Uint(k, _) | Self::Float(k, _) | Self::Complex(k, _, _) => *k,
            Self::Str(_) => Kind::String,
            Self::Array(_) => Kind::Array,
            Self::Slice(_) => Kind::Slice,
            Self::Map(_) => Kind::Map,
            Self::Struct(_) => Kind::Struct,
            Self::Ptr(_) | Self::Package(_) => Kind::Ptr,
            Self::Chan(_) => Kind::Chan,
            Self::Func(_) | Self::Macro(_) | Self::Builtin(_) => Kind::Func,
            Self::Ast(_) => Kind::Interface,
        }
    }

    /// The dynamic type descriptor of this value.
    pub fn type_of(&self) -> Type {
        match self {
            Self::Nil | Self::Void | Self::Package(_) => types::primitive(Kind::Invalid),
            Self::Bool(_) => types::primitive(Kind::Bool),
            Self::Int(k, _) | Self::Uint(k, _) | Self::Float(k, _) | Self::Complex(k, _, _) => types::primitive(*k),
            Self::Str(_) => types::primitive(Kind::String),
            Self::Array(s) | Self::Slice(s) => s.ty.clone(),
            Self::Map(m) => m.ty.clone(),
            Self::Struct(s) => s.ty.clone(),
            Self::Ptr(p) => types::ptr_to(p.elem_ty.clone()),
            Self::Chan(c) => c.ty.clone(),
            Self::Func(f) => f.ty.clone(),
            Self::Macro(m) => m.func.ty.clone(),
            Self::Builtin(_) => types::func_of(vec![], vec![], false),
            Self::Ast(_) => types::empty_interface(),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer payload of an int/uint value, sign-preserved.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(_, v) => Some(*v),
            Self::Uint(_, v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(_, v) => Some(*v as f64),
            Self::Uint(_, v) => Some(*v as f64),
            Self::Float(_, v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// The shared backing store of an array or slice value.
#[derive(Debug, Clone)]
pub struct SliceVal {
    pub ty: Type,
    backing: Rc<RefCell<Vec<Value>>>,
    offset: usize,
    len: usize,
    cap: usize,
}

impl SliceVal {
    pub fn new(ty: Type, elems: Vec<Value>) -> Self {
        let len = elems.len();
        Self {
            ty,
            backing: Rc::new(RefCell::new(elems)),
            offset: 0,
            len,
            cap: len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn elem_type(&self) -> Type {
        self.ty.elem().unwrap_or_else(types::empty_interface)
    }

    pub fn get(&self, i: usize) -> Option<Value> {
        if i < self.len {
            self.backing.borrow().get(self.offset + i).cloned()
        } else {
            None
        }
    }

    pub fn set(&self, i: usize, value: Value) -> bool {
        if i < self.len {
            self.backing.borrow_mut()[self.offset + i] = value;
            true
        } else {
            false
        }
    }

    /// `x[lo:hi]` / `x[lo:hi:max]` sharing the backing store.
    pub fn subslice(&self, lo: usize, hi: usize, max: usize) -> Option<Self> {
        if lo > hi || hi > self.cap || max > self.cap || max < hi {
            return None;
        }
        let ty = if self.ty.kind() == Kind::Slice {
            self.ty.clone()
        } else {
            types::slice_of(self.elem_type())
        };
        Some(Self {
            ty,
            backing: self.backing.clone(),
            offset: self.offset + lo,
            len: hi - lo,
            cap: max - lo,
        })
    }

    /// Go `append`: reuses spare capacity, otherwise reallocates.
    pub fn append(&self, extra: Vec<Value>) -> Self {
        let needed = self.len + extra.len();
        if needed <= self.cap {
            let mut backing = self.backing.borrow_mut();
            let end = self.offset + self.len;
            for (i, v) in extra.into_iter().enumerate() {
                let at = end + i;
                if at < backing.len() {
                    backing[at] = v;
                } else {
                    backing.push(v);
                }
            }
            let mut out = self.clone();
            out.len = needed;
            out
        } else {
            let mut fresh: Vec<Value> = self.to_vec();
            fresh.extend(extra);
            let ty = if self.ty.kind() == Kind::Slice {
                self.ty.clone()
            } else {
                types::slice_of(self.elem_type())
            };
            Self::new(ty, fresh)
        }
    }

    pub fn to_vec(&self) -> Vec<Value> {
        let backing = self.backing.borrow();
        backing[self.offset..self.offset + self.len].to_vec()
    }

    pub fn same_backing(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.backing, &other.backing) && self.offset == other.offset && self.len == other.len
    }
}

/// A hashable projection of a map key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    Uint(u64),
    /// float bits; NaN keys are admitted but never equal themselves in Go,
    /// here they compare by bit pattern
    Float(u64),
    Str(Rc<str>),
}

pub fn value_to_key(v: &Value) -> Result<MapKey, EvalError> {
    match v {
        Value::Bool(b) => Ok(MapKey::Bool(*b)),
        Value::Int(_, i) => Ok(MapKey::Int(*i)),
        Value::Uint(_, u) => Ok(MapKey::Uint(*u)),
        Value::Float(_, f) => Ok(MapKey::Float(f.to_bits())),
        Value::Str(s) => Ok(MapKey::Str(s.clone())),
        other => Err(EvalError::type_(format!(
            "invalid map key: {other} <{}>",
            other.type_of()
        ))),
    }
}

/// An interpreted map; entries remember the original key value so range
/// iteration can reproduce it.
#[derive(Debug, Clone)]
pub struct MapVal {
    pub ty: Type,
    pub entries: Rc<RefCell<IndexMap<MapKey, (Value, Value)>>>,
}

impl MapVal {
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn key_type(&self) -> Type {
        self.ty.key().unwrap_or_else(types::empty_interface)
    }

    pub fn elem_type(&self) -> Type {
        self.ty.elem().unwrap_or_else(types::empty_interface)
    }

    /// `m[k]`: `(value, true)` when present, `(zero(elem), false)`
    /// otherwise. Never inserts.
    pub fn index(&self, key: &Value) -> Result<(Value, bool), EvalError> {
        let k = value_to_key(key)?;
        match self.entries.borrow().get(&k) {
            Some((_, v)) => Ok((v.clone(), true)),
            None => Ok((types::zero_value(&self.elem_type()), false)),
        }
    }

    pub fn insert(&self, key: Value, value: Value) -> Result<(), EvalError> {
        let k = value_to_key(&key)?;
        self.entries.borrow_mut().insert(k, (key, value));
        Ok(())
    }

    pub fn remove(&self, key: &Value) -> Result<(), EvalError> {
        let k = value_to_key(key)?;
        self.entries.borrow_mut().shift_remove(&k);
        Ok(())
    }

    pub fn pairs(&self) -> Vec<(Value, Value)> {
        self.entries.borrow().values().cloned().collect()
    }
}

#[derive(Debug, Clone)]
pub struct StructVal {
    pub ty: Type,
    pub fields: Rc<RefCell<Vec<Value>>>,
}

impl StructVal {
    pub fn get(&self, i: usize) -> Option<Value> {
        self.fields.borrow().get(i).cloned()
    }

    pub fn set(&self, i: usize, value: Value) -> bool {
        match self.fields.borrow_mut().get_mut(i) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

/// A pointer: a shared mutable cell plus the pointee type.
#[derive(Debug, Clone)]
pub struct PtrVal {
    pub elem_ty: Type,
    pub cell: Rc<RefCell<Value>>,
}

/// Channel payload: a queue plus the closed flag. Sends buffer without
/// blocking; receives drain the queue, then observe `closed`.
#[derive(Debug)]
pub struct ChanState {
    pub queue: VecDeque<Value>,
    pub closed: bool,
    pub cap: usize,
}

#[derive(Debug, Clone)]
pub struct ChanVal {
    pub ty: Type,
    pub state: Rc<RefCell<ChanState>>,
}

impl ChanVal {
    pub fn elem_type(&self) -> Type {
        self.ty.elem().unwrap_or_else(types::empty_interface)
    }

    pub fn len(&self) -> usize {
        self.state.borrow().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named parameter or result of a declared function.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: Option<Rc<str>>,
    pub ty: Type,
}

/// The body and captured environment of an interpreted function.
pub struct DeclaredFunc {
    pub name: Option<Rc<str>>,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub variadic: bool,
    pub body: BlockStmt,
    /// Strong references from the defining frame outward to the root;
    /// keeps the weak outer-chain of `captured[0]` alive.
    pub captured: Vec<Rc<Env>>,
}

/// A host function callable with evaluated arguments.
pub struct NativeFunc {
    pub name: &'static str,
    /// expected argument count; negative disables the check
    pub arg_num: i32,
    pub f: fn(&Rc<Env>, Vec<Value>) -> Flow<Values>,
}

pub enum FuncImpl {
    Declared(DeclaredFunc),
    Native(NativeFunc),
}

#[derive(Clone)]
pub struct FuncVal {
    pub ty: Type,
    pub imp: Rc<FuncImpl>,
    /// Bound receiver of a method value (`x.m`); prepended to the
    /// arguments at call time.
    pub recv: Option<Box<Value>>,
}

impl FuncVal {
    pub fn new(ty: Type, imp: FuncImpl) -> Self {
        Self {
            ty,
            imp: Rc::new(imp),
            recv: None,
        }
    }

    pub fn name(&self) -> &str {
        match &*self.imp {
            FuncImpl::Declared(d) => d.name.as_deref().unwrap_or("func"),
            FuncImpl::Native(n) => n.name,
        }
    }
}

/// A macro record: the expander closure plus the number of sibling
/// statements it consumes as arguments.
#[derive(Clone)]
pub struct MacroVal {
    pub func: FuncVal,
    pub arg_num: usize,
}

/// An expression-level builtin: receives its argument expressions
/// unevaluated (needed by `make`/`new`, which take type expressions).
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    /// expected argument count; negative disables the check
    pub arg_num: i32,
    pub exec: fn(&Rc<Env>, &[Expr]) -> Flow<ExprOut>,
}

/// A bound imported package.
pub struct PackageRef {
    pub name: Rc<str>,
    pub path: Rc<str>,
    pub pkg: Package,
}

/// Converts `v` to type `t`: identity when assignable, a conversion when
/// convertible, an error otherwise.
pub fn value_to_type(v: &Value, t: &Type) -> Result<Value, EvalError> {
    if v.is_nil() {
        return match t.kind() {
            Kind::Slice | Kind::Map | Kind::Ptr | Kind::Chan | Kind::Func | Kind::Interface => Ok(Value::Nil),
            _ => Err(EvalError::type_(format!("cannot use nil as type {t}"))),
        };
    }
    let vt = v.type_of();
    if vt.assignable_to(t) {
        return Ok(retag(v, t));
    }
    if vt.convertible_to(t) {
        return convert(v, t);
    }
    Err(EvalError::type_(format!(
        "cannot use {v} <{vt}> as type {t}"
    )))
}

/// Identity assignment: composites pick up the (possibly named) target
/// descriptor, scalars keep their payload.
fn retag(v: &Value, t: &Type) -> Value {
    if t.kind() == Kind::Interface {
        return v.clone();
    }
    match v {
        Value::Array(s) => Value::Array(SliceVal { ty: t.clone(), ..s.clone() }),
        Value::Slice(s) => Value::Slice(SliceVal { ty: t.clone(), ..s.clone() }),
        Value::Map(m) => Value::Map(MapVal {
            ty: t.clone(),
            entries: m.entries.clone(),
        }),
        Value::Struct(s) => Value::Struct(StructVal {
            ty: t.clone(),
            fields: s.fields.clone(),
        }),
        Value::Chan(c) => Value::Chan(ChanVal {
            ty: t.clone(),
            state: c.state.clone(),
        }),
        Value::Func(f) => Value::Func(FuncVal {
            ty: t.clone(),
            ..f.clone()
        }),
        other => other.clone(),
    }
}

fn convert(v: &Value, t: &Type) -> Result<Value, EvalError> {
    let kind = t.kind();
    if kind.is_numeric() {
        return convert_numeric(v, kind)
            .ok_or_else(|| EvalError::type_(format!("cannot convert {v} to {t}")));
    }
    if kind == Kind::String {
        if let Value::Str(s) = v {
            return Ok(Value::Str(s.clone()));
        }
    }
    Err(EvalError::type_(format!("cannot convert {v} to {t}")))
}

/// Numeric conversion with Go truncation/wrapping semantics.
pub fn convert_numeric(v: &Value, kind: Kind) -> Option<Value> {
    if kind.is_complex() {
        let (re, im) = match v {
            Value::Complex(_, re, im) => (*re, *im),
            _ => (v.as_f64()?, 0.0),
        };
        return Some(Value::Complex(kind, re, im));
    }
    if kind.is_float() {
        let f = match v {
            Value::Float(_, f) => *f,
            Value::Int(_, i) => *i as f64,
            Value::Uint(_, u) => *u as f64,
            _ => return None,
        };
        let f = if kind == Kind::Float32 { f64::from(f as f32) } else { f };
        return Some(Value::Float(kind, f));
    }
    let wide: i128 = match v {
        Value::Int(_, i) => i128::from(*i),
        Value::Uint(_, u) => i128::from(*u),
        Value::Float(_, f) => *f as i128,
        _ => return None,
    };
    Some(if kind.is_signed() {
        Value::Int(kind, wrap_signed(wide, kind.bits()))
    } else {
        Value::Uint(kind, wrap_unsigned(wide, kind.bits()))
    })
}

pub fn wrap_signed(v: i128, bits: u32) -> i64 {
    if bits >= 64 {
        v as i64
    } else {
        let masked = (v as u128) & ((1u128 << bits) - 1);
        let sign = 1u128 << (bits - 1);
        if masked & sign != 0 {
            (masked as i128 - (1i128 << bits)) as i64
        } else {
            masked as i64
        }
    }
}

pub fn wrap_unsigned(v: i128, bits: u32) -> u64 {
    if bits >= 64 {
        v as u64
    } else {
        ((v as u128) & ((1u128 << bits) - 1)) as u64
    }
}

/// Equality as the `==` operator sees it: scalars by kind-aligned
/// payload, structs and arrays by content, reference kinds by identity,
/// nil only equal to nil.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Nil, Value::Nil) => true,
        (Value::Nil, _) | (_, Value::Nil) => false,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(_, x), Value::Int(_, y)) => x == y,
        (Value::Uint(_, x), Value::Uint(_, y)) => x == y,
        (Value::Int(_, x), Value::Uint(_, y)) | (Value::Uint(_, y), Value::Int(_, x)) => {
            u64::try_from(*x).is_ok_and(|x| x == *y)
        }
        (Value::Float(_, x), Value::Float(_, y)) => x == y,
        (Value::Complex(_, xr, xi), Value::Complex(_, yr, yi)) => xr == yr && xi == yi,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Struct(x), Value::Struct(y)) => {
            let (xf, yf) = (x.fields.borrow(), y.fields.borrow());
            xf.len() == yf.len() && xf.iter().zip(yf.iter()).all(|(a, b)| values_equal(a, b))
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && (0..x.len()).all(|i| match (x.get(i), y.get(i)) {
                (Some(a), Some(b)) => values_equal(&a, &b),
                _ => false,
            })
        }
        (Value::Slice(x), Value::Slice(y)) => x.same_backing(y),
        (Value::Map(x), Value::Map(y)) => Rc::ptr_eq(&x.entries, &y.entries),
        (Value::Ptr(x), Value::Ptr(y)) => Rc::ptr_eq(&x.cell, &y.cell),
        (Value::Chan(x), Value::Chan(y)) => Rc::ptr_eq(&x.state, &y.state),
        (Value::Func(x), Value::Func(y)) => Rc::ptr_eq(&x.imp, &y.imp),
        (Value::Ast(x), Value::Ast(y)) => x == y,
        _ => false,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Void, Self::Void) => true,
            // distinguish kinds for scalar comparisons in tests
            (Self::Int(ka, x), Self::Int(kb, y)) => ka == kb && x == y,
            (Self::Uint(ka, x), Self::Uint(kb, y)) => ka == kb && x == y,
            (Self::Float(ka, x), Self::Float(kb, y)) => ka == kb && x == y,
            _ => values_equal(self, other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("<nil>"),
            Self::Void => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(_, v) => write!(f, "{v}"),
            Self::Uint(_, v) => write!(f, "{v}"),
            Self::Float(_, v) => {
                if v.fract() == 0.0 && v.is_finite() && v.abs() < 1e15 {
                    // match the host language's %v for integral floats
                    write!(f, "{v}")
                } else {
                    f.write_str(ryu::Buffer::new().format(*v))
                }
            }
            Self::Complex(_, re, im) => {
                if *im >= 0.0 {
                    write!(f, "({re}+{im}i)")
                } else {
                    write!(f, "({re}{im}i)")
                }
            }
            Self::Str(s) => f.write_str(s),
            Self::Array(s) | Self::Slice(s) => {
                f.write_str("[")?;
                for (i, v) in s.to_vec().iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Self::Map(m) => {
                f.write_str("map[")?;
                for (i, (k, v)) in m.pairs().iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                f.write_str("]")
            }
            Self::Struct(s) => {
                f.write_str("{")?;
                for (i, v) in s.fields.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("}")
            }
            Self::Ptr(p) => write!(f, "&{}", p.cell.borrow()),
            Self::Chan(c) => write!(f, "<{}>", c.ty),
            Self::Func(fun) => write!(f, "{} <{}>", fun.name(), fun.ty),
            Self::Macro(m) => write!(f, "macro {}", m.func.name()),
            Self::Builtin(b) => write!(f, "builtin {}", b.name),
            Self::Package(p) => write!(f, "package {} {:?}", p.name, p.path),
            Self::Ast(node) => write!(f, "{node}"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("Nil"),
            Self::Void => f.write_str("Void"),
            other => write!(f, "{other} <{}>", other.type_of()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_index_misses_do_not_insert() {
        let m = Value::new_map(types::map_of(
            types::primitive(Kind::String),
            types::primitive(Kind::Int),
        ));
        let Value::Map(m) = m else { unreachable!() };
        let (v, present) = m.index(&Value::str("missing")).unwrap();
        assert_eq!(v, Value::int(0));
        assert!(!present);
        assert_eq!(m.len(), 0);
    }

    #[test]
    fn value_to_type_identity_keeps_payload() {
        let t = types::primitive(Kind::Int);
        let v = Value::int(42);
        let out = value_to_type(&v, &t).unwrap();
        assert_eq!(out, v);
        assert!(types::same_type(&out.type_of(), &t));
    }

    #[test]
    fn value_to_type_converts_numerics() {
        let out = value_to_type(&Value::int(300), &types::primitive(Kind::Int8)).unwrap();
        assert_eq!(out, Value::Int(Kind::Int8, 44));
        let out = value_to_type(&Value::int(3), &types::primitive(Kind::Float64)).unwrap();
        assert_eq!(out, Value::float64(3.0));
    }

    #[test]
    fn value_to_type_rejects_mismatches() {
        let err = value_to_type(&Value::str("x"), &types::primitive(Kind::Int)).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Type);
    }

    #[test]
    fn subslice_shares_backing() {
        let s = SliceVal::new(types::slice_of(types::primitive(Kind::Int)), vec![
            Value::int(1),
            Value::int(2),
            Value::int(3),
        ]);
        let sub = s.subslice(1, 3, 3).unwrap();
        sub.set(0, Value::int(20));
        assert_eq!(s.get(1), Some(Value::int(20)));
        assert!(s.subslice(2, 1, 3).is_none());
        assert!(s.subslice(0, 4, 4).is_none());
    }

    #[test]
    fn append_within_capacity_mutates_backing() {
        let s = SliceVal::new(types::slice_of(types::primitive(Kind::Int)), vec![
            Value::int(1),
            Value::int(2),
            Value::int(3),
        ]);
        let head = s.subslice(0, 1, 3).unwrap();
        let appended = head.append(vec![Value::int(9)]);
        assert_eq!(appended.len(), 2);
        // spare capacity was reused: the original backing saw the write
        assert_eq!(s.get(1), Some(Value::int(9)));
    }
}
