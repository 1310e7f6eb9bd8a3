//! Type descriptors and the session type interner.
//!
//! A `Type` is a shared descriptor (`Rc<TypeDesc>`). Named types are
//! interned per session, so pointer identity is value identity for them;
//! unnamed composite types compare structurally.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use strum::Display;

use crate::value::Value;

/// The classification every value and type reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Kind {
    Invalid,
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    Array,
    Slice,
    Map,
    Struct,
    Ptr,
    Chan,
    Func,
    Interface,
}

impl Kind {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int
                | Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Uint
                | Self::Uint8
                | Self::Uint16
                | Self::Uint32
                | Self::Uint64
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Self::Int | Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub fn is_unsigned(self) -> bool {
        self.is_integer() && !self.is_signed()
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub fn is_complex(self) -> bool {
        matches!(self, Self::Complex64 | Self::Complex128)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float() || self.is_complex()
    }

    /// Bit width of an integer kind; `Int`/`Uint` are 64-bit here.
    pub fn bits(self) -> u32 {
        match self {
            Self::Int8 | Self::Uint8 => 8,
            Self::Int16 | Self::Uint16 => 16,
            Self::Int32 | Self::Uint32 => 32,
            _ => 64,
        }
    }
}

pub type Type = Rc<TypeDesc>;

/// One field of a struct type.
#[derive(Debug, Clone)]
pub struct StructField {
    pub name: Rc<str>,
    pub ty: Type,
}

/// A method bound to a named type.
#[derive(Debug, Clone)]
pub struct MethodDef {
    pub func: Value,
    pub ptr_recv: bool,
}

#[derive(Debug, Clone)]
pub enum TypeInner {
    Primitive(Kind),
    Array { len: usize, elem: Type },
    Slice { elem: Type },
    Map { key: Type, value: Type },
    Struct { fields: Vec<StructField> },
    Ptr { elem: Type },
    Chan { elem: Type },
    Func { params: Vec<Type>, results: Vec<Type>, variadic: bool },
    Interface { methods: Vec<Rc<str>> },
    Invalid,
}

#[derive(Debug)]
pub struct TypeDesc {
    pub name: Option<Rc<str>>,
    pub inner: TypeInner,
    /// Methods declared on this (named) type.
    methods: RefCell<AHashMap<Rc<str>, MethodDef>>,
}

impl TypeDesc {
    fn make(name: Option<Rc<str>>, inner: TypeInner) -> Type {
        Rc::new(Self {
            name,
            inner,
            methods: RefCell::new(AHashMap::new()),
        })
    }

    pub fn kind(&self) -> Kind {
        match &self.inner {
            TypeInner::Primitive(k) => *k,
            TypeInner::Array { .. } => Kind::Array,
            TypeInner::Slice { .. } => Kind::Slice,
            TypeInner::Map { .. } => Kind::Map,
            TypeInner::Struct { .. } => Kind::Struct,
            TypeInner::Ptr { .. } => Kind::Ptr,
            TypeInner::Chan { .. } => Kind::Chan,
            TypeInner::Func { .. } => Kind::Func,
            TypeInner::Interface { .. } => Kind::Interface,
            TypeInner::Invalid => Kind::Invalid,
        }
    }

    /// Element type of an array/slice/map/pointer/channel.
    pub fn elem(&self) -> Option<Type> {
        match &self.inner {
            TypeInner::Array { elem, .. }
            | TypeInner::Slice { elem }
            | TypeInner::Ptr { elem }
            | TypeInner::Chan { elem } => Some(elem.clone()),
            TypeInner::Map { value, .. } => Some(value.clone()),
            _ => None,
        }
    }

    /// Key type of a map.
    pub fn key(&self) -> Option<Type> {
        match &self.inner {
            TypeInner::Map { key, .. } => Some(key.clone()),
            _ => None,
        }
    }

    pub fn array_len(&self) -> Option<usize> {
        match &self.inner {
            TypeInner::Array { len, .. } => Some(*len),
            _ => None,
        }
    }

    pub fn field(&self, i: usize) -> Option<StructField> {
        match &self.inner {
            TypeInner::Struct { fields } => fields.get(i).cloned(),
            _ => None,
        }
    }

    pub fn field_by_name(&self, name: &str) -> Option<(usize, StructField)> {
        match &self.inner {
            TypeInner::Struct { fields } => fields
                .iter()
                .enumerate()
                .find(|(_, f)| &*f.name == name)
                .map(|(i, f)| (i, f.clone())),
            _ => None,
        }
    }

    pub fn num_fields(&self) -> usize {
        match &self.inner {
            TypeInner::Struct { fields } => fields.len(),
            _ => 0,
        }
    }

    pub fn method_by_name(&self, name: &str) -> Option<MethodDef> {
        self.methods.borrow().get(name).cloned()
    }

    pub fn add_method(&self, name: Rc<str>, def: MethodDef) {
        self.methods.borrow_mut().insert(name, def);
    }

    /// True for `interface{}` (and interfaces with no methods).
    pub fn is_empty_interface(&self) -> bool {
        matches!(&self.inner, TypeInner::Interface { methods } if methods.is_empty())
    }

    pub fn func_sig(&self) -> Option<(&[Type], &[Type], bool)> {
        match &self.inner {
            TypeInner::Func {
                params,
                results,
                variadic,
            } => Some((params, results, *variadic)),
            _ => None,
        }
    }
}

/// Structural identity: pointer equality, or same name and structure.
pub fn same_type(a: &TypeDesc, b: &TypeDesc) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }
    // distinct named types are distinct even when structurally identical
    if a.name.is_some() || b.name.is_some() {
        return a.name == b.name && same_inner(a, b);
    }
    same_inner(a, b)
}

fn same_inner(a: &TypeDesc, b: &TypeDesc) -> bool {
    match (&a.inner, &b.inner) {
        (TypeInner::Primitive(ka), TypeInner::Primitive(kb)) => ka == kb,
        (TypeInner::Array { len: la, elem: ea }, TypeInner::Array { len: lb, elem: eb }) => {
            la == lb && same_type(ea, eb)
        }
        (TypeInner::Slice { elem: ea }, TypeInner::Slice { elem: eb })
        | (TypeInner::Ptr { elem: ea }, TypeInner::Ptr { elem: eb })
        | (TypeInner::Chan { elem: ea }, TypeInner::Chan { elem: eb }) => same_type(ea, eb),
        (TypeInner::Map { key: ka, value: va }, TypeInner::Map { key: kb, value: vb }) => {
            same_type(ka, kb) && same_type(va, vb)
        }
        (TypeInner::Struct { fields: fa }, TypeInner::Struct { fields: fb }) => {
            fa.len() == fb.len()
                && fa
                    .iter()
                    .zip(fb.iter())
                    .all(|(x, y)| x.name == y.name && same_type(&x.ty, &y.ty))
        }
        (
            TypeInner::Func {
                params: pa,
                results: ra,
                variadic: va,
            },
            TypeInner::Func {
                params: pb,
                results: rb,
                variadic: vb,
            },
        ) => {
            va == vb
                && pa.len() == pb.len()
                && ra.len() == rb.len()
                && pa.iter().zip(pb).all(|(x, y)| same_type(x, y))
                && ra.iter().zip(rb).all(|(x, y)| same_type(x, y))
        }
        (TypeInner::Interface { methods: ma }, TypeInner::Interface { methods: mb }) => ma == mb,
        (TypeInner::Invalid, TypeInner::Invalid) => true,
        _ => false,
    }
}

impl TypeDesc {
    /// Go-style assignability: identity, identical underlying structure
    /// when at most one side is named, or assignment to an empty
    /// interface.
    pub fn assignable_to(&self, other: &TypeDesc) -> bool {
        if same_type(self, other) {
            return true;
        }
        if other.is_empty_interface() {
            return true;
        }
        // one named, one unnamed, identical underlying structure
        if self.name.is_some() != other.name.is_some() {
            return same_inner(self, other);
        }
        false
    }

    /// Conversion compatibility: assignability, numeric <-> numeric,
    /// or string <-> string.
    pub fn convertible_to(&self, other: &TypeDesc) -> bool {
        if self.assignable_to(other) {
            return true;
        }
        let (a, b) = (self.kind(), other.kind());
        if a.is_numeric() && b.is_numeric() {
            return true;
        }
        a == Kind::String && b == Kind::String
    }
}

/// The zero value of a type.
pub fn zero_value(ty: &Type) -> Value {
    match &ty.inner {
        TypeInner::Primitive(kind) => match kind {
            Kind::Bool => Value::Bool(false),
            k if k.is_signed() => Value::Int(*k, 0),
            k if k.is_unsigned() => Value::Uint(*k, 0),
            k if k.is_float() => Value::Float(*k, 0.0),
            k if k.is_complex() => Value::Complex(*k, 0.0, 0.0),
            Kind::String => Value::Str(Rc::from("")),
            _ => Value::Nil,
        },
        TypeInner::Array { len, elem } => {
            let cells: Vec<Value> = (0..*len).map(|_| zero_value(elem)).collect();
            Value::new_array(ty.clone(), cells)
        }
        TypeInner::Struct { fields } => {
            let cells: Vec<Value> = fields.iter().map(|f| zero_value(&f.ty)).collect();
            Value::new_struct(ty.clone(), cells)
        }
        // nil slices, maps, pointers, channels, funcs, interfaces
        _ => Value::Nil,
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            return f.write_str(name);
        }
        match &self.inner {
            TypeInner::Primitive(k) => write!(f, "{k}"),
            TypeInner::Array { len, elem } => write!(f, "[{len}]{elem}"),
            TypeInner::Slice { elem } => write!(f, "[]{elem}"),
            TypeInner::Map { key, value } => write!(f, "map[{key}]{value}"),
            TypeInner::Struct { fields } => {
                f.write_str("struct {")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";")?;
                    }
                    write!(f, " {} {}", field.name, field.ty)?;
                }
                f.write_str(" }")
            }
            TypeInner::Ptr { elem } => write!(f, "*{elem}"),
            TypeInner::Chan { elem } => write!(f, "chan {elem}"),
            TypeInner::Func {
                params,
                results,
                variadic,
            } => {
                f.write_str("func(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if *variadic && i == params.len() - 1 {
                        write!(f, "...{p}")?;
                    } else {
                        write!(f, "{p}")?;
                    }
                }
                f.write_str(")")?;
                match results.len() {
                    0 => Ok(()),
                    1 => write!(f, " {}", results[0]),
                    _ => {
                        f.write_str(" (")?;
                        for (i, r) in results.iter().enumerate() {
                            if i > 0 {
                                f.write_str(", ")?;
                            }
                            write!(f, "{r}")?;
                        }
                        f.write_str(")")
                    }
                }
            }
            TypeInner::Interface { methods } => {
                if methods.is_empty() {
                    f.write_str("interface {}")
                } else {
                    f.write_str("interface { ")?;
                    for (i, m) in methods.iter().enumerate() {
                        if i > 0 {
                            f.write_str("; ")?;
                        }
                        write!(f, "{m}()")?;
                    }
                    f.write_str(" }")
                }
            }
            TypeInner::Invalid => f.write_str("<invalid>"),
        }
    }
}

thread_local! {
    static PRIMITIVES: RefCell<AHashMap<Kind, Type>> = RefCell::new(AHashMap::new());
    static EMPTY_INTERFACE: Type = TypeDesc::make(None, TypeInner::Interface { methods: vec![] });
}

/// The shared descriptor for a primitive kind.
pub fn primitive(kind: Kind) -> Type {
    PRIMITIVES.with(|cache| {
        cache
            .borrow_mut()
            .entry(kind)
            .or_insert_with(|| TypeDesc::make(None, TypeInner::Primitive(kind)))
            .clone()
    })
}

pub fn empty_interface() -> Type {
    EMPTY_INTERFACE.with(Type::clone)
}

pub fn slice_of(elem: Type) -> Type {
    TypeDesc::make(None, TypeInner::Slice { elem })
}

pub fn array_of(len: usize, elem: Type) -> Type {
    TypeDesc::make(None, TypeInner::Array { len, elem })
}

pub fn map_of(key: Type, value: Type) -> Type {
    TypeDesc::make(None, TypeInner::Map { key, value })
}

pub fn ptr_to(elem: Type) -> Type {
    TypeDesc::make(None, TypeInner::Ptr { elem })
}

pub fn chan_of(elem: Type) -> Type {
    TypeDesc::make(None, TypeInner::Chan { elem })
}

pub fn func_of(params: Vec<Type>, results: Vec<Type>, variadic: bool) -> Type {
    TypeDesc::make(
        None,
        TypeInner::Func {
            params,
            results,
            variadic,
        },
    )
}

pub fn struct_of(fields: Vec<StructField>) -> Type {
    TypeDesc::make(None, TypeInner::Struct { fields })
}

pub fn interface_of(methods: Vec<Rc<str>>) -> Type {
    TypeDesc::make(None, TypeInner::Interface { methods })
}

/// A named type wrapping the structure of `base`.
pub fn named(name: Rc<str>, base: &Type) -> Type {
    TypeDesc::make(Some(name), base.inner.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_are_interned_per_thread() {
        assert!(Rc::ptr_eq(&primitive(Kind::Int), &primitive(Kind::Int)));
    }

    #[test]
    fn unnamed_composites_compare_structurally() {
        let a = slice_of(primitive(Kind::Int));
        let b = slice_of(primitive(Kind::Int));
        assert!(same_type(&a, &b));
        assert!(a.assignable_to(&b));
        assert!(!same_type(&a, &slice_of(primitive(Kind::String))));
    }

    #[test]
    fn everything_is_assignable_to_empty_interface() {
        let iface = empty_interface();
        assert!(primitive(Kind::Int).assignable_to(&iface));
        assert!(map_of(primitive(Kind::String), primitive(Kind::Int)).assignable_to(&iface));
    }

    #[test]
    fn named_types_are_distinct_from_their_structure_peers() {
        let base = primitive(Kind::Int);
        let celsius = named(Rc::from("Celsius"), &base);
        let fahrenheit = named(Rc::from("Fahrenheit"), &base);
        assert!(!same_type(&celsius, &fahrenheit));
        // named <-> unnamed with identical underlying structure
        assert!(celsius.assignable_to(&base));
        assert!(celsius.convertible_to(&fahrenheit));
    }

    #[test]
    fn numeric_kinds_are_mutually_convertible() {
        assert!(primitive(Kind::Int).convertible_to(&primitive(Kind::Float64)));
        assert!(!primitive(Kind::String).convertible_to(&primitive(Kind::Int)));
    }
}
