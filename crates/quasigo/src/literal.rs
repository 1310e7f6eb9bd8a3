//! Basic-literal and composite-literal evaluation, plus the type
//! evaluator over type expressions.

use std::rc::Rc;

use crate::ast::{BasicLit, CompositeLit, Expr, FuncLit};
use crate::env::Env;
use crate::error::{EvalError, Flow, Unwind};
use crate::token::Token;
use crate::types::{self, Kind, StructField, Type};
use crate::value::{value_to_type, ExprOut, Value, Values};

/// Decodes a basic literal to its value.
///
/// Integer literals prefer the narrowest representable kind in order
/// `int`, `int64`, `uint`, `uint64`; float literals are 64-bit;
/// imaginary literals strip the trailing `i` and form a complex value
/// with zero real part; character and string literals are
/// escape-decoded.
pub fn eval_literal(node: &BasicLit) -> Result<Value, EvalError> {
    let text = node.value.as_str();
    match node.kind {
        Token::Int => {
            let digits: String = text.chars().filter(|&c| c != '_').collect();
            // a leading sign appears only in synthesized literals
            if let Some(body) = digits.strip_prefix('-') {
                let narrow: i64 = body
                    .parse()
                    .map_err(|e| EvalError::syntax(format!("invalid integer literal {text}: {e}")).at(node.pos))?;
                return Ok(Value::int(-narrow));
            }
            let (radix, body) = match digits.get(..2) {
                Some("0x" | "0X") => (16, &digits[2..]),
                Some("0o" | "0O") => (8, &digits[2..]),
                Some("0b" | "0B") => (2, &digits[2..]),
                _ if digits.len() > 1 && digits.starts_with('0') => (8, &digits[1..]),
                _ => (10, digits.as_str()),
            };
            let wide = u64::from_str_radix(body, radix)
                .map_err(|e| EvalError::syntax(format!("invalid integer literal {text}: {e}")).at(node.pos))?;
            match i64::try_from(wide) {
                Ok(narrow) => Ok(Value::int(narrow)),
                Err(_) => Ok(Value::Uint(Kind::Uint, wide)),
            }
        }
        Token::Float => {
            let digits: String = text.chars().filter(|&c| c != '_').collect();
            let f: f64 = digits
                .parse()
                .map_err(|e| EvalError::syntax(format!("invalid float literal {text}: {e}")).at(node.pos))?;
            Ok(Value::float64(f))
        }
        Token::Imag => {
            let body = text.strip_suffix('i').unwrap_or(text);
            let digits: String = body.chars().filter(|&c| c != '_').collect();
            let im: f64 = digits
                .parse()
                .map_err(|e| EvalError::syntax(format!("invalid imaginary literal {text}: {e}")).at(node.pos))?;
            Ok(Value::Complex(Kind::Complex128, 0.0, im))
        }
        Token::Char => {
            let c = unescape_char(text)
                .ok_or_else(|| EvalError::syntax(format!("invalid character literal {text}")).at(node.pos))?;
            Ok(Value::rune(c))
        }
        Token::Str => {
            let s = unescape_string(text)
                .ok_or_else(|| EvalError::syntax(format!("invalid string literal {text}")).at(node.pos))?;
            Ok(Value::str(s))
        }
        other => Err(EvalError::syntax(format!("unexpected literal kind {other:?}")).at(node.pos)),
    }
}

fn unescape_char(text: &str) -> Option<char> {
    let body = text.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut chars = body.chars();
    let first = chars.next()?;
    if first != '\\' {
        return if chars.next().is_none() { Some(first) } else { None };
    }
    let decoded = decode_escape(&mut chars)?;
    if chars.next().is_none() {
        Some(decoded)
    } else {
        None
    }
}

fn unescape_string(text: &str) -> Option<String> {
    if let Some(raw) = text.strip_prefix('`') {
        return raw.strip_suffix('`').map(str::to_owned);
    }
    let body = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(decode_escape(&mut chars)?);
        } else {
            out.push(c);
        }
    }
    Some(out)
}

fn decode_escape(chars: &mut std::str::Chars<'_>) -> Option<char> {
    let c = chars.next()?;
    Some(match c {
        'a' => '\x07',
        'b' => '\x08',
        'f' => '\x0c',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\x0b',
        '\\' => '\\',
        '\'' => '\'',
        '"' => '"',
        '0' => '\0',
        'x' => decode_hex(chars, 2)?,
        'u' => decode_hex(chars, 4)?,
        'U' => decode_hex(chars, 8)?,
        _ => return None,
    })
}

fn decode_hex(chars: &mut std::str::Chars<'_>, n: usize) -> Option<char> {
    let mut code = 0u32;
    for _ in 0..n {
        code = code * 16 + chars.next()?.to_digit(16)?;
    }
    char::from_u32(code)
}

impl Env {
    /// Evaluates a type expression to its descriptor.
    pub fn eval_type(self: &Rc<Self>, x: &Expr) -> Flow<Type> {
        match x {
            Expr::Ident(id) => {
                if let Some(ty) = predeclared_type(&id.name) {
                    return Ok(ty);
                }
                self.lookup_type(&id.name)
                    .ok_or_else(|| EvalError::resolution(format!("undefined type: {}", id.name)).at(id.pos).into())
            }
            Expr::Selector(sel) => {
                let obj = self.eval_expr1(&sel.x)?;
                match obj {
                    Value::Package(pkg) => pkg.pkg.types.get(&*sel.sel.name).cloned().ok_or_else(|| {
                        EvalError::resolution(format!(
                            "package {} {:?} has no type {}",
                            pkg.name, pkg.path, sel.sel.name
                        ))
                        .at(sel.sel.pos)
                        .into()
                    }),
                    other => Err(EvalError::type_(format!("not a package: {other:?}")).at(sel.sel.pos).into()),
                }
            }
            Expr::ArrayType(a) => {
                let elem = self.eval_type(&a.elt)?;
                match &a.len {
                    None => Ok(types::slice_of(elem)),
                    Some(len_expr) => {
                        let len = self.eval_expr1(len_expr)?;
                        let len = len
                            .as_int()
                            .filter(|n| *n >= 0)
                            .ok_or_else(|| EvalError::type_(format!("invalid array length: {len:?}")))?;
                        Ok(types::array_of(len as usize, elem))
                    }
                }
            }
            Expr::MapType(m) => {
                let key = self.eval_type(&m.key)?;
                let value = self.eval_type(&m.value)?;
                Ok(types::map_of(key, value))
            }
            Expr::ChanType(c) => Ok(types::chan_of(self.eval_type(&c.value)?)),
            Expr::Star(s) => Ok(types::ptr_to(self.eval_type(&s.x)?)),
            Expr::Paren(p) => self.eval_type(&p.x),
            Expr::Ellipsis(e) => match &e.elt {
                Some(elt) => Ok(types::slice_of(self.eval_type(elt)?)),
                None => Err(EvalError::type_("ellipsis without element type").into()),
            },
            Expr::FuncType(ft) => {
                let (params, results, variadic) = crate::call::signature_types(self, ft)?;
                Ok(types::func_of(params, results, variadic))
            }
            Expr::StructType(st) => {
                let mut fields = vec![];
                for field in &st.fields.list {
                    let ty = match &field.ty {
                        Some(ty) => self.eval_type(ty)?,
                        None => types::empty_interface(),
                    };
                    for name in &field.names {
                        fields.push(StructField {
                            name: name.name.clone(),
                            ty: ty.clone(),
                        });
                    }
                }
                Ok(types::struct_of(fields))
            }
            Expr::InterfaceType(it) => {
                let methods = it
                    .methods
                    .list
                    .iter()
                    .flat_map(|f| f.names.iter().map(|n| n.name.clone()))
                    .collect();
                Ok(types::interface_of(methods))
            }
            other => Err(EvalError::type_(format!("expecting type, found {other}")).into()),
        }
    }

    /// Like `eval_type`, but yields `None` when the expression is not a
    /// type (used by type-switch case lists, where `nil` is legal).
    pub fn eval_type_or_nil(self: &Rc<Self>, x: &Expr) -> Flow<Option<Type>> {
        if let Expr::Ident(id) = x {
            if &*id.name == "nil" {
                return Ok(None);
            }
        }
        self.eval_type(x).map(Some)
    }

    /// Materializes a composite literal. `expected` supplies the type for
    /// nested literals with elided types.
    pub fn eval_composite_lit(self: &Rc<Self>, node: &CompositeLit, expected: Option<&Type>) -> Flow<ExprOut> {
        let ty = match &node.ty {
            Some(ty_expr) => self.eval_type(ty_expr)?,
            None => expected
                .cloned()
                .ok_or_else(|| EvalError::type_("composite literal with no type").at(node.lbrace))?,
        };
        let value = match ty.kind() {
            Kind::Map => self.composite_map(node, &ty)?,
            Kind::Array | Kind::Slice => self.composite_sequence(node, &ty)?,
            Kind::Struct => self.composite_struct(node, &ty)?,
            _ => {
                return Err(EvalError::type_(format!("invalid composite literal type: {ty}"))
                    .at(node.lbrace)
                    .into())
            }
        };
        Ok((value, Values::new()))
    }

    fn eval_elt(self: &Rc<Self>, elt: &Expr, want: &Type) -> Flow<Value> {
        let raw = match elt {
            Expr::Composite(c) if c.ty.is_none() => self.eval_composite_lit(c, Some(want))?.0,
            other => self.eval_expr1(other)?,
        };
        value_to_type(&raw, want).map_err(Unwind::from)
    }

    fn composite_map(self: &Rc<Self>, node: &CompositeLit, ty: &Type) -> Flow<Value> {
        let map = Value::new_map(ty.clone());
        let Value::Map(m) = &map else { unreachable!() };
        let (kt, vt) = (m.key_type(), m.elem_type());
        for elt in &node.elts {
            match elt {
                Expr::KeyValue(kv) => {
                    let key = self.eval_elt(&kv.key, &kt)?;
                    let value = self.eval_elt(&kv.value, &vt)?;
                    m.insert(key, value)?;
                }
                other => {
                    return Err(EvalError::type_(format!(
                        "map literal: expecting key: value, found {other}"
                    ))
                    .at(other.pos())
                    .into())
                }
            }
        }
        Ok(map)
    }

    /// Array/slice literal. Elements may mix `index: value` entries and
    /// positional entries; a positional entry uses the previous index
    /// plus one, and a keyed index may decrease, overwriting that slot
    /// while leaving earlier entries untouched.
    fn composite_sequence(self: &Rc<Self>, node: &CompositeLit, ty: &Type) -> Flow<Value> {
        let vt = ty.elem().unwrap_or_else(types::empty_interface);
        let is_array = ty.kind() == Kind::Array;
        let mut cells: Vec<Value> = if is_array {
            let len = ty.array_len().unwrap_or(0);
            (0..len).map(|_| types::zero_value(&vt)).collect()
        } else {
            vec![]
        };
        let mut idx: i64 = -1;
        for elt in &node.elts {
            let (value, target) = match elt {
                Expr::KeyValue(kv) => {
                    let key = self.eval_expr1(&kv.key)?;
                    let key = crate::arith::to_int(&key)
                        .ok_or_else(|| EvalError::type_(format!("invalid array index: {key:?}")))?;
                    (self.eval_elt(&kv.value, &vt)?, key)
                }
                other => (self.eval_elt(other, &vt)?, idx + 1),
            };
            idx = target;
            if target < 0 {
                return Err(EvalError::domain(format!("index out of range: {target}")).into());
            }
            let target = target as usize;
            if is_array {
                if target >= cells.len() {
                    return Err(EvalError::domain(format!(
                        "array index {target} out of bounds [0:{}]",
                        cells.len()
                    ))
                    .into());
                }
            } else {
                while cells.len() <= target {
                    cells.push(types::zero_value(&vt));
                }
            }
            cells[target] = value;
        }
        Ok(if is_array {
            Value::new_array(ty.clone(), cells)
        } else {
            Value::new_slice(ty.clone(), cells)
        })
    }

    fn composite_struct(self: &Rc<Self>, node: &CompositeLit, ty: &Type) -> Flow<Value> {
        let mut cells: Vec<Value> = (0..ty.num_fields())
            .map(|i| types::zero_value(&ty.field(i).expect("index in range").ty))
            .collect();
        let mut keyed = false;
        let mut positional = false;
        for (i, elt) in node.elts.iter().enumerate() {
            match elt {
                Expr::KeyValue(kv) => {
                    if positional {
                        return Err(EvalError::type_(
                            "cannot mix keyed and non-keyed initializers in struct literal",
                        )
                        .at(node.lbrace)
                        .into());
                    }
                    keyed = true;
                    let Expr::Ident(name) = &kv.key else {
                        return Err(EvalError::type_(format!("invalid field name: {}", kv.key)).into());
                    };
                    let (slot, field) = ty.field_by_name(&name.name).ok_or_else(|| {
                        EvalError::resolution(format!("struct <{ty}> has no field {}", name.name)).at(name.pos)
                    })?;
                    cells[slot] = self.eval_elt(&kv.value, &field.ty)?;
                }
                other => {
                    if keyed {
                        return Err(EvalError::type_(
                            "cannot mix keyed and non-keyed initializers in struct literal",
                        )
                        .at(node.lbrace)
                        .into());
                    }
                    positional = true;
                    let field = ty.field(i).ok_or_else(|| {
                        EvalError::type_(format!("too many initializers for struct <{ty}>")).at(other.pos())
                    })?;
                    cells[i] = self.eval_elt(other, &field.ty)?;
                }
            }
        }
        Ok(Value::new_struct(ty.clone(), cells))
    }

    /// A function literal: a closure over the current frame chain.
    pub fn eval_func_lit(self: &Rc<Self>, node: &FuncLit) -> Flow<ExprOut> {
        let func = crate::call::build_closure(self, None, &node.ty, &node.body)?;
        Ok((Value::Func(func), Values::new()))
    }
}

fn predeclared_type(name: &str) -> Option<Type> {
    let kind = match name {
        "bool" => Kind::Bool,
        "int" => Kind::Int,
        "int8" => Kind::Int8,
        "int16" => Kind::Int16,
        "int32" | "rune" => Kind::Int32,
        "int64" => Kind::Int64,
        "uint" => Kind::Uint,
        "uint8" | "byte" => Kind::Uint8,
        "uint16" => Kind::Uint16,
        "uint32" => Kind::Uint32,
        "uint64" => Kind::Uint64,
        "float32" => Kind::Float32,
        "float64" => Kind::Float64,
        "complex64" => Kind::Complex64,
        "complex128" => Kind::Complex128,
        "string" => Kind::String,
        _ => return None,
    };
    Some(types::primitive(kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Pos;

    fn lit(kind: Token, value: &str) -> BasicLit {
        BasicLit {
            kind,
            value: value.to_owned(),
            pos: Pos::new(1, 1),
        }
    }

    #[test]
    fn integers_prefer_the_narrowest_kind() {
        assert_eq!(eval_literal(&lit(Token::Int, "42")).unwrap(), Value::int(42));
        assert_eq!(eval_literal(&lit(Token::Int, "0x10")).unwrap(), Value::int(16));
        // too large for a signed int: falls back to uint
        assert_eq!(
            eval_literal(&lit(Token::Int, "18446744073709551615")).unwrap(),
            Value::Uint(Kind::Uint, u64::MAX)
        );
    }

    #[test]
    fn imaginary_literals_form_complex_values() {
        assert_eq!(
            eval_literal(&lit(Token::Imag, "2.5i")).unwrap(),
            Value::Complex(Kind::Complex128, 0.0, 2.5)
        );
    }

    #[test]
    fn char_literals_decode_escapes() {
        assert_eq!(eval_literal(&lit(Token::Char, "'a'")).unwrap(), Value::rune('a'));
        assert_eq!(eval_literal(&lit(Token::Char, "'\\n'")).unwrap(), Value::rune('\n'));
        assert_eq!(eval_literal(&lit(Token::Char, "'\\x41'")).unwrap(), Value::rune('A'));
    }

    #[test]
    fn string_literals_decode_escapes() {
        assert_eq!(
            eval_literal(&lit(Token::Str, "\"a\\tb\"")).unwrap(),
            Value::str("a\tb")
        );
        assert_eq!(
            eval_literal(&lit(Token::Str, "`raw\\n`")).unwrap(),
            Value::str("raw\\n")
        );
    }
}
