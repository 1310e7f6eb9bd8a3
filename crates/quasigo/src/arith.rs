//! Binary and unary operator kernels.
//!
//! Operands are aligned first: the right operand is converted to the left
//! operand's kind, then the operation dispatches on that kind. Integer
//! arithmetic wraps at the kind's width; integer division by zero is a
//! domain error.

use crate::error::EvalError;
use crate::token::Token;
use crate::types::Kind;
use crate::value::{convert_numeric, value_to_type, values_equal, wrap_signed, wrap_unsigned, Value};

pub fn eval_binary_op(op: Token, x: &Value, y: &Value) -> Result<Value, EvalError> {
    if matches!(op, Token::Shl | Token::Shr) {
        return eval_shift(op, x, y);
    }
    // nil compares against reference kinds without alignment
    if matches!(op, Token::Eql | Token::Neq) && (x.is_nil() || y.is_nil()) {
        let eq = values_equal(x, y);
        return Ok(Value::Bool((op == Token::Eql) == eq));
    }
    let y = align(x, y)?;

    match op {
        Token::Eql => return Ok(Value::Bool(values_equal(x, &y))),
        Token::Neq => return Ok(Value::Bool(!values_equal(x, &y))),
        Token::Lss | Token::Leq | Token::Gtr | Token::Geq => return compare_ordered(op, x, &y),
        _ => {}
    }

    match x {
        Value::Int(kind, a) => int_op(op, *kind, *a, expect_int(&y, op)?),
        Value::Uint(kind, a) => uint_op(op, *kind, *a, expect_uint(&y, op)?),
        Value::Float(kind, a) => float_op(op, *kind, *a, expect_float(&y, op)?),
        Value::Complex(kind, ar, ai) => {
            let (br, bi) = expect_complex(&y, op)?;
            complex_op(op, *kind, (*ar, *ai), (br, bi))
        }
        Value::Str(a) => match (op, &y) {
            (Token::Add, Value::Str(b)) => Ok(Value::str(format!("{a}{b}"))),
            _ => Err(unsupported(op, x)),
        },
        _ => Err(unsupported(op, x)),
    }
}

pub fn eval_unary_op(op: Token, x: &Value) -> Result<Value, EvalError> {
    match (op, x) {
        (Token::Add, v) if v.kind().is_numeric() => Ok(v.clone()),
        (Token::Sub, Value::Int(k, v)) => Ok(Value::Int(*k, wrap_signed(-i128::from(*v), k.bits()))),
        (Token::Sub, Value::Uint(k, v)) => Ok(Value::Uint(*k, wrap_unsigned(-i128::from(*v), k.bits()))),
        (Token::Sub, Value::Float(k, v)) => Ok(Value::Float(*k, -v)),
        (Token::Sub, Value::Complex(k, re, im)) => Ok(Value::Complex(*k, -re, -im)),
        (Token::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (Token::Xor, Value::Int(k, v)) => Ok(Value::Int(*k, wrap_signed(!i128::from(*v), k.bits()))),
        (Token::Xor, Value::Uint(k, v)) => Ok(Value::Uint(*k, wrap_unsigned(!i128::from(*v), k.bits()))),
        _ => Err(unsupported(op, x)),
    }
}

fn align(x: &Value, y: &Value) -> Result<Value, EvalError> {
    if x.kind() == y.kind() {
        return Ok(y.clone());
    }
    value_to_type(y, &x.type_of())
        .map_err(|_| EvalError::type_(format!("mismatched operand kinds: {} and {}", x.kind(), y.kind())))
}

fn unsupported(op: Token, x: &Value) -> EvalError {
    EvalError::type_(format!("unsupported operand for {op}: {x:?}"))
}

fn expect_int(v: &Value, op: Token) -> Result<i64, EvalError> {
    match v {
        Value::Int(_, i) => Ok(*i),
        other => Err(unsupported(op, other)),
    }
}

fn expect_uint(v: &Value, op: Token) -> Result<u64, EvalError> {
    match v {
        Value::Uint(_, u) => Ok(*u),
        other => Err(unsupported(op, other)),
    }
}

fn expect_float(v: &Value, op: Token) -> Result<f64, EvalError> {
    match v {
        Value::Float(_, f) => Ok(*f),
        other => Err(unsupported(op, other)),
    }
}

fn expect_complex(v: &Value, op: Token) -> Result<(f64, f64), EvalError> {
    match v {
        Value::Complex(_, re, im) => Ok((*re, *im)),
        other => Err(unsupported(op, other)),
    }
}

fn int_op(op: Token, kind: Kind, a: i64, b: i64) -> Result<Value, EvalError> {
    let (a, b) = (i128::from(a), i128::from(b));
    let wide = match op {
        Token::Add => a + b,
        Token::Sub => a - b,
        Token::Mul => a * b,
        Token::Quo => {
            if b == 0 {
                return Err(EvalError::domain("integer divide by zero"));
            }
            a / b
        }
        Token::Rem => {
            if b == 0 {
                return Err(EvalError::domain("integer divide by zero"));
            }
            a % b
        }
        Token::And => a & b,
        Token::Or => a | b,
        Token::Xor => a ^ b,
        Token::AndNot => a & !b,
        _ => return Err(unsupported(op, &Value::Int(kind, a as i64))),
    };
    Ok(Value::Int(kind, wrap_signed(wide, kind.bits())))
}

fn uint_op(op: Token, kind: Kind, a: u64, b: u64) -> Result<Value, EvalError> {
    let (a, b) = (i128::from(a), i128::from(b));
    let wide = match op {
        Token::Add => a + b,
        Token::Sub => a - b,
        Token::Mul => a * b,
        Token::Quo => {
            if b == 0 {
                return Err(EvalError::domain("integer divide by zero"));
            }
            a / b
        }
        Token::Rem => {
            if b == 0 {
                return Err(EvalError::domain("integer divide by zero"));
            }
            a % b
        }
        Token::And => a & b,
        Token::Or => a | b,
        Token::Xor => a ^ b,
        Token::AndNot => a & !b,
        _ => return Err(unsupported(op, &Value::Uint(kind, a as u64))),
    };
    Ok(Value::Uint(kind, wrap_unsigned(wide, kind.bits())))
}

fn float_op(op: Token, kind: Kind, a: f64, b: f64) -> Result<Value, EvalError> {
    let out = match op {
        Token::Add => a + b,
        Token::Sub => a - b,
        Token::Mul => a * b,
        Token::Quo => a / b,
        _ => return Err(unsupported(op, &Value::Float(kind, a))),
    };
    let out = if kind == Kind::Float32 { f64::from(out as f32) } else { out };
    Ok(Value::Float(kind, out))
}

fn complex_op(op: Token, kind: Kind, (ar, ai): (f64, f64), (br, bi): (f64, f64)) -> Result<Value, EvalError> {
    let (re, im) = match op {
        Token::Add => (ar + br, ai + bi),
        Token::Sub => (ar - br, ai - bi),
        Token::Mul => (ar * br - ai * bi, ar * bi + ai * br),
        Token::Quo => {
            let denom = br * br + bi * bi;
            ((ar * br + ai * bi) / denom, (ai * br - ar * bi) / denom)
        }
        _ => return Err(unsupported(op, &Value::Complex(kind, ar, ai))),
    };
    Ok(Value::Complex(kind, re, im))
}

fn compare_ordered(op: Token, x: &Value, y: &Value) -> Result<Value, EvalError> {
    let ord = match (x, y) {
        (Value::Int(_, a), Value::Int(_, b)) => a.partial_cmp(b),
        (Value::Uint(_, a), Value::Uint(_, b)) => a.partial_cmp(b),
        (Value::Float(_, a), Value::Float(_, b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        _ => return Err(unsupported(op, x)),
    };
    let Some(ord) = ord else {
        // NaN comparisons are all false
        return Ok(Value::Bool(false));
    };
    Ok(Value::Bool(match op {
        Token::Lss => ord.is_lt(),
        Token::Leq => ord.is_le(),
        Token::Gtr => ord.is_gt(),
        Token::Geq => ord.is_ge(),
        _ => unreachable!("caller matched a comparison token"),
    }))
}

fn eval_shift(op: Token, x: &Value, y: &Value) -> Result<Value, EvalError> {
    let count = match y {
        Value::Int(_, i) if *i >= 0 => *i as u32,
        Value::Uint(_, u) => *u as u32,
        _ => return Err(EvalError::type_(format!("invalid shift count: {y:?}"))),
    };
    match x {
        Value::Int(kind, a) => {
            let wide = if op == Token::Shl {
                i128::from(*a) << count.min(127)
            } else {
                i128::from(*a) >> count.min(127)
            };
            Ok(Value::Int(*kind, wrap_signed(wide, kind.bits())))
        }
        Value::Uint(kind, a) => {
            let wide = if op == Token::Shl {
                i128::from(*a) << count.min(127)
            } else {
                i128::from(*a) >> count.min(127)
            };
            Ok(Value::Uint(*kind, wrap_unsigned(wide, kind.bits())))
        }
        _ => Err(unsupported(op, x)),
    }
}

/// Converts an index-like value to `int`, for slice/array indexing.
pub fn to_int(v: &Value) -> Option<i64> {
    match convert_numeric(v, Kind::Int) {
        Some(Value::Int(_, i)) => Some(i),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligns_right_operand_to_left_kind() {
        let out = eval_binary_op(Token::Add, &Value::float64(1.5), &Value::int(2)).unwrap();
        assert_eq!(out, Value::float64(3.5));
    }

    #[test]
    fn integer_division_by_zero_is_a_domain_error() {
        let err = eval_binary_op(Token::Quo, &Value::int(1), &Value::int(0)).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Domain);
    }

    #[test]
    fn narrow_kinds_wrap() {
        let a = Value::Int(Kind::Int8, 120);
        let out = eval_binary_op(Token::Add, &a, &Value::Int(Kind::Int8, 10)).unwrap();
        assert_eq!(out, Value::Int(Kind::Int8, -126));
    }

    #[test]
    fn string_concat_and_compare() {
        let out = eval_binary_op(Token::Add, &Value::str("ab"), &Value::str("cd")).unwrap();
        assert_eq!(out, Value::str("abcd"));
        let out = eval_binary_op(Token::Lss, &Value::str("ab"), &Value::str("b")).unwrap();
        assert_eq!(out, Value::Bool(true));
    }

    #[test]
    fn bit_complement() {
        assert_eq!(eval_unary_op(Token::Xor, &Value::int(0)).unwrap(), Value::int(-1));
    }
}
