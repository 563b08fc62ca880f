use std::cmp::Ordering;

use anyhow::bail;

use crate::{err::RuntimeError, val::Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOp {
    Add,
    Sub,
    Mult,
    Div,
}

impl NumericOp {
    pub fn from_name(name: &str) -> Option<Self> {
        let op = match name {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mult,
            "/" => Self::Div,
            _ => return None,
        };
        Some(op)
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mult => "*",
            Self::Div => "/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerOp {
    ShiftLeft,
    ShiftRightArith,
    ShiftRightLog,
    Modulo,
    BitAnd,
    BitOr,
    BitXor,
}

impl IntegerOp {
    pub fn from_name(name: &str) -> Option<Self> {
        let op = match name {
            "sll" => Self::ShiftLeft,
            "sra" => Self::ShiftRightArith,
            "srl" => Self::ShiftRightLog,
            "mod" => Self::Modulo,
            "bit-and" => Self::BitAnd,
            "bit-or" => Self::BitOr,
            "bit-xor" => Self::BitXor,
            _ => return None,
        };
        Some(op)
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Self::ShiftLeft => "sll",
            Self::ShiftRightArith => "sra",
            Self::ShiftRightLog => "srl",
            Self::Modulo => "mod",
            Self::BitAnd => "bit-and",
            Self::BitOr => "bit-or",
            Self::BitXor => "bit-xor",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(name: &str, v: &Value) -> anyhow::Result<Self> {
        let n = match v {
            Value::Int(n) => Num::Int(*n),
            Value::Char(c) => Num::Int(*c as i64),
            Value::Float(n) => Num::Float(*n),
            _ => return Err(RuntimeError::mismatch(name, "number", v).into()),
        };
        Ok(n)
    }

    const fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(n) => n,
        }
    }
}

fn int_operand(name: &str, v: &Value) -> anyhow::Result<i64> {
    match v {
        Value::Int(n) => Ok(*n),
        Value::Char(c) => Ok(*c as i64),
        _ => Err(RuntimeError::mismatch(name, "int or char", v).into()),
    }
}

/// Applies one of + - * /. Ints stay ints (wrapping); a Float on either side
/// promotes both. Chars count as ints.
pub fn numeric_do(op: NumericOp, a: &Value, b: &Value) -> anyhow::Result<Value> {
    let name = op.symbol();
    let res = match (Num::of(name, a)?, Num::of(name, b)?) {
        (Num::Int(x), Num::Int(y)) => {
            let n = match op {
                NumericOp::Add => x.wrapping_add(y),
                NumericOp::Sub => x.wrapping_sub(y),
                NumericOp::Mult => x.wrapping_mul(y),
                NumericOp::Div => {
                    if y == 0 {
                        bail!(RuntimeError::DivideByZero);
                    }
                    x.wrapping_div(y)
                }
            };
            Value::Int(n)
        }
        (x, y) => {
            let (x, y) = (x.as_f64(), y.as_f64());
            let n = match op {
                NumericOp::Add => x + y,
                NumericOp::Sub => x - y,
                NumericOp::Mult => x * y,
                NumericOp::Div => x / y,
            };
            Value::Float(n)
        }
    };
    Ok(res)
}

pub fn integer_do(op: IntegerOp, a: &Value, b: &Value) -> anyhow::Result<Value> {
    let name = op.symbol();
    let x = int_operand(name, a)?;
    let y = int_operand(name, b)?;

    let shift = |y: i64| -> anyhow::Result<u32> {
        if y < 0 {
            bail!(RuntimeError::mismatch(name, "non-negative shift count", b));
        }
        Ok(u32::try_from(y).unwrap_or(u32::MAX))
    };

    let n = match op {
        IntegerOp::ShiftLeft => x.checked_shl(shift(y)?).unwrap_or(0),
        IntegerOp::ShiftRightArith => {
            let s = shift(y)?.min(63);
            x >> s
        }
        IntegerOp::ShiftRightLog => (x as u64).checked_shr(shift(y)?).unwrap_or(0) as i64,
        IntegerOp::Modulo => {
            if y == 0 {
                bail!(RuntimeError::DivideByZero);
            }
            x.wrapping_rem(y)
        }
        IntegerOp::BitAnd => x & y,
        IntegerOp::BitOr => x | y,
        IntegerOp::BitXor => x ^ y,
    };
    Ok(Value::Int(n))
}

/// Bitwise not. A Char stays a Char when the flipped code point is still a
/// valid scalar value.
pub fn complement(v: &Value) -> anyhow::Result<Value> {
    match v {
        Value::Int(n) => Ok(Value::Int(!n)),
        Value::Char(c) => {
            let flipped = !(*c as u32);
            Ok(char::from_u32(flipped)
                .map(Value::Char)
                .unwrap_or(Value::Int(!(*c as i64))))
        }
        _ => Err(RuntimeError::mismatch("bit-not", "int or char", v).into()),
    }
}

fn float_cmp(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| a.total_cmp(&b))
}

/// Three-way compare. Numbers compare across Int, Float and Char; strings,
/// symbols and bools compare within their own kind; arrays and lists compare
/// element by element.
pub fn compare(a: &Value, b: &Value) -> anyhow::Result<Ordering> {
    let ord = match (a, b) {
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Symbol(x), Value::Symbol(y)) => x.name().cmp(y.name()),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Array(x), Value::Array(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            compare_seq(x.iter(), y.iter())?
        }
        (Value::Pair(_), Value::Pair(_) | Value::Null) | (Value::Null, Value::Pair(_)) => {
            compare_lists(a, b)?
        }
        _ if a.is_number() && b.is_number() => match (Num::of("compare", a)?, Num::of("compare", b)?) {
            (Num::Int(x), Num::Int(y)) => x.cmp(&y),
            (x, y) => float_cmp(x.as_f64(), y.as_f64()),
        },
        _ => bail!(RuntimeError::mismatch("compare", a.type_name(), b)),
    };
    Ok(ord)
}

fn compare_seq<'a>(
    mut xs: impl Iterator<Item = &'a Value>,
    mut ys: impl Iterator<Item = &'a Value>,
) -> anyhow::Result<Ordering> {
    loop {
        match (xs.next(), ys.next()) {
            (None, None) => return Ok(Ordering::Equal),
            (None, Some(_)) => return Ok(Ordering::Less),
            (Some(_), None) => return Ok(Ordering::Greater),
            (Some(x), Some(y)) => match compare(x, y)? {
                Ordering::Equal => continue,
                ord => return Ok(ord),
            },
        }
    }
}

fn compare_lists(mut a: &Value, mut b: &Value) -> anyhow::Result<Ordering> {
    loop {
        match (a, b) {
            (Value::Pair(x), Value::Pair(y)) => match compare(&x.head, &y.head)? {
                Ordering::Equal => {
                    a = &x.tail;
                    b = &y.tail;
                }
                ord => return Ok(ord),
            },
            (Value::Null, Value::Null) => return Ok(Ordering::Equal),
            (Value::Null, _) => return Ok(Ordering::Less),
            (_, Value::Null) => return Ok(Ordering::Greater),
            // dotted tails
            (x, y) => return compare(x, y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_div_by_zero(res: anyhow::Result<Value>) -> bool {
        matches!(
            res.map_err(|e| e.downcast::<RuntimeError>()),
            Err(Ok(RuntimeError::DivideByZero))
        )
    }

    #[test]
    fn promotes_mixed_operands() -> anyhow::Result<()> {
        assert_eq!(
            numeric_do(NumericOp::Add, &Value::Int(1), &Value::Float(0.5))?,
            Value::Float(1.5)
        );
        assert_eq!(
            numeric_do(NumericOp::Mult, &Value::Char('a'), &Value::Int(2))?,
            Value::Int(194)
        );
        assert_eq!(
            numeric_do(NumericOp::Div, &Value::Int(7), &Value::Int(2))?,
            Value::Int(3)
        );
        Ok(())
    }

    #[test]
    fn division_by_zero() -> anyhow::Result<()> {
        assert!(is_div_by_zero(numeric_do(
            NumericOp::Div,
            &Value::Int(7),
            &Value::Int(0)
        )));
        assert!(is_div_by_zero(integer_do(
            IntegerOp::Modulo,
            &Value::Int(7),
            &Value::Int(0)
        )));
        assert_eq!(
            numeric_do(NumericOp::Div, &Value::Float(7.0), &Value::Float(0.0))?,
            Value::Float(f64::INFINITY)
        );
        Ok(())
    }

    #[test]
    fn shifts() -> anyhow::Result<()> {
        assert_eq!(integer_do(IntegerOp::ShiftLeft, &Value::Int(1), &Value::Int(4))?, Value::Int(16));
        assert_eq!(integer_do(IntegerOp::ShiftLeft, &Value::Int(1), &Value::Int(64))?, Value::Int(0));
        assert_eq!(integer_do(IntegerOp::ShiftRightArith, &Value::Int(-16), &Value::Int(2))?, Value::Int(-4));
        assert_eq!(integer_do(IntegerOp::ShiftRightArith, &Value::Int(-1), &Value::Int(100))?, Value::Int(-1));
        assert_eq!(
            integer_do(IntegerOp::ShiftRightLog, &Value::Int(-1), &Value::Int(60))?,
            Value::Int(15)
        );
        assert!(integer_do(IntegerOp::ShiftLeft, &Value::Int(1), &Value::Int(-1)).is_err());
        assert!(integer_do(IntegerOp::BitAnd, &Value::Float(1.0), &Value::Int(1)).is_err());
        Ok(())
    }

    #[test]
    fn complement_keeps_chars_when_valid() -> anyhow::Result<()> {
        assert_eq!(complement(&Value::Int(0))?, Value::Int(-1));
        // !('a' as u32) is far past char::MAX
        assert_eq!(complement(&Value::Char('a'))?, Value::Int(!97));
        Ok(())
    }

    #[test]
    fn compare_is_antisymmetric() -> anyhow::Result<()> {
        let vals = [
            Value::Int(-3),
            Value::Int(2),
            Value::Float(2.0),
            Value::Float(f64::NAN),
            Value::Float(f64::NEG_INFINITY),
            Value::Char('b'),
        ];
        for a in vals.iter() {
            for b in vals.iter() {
                assert_eq!(compare(a, b)?, compare(b, a)?.reverse(), "{a} vs {b}");
            }
        }

        let strs = [Value::string("abc"), Value::string("abd"), Value::string("")];
        for a in strs.iter() {
            for b in strs.iter() {
                assert_eq!(compare(a, b)?, compare(b, a)?.reverse());
            }
        }
        Ok(())
    }

    #[test]
    fn incomparable_is_a_type_mismatch() {
        let err = compare(&Value::Int(1), &Value::string("1")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RuntimeError>(),
            Some(RuntimeError::TypeMismatch { .. })
        ));
    }
}
