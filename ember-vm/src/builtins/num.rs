use std::cmp::Ordering;

use anyhow::bail;

use super::{exact_args, min_args};
use crate::{
    err::RuntimeError,
    num::{self as ops, IntegerOp, NumericOp},
    val::Value,
    vm::Vm,
};

pub fn compare(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [a, b] = exact_args::<2>(name, args)?;
    let ord = ops::compare(a, b)?;
    let res = match name {
        "<" => ord == Ordering::Less,
        ">" => ord == Ordering::Greater,
        "<=" => ord != Ordering::Greater,
        ">=" => ord != Ordering::Less,
        "=" => ord == Ordering::Equal,
        "not=" => ord != Ordering::Equal,
        _ => bail!(RuntimeError::mismatch(name, "comparison operator", &Value::string(name))),
    };
    Ok(Value::Bool(res))
}

/// `(+ a b c)` is `((a + b) + c)`. A single argument is returned as is.
pub fn numeric(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    min_args(name, args, 1)?;
    let Some(op) = NumericOp::from_name(name) else {
        bail!(RuntimeError::mismatch(name, "numeric operator", &Value::string(name)));
    };
    let (first, rest) = (&args[0], &args[1..]);
    if !first.is_number() {
        bail!(RuntimeError::mismatch(name, "number", first));
    }
    rest.iter()
        .try_fold(first.clone(), |acc, v| ops::numeric_do(op, &acc, v))
}

/// Shifts and `mod` take exactly two operands.
pub fn integer(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [a, b] = exact_args::<2>(name, args)?;
    let Some(op) = IntegerOp::from_name(name) else {
        bail!(RuntimeError::mismatch(name, "integer operator", &Value::string(name)));
    };
    ops::integer_do(op, a, b)
}

pub fn bitwise(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    min_args(name, args, 2)?;
    let Some(op) = IntegerOp::from_name(name) else {
        bail!(RuntimeError::mismatch(name, "bitwise operator", &Value::string(name)));
    };
    args[1..]
        .iter()
        .try_fold(args[0].clone(), |acc, v| ops::integer_do(op, &acc, v))
}

pub fn complement(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [v] = exact_args::<1>(name, args)?;
    ops::complement(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::native::NativeFn;

    fn call(f: NativeFn, name: &str, args: &[Value]) -> anyhow::Result<Value> {
        let mut vm = Vm::new();
        f(&mut vm, name, args)
    }

    #[test]
    fn relational_wrappers() -> anyhow::Result<()> {
        let (one, two) = (Value::Int(1), Value::Float(2.0));
        let cases = [
            ("<", true),
            (">", false),
            ("<=", true),
            (">=", false),
            ("=", false),
            ("not=", true),
        ];
        for (name, want) in cases {
            let got = call(compare, name, &[one.clone(), two.clone()])?;
            assert_eq!(got, Value::Bool(want), "{name}");
        }
        Ok(())
    }

    #[test]
    fn reducers_fold_left() -> anyhow::Result<()> {
        let args = [Value::Int(100), Value::Int(10), Value::Int(5)];
        assert_eq!(call(numeric, "-", &args)?, Value::Int(85));
        assert_eq!(call(numeric, "/", &args)?, Value::Int(2));
        assert_eq!(call(numeric, "+", &[Value::Int(1), Value::Float(0.5)])?, Value::Float(1.5));
        assert_eq!(call(numeric, "*", &[Value::Int(7)])?, Value::Int(7));
        Ok(())
    }

    #[test]
    fn reducer_arity() {
        let err = call(numeric, "+", &[]).unwrap_err();
        assert!(matches!(err.downcast_ref::<RuntimeError>(), Some(RuntimeError::WrongArity { .. })));
        let err = call(bitwise, "bit-and", &[Value::Int(1)]).unwrap_err();
        assert!(matches!(err.downcast_ref::<RuntimeError>(), Some(RuntimeError::WrongArity { .. })));
    }

    #[test]
    fn bit_ops() -> anyhow::Result<()> {
        let args = [Value::Int(0b1100), Value::Int(0b1010), Value::Int(0b1000)];
        assert_eq!(call(bitwise, "bit-and", &args)?, Value::Int(0b1000));
        assert_eq!(call(bitwise, "bit-or", &args)?, Value::Int(0b1110));
        assert_eq!(call(integer, "sll", &[Value::Int(1), Value::Int(4)])?, Value::Int(16));
        assert_eq!(call(complement, "bit-not", &[Value::Int(0)])?, Value::Int(-1));
        Ok(())
    }
}
