use anyhow::bail;

use super::exact_args;
use crate::{err::RuntimeError, val::Value, vm::Vm};

pub fn cons(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [head, tail] = exact_args::<2>(name, args)?;
    Ok(Value::cons(head.clone(), tail.clone()))
}

/// Head of a pair, or element 0 of an array.
pub fn first(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [v] = exact_args::<1>(name, args)?;
    match v {
        Value::Pair(p) => Ok(p.head.clone()),
        Value::Array(arr) => match arr.borrow().first() {
            Some(x) => Ok(x.clone()),
            None => bail!(RuntimeError::IndexOutOfBounds { index: 0, len: 0 }),
        },
        _ => bail!(RuntimeError::mismatch(name, "pair or array", v)),
    }
}

/// Tail of a pair, or a new array without element 0. `(rest ())` is `()`.
pub fn rest(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [v] = exact_args::<1>(name, args)?;
    match v {
        Value::Pair(p) => Ok(p.tail.clone()),
        Value::Null => Ok(Value::Null),
        Value::Array(arr) => {
            let items = arr.borrow();
            Ok(Value::array(items.iter().skip(1).cloned().collect()))
        }
        _ => bail!(RuntimeError::mismatch(name, "pair or array", v)),
    }
}

pub fn type_query(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [v] = exact_args::<1>(name, args)?;
    let res = match name {
        "list?" => v.is_list(),
        "pair?" => matches!(v, Value::Pair(_)),
        "null?" => matches!(v, Value::Null),
        "array?" => matches!(v, Value::Array(_)),
        "number?" => v.is_number(),
        "float?" => matches!(v, Value::Float(_)),
        "int?" => matches!(v, Value::Int(_)),
        "char?" => matches!(v, Value::Char(_)),
        "symbol?" => matches!(v, Value::Symbol(_)),
        "string?" => matches!(v, Value::Str(_)),
        "hash?" => matches!(v, Value::Hash(_)),
        "data?" => matches!(v, Value::Data(_)),
        "zero?" => v.is_zero(),
        "empty?" => v.is_empty(),
        _ => bail!(RuntimeError::mismatch(name, "type predicate", &Value::string(name))),
    };
    Ok(Value::Bool(res))
}

pub fn not(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [v] = exact_args::<1>(name, args)?;
    Ok(Value::Bool(!v.is_truthy()))
}

/// Interned id of a symbol.
pub fn symnum(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [v] = exact_args::<1>(name, args)?;
    match v {
        Value::Symbol(sym) => Ok(Value::Int(sym.id().get() as i64)),
        _ => bail!(RuntimeError::mismatch(name, "symbol", v)),
    }
}
