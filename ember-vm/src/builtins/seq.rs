use anyhow::bail;

use super::{arg_range, exact_args, fn_arg, int_arg, is_coalescing};
use crate::{
    err::RuntimeError,
    htable::HTable,
    seq::{self as ops, list_to_array, make_list},
    val::Value,
    vm::Vm,
};

pub fn array(_: &mut Vm, _: &str, args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::array(args.to_vec()))
}

pub fn list(_: &mut Vm, _: &str, args: &[Value]) -> anyhow::Result<Value> {
    Ok(make_list(args))
}

/// `(hash k1 v1 k2 v2 ...)`
pub fn hash(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::hash(HTable::from_pairs(name, args)?))
}

/// `(make-array n [fill])`
pub fn make_array(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    arg_range(name, args, 1, 2)?;
    let n = int_arg(name, &args[0])?;
    if n < 0 {
        bail!(RuntimeError::IndexOutOfBounds { index: n, len: 0 });
    }
    let fill = args.get(1).cloned().unwrap_or_default();
    let len = n as usize;
    let mut items = Vec::new();
    if items.try_reserve_exact(len).is_err() {
        bail!(RuntimeError::AllocationFailed {
            name: name.to_owned(),
            len,
        });
    }
    items.resize(len, fill);
    Ok(Value::array(items))
}

fn index_in(name: &str, idx: &Value, len: usize) -> anyhow::Result<usize> {
    let i = int_arg(name, idx)?;
    if i < 0 || i as u64 >= len as u64 {
        bail!(RuntimeError::IndexOutOfBounds { index: i, len });
    }
    Ok(i as usize)
}

pub fn aget(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [arr, idx] = exact_args::<2>(name, args)?;
    let Value::Array(arr) = arr else {
        bail!(RuntimeError::mismatch(name, "array", arr));
    };
    let items = arr.borrow();
    let i = index_in(name, idx, items.len())?;
    Ok(items[i].clone())
}

/// Writes in place; every holder of the array sees the change.
pub fn aset(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [arr, idx, val] = exact_args::<3>(name, args)?;
    let Value::Array(arr) = arr else {
        bail!(RuntimeError::mismatch(name, "array", arr));
    };
    let mut items = arr.borrow_mut();
    let i = index_in(name, idx, items.len())?;
    items[i] = val.clone();
    Ok(Value::Null)
}

/// Byte at an offset of a string, as a char.
pub fn sget(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [s, idx] = exact_args::<2>(name, args)?;
    let Value::Str(s) = s else {
        bail!(RuntimeError::mismatch(name, "string", s));
    };
    let i = index_in(name, idx, s.len())?;
    Ok(Value::Char(char::from(s.as_bytes()[i])))
}

/// `(hget h key [default])`
pub fn hget(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    arg_range(name, args, 2, 3)?;
    let Value::Hash(h) = &args[0] else {
        bail!(RuntimeError::mismatch(name, "hash", &args[0]));
    };
    let found = h.borrow().get(&args[1])?;
    match (found, args.get(2)) {
        (Some(v), _) => Ok(v),
        (None, Some(default)) => Ok(default.clone()),
        (None, None) => bail!(RuntimeError::KeyNotFound(args[1].to_string())),
    }
}

pub fn hset(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [h, key, val] = exact_args::<3>(name, args)?;
    let Value::Hash(h) = h else {
        bail!(RuntimeError::mismatch(name, "hash", h));
    };
    h.borrow_mut().set(key.clone(), val.clone())?;
    Ok(Value::Null)
}

/// Deleting a missing key does nothing.
pub fn hdel(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [h, key] = exact_args::<2>(name, args)?;
    let Value::Hash(h) = h else {
        bail!(RuntimeError::mismatch(name, "hash", h));
    };
    h.borrow_mut().delete(key)?;
    Ok(Value::Null)
}

pub fn slice(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [seq, start, end] = exact_args::<3>(name, args)?;
    ops::slice(seq, int_arg(name, start)?, int_arg(name, end)?)
}

pub fn len(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [seq] = exact_args::<1>(name, args)?;
    Ok(Value::Int(ops::len(seq)? as i64))
}

pub fn append(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    ops::append(name, args, is_coalescing(name))
}

pub fn concat(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    ops::concat(name, args, is_coalescing(name))
}

/// `(apply f args)` where `args` is an array or a list.
pub fn apply(vm: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [f, fargs] = exact_args::<2>(name, args)?;
    fn_arg(name, f)?;
    let fargs = match fargs {
        Value::Array(arr) => arr.borrow().clone(),
        Value::Null | Value::Pair(_) => list_to_array(fargs)?,
        _ => bail!(RuntimeError::mismatch(name, "array or list", fargs)),
    };
    vm.apply(f, &fargs)
}

/// `(map f seq)`
pub fn map(vm: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [f, seq] = exact_args::<2>(name, args)?;
    ops::map(vm, name, f, seq)
}

/// `(foldl seq f init [chunk-size])`
pub fn foldl(vm: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    arg_range(name, args, 3, 4)?;
    let chunk = match args.get(3) {
        Some(Value::Int(n)) if *n > 0 => *n as usize,
        _ => 1,
    };
    ops::foldl(vm, &args[0], &args[1], args[2].clone(), chunk).map_err(|e| {
        log::trace!("{name} aborted with accumulator {}", e.acc);
        e.into_source()
    })
}
