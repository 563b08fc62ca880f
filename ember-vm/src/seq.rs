use anyhow::bail;

use crate::{
    codec,
    err::{FoldError, RuntimeError},
    htable::HTable,
    val::Value,
    vm::Vm,
};

/// Heads of a proper list, in order.
pub fn list_to_array(list: &Value) -> anyhow::Result<Vec<Value>> {
    let mut items = Vec::new();
    let mut cur = list;
    loop {
        match cur {
            Value::Null => return Ok(items),
            Value::Pair(p) => {
                items.push(p.head.clone());
                cur = &p.tail;
            }
            _ => bail!(RuntimeError::NotAList),
        }
    }
}

pub fn make_list(items: &[Value]) -> Value {
    make_list_with_tail(items, Value::Null)
}

/// Builds `(items... . tail)`.
pub fn make_list_with_tail(items: &[Value], tail: Value) -> Value {
    items
        .iter()
        .rev()
        .fold(tail, |acc, v| Value::cons(v.clone(), acc))
}

fn expect_callable(name: &str, f: &Value) -> anyhow::Result<()> {
    if f.as_function().is_none() {
        bail!(RuntimeError::mismatch(name, "function", f));
    }
    Ok(())
}

/// Applies `f` to every element of an array or list, or every value of a hash.
/// Builds a new container; the input is untouched.
pub fn map(vm: &mut Vm, name: &str, f: &Value, seq: &Value) -> anyhow::Result<Value> {
    expect_callable(name, f)?;
    match seq {
        Value::Array(arr) => {
            let items = arr.borrow().clone();
            let mut out = Vec::with_capacity(items.len());
            for v in items.iter() {
                out.push(vm.apply(f, std::slice::from_ref(v))?);
            }
            Ok(Value::array(out))
        }
        Value::Null | Value::Pair(_) => {
            let items = list_to_array(seq)?;
            let mut out = Vec::with_capacity(items.len());
            for v in items.iter() {
                out.push(vm.apply(f, std::slice::from_ref(v))?);
            }
            Ok(make_list(&out))
        }
        Value::Hash(h) => {
            let entries: Vec<(Value, Value)> = h
                .borrow()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let mut out = HTable::new();
            for (k, v) in entries {
                let mapped = vm.apply(f, &[v])?;
                out.set(k, mapped)?;
            }
            Ok(Value::hash(out))
        }
        _ => bail!(RuntimeError::mismatch(name, "array, list or hash", seq)),
    }
}

/// Left fold calling `f(element, acc)`. Data is walked in `chunk`-byte slices,
/// the last one possibly short. Hashes pass each entry as a `(key . value)` pair.
pub fn foldl(
    vm: &mut Vm,
    seq: &Value,
    f: &Value,
    init: Value,
    chunk: usize,
) -> Result<Value, FoldError> {
    let mut acc = init;

    let step = |vm: &mut Vm, elem: Value, acc: &mut Value| -> Result<(), FoldError> {
        match vm.apply(f, &[elem, acc.clone()]) {
            Ok(next) => {
                *acc = next;
                Ok(())
            }
            Err(source) => Err(FoldError {
                acc: acc.clone(),
                source,
            }),
        }
    };

    if let Err(source) = expect_callable("foldl", f) {
        return Err(FoldError { acc, source });
    }

    match seq {
        Value::Array(arr) => {
            let items = arr.borrow().clone();
            for v in items {
                step(vm, v, &mut acc)?;
            }
        }
        Value::Null | Value::Pair(_) => {
            let mut cur = seq.clone();
            loop {
                match cur {
                    Value::Null => break,
                    Value::Pair(p) => {
                        step(vm, p.head.clone(), &mut acc)?;
                        cur = p.tail.clone();
                    }
                    tail => {
                        step(vm, tail, &mut acc)?;
                        break;
                    }
                }
            }
        }
        Value::Hash(h) => {
            let entries: Vec<Value> = h
                .borrow()
                .iter()
                .map(|(k, v)| Value::cons(k.clone(), v.clone()))
                .collect();
            for e in entries {
                step(vm, e, &mut acc)?;
            }
        }
        Value::Data(d) => {
            for piece in d.chunks(chunk.max(1)) {
                step(vm, Value::data(piece.to_vec()), &mut acc)?;
            }
        }
        _ => {
            let source = RuntimeError::mismatch("foldl", "array, list, hash or data", seq).into();
            return Err(FoldError { acc, source });
        }
    }
    Ok(acc)
}

fn push_str(s: &mut String, v: &Value) {
    match v {
        Value::Str(x) => s.push_str(x),
        Value::Char(c) => s.push(*c),
        _ => s.push_str(&v.to_string()),
    }
}

/// `append` adds each trailing argument as one element (array, list) or its
/// text (string). Data appends go through the binary codec.
/// Array arguments are not spliced: `(?append [] () [1] "" [2])` is
/// `[[1] [2]]`. Use `concat` to join arrays.
pub fn append(name: &str, args: &[Value], coalesce: bool) -> anyhow::Result<Value> {
    let Some((first, rest)) = args.split_first() else {
        bail!(RuntimeError::arity(name, "at least 2", 0));
    };
    if rest.is_empty() {
        bail!(RuntimeError::arity(name, "at least 2", args.len()));
    }
    let rest = rest.iter().filter(|v| !(coalesce && v.is_empty()));

    let res = match first {
        Value::Array(arr) => {
            let mut out = arr.borrow().clone();
            out.extend(rest.cloned());
            Value::array(out)
        }
        Value::Str(s) => {
            let mut out = s.to_string();
            for v in rest {
                push_str(&mut out, v);
            }
            Value::string(&out)
        }
        Value::Null | Value::Pair(_) => {
            let mut out = list_to_array(first)?;
            out.extend(rest.cloned());
            make_list(&out)
        }
        Value::Data(_) => codec::make_data(name, args, coalesce)?,
        _ => bail!(RuntimeError::mismatch(name, "array, string, list or data", first)),
    };
    Ok(res)
}

/// `concat` joins containers of the first argument's kind.
pub fn concat(name: &str, args: &[Value], coalesce: bool) -> anyhow::Result<Value> {
    let Some((first, rest)) = args.split_first() else {
        bail!(RuntimeError::arity(name, "at least 2", 0));
    };
    if rest.is_empty() {
        bail!(RuntimeError::arity(name, "at least 2", args.len()));
    }
    let rest = rest.iter().filter(|v| !(coalesce && v.is_empty()));

    let res = match first {
        Value::Array(arr) => {
            let mut out = arr.borrow().clone();
            for v in rest {
                match v {
                    Value::Array(other) => out.extend(other.borrow().iter().cloned()),
                    _ => bail!(RuntimeError::mismatch(name, "array", v)),
                }
            }
            Value::array(out)
        }
        Value::Str(s) => {
            let mut out = s.to_string();
            for v in rest {
                match v {
                    Value::Str(other) => out.push_str(other),
                    _ => bail!(RuntimeError::mismatch(name, "string", v)),
                }
            }
            Value::string(&out)
        }
        Value::Null | Value::Pair(_) => {
            let mut out = list_to_array(first)?;
            for v in rest {
                match v {
                    Value::Null | Value::Pair(_) => out.extend(list_to_array(v)?),
                    _ => bail!(RuntimeError::mismatch(name, "list", v)),
                }
            }
            make_list(&out)
        }
        Value::Data(_) => codec::make_data(name, args, coalesce)?,
        _ => bail!(RuntimeError::mismatch(name, "array, string, list or data", first)),
    };
    Ok(res)
}

fn check_range(start: i64, end: i64, len: usize) -> anyhow::Result<(usize, usize)> {
    let in_bounds = |i: i64| i >= 0 && (i as u64) <= len as u64;
    if !in_bounds(start) {
        bail!(RuntimeError::IndexOutOfBounds { index: start, len });
    }
    if !in_bounds(end) || end < start {
        bail!(RuntimeError::IndexOutOfBounds { index: end, len });
    }
    Ok((start as usize, end as usize))
}

/// Half-open `[start, end)` copy of an array, string (by byte) or data.
pub fn slice(seq: &Value, start: i64, end: i64) -> anyhow::Result<Value> {
    let res = match seq {
        Value::Array(arr) => {
            let arr = arr.borrow();
            let (s, e) = check_range(start, end, arr.len())?;
            Value::array(arr[s..e].to_vec())
        }
        Value::Str(st) => {
            let (s, e) = check_range(start, end, st.len())?;
            match st.get(s..e) {
                Some(sub) => Value::string(sub),
                None => {
                    let index = if st.is_char_boundary(s) { end } else { start };
                    bail!(RuntimeError::IndexOutOfBounds {
                        index,
                        len: st.len()
                    })
                }
            }
        }
        Value::Data(d) => {
            let (s, e) = check_range(start, end, d.len())?;
            Value::data(d[s..e].to_vec())
        }
        _ => bail!(RuntimeError::mismatch("slice", "array, string or data", seq)),
    };
    Ok(res)
}

pub fn len(seq: &Value) -> anyhow::Result<usize> {
    let n = match seq {
        Value::Array(arr) => arr.borrow().len(),
        Value::Str(s) => s.len(),
        Value::Data(d) => d.len(),
        Value::Hash(h) => h.borrow().len(),
        Value::Null | Value::Pair(_) => list_to_array(seq)?.len(),
        _ => bail!(RuntimeError::mismatch("len", "array, string, data, hash or list", seq)),
    };
    Ok(n)
}
