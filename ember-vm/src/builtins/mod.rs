//! Core builtins every engine starts with.

mod codec;
mod io;
mod list;
mod num;
mod seq;

use anyhow::bail;

use crate::{err::RuntimeError, native::NativeFn, val::Value, vm::Vm};

const CORE: &[(&str, NativeFn)] = &[
    // comparison
    ("<", num::compare),
    (">", num::compare),
    ("<=", num::compare),
    (">=", num::compare),
    ("=", num::compare),
    ("not=", num::compare),
    // arithmetic
    ("+", num::numeric),
    ("-", num::numeric),
    ("*", num::numeric),
    ("/", num::numeric),
    ("sll", num::integer),
    ("sra", num::integer),
    ("srl", num::integer),
    ("mod", num::integer),
    ("bit-and", num::bitwise),
    ("bit-or", num::bitwise),
    ("bit-xor", num::bitwise),
    ("bit-not", num::complement),
    // pairs
    ("cons", list::cons),
    ("first", list::first),
    ("car", list::first),
    ("rest", list::rest),
    ("cdr", list::rest),
    // predicates
    ("list?", list::type_query),
    ("pair?", list::type_query),
    ("null?", list::type_query),
    ("array?", list::type_query),
    ("number?", list::type_query),
    ("float?", list::type_query),
    ("int?", list::type_query),
    ("char?", list::type_query),
    ("symbol?", list::type_query),
    ("string?", list::type_query),
    ("hash?", list::type_query),
    ("data?", list::type_query),
    ("zero?", list::type_query),
    ("empty?", list::type_query),
    ("not", list::not),
    ("symnum", list::symnum),
    // construction & access
    ("array", seq::array),
    ("list", seq::list),
    ("hash", seq::hash),
    ("make-array", seq::make_array),
    ("aget", seq::aget),
    ("aset!", seq::aset),
    ("sget", seq::sget),
    ("hget", seq::hget),
    ("hset!", seq::hset),
    ("hdel!", seq::hdel),
    ("slice", seq::slice),
    ("len", seq::len),
    ("append", seq::append),
    ("?append", seq::append),
    ("concat", seq::concat),
    ("?concat", seq::concat),
    // higher order
    ("apply", seq::apply),
    ("map", seq::map),
    ("foldl", seq::foldl),
    // codec
    ("make-data", codec::make_data),
    ("?make-data", codec::make_data),
    ("str", codec::str),
    ("cvert-str", codec::convert),
    ("cvert-int64", codec::convert),
    ("cvert-int32", codec::convert),
    ("cvert-float32", codec::convert),
    ("cvert-float64", codec::convert),
    // io & evaluation
    ("print", io::print),
    ("println", io::print),
    ("read", io::read),
    ("eval", io::eval),
];

pub fn import(vm: &mut Vm) {
    for (name, func) in CORE.iter() {
        vm.add_function(name, *func);
    }
}

/// `?name` is the coalescing form of `name`.
#[inline]
pub(crate) fn is_coalescing(name: &str) -> bool {
    name.starts_with('?')
}

pub(crate) fn exact_args<'a, const N: usize>(
    name: &str,
    args: &'a [Value],
) -> anyhow::Result<&'a [Value; N]> {
    match args.try_into() {
        Ok(arr) => Ok(arr),
        Err(_) => bail!(RuntimeError::arity(name, N.to_string(), args.len())),
    }
}

pub(crate) fn min_args(name: &str, args: &[Value], min: usize) -> anyhow::Result<()> {
    if args.len() < min {
        bail!(RuntimeError::arity(name, format!("at least {min}"), args.len()));
    }
    Ok(())
}

pub(crate) fn arg_range(name: &str, args: &[Value], min: usize, max: usize) -> anyhow::Result<()> {
    if args.len() < min || args.len() > max {
        bail!(RuntimeError::arity(name, format!("{min} to {max}"), args.len()));
    }
    Ok(())
}

pub(crate) fn int_arg(name: &str, v: &Value) -> anyhow::Result<i64> {
    match v.as_index() {
        Some(i) => Ok(i),
        None => bail!(RuntimeError::mismatch(name, "int", v)),
    }
}

pub(crate) fn str_arg<'a>(name: &str, v: &'a Value) -> anyhow::Result<&'a str> {
    match v {
        Value::Str(s) => Ok(s),
        _ => bail!(RuntimeError::mismatch(name, "string", v)),
    }
}

pub(crate) fn fn_arg(name: &str, v: &Value) -> anyhow::Result<()> {
    if v.as_function().is_none() {
        bail!(RuntimeError::mismatch(name, "function", v));
    }
    Ok(())
}
