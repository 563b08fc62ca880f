use std::rc::Rc;

use anyhow::{bail, Context};
use regex::Regex;

use crate::{
    builtins::{exact_args, str_arg},
    err::RuntimeError,
    val::Value,
    vm::Vm,
};

pub fn import(vm: &mut Vm) {
    vm.add_function("regexp-compile", compile);
    vm.add_function("regexp-find-index", find_index);
}

fn compile(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [pattern] = exact_args::<1>(name, args)?;
    let pattern = str_arg(name, pattern)?;
    let re = Regex::new(pattern).with_context(|| format!("{name}: bad pattern {pattern:?}"))?;
    Ok(Value::Regexp(Rc::new(re)))
}

/// `[start end]` byte offsets of the first match, `[]` when there is none.
fn find_index(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [re, haystack] = exact_args::<2>(name, args)?;
    let Value::Regexp(re) = re else {
        bail!(RuntimeError::mismatch(name, "regexp", re));
    };
    let haystack = str_arg(name, haystack)?;
    let loc = match re.find(haystack) {
        Some(m) => vec![Value::Int(m.start() as i64), Value::Int(m.end() as i64)],
        None => Vec::new(),
    };
    Ok(Value::array(loc))
}
