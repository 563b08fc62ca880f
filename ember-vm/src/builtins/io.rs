use anyhow::bail;

use super::{exact_args, min_args, str_arg};
use crate::{err::RuntimeError, val::Value, vm::Vm};

/// Strings go out raw, everything else in printed form, separated by spaces.
pub fn print(vm: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    min_args(name, args, 1)?;
    let mut s = String::new();
    for (i, v) in args.iter().enumerate() {
        if i > 0 {
            s.push(' ');
        }
        match v {
            Value::Str(x) => s.push_str(x),
            _ => s.push_str(&v.to_string()),
        }
    }
    if name == "println" {
        s.push('\n');
    }
    vm.write_out(&s)?;
    Ok(Value::Null)
}

/// First form of a string, unevaluated. `End` when there is none.
pub fn read(vm: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [src] = exact_args::<1>(name, args)?;
    vm.read_first(str_arg(name, src)?)
}

/// Compiles and runs one form on a duplicate engine so the caller's frames
/// are left alone.
pub fn eval(vm: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [form] = exact_args::<1>(name, args)?;
    let mut sub = vm.duplicate();
    if let Err(e) = sub.load_values(std::slice::from_ref(form)) {
        bail!(RuntimeError::CompileFailure(e.to_string()));
    }
    sub.run()
}
