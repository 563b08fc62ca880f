use anyhow::bail;

use super::{exact_args, is_coalescing, min_args};
use crate::{
    codec::{self, Conversion},
    err::RuntimeError,
    val::Value,
    vm::Vm,
};

pub fn make_data(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    codec::make_data(name, args, is_coalescing(name))
}

/// Printed form of a value, strings quoted.
pub fn str(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [v] = exact_args::<1>(name, args)?;
    Ok(Value::string(&v.to_string()))
}

pub fn convert(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    min_args(name, args, 1)?;
    let Some(conv) = Conversion::from_name(name) else {
        bail!(RuntimeError::mismatch(name, "conversion", &Value::string(name)));
    };
    codec::convert(name, conv, args)
}
