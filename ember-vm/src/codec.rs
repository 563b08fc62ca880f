use anyhow::bail;
use ember_core::bytes::{self, ByteBuf};

use crate::{err::RuntimeError, val::Value};

fn write_value(name: &str, buf: &mut ByteBuf, v: &Value) -> anyhow::Result<()> {
    match v {
        Value::Array(arr) => {
            for item in arr.borrow().iter() {
                write_value(name, buf, item)?;
            }
        }
        Value::Pair(_) => {
            let mut cur = v;
            loop {
                match cur {
                    Value::Pair(p) => {
                        write_value(name, buf, &p.head)?;
                        cur = &p.tail;
                    }
                    // list terminator, not an element
                    Value::Null => break,
                    tail => {
                        write_value(name, buf, tail)?;
                        break;
                    }
                }
            }
        }
        Value::Str(s) => buf.put_bytes(s.as_bytes()),
        Value::Data(d) => buf.put_bytes(d),
        Value::Int(n) => buf.put_i64(*n),
        Value::Float(n) => buf.put_f64(*n),
        Value::Bool(b) => buf.put_bool(*b),
        Value::Char(c) => buf.put_char(*c),
        _ => bail!(RuntimeError::unsupported(name, v)),
    }
    Ok(())
}

/// Serializes `args` in order into one buffer. No tags or lengths are written;
/// the reader has to know the shape.
pub fn make_data(name: &str, args: &[Value], coalesce: bool) -> anyhow::Result<Value> {
    let mut buf = ByteBuf::with_capacity(args.len() * 8);
    for v in args.iter() {
        if coalesce && v.is_empty() {
            continue;
        }
        write_value(name, &mut buf, v)?;
    }
    Ok(Value::data(buf.into_inner()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Str,
    Int64,
    Int32,
    Float32,
    Float64,
}

impl Conversion {
    pub fn from_name(name: &str) -> Option<Self> {
        let c = match name {
            "cvert-str" => Self::Str,
            "cvert-int64" => Self::Int64,
            "cvert-int32" => Self::Int32,
            "cvert-float32" => Self::Float32,
            "cvert-float64" => Self::Float64,
            _ => return None,
        };
        Some(c)
    }
}

fn failed(name: &str, index: usize, reason: impl ToString) -> anyhow::Error {
    RuntimeError::ConversionFailed {
        name: name.to_owned(),
        index,
        reason: reason.to_string(),
    }
    .into()
}

fn unsupported(name: &str, index: usize, v: &Value) -> anyhow::Error {
    RuntimeError::ConversionUnsupported {
        name: name.to_owned(),
        index,
        type_name: v.type_name(),
    }
    .into()
}

fn too_short(width: usize, got: usize) -> String {
    format!("need {width} bytes, have {got}")
}

fn to_int(name: &str, conv: Conversion, index: usize, v: &Value) -> anyhow::Result<i64> {
    let wide = conv == Conversion::Int64;
    let n = match v {
        Value::Data(d) if wide => {
            bytes::read_i64_le(d).ok_or_else(|| failed(name, index, too_short(8, d.len())))?
        }
        Value::Data(d) => bytes::read_i32_le(d)
            .map(i64::from)
            .ok_or_else(|| failed(name, index, too_short(4, d.len())))?,
        Value::Str(s) => s.trim().parse::<i64>().map_err(|e| failed(name, index, e))?,
        Value::Float(n) => *n as i64,
        Value::Int(n) => *n,
        Value::Char(c) => *c as i64,
        Value::Bool(b) => i64::from(*b),
        _ => return Err(unsupported(name, index, v)),
    };
    if wide {
        return Ok(n);
    }
    i32::try_from(n)
        .map(i64::from)
        .map_err(|_| failed(name, index, format!("{n} does not fit in 32 bits")))
}

fn to_float(name: &str, conv: Conversion, index: usize, v: &Value) -> anyhow::Result<f64> {
    let wide = conv == Conversion::Float64;
    let n = match v {
        Value::Data(d) if wide => {
            bytes::read_f64_le(d).ok_or_else(|| failed(name, index, too_short(8, d.len())))?
        }
        Value::Data(d) => bytes::read_f32_le(d)
            .map(f64::from)
            .ok_or_else(|| failed(name, index, too_short(4, d.len())))?,
        Value::Str(s) if wide => s.trim().parse::<f64>().map_err(|e| failed(name, index, e))?,
        Value::Str(s) => s
            .trim()
            .parse::<f32>()
            .map(f64::from)
            .map_err(|e| failed(name, index, e))?,
        Value::Int(n) => *n as f64,
        Value::Float(n) => *n,
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => return Err(unsupported(name, index, v)),
    };
    Ok(if wide { n } else { n as f32 as f64 })
}

/// Type-directed decode of every argument. Strings concatenate into one Str,
/// numeric conversions give one Array element per argument.
pub fn convert(name: &str, conv: Conversion, args: &[Value]) -> anyhow::Result<Value> {
    match conv {
        Conversion::Str => {
            let mut s = String::new();
            for v in args.iter() {
                match v {
                    Value::Data(d) => s.push_str(&String::from_utf8_lossy(d)),
                    Value::Str(x) => s.push_str(x),
                    _ => s.push_str(&v.to_string()),
                }
            }
            Ok(Value::string(&s))
        }
        Conversion::Int64 | Conversion::Int32 => {
            let out = args
                .iter()
                .enumerate()
                .map(|(i, v)| to_int(name, conv, i, v).map(Value::Int))
                .collect::<anyhow::Result<Vec<_>>>()?;
            Ok(Value::array(out))
        }
        Conversion::Float32 | Conversion::Float64 => {
            let out = args
                .iter()
                .enumerate()
                .map(|(i, v)| to_float(name, conv, i, v).map(Value::Float))
                .collect::<anyhow::Result<Vec<_>>>()?;
            Ok(Value::array(out))
        }
    }
}
