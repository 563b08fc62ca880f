use std::fmt::Display;

use crate::val::Value;

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("{name}: wrong number of arguments. expected {expected}, got {got}")]
    WrongArity {
        name: String,
        expected: String,
        got: usize,
    },
    #[error("{name}: invalid type. expected: {expected}; got: {got}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        got: &'static str,
    },
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("key not found: {0}")]
    KeyNotFound(String),
    #[error("not a list")]
    NotAList,
    #[error("division by zero")]
    DivideByZero,
    #[error("{name}: cannot handle a value of type {type_name}")]
    UnsupportedType {
        name: String,
        type_name: &'static str,
    },
    #[error("{name}: unable to convert arg {index} of type {type_name}")]
    ConversionUnsupported {
        name: String,
        index: usize,
        type_name: &'static str,
    },
    #[error("{name}: failed converting arg {index}; {reason}")]
    ConversionFailed {
        name: String,
        index: usize,
        reason: String,
    },
    #[error("{name}: unable to allocate {len} elements")]
    AllocationFailed { name: String, len: usize },
    #[error("failed to compile expression: {0}")]
    CompileFailure(String),
    #[error("Unknown Identifier: {0}")]
    UnknownSymbol(String),
    #[error("call depth exceeded {0}")]
    StackOverflow(usize),
}

impl RuntimeError {
    pub fn arity(name: &str, expected: impl Into<String>, got: usize) -> Self {
        Self::WrongArity {
            name: name.to_owned(),
            expected: expected.into(),
            got,
        }
    }

    pub fn mismatch(name: &str, expected: &'static str, got: &Value) -> Self {
        Self::TypeMismatch {
            name: name.to_owned(),
            expected,
            got: got.type_name(),
        }
    }

    pub fn unsupported(name: &str, got: &Value) -> Self {
        Self::UnsupportedType {
            name: name.to_owned(),
            type_name: got.type_name(),
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("cannot compile improper list: {0}")]
    ImproperList(String),
    #[error("malformed {form}: {message}")]
    BadForm { form: &'static str, message: String },
    #[error("invalid parameter list: {0}")]
    BadParams(String),
}

/// A fold aborted by its callback. Carries the accumulator as it stood when
/// the error was raised.
#[derive(Debug)]
pub struct FoldError {
    pub acc: Value,
    pub source: anyhow::Error,
}

impl FoldError {
    pub fn into_source(self) -> anyhow::Error {
        self.source
    }
}

impl Display for FoldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fold aborted at accumulator {}: {}", self.acc, self.source)
    }
}
