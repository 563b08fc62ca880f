use std::{cell::RefCell, fmt::Display, rc::Rc};

use ember_core::sym::Symbol;

use crate::{chunk::FuncProto, env::Scope, htable::HTable, native::NativeFn};

#[derive(Clone)]
pub struct NativeFunc {
    pub func: NativeFn,
    pub name: Rc<str>,
}

impl std::fmt::Debug for NativeFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeFunc({})", self.name)
    }
}

/// A compiled function bundled with the scope it was created in.
#[derive(Clone)]
pub struct Closure {
    pub proto: Rc<FuncProto>,
    pub env: Rc<Scope>,
}

impl std::fmt::Debug for Closure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Closure({}/{})", self.proto.name, self.proto.arity())
    }
}

#[derive(Debug, Clone)]
pub enum Function {
    Native(NativeFunc),
    Compiled(Rc<Closure>),
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Native(n) => n.name.as_ref(),
            Function::Compiled(c) => c.proto.name.as_ref(),
        }
    }

    fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Function::Native(a), Function::Native(b)) => {
                a.name == b.name && a.func as usize == b.func as usize
            }
            (Function::Compiled(a), Function::Compiled(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pair {
    pub head: Value,
    pub tail: Value,
}

// Unlink uniquely owned tails one cell at a time so dropping a long list does
// not recurse once per cell.
impl Drop for Pair {
    fn drop(&mut self) {
        let mut tail = std::mem::take(&mut self.tail);
        while let Value::Pair(cell) = tail {
            match Rc::try_unwrap(cell) {
                Ok(mut p) => tail = std::mem::take(&mut p.tail),
                Err(_) => break,
            }
        }
    }
}

fn pairs_eq(mut a: &Rc<Pair>, mut b: &Rc<Pair>) -> bool {
    loop {
        if Rc::ptr_eq(a, b) {
            return true;
        }
        if a.head != b.head {
            return false;
        }
        match (&a.tail, &b.tail) {
            (Value::Pair(x), Value::Pair(y)) => {
                a = x;
                b = y;
            }
            (x, y) => return x == y,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub enum Value {
    /// The empty list.
    #[default]
    Null,
    Undefined,
    /// Returned by `read` when there is nothing left to read.
    End,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(Rc<str>),
    Symbol(Symbol),
    Pair(Rc<Pair>),
    Array(Rc<RefCell<Vec<Value>>>),
    Hash(Rc<RefCell<HTable>>),
    Data(Rc<[u8]>),
    Function(Function),
    Regexp(Rc<regex::Regex>),
}

impl Value {
    #[inline]
    pub fn string(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }

    #[inline]
    pub fn array(items: Vec<Value>) -> Self {
        Self::Array(Rc::new(RefCell::new(items)))
    }

    #[inline]
    pub fn hash(table: HTable) -> Self {
        Self::Hash(Rc::new(RefCell::new(table)))
    }

    #[inline]
    pub fn data(bytes: Vec<u8>) -> Self {
        Self::Data(Rc::from(bytes))
    }

    #[inline]
    pub fn cons(head: Value, tail: Value) -> Self {
        Self::Pair(Rc::new(Pair { head, tail }))
    }

    pub fn native(name: &str, func: NativeFn) -> Self {
        Self::Function(Function::Native(NativeFunc {
            func,
            name: Rc::from(name),
        }))
    }

    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Undefined => "undefined",
            Value::End => "end",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::Str(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Pair(_) => "pair",
            Value::Array(_) => "array",
            Value::Hash(_) => "hash",
            Value::Data(_) => "data",
            Value::Function(_) => "function",
            Value::Regexp(_) => "regexp",
        }
    }

    /// `false`, the sentinels and numeric zero are false. Everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null | Value::Undefined | Value::End => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Char(c) => *c != '\0',
            Value::Float(n) => *n != 0.0,
            _ => true,
        }
    }

    /// Null, "", [] and empty data count as absent for the coalescing builtins.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Str(s) => s.is_empty(),
            Value::Array(arr) => arr.borrow().is_empty(),
            Value::Data(d) => d.is_empty(),
            _ => false,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Value::Int(n) => *n == 0,
            Value::Char(c) => *c == '\0',
            Value::Float(n) => *n == 0.0,
            _ => false,
        }
    }

    #[inline]
    pub const fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::Char(_))
    }

    /// True for Null and for Pair chains that end in Null.
    pub fn is_list(&self) -> bool {
        let mut cur = self;
        loop {
            match cur {
                Value::Null => return true,
                Value::Pair(p) => cur = &p.tail,
                _ => return false,
            }
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        if let Self::Symbol(s) = self {
            Some(s)
        } else {
            None
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        if let Self::Function(f) = self {
            Some(f)
        } else {
            None
        }
    }

    /// Int and Char both index.
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Char(c) => Some(*c as i64),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null)
            | (Value::Undefined, Value::Undefined)
            | (Value::End, Value::End) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Pair(a), Value::Pair(b)) => pairs_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Hash(a), Value::Hash(b)) => Rc::ptr_eq(a, b),
            (Value::Data(a), Value::Data(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Regexp(a), Value::Regexp(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

pub(crate) fn char_repr(c: char) -> String {
    match c {
        '\n' => String::from("#newline"),
        ' ' => String::from("#space"),
        '\t' => String::from("#tab"),
        '\r' => String::from("#return"),
        '\0' => String::from("#nul"),
        _ => format!("#{c}"),
    }
}

fn join(vals: &[Value]) -> String {
    vals.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Value::Null => String::from("()"),
            Value::Undefined => String::from("#<undefined>"),
            Value::End => String::from("#<end>"),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(n) => format!("{n:?}"),
            Value::Char(c) => char_repr(*c),
            Value::Str(s) => format!("{s:?}"),
            Value::Symbol(sym) => sym.to_string(),
            Value::Pair(_) => {
                let mut s = String::from("(");
                let mut cur = self;
                let mut first = true;
                loop {
                    match cur {
                        Value::Pair(p) => {
                            if !first {
                                s.push(' ');
                            }
                            s.push_str(&p.head.to_string());
                            first = false;
                            cur = &p.tail;
                        }
                        Value::Null => break,
                        tail => {
                            s.push_str(" . ");
                            s.push_str(&tail.to_string());
                            break;
                        }
                    }
                }
                s.push(')');
                s
            }
            Value::Array(arr) => format!("[{}]", join(&arr.borrow())),
            Value::Hash(h) => {
                let h = h.borrow();
                let entries = h
                    .iter()
                    .map(|(k, v)| format!("{k} {v}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("{{{entries}}}")
            }
            Value::Data(d) => {
                let mut s = String::with_capacity(2 + d.len() * 2);
                s.push_str("0x");
                for b in d.iter() {
                    s.push_str(&format!("{b:02x}"));
                }
                s
            }
            Value::Function(Function::Native(n)) => format!("#<native {}>", n.name),
            Value::Function(Function::Compiled(c)) => {
                format!("#<fn {}/{}>", c.proto.name, c.proto.arity())
            }
            Value::Regexp(re) => format!("#<regexp {}>", re.as_str()),
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_nested_structures() {
        let list = Value::cons(Value::Int(1), Value::cons(Value::Int(2), Value::Null));
        let dotted = Value::cons(Value::Int(1), Value::Char('a'));
        let arr = Value::array(vec![list.clone(), Value::string("hi"), Value::Float(1.0)]);

        assert_eq!(list.to_string(), "(1 2)");
        assert_eq!(dotted.to_string(), "(1 . #a)");
        assert_eq!(arr.to_string(), "[(1 2) \"hi\" 1.0]");
        assert_eq!(Value::data(vec![0xde, 0xad, 1]).to_string(), "0xdead01");
    }

    #[test]
    fn emptiness_and_lists() {
        assert!(Value::Null.is_empty());
        assert!(Value::string("").is_empty());
        assert!(Value::array(vec![]).is_empty());
        assert!(Value::data(vec![]).is_empty());
        assert!(!Value::Int(0).is_empty());

        let dotted = Value::cons(Value::Int(1), Value::Int(2));
        assert!(!dotted.is_list());
        assert!(Value::Null.is_list());
    }

    #[test]
    fn long_lists_compare_and_drop() {
        let build = || (0..1_000_000).fold(Value::Null, |acc, n| Value::cons(Value::Int(n), acc));
        let a = build();
        let b = build();
        assert_eq!(a, b);
        assert_ne!(a, Value::cons(Value::Int(0), Value::Null));

        // a shared tail survives its first owner
        let shared = Value::cons(Value::Int(-1), b.clone());
        drop(b);
        assert!(shared.is_list());
        drop(shared);
        drop(a);
    }

    #[test]
    fn arrays_share_storage() {
        let a = Value::array(vec![Value::Int(1)]);
        let b = a.clone();
        if let Value::Array(arr) = &b {
            arr.borrow_mut().push(Value::Int(2));
        }
        assert_eq!(a.to_string(), "[1 2]");
    }
}
