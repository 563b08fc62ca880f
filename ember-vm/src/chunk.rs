use std::{fmt::Display, rc::Rc};

use ember_core::sym::Symbol;

use crate::val::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Push `constants[i]`.
    Const(usize),
    Nil,
    True,
    False,
    Load(Symbol),
    /// Bind the top of stack in the innermost scope. Leaves it on the stack.
    Define(Symbol),
    /// Rebind an existing variable to the top of stack. Leaves it on the stack.
    Store(Symbol),
    Pop,
    Jump(usize),
    /// Pop; jump when falsy.
    JumpUnless(usize),
    /// Jump keeping the top when falsy, otherwise pop it.
    JumpUnlessKeep(usize),
    /// Jump keeping the top when truthy, otherwise pop it.
    JumpIfKeep(usize),
    /// Stack holds the callee then `n` arguments.
    Call(usize),
    Return,
    /// Close `protos[i]` over the current scope.
    Closure(usize),
    PushScope,
    PopScope,
    MakeArray(usize),
}

impl Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Op::Const(i) => format!("CONST {i}"),
            Op::Nil => String::from("NIL"),
            Op::True => String::from("TRUE"),
            Op::False => String::from("FALSE"),
            Op::Load(sym) => format!("LOAD {sym} ({})", sym.id()),
            Op::Define(sym) => format!("DEFINE {sym} ({})", sym.id()),
            Op::Store(sym) => format!("STORE {sym} ({})", sym.id()),
            Op::Pop => String::from("POP"),
            Op::Jump(t) => format!("JUMP -> {t}"),
            Op::JumpUnless(t) => format!("JUMP_UNLESS -> {t}"),
            Op::JumpUnlessKeep(t) => format!("JUMP_UNLESS_KEEP -> {t}"),
            Op::JumpIfKeep(t) => format!("JUMP_IF_KEEP -> {t}"),
            Op::Call(n) => format!("CALL {n}"),
            Op::Return => String::from("RETURN"),
            Op::Closure(i) => format!("CLOSURE {i}"),
            Op::PushScope => String::from("PUSH_SCOPE"),
            Op::PopScope => String::from("POP_SCOPE"),
            Op::MakeArray(n) => format!("MAKE_ARRAY {n}"),
        };
        f.pad(&s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub code: Vec<Op>,
    pub constants: Vec<Value>,
    pub protos: Vec<Rc<FuncProto>>,
}

impl Chunk {
    #[inline]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    fn disassemble(&self, name: &str, out: &mut String) {
        out.push_str(&format!("== {name} ==\n"));
        for (i, op) in self.code.iter().enumerate() {
            let line = match op {
                Op::Const(c) => match self.constants.get(*c) {
                    Some(v) => format!("{i:04} {op:<24} ; {v}\n"),
                    None => format!("{i:04} {op}\n"),
                },
                _ => format!("{i:04} {op}\n"),
            };
            out.push_str(&line);
        }
        for proto in self.protos.iter() {
            proto.chunk.disassemble(&proto.name, out);
        }
    }
}

impl Display for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = String::new();
        self.disassemble("<toplevel>", &mut s);
        write!(f, "{s}")
    }
}

/// Compiled body of a `fn`/`defn`, before it is closed over a scope.
#[derive(Debug, Clone)]
pub struct FuncProto {
    pub name: Rc<str>,
    pub params: Vec<Symbol>,
    /// Receives surplus arguments as a list.
    pub rest: Option<Symbol>,
    pub chunk: Rc<Chunk>,
}

impl FuncProto {
    #[inline]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    #[inline]
    pub fn is_variadic(&self) -> bool {
        self.rest.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChunkBuilder(Chunk);

impl ChunkBuilder {
    pub fn build(mut self) -> Chunk {
        self.0.code.push(Op::Return);
        self.0
    }

    #[inline]
    pub fn push_op(&mut self, op: Op) -> usize {
        self.0.code.push(op);
        self.0.code.len() - 1
    }

    pub fn push_constant(&mut self, v: Value) -> usize {
        let op = match v {
            Value::Null => Op::Nil,
            Value::Bool(true) => Op::True,
            Value::Bool(false) => Op::False,
            v => {
                self.0.constants.push(v);
                Op::Const(self.0.constants.len() - 1)
            }
        };
        self.push_op(op)
    }

    pub fn push_closure(&mut self, proto: FuncProto) -> usize {
        self.0.protos.push(Rc::new(proto));
        let i = self.0.protos.len() - 1;
        self.push_op(Op::Closure(i))
    }

    /// Index the next pushed op will get.
    #[inline]
    pub fn here(&self) -> usize {
        self.0.code.len()
    }

    /// Points the jump at `at` to the current end of the chunk.
    pub fn patch_jump(&mut self, at: usize) {
        let target = self.here();
        if let Some(op) = self.0.code.get_mut(at) {
            match op {
                Op::Jump(t) | Op::JumpUnless(t) | Op::JumpUnlessKeep(t) | Op::JumpIfKeep(t) => {
                    *t = target
                }
                _ => {}
            }
        }
    }
}
