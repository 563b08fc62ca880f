use std::{cell::RefCell, collections::HashMap, io::Write, rc::Rc};

use anyhow::{anyhow, bail};
use ember_core::sym::{Symbol, SymbolTable};

use crate::{
    builtins,
    chunk::{Chunk, ChunkBuilder, Op},
    compiler::Kiln,
    env::Scope,
    err::RuntimeError,
    native::{NativeFn, Registry},
    reader,
    seq::make_list,
    val::{Closure, Function, Value},
};

pub const STACK_MAX: usize = u16::MAX as usize;
pub const CALL_STACK_MAX: usize = 1024;
pub const NESTING_MAX: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmOptions {
    /// Deepest the call stack may grow before a call fails with `StackOverflow`.
    pub max_frames: usize,
    pub stack_capacity: usize,
    /// How many calls back into the engine (`apply` from a native, `eval`) may
    /// be open at once. Each one holds host stack, so this stays small.
    pub max_nesting: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            max_frames: CALL_STACK_MAX,
            stack_capacity: STACK_MAX,
            max_nesting: NESTING_MAX,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallFrame {
    chunk: Rc<Chunk>,
    pc: usize,
    env: Rc<Scope>,
    /// Stack height when the frame was entered. Restored on return.
    stack_base: usize,
}

/// Outcome of starting a call: natives finish immediately, compiled functions
/// leave a new frame for the run loop.
enum Entered {
    Done(Value),
    Frame,
}

pub struct Vm {
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: Rc<Scope>,
    registry: Rc<RefCell<Registry>>,
    symbols: Rc<RefCell<SymbolTable>>,
    out: Rc<RefCell<dyn Write>>,
    opts: VmOptions,
    program: Rc<Chunk>,
    /// Frames held by the engines this one was duplicated from.
    outer_frames: usize,
    nesting: usize,
}

fn empty_program() -> Chunk {
    let mut cb = ChunkBuilder::default();
    cb.push_op(Op::Nil);
    cb.build()
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Self::with_options(VmOptions::default())
    }

    pub fn with_options(opts: VmOptions) -> Self {
        let out: Rc<RefCell<dyn Write>> = Rc::new(RefCell::new(std::io::stdout()));
        let mut vm = Self {
            stack: Vec::with_capacity(opts.stack_capacity.min(256)),
            frames: Vec::new(),
            globals: Scope::global(),
            registry: Rc::new(RefCell::new(Registry::new())),
            symbols: Rc::new(RefCell::new(SymbolTable::new())),
            out,
            opts,
            program: Rc::new(empty_program()),
            outer_frames: 0,
            nesting: 0,
        };
        builtins::import(&mut vm);
        vm
    }

    /// Registers a native function under `name`, replacing any earlier one.
    pub fn add_function(&mut self, name: &str, func: NativeFn) {
        log::debug!("registering builtin `{name}`");
        self.registry.borrow_mut().register(name, func);
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.registry.borrow().contains(name)
    }

    pub fn set_output(&mut self, out: Rc<RefCell<dyn Write>>) {
        self.out = out;
    }

    pub fn write_out(&self, s: &str) -> anyhow::Result<()> {
        let mut out = self.out.borrow_mut();
        out.write_all(s.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    #[inline]
    pub fn options(&self) -> VmOptions {
        self.opts
    }

    /// Call depth counting the frames of every engine this one was
    /// duplicated from.
    #[inline]
    pub fn depth(&self) -> usize {
        self.outer_frames + self.frames.len()
    }

    pub fn intern(&self, name: &str) -> Symbol {
        self.symbols.borrow_mut().intern(name)
    }

    /// Looks `name` up in the global scope, then among the builtins.
    pub fn global(&self, name: &str) -> Option<Value> {
        let sym = self.intern(name);
        self.globals.lookup(sym.id()).or_else(|| {
            self.registry
                .borrow()
                .get(name)
                .map(|nf| Value::Function(Function::Native(nf)))
        })
    }

    pub fn define_global(&mut self, name: &str, value: Value) {
        let sym = self.intern(name);
        self.globals.define(sym.id(), value);
    }

    pub fn read_str(&self, src: &str) -> anyhow::Result<Vec<Value>> {
        reader::read_str(&mut self.symbols.borrow_mut(), src)
    }

    /// First form of `src`, or `End` when it holds none.
    pub fn read_first(&self, src: &str) -> anyhow::Result<Value> {
        reader::read_first(&mut self.symbols.borrow_mut(), src)
    }

    /// Compiles `src` as the next program to [Vm::run].
    pub fn load_str(&mut self, src: &str) -> anyhow::Result<()> {
        let forms = self.read_str(src)?;
        self.load_values(&forms)
    }

    pub fn load_file(&mut self, path: &str) -> anyhow::Result<()> {
        let forms = reader::read_file(&mut self.symbols.borrow_mut(), path)?;
        self.load_values(&forms)
    }

    pub fn load_values(&mut self, forms: &[Value]) -> anyhow::Result<()> {
        let chunk = Kiln::compile_program(forms)?;
        log::debug!(
            "loaded program: {} forms, {} ops, {} functions",
            forms.len(),
            chunk.len(),
            chunk.protos.len()
        );
        self.program = Rc::new(chunk);
        Ok(())
    }

    pub fn dump_bytecode(&self) -> String {
        self.program.to_string()
    }

    /// Runs the loaded program from the top against the global scope.
    /// Any state left behind by an earlier failed run is discarded.
    pub fn run(&mut self) -> anyhow::Result<Value> {
        if self.nesting > self.opts.max_nesting {
            bail!(RuntimeError::StackOverflow(self.opts.max_nesting));
        }
        self.stack.clear();
        self.frames.clear();
        self.frames.push(CallFrame {
            chunk: Rc::clone(&self.program),
            pc: 0,
            env: Rc::clone(&self.globals),
            stack_base: 0,
        });
        self.execute(0)
    }

    pub fn eval_str(&mut self, src: &str) -> anyhow::Result<Value> {
        self.load_str(src)?;
        self.run()
    }

    /// Calls `func` with `args`. Safe to call from inside a native function
    /// while the engine is mid-run: the nested call runs on top of the current
    /// frames and returns once its own frame is popped.
    pub fn apply(&mut self, func: &Value, args: &[Value]) -> anyhow::Result<Value> {
        let base = self.frames.len();
        let height = self.stack.len();
        log::trace!("apply {func} with {} args at depth {}", args.len(), self.depth());
        if self.nesting >= self.opts.max_nesting {
            bail!(RuntimeError::StackOverflow(self.opts.max_nesting));
        }

        self.nesting += 1;
        let res = match self.enter(func, args) {
            Ok(Entered::Done(v)) => Ok(v),
            Ok(Entered::Frame) => self.execute(base),
            Err(e) => Err(e),
        };
        self.nesting -= 1;
        if res.is_err() {
            self.frames.truncate(base);
            self.stack.truncate(height);
        }
        res
    }

    /// A fresh engine sharing this one's globals, builtins, symbols and
    /// output, with its own stack and frames. Its calls count on top of this
    /// engine's depth.
    pub fn duplicate(&self) -> Self {
        log::debug!("duplicating engine at depth {}", self.depth());
        Self {
            stack: Vec::new(),
            frames: Vec::new(),
            globals: Rc::clone(&self.globals),
            registry: Rc::clone(&self.registry),
            symbols: Rc::clone(&self.symbols),
            out: Rc::clone(&self.out),
            opts: self.opts,
            program: Rc::new(empty_program()),
            outer_frames: self.depth(),
            nesting: self.nesting + 1,
        }
    }

    fn enter(&mut self, func: &Value, args: &[Value]) -> anyhow::Result<Entered> {
        match func {
            Value::Function(Function::Native(nf)) => {
                log::trace!("-> {} (native, {} args)", nf.name, args.len());
                let v = (nf.func)(self, &nf.name, args)?;
                log::trace!("<- {}", nf.name);
                Ok(Entered::Done(v))
            }
            Value::Function(Function::Compiled(closure)) => {
                self.push_frame(closure, args)?;
                Ok(Entered::Frame)
            }
            _ => bail!(RuntimeError::mismatch("apply", "function", func)),
        }
    }

    fn push_frame(&mut self, closure: &Rc<Closure>, args: &[Value]) -> anyhow::Result<()> {
        let proto = &closure.proto;
        let fixed = proto.arity();
        let arity_ok = if proto.is_variadic() {
            args.len() >= fixed
        } else {
            args.len() == fixed
        };
        if !arity_ok {
            let expected = if proto.is_variadic() {
                format!("at least {fixed}")
            } else {
                fixed.to_string()
            };
            bail!(RuntimeError::arity(&proto.name, expected, args.len()));
        }
        if self.depth() >= self.opts.max_frames || self.stack.len() >= self.opts.stack_capacity
        {
            bail!(RuntimeError::StackOverflow(self.opts.max_frames));
        }

        let mut bindings = HashMap::with_capacity(fixed + 1);
        for (param, arg) in proto.params.iter().zip(args.iter()) {
            bindings.insert(param.id(), arg.clone());
        }
        if let Some(rest) = &proto.rest {
            bindings.insert(rest.id(), make_list(&args[fixed..]));
        }

        log::trace!(
            "-> {} ({} args, depth {})",
            proto.name,
            args.len(),
            self.depth() + 1
        );
        self.frames.push(CallFrame {
            chunk: Rc::clone(&proto.chunk),
            pc: 0,
            env: Scope::with_bindings(&closure.env, bindings),
            stack_base: self.stack.len(),
        });
        Ok(())
    }

    #[inline]
    fn push(&mut self, v: Value) {
        self.stack.push(v);
    }

    #[inline]
    fn pop(&mut self) -> anyhow::Result<Value> {
        self.stack.pop().ok_or_else(|| anyhow!("value stack underflow"))
    }

    fn peek(&self) -> anyhow::Result<&Value> {
        self.stack.last().ok_or_else(|| anyhow!("value stack underflow"))
    }

    fn pop_n(&mut self, n: usize) -> anyhow::Result<Vec<Value>> {
        if self.stack.len() < n {
            bail!("value stack underflow: need {n}, have {}", self.stack.len());
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    fn frame_mut(&mut self) -> anyhow::Result<&mut CallFrame> {
        self.frames
            .last_mut()
            .ok_or_else(|| anyhow!("no call frame to execute"))
    }

    fn next_op(&mut self) -> anyhow::Result<Op> {
        let frame = self.frame_mut()?;
        let op = frame
            .chunk
            .code
            .get(frame.pc)
            .cloned()
            .ok_or_else(|| anyhow!("pc {} ran past the end of its chunk", frame.pc))?;
        frame.pc += 1;
        Ok(op)
    }

    fn load(&mut self, sym: &Symbol) -> anyhow::Result<Value> {
        let env = Rc::clone(&self.frame_mut()?.env);
        if let Some(v) = env.lookup(sym.id()) {
            return Ok(v);
        }
        match self.registry.borrow().get(sym.name()) {
            Some(nf) => Ok(Value::Function(Function::Native(nf))),
            None => bail!(RuntimeError::UnknownSymbol(sym.name().to_owned())),
        }
    }

    /// Runs until the frame at index `base` returns.
    fn execute(&mut self, base: usize) -> anyhow::Result<Value> {
        loop {
            match self.next_op()? {
                Op::Const(i) => {
                    let v = self
                        .frame_mut()?
                        .chunk
                        .constants
                        .get(i)
                        .cloned()
                        .ok_or_else(|| anyhow!("no constant at index {i}"))?;
                    self.push(v);
                }
                Op::Nil => self.push(Value::Null),
                Op::True => self.push(Value::Bool(true)),
                Op::False => self.push(Value::Bool(false)),
                Op::Load(sym) => {
                    let v = self.load(&sym)?;
                    self.push(v);
                }
                Op::Define(sym) => {
                    let v = self.peek()?.clone();
                    self.frame_mut()?.env.define(sym.id(), v);
                }
                Op::Store(sym) => {
                    let v = self.peek()?.clone();
                    if !self.frame_mut()?.env.set(sym.id(), v) {
                        bail!(RuntimeError::UnknownSymbol(sym.name().to_owned()));
                    }
                }
                Op::Pop => {
                    self.pop()?;
                }
                Op::Jump(to) => self.frame_mut()?.pc = to,
                Op::JumpUnless(to) => {
                    if !self.pop()?.is_truthy() {
                        self.frame_mut()?.pc = to;
                    }
                }
                Op::JumpUnlessKeep(to) => {
                    if self.peek()?.is_truthy() {
                        self.pop()?;
                    } else {
                        self.frame_mut()?.pc = to;
                    }
                }
                Op::JumpIfKeep(to) => {
                    if self.peek()?.is_truthy() {
                        self.frame_mut()?.pc = to;
                    } else {
                        self.pop()?;
                    }
                }
                Op::Call(argc) => {
                    let args = self.pop_n(argc)?;
                    let callee = self.pop()?;
                    if let Entered::Done(v) = self.enter(&callee, &args)? {
                        self.push(v);
                    }
                }
                Op::Return => {
                    let result = self.pop()?;
                    let frame = self
                        .frames
                        .pop()
                        .ok_or_else(|| anyhow!("return with no call frame"))?;
                    self.stack.truncate(frame.stack_base);
                    log::trace!("<- return {result} (depth {})", self.frames.len());
                    if self.frames.len() <= base {
                        return Ok(result);
                    }
                    self.push(result);
                }
                Op::Closure(i) => {
                    let frame = self.frame_mut()?;
                    let proto = frame
                        .chunk
                        .protos
                        .get(i)
                        .cloned()
                        .ok_or_else(|| anyhow!("no function prototype at index {i}"))?;
                    let closure = Closure {
                        proto,
                        env: Rc::clone(&frame.env),
                    };
                    self.push(Value::Function(Function::Compiled(Rc::new(closure))));
                }
                Op::PushScope => {
                    let frame = self.frame_mut()?;
                    frame.env = Scope::child(&frame.env);
                }
                Op::PopScope => {
                    let frame = self.frame_mut()?;
                    let parent = frame
                        .env
                        .parent
                        .clone()
                        .ok_or_else(|| anyhow!("popped the outermost scope"))?;
                    frame.env = parent;
                }
                Op::MakeArray(n) => {
                    let items = self.pop_n(n)?;
                    self.push(Value::array(items));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str) -> anyhow::Result<Value> {
        Vm::new().eval_str(src)
    }

    #[test]
    fn top_level_value_is_last_form() -> anyhow::Result<()> {
        assert_eq!(eval("1 2 3")?, Value::Int(3));
        assert_eq!(eval("")?, Value::Null);
        Ok(())
    }

    #[test]
    fn closures_capture_their_scope() -> anyhow::Result<()> {
        let src = "
            (defn adder [n] (fn [x] (+ x n)))
            (def add5 (adder 5))
            (add5 10)";
        assert_eq!(eval(src)?, Value::Int(15));
        Ok(())
    }

    #[test]
    fn variadic_rest_is_a_list() -> anyhow::Result<()> {
        assert_eq!(eval("((fn [a & more] more) 1 2 3)")?.to_string(), "(2 3)");
        assert_eq!(eval("((fn [a & more] more) 1)")?, Value::Null);
        Ok(())
    }

    #[test]
    fn arity_is_checked() {
        let err = eval("((fn [a b] a) 1)").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RuntimeError>(),
            Some(RuntimeError::WrongArity { got: 1, .. })
        ));
        let err = eval("((fn [a & r] a))").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RuntimeError>(),
            Some(RuntimeError::WrongArity { got: 0, .. })
        ));
    }

    #[test]
    fn calling_a_non_function_is_a_type_mismatch() {
        let err = eval("(1 2)").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RuntimeError>(),
            Some(RuntimeError::TypeMismatch { expected: "function", .. })
        ));
    }

    #[test]
    fn unknown_symbols() {
        let err = eval("nope").unwrap_err();
        assert_eq!(
            err.downcast_ref::<RuntimeError>(),
            Some(&RuntimeError::UnknownSymbol("nope".into()))
        );
        let err = eval("(set! nope 1)").unwrap_err();
        assert!(err.downcast_ref::<RuntimeError>().is_some());
    }

    #[test]
    fn runaway_recursion_overflows() {
        let mut vm = Vm::with_options(VmOptions {
            max_frames: 64,
            ..Default::default()
        });
        let err = vm.eval_str("(defn f [n] (+ 1 (f n))) (f 0)").unwrap_err();
        assert_eq!(
            err.downcast_ref::<RuntimeError>(),
            Some(&RuntimeError::StackOverflow(64))
        );
    }

    #[test]
    fn eval_counts_the_callers_frames() {
        let mut vm = Vm::with_options(VmOptions {
            max_frames: 50,
            ..Default::default()
        });
        let err = vm
            .eval_str("(defn f [n] (eval (list 'f (+ n 1)))) (f 0)")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RuntimeError>(),
            Some(RuntimeError::StackOverflow(_))
        ));
        assert_eq!(vm.eval_str("(+ 1 2)").ok(), Some(Value::Int(3)));
    }

    #[test]
    fn native_reentry_is_bounded() -> anyhow::Result<()> {
        let src = "(defn f [n] (if (= n 0) 0 (+ 1 (first (map (fn [x] (f (- x 1))) (list n))))))";
        let mut vm = Vm::new();
        vm.eval_str(src)?;
        assert_eq!(vm.eval_str("(f 20)")?, Value::Int(20));

        let err = vm.eval_str("(f 400)").unwrap_err();
        assert_eq!(
            err.downcast_ref::<RuntimeError>(),
            Some(&RuntimeError::StackOverflow(NESTING_MAX))
        );
        assert_eq!(vm.eval_str("(f 3)")?, Value::Int(3));
        Ok(())
    }

    #[test]
    fn apply_from_the_host() -> anyhow::Result<()> {
        let mut vm = Vm::new();
        vm.eval_str("(defn sq [x] (* x x))")?;
        let sq = vm.global("sq").ok_or_else(|| anyhow!("sq not defined"))?;
        assert_eq!(vm.apply(&sq, &[Value::Int(9)])?, Value::Int(81));

        let plus = vm.global("+").ok_or_else(|| anyhow!("+ not registered"))?;
        assert_eq!(vm.apply(&plus, &[Value::Int(1), Value::Int(2)])?, Value::Int(3));
        Ok(())
    }

    #[test]
    fn failed_apply_leaves_engine_usable() -> anyhow::Result<()> {
        let mut vm = Vm::new();
        vm.eval_str("(defn boom [x] (/ x 0))")?;
        let boom = vm.global("boom").ok_or_else(|| anyhow!("boom not defined"))?;
        assert!(vm.apply(&boom, &[Value::Int(1)]).is_err());
        assert_eq!(vm.eval_str("(+ 1 1)")?, Value::Int(2));
        Ok(())
    }

    #[test]
    fn let_scopes_do_not_leak() -> anyhow::Result<()> {
        let mut vm = Vm::new();
        assert_eq!(vm.eval_str("(let [x 1 y (+ x 1)] (* y 10))")?, Value::Int(20));
        assert!(vm.global("x").is_none());
        Ok(())
    }

    #[test]
    fn dump_lists_functions() -> anyhow::Result<()> {
        let mut vm = Vm::new();
        vm.load_str("(defn f [] 1)")?;
        let dump = vm.dump_bytecode();
        assert!(dump.starts_with("== <toplevel> =="));
        assert!(dump.contains("== f =="));
        Ok(())
    }
}
