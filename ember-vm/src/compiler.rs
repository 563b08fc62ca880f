//! s-expression -> bytecode compiler

use std::rc::Rc;

use anyhow::bail;
use ember_core::sym::Symbol;
use phf::phf_map;

use crate::{
    chunk::{Chunk, ChunkBuilder, FuncProto, Op},
    err::CompileError,
    seq::list_to_array,
    val::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecialForm {
    Quote,
    Def,
    Defn,
    Set,
    Fn,
    If,
    Begin,
    Let,
    And,
    Or,
}

static SPECIAL_FORMS: phf::Map<&'static str, SpecialForm> = phf_map! {
    "quote" => SpecialForm::Quote,
    "def" => SpecialForm::Def,
    "defn" => SpecialForm::Defn,
    "set!" => SpecialForm::Set,
    "fn" => SpecialForm::Fn,
    "if" => SpecialForm::If,
    "begin" => SpecialForm::Begin,
    "let" => SpecialForm::Let,
    "and" => SpecialForm::And,
    "or" => SpecialForm::Or,
};

/// Marks the rest parameter in a parameter list.
const REST_MARKER: &str = "&";

pub fn is_special_form(name: &str) -> bool {
    SPECIAL_FORMS.contains_key(name)
}

fn bad_form(form: &'static str, message: impl Into<String>) -> anyhow::Error {
    CompileError::BadForm {
        form,
        message: message.into(),
    }
    .into()
}

pub struct Kiln;

impl Kiln {
    /// Compiles top-level forms into one chunk that leaves the value of the
    /// last form on the stack and returns.
    pub fn compile_program(forms: &[Value]) -> anyhow::Result<Chunk> {
        let mut cb = ChunkBuilder::default();
        Self::compile_body(&mut cb, forms)?;
        Ok(cb.build())
    }

    fn compile_body(cb: &mut ChunkBuilder, forms: &[Value]) -> anyhow::Result<()> {
        if forms.is_empty() {
            cb.push_op(Op::Nil);
            return Ok(());
        }
        for (i, form) in forms.iter().enumerate() {
            if i > 0 {
                cb.push_op(Op::Pop);
            }
            Self::compile_expr(cb, form)?;
        }
        Ok(())
    }

    fn compile_expr(cb: &mut ChunkBuilder, expr: &Value) -> anyhow::Result<()> {
        match expr {
            Value::Symbol(sym) => {
                cb.push_op(Op::Load(sym.clone()));
            }
            Value::Array(arr) => {
                let items = arr.borrow().clone();
                for item in items.iter() {
                    Self::compile_expr(cb, item)?;
                }
                cb.push_op(Op::MakeArray(items.len()));
            }
            Value::Pair(_) => Self::compile_list(cb, expr)?,
            other => {
                cb.push_constant(other.clone());
            }
        }
        Ok(())
    }

    fn compile_list(cb: &mut ChunkBuilder, expr: &Value) -> anyhow::Result<()> {
        let items =
            list_to_array(expr).map_err(|_| CompileError::ImproperList(expr.to_string()))?;
        let Some((head, args)) = items.split_first() else {
            cb.push_op(Op::Nil);
            return Ok(());
        };

        if let Value::Symbol(sym) = head {
            if let Some(form) = SPECIAL_FORMS.get(sym.name()) {
                return Self::compile_special(cb, *form, args);
            }
        }

        Self::compile_expr(cb, head)?;
        for arg in args.iter() {
            Self::compile_expr(cb, arg)?;
        }
        cb.push_op(Op::Call(args.len()));
        Ok(())
    }

    fn compile_special(
        cb: &mut ChunkBuilder,
        form: SpecialForm,
        args: &[Value],
    ) -> anyhow::Result<()> {
        match form {
            SpecialForm::Quote => {
                let [quoted] = args else {
                    return Err(bad_form("quote", "expects exactly one form"));
                };
                cb.push_constant(quoted.clone());
            }
            SpecialForm::Def => {
                let [name, value] = args else {
                    return Err(bad_form("def", "expects (def name value)"));
                };
                let sym = expect_symbol("def", name)?;
                Self::compile_expr(cb, value)?;
                cb.push_op(Op::Define(sym));
            }
            SpecialForm::Set => {
                let [name, value] = args else {
                    return Err(bad_form("set!", "expects (set! name value)"));
                };
                let sym = expect_symbol("set!", name)?;
                Self::compile_expr(cb, value)?;
                cb.push_op(Op::Store(sym));
            }
            SpecialForm::Defn => {
                let [name, params, body @ ..] = args else {
                    return Err(bad_form("defn", "expects (defn name [params] body...)"));
                };
                let sym = expect_symbol("defn", name)?;
                let proto = Self::compile_fn(sym.name(), params, body)?;
                cb.push_closure(proto);
                cb.push_op(Op::Define(sym));
            }
            SpecialForm::Fn => {
                let proto = match args {
                    [Value::Symbol(name), params, body @ ..] => {
                        Self::compile_fn(name.name(), params, body)?
                    }
                    [params, body @ ..] => Self::compile_fn("fn", params, body)?,
                    [] => return Err(bad_form("fn", "expects (fn [params] body...)")),
                };
                cb.push_closure(proto);
            }
            SpecialForm::If => {
                let (cond, then, otherwise) = match args {
                    [c, t] => (c, t, None),
                    [c, t, e] => (c, t, Some(e)),
                    _ => return Err(bad_form("if", "expects (if cond then [else])")),
                };
                Self::compile_expr(cb, cond)?;
                let to_else = cb.push_op(Op::JumpUnless(0));
                Self::compile_expr(cb, then)?;
                let to_end = cb.push_op(Op::Jump(0));
                cb.patch_jump(to_else);
                match otherwise {
                    Some(e) => Self::compile_expr(cb, e)?,
                    None => {
                        cb.push_op(Op::Nil);
                    }
                }
                cb.patch_jump(to_end);
            }
            SpecialForm::Begin => Self::compile_body(cb, args)?,
            SpecialForm::Let => {
                let [bindings, body @ ..] = args else {
                    return Err(bad_form("let", "expects (let [bindings] body...)"));
                };
                let bindings = let_bindings(bindings)?;
                cb.push_op(Op::PushScope);
                for (sym, value) in bindings {
                    Self::compile_expr(cb, &value)?;
                    cb.push_op(Op::Define(sym));
                    cb.push_op(Op::Pop);
                }
                Self::compile_body(cb, body)?;
                cb.push_op(Op::PopScope);
            }
            SpecialForm::And | SpecialForm::Or => {
                let Some((last, init)) = args.split_last() else {
                    let unit = form == SpecialForm::And;
                    cb.push_constant(Value::Bool(unit));
                    return Ok(());
                };
                let mut jumps = Vec::with_capacity(init.len());
                for arg in init.iter() {
                    Self::compile_expr(cb, arg)?;
                    let op = if form == SpecialForm::And {
                        Op::JumpUnlessKeep(0)
                    } else {
                        Op::JumpIfKeep(0)
                    };
                    jumps.push(cb.push_op(op));
                }
                Self::compile_expr(cb, last)?;
                for j in jumps {
                    cb.patch_jump(j);
                }
            }
        }
        Ok(())
    }

    fn compile_fn(name: &str, params: &Value, body: &[Value]) -> anyhow::Result<FuncProto> {
        let (params, rest) = param_list(params)?;
        let mut cb = ChunkBuilder::default();
        Self::compile_body(&mut cb, body)?;
        log::trace!("compiled fn {name}/{}", params.len());
        Ok(FuncProto {
            name: Rc::from(name),
            params,
            rest,
            chunk: Rc::new(cb.build()),
        })
    }
}

fn expect_symbol(form: &'static str, v: &Value) -> anyhow::Result<Symbol> {
    match v {
        Value::Symbol(sym) if !is_special_form(sym.name()) => Ok(sym.clone()),
        _ => Err(bad_form(form, format!("expected a symbol, got {v}"))),
    }
}

/// Parameters come as `[a b & rest]` or `(a b & rest)`.
fn param_list(params: &Value) -> anyhow::Result<(Vec<Symbol>, Option<Symbol>)> {
    let items = match params {
        Value::Array(arr) => arr.borrow().clone(),
        Value::Null | Value::Pair(_) => {
            list_to_array(params).map_err(|_| CompileError::BadParams(params.to_string()))?
        }
        _ => bail!(CompileError::BadParams(params.to_string())),
    };

    let mut syms = Vec::with_capacity(items.len());
    let mut iter = items.iter();
    while let Some(item) = iter.next() {
        let Value::Symbol(sym) = item else {
            bail!(CompileError::BadParams(params.to_string()));
        };
        if sym.name() == REST_MARKER {
            return match (iter.next(), iter.next()) {
                (Some(Value::Symbol(rest)), None) => Ok((syms, Some(rest.clone()))),
                _ => Err(CompileError::BadParams(params.to_string()).into()),
            };
        }
        syms.push(sym.clone());
    }
    Ok((syms, None))
}

/// `[x 1 y 2]`, `(x 1 y 2)` or `((x 1) (y 2))`.
fn let_bindings(bindings: &Value) -> anyhow::Result<Vec<(Symbol, Value)>> {
    let items = match bindings {
        Value::Array(arr) => arr.borrow().clone(),
        Value::Null | Value::Pair(_) => list_to_array(bindings)
            .map_err(|_| bad_form("let", format!("bad binding list {bindings}")))?,
        _ => return Err(bad_form("let", format!("bad binding list {bindings}"))),
    };

    let paired = !items.is_empty() && items.iter().all(|v| matches!(v, Value::Pair(_)));
    let mut out = Vec::new();
    if paired {
        for item in items.iter() {
            let pair = list_to_array(item)
                .map_err(|_| bad_form("let", format!("bad binding {item}")))?;
            let [name, value] = pair.as_slice() else {
                return Err(bad_form("let", format!("bad binding {item}")));
            };
            out.push((expect_symbol("let", name)?, value.clone()));
        }
    } else {
        if items.len() % 2 != 0 {
            return Err(bad_form("let", "bindings need a value for every name"));
        }
        for kv in items.chunks_exact(2) {
            out.push((expect_symbol("let", &kv[0])?, kv[1].clone()));
        }
    }
    Ok(out)
}
