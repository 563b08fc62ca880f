use std::rc::Rc;

use ember_ast::{form::Form, Ast};
use ember_core::sym::SymbolTable;

use crate::{seq::make_list_with_tail, val::Value};

/// Turns parsed forms into values, interning every symbol on the way.
pub struct Reader<'a> {
    symbols: &'a mut SymbolTable,
}

impl<'a> Reader<'a> {
    pub fn new(symbols: &'a mut SymbolTable) -> Self {
        Self { symbols }
    }

    fn symbol(&mut self, name: &str) -> Value {
        Value::Symbol(self.symbols.intern(name))
    }

    pub fn read_form(&mut self, form: &Form) -> Value {
        match form {
            Form::Bool(b) => Value::Bool(*b),
            Form::Int(n) => Value::Int(*n),
            Form::Float(n) => Value::Float(*n),
            Form::Char(c) => Value::Char(*c),
            Form::Str(s) => Value::Str(Rc::clone(s)),
            Form::Symbol(name) => self.symbol(name),
            Form::List { items, tail } => {
                let items: Vec<Value> = items.iter().map(|f| self.read_form(f)).collect();
                let tail = match tail {
                    Some(t) => self.read_form(t),
                    None => Value::Null,
                };
                make_list_with_tail(&items, tail)
            }
            Form::Array(items) => Value::array(items.iter().map(|f| self.read_form(f)).collect()),
            Form::Hash(items) => {
                let mut list = vec![self.symbol("hash")];
                list.extend(items.iter().map(|f| self.read_form(f)));
                make_list_with_tail(&list, Value::Null)
            }
            Form::Quote(inner) => {
                let quote = self.symbol("quote");
                let inner = self.read_form(inner);
                make_list_with_tail(&[quote, inner], Value::Null)
            }
        }
    }

    pub fn read_ast(&mut self, ast: &Ast) -> Vec<Value> {
        ast.forms.iter().map(|f| self.read_form(f)).collect()
    }
}

/// Reads every form in `src`.
pub fn read_str(symbols: &mut SymbolTable, src: &str) -> anyhow::Result<Vec<Value>> {
    let ast: Ast = src.parse()?;
    Ok(Reader::new(symbols).read_ast(&ast))
}

pub fn read_file(symbols: &mut SymbolTable, path: &str) -> anyhow::Result<Vec<Value>> {
    let ast = Ast::from_file(path)?;
    log::debug!("read {} forms from {path}", ast.forms.len());
    Ok(Reader::new(symbols).read_ast(&ast))
}

/// First form in `src`, or [Value::End] when there is none.
pub fn read_first(symbols: &mut SymbolTable, src: &str) -> anyhow::Result<Value> {
    let ast: Ast = src.parse()?;
    Ok(ast
        .forms
        .first()
        .map(|f| Reader::new(symbols).read_form(f))
        .unwrap_or(Value::End))
}
