use std::{fmt::Display, rc::Rc};

/// A datum as read from source, before symbols are interned.
#[derive(Debug, Clone, PartialEq)]
pub enum Form {
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(Rc<str>),
    Symbol(Rc<str>),
    /// `(a b c)` or the dotted `(a b . c)`. An empty list with no tail is the empty list.
    List {
        items: Vec<Form>,
        tail: Option<Box<Form>>,
    },
    Array(Vec<Form>),
    /// `{k v ...}`, alternating keys and values.
    Hash(Vec<Form>),
    Quote(Box<Form>),
}

impl Form {
    pub fn list(items: Vec<Form>) -> Self {
        Self::List { items, tail: None }
    }

    pub fn symbol(name: &str) -> Self {
        Self::Symbol(Rc::from(name))
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::List { items, tail: None } if items.is_empty())
    }
}

fn join(forms: &[Form]) -> String {
    forms
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

impl Display for Form {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Form::Bool(b) => write!(f, "{b}"),
            Form::Int(n) => write!(f, "{n}"),
            Form::Float(n) => write!(f, "{n:?}"),
            Form::Char(c) => match c {
                '\n' => write!(f, "#newline"),
                ' ' => write!(f, "#space"),
                '\t' => write!(f, "#tab"),
                '\r' => write!(f, "#return"),
                _ => write!(f, "#{c}"),
            },
            Form::Str(s) => write!(f, "{s:?}"),
            Form::Symbol(s) => write!(f, "{s}"),
            Form::List { items, tail } => match tail {
                Some(tail) => write!(f, "({} . {tail})", join(items)),
                None => write!(f, "({})", join(items)),
            },
            Form::Array(items) => write!(f, "[{}]", join(items)),
            Form::Hash(items) => write!(f, "{{{}}}", join(items)),
            Form::Quote(inner) => write!(f, "'{inner}"),
        }
    }
}
