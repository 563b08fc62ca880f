pub mod err;
pub mod form;
pub mod lex;
pub mod parse;

use std::fmt::Display;

use form::Form;
use lex::TokBuffer;
use parse::Parser;

/// Every top-level form of one source text, in order.
#[derive(Debug, Clone, Default)]
pub struct Ast {
    pub forms: Vec<Form>,
}

impl Ast {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let buf = TokBuffer::read_file(path)?;
        Parser::parse_ast(buf.slice())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}

impl std::str::FromStr for Ast {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let buf = TokBuffer::read_string(s)?;
        Parser::parse_ast(buf.slice())
    }
}

impl Display for Ast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut res = String::from("----- AST ----- \n");
        for form in self.forms.iter() {
            res.push_str(&format!("{form}\n"));
        }
        res.push_str("----- END AST -----\n");
        write!(f, "{}", res)
    }
}
