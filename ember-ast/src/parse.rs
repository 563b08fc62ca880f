use anyhow::bail;

use crate::{
    err::ParseError,
    form::Form,
    lex::{Tok, TokType},
    Ast,
};

#[derive(Debug, Clone)]
pub struct Parser<'a> {
    pub i: usize,
    pub tokens: &'a [Tok],
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Tok]) -> Self {
        Self { i: 0, tokens }
    }

    pub fn parse_ast(tokens: &[Tok]) -> anyhow::Result<Ast> {
        let mut p = Parser::new(tokens);
        let mut forms = Vec::new();
        while !p.is_eof() {
            forms.push(p.form()?);
        }
        log::debug!("parsed {} top-level forms", forms.len());
        Ok(Ast { forms })
    }

    /// Parses one form starting at the current token. Returns [ParseError::Eof]
    /// when there is nothing left.
    pub fn form(&mut self) -> anyhow::Result<Form> {
        let tok = self.peek().clone();
        let form = match tok.ty {
            TokType::Eof => bail!(ParseError::Eof),
            TokType::OpenParen => {
                self.adv(1)?;
                return self.list(&tok);
            }
            TokType::BracketOpen => {
                self.adv(1)?;
                let items = self.seq_until(&tok, "array", |ty| matches!(ty, TokType::BracketClose))?;
                return Ok(Form::Array(items));
            }
            TokType::BraceOpen => {
                self.adv(1)?;
                let items = self.seq_until(&tok, "hash", |ty| matches!(ty, TokType::BraceClose))?;
                return Ok(Form::Hash(items));
            }
            TokType::Quote => {
                self.adv(1)?;
                if self.is_eof() {
                    bail!(ParseError::Unterminated {
                        kind: "quote",
                        info: tok.info
                    });
                }
                let inner = self.form()?;
                return Ok(Form::Quote(Box::new(inner)));
            }
            TokType::CloseParen | TokType::BracketClose | TokType::BraceClose => {
                bail!(ParseError::UnmatchedClose(tok.clone()))
            }
            TokType::Dot => bail!(ParseError::MisplacedDot(tok.info)),
            TokType::Bool(b) => Form::Bool(b),
            TokType::Int(n) => Form::Int(n),
            TokType::Float(n) => Form::Float(n),
            TokType::Char(c) => Form::Char(c),
            TokType::Str(ref s) => Form::Str(s.as_str().into()),
            TokType::Symbol(ref s) => Form::Symbol(s.as_str().into()),
        };
        self.adv(1)?;
        Ok(form)
    }

    /// Called with the cursor just past '('.
    fn list(&mut self, open: &Tok) -> anyhow::Result<Form> {
        let mut items = Vec::new();
        loop {
            match self.peek().ty {
                TokType::Eof => bail!(ParseError::Unterminated {
                    kind: "list",
                    info: open.info
                }),
                TokType::CloseParen => {
                    self.adv(1)?;
                    return Ok(Form::List { items, tail: None });
                }
                TokType::Dot => {
                    let dot = self.peek().info;
                    if items.is_empty() {
                        bail!(ParseError::MisplacedDot(dot));
                    }
                    self.adv(1)?;
                    if matches!(self.peek().ty, TokType::CloseParen | TokType::Eof) {
                        bail!(ParseError::MisplacedDot(dot));
                    }
                    let tail = self.form()?;
                    if !matches!(self.peek().ty, TokType::CloseParen) {
                        bail!(ParseError::MisplacedDot(dot));
                    }
                    self.adv(1)?;
                    let tail = if tail.is_nil() {
                        None
                    } else {
                        Some(Box::new(tail))
                    };
                    return Ok(Form::List { items, tail });
                }
                _ => items.push(self.form()?),
            }
        }
    }

    fn seq_until(
        &mut self,
        open: &Tok,
        kind: &'static str,
        is_close: impl Fn(&TokType) -> bool,
    ) -> anyhow::Result<Vec<Form>> {
        let mut items = Vec::new();
        loop {
            let ty = &self.peek().ty;
            if is_close(ty) {
                self.adv(1)?;
                return Ok(items);
            }
            if matches!(ty, TokType::Eof) {
                bail!(ParseError::Unterminated {
                    kind,
                    info: open.info
                });
            }
            items.push(self.form()?);
        }
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.peek().is_eof()
    }

    fn adv(&mut self, n: usize) -> anyhow::Result<()> {
        let i = self.i + n;
        if self.is_eof() || i >= self.tokens.len() {
            bail!(ParseError::Eof)
        } else {
            self.i = i;
            Ok(())
        }
    }

    /// The token list always ends in Eof, so the cursor never runs off the end.
    #[inline]
    pub fn peek(&self) -> &Tok {
        &self.tokens[self.i]
    }
}
